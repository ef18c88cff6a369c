//! Multi-tick mechanical actions.
//!
//! An action is a small cooperative task: it is started once, stepped once per
//! simulation tick until it reports [`ActionStatus::Finished`], then stopped.
//! The [`ActionScheduler`] owns the queue and is driven by the session tick
//! loop. Actions only ever touch the revolver through its public commands, so
//! they obey the same interlocks as direct input.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cylinder::CHAMBER_ARC;
use super::hammer::HammerState;
use super::Revolver;

/// Result of stepping an action for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionStatus {
    /// Wants another tick
    Running,
    /// Done; will be stopped and discarded
    Finished,
}

impl ActionStatus {
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, ActionStatus::Finished)
    }
}

/// A unit of mechanical work spread across ticks
pub trait MechanicalAction: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Called once before the first step
    fn on_start(&mut self, _revolver: &mut Revolver) {}

    fn step(&mut self, revolver: &mut Revolver) -> ActionStatus;

    /// Called once after finishing or being cancelled
    fn on_stopped(&mut self, _revolver: &mut Revolver) {}
}

/// Smallest per-tick progress, so every action terminates
const MIN_HAMMER_RATE: f32 = 0.01;
const MIN_ROTATION_RATE: f32 = 0.5;

/// Queued plus running actions a scheduler will hold
pub const MAX_QUEUED_ACTIONS: usize = 16;

/// Clamp a per-tick rate. NaN falls to the minimum.
fn bounded_rate(rate: f32, min: f32, max: f32) -> f32 {
    if rate.is_nan() {
        min
    } else {
        rate.clamp(min, max)
    }
}

/// Thumb the hammer back until it is fully cocked
#[derive(Debug, Clone)]
pub struct CockHammer {
    rate: f32,
}

impl CockHammer {
    pub fn new(rate: f32) -> Self {
        Self {
            rate: bounded_rate(rate, MIN_HAMMER_RATE, 1.0),
        }
    }
}

impl MechanicalAction for CockHammer {
    fn name(&self) -> &'static str {
        "cock_hammer"
    }

    fn step(&mut self, revolver: &mut Revolver) -> ActionStatus {
        if revolver.hammer_state() != HammerState::Cocked {
            revolver.pull_hammer(self.rate);
        }
        if revolver.hammer_state() == HammerState::Cocked {
            ActionStatus::Finished
        } else {
            ActionStatus::Running
        }
    }
}

/// Turn the cylinder one chamber forward and let it settle in the detent
#[derive(Debug, Clone)]
pub struct IndexCylinder {
    rate: f32,
    remaining: f32,
    blocked: bool,
}

impl IndexCylinder {
    pub fn new(rate: f32) -> Self {
        Self {
            rate: bounded_rate(rate, MIN_ROTATION_RATE, CHAMBER_ARC),
            remaining: CHAMBER_ARC,
            blocked: false,
        }
    }
}

impl MechanicalAction for IndexCylinder {
    fn name(&self) -> &'static str {
        "index_cylinder"
    }

    fn on_start(&mut self, _revolver: &mut Revolver) {
        self.remaining = CHAMBER_ARC;
        self.blocked = false;
    }

    fn step(&mut self, revolver: &mut Revolver) -> ActionStatus {
        let delta = self.rate.min(self.remaining);
        if !revolver.try_rotate(delta) {
            self.blocked = true;
            return ActionStatus::Finished;
        }
        self.remaining -= delta;
        if self.remaining <= 0.0 {
            ActionStatus::Finished
        } else {
            ActionStatus::Running
        }
    }

    fn on_stopped(&mut self, revolver: &mut Revolver) {
        if !self.blocked {
            revolver.release_cylinder();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlipFirePhase {
    Cocking,
    Releasing,
    Done,
}

/// Hold the trigger, draw the hammer to full cock, then let it slip
#[derive(Debug, Clone)]
pub struct SlipFire {
    rate: f32,
    phase: SlipFirePhase,
}

impl SlipFire {
    pub fn new(rate: f32) -> Self {
        Self {
            rate: bounded_rate(rate, MIN_HAMMER_RATE, 1.0),
            phase: SlipFirePhase::Cocking,
        }
    }
}

impl MechanicalAction for SlipFire {
    fn name(&self) -> &'static str {
        "slip_fire"
    }

    fn on_start(&mut self, revolver: &mut Revolver) {
        self.phase = SlipFirePhase::Cocking;
        revolver.trigger_down_event();
    }

    fn step(&mut self, revolver: &mut Revolver) -> ActionStatus {
        match self.phase {
            SlipFirePhase::Cocking => {
                revolver.pull_hammer(self.rate);
                if revolver.hammer_state() == HammerState::Cocked {
                    self.phase = SlipFirePhase::Releasing;
                }
                ActionStatus::Running
            }
            SlipFirePhase::Releasing => {
                revolver.release_hammer();
                self.phase = SlipFirePhase::Done;
                ActionStatus::Finished
            }
            SlipFirePhase::Done => ActionStatus::Finished,
        }
    }

    fn on_stopped(&mut self, revolver: &mut Revolver) {
        revolver.trigger_up_event();
    }
}

fn default_hammer_rate() -> f32 {
    0.25
}

fn default_rotation_rate() -> f32 {
    15.0
}

/// Wire-level description of a built-in action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    CockHammer {
        #[serde(default = "default_hammer_rate")]
        rate: f32,
    },
    IndexCylinder {
        #[serde(default = "default_rotation_rate")]
        rate: f32,
    },
    SlipFire {
        #[serde(default = "default_hammer_rate")]
        rate: f32,
    },
}

impl ActionKind {
    pub fn build(self) -> Box<dyn MechanicalAction> {
        match self {
            ActionKind::CockHammer { rate } => Box::new(CockHammer::new(rate)),
            ActionKind::IndexCylinder { rate } => Box::new(IndexCylinder::new(rate)),
            ActionKind::SlipFire { rate } => Box::new(SlipFire::new(rate)),
        }
    }
}

/// Runs queued actions one at a time, one step per tick
#[derive(Default)]
pub struct ActionScheduler {
    queue: VecDeque<Box<dyn MechanicalAction>>,
    current: Option<Box<dyn MechanicalAction>>,
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action behind the running one.
    /// A full scheduler hands the action back.
    pub fn enqueue(
        &mut self,
        action: Box<dyn MechanicalAction>,
    ) -> Result<(), Box<dyn MechanicalAction>> {
        if self.is_full() {
            return Err(action);
        }
        self.queue.push_back(action);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.pending() >= MAX_QUEUED_ACTIONS
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Queued plus running
    pub fn pending(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    pub fn current_name(&self) -> Option<&'static str> {
        self.current.as_ref().map(|a| a.name())
    }

    /// Advance by one tick. Starts the next queued action if none is running.
    pub fn tick(&mut self, revolver: &mut Revolver) {
        if self.current.is_none() {
            let Some(mut next) = self.queue.pop_front() else {
                return;
            };
            debug!(action = next.name(), "Mechanical action started");
            next.on_start(revolver);
            self.current = Some(next);
        }

        let finished = self
            .current
            .as_mut()
            .map(|action| action.step(revolver).is_finished())
            .unwrap_or(false);

        if finished {
            if let Some(mut action) = self.current.take() {
                action.on_stopped(revolver);
                debug!(action = action.name(), "Mechanical action finished");
            }
        }
    }

    /// Stop the running action and drop everything queued
    pub fn cancel_all(&mut self, revolver: &mut Revolver) {
        if let Some(mut action) = self.current.take() {
            action.on_stopped(revolver);
            debug!(action = action.name(), "Mechanical action cancelled");
        }
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::super::MechanismEvent;
    use super::*;

    fn run_until_idle(scheduler: &mut ActionScheduler, revolver: &mut Revolver) -> usize {
        let mut ticks = 0;
        while !scheduler.is_idle() {
            scheduler.tick(revolver);
            ticks += 1;
            assert!(ticks < 1000, "scheduler did not go idle");
        }
        ticks
    }

    #[test]
    fn cock_hammer_takes_expected_ticks() {
        let mut revolver = Revolver::new();
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(Box::new(CockHammer::new(0.25))).unwrap();

        let ticks = run_until_idle(&mut scheduler, &mut revolver);

        assert_eq!(ticks, 4);
        assert_eq!(revolver.hammer_state(), HammerState::Cocked);
    }

    #[test]
    fn cock_hammer_on_cocked_hammer_finishes_immediately() {
        let mut revolver = Revolver::new();
        revolver.pull_hammer(1.0);
        revolver.take_events();
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(ActionKind::CockHammer { rate: 0.1 }.build()).unwrap();

        assert_eq!(run_until_idle(&mut scheduler, &mut revolver), 1);
        assert!(!revolver.has_pending_events());
    }

    #[test]
    fn index_cylinder_advances_one_chamber() {
        let mut revolver = Revolver::new();
        revolver.set_cylinder_rotation(30.0);
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(Box::new(IndexCylinder::new(20.0))).unwrap();

        let ticks = run_until_idle(&mut scheduler, &mut revolver);

        assert_eq!(ticks, 3);
        assert_eq!(revolver.cylinder_rotation(), 90.0);
        assert_eq!(revolver.firing_chamber_index(), 1);
        assert_eq!(
            revolver.take_events(),
            vec![MechanismEvent::CylinderClick {
                firing_chamber_index: 1
            }]
        );
    }

    #[test]
    fn index_cylinder_stops_when_blocked() {
        let mut revolver = Revolver::new();
        revolver.set_cylinder_rotation(45.0);
        revolver.ejector_rod_down_event();
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(Box::new(IndexCylinder::new(20.0))).unwrap();

        assert_eq!(run_until_idle(&mut scheduler, &mut revolver), 1);
        // No detent snap either
        assert_eq!(revolver.cylinder_rotation(), 45.0);
    }

    #[test]
    fn slip_fire_discharges_and_lifts_trigger() {
        let mut revolver = Revolver::with_rounds(6);
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(ActionKind::SlipFire { rate: 0.5 }.build()).unwrap();

        run_until_idle(&mut scheduler, &mut revolver);

        assert_eq!(revolver.live_rounds(), 5);
        assert_eq!(revolver.hammer_distance(), 0.0);
        assert!(!revolver.is_trigger_down());
        assert!(revolver
            .take_events()
            .contains(&MechanismEvent::Fired { chamber_index: 0 }));
    }

    #[test]
    fn actions_run_in_order() {
        let mut revolver = Revolver::with_rounds(6);
        revolver.set_cylinder_rotation(30.0);
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(ActionKind::SlipFire { rate: 1.0 }.build()).unwrap();
        scheduler.enqueue(ActionKind::IndexCylinder { rate: 60.0 }.build()).unwrap();
        scheduler.enqueue(ActionKind::SlipFire { rate: 1.0 }.build()).unwrap();
        assert_eq!(scheduler.pending(), 3);

        run_until_idle(&mut scheduler, &mut revolver);

        let fired: Vec<usize> = revolver
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                MechanismEvent::Fired { chamber_index } => Some(chamber_index),
                _ => None,
            })
            .collect();
        assert_eq!(fired, vec![0, 1]);
    }

    #[test]
    fn cancel_stops_running_action() {
        let mut revolver = Revolver::with_rounds(6);
        let mut scheduler = ActionScheduler::new();
        scheduler.enqueue(ActionKind::SlipFire { rate: 0.1 }.build()).unwrap();
        scheduler.enqueue(ActionKind::CockHammer { rate: 0.1 }.build()).unwrap();

        scheduler.tick(&mut revolver);
        assert_eq!(scheduler.current_name(), Some("slip_fire"));
        assert!(revolver.is_trigger_down());

        scheduler.cancel_all(&mut revolver);
        assert!(scheduler.is_idle());
        assert!(!revolver.is_trigger_down());
        assert_eq!(revolver.live_rounds(), 6);
    }

    #[test]
    fn scheduler_refuses_actions_when_full() {
        let mut revolver = Revolver::with_rounds(6);
        let mut scheduler = ActionScheduler::new();
        for _ in 0..MAX_QUEUED_ACTIONS {
            scheduler
                .enqueue(ActionKind::SlipFire { rate: 0.01 }.build())
                .unwrap();
        }
        assert!(scheduler.is_full());

        let refused = scheduler
            .enqueue(ActionKind::CockHammer { rate: 0.5 }.build())
            .unwrap_err();
        assert_eq!(refused.name(), "cock_hammer");
        assert_eq!(scheduler.pending(), MAX_QUEUED_ACTIONS);

        // The running action still counts against the limit
        scheduler.tick(&mut revolver);
        assert_eq!(scheduler.pending(), MAX_QUEUED_ACTIONS);
        assert!(scheduler.is_full());

        scheduler.cancel_all(&mut revolver);
        assert!(scheduler
            .enqueue(ActionKind::CockHammer { rate: 0.5 }.build())
            .is_ok());
    }

    #[test]
    fn nan_rates_still_terminate() {
        let mut revolver = Revolver::with_rounds(6);
        let mut scheduler = ActionScheduler::new();
        scheduler
            .enqueue(ActionKind::CockHammer { rate: f32::NAN }.build())
            .unwrap();
        scheduler
            .enqueue(ActionKind::SlipFire { rate: f32::NAN }.build())
            .unwrap();
        scheduler
            .enqueue(ActionKind::IndexCylinder { rate: f32::NAN }.build())
            .unwrap();

        run_until_idle(&mut scheduler, &mut revolver);

        assert_eq!(revolver.live_rounds(), 5);
        assert_eq!(revolver.firing_chamber_index(), 1);
        assert!(revolver.cylinder_rotation().is_finite());
    }

    #[test]
    fn action_kind_defaults_rate() {
        let kind: ActionKind = serde_json::from_str(r#"{"kind":"index_cylinder"}"#).unwrap();
        assert_eq!(kind, ActionKind::IndexCylinder { rate: 15.0 });
    }
}
