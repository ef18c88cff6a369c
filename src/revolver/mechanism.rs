//! Revolver mechanism - hammer, trigger, cylinder and ejector interplay

use tracing::{debug, trace};

use super::chamber::{Cartridge, Chamber};
use super::cylinder::{Cylinder, CHAMBER_COUNT};
use super::events::MechanismEvent;
use super::hammer::{Hammer, HammerState};
use super::snapshot::{ChamberSnapshot, RevolverSnapshot};

/// Single-action revolver.
///
/// Every command runs to completion synchronously. Invalid numeric input is
/// clamped or wrapped, and blocked actions leave state untouched. Notifications
/// accumulate in an internal buffer drained with [`Revolver::take_events`].
#[derive(Debug, Clone, Default)]
pub struct Revolver {
    cylinder: Cylinder,
    hammer: Hammer,
    trigger_down: bool,
    ejector_rod_down: bool,
    events: Vec<MechanismEvent>,
}

impl Revolver {
    /// Empty cylinder, hammer at rest, controls released
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh rounds in chambers `0..rounds` (capped at six)
    pub fn with_rounds(rounds: usize) -> Self {
        let mut revolver = Self::new();
        for index in 0..rounds.min(CHAMBER_COUNT) {
            if let Some(chamber) = revolver.cylinder.chamber_mut(index) {
                *chamber = Chamber::loaded(Cartridge::new());
            }
        }
        revolver
    }

    // ------------------------------------------------------------------
    // Hammer
    // ------------------------------------------------------------------

    pub fn pull_hammer(&mut self, delta: f32) {
        if let Some(state) = self.hammer.pull(delta) {
            trace!(?state, distance = self.hammer.distance(), "Hammer state changed");
            self.events.push(MechanismEvent::HammerStateChanged { state });
        }
    }

    /// Let go of the hammer spur.
    ///
    /// With the trigger up the hammer falls into the nearest notch below it.
    /// With the trigger held the hammer falls all the way, striking the
    /// chamber if it was at full cock.
    pub fn release_hammer(&mut self) {
        if !self.trigger_down {
            self.hammer.settle_in_notch();
            return;
        }

        if self.hammer.state() == HammerState::Cocked {
            self.strike_chamber();
        }
        self.hammer.drop_to_rest();
    }

    // ------------------------------------------------------------------
    // Trigger
    // ------------------------------------------------------------------

    /// Trigger pressed. The hammer always ends at rest; only a cocked hammer
    /// strikes on the way down.
    pub fn trigger_down_event(&mut self) {
        self.trigger_down = true;

        let hammer_state = self.hammer.state();
        self.events.push(MechanismEvent::TriggerPulled { hammer_state });

        match hammer_state {
            HammerState::Uncocked | HammerState::Halfcock => {}
            HammerState::Cocked => {
                self.hammer.drop_to_rest();
                self.strike_chamber();
            }
        }

        // Also taken from Uncocked and Halfcock
        self.hammer.drop_to_rest();
    }

    pub fn trigger_up_event(&mut self) {
        self.trigger_down = false;
    }

    // ------------------------------------------------------------------
    // Strike / discharge
    // ------------------------------------------------------------------

    fn strike_chamber(&mut self) {
        let chamber_index = self.cylinder.firing_index();
        if self.cylinder.firing_chamber_mut().discharge() {
            debug!(chamber_index, "Cartridge discharged");
            self.events.push(MechanismEvent::Fired { chamber_index });
        } else {
            trace!(chamber_index, "Dry fire");
            self.events.push(MechanismEvent::DryFire { chamber_index });
        }
    }

    // ------------------------------------------------------------------
    // Cylinder
    // ------------------------------------------------------------------

    /// Turn the cylinder by `delta` degrees.
    ///
    /// Returns false without moving when the ejector rod is down or `delta`
    /// is not a finite angle.
    pub fn try_rotate(&mut self, delta: f32) -> bool {
        if self.ejector_rod_down {
            debug!(delta, "Cylinder rotation blocked by ejector rod");
            return false;
        }
        if !delta.is_finite() {
            debug!(delta, "Cylinder rotation rejected");
            return false;
        }

        if self.cylinder.rotate(delta) {
            self.events.push(MechanismEvent::CylinderClick {
                firing_chamber_index: self.cylinder.firing_index(),
            });
        }
        true
    }

    pub fn release_cylinder(&mut self) {
        self.cylinder.snap_to_detent();
    }

    // ------------------------------------------------------------------
    // Loading gate / ejector rod
    // ------------------------------------------------------------------

    /// Push the ejector rod. Any case in the loading chamber is removed and
    /// handed to the caller.
    pub fn ejector_rod_down_event(&mut self) -> Option<Cartridge> {
        self.ejector_rod_down = true;

        let chamber_index = self.cylinder.loading_index();
        let ejected = self.cylinder.loading_chamber_mut().take()?;

        debug!(chamber_index, spent = ejected.is_spent, "Cartridge ejected");
        self.events.push(MechanismEvent::Ejected {
            chamber_index,
            spent: ejected.is_spent,
        });
        Some(ejected)
    }

    pub fn ejector_rod_up_event(&mut self) {
        self.ejector_rod_down = false;
    }

    /// Push a round into the loading chamber.
    /// An occupied chamber refuses it and the cartridge comes back.
    pub fn load_cartridge(&mut self, cartridge: Cartridge) -> Result<(), Cartridge> {
        let chamber_index = self.cylinder.loading_index();
        self.cylinder.loading_chamber_mut().insert(cartridge)?;

        trace!(chamber_index, "Cartridge loaded");
        self.events.push(MechanismEvent::Loaded { chamber_index });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn firing_chamber_index(&self) -> usize {
        self.cylinder.firing_index()
    }

    pub fn loading_chamber_index(&self) -> usize {
        self.cylinder.loading_index()
    }

    pub fn hammer_state(&self) -> HammerState {
        self.hammer.state()
    }

    pub fn hammer_distance(&self) -> f32 {
        self.hammer.distance()
    }

    pub fn set_hammer_distance(&mut self, distance: f32) {
        self.hammer.set_distance(distance);
    }

    pub fn cylinder_rotation(&self) -> f32 {
        self.cylinder.rotation()
    }

    pub fn set_cylinder_rotation(&mut self, degrees: f32) {
        self.cylinder.set_rotation(degrees);
    }

    pub fn chamber(&self, index: usize) -> Option<&Chamber> {
        self.cylinder.chamber(index)
    }

    pub fn is_trigger_down(&self) -> bool {
        self.trigger_down
    }

    pub fn is_ejector_rod_down(&self) -> bool {
        self.ejector_rod_down
    }

    /// Live rounds remaining in the cylinder
    pub fn live_rounds(&self) -> usize {
        self.cylinder.chambers().iter().filter(|c| c.is_live()).count()
    }

    /// Drain notifications in the order they occurred
    pub fn take_events(&mut self) -> Vec<MechanismEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn snapshot(&self) -> RevolverSnapshot {
        RevolverSnapshot {
            cylinder_rotation: self.cylinder.rotation(),
            firing_chamber_index: self.cylinder.firing_index(),
            loading_chamber_index: self.cylinder.loading_index(),
            hammer_distance: self.hammer.distance(),
            hammer_state: self.hammer.state(),
            trigger_down: self.trigger_down,
            ejector_rod_down: self.ejector_rod_down,
            chambers: self
                .cylinder
                .chambers()
                .iter()
                .map(ChamberSnapshot::from)
                .collect(),
        }
    }
}
