//! Session state and authoritative tick loop

use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::revolver::{
    ActionScheduler, Cartridge, MechanismEvent, Revolver, RevolverSnapshot, MAX_QUEUED_ACTIONS,
};
use crate::util::time::{snapshot_interval_ticks, tick_duration, unix_millis};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::registry::SessionHandle;
use super::snapshot::SnapshotBuilder;
use super::SessionInput;

/// A single revolver driven by one client
pub struct RevolverSession {
    id: Uuid,
    tick: u64,
    revolver: Revolver,
    scheduler: ActionScheduler,
    pending_events: Vec<MechanismEvent>,
    input_rx: mpsc::Receiver<SessionInput>,
    output_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    latest: Arc<RwLock<RevolverSnapshot>>,
}

impl RevolverSession {
    /// Create a new session with `starting_rounds` fresh rounds loaded
    pub fn new(id: Uuid, starting_rounds: usize) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (output_tx, _) = broadcast::channel(64);

        let revolver = Revolver::with_rounds(starting_rounds);
        let latest = Arc::new(RwLock::new(revolver.snapshot()));

        let handle = SessionHandle {
            id,
            input_tx,
            output_tx: output_tx.clone(),
            latest: latest.clone(),
            created_at: unix_millis(),
        };

        let session = Self {
            id,
            tick: 0,
            revolver,
            scheduler: ActionScheduler::new(),
            pending_events: Vec::new(),
            input_rx,
            output_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval_ticks()),
            latest,
        };

        (session, handle)
    }

    pub fn revolver(&self) -> &Revolver {
        &self.revolver
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run the authoritative tick loop until the client leaves
    pub async fn run(mut self) {
        info!(session_id = %self.id, "Session started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if self.process_inputs().is_break() {
                break;
            }

            self.run_tick();
        }

        self.scheduler.cancel_all(&mut self.revolver);
        let _ = self.output_tx.send(ServerMsg::Closed);
        info!(session_id = %self.id, ticks = self.tick, "Session ended");
    }

    /// Drain the input queue. Breaks when the client left or hung up.
    fn process_inputs(&mut self) -> ControlFlow<()> {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => {
                    trace!(
                        session_id = %self.id,
                        queued_ms = unix_millis().saturating_sub(input.received_at),
                        "Applying input"
                    );
                    if self.apply(input.msg).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return ControlFlow::Continue(()),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!(session_id = %self.id, "Input channel closed");
                    return ControlFlow::Break(());
                }
            }
        }
    }

    /// Apply one client message to the mechanism
    pub fn apply(&mut self, msg: ClientMsg) -> ControlFlow<()> {
        match msg {
            ClientMsg::TriggerDown => self.revolver.trigger_down_event(),
            ClientMsg::TriggerUp => self.revolver.trigger_up_event(),
            ClientMsg::PullHammer { delta } => self.revolver.pull_hammer(delta),
            ClientMsg::ReleaseHammer => self.revolver.release_hammer(),
            ClientMsg::RotateCylinder { delta } => {
                if !self.revolver.try_rotate(delta) {
                    let _ = self.output_tx.send(ServerMsg::RotationBlocked { delta });
                }
            }
            ClientMsg::ReleaseCylinder => self.revolver.release_cylinder(),
            ClientMsg::EjectorRodDown => {
                if let Some(cartridge) = self.revolver.ejector_rod_down_event() {
                    debug!(session_id = %self.id, spent = cartridge.is_spent, "Case ejected");
                }
            }
            ClientMsg::EjectorRodUp => self.revolver.ejector_rod_up_event(),
            ClientMsg::LoadCartridge => {
                if self.revolver.load_cartridge(Cartridge::new()).is_err() {
                    let _ = self.output_tx.send(ServerMsg::LoadRejected {
                        chamber_index: self.revolver.loading_chamber_index(),
                    });
                }
            }
            ClientMsg::StartAction { action } => match self.scheduler.enqueue(action.build()) {
                Ok(()) => debug!(session_id = %self.id, ?action, "Action queued"),
                Err(_) => {
                    debug!(session_id = %self.id, ?action, "Action queue full");
                    let _ = self.output_tx.send(ServerMsg::Error {
                        code: "action_queue_full".to_string(),
                        message: format!("At most {} actions may be pending", MAX_QUEUED_ACTIONS),
                    });
                }
            },
            ClientMsg::CancelActions => self.scheduler.cancel_all(&mut self.revolver),
            ClientMsg::Ping { t } => {
                let _ = self.output_tx.send(ServerMsg::Pong { t });
            }
            ClientMsg::Leave => {
                info!(session_id = %self.id, "Client left session");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Step running actions and publish a snapshot when due
    pub fn run_tick(&mut self) {
        self.tick += 1;
        self.scheduler.tick(&mut self.revolver);

        let events = self.revolver.take_events();
        if !events.is_empty() {
            self.pending_events.extend(events);
            self.snapshot_builder.force_next();
        }

        if self.snapshot_builder.should_send() {
            let events = std::mem::take(&mut self.pending_events);
            let snapshot = self.snapshot_builder.build(self.tick, &self.revolver, events);

            if let ServerMsg::Snapshot { state, .. } = &snapshot {
                *self.latest.write() = state.clone();
            }

            if self.output_tx.send(snapshot).is_err() {
                debug!(session_id = %self.id, tick = self.tick, "Snapshot had no receivers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revolver::{ActionKind, HammerState};

    fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn snapshot_events(msgs: &[ServerMsg]) -> Vec<MechanismEvent> {
        msgs.iter()
            .filter_map(|m| match m {
                ServerMsg::Snapshot { events, .. } => Some(events.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn latch_then_release_fires_in_same_tick() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let mut rx = handle.subscribe();

        for msg in [
            ClientMsg::TriggerDown,
            ClientMsg::PullHammer { delta: 1.0 },
            ClientMsg::ReleaseHammer,
        ] {
            assert!(session.apply(msg).is_continue());
        }
        session.run_tick();

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(snapshot_events(&msgs).contains(&MechanismEvent::Fired { chamber_index: 0 }));
        assert_eq!(handle.latest_snapshot().hammer_distance, 0.0);
        assert!(handle.latest_snapshot().chambers[0].spent);
    }

    #[test]
    fn quiet_ticks_follow_snapshot_interval() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 0);
        let mut rx = handle.subscribe();

        for _ in 0..snapshot_interval_ticks() * 2 {
            session.run_tick();
        }

        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn queued_inputs_apply_in_order_until_leave() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 6);

        tokio_test::block_on(async {
            handle.send(ClientMsg::PullHammer { delta: 0.6 }).await.unwrap();
            handle.send(ClientMsg::ReleaseHammer).await.unwrap();
            handle.send(ClientMsg::Leave).await.unwrap();
            handle.send(ClientMsg::PullHammer { delta: 1.0 }).await.unwrap();
        });

        assert!(session.process_inputs().is_break());
        assert_eq!(session.revolver.hammer_distance(), 0.5);
    }

    #[test]
    fn blocked_rotation_is_reported() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let mut rx = handle.subscribe();

        let _ = session.apply(ClientMsg::EjectorRodDown);
        let _ = session.apply(ClientMsg::RotateCylinder { delta: 30.0 });

        assert_eq!(session.revolver().cylinder_rotation(), 0.0);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMsg::RotationBlocked { delta: 30.0 }]
        );
    }

    #[test]
    fn load_into_occupied_chamber_is_rejected() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let mut rx = handle.subscribe();

        let _ = session.apply(ClientMsg::LoadCartridge);

        assert_eq!(
            drain(&mut rx),
            vec![ServerMsg::LoadRejected { chamber_index: 1 }]
        );
    }

    #[test]
    fn eject_then_reload() {
        let (mut session, _handle) = RevolverSession::new(Uuid::new_v4(), 6);

        let _ = session.apply(ClientMsg::EjectorRodDown);
        assert!(!session.revolver().chamber(1).unwrap().has_cartridge());
        let _ = session.apply(ClientMsg::LoadCartridge);
        assert!(session.revolver().chamber(1).unwrap().is_live());
        let _ = session.apply(ClientMsg::EjectorRodUp);
        assert!(!session.revolver().is_ejector_rod_down());
    }

    #[test]
    fn queued_action_steps_once_per_tick() {
        let (mut session, _handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let _ = session.apply(ClientMsg::StartAction {
            action: ActionKind::CockHammer { rate: 0.25 },
        });

        session.run_tick();
        assert_eq!(session.revolver().hammer_distance(), 0.25);
        session.run_tick();
        session.run_tick();
        session.run_tick();
        assert_eq!(session.revolver().hammer_state(), HammerState::Cocked);
        assert_eq!(session.tick(), 4);
    }

    #[test]
    fn action_flood_is_capped() {
        let (mut session, handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let mut rx = handle.subscribe();

        for _ in 0..MAX_QUEUED_ACTIONS + 4 {
            let _ = session.apply(ClientMsg::StartAction {
                action: ActionKind::SlipFire { rate: 0.01 },
            });
        }

        assert_eq!(session.scheduler.pending(), MAX_QUEUED_ACTIONS);
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 4);
        assert!(msgs.iter().all(|m| matches!(
            m,
            ServerMsg::Error { code, .. } if code == "action_queue_full"
        )));

        // Cancelling frees the queue
        let _ = session.apply(ClientMsg::CancelActions);
        let _ = session.apply(ClientMsg::StartAction {
            action: ActionKind::CockHammer { rate: 0.5 },
        });
        assert_eq!(session.scheduler.pending(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn overflowing_rotation_from_the_wire_changes_nothing() {
        let (mut session, _handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let _ = session.apply(ClientMsg::RotateCylinder { delta: 150.0 });
        session.revolver.take_events();

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"rotate_cylinder","delta":1e39}"#).unwrap();
        let _ = session.apply(msg);

        assert_eq!(session.revolver().cylinder_rotation(), 150.0);
        assert!(!session.revolver().has_pending_events());
    }

    #[test]
    fn leave_breaks_the_loop() {
        let (mut session, _handle) = RevolverSession::new(Uuid::new_v4(), 6);
        assert!(session.apply(ClientMsg::Leave).is_break());
    }

    #[tokio::test]
    async fn run_loop_publishes_and_closes() {
        let (session, handle) = RevolverSession::new(Uuid::new_v4(), 6);
        let mut rx = handle.subscribe();
        let task = tokio::spawn(session.run());

        handle.send(ClientMsg::PullHammer { delta: 1.0 }).await.unwrap();

        let mut saw_cocked = false;
        while let Ok(Ok(msg)) =
            tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await
        {
            if let ServerMsg::Snapshot { state, .. } = msg {
                if state.hammer_state == HammerState::Cocked {
                    saw_cocked = true;
                    break;
                }
            }
        }
        assert!(saw_cocked);

        handle.send(ClientMsg::Leave).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
