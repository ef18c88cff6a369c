//! Registry of live sessions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use uuid::Uuid;

use crate::revolver::RevolverSnapshot;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::runner::RevolverSession;
use super::SessionInput;

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<SessionInput>,
    pub output_tx: broadcast::Sender<ServerMsg>,
    pub latest: Arc<RwLock<RevolverSnapshot>>,
    pub created_at: u64,
}

impl SessionHandle {
    /// Queue a client message for the next tick
    pub async fn send(&self, msg: ClientMsg) -> Result<(), SessionError> {
        self.input_tx
            .send(SessionInput {
                msg,
                received_at: unix_millis(),
            })
            .await
            .map_err(|_| SessionError::Closed(self.id))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.output_tx.subscribe()
    }

    /// Most recently published mechanism state
    pub fn latest_snapshot(&self) -> RevolverSnapshot {
        self.latest.read().clone()
    }
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    /// Slots claimed by `open`, released by `remove`
    reserved: AtomicUsize,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            reserved: AtomicUsize::new(0),
            max_sessions,
        }
    }

    /// Create a session, register it and spawn its tick loop.
    ///
    /// The returned receiver is subscribed before the loop starts, so the
    /// caller sees the first snapshot.
    pub fn open(
        &self,
        starting_rounds: usize,
    ) -> Result<(SessionHandle, broadcast::Receiver<ServerMsg>), SessionError> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_sessions).then_some(n + 1)
            })
            .map_err(|_| SessionError::Full(self.max_sessions))?;

        let (session, handle) = RevolverSession::new(Uuid::new_v4(), starting_rounds);
        let output_rx = handle.subscribe();
        self.sessions.insert(handle.id, handle.clone());

        info!(
            session_id = %handle.id,
            active_sessions = self.sessions.len(),
            "Session registered"
        );

        tokio::spawn(session.run());
        Ok((handle, output_rx))
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(id)?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Some(handle)
    }

    pub fn is_full(&self) -> bool {
        self.reserved.load(Ordering::Acquire) >= self.max_sessions
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|s| *s.key()).collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session limit reached ({0})")]
    Full(usize),

    #[error("Session {0} is closed")]
    Closed(Uuid),

    #[error("Session {0} not found")]
    NotFound(Uuid),
}
