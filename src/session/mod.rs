//! Revolver sessions - one mechanism per connected client

pub mod registry;
pub mod runner;
pub mod snapshot;

pub use registry::{SessionError, SessionHandle, SessionRegistry};
pub use runner::RevolverSession;

use crate::ws::protocol::ClientMsg;

/// Client input received from WebSocket
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub msg: ClientMsg,
    pub received_at: u64,
}
