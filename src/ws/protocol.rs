//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::revolver::{ActionKind, MechanismEvent, RevolverSnapshot};

/// Messages sent from client to server.
///
/// Each variant is one discrete input edge. Latch updates (`trigger_down`,
/// `trigger_up`, `ejector_rod_*`) are applied in arrival order, so a client
/// sending `trigger_down` then `release_hammer` gets the held-trigger release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    TriggerDown,
    TriggerUp,

    /// Thumb the hammer back by `delta` (clamped to 0..1)
    PullHammer { delta: f32 },
    ReleaseHammer,

    /// Turn the cylinder by `delta` degrees
    RotateCylinder { delta: f32 },
    ReleaseCylinder,

    EjectorRodDown,
    EjectorRodUp,

    /// Push a fresh round into the loading chamber
    LoadCartridge,

    /// Queue a multi-tick action
    StartAction { action: ActionKind },
    /// Stop the running action and clear the queue
    CancelActions,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Close the session
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        server_time: u64,
    },

    /// Mechanism state (sent at regular intervals, or at once after events)
    Snapshot {
        /// Session tick number
        tick: u64,
        state: RevolverSnapshot,
        /// Events since last snapshot, in order
        events: Vec<MechanismEvent>,
    },

    /// Cylinder rotation refused by the ejector rod interlock
    RotationBlocked { delta: f32 },

    /// Loading chamber already occupied
    LoadRejected { chamber_index: usize },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Session has ended
    Closed,
}
