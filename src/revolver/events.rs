//! Notifications emitted by the mechanism for sound and animation

use serde::{Deserialize, Serialize};

use super::hammer::HammerState;

/// Something the presentation layer may want to render.
/// The mechanism only records these; it never plays anything itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MechanismEvent {
    /// Hammer crossed into a new cocking state while being pulled
    HammerStateChanged { state: HammerState },

    /// Trigger pressed; carries the hammer state it found
    TriggerPulled { hammer_state: HammerState },

    /// Cylinder rotated across a chamber boundary
    CylinderClick { firing_chamber_index: usize },

    /// A live round went off
    Fired { chamber_index: usize },

    /// Hammer fell on an empty chamber or a spent case
    DryFire { chamber_index: usize },

    /// Ejector rod pushed a case out of the loading chamber
    Ejected { chamber_index: usize, spent: bool },

    /// A fresh round was pushed into the loading chamber
    Loaded { chamber_index: usize },
}
