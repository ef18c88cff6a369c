//! Read-only view of a mechanism for transmission

use serde::{Deserialize, Serialize};

use super::chamber::Chamber;
use super::hammer::HammerState;

/// Contents of one chamber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberSnapshot {
    pub loaded: bool,
    pub spent: bool,
}

impl From<&Chamber> for ChamberSnapshot {
    fn from(chamber: &Chamber) -> Self {
        Self {
            loaded: chamber.has_cartridge(),
            spent: chamber.cartridge().is_some_and(|c| c.is_spent),
        }
    }
}

/// Full mechanism state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevolverSnapshot {
    /// Degrees, `[0, 360)`
    pub cylinder_rotation: f32,
    pub firing_chamber_index: usize,
    pub loading_chamber_index: usize,
    /// Travel, `[0, 1]`
    pub hammer_distance: f32,
    pub hammer_state: HammerState,
    pub trigger_down: bool,
    pub ejector_rod_down: bool,
    /// Indexed 0..5
    pub chambers: Vec<ChamberSnapshot>,
}
