//! Hammer travel and cocking state

use serde::{Deserialize, Serialize};

/// Travel at which the half-cock notch catches the hammer
pub const HALFCOCK_DISTANCE: f32 = 0.5;

/// Travel above which the hammer is held at full cock
pub const COCKED_DISTANCE: f32 = 0.99;

/// Cocking state derived from hammer travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HammerState {
    /// Resting on the frame, `distance < 0.5`
    Uncocked,
    /// Caught in the half-cock notch, `0.5 <= distance <= 0.99`
    Halfcock,
    /// Held back by the sear, `distance > 0.99`
    Cocked,
}

impl HammerState {
    pub fn from_distance(distance: f32) -> Self {
        if distance < HALFCOCK_DISTANCE {
            HammerState::Uncocked
        } else if distance <= COCKED_DISTANCE {
            HammerState::Halfcock
        } else {
            HammerState::Cocked
        }
    }
}

/// Hammer with travel clamped to `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Hammer {
    distance: f32,
}

impl Hammer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Store `distance` clamped to `[0, 1]`. NaN is treated as rest.
    pub fn set_distance(&mut self, distance: f32) {
        self.distance = clamp01(distance);
    }

    pub fn state(&self) -> HammerState {
        HammerState::from_distance(self.distance)
    }

    /// Pull back by `delta` (itself clamped to `[0, 1]`).
    /// Returns the new state if the classification changed.
    pub fn pull(&mut self, delta: f32) -> Option<HammerState> {
        let previous = self.state();
        self.set_distance(self.distance + clamp01(delta));
        let current = self.state();
        (current != previous).then_some(current)
    }

    /// Let the hammer fall onto the nearest notch at or below its travel
    pub fn settle_in_notch(&mut self) {
        let notched = (self.distance / HALFCOCK_DISTANCE).floor() * HALFCOCK_DISTANCE;
        self.set_distance(notched);
    }

    /// Drop all the way to rest
    pub fn drop_to_rest(&mut self) {
        self.distance = 0.0;
    }
}

fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
