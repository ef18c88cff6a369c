//! Cylinder rotation and chamber indexing

use super::chamber::Chamber;

/// Number of chambers in the cylinder
pub const CHAMBER_COUNT: usize = 6;

/// Degrees of rotation between adjacent chambers
pub const CHAMBER_ARC: f32 = 360.0 / CHAMBER_COUNT as f32;

/// Rotating cylinder holding six chambers.
///
/// Only the rotation angle is stored. Which chamber sits under the hammer and
/// which one faces the loading gate are computed from it on every read.
#[derive(Debug, Clone, Default)]
pub struct Cylinder {
    rotation: f32,
    chambers: [Chamber; CHAMBER_COUNT],
}

impl Cylinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation in degrees, always in `[0, 360)`
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Store `degrees` reduced modulo 360
    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation = wrap_degrees(degrees);
    }

    /// Rotate by `delta` degrees. Returns true if the firing chamber changed.
    pub fn rotate(&mut self, delta: f32) -> bool {
        let previous = self.firing_index();
        self.set_rotation(self.rotation + delta);
        previous != self.firing_index()
    }

    /// Settle into the centre of the current chamber's arc
    pub fn snap_to_detent(&mut self) {
        let detent = (self.rotation / CHAMBER_ARC).floor() * CHAMBER_ARC + CHAMBER_ARC / 2.0;
        self.set_rotation(detent);
    }

    pub fn firing_index(&self) -> usize {
        firing_index_for(self.rotation)
    }

    pub fn loading_index(&self) -> usize {
        (self.firing_index() + 1) % CHAMBER_COUNT
    }

    pub fn chamber(&self, index: usize) -> Option<&Chamber> {
        self.chambers.get(index)
    }

    pub(crate) fn chamber_mut(&mut self, index: usize) -> Option<&mut Chamber> {
        self.chambers.get_mut(index)
    }

    pub fn chambers(&self) -> &[Chamber; CHAMBER_COUNT] {
        &self.chambers
    }

    pub(crate) fn firing_chamber_mut(&mut self) -> &mut Chamber {
        let index = self.firing_index();
        &mut self.chambers[index]
    }

    pub(crate) fn loading_chamber_mut(&mut self) -> &mut Chamber {
        let index = self.loading_index();
        &mut self.chambers[index]
    }
}

/// Reduce an angle into `[0, 360)`.
///
/// `rem_euclid` can round up to exactly 360.0 for tiny negative inputs, so
/// that case folds back to zero.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 || !wrapped.is_finite() {
        0.0
    } else {
        wrapped
    }
}

/// Chamber under the hammer for a given (already wrapped) rotation
pub fn firing_index_for(rotation: f32) -> usize {
    ((rotation / CHAMBER_ARC).floor() as usize) % CHAMBER_COUNT
}
