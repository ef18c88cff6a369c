//! Single-action revolver mechanism

pub mod action;
pub mod chamber;
pub mod cylinder;
pub mod events;
pub mod hammer;
pub mod mechanism;
pub mod snapshot;

pub use action::{ActionKind, ActionScheduler, ActionStatus, MechanicalAction, MAX_QUEUED_ACTIONS};
pub use chamber::{Cartridge, Chamber};
pub use cylinder::{Cylinder, CHAMBER_ARC, CHAMBER_COUNT};
pub use events::MechanismEvent;
pub use hammer::{Hammer, HammerState};
pub use mechanism::Revolver;
pub use snapshot::{ChamberSnapshot, RevolverSnapshot};
