//! Chambers and the cartridges they hold

use serde::{Deserialize, Serialize};

/// A single round of ammunition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cartridge {
    /// True once the primer has been struck
    pub is_spent: bool,
}

impl Cartridge {
    /// A fresh, unfired round
    pub fn new() -> Self {
        Self { is_spent: false }
    }
}

/// One bore of the cylinder.
///
/// The cartridge is the only stored state; `has_cartridge` is read from it so
/// the two can never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chamber {
    cartridge: Option<Cartridge>,
}

impl Chamber {
    pub fn empty() -> Self {
        Self { cartridge: None }
    }

    pub fn loaded(cartridge: Cartridge) -> Self {
        Self {
            cartridge: Some(cartridge),
        }
    }

    pub fn has_cartridge(&self) -> bool {
        self.cartridge.is_some()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// True when a cartridge is present and has not been fired
    pub fn is_live(&self) -> bool {
        self.cartridge.as_ref().is_some_and(|c| !c.is_spent)
    }

    /// Insert a cartridge, handing it back if the chamber is occupied
    pub fn insert(&mut self, cartridge: Cartridge) -> Result<(), Cartridge> {
        if self.cartridge.is_some() {
            return Err(cartridge);
        }
        self.cartridge = Some(cartridge);
        Ok(())
    }

    /// Remove and return whatever the chamber holds
    pub fn take(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    /// Strike the primer. Returns true only when a live round went off.
    pub(crate) fn discharge(&mut self) -> bool {
        match self.cartridge.as_mut() {
            Some(cartridge) if !cartridge.is_spent => {
                cartridge.is_spent = true;
                true
            }
            _ => false,
        }
    }
}
