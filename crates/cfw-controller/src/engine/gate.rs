//! # Access Gate
//!
//! Owner handling for the controller. Every mutating entry point checks the
//! caller here exactly once, before any side effect.

use crate::domain::value_objects::Address;
use crate::errors::ControllerError;
use tracing::info;

/// Single-owner authorization state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessGate {
    owner: Address,
}

impl AccessGate {
    /// Creates a gate owned by `owner`.
    ///
    /// # Errors
    ///
    /// `InvalidOwner` for the zero address.
    pub fn new(owner: Address) -> Result<Self, ControllerError> {
        if owner.is_zero() {
            return Err(ControllerError::InvalidOwner);
        }
        Ok(Self { owner })
    }

    /// Current owner.
    #[must_use]
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Rejects any caller other than the owner.
    ///
    /// # Errors
    ///
    /// `Unauthorized` carrying the rejected caller.
    pub fn require_owner(&self, caller: Address) -> Result<(), ControllerError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(ControllerError::Unauthorized { caller })
        }
    }

    /// Hands the controller to `new_owner` and returns the previous owner.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if `caller` is not the owner, `InvalidOwner` if
    /// `new_owner` is zero. The owner is unchanged on error.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<Address, ControllerError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(ControllerError::InvalidOwner);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        info!(%previous, %new_owner, "ownership transferred");
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = Address([1; 20]);
    const OTHER: Address = Address([2; 20]);

    #[test]
    fn test_zero_owner_rejected() {
        assert_eq!(AccessGate::new(Address::ZERO), Err(ControllerError::InvalidOwner));
    }

    #[test]
    fn test_only_owner_passes() {
        let gate = AccessGate::new(OWNER).unwrap();
        assert!(gate.require_owner(OWNER).is_ok());
        assert_eq!(
            gate.require_owner(OTHER),
            Err(ControllerError::Unauthorized { caller: OTHER })
        );
    }

    #[test]
    fn test_transfer_ownership() {
        let mut gate = AccessGate::new(OWNER).unwrap();
        assert_eq!(gate.transfer_ownership(OWNER, OTHER), Ok(OWNER));
        assert_eq!(gate.owner(), OTHER);

        // Old owner lost its rights.
        assert_eq!(
            gate.transfer_ownership(OWNER, OWNER),
            Err(ControllerError::Unauthorized { caller: OWNER })
        );
    }

    #[test]
    fn test_transfer_to_zero_keeps_owner() {
        let mut gate = AccessGate::new(OWNER).unwrap();
        assert_eq!(
            gate.transfer_ownership(OWNER, Address::ZERO),
            Err(ControllerError::InvalidOwner)
        );
        assert_eq!(gate.owner(), OWNER);
    }
}
