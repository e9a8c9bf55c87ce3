//! # Driving Ports (API - Inbound)
//!
//! The caller-facing surface of the controller.
//!
//! | Operation | Gate |
//! |-----------|------|
//! | `derive_address` | public, no side effect |
//! | `slot` | public, no side effect |
//! | `deploy` | owner only |
//! | `deploy_and_execute` | owner only |
//! | `sweep` | owner only |
//! | `transfer_ownership` | owner only |

use crate::domain::entities::{
    AccountHandle, AssetId, BatchOutcome, CallDescriptor, SubAccountSlot, SweepReceipt,
};
use crate::domain::value_objects::{AccountIndex, Address};
use crate::errors::ControllerError;
use async_trait::async_trait;

/// Primary API of a counterfactual wallet controller.
///
/// ## Usage
///
/// ```ignore
/// let address = api.derive_address(AccountIndex::from(2));
/// // ... fund `address` off-chain ...
/// let receipt = api.sweep(owner, AccountIndex::from(2), treasury, &[AssetId::Fungible(token)]).await?;
/// ```
#[async_trait]
pub trait CounterfactualWalletApi: Send + Sync {
    /// Deterministic address of sub-account `index`, deployed or not.
    fn derive_address(&self, index: AccountIndex) -> Address;

    /// Current owner.
    async fn owner(&self) -> Address;

    /// Derived address and deployed flag of `index`.
    async fn slot(&self, index: AccountIndex) -> SubAccountSlot;

    /// Materialize sub-account `index` if it does not exist yet.
    async fn deploy(
        &self,
        caller: Address,
        index: AccountIndex,
    ) -> Result<AccountHandle, ControllerError>;

    /// Materialize `index` if needed and run `calls` through it atomically.
    async fn deploy_and_execute(
        &self,
        caller: Address,
        index: AccountIndex,
        calls: &[CallDescriptor],
    ) -> Result<BatchOutcome, ControllerError>;

    /// Materialize `index` if needed and move the full balance of each asset
    /// to `recipient`.
    async fn sweep(
        &self,
        caller: Address,
        index: AccountIndex,
        recipient: Address,
        assets: &[AssetId],
    ) -> Result<SweepReceipt, ControllerError>;

    /// Replace the owner.
    async fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), ControllerError>;
}
