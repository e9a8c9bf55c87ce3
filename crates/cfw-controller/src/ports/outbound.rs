//! # Driven Ports (SPI - Outbound)
//!
//! The execution environment the controller and its sub-accounts run in.
//! Adapters implement this trait to provide:
//! - CREATE2 instantiation at the address `derive_account_address` predicts
//! - Calls issued from an address (value + calldata)
//! - Nested checkpoints for atomic multi-step execution
//!
//! The controller serializes its own mutating requests, so implementations
//! only need each method to be atomic on its own.

use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::errors::{CallFailure, EnvError};
use async_trait::async_trait;

/// Opaque handle returned by `checkpoint`.
pub type CheckpointId = usize;

/// Interface to the environment hosting sub-accounts and asset ledgers.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Hash of the creation code the contract at `address` was instantiated
    /// from.
    ///
    /// # Returns
    ///
    /// * `Some(Hash)` - A contract lives at `address`
    /// * `None` - Nothing has been deployed there (it may still hold funds)
    async fn creation_code_hash(&self, address: Address) -> Result<Option<Hash>, EnvError>;

    /// Instantiate `init_code` with CREATE2 on behalf of `deployer`.
    ///
    /// Must place the contract at
    /// `keccak256(0xff ++ deployer ++ salt ++ keccak256(init_code))[12..]` and
    /// keep any balance already held there. On error nothing is instantiated.
    async fn create2(
        &self,
        deployer: Address,
        salt: Hash,
        init_code: &Bytes,
    ) -> Result<Address, EnvError>;

    /// Issue a call from `caller` to `target`, forwarding `value`.
    ///
    /// A failed call leaves no effect, including the value transfer.
    async fn call(
        &self,
        caller: Address,
        target: Address,
        value: U256,
        payload: &Bytes,
    ) -> Result<Bytes, CallFailure>;

    /// Native currency balance of `address`.
    async fn native_balance(&self, address: Address) -> Result<U256, EnvError>;

    /// Open a checkpoint. Checkpoints nest.
    async fn checkpoint(&self) -> Result<CheckpointId, EnvError>;

    /// Discard every effect since `checkpoint` and close it (and any
    /// checkpoints opened after it).
    async fn revert_to(&self, checkpoint: CheckpointId) -> Result<(), EnvError>;

    /// Keep every effect since `checkpoint` and close it (and any checkpoints
    /// opened after it).
    async fn release(&self, checkpoint: CheckpointId) -> Result<(), EnvError>;

    /// Returns true if a contract lives at `address`.
    async fn is_deployed(&self, address: Address) -> Result<bool, EnvError> {
        Ok(self.creation_code_hash(address).await?.is_some())
    }
}
