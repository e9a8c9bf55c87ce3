//! # Error Types
//!
//! All error types for the controller, its sub-accounts and the execution
//! environment port.

use crate::domain::entities::AssetId;
use crate::domain::value_objects::{AccountIndex, Address, U256};
use thiserror::Error;

// =============================================================================
// CONTROLLER ERRORS
// =============================================================================

/// Errors surfaced by the controller's entry points.
///
/// Every variant is scoped to the request that produced it. Registry and
/// ownership state is left either fully applied or fully unapplied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Caller is not the registered owner.
    #[error("unauthorized: {caller:?} is not the owner")]
    Unauthorized { caller: Address },

    /// Owner may never be the zero address.
    #[error("invalid owner: the zero address cannot own the controller")]
    InvalidOwner,

    /// Sub-account materialization did not complete; the slot stays undeployed.
    #[error("deployment of index {index} failed: {reason}")]
    DeploymentFailed { index: AccountIndex, reason: String },

    /// A call inside a batch failed; the whole batch was discarded.
    #[error("call {batch_index} reverted: {reason}")]
    CallReverted {
        batch_index: usize,
        reason: CallFailure,
    },

    /// Request carries more calls or assets than configured.
    #[error("batch too large: {len} > {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// The execution environment failed outside any single call.
    #[error("environment error: {0}")]
    Environment(#[from] EnvError),

    /// Controller was constructed with an unusable configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// Returns true if resubmitting the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeploymentFailed { .. } | Self::Environment(_))
    }

    /// Zero-based position of the failing call, for `CallReverted`.
    #[must_use]
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Self::CallReverted { batch_index, .. } => Some(*batch_index),
            _ => None,
        }
    }

    /// Returns true if a batch call failed for lack of funds.
    #[must_use]
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(
            self,
            Self::CallReverted {
                reason: CallFailure::InsufficientBalance { .. },
                ..
            }
        )
    }
}

// =============================================================================
// CALL FAILURES
// =============================================================================

/// Why a single call issued by a sub-account failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The account cannot cover the requested transfer.
    #[error("insufficient balance of {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        required: U256,
        available: U256,
    },

    /// The account was invoked by someone other than its controller.
    #[error("unauthorized account caller: {caller:?}")]
    Unauthorized { caller: Address },

    /// The target reverted.
    #[error("revert: {0}")]
    Revert(String),

    /// The environment failed while executing the call.
    #[error("environment error: {0}")]
    Environment(#[from] EnvError),
}

impl From<AbiError> for CallFailure {
    fn from(err: AbiError) -> Self {
        CallFailure::Revert(err.to_string())
    }
}

// =============================================================================
// ENVIRONMENT ERRORS
// =============================================================================

/// Errors from the execution environment port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// Init code size exceeded limit (EIP-3860).
    #[error("init code size exceeded: {size} > {max} bytes")]
    InitCodeSizeExceeded { size: usize, max: usize },

    /// Contract already exists at the CREATE2 address.
    #[error("contract already exists at address: {0:?}")]
    ContractAlreadyExists(Address),

    /// The environment ran out of a resource needed to instantiate.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Checkpoint id does not refer to an open checkpoint.
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(usize),

    /// Address does not host the expected kind of contract.
    #[error("no {expected} contract at address: {address:?}")]
    WrongContract {
        address: Address,
        expected: &'static str,
    },
}

// =============================================================================
// ABI ERRORS
// =============================================================================

/// Errors decoding ledger calldata or return data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// Input shorter than the layout requires.
    #[error("abi data too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Selector is not one of the supported ledger calls.
    #[error("unknown selector: 0x{}", hex::encode(.0))]
    UnknownSelector([u8; 4]),

    /// Address word has non-zero padding.
    #[error("address word has non-zero padding")]
    DirtyAddress,
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A limit that must be positive was set to zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidVar { var: &'static str, value: String },
}

// =============================================================================
// TELEMETRY ERRORS
// =============================================================================

/// Logging initialization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The log filter directive does not parse.
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}

// =============================================================================
// TESTS
// =============================================================================
