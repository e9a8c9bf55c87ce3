//! # CFW Controller - Counterfactual Sub-Account Wallets
//!
//! ## Purpose
//!
//! A controller owns an unbounded family of sub-accounts, one per 256-bit
//! index. Each sub-account address is known before the account exists, so
//! funds can be sent to it ahead of time. The account is materialized only
//! when the owner first needs to act through it, then the owner can batch
//! arbitrary calls through it or sweep its balances out.
//!
//! ## Address Derivation
//!
//! ```text
//! address = keccak256(0xff ++ controller ++ be32(index) ++ keccak256(template))[12..]
//! ```
//!
//! The same `(controller, template, index)` always yields the same address,
//! before and after deployment.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | Deterministic addresses | `domain/services.rs` - `derive_account_address()` |
//! | Deployed at derived address | `engine/registry.rs` - `ensure_deployed()` |
//! | At most one deployment per index | `engine/registry.rs` - `ensure_deployed()` |
//! | Owner-only mutation | `engine/gate.rs` - `require_owner()` |
//! | Batch atomicity | `engine/batch.rs` - `run_ops()`, `service.rs` - `settle()` |
//! | Sub-accounts obey only their controller | `engine/account.rs` - `authorize()` |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Controller | `service.rs` | Serialized entry point |
//! | Access gate | `engine/gate.rs` | Owner check and ownership transfer |
//! | Registry | `engine/registry.rs` | Lazy, idempotent deployment |
//! | Sub-account | `engine/account.rs` | Calls and asset transfers |
//! | Batch executor | `engine/batch.rs` | All-or-nothing call lists |
//! | Sweep orchestrator | `engine/sweep.rs` | Move whole balances out |
//! | In-memory chain | `adapters/in_memory_chain.rs` | Test and demo environment |
//!
//! ## Usage Example
//!
//! ```ignore
//! use cfw_controller::prelude::*;
//!
//! let controller = create_test_controller(owner)?;
//! let deposit = controller.derive_address(AccountIndex::from(2));
//! // ... someone pays `deposit` ...
//! let receipt = controller
//!     .sweep(owner, AccountIndex::from(2), treasury, &[AssetId::Fungible(token)])
//!     .await?;
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ports;
pub mod service;
pub mod telemetry;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        AccountHandle, AccountTemplate, AssetId, AssetTransfer, BatchOutcome, CallDescriptor,
        SubAccountSlot, SweepReceipt, TransferAmount, DEFAULT_WALLET_INIT_CODE,
    };

    // Value objects
    pub use crate::domain::value_objects::{AccountIndex, Address, Bytes, Hash, U256};

    // Domain services
    pub use crate::domain::services::{
        compute_contract_address, compute_contract_address_create2, compute_create2_address,
        derive_account_address, keccak256,
    };

    // Ports
    pub use crate::ports::inbound::CounterfactualWalletApi;
    pub use crate::ports::outbound::{CheckpointId, ExecutionEnvironment};

    // Events
    pub use crate::events::{topics, ControllerEvent};

    // Errors
    pub use crate::errors::{
        AbiError, CallFailure, ConfigError, ControllerError, EnvError, TelemetryError,
    };

    // Configuration
    pub use crate::config::ControllerConfig;

    // Service
    pub use crate::service::{create_test_controller, ControllerStats, CounterfactualWalletController};

    // Adapters
    pub use crate::adapters::{ChainConfig, InMemoryChain};
}

// =============================================================================
// CRATE METADATA
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }

    #[test]
    fn test_prelude_exports() {
        let _ = Address::ZERO;
        let _ = AccountIndex::from(1);
        let _ = AccountTemplate::default();
        let _ = ControllerConfig::default();
        let _ = ControllerStats::default();
    }
}
