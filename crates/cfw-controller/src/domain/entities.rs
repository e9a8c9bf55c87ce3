//! # Core Domain Entities
//!
//! Main business entities of the controller: the account template, asset
//! identifiers, call descriptors, and the handles/receipts returned to callers.

use crate::domain::services::keccak256;
use crate::domain::value_objects::{AccountIndex, Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ACCOUNT TEMPLATE
// =============================================================================

/// Creation code of the minimal owner-gated wallet every sub-account runs.
///
/// Only its hash participates in address derivation, so any stable byte string
/// identifies the template.
pub const DEFAULT_WALLET_INIT_CODE: &[u8] = &[
    0x60, 0x80, 0x60, 0x40, 0x52, 0x33, 0x60, 0x00, 0x55, 0x61, 0x01, 0x00, 0x80, 0x61, 0x00,
    0x1b, 0x60, 0x00, 0x39, 0x60, 0x00, 0xf3, 0xfe, 0x63, 0x77, 0x61, 0x6c, 0x6c, 0x65, 0x74,
];

/// The account template used for every sub-account of a controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTemplate {
    init_code: Bytes,
    code_hash: Hash,
}

impl AccountTemplate {
    /// Creates a template from its creation code.
    #[must_use]
    pub fn new(init_code: impl Into<Bytes>) -> Self {
        let init_code = init_code.into();
        let code_hash = keccak256(init_code.as_slice());
        Self {
            init_code,
            code_hash,
        }
    }

    /// Creation code submitted to CREATE2.
    #[must_use]
    pub fn init_code(&self) -> &Bytes {
        &self.init_code
    }

    /// `keccak256(init_code)`, the template hash used in derivation.
    #[must_use]
    pub const fn code_hash(&self) -> Hash {
        self.code_hash
    }
}

impl Default for AccountTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_WALLET_INIT_CODE)
    }
}

// =============================================================================
// ASSETS
// =============================================================================

/// Identifies an asset a sub-account can hold.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetId {
    /// The environment's native currency.
    Native,
    /// A fungible token contract (ERC-20 style ledger).
    Fungible(Address),
    /// A single token of a non-fungible collection (ERC-721 style ledger).
    NonFungible {
        /// Collection contract.
        collection: Address,
        /// Token within the collection.
        token_id: U256,
    },
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Fungible(token) => write!(f, "token {token}"),
            Self::NonFungible {
                collection,
                token_id,
            } => write!(f, "nft {collection}#{token_id}"),
        }
    }
}

/// Amount argument of `transfer_asset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferAmount {
    /// Exactly this much; fails if the account holds less.
    Exact(U256),
    /// Whatever the account holds at execution time.
    All,
}

/// One asset movement out of a sub-account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransfer {
    /// Asset moved.
    pub asset: AssetId,
    /// Amount moved (zero for a no-op sweep step).
    pub amount: U256,
    /// Receiving address.
    pub recipient: Address,
}

// =============================================================================
// CALL DESCRIPTOR
// =============================================================================

/// A single call to be issued by a sub-account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDescriptor {
    /// Called address.
    pub target: Address,
    /// Native value forwarded with the call.
    pub value: U256,
    /// Opaque calldata.
    pub payload: Bytes,
}

impl CallDescriptor {
    /// Creates a call descriptor.
    #[must_use]
    pub fn new(target: Address, value: U256, payload: impl Into<Bytes>) -> Self {
        Self {
            target,
            value,
            payload: payload.into(),
        }
    }

    /// A call forwarding no value.
    #[must_use]
    pub fn call(target: Address, payload: impl Into<Bytes>) -> Self {
        Self::new(target, U256::zero(), payload)
    }

    /// A plain native transfer with empty calldata.
    #[must_use]
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self::new(to, value, Bytes::new())
    }
}

// =============================================================================
// SLOTS & HANDLES
// =============================================================================

/// Handle to a deployed sub-account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHandle {
    /// Slot index.
    pub index: AccountIndex,
    /// Deployed (and derived) address.
    pub address: Address,
    /// Controller identity that owns the account.
    pub controller: Address,
}

/// Bookkeeping view of one index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAccountSlot {
    /// Slot index.
    pub index: AccountIndex,
    /// Derived address (valid whether or not deployed).
    pub address: Address,
    /// Whether the account has been materialized.
    pub deployed: bool,
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of `deploy_and_execute`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Account the batch ran through.
    pub account: AccountHandle,
    /// True if this request materialized the account.
    pub deployed_now: bool,
    /// Return data of each call, in batch order.
    pub results: Vec<Bytes>,
}

/// Result of `sweep`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReceipt {
    /// Swept slot.
    pub index: AccountIndex,
    /// Sub-account address.
    pub account: Address,
    /// Receiving address.
    pub recipient: Address,
    /// True if this request materialized the account.
    pub deployed_now: bool,
    /// One entry per swept asset, in request order.
    pub transfers: Vec<AssetTransfer>,
}

impl SweepReceipt {
    /// Total amount moved for `asset` across all entries.
    #[must_use]
    pub fn total_for(&self, asset: &AssetId) -> U256 {
        self.transfers
            .iter()
            .filter(|transfer| &transfer.asset == asset)
            .fold(U256::zero(), |acc, transfer| acc.saturating_add(transfer.amount))
    }

    /// Entries that actually moved something.
    pub fn non_empty(&self) -> impl Iterator<Item = &AssetTransfer> {
        self.transfers.iter().filter(|t| !t.amount.is_zero())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_hash_tracks_code() {
        let a = AccountTemplate::new(vec![0x00]);
        let b = AccountTemplate::new(vec![0x01]);
        assert_ne!(a.code_hash(), b.code_hash());
        assert_eq!(a.code_hash(), keccak256(&[0x00]));
        assert_eq!(AccountTemplate::default(), AccountTemplate::default());
    }

    #[test]
    fn test_receipt_totals_duplicates() {
        let token = AssetId::Fungible(Address::new([1u8; 20]));
        let recipient = Address::new([2u8; 20]);
        let receipt = SweepReceipt {
            index: AccountIndex::from(1),
            account: Address::new([3u8; 20]),
            recipient,
            deployed_now: false,
            transfers: vec![
                AssetTransfer {
                    asset: token.clone(),
                    amount: U256::from(5),
                    recipient,
                },
                AssetTransfer {
                    asset: token.clone(),
                    amount: U256::zero(),
                    recipient,
                },
            ],
        };
        assert_eq!(receipt.total_for(&token), U256::from(5));
        assert_eq!(receipt.total_for(&AssetId::Native), U256::zero());
        assert_eq!(receipt.non_empty().count(), 1);
    }
}
