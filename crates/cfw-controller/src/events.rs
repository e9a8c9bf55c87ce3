//! # Controller Events
//!
//! Records appended by committed requests. A failed request appends nothing,
//! so the log only ever describes state that actually exists.

use crate::domain::value_objects::{AccountIndex, Address};
use serde::{Deserialize, Serialize};

/// Event topics.
pub mod topics {
    /// A sub-account was materialized.
    pub const ACCOUNT_DEPLOYED: &str = "cfw.account.deployed";
    /// A batch ran through a sub-account.
    pub const BATCH_EXECUTED: &str = "cfw.batch.executed";
    /// Assets were swept out of a sub-account.
    pub const SWEPT: &str = "cfw.account.swept";
    /// The controller changed hands.
    pub const OWNERSHIP_TRANSFERRED: &str = "cfw.ownership.transferred";
}

/// An event emitted by the controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A sub-account was materialized at its derived address.
    AccountDeployed {
        index: AccountIndex,
        account: Address,
    },
    /// A batch of calls ran through a sub-account.
    BatchExecuted {
        index: AccountIndex,
        account: Address,
        calls: usize,
    },
    /// A sweep completed.
    Swept {
        index: AccountIndex,
        account: Address,
        recipient: Address,
        transfers: usize,
    },
    /// Ownership moved to a new owner.
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl ControllerEvent {
    /// Topic string of this event.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::AccountDeployed { .. } => topics::ACCOUNT_DEPLOYED,
            Self::BatchExecuted { .. } => topics::BATCH_EXECUTED,
            Self::Swept { .. } => topics::SWEPT,
            Self::OwnershipTransferred { .. } => topics::OWNERSHIP_TRANSFERRED,
        }
    }
}
