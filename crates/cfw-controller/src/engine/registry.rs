//! # Deployment Registry
//!
//! Tracks which indices have been materialized and materializes the rest on
//! demand. Deployments made during a request stay pending until the request
//! settles, so a failed request leaves the registry as it found it.

use crate::domain::entities::{AccountHandle, AccountTemplate};
use crate::domain::services::derive_account_address;
use crate::domain::value_objects::{AccountIndex, Address};
use crate::errors::ControllerError;
use crate::ports::outbound::ExecutionEnvironment;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Deployed-slot bookkeeping for one controller.
#[derive(Debug, Default)]
pub struct DeploymentRegistry {
    deployed: BTreeMap<AccountIndex, Address>,
    pending: Vec<AccountIndex>,
}

impl DeploymentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `index` has been materialized.
    #[must_use]
    pub fn is_deployed(&self, index: AccountIndex) -> bool {
        self.deployed.contains_key(&index)
    }

    /// Number of materialized slots.
    #[must_use]
    pub fn deployed_count(&self) -> usize {
        self.deployed.len()
    }

    /// Materializes `index` unless it already is.
    ///
    /// Returns the account handle and whether this call deployed it. The
    /// account is always created at the derived address; a mismatch is a
    /// deployment failure.
    ///
    /// # Errors
    ///
    /// * `DeploymentFailed` - instantiation failed or the derived address is
    ///   occupied by a foreign contract
    /// * `Environment` - the environment could not be queried
    pub async fn ensure_deployed<E: ExecutionEnvironment + ?Sized>(
        &mut self,
        env: &E,
        controller: Address,
        template: &AccountTemplate,
        index: AccountIndex,
    ) -> Result<(AccountHandle, bool), ControllerError> {
        let address = derive_account_address(controller, template.code_hash(), index);
        let handle = AccountHandle {
            index,
            address,
            controller,
        };

        if self.is_deployed(index) {
            return Ok((handle, false));
        }

        match env.creation_code_hash(address).await? {
            Some(hash) if hash == template.code_hash() => {
                debug!(%index, %address, "adopting existing sub-account");
                self.deployed.insert(index, address);
                return Ok((handle, false));
            }
            Some(_) => {
                return Err(ControllerError::DeploymentFailed {
                    index,
                    reason: format!("derived address {address:?} holds a foreign contract"),
                });
            }
            None => {}
        }

        let created = env
            .create2(controller, index.salt(), template.init_code())
            .await
            .map_err(|err| {
                warn!(%index, error = %err, "sub-account instantiation failed");
                ControllerError::DeploymentFailed {
                    index,
                    reason: err.to_string(),
                }
            })?;
        if created != address {
            return Err(ControllerError::DeploymentFailed {
                index,
                reason: format!("instantiated at {created:?}, expected {address:?}"),
            });
        }

        self.deployed.insert(index, address);
        self.pending.push(index);
        info!(%index, %address, "sub-account deployed");
        Ok((handle, true))
    }

    /// Keeps every deployment made since the last settle.
    pub fn commit(&mut self) {
        self.pending.clear();
    }

    /// Forgets every deployment made since the last settle.
    pub fn rollback(&mut self) {
        for index in self.pending.drain(..) {
            self.deployed.remove(&index);
        }
    }
}
