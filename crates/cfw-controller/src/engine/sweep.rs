//! # Sweep Orchestrator
//!
//! Moves the whole balance of each requested asset out of a sub-account,
//! deploying it first when needed. Balances are read when each step executes,
//! so a repeated asset only moves whatever is left.

use crate::domain::entities::{AccountTemplate, AssetId, SweepReceipt, TransferAmount};
use crate::domain::value_objects::{AccountIndex, Address};
use crate::engine::account::SubAccount;
use crate::engine::batch::{AccountOp, BatchExecutor, OpOutcome};
use crate::engine::registry::DeploymentRegistry;
use crate::errors::ControllerError;
use crate::ports::outbound::ExecutionEnvironment;
use tracing::debug;

/// Sweep planner and runner.
pub struct SweepOrchestrator<'a, E: ExecutionEnvironment + ?Sized> {
    env: &'a E,
    controller: Address,
    template: &'a AccountTemplate,
}

impl<'a, E: ExecutionEnvironment + ?Sized> SweepOrchestrator<'a, E> {
    /// Creates an orchestrator for sub-accounts of `controller`.
    pub fn new(env: &'a E, controller: Address, template: &'a AccountTemplate) -> Self {
        Self {
            env,
            controller,
            template,
        }
    }

    /// Steps a sweep of `assets` will run. An empty list sweeps native only.
    #[must_use]
    pub fn plan(assets: &[AssetId]) -> Vec<AssetId> {
        if assets.is_empty() {
            vec![AssetId::Native]
        } else {
            assets.to_vec()
        }
    }

    /// Sweeps `assets` out of `index` to `recipient`.
    ///
    /// # Errors
    ///
    /// * `DeploymentFailed` - the account could not be materialized
    /// * `CallReverted` - a ledger refused a transfer; nothing moved
    pub async fn sweep(
        &self,
        registry: &mut DeploymentRegistry,
        index: AccountIndex,
        recipient: Address,
        assets: &[AssetId],
    ) -> Result<SweepReceipt, ControllerError> {
        let (handle, deployed_now) = registry
            .ensure_deployed(self.env, self.controller, self.template, index)
            .await?;
        let account = SubAccount::new(handle, self.env);

        let ops: Vec<AccountOp> = Self::plan(assets)
            .into_iter()
            .map(|asset| AccountOp::Transfer {
                asset,
                amount: TransferAmount::All,
                recipient,
            })
            .collect();
        let outcomes = BatchExecutor::new(self.env)
            .run_ops(&account, self.controller, &ops)
            .await?;

        let transfers: Vec<_> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                OpOutcome::Transferred(transfer) => Some(transfer),
                OpOutcome::Returned(_) => None,
            })
            .collect();
        debug!(%index, steps = transfers.len(), "sweep steps applied");

        Ok(SweepReceipt {
            index,
            account: account.address(),
            recipient,
            deployed_now,
            transfers,
        })
    }
}
