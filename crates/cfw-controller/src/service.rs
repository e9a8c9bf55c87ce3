//! # Counterfactual Wallet Controller
//!
//! The service that owns every sub-account. Mutating requests run one at a
//! time under the controller's state lock:
//!
//! 1. Gate the caller (exactly once, before any side effect)
//! 2. Check request limits
//! 3. Open an environment checkpoint
//! 4. Run the operation
//! 5. Settle: release and commit, or revert and roll back
//!
//! Address derivation is pure and never takes the lock.

use crate::adapters::InMemoryChain;
use crate::config::ControllerConfig;
use crate::domain::entities::{
    AccountHandle, AccountTemplate, AssetId, BatchOutcome, CallDescriptor, SubAccountSlot,
    SweepReceipt,
};
use crate::domain::services::{compute_contract_address, derive_account_address};
use crate::domain::value_objects::{AccountIndex, Address};
use crate::engine::{AccessGate, BatchExecutor, DeploymentRegistry, SubAccount, SweepOrchestrator};
use crate::errors::ControllerError;
use crate::events::ControllerEvent;
use crate::ports::inbound::CounterfactualWalletApi;
use crate::ports::outbound::{CheckpointId, ExecutionEnvironment};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Statistics for the controller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ControllerStats {
    /// Sub-accounts materialized.
    pub deployments: u64,
    /// Batches committed.
    pub batches_executed: u64,
    /// Calls inside committed batches.
    pub calls_executed: u64,
    /// Sweeps committed.
    pub sweeps: u64,
    /// Sweep steps that moved a non-zero amount.
    pub assets_swept: u64,
    /// Requests refused by the owner gate.
    pub rejected_requests: u64,
    /// Requests that passed the gate and then failed.
    pub failed_requests: u64,
}

/// State guarded by the request lock.
#[derive(Debug)]
struct ControllerState {
    gate: AccessGate,
    registry: DeploymentRegistry,
    events: Vec<ControllerEvent>,
}

/// The controller service.
pub struct CounterfactualWalletController<E: ExecutionEnvironment> {
    /// Request limits.
    config: ControllerConfig,
    /// The controller's own address, the namespace of every derived account.
    identity: Address,
    /// Template every sub-account is instantiated from.
    template: AccountTemplate,
    /// Execution environment adapter.
    env: Arc<E>,
    /// Request lock.
    state: Mutex<ControllerState>,
    /// Service statistics.
    stats: Arc<RwLock<ControllerStats>>,
}

impl<E: ExecutionEnvironment> CounterfactualWalletController<E> {
    /// Creates a controller living at `identity`, owned by `owner`.
    ///
    /// # Errors
    ///
    /// `InvalidOwner` for a zero owner, `Config` for an unusable config.
    pub fn new(
        identity: Address,
        owner: Address,
        template: AccountTemplate,
        env: Arc<E>,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let gate = AccessGate::new(owner)?;
        info!(%identity, %owner, template = %template.code_hash(), "controller created");
        Ok(Self {
            config,
            identity,
            template,
            env,
            state: Mutex::new(ControllerState {
                gate,
                registry: DeploymentRegistry::new(),
                events: Vec::new(),
            }),
            stats: Arc::new(RwLock::new(ControllerStats::default())),
        })
    }

    /// Creates the controller `deployer` instantiates with CREATE at
    /// `nonce`. The deployer becomes the owner.
    ///
    /// # Errors
    ///
    /// As [`Self::new`].
    pub fn deployed_by(
        deployer: Address,
        nonce: u64,
        template: AccountTemplate,
        env: Arc<E>,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        let identity = compute_contract_address(deployer, nonce);
        Self::new(identity, deployer, template, env, config)
    }

    /// Address of the controller.
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Template of every sub-account.
    pub fn template(&self) -> &AccountTemplate {
        &self.template
    }

    /// Execution environment.
    pub fn env(&self) -> &Arc<E> {
        &self.env
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ControllerStats {
        self.stats.read().await.clone()
    }

    /// Events of every committed request, oldest first.
    pub async fn events(&self) -> Vec<ControllerEvent> {
        self.state.lock().await.events.clone()
    }

    /// Deterministic address of sub-account `index`.
    pub fn derive_address(&self, index: AccountIndex) -> Address {
        derive_account_address(self.identity, self.template.code_hash(), index)
    }

    /// Current owner.
    pub async fn owner(&self) -> Address {
        self.state.lock().await.gate.owner()
    }

    /// Derived address and deployed flag of `index`.
    pub async fn slot(&self, index: AccountIndex) -> SubAccountSlot {
        let deployed = self.state.lock().await.registry.is_deployed(index);
        SubAccountSlot {
            index,
            address: self.derive_address(index),
            deployed,
        }
    }

    /// Materializes `index` if needed.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), index = %index, caller = %caller))]
    pub async fn deploy(
        &self,
        caller: Address,
        index: AccountIndex,
    ) -> Result<AccountHandle, ControllerError> {
        let mut state = self.state.lock().await;
        self.authorize(&state.gate, caller).await?;

        let checkpoint = self.open_checkpoint().await?;
        let result = state
            .registry
            .ensure_deployed(self.env.as_ref(), self.identity, &self.template, index)
            .await;
        let (handle, fresh) = self.settle(&mut state.registry, checkpoint, result).await?;

        if fresh {
            state.events.push(ControllerEvent::AccountDeployed {
                index,
                account: handle.address,
            });
            self.stats.write().await.deployments += 1;
        }
        Ok(handle)
    }

    /// Materializes `index` if needed and runs `calls` through it, all or
    /// nothing. A fresh deployment is rolled back with a failed batch.
    #[instrument(
        skip_all,
        fields(request_id = %Uuid::new_v4(), index = %index, caller = %caller, calls = calls.len())
    )]
    pub async fn deploy_and_execute(
        &self,
        caller: Address,
        index: AccountIndex,
        calls: &[CallDescriptor],
    ) -> Result<BatchOutcome, ControllerError> {
        let mut state = self.state.lock().await;
        self.authorize(&state.gate, caller).await?;
        self.check_limit(calls.len(), self.config.max_batch_calls).await?;

        let checkpoint = self.open_checkpoint().await?;
        let result = self.execute_batch(&mut state.registry, index, calls).await;
        let outcome = self.settle(&mut state.registry, checkpoint, result).await?;

        if outcome.deployed_now {
            state.events.push(ControllerEvent::AccountDeployed {
                index,
                account: outcome.account.address,
            });
        }
        state.events.push(ControllerEvent::BatchExecuted {
            index,
            account: outcome.account.address,
            calls: calls.len(),
        });

        {
            let mut stats = self.stats.write().await;
            if outcome.deployed_now {
                stats.deployments += 1;
            }
            stats.batches_executed += 1;
            stats.calls_executed += calls.len() as u64;
        }
        info!(account = %outcome.account.address, "batch executed");
        Ok(outcome)
    }

    /// Materializes `index` if needed and moves the full balance of each
    /// asset to `recipient`. An empty asset list sweeps native currency.
    #[instrument(
        skip_all,
        fields(request_id = %Uuid::new_v4(), index = %index, caller = %caller, recipient = %recipient)
    )]
    pub async fn sweep(
        &self,
        caller: Address,
        index: AccountIndex,
        recipient: Address,
        assets: &[AssetId],
    ) -> Result<SweepReceipt, ControllerError> {
        let mut state = self.state.lock().await;
        self.authorize(&state.gate, caller).await?;
        self.check_limit(assets.len(), self.config.max_sweep_assets).await?;

        let checkpoint = self.open_checkpoint().await?;
        let result = SweepOrchestrator::new(self.env.as_ref(), self.identity, &self.template)
            .sweep(&mut state.registry, index, recipient, assets)
            .await;
        let receipt = self.settle(&mut state.registry, checkpoint, result).await?;

        if receipt.deployed_now {
            state.events.push(ControllerEvent::AccountDeployed {
                index,
                account: receipt.account,
            });
        }
        state.events.push(ControllerEvent::Swept {
            index,
            account: receipt.account,
            recipient,
            transfers: receipt.transfers.len(),
        });

        let moved = receipt.non_empty().count();
        {
            let mut stats = self.stats.write().await;
            if receipt.deployed_now {
                stats.deployments += 1;
            }
            stats.sweeps += 1;
            stats.assets_swept += moved as u64;
        }
        info!(account = %receipt.account, moved, "sweep completed");
        Ok(receipt)
    }

    /// Replaces the owner.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), caller = %caller, new_owner = %new_owner))]
    pub async fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;

        // The gate checks the caller itself.
        match state.gate.transfer_ownership(caller, new_owner) {
            Ok(previous_owner) => {
                state.events.push(ControllerEvent::OwnershipTransferred {
                    previous_owner,
                    new_owner,
                });
                Ok(())
            }
            Err(err @ ControllerError::Unauthorized { .. }) => {
                self.reject(caller).await;
                Err(err)
            }
            Err(err) => {
                self.stats.write().await.failed_requests += 1;
                Err(err)
            }
        }
    }

    async fn authorize(&self, gate: &AccessGate, caller: Address) -> Result<(), ControllerError> {
        if let Err(err) = gate.require_owner(caller) {
            self.reject(caller).await;
            return Err(err);
        }
        Ok(())
    }

    async fn reject(&self, caller: Address) {
        warn!(%caller, "caller is not the owner");
        self.stats.write().await.rejected_requests += 1;
    }

    async fn check_limit(&self, len: usize, max: usize) -> Result<(), ControllerError> {
        if len > max {
            warn!(len, max, "request exceeds configured limit");
            self.stats.write().await.failed_requests += 1;
            return Err(ControllerError::BatchTooLarge { len, max });
        }
        Ok(())
    }

    async fn open_checkpoint(&self) -> Result<CheckpointId, ControllerError> {
        match self.env.checkpoint().await {
            Ok(checkpoint) => Ok(checkpoint),
            Err(err) => {
                self.stats.write().await.failed_requests += 1;
                Err(err.into())
            }
        }
    }

    async fn execute_batch(
        &self,
        registry: &mut DeploymentRegistry,
        index: AccountIndex,
        calls: &[CallDescriptor],
    ) -> Result<BatchOutcome, ControllerError> {
        let env = self.env.as_ref();
        let (handle, deployed_now) = registry
            .ensure_deployed(env, self.identity, &self.template, index)
            .await?;
        let account = SubAccount::new(handle, env);
        let results = BatchExecutor::new(env)
            .run_batch(&account, self.identity, calls)
            .await?;
        Ok(BatchOutcome {
            account: account.handle().clone(),
            deployed_now,
            results,
        })
    }

    async fn settle<T>(
        &self,
        registry: &mut DeploymentRegistry,
        checkpoint: CheckpointId,
        result: Result<T, ControllerError>,
    ) -> Result<T, ControllerError> {
        let result = match result {
            Ok(value) => match self.env.release(checkpoint).await {
                Ok(()) => {
                    registry.commit();
                    return Ok(value);
                }
                Err(err) => {
                    error!(error = %err, "failed to release request checkpoint");
                    self.revert_checkpoint(checkpoint).await;
                    Err(ControllerError::from(err))
                }
            },
            Err(err) => {
                self.revert_checkpoint(checkpoint).await;
                Err(err)
            }
        };
        registry.rollback();
        self.stats.write().await.failed_requests += 1;
        if let Err(err) = &result {
            warn!(error = %err, "request failed");
        }
        result
    }

    async fn revert_checkpoint(&self, checkpoint: CheckpointId) {
        if let Err(err) = self.env.revert_to(checkpoint).await {
            error!(error = %err, "failed to revert request checkpoint");
        }
    }
}

/// Builds a controller over a fresh [`InMemoryChain`] owned by `owner`.
///
/// # Errors
///
/// `InvalidOwner` for a zero owner.
pub fn create_test_controller(
    owner: Address,
) -> Result<CounterfactualWalletController<InMemoryChain>, ControllerError> {
    CounterfactualWalletController::deployed_by(
        owner,
        0,
        AccountTemplate::default(),
        Arc::new(InMemoryChain::new()),
        ControllerConfig::default(),
    )
}

#[async_trait]
impl<E: ExecutionEnvironment> CounterfactualWalletApi for CounterfactualWalletController<E> {
    fn derive_address(&self, index: AccountIndex) -> Address {
        Self::derive_address(self, index)
    }

    async fn owner(&self) -> Address {
        Self::owner(self).await
    }

    async fn slot(&self, index: AccountIndex) -> SubAccountSlot {
        Self::slot(self, index).await
    }

    async fn deploy(
        &self,
        caller: Address,
        index: AccountIndex,
    ) -> Result<AccountHandle, ControllerError> {
        Self::deploy(self, caller, index).await
    }

    async fn deploy_and_execute(
        &self,
        caller: Address,
        index: AccountIndex,
        calls: &[CallDescriptor],
    ) -> Result<BatchOutcome, ControllerError> {
        Self::deploy_and_execute(self, caller, index, calls).await
    }

    async fn sweep(
        &self,
        caller: Address,
        index: AccountIndex,
        recipient: Address,
        assets: &[AssetId],
    ) -> Result<SweepReceipt, ControllerError> {
        Self::sweep(self, caller, index, recipient, assets).await
    }

    async fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), ControllerError> {
        Self::transfer_ownership(self, caller, new_owner).await
    }
}
