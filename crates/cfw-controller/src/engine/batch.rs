//! # Batch Executor
//!
//! Runs an ordered list of operations through one sub-account, all or
//! nothing. Each batch opens its own environment checkpoint; the first
//! failure reverts to it and reports the zero-based position of the failing
//! operation.

use crate::domain::entities::{AssetId, AssetTransfer, CallDescriptor, TransferAmount};
use crate::domain::value_objects::{Address, Bytes};
use crate::engine::account::SubAccount;
use crate::errors::{CallFailure, ControllerError};
use crate::ports::outbound::ExecutionEnvironment;
use tracing::{debug, error, warn};

/// One step of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AccountOp {
    Execute(CallDescriptor),
    Transfer {
        asset: AssetId,
        amount: TransferAmount,
        recipient: Address,
    },
}

/// What a successful step produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum OpOutcome {
    Returned(Bytes),
    Transferred(AssetTransfer),
}

/// Atomic executor over an execution environment.
pub struct BatchExecutor<'a, E: ExecutionEnvironment + ?Sized> {
    env: &'a E,
}

impl<'a, E: ExecutionEnvironment + ?Sized> BatchExecutor<'a, E> {
    /// Creates an executor over `env`.
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Issues `calls` through `account` in order and returns each output.
    ///
    /// # Errors
    ///
    /// `CallReverted` naming the first failing call; no call's effect
    /// survives.
    pub async fn run_batch(
        &self,
        account: &SubAccount<'_, E>,
        caller: Address,
        calls: &[CallDescriptor],
    ) -> Result<Vec<Bytes>, ControllerError> {
        let ops: Vec<AccountOp> = calls.iter().cloned().map(AccountOp::Execute).collect();
        let outcomes = self.run_ops(account, caller, &ops).await?;
        Ok(outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                OpOutcome::Returned(output) => Some(output),
                OpOutcome::Transferred(_) => None,
            })
            .collect())
    }

    pub(crate) async fn run_ops(
        &self,
        account: &SubAccount<'_, E>,
        caller: Address,
        ops: &[AccountOp],
    ) -> Result<Vec<OpOutcome>, ControllerError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let checkpoint = self.env.checkpoint().await?;
        let mut outcomes = Vec::with_capacity(ops.len());

        for (batch_index, op) in ops.iter().enumerate() {
            match Self::run_op(account, caller, op).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(reason) => {
                    warn!(
                        account = %account.address(),
                        batch_index,
                        %reason,
                        "batch step failed, reverting"
                    );
                    if let Err(revert_err) = self.env.revert_to(checkpoint).await {
                        error!(error = %revert_err, "failed to revert batch checkpoint");
                        return Err(revert_err.into());
                    }
                    return Err(ControllerError::CallReverted {
                        batch_index,
                        reason,
                    });
                }
            }
        }

        self.env.release(checkpoint).await?;
        debug!(account = %account.address(), steps = ops.len(), "batch applied");
        Ok(outcomes)
    }

    async fn run_op(
        account: &SubAccount<'_, E>,
        caller: Address,
        op: &AccountOp,
    ) -> Result<OpOutcome, CallFailure> {
        match op {
            AccountOp::Execute(call) => account
                .execute_call(caller, call)
                .await
                .map(OpOutcome::Returned),
            AccountOp::Transfer {
                asset,
                amount,
                recipient,
            } => account
                .transfer_asset(caller, asset, *amount, *recipient)
                .await
                .map(OpOutcome::Transferred),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChain;
    use crate::domain::abi;
    use crate::domain::entities::AccountHandle;
    use crate::domain::value_objects::{AccountIndex, U256};

    const CONTROLLER: Address = Address([0xC0; 20]);
    const ALICE: Address = Address([0xA1; 20]);
    const BOB: Address = Address([0xB0; 20]);

    async fn account(chain: &InMemoryChain) -> SubAccount<'_, InMemoryChain> {
        let address = chain
            .create2(CONTROLLER, AccountIndex::from(1).salt(), &Bytes::from_slice(&[0x00]))
            .await
            .unwrap();
        SubAccount::new(
            AccountHandle {
                index: AccountIndex::from(1),
                address,
                controller: CONTROLLER,
            },
            chain,
        )
    }

    #[tokio::test]
    async fn test_all_calls_apply_in_order() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        chain.fund(account.address(), U256::from(10));

        let outputs = BatchExecutor::new(&chain)
            .run_batch(
                &account,
                CONTROLLER,
                &[
                    CallDescriptor::native_transfer(ALICE, U256::from(3)),
                    CallDescriptor::native_transfer(BOB, U256::from(7)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(chain.balance(ALICE), U256::from(3));
        assert_eq!(chain.balance(BOB), U256::from(7));
        assert_eq!(chain.open_checkpoints(), 0);
    }

    #[tokio::test]
    async fn test_failure_reverts_earlier_calls() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        let reverter = chain.deploy_reverter("boom");
        chain.fund(account.address(), U256::from(10));

        let err = BatchExecutor::new(&chain)
            .run_batch(
                &account,
                CONTROLLER,
                &[
                    CallDescriptor::native_transfer(ALICE, U256::from(3)),
                    CallDescriptor::call(reverter, Bytes::new()),
                    CallDescriptor::native_transfer(BOB, U256::from(1)),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControllerError::CallReverted {
                batch_index: 1,
                reason: CallFailure::Revert("boom".to_string()),
            }
        );
        assert_eq!(chain.balance(ALICE), U256::zero());
        assert_eq!(chain.balance(account.address()), U256::from(10));
        assert_eq!(chain.open_checkpoints(), 0);
    }

    #[tokio::test]
    async fn test_overdraft_reports_position() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        chain.fund(account.address(), U256::from(5));

        let err = BatchExecutor::new(&chain)
            .run_batch(
                &account,
                CONTROLLER,
                &[
                    CallDescriptor::native_transfer(ALICE, U256::from(2)),
                    CallDescriptor::native_transfer(ALICE, U256::from(2)),
                    CallDescriptor::native_transfer(ALICE, U256::from(2)),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.batch_index(), Some(2));
        assert!(err.is_insufficient_balance());
        assert_eq!(chain.balance(ALICE), U256::zero());
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        let outputs = BatchExecutor::new(&chain)
            .run_batch(&account, CONTROLLER, &[])
            .await
            .unwrap();
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_ops_read_live_balances() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        let token = chain.deploy_token();
        chain.mint(token, account.address(), U256::from(9)).unwrap();

        let transfer_all = AccountOp::Transfer {
            asset: AssetId::Fungible(token),
            amount: TransferAmount::All,
            recipient: ALICE,
        };
        let outcomes = BatchExecutor::new(&chain)
            .run_ops(&account, CONTROLLER, &[transfer_all.clone(), transfer_all])
            .await
            .unwrap();

        let amounts: Vec<U256> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                OpOutcome::Transferred(transfer) => Some(transfer.amount),
                OpOutcome::Returned(_) => None,
            })
            .collect();
        assert_eq!(amounts, vec![U256::from(9), U256::zero()]);
        assert_eq!(chain.token_balance(token, ALICE), U256::from(9));
    }

    #[tokio::test]
    async fn test_call_output_is_returned() {
        let chain = InMemoryChain::new();
        let account = account(&chain).await;
        let token = chain.deploy_token();
        chain.mint(token, account.address(), U256::from(12)).unwrap();

        let outputs = BatchExecutor::new(&chain)
            .run_batch(
                &account,
                CONTROLLER,
                &[CallDescriptor::call(token, abi::erc20_balance_of(account.address()))],
            )
            .await
            .unwrap();
        assert_eq!(abi::decode_u256(outputs[0].as_slice()).unwrap(), U256::from(12));
    }
}
