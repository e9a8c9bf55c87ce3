//! # Sub-Account
//!
//! The behavior every deployed sub-account runs: it accepts instructions only
//! from its controller and issues calls from its own address.

use crate::domain::abi;
use crate::domain::entities::{AccountHandle, AssetId, AssetTransfer, CallDescriptor, TransferAmount};
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::CallFailure;
use crate::ports::outbound::ExecutionEnvironment;
use tracing::debug;

/// A deployed sub-account bound to the environment it lives in.
pub struct SubAccount<'a, E: ExecutionEnvironment + ?Sized> {
    handle: AccountHandle,
    env: &'a E,
}

impl<'a, E: ExecutionEnvironment + ?Sized> SubAccount<'a, E> {
    /// Binds `handle` to `env`.
    pub fn new(handle: AccountHandle, env: &'a E) -> Self {
        Self { handle, env }
    }

    /// Handle of the account.
    pub fn handle(&self) -> &AccountHandle {
        &self.handle
    }

    /// Address of the account.
    pub fn address(&self) -> Address {
        self.handle.address
    }

    fn authorize(&self, caller: Address) -> Result<(), CallFailure> {
        if caller == self.handle.controller {
            Ok(())
        } else {
            Err(CallFailure::Unauthorized { caller })
        }
    }

    /// Issues `call` from the account and returns its output.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `caller` is the controller, otherwise whatever
    /// the target fails with.
    pub async fn execute_call(
        &self,
        caller: Address,
        call: &CallDescriptor,
    ) -> Result<Bytes, CallFailure> {
        self.authorize(caller)?;
        debug!(account = %self.address(), target = %call.target, value = %call.value, "issuing call");
        self.env
            .call(self.address(), call.target, call.value, &call.payload)
            .await
    }

    /// Balance the account holds of `asset`.
    ///
    /// A non-fungible token counts as 1 when the account owns it and 0
    /// otherwise, including when the collection does not know the token.
    ///
    /// # Errors
    ///
    /// Environment failures and malformed ledger responses.
    pub async fn balance_of(&self, asset: &AssetId) -> Result<U256, CallFailure> {
        let account = self.address();
        match asset {
            AssetId::Native => Ok(self.env.native_balance(account).await?),
            AssetId::Fungible(token) => {
                let output = self
                    .env
                    .call(account, *token, U256::zero(), &abi::erc20_balance_of(account))
                    .await?;
                Ok(abi::decode_u256(output.as_slice())?)
            }
            AssetId::NonFungible {
                collection,
                token_id,
            } => {
                let query = abi::erc721_owner_of(*token_id);
                match self.env.call(account, *collection, U256::zero(), &query).await {
                    Ok(output) => {
                        let owner = abi::decode_address(output.as_slice())?;
                        Ok(if owner == account { U256::one() } else { U256::zero() })
                    }
                    Err(CallFailure::Revert(_)) => Ok(U256::zero()),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Moves `amount` of `asset` to `recipient`.
    ///
    /// `TransferAmount::All` reads the balance at execution time; a zero
    /// amount succeeds without touching the ledger.
    ///
    /// # Errors
    ///
    /// * `Unauthorized` - `caller` is not the controller
    /// * `InsufficientBalance` - an exact amount exceeds the balance
    /// * `Revert` - the ledger refused the transfer
    pub async fn transfer_asset(
        &self,
        caller: Address,
        asset: &AssetId,
        amount: TransferAmount,
        recipient: Address,
    ) -> Result<AssetTransfer, CallFailure> {
        self.authorize(caller)?;
        let account = self.address();
        let available = self.balance_of(asset).await?;
        let amount = match amount {
            TransferAmount::Exact(required) if required > available => {
                return Err(CallFailure::InsufficientBalance {
                    asset: asset.clone(),
                    required,
                    available,
                });
            }
            TransferAmount::Exact(required) => required,
            TransferAmount::All => available,
        };

        if !amount.is_zero() {
            match asset {
                AssetId::Native => {
                    self.env.call(account, recipient, amount, &Bytes::new()).await?;
                }
                AssetId::Fungible(token) => {
                    let payload = abi::erc20_transfer(recipient, amount);
                    let output = self.env.call(account, *token, U256::zero(), &payload).await?;
                    if !abi::decode_optional_bool(output.as_slice())? {
                        return Err(CallFailure::Revert(
                            "token transfer returned false".to_string(),
                        ));
                    }
                }
                AssetId::NonFungible {
                    collection,
                    token_id,
                } => {
                    let payload = abi::erc721_transfer_from(account, recipient, *token_id);
                    self.env
                        .call(account, *collection, U256::zero(), &payload)
                        .await?;
                }
            }
        }

        Ok(AssetTransfer {
            asset: asset.clone(),
            amount,
            recipient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChain;
    use crate::domain::value_objects::AccountIndex;

    const CONTROLLER: Address = Address([0xC0; 20]);
    const RECIPIENT: Address = Address([0x0E; 20]);

    async fn deployed(chain: &InMemoryChain) -> AccountHandle {
        let address = chain
            .create2(CONTROLLER, AccountIndex::from(1).salt(), &Bytes::from_slice(&[0x00]))
            .await
            .unwrap();
        AccountHandle {
            index: AccountIndex::from(1),
            address,
            controller: CONTROLLER,
        }
    }

    #[tokio::test]
    async fn test_rejects_foreign_caller() {
        let chain = InMemoryChain::new();
        let account = SubAccount::new(deployed(&chain).await, &chain);
        let stranger = Address::new([9; 20]);

        let err = account
            .execute_call(stranger, &CallDescriptor::native_transfer(RECIPIENT, U256::zero()))
            .await
            .unwrap_err();
        assert_eq!(err, CallFailure::Unauthorized { caller: stranger });

        let err = account
            .transfer_asset(stranger, &AssetId::Native, TransferAmount::All, RECIPIENT)
            .await
            .unwrap_err();
        assert_eq!(err, CallFailure::Unauthorized { caller: stranger });
    }

    #[tokio::test]
    async fn test_transfer_all_native() {
        let chain = InMemoryChain::new();
        let handle = deployed(&chain).await;
        chain.fund(handle.address, U256::from(42));
        let account = SubAccount::new(handle, &chain);

        let moved = account
            .transfer_asset(CONTROLLER, &AssetId::Native, TransferAmount::All, RECIPIENT)
            .await
            .unwrap();
        assert_eq!(moved.amount, U256::from(42));
        assert_eq!(chain.balance(RECIPIENT), U256::from(42));
        assert_eq!(chain.balance(account.address()), U256::zero());
    }

    #[tokio::test]
    async fn test_exact_transfer_over_balance() {
        let chain = InMemoryChain::new();
        let token = chain.deploy_token();
        let handle = deployed(&chain).await;
        chain.mint(token, handle.address, U256::from(5)).unwrap();
        let account = SubAccount::new(handle, &chain);

        let asset = AssetId::Fungible(token);
        let err = account
            .transfer_asset(CONTROLLER, &asset, TransferAmount::Exact(U256::from(6)), RECIPIENT)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CallFailure::InsufficientBalance {
                asset: asset.clone(),
                required: U256::from(6),
                available: U256::from(5),
            }
        );

        let moved = account
            .transfer_asset(CONTROLLER, &asset, TransferAmount::Exact(U256::from(5)), RECIPIENT)
            .await
            .unwrap();
        assert_eq!(moved.amount, U256::from(5));
        assert_eq!(chain.token_balance(token, RECIPIENT), U256::from(5));
    }

    #[tokio::test]
    async fn test_zero_balance_is_noop() {
        let chain = InMemoryChain::new();
        let token = chain.deploy_token();
        let account = SubAccount::new(deployed(&chain).await, &chain);

        let moved = account
            .transfer_asset(CONTROLLER, &AssetId::Fungible(token), TransferAmount::All, RECIPIENT)
            .await
            .unwrap();
        assert!(moved.amount.is_zero());
    }

    #[tokio::test]
    async fn test_nft_balance_and_transfer() {
        let chain = InMemoryChain::new();
        let collection = chain.deploy_collection();
        let handle = deployed(&chain).await;
        chain.mint_nft(collection, handle.address, U256::from(3)).unwrap();
        chain.mint_nft(collection, RECIPIENT, U256::from(4)).unwrap();
        let account = SubAccount::new(handle, &chain);

        let owned = AssetId::NonFungible {
            collection,
            token_id: U256::from(3),
        };
        let foreign = AssetId::NonFungible {
            collection,
            token_id: U256::from(4),
        };
        let unknown = AssetId::NonFungible {
            collection,
            token_id: U256::from(99),
        };
        assert_eq!(account.balance_of(&owned).await.unwrap(), U256::one());
        assert_eq!(account.balance_of(&foreign).await.unwrap(), U256::zero());
        assert_eq!(account.balance_of(&unknown).await.unwrap(), U256::zero());

        let moved = account
            .transfer_asset(CONTROLLER, &owned, TransferAmount::All, RECIPIENT)
            .await
            .unwrap();
        assert_eq!(moved.amount, U256::one());
        assert_eq!(chain.nft_owner(collection, U256::from(3)), Some(RECIPIENT));
    }

    #[tokio::test]
    async fn test_execute_call_returns_output() {
        let chain = InMemoryChain::new();
        let token = chain.deploy_token();
        let handle = deployed(&chain).await;
        chain.mint(token, handle.address, U256::from(10)).unwrap();
        let account = SubAccount::new(handle, &chain);

        let output = account
            .execute_call(
                CONTROLLER,
                &CallDescriptor::call(token, abi::erc20_transfer(RECIPIENT, U256::from(4))),
            )
            .await
            .unwrap();
        assert!(abi::decode_optional_bool(output.as_slice()).unwrap());
        assert_eq!(chain.token_balance(token, RECIPIENT), U256::from(4));
    }
}
