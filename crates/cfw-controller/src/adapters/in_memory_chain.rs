//! # In-Memory Chain
//!
//! Execution environment held entirely in memory, for tests and the demo
//! binary. Hosts sub-accounts, fungible and non-fungible token ledgers and
//! always-reverting contracts. A production adapter would forward to a node.
//!
//! Every call runs against a scratch copy of the world and is committed only
//! on success, so a failed call never leaves a partial effect. Checkpoints
//! are whole-world snapshots.

use crate::domain::abi::{self, TokenCall};
use crate::domain::services::{compute_contract_address, compute_contract_address_create2, keccak256};
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::errors::{CallFailure, EnvError};
use crate::ports::outbound::{CheckpointId, ExecutionEnvironment};
use crate::domain::entities::AssetId;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Deployer used for ledger contracts created through the setup helpers.
const LEDGER_DEPLOYER: Address = Address([0xEE; 20]);

/// In-memory chain limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Maximum init code size accepted by `create2` (EIP-3860).
    pub max_init_code_size: usize,
    /// Maximum number of contracts the chain will host.
    pub max_contracts: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_init_code_size: 49_152,
            max_contracts: 100_000,
        }
    }
}

// =============================================================================
// WORLD STATE
// =============================================================================

#[derive(Debug, Clone)]
enum Contract {
    Account { creation_code_hash: Hash },
    Token(TokenLedger),
    Collection(CollectionLedger),
    Reverter { reason: String },
}

#[derive(Debug, Clone, Default)]
struct TokenLedger {
    balances: HashMap<Address, U256>,
    total_supply: U256,
}

impl TokenLedger {
    fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    fn credit(&mut self, to: Address, amount: U256) -> Result<(), CallFailure> {
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| CallFailure::Revert("ERC20: balance overflow".to_string()))?;
        self.balances.insert(to, balance);
        Ok(())
    }

    fn dispatch(&mut self, caller: Address, payload: &[u8]) -> Result<Bytes, CallFailure> {
        match TokenCall::decode(payload)? {
            TokenCall::Transfer { to, amount } => {
                if to.is_zero() {
                    return Err(CallFailure::Revert(
                        "ERC20: transfer to the zero address".to_string(),
                    ));
                }
                let from_balance = self.balance_of(caller);
                if from_balance < amount {
                    return Err(CallFailure::Revert(
                        "ERC20: transfer amount exceeds balance".to_string(),
                    ));
                }
                self.balances.insert(caller, from_balance - amount);
                self.credit(to, amount)?;
                Ok(abi::encode_bool(true))
            }
            TokenCall::BalanceOf { holder } => Ok(abi::encode_u256(self.balance_of(holder))),
            other => Err(CallFailure::Revert(format!(
                "ERC20: unsupported call {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CollectionLedger {
    owners: HashMap<U256, Address>,
}

impl CollectionLedger {
    fn owner_of(&self, token_id: U256) -> Result<Address, CallFailure> {
        self.owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| CallFailure::Revert("ERC721: invalid token ID".to_string()))
    }

    fn dispatch(&mut self, caller: Address, payload: &[u8]) -> Result<Bytes, CallFailure> {
        match TokenCall::decode(payload)? {
            TokenCall::OwnerOf { token_id } => Ok(abi::encode_address(self.owner_of(token_id)?)),
            TokenCall::TransferFrom { from, to, token_id }
            | TokenCall::SafeTransferFrom { from, to, token_id } => {
                let owner = self.owner_of(token_id)?;
                if owner != from {
                    return Err(CallFailure::Revert(
                        "ERC721: transfer from incorrect owner".to_string(),
                    ));
                }
                if caller != owner {
                    return Err(CallFailure::Revert(
                        "ERC721: caller is not token owner or approved".to_string(),
                    ));
                }
                if to.is_zero() {
                    return Err(CallFailure::Revert(
                        "ERC721: transfer to the zero address".to_string(),
                    ));
                }
                self.owners.insert(token_id, to);
                Ok(Bytes::new())
            }
            other => Err(CallFailure::Revert(format!(
                "ERC721: unsupported call {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WorldState {
    native: HashMap<Address, U256>,
    contracts: HashMap<Address, Contract>,
    ledger_nonce: u64,
}

impl WorldState {
    fn native_of(&self, address: Address) -> U256 {
        self.native.get(&address).copied().unwrap_or_default()
    }

    fn move_native(&mut self, from: Address, to: Address, value: U256) -> Result<(), CallFailure> {
        let available = self.native_of(from);
        if available < value {
            return Err(CallFailure::InsufficientBalance {
                asset: AssetId::Native,
                required: value,
                available,
            });
        }
        self.native.insert(from, available - value);
        let credited = self
            .native_of(to)
            .checked_add(value)
            .ok_or_else(|| CallFailure::Revert("native balance overflow".to_string()))?;
        self.native.insert(to, credited);
        Ok(())
    }

    fn execute(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        payload: &[u8],
    ) -> Result<Bytes, CallFailure> {
        if !value.is_zero() {
            self.move_native(caller, target, value)?;
        }

        match self.contracts.get_mut(&target) {
            // Plain accounts accept anything.
            None => Ok(Bytes::new()),
            Some(Contract::Account { .. }) if payload.is_empty() => Ok(Bytes::new()),
            Some(Contract::Account { .. }) => Err(CallFailure::Revert(
                "sub-account accepts only plain value transfers".to_string(),
            )),
            Some(Contract::Reverter { reason }) => Err(CallFailure::Revert(reason.clone())),
            Some(Contract::Token(ledger)) => ledger.dispatch(caller, payload),
            Some(Contract::Collection(ledger)) => ledger.dispatch(caller, payload),
        }
    }

    fn next_ledger_address(&mut self) -> Address {
        self.ledger_nonce += 1;
        compute_contract_address(LEDGER_DEPLOYER, self.ledger_nonce)
    }
}

// =============================================================================
// IN-MEMORY CHAIN
// =============================================================================

/// In-memory execution environment.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    config: ChainConfig,
    world: RwLock<WorldState>,
    checkpoints: Mutex<Vec<WorldState>>,
    deployment_faults: AtomicUsize,
}

impl InMemoryChain {
    /// Create an empty chain with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chain with the given limits.
    #[must_use]
    pub fn with_config(config: ChainConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Deploy a fungible token ledger and return its address.
    pub fn deploy_token(&self) -> Address {
        let mut world = self.world.write();
        let address = world.next_ledger_address();
        world
            .contracts
            .insert(address, Contract::Token(TokenLedger::default()));
        address
    }

    /// Deploy a non-fungible collection ledger and return its address.
    pub fn deploy_collection(&self) -> Address {
        let mut world = self.world.write();
        let address = world.next_ledger_address();
        world
            .contracts
            .insert(address, Contract::Collection(CollectionLedger::default()));
        address
    }

    /// Deploy a contract that reverts every call with `reason`.
    pub fn deploy_reverter(&self, reason: impl Into<String>) -> Address {
        let mut world = self.world.write();
        let address = world.next_ledger_address();
        world.contracts.insert(
            address,
            Contract::Reverter {
                reason: reason.into(),
            },
        );
        address
    }

    /// Mint `amount` of `token` to `to`.
    ///
    /// # Errors
    ///
    /// `WrongContract` if `token` is not a token ledger.
    pub fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), EnvError> {
        let mut world = self.world.write();
        match world.contracts.get_mut(&token) {
            Some(Contract::Token(ledger)) => {
                let balance = ledger.balance_of(to).saturating_add(amount);
                ledger.balances.insert(to, balance);
                ledger.total_supply = ledger.total_supply.saturating_add(amount);
                Ok(())
            }
            _ => Err(EnvError::WrongContract {
                address: token,
                expected: "token",
            }),
        }
    }

    /// Mint `token_id` of `collection` to `to`.
    ///
    /// # Errors
    ///
    /// `WrongContract` if `collection` is not a collection ledger.
    pub fn mint_nft(&self, collection: Address, to: Address, token_id: U256) -> Result<(), EnvError> {
        let mut world = self.world.write();
        match world.contracts.get_mut(&collection) {
            Some(Contract::Collection(ledger)) => {
                ledger.owners.insert(token_id, to);
                Ok(())
            }
            _ => Err(EnvError::WrongContract {
                address: collection,
                expected: "collection",
            }),
        }
    }

    /// Credit native currency to `address`.
    pub fn fund(&self, address: Address, amount: U256) {
        let mut world = self.world.write();
        let balance = world.native_of(address).saturating_add(amount);
        world.native.insert(address, balance);
    }

    /// Native balance of `address`.
    #[must_use]
    pub fn balance(&self, address: Address) -> U256 {
        self.world.read().native_of(address)
    }

    /// Balance of `holder` in `token` (zero if `token` is not a ledger).
    #[must_use]
    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        match self.world.read().contracts.get(&token) {
            Some(Contract::Token(ledger)) => ledger.balance_of(holder),
            _ => U256::zero(),
        }
    }

    /// Total minted supply of `token`.
    #[must_use]
    pub fn total_supply(&self, token: Address) -> U256 {
        match self.world.read().contracts.get(&token) {
            Some(Contract::Token(ledger)) => ledger.total_supply,
            _ => U256::zero(),
        }
    }

    /// Owner of `token_id` in `collection`.
    #[must_use]
    pub fn nft_owner(&self, collection: Address, token_id: U256) -> Option<Address> {
        match self.world.read().contracts.get(&collection) {
            Some(Contract::Collection(ledger)) => ledger.owners.get(&token_id).copied(),
            _ => None,
        }
    }

    /// Make the next `count` CREATE2 instantiations fail.
    pub fn fail_next_deployments(&self, count: usize) {
        self.deployment_faults.store(count, Ordering::SeqCst);
    }

    /// Number of hosted contracts (ledgers included).
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.world.read().contracts.len()
    }

    /// Number of open checkpoints.
    #[must_use]
    pub fn open_checkpoints(&self) -> usize {
        self.checkpoints.lock().len()
    }

    fn take_deployment_fault(&self) -> bool {
        self.deployment_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ExecutionEnvironment for InMemoryChain {
    async fn creation_code_hash(&self, address: Address) -> Result<Option<Hash>, EnvError> {
        Ok(match self.world.read().contracts.get(&address) {
            Some(Contract::Account { creation_code_hash }) => Some(*creation_code_hash),
            // Ledgers created by the setup helpers have no creation code here.
            Some(_) => Some(Hash::ZERO),
            None => None,
        })
    }

    async fn create2(
        &self,
        deployer: Address,
        salt: Hash,
        init_code: &Bytes,
    ) -> Result<Address, EnvError> {
        if init_code.len() > self.config.max_init_code_size {
            return Err(EnvError::InitCodeSizeExceeded {
                size: init_code.len(),
                max: self.config.max_init_code_size,
            });
        }
        if self.take_deployment_fault() {
            return Err(EnvError::ResourceExhausted(
                "instantiation aborted by environment".to_string(),
            ));
        }

        let address = compute_contract_address_create2(deployer, salt, init_code.as_slice());
        let mut world = self.world.write();
        if world.contracts.contains_key(&address) {
            return Err(EnvError::ContractAlreadyExists(address));
        }
        if world.contracts.len() >= self.config.max_contracts {
            return Err(EnvError::ResourceExhausted(format!(
                "contract limit {} reached",
                self.config.max_contracts
            )));
        }
        world.contracts.insert(
            address,
            Contract::Account {
                creation_code_hash: keccak256(init_code.as_slice()),
            },
        );
        debug!(%deployer, %address, "create2 instantiated contract");
        Ok(address)
    }

    async fn call(
        &self,
        caller: Address,
        target: Address,
        value: U256,
        payload: &Bytes,
    ) -> Result<Bytes, CallFailure> {
        let mut world = self.world.write();
        let mut scratch = world.clone();
        let output = scratch.execute(caller, target, value, payload.as_slice())?;
        *world = scratch;
        Ok(output)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, EnvError> {
        Ok(self.world.read().native_of(address))
    }

    async fn checkpoint(&self) -> Result<CheckpointId, EnvError> {
        let mut checkpoints = self.checkpoints.lock();
        checkpoints.push(self.world.read().clone());
        Ok(checkpoints.len() - 1)
    }

    async fn revert_to(&self, checkpoint: CheckpointId) -> Result<(), EnvError> {
        let mut checkpoints = self.checkpoints.lock();
        if checkpoint >= checkpoints.len() {
            return Err(EnvError::UnknownCheckpoint(checkpoint));
        }
        if let Some(snapshot) = checkpoints.drain(checkpoint..).next() {
            *self.world.write() = snapshot;
        }
        Ok(())
    }

    async fn release(&self, checkpoint: CheckpointId) -> Result<(), EnvError> {
        let mut checkpoints = self.checkpoints.lock();
        if checkpoint >= checkpoints.len() {
            return Err(EnvError::UnknownCheckpoint(checkpoint));
        }
        checkpoints.truncate(checkpoint);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
