//! # CFW Controller Demo
//!
//! Deploys a controller on an in-memory chain and walks the counterfactual
//! flow end to end:
//!
//! 1. Load configuration (from env) and initialize logging
//! 2. Deploy the controller from a deployer account
//! 3. Pay tokens and native currency to an undeployed sub-account
//! 4. Sweep it to a treasury (deploying it on the way)
//! 5. Run a batch through a second sub-account

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use cfw_controller::prelude::*;
use cfw_controller::telemetry;

const DEPLOYER: Address = Address([0xDE; 20]);
const TREASURY: Address = Address([0x7E; 20]);
const PAYER: Address = Address([0x0A; 20]);

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::from_env().context("Failed to load configuration")?;
    telemetry::init_logging(&config).context("Failed to initialize logging")?;

    info!("===========================================");
    info!("  CFW Controller v{}", cfw_controller::VERSION);
    info!("===========================================");
    info!("Deployer: {:?}", DEPLOYER);

    let chain = Arc::new(InMemoryChain::new());
    let controller = CounterfactualWalletController::deployed_by(
        DEPLOYER,
        0,
        AccountTemplate::default(),
        Arc::clone(&chain),
        config,
    )
    .context("Failed to deploy controller")?;
    info!("Controller: {:?}", controller.identity());

    // Fund a sub-account that does not exist yet.
    let token = chain.deploy_token();
    let index = AccountIndex::from(2);
    let deposit = controller.derive_address(index);
    chain
        .mint(token, deposit, U256::from(7000))
        .context("Failed to mint demo tokens")?;
    chain.fund(PAYER, U256::from(1_000));
    chain
        .call(PAYER, deposit, U256::from(250), &Bytes::new())
        .await
        .context("Failed to pay deposit address")?;
    info!(
        "Deposit address for index {}: {:?} (deployed: {})",
        index,
        deposit,
        controller.slot(index).await.deployed
    );

    let receipt = controller
        .sweep(
            DEPLOYER,
            index,
            TREASURY,
            &[AssetId::Fungible(token), AssetId::Native],
        )
        .await
        .context("Sweep failed")?;
    for transfer in &receipt.transfers {
        info!("Swept {} of {} to {:?}", transfer.amount, transfer.asset, transfer.recipient);
    }
    info!(
        "Treasury now holds {} tokens and {} native",
        chain.token_balance(token, TREASURY),
        chain.balance(TREASURY)
    );

    // Batch through a fresh sub-account.
    let index = AccountIndex::from(3);
    chain.fund(controller.derive_address(index), U256::from(100));
    let outcome = controller
        .deploy_and_execute(
            DEPLOYER,
            index,
            &[
                CallDescriptor::native_transfer(TREASURY, U256::from(60)),
                CallDescriptor::native_transfer(PAYER, U256::from(40)),
            ],
        )
        .await
        .context("Batch failed")?;
    info!(
        "Batch of {} calls ran through {:?} (deployed now: {})",
        outcome.results.len(),
        outcome.account.address,
        outcome.deployed_now
    );

    let stats = controller.stats().await;
    info!(
        "Deployments: {}, sweeps: {}, batches: {}",
        stats.deployments, stats.sweeps, stats.batches_executed
    );
    Ok(())
}
