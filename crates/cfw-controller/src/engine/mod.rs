//! # Engine
//!
//! Controller internals behind the inbound port: owner gating, deployment
//! bookkeeping, sub-account behavior, atomic batches and sweeps.

pub mod account;
pub mod batch;
pub mod gate;
pub mod registry;
pub mod sweep;

pub use account::SubAccount;
pub use batch::BatchExecutor;
pub use gate::AccessGate;
pub use registry::DeploymentRegistry;
pub use sweep::SweepOrchestrator;
