//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the controller and the outside world.
//!
//! - **Driving Port (Inbound)**: `CounterfactualWalletApi`
//! - **Driven Port (Outbound)**: `ExecutionEnvironment`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
