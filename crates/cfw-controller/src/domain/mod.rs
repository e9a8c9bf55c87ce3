//! # Domain Layer (Inner Hexagon)
//!
//! Pure business types and functions for counterfactual sub-accounts.
//! NO I/O, NO async.
//!
//! - Dependencies point INWARD only (engine and adapters depend on this).
//! - Address derivation lives here so it can be evaluated without any
//!   environment or lock.

pub mod abi;
pub mod entities;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use services::*;
pub use value_objects::*;
