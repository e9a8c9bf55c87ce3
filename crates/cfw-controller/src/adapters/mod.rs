//! # Adapters
//!
//! Implementations of the outbound ports.

pub mod in_memory_chain;

pub use in_memory_chain::{ChainConfig, InMemoryChain};
