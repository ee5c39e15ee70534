//! Chain connectivity module
//!
//! This module provides:
//! - The [`ChainClient`] seam every network-touching component goes through
//! - Typed snapshots of blocks, transactions, quotes and decoded event logs
//! - An RPC-backed implementation built on alloy providers
//! - An in-memory implementation with scriptable state for tests and
//!   offline runs

mod alloy_client;
mod client;
mod errors;
mod fake;
mod types;

pub use alloy_client::AlloyChainClient;
pub use client::ChainClient;
pub use errors::ChainError;
pub use fake::{FakeChainClient, SubmittedTx};
pub use types::{
    BlockSummary, EventLog, SwapQuote, TransactionDetails, TxOutcome, TxStatus,
};
