//! Error types for chain connectivity

use alloy_primitives::B256;

use crate::resilience::{is_transient_message, Retryable};

/// Errors that can occur during chain operations
#[derive(Debug)]
pub enum ChainError {
    // Connection errors
    Rpc(String),
    CircuitOpen { retry_in_ms: u64 },

    // Data errors
    Decode { reason: String },
    BlockNotFound { number: u64 },
    TxNotFound { tx_hash: B256 },

    // Transaction errors
    TxRejected(String),

    // Configuration errors
    NotConfigured(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Rpc(msg) => write!(f, "RPC error: {}", msg),
            ChainError::CircuitOpen { retry_in_ms } => {
                write!(f, "Circuit breaker open, retry in {}ms", retry_in_ms)
            }
            ChainError::Decode { reason } => write!(f, "Decode error: {}", reason),
            ChainError::BlockNotFound { number } => write!(f, "Block not found: {}", number),
            ChainError::TxNotFound { tx_hash } => {
                write!(f, "Transaction not found: {}", tx_hash)
            }
            ChainError::TxRejected(msg) => write!(f, "Transaction rejected: {}", msg),
            ChainError::NotConfigured(msg) => write!(f, "Not configured: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        match self {
            ChainError::Rpc(msg) => is_transient_message(msg),
            _ => false,
        }
    }

    fn circuit_open(retry_in_ms: u64) -> Self {
        ChainError::CircuitOpen { retry_in_ms }
    }
}
