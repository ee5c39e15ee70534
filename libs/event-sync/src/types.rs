//! Types for the event synchronization service.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::chain::ChainError;
use common::events::{BlockchainEvent, ContractKind};
use common::store::StoreError;

/// Tuning knobs for one synchronizer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Largest inclusive block span fetched in one pass. Anything beyond
    /// it waits for the next pass.
    pub max_block_span: u64,
    /// Per-contract handler failure policy. `true` aborts the pass on a
    /// handler error so the event is redelivered next pass; the default
    /// logs and keeps going.
    pub abort_on_handler_failure: HashMap<ContractKind, bool>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_block_span: 10_000,
            abort_on_handler_failure: HashMap::new(),
        }
    }
}

impl SyncConfig {
    pub fn aborts_on_failure(&self, kind: ContractKind) -> bool {
        self.abort_on_handler_failure
            .get(&kind)
            .copied()
            .unwrap_or(false)
    }
}

/// Result of one sync pass over a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// First block of the scanned range
    pub from_block: u64,
    /// Last block of the scanned range, now the stored cursor
    pub to_block: u64,
    /// Number of events newly ingested (duplicates excluded)
    pub event_count: usize,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events in blocks {}..={}",
            self.event_count, self.from_block, self.to_block
        )
    }
}

/// Errors that can occur during a sync pass
#[derive(Debug)]
pub enum SyncError {
    // Configuration errors
    UnsupportedNetwork { network_id: u64 },
    ContractNotConfigured { contract_type: ContractKind, network_id: u64 },

    // Upstream errors
    Chain(ChainError),
    Store(StoreError),

    // Handler errors (abort mode only)
    HandlerFailed { event_name: String, reason: String },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::UnsupportedNetwork { network_id } => {
                write!(f, "Unsupported network ID: {}", network_id)
            }
            SyncError::ContractNotConfigured {
                contract_type,
                network_id,
            } => write!(
                f,
                "Contract address not found for {} on network {}",
                contract_type, network_id
            ),
            SyncError::Chain(err) => write!(f, "Chain error: {}", err),
            SyncError::Store(err) => write!(f, "Store error: {}", err),
            SyncError::HandlerFailed { event_name, reason } => {
                write!(f, "Handler failed for {}: {}", event_name, reason)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ChainError> for SyncError {
    fn from(err: ChainError) -> Self {
        SyncError::Chain(err)
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}

/// Side effects run for each newly ingested event, before it is persisted.
/// Registered per contract kind; events of unregistered kinds are stored
/// without side effects.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, network_id: u64, event: &BlockchainEvent) -> eyre::Result<()>;
}
