//! Typed snapshots of on-chain state returned by [`super::ChainClient`]

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Success => write!(f, "success"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub transaction_count: usize,
}

impl BlockSummary {
    /// Gas used over gas limit, the congestion signal exposed by the API.
    pub fn utilization(&self) -> f64 {
        if self.gas_limit == 0 {
            return 0.0;
        }
        self.gas_used as f64 / self.gas_limit as f64
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransactionDetails {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: TxStatus,
}

/// Quote for swapping `amount_in` through an AMM pool, fee already split out.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_out: U256,
    pub fee: U256,
}

/// One decoded contract log. Field names and values land in `fields` the way
/// the ABI names them, so handlers and API consumers see the same shape.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EventLog {
    pub event_name: String,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub fields: serde_json::Value,
}

/// Receipt of a submitted transaction after confirmation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: TxStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_utilization() {
        let block = BlockSummary {
            number: 100,
            hash: B256::ZERO,
            timestamp: 1_700_000_000,
            gas_used: 15_000_000,
            gas_limit: 30_000_000,
            transaction_count: 120,
        };
        assert!((block.utilization() - 0.5).abs() < 1e-9);

        let empty = BlockSummary { gas_limit: 0, ..block };
        assert_eq!(empty.utilization(), 0.0);
    }

    #[test]
    fn test_tx_status_serde() {
        assert_eq!(serde_json::to_string(&TxStatus::Success).unwrap(), "\"success\"");
        assert_eq!(
            serde_json::from_str::<TxStatus>("\"pending\"").unwrap(),
            TxStatus::Pending
        );
    }
}
