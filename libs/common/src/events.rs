use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contract families the platform indexes. Wire names match the original
/// deployment manifests, so they double as API path segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    #[serde(rename = "streamToken")]
    StreamToken,
    #[serde(rename = "streamAMM")]
    StreamAmm,
    #[serde(rename = "lazyContentMinter")]
    LazyContentMinter,
    #[serde(rename = "paymentHub")]
    PaymentHub,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::StreamToken => "streamToken",
            ContractKind::StreamAmm => "streamAMM",
            ContractKind::LazyContentMinter => "lazyContentMinter",
            ContractKind::PaymentHub => "paymentHub",
        }
    }
}

impl core::fmt::Display for ContractKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl core::str::FromStr for ContractKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streamToken" => Ok(ContractKind::StreamToken),
            "streamAMM" => Ok(ContractKind::StreamAmm),
            "lazyContentMinter" => Ok(ContractKind::LazyContentMinter),
            "paymentHub" => Ok(ContractKind::PaymentHub),
            other => Err(format!("unknown contract type: {}", other)),
        }
    }
}

/// Identity of an on-chain event occurrence. Two fetch passes over the same
/// range produce the same key, which is what makes re-delivery detectable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub network_id: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl EventKey {
    pub fn as_string(&self) -> String {
        format!(
            "{}:{}:{}",
            self.network_id, self.transaction_hash, self.log_index
        )
    }
}

/// A decoded on-chain event as persisted by the synchronizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainEvent {
    pub network_id: u64,
    pub contract_type: ContractKind,
    pub event_name: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub log_index: u64,
    pub return_values: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

impl BlockchainEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            network_id: self.network_id,
            transaction_hash: self.transaction_hash.clone(),
            log_index: self.log_index,
        }
    }
}

/// Last block a (network, contract) pair was synced through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub network_id: u64,
    pub contract_type: ContractKind,
    pub last_synced_block: u64,
}

impl SyncCursor {
    pub fn cache_key(network_id: u64, contract_type: ContractKind) -> String {
        format!("events:{}:{}:lastBlock", network_id, contract_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_kind_round_trip() {
        for kind in [
            ContractKind::StreamToken,
            ContractKind::StreamAmm,
            ContractKind::LazyContentMinter,
            ContractKind::PaymentHub,
        ] {
            let parsed: ContractKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);

            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }

        assert!("streamamm".parse::<ContractKind>().is_err());
    }

    #[test]
    fn test_event_key_format() {
        let event = BlockchainEvent {
            network_id: 137,
            contract_type: ContractKind::StreamAmm,
            event_name: "TokenSwapped".to_string(),
            transaction_hash: "0xabc".to_string(),
            block_number: 100,
            log_index: 3,
            return_values: serde_json::json!({}),
            ingested_at: Utc::now(),
        };

        assert_eq!(event.key().as_string(), "137:0xabc:3");
    }

    #[test]
    fn test_cursor_cache_key() {
        assert_eq!(
            SyncCursor::cache_key(1, ContractKind::LazyContentMinter),
            "events:1:lazyContentMinter:lastBlock"
        );
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = BlockchainEvent {
            network_id: 1,
            contract_type: ContractKind::LazyContentMinter,
            event_name: "ContentMinted".to_string(),
            transaction_hash: "0xdeadbeef".to_string(),
            block_number: 19_000_000,
            log_index: 0,
            return_values: serde_json::json!({ "contentId": "0x01", "minter": "0x02" }),
            ingested_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let decoded: BlockchainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
