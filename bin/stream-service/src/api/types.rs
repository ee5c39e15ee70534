use common::events::ContractKind;
use serde::{Deserialize, Serialize};

/// Request to open a payment channel for a content stream
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChannelRequest {
    /// Sender wallet address (hex)
    pub user_id: String,

    /// Content being paid for
    pub content_id: String,

    /// Receiver wallet address (hex)
    pub receiver_id: String,

    /// Network the channel settles on
    pub network_id: u64,

    /// Escrow deposit in whole tokens
    pub deposit: f64,
}

/// Request to record a signed cumulative payment on a channel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddPaymentRequest {
    /// Cumulative amount owed so far, in whole tokens
    pub amount: f64,

    /// Hex-encoded signature over the commitment digest
    pub signature: String,
}

/// Optional final payment attached to a close request
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CloseChannelRequest {
    pub amount: Option<f64>,
    pub signature: Option<String>,
}

/// Request to sync events for one contract on one network
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEventsRequest {
    pub network_id: u64,
    pub contract_type: ContractKind,

    /// Earliest block to scan; the stored cursor still applies
    pub from_block: Option<u64>,
}

/// Request to toggle the background commitment loop
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCommitRequest {
    pub enabled: bool,
    pub interval_secs: Option<u64>,
}

/// Effective auto-commit settings after an update
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCommitResponse {
    pub enabled: bool,
    pub interval_secs: u64,
}

/// Query for listing channels by sender address
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsQuery {
    pub sender: String,
}

/// Query for contract reads; `args` is a JSON array, URL-encoded
#[derive(Debug, Clone, Deserialize)]
pub struct ContractQuery {
    pub args: Option<String>,
}

/// Query for the recent-blocks endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct BlocksQuery {
    pub count: Option<u64>,
}

/// Query for listing stored events
#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Request to drop cached entries, optionally scoped to one namespace
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheClearRequest {
    pub namespace: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
}

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
