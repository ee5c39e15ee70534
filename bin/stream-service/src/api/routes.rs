use super::types::{
    AddPaymentRequest, AutoCommitRequest, AutoCommitResponse, BlocksQuery, CacheClearRequest,
    ChannelsQuery, CloseChannelRequest, ContractQuery, ErrorResponse, EventsQuery, HealthResponse,
    OpenChannelRequest, SyncEventsRequest,
};
use crate::chain::{AccessorError, BlockchainDataAccessor, FetchError};
use crate::payment::{ChannelManager, PaymentError, StreamStatus};
use alloy::primitives::Address;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::amount::Amount;
use common::cache::CacheStats;
use common::chain::{ChainClient, ChainError};
use common::channel::PaymentChannel;
use common::events::{BlockchainEvent, ContractKind};
use common::store::{Store, StoreError};
use event_sync::{EventSynchronizer, SyncError, SyncOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared handler state. Everything lives behind an `Arc` so the derived
/// clone per request is pointer-sized.
pub struct AppState<C, S> {
    pub accessor: Arc<BlockchainDataAccessor<C>>,
    pub channels: Arc<ChannelManager<C, S>>,
    pub synchronizer: Arc<EventSynchronizer<C, S>>,
    pub store: Arc<S>,
}

impl<C, S> Clone for AppState<C, S> {
    fn clone(&self) -> Self {
        Self {
            accessor: self.accessor.clone(),
            channels: self.channels.clone(),
            synchronizer: self.synchronizer.clone(),
            store: self.store.clone(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().timestamp_millis(),
    })
}

/// Content metadata by IPFS hash, served from cache when warm
pub async fn content_metadata<C, S>(
    State(state): State<AppState<C, S>>,
    Path(ipfs_hash): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let metadata = state
        .accessor
        .content_metadata(&ipfs_hash)
        .await
        .map_err(accessor_error)?;
    Ok(Json(metadata))
}

/// Current gas price and congestion for one network
pub async fn gas_estimate<C, S>(
    State(state): State<AppState<C, S>>,
    Path(network_id): Path<u64>,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let estimate = state
        .accessor
        .gas_estimate(network_id)
        .await
        .map_err(accessor_error)?;
    Ok(Json(estimate))
}

/// Read-only contract call; `args` is a URL-encoded JSON array
pub async fn contract_data<C, S>(
    State(state): State<AppState<C, S>>,
    Path((network_id, contract_type, method)): Path<(u64, ContractKind, String)>,
    Query(query): Query<ContractQuery>,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let args: Value = match query.args.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| bad_request(format!("Invalid args: {}", err)))?,
        None => Value::Array(Vec::new()),
    };

    let data = state
        .accessor
        .contract_data(network_id, contract_type, &method, &args, None)
        .await
        .map_err(accessor_error)?;
    Ok(Json(data))
}

/// Most recent blocks for one network, newest first
pub async fn recent_blocks<C, S>(
    State(state): State<AppState<C, S>>,
    Path(network_id): Path<u64>,
    Query(query): Query<BlocksQuery>,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let blocks = state
        .accessor
        .block_window(network_id, query.count.unwrap_or(10))
        .await
        .map_err(accessor_error)?;
    Ok(Json(blocks))
}

/// Transaction details by hash
pub async fn transaction_details<C, S>(
    State(state): State<AppState<C, S>>,
    Path((network_id, tx_hash)): Path<(u64, String)>,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let tx = state
        .accessor
        .transaction(network_id, &tx_hash)
        .await
        .map_err(accessor_error)?;
    Ok(Json(tx))
}

/// Hit/miss counters and key count for the shared cache
pub async fn cache_stats<C, S>(State(state): State<AppState<C, S>>) -> Json<CacheStats>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    Json(state.accessor.cache_stats().await)
}

/// Drops cached entries, all of them or one namespace
pub async fn clear_cache<C, S>(
    State(state): State<AppState<C, S>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let request = parse_optional_body::<CacheClearRequest>(&body)?;
    let namespace = request.namespace;
    state.accessor.clear_cache(namespace.as_deref()).await;
    Ok(Json(
        json!({ "cleared": namespace.unwrap_or_else(|| "all".to_string()) }),
    ))
}

/// Opens a payment channel for a content stream
pub async fn open_channel<C, S>(
    State(state): State<AppState<C, S>>,
    Json(request): Json<OpenChannelRequest>,
) -> Result<Json<PaymentChannel>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    info!(
        network_id = request.network_id,
        content_id = %request.content_id,
        "📥 open channel request"
    );

    let sender = parse_address(&request.user_id, "userId")?;
    let receiver = parse_address(&request.receiver_id, "receiverId")?;

    let channel = state
        .channels
        .open_channel(
            request.network_id,
            sender,
            receiver,
            &request.content_id,
            Amount::from_f64(request.deposit),
        )
        .await
        .map_err(payment_error)?;
    Ok(Json(channel))
}

/// All channels opened by one sender, newest first
pub async fn list_channels<C, S>(
    State(state): State<AppState<C, S>>,
    Query(query): Query<ChannelsQuery>,
) -> Result<Json<Vec<PaymentChannel>>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let sender = parse_address(&query.sender, "sender")?;
    let channels = state
        .channels
        .channels_for(sender)
        .await
        .map_err(payment_error)?;
    Ok(Json(channels))
}

/// Single channel by id
pub async fn get_channel<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
) -> Result<Json<PaymentChannel>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    match state.channels.channel(&channel_id).await.map_err(payment_error)? {
        Some(channel) => Ok(Json(channel)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Channel not found".to_string(),
            }),
        )),
    }
}

/// Records a signed cumulative payment on a channel
pub async fn add_payment<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
    Json(request): Json<AddPaymentRequest>,
) -> Result<Json<PaymentChannel>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    info!(channel_id = %channel_id, amount = request.amount, "📥 payment request");

    let channel = state
        .channels
        .add_payment(&channel_id, Amount::from_f64(request.amount), &request.signature)
        .await
        .map_err(payment_error)?;
    Ok(Json(channel))
}

/// Closes a channel, optionally applying one final payment first
pub async fn close_channel<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
    body: Bytes,
) -> Result<Json<PaymentChannel>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    info!(channel_id = %channel_id, "📥 close channel request");

    let final_payment = match parse_optional_body::<CloseChannelRequest>(&body)? {
        CloseChannelRequest {
            amount: Some(amount),
            signature: Some(signature),
        } => Some((Amount::from_f64(amount), signature)),
        CloseChannelRequest {
            amount: None,
            signature: None,
        } => None,
        _ => {
            return Err(bad_request(
                "Final payment requires both amount and signature".to_string(),
            ))
        }
    };

    let channel = state
        .channels
        .close_channel(&channel_id, final_payment)
        .await
        .map_err(payment_error)?;
    Ok(Json(channel))
}

/// Pulls contract events into the store, one bounded pass
pub async fn sync_events<C, S>(
    State(state): State<AppState<C, S>>,
    Json(request): Json<SyncEventsRequest>,
) -> Result<Json<SyncOutcome>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    info!(
        network_id = request.network_id,
        contract = %request.contract_type,
        "📥 event sync request"
    );

    let outcome = state
        .synchronizer
        .sync_events(
            request.network_id,
            request.contract_type,
            request.from_block.unwrap_or(0),
        )
        .await
        .map_err(sync_error)?;
    Ok(Json(outcome))
}

/// Stored events for one contract on one network, newest first
pub async fn list_events<C, S>(
    State(state): State<AppState<C, S>>,
    Path((network_id, contract_type)): Path<(u64, ContractKind)>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<BlockchainEvent>>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let limit = query.limit.unwrap_or(50).min(500);
    let events = state
        .store
        .events_for(network_id, contract_type, limit)
        .await
        .map_err(store_error)?;
    Ok(Json(events))
}

/// Starts per-second accrual against an open channel
pub async fn start_stream<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let status = state
        .channels
        .start_stream(&channel_id)
        .await
        .map_err(payment_error)?;
    Ok(Json(status))
}

/// Stops accrual and folds the pending balance into the channel
pub async fn stop_stream<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let status = state
        .channels
        .stop_stream(&channel_id)
        .await
        .map_err(payment_error)?;
    Ok(Json(status))
}

/// Accrual snapshot without mutating anything
pub async fn stream_status<C, S>(
    State(state): State<AppState<C, S>>,
    Path(channel_id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    let status = state
        .channels
        .stream_status(&channel_id)
        .await
        .map_err(payment_error)?;
    Ok(Json(status))
}

/// Toggles the background commitment loop and returns the settings in effect
pub async fn set_auto_commit<C, S>(
    State(state): State<AppState<C, S>>,
    Json(request): Json<AutoCommitRequest>,
) -> Result<Json<AutoCommitResponse>, ApiError>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    if request.interval_secs == Some(0) {
        return Err(bad_request("intervalSecs must be positive".to_string()));
    }

    state.channels.set_auto_commit(
        request.enabled,
        request.interval_secs.map(Duration::from_secs),
    );
    let (enabled, interval) = state.channels.auto_commit_settings();
    info!(enabled, interval_secs = interval.as_secs(), "auto-commit updated");

    Ok(Json(AutoCommitResponse {
        enabled,
        interval_secs: interval.as_secs(),
    }))
}

/// Empty bodies fall back to defaults so callers can POST without payload.
fn parse_optional_body<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| bad_request(format!("Invalid request body: {}", err)))
}

fn parse_address(raw: &str, field: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|_| bad_request(format!("Invalid address in {}: {}", field, raw)))
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

fn reply(status: StatusCode, err: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn chain_status(err: &ChainError) -> StatusCode {
    match err {
        ChainError::BlockNotFound { .. } | ChainError::TxNotFound { .. } => StatusCode::NOT_FOUND,
        ChainError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ChainError::NotConfigured(_) => StatusCode::BAD_REQUEST,
        ChainError::Rpc(_) | ChainError::Decode { .. } | ChainError::TxRejected(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn accessor_error(err: AccessorError) -> ApiError {
    let status = match &err {
        AccessorError::UnsupportedNetwork { .. }
        | AccessorError::ContractNotConfigured { .. }
        | AccessorError::UnsupportedMethod { .. }
        | AccessorError::InvalidParams { .. } => StatusCode::BAD_REQUEST,
        AccessorError::Chain(err) => chain_status(err),
        AccessorError::Fetch(FetchError::ContentNotFound { .. }) => StatusCode::NOT_FOUND,
        AccessorError::Fetch(FetchError::CircuitOpen { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        AccessorError::Fetch(_) => StatusCode::BAD_GATEWAY,
    };
    reply(status, err)
}

fn payment_error(err: PaymentError) -> ApiError {
    let status = match &err {
        PaymentError::NotFound { .. } => StatusCode::NOT_FOUND,
        PaymentError::UnsupportedNetwork { .. }
        | PaymentError::InvalidSignature { .. }
        | PaymentError::Channel(_) => StatusCode::BAD_REQUEST,
        PaymentError::Chain(err) => chain_status(err),
        PaymentError::Store(_) | PaymentError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    reply(status, err)
}

fn sync_error(err: SyncError) -> ApiError {
    let status = match &err {
        SyncError::UnsupportedNetwork { .. } | SyncError::ContractNotConfigured { .. } => {
            StatusCode::BAD_REQUEST
        }
        SyncError::Chain(err) => chain_status(err),
        SyncError::Store(_) | SyncError::HandlerFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    reply(status, err)
}

fn store_error(err: StoreError) -> ApiError {
    reply(StatusCode::INTERNAL_SERVER_ERROR, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::router;
    use crate::chain::FixtureFetcher;
    use crate::config::PaymentConfig;
    use alloy_primitives::{address, B256, U256};
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Router;
    use common::cache::{CacheStore, CacheTiers};
    use common::chain::{EventLog, FakeChainClient};
    use common::network::{ContractSet, NetworkDescriptor, NetworkRegistry};
    use common::resilience::{BreakerConfig, RetryPolicy};
    use common::store::MemoryStore;
    use event_sync::SyncConfig;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const SENDER: &str = "0x00000000000000000000000000000000000000aa";
    const RECEIVER: &str = "0x00000000000000000000000000000000000000bb";

    fn devnet() -> NetworkDescriptor {
        NetworkDescriptor {
            network_id: 31337,
            name: "devnet".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            contracts: ContractSet {
                stream_token: address!("0000000000000000000000000000000000000101"),
                stream_amm: address!("0000000000000000000000000000000000000102"),
                lazy_content_minter: address!("0000000000000000000000000000000000000103"),
                payment_hub: None,
            },
        }
    }

    fn test_state() -> (AppState<FakeChainClient, MemoryStore>, Arc<FakeChainClient>) {
        let client = Arc::new(FakeChainClient::new());
        let mut clients = HashMap::new();
        clients.insert(31337u64, client.clone());
        let registry = NetworkRegistry::new(vec![devnet()]);
        let cache = Arc::new(CacheStore::new());
        let store = Arc::new(MemoryStore::new());

        let fixtures = FixtureFetcher::new();
        fixtures.insert("QmTest", serde_json::json!({ "name": "episode-1" }));

        let retry = RetryPolicy {
            max_retries: 1,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            factor: 2.0,
        };

        let accessor = Arc::new(BlockchainDataAccessor::new(
            clients.clone(),
            registry.clone(),
            cache.clone(),
            CacheTiers::default(),
            crate::chain::AnyFetcher::Fixture(fixtures),
            retry,
            BreakerConfig::default(),
        ));
        let channels = Arc::new(ChannelManager::new(
            clients.clone(),
            registry.clone(),
            store.clone(),
            None,
            &PaymentConfig::default(),
        ));
        let synchronizer = Arc::new(EventSynchronizer::new(
            clients,
            registry,
            store.clone(),
            cache,
            SyncConfig::default(),
        ));

        (
            AppState {
                accessor,
                channels,
                synchronizer,
                store,
            },
            client,
        )
    }

    fn app(state: &AppState<FakeChainClient, MemoryStore>) -> Router {
        router(state.clone())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn open_test_channel(state: &AppState<FakeChainClient, MemoryStore>, deposit: f64) -> String {
        let (status, body) = send(
            app(state),
            post_request(
                "/api/channels",
                serde_json::json!({
                    "userId": SENDER,
                    "contentId": "content-1",
                    "receiverId": RECEIVER,
                    "networkId": 31337,
                    "deposit": deposit,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = test_state();

        let (status, body) = send(app(&state), get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_channel_lifecycle_over_http() {
        let (state, _) = test_state();

        let channel_id = open_test_channel(&state, 100.0).await;

        let (status, body) = send(
            app(&state),
            get_request(&format!("/api/channels/{}", channel_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "open");
        assert_eq!(body["networkId"], 31337);
        assert_eq!(body["contentId"], "content-1");
        assert_eq!(body["deposit"], "100000000000000000000");
        assert!(body["createdAt"].is_string());

        let (status, body) = send(
            app(&state),
            post_request(
                &format!("/api/channels/{}/payments", channel_id),
                serde_json::json!({ "amount": 10.0, "signature": "0xsig1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spent"], "10000000000000000000");
        assert_eq!(body["commitments"][0]["signature"], "0xsig1");

        let (status, body) = send(
            app(&state),
            post_request(
                &format!("/api/channels/{}/close", channel_id),
                serde_json::json!({ "amount": 25.0, "signature": "0xsig2" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "closed");
        assert_eq!(body["spent"], "25000000000000000000");
        assert!(body["closedAt"].is_string());

        let (status, body) = send(
            app(&state),
            get_request(&format!("/api/channels?sender={}", SENDER)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_404() {
        let (state, _) = test_state();

        let (status, body) = send(app(&state), get_request("/api/channels/chan-x")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Channel not found");
    }

    #[tokio::test]
    async fn test_open_rejects_bad_address() {
        let (state, _) = test_state();

        let (status, body) = send(
            app(&state),
            post_request(
                "/api/channels",
                serde_json::json!({
                    "userId": "not-an-address",
                    "contentId": "content-1",
                    "receiverId": RECEIVER,
                    "networkId": 31337,
                    "deposit": 1.0,
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Invalid address in userId"));
    }

    #[tokio::test]
    async fn test_payment_above_deposit_is_400() {
        let (state, _) = test_state();
        let channel_id = open_test_channel(&state, 1.0).await;

        let (status, _) = send(
            app(&state),
            post_request(
                &format!("/api/channels/{}/payments", channel_id),
                serde_json::json!({ "amount": 5.0, "signature": "0xsig" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_close_with_partial_final_payment_is_400() {
        let (state, _) = test_state();
        let channel_id = open_test_channel(&state, 1.0).await;

        let (status, body) = send(
            app(&state),
            post_request(
                &format!("/api/channels/{}/close", channel_id),
                serde_json::json!({ "amount": 0.5 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("both amount and signature"));
    }

    #[tokio::test]
    async fn test_contract_read_over_http() {
        let (state, client) = test_state();
        client.set_balance(
            address!("0000000000000000000000000000000000000101"),
            SENDER.parse().unwrap(),
            U256::from(5_000_000_000_000_000_000u128),
        );

        let uri = format!(
            "/api/contract/31337/streamToken/balanceOf?args=%5B%22{}%22%5D",
            SENDER
        );
        let (status, body) = send(app(&state), get_request(&uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!("5000000000000000000"));
    }

    #[tokio::test]
    async fn test_gas_route_payload() {
        let (state, _) = test_state();

        let (status, body) = send(app(&state), get_request("/api/gas/31337")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gasPrice"], "20000000000");
        assert_eq!(body["blockNumber"], 1_000_000);
        assert!(body["congestion"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_unknown_network_is_400() {
        let (state, _) = test_state();

        let (status, body) = send(app(&state), get_request("/api/gas/999")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported network ID: 999");
    }

    #[tokio::test]
    async fn test_content_route_serves_fixture() {
        let (state, _) = test_state();

        let (status, body) = send(app(&state), get_request("/api/content/QmTest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "episode-1");

        let (status, _) = send(app(&state), get_request("/api/content/QmMissing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tx_route_missing_is_404() {
        let (state, _) = test_state();

        let uri = format!("/api/tx/31337/{:#x}", B256::repeat_byte(9));
        let (status, _) = send(app(&state), get_request(&uri)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_route_ingests_events() {
        let (state, client) = test_state();
        client.push_event(
            ContractKind::LazyContentMinter,
            address!("0000000000000000000000000000000000000103"),
            EventLog {
                event_name: "ContentMinted".to_string(),
                block_number: 12,
                transaction_hash: B256::repeat_byte(1),
                log_index: 0,
                fields: serde_json::json!({ "contentId": "0x01" }),
            },
        );

        let (status, body) = send(
            app(&state),
            post_request(
                "/api/events/sync",
                serde_json::json!({ "networkId": 31337, "contractType": "lazyContentMinter" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["eventCount"], 1);
        assert_eq!(body["fromBlock"], 0);

        let (status, body) = send(
            app(&state),
            get_request("/api/events/31337/lazyContentMinter"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventName"], "ContentMinted");
        assert_eq!(events[0]["returnValues"]["contentId"], "0x01");
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let (state, _) = test_state();

        let _ = send(app(&state), get_request("/api/gas/31337")).await;
        let _ = send(app(&state), get_request("/api/gas/31337")).await;

        let (status, body) = send(app(&state), get_request("/api/cache/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keys"], 1);
        assert_eq!(body["hits"], 1);

        let (status, body) = send(app(&state), empty_post("/api/cache/clear")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], "all");

        let (_, body) = send(app(&state), get_request("/api/cache/stats")).await;
        assert_eq!(body["keys"], 0);
    }

    #[tokio::test]
    async fn test_stream_endpoints_over_http() {
        let (state, _) = test_state();
        let channel_id = open_test_channel(&state, 100.0).await;

        let (status, body) = send(
            app(&state),
            empty_post(&format!("/api/stream/{}/start", channel_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);

        let (status, body) = send(
            app(&state),
            get_request(&format!("/api/stream/{}/status", channel_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);
        assert_eq!(body["deposit"], "100000000000000000000");

        let (status, body) = send(
            app(&state),
            empty_post(&format!("/api/stream/{}/stop", channel_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], false);
    }

    #[tokio::test]
    async fn test_auto_commit_endpoint() {
        let (state, _) = test_state();

        let (status, body) = send(
            app(&state),
            post_request(
                "/api/stream/auto-commit",
                serde_json::json!({ "enabled": true, "intervalSecs": 5 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["intervalSecs"], 5);

        let (status, _) = send(
            app(&state),
            post_request(
                "/api/stream/auto-commit",
                serde_json::json!({ "enabled": true, "intervalSecs": 0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
