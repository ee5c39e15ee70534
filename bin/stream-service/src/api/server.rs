use super::routes::{
    add_payment, cache_stats, clear_cache, close_channel, contract_data, content_metadata,
    gas_estimate, get_channel, health, list_channels, list_events, open_channel, recent_blocks,
    set_auto_commit, start_stream, stop_stream, stream_status, sync_events, transaction_details,
    AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use common::chain::ChainClient;
use common::store::Store;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Builds the full route table. Kept separate from [`ApiServer`] so tests can
/// drive handlers without binding a socket.
pub fn router<C, S>(state: AppState<C, S>) -> Router
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/content/{ipfs_hash}", get(content_metadata))
        .route("/api/gas/{network_id}", get(gas_estimate))
        .route(
            "/api/contract/{network_id}/{contract_type}/{method}",
            get(contract_data),
        )
        .route("/api/blocks/{network_id}", get(recent_blocks))
        .route("/api/tx/{network_id}/{tx_hash}", get(transaction_details))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(clear_cache))
        .route("/api/channels", post(open_channel).get(list_channels))
        .route("/api/channels/{channel_id}", get(get_channel))
        .route("/api/channels/{channel_id}/payments", post(add_payment))
        .route("/api/channels/{channel_id}/close", post(close_channel))
        .route("/api/events/sync", post(sync_events))
        .route("/api/events/{network_id}/{contract_type}", get(list_events))
        .route("/api/stream/auto-commit", post(set_auto_commit))
        .route("/api/stream/{channel_id}/start", post(start_stream))
        .route("/api/stream/{channel_id}/stop", post(stop_stream))
        .route("/api/stream/{channel_id}/status", get(stream_status))
        .with_state(state)
}

pub struct ApiServer<C, S> {
    state: AppState<C, S>,
    addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl<C, S> ApiServer<C, S>
where
    C: ChainClient + 'static,
    S: Store + 'static,
{
    pub fn new(state: AppState<C, S>, addr: SocketAddr) -> Self {
        Self {
            state,
            addr,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn start(self) -> eyre::Result<()> {
        let app = router(self.state);

        tracing::info!("API server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                self.cancel_token.cancelled().await;
            })
            .await?;

        Ok(())
    }
}
