//! Event synchronization service for stream contracts.
//!
//! Provides a unified interface for:
//! - Pulling contract logs network by network in bounded block spans
//! - Resuming from a persisted cursor after restarts
//! - Dispatching per-contract side effects before events are persisted
//! - Deduplicating events by (network, transaction, log index)

mod types;

pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::cache::CacheStore;
use common::chain::ChainClient;
use common::events::{BlockchainEvent, ContractKind};
use common::network::NetworkRegistry;
use common::store::Store;

/// Pulls contract events into the store, one `(network, contract)` pair per
/// call. Every pass resumes from `max(requested_from, cursor)` so a crash
/// between fetch and cursor update only re-scans blocks whose events are
/// already deduplicated.
pub struct EventSynchronizer<C, S> {
    clients: HashMap<u64, Arc<C>>,
    registry: NetworkRegistry,
    store: Arc<S>,
    config: SyncConfig,
    handlers: HashMap<ContractKind, Arc<dyn EventHandler>>,
}

impl<C, S> EventSynchronizer<C, S>
where
    C: ChainClient,
    S: Store,
{
    /// Creates a synchronizer with the default cache-invalidation handlers
    /// for the minter and AMM contracts.
    pub fn new(
        clients: HashMap<u64, Arc<C>>,
        registry: NetworkRegistry,
        store: Arc<S>,
        cache: Arc<CacheStore>,
        config: SyncConfig,
    ) -> Self {
        let mut handlers: HashMap<ContractKind, Arc<dyn EventHandler>> = HashMap::new();
        handlers.insert(
            ContractKind::LazyContentMinter,
            Arc::new(ContentEventHandler {
                cache: cache.clone(),
            }),
        );
        handlers.insert(
            ContractKind::StreamAmm,
            Arc::new(AmmEventHandler { cache }),
        );

        Self {
            clients,
            registry,
            store,
            config,
            handlers,
        }
    }

    /// Replaces the handler for one contract kind.
    pub fn with_handler(mut self, kind: ContractKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one sync pass for a contract on a network, starting from the
    /// higher of `from_block` and the stored cursor.
    pub async fn sync_events(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        from_block: u64,
    ) -> Result<SyncOutcome, SyncError> {
        let sync_id = Uuid::new_v4();

        let client = self
            .clients
            .get(&network_id)
            .ok_or(SyncError::UnsupportedNetwork { network_id })?;
        let address = self
            .registry
            .contract_address(network_id, contract_type)
            .ok_or(SyncError::ContractNotConfigured {
                contract_type,
                network_id,
            })?;

        let cursor = self.store.cursor(network_id, contract_type).await?;
        let from_block = from_block.max(cursor.unwrap_or(0));

        let head = client.block_number().await?;
        if from_block >= head {
            debug!(
                %sync_id,
                network_id,
                contract = %contract_type,
                from_block,
                head,
                "events already in sync"
            );
            return Ok(SyncOutcome {
                from_block,
                to_block: from_block,
                event_count: 0,
            });
        }

        let to_block = head.min(from_block + self.config.max_block_span);

        let logs = client
            .contract_events(contract_type, address, from_block, to_block)
            .await?;

        info!(
            %sync_id,
            network_id,
            contract = %contract_type,
            from_block,
            to_block,
            fetched = logs.len(),
            "📥 fetched contract events"
        );

        let mut event_count = 0usize;
        for log in &logs {
            let event = BlockchainEvent {
                network_id,
                contract_type,
                event_name: log.event_name.clone(),
                transaction_hash: log.transaction_hash.to_string(),
                block_number: log.block_number,
                log_index: log.log_index,
                return_values: log.fields.clone(),
                ingested_at: Utc::now(),
            };

            if self.process_event(network_id, contract_type, event).await? {
                event_count += 1;
            }
        }

        self.store
            .set_cursor(network_id, contract_type, to_block)
            .await?;

        if to_block < head {
            debug!(
                %sync_id,
                remaining = head - to_block,
                "more blocks pending, next pass resumes from {}",
                to_block
            );
        }

        info!(
            %sync_id,
            network_id,
            contract = %contract_type,
            event_count,
            "✅ event sync complete"
        );

        Ok(SyncOutcome {
            from_block,
            to_block,
            event_count,
        })
    }

    /// Dispatches side effects and persists one event. Returns whether the
    /// event was new. Handler failures either abort the pass with the event
    /// unpersisted (so the next pass redelivers it) or are logged and
    /// skipped, per [`SyncConfig::abort_on_handler_failure`].
    async fn process_event(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        event: BlockchainEvent,
    ) -> Result<bool, SyncError> {
        if self.store.event_exists(&event.key()).await? {
            debug!(
                event = %event.event_name,
                tx = %event.transaction_hash,
                log_index = event.log_index,
                "skipping duplicate event"
            );
            return Ok(false);
        }

        debug!(
            network_id,
            contract = %contract_type,
            event = %event.event_name,
            tx = %event.transaction_hash,
            "processing event"
        );

        if let Some(handler) = self.handlers.get(&contract_type) {
            if let Err(err) = handler.handle(network_id, &event).await {
                if self.config.aborts_on_failure(contract_type) {
                    return Err(SyncError::HandlerFailed {
                        event_name: event.event_name,
                        reason: err.to_string(),
                    });
                }
                warn!(
                    event = %event.event_name,
                    tx = %event.transaction_hash,
                    error = %err,
                    "⚠️ handler failed, event stored anyway"
                );
            }
        }

        Ok(self.store.insert_event(event).await?)
    }
}

/// Drops cached minter reads when content is registered or minted, so the
/// next `isContentMinted` lookup goes back to the chain.
struct ContentEventHandler {
    cache: Arc<CacheStore>,
}

#[async_trait::async_trait]
impl EventHandler for ContentEventHandler {
    async fn handle(&self, network_id: u64, event: &BlockchainEvent) -> eyre::Result<()> {
        match event.event_name.as_str() {
            "ContentRegistered" | "ContentMinted" => {
                let namespace = format!(
                    "contract:{}:{}",
                    network_id,
                    ContractKind::LazyContentMinter
                );
                self.cache.clear(Some(&namespace)).await;
                debug!(network_id, event = %event.event_name, "invalidated minter cache");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Drops cached AMM quotes when liquidity or swaps move the pool price.
struct AmmEventHandler {
    cache: Arc<CacheStore>,
}

#[async_trait::async_trait]
impl EventHandler for AmmEventHandler {
    async fn handle(&self, network_id: u64, event: &BlockchainEvent) -> eyre::Result<()> {
        match event.event_name.as_str() {
            "LiquidityAdded" | "TokenSwapped" => {
                let namespace = format!("contract:{}:{}", network_id, ContractKind::StreamAmm);
                self.cache.clear(Some(&namespace)).await;
                debug!(network_id, event = %event.event_name, "invalidated AMM quote cache");
            }
            _ => {}
        }
        Ok(())
    }
}
