use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Store, StoreError};
use crate::channel::PaymentChannel;
use crate::events::{BlockchainEvent, ContractKind, EventKey};

#[derive(Default)]
struct MemoryInner {
    channels: HashMap<String, PaymentChannel>,
    events: Vec<BlockchainEvent>,
    event_keys: HashSet<String>,
    cursors: HashMap<(u64, ContractKind), u64>,
}

/// In-memory [`Store`] for tests and offline runs. Nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_channel(&self, channel: PaymentChannel) -> Result<(), StoreError> {
        self.inner
            .write()
            .channels
            .insert(channel.id.clone(), channel);
        Ok(())
    }

    async fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, StoreError> {
        Ok(self.inner.read().channels.get(channel_id).cloned())
    }

    async fn channels_for_sender(
        &self,
        sender: Address,
    ) -> Result<Vec<PaymentChannel>, StoreError> {
        let inner = self.inner.read();
        let mut channels: Vec<PaymentChannel> = inner
            .channels
            .values()
            .filter(|channel| channel.sender == sender)
            .cloned()
            .collect();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(channels)
    }

    async fn event_exists(&self, key: &EventKey) -> Result<bool, StoreError> {
        Ok(self.inner.read().event_keys.contains(&key.as_string()))
    }

    async fn insert_event(&self, event: BlockchainEvent) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        if !inner.event_keys.insert(event.key().as_string()) {
            return Ok(false);
        }
        inner.events.push(event);
        Ok(true)
    }

    async fn events_for(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        limit: usize,
    ) -> Result<Vec<BlockchainEvent>, StoreError> {
        let inner = self.inner.read();
        let mut events: Vec<BlockchainEvent> = inner
            .events
            .iter()
            .filter(|ev| ev.network_id == network_id && ev.contract_type == contract_type)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            (b.block_number, b.log_index).cmp(&(a.block_number, a.log_index))
        });
        events.truncate(limit);
        Ok(events)
    }

    async fn cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
    ) -> Result<Option<u64>, StoreError> {
        Ok(self
            .inner
            .read()
            .cursors
            .get(&(network_id, contract_type))
            .copied())
    }

    async fn set_cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        block: u64,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .cursors
            .insert((network_id, contract_type), block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use alloy_primitives::address;
    use chrono::Utc;

    fn sample_channel(sender: Address, content_id: &str) -> PaymentChannel {
        PaymentChannel::new(
            1,
            sender,
            address!("2222222222222222222222222222222222222222"),
            content_id,
            Amount::from_u128_with_scale(10, 0),
        )
        .unwrap()
    }

    fn sample_event(network_id: u64, block: u64, tx_suffix: u8) -> BlockchainEvent {
        BlockchainEvent {
            network_id,
            contract_type: ContractKind::StreamAmm,
            event_name: "TokenSwapped".to_string(),
            transaction_hash: format!("0x{:064x}", tx_suffix),
            block_number: block,
            log_index: 0,
            return_values: serde_json::json!({}),
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_round_trip() {
        let store = MemoryStore::new();
        let sender = address!("1111111111111111111111111111111111111111");
        let channel = sample_channel(sender, "content-1");
        let id = channel.id.clone();

        store.put_channel(channel).await.unwrap();
        let loaded = store.channel(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.sender, sender);

        assert!(store.channel("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channels_for_sender_newest_first() {
        let store = MemoryStore::new();
        let sender = address!("1111111111111111111111111111111111111111");
        let other = address!("3333333333333333333333333333333333333333");

        let mut first = sample_channel(sender, "content-1");
        first.created_at = Utc::now() - chrono::Duration::hours(1);
        let second = sample_channel(sender, "content-2");
        let second_id = second.id.clone();

        store.put_channel(first).await.unwrap();
        store.put_channel(second).await.unwrap();
        store.put_channel(sample_channel(other, "content-3")).await.unwrap();

        let channels = store.channels_for_sender(sender).await.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, second_id);
    }

    #[tokio::test]
    async fn test_insert_event_deduplicates() {
        let store = MemoryStore::new();
        let event = sample_event(1, 100, 1);

        assert!(store.insert_event(event.clone()).await.unwrap());
        assert!(!store.insert_event(event.clone()).await.unwrap());
        assert!(store.event_exists(&event.key()).await.unwrap());

        let events = store.events_for(1, ContractKind::StreamAmm, 10).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_events_for_orders_and_limits() {
        let store = MemoryStore::new();
        for (block, suffix) in [(50u64, 1u8), (150, 2), (100, 3)] {
            store.insert_event(sample_event(1, block, suffix)).await.unwrap();
        }
        store.insert_event(sample_event(137, 999, 4)).await.unwrap();

        let events = store.events_for(1, ContractKind::StreamAmm, 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].block_number, 150);
        assert_eq!(events[1].block_number, 100);
    }

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let store = MemoryStore::new();
        assert!(store.cursor(1, ContractKind::StreamAmm).await.unwrap().is_none());

        store.set_cursor(1, ContractKind::StreamAmm, 12345).await.unwrap();
        assert_eq!(store.cursor(1, ContractKind::StreamAmm).await.unwrap(), Some(12345));
        assert!(store
            .cursor(1, ContractKind::LazyContentMinter)
            .await
            .unwrap()
            .is_none());
    }
}
