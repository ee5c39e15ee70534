use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::{Store, StoreError};
use crate::channel::PaymentChannel;
use crate::events::{BlockchainEvent, ContractKind, EventKey};

#[derive(Debug, Default, Deserialize, Serialize)]
struct StoreData {
    channels: HashMap<String, PaymentChannel>,
    events: Vec<BlockchainEvent>,
    cursors: HashMap<String, u64>,
}

struct FileInner {
    data: StoreData,
    event_keys: HashSet<String>,
}

/// File-backed [`Store`]. The whole state lives in one JSON document that
/// is rewritten atomically (write-to-temp-then-rename) on every mutation,
/// so a crash mid-write never leaves a corrupt store behind.
pub struct FileStore {
    path: String,
    inner: RwLock<FileInner>,
}

impl FileStore {
    /// Opens the store at `path`, creating an empty one if the file does
    /// not exist. An existing but unparseable file is an error.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let data = Self::load(path)?;
        let event_keys = data
            .events
            .iter()
            .map(|event| event.key().as_string())
            .collect();

        info!(
            path,
            channels = data.channels.len(),
            events = data.events.len(),
            "opened file store"
        );

        Ok(Self {
            path: path.to_string(),
            inner: RwLock::new(FileInner { data, event_keys }),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn load(path: &str) -> Result<StoreData, StoreError> {
        if !Path::new(path).exists() {
            return Ok(StoreData::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| StoreError::ParseError {
            reason: e.to_string(),
        })
    }

    fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        let path = Path::new(&self.path);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::WriteError {
                    path: self.path.clone(),
                    reason: format!("Failed to create parent directories: {}", e),
                })?;
            }
        }

        let json = serde_json::to_string_pretty(data).map_err(|e| StoreError::SerializeError {
            reason: e.to_string(),
        })?;

        let temp_path = format!("{}.tmp", self.path);
        let temp_path_ref = Path::new(&temp_path);

        let mut file = fs::File::create(temp_path_ref).map_err(|e| StoreError::TempFileError {
            reason: e.to_string(),
        })?;

        file.write_all(json.as_bytes())
            .map_err(|e| StoreError::WriteError {
                path: temp_path.clone(),
                reason: e.to_string(),
            })?;

        file.sync_all().map_err(|e| StoreError::WriteError {
            path: temp_path.clone(),
            reason: format!("Failed to sync file: {}", e),
        })?;

        fs::rename(temp_path_ref, path).map_err(|e| StoreError::RenameError {
            from: temp_path.clone(),
            to: self.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn cursor_key(network_id: u64, contract_type: ContractKind) -> String {
        format!("{}:{}", network_id, contract_type)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn put_channel(&self, channel: PaymentChannel) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.data.channels.insert(channel.id.clone(), channel);
        self.save(&inner.data)
    }

    async fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, StoreError> {
        Ok(self.inner.read().await.data.channels.get(channel_id).cloned())
    }

    async fn channels_for_sender(
        &self,
        sender: Address,
    ) -> Result<Vec<PaymentChannel>, StoreError> {
        let inner = self.inner.read().await;
        let mut channels: Vec<PaymentChannel> = inner
            .data
            .channels
            .values()
            .filter(|channel| channel.sender == sender)
            .cloned()
            .collect();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(channels)
    }

    async fn event_exists(&self, key: &EventKey) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .event_keys
            .contains(&key.as_string()))
    }

    async fn insert_event(&self, event: BlockchainEvent) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.event_keys.insert(event.key().as_string()) {
            return Ok(false);
        }
        inner.data.events.push(event);
        self.save(&inner.data)?;
        Ok(true)
    }

    async fn events_for(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        limit: usize,
    ) -> Result<Vec<BlockchainEvent>, StoreError> {
        let inner = self.inner.read().await;
        let mut events: Vec<BlockchainEvent> = inner
            .data
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
            .await
            .data
            .cursors
            .get(&Self::cursor_key(network_id, contract_type))
            .copied())
    }

    async fn set_cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        block: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .data
            .cursors
            .insert(Self::cursor_key(network_id, contract_type), block);
        self.save(&inner.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use alloy_primitives::address;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Counter for unique test file paths
    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_store_path() -> String {
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let mut path = std::env::temp_dir();
        path.push(format!(
            "stream_store_test_{}_{}.json",
            std::process::id(),
            counter
        ));
        path.to_string_lossy().to_string()
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(format!("{}.tmp", path));
    }

    fn sample_channel(content_id: &str) -> PaymentChannel {
        PaymentChannel::new(
            1,
            address!("1111111111111111111111111111111111111111"),
            address!("2222222222222222222222222222222222222222"),
            content_id,
            Amount::from_u128_with_scale(5, 0),
        )
        .unwrap()
    }

    fn sample_event(block: u64) -> BlockchainEvent {
        BlockchainEvent {
            network_id: 1,
            contract_type: ContractKind::LazyContentMinter,
            event_name: "ContentMinted".to_string(),
            transaction_hash: format!("0x{:064x}", block),
            block_number: block,
            log_index: 0,
            return_values: serde_json::json!({"contentId": "0x01"}),
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_nonexistent_starts_empty() {
        let path = unique_store_path();
        let store = FileStore::open(&path).unwrap();
        assert!(store.channel("anything").await.unwrap().is_none());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let path = unique_store_path();
        let channel_id;
        {
            let store = FileStore::open(&path).unwrap();
            let channel = sample_channel("content-1");
            channel_id = channel.id.clone();
            store.put_channel(channel).await.unwrap();
            store.insert_event(sample_event(100)).await.unwrap();
            store
                .set_cursor(1, ContractKind::LazyContentMinter, 100)
                .await
                .unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert!(store.channel(&channel_id).await.unwrap().is_some());
        assert_eq!(
            store.cursor(1, ContractKind::LazyContentMinter).await.unwrap(),
            Some(100)
        );
        // Dedup index is rebuilt from the loaded events.
        assert!(!store.insert_event(sample_event(100)).await.unwrap());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let path = unique_store_path();
        let store = FileStore::open(&path).unwrap();
        store.put_channel(sample_channel("content-2")).await.unwrap();

        assert!(PathBuf::from(&path).exists());
        assert!(!PathBuf::from(format!("{}.tmp", path)).exists());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = unique_store_path();
        fs::write(&path, "not json {").unwrap();

        match FileStore::open(&path) {
            Err(StoreError::ParseError { .. }) => {}
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
        cleanup(&path);
    }
}
