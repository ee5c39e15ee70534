//! Durable state behind the service: payment channels, ingested events and
//! sync cursors. Two backends share one trait so tests and offline runs use
//! the in-memory store while deployments persist to disk.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::channel::PaymentChannel;
use crate::events::{BlockchainEvent, ContractKind, EventKey};

/// Errors that can occur during store operations
#[derive(Debug)]
pub enum StoreError {
    // Load errors
    ReadError { path: String, reason: String },
    ParseError { reason: String },

    // Persist errors
    SerializeError { reason: String },
    TempFileError { reason: String },
    WriteError { path: String, reason: String },
    RenameError { from: String, to: String, reason: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ReadError { path, reason } => {
                write!(f, "Failed to read '{}': {}", path, reason)
            }
            StoreError::ParseError { reason } => write!(f, "Failed to parse store: {}", reason),
            StoreError::SerializeError { reason } => {
                write!(f, "Failed to serialize store: {}", reason)
            }
            StoreError::TempFileError { reason } => {
                write!(f, "Failed to create temp file: {}", reason)
            }
            StoreError::WriteError { path, reason } => {
                write!(f, "Failed to write '{}': {}", path, reason)
            }
            StoreError::RenameError { from, to, reason } => {
                write!(f, "Failed to rename '{}' to '{}': {}", from, to, reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence seam for channels, events and cursors.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or replaces a channel keyed by its id.
    async fn put_channel(&self, channel: PaymentChannel) -> Result<(), StoreError>;

    async fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, StoreError>;

    /// All channels opened by `sender`, newest first.
    async fn channels_for_sender(&self, sender: Address)
        -> Result<Vec<PaymentChannel>, StoreError>;

    async fn event_exists(&self, key: &EventKey) -> Result<bool, StoreError>;

    /// Inserts an event unless its key is already present. Returns whether
    /// the event was new.
    async fn insert_event(&self, event: BlockchainEvent) -> Result<bool, StoreError>;

    /// Stored events for one contract on one network, newest first.
    async fn events_for(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        limit: usize,
    ) -> Result<Vec<BlockchainEvent>, StoreError>;

    async fn cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
    ) -> Result<Option<u64>, StoreError>;

    async fn set_cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        block: u64,
    ) -> Result<(), StoreError>;
}

/// Store backend picked by configuration.
pub enum AnyStore {
    Memory(MemoryStore),
    File(FileStore),
}

#[async_trait]
impl Store for AnyStore {
    async fn put_channel(&self, channel: PaymentChannel) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(store) => store.put_channel(channel).await,
            AnyStore::File(store) => store.put_channel(channel).await,
        }
    }

    async fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.channel(channel_id).await,
            AnyStore::File(store) => store.channel(channel_id).await,
        }
    }

    async fn channels_for_sender(
        &self,
        sender: Address,
    ) -> Result<Vec<PaymentChannel>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.channels_for_sender(sender).await,
            AnyStore::File(store) => store.channels_for_sender(sender).await,
        }
    }

    async fn event_exists(&self, key: &EventKey) -> Result<bool, StoreError> {
        match self {
            AnyStore::Memory(store) => store.event_exists(key).await,
            AnyStore::File(store) => store.event_exists(key).await,
        }
    }

    async fn insert_event(&self, event: BlockchainEvent) -> Result<bool, StoreError> {
        match self {
            AnyStore::Memory(store) => store.insert_event(event).await,
            AnyStore::File(store) => store.insert_event(event).await,
        }
    }

    async fn events_for(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        limit: usize,
    ) -> Result<Vec<BlockchainEvent>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.events_for(network_id, contract_type, limit).await,
            AnyStore::File(store) => store.events_for(network_id, contract_type, limit).await,
        }
    }

    async fn cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
    ) -> Result<Option<u64>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.cursor(network_id, contract_type).await,
            AnyStore::File(store) => store.cursor(network_id, contract_type).await,
        }
    }

    async fn set_cursor(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        block: u64,
    ) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(store) => store.set_cursor(network_id, contract_type, block).await,
            AnyStore::File(store) => store.set_cursor(network_id, contract_type, block).await,
        }
    }
}
