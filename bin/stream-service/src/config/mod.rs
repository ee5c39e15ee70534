use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use common::cache::CacheTiers;
use common::events::ContractKind;
use common::network::{NetworkDescriptor, NetworkRegistry};
use common::resilience::{BreakerConfig, RetryPolicy};
use event_sync::SyncConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub networks: Vec<NetworkDescriptor>,
    pub ipfs: IpfsConfig,
    pub payment: PaymentConfig,
    pub sync: SyncSettings,
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub short_ttl_secs: u64,
    pub default_ttl_secs: u64,
    pub long_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_ttl_secs: 300,
            default_ttl_secs: 3600,
            long_ttl_secs: 86400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Fetch content through the configured HTTP gateway
    Gateway,
    /// Serve canned fixtures, no sockets opened
    Fixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfsConfig {
    pub gateway: String,
    pub timeout_secs: u64,
    pub mode: FetchMode,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            gateway: "https://ipfs.io/ipfs/".to_string(),
            timeout_secs: 10,
            mode: FetchMode::Gateway,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Streaming rate in tokens per second of playback
    pub stream_rate_per_sec: f64,
    pub auto_commit_enabled: bool,
    pub auto_commit_interval_secs: u64,
    /// Hex-encoded signing key; normally injected via PRIVATE_KEY
    pub private_key: Option<String>,
    /// When set, channel transactions are logged but never broadcast
    pub dry_run: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stream_rate_per_sec: 0.00001,
            auto_commit_enabled: true,
            auto_commit_interval_secs: 60,
            private_key: None,
            dry_run: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub max_block_span: u64,
    /// Background sync interval; None disables the loop
    pub auto_sync_interval_secs: Option<u64>,
    /// Contracts the background loop keeps in sync
    pub contracts: Vec<ContractKind>,
    pub abort_on_handler_failure: HashMap<ContractKind, bool>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_block_span: 10_000,
            auto_sync_interval_secs: None,
            contracts: vec![ContractKind::LazyContentMinter, ContractKind::StreamAmm],
            abort_on_handler_failure: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: "data/stream-store.json".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            networks: NetworkRegistry::mainnet_defaults(),
            ipfs: IpfsConfig::default(),
            payment: PaymentConfig::default(),
            sync: SyncSettings::default(),
            store: StoreConfig::default(),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub async fn load_from_file(path: &Path) -> eyre::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Environment overrides, applied after the file load. RPC URLs use the
    /// per-network names (ETH_RPC_URL, POLYGON_RPC_URL, ...), the rest are
    /// PORT, IPFS_GATEWAY and PRIVATE_KEY.
    pub fn with_env_overrides(mut self) -> Self {
        const RPC_VARS: &[(u64, &str)] = &[
            (1, "ETH_RPC_URL"),
            (137, "POLYGON_RPC_URL"),
            (42161, "ARBITRUM_RPC_URL"),
            (10, "OPTIMISM_RPC_URL"),
            (8453, "BASE_RPC_URL"),
        ];

        for (network_id, var) in RPC_VARS {
            if let Ok(url) = std::env::var(var) {
                for network in &mut self.networks {
                    if network.network_id == *network_id {
                        network.rpc_url = url.clone();
                    }
                }
            }
        }

        if let Ok(gateway) = std::env::var("IPFS_GATEWAY") {
            self.ipfs.gateway = gateway;
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(key) = std::env::var("PRIVATE_KEY") {
            self.payment.private_key = Some(key);
        }

        self
    }

    pub fn cache_tiers(&self) -> CacheTiers {
        CacheTiers {
            short: std::time::Duration::from_secs(self.cache.short_ttl_secs),
            default: std::time::Duration::from_secs(self.cache.default_ttl_secs),
            long: std::time::Duration::from_secs(self.cache.long_ttl_secs),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_block_span: self.sync.max_block_span,
            abort_on_handler_failure: self.sync.abort_on_handler_failure.clone(),
        }
    }

    pub fn registry(&self) -> NetworkRegistry {
        NetworkRegistry::new(self.networks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_mainnets() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.networks.len(), 5);
        assert!(config.payment.dry_run);
        assert!((config.payment.stream_rate_per_sec - 0.00001).abs() < 1e-12);

        let registry = config.registry();
        assert!(registry.supports(1));
        assert!(registry.supports(8453));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"server": {"port": 8080}}"#).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.sync.max_block_span, 10_000);
    }

    #[test]
    fn test_round_trip() {
        let config = ServiceConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let loaded: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.networks.len(), config.networks.len());
        assert_eq!(loaded.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("PORT", "9999");
        std::env::set_var("ETH_RPC_URL", "http://localhost:8545");

        let config = ServiceConfig::default().with_env_overrides();
        assert_eq!(config.server.port, 9999);
        let eth = config.networks.iter().find(|n| n.network_id == 1).unwrap();
        assert_eq!(eth.rpc_url, "http://localhost:8545");

        std::env::remove_var("PORT");
        std::env::remove_var("ETH_RPC_URL");
    }

    #[test]
    fn test_cache_tiers_conversion() {
        let tiers = ServiceConfig::default().cache_tiers();
        assert_eq!(tiers.short.as_secs(), 300);
        assert_eq!(tiers.default.as_secs(), 3600);
        assert_eq!(tiers.long.as_secs(), 86400);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("stream_service_config_{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"payment": {"dry_run": false}}"#)
            .await
            .unwrap();

        let config = ServiceConfig::load_from_file(&path).await.unwrap();
        assert!(!config.payment.dry_run);
        assert!(config.payment.auto_commit_enabled);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
