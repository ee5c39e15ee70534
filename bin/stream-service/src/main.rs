use clap::Parser;
use eyre::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod chain;
mod config;
mod payment;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use api::{ApiServer, AppState};
use chain::{AnyFetcher, BlockchainDataAccessor, FixtureFetcher, HttpGatewayFetcher};
use common::cache::CacheStore;
use common::chain::{AlloyChainClient, ChainClient, FakeChainClient};
use common::store::{AnyStore, FileStore, MemoryStore};
use config::{FetchMode, ServiceConfig, StoreBackend};
use event_sync::EventSynchronizer;
use payment::ChannelManager;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the service configuration file
    #[arg(long, default_value = "./configs/service.json")]
    config_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Serve synthetic chain data instead of connecting to RPC endpoints
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stream Cache Service");

    // Load configuration
    let config_path = PathBuf::from(&cli.config_path);
    let config = if config_path.exists() {
        ServiceConfig::load_from_file(&config_path).await?
    } else {
        tracing::warn!("{} not found, using defaults", config_path.display());
        ServiceConfig::default()
    };
    let config = config.with_env_overrides();

    tracing::info!(
        port = config.server.port,
        networks = config.networks.len(),
        store = ?config.store.backend,
        "Config loaded"
    );

    let signer: Option<PrivateKeySigner> = match &config.payment.private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key.parse()?;
            tracing::info!(from = %signer.address(), "Wallet loaded for signing commitments");
            Some(signer)
        }
        None => None,
    };

    let store = match config.store.backend {
        StoreBackend::Memory => AnyStore::Memory(MemoryStore::new()),
        StoreBackend::File => AnyStore::File(FileStore::open(&config.store.path)?),
    };

    if cli.offline {
        tracing::info!("Offline mode, serving synthetic chain data");
        let clients: HashMap<_, _> = config
            .networks
            .iter()
            .map(|net| (net.network_id, Arc::new(FakeChainClient::new())))
            .collect();
        let fetcher = AnyFetcher::Fixture(FixtureFetcher::default());
        return run(config, clients, fetcher, store, signer).await;
    }

    let fetcher = match config.ipfs.mode {
        FetchMode::Gateway => AnyFetcher::Gateway(HttpGatewayFetcher::new(
            &config.ipfs.gateway,
            Duration::from_secs(config.ipfs.timeout_secs),
        )?),
        FetchMode::Fixture => AnyFetcher::Fixture(FixtureFetcher::default()),
    };

    // Wallet-backed and read-only providers are different types, so each arm
    // wires the full stack.
    match &signer {
        Some(key) => {
            let wallet = EthereumWallet::from(key.clone());
            let from = key.address();
            let mut clients = HashMap::new();
            for net in &config.networks {
                let provider = ProviderBuilder::new()
                    .wallet(wallet.clone())
                    .connect_http(net.rpc_url.parse()?);
                let client = AlloyChainClient::new(
                    provider,
                    net.network_id,
                    Some(from),
                    config.payment.dry_run,
                );
                clients.insert(net.network_id, Arc::new(client));
            }
            run(config, clients, fetcher, store, signer).await
        }
        None => {
            let mut clients = HashMap::new();
            for net in &config.networks {
                let provider = ProviderBuilder::new().connect_http(net.rpc_url.parse()?);
                let client =
                    AlloyChainClient::new(provider, net.network_id, None, config.payment.dry_run);
                clients.insert(net.network_id, Arc::new(client));
            }
            run(config, clients, fetcher, store, signer).await
        }
    }
}

async fn run<C>(
    config: ServiceConfig,
    clients: HashMap<u64, Arc<C>>,
    fetcher: AnyFetcher,
    store: AnyStore,
    signer: Option<PrivateKeySigner>,
) -> Result<()>
where
    C: ChainClient + 'static,
{
    let store = Arc::new(store);
    let cache = Arc::new(CacheStore::new());
    let registry = config.registry();

    let accessor = Arc::new(BlockchainDataAccessor::new(
        clients.clone(),
        registry.clone(),
        cache.clone(),
        config.cache_tiers(),
        fetcher,
        config.retry,
        config.breaker,
    ));

    let channels = Arc::new(ChannelManager::new(
        clients.clone(),
        registry.clone(),
        store.clone(),
        signer,
        &config.payment,
    ));

    let synchronizer = Arc::new(EventSynchronizer::new(
        clients,
        registry.clone(),
        store.clone(),
        cache,
        config.sync_config(),
    ));

    let state = AppState {
        accessor,
        channels: channels.clone(),
        synchronizer: synchronizer.clone(),
        store,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let server = ApiServer::new(state, addr);
    let cancel_token = server.cancel_token();

    let commit_handle = tokio::spawn(channels.clone().run_auto_commit(cancel_token.clone()));

    let sync_handle = config.sync.auto_sync_interval_secs.map(|secs| {
        let synchronizer = synchronizer.clone();
        let registry = registry.clone();
        let contracts = config.sync.contracts.clone();
        let cancel = cancel_token.clone();
        let interval = Duration::from_secs(secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                for network_id in registry.network_ids() {
                    for kind in &contracts {
                        if registry.contract_address(network_id, *kind).is_none() {
                            continue;
                        }
                        if let Err(err) = synchronizer.sync_events(network_id, *kind, 0).await {
                            tracing::warn!(network_id, contract = %kind, %err, "Scheduled sync failed");
                        }
                    }
                }
            }
        })
    });

    let server_handle = tokio::spawn(server.start());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    cancel_token.cancel();

    let _ = commit_handle.await;
    if let Some(handle) = sync_handle {
        let _ = handle.await;
    }
    if let Ok(result) = server_handle.await {
        result?;
    }

    tracing::info!("Stream Cache Service stopped");
    Ok(())
}
