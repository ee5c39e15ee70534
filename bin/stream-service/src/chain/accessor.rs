//! The cached read path for contract state, gas, blocks and content

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use common::cache::{CacheStore, CacheTiers};
use common::chain::{BlockSummary, ChainClient, TransactionDetails};
use common::events::ContractKind;
use common::network::NetworkRegistry;
use common::resilience::{BreakerConfig, CallGuard, RetryPolicy};

use super::errors::AccessorError;
use super::fetcher::{AnyFetcher, ContentFetcher};

/// Upper bound on a single block-window request.
const MAX_BLOCK_WINDOW: u64 = 50;

struct NetworkHandle<C> {
    client: Arc<C>,
    guard: CallGuard,
}

/// Read-side facade over the per-network chain clients and the IPFS gateway.
/// Every lookup is cached in the tier matching its volatility and every
/// upstream call runs under a retry/breaker guard, one breaker per network
/// plus one for the gateway.
pub struct BlockchainDataAccessor<C> {
    networks: HashMap<u64, NetworkHandle<C>>,
    registry: NetworkRegistry,
    cache: Arc<CacheStore>,
    tiers: CacheTiers,
    fetcher: AnyFetcher,
    ipfs_guard: CallGuard,
}

impl<C: ChainClient> BlockchainDataAccessor<C> {
    pub fn new(
        clients: HashMap<u64, Arc<C>>,
        registry: NetworkRegistry,
        cache: Arc<CacheStore>,
        tiers: CacheTiers,
        fetcher: AnyFetcher,
        retry: RetryPolicy,
        breaker: BreakerConfig,
    ) -> Self {
        let networks = clients
            .into_iter()
            .map(|(network_id, client)| {
                let handle = NetworkHandle {
                    client,
                    guard: CallGuard::new(retry, breaker),
                };
                (network_id, handle)
            })
            .collect();

        Self {
            networks,
            registry,
            cache,
            tiers,
            fetcher,
            ipfs_guard: CallGuard::new(retry, breaker),
        }
    }

    fn network(&self, network_id: u64) -> Result<&NetworkHandle<C>, AccessorError> {
        self.networks
            .get(&network_id)
            .ok_or(AccessorError::UnsupportedNetwork { network_id })
    }

    fn contract_address(
        &self,
        network_id: u64,
        contract_type: ContractKind,
    ) -> Result<Address, AccessorError> {
        self.registry
            .contract_address(network_id, contract_type)
            .ok_or(AccessorError::ContractNotConfigured {
                contract_type,
                network_id,
            })
    }

    /// Cached contract read. The key covers every call parameter, so two
    /// reads with different args never share an entry.
    pub async fn contract_data(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        method: &str,
        args: &Value,
        ttl: Option<std::time::Duration>,
    ) -> Result<Value, AccessorError> {
        let args_key = serde_json::to_string(args).unwrap_or_default();
        let key = format!(
            "contract:{}:{}:{}:{}",
            network_id, contract_type, method, args_key
        );
        let ttl = ttl.unwrap_or(self.tiers.default);

        self.cache
            .get_or_set(&key, ttl, || async {
                debug!(key, "cache miss, fetching from chain");
                self.read_contract(network_id, contract_type, method, args)
                    .await
            })
            .await
    }

    async fn read_contract(
        &self,
        network_id: u64,
        contract_type: ContractKind,
        method: &str,
        args: &Value,
    ) -> Result<Value, AccessorError> {
        let handle = self.network(network_id)?;
        let address = self.contract_address(network_id, contract_type)?;

        match (contract_type, method) {
            (ContractKind::StreamToken, "balanceOf") => {
                let owner = parse_address(args, 0)?;
                let balance = handle
                    .guard
                    .run("balanceOf", || {
                        handle.client.token_balance(address, owner)
                    })
                    .await?;
                Ok(Value::String(balance.to_string()))
            }
            (ContractKind::StreamAmm, "getSwapQuote") => {
                let token_in = parse_address(args, 0)?;
                let token_out = parse_address(args, 1)?;
                let amount_in = parse_u256(args, 2)?;
                let quote = handle
                    .guard
                    .run("getSwapQuote", || {
                        handle
                            .client
                            .swap_quote(address, token_in, token_out, amount_in)
                    })
                    .await?;
                Ok(json!({
                    "amountOut": quote.amount_out.to_string(),
                    "fee": quote.fee.to_string(),
                }))
            }
            (ContractKind::LazyContentMinter, "isContentMinted") => {
                let content_id = parse_b256(args, 0)?;
                let minted = handle
                    .guard
                    .run("isContentMinted", || {
                        handle.client.content_minted(address, content_id)
                    })
                    .await?;
                Ok(Value::Bool(minted))
            }
            _ => Err(AccessorError::UnsupportedMethod {
                contract_type,
                method: method.to_string(),
            }),
        }
    }

    /// Gas price plus a congestion signal from the latest block. Short TTL,
    /// gas moves block to block.
    pub async fn gas_estimate(&self, network_id: u64) -> Result<Value, AccessorError> {
        let key = format!("gas:{}", network_id);

        self.cache
            .get_or_set(&key, self.tiers.short, || async {
                let handle = self.network(network_id)?;
                let (gas_price, block) = handle
                    .guard
                    .run("gas_estimate", || async {
                        let gas_price = handle.client.gas_price().await?;
                        let block = handle.client.latest_block().await?;
                        Ok::<_, common::chain::ChainError>((gas_price, block))
                    })
                    .await?;

                Ok(json!({
                    "gasPrice": gas_price.to_string(),
                    "congestion": block.utilization(),
                    "timestamp": Utc::now().timestamp_millis(),
                    "blockNumber": block.number,
                }))
            })
            .await
    }

    /// Immutable content metadata, cached in the long tier.
    pub async fn content_metadata(&self, cid: &str) -> Result<Value, AccessorError> {
        if cid.is_empty() {
            return Err(AccessorError::InvalidParams {
                reason: "ipfs hash must not be empty".to_string(),
            });
        }

        let key = format!("ipfs:{}", cid);
        self.cache
            .get_or_set(&key, self.tiers.long, || async {
                debug!(cid, "cache miss, fetching from gateway");
                let metadata = self
                    .ipfs_guard
                    .run("ipfs_fetch", || self.fetcher.fetch(cid))
                    .await?;
                Ok::<_, AccessorError>(metadata)
            })
            .await
    }

    /// The most recent `count` blocks, newest first.
    pub async fn block_window(&self, network_id: u64, count: u64) -> Result<Value, AccessorError> {
        let count = count.clamp(1, MAX_BLOCK_WINDOW);
        let key = format!("blocks:{}:{}", network_id, count);

        self.cache
            .get_or_set(&key, self.tiers.short, || async {
                let handle = self.network(network_id)?;
                let blocks = handle
                    .guard
                    .run("block_window", || handle.client.block_window(count))
                    .await?;
                Ok(Value::Array(
                    blocks.iter().map(block_payload).collect(),
                ))
            })
            .await
    }

    /// Transaction details including receipt status. Pending transactions
    /// resolve on a later lookup once the short TTL lapses; a missing hash is
    /// an error and never cached.
    pub async fn transaction(&self, network_id: u64, tx_hash: &str) -> Result<Value, AccessorError> {
        let tx_hash = B256::from_str(tx_hash).map_err(|_| AccessorError::InvalidParams {
            reason: format!("invalid transaction hash: {}", tx_hash),
        })?;
        let key = format!("tx:{}:{:#x}", network_id, tx_hash);

        self.cache
            .get_or_set(&key, self.tiers.short, || async {
                let handle = self.network(network_id)?;
                let details = handle
                    .guard
                    .run("transaction_details", || {
                        handle.client.transaction_details(tx_hash)
                    })
                    .await?;
                Ok(tx_payload(&details))
            })
            .await
    }

    pub async fn cache_stats(&self) -> common::cache::CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self, namespace: Option<&str>) {
        self.cache.clear(namespace).await;
    }
}

fn block_payload(block: &BlockSummary) -> Value {
    json!({
        "number": block.number,
        "hash": block.hash.to_string(),
        "timestamp": block.timestamp,
        "gasUsed": block.gas_used,
        "gasLimit": block.gas_limit,
        "transactionCount": block.transaction_count,
        "utilization": block.utilization(),
    })
}

fn tx_payload(details: &TransactionDetails) -> Value {
    json!({
        "hash": details.hash.to_string(),
        "from": details.from.to_string(),
        "to": details.to.map(|to| to.to_string()),
        "value": details.value.to_string(),
        "blockNumber": details.block_number,
        "gasUsed": details.gas_used,
        "status": details.status.to_string(),
    })
}

fn arg_str<'a>(args: &'a Value, index: usize) -> Result<&'a str, AccessorError> {
    args.as_array()
        .and_then(|items| items.get(index))
        .and_then(Value::as_str)
        .ok_or_else(|| AccessorError::InvalidParams {
            reason: format!("argument {} must be a string", index),
        })
}

fn parse_address(args: &Value, index: usize) -> Result<Address, AccessorError> {
    let raw = arg_str(args, index)?;
    Address::from_str(raw).map_err(|_| AccessorError::InvalidParams {
        reason: format!("argument {} is not an address: {}", index, raw),
    })
}

fn parse_b256(args: &Value, index: usize) -> Result<B256, AccessorError> {
    let raw = arg_str(args, index)?;
    B256::from_str(raw).map_err(|_| AccessorError::InvalidParams {
        reason: format!("argument {} is not a 32-byte hash: {}", index, raw),
    })
}

fn parse_u256(args: &Value, index: usize) -> Result<U256, AccessorError> {
    let raw = arg_str(args, index)?;
    U256::from_str(raw).map_err(|_| AccessorError::InvalidParams {
        reason: format!("argument {} is not an unsigned integer: {}", index, raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fetcher::FixtureFetcher;
    use common::chain::{FakeChainClient, SwapQuote, TxStatus};
    use common::network::NetworkRegistry;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            factor: 2.0,
        }
    }

    fn make_accessor() -> (BlockchainDataAccessor<FakeChainClient>, Arc<FakeChainClient>) {
        let client = Arc::new(FakeChainClient::new());
        let mut clients = HashMap::new();
        clients.insert(1u64, client.clone());

        let fetcher = FixtureFetcher::new();
        fetcher.insert(
            "QmDemo",
            json!({ "title": "Launch teaser", "duration": 42 }),
        );

        let accessor = BlockchainDataAccessor::new(
            clients,
            NetworkRegistry::new(NetworkRegistry::mainnet_defaults()),
            Arc::new(CacheStore::new()),
            CacheTiers::default(),
            AnyFetcher::Fixture(fetcher),
            fast_retry(),
            BreakerConfig::default(),
        );
        (accessor, client)
    }

    fn token_address() -> Address {
        NetworkRegistry::new(NetworkRegistry::mainnet_defaults())
            .contract_address(1, ContractKind::StreamToken)
            .unwrap()
    }

    #[tokio::test]
    async fn test_balance_read_is_cached() {
        let (accessor, client) = make_accessor();
        let owner = Address::repeat_byte(0xaa);
        client.set_balance(token_address(), owner, U256::from(1_500u64));

        let args = json!([owner.to_string()]);
        for _ in 0..3 {
            let value = accessor
                .contract_data(1, ContractKind::StreamToken, "balanceOf", &args, None)
                .await
                .unwrap();
            assert_eq!(value, Value::String("1500".to_string()));
        }

        assert_eq!(client.calls("token_balance"), 1);
    }

    #[tokio::test]
    async fn test_swap_quote_payload() {
        let (accessor, client) = make_accessor();
        let registry = NetworkRegistry::new(NetworkRegistry::mainnet_defaults());
        let token_in = registry.contract_address(1, ContractKind::StreamToken).unwrap();
        let token_out = Address::repeat_byte(0x02);
        client.set_quote(
            token_in,
            token_out,
            SwapQuote {
                amount_out: U256::from(997u64),
                fee: U256::from(3u64),
            },
        );

        let args = json!([token_in.to_string(), token_out.to_string(), "1000"]);
        let value = accessor
            .contract_data(1, ContractKind::StreamAmm, "getSwapQuote", &args, None)
            .await
            .unwrap();

        assert_eq!(value["amountOut"], "997");
        assert_eq!(value["fee"], "3");
    }

    #[tokio::test]
    async fn test_minted_flag() {
        let (accessor, client) = make_accessor();
        let content_id = B256::repeat_byte(0x11);
        client.set_minted(content_id);

        let args = json!([content_id.to_string()]);
        let value = accessor
            .contract_data(1, ContractKind::LazyContentMinter, "isContentMinted", &args, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Bool(true));

        let other = json!([B256::repeat_byte(0x22).to_string()]);
        let value = accessor
            .contract_data(1, ContractKind::LazyContentMinter, "isContentMinted", &other, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_unsupported_method_and_network() {
        let (accessor, _) = make_accessor();

        let err = accessor
            .contract_data(1, ContractKind::StreamToken, "transfer", &json!([]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessorError::UnsupportedMethod { .. }));

        let err = accessor
            .contract_data(999, ContractKind::StreamToken, "balanceOf", &json!([]), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported network ID: 999");
    }

    #[tokio::test]
    async fn test_hub_address_missing() {
        let (accessor, _) = make_accessor();
        let err = accessor
            .read_contract(1, ContractKind::PaymentHub, "balanceOf", &json!([]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Contract address not found for paymentHub on network 1"
        );
    }

    #[tokio::test]
    async fn test_bad_args_are_rejected() {
        let (accessor, client) = make_accessor();

        let err = accessor
            .contract_data(1, ContractKind::StreamToken, "balanceOf", &json!(["nope"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessorError::InvalidParams { .. }));
        assert_eq!(client.calls("token_balance"), 0);
    }

    #[tokio::test]
    async fn test_gas_estimate_payload() {
        let (accessor, client) = make_accessor();
        client.set_gas_price(25_000_000_000);

        let value = accessor.gas_estimate(1).await.unwrap();
        assert_eq!(value["gasPrice"], "25000000000");
        assert_eq!(value["blockNumber"], 1_000_000);
        // Synthesized blocks burn half their gas limit.
        assert!((value["congestion"].as_f64().unwrap() - 0.5).abs() < 1e-9);

        accessor.gas_estimate(1).await.unwrap();
        assert_eq!(client.calls("gas_price"), 1);
    }

    #[tokio::test]
    async fn test_block_window_newest_first() {
        let (accessor, client) = make_accessor();
        client.set_head_block(500);

        let value = accessor.block_window(1, 3).await.unwrap();
        let numbers: Vec<u64> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|block| block["number"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![500, 499, 498]);

        accessor.block_window(1, 3).await.unwrap();
        assert_eq!(client.calls("block_window"), 1);
    }

    #[tokio::test]
    async fn test_missing_transaction_is_not_cached() {
        let (accessor, client) = make_accessor();
        let tx_hash = B256::repeat_byte(0x99);

        for _ in 0..2 {
            let err = accessor
                .transaction(1, &tx_hash.to_string())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AccessorError::Chain(common::chain::ChainError::TxNotFound { .. })
            ));
        }

        // Both lookups must reach the chain, a miss is never cached.
        assert_eq!(client.calls("transaction_details"), 2);
    }

    #[tokio::test]
    async fn test_transaction_payload() {
        let (accessor, client) = make_accessor();
        let tx_hash = B256::repeat_byte(0x42);
        client.insert_transaction(TransactionDetails {
            hash: tx_hash,
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x02)),
            value: U256::from(7u64),
            block_number: Some(123),
            gas_used: Some(21_000),
            status: TxStatus::Success,
        });

        let value = accessor.transaction(1, &tx_hash.to_string()).await.unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["blockNumber"], 123);
        assert_eq!(value["value"], "7");
    }

    #[tokio::test]
    async fn test_content_metadata_cached_and_missing() {
        let (accessor, _) = make_accessor();

        let metadata = accessor.content_metadata("QmDemo").await.unwrap();
        assert_eq!(metadata["title"], "Launch teaser");

        let err = accessor.content_metadata("QmUnknown").await.unwrap_err();
        assert_eq!(err.to_string(), "Content not found: QmUnknown");

        let stats = accessor.cache_stats().await;
        assert_eq!(stats.keys, 1);
    }

    #[tokio::test]
    async fn test_transient_rpc_failure_is_retried() {
        let (accessor, client) = make_accessor();
        let owner = Address::repeat_byte(0xaa);
        client.set_balance(token_address(), owner, U256::from(10u64));
        client.fail_next(1, "connection reset by peer");

        let args = json!([owner.to_string()]);
        let value = accessor
            .contract_data(1, ContractKind::StreamToken, "balanceOf", &args, None)
            .await
            .unwrap();
        assert_eq!(value, Value::String("10".to_string()));
        assert_eq!(client.calls("token_balance"), 2);
    }
}
