//! RPC-backed [`ChainClient`] built on alloy providers.

use alloy::consensus::Transaction;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::client::ChainClient;
use super::errors::ChainError;
use super::types::{BlockSummary, EventLog, SwapQuote, TransactionDetails, TxOutcome, TxStatus};
use crate::events::ContractKind;
use crate::interfaces::lazy_content_minter::{ContentMinted, ContentRegistered, ILazyContentMinter};
use crate::interfaces::payment_channel_hub::{
    ChannelClosed, ChannelOpened, IPaymentChannelHub, PaymentCommitted,
};
use crate::interfaces::stream_amm::{IStreamAmm, LiquidityAdded, TokenSwapped};
use crate::interfaces::stream_token::{Approval, IStreamToken, Transfer};

fn rpc_err(err: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(err.to_string())
}

/// One network's RPC access. Generic over the alloy provider type to
/// support both read-only and wallet-backed providers.
///
/// With `dry_run` set, submission methods log the would-be transaction and
/// return a fabricated successful outcome without broadcasting anything.
pub struct AlloyChainClient<P: Provider + Clone> {
    provider: P,
    network_id: u64,
    signer_address: Option<Address>,
    dry_run: bool,
}

impl<P> AlloyChainClient<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P, network_id: u64, signer_address: Option<Address>, dry_run: bool) -> Self {
        Self {
            provider,
            network_id,
            signer_address,
            dry_run,
        }
    }

    pub fn network_id(&self) -> u64 {
        self.network_id
    }

    fn require_signer(&self) -> Result<Address, ChainError> {
        self.signer_address.ok_or_else(|| {
            ChainError::NotConfigured(format!(
                "no signer configured for network {}",
                self.network_id
            ))
        })
    }

    async fn block_by_number(&self, number: BlockNumberOrTag) -> Result<BlockSummary, ChainError> {
        let block = self
            .provider
            .get_block_by_number(number)
            .await
            .map_err(rpc_err)?
            .ok_or(ChainError::BlockNotFound {
                number: match number {
                    BlockNumberOrTag::Number(n) => n,
                    _ => 0,
                },
            })?;

        Ok(BlockSummary {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
            gas_used: block.header.gas_used as u64,
            gas_limit: block.header.gas_limit as u64,
            transaction_count: block.transactions.len(),
        })
    }

    async fn submit(&self, to: Address, input: Vec<u8>, label: &str) -> Result<TxOutcome, ChainError> {
        if self.dry_run {
            let tx_hash = keccak256([to.as_slice(), label.as_bytes(), &input].concat());
            info!(
                network_id = self.network_id,
                %to,
                label,
                %tx_hash,
                "dry run, transaction not broadcast"
            );
            return Ok(TxOutcome {
                tx_hash,
                block_number: None,
                gas_used: None,
                status: TxStatus::Success,
            });
        }

        let tx = TransactionRequest::default().to(to).input(input.into());
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::TxRejected(format!("{label}: {e}")))?;
        let receipt = pending.get_receipt().await.map_err(rpc_err)?;

        if !receipt.status() {
            return Err(ChainError::TxRejected(format!(
                "{label} reverted in tx {}",
                receipt.transaction_hash
            )));
        }

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: Some(receipt.gas_used as u64),
            status: TxStatus::Success,
        })
    }
}

/// Decodes one raw log into the named-fields shape handlers consume.
/// Returns None for unmined logs and for topics outside the contract's ABI.
fn decode_event_log(kind: ContractKind, log: &Log) -> Option<EventLog> {
    let topic0 = *log.topic0()?;
    let block_number = log.block_number?;
    let transaction_hash = log.transaction_hash?;
    let log_index = log.log_index?;

    let (event_name, fields) = match kind {
        ContractKind::StreamToken => {
            if topic0 == Transfer::SIGNATURE_HASH {
                let ev = log.log_decode::<Transfer>().ok()?;
                (
                    "Transfer",
                    json!({
                        "from": ev.inner.from.to_string(),
                        "to": ev.inner.to.to_string(),
                        "value": ev.inner.value.to_string(),
                    }),
                )
            } else if topic0 == Approval::SIGNATURE_HASH {
                let ev = log.log_decode::<Approval>().ok()?;
                (
                    "Approval",
                    json!({
                        "owner": ev.inner.owner.to_string(),
                        "spender": ev.inner.spender.to_string(),
                        "value": ev.inner.value.to_string(),
                    }),
                )
            } else {
                return None;
            }
        }
        ContractKind::StreamAmm => {
            if topic0 == LiquidityAdded::SIGNATURE_HASH {
                let ev = log.log_decode::<LiquidityAdded>().ok()?;
                (
                    "LiquidityAdded",
                    json!({
                        "provider": ev.inner.provider.to_string(),
                        "tokenAmount": ev.inner.tokenAmount.to_string(),
                        "baseAmount": ev.inner.baseAmount.to_string(),
                    }),
                )
            } else if topic0 == TokenSwapped::SIGNATURE_HASH {
                let ev = log.log_decode::<TokenSwapped>().ok()?;
                (
                    "TokenSwapped",
                    json!({
                        "trader": ev.inner.trader.to_string(),
                        "tokenIn": ev.inner.tokenIn.to_string(),
                        "tokenOut": ev.inner.tokenOut.to_string(),
                        "amountIn": ev.inner.amountIn.to_string(),
                        "amountOut": ev.inner.amountOut.to_string(),
                    }),
                )
            } else {
                return None;
            }
        }
        ContractKind::LazyContentMinter => {
            if topic0 == ContentRegistered::SIGNATURE_HASH {
                let ev = log.log_decode::<ContentRegistered>().ok()?;
                (
                    "ContentRegistered",
                    json!({
                        "contentId": ev.inner.contentId.to_string(),
                        "creator": ev.inner.creator.to_string(),
                        "price": ev.inner.price.to_string(),
                    }),
                )
            } else if topic0 == ContentMinted::SIGNATURE_HASH {
                let ev = log.log_decode::<ContentMinted>().ok()?;
                (
                    "ContentMinted",
                    json!({
                        "contentId": ev.inner.contentId.to_string(),
                        "minter": ev.inner.minter.to_string(),
                    }),
                )
            } else {
                return None;
            }
        }
        ContractKind::PaymentHub => {
            if topic0 == ChannelOpened::SIGNATURE_HASH {
                let ev = log.log_decode::<ChannelOpened>().ok()?;
                (
                    "ChannelOpened",
                    json!({
                        "channelRef": ev.inner.channelRef.to_string(),
                        "sender": ev.inner.sender.to_string(),
                        "receiver": ev.inner.receiver.to_string(),
                        "deposit": ev.inner.deposit.to_string(),
                    }),
                )
            } else if topic0 == PaymentCommitted::SIGNATURE_HASH {
                let ev = log.log_decode::<PaymentCommitted>().ok()?;
                (
                    "PaymentCommitted",
                    json!({
                        "channelRef": ev.inner.channelRef.to_string(),
                        "amount": ev.inner.amount.to_string(),
                    }),
                )
            } else if topic0 == ChannelClosed::SIGNATURE_HASH {
                let ev = log.log_decode::<ChannelClosed>().ok()?;
                (
                    "ChannelClosed",
                    json!({
                        "channelRef": ev.inner.channelRef.to_string(),
                        "settled": ev.inner.settled.to_string(),
                    }),
                )
            } else {
                return None;
            }
        }
    };

    Some(EventLog {
        event_name: event_name.to_string(),
        block_number,
        transaction_hash,
        log_index,
        fields,
    })
}

#[async_trait]
impl<P> ChainClient for AlloyChainClient<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(rpc_err)
    }

    async fn latest_block(&self) -> Result<BlockSummary, ChainError> {
        self.block_by_number(BlockNumberOrTag::Latest).await
    }

    async fn block_window(&self, count: u64) -> Result<Vec<BlockSummary>, ChainError> {
        let head = self.block_number().await?;
        let mut blocks = Vec::with_capacity(count as usize);
        for offset in 0..count {
            if offset > head {
                break;
            }
            let number = head - offset;
            blocks.push(
                self.block_by_number(BlockNumberOrTag::Number(number))
                    .await?,
            );
        }
        Ok(blocks)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.provider.get_gas_price().await.map_err(rpc_err)
    }

    async fn transaction_details(&self, tx_hash: B256) -> Result<TransactionDetails, ChainError> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(rpc_err)?
            .ok_or(ChainError::TxNotFound { tx_hash })?;

        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(rpc_err)?;

        let (status, gas_used, block_number) = match receipt {
            Some(receipt) => (
                if receipt.status() {
                    TxStatus::Success
                } else {
                    TxStatus::Failed
                },
                Some(receipt.gas_used as u64),
                receipt.block_number,
            ),
            None => (TxStatus::Pending, None, None),
        };

        Ok(TransactionDetails {
            hash: tx_hash,
            from: tx.from(),
            to: tx.to(),
            value: tx.value(),
            block_number,
            gas_used,
            status,
        })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let token = IStreamToken::new(token, &self.provider);
        token.balanceOf(owner).call().await.map_err(rpc_err)
    }

    async fn swap_quote(
        &self,
        amm: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<SwapQuote, ChainError> {
        let amm = IStreamAmm::new(amm, &self.provider);
        let quote = amm
            .getSwapQuote(token_in, token_out, amount_in)
            .call()
            .await
            .map_err(rpc_err)?;

        Ok(SwapQuote {
            amount_out: quote.amountOut,
            fee: quote.fee,
        })
    }

    async fn content_minted(
        &self,
        minter: Address,
        content_id: B256,
    ) -> Result<bool, ChainError> {
        let minter = ILazyContentMinter::new(minter, &self.provider);
        minter
            .isContentMinted(content_id)
            .call()
            .await
            .map_err(rpc_err)
    }

    async fn contract_events(
        &self,
        kind: ContractKind,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError> {
        let filter = Filter::new()
            .address(address)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(rpc_err)?;

        let mut events = Vec::new();
        for log in &logs {
            match decode_event_log(kind, log) {
                Some(event) => events.push(event),
                None => {
                    debug!(
                        network_id = self.network_id,
                        contract = %kind,
                        topic0 = ?log.topic0(),
                        "skipping log outside contract ABI"
                    );
                }
            }
        }

        debug!(
            network_id = self.network_id,
            contract = %kind,
            from_block,
            to_block,
            event_count = events.len(),
            "fetched contract events"
        );

        Ok(events)
    }

    async fn open_channel(
        &self,
        token: Address,
        hub: Address,
        receiver: Address,
        deposit: U256,
        channel_ref: B256,
    ) -> Result<TxOutcome, ChainError> {
        if !self.dry_run {
            let owner = self.require_signer()?;

            let allowance = IStreamToken::new(token, &self.provider)
                .allowance(owner, hub)
                .call()
                .await
                .map_err(rpc_err)?;

            if allowance < deposit {
                let approve = IStreamToken::approveCall {
                    spender: hub,
                    amount: deposit,
                };
                self.submit(token, approve.abi_encode(), "approve").await?;
            }
        }

        info!(
            network_id = self.network_id,
            %hub,
            %receiver,
            deposit = %deposit,
            "💰 opening payment channel on-chain"
        );

        let call = IPaymentChannelHub::openChannelCall {
            receiver,
            token,
            deposit,
            channelRef: channel_ref,
        };
        self.submit(hub, call.abi_encode(), "openChannel").await
    }

    async fn commit_payment(
        &self,
        hub: Address,
        channel_ref: B256,
        amount: U256,
        signature: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        let call = IPaymentChannelHub::commitPaymentCall {
            channelRef: channel_ref,
            amount,
            signature,
        };
        self.submit(hub, call.abi_encode(), "commitPayment").await
    }

    async fn close_channel(&self, hub: Address, channel_ref: B256) -> Result<TxOutcome, ChainError> {
        info!(network_id = self.network_id, %channel_ref, "closing payment channel on-chain");

        let call = IPaymentChannelHub::closeChannelCall {
            channelRef: channel_ref,
        };
        self.submit(hub, call.abi_encode(), "closeChannel").await
    }
}
