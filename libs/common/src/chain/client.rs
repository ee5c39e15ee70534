use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use super::errors::ChainError;
use super::types::{BlockSummary, EventLog, SwapQuote, TransactionDetails, TxOutcome};
use crate::events::ContractKind;

/// One network's worth of chain access. Every component that touches a
/// network holds one client per chain id and nothing reaches for a raw
/// provider directly, so tests and offline runs swap in
/// [`super::FakeChainClient`] without touching call sites.
///
/// Read methods are point-in-time snapshots. Submission methods wait for
/// the transaction receipt before returning.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Summary of the head block.
    async fn latest_block(&self) -> Result<BlockSummary, ChainError>;

    /// Summaries of the most recent `count` blocks, newest first.
    async fn block_window(&self, count: u64) -> Result<Vec<BlockSummary>, ChainError>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Details for a transaction, including receipt status when mined.
    async fn transaction_details(&self, tx_hash: B256) -> Result<TransactionDetails, ChainError>;

    /// ERC-20 `balanceOf` on the given token contract.
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    /// AMM quote for swapping `amount_in` of `token_in` into `token_out`.
    async fn swap_quote(
        &self,
        amm: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<SwapQuote, ChainError>;

    /// Whether the given content id has been minted.
    async fn content_minted(&self, minter: Address, content_id: B256)
        -> Result<bool, ChainError>;

    /// Decoded logs for one contract over an inclusive block range.
    async fn contract_events(
        &self,
        kind: ContractKind,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError>;

    /// Approves the hub for `deposit` and opens a payment channel under
    /// `channel_ref`. Requires a signer.
    async fn open_channel(
        &self,
        token: Address,
        hub: Address,
        receiver: Address,
        deposit: U256,
        channel_ref: B256,
    ) -> Result<TxOutcome, ChainError>;

    /// Submits a signed cumulative commitment to the hub.
    async fn commit_payment(
        &self,
        hub: Address,
        channel_ref: B256,
        amount: U256,
        signature: Bytes,
    ) -> Result<TxOutcome, ChainError>;

    /// Closes the channel, settling the highest committed amount.
    async fn close_channel(&self, hub: Address, channel_ref: B256) -> Result<TxOutcome, ChainError>;
}
