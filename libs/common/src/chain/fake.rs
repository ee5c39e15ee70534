//! In-memory [`ChainClient`] with scriptable state, used by tests and
//! offline runs. No sockets are opened anywhere in this module.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::client::ChainClient;
use super::errors::ChainError;
use super::types::{BlockSummary, EventLog, SwapQuote, TransactionDetails, TxOutcome, TxStatus};
use crate::events::ContractKind;

/// Record of a submission the fake accepted, for assertions on what would
/// have been broadcast.
#[derive(Clone, Debug)]
pub struct SubmittedTx {
    pub label: String,
    pub to: Address,
    pub channel_ref: Option<B256>,
    pub receiver: Option<Address>,
    pub deposit: Option<U256>,
    pub amount: Option<U256>,
    pub signature: Option<Bytes>,
}

struct FakeState {
    head_block: u64,
    gas_price: u128,
    blocks: HashMap<u64, BlockSummary>,
    transactions: HashMap<B256, TransactionDetails>,
    balances: HashMap<(Address, Address), U256>,
    quotes: HashMap<(Address, Address), SwapQuote>,
    minted: HashSet<B256>,
    events: HashMap<(ContractKind, Address), Vec<EventLog>>,
    fail_next: VecDeque<String>,
    call_log: Vec<String>,
    submitted: Vec<SubmittedTx>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            head_block: 1_000_000,
            gas_price: 20_000_000_000,
            blocks: HashMap::new(),
            transactions: HashMap::new(),
            balances: HashMap::new(),
            quotes: HashMap::new(),
            minted: HashSet::new(),
            events: HashMap::new(),
            fail_next: VecDeque::new(),
            call_log: Vec::new(),
            submitted: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeChainClient {
    state: Arc<RwLock<FakeState>>,
}

impl FakeChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head_block(&self, number: u64) {
        self.state.write().head_block = number;
    }

    pub fn advance_head(&self, blocks: u64) {
        self.state.write().head_block += blocks;
    }

    pub fn set_gas_price(&self, wei: u128) {
        self.state.write().gas_price = wei;
    }

    pub fn insert_block(&self, block: BlockSummary) {
        self.state.write().blocks.insert(block.number, block);
    }

    pub fn insert_transaction(&self, tx: TransactionDetails) {
        self.state.write().transactions.insert(tx.hash, tx);
    }

    pub fn set_balance(&self, token: Address, owner: Address, balance: U256) {
        self.state.write().balances.insert((token, owner), balance);
    }

    pub fn set_quote(&self, token_in: Address, token_out: Address, quote: SwapQuote) {
        self.state.write().quotes.insert((token_in, token_out), quote);
    }

    pub fn set_minted(&self, content_id: B256) {
        self.state.write().minted.insert(content_id);
    }

    pub fn push_event(&self, kind: ContractKind, address: Address, event: EventLog) {
        self.state
            .write()
            .events
            .entry((kind, address))
            .or_default()
            .push(event);
    }

    /// Queues `count` failures; the next `count` calls return an RPC error
    /// carrying `message` before any real work happens.
    pub fn fail_next(&self, count: usize, message: &str) {
        let mut state = self.state.write();
        for _ in 0..count {
            state.fail_next.push_back(message.to_string());
        }
    }

    /// How many times the named trait method has been called.
    pub fn calls(&self, method: &str) -> usize {
        self.state
            .read()
            .call_log
            .iter()
            .filter(|entry| entry.as_str() == method)
            .count()
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.read().submitted.clone()
    }

    fn begin(&self, method: &str) -> Result<(), ChainError> {
        let mut state = self.state.write();
        state.call_log.push(method.to_string());
        match state.fail_next.pop_front() {
            Some(message) => Err(ChainError::Rpc(message)),
            None => Ok(()),
        }
    }

    fn synthesize_block(number: u64) -> BlockSummary {
        BlockSummary {
            number,
            hash: keccak256(number.to_be_bytes()),
            timestamp: 1_700_000_000 + number * 12,
            gas_used: 15_000_000,
            gas_limit: 30_000_000,
            transaction_count: 100,
        }
    }

    fn record_submission(&self, submission: SubmittedTx) -> TxOutcome {
        let mut state = self.state.write();
        let seq = state.submitted.len() as u64;
        let tx_hash = keccak256([submission.label.as_bytes(), &seq.to_be_bytes()].concat());
        state.submitted.push(submission);

        TxOutcome {
            tx_hash,
            block_number: Some(state.head_block),
            gas_used: Some(60_000),
            status: TxStatus::Success,
        }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.begin("block_number")?;
        Ok(self.state.read().head_block)
    }

    async fn latest_block(&self) -> Result<BlockSummary, ChainError> {
        self.begin("latest_block")?;
        let state = self.state.read();
        let head = state.head_block;
        Ok(state
            .blocks
            .get(&head)
            .copied()
            .unwrap_or_else(|| Self::synthesize_block(head)))
    }

    async fn block_window(&self, count: u64) -> Result<Vec<BlockSummary>, ChainError> {
        self.begin("block_window")?;
        let state = self.state.read();
        let head = state.head_block;
        let mut blocks = Vec::new();
        for offset in 0..count {
            if offset > head {
                break;
            }
            let number = head - offset;
            blocks.push(
                state
                    .blocks
                    .get(&number)
                    .copied()
                    .unwrap_or_else(|| Self::synthesize_block(number)),
            );
        }
        Ok(blocks)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.begin("gas_price")?;
        Ok(self.state.read().gas_price)
    }

    async fn transaction_details(&self, tx_hash: B256) -> Result<TransactionDetails, ChainError> {
        self.begin("transaction_details")?;
        self.state
            .read()
            .transactions
            .get(&tx_hash)
            .copied()
            .ok_or(ChainError::TxNotFound { tx_hash })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        self.begin("token_balance")?;
        Ok(self
            .state
            .read()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn swap_quote(
        &self,
        _amm: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<SwapQuote, ChainError> {
        self.begin("swap_quote")?;
        if let Some(quote) = self.state.read().quotes.get(&(token_in, token_out)) {
            return Ok(*quote);
        }

        // Constant 0.3% fee when no quote has been scripted.
        let fee = amount_in * U256::from(3) / U256::from(1000);
        Ok(SwapQuote {
            amount_out: amount_in - fee,
            fee,
        })
    }

    async fn content_minted(
        &self,
        _minter: Address,
        content_id: B256,
    ) -> Result<bool, ChainError> {
        self.begin("content_minted")?;
        Ok(self.state.read().minted.contains(&content_id))
    }

    async fn contract_events(
        &self,
        kind: ContractKind,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EventLog>, ChainError> {
        self.begin("contract_events")?;
        let state = self.state.read();
        Ok(state
            .events
            .get(&(kind, address))
            .map(|events| {
                events
                    .iter()
                    .filter(|ev| ev.block_number >= from_block && ev.block_number <= to_block)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn open_channel(
        &self,
        _token: Address,
        hub: Address,
        receiver: Address,
        deposit: U256,
        channel_ref: B256,
    ) -> Result<TxOutcome, ChainError> {
        self.begin("open_channel")?;
        Ok(self.record_submission(SubmittedTx {
            label: "openChannel".to_string(),
            to: hub,
            channel_ref: Some(channel_ref),
            receiver: Some(receiver),
            deposit: Some(deposit),
            amount: None,
            signature: None,
        }))
    }

    async fn commit_payment(
        &self,
        hub: Address,
        channel_ref: B256,
        amount: U256,
        signature: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        self.begin("commit_payment")?;
        Ok(self.record_submission(SubmittedTx {
            label: "commitPayment".to_string(),
            to: hub,
            channel_ref: Some(channel_ref),
            receiver: None,
            deposit: None,
            amount: Some(amount),
            signature: Some(signature),
        }))
    }

    async fn close_channel(&self, hub: Address, channel_ref: B256) -> Result<TxOutcome, ChainError> {
        self.begin("close_channel")?;
        Ok(self.record_submission(SubmittedTx {
            label: "closeChannel".to_string(),
            to: hub,
            channel_ref: Some(channel_ref),
            receiver: None,
            deposit: None,
            amount: None,
            signature: None,
        }))
    }
}
