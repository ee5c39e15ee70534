//! Channel lifecycle and settlement

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy_primitives::{Address, Bytes, B256};
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::amount::Amount;
use common::chain::{ChainClient, ChainError};
use common::channel::{ChannelError, PaymentChannel};
use common::network::NetworkRegistry;
use common::store::{Store, StoreError};

use crate::config::PaymentConfig;

use super::session::{commitment_digest, StreamSession, StreamStatus};

/// Errors surfaced by channel operations
#[derive(Debug)]
pub enum PaymentError {
    // Request errors
    NotFound { channel_id: String },
    UnsupportedNetwork { network_id: u64 },
    InvalidSignature { reason: String },

    // Invariant violations
    Channel(ChannelError),

    // Infrastructure errors
    Chain(ChainError),
    Store(StoreError),
    Signing(String),
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentError::NotFound { channel_id } => {
                write!(f, "Channel {} not found", channel_id)
            }
            PaymentError::UnsupportedNetwork { network_id } => {
                write!(f, "Unsupported network ID: {}", network_id)
            }
            PaymentError::InvalidSignature { reason } => {
                write!(f, "Invalid signature encoding: {}", reason)
            }
            PaymentError::Channel(err) => write!(f, "{}", err),
            PaymentError::Chain(err) => write!(f, "{}", err),
            PaymentError::Store(err) => write!(f, "{}", err),
            PaymentError::Signing(reason) => write!(f, "Failed to sign commitment: {}", reason),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<ChannelError> for PaymentError {
    fn from(err: ChannelError) -> Self {
        PaymentError::Channel(err)
    }
}

impl From<ChainError> for PaymentError {
    fn from(err: ChainError) -> Self {
        PaymentError::Chain(err)
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        PaymentError::Store(err)
    }
}

struct AutoCommitState {
    enabled: bool,
    interval: Duration,
}

/// Owns every payment channel: creation, commitment bookkeeping, stream
/// session metering and on-chain settlement. All mutations of one channel
/// run under that channel's async lock, so commitment order is serialized
/// even under concurrent API calls.
pub struct ChannelManager<C, S> {
    clients: HashMap<u64, Arc<C>>,
    registry: NetworkRegistry,
    store: Arc<S>,
    signer: Option<PrivateKeySigner>,
    rate_per_sec: Amount,
    auto_commit: RwLock<AutoCommitState>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    sessions: RwLock<HashMap<String, StreamSession>>,
}

impl<C, S> ChannelManager<C, S>
where
    C: ChainClient,
    S: Store,
{
    pub fn new(
        clients: HashMap<u64, Arc<C>>,
        registry: NetworkRegistry,
        store: Arc<S>,
        signer: Option<PrivateKeySigner>,
        config: &PaymentConfig,
    ) -> Self {
        if signer.is_none() {
            warn!("no signing key configured, commitments will be unsigned");
        }

        Self {
            clients,
            registry,
            store,
            signer,
            rate_per_sec: Amount::from_f64(config.stream_rate_per_sec),
            auto_commit: RwLock::new(AutoCommitState {
                enabled: config.auto_commit_enabled,
                interval: Duration::from_secs(config.auto_commit_interval_secs),
            }),
            locks: Mutex::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_channel(&self, channel_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, channel_id: &str) -> Result<PaymentChannel, PaymentError> {
        self.store
            .channel(channel_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound {
                channel_id: channel_id.to_string(),
            })
    }

    /// Creates a channel and, when the network has a payment hub, opens it
    /// on-chain. Without a hub the channel opens immediately and settlement
    /// stays off-chain.
    pub async fn open_channel(
        &self,
        network_id: u64,
        sender: Address,
        receiver: Address,
        content_id: &str,
        deposit: Amount,
    ) -> Result<PaymentChannel, PaymentError> {
        let client = self
            .clients
            .get(&network_id)
            .ok_or(PaymentError::UnsupportedNetwork { network_id })?;
        let descriptor = self
            .registry
            .network(network_id)
            .ok_or(PaymentError::UnsupportedNetwork { network_id })?;

        let mut channel = PaymentChannel::new(network_id, sender, receiver, content_id, deposit)?;
        // Persist before any submission so a failed open leaves a pending
        // record instead of a silently dropped channel.
        self.store.put_channel(channel.clone()).await?;

        match descriptor.contracts.payment_hub {
            Some(hub) => {
                let outcome = client
                    .open_channel(
                        descriptor.contracts.stream_token,
                        hub,
                        receiver,
                        deposit.to_u256(),
                        channel.channel_ref(),
                    )
                    .await?;
                channel.mark_open(Some(outcome.tx_hash.to_string()));
                info!(
                    channel_id = %channel.id,
                    tx = %outcome.tx_hash,
                    deposit = %deposit,
                    "💰 payment channel opened on-chain"
                );
            }
            None => {
                channel.mark_open(None);
                debug!(
                    channel_id = %channel.id,
                    network_id,
                    "no payment hub configured, channel opened off-chain"
                );
            }
        }

        self.store.put_channel(channel.clone()).await?;
        Ok(channel)
    }

    /// Records a signed cumulative commitment. Purely local.
    pub async fn add_payment(
        &self,
        channel_id: &str,
        amount: Amount,
        signature: &str,
    ) -> Result<PaymentChannel, PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        channel.apply_commitment(amount, signature.to_string(), Utc::now())?;
        self.store.put_channel(channel.clone()).await?;

        debug!(channel_id, amount = %amount, "payment commitment recorded");
        Ok(channel)
    }

    /// Settles the highest commitment on-chain if it exceeds what was
    /// already settled.
    pub async fn commit_latest(&self, channel_id: &str) -> Result<PaymentChannel, PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        if self.settle_latest(&mut channel).await? {
            self.store.put_channel(channel.clone()).await?;
        }
        Ok(channel)
    }

    /// Commits the latest payment, submits the on-chain close when a hub is
    /// configured and marks the channel closed. Closing an already-closed
    /// channel is a no-op success.
    pub async fn close_channel(
        &self,
        channel_id: &str,
        final_payment: Option<(Amount, String)>,
    ) -> Result<PaymentChannel, PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        if channel.is_closed() {
            debug!(channel_id, "channel already closed");
            return Ok(channel);
        }

        if let Some((amount, signature)) = final_payment {
            channel.apply_commitment(amount, signature, Utc::now())?;
        }

        if self.settle_latest(&mut channel).await? {
            // Settlement landed; persist before attempting the close so a
            // failure here cannot roll back `settled`.
            self.store.put_channel(channel.clone()).await?;
        }

        let hub = self.registry.payment_hub(channel.network_id);
        match hub {
            Some(hub) => {
                let client = self.clients.get(&channel.network_id).ok_or(
                    PaymentError::UnsupportedNetwork {
                        network_id: channel.network_id,
                    },
                )?;
                let outcome = client.close_channel(hub, channel.channel_ref()).await?;
                channel.mark_closed(Some(outcome.tx_hash.to_string()), Utc::now());
            }
            None => channel.mark_closed(None, Utc::now()),
        }

        self.sessions.write().remove(channel_id);
        self.store.put_channel(channel.clone()).await?;

        info!(
            channel_id,
            spent = %channel.spent,
            settled = %channel.settled,
            "✅ channel closed"
        );
        Ok(channel)
    }

    pub async fn channel(&self, channel_id: &str) -> Result<Option<PaymentChannel>, PaymentError> {
        Ok(self.store.channel(channel_id).await?)
    }

    pub async fn channels_for(&self, sender: Address) -> Result<Vec<PaymentChannel>, PaymentError> {
        Ok(self.store.channels_for_sender(sender).await?)
    }

    /// Starts metering playback on an open channel. Starting an already
    /// active session keeps the existing meter.
    pub async fn start_stream(&self, channel_id: &str) -> Result<StreamStatus, PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let channel = self.load(channel_id).await?;
        if !channel.is_open() {
            return Err(ChannelError::NotOpen {
                channel_id: channel.id.clone(),
                status: channel.status,
            }
            .into());
        }

        {
            let mut sessions = self.sessions.write();
            if !sessions.contains_key(channel_id) {
                sessions.insert(
                    channel_id.to_string(),
                    StreamSession::new(channel_id, self.rate_per_sec),
                );
                info!(channel_id, rate = %self.rate_per_sec, "▶️ stream session started");
            }
        }

        Ok(self.status_snapshot(&channel))
    }

    /// Stops the session and folds its remaining accrual into a commitment.
    /// Stopping a channel with no active session is a no-op.
    pub async fn stop_stream(&self, channel_id: &str) -> Result<StreamStatus, PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        let delta = {
            let mut sessions = self.sessions.write();
            sessions
                .remove(channel_id)
                .map(|mut session| session.accrue(Instant::now()))
        };

        if let Some(delta) = delta {
            if self.apply_accrual(&mut channel, delta)? {
                self.store.put_channel(channel.clone()).await?;
            }
            info!(channel_id, accrued = %delta, "⏹️ stream session stopped");
        }

        Ok(self.status_snapshot(&channel))
    }

    pub async fn stream_status(&self, channel_id: &str) -> Result<StreamStatus, PaymentError> {
        let channel = self.load(channel_id).await?;
        Ok(self.status_snapshot(&channel))
    }

    pub fn set_auto_commit(&self, enabled: bool, interval: Option<Duration>) {
        let mut state = self.auto_commit.write();
        state.enabled = enabled;
        if let Some(interval) = interval {
            state.interval = interval;
        }
        info!(
            enabled,
            interval_ms = state.interval.as_millis() as u64,
            "auto-commit settings updated"
        );
    }

    pub fn auto_commit_settings(&self) -> (bool, Duration) {
        let state = self.auto_commit.read();
        (state.enabled, state.interval)
    }

    /// Periodic settlement loop. Every tick folds each active session's
    /// accrual into a commitment and settles it on-chain, bounding how much
    /// unsettled playback a crash could lose.
    pub async fn run_auto_commit(self: Arc<Self>, cancel: CancellationToken) {
        info!("auto-commit loop started");
        loop {
            let interval = self.auto_commit.read().interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if !self.auto_commit.read().enabled {
                continue;
            }

            let channel_ids: Vec<String> = self.sessions.read().keys().cloned().collect();
            for channel_id in channel_ids {
                if let Err(err) = self.tick_stream(&channel_id).await {
                    warn!(channel_id, error = %err, "auto-commit tick failed");
                }
            }
        }
        info!("auto-commit loop stopped");
    }

    async fn tick_stream(&self, channel_id: &str) -> Result<(), PaymentError> {
        let lock = self.lock_channel(channel_id).await;
        let _guard = lock.lock().await;

        let delta = {
            let mut sessions = self.sessions.write();
            sessions
                .get_mut(channel_id)
                .map(|session| session.accrue(Instant::now()))
        };
        // The session may have been stopped between listing and locking.
        let Some(delta) = delta else {
            return Ok(());
        };

        let mut channel = self.load(channel_id).await?;
        let accrued = self.apply_accrual(&mut channel, delta)?;
        let settled = self.settle_latest(&mut channel).await?;
        if accrued || settled {
            self.store.put_channel(channel.clone()).await?;
        }

        if channel.spent == channel.deposit {
            if self.sessions.write().remove(channel_id).is_some() {
                warn!(channel_id, "deposit exhausted, stream session stopped");
            }
        }

        Ok(())
    }

    /// Raises the channel's cumulative commitment by `delta`, capped at the
    /// deposit. Amounts the service accrues itself are clamped rather than
    /// rejected; external commitments keep the hard invariant. Returns
    /// whether the channel changed.
    fn apply_accrual(
        &self,
        channel: &mut PaymentChannel,
        delta: Amount,
    ) -> Result<bool, PaymentError> {
        let target = channel
            .spent
            .checked_add(delta)
            .unwrap_or(Amount::MAX)
            .min(channel.deposit);
        if !channel.spent.is_less_than(&target) {
            return Ok(false);
        }

        let signature = self.sign_commitment(channel.channel_ref(), target)?;
        channel.apply_commitment(target, signature, Utc::now())?;
        Ok(true)
    }

    /// Submits the highest commitment to the hub when it exceeds `settled`.
    /// Returns whether the channel changed. Must run under the channel lock.
    async fn settle_latest(&self, channel: &mut PaymentChannel) -> Result<bool, PaymentError> {
        let commitment = match channel.latest_commitment().cloned() {
            Some(commitment) => commitment,
            None => return Ok(false),
        };
        if !channel.settled.is_less_than(&commitment.amount) {
            debug!(channel_id = %channel.id, "nothing new to settle");
            return Ok(false);
        }

        let hub = match self.registry.payment_hub(channel.network_id) {
            Some(hub) => hub,
            None => {
                debug!(channel_id = %channel.id, "no payment hub configured, settlement skipped");
                return Ok(false);
            }
        };
        let client = self.clients.get(&channel.network_id).ok_or(
            PaymentError::UnsupportedNetwork {
                network_id: channel.network_id,
            },
        )?;

        let signature = decode_signature(&commitment.signature)?;
        let outcome = client
            .commit_payment(
                hub,
                channel.channel_ref(),
                commitment.amount.to_u256(),
                signature,
            )
            .await?;
        channel.settled = commitment.amount;

        info!(
            channel_id = %channel.id,
            amount = %commitment.amount,
            tx = %outcome.tx_hash,
            "💸 commitment settled on-chain"
        );
        Ok(true)
    }

    fn sign_commitment(&self, channel_ref: B256, amount: Amount) -> Result<String, PaymentError> {
        match &self.signer {
            Some(signer) => {
                let digest = commitment_digest(channel_ref, amount);
                let signature = signer
                    .sign_message_sync(digest.as_slice())
                    .map_err(|err| PaymentError::Signing(err.to_string()))?;
                Ok(format!("0x{}", hex::encode(signature.as_bytes())))
            }
            None => Ok("0x".to_string()),
        }
    }

    fn status_snapshot(&self, channel: &PaymentChannel) -> StreamStatus {
        let sessions = self.sessions.read();
        match sessions.get(&channel.id) {
            Some(session) => StreamStatus {
                channel_id: channel.id.clone(),
                active: true,
                started_at: Some(session.started_at),
                rate_per_sec: session.rate_per_sec,
                accrued: session.accrued,
                pending: session.pending(Instant::now()),
                spent: channel.spent,
                deposit: channel.deposit,
                remaining: channel.remaining(),
            },
            None => StreamStatus {
                channel_id: channel.id.clone(),
                active: false,
                started_at: None,
                rate_per_sec: self.rate_per_sec,
                accrued: Amount::ZERO,
                pending: Amount::ZERO,
                spent: channel.spent,
                deposit: channel.deposit,
                remaining: channel.remaining(),
            },
        }
    }
}

fn decode_signature(signature: &str) -> Result<Bytes, PaymentError> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    let raw = hex::decode(stripped).map_err(|err| PaymentError::InvalidSignature {
        reason: err.to_string(),
    })?;
    Ok(Bytes::from(raw))
}
