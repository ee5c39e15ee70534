use alloy_primitives::{keccak256, Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Pending,
    Open,
    Closed,
}

impl core::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelStatus::Pending => write!(f, "pending"),
            ChannelStatus::Open => write!(f, "open"),
            ChannelStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Invariant violations raised by channel mutations. These are terminal for
/// the request that caused them, never retried and never clamped.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelError {
    NotOpen {
        channel_id: String,
        status: ChannelStatus,
    },
    NonMonotonicAmount {
        channel_id: String,
        spent: Amount,
        offered: Amount,
    },
    ExceedsDeposit {
        channel_id: String,
        deposit: Amount,
        offered: Amount,
    },
    ZeroDeposit,
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelError::NotOpen { channel_id, status } => {
                write!(f, "Channel {} is not open (status: {})", channel_id, status)
            }
            ChannelError::NonMonotonicAmount {
                channel_id,
                spent,
                offered,
            } => write!(
                f,
                "Commitment for channel {} is below spent amount ({} < {})",
                channel_id, offered, spent
            ),
            ChannelError::ExceedsDeposit {
                channel_id,
                deposit,
                offered,
            } => write!(
                f,
                "Commitment for channel {} exceeds deposit ({} > {})",
                channel_id, offered, deposit
            ),
            ChannelError::ZeroDeposit => write!(f, "Channel deposit must be greater than zero"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// A signed cumulative payment. The amount is the total owed so far, not a
/// delta, so the newest valid commitment supersedes all earlier ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCommitment {
    pub amount: Amount,
    pub signature: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChannel {
    pub id: String,
    pub network_id: u64,
    pub sender: Address,
    pub receiver: Address,
    pub content_id: String,
    pub deposit: Amount,
    pub spent: Amount,
    /// Highest amount already submitted on-chain; commits below or equal to
    /// this are redundant.
    pub settled: Amount,
    pub commitments: Vec<PaymentCommitment>,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub open_tx: Option<String>,
    pub close_tx: Option<String>,
}

impl PaymentChannel {
    pub fn new(
        network_id: u64,
        sender: Address,
        receiver: Address,
        content_id: &str,
        deposit: Amount,
    ) -> Result<Self, ChannelError> {
        if deposit.is_not() {
            return Err(ChannelError::ZeroDeposit);
        }

        let created_at = Utc::now();
        let id = format!(
            "{:#x}-{}-{}",
            sender,
            content_id,
            created_at.timestamp_millis()
        );

        Ok(Self {
            id,
            network_id,
            sender,
            receiver,
            content_id: content_id.to_string(),
            deposit,
            spent: Amount::ZERO,
            settled: Amount::ZERO,
            commitments: Vec::new(),
            status: ChannelStatus::Pending,
            created_at,
            closed_at: None,
            open_tx: None,
            close_tx: None,
        })
    }

    /// 32-byte reference used for the on-chain hub, derived from the string
    /// id so both sides agree without coordinating a counter.
    pub fn channel_ref(&self) -> B256 {
        keccak256(self.id.as_bytes())
    }

    pub fn remaining(&self) -> Amount {
        self.deposit.saturating_sub(self.spent)
    }

    pub fn is_open(&self) -> bool {
        self.status == ChannelStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == ChannelStatus::Closed
    }

    /// Appends a cumulative commitment. The amount must not regress below
    /// `spent` and must not exceed the deposit; equal amounts are accepted
    /// (idempotent re-sends of the latest commitment).
    pub fn apply_commitment(
        &mut self,
        amount: Amount,
        signature: String,
        at: DateTime<Utc>,
    ) -> Result<(), ChannelError> {
        if self.status != ChannelStatus::Open {
            return Err(ChannelError::NotOpen {
                channel_id: self.id.clone(),
                status: self.status,
            });
        }

        if amount.is_less_than(&self.spent) {
            return Err(ChannelError::NonMonotonicAmount {
                channel_id: self.id.clone(),
                spent: self.spent,
                offered: amount,
            });
        }

        if self.deposit.is_less_than(&amount) {
            return Err(ChannelError::ExceedsDeposit {
                channel_id: self.id.clone(),
                deposit: self.deposit,
                offered: amount,
            });
        }

        self.commitments.push(PaymentCommitment {
            amount,
            signature,
            committed_at: at,
        });
        self.spent = amount;

        Ok(())
    }

    /// The commitment worth settling: the one with the highest amount.
    pub fn latest_commitment(&self) -> Option<&PaymentCommitment> {
        self.commitments.iter().max_by_key(|c| c.amount)
    }

    pub fn mark_open(&mut self, tx_hash: Option<String>) {
        if self.status == ChannelStatus::Pending {
            self.status = ChannelStatus::Open;
            self.open_tx = tx_hash;
        }
    }

    pub fn mark_closed(&mut self, tx_hash: Option<String>, at: DateTime<Utc>) {
        if self.status != ChannelStatus::Closed {
            self.status = ChannelStatus::Closed;
            self.closed_at = Some(at);
            self.close_tx = tx_hash;
        }
    }
}
