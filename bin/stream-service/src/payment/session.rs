//! Per-stream accrual clock

use std::time::Instant;

use alloy_primitives::{keccak256, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;

use common::amount::Amount;

/// Digest a sender signs to commit to a cumulative channel amount. The hub
/// recomputes the same digest from `(channelRef, amount)` when settling.
pub fn commitment_digest(channel_ref: B256, amount: Amount) -> B256 {
    let amount_bytes = amount.to_u256().to_be_bytes::<32>();
    keccak256([channel_ref.as_slice(), amount_bytes.as_slice()].concat())
}

/// Wall-clock meter for one playback session. The session only tracks time;
/// folding accrued cost into the channel is the manager's job.
#[derive(Debug)]
pub struct StreamSession {
    pub channel_id: String,
    pub rate_per_sec: Amount,
    pub started_at: DateTime<Utc>,
    pub accrued: Amount,
    last_tick: Instant,
}

impl StreamSession {
    pub fn new(channel_id: &str, rate_per_sec: Amount) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            rate_per_sec,
            started_at: Utc::now(),
            accrued: Amount::ZERO,
            last_tick: Instant::now(),
        }
    }

    /// Cost of the wall-clock time since the last tick, without advancing
    /// the clock.
    pub fn pending(&self, now: Instant) -> Amount {
        let elapsed_ms = now.saturating_duration_since(self.last_tick).as_millis();
        let seconds = Amount::from_u128_with_scale(elapsed_ms, 3);
        seconds
            .checked_mul(self.rate_per_sec)
            .unwrap_or(Amount::MAX)
    }

    /// Advances the clock and returns the newly accrued cost.
    pub fn accrue(&mut self, now: Instant) -> Amount {
        let delta = self.pending(now);
        self.last_tick = now;
        self.accrued = self.accrued.checked_add(delta).unwrap_or(Amount::MAX);
        delta
    }
}

/// Snapshot returned by the stream status endpoint, channel state merged
/// with the live session meter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub channel_id: String,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub rate_per_sec: Amount,
    pub accrued: Amount,
    pub pending: Amount,
    pub spent: Amount,
    pub deposit: Amount,
    pub remaining: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_accrual_is_rate_times_elapsed() {
        let rate = Amount::from_u128_with_scale(2, 0);
        let mut session = StreamSession::new("chan-1", rate);
        let later = session.last_tick + Duration::from_millis(1500);

        // 1.5s at 2 tokens/s.
        let delta = session.accrue(later);
        assert_eq!(delta, Amount::from_u128_with_scale(3, 0));
        assert_eq!(session.accrued, delta);

        // The clock advanced, the same instant accrues nothing more.
        assert_eq!(session.accrue(later), Amount::ZERO);
    }

    #[test]
    fn test_pending_does_not_advance_clock() {
        let mut session = StreamSession::new("chan-1", Amount::ONE);
        let later = session.last_tick + Duration::from_secs(2);

        assert_eq!(session.pending(later), Amount::TWO);
        assert_eq!(session.pending(later), Amount::TWO);
        assert_eq!(session.accrue(later), Amount::TWO);
    }

    #[test]
    fn test_digest_depends_on_both_inputs() {
        let channel_ref = B256::repeat_byte(0x11);
        let digest = commitment_digest(channel_ref, Amount::ONE);

        assert_ne!(digest, commitment_digest(channel_ref, Amount::TWO));
        assert_ne!(
            digest,
            commitment_digest(B256::repeat_byte(0x22), Amount::ONE)
        );
        assert_eq!(digest, commitment_digest(channel_ref, Amount::ONE));
    }
}
