//! Off-chain payment channels and metered stream sessions
//!
//! Channels accumulate signed cumulative commitments locally; only the
//! highest commitment ever goes on-chain, at auto-commit ticks and at close.

mod manager;
mod session;

pub use manager::{ChannelManager, PaymentError};
pub use session::{commitment_digest, StreamSession, StreamStatus};
