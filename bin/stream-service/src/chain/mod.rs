//! Cached access to on-chain data and IPFS content
//!
//! The accessor sits between the HTTP routes and the per-network chain
//! clients. Every read goes through the tiered cache and a retry/breaker
//! guard, so upstream flakiness is absorbed before it reaches a caller.

mod accessor;
mod errors;
mod fetcher;

pub use accessor::BlockchainDataAccessor;
pub use errors::AccessorError;
pub use fetcher::{AnyFetcher, ContentFetcher, FetchError, FixtureFetcher, HttpGatewayFetcher};
