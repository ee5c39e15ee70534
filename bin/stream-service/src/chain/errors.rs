//! Error types for the data accessor

use common::chain::ChainError;
use common::events::ContractKind;
use common::resilience::Retryable;

use super::fetcher::FetchError;

/// Errors surfaced by accessor operations. Request-shape problems get their
/// own variants so the API layer can tell a bad request from a sick upstream.
#[derive(Debug)]
pub enum AccessorError {
    // Request validation errors
    UnsupportedNetwork { network_id: u64 },
    ContractNotConfigured { contract_type: ContractKind, network_id: u64 },
    UnsupportedMethod { contract_type: ContractKind, method: String },
    InvalidParams { reason: String },

    // Upstream errors
    Chain(ChainError),
    Fetch(FetchError),
}

impl std::fmt::Display for AccessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessorError::UnsupportedNetwork { network_id } => {
                write!(f, "Unsupported network ID: {}", network_id)
            }
            AccessorError::ContractNotConfigured {
                contract_type,
                network_id,
            } => write!(
                f,
                "Contract address not found for {} on network {}",
                contract_type, network_id
            ),
            AccessorError::UnsupportedMethod {
                contract_type,
                method,
            } => write!(f, "Unsupported method {} for {}", method, contract_type),
            AccessorError::InvalidParams { reason } => write!(f, "Invalid params: {}", reason),
            AccessorError::Chain(err) => write!(f, "{}", err),
            AccessorError::Fetch(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AccessorError {}

impl From<ChainError> for AccessorError {
    fn from(err: ChainError) -> Self {
        AccessorError::Chain(err)
    }
}

impl From<FetchError> for AccessorError {
    fn from(err: FetchError) -> Self {
        AccessorError::Fetch(err)
    }
}

impl Retryable for AccessorError {
    fn is_retryable(&self) -> bool {
        match self {
            AccessorError::Chain(err) => err.is_retryable(),
            AccessorError::Fetch(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn circuit_open(retry_in_ms: u64) -> Self {
        AccessorError::Chain(ChainError::circuit_open(retry_in_ms))
    }
}
