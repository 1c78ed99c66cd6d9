//! Marketplace error types.

use thiserror::Error;

/// Result type for marketplace operations.
pub type MarketplaceResult<T> = Result<T, MarketplaceError>;

/// Errors talking to the marketplace.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Transport failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The marketplace answered with an error document.
    #[error("{action} failed with HTTP {status}: {code}: {message}")]
    Api {
        action: String,
        status: u16,
        code: String,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected {action} response: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    /// Request body could not be encoded.
    #[error("failed to encode {action} request: {source}")]
    Encode {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MarketplaceError {
    /// Returns true for failures worth retrying (timeouts, server faults).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, code, .. } => *status >= 500 || code == "ServiceFault",
            Self::Decode { .. } | Self::Encode { .. } => false,
        }
    }
}
