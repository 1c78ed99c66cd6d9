//! Allocation error types.

use thiserror::Error;

use crate::pool::PoolError;

/// Result type for allocation operations.
pub type AllocateResult<T> = Result<T, AllocateError>;

/// Errors that abort an allocation.
///
/// Under-fulfillment is not an error; it is reported through
/// `AllocationResult::shortfall`.
#[derive(Debug, Error)]
pub enum AllocateError {
    /// The request shape is invalid. Not retryable.
    #[error("invalid allocation request: {0}")]
    Configuration(String),

    /// A pool failed while being fetched from. No partial result is kept.
    #[error("fetch from pool '{pool}' failed: {source}")]
    PoolFetch {
        pool: String,
        #[source]
        source: PoolError,
    },
}

impl AllocateError {
    /// Returns true if the caller must change the request before retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Name of the pool that failed, if any.
    pub fn pool(&self) -> Option<&str> {
        match self {
            Self::PoolFetch { pool, .. } => Some(pool),
            Self::Configuration(_) => None,
        }
    }
}
