use store::StoreError;
use thiserror::Error;

/// Errors that can occur while computing analytics.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// An error occurred reading from the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
