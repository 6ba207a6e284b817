//! Error types for the lifecycle engine.

use keywarden_store::StoreError;
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in service operations.
///
/// Lifecycle rejections (unknown key, mismatched hardware id, exhausted
/// limit, expiry) are not errors; they are ordinary outcomes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A blocking store task did not run to completion.
    #[error("store task failed: {0}")]
    Task(String),
}
