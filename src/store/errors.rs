//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Backend errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Statement failed to execute
    #[error("Query failed: {0}")]
    Query(String),

    /// Could not acquire or keep a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend cannot run this statement
    #[error("Unsupported statement: {0}")]
    Unsupported(String),

    /// The backend gave up waiting
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl StoreError {
    /// Whether retrying on a fresh connection could help
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool".to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}
