//! Error types for the node registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to acquire database connection: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("node already registered: {0}")]
    AlreadyRegistered(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RegistryError::Pool(e.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RegistryError::AlreadyRegistered(db.message().to_string())
            }
            _ => RegistryError::Query(e.to_string()),
        }
    }
}
