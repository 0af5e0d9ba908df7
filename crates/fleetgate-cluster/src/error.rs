//! Error types for the membership gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("token enumeration failed: {0}")]
    Enumeration(String),

    #[error("cluster join failed: {stderr}")]
    JoinFailed { stderr: String },

    #[error("node removal failed: {stderr}")]
    RemovalFailed { stderr: String },

    #[error("local reset failed: {stderr}")]
    ResetFailed { stderr: String },
}
