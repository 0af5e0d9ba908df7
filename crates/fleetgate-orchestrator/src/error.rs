//! Outcome taxonomy shared by the join and leave flows.

use thiserror::Error;

use fleetgate_cluster::GatewayError;
use fleetgate_registry::RegistryError;

use crate::saga::SagaReport;

/// Result type alias for orchestrator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,
}

/// Why a join or leave did not fully succeed.
///
/// Everything but `Partial` means no external system was changed.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Malformed request; detected before any side effect.
    #[error("{0}")]
    Validation(String),

    /// Bad password or join token; detected before any side effect.
    #[error("{0}")]
    Auth(AuthFailure),

    /// The cluster CLI failed at the cluster-level step.
    #[error(transparent)]
    ExternalTool(#[from] GatewayError),

    /// The registry failed before anything irreversible happened.
    #[error(transparent)]
    Storage(#[from] RegistryError),

    /// The cluster-level action took effect but later bookkeeping failed.
    #[error("{message}")]
    Partial { message: String, report: SagaReport },
}

impl CoordinatorError {
    /// The saga report, when the failure left something changed.
    pub fn report(&self) -> Option<&SagaReport> {
        match self {
            CoordinatorError::Partial { report, .. } => Some(report),
            _ => None,
        }
    }
}
