//! fleetgate-orchestrator — membership changes driven across three systems of record.
//!
//! A join or leave touches the cluster orchestrator, the node registry and
//! (on join) the discovery documents. None of these share a transaction,
//! so each flow is an explicit, ordered saga:
//!
//! ```text
//! join:  AuthenticatePassword → ValidateToken → InvokeClusterJoin
//!          → InsertRegistryRow → UpdateDiscovery(node) → UpdateDiscovery(gpu)
//! leave: AuthenticatePassword → InvokeClusterRemoval → DeleteRegistryRow
//! ```
//!
//! Every step's outcome is recorded in a [`SagaReport`]. Failures before
//! the cluster-level step leave nothing changed; failures after it surface
//! as [`CoordinatorError::Partial`] carrying the report, so an operator can
//! reconcile bookkeeping without repeating the cluster action. Nothing is
//! retried here.

pub mod credentials;
pub mod error;
pub mod join;
pub mod leave;
pub mod saga;

#[cfg(test)]
mod testing;

pub use credentials::{CredentialValidator, hash_password, verify_password};
pub use error::{AuthFailure, CoordinatorError, CoordinatorResult};
pub use join::{JoinOrchestrator, JoinRequest};
pub use leave::{ClusterRemoval, LeaveOrchestrator, LeaveOutcome};
pub use saga::{SagaReport, Step, StepState, StepStatus};
