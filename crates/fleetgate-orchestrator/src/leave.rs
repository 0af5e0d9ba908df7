//! Leave orchestrator — removes a node from the cluster, then from the registry.

use std::sync::Arc;

use tracing::{error, info, warn};

use fleetgate_cluster::{MembershipGateway, Removal};
use fleetgate_core::normalize_node_name;
use fleetgate_registry::NodeRegistry;

use crate::credentials::CredentialValidator;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::saga::{SagaReport, Step};

/// What the cluster said about the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterRemoval {
    Removed,
    NotPresent,
}

/// A completed leave. `rows_deleted` is reported independently of the
/// cluster outcome.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub node_name: String,
    pub removal: ClusterRemoval,
    pub rows_deleted: u64,
    pub report: SagaReport,
}

pub struct LeaveOrchestrator {
    credentials: CredentialValidator,
    gateway: Arc<dyn MembershipGateway>,
    registry: Arc<dyn NodeRegistry>,
}

impl LeaveOrchestrator {
    pub fn new(registry: Arc<dyn NodeRegistry>, gateway: Arc<dyn MembershipGateway>) -> Self {
        Self {
            credentials: CredentialValidator::new(registry.clone(), gateway.clone()),
            gateway,
            registry,
        }
    }

    /// Run the leave saga for `node_name` on behalf of `username`.
    ///
    /// The registry is only pruned once the cluster has confirmed the node
    /// is gone (deleted now or already absent).
    pub async fn leave(&self, node_name: &str, username: &str, password: &str) -> CoordinatorResult<LeaveOutcome> {
        let mut report = SagaReport::new();

        self.credentials.authenticate(username, password).await?;
        report.succeeded(Step::AuthenticatePassword);

        let node_name = normalize_node_name(node_name).map_err(|e| CoordinatorError::Validation(e.to_string()))?;

        let removal = match self.gateway.remove_membership(&node_name).await {
            Ok(Removal::Deleted { output }) => {
                report.succeeded_with(Step::InvokeClusterRemoval, output);
                ClusterRemoval::Removed
            }
            Ok(Removal::NotFound { .. }) => {
                report.not_found(Step::InvokeClusterRemoval, "node not present in cluster");
                ClusterRemoval::NotPresent
            }
            Err(e) => {
                warn!(node = %node_name, error = %e, "cluster removal failed, registry untouched");
                return Err(CoordinatorError::ExternalTool(e));
            }
        };

        let rows_deleted = match self.registry.delete_node_by_name(&node_name).await {
            Ok(0) => {
                report.not_found(Step::DeleteRegistryRow, "no registry row");
                0
            }
            Ok(rows) => {
                report.succeeded_with(Step::DeleteRegistryRow, format!("{rows} row(s) deleted"));
                rows
            }
            Err(e) if removal == ClusterRemoval::Removed => {
                error!(node = %node_name, error = %e, "node removed from cluster but registry delete failed");
                report.failed(Step::DeleteRegistryRow, e.to_string());
                return Err(CoordinatorError::Partial {
                    message: format!("node {node_name} removed from cluster but registry delete failed: {e}"),
                    report,
                });
            }
            Err(e) => {
                error!(node = %node_name, error = %e, "registry delete failed");
                return Err(CoordinatorError::Storage(e));
            }
        };

        info!(node = %node_name, ?removal, rows_deleted, "node left");
        Ok(LeaveOutcome {
            node_name,
            removal,
            rows_deleted,
            report,
        })
    }
}
