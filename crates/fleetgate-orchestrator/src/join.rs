//! Join orchestrator — admits a worker into the cluster and records it.

use std::sync::Arc;

use tracing::{error, info, warn};

use fleetgate_cluster::MembershipGateway;
use fleetgate_core::{ExporterType, HardwareInfo, NodeRecord};
use fleetgate_discovery::document::canonical_target;
use fleetgate_discovery::{AddOutcome, TargetStore};
use fleetgate_registry::{NodeRegistry, RegistryResult};

use crate::credentials::CredentialValidator;
use crate::error::{AuthFailure, CoordinatorError, CoordinatorResult};
use crate::saga::{SagaReport, Step};

/// A validated-shape join request. Field presence is checked at the edge.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub token: String,
    pub ca_cert_hash: String,
    pub username: String,
    pub password: String,
    /// When absent the saga stops after the cluster join and registration
    /// is left to a later [`JoinOrchestrator::register`] call.
    pub hardware: Option<HardwareInfo>,
}

pub struct JoinOrchestrator {
    credentials: CredentialValidator,
    gateway: Arc<dyn MembershipGateway>,
    registry: Arc<dyn NodeRegistry>,
    discovery: Arc<dyn TargetStore>,
    control_plane: String,
}

impl JoinOrchestrator {
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        gateway: Arc<dyn MembershipGateway>,
        discovery: Arc<dyn TargetStore>,
        control_plane: impl Into<String>,
    ) -> Self {
        Self {
            credentials: CredentialValidator::new(registry.clone(), gateway.clone()),
            gateway,
            registry,
            discovery,
            control_plane: control_plane.into(),
        }
    }

    pub fn credentials(&self) -> &CredentialValidator {
        &self.credentials
    }

    /// Run the join saga.
    ///
    /// Returns the report on full success. Authentication, validation and
    /// cluster-join failures change nothing; any failure after the cluster
    /// join is a [`CoordinatorError::Partial`].
    pub async fn join(&self, request: &JoinRequest) -> CoordinatorResult<SagaReport> {
        let mut report = SagaReport::new();

        self.credentials
            .authenticate(&request.username, &request.password)
            .await?;
        report.succeeded(Step::AuthenticatePassword);

        if !self.credentials.validate_token(&request.token).await {
            return Err(CoordinatorError::Auth(AuthFailure::InvalidToken));
        }
        report.succeeded(Step::ValidateToken);

        let prepared = request.hardware.as_ref().map(prepare_record).transpose()?;

        self.gateway
            .join_membership(&self.control_plane, &request.token, &request.ca_cert_hash)
            .await?;
        report.succeeded(Step::InvokeClusterJoin);

        let Some(record) = prepared else {
            info!(username = %request.username, "cluster join done, awaiting registration");
            report.skipped(Step::InsertRegistryRow, "no hardware info submitted");
            for exporter in ExporterType::ALL {
                report.skipped(Step::UpdateDiscovery(exporter), "no hardware info submitted");
            }
            return Ok(report);
        };

        let node_name = record.name.clone();
        let record = match self.insert_row(&request.username, record).await {
            Ok(record) => record,
            Err(e) => {
                error!(node = %node_name, error = %e, "node joined the cluster but registry insert failed");
                report.failed(Step::InsertRegistryRow, e.to_string());
                for exporter in ExporterType::ALL {
                    report.skipped(Step::UpdateDiscovery(exporter), "registry row missing");
                }
                return Err(CoordinatorError::Partial {
                    message: format!("node {node_name} joined the cluster but registry insert failed: {e}"),
                    report,
                });
            }
        };
        report.succeeded(Step::InsertRegistryRow);

        self.update_discovery(&record, report).await
    }

    /// Second phase of a two-phase join: record the node and publish its
    /// scrape targets. Nothing irreversible precedes the insert, so a
    /// registry failure here is a plain storage error.
    pub async fn register(&self, username: &str, hardware: &HardwareInfo) -> CoordinatorResult<SagaReport> {
        let record = prepare_record(hardware)?;

        let record = self.insert_row(username, record).await.map_err(|e| {
            warn!(%username, node = %hardware.name, error = %e, "registration failed");
            CoordinatorError::Storage(e)
        })?;
        let mut report = SagaReport::new();
        report.succeeded(Step::InsertRegistryRow);

        self.update_discovery(&record, report).await
    }

    async fn insert_row(&self, username: &str, mut record: NodeRecord) -> RegistryResult<NodeRecord> {
        record.user_id = self.registry.find_user_id(username).await?;
        self.registry.insert_node(&record).await?;
        info!(node = %record.name, ip = %record.ip, user_id = record.user_id, "node registered");
        Ok(record)
    }

    /// Update every exporter's document independently. Once the registry
    /// row exists, any failure makes the outcome partial.
    async fn update_discovery(&self, record: &NodeRecord, mut report: SagaReport) -> CoordinatorResult<SagaReport> {
        for exporter in ExporterType::ALL {
            let step = Step::UpdateDiscovery(exporter);
            match self.discovery.add_target(exporter, &record.ip).await {
                Ok(AddOutcome::Added) => report.succeeded_with(step, "target added"),
                Ok(AddOutcome::AlreadyPresent) => report.succeeded_with(step, "target already present"),
                Err(e) => {
                    error!(node = %record.name, %exporter, error = %e, "discovery update failed");
                    report.failed(step, e.to_string());
                }
            }
        }

        let failed = report.failures();
        if failed.is_empty() {
            info!(node = %record.name, "node admitted");
            return Ok(report);
        }
        let names: Vec<&str> = failed.iter().map(|step| step.name()).collect();
        Err(CoordinatorError::Partial {
            message: format!(
                "node {} registered but discovery update failed: {}",
                record.name,
                names.join(", ")
            ),
            report,
        })
    }
}

/// Build the registry row from submitted hardware facts, rejecting facts
/// that could never be recorded. The owner is filled in at insert time.
fn prepare_record(hardware: &HardwareInfo) -> CoordinatorResult<NodeRecord> {
    let record = NodeRecord::from_hardware(hardware, 0).map_err(|e| CoordinatorError::Validation(e.to_string()))?;
    canonical_target(&record.ip, ExporterType::Node.default_port())
        .map_err(|e| CoordinatorError::Validation(e.to_string()))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::hash_password;
    use crate::saga::StepState;
    use crate::testing::{FakeGateway, FlakyRegistry, FlakyStore};

    use fleetgate_core::config::DiscoveryConfig;
    use fleetgate_discovery::DiscoveryFileStore;
    use fleetgate_registry::MemoryRegistry;

    fn hardware(name: &str, ip: &str) -> HardwareInfo {
        HardwareInfo {
            name: name.to_string(),
            ip: ip.to_string(),
            num_cpu: 16,
            size_mem: 62.789,
            num_gpu: 2,
            gpu_type: "NVIDIA A100".to_string(),
        }
    }

    fn request(token: &str, password: &str, hw: Option<HardwareInfo>) -> JoinRequest {
        JoinRequest {
            token: token.to_string(),
            ca_cert_hash: "sha256:feed".to_string(),
            username: "alice".to_string(),
            password: password.to_string(),
            hardware: hw,
        }
    }

    struct Fixture {
        orchestrator: JoinOrchestrator,
        gateway: Arc<FakeGateway>,
        registry: Arc<FlakyRegistry>,
        store: Arc<DiscoveryFileStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(store_fails: Option<ExporterType>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiscoveryFileStore::new(DiscoveryConfig {
            dir: dir.path().to_path_buf(),
            ..DiscoveryConfig::default()
        }));
        let flaky_store = Arc::new(FlakyStore::new(store.clone(), store_fails));
        let memory = MemoryRegistry::new();
        memory.add_user("alice", &hash_password("wonderland").unwrap());
        let registry = Arc::new(FlakyRegistry::new(memory));
        let gateway = Arc::new(FakeGateway::with_tokens(&["abc123"]));
        let orchestrator = JoinOrchestrator::new(
            registry.clone(),
            gateway.clone(),
            flaky_store,
            "10.0.0.1:6443",
        );
        Fixture {
            orchestrator,
            gateway,
            registry,
            store,
            _dir: dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None)
    }

    #[tokio::test]
    async fn full_join_updates_all_three_systems() {
        let f = fixture();
        let report = f
            .orchestrator
            .join(&request("abc123", "wonderland", Some(hardware("Worker-01", "10.0.0.7"))))
            .await
            .unwrap();

        assert_eq!(
            f.gateway.joins(),
            vec![("10.0.0.1:6443".to_string(), "abc123".to_string(), "sha256:feed".to_string())]
        );

        let row = f.registry.inner().get_node("worker-01").unwrap();
        assert_eq!(row.ip, "10.0.0.7");
        assert_eq!(row.num_cpu, 16);
        assert_eq!(row.size_mem, 62.79);
        assert_eq!(row.num_gpu, 2);
        assert_eq!(row.gpu_type, "NVIDIA A100");

        assert_eq!(f.store.targets(ExporterType::Node).await.unwrap(), vec!["10.0.0.7:9100"]);
        assert_eq!(f.store.targets(ExporterType::Gpu).await.unwrap(), vec!["10.0.0.7:9400"]);
        assert!(report.failures().is_empty());
        assert_eq!(report.steps().count(), 6);
    }

    #[tokio::test]
    async fn bad_password_changes_nothing() {
        let f = fixture();
        let err = f
            .orchestrator
            .join(&request("abc123", "wonderlanD", Some(hardware("w1", "10.0.0.7"))))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Auth(AuthFailure::InvalidCredentials)));
        assert!(f.gateway.joins().is_empty());
        assert_eq!(f.registry.inner().node_count(), 0);
    }

    #[tokio::test]
    async fn unknown_token_changes_nothing() {
        let f = fixture();
        let err = f
            .orchestrator
            .join(&request("zzz999", "wonderland", Some(hardware("w1", "10.0.0.7"))))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Auth(AuthFailure::InvalidToken)));
        assert!(f.gateway.joins().is_empty());
    }

    #[tokio::test]
    async fn invalid_node_name_rejected_before_join() {
        let f = fixture();
        let err = f
            .orchestrator
            .join(&request("abc123", "wonderland", Some(hardware("bad_name!", "10.0.0.7"))))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Validation(_)));
        assert!(f.gateway.joins().is_empty());
    }

    #[tokio::test]
    async fn cluster_join_failure_skips_bookkeeping() {
        let f = fixture();
        f.gateway.fail_join("error execution phase preflight");
        let err = f
            .orchestrator
            .join(&request("abc123", "wonderland", Some(hardware("w1", "10.0.0.7"))))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::ExternalTool(_)));
        assert_eq!(f.registry.inner().node_count(), 0);
        assert!(f.store.targets(ExporterType::Node).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn registry_failure_after_join_is_partial() {
        let f = fixture();
        f.registry.fail_inserts();
        let err = f
            .orchestrator
            .join(&request("abc123", "wonderland", Some(hardware("w1", "10.0.0.7"))))
            .await
            .unwrap_err();

        let report = err.report().expect("partial failure carries a report");
        assert_eq!(report.state(Step::InvokeClusterJoin), Some(StepState::Succeeded));
        assert_eq!(report.state(Step::InsertRegistryRow), Some(StepState::Failed));
        assert_eq!(
            report.state(Step::UpdateDiscovery(ExporterType::Node)),
            Some(StepState::Skipped)
        );
        assert_eq!(f.gateway.joins().len(), 1);
        assert!(f.store.targets(ExporterType::Node).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_discovery_failure_keeps_the_other_and_the_row() {
        let f = fixture_with(Some(ExporterType::Gpu));
        let err = f
            .orchestrator
            .join(&request("abc123", "wonderland", Some(hardware("w1", "10.0.0.7"))))
            .await
            .unwrap_err();

        let report = err.report().unwrap();
        assert_eq!(report.failures(), vec![Step::UpdateDiscovery(ExporterType::Gpu)]);
        assert!(f.registry.inner().get_node("w1").is_some());
        assert_eq!(f.store.targets(ExporterType::Node).await.unwrap(), vec!["10.0.0.7:9100"]);
        assert!(f.store.targets(ExporterType::Gpu).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn join_without_hardware_stops_after_cluster_join() {
        let f = fixture();
        let report = f.orchestrator.join(&request("abc123", "wonderland", None)).await.unwrap();
        assert_eq!(report.state(Step::InvokeClusterJoin), Some(StepState::Succeeded));
        assert_eq!(report.state(Step::InsertRegistryRow), Some(StepState::Skipped));
        assert_eq!(f.registry.inner().node_count(), 0);
    }

    #[tokio::test]
    async fn register_records_row_and_targets() {
        let f = fixture();
        let report = f
            .orchestrator
            .register("alice", &hardware("gpu-box", "192.168.1.20"))
            .await
            .unwrap();
        assert_eq!(report.state(Step::InsertRegistryRow), Some(StepState::Succeeded));
        assert!(f.registry.inner().get_node("gpu-box").is_some());
        assert_eq!(
            f.store.targets(ExporterType::Gpu).await.unwrap(),
            vec!["192.168.1.20:9400"]
        );
        assert!(f.gateway.joins().is_empty());
    }

    #[tokio::test]
    async fn register_unknown_user_is_storage_error() {
        let f = fixture();
        let err = f
            .orchestrator
            .register("mallory", &hardware("w1", "10.0.0.7"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Storage(_)));
        assert!(f.store.targets(ExporterType::Node).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_duplicate_name_is_storage_error() {
        let f = fixture();
        f.orchestrator.register("alice", &hardware("w1", "10.0.0.7")).await.unwrap();
        let err = f
            .orchestrator
            .register("alice", &hardware("w1", "10.0.0.8"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Storage(_)));
        assert_eq!(f.registry.inner().get_node("w1").unwrap().ip, "10.0.0.7");
    }
}
