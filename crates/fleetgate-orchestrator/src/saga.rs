//! Saga bookkeeping: named steps and their recorded outcomes.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use fleetgate_core::ExporterType;

/// Every step a join or leave can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    AuthenticatePassword,
    ValidateToken,
    InvokeClusterJoin,
    InsertRegistryRow,
    UpdateDiscovery(ExporterType),
    InvokeClusterRemoval,
    DeleteRegistryRow,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::AuthenticatePassword => "AuthenticatePassword",
            Step::ValidateToken => "ValidateToken",
            Step::InvokeClusterJoin => "InvokeClusterJoin",
            Step::InsertRegistryRow => "InsertRegistryRow",
            Step::UpdateDiscovery(ExporterType::Node) => "UpdateDiscovery(node_exporter)",
            Step::UpdateDiscovery(ExporterType::Gpu) => "UpdateDiscovery(gpu_exporter)",
            Step::InvokeClusterRemoval => "InvokeClusterRemoval",
            Step::DeleteRegistryRow => "DeleteRegistryRow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Succeeded,
    Failed,
    Skipped,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered record of what each step of one saga run did.
///
/// Serializes as a JSON object keyed by step name, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SagaReport {
    steps: Vec<(Step, StepStatus)>,
}

impl SagaReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, step: Step, state: StepState, detail: Option<String>) {
        self.steps.push((step, StepStatus { state, detail }));
    }

    pub fn succeeded(&mut self, step: Step) {
        self.record(step, StepState::Succeeded, None);
    }

    pub fn succeeded_with(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepState::Succeeded, Some(detail.into()));
    }

    pub fn failed(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepState::Failed, Some(detail.into()));
    }

    pub fn skipped(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepState::Skipped, Some(detail.into()));
    }

    pub fn not_found(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepState::NotFound, Some(detail.into()));
    }

    pub fn get(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, status)| status)
    }

    pub fn state(&self, step: Step) -> Option<StepState> {
        self.get(step).map(|status| status.state)
    }

    pub fn steps(&self) -> impl Iterator<Item = (Step, &StepStatus)> {
        self.steps.iter().map(|(step, status)| (*step, status))
    }

    /// Steps that failed, in order.
    pub fn failures(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|(_, status)| status.state == StepState::Failed)
            .map(|(step, _)| *step)
            .collect()
    }
}

impl Serialize for SagaReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.steps.len()))?;
        for (step, status) in &self.steps {
            map.serialize_entry(step.name(), status)?;
        }
        map.end()
    }
}
