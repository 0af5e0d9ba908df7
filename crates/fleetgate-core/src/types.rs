//! Shared types used across fleetgate crates.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest name the cluster accepts for a node (one DNS label).
pub const MAX_NODE_NAME_LEN: usize = 63;

static NODE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("node name pattern is valid"));

/// Monitoring exporter running on every joined node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterType {
    /// Host metrics exporter.
    Node,
    /// Accelerator telemetry exporter.
    Gpu,
}

impl ExporterType {
    pub const ALL: [ExporterType; 2] = [ExporterType::Node, ExporterType::Gpu];

    pub fn default_port(self) -> u16 {
        match self {
            ExporterType::Node => 9100,
            ExporterType::Gpu => 9400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExporterType::Node => "node_exporter",
            ExporterType::Gpu => "gpu_exporter",
        }
    }
}

impl fmt::Display for ExporterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware facts reported by a worker when it joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub name: String,
    pub ip: String,
    #[serde(alias = "num_cpu")]
    pub num_cpu: u32,
    /// Memory in GiB.
    #[serde(alias = "size_mem")]
    pub size_mem: f64,
    #[serde(alias = "num_gpu", default)]
    pub num_gpu: u32,
    #[serde(alias = "gpu_type", default)]
    pub gpu_type: String,
}

/// Node role stored in the registry `type` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    #[default]
    Worker = 0,
    ControlPlane = 1,
}

/// Node status stored in the registry `status` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Idle = 0,
    Busy = 1,
}

/// A row of the node registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub ip: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub user_id: i64,
    pub num_cpu: u32,
    pub size_mem: f64,
    pub num_gpu: u32,
    pub gpu_type: String,
}

impl NodeRecord {
    /// Build a registry row for a freshly joined worker owned by `user_id`.
    pub fn from_hardware(info: &HardwareInfo, user_id: i64) -> Result<Self, InvalidNodeName> {
        Ok(Self {
            name: normalize_node_name(&info.name)?,
            ip: info.ip.trim().to_string(),
            node_type: NodeType::Worker,
            status: NodeStatus::Idle,
            user_id,
            num_cpu: info.num_cpu,
            size_mem: round_gib(info.size_mem),
            num_gpu: info.num_gpu,
            gpu_type: info.gpu_type.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node name {0:?}: expected lowercase letters, digits and hyphens (max 63)")]
pub struct InvalidNodeName(pub String);

/// Lowercase `raw` and check it is a usable cluster node name.
pub fn normalize_node_name(raw: &str) -> Result<String, InvalidNodeName> {
    let name = raw.trim().to_lowercase();
    if name.len() > MAX_NODE_NAME_LEN || !NODE_NAME_RE.is_match(&name) {
        return Err(InvalidNodeName(raw.to_string()));
    }
    Ok(name)
}

/// Round a memory size to two decimals.
pub fn round_gib(size: f64) -> f64 {
    (size * 100.0).round() / 100.0
}

/// Convert a byte count to GiB rounded to two decimals.
pub fn bytes_to_gib(bytes: u64) -> f64 {
    round_gib(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}
