//! fleetgate.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::ExporterType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub cluster: ClusterConfig,
    pub database: DatabaseConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:12000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Exported as `KUBECONFIG` to every cluster CLI invocation.
    pub kubeconfig: Option<PathBuf>,
    pub kubeadm_bin: String,
    pub kubectl_bin: String,
    /// Control-plane API server address handed to the join command.
    pub api_server: String,
    pub join_timeout_secs: u64,
    pub remove_timeout_secs: u64,
    pub reset_timeout_secs: u64,
    pub token_list_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: Some(PathBuf::from("/root/.kube/config")),
            kubeadm_bin: "kubeadm".to_string(),
            kubectl_bin: "kubectl".to_string(),
            api_server: "127.0.0.1:6443".to_string(),
            join_timeout_secs: 300,
            remove_timeout_secs: 30,
            reset_timeout_secs: 300,
            token_list_timeout_secs: 30,
        }
    }
}

impl ClusterConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn remove_timeout(&self) -> Duration {
        Duration::from_secs(self.remove_timeout_secs)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    pub fn token_list_timeout(&self) -> Duration {
        Duration::from_secs(self.token_list_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub max_lifetime_secs: u64,
    pub acquire_timeout_secs: u64,
    /// Create the `users` and `node` tables at startup when they are missing.
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            name: "dkube".to_string(),
            user: "fleetgate".to_string(),
            password: String::new(),
            max_open_conns: 100,
            max_idle_conns: 10,
            max_lifetime_secs: 30,
            acquire_timeout_secs: 10,
            create_schema: false,
        }
    }
}

impl DatabaseConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory holding one file_sd document per exporter type.
    pub dir: PathBuf,
    pub node_exporter_file: String,
    pub gpu_exporter_file: String,
    pub node_exporter_port: u16,
    pub gpu_exporter_port: u16,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/etc/prometheus/file_sd"),
            node_exporter_file: "node_exporter.json".to_string(),
            gpu_exporter_file: "gpu_exporter.json".to_string(),
            node_exporter_port: ExporterType::Node.default_port(),
            gpu_exporter_port: ExporterType::Gpu.default_port(),
        }
    }
}

impl DiscoveryConfig {
    /// Document path for an exporter type.
    pub fn path_for(&self, exporter: ExporterType) -> PathBuf {
        match exporter {
            ExporterType::Node => self.dir.join(&self.node_exporter_file),
            ExporterType::Gpu => self.dir.join(&self.gpu_exporter_file),
        }
    }

    pub fn port_for(&self, exporter: ExporterType) -> u16 {
        match exporter {
            ExporterType::Node => self.node_exporter_port,
            ExporterType::Gpu => self.gpu_exporter_port,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy of the config that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.database.password.is_empty() {
            config.database.password = "********".to_string();
        }
        config
    }
}
