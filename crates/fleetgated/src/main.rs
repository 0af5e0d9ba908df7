//! fleetgated — the fleetgate control-plane daemon.
//!
//! Assembles the node registry (MySQL), the discovery file store, the
//! cluster membership gateway (kubeadm/kubectl) and the join/leave
//! orchestrators behind the HTTP API.
//!
//! # Usage
//!
//! ```text
//! fleetgated serve --config /etc/fleetgate/fleetgate.toml
//! echo -n 's3cret' | fleetgated hash-password
//! fleetgated check-config --config /etc/fleetgate/fleetgate.toml
//! ```

mod logging;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use fleetgate_api::{ApiState, build_router};
use fleetgate_cluster::KubeadmGateway;
use fleetgate_core::FleetConfig;
use fleetgate_core::config::LoggingConfig;
use fleetgate_discovery::DiscoveryFileStore;
use fleetgate_orchestrator::{JoinOrchestrator, LeaveOrchestrator, hash_password};
use fleetgate_registry::MySqlRegistry;

#[derive(Parser)]
#[command(name = "fleetgated", about = "fleetgate control-plane daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the join/leave API.
    Serve {
        /// Configuration file. Built-in defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override `[server].listen_addr`.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Read a password from stdin and print its PHC hash for the users table.
    HashPassword,

    /// Parse a configuration file and print the effective settings.
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<FleetConfig> {
    match path {
        Some(path) => FleetConfig::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(FleetConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, listen } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            logging::init(&config.logging);
            serve(config).await
        }
        Command::HashPassword => {
            logging::init(&LoggingConfig::default());
            let mut password = String::new();
            std::io::stdin().read_to_string(&mut password)?;
            let password = password.trim_end_matches(['\r', '\n']);
            anyhow::ensure!(!password.is_empty(), "empty password on stdin");
            let hash = hash_password(password).map_err(|e| anyhow::anyhow!("hashing failed: {e}"))?;
            println!("{hash}");
            Ok(())
        }
        Command::CheckConfig { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", config.redacted().to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: FleetConfig) -> anyhow::Result<()> {
    info!("fleetgate daemon starting");

    // ── Subsystems ─────────────────────────────────────────────

    let registry = MySqlRegistry::connect_lazy(&config.database);
    if config.database.create_schema {
        registry.ensure_schema().await.context("creating registry schema")?;
    }
    info!(host = %config.database.host, db = %config.database.name, "node registry ready");

    let discovery = Arc::new(DiscoveryFileStore::new(config.discovery.clone()));
    if !config.discovery.dir.is_dir() {
        warn!(dir = ?config.discovery.dir, "discovery directory does not exist yet");
    }

    let gateway = Arc::new(KubeadmGateway::new(config.cluster.clone()));
    info!(api_server = %config.cluster.api_server, "cluster gateway ready");

    let shared_registry = Arc::new(registry.clone());
    let state = ApiState {
        join: Arc::new(JoinOrchestrator::new(
            shared_registry.clone(),
            gateway.clone(),
            discovery,
            config.cluster.api_server.clone(),
        )),
        leave: Arc::new(LeaveOrchestrator::new(shared_registry, gateway)),
    };

    // ── API server ─────────────────────────────────────────────

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    registry.close().await;
    info!("fleetgate daemon stopped");
    Ok(())
}
