use clap::{Parser, Subcommand};

mod client;
mod commands;
mod hardware;

use client::{ApiClient, DEFAULT_API_PORT};

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "fleetgate — join or leave the cluster from a worker machine",
    version,
    propagate_version = true,
)]
struct Cli {
    /// fleetgate API port on the control plane.
    #[arg(long, global = true, default_value_t = DEFAULT_API_PORT)]
    api_port: u16,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    insecure: bool,

    /// Talk to the API over plain HTTP.
    #[arg(long, global = true)]
    http: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the cluster and register this machine's hardware.
    Join {
        /// Control-plane address (IP or hostname)
        control_plane: String,
        /// Bootstrap token issued by the control plane
        token: String,
        /// Discovery token CA cert hash (sha256:...)
        ca_cert_hash: String,
        username: String,
        password: String,
    },
    /// Register this (already joined) machine's hardware.
    Register {
        control_plane: String,
        username: String,
    },
    /// Remove this machine from the cluster and reset it.
    Leave {
        control_plane: String,
        username: String,
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("fleetctl=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client_for = |control_plane: &str| ApiClient::new(control_plane, cli.api_port, cli.insecure, cli.http);

    match &cli.command {
        Commands::Join {
            control_plane,
            token,
            ca_cert_hash,
            username,
            password,
        } => {
            let client = client_for(control_plane)?;
            let args = commands::join::JoinArgs {
                control_plane,
                token,
                ca_cert_hash,
                username,
                password,
            };
            commands::join::join(&client, args, cli.api_port).await
        }
        Commands::Register {
            control_plane,
            username,
        } => {
            let client = client_for(control_plane)?;
            commands::join::register(&client, control_plane, username, cli.api_port).await
        }
        Commands::Leave {
            control_plane,
            username,
            password,
        } => {
            let client = client_for(control_plane)?;
            commands::leave::leave(&client, username, password).await
        }
    }
}
