//! Local hardware facts reported on join.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use sysinfo::System;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use fleetgate_cluster::{CommandRunner, CommandSpec};
use fleetgate_core::{HardwareInfo, bytes_to_gib};

const NVIDIA_SMI_TIMEOUT: Duration = Duration::from_secs(30);

/// The machine's hostname, as the cluster will know it.
pub fn node_name() -> anyhow::Result<String> {
    System::host_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .context("could not determine hostname")
}

/// Address of the interface that routes to the control plane.
pub async fn local_ip(control_plane: &str, port: u16) -> anyhow::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    // Connecting a UDP socket sends nothing; it only selects a route.
    socket
        .connect((control_plane, port))
        .await
        .with_context(|| format!("no route to {control_plane}"))?;
    Ok(socket.local_addr()?.ip())
}

/// `(count, model of the first GPU)` from `nvidia-smi --query-gpu=name`.
pub fn parse_gpu_list(stdout: &str) -> (u32, String) {
    let names: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let model = names.first().map(|n| n.to_string()).unwrap_or_default();
    (names.len() as u32, model)
}

async fn gpus(runner: &impl CommandRunner) -> (u32, String) {
    let spec = CommandSpec::new("nvidia-smi", NVIDIA_SMI_TIMEOUT)
        .arg("--query-gpu=name")
        .arg("--format=csv,noheader");
    match runner.run(&spec).await {
        Ok(output) if output.success() => parse_gpu_list(&output.stdout),
        Ok(output) => {
            warn!(error = %output.diagnostic(), "nvidia-smi failed, reporting no GPUs");
            (0, String::new())
        }
        Err(e) => {
            debug!(error = %e, "nvidia-smi unavailable, reporting no GPUs");
            (0, String::new())
        }
    }
}

/// Gather everything `/join` and `/join-complete` expect.
pub async fn collect(runner: &impl CommandRunner, control_plane: &str, port: u16) -> anyhow::Result<HardwareInfo> {
    let sys = System::new_all();
    let num_cpu = sys.physical_core_count().unwrap_or_else(|| sys.cpus().len()) as u32;
    let (num_gpu, gpu_type) = gpus(runner).await;

    Ok(HardwareInfo {
        name: node_name()?,
        ip: local_ip(control_plane, port).await?.to_string(),
        num_cpu,
        size_mem: bytes_to_gib(sys.total_memory()),
        num_gpu,
        gpu_type,
    })
}
