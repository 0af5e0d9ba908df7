use reqwest::StatusCode;
use serde_json::{Value, json};

use fleetgate_cluster::{KubeadmGateway, MembershipGateway};
use fleetgate_core::config::ClusterConfig;

use crate::client::{ApiClient, error_message};
use crate::hardware;

/// Whether the control plane considers the node gone from the cluster.
pub fn cluster_released(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::NOT_FOUND
}

/// Remove this machine from the cluster, then reset the local node agent.
pub async fn leave(client: &ApiClient, username: &str, password: &str) -> anyhow::Result<()> {
    let node_name = hardware::node_name()?;
    println!("Leaving as node {node_name}");

    let body = json!({ "nodeName": node_name, "username": username, "password": password });
    let (status, reply) = client.post("/leave", &body).await?;
    if !cluster_released(status) {
        anyhow::bail!("leave failed ({status}): {}", error_message(&reply));
    }
    if let Some(message) = reply.get("message").and_then(Value::as_str) {
        println!("[1/2] {message}");
    }

    // The worker's own kubelet config is used; no admin kubeconfig here.
    let gateway = KubeadmGateway::new(ClusterConfig {
        kubeconfig: None,
        ..ClusterConfig::default()
    });
    let output = gateway
        .reset_local_agent()
        .await
        .map_err(|e| anyhow::anyhow!("node removed but local reset failed, node is half-removed: {e}"))?;
    println!("[2/2] local node agent reset");
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
