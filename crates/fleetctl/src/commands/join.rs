use fleetgate_cluster::TokioRunner;
use fleetgate_core::HardwareInfo;
use serde_json::{Value, json};

use crate::client::{ApiClient, error_message};
use crate::hardware;

fn print_hardware(info: &HardwareInfo) {
    println!("Hardware:");
    println!("  {:>10}: {}", "name", info.name);
    println!("  {:>10}: {}", "ip", info.ip);
    println!("  {:>10}: {}", "cpus", info.num_cpu);
    println!("  {:>10}: {:.2} GiB", "memory", info.size_mem);
    println!("  {:>10}: {}", "gpus", info.num_gpu);
    if !info.gpu_type.is_empty() {
        println!("  {:>10}: {}", "gpu model", info.gpu_type);
    }
}

fn print_steps(reply: &Value) {
    if let Some(steps) = reply.get("steps").and_then(Value::as_object) {
        for (step, status) in steps {
            let state = status.get("state").and_then(Value::as_str).unwrap_or("?");
            match status.get("detail").and_then(Value::as_str) {
                Some(detail) => println!("  {step}: {state} ({detail})"),
                None => println!("  {step}: {state}"),
            }
        }
    }
}

pub struct JoinArgs<'a> {
    pub control_plane: &'a str,
    pub token: &'a str,
    pub ca_cert_hash: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// Join the cluster and register this machine in one request.
pub async fn join(client: &ApiClient, args: JoinArgs<'_>, api_port: u16) -> anyhow::Result<()> {
    let info = hardware::collect(&TokioRunner, args.control_plane, api_port).await?;
    print_hardware(&info);

    let body = json!({
        "token": args.token,
        "caCertHash": args.ca_cert_hash,
        "username": args.username,
        "password": args.password,
        "hardwareInfo": info,
    });
    let (status, reply) = client.post("/join", &body).await?;
    print_steps(&reply);

    if status.is_success() {
        println!("✓ Joined the cluster as {}", info.name);
        Ok(())
    } else if reply.get("status").and_then(Value::as_str) == Some("partial") {
        anyhow::bail!(
            "joined the cluster but bookkeeping is incomplete ({status}): {}",
            error_message(&reply)
        )
    } else {
        anyhow::bail!("join failed ({status}): {}", error_message(&reply))
    }
}

/// Register an already joined machine.
pub async fn register(client: &ApiClient, control_plane: &str, username: &str, api_port: u16) -> anyhow::Result<()> {
    let info = hardware::collect(&TokioRunner, control_plane, api_port).await?;
    print_hardware(&info);

    let body = json!({ "username": username, "hardwareInfo": info });
    let (status, reply) = client.post("/join-complete", &body).await?;
    print_steps(&reply);

    if status.is_success() {
        println!("✓ Registered {}", info.name);
        Ok(())
    } else {
        anyhow::bail!("registration failed ({status}): {}", error_message(&reply))
    }
}
