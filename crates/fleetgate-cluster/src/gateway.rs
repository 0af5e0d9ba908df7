//! Membership gateway — add and remove machines from the cluster view.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use fleetgate_core::config::ClusterConfig;

use crate::error::{GatewayError, GatewayResult};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, TokioRunner};

/// Boxed future returned by [`MembershipGateway`] operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send + 'a>>;

/// Marker `kubectl delete` prints when it actually removed something.
const DELETED_MARKER: &str = "deleted";

/// Outcome of a successful removal command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The node existed and was deleted.
    Deleted { output: String },
    /// The command succeeded but reported nothing deleted.
    NotFound { output: String },
}

/// The cluster orchestrator's membership surface.
pub trait MembershipGateway: Send + Sync {
    /// Join tokens the orchestrator currently accepts.
    fn list_tokens(&self) -> GatewayFuture<'_, HashSet<String>>;

    /// Enroll a machine. Returns the command's stdout.
    fn join_membership<'a>(
        &'a self,
        control_plane: &'a str,
        token: &'a str,
        ca_cert_hash: &'a str,
    ) -> GatewayFuture<'a, String>;

    /// Delete a node from the membership view, tolerating its absence.
    fn remove_membership<'a>(&'a self, node_name: &'a str) -> GatewayFuture<'a, Removal>;

    /// Force-reset the local node agent. Returns the command's stdout.
    fn reset_local_agent(&self) -> GatewayFuture<'_, String>;
}

/// Gateway backed by the `kubeadm` and `kubectl` binaries.
pub struct KubeadmGateway<R = TokioRunner> {
    config: ClusterConfig,
    runner: R,
}

impl KubeadmGateway<TokioRunner> {
    pub fn new(config: ClusterConfig) -> Self {
        Self::with_runner(config, TokioRunner)
    }
}

impl<R: CommandRunner> KubeadmGateway<R> {
    pub fn with_runner(config: ClusterConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn command(&self, program: &str, timeout: Duration) -> CommandSpec {
        let spec = CommandSpec::new(program, timeout);
        match &self.config.kubeconfig {
            Some(path) => spec.env("KUBECONFIG", path.to_string_lossy()),
            None => spec,
        }
    }

    fn token_list_command(&self) -> CommandSpec {
        self.command(&self.config.kubeadm_bin, self.config.token_list_timeout())
            .arg("token")
            .arg("list")
            .arg("-o")
            .arg("json")
    }

    fn join_command(&self, control_plane: &str, token: &str, ca_cert_hash: &str) -> CommandSpec {
        self.command(&self.config.kubeadm_bin, self.config.join_timeout())
            .arg("join")
            .arg(control_plane)
            .arg("--token")
            .arg(token)
            .arg("--discovery-token-ca-cert-hash")
            .arg(ca_cert_hash)
    }

    fn delete_command(&self, node_name: &str) -> CommandSpec {
        self.command(&self.config.kubectl_bin, self.config.remove_timeout())
            .arg("delete")
            .arg("node")
            .arg(node_name)
            .arg("--ignore-not-found=true")
    }

    fn reset_command(&self) -> CommandSpec {
        self.command(&self.config.kubeadm_bin, self.config.reset_timeout())
            .arg("reset")
            .arg("-f")
    }

    /// Run `spec`, folding spawn errors, timeouts and non-zero exits into
    /// one diagnostic string.
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, String> {
        match self.runner.run(spec).await {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => Err(output.diagnostic()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn tokens(&self) -> GatewayResult<HashSet<String>> {
        let output = self
            .run_checked(&self.token_list_command())
            .await
            .map_err(GatewayError::Enumeration)?;
        let tokens = parse_token_list(&output.stdout)?;
        debug!(count = tokens.len(), "join tokens enumerated");
        Ok(tokens)
    }

    async fn join(&self, control_plane: &str, token: &str, ca_cert_hash: &str) -> GatewayResult<String> {
        let spec = self.join_command(control_plane, token, ca_cert_hash);
        info!(%control_plane, "invoking cluster join");
        match self.run_checked(&spec).await {
            Ok(output) => {
                info!(%control_plane, "cluster join succeeded");
                Ok(output.stdout.trim().to_string())
            }
            Err(stderr) => {
                warn!(%control_plane, %stderr, "cluster join failed");
                Err(GatewayError::JoinFailed { stderr })
            }
        }
    }

    async fn remove(&self, node_name: &str) -> GatewayResult<Removal> {
        let spec = self.delete_command(node_name);
        let output = match self.run_checked(&spec).await {
            Ok(output) => output.stdout.trim().to_string(),
            Err(stderr) => {
                warn!(node = %node_name, %stderr, "node removal failed");
                return Err(GatewayError::RemovalFailed { stderr });
            }
        };

        if output.contains(DELETED_MARKER) {
            info!(node = %node_name, %output, "node removed from cluster");
            Ok(Removal::Deleted { output })
        } else {
            info!(node = %node_name, "node not present in cluster");
            Ok(Removal::NotFound { output })
        }
    }

    async fn reset(&self) -> GatewayResult<String> {
        match self.run_checked(&self.reset_command()).await {
            Ok(output) => {
                info!("local node agent reset");
                Ok(output.stdout.trim().to_string())
            }
            Err(stderr) => {
                warn!(%stderr, "local node agent reset failed");
                Err(GatewayError::ResetFailed { stderr })
            }
        }
    }
}

impl<R: CommandRunner> MembershipGateway for KubeadmGateway<R> {
    fn list_tokens(&self) -> GatewayFuture<'_, HashSet<String>> {
        Box::pin(self.tokens())
    }

    fn join_membership<'a>(
        &'a self,
        control_plane: &'a str,
        token: &'a str,
        ca_cert_hash: &'a str,
    ) -> GatewayFuture<'a, String> {
        Box::pin(self.join(control_plane, token, ca_cert_hash))
    }

    fn remove_membership<'a>(&'a self, node_name: &'a str) -> GatewayFuture<'a, Removal> {
        Box::pin(self.remove(node_name))
    }

    fn reset_local_agent(&self) -> GatewayFuture<'_, String> {
        Box::pin(self.reset())
    }
}

/// Parse `kubeadm token list -o json` output.
///
/// The CLI prints one JSON object per token back to back rather than an
/// array, so the output is read as a stream of values. Every value must be
/// an object with a string `token` field.
pub fn parse_token_list(output: &str) -> GatewayResult<HashSet<String>> {
    let mut tokens = HashSet::new();
    for value in serde_json::Deserializer::from_str(output).into_iter::<Value>() {
        let value = value.map_err(|e| GatewayError::Enumeration(format!("unparsable token list: {e}")))?;
        let token = value
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Enumeration(format!("token entry without token field: {value}")))?;
        tokens.insert(token.to_string());
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::runner::{RunError, RunFuture};

    /// Replays canned results and records every command it was given.
    #[derive(Default)]
    struct ScriptedRunner {
        results: Mutex<VecDeque<Result<CommandOutput, RunError>>>,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        fn push_ok(self, code: i32, stdout: &str, stderr: &str) -> Self {
            self.results.lock().unwrap().push_back(Ok(CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }));
            self
        }

        fn push_err(self, err: RunError) -> Self {
            self.results.lock().unwrap().push_back(Err(err));
            self
        }

        fn seen(&self) -> Vec<CommandSpec> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run<'a>(&'a self, spec: &'a CommandSpec) -> RunFuture<'a> {
            self.seen.lock().unwrap().push(spec.clone());
            let next = self
                .results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected command");
            Box::pin(async move { next })
        }
    }

    fn gateway(runner: ScriptedRunner) -> KubeadmGateway<ScriptedRunner> {
        let config = ClusterConfig {
            kubeconfig: Some(PathBuf::from("/etc/kubernetes/admin.conf")),
            ..Default::default()
        };
        KubeadmGateway::with_runner(config, runner)
    }

    const TOKEN_LIST: &str = r#"{"kind":"BootstrapToken","token":"abc123.0123456789abcdef","ttl":"23h"}
{"kind":"BootstrapToken","token":"def456.fedcba9876543210","ttl":"1h"}
"#;

    #[test]
    fn token_list_accepts_concatenated_objects() {
        let tokens = parse_token_list(TOKEN_LIST).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("abc123.0123456789abcdef"));
        assert!(tokens.contains("def456.fedcba9876543210"));
    }

    #[test]
    fn token_list_empty_output_is_empty_set() {
        assert!(parse_token_list("").unwrap().is_empty());
        assert!(parse_token_list("\n").unwrap().is_empty());
    }

    #[test]
    fn token_list_rejects_garbage() {
        assert!(matches!(
            parse_token_list("{\"token\": \"a\"}\nnot json"),
            Err(GatewayError::Enumeration(_))
        ));
        assert!(matches!(
            parse_token_list(r#"{"ttl": "1h"}"#),
            Err(GatewayError::Enumeration(_))
        ));
    }

    #[tokio::test]
    async fn list_tokens_runs_kubeadm_with_kubeconfig() {
        let gw = gateway(ScriptedRunner::default().push_ok(0, TOKEN_LIST, ""));
        let tokens = gw.list_tokens().await.unwrap();
        assert_eq!(tokens.len(), 2);

        let seen = gw.runner.seen();
        assert_eq!(seen[0].program, "kubeadm");
        assert_eq!(seen[0].args, vec!["token", "list", "-o", "json"]);
        assert_eq!(
            seen[0].env,
            vec![("KUBECONFIG".to_string(), "/etc/kubernetes/admin.conf".to_string())]
        );
    }

    #[tokio::test]
    async fn list_tokens_failure_is_enumeration_error() {
        let gw = gateway(ScriptedRunner::default().push_ok(1, "", "unable to reach api server"));
        let err = gw.list_tokens().await.unwrap_err();
        assert!(matches!(err, GatewayError::Enumeration(msg) if msg.contains("unable to reach")));
    }

    #[tokio::test]
    async fn join_passes_token_and_hash_with_bounded_timeout() {
        let gw = gateway(ScriptedRunner::default().push_ok(0, "This node has joined the cluster", ""));
        gw.join_membership("10.0.0.1:6443", "abc123", "sha256:ffff")
            .await
            .unwrap();

        let seen = gw.runner.seen();
        assert_eq!(
            seen[0].args,
            vec![
                "join",
                "10.0.0.1:6443",
                "--token",
                "abc123",
                "--discovery-token-ca-cert-hash",
                "sha256:ffff"
            ]
        );
        assert_eq!(seen[0].timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn join_non_zero_exit_carries_stderr() {
        let gw = gateway(ScriptedRunner::default().push_ok(1, "", "[preflight] node already joined\n"));
        let err = gw.join_membership("10.0.0.1:6443", "abc123", "sha256:ffff").await.unwrap_err();
        match err {
            GatewayError::JoinFailed { stderr } => assert_eq!(stderr, "[preflight] node already joined"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn join_timeout_is_join_failure() {
        let gw = gateway(ScriptedRunner::default().push_err(RunError::TimedOut {
            program: "kubeadm".to_string(),
            timeout: Duration::from_secs(300),
        }));
        let err = gw.join_membership("10.0.0.1:6443", "abc123", "sha256:ffff").await.unwrap_err();
        assert!(matches!(err, GatewayError::JoinFailed { stderr } if stderr.contains("timed out")));
    }

    #[tokio::test]
    async fn remove_detects_deleted_marker() {
        let gw = gateway(ScriptedRunner::default().push_ok(0, "node \"gpu-01\" deleted\n", ""));
        let removal = gw.remove_membership("gpu-01").await.unwrap();
        assert_eq!(
            removal,
            Removal::Deleted {
                output: "node \"gpu-01\" deleted".to_string()
            }
        );

        let seen = gw.runner.seen();
        assert_eq!(seen[0].program, "kubectl");
        assert_eq!(seen[0].args, vec!["delete", "node", "gpu-01", "--ignore-not-found=true"]);
        assert_eq!(seen[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn remove_without_marker_is_not_found() {
        let gw = gateway(ScriptedRunner::default().push_ok(0, "", ""));
        let removal = gw.remove_membership("gpu-01").await.unwrap();
        assert!(matches!(removal, Removal::NotFound { .. }));
    }

    #[tokio::test]
    async fn remove_non_zero_exit_is_removal_failure() {
        let gw = gateway(ScriptedRunner::default().push_ok(1, "", "forbidden"));
        let err = gw.remove_membership("gpu-01").await.unwrap_err();
        assert!(matches!(err, GatewayError::RemovalFailed { stderr } if stderr == "forbidden"));
    }

    #[tokio::test]
    async fn reset_runs_forced_reset() {
        let gw = gateway(ScriptedRunner::default().push_ok(0, "[reset] done", ""));
        assert_eq!(gw.reset_local_agent().await.unwrap(), "[reset] done");
        assert_eq!(gw.runner.seen()[0].args, vec!["reset", "-f"]);

        let gw = gateway(ScriptedRunner::default().push_ok(1, "", "etcd busy"));
        assert!(matches!(
            gw.reset_local_agent().await,
            Err(GatewayError::ResetFailed { .. })
        ));
    }
}
