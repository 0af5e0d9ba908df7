//! fleetgate-cluster — the cluster orchestrator's membership, seen through its CLI.
//!
//! The orchestrator is never reimplemented here; every action is a
//! bounded subprocess invocation:
//!
//! ```text
//! MembershipGateway
//!   ├── list_tokens()        kubeadm token list -o json
//!   ├── join_membership()    kubeadm join <api> --token … --discovery-token-ca-cert-hash …
//!   ├── remove_membership()  kubectl delete node <name> --ignore-not-found=true
//!   └── reset_local_agent()  kubeadm reset -f
//! ```
//!
//! Subprocesses run through a [`CommandRunner`] so the gateway can be
//! driven by scripted output in tests. The runner enforces every timeout
//! itself and kills the child when it elapses.

pub mod error;
pub mod gateway;
pub mod runner;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{GatewayFuture, KubeadmGateway, MembershipGateway, Removal, parse_token_list};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, RunError, RunFuture, TokioRunner};
