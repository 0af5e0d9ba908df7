//! Fakes for the saga tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use fleetgate_cluster::{GatewayError, GatewayFuture, MembershipGateway, Removal};
use fleetgate_core::{ExporterType, NodeRecord};
use fleetgate_discovery::{AddOutcome, DiscoveryError, DiscoveryFileStore, DiscoveryFuture, TargetStore};
use fleetgate_registry::{MemoryRegistry, NodeRegistry, RegistryError, RegistryFuture};

/// Gateway with a fixed token list and scripted join/removal results.
pub struct FakeGateway {
    tokens: HashSet<String>,
    join_error: Mutex<Option<String>>,
    removal: Mutex<Result<Removal, String>>,
    joins: Mutex<Vec<(String, String, String)>>,
    removals: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            join_error: Mutex::new(None),
            removal: Mutex::new(Ok(Removal::NotFound { output: String::new() })),
            joins: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_join(&self, stderr: &str) {
        *self.join_error.lock().unwrap() = Some(stderr.to_string());
    }

    pub fn removal(&self, removal: Removal) {
        *self.removal.lock().unwrap() = Ok(removal);
    }

    pub fn fail_removal(&self, stderr: &str) {
        *self.removal.lock().unwrap() = Err(stderr.to_string());
    }

    /// `(control_plane, token, ca_cert_hash)` of every join attempted.
    pub fn joins(&self) -> Vec<(String, String, String)> {
        self.joins.lock().unwrap().clone()
    }

    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().unwrap().clone()
    }
}

impl MembershipGateway for FakeGateway {
    fn list_tokens(&self) -> GatewayFuture<'_, HashSet<String>> {
        Box::pin(async move { Ok(self.tokens.clone()) })
    }

    fn join_membership<'a>(
        &'a self,
        control_plane: &'a str,
        token: &'a str,
        ca_cert_hash: &'a str,
    ) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            self.joins.lock().unwrap().push((
                control_plane.to_string(),
                token.to_string(),
                ca_cert_hash.to_string(),
            ));
            match self.join_error.lock().unwrap().clone() {
                Some(stderr) => Err(GatewayError::JoinFailed { stderr }),
                None => Ok("This node has joined the cluster".to_string()),
            }
        })
    }

    fn remove_membership<'a>(&'a self, node_name: &'a str) -> GatewayFuture<'a, Removal> {
        Box::pin(async move {
            self.removals.lock().unwrap().push(node_name.to_string());
            self.removal
                .lock()
                .unwrap()
                .clone()
                .map_err(|stderr| GatewayError::RemovalFailed { stderr })
        })
    }

    fn reset_local_agent(&self) -> GatewayFuture<'_, String> {
        Box::pin(async { Ok(String::new()) })
    }
}

/// Memory registry whose writes can be made to fail on their own.
pub struct FlakyRegistry {
    inner: MemoryRegistry,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyRegistry {
    pub fn new(inner: MemoryRegistry) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemoryRegistry {
        &self.inner
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

impl NodeRegistry for FlakyRegistry {
    fn find_user_id<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, i64> {
        self.inner.find_user_id(username)
    }

    fn find_password_hash<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, Option<String>> {
        self.inner.find_password_hash(username)
    }

    fn insert_node<'a>(&'a self, record: &'a NodeRecord) -> RegistryFuture<'a, ()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Box::pin(async { Err(RegistryError::Pool("pool timed out".to_string())) });
        }
        self.inner.insert_node(record)
    }

    fn delete_node_by_name<'a>(&'a self, name: &'a str) -> RegistryFuture<'a, u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Box::pin(async { Err(RegistryError::Query("lock wait timeout exceeded".to_string())) });
        }
        self.inner.delete_node_by_name(name)
    }
}

/// File store that fails writes for one exporter type.
pub struct FlakyStore {
    inner: Arc<DiscoveryFileStore>,
    failing: Option<ExporterType>,
}

impl FlakyStore {
    pub fn new(inner: Arc<DiscoveryFileStore>, failing: Option<ExporterType>) -> Self {
        Self { inner, failing }
    }
}

impl TargetStore for FlakyStore {
    fn add_target<'a>(&'a self, exporter: ExporterType, ip: &'a str) -> DiscoveryFuture<'a, AddOutcome> {
        if self.failing == Some(exporter) {
            let path: PathBuf = self.inner.path_for(exporter);
            return Box::pin(async move {
                Err(DiscoveryError::Write {
                    path,
                    source: std::io::Error::other("no space left on device"),
                })
            });
        }
        self.inner.add_target(exporter, ip)
    }
}
