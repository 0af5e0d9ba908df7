//! In-memory registry for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use fleetgate_core::NodeRecord;

use crate::error::{RegistryError, RegistryResult};
use crate::{NodeRegistry, RegistryFuture};

#[derive(Default)]
struct Tables {
    /// username -> (id, password hash)
    users: HashMap<String, (i64, String)>,
    nodes: HashMap<String, NodeRecord>,
    next_user_id: i64,
}

/// `NodeRegistry` held entirely in process memory.
///
/// Enforces the same unique node name the MySQL schema does. Can be
/// switched to "unavailable" to simulate a database outage.
#[derive(Default)]
pub struct MemoryRegistry {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user and return its id.
    pub fn add_user(&self, username: &str, password_hash: &str) -> i64 {
        let mut tables = self.lock();
        tables.next_user_id += 1;
        let id = tables.next_user_id;
        tables
            .users
            .insert(username.to_string(), (id, password_hash.to_string()));
        id
    }

    /// Make every subsequent operation fail with a pool error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get_node(&self, name: &str) -> Option<NodeRecord> {
        self.lock().nodes.get(name).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> RegistryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Pool("registry unavailable".to_string()));
        }
        Ok(())
    }
}

impl NodeRegistry for MemoryRegistry {
    fn find_user_id<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, i64> {
        Box::pin(async move {
            self.check_available()?;
            self.lock()
                .users
                .get(username)
                .map(|(id, _)| *id)
                .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))
        })
    }

    fn find_password_hash<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, Option<String>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.lock().users.get(username).map(|(_, hash)| hash.clone()))
        })
    }

    fn insert_node<'a>(&'a self, record: &'a NodeRecord) -> RegistryFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.lock();
            if tables.nodes.contains_key(&record.name) {
                return Err(RegistryError::AlreadyRegistered(record.name.clone()));
            }
            tables.nodes.insert(record.name.clone(), record.clone());
            Ok(())
        })
    }

    fn delete_node_by_name<'a>(&'a self, name: &'a str) -> RegistryFuture<'a, u64> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.lock().nodes.remove(name).map_or(0, |_| 1))
        })
    }
}
