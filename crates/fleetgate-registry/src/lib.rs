//! fleetgate-registry — relational store of node identity and hardware facts.
//!
//! Rows live in a MySQL `node` table keyed by node name and owned by a
//! row of the `users` table. Users are provisioned out of band; this
//! crate only reads them.
//!
//! Access goes through the [`NodeRegistry`] trait so orchestration can be
//! exercised against [`MemoryRegistry`] without a database. The MySQL
//! implementation holds an explicitly owned `sqlx` pool: every operation
//! borrows a connection for a single statement and the pool guard returns
//! it on every exit path.

pub mod error;
pub mod memory;
pub mod mysql;
pub mod schema;

use std::future::Future;
use std::pin::Pin;

use fleetgate_core::NodeRecord;

pub use error::{RegistryError, RegistryResult};
pub use memory::MemoryRegistry;
pub use mysql::MySqlRegistry;

/// Boxed future returned by [`NodeRegistry`] operations.
pub type RegistryFuture<'a, T> = Pin<Box<dyn Future<Output = RegistryResult<T>> + Send + 'a>>;

/// Operations the orchestrators need from the node registry.
pub trait NodeRegistry: Send + Sync {
    /// Resolve a username to its row id. Fails with [`RegistryError::UserNotFound`].
    fn find_user_id<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, i64>;

    /// Stored password hash for `username`, or `None` if the user does not exist.
    fn find_password_hash<'a>(&'a self, username: &'a str) -> RegistryFuture<'a, Option<String>>;

    /// Insert a node row. Re-inserting an existing name is rejected by the store.
    fn insert_node<'a>(&'a self, record: &'a NodeRecord) -> RegistryFuture<'a, ()>;

    /// Delete the row named `name`. Returns the number of rows removed; zero
    /// means the registry was already consistent.
    fn delete_node_by_name<'a>(&'a self, name: &'a str) -> RegistryFuture<'a, u64>;
}
