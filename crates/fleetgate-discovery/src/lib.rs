//! fleetgate-discovery — scrape-target documents for the monitoring stack.
//!
//! Each exporter type owns one JSON document of the shape
//! `[{"targets": ["host:port", ...]}, ...]`, consumed by the monitoring
//! system's file-based discovery. Targets are appended when a node joins
//! and never pruned on leave; the consumer is expected to tolerate stale
//! targets.
//!
//! Writers are serialized per exporter type and every write replaces the
//! document atomically, so concurrent joins never drop a target and the
//! consumer never reads a torn file.

pub mod document;
pub mod error;
pub mod store;

use std::future::Future;
use std::pin::Pin;

use fleetgate_core::ExporterType;

pub use document::TargetGroup;
pub use error::{DiscoveryError, DiscoveryResult};
pub use store::DiscoveryFileStore;

/// Boxed future returned by [`TargetStore`] operations.
pub type DiscoveryFuture<'a, T> = Pin<Box<dyn Future<Output = DiscoveryResult<T>> + Send + 'a>>;

/// Result of adding a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Scrape-target sink the join flow writes to.
pub trait TargetStore: Send + Sync {
    /// Add `ip` at the exporter's fixed port. Idempotent.
    fn add_target<'a>(&'a self, exporter: ExporterType, ip: &'a str) -> DiscoveryFuture<'a, AddOutcome>;
}
