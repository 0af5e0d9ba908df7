//! DiscoveryFileStore — per-exporter JSON documents on disk.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleetgate_core::ExporterType;
use fleetgate_core::config::DiscoveryConfig;

use crate::document::{self, TargetGroup};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::{AddOutcome, DiscoveryFuture, TargetStore};

/// Distinguishes temp files of concurrent writers in one process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// File-backed target store.
///
/// Holds one lock per exporter type for the whole read-modify-write cycle
/// and replaces documents through a temp file + rename. Share a single
/// instance (behind `Arc`) per process.
pub struct DiscoveryFileStore {
    config: DiscoveryConfig,
    locks: HashMap<ExporterType, Mutex<()>>,
}

impl DiscoveryFileStore {
    pub fn new(config: DiscoveryConfig) -> Self {
        let locks = ExporterType::ALL
            .into_iter()
            .map(|exporter| (exporter, Mutex::new(())))
            .collect();
        Self { config, locks }
    }

    pub fn path_for(&self, exporter: ExporterType) -> PathBuf {
        self.config.path_for(exporter)
    }

    /// Current targets of an exporter's document, flattened across groups.
    /// A missing or malformed document reads as empty.
    pub async fn targets(&self, exporter: ExporterType) -> DiscoveryResult<Vec<String>> {
        let groups = read_document(&self.path_for(exporter)).await?;
        Ok(groups.into_iter().flat_map(|g| g.targets).collect())
    }

    async fn add(&self, exporter: ExporterType, host: &str) -> DiscoveryResult<AddOutcome> {
        let target = document::canonical_target(host, self.config.port_for(exporter))?;
        let path = self.path_for(exporter);

        let _guard = self.locks[&exporter].lock().await;

        let mut groups = read_document(&path).await?;
        if !document::insert_target(&mut groups, &target) {
            debug!(%exporter, %target, "target already present");
            return Ok(AddOutcome::AlreadyPresent);
        }

        write_atomic(&path, &groups).await?;
        info!(%exporter, %target, path = ?path, "discovery target added");
        Ok(AddOutcome::Added)
    }
}

impl TargetStore for DiscoveryFileStore {
    fn add_target<'a>(&'a self, exporter: ExporterType, ip: &'a str) -> DiscoveryFuture<'a, AddOutcome> {
        Box::pin(self.add(exporter, ip))
    }
}

/// Read a document, resetting to a single empty group when it is absent or
/// malformed.
async fn read_document(path: &Path) -> DiscoveryResult<Vec<TargetGroup>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "discovery document absent, starting empty");
            return Ok(vec![TargetGroup::default()]);
        }
        Err(source) => {
            return Err(DiscoveryError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    match document::parse(&bytes) {
        Some(groups) => Ok(groups),
        None => {
            warn!(path = ?path, "discovery document malformed, resetting to one empty group");
            Ok(vec![TargetGroup::default()])
        }
    }
}

/// Write `groups` to a sibling temp file, fsync it, then rename over `path`.
async fn write_atomic(path: &Path, groups: &[TargetGroup]) -> DiscoveryResult<()> {
    let bytes = document::render(groups)?;
    let write_err = |source| DiscoveryError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "targets.json".to_string());
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(source) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(source));
    }
    Ok(())
}
