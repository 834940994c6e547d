//! Snapshot persistence
//!
//! The engine itself is in-memory. Hosts persist it between runs by saving a
//! `Snapshot` through a `SnapshotStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::MemoryConfig;
use crate::error::{CrossmemError, Result};
use crate::memory::types::ContextSummary;
use crate::storage::repository::StoredEntry;

/// Current on-disk format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete persisted state of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub config: MemoryConfig,
    #[serde(default)]
    pub last_gc_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
    #[serde(default)]
    pub summaries: Vec<ContextSummary>,
}

impl Snapshot {
    pub fn new(
        config: MemoryConfig,
        last_gc_run: Option<DateTime<Utc>>,
        entries: Vec<StoredEntry>,
        summaries: Vec<ContextSummary>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            config,
            last_gc_run,
            entries,
            summaries,
        }
    }
}

/// Somewhere a snapshot can be loaded from and saved to
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, or `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the saved snapshot
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file snapshot store.
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshot {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            CrossmemError::Storage(format!(
                "Failed to parse snapshot {}: {e}",
                self.path.display()
            ))
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CrossmemError::Storage(format!(
                "Unsupported snapshot version {} in {} (expected {SNAPSHOT_VERSION})",
                snapshot.version,
                self.path.display()
            )));
        }

        tracing::info!(
            "Loaded snapshot from {} ({} entries, {} summaries)",
            self.path.display(),
            snapshot.entries.len(),
            snapshot.summaries.len()
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::info!(
            "Saved snapshot to {} ({} entries)",
            self.path.display(),
            snapshot.entries.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling() {
        let store = JsonFileSnapshot::new("/data/crossmem/memory.json");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/data/crossmem/memory.json.tmp")
        );
    }

    #[test]
    fn test_new_snapshot_has_current_version() {
        let snapshot = Snapshot::new(MemoryConfig::default(), None, Vec::new(), Vec::new());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert!(snapshot.entries.is_empty());
    }
}
