//! The engine state a CLI invocation works on.
//!
//! Each invocation restores the engine from the snapshot file, runs one
//! command and, if the command changed anything, writes the snapshot back.
//! Running the CLI against the same data directory as a live daemon races
//! with the daemon's own saves.

use std::path::{Path, PathBuf};

use crossmem::MemoryEngine;
use crossmem::config::Config;
use crossmem::storage::snapshot::{JsonFileSnapshot, SnapshotStore};

use crate::error::CliResult;

pub struct Workspace {
    pub config: Config,
    pub engine: MemoryEngine,
    store: JsonFileSnapshot,
}

impl Workspace {
    /// Load config, apply a data directory override, and restore the engine
    pub async fn open(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> CliResult<Self> {
        let mut config = Config::load(config_path)?;
        if let Some(data_dir) = data_dir {
            config.storage.data_dir = data_dir;
        }
        Self::open_with(config).await
    }

    pub async fn open_with(config: Config) -> CliResult<Self> {
        let store = JsonFileSnapshot::new(config.snapshot_path());
        let engine = MemoryEngine::open(&config, &store).await?;
        Ok(Self {
            config,
            engine,
            store,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        self.store.path()
    }

    /// Write the engine state back to the snapshot file
    pub async fn save(&self) -> CliResult<()> {
        self.store.save(&self.engine.snapshot().await).await?;
        Ok(())
    }
}
