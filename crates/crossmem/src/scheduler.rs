//! Background GC scheduler
//!
//! One tokio task runs a GC cycle every `gc_interval_minutes` and optionally
//! saves a snapshot afterwards. The interval is re-read before every sleep so
//! config updates take effect on the next tick. Shutdown lets an in-flight
//! cycle finish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::MemoryEngine;
use crate::storage::snapshot::SnapshotStore;

/// Handle to the running scheduler task
pub struct GcScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl GcScheduler {
    /// Start ticking on the engine's configured GC interval
    pub fn spawn(engine: Arc<MemoryEngine>, snapshots: Option<Arc<dyn SnapshotStore>>) -> Self {
        Self::start(engine, snapshots, None)
    }

    /// Start ticking on a fixed period, ignoring the configured interval
    pub fn spawn_every(
        engine: Arc<MemoryEngine>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
        period: Duration,
    ) -> Self {
        Self::start(engine, snapshots, Some(period))
    }

    fn start(
        engine: Arc<MemoryEngine>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
        period: Option<Duration>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                let wait = match period {
                    Some(period) => period,
                    None => {
                        let minutes = engine.get_memory_config().await.gc_interval_minutes;
                        Duration::from_secs(minutes.saturating_mul(60))
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown_rx.changed() => break,
                }

                let report = engine.run_gc().await;
                tracing::debug!("Scheduled GC evicted {} entries", report.total_evicted());

                if let Some(ref store) = snapshots {
                    if let Err(e) = store.save(&engine.snapshot().await).await {
                        tracing::warn!("Failed to save snapshot after GC: {e}");
                    }
                }
            }
            tracing::debug!("GC scheduler stopped");
        });

        tracing::info!("GC scheduler started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop ticking and wait for the task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("GC scheduler task ended abnormally: {e}");
        }
    }
}
