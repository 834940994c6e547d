//! The memory engine
//!
//! `MemoryEngine` owns one repository together with the scorer, summarizer,
//! similarity engine and the live `MemoryConfig`, and exposes the command
//! surface hosts call. Construct one per process and share it behind an `Arc`.

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, broadcast};
use uuid::Uuid;

use crate::config::{Config, MemoryConfig};
use crate::error::Result;
use crate::events::{self, EngineEvent};
use crate::memory::relevance::RelevanceScorer;
use crate::memory::similarity::{ContextSimilarity, ModelProfile, SimilarityEngine};
use crate::memory::summarizer::ContextSummarizer;
use crate::memory::types::{
    ContextSummary, MemoryEntry, MemoryStats, NewMemoryEntry, PartitionKey,
};
use crate::storage::filter::EntryFilter;
use crate::storage::gc::{GarbageCollector, GcReport};
use crate::storage::repository::MemoryRepository;
use crate::storage::snapshot::{Snapshot, SnapshotStore};
use crate::transfer::{CancelToken, ContextTransferResult, TransferEngine, TransferPreview};

/// Cross-model session memory engine
pub struct MemoryEngine {
    repo: MemoryRepository,
    config: RwLock<MemoryConfig>,
    scorer: RelevanceScorer,
    summarizer: ContextSummarizer,
    similarity: SimilarityEngine,
    last_gc_run: RwLock<Option<DateTime<Utc>>>,
    gc_running: Mutex<()>,
    events: broadcast::Sender<EngineEvent>,
}

impl MemoryEngine {
    /// Build an empty engine from configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.memory.validate()?;
        Ok(Self::assemble(
            MemoryRepository::with_relevance(config.relevance),
            config,
            config.memory.clone(),
            None,
        ))
    }

    /// Build an empty engine with default settings apart from `memory`
    pub fn with_memory_config(memory: MemoryConfig) -> Result<Self> {
        let config = Config {
            memory,
            ..Default::default()
        };
        Self::new(&config)
    }

    /// Restore an engine from a snapshot.
    ///
    /// The snapshot's `MemoryConfig` wins over the one in `config`, since it
    /// carries any update made through `update_memory_config`.
    pub async fn from_snapshot(config: &Config, snapshot: Snapshot) -> Result<Self> {
        snapshot.config.validate()?;
        let repo =
            MemoryRepository::from_parts(config.relevance, snapshot.entries, snapshot.summaries)
                .await?;
        Ok(Self::assemble(
            repo,
            config,
            snapshot.config,
            snapshot.last_gc_run,
        ))
    }

    /// Restore from `store` if it holds a snapshot, else start empty
    pub async fn open(config: &Config, store: &dyn SnapshotStore) -> Result<Self> {
        match store.load().await? {
            Some(snapshot) => Self::from_snapshot(config, snapshot).await,
            None => {
                tracing::info!("No snapshot found, starting with an empty store");
                Self::new(config)
            }
        }
    }

    fn assemble(
        repo: MemoryRepository,
        config: &Config,
        memory: MemoryConfig,
        last_gc_run: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            repo,
            config: RwLock::new(memory),
            scorer: RelevanceScorer::new(config.relevance),
            summarizer: ContextSummarizer::new(config.summarizer),
            similarity: SimilarityEngine::new(config.recommender.clone()),
            last_gc_run: RwLock::new(last_gc_run),
            gc_running: Mutex::new(()),
            events: events::channel(),
        }
    }

    /// Capture the full engine state for persistence
    pub async fn snapshot(&self) -> Snapshot {
        let (entries, summaries) = self.repo.export().await;
        Snapshot::new(
            self.get_memory_config().await,
            *self.last_gc_run.read().await,
            entries,
            summaries,
        )
    }

    pub fn repository(&self) -> &MemoryRepository {
        &self.repo
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Store a new entry, then summarize its partition if it grew past the threshold
    pub async fn store_memory_entry(&self, fields: NewMemoryEntry) -> Result<MemoryEntry> {
        let entry = self.repo.store(fields).await?;
        self.emit(EngineEvent::EntryStored {
            memory_id: entry.id.to_string(),
            session_id: entry.session_id.clone(),
            model: entry.model.clone(),
            memory_type: entry.memory_type.to_string(),
            token_count: entry.token_count,
        });

        let config = self.get_memory_config().await;
        if config.auto_summarize {
            let key = entry.partition();
            if self
                .repo
                .claim_auto_summary(&key, config.compression_threshold)
                .await
            {
                self.summarize_partition(&key, true).await;
            }
        }

        Ok(entry)
    }

    /// One entry by id; counts as a read
    pub async fn get_memory(&self, id: Uuid) -> Result<MemoryEntry> {
        self.repo.get(id).await
    }

    /// Every entry of a session; counts as a read
    pub async fn get_session_memories(&self, session_id: &str) -> Vec<MemoryEntry> {
        self.repo.get_by_session(session_id).await
    }

    /// Filtered listing that does not count as a read
    pub async fn list_memories(&self, filter: &EntryFilter) -> Vec<MemoryEntry> {
        self.repo.list(filter).await
    }

    /// Context for a model joining a session, within `max_tokens`
    pub async fn retrieve_memory_for_model(
        &self,
        session_id: &str,
        target_model: &str,
        max_tokens: Option<usize>,
    ) -> Vec<MemoryEntry> {
        self.repo
            .retrieve_for_model(session_id, target_model, max_tokens)
            .await
    }

    /// Summarize one partition on demand
    pub async fn create_context_summary(
        &self,
        session_id: &str,
        original_model: &str,
    ) -> ContextSummary {
        self.summarize_partition(&PartitionKey::new(session_id, original_model), false)
            .await
    }

    async fn summarize_partition(&self, key: &PartitionKey, automatic: bool) -> ContextSummary {
        let summary = self
            .summarizer
            .summarize(&self.repo, &key.session_id, &key.model)
            .await;
        if !summary.is_empty() {
            if automatic {
                tracing::info!("Auto-summarized {key} ({} tokens)", summary.token_count);
            }
            self.emit(EngineEvent::SummaryCreated {
                session_id: summary.session_id.clone(),
                original_model: summary.original_model.clone(),
                key_points: summary.key_points.len(),
                token_count: summary.token_count,
                automatic,
            });
        }
        summary
    }

    /// Stored summaries of a session, oldest first
    pub async fn get_context_summaries(&self, session_id: &str) -> Vec<ContextSummary> {
        self.repo.summaries(session_id).await
    }

    /// Copy a partition's context to another model
    pub async fn transfer_context_to_model(
        &self,
        session_id: &str,
        source_model: &str,
        target_model: &str,
    ) -> Result<ContextTransferResult> {
        self.transfer_context_with_cancel(session_id, source_model, target_model, &CancelToken::new())
            .await
    }

    /// Transfer that the caller can cancel before it finalizes
    pub async fn transfer_context_with_cancel(
        &self,
        session_id: &str,
        source_model: &str,
        target_model: &str,
        cancel: &CancelToken,
    ) -> Result<ContextTransferResult> {
        let budget = self.transfer_budget(target_model).await;
        let result = TransferEngine::new(&self.repo, self.summarizer, budget)
            .transfer(session_id, source_model, target_model, cancel)
            .await?;

        if result.success {
            self.emit(EngineEvent::ContextTransferred {
                session_id: result.session_id.clone(),
                source_model: result.source_model.clone(),
                target_model: result.target_model.clone(),
                entries: result.transferred_entries.len(),
                tokens: result.total_tokens,
                compression_applied: result.compression_applied,
            });
        }
        Ok(result)
    }

    /// What a transfer would copy, without copying
    pub async fn preview_context_transfer(
        &self,
        session_id: &str,
        source_model: &str,
        target_model: &str,
    ) -> Result<TransferPreview> {
        let budget = self.transfer_budget(target_model).await;
        let target = self.similarity.profile_for(target_model);
        TransferEngine::new(&self.repo, self.summarizer, budget)
            .preview(session_id, source_model, &target)
            .await
    }

    /// Session token budget capped by the target model's context window
    async fn transfer_budget(&self, target_model: &str) -> usize {
        let session_budget = self.get_memory_config().await.max_tokens_per_session;
        session_budget.min(self.similarity.profile_for(target_model).context_window)
    }

    pub async fn calculate_context_similarity(
        &self,
        session_id_1: &str,
        session_id_2: &str,
    ) -> ContextSimilarity {
        self.similarity
            .calculate_similarity(&self.repo, session_id_1, session_id_2)
            .await
    }

    pub async fn recommend_model_for_context(&self, session_id: &str) -> Result<String> {
        self.similarity.recommend_model(&self.repo, session_id).await
    }

    /// Capabilities of a model, with generic fallbacks for unknown names
    pub fn model_profile(&self, model: &str) -> ModelProfile {
        self.similarity.profile_for(model)
    }

    pub async fn get_memory_stats(&self) -> MemoryStats {
        let mut stats = self.repo.stats().await;
        stats.last_gc_run = *self.last_gc_run.read().await;
        stats
    }

    /// Explicit relevance feedback
    pub async fn update_memory_relevance(&self, id: Uuid, score: f32) -> Result<()> {
        self.scorer.update_relevance(&self.repo, id, score).await
    }

    /// Run a GC cycle; returns the number of entries deleted
    pub async fn garbage_collect_memory(&self) -> usize {
        self.run_gc().await.total_evicted()
    }

    /// Run a GC cycle and report what it did.
    ///
    /// Cycles never overlap; a second caller waits for the running one.
    pub async fn run_gc(&self) -> GcReport {
        let _running = self.gc_running.lock().await;
        let config = self.get_memory_config().await;
        let last_run = *self.last_gc_run.read().await;
        let report = GarbageCollector::new(&self.repo, self.scorer, config)
            .with_last_run(last_run)
            .collect()
            .await;

        let now = Utc::now();
        *self.last_gc_run.write().await = Some(now);
        self.emit(EngineEvent::GarbageCollected {
            evicted: report.total_evicted(),
            decayed: report.decayed,
            timestamp: now,
        });
        report
    }

    pub async fn get_memory_config(&self) -> MemoryConfig {
        self.config.read().await.clone()
    }

    /// Replace the memory config after validating it
    pub async fn update_memory_config(&self, config: MemoryConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = config;
        tracing::info!("Memory config updated");
        self.emit(EngineEvent::ConfigUpdated {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Remove a session's entries and summaries; returns entries removed
    pub async fn clear_session_memory(&self, session_id: &str) -> usize {
        let removed = self.repo.delete_session(session_id).await;
        tracing::info!("Cleared session {session_id} ({removed} entries)");
        self.emit(EngineEvent::SessionCleared {
            session_id: session_id.to_string(),
            removed,
        });
        removed
    }

    pub async fn search_memories(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<MemoryEntry> {
        self.repo.search(query, session_id, limit).await
    }

    /// Re-parent several sessions onto `target_session_id`
    pub async fn merge_session_memories(
        &self,
        session_ids: &[String],
        target_session_id: &str,
    ) -> Result<usize> {
        let moved = self
            .repo
            .merge_sessions(session_ids, target_session_id)
            .await?;
        tracing::info!(
            "Merged {} sessions into {target_session_id} ({moved} entries)",
            session_ids.len()
        );
        self.emit(EngineEvent::SessionsMerged {
            sources: session_ids.to_vec(),
            target: target_session_id.to_string(),
            moved,
        });
        Ok(moved)
    }

    /// Known session ids, sorted
    pub async fn session_ids(&self) -> Vec<String> {
        self.repo.session_ids().await
    }
}
