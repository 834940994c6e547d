//! Garbage collection of low-value entries
//!
//! A cycle runs a relevance decay pass, evicts every non-Critical entry whose
//! score fell below `relevance_threshold`, and then, if the estimated memory
//! usage is still above `max_memory_mb`, evicts Low priority entries in
//! ascending relevance order until the budget holds or none are left.
//! Critical entries are never evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::memory::relevance::RelevanceScorer;
use crate::memory::types::MemoryPriority;
use crate::storage::repository::{MemoryRepository, StoredEntry};

/// Entries deleted between cooperative yields
pub const GC_CHUNK: usize = 256;

/// Outcome of one GC cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcReport {
    /// Entries whose relevance changed in the decay pass
    pub decayed: usize,
    /// Entries evicted for falling below the relevance threshold
    pub evicted_by_relevance: usize,
    /// Low priority entries evicted to satisfy the memory budget
    pub evicted_by_pressure: usize,
    pub usage_bytes_before: u64,
    pub usage_bytes_after: u64,
    pub duration_ms: u64,
}

impl GcReport {
    pub fn total_evicted(&self) -> usize {
        self.evicted_by_relevance + self.evicted_by_pressure
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: Uuid,
    priority: MemoryPriority,
    relevance: f32,
    created_at: DateTime<Utc>,
    bytes: u64,
}

impl Candidate {
    fn from_stored(stored: &StoredEntry) -> Self {
        Self {
            id: stored.entry.id,
            priority: stored.entry.priority,
            relevance: stored.entry.relevance_score,
            created_at: stored.entry.created_at,
            bytes: stored.estimated_bytes(),
        }
    }
}

/// Runs GC cycles against a repository
pub struct GarbageCollector<'a> {
    repo: &'a MemoryRepository,
    scorer: RelevanceScorer,
    config: MemoryConfig,
    last_run: Option<DateTime<Utc>>,
}

impl<'a> GarbageCollector<'a> {
    pub fn new(repo: &'a MemoryRepository, scorer: RelevanceScorer, config: MemoryConfig) -> Self {
        Self {
            repo,
            scorer,
            config,
            last_run: None,
        }
    }

    /// Time of the previous cycle, used to skip decay on back-to-back runs
    pub fn with_last_run(mut self, last_run: Option<DateTime<Utc>>) -> Self {
        self.last_run = last_run;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Whether GC may never remove this priority
    pub fn is_protected(priority: MemoryPriority) -> bool {
        priority == MemoryPriority::Critical
    }

    /// Run one full cycle. Not cancellable once started.
    pub async fn collect(&self) -> GcReport {
        let started = Instant::now();
        let decayed = self
            .scorer
            .decay_pass(self.repo, &self.config, self.last_run)
            .await;

        let usage_bytes_before = self.repo.usage_bytes().await;
        let entries = self
            .repo
            .scan(|stored| {
                (!Self::is_protected(stored.entry.priority)).then(|| Candidate::from_stored(stored))
            })
            .await;

        let (by_relevance, by_pressure) = self.plan(entries, usage_bytes_before);
        let evicted_by_relevance = self.delete_chunked(&by_relevance).await;
        let evicted_by_pressure = self.delete_chunked(&by_pressure).await;

        let report = GcReport {
            decayed,
            evicted_by_relevance,
            evicted_by_pressure,
            usage_bytes_before,
            usage_bytes_after: self.repo.usage_bytes().await,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "GC cycle: decayed {}, evicted {} below threshold and {} under memory pressure in {}ms",
            report.decayed,
            report.evicted_by_relevance,
            report.evicted_by_pressure,
            report.duration_ms
        );
        report
    }

    /// Split unprotected entries into relevance evictions and pressure evictions
    fn plan(&self, entries: Vec<Candidate>, usage_bytes: u64) -> (Vec<Uuid>, Vec<Uuid>) {
        let threshold = self.config.relevance_threshold;
        let (below, mut rest): (Vec<Candidate>, Vec<Candidate>) = entries
            .into_iter()
            .filter(|c| !Self::is_protected(c.priority))
            .partition(|c| c.relevance < threshold);

        let freed: u64 = below.iter().map(|c| c.bytes).sum();
        let mut remaining = usage_bytes.saturating_sub(freed);
        let max_bytes = self.config.max_memory_bytes();

        let mut by_pressure = Vec::new();
        if remaining > max_bytes {
            rest.retain(|c| c.priority == MemoryPriority::Low);
            rest.sort_by(|a, b| {
                a.relevance
                    .partial_cmp(&b.relevance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            for candidate in rest {
                if remaining <= max_bytes {
                    break;
                }
                remaining = remaining.saturating_sub(candidate.bytes);
                by_pressure.push(candidate.id);
            }
            if remaining > max_bytes {
                tracing::warn!(
                    "Memory usage still {remaining} bytes over a {max_bytes} byte budget after evicting all Low priority entries"
                );
            }
        }

        (below.into_iter().map(|c| c.id).collect(), by_pressure)
    }

    async fn delete_chunked(&self, ids: &[Uuid]) -> usize {
        let mut deleted = 0;
        for chunk in ids.chunks(GC_CHUNK) {
            deleted += self.repo.delete_entries(chunk).await;
            tokio::task::yield_now().await;
        }
        deleted
    }
}
