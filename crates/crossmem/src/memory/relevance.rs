//! Relevance scoring for memory entries
//!
//! Entries are seeded by priority when stored, may be set directly by
//! explicit feedback, and decay exponentially with disuse:
//!
//! `score' = score * exp(-Δt / horizon)`
//!
//! where `horizon = decay_horizon_intervals * gc_interval`. Elapsed time is
//! counted in whole GC intervals since the later of the last access and the
//! last decay step, so back-to-back passes never decay the same span twice.
//! A pass that starts less than half an interval after the previous GC run
//! decays nothing at all, even for entries whose own interval boundary fell
//! between the two runs; the skipped span is picked up by the next pass.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::{MemoryConfig, RelevanceConfig};
use crate::error::Result;
use crate::memory::types::MemoryPriority;
use crate::storage::repository::{MemoryRepository, StoredEntry};

/// Entries processed between cooperative yields
const DECAY_CHUNK: usize = 256;

/// Initial relevance for a newly stored entry
pub fn seed_score(config: &RelevanceConfig, priority: MemoryPriority) -> f32 {
    match priority {
        MemoryPriority::Critical => config.critical_seed,
        _ => config.default_seed,
    }
    .clamp(0.0, 1.0)
}

/// Multiplicative decay for `elapsed` time over `horizon`
pub fn decay_factor(elapsed: Duration, horizon: Duration) -> f32 {
    let horizon_secs = horizon.num_seconds();
    if horizon_secs <= 0 {
        return 0.0;
    }
    let elapsed_secs = elapsed.num_seconds().max(0) as f64;
    (-elapsed_secs / horizon_secs as f64).exp() as f32
}

/// Score after decaying for `elapsed`, floored at 0
pub fn decayed_score(score: f32, elapsed: Duration, horizon: Duration) -> f32 {
    (score * decay_factor(elapsed, horizon)).clamp(0.0, 1.0)
}

/// Portion of `now - reference` made of whole `interval`s
pub fn whole_intervals(reference: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_secs = interval.num_seconds();
    if interval_secs <= 0 || now <= reference {
        return Duration::zero();
    }
    let steps = (now - reference).num_seconds() / interval_secs;
    Duration::seconds(steps * interval_secs)
}

/// Whether a decay pass at `now` is due given the previous GC run
pub fn decay_due(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_run {
        Some(last_run) => now - last_run >= interval / 2,
        None => true,
    }
}

/// Computes and updates relevance scores on a repository
#[derive(Debug, Clone, Copy)]
pub struct RelevanceScorer {
    config: RelevanceConfig,
}

impl RelevanceScorer {
    pub fn new(config: RelevanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// Seed for a new entry of the given priority
    pub fn seed(&self, priority: MemoryPriority) -> f32 {
        seed_score(&self.config, priority)
    }

    /// Decay horizon for the given GC cadence
    pub fn decay_horizon(&self, memory: &MemoryConfig) -> Duration {
        memory.gc_interval() * self.config.decay_horizon_intervals as i32
    }

    /// Explicit feedback: set an entry's score directly
    pub async fn update_relevance(
        &self,
        repo: &MemoryRepository,
        id: Uuid,
        score: f32,
    ) -> Result<()> {
        repo.update_relevance(id, score).await
    }

    /// Apply one decay step to a stored entry. Returns true if the score changed.
    ///
    /// Critical entries are exempt.
    pub fn decay_entry(
        &self,
        stored: &mut StoredEntry,
        now: DateTime<Utc>,
        interval: Duration,
        horizon: Duration,
    ) -> bool {
        if stored.entry.priority == MemoryPriority::Critical {
            return false;
        }

        let reference = match stored.decayed_at {
            Some(decayed_at) if decayed_at > stored.entry.accessed_at => decayed_at,
            _ => stored.entry.accessed_at,
        };

        let elapsed = whole_intervals(reference, now, interval);
        if elapsed.is_zero() {
            return false;
        }

        let before = stored.entry.relevance_score;
        stored
            .entry
            .set_relevance(decayed_score(before, elapsed, horizon));
        stored.decayed_at = Some(reference + elapsed);
        stored.entry.relevance_score != before
    }

    /// Decay every non-Critical entry in the repository.
    ///
    /// Walks the arena in chunks and yields between them so concurrent
    /// session traffic is not starved. Returns the number of entries decayed.
    pub async fn decay_pass(
        &self,
        repo: &MemoryRepository,
        memory: &MemoryConfig,
        last_run: Option<DateTime<Utc>>,
    ) -> usize {
        let now = Utc::now();
        let interval = memory.gc_interval();
        if !decay_due(last_run, now, interval) {
            tracing::debug!("Skipping decay, previous GC run was less than half an interval ago");
            return 0;
        }
        let horizon = self.decay_horizon(memory);
        let ids = repo.all_ids().await;

        let mut decayed = 0;
        for chunk in ids.chunks(DECAY_CHUNK) {
            for id in chunk {
                if let Some(mut stored) = repo.stored_mut(id) {
                    if self.decay_entry(&mut stored, now, interval, horizon) {
                        decayed += 1;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        tracing::debug!("Decay pass touched {decayed} of {} entries", ids.len());
        decayed
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(RelevanceConfig::default())
    }
}
