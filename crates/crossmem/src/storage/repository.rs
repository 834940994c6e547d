//! MemoryEntry repository
//!
//! Entries live in an arena keyed by id. Secondary indices (by session, by
//! model, by `(session, model)` partition), per-partition generation counters,
//! running token and byte totals, and stored summaries sit behind a single
//! `RwLock`. Structural writes take the index write lock; reads take the read
//! lock and update access metadata through the arena's per-entry lock.
//!
//! Lock order is always index, then arena.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RelevanceConfig;
use crate::error::{CrossmemError, Result};
use crate::memory::relevance::seed_score;
use crate::memory::tokens::{bytes_to_mb, estimate_entry_bytes};
use crate::memory::types::{
    ContextSummary, MemoryEntry, MemoryStats, NewMemoryEntry, PartitionKey,
};
use crate::storage::filter::{EntryFilter, SearchQuery};

/// Result cap for `search` when the caller gives none
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Token budget for `retrieve_for_model` when the caller gives none
pub const DEFAULT_RETRIEVAL_TOKENS: usize = 50_000;

/// An entry plus repository-private bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry: MemoryEntry,
    /// Point in time up to which decay has already been applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decayed_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn new(entry: MemoryEntry) -> Self {
        Self {
            entry,
            decayed_at: None,
        }
    }

    /// Estimated resident size in bytes
    pub fn estimated_bytes(&self) -> u64 {
        estimate_entry_bytes(&self.entry.content, &self.entry.metadata)
    }
}

#[derive(Debug, Default)]
struct Indices {
    by_session: HashMap<String, HashSet<Uuid>>,
    by_model: HashMap<String, HashSet<Uuid>>,
    by_partition: HashMap<PartitionKey, HashSet<Uuid>>,
    partition_tokens: HashMap<PartitionKey, usize>,
    generations: HashMap<PartitionKey, u64>,
    auto_summary_marks: HashMap<PartitionKey, usize>,
    summaries: HashMap<String, Vec<ContextSummary>>,
    total_tokens: usize,
    usage_bytes: u64,
}

impl Indices {
    fn add(&mut self, entry: &MemoryEntry, bytes: u64) {
        let key = entry.partition();
        self.by_session
            .entry(entry.session_id.clone())
            .or_default()
            .insert(entry.id);
        self.by_model
            .entry(entry.model.clone())
            .or_default()
            .insert(entry.id);
        self.by_partition
            .entry(key.clone())
            .or_default()
            .insert(entry.id);
        *self.partition_tokens.entry(key.clone()).or_default() += entry.token_count;
        self.total_tokens += entry.token_count;
        self.usage_bytes += bytes;
        self.bump(&key);
    }

    fn remove(&mut self, entry: &MemoryEntry, bytes: u64) {
        let key = entry.partition();
        remove_from(&mut self.by_session, &entry.session_id, &entry.id);
        remove_from(&mut self.by_model, &entry.model, &entry.id);
        remove_from(&mut self.by_partition, &key, &entry.id);

        match self.partition_tokens.get_mut(&key) {
            Some(tokens) if *tokens >= entry.token_count => {
                *tokens -= entry.token_count;
                if *tokens == 0 {
                    self.partition_tokens.remove(&key);
                    self.auto_summary_marks.remove(&key);
                }
            }
            _ => {
                tracing::error!(
                    "Partition {key} token total would go negative removing entry {}",
                    entry.id
                );
                self.partition_tokens.remove(&key);
            }
        }

        self.total_tokens = self.total_tokens.saturating_sub(entry.token_count);
        self.usage_bytes = self.usage_bytes.saturating_sub(bytes);
        self.bump(&key);
    }

    fn bump(&mut self, key: &PartitionKey) {
        *self.generations.entry(key.clone()).or_default() += 1;
    }

    fn ids_for(&self, session_id: Option<&str>, model: Option<&str>) -> Vec<Uuid> {
        let set = match (session_id, model) {
            (Some(session_id), Some(model)) => {
                self.by_partition.get(&PartitionKey::new(session_id, model))
            }
            (Some(session_id), None) => self.by_session.get(session_id),
            (None, Some(model)) => self.by_model.get(model),
            (None, None) => {
                return self
                    .by_partition
                    .values()
                    .flat_map(|ids| ids.iter().copied())
                    .collect();
            }
        };
        set.map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn remove_from<K, Q>(index: &mut HashMap<K, HashSet<Uuid>>, key: &Q, id: &Uuid)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Shared store of memory entries and summaries
pub struct MemoryRepository {
    entries: DashMap<Uuid, StoredEntry>,
    indices: RwLock<Indices>,
    relevance: RelevanceConfig,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_relevance(RelevanceConfig::default())
    }

    /// Repository seeding new entries with the given relevance policy
    pub fn with_relevance(relevance: RelevanceConfig) -> Self {
        Self {
            entries: DashMap::new(),
            indices: RwLock::new(Indices::default()),
            relevance,
        }
    }

    /// Rebuild a repository from persisted entries and summaries
    pub async fn from_parts(
        relevance: RelevanceConfig,
        entries: Vec<StoredEntry>,
        summaries: Vec<ContextSummary>,
    ) -> Result<Self> {
        let repo = Self::with_relevance(relevance);
        for stored in entries {
            repo.insert_stored(stored).await?;
        }
        for summary in summaries {
            repo.save_summary(summary).await;
        }
        Ok(repo)
    }

    /// Store a new entry, deriving priority, token count and relevance seed
    pub async fn store(&self, fields: NewMemoryEntry) -> Result<MemoryEntry> {
        if fields.session_id.trim().is_empty() {
            return Err(CrossmemError::InvalidInput(
                "session_id must not be empty".to_string(),
            ));
        }
        if fields.model.trim().is_empty() {
            return Err(CrossmemError::InvalidInput(
                "model must not be empty".to_string(),
            ));
        }
        if fields.content.trim().is_empty() {
            return Err(CrossmemError::InvalidInput(
                "content must not be empty".to_string(),
            ));
        }

        let priority = fields.resolved_priority();
        let entry = MemoryEntry::new(
            fields.session_id,
            fields.model,
            fields.memory_type,
            priority,
            fields.content,
            fields.metadata,
            seed_score(&self.relevance, priority),
        );
        self.insert_entry(entry).await
    }

    /// Insert a fully formed entry as-is.
    ///
    /// Rejects entries that break invariants and ids already present.
    pub async fn insert_entry(&self, entry: MemoryEntry) -> Result<MemoryEntry> {
        let stored = self.insert_stored(StoredEntry::new(entry)).await?;
        Ok(stored.entry)
    }

    async fn insert_stored(&self, stored: StoredEntry) -> Result<StoredEntry> {
        if let Err(e) = stored.entry.check_invariants() {
            tracing::error!("Refusing to insert entry: {e}");
            return Err(e);
        }

        let mut indices = self.indices.write().await;
        if self.entries.contains_key(&stored.entry.id) {
            let err = CrossmemError::InvariantViolation(format!(
                "entry id {} already exists",
                stored.entry.id
            ));
            tracing::error!("{err}");
            return Err(err);
        }

        indices.add(&stored.entry, stored.estimated_bytes());
        self.entries.insert(stored.entry.id, stored.clone());
        tracing::debug!(
            "Stored entry {} in {} ({} tokens)",
            stored.entry.id,
            stored.entry.partition(),
            stored.entry.token_count
        );
        Ok(stored)
    }

    /// Fetch one entry by id; counts as a read
    pub async fn get(&self, id: Uuid) -> Result<MemoryEntry> {
        let _indices = self.indices.read().await;
        self.touch(&id)
            .ok_or_else(|| CrossmemError::NotFound(format!("memory entry {id}")))
    }

    /// Fetch one entry without updating access metadata
    pub fn peek(&self, id: &Uuid) -> Option<MemoryEntry> {
        self.entries.get(id).map(|stored| stored.entry.clone())
    }

    /// All entries of a session, oldest first; counts as a read
    pub async fn get_by_session(&self, session_id: &str) -> Vec<MemoryEntry> {
        let indices = self.indices.read().await;
        self.touch_sorted(indices.ids_for(Some(session_id), None))
    }

    /// All entries recorded under a model, oldest first; counts as a read
    pub async fn get_by_model(&self, model: &str) -> Vec<MemoryEntry> {
        let indices = self.indices.read().await;
        self.touch_sorted(indices.ids_for(None, Some(model)))
    }

    /// All entries of one `(session, model)` partition, oldest first; counts as a read
    pub async fn get_partition(&self, session_id: &str, model: &str) -> Vec<MemoryEntry> {
        let indices = self.indices.read().await;
        self.touch_sorted(indices.ids_for(Some(session_id), Some(model)))
    }

    /// Entries matching a filter, oldest first, without touching access metadata
    pub async fn list(&self, filter: &EntryFilter) -> Vec<MemoryEntry> {
        let indices = self.indices.read().await;
        let ids = indices.ids_for(filter.session_id.as_deref(), filter.model.as_deref());
        let mut entries: Vec<MemoryEntry> = ids
            .iter()
            .filter_map(|id| self.peek(id))
            .filter(|entry| filter.matches(entry))
            .collect();
        sort_oldest_first(&mut entries);
        entries
    }

    /// Session entries without touching access metadata
    pub async fn session_snapshot(&self, session_id: &str) -> Vec<MemoryEntry> {
        self.list(&EntryFilter::new().with_session(session_id)).await
    }

    /// Partition entries and the partition's generation, read atomically
    pub async fn partition_snapshot(&self, key: &PartitionKey) -> (Vec<MemoryEntry>, u64) {
        let indices = self.indices.read().await;
        let mut entries: Vec<MemoryEntry> = indices
            .ids_for(Some(&key.session_id), Some(&key.model))
            .iter()
            .filter_map(|id| self.peek(id))
            .collect();
        sort_oldest_first(&mut entries);
        let generation = indices.generations.get(key).copied().unwrap_or(0);
        (entries, generation)
    }

    /// Case-insensitive search over content and metadata values.
    ///
    /// Ranked by relevance, then most recent access. Returned entries count as read.
    pub async fn search(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<MemoryEntry> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let query = SearchQuery::new(query);

        let indices = self.indices.read().await;
        let mut hits: Vec<MemoryEntry> = indices
            .ids_for(session_id, None)
            .iter()
            .filter_map(|id| self.peek(id))
            .filter(|entry| query.matches(entry))
            .collect();

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.accessed_at.cmp(&a.accessed_at))
        });
        hits.truncate(limit);

        hits.iter().filter_map(|hit| self.touch(&hit.id)).collect()
    }

    /// Best context for a model joining a session.
    ///
    /// Candidates are the target model's own entries plus entries recorded
    /// under other models whose content the target does not already hold.
    /// Ordered by priority then relevance and taken greedily until the next
    /// entry would exceed `max_tokens`. Returned entries count as read.
    pub async fn retrieve_for_model(
        &self,
        session_id: &str,
        target_model: &str,
        max_tokens: Option<usize>,
    ) -> Vec<MemoryEntry> {
        let max_tokens = max_tokens.unwrap_or(DEFAULT_RETRIEVAL_TOKENS);

        let indices = self.indices.read().await;
        let session_entries: Vec<MemoryEntry> = indices
            .ids_for(Some(session_id), None)
            .iter()
            .filter_map(|id| self.peek(id))
            .collect();

        let mut seen: HashSet<&str> = session_entries
            .iter()
            .filter(|e| e.model == target_model)
            .map(|e| e.content.as_str())
            .collect();

        let mut candidates: Vec<&MemoryEntry> = session_entries
            .iter()
            .filter(|e| e.model == target_model)
            .collect();
        let mut others: Vec<&MemoryEntry> = session_entries
            .iter()
            .filter(|e| e.model != target_model)
            .collect();
        sort_by_retention(&mut others);
        for entry in others {
            if seen.insert(entry.content.as_str()) {
                candidates.push(entry);
            }
        }
        sort_by_retention(&mut candidates);

        let mut running = 0usize;
        let mut selected = Vec::new();
        for entry in candidates {
            if running + entry.token_count > max_tokens {
                break;
            }
            running += entry.token_count;
            selected.push(entry.id);
        }

        selected.iter().filter_map(|id| self.touch(id)).collect()
    }

    /// Explicitly set an entry's relevance, clamped to [0, 1]
    pub async fn update_relevance(&self, id: Uuid, score: f32) -> Result<()> {
        if !score.is_finite() {
            return Err(CrossmemError::InvalidInput(format!(
                "relevance score must be finite, got {score}"
            )));
        }
        let _indices = self.indices.read().await;
        let mut stored = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| CrossmemError::NotFound(format!("memory entry {id}")))?;
        stored.entry.set_relevance(score);
        Ok(())
    }

    /// Remove every entry and summary of a session; returns entries removed
    pub async fn delete_session(&self, session_id: &str) -> usize {
        let mut indices = self.indices.write().await;
        let ids = indices.ids_for(Some(session_id), None);
        let removed = self.remove_locked(&mut indices, &ids);
        indices.summaries.remove(session_id);
        tracing::debug!("Deleted session {session_id} ({removed} entries)");
        removed
    }

    /// Remove specific entries; unknown ids are skipped
    pub async fn delete_entries(&self, ids: &[Uuid]) -> usize {
        let mut indices = self.indices.write().await;
        self.remove_locked(&mut indices, ids)
    }

    fn remove_locked(&self, indices: &mut Indices, ids: &[Uuid]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some((_, stored)) = self.entries.remove(id) {
                indices.remove(&stored.entry, stored.estimated_bytes());
                removed += 1;
            }
        }
        removed
    }

    /// Re-parent every entry and summary of `sources` onto `target`.
    ///
    /// Content is not deduplicated. Returns the number of entries moved.
    pub async fn merge_sessions(&self, sources: &[String], target: &str) -> Result<usize> {
        if target.trim().is_empty() {
            return Err(CrossmemError::InvalidInput(
                "target session id must not be empty".to_string(),
            ));
        }

        let mut indices = self.indices.write().await;
        let mut moved = 0;
        let mut visited = HashSet::new();

        for source in sources {
            if source == target || !visited.insert(source.as_str()) {
                continue;
            }

            for id in indices.ids_for(Some(source), None) {
                let Some(mut stored) = self.entries.get_mut(&id) else {
                    continue;
                };
                let bytes = stored.estimated_bytes();
                indices.remove(&stored.entry, bytes);
                stored.entry.session_id = target.to_string();
                indices.add(&stored.entry, bytes);
                moved += 1;
            }

            if let Some(mut summaries) = indices.summaries.remove(source) {
                for summary in &mut summaries {
                    summary.session_id = target.to_string();
                }
                indices
                    .summaries
                    .entry(target.to_string())
                    .or_default()
                    .extend(summaries);
            }
        }

        tracing::debug!("Merged {moved} entries into session {target}");
        Ok(moved)
    }

    /// Known session ids, sorted
    pub async fn session_ids(&self) -> Vec<String> {
        let indices = self.indices.read().await;
        let mut ids: Vec<String> = indices.by_session.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Models with entries in a session, sorted
    pub async fn session_models(&self, session_id: &str) -> Vec<String> {
        let indices = self.indices.read().await;
        let mut models: Vec<String> = indices
            .by_partition
            .keys()
            .filter(|key| key.session_id == session_id)
            .map(|key| key.model.clone())
            .collect();
        models.sort();
        models
    }

    /// Structural change counter of a partition
    pub async fn partition_generation(&self, key: &PartitionKey) -> u64 {
        let indices = self.indices.read().await;
        indices.generations.get(key).copied().unwrap_or(0)
    }

    /// Sum of token counts in a partition
    pub async fn partition_tokens(&self, key: &PartitionKey) -> usize {
        let indices = self.indices.read().await;
        indices.partition_tokens.get(key).copied().unwrap_or(0)
    }

    /// Sum of token counts in a session
    pub async fn session_tokens(&self, session_id: &str) -> usize {
        let indices = self.indices.read().await;
        indices
            .partition_tokens
            .iter()
            .filter(|(key, _)| key.session_id == session_id)
            .map(|(_, tokens)| tokens)
            .sum()
    }

    /// Claim an automatic summary for a partition.
    ///
    /// Succeeds when the partition holds more than `threshold` tokens and has
    /// grown by more than `threshold` since the last claim.
    pub async fn claim_auto_summary(&self, key: &PartitionKey, threshold: usize) -> bool {
        let mut indices = self.indices.write().await;
        let tokens = indices.partition_tokens.get(key).copied().unwrap_or(0);
        let mark = indices.auto_summary_marks.get(key).copied().unwrap_or(0);
        if tokens > threshold && tokens.saturating_sub(mark) > threshold {
            indices.auto_summary_marks.insert(key.clone(), tokens);
            true
        } else {
            false
        }
    }

    /// Estimated resident size of all entries
    pub async fn usage_bytes(&self) -> u64 {
        self.indices.read().await.usage_bytes
    }

    /// Aggregate usage; `last_gc_run` is left for the caller to fill in
    pub async fn stats(&self) -> MemoryStats {
        let indices = self.indices.read().await;
        MemoryStats {
            total_entries: self.entries.len(),
            total_tokens: indices.total_tokens,
            memory_usage_mb: bytes_to_mb(indices.usage_bytes),
            sessions_count: indices.by_session.len(),
            models_count: indices.by_model.len(),
            last_gc_run: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn save_summary(&self, summary: ContextSummary) {
        let mut indices = self.indices.write().await;
        indices
            .summaries
            .entry(summary.session_id.clone())
            .or_default()
            .push(summary);
    }

    /// Stored summaries of a session, oldest first
    pub async fn summaries(&self, session_id: &str) -> Vec<ContextSummary> {
        let indices = self.indices.read().await;
        indices
            .summaries
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Project every stored entry through `f`, keeping the `Some` results
    pub async fn scan<T>(&self, mut f: impl FnMut(&StoredEntry) -> Option<T>) -> Vec<T> {
        let _indices = self.indices.read().await;
        self.entries
            .iter()
            .filter_map(|stored| f(stored.value()))
            .collect()
    }

    /// Ids of every stored entry
    pub async fn all_ids(&self) -> Vec<Uuid> {
        self.scan(|stored| Some(stored.entry.id)).await
    }

    /// Mutable handle on one stored entry
    pub(crate) fn stored_mut(&self, id: &Uuid) -> Option<RefMut<'_, Uuid, StoredEntry>> {
        self.entries.get_mut(id)
    }

    /// Every stored entry and summary, for persistence
    pub async fn export(&self) -> (Vec<StoredEntry>, Vec<ContextSummary>) {
        let indices = self.indices.read().await;
        let mut entries: Vec<StoredEntry> =
            self.entries.iter().map(|stored| stored.value().clone()).collect();
        entries.sort_by(|a, b| a.entry.created_at.cmp(&b.entry.created_at));
        let summaries = indices.summaries.values().flatten().cloned().collect();
        (entries, summaries)
    }

    fn touch(&self, id: &Uuid) -> Option<MemoryEntry> {
        self.entries.get_mut(id).map(|mut stored| {
            stored.entry.mark_accessed();
            stored.entry.clone()
        })
    }

    fn touch_sorted(&self, ids: Vec<Uuid>) -> Vec<MemoryEntry> {
        let mut entries: Vec<MemoryEntry> = ids.iter().filter_map(|id| self.touch(id)).collect();
        sort_oldest_first(&mut entries);
        entries
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_oldest_first(entries: &mut [MemoryEntry]) {
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Critical first, then most relevant, then oldest
fn sort_by_retention(entries: &mut [&MemoryEntry]) {
    entries.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| {
                b.relevance_score
                    .partial_cmp(&a.relevance_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{MemoryPriority, MemoryType};

    fn new_entry(session: &str, model: &str, content: &str) -> NewMemoryEntry {
        NewMemoryEntry::new(session, model, MemoryType::Conversation, content)
    }

    #[tokio::test]
    async fn test_store_derives_fields() {
        let repo = MemoryRepository::new();
        let entry = repo
            .store(NewMemoryEntry::new(
                "s1",
                "claude",
                MemoryType::SystemPrompt,
                "You are helpful",
            ))
            .await
            .unwrap();

        assert_eq!(entry.priority, MemoryPriority::Critical);
        assert_eq!(entry.relevance_score, 1.0);
        assert_eq!(entry.token_count, 4);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_store_rejects_blank_content() {
        let repo = MemoryRepository::new();
        let err = repo.store(new_entry("s1", "claude", "   ")).await.unwrap_err();
        assert!(matches!(err, CrossmemError::InvalidInput(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_is_invariant_violation() {
        let repo = MemoryRepository::new();
        let entry = repo.store(new_entry("s1", "claude", "hello")).await.unwrap();
        let err = repo.insert_entry(entry).await.unwrap_err();
        assert!(matches!(err, CrossmemError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = MemoryRepository::new();
        let err = repo.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CrossmemError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_generation_bumps_on_insert_and_delete() {
        let repo = MemoryRepository::new();
        let key = PartitionKey::new("s1", "claude");
        assert_eq!(repo.partition_generation(&key).await, 0);

        let entry = repo.store(new_entry("s1", "claude", "hello")).await.unwrap();
        assert_eq!(repo.partition_generation(&key).await, 1);

        repo.delete_entries(&[entry.id]).await;
        assert_eq!(repo.partition_generation(&key).await, 2);
    }

    #[tokio::test]
    async fn test_totals_track_inserts_and_deletes() {
        let repo = MemoryRepository::new();
        repo.store(new_entry("s1", "claude", "abcdefgh")).await.unwrap();
        repo.store(new_entry("s1", "gemini", "abcd")).await.unwrap();

        let stats = repo.stats().await;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_tokens, 3);
        assert_eq!(stats.sessions_count, 1);
        assert_eq!(stats.models_count, 2);
        assert!(repo.usage_bytes().await > 0);

        assert_eq!(repo.delete_session("s1").await, 2);
        let stats = repo.stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(repo.usage_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_claim_auto_summary_requires_growth() {
        let repo = MemoryRepository::new();
        let key = PartitionKey::new("s1", "claude");
        repo.store(new_entry("s1", "claude", &"x".repeat(40))).await.unwrap();
        assert!(!repo.claim_auto_summary(&key, 10).await);

        repo.store(new_entry("s1", "claude", &"y".repeat(40))).await.unwrap();
        assert!(repo.claim_auto_summary(&key, 10).await);
        assert!(!repo.claim_auto_summary(&key, 10).await);
    }

    #[tokio::test]
    async fn test_export_and_rebuild() {
        let repo = MemoryRepository::new();
        repo.store(new_entry("s1", "claude", "first")).await.unwrap();
        repo.store(new_entry("s2", "claude", "second")).await.unwrap();
        repo.save_summary(ContextSummary::empty("s1", "claude")).await;

        let (entries, summaries) = repo.export().await;
        let rebuilt = MemoryRepository::from_parts(RelevanceConfig::default(), entries, summaries)
            .await
            .unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.summaries("s1").await.len(), 1);
        assert_eq!(rebuilt.stats().await, repo.stats().await);
    }
}
