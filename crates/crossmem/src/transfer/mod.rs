//! Context transfer between models
//!
//! A transfer copies the most relevant entries of one `(session, model)`
//! partition into the same session under another model, within a budget of
//! `max_tokens_per_session` capped by the target's context window. Entries that do not fit are condensed
//! into a single summary entry.
//!
//! Each transfer moves through `Planning → Summarizing → Copying →
//! Finalizing → Done`, or ends in `Failed`. Copies are inserted in chunks
//! and a cancellation or error before Finalizing removes every copy made so
//! far, leaving the target partition as it was.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use uuid::Uuid;

use crate::error::{CrossmemError, Result};
use crate::memory::similarity::ModelProfile;
use crate::memory::summarizer::ContextSummarizer;
use crate::memory::types::{
    ContextSummary, MemoryEntry, MemoryPriority, MemoryType, PartitionKey,
};
use crate::storage::repository::MemoryRepository;

/// Copies inserted between cancellation checks
pub const COPY_CHUNK: usize = 64;

/// Metadata `kind` value marking a transfer's summary entry
pub const SUMMARY_ENTRY_KIND: &str = "context_summary";

/// Stage of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Planning,
    Summarizing,
    Copying,
    Finalizing,
    Done,
    Failed,
}

/// Cooperative cancellation flag shared between a caller and a transfer
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTransferResult {
    pub session_id: String,
    pub source_model: String,
    pub target_model: String,
    /// The copies written under the target model, summary entry included
    pub transferred_entries: Vec<MemoryEntry>,
    pub total_tokens: usize,
    pub compression_applied: bool,
    /// Summary of the entries left out, when compression was applied
    pub summary: Option<ContextSummary>,
    pub elapsed_ms: u64,
    pub success: bool,
    pub phase: TransferPhase,
    pub message: String,
}

/// What a transfer would do, without doing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPreview {
    pub session_id: String,
    pub source_model: String,
    pub target_model: String,
    pub source_entries: usize,
    pub source_tokens: usize,
    /// Raw entries that would be copied, summary entry excluded
    pub entries_to_transfer: usize,
    /// Tokens that would be copied, summary entry included
    pub tokens_to_transfer: usize,
    pub excluded_entries: usize,
    pub will_compress: bool,
    pub summary_tokens: usize,
    pub budget: usize,
    /// Source entries per memory type
    pub type_distribution: BTreeMap<String, usize>,
    /// Source entries per priority
    pub priority_distribution: BTreeMap<String, usize>,
    pub target_context_window: usize,
    pub target_supports_tools: bool,
    pub target_supports_images: bool,
}

/// Result of the Planning and Summarizing phases
#[derive(Debug, Clone)]
struct TransferPlan {
    source: Vec<MemoryEntry>,
    generation: u64,
    retained: Vec<MemoryEntry>,
    excluded: Vec<MemoryEntry>,
    summary: Option<ContextSummary>,
    summary_entry: Option<MemoryEntry>,
    total_tokens: usize,
    compression_applied: bool,
}

/// Plans and executes transfers against a repository
pub struct TransferEngine<'a> {
    repo: &'a MemoryRepository,
    summarizer: ContextSummarizer,
    budget: usize,
}

impl<'a> TransferEngine<'a> {
    pub fn new(repo: &'a MemoryRepository, summarizer: ContextSummarizer, budget: usize) -> Self {
        Self {
            repo,
            summarizer,
            budget,
        }
    }

    /// Copy a partition's context to another model
    pub async fn transfer(
        &self,
        session_id: &str,
        source_model: &str,
        target_model: &str,
        cancel: &CancelToken,
    ) -> Result<ContextTransferResult> {
        let started = Instant::now();
        let plan = self.plan(session_id, source_model, target_model).await?;

        if plan.source.is_empty() {
            tracing::info!("Transfer {session_id}: {source_model} has no entries, nothing to do");
            return Ok(ContextTransferResult {
                session_id: session_id.to_string(),
                source_model: source_model.to_string(),
                target_model: target_model.to_string(),
                transferred_entries: Vec::new(),
                total_tokens: 0,
                compression_applied: false,
                summary: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
                success: false,
                phase: TransferPhase::Failed,
                message: format!(
                    "Source session {session_id} has no entries for model {source_model}"
                ),
            });
        }

        tracing::debug!("Transfer {session_id}: {:?}", TransferPhase::Copying);
        let source_key = PartitionKey::new(session_id, source_model);
        let current = self.repo.partition_generation(&source_key).await;
        if current != plan.generation {
            return Err(CrossmemError::ConcurrentModification(format!(
                "partition {source_key} changed during planning (generation {} -> {current})",
                plan.generation
            )));
        }

        let copies: Vec<MemoryEntry> = plan
            .retained
            .iter()
            .map(|entry| entry.copy_for_model(target_model))
            .chain(plan.summary_entry.iter().cloned())
            .collect();

        let mut inserted: Vec<MemoryEntry> = Vec::with_capacity(copies.len());
        for chunk in copies.chunks(COPY_CHUNK) {
            if cancel.is_cancelled() {
                self.rollback(&inserted).await;
                return Err(CrossmemError::Cancelled(format!(
                    "transfer of {session_id} to {target_model} cancelled while copying"
                )));
            }
            for copy in chunk {
                match self.repo.insert_entry(copy.clone()).await {
                    Ok(entry) => inserted.push(entry),
                    Err(e) => {
                        tracing::warn!("Transfer {session_id}: copy failed, rolling back: {e}");
                        self.rollback(&inserted).await;
                        return Err(e);
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        if cancel.is_cancelled() {
            self.rollback(&inserted).await;
            return Err(CrossmemError::Cancelled(format!(
                "transfer of {session_id} to {target_model} cancelled before finalizing"
            )));
        }

        tracing::debug!("Transfer {session_id}: {:?}", TransferPhase::Finalizing);
        if let Some(ref summary) = plan.summary {
            self.repo.save_summary(summary.clone()).await;
        }

        let message = if plan.compression_applied {
            format!(
                "Transferred {} of {} entries from {source_model} to {target_model}; {} summarized",
                plan.retained.len(),
                plan.source.len(),
                plan.excluded.len()
            )
        } else {
            format!(
                "Transferred {} entries from {source_model} to {target_model}",
                plan.retained.len()
            )
        };
        tracing::info!("Transfer {session_id}: {message} ({} tokens)", plan.total_tokens);

        Ok(ContextTransferResult {
            session_id: session_id.to_string(),
            source_model: source_model.to_string(),
            target_model: target_model.to_string(),
            transferred_entries: inserted,
            total_tokens: plan.total_tokens,
            compression_applied: plan.compression_applied,
            summary: plan.summary,
            elapsed_ms: started.elapsed().as_millis() as u64,
            success: true,
            phase: TransferPhase::Done,
            message,
        })
    }

    /// Run Planning and Summarizing only
    pub async fn preview(
        &self,
        session_id: &str,
        source_model: &str,
        target: &ModelProfile,
    ) -> Result<TransferPreview> {
        let plan = self.plan(session_id, source_model, &target.name).await?;

        let mut type_distribution = BTreeMap::new();
        let mut priority_distribution = BTreeMap::new();
        for entry in &plan.source {
            *type_distribution
                .entry(entry.memory_type.to_string())
                .or_insert(0) += 1;
            *priority_distribution
                .entry(entry.priority.to_string())
                .or_insert(0) += 1;
        }

        Ok(TransferPreview {
            session_id: session_id.to_string(),
            source_model: source_model.to_string(),
            target_model: target.name.clone(),
            source_entries: plan.source.len(),
            source_tokens: plan.source.iter().map(|e| e.token_count).sum(),
            entries_to_transfer: plan.retained.len(),
            tokens_to_transfer: plan.total_tokens,
            excluded_entries: plan.excluded.len(),
            will_compress: plan.compression_applied,
            summary_tokens: plan.summary_entry.as_ref().map_or(0, |e| e.token_count),
            budget: self.budget,
            type_distribution,
            priority_distribution,
            target_context_window: target.context_window,
            target_supports_tools: target.supports_tools,
            target_supports_images: target.supports_images,
        })
    }

    async fn plan(
        &self,
        session_id: &str,
        source_model: &str,
        target_model: &str,
    ) -> Result<TransferPlan> {
        if source_model == target_model {
            return Err(CrossmemError::InvalidInput(format!(
                "source and target model are both {source_model}"
            )));
        }
        if target_model.trim().is_empty() {
            return Err(CrossmemError::InvalidInput(
                "target model must not be empty".to_string(),
            ));
        }

        tracing::debug!("Transfer {session_id}: {:?}", TransferPhase::Planning);
        let key = PartitionKey::new(session_id, source_model);
        let (mut source, generation) = self.repo.partition_snapshot(&key).await;
        source.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let mut plan = TransferPlan {
            source,
            generation,
            retained: Vec::new(),
            excluded: Vec::new(),
            summary: None,
            summary_entry: None,
            total_tokens: 0,
            compression_applied: false,
        };
        if plan.source.is_empty() {
            return Ok(plan);
        }

        if self.budget == 0 {
            let required = plan.source.iter().map(|e| e.token_count).min().unwrap_or(0);
            return Err(CrossmemError::BudgetExceeded {
                required,
                available: 0,
            });
        }

        let fits_all = take_within(&plan.source, self.budget) == plan.source.len();
        if fits_all {
            plan.retained = plan.source.clone();
        } else {
            tracing::debug!("Transfer {session_id}: {:?}", TransferPhase::Summarizing);
            plan.compression_applied = true;

            let reserve = summary_reserve(self.budget, self.summarizer.config().summary_reserve_ratio);
            let raw_count = take_within(&plan.source, self.budget - reserve);
            plan.retained = plan.source[..raw_count].to_vec();
            plan.excluded = plan.source[raw_count..].to_vec();

            let retained_tokens: usize = plan.retained.iter().map(|e| e.token_count).sum();
            let mut summary =
                self.summarizer
                    .summarize_entries(session_id, source_model, &plan.excluded);
            self.summarizer
                .truncate_to_fit(&mut summary, self.budget - retained_tokens);

            if !summary.is_empty() {
                plan.summary_entry = Some(summary_entry(
                    &summary,
                    target_model,
                    &plan.excluded,
                ));
            }
            plan.summary = Some(summary);
        }

        plan.total_tokens = self.check_plan(&plan)?;
        Ok(plan)
    }

    /// Verify budget accounting; returns the planned token total
    fn check_plan(&self, plan: &TransferPlan) -> Result<usize> {
        let mut running = 0usize;
        for entry in plan.retained.iter().chain(plan.summary_entry.iter()) {
            if let Err(e) = entry.check_invariants() {
                tracing::error!("Transfer planning aborted: {e}");
                return Err(e);
            }
            running += entry.token_count;
            if running > self.budget {
                let err = CrossmemError::InvariantViolation(format!(
                    "planned transfer total {running} exceeds budget {}",
                    self.budget
                ));
                tracing::error!("{err}");
                return Err(err);
            }
        }
        Ok(running)
    }

    async fn rollback(&self, inserted: &[MemoryEntry]) {
        let ids: Vec<Uuid> = inserted.iter().map(|e| e.id).collect();
        let removed = self.repo.delete_entries(&ids).await;
        tracing::info!("Rolled back {removed} copied entries");
    }
}

/// Length of the longest prefix of `entries` within `budget` tokens
fn take_within(entries: &[MemoryEntry], budget: usize) -> usize {
    let mut running = 0usize;
    for (i, entry) in entries.iter().enumerate() {
        if running + entry.token_count > budget {
            return i;
        }
        running += entry.token_count;
    }
    entries.len()
}

/// Tokens held back for the summary entry once compression is needed
pub fn summary_reserve(budget: usize, ratio: f32) -> usize {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((budget as f64 * ratio as f64).ceil() as usize).min(budget)
}

/// The entry that stands in for summarized entries under the target model
fn summary_entry(
    summary: &ContextSummary,
    target_model: &str,
    summarized: &[MemoryEntry],
) -> MemoryEntry {
    let relevance = summarized
        .iter()
        .map(|e| e.relevance_score)
        .fold(0.0f32, f32::max);

    let metadata = HashMap::from([
        ("kind".to_string(), SUMMARY_ENTRY_KIND.to_string()),
        ("source_model".to_string(), summary.original_model.clone()),
        (
            "summarized_entries".to_string(),
            summarized.len().to_string(),
        ),
    ]);

    MemoryEntry::new(
        summary.session_id.clone(),
        target_model,
        MemoryType::WorkContext,
        MemoryPriority::High,
        summary.summary.clone(),
        metadata,
        relevance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::NewMemoryEntry;

    async fn seeded(repo: &MemoryRepository, count: usize, chars: usize) {
        for i in 0..count {
            let content = format!("{i:04}{}", "x".repeat(chars - 4));
            repo.store(NewMemoryEntry::new(
                "s1",
                "gemini",
                MemoryType::Conversation,
                content,
            ))
            .await
            .unwrap();
        }
    }

    #[test]
    fn test_summary_reserve() {
        assert_eq!(summary_reserve(2000, 0.1), 200);
        assert_eq!(summary_reserve(15, 0.1), 2);
        assert_eq!(summary_reserve(100, 0.0), 0);
        assert_eq!(summary_reserve(100, f32::NAN), 0);
        assert_eq!(summary_reserve(100, 2.0), 100);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_same_model_is_invalid() {
        let repo = MemoryRepository::new();
        let engine = TransferEngine::new(&repo, ContextSummarizer::default(), 1000);
        let err = engine
            .transfer("s1", "claude", "claude", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrossmemError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_fits_without_compression() {
        let repo = MemoryRepository::new();
        seeded(&repo, 5, 40).await;
        let engine = TransferEngine::new(&repo, ContextSummarizer::default(), 1000);

        let result = engine
            .transfer("s1", "gemini", "claude", &CancelToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.compression_applied);
        assert_eq!(result.transferred_entries.len(), 5);
        assert_eq!(result.total_tokens, 50);
        assert_eq!(repo.get_partition("s1", "claude").await.len(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_transfer_leaves_no_copies() {
        let repo = MemoryRepository::new();
        seeded(&repo, 10, 40).await;
        let engine = TransferEngine::new(&repo, ContextSummarizer::default(), 1000);

        let token = CancelToken::new();
        token.cancel();
        let err = engine
            .transfer("s1", "gemini", "claude", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, CrossmemError::Cancelled(_)));
        assert!(repo.get_partition("s1", "claude").await.is_empty());
        assert_eq!(repo.len(), 10);
    }

    #[tokio::test]
    async fn test_zero_budget_is_budget_exceeded() {
        let repo = MemoryRepository::new();
        seeded(&repo, 1, 40).await;
        let engine = TransferEngine::new(&repo, ContextSummarizer::default(), 0);
        let err = engine
            .transfer("s1", "gemini", "claude", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CrossmemError::BudgetExceeded {
                required: 10,
                available: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_preview_does_not_copy() {
        let repo = MemoryRepository::new();
        seeded(&repo, 30, 400).await;
        let engine = TransferEngine::new(&repo, ContextSummarizer::default(), 2000);
        let target = ModelProfile::lookup(&ModelProfile::builtin_catalog(), "sonnet-4");

        let preview = engine.preview("s1", "gemini", &target).await.unwrap();
        assert_eq!(preview.source_entries, 30);
        assert_eq!(preview.source_tokens, 3000);
        assert!(preview.will_compress);
        assert_eq!(preview.entries_to_transfer, 18);
        assert!(preview.tokens_to_transfer <= 2000);
        assert_eq!(preview.type_distribution.get("Conversation"), Some(&30));
        assert_eq!(preview.priority_distribution.get("Medium"), Some(&30));
        assert_eq!(preview.target_context_window, 200_000);
        assert!(repo.get_partition("s1", "sonnet-4").await.is_empty());
    }
}
