//! Excerpt-based context summarization
//!
//! A summary is a list of verbatim key points taken from the most relevant
//! entries of each memory type. No generative model is involved, so the same
//! entries always produce the same summary.

use std::collections::BTreeMap;

use crate::config::SummarizerConfig;
use crate::memory::tokens::excerpt;
use crate::memory::types::{ContextSummary, MemoryEntry, MemoryType, PartitionKey};
use crate::storage::repository::MemoryRepository;

/// Builds `ContextSummary` values from partition entries
#[derive(Debug, Clone, Copy)]
pub struct ContextSummarizer {
    config: SummarizerConfig,
}

impl ContextSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize a set of entries.
    ///
    /// Takes up to `max_key_points_per_type` of the most relevant entries per
    /// memory type, orders the excerpts by relevance across types, and drops
    /// the least relevant ones until the summary is strictly smaller than its
    /// source.
    pub fn summarize_entries(
        &self,
        session_id: &str,
        original_model: &str,
        entries: &[MemoryEntry],
    ) -> ContextSummary {
        let mut summary = ContextSummary::empty(session_id, original_model);
        if entries.is_empty() {
            return summary;
        }

        let mut by_type: BTreeMap<MemoryType, Vec<&MemoryEntry>> = BTreeMap::new();
        for entry in entries {
            by_type.entry(entry.memory_type).or_default().push(entry);
        }

        let mut selected: Vec<&MemoryEntry> = Vec::new();
        for (_, mut group) in by_type {
            sort_most_relevant(&mut group);
            group.truncate(self.config.max_key_points_per_type);
            selected.extend(group);
        }
        sort_most_relevant(&mut selected);

        summary.key_points = selected
            .iter()
            .map(|entry| excerpt(&entry.content, self.config.max_key_point_chars))
            .filter(|point| !point.is_empty())
            .collect();
        summary.recompute();

        let source_tokens: usize = entries.iter().map(|e| e.token_count).sum();
        while summary.token_count >= source_tokens && summary.drop_last_key_point() {}

        summary
    }

    /// Drop key points from the least relevant end until the summary costs
    /// at most `max_tokens`. An empty summary always fits.
    pub fn truncate_to_fit(&self, summary: &mut ContextSummary, max_tokens: usize) {
        while summary.token_count > max_tokens && summary.drop_last_key_point() {}
    }

    /// Summarize one `(session, model)` partition and store the result.
    ///
    /// A partition with no entries yields an empty summary, which is not stored.
    pub async fn summarize(
        &self,
        repo: &MemoryRepository,
        session_id: &str,
        original_model: &str,
    ) -> ContextSummary {
        let key = PartitionKey::new(session_id, original_model);
        let (entries, _) = repo.partition_snapshot(&key).await;
        let summary = self.summarize_entries(session_id, original_model, &entries);

        if !summary.is_empty() {
            tracing::debug!(
                "Summarized {key}: {} entries into {} key points ({} tokens)",
                entries.len(),
                summary.key_points.len(),
                summary.token_count
            );
            repo.save_summary(summary.clone()).await;
        }
        summary
    }
}

impl Default for ContextSummarizer {
    fn default() -> Self {
        Self::new(SummarizerConfig::default())
    }
}

/// Highest relevance first, oldest first among equals
fn sort_most_relevant(entries: &mut [&MemoryEntry]) {
    entries.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryPriority;
    use std::collections::HashMap;

    fn entry(memory_type: MemoryType, content: &str, relevance: f32) -> MemoryEntry {
        MemoryEntry::new(
            "s1",
            "claude",
            memory_type,
            MemoryPriority::Medium,
            content,
            HashMap::new(),
            relevance,
        )
    }

    #[test]
    fn test_empty_input_gives_empty_summary() {
        let summary = ContextSummarizer::default().summarize_entries("s1", "claude", &[]);
        assert_eq!(summary.summary, "");
        assert!(summary.key_points.is_empty());
        assert_eq!(summary.token_count, 0);
    }

    #[test]
    fn test_key_points_ordered_by_relevance() {
        let entries = vec![
            entry(MemoryType::Conversation, "low relevance remark about lunch", 0.1),
            entry(MemoryType::WorkContext, "the parser lives in src/parse.rs", 0.9),
            entry(MemoryType::ToolUsage, "ran cargo fmt on the workspace", 0.5),
        ];
        let summary = ContextSummarizer::default().summarize_entries("s1", "claude", &entries);

        assert_eq!(summary.key_points[0], "the parser lives in src/parse.rs");
        assert_eq!(summary.key_points[1], "ran cargo fmt on the workspace");
        assert!(summary.summary.starts_with("the parser lives"));
    }

    #[test]
    fn test_per_type_cap() {
        let config = SummarizerConfig {
            max_key_points_per_type: 2,
            ..Default::default()
        };
        let entries: Vec<MemoryEntry> = (0..5)
            .map(|i| {
                entry(
                    MemoryType::Conversation,
                    &format!("conversation turn number {i} with some padding text"),
                    i as f32 / 10.0,
                )
            })
            .collect();
        let summary = ContextSummarizer::new(config).summarize_entries("s1", "claude", &entries);
        assert_eq!(summary.key_points.len(), 2);
        assert!(summary.key_points[0].contains("number 4"));
    }

    #[test]
    fn test_summary_is_strictly_smaller_than_source() {
        // Single short entry: verbatim excerpt would cost as much as the source
        let entries = vec![entry(MemoryType::Conversation, "hi there", 0.5)];
        let summary = ContextSummarizer::default().summarize_entries("s1", "claude", &entries);
        assert!(summary.token_count < entries[0].token_count);
    }

    #[test]
    fn test_long_content_is_excerpted() {
        let config = SummarizerConfig {
            max_key_point_chars: 20,
            ..Default::default()
        };
        let long = "a".repeat(500);
        let entries = vec![entry(MemoryType::WorkContext, &long, 0.5)];
        let summary = ContextSummarizer::new(config).summarize_entries("s1", "claude", &entries);
        assert_eq!(summary.key_points.len(), 1);
        assert!(summary.key_points[0].ends_with('…'));
        assert!(summary.token_count < entries[0].token_count);
    }

    #[test]
    fn test_truncate_to_fit() {
        let entries: Vec<MemoryEntry> = (0..4)
            .map(|i| entry(MemoryType::Conversation, &"word ".repeat(40 + i), 0.5))
            .collect();
        let summarizer = ContextSummarizer::new(SummarizerConfig {
            max_key_point_chars: 40,
            ..Default::default()
        });
        let mut summary = summarizer.summarize_entries("s1", "claude", &entries);
        assert_eq!(summary.key_points.len(), 4);

        summarizer.truncate_to_fit(&mut summary, 25);
        assert!(summary.token_count <= 25);
        assert!(!summary.key_points.is_empty());

        summarizer.truncate_to_fit(&mut summary, 0);
        assert!(summary.is_empty());
        assert_eq!(summary.token_count, 0);
    }
}
