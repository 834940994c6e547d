//! Session similarity and model recommendation
//!
//! Similarity between two sessions is the mean of two Jaccard indices: one
//! over the `topic` tag values of their entries and one over `tool` tag
//! values. The recommender uses it to find sessions that look like the
//! current one and suggests the model those sessions used most.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RecommenderConfig;
use crate::error::{CrossmemError, Result};
use crate::memory::types::MemoryEntry;
use crate::storage::repository::MemoryRepository;

/// Metadata keys whose values are topics (comma-separated lists allowed)
pub const TOPIC_KEYS: [&str; 2] = ["topic", "topics"];

/// Metadata keys whose values are tool names
pub const TOOL_KEYS: [&str; 2] = ["tool", "tool_name"];

/// Context window assumed for `ollama:*` models not in the catalog
pub const OLLAMA_CONTEXT_WINDOW: usize = 8192;

/// Context window assumed for models not in the catalog
pub const UNKNOWN_CONTEXT_WINDOW: usize = 32768;

/// Capabilities of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    /// Maximum context in tokens
    pub context_window: usize,
    #[serde(default)]
    pub supports_tools: bool,
    #[serde(default)]
    pub supports_images: bool,
}

impl ModelProfile {
    pub fn new(name: &str, context_window: usize, supports_tools: bool, supports_images: bool) -> Self {
        Self {
            name: name.to_string(),
            context_window,
            supports_tools,
            supports_images,
        }
    }

    /// Models known out of the box
    pub fn builtin_catalog() -> Vec<ModelProfile> {
        vec![
            Self::new("opus-4.1", 200_000, true, true),
            Self::new("claude-3-opus", 200_000, true, true),
            Self::new("sonnet-4", 200_000, true, true),
            Self::new("sonnet-3.7", 200_000, true, true),
            Self::new("claude-3.5-sonnet", 200_000, true, true),
            Self::new("gemini-2.5-pro-exp", 2_000_000, true, true),
            Self::new("gemini-2.0-pro-exp", 2_000_000, true, true),
            Self::new("gemini-2.5-flash", 1_000_000, true, true),
            Self::new("gemini-2.0-flash", 1_000_000, true, true),
        ]
    }

    /// Look a model up in `catalog`, falling back to generic profiles
    pub fn lookup(catalog: &[ModelProfile], model: &str) -> ModelProfile {
        if let Some(profile) = catalog.iter().find(|p| p.name == model) {
            return profile.clone();
        }
        if model.starts_with("ollama:") {
            Self::new(model, OLLAMA_CONTEXT_WINDOW, false, false)
        } else {
            Self::new(model, UNKNOWN_CONTEXT_WINDOW, false, false)
        }
    }
}

/// How alike two sessions are
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSimilarity {
    pub session_id_1: String,
    pub session_id_2: String,
    /// Mean of the topic and tool Jaccard indices, in [0, 1]
    pub similarity_score: f32,
    /// Topic values present in both sessions, sorted
    pub shared_topics: Vec<String>,
    /// Tool values present in both sessions, sorted
    pub common_tools: Vec<String>,
}

/// Distinct tag values under any of `keys`, splitting comma-separated lists
pub fn tag_values(entries: &[MemoryEntry], keys: &[&str]) -> BTreeSet<String> {
    entries
        .iter()
        .flat_map(|entry| keys.iter().filter_map(|key| entry.metadata.get(*key)))
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|, defined as 0 when both sets are empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Similarity between two sessions given their entries
pub fn compare_sessions(
    session_id_1: &str,
    entries_1: &[MemoryEntry],
    session_id_2: &str,
    entries_2: &[MemoryEntry],
) -> ContextSimilarity {
    let topics_1 = tag_values(entries_1, &TOPIC_KEYS);
    let topics_2 = tag_values(entries_2, &TOPIC_KEYS);
    let tools_1 = tag_values(entries_1, &TOOL_KEYS);
    let tools_2 = tag_values(entries_2, &TOOL_KEYS);

    let similarity_score = (jaccard(&topics_1, &topics_2) + jaccard(&tools_1, &tools_2)) / 2.0;

    ContextSimilarity {
        session_id_1: session_id_1.to_string(),
        session_id_2: session_id_2.to_string(),
        similarity_score,
        shared_topics: topics_1.intersection(&topics_2).cloned().collect(),
        common_tools: tools_1.intersection(&tools_2).cloned().collect(),
    }
}

/// Similarity engine and model recommender
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    config: RecommenderConfig,
}

impl SimilarityEngine {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Profile of a model, using generic defaults for unknown names
    pub fn profile_for(&self, model: &str) -> ModelProfile {
        ModelProfile::lookup(&self.config.models, model)
    }

    /// The catalog model with the largest context window (first listed on ties)
    pub fn largest_model(&self) -> Option<&ModelProfile> {
        self.config
            .models
            .iter()
            .min_by(|a, b| b.context_window.cmp(&a.context_window))
    }

    /// Compare two sessions. Does not count as a read of their entries.
    pub async fn calculate_similarity(
        &self,
        repo: &MemoryRepository,
        session_id_1: &str,
        session_id_2: &str,
    ) -> ContextSimilarity {
        let entries_1 = repo.session_snapshot(session_id_1).await;
        let entries_2 = repo.session_snapshot(session_id_2).await;
        compare_sessions(session_id_1, &entries_1, session_id_2, &entries_2)
    }

    /// Suggest a model for a session.
    ///
    /// Large sessions get the widest context window in the catalog. Otherwise
    /// the model most used by similar sessions wins. Without similar sessions
    /// the session keeps the model of its latest entry.
    pub async fn recommend_model(&self, repo: &MemoryRepository, session_id: &str) -> Result<String> {
        let entries = repo.session_snapshot(session_id).await;
        let Some(latest) = entries.last() else {
            return Err(CrossmemError::NotFound(format!(
                "session {session_id} has no entries"
            )));
        };
        let current_model = latest.model.clone();

        let total_tokens: usize = entries.iter().map(|e| e.token_count).sum();
        if total_tokens > self.config.large_context_threshold {
            if let Some(profile) = self.largest_model() {
                tracing::debug!(
                    "Session {session_id} holds {total_tokens} tokens, recommending {}",
                    profile.name
                );
                return Ok(profile.name.clone());
            }
        }

        let mut model_counts: BTreeMap<String, usize> = BTreeMap::new();
        for other in repo.session_ids().await {
            if other == session_id {
                continue;
            }
            let other_entries = repo.session_snapshot(&other).await;
            let similarity = compare_sessions(session_id, &entries, &other, &other_entries);
            if similarity.similarity_score > 0.0
                && similarity.similarity_score >= self.config.similarity_threshold
            {
                for entry in &other_entries {
                    *model_counts.entry(entry.model.clone()).or_default() += 1;
                }
            }
        }

        // BTreeMap iteration is sorted, so ties go to the lexicographically first model
        let best = model_counts
            .into_iter()
            .fold(None, |best: Option<(String, usize)>, (model, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((model, count)),
            });

        Ok(best.map(|(model, _)| model).unwrap_or(current_model))
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(RecommenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{MemoryPriority, MemoryType};
    use std::collections::HashMap;

    fn tagged(session: &str, pairs: &[(&str, &str)]) -> MemoryEntry {
        let metadata: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MemoryEntry::new(
            session,
            "claude",
            MemoryType::Conversation,
            MemoryPriority::Medium,
            "content",
            metadata,
            0.5,
        )
    }

    #[test]
    fn test_jaccard_edge_cases() {
        let empty = BTreeSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);

        let a: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn test_tag_values_split_lists() {
        let entries = vec![
            tagged("s1", &[("topics", "rust, async"), ("tool_name", "cargo")]),
            tagged("s1", &[("topic", "rust")]),
        ];
        let topics = tag_values(&entries, &TOPIC_KEYS);
        assert_eq!(topics.len(), 2);
        assert!(topics.contains("async"));
        assert_eq!(tag_values(&entries, &TOOL_KEYS).len(), 1);
    }

    #[test]
    fn test_no_shared_tags_scores_zero() {
        let a = vec![tagged("a", &[("topic", "rust")])];
        let b = vec![tagged("b", &[("topic", "cooking")])];
        let sim = compare_sessions("a", &a, "b", &b);
        assert_eq!(sim.similarity_score, 0.0);
        assert!(sim.shared_topics.is_empty());
        assert!(sim.common_tools.is_empty());
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = vec![
            tagged("a", &[("topic", "rust"), ("tool", "grep")]),
            tagged("a", &[("topic", "parsing")]),
        ];
        let b = vec![tagged("b", &[("topics", "rust,llvm"), ("tool", "grep")])];
        let ab = compare_sessions("a", &a, "b", &b);
        let ba = compare_sessions("b", &b, "a", &a);
        assert_eq!(ab.similarity_score, ba.similarity_score);
        assert_eq!(ab.shared_topics, ba.shared_topics);
        assert_eq!(ab.common_tools, vec!["grep".to_string()]);
        // topics 1/3, tools 1/1
        assert!((ab.similarity_score - (1.0 / 3.0 + 1.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_profile_lookup_fallbacks() {
        let catalog = ModelProfile::builtin_catalog();
        assert_eq!(ModelProfile::lookup(&catalog, "sonnet-4").context_window, 200_000);
        let ollama = ModelProfile::lookup(&catalog, "ollama:llama3");
        assert_eq!(ollama.context_window, OLLAMA_CONTEXT_WINDOW);
        assert!(!ollama.supports_tools);
        assert_eq!(
            ModelProfile::lookup(&catalog, "mystery").context_window,
            UNKNOWN_CONTEXT_WINDOW
        );
    }

    #[test]
    fn test_largest_model_prefers_first_listed() {
        let engine = SimilarityEngine::default();
        assert_eq!(engine.largest_model().unwrap().name, "gemini-2.5-pro-exp");
    }
}
