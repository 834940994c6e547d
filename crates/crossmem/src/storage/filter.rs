//! Filter types for listing and search operations
//!
//! Narrows repository scans by session, model, type, priority, relevance,
//! creation time and a free-text query.

use chrono::{DateTime, Utc};

use crate::memory::types::{MemoryEntry, MemoryPriority, MemoryType};

/// Query tokens shorter than this are ignored by token-overlap matching
const MIN_QUERY_TOKEN_LEN: usize = 3;

/// Filter criteria for repository scans.
///
/// All fields are optional - when `None`, that filter is not applied.
/// Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Restrict to one session
    pub session_id: Option<String>,
    /// Restrict to one model
    pub model: Option<String>,
    /// Filter by memory types (OR logic within this filter)
    pub memory_types: Option<Vec<MemoryType>>,
    /// Filter by priorities (OR logic within this filter)
    pub priorities: Option<Vec<MemoryPriority>>,
    /// Minimum relevance threshold (inclusive)
    pub min_relevance: Option<f32>,
    /// Only entries created at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive text query over content and metadata values
    pub query: Option<SearchQuery>,
}

impl EntryFilter {
    /// Create a new empty filter (no filtering applied)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_memory_types(mut self, types: Vec<MemoryType>) -> Self {
        self.memory_types = Some(types);
        self
    }

    pub fn with_priorities(mut self, priorities: Vec<MemoryPriority>) -> Self {
        self.priorities = Some(priorities);
        self
    }

    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = Some(min_relevance);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(SearchQuery::new(query));
        self
    }

    /// Check if any filters are set
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none()
            && self.model.is_none()
            && self.memory_types.is_none()
            && self.priorities.is_none()
            && self.min_relevance.is_none()
            && self.since.is_none()
            && self.query.is_none()
    }

    /// Whether `entry` passes every configured criterion
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(ref session_id) = self.session_id {
            if &entry.session_id != session_id {
                return false;
            }
        }
        if let Some(ref model) = self.model {
            if &entry.model != model {
                return false;
            }
        }
        if let Some(ref types) = self.memory_types {
            if !types.is_empty() && !types.contains(&entry.memory_type) {
                return false;
            }
        }
        if let Some(ref priorities) = self.priorities {
            if !priorities.is_empty() && !priorities.contains(&entry.priority) {
                return false;
            }
        }
        if let Some(min_relevance) = self.min_relevance {
            if entry.relevance_score < min_relevance {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.created_at < since {
                return false;
            }
        }
        if let Some(ref query) = self.query {
            if !query.matches(entry) {
                return false;
            }
        }
        true
    }
}

/// Normalized free-text query.
///
/// Matches when the whole query is a substring of the content or of a
/// metadata value, or, for multi-word queries, when any query token of at
/// least three characters appears among the entry's words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    phrase: String,
    tokens: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: &str) -> Self {
        let phrase = query.trim().to_lowercase();
        let words: Vec<&str> = phrase.split_whitespace().collect();
        let tokens = if words.len() > 1 {
            words
                .into_iter()
                .filter(|w| w.chars().count() >= MIN_QUERY_TOKEN_LEN)
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        Self { phrase, tokens }
    }

    pub fn is_blank(&self) -> bool {
        self.phrase.is_empty()
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if self.is_blank() {
            return true;
        }

        let content = entry.content.to_lowercase();
        if content.contains(&self.phrase) {
            return true;
        }
        let values: Vec<String> = entry.metadata.values().map(|v| v.to_lowercase()).collect();
        if values.iter().any(|v| v.contains(&self.phrase)) {
            return true;
        }

        if self.tokens.is_empty() {
            return false;
        }
        let haystack = std::iter::once(content.as_str()).chain(values.iter().map(String::as_str));
        let words: Vec<&str> = haystack
            .flat_map(|text| text.split(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        self.tokens.iter().any(|t| words.contains(&t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(content: &str, memory_type: MemoryType) -> MemoryEntry {
        MemoryEntry::new(
            "s1",
            "claude",
            memory_type,
            memory_type.default_priority(),
            content,
            HashMap::new(),
            0.5,
        )
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EntryFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&entry("anything", MemoryType::Conversation)));
    }

    #[test]
    fn test_filter_by_session_and_model() {
        let e = entry("hello", MemoryType::Conversation);
        assert!(EntryFilter::new().with_session("s1").matches(&e));
        assert!(!EntryFilter::new().with_session("s2").matches(&e));
        assert!(!EntryFilter::new().with_model("gemini").matches(&e));
    }

    #[test]
    fn test_filter_by_type_and_priority() {
        let e = entry("ls -la", MemoryType::ToolUsage);
        let filter = EntryFilter::new()
            .with_memory_types(vec![MemoryType::ToolUsage, MemoryType::WorkContext]);
        assert!(filter.matches(&e));

        let filter = EntryFilter::new().with_priorities(vec![MemoryPriority::Critical]);
        assert!(!filter.matches(&e));
    }

    #[test]
    fn test_filter_by_min_relevance() {
        let mut e = entry("hello", MemoryType::Conversation);
        e.set_relevance(0.2);
        assert!(!EntryFilter::new().with_min_relevance(0.3).matches(&e));
        assert!(EntryFilter::new().with_min_relevance(0.2).matches(&e));
    }

    #[test]
    fn test_query_substring_case_insensitive() {
        let e = entry("Refactor the Parser module", MemoryType::WorkContext);
        assert!(SearchQuery::new("parser").matches(&e));
        assert!(SearchQuery::new("THE PARSER").matches(&e));
        assert!(!SearchQuery::new("lexer").matches(&e));
    }

    #[test]
    fn test_query_matches_metadata_values() {
        let mut e = entry("plain text", MemoryType::Conversation);
        e.metadata.insert("topic".into(), "Databases".into());
        assert!(SearchQuery::new("database").matches(&e));
    }

    #[test]
    fn test_query_token_overlap() {
        let e = entry("We migrated storage to sqlite today", MemoryType::Conversation);
        assert!(SearchQuery::new("postgres sqlite").matches(&e));
        // Short tokens are ignored
        assert!(!SearchQuery::new("to be").matches(&e));
    }

    #[test]
    fn test_blank_query_matches() {
        assert!(SearchQuery::new("   ").matches(&entry("x", MemoryType::Conversation)));
    }
}
