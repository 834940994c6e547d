//! Memory types for crossmem
//!
//! Defines the entry, summary and statistics structures shared by every
//! component, plus the classification enums with their default policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CrossmemError;
use crate::memory::tokens::estimate_tokens;

/// A single remembered fact or turn, recorded under one model for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Globally unique identifier, never reassigned
    pub id: Uuid,
    /// Session this entry belongs to
    pub session_id: String,
    /// Model identity the entry was recorded under
    pub model: String,
    /// What kind of context this is
    pub memory_type: MemoryType,
    /// Retention priority
    pub priority: MemoryPriority,
    /// Text payload
    pub content: String,
    /// Free-form tags (`topic`, `tool_name`, ...)
    pub metadata: HashMap<String, String>,
    /// Estimated tokens of `content`, computed once at creation
    pub token_count: usize,
    /// Current relevance in [0, 1]
    pub relevance_score: f32,
    /// When this entry was created
    pub created_at: DateTime<Utc>,
    /// When this entry was last returned by a read
    pub accessed_at: DateTime<Utc>,
    /// How many reads returned this entry
    pub access_count: u32,
}

impl MemoryEntry {
    /// Create an entry with derived token count and the given relevance seed
    pub fn new(
        session_id: impl Into<String>,
        model: impl Into<String>,
        memory_type: MemoryType,
        priority: MemoryPriority,
        content: impl Into<String>,
        metadata: HashMap<String, String>,
        relevance_score: f32,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            model: model.into(),
            memory_type,
            priority,
            token_count: estimate_tokens(&content),
            content,
            metadata,
            relevance_score: relevance_score.clamp(0.0, 1.0),
            created_at: now,
            accessed_at: now,
            access_count: 0,
        }
    }

    /// Mark this entry as returned by a read
    pub fn mark_accessed(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.accessed_at = Utc::now();
    }

    /// Update the relevance score, clamped to [0, 1]
    pub fn set_relevance(&mut self, score: f32) {
        self.relevance_score = score.clamp(0.0, 1.0);
    }

    /// Copy of this entry re-homed under another model with a fresh identity.
    ///
    /// Session, type, priority, metadata, content and relevance carry over.
    pub fn copy_for_model(&self, model: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model: model.to_string(),
            created_at: now,
            accessed_at: now,
            access_count: 0,
            ..self.clone()
        }
    }

    /// The `(session_id, model)` partition key
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(&self.session_id, &self.model)
    }

    /// Check the write-once invariants of this entry
    pub fn check_invariants(&self) -> Result<(), CrossmemError> {
        if !self.relevance_score.is_finite() || !(0.0..=1.0).contains(&self.relevance_score) {
            return Err(CrossmemError::InvariantViolation(format!(
                "entry {} has relevance {} outside [0, 1]",
                self.id, self.relevance_score
            )));
        }
        let expected = estimate_tokens(&self.content);
        if self.token_count != expected {
            return Err(CrossmemError::InvariantViolation(format!(
                "entry {} records {} tokens but content estimates to {}",
                self.id, self.token_count, expected
            )));
        }
        Ok(())
    }
}

/// Logical grouping of entries by `(session_id, model)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub session_id: String,
    pub model: String,
}

impl PartitionKey {
    pub fn new(session_id: &str, model: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            model: model.to_string(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.model)
    }
}

/// Classification of what an entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryType {
    /// Chat messages
    Conversation,
    /// Project files, code, current task
    WorkContext,
    /// Tool invocations and results
    ToolUsage,
    /// Model instructions
    SystemPrompt,
    /// Project configuration
    ProjectMetadata,
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        MemoryType::Conversation,
        MemoryType::WorkContext,
        MemoryType::ToolUsage,
        MemoryType::SystemPrompt,
        MemoryType::ProjectMetadata,
    ];

    /// Priority assigned when the caller does not give one
    pub fn default_priority(self) -> MemoryPriority {
        match self {
            MemoryType::SystemPrompt => MemoryPriority::Critical,
            MemoryType::Conversation => MemoryPriority::Medium,
            MemoryType::WorkContext | MemoryType::ToolUsage | MemoryType::ProjectMetadata => {
                MemoryPriority::Low
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Conversation => "Conversation",
            MemoryType::WorkContext => "WorkContext",
            MemoryType::ToolUsage => "ToolUsage",
            MemoryType::SystemPrompt => "SystemPrompt",
            MemoryType::ProjectMetadata => "ProjectMetadata",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = CrossmemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "conversation" => Ok(MemoryType::Conversation),
            "workcontext" => Ok(MemoryType::WorkContext),
            "toolusage" => Ok(MemoryType::ToolUsage),
            "systemprompt" => Ok(MemoryType::SystemPrompt),
            "projectmetadata" => Ok(MemoryType::ProjectMetadata),
            _ => Err(CrossmemError::InvalidInput(format!(
                "Unknown memory type: {s}. Use conversation, work_context, tool_usage, system_prompt, or project_metadata."
            ))),
        }
    }
}

/// Retention priority. Ordered from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPriority {
    /// Must be preserved; never evicted, never decays
    Critical,
    /// Important context
    High,
    /// Useful context
    Medium,
    /// Optional context; first to go under memory pressure
    Low,
}

impl MemoryPriority {
    pub const ALL: [MemoryPriority; 4] = [
        MemoryPriority::Critical,
        MemoryPriority::High,
        MemoryPriority::Medium,
        MemoryPriority::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryPriority::Critical => "Critical",
            MemoryPriority::High => "High",
            MemoryPriority::Medium => "Medium",
            MemoryPriority::Low => "Low",
        }
    }
}

impl fmt::Display for MemoryPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryPriority {
    type Err = CrossmemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(MemoryPriority::Critical),
            "high" => Ok(MemoryPriority::High),
            "medium" => Ok(MemoryPriority::Medium),
            "low" => Ok(MemoryPriority::Low),
            _ => Err(CrossmemError::InvalidInput(format!(
                "Unknown priority: {s}. Use critical, high, medium, or low."
            ))),
        }
    }
}

/// Caller-supplied fields for a new entry; the repository derives the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemoryEntry {
    pub session_id: String,
    pub model: String,
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub priority: Option<MemoryPriority>,
}

impl NewMemoryEntry {
    pub fn new(
        session_id: impl Into<String>,
        model: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
            memory_type,
            content: content.into(),
            metadata: HashMap::new(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: MemoryPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Priority to store: explicit, or the type's default
    pub fn resolved_priority(&self) -> MemoryPriority {
        self.priority
            .unwrap_or_else(|| self.memory_type.default_priority())
    }
}

/// Compressed, excerpt-based representation of one partition's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub session_id: String,
    pub original_model: String,
    /// Key points joined by newlines
    pub summary: String,
    /// Verbatim excerpts, most relevant first
    pub key_points: Vec<String>,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

impl ContextSummary {
    /// The summary of nothing
    pub fn empty(session_id: &str, original_model: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            original_model: original_model.to_string(),
            summary: String::new(),
            key_points: Vec::new(),
            token_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Rebuild `summary` and `token_count` from `key_points`
    pub fn recompute(&mut self) {
        self.summary = self.key_points.join("\n");
        self.token_count = estimate_tokens(&self.summary);
    }

    /// Drop the least relevant key point, returning false if none were left
    pub fn drop_last_key_point(&mut self) -> bool {
        let dropped = self.key_points.pop().is_some();
        if dropped {
            self.recompute();
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty()
    }
}

/// Derived, read-only snapshot of store usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub total_tokens: usize,
    pub memory_usage_mb: f64,
    pub sessions_count: usize,
    pub models_count: usize,
    pub last_gc_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> MemoryEntry {
        MemoryEntry::new(
            "s1",
            "claude",
            MemoryType::Conversation,
            MemoryPriority::Medium,
            content,
            HashMap::new(),
            0.5,
        )
    }

    #[test]
    fn test_entry_new_defaults() {
        let e = entry("hello world!");
        assert_eq!(e.token_count, 3);
        assert_eq!(e.access_count, 0);
        assert_eq!(e.created_at, e.accessed_at);
        assert_eq!(e.partition(), PartitionKey::new("s1", "claude"));
        assert!(e.check_invariants().is_ok());
    }

    #[test]
    fn test_mark_accessed() {
        let mut e = entry("Test");
        let before = e.accessed_at;
        e.mark_accessed();
        assert_eq!(e.access_count, 1);
        assert!(e.accessed_at >= before);
    }

    #[test]
    fn test_set_relevance_clamps() {
        let mut e = entry("Test");
        e.set_relevance(1.5);
        assert_eq!(e.relevance_score, 1.0);
        e.set_relevance(-0.5);
        assert_eq!(e.relevance_score, 0.0);
    }

    #[test]
    fn test_copy_for_model_keeps_payload_and_relevance() {
        let mut e = entry("Refactor the parser");
        e.metadata.insert("topic".into(), "parser".into());
        e.set_relevance(0.73);
        e.access_count = 9;

        let copy = e.copy_for_model("gemini");
        assert_ne!(copy.id, e.id);
        assert_eq!(copy.model, "gemini");
        assert_eq!(copy.session_id, e.session_id);
        assert_eq!(copy.content, e.content);
        assert_eq!(copy.metadata, e.metadata);
        assert_eq!(copy.priority, e.priority);
        assert_eq!(copy.token_count, e.token_count);
        assert_eq!(copy.relevance_score, 0.73);
        assert_eq!(copy.access_count, 0);
    }

    #[test]
    fn test_tampered_token_count_is_invariant_violation() {
        let mut e = entry("some content here");
        e.token_count += 1;
        assert!(matches!(
            e.check_invariants(),
            Err(CrossmemError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_default_priority_by_type() {
        assert_eq!(
            MemoryType::SystemPrompt.default_priority(),
            MemoryPriority::Critical
        );
        assert_eq!(
            MemoryType::Conversation.default_priority(),
            MemoryPriority::Medium
        );
        assert_eq!(MemoryType::ToolUsage.default_priority(), MemoryPriority::Low);
        assert_eq!(MemoryType::WorkContext.default_priority(), MemoryPriority::Low);
        assert_eq!(
            MemoryType::ProjectMetadata.default_priority(),
            MemoryPriority::Low
        );
    }

    #[test]
    fn test_parse_type_and_priority_names() {
        assert_eq!(
            "work_context".parse::<MemoryType>().unwrap(),
            MemoryType::WorkContext
        );
        assert_eq!(
            "ToolUsage".parse::<MemoryType>().unwrap(),
            MemoryType::ToolUsage
        );
        assert!("episodic".parse::<MemoryType>().is_err());
        assert_eq!(
            "CRITICAL".parse::<MemoryPriority>().unwrap(),
            MemoryPriority::Critical
        );
        assert!("urgent".parse::<MemoryPriority>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MemoryPriority::Critical < MemoryPriority::High);
        assert!(MemoryPriority::Medium < MemoryPriority::Low);
    }

    #[test]
    fn test_summary_drop_last_key_point() {
        let mut summary = ContextSummary::empty("s1", "claude");
        summary.key_points = vec!["first point".into(), "second point".into()];
        summary.recompute();
        assert_eq!(summary.summary, "first point\nsecond point");

        assert!(summary.drop_last_key_point());
        assert_eq!(summary.summary, "first point");
        assert_eq!(summary.token_count, 3);
        assert!(summary.drop_last_key_point());
        assert_eq!(summary.token_count, 0);
        assert!(!summary.drop_last_key_point());
    }

    #[test]
    fn test_new_memory_entry_resolves_priority() {
        let plain = NewMemoryEntry::new("s1", "claude", MemoryType::SystemPrompt, "Be terse");
        assert_eq!(plain.resolved_priority(), MemoryPriority::Critical);
        let explicit = plain.clone().with_priority(MemoryPriority::Low);
        assert_eq!(explicit.resolved_priority(), MemoryPriority::Low);
    }
}
