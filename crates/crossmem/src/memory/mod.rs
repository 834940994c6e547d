//! Memory types and operations
//!
//! Defines the entry and summary structures together with the scoring,
//! summarization and similarity logic that operates on them.

pub mod relevance;
pub mod similarity;
pub mod summarizer;
pub mod tokens;
pub mod types;

pub use relevance::{RelevanceScorer, decay_factor, decayed_score, seed_score};
pub use similarity::{ContextSimilarity, ModelProfile, SimilarityEngine, compare_sessions};
pub use summarizer::ContextSummarizer;
pub use tokens::{estimate_entry_bytes, estimate_tokens};
pub use types::{
    ContextSummary, MemoryEntry, MemoryPriority, MemoryStats, MemoryType, NewMemoryEntry,
    PartitionKey,
};
