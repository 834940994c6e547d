//! Test utilities for crossmem - shared fixtures
//!
//! Builders for engines, repositories and entries with predictable token
//! counts, used by unit and integration tests alike.

use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::engine::MemoryEngine;
use crate::error::Result;
use crate::memory::tokens::BYTES_PER_TOKEN;
use crate::memory::types::{MemoryEntry, MemoryPriority, MemoryType, NewMemoryEntry};

/// Content that estimates to exactly `tokens` tokens.
///
/// `seed` goes at the front so entries built with different seeds differ.
pub fn content_with_tokens(seed: usize, tokens: usize) -> String {
    let len = tokens * BYTES_PER_TOKEN;
    let mut content = format!("entry-{seed} ");
    if content.len() >= len {
        content.truncate(len);
        return content;
    }
    let pad = len - content.len();
    content.push_str(&"x".repeat(pad));
    content
}

/// Fields for a Conversation entry
pub fn conversation(session_id: &str, model: &str, content: &str) -> NewMemoryEntry {
    NewMemoryEntry::new(session_id, model, MemoryType::Conversation, content)
}

/// Fields with explicit type and priority
pub fn entry_fields(
    session_id: &str,
    model: &str,
    memory_type: MemoryType,
    priority: MemoryPriority,
    content: &str,
) -> NewMemoryEntry {
    NewMemoryEntry::new(session_id, model, memory_type, content).with_priority(priority)
}

/// Fields tagged with a topic and a tool
pub fn tagged(session_id: &str, model: &str, topic: &str, tool: &str) -> NewMemoryEntry {
    conversation(session_id, model, &format!("discussed {topic} using {tool}"))
        .with_metadata("topic", topic)
        .with_metadata("tool_name", tool)
}

/// Engine with the given memory config and defaults elsewhere
pub fn engine(memory: MemoryConfig) -> MemoryEngine {
    match MemoryEngine::with_memory_config(memory) {
        Ok(engine) => engine,
        Err(e) => panic!("invalid test memory config: {e}"),
    }
}

/// Engine behind an `Arc`, for API and scheduler tests
pub fn shared_engine(memory: MemoryConfig) -> Arc<MemoryEngine> {
    Arc::new(engine(memory))
}

/// Memory config with auto-summarization off, so tests control every summary
pub fn quiet_config() -> MemoryConfig {
    MemoryConfig {
        auto_summarize: false,
        ..Default::default()
    }
}

/// Store `count` Conversation entries of `tokens` tokens each
pub async fn store_many(
    engine: &MemoryEngine,
    session_id: &str,
    model: &str,
    count: usize,
    tokens: usize,
) -> Result<Vec<MemoryEntry>> {
    let mut stored = Vec::with_capacity(count);
    for i in 0..count {
        let content = content_with_tokens(i, tokens);
        stored.push(
            engine
                .store_memory_entry(conversation(session_id, model, &content))
                .await?,
        );
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tokens::estimate_tokens;

    #[test]
    fn content_with_tokens_is_exact() {
        for tokens in [1, 2, 3, 10, 100] {
            assert_eq!(estimate_tokens(&content_with_tokens(7, tokens)), tokens);
        }
    }

    #[test]
    fn content_with_tokens_differs_by_seed() {
        assert_ne!(content_with_tokens(1, 50), content_with_tokens(2, 50));
    }

    #[tokio::test]
    async fn store_many_stores_all() {
        let engine = engine(quiet_config());
        let stored = store_many(&engine, "s1", "claude", 3, 10).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|e| e.token_count == 10));
    }
}
