//! Integration tests for the memory engine command surface
//!
//! Covers storing and reading entries, search, retrieval for a joining
//! model, session merge and clear, statistics, configuration updates and
//! garbage collection.

use crossmem::CrossmemError;
use crossmem::config::MemoryConfig;
use crossmem::memory::types::{MemoryPriority, MemoryType, NewMemoryEntry};
use crossmem::storage::filter::EntryFilter;
use crossmem::testing::{
    content_with_tokens, conversation, engine, entry_fields, quiet_config, store_many, tagged,
};

mod store_tests {
    use super::*;

    #[tokio::test]
    async fn test_store_derives_fields() {
        let engine = engine(quiet_config());
        let entry = engine
            .store_memory_entry(conversation("s1", "claude", "abcdefgh"))
            .await
            .unwrap();

        assert_eq!(entry.token_count, 2);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.priority, MemoryType::Conversation.default_priority());
        assert!((0.0..=1.0).contains(&entry.relevance_score));
    }

    #[tokio::test]
    async fn test_store_rejects_empty_content() {
        let engine = engine(quiet_config());
        let err = engine
            .store_memory_entry(conversation("s1", "claude", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, CrossmemError::InvalidInput(_)));
        assert_eq!(engine.get_memory_stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_explicit_priority_wins() {
        let engine = engine(quiet_config());
        let entry = engine
            .store_memory_entry(entry_fields(
                "s1",
                "claude",
                MemoryType::Conversation,
                MemoryPriority::Critical,
                "never forget this",
            ))
            .await
            .unwrap();
        assert_eq!(entry.priority, MemoryPriority::Critical);
    }

    #[tokio::test]
    async fn test_get_counts_as_read() {
        let engine = engine(quiet_config());
        let stored = engine
            .store_memory_entry(conversation("s1", "claude", "hello"))
            .await
            .unwrap();

        let first = engine.get_memory(stored.id).await.unwrap();
        assert_eq!(first.access_count, 1);
        assert!(first.accessed_at >= stored.accessed_at);

        let second = engine.get_memory(stored.id).await.unwrap();
        assert_eq!(second.access_count, 2);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let engine = engine(quiet_config());
        let err = engine.get_memory(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CrossmemError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_does_not_touch() {
        let engine = engine(quiet_config());
        store_many(&engine, "s1", "claude", 3, 10).await.unwrap();

        let filter = EntryFilter::new().with_session("s1");
        engine.list_memories(&filter).await;
        let listed = engine.list_memories(&filter).await;
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|e| e.access_count == 0));
    }

    #[tokio::test]
    async fn test_session_memories_oldest_first() {
        let engine = engine(quiet_config());
        let stored = store_many(&engine, "s1", "claude", 4, 5).await.unwrap();
        let listed = engine.get_session_memories("s1").await;

        let stored_ids: Vec<_> = stored.iter().map(|e| e.id).collect();
        let listed_ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert_eq!(listed_ids, stored_ids);
        assert!(listed.iter().all(|e| e.access_count == 1));
    }
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let engine = engine(quiet_config());
        engine
            .store_memory_entry(conversation("s1", "claude", "Deploying to Kubernetes today"))
            .await
            .unwrap();
        engine
            .store_memory_entry(conversation("s1", "claude", "lunch plans"))
            .await
            .unwrap();

        let hits = engine.search_memories("kubernetes", None, None).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("Kubernetes"));
    }

    #[tokio::test]
    async fn test_search_matches_metadata() {
        let engine = engine(quiet_config());
        engine
            .store_memory_entry(tagged("s1", "claude", "rust", "cargo"))
            .await
            .unwrap();

        let hits = engine.search_memories("cargo", Some("s1"), None).await;
        assert_eq!(hits.len(), 1);
        assert!(engine.search_memories("cargo", Some("s2"), None).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_orders_by_relevance_and_limits() {
        let engine = engine(quiet_config());
        let stored = store_many(&engine, "s1", "claude", 5, 10).await.unwrap();
        engine
            .update_memory_relevance(stored[3].id, 0.95)
            .await
            .unwrap();

        let hits = engine.search_memories("entry", None, Some(2)).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, stored[3].id);
    }

    #[tokio::test]
    async fn test_search_counts_as_read_for_returned_hits_only() {
        let engine = engine(quiet_config());
        let stored = store_many(&engine, "s1", "claude", 4, 10).await.unwrap();
        engine
            .update_memory_relevance(stored[2].id, 0.9)
            .await
            .unwrap();

        let first = engine.search_memories("entry", Some("s1"), Some(1)).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, stored[2].id);
        assert_eq!(first[0].access_count, 1);
        assert!(first[0].accessed_at >= stored[2].accessed_at);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second = engine.search_memories("entry", Some("s1"), Some(1)).await;
        assert_eq!(second[0].id, stored[2].id);
        assert_eq!(second[0].access_count, 2);
        assert!(second[0].accessed_at > first[0].accessed_at);

        let listed = engine
            .list_memories(&EntryFilter::new().with_session("s1"))
            .await;
        assert_eq!(listed.len(), 4);
        for entry in listed {
            let expected = if entry.id == stored[2].id { 2 } else { 0 };
            assert_eq!(entry.access_count, expected);
        }
    }
}

mod retrieval_tests {
    use super::*;

    #[tokio::test]
    async fn test_retrieve_respects_token_budget() {
        let engine = engine(quiet_config());
        store_many(&engine, "s1", "claude", 10, 100).await.unwrap();

        let entries = engine
            .retrieve_memory_for_model("s1", "gemini", Some(350))
            .await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().map(|e| e.token_count).sum::<usize>() <= 350);
    }

    #[tokio::test]
    async fn test_retrieve_skips_content_target_already_has() {
        let engine = engine(quiet_config());
        engine
            .store_memory_entry(conversation("s1", "claude", "shared fact"))
            .await
            .unwrap();
        engine
            .store_memory_entry(conversation("s1", "gemini", "shared fact"))
            .await
            .unwrap();
        engine
            .store_memory_entry(conversation("s1", "claude", "claude only"))
            .await
            .unwrap();

        let entries = engine.retrieve_memory_for_model("s1", "gemini", None).await;
        assert_eq!(entries.len(), 2);
        let shared: Vec<_> = entries
            .iter()
            .filter(|e| e.content == "shared fact")
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].model, "gemini");
    }

    #[tokio::test]
    async fn test_retrieve_unknown_session_is_empty() {
        let engine = engine(quiet_config());
        assert!(
            engine
                .retrieve_memory_for_model("missing", "claude", None)
                .await
                .is_empty()
        );
    }
}

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_preserves_every_entry() {
        let engine = engine(quiet_config());
        store_many(&engine, "a", "claude", 3, 10).await.unwrap();
        store_many(&engine, "b", "gemini", 2, 10).await.unwrap();
        store_many(&engine, "c", "claude", 1, 10).await.unwrap();
        let before = engine.get_memory_stats().await;

        let moved = engine
            .merge_session_memories(&["a".to_string(), "b".to_string()], "c")
            .await
            .unwrap();
        assert_eq!(moved, 5);

        let after = engine.get_memory_stats().await;
        assert_eq!(after.total_entries, before.total_entries);
        assert_eq!(after.total_tokens, before.total_tokens);
        assert_eq!(engine.session_ids().await, vec!["c".to_string()]);
        assert_eq!(engine.get_session_memories("c").await.len(), 6);
    }

    #[tokio::test]
    async fn test_merge_moves_summaries() {
        let engine = engine(quiet_config());
        store_many(&engine, "a", "claude", 3, 10).await.unwrap();
        engine.create_context_summary("a", "claude").await;

        engine
            .merge_session_memories(&["a".to_string()], "b")
            .await
            .unwrap();
        assert!(engine.get_context_summaries("a").await.is_empty());
        let summaries = engine.get_context_summaries("b").await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "b");
    }

    #[tokio::test]
    async fn test_merge_rejects_empty_target() {
        let engine = engine(quiet_config());
        let err = engine
            .merge_session_memories(&["a".to_string()], "")
            .await
            .unwrap_err();
        assert!(matches!(err, CrossmemError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_clear_session() {
        let engine = engine(quiet_config());
        store_many(&engine, "a", "claude", 3, 10).await.unwrap();
        store_many(&engine, "b", "claude", 2, 10).await.unwrap();

        assert_eq!(engine.clear_session_memory("a").await, 3);
        assert_eq!(engine.clear_session_memory("a").await, 0);

        let stats = engine.get_memory_stats().await;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.sessions_count, 1);
    }
}

mod stats_tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_track_tokens_sessions_and_models() {
        let engine = engine(quiet_config());
        store_many(&engine, "a", "claude", 2, 50).await.unwrap();
        store_many(&engine, "b", "gemini", 3, 20).await.unwrap();

        let stats = engine.get_memory_stats().await;
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.total_tokens, 160);
        assert_eq!(stats.sessions_count, 2);
        assert_eq!(stats.models_count, 2);
        assert!(stats.memory_usage_mb > 0.0);
    }

    #[tokio::test]
    async fn test_empty_engine_stats() {
        let engine = engine(quiet_config());
        let stats = engine.get_memory_stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(stats.memory_usage_mb, 0.0);
        assert!(stats.last_gc_run.is_none());
    }
}

mod config_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_config_applies() {
        let engine = engine(quiet_config());
        let updated = MemoryConfig {
            max_tokens_per_session: 4096,
            relevance_threshold: 0.5,
            ..quiet_config()
        };
        engine.update_memory_config(updated.clone()).await.unwrap();
        assert_eq!(engine.get_memory_config().await, updated);
    }

    #[tokio::test]
    async fn test_update_config_rejects_zero_budget() {
        let engine = engine(quiet_config());
        let err = engine
            .update_memory_config(MemoryConfig {
                max_tokens_per_session: 0,
                ..quiet_config()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CrossmemError::Config(_)));
        assert_eq!(engine.get_memory_config().await, quiet_config());
    }

    #[tokio::test]
    async fn test_auto_summarize_disabled_writes_no_summaries() {
        let engine = engine(MemoryConfig {
            compression_threshold: 10,
            ..quiet_config()
        });
        store_many(&engine, "s1", "claude", 5, 20).await.unwrap();
        assert!(engine.get_context_summaries("s1").await.is_empty());
    }
}

mod gc_tests {
    use super::*;

    async fn store_with_relevance(
        engine: &crossmem::MemoryEngine,
        priority: MemoryPriority,
        relevance: f32,
        content: &str,
    ) -> uuid::Uuid {
        let entry = engine
            .store_memory_entry(
                NewMemoryEntry::new("S1", "claude", MemoryType::Conversation, content)
                    .with_priority(priority),
            )
            .await
            .unwrap();
        engine
            .update_memory_relevance(entry.id, relevance)
            .await
            .unwrap();
        entry.id
    }

    #[tokio::test]
    async fn test_gc_evicts_low_relevance_keeps_critical() {
        let engine = engine(MemoryConfig {
            relevance_threshold: 0.2,
            ..quiet_config()
        });
        let critical = store_with_relevance(&engine, MemoryPriority::Critical, 1.0, "keep").await;
        store_with_relevance(&engine, MemoryPriority::Low, 0.1, "drop one").await;
        store_with_relevance(&engine, MemoryPriority::Low, 0.1, "drop two").await;

        assert_eq!(engine.garbage_collect_memory().await, 2);

        let remaining = engine.get_session_memories("S1").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, critical);
    }

    #[tokio::test]
    async fn test_gc_never_evicts_critical() {
        let engine = engine(MemoryConfig {
            relevance_threshold: 1.0,
            ..quiet_config()
        });
        store_with_relevance(&engine, MemoryPriority::Critical, 0.0, "pinned").await;

        assert_eq!(engine.garbage_collect_memory().await, 0);
        assert_eq!(engine.get_memory_stats().await.total_entries, 1);
    }

    #[tokio::test]
    async fn test_gc_back_to_back_is_idempotent() {
        let engine = engine(MemoryConfig {
            relevance_threshold: 0.2,
            ..quiet_config()
        });
        store_with_relevance(&engine, MemoryPriority::Low, 0.1, "stale").await;
        store_with_relevance(&engine, MemoryPriority::Medium, 0.8, "fresh").await;

        assert_eq!(engine.garbage_collect_memory().await, 1);
        let after_first = engine.get_memory_stats().await;

        assert_eq!(engine.garbage_collect_memory().await, 0);
        let after_second = engine.get_memory_stats().await;
        assert_eq!(after_first.total_entries, after_second.total_entries);
        assert_eq!(after_first.total_tokens, after_second.total_tokens);
    }

    #[tokio::test]
    async fn test_gc_pressure_evicts_only_low() {
        let engine = engine(MemoryConfig {
            max_memory_mb: 1,
            relevance_threshold: 0.0,
            ..quiet_config()
        });
        // ~1.2 MB of Low entries and one High entry
        let big = content_with_tokens(0, 100_000);
        for i in 0..3 {
            engine
                .store_memory_entry(
                    NewMemoryEntry::new("S1", "claude", MemoryType::Conversation, format!("{i}{big}"))
                        .with_priority(MemoryPriority::Low),
                )
                .await
                .unwrap();
        }
        let high = engine
            .store_memory_entry(
                NewMemoryEntry::new("S1", "claude", MemoryType::WorkContext, "ship it")
                    .with_priority(MemoryPriority::High),
            )
            .await
            .unwrap();

        let report = engine.run_gc().await;
        assert!(report.evicted_by_pressure >= 1);
        assert_eq!(report.evicted_by_relevance, 0);
        assert!(report.usage_bytes_after <= 1024 * 1024);
        assert!(engine.get_memory(high.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_gc_emits_event_and_records_run() {
        let engine = engine(quiet_config());
        let mut rx = engine.subscribe();
        engine.garbage_collect_memory().await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            crossmem::events::EngineEvent::GarbageCollected { evicted: 0, .. }
        ));
        assert!(engine.get_memory_stats().await.last_gc_run.is_some());
    }
}
