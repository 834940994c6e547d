//! Engine events for real-time monitoring
//!
//! The engine publishes an `EngineEvent` on a broadcast channel after every
//! state-changing operation. Hosts forward them (the daemon streams them as
//! server-sent events); having no subscribers is fine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new entry was stored
    EntryStored {
        memory_id: String,
        session_id: String,
        model: String,
        memory_type: String,
        token_count: usize,
    },
    /// A summary was created, on demand or automatically
    SummaryCreated {
        session_id: String,
        original_model: String,
        key_points: usize,
        token_count: usize,
        automatic: bool,
    },
    /// A transfer completed
    ContextTransferred {
        session_id: String,
        source_model: String,
        target_model: String,
        entries: usize,
        tokens: usize,
        compression_applied: bool,
    },
    /// A GC cycle finished
    GarbageCollected {
        evicted: usize,
        decayed: usize,
        timestamp: DateTime<Utc>,
    },
    /// A session was cleared
    SessionCleared { session_id: String, removed: usize },
    /// Sessions were merged into a target
    SessionsMerged {
        sources: Vec<String>,
        target: String,
        moved: usize,
    },
    /// The memory config was replaced
    ConfigUpdated { timestamp: DateTime<Utc> },
}

/// Create the sender half of an event channel
pub fn channel() -> broadcast::Sender<EngineEvent> {
    let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}
