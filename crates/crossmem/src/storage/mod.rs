pub mod filter;
pub mod gc;
pub mod repository;
pub mod snapshot;

pub use filter::{EntryFilter, SearchQuery};
pub use gc::{GarbageCollector, GcReport};
pub use repository::{MemoryRepository, StoredEntry};
pub use snapshot::{JsonFileSnapshot, Snapshot, SnapshotStore};
