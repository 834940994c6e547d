pub mod config;
pub mod gc;
pub mod memory;
pub mod recommend;
pub mod session;
pub mod similarity;
pub mod stats;
pub mod summary;
pub mod transfer;

pub use config::ConfigCommand;
pub use gc::GcCommand;
pub use memory::MemoryCommand;
pub use recommend::RecommendCommand;
pub use session::SessionCommand;
pub use similarity::SimilarityCommand;
pub use stats::StatsCommand;
pub use summary::SummaryCommand;
pub use transfer::TransferCommand;
