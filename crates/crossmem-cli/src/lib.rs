pub mod commands;
pub mod error;
pub mod output;
pub mod workspace;

pub use commands::{
    ConfigCommand, GcCommand, MemoryCommand, RecommendCommand, SessionCommand, SimilarityCommand,
    StatsCommand, SummaryCommand, TransferCommand,
};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_size, format_timestamp, truncate_string};
pub use workspace::Workspace;
