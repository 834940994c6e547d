use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CrossmemError, Result};
use crate::memory::similarity::ModelProfile;

/// Main configuration structure for crossmem
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Memory budgets and GC policy
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Relevance seeding and decay
    #[serde(default)]
    pub relevance: RelevanceConfig,
    /// Excerpt-based summarization
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    /// Model recommendation and the known model catalog
    #[serde(default)]
    pub recommender: RecommenderConfig,
    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP API of the daemon
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CrossmemError::Config(format!("Failed to parse config: {e}")))?;
        config.memory.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CrossmemError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from an explicit path, or the first default location that exists,
    /// or fall back to defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// First default config location that exists
    pub fn default_path() -> Option<PathBuf> {
        default_config_paths().into_iter().find(|path| path.exists())
    }

    /// Full path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.snapshot_file)
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".crossmem").join("config.toml")),
        dirs::config_dir().map(|c| c.join("crossmem").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Process-wide memory budget, mutable only through an explicit update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Estimated memory ceiling in MB; GC evicts Low entries above it
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// Token budget for a single transfer into a target model
    #[serde(default = "default_max_tokens_per_session")]
    pub max_tokens_per_session: usize,
    /// Cumulative partition tokens above which auto-summarization triggers
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Scores below this are GC-eligible
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    /// Background GC cadence
    #[serde(default = "default_gc_interval_minutes")]
    pub gc_interval_minutes: u64,
    /// Summarize partitions automatically when they grow past the threshold
    #[serde(default = "default_auto_summarize")]
    pub auto_summarize: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            max_tokens_per_session: default_max_tokens_per_session(),
            compression_threshold: default_compression_threshold(),
            relevance_threshold: default_relevance_threshold(),
            gc_interval_minutes: default_gc_interval_minutes(),
            auto_summarize: default_auto_summarize(),
        }
    }
}

impl MemoryConfig {
    /// Reject budgets that would make GC or transfer meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.relevance_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.relevance_threshold)
        {
            return Err(CrossmemError::Config(format!(
                "relevance_threshold must be within [0, 1], got {}",
                self.relevance_threshold
            )));
        }
        if self.gc_interval_minutes == 0 {
            return Err(CrossmemError::Config(
                "gc_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.max_tokens_per_session == 0 {
            return Err(CrossmemError::Config(
                "max_tokens_per_session must be at least 1".to_string(),
            ));
        }
        if self.max_memory_mb == 0 {
            return Err(CrossmemError::Config(
                "max_memory_mb must be at least 1".to_string(),
            ));
        }
        if self.compression_threshold == 0 {
            return Err(CrossmemError::Config(
                "compression_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// GC interval as a chrono duration
    pub fn gc_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.gc_interval_minutes as i64)
    }

    /// Memory ceiling in bytes
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb as u64 * 1024 * 1024
    }
}

fn default_max_memory_mb() -> usize {
    10
}

fn default_max_tokens_per_session() -> usize {
    100_000
}

fn default_compression_threshold() -> usize {
    50_000
}

fn default_relevance_threshold() -> f32 {
    0.3
}

fn default_gc_interval_minutes() -> u64 {
    30
}

fn default_auto_summarize() -> bool {
    true
}

/// Relevance seeding and decay parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Decay horizon expressed in GC intervals
    #[serde(default = "default_decay_horizon_intervals")]
    pub decay_horizon_intervals: u32,
    /// Seed score for Critical entries
    #[serde(default = "default_critical_seed")]
    pub critical_seed: f32,
    /// Seed score for every other priority
    #[serde(default = "default_default_seed")]
    pub default_seed: f32,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            decay_horizon_intervals: default_decay_horizon_intervals(),
            critical_seed: default_critical_seed(),
            default_seed: default_default_seed(),
        }
    }
}

fn default_decay_horizon_intervals() -> u32 {
    10
}

fn default_critical_seed() -> f32 {
    1.0
}

fn default_default_seed() -> f32 {
    0.5
}

/// Summarizer limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Key points kept per memory type
    #[serde(default = "default_max_key_points_per_type")]
    pub max_key_points_per_type: usize,
    /// Maximum characters of a single excerpt
    #[serde(default = "default_max_key_point_chars")]
    pub max_key_point_chars: usize,
    /// Share of a transfer budget reserved for the summary entry
    #[serde(default = "default_summary_reserve_ratio")]
    pub summary_reserve_ratio: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_key_points_per_type: default_max_key_points_per_type(),
            max_key_point_chars: default_max_key_point_chars(),
            summary_reserve_ratio: default_summary_reserve_ratio(),
        }
    }
}

fn default_max_key_points_per_type() -> usize {
    10
}

fn default_max_key_point_chars() -> usize {
    200
}

fn default_summary_reserve_ratio() -> f32 {
    0.1
}

/// Model recommendation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Session token volume above which the largest-window model is preferred
    #[serde(default = "default_large_context_threshold")]
    pub large_context_threshold: usize,
    /// Minimum similarity for another session to count as evidence
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Known models and their context windows
    #[serde(default = "default_models")]
    pub models: Vec<ModelProfile>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            large_context_threshold: default_large_context_threshold(),
            similarity_threshold: default_similarity_threshold(),
            models: default_models(),
        }
    }
}

fn default_large_context_threshold() -> usize {
    100_000
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_models() -> Vec<ModelProfile> {
    ModelProfile::builtin_catalog()
}

/// Snapshot persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all persisted data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Snapshot file name inside `data_dir`
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    /// Save a snapshot after every scheduled GC cycle
    #[serde(default = "default_save_on_gc")]
    pub save_on_gc: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            save_on_gc: default_save_on_gc(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".crossmem"))
        .unwrap_or_else(|| PathBuf::from(".crossmem"))
}

fn default_snapshot_file() -> String {
    "memory.json".to_string()
}

fn default_save_on_gc() -> bool {
    true
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to listen on (e.g., "127.0.0.1:9797")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:9797".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
