//! Crossmem - Session memory and context transfer across LLM backends
//!
//! This crate keeps per-session memory entries for every model a session
//! talks to, scores and evicts them, summarizes them, and moves context from
//! one model to another within a token budget.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod memory;
pub mod scheduler;
pub mod storage;
pub mod testing;
pub mod transfer;

pub use engine::MemoryEngine;
pub use error::CrossmemError;
