//! Data models for arcana.
//!
//! This module contains the core data structures used throughout the system.

mod document;
mod memory;
mod response;

pub use document::{Document, RankingMode, ScoredDocument};
pub use memory::{MemoryStats, MemoryTurn};
pub use response::{AgentOutcome, AgenticResponse, QueryOptions, QueryResponse, ToolCallRecord};
