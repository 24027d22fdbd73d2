//! Unified search orchestrator: priority fan-out, fallback, ranking, dedup, paging.
//!
//! This module queries the element sources in priority order, replaces
//! failed sources with their stale data, ranks the combined results,
//! flags duplicates and version conflicts across sources, and returns
//! a sorted page or a resumable stream.

pub mod cursor;
pub mod dedup;
pub mod fallback;
pub mod paging;
pub mod scoring;
pub mod search;

pub use dedup::{DuplicateLocation, DuplicateReport};
pub use search::{UnifiedIndexStats, UnifiedSearch, UnifiedSearchBuilder};
