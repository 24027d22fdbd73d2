//! # unified-index
//!
//! One queryable view over three element catalogs: the local portfolio on
//! disk, the user's GitHub portfolio repository and the shared community
//! collection.
//!
//! The catalogs themselves are external collaborators implementing the
//! traits in [`provider`]. This crate decides which of them to ask, in what
//! order, what to do when one fails, and how to merge what they return.
//!
//! ## Design
//!
//! - Sources are consulted in a configurable priority order; by default the
//!   first source that answers ends the search
//! - A failing source is re-queried against its stale data, with scores
//!   de-rated, instead of failing the search
//! - Exact name matches and newer versions rank higher; the source never does
//! - Elements present in several catalogs are flagged, and version
//!   disagreements come with a recommended copy
//! - Result pages and remote index snapshots are held in bounded, TTL'd caches
//! - Results can be streamed with resumable cursors
//!
//! ## Security
//!
//! - Queries are Unicode-normalised before use; zero-width, bidi-control and
//!   other control characters are stripped and reported on the
//!   `unified_index::audit` tracing target
//! - Search queries are logged only at trace level
//! - No network listeners: this is a library, not a server
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn example(
//! #     local: Arc<dyn unified_index::provider::LocalIndex>,
//! #     github: Arc<dyn unified_index::provider::GitHubIndex>,
//! # ) -> unified_index::Result<()> {
//! use unified_index::{OrchestratorConfig, UnifiedSearch, UnifiedSearchOptions};
//!
//! let search = UnifiedSearch::builder(OrchestratorConfig::default())
//!     .local(local)
//!     .github(github)
//!     .build()?;
//!
//! for result in search.search(&UnifiedSearchOptions::new("creative writer")).await? {
//!     println!("{} ({}) {:.2}", result.entry.name, result.source(), result.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod monitor;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod provider;
pub mod sources;
pub mod telemetry;
pub mod types;
pub mod version;

pub use config::{CacheLimits, OrchestratorConfig, SourcePriorityConfig};
pub use error::{IndexError, Result, SearchError};
pub use options::UnifiedSearchOptions;
pub use orchestrator::{DuplicateReport, UnifiedIndexStats, UnifiedSearch, UnifiedSearchBuilder};
pub use types::{
    ElementType, EntryOrigin, MatchType, SortBy, Source, UnifiedIndexEntry, UnifiedSearchResult,
    VersionConflict,
};
