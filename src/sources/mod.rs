//! Source adapters.
//!
//! Each module wraps one collaborator from [`crate::provider`] in an
//! [`ElementSource`], turning its native results into
//! [`UnifiedSearchResult`]s so the orchestrator can treat every catalog the
//! same way.

pub mod collection;
pub mod github;
pub mod local;
pub(crate) mod matching;

pub use collection::CollectionSource;
pub use github::GitHubSource;
pub use local::LocalSource;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::IndexError;
use crate::provider::{CollectionCacheStats, Freshness, GitHubCacheStats, LocalIndexStats};
use crate::types::{ElementType, Source, UnifiedSearchResult};

/// Per-call limits passed to every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
    pub element_type: Option<ElementType>,
    pub max_results: usize,
}

/// Health and freshness reported by one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Local(LocalIndexStats),
    #[serde(rename = "github")]
    GitHub(GitHubCacheStats),
    Collection(CollectionCacheStats),
    /// The collaborator could not report its status.
    Unavailable { source: Source, message: String },
}

/// A searchable catalog, normalised to unified results.
///
/// All implementations must be `Send + Sync` for concurrent source queries.
#[async_trait]
pub trait ElementSource: Send + Sync {
    /// Which [`Source`] this adapter represents.
    fn kind(&self) -> Source;

    /// Search the catalog.
    ///
    /// With [`Freshness::AcceptStale`] the adapter serves whatever data it
    /// can reach without refreshing; this is the degraded path used after a
    /// primary failure.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's [`IndexError`] unchanged.
    async fn search(
        &self,
        query: &str,
        limits: &SourceQuery,
        freshness: Freshness,
    ) -> Result<Vec<UnifiedSearchResult>, IndexError>;

    /// React to a user action that changed the catalog.
    async fn invalidate_after_action(&self, action: &str) -> Result<(), IndexError>;

    /// Discard any cached state and rebuild it before returning.
    async fn rebuild(&self) -> Result<(), IndexError>;

    async fn status(&self) -> SourceStatus;
}

/// Sort by score descending (name as tie-break) and keep the best `max`.
pub(crate) fn keep_best(results: &mut Vec<UnifiedSearchResult>, max: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.name.cmp(&b.entry.name))
    });
    results.truncate(max);
}
