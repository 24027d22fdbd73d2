//! Contracts for the index collaborators the orchestrator consumes.
//!
//! Building and walking each index lives outside this crate. The local
//! portfolio indexer, the GitHub portfolio indexer and the collection index
//! client each implement one of the traits below; the orchestrator wraps
//! them in source adapters (see [`crate::sources`]) that turn their native
//! shapes into [`UnifiedSearchResult`](crate::types::UnifiedSearchResult)s.
//!
//! All implementations must be `Send + Sync`; the orchestrator holds them
//! behind `Arc<dyn ...>` and may query several concurrently.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::types::{ElementType, MatchType};

/// How current a remote snapshot has to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Refresh if the collaborator considers its copy stale.
    Current,
    /// Return whatever copy is held, however old. Used by the fallback path.
    AcceptStale,
}

// ---------------------------------------------------------------------------
// Local portfolio
// ---------------------------------------------------------------------------

/// Options passed to [`LocalIndex::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchOptions {
    pub element_type: Option<ElementType>,
    pub max_results: usize,
    /// Skip any freshness check and search the index as it stands.
    pub accept_stale: bool,
}

/// An element file known to the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalIndexEntry {
    pub file_path: PathBuf,
    pub name: String,
    pub element_type: ElementType,
    pub description: Option<String>,
    /// Version from the element's front matter.
    pub version: Option<String>,
    pub author: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A local index hit.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSearchHit {
    pub entry: LocalIndexEntry,
    pub match_type: MatchType,
    pub score: f64,
}

/// Size and freshness of the local index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalIndexStats {
    pub total_elements: usize,
    pub elements_by_type: BTreeMap<ElementType, usize>,
    pub last_built: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

/// The filesystem-backed portfolio index.
#[async_trait]
pub trait LocalIndex: Send + Sync {
    /// Search the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the index cannot be loaded or rebuilt.
    async fn search(
        &self,
        query: &str,
        options: &LocalSearchOptions,
    ) -> Result<Vec<LocalSearchHit>, IndexError>;

    async fn stats(&self) -> Result<LocalIndexStats, IndexError>;

    /// Rebuild the index from disk.
    async fn rebuild_index(&self) -> Result<(), IndexError>;
}

// ---------------------------------------------------------------------------
// GitHub portfolio
// ---------------------------------------------------------------------------

/// An element file in the user's GitHub portfolio repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubIndexEntry {
    pub path: String,
    pub name: String,
    pub element_type: ElementType,
    pub sha: String,
    pub html_url: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// A fetched view of the GitHub portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubIndexSnapshot {
    pub username: String,
    pub repository: String,
    pub elements_by_type: HashMap<ElementType, Vec<GitHubIndexEntry>>,
    pub total_elements: usize,
    pub last_updated: DateTime<Utc>,
}

impl GitHubIndexSnapshot {
    /// `owner/repository`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.username, self.repository)
    }

    pub(crate) fn estimated_bytes(&self) -> usize {
        self.elements_by_type
            .values()
            .flatten()
            .map(|e| {
                std::mem::size_of::<GitHubIndexEntry>()
                    + e.path.len()
                    + e.name.len()
                    + e.sha.len()
                    + e.html_url.len()
                    + e.description.as_ref().map_or(0, String::len)
                    + e.version.as_ref().map_or(0, String::len)
                    + e.author.as_ref().map_or(0, String::len)
            })
            .sum::<usize>()
            + self.username.len()
            + self.repository.len()
            + std::mem::size_of::<Self>()
    }
}

/// Freshness of the GitHub collaborator's own cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GitHubCacheStats {
    pub is_stale: bool,
    pub last_fetch: Option<DateTime<Utc>>,
}

/// The GitHub-backed portfolio index.
#[async_trait]
pub trait GitHubIndex: Send + Sync {
    /// Fetch the portfolio index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the repository cannot be read and, for
    /// [`Freshness::AcceptStale`], no cached copy exists either.
    async fn index(&self, freshness: Freshness) -> Result<Arc<GitHubIndexSnapshot>, IndexError>;

    fn cache_stats(&self) -> GitHubCacheStats;

    /// Mark the cached index dirty after a user action changed the portfolio.
    async fn invalidate_after_action(&self, action: &str);

    async fn clear_cache(&self);
}

// ---------------------------------------------------------------------------
// Shared collection
// ---------------------------------------------------------------------------

/// An element published to the shared collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionIndexEntry {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub sha: Option<String>,
    pub license: Option<String>,
    pub created: DateTime<Utc>,
}

/// A fetched view of the collection index.
///
/// Types are keyed by the collection's own type names, which may include
/// types this crate does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionIndexSnapshot {
    pub index_by_type: HashMap<String, Vec<CollectionIndexEntry>>,
    pub total_elements: usize,
    pub version: String,
}

impl CollectionIndexSnapshot {
    pub(crate) fn estimated_bytes(&self) -> usize {
        self.index_by_type
            .iter()
            .map(|(ty, entries)| {
                ty.len()
                    + entries
                        .iter()
                        .map(|e| {
                            std::mem::size_of::<CollectionIndexEntry>()
                                + e.path.len()
                                + e.name.len()
                                + e.description.as_ref().map_or(0, String::len)
                                + e.version.as_ref().map_or(0, String::len)
                                + e.author.as_ref().map_or(0, String::len)
                                + e.sha.as_ref().map_or(0, String::len)
                                + e.license.as_ref().map_or(0, String::len)
                                + e.tags.iter().map(|t| t.len() + 24).sum::<usize>()
                        })
                        .sum::<usize>()
            })
            .sum::<usize>()
            + self.version.len()
            + std::mem::size_of::<Self>()
    }
}

/// Freshness of the collection collaborator's own cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCacheStats {
    pub is_valid: bool,
    pub has_cache: bool,
    pub age: Option<Duration>,
}

/// The shared-collection index client.
#[async_trait]
pub trait CollectionIndex: Send + Sync {
    /// Fetch the collection index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the index cannot be downloaded and, for
    /// [`Freshness::AcceptStale`], no cached copy exists either.
    async fn index(
        &self,
        freshness: Freshness,
    ) -> Result<Arc<CollectionIndexSnapshot>, IndexError>;

    fn cache_stats(&self) -> CollectionCacheStats;

    async fn clear_cache(&self);
}
