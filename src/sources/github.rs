//! GitHub portfolio adapter.
//!
//! Fetched snapshots are kept in the orchestrator's `index` cache under
//! [`CACHE_KEY`] so repeated searches within the cache TTL do not go back to
//! the collaborator. The degraded path serves the cached snapshot if there
//! is one, and otherwise asks the collaborator for its own copy regardless
//! of staleness.

use std::sync::Arc;

use async_trait::async_trait;

use super::matching::{Candidate, QueryMatcher};
use super::{keep_best, ElementSource, SourceQuery, SourceStatus};
use crate::cache::{BoundedCache, CachedIndex};
use crate::error::IndexError;
use crate::provider::{Freshness, GitHubIndex, GitHubIndexEntry, GitHubIndexSnapshot};
use crate::types::{EntryOrigin, Source, UnifiedIndexEntry, UnifiedSearchResult};

/// Key of the GitHub snapshot in the `index` cache.
pub const CACHE_KEY: &str = "github";

/// Adapter over a [`GitHubIndex`].
pub struct GitHubSource {
    index: Arc<dyn GitHubIndex>,
    cache: Arc<BoundedCache<CachedIndex>>,
}

impl GitHubSource {
    pub fn new(index: Arc<dyn GitHubIndex>, cache: Arc<BoundedCache<CachedIndex>>) -> Self {
        Self { index, cache }
    }

    async fn cached(&self) -> Option<Arc<GitHubIndexSnapshot>> {
        match self.cache.get(CACHE_KEY).await {
            Some(CachedIndex::GitHub(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    async fn fetch(&self) -> Result<Arc<GitHubIndexSnapshot>, IndexError> {
        let snapshot = self.index.index(Freshness::Current).await?;
        self.cache
            .insert(CACHE_KEY.to_string(), CachedIndex::GitHub(Arc::clone(&snapshot)))
            .await;
        Ok(snapshot)
    }

    async fn snapshot(&self, freshness: Freshness) -> Result<Arc<GitHubIndexSnapshot>, IndexError> {
        if let Some(snapshot) = self.cached().await {
            return Ok(snapshot);
        }
        match freshness {
            Freshness::Current => self.fetch().await,
            Freshness::AcceptStale => self.index.index(Freshness::AcceptStale).await,
        }
    }
}

#[async_trait]
impl ElementSource for GitHubSource {
    fn kind(&self) -> Source {
        Source::GitHub
    }

    async fn search(
        &self,
        query: &str,
        limits: &SourceQuery,
        freshness: Freshness,
    ) -> Result<Vec<UnifiedSearchResult>, IndexError> {
        let snapshot = self.snapshot(freshness).await?;
        let matcher = QueryMatcher::new(query);
        let repository = snapshot.full_name();

        let mut results: Vec<UnifiedSearchResult> = snapshot
            .elements_by_type
            .iter()
            .filter(|(ty, _)| limits.element_type.map_or(true, |wanted| wanted == **ty))
            .flat_map(|(_, entries)| entries)
            .filter_map(|entry| {
                let candidate = Candidate {
                    name: &entry.name,
                    description: entry.description.as_deref(),
                    tags: &[],
                    path: &entry.path,
                };
                let (match_type, score) = matcher.score(&candidate)?;
                Some(UnifiedSearchResult::new(
                    to_unified(entry, &repository),
                    match_type,
                    score,
                ))
            })
            .collect();

        keep_best(&mut results, limits.max_results);
        Ok(results)
    }

    async fn invalidate_after_action(&self, action: &str) -> Result<(), IndexError> {
        self.cache.remove(CACHE_KEY).await;
        self.index.invalidate_after_action(action).await;
        Ok(())
    }

    async fn rebuild(&self) -> Result<(), IndexError> {
        self.cache.remove(CACHE_KEY).await;
        self.index.clear_cache().await;
        self.fetch().await.map(|_| ())
    }

    async fn status(&self) -> SourceStatus {
        SourceStatus::GitHub(self.index.cache_stats())
    }
}

fn to_unified(entry: &GitHubIndexEntry, repository: &str) -> UnifiedIndexEntry {
    UnifiedIndexEntry {
        name: entry.name.clone(),
        description: entry.description.clone(),
        version: entry.version.clone(),
        author: entry.author.clone(),
        element_type: entry.element_type,
        last_modified: entry.last_modified,
        origin: EntryOrigin::GitHub {
            path: entry.path.clone(),
            sha: entry.sha.clone(),
            html_url: entry.html_url.clone(),
            repository: repository.to_string(),
        },
    }
}
