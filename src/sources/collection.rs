//! Shared collection adapter.
//!
//! Works like the GitHub adapter, with two differences: the collection keys
//! its listing by its own type names, and entries carry tags and license
//! data. Type names that do not map to an [`ElementType`] are skipped.

use std::sync::Arc;

use async_trait::async_trait;

use super::matching::{Candidate, QueryMatcher};
use super::{keep_best, ElementSource, SourceQuery, SourceStatus};
use crate::cache::{BoundedCache, CachedIndex};
use crate::error::IndexError;
use crate::provider::{CollectionIndex, CollectionIndexEntry, CollectionIndexSnapshot, Freshness};
use crate::types::{ElementType, EntryOrigin, Source, UnifiedIndexEntry, UnifiedSearchResult};

/// Key of the collection snapshot in the `index` cache.
pub const CACHE_KEY: &str = "collection";

/// Adapter over a [`CollectionIndex`].
pub struct CollectionSource {
    index: Arc<dyn CollectionIndex>,
    cache: Arc<BoundedCache<CachedIndex>>,
}

impl CollectionSource {
    pub fn new(index: Arc<dyn CollectionIndex>, cache: Arc<BoundedCache<CachedIndex>>) -> Self {
        Self { index, cache }
    }

    async fn fetch(&self) -> Result<Arc<CollectionIndexSnapshot>, IndexError> {
        let snapshot = self.index.index(Freshness::Current).await?;
        self.cache
            .insert(
                CACHE_KEY.to_string(),
                CachedIndex::Collection(Arc::clone(&snapshot)),
            )
            .await;
        Ok(snapshot)
    }

    async fn snapshot(
        &self,
        freshness: Freshness,
    ) -> Result<Arc<CollectionIndexSnapshot>, IndexError> {
        if let Some(CachedIndex::Collection(snapshot)) = self.cache.get(CACHE_KEY).await {
            return Ok(snapshot);
        }
        match freshness {
            Freshness::Current => self.fetch().await,
            Freshness::AcceptStale => self.index.index(Freshness::AcceptStale).await,
        }
    }
}

#[async_trait]
impl ElementSource for CollectionSource {
    fn kind(&self) -> Source {
        Source::Collection
    }

    async fn search(
        &self,
        query: &str,
        limits: &SourceQuery,
        freshness: Freshness,
    ) -> Result<Vec<UnifiedSearchResult>, IndexError> {
        let snapshot = self.snapshot(freshness).await?;
        let matcher = QueryMatcher::new(query);
        let mut results = Vec::new();

        for (type_name, entries) in &snapshot.index_by_type {
            let Ok(element_type) = type_name.parse::<ElementType>() else {
                tracing::debug!(type_name = %type_name, "skipping unknown collection element type");
                continue;
            };
            if limits.element_type.is_some_and(|wanted| wanted != element_type) {
                continue;
            }
            for entry in entries {
                let candidate = Candidate {
                    name: &entry.name,
                    description: entry.description.as_deref(),
                    tags: &entry.tags,
                    path: &entry.path,
                };
                if let Some((match_type, score)) = matcher.score(&candidate) {
                    results.push(UnifiedSearchResult::new(
                        to_unified(entry, element_type),
                        match_type,
                        score,
                    ));
                }
            }
        }

        keep_best(&mut results, limits.max_results);
        Ok(results)
    }

    async fn invalidate_after_action(&self, action: &str) -> Result<(), IndexError> {
        tracing::debug!(action, "clearing collection cache after action");
        self.cache.remove(CACHE_KEY).await;
        self.index.clear_cache().await;
        Ok(())
    }

    async fn rebuild(&self) -> Result<(), IndexError> {
        self.cache.remove(CACHE_KEY).await;
        self.index.clear_cache().await;
        self.fetch().await.map(|_| ())
    }

    async fn status(&self) -> SourceStatus {
        SourceStatus::Collection(self.index.cache_stats())
    }
}

fn to_unified(entry: &CollectionIndexEntry, element_type: ElementType) -> UnifiedIndexEntry {
    UnifiedIndexEntry {
        name: entry.name.clone(),
        description: entry.description.clone(),
        version: entry.version.clone(),
        author: entry.author.clone(),
        element_type,
        last_modified: entry.created,
        origin: EntryOrigin::Collection {
            path: entry.path.clone(),
            sha: entry.sha.clone(),
            tags: entry.tags.clone(),
            license: entry.license.clone(),
        },
    }
}
