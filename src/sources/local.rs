//! Local portfolio adapter.
//!
//! The local index does its own matching and scoring; this adapter only
//! reshapes hits. The degraded path asks the index to skip its freshness
//! check and search whatever it has loaded.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ElementSource, SourceQuery, SourceStatus};
use crate::error::IndexError;
use crate::provider::{Freshness, LocalIndex, LocalSearchHit, LocalSearchOptions};
use crate::types::{EntryOrigin, Source, UnifiedIndexEntry, UnifiedSearchResult};

/// Adapter over a [`LocalIndex`].
pub struct LocalSource {
    index: Arc<dyn LocalIndex>,
}

impl LocalSource {
    pub fn new(index: Arc<dyn LocalIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ElementSource for LocalSource {
    fn kind(&self) -> Source {
        Source::Local
    }

    async fn search(
        &self,
        query: &str,
        limits: &SourceQuery,
        freshness: Freshness,
    ) -> Result<Vec<UnifiedSearchResult>, IndexError> {
        let options = LocalSearchOptions {
            element_type: limits.element_type,
            max_results: limits.max_results,
            accept_stale: freshness == Freshness::AcceptStale,
        };
        let hits = self.index.search(query, &options).await?;
        let mut results: Vec<UnifiedSearchResult> = hits.into_iter().map(into_result).collect();
        results.truncate(limits.max_results);
        Ok(results)
    }

    async fn invalidate_after_action(&self, action: &str) -> Result<(), IndexError> {
        tracing::debug!(action, "rebuilding local index after action");
        self.index.rebuild_index().await
    }

    async fn rebuild(&self) -> Result<(), IndexError> {
        self.index.rebuild_index().await
    }

    async fn status(&self) -> SourceStatus {
        match self.index.stats().await {
            Ok(stats) => SourceStatus::Local(stats),
            Err(e) => SourceStatus::Unavailable {
                source: Source::Local,
                message: e.to_string(),
            },
        }
    }
}

fn into_result(hit: LocalSearchHit) -> UnifiedSearchResult {
    let LocalSearchHit {
        entry,
        match_type,
        score,
    } = hit;
    UnifiedSearchResult::new(
        UnifiedIndexEntry {
            name: entry.name,
            description: entry.description,
            version: entry.version,
            author: entry.author,
            element_type: entry.element_type,
            last_modified: entry.last_modified,
            origin: EntryOrigin::Local {
                file_path: entry.file_path,
            },
        },
        match_type,
        score,
    )
}
