//! Core search orchestrator: priority-ordered fan-out, fallback, rank, dedup, page.
//!
//! Queries the enabled sources in priority order. With `stop_on_first` the
//! sources are tried one at a time and the first primary answer ends the
//! search; otherwise all of them are queried with bounded concurrency and
//! their answers combined in priority order. The combined results are
//! ranked, checked for duplicates, sorted, paginated and cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_stream::try_stream;
use chrono::Utc;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::cache::{
    log_eviction, search_cache_key, CacheStats, EvictionCallback, SearchCaches,
    SEARCH_RESULTS_CACHE,
};
use crate::config::OrchestratorConfig;
use crate::error::{Result, SearchError};
use crate::monitor::{
    memory_delta, MemoryProbe, NoopMonitor, PerformanceMonitor, ProcessMemory, SearchMetrics,
};
use crate::normalize::normalize_query;
use crate::options::UnifiedSearchOptions;
use crate::provider::{CollectionIndex, GitHubIndex, LocalIndex};
use crate::sources::{
    CollectionSource, ElementSource, GitHubSource, LocalSource, SourceQuery, SourceStatus,
};
use crate::telemetry::{SourceTelemetry, TelemetrySnapshot};
use crate::types::{ElementType, Source, UnifiedSearchResult};

use super::cursor::StreamCursor;
use super::dedup::{duplicate_reports, mark_duplicates, DuplicateReport};
use super::fallback::{search_with_fallback, SourceOutcome};
use super::paging::{paginate, sort_results};
use super::scoring::rank_results;

/// `(include_local, include_github, include_collection)`.
type SourceFlags = (bool, bool, bool);

/// Combined health and usage figures for a [`UnifiedSearch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedIndexStats {
    /// One entry per registered source, in default priority order.
    pub sources: Vec<SourceStatus>,
    pub results_cache: CacheStats,
    pub index_cache: CacheStats,
    pub telemetry: TelemetrySnapshot,
}

/// Builder for [`UnifiedSearch`].
///
/// Register the collaborators that exist; a source without a collaborator
/// is treated as unavailable and skipped by every search.
pub struct UnifiedSearchBuilder {
    config: OrchestratorConfig,
    local: Option<Arc<dyn LocalIndex>>,
    github: Option<Arc<dyn GitHubIndex>>,
    collection: Option<Arc<dyn CollectionIndex>>,
    monitor: Arc<dyn PerformanceMonitor>,
    memory: Arc<dyn MemoryProbe>,
    on_evict: EvictionCallback,
}

impl UnifiedSearchBuilder {
    pub fn local(mut self, index: Arc<dyn LocalIndex>) -> Self {
        self.local = Some(index);
        self
    }

    pub fn github(mut self, index: Arc<dyn GitHubIndex>) -> Self {
        self.github = Some(index);
        self
    }

    pub fn collection(mut self, index: Arc<dyn CollectionIndex>) -> Self {
        self.collection = Some(index);
        self
    }

    /// Replace the default [`NoopMonitor`].
    pub fn monitor(mut self, monitor: Arc<dyn PerformanceMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the default [`ProcessMemory`] probe.
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Observe cache evictions. The default logs them at debug level.
    pub fn on_evict(mut self, callback: EvictionCallback) -> Self {
        self.on_evict = callback;
        self
    }

    /// Validate the configuration and assemble the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Configuration`] if the configuration is invalid.
    pub fn build(self) -> Result<UnifiedSearch> {
        self.config.validate()?;

        let caches = SearchCaches::new(
            self.config.results_cache,
            self.config.index_cache,
            self.on_evict,
        );
        let mut sources: Vec<Arc<dyn ElementSource>> = Vec::new();
        if let Some(index) = self.local {
            sources.push(Arc::new(LocalSource::new(index)));
        }
        if let Some(index) = self.github {
            sources.push(Arc::new(GitHubSource::new(index, Arc::clone(&caches.index))));
        }
        if let Some(index) = self.collection {
            sources.push(Arc::new(CollectionSource::new(
                index,
                Arc::clone(&caches.index),
            )));
        }

        tracing::info!(
            sources = ?sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            priority = ?self.config.source_priority.priority(),
            stop_on_first = self.config.source_priority.stop_on_first(),
            fallback_on_error = self.config.source_priority.fallback_on_error(),
            "unified search ready"
        );

        Ok(UnifiedSearch {
            config: self.config,
            sources,
            caches,
            telemetry: SourceTelemetry::new(),
            monitor: self.monitor,
            memory: self.memory,
            availability: Mutex::new(HashMap::new()),
        })
    }
}

/// Searches the local portfolio, the GitHub portfolio and the shared
/// collection as one catalog.
///
/// Construct one per application with [`UnifiedSearch::builder`] and share
/// it by reference or `Arc`; every method takes `&self`.
pub struct UnifiedSearch {
    config: OrchestratorConfig,
    sources: Vec<Arc<dyn ElementSource>>,
    caches: SearchCaches,
    telemetry: SourceTelemetry,
    monitor: Arc<dyn PerformanceMonitor>,
    memory: Arc<dyn MemoryProbe>,
    availability: Mutex<HashMap<(Source, SourceFlags), bool>>,
}

impl std::fmt::Debug for UnifiedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedSearch")
            .field("config", &self.config)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .field("caches", &self.caches)
            .finish_non_exhaustive()
    }
}

impl UnifiedSearch {
    pub fn builder(config: OrchestratorConfig) -> UnifiedSearchBuilder {
        UnifiedSearchBuilder {
            config,
            local: None,
            github: None,
            collection: None,
            monitor: Arc::new(NoopMonitor),
            memory: Arc::new(ProcessMemory),
            on_evict: log_eviction(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Search every enabled source.
    ///
    /// # Pipeline
    ///
    /// 1. Normalise the query; an empty query returns no results
    /// 2. Serve the page from the results cache when possible
    /// 3. Order and filter sources by priority, per-call overrides and flags
    /// 4. Query them (sequentially with `stop_on_first`, else concurrently)
    /// 5. Rank, flag duplicates and version conflicts, sort
    /// 6. Paginate and cache the page
    ///
    /// With `stream_results` set, steps 2, 5 and 6 are skipped and the
    /// streamed results are collected instead; see [`UnifiedSearch::search_stream`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::System`] wrapping the cause when a source fails
    /// with fallback disabled, or when a streaming cursor is invalid.
    pub async fn search(&self, options: &UnifiedSearchOptions) -> Result<Vec<UnifiedSearchResult>> {
        self.search_inner(options)
            .await
            .map_err(|e| SearchError::system("search", e))
    }

    async fn search_inner(&self, options: &UnifiedSearchOptions) -> Result<Vec<UnifiedSearchResult>> {
        let started = Instant::now();
        let memory_before = self.memory.resident_bytes();

        let query = self.normalize(&options.query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if options.stream_results {
            let queried = AtomicUsize::new(0);
            let results: Vec<UnifiedSearchResult> = self
                .stream_normalized(query, options.clone(), Some(&queried))
                .try_collect()
                .await?;
            self.record_metrics(
                started,
                memory_before,
                results.len(),
                queried.load(Ordering::Relaxed),
                false,
            );
            return Ok(results);
        }

        let key = search_cache_key(&query, options);
        if let Some(page) = self.caches.results.get(&key).await {
            tracing::trace!(query = %query, count = page.len(), "search served from cache");
            self.monitor.record_cache_hit(SEARCH_RESULTS_CACHE);
            self.record_metrics(started, memory_before, page.len(), 0, true);
            return Ok(page);
        }
        self.monitor.record_cache_miss(SEARCH_RESULTS_CACHE);

        let (ranked, queried) = self.gather(&query, options).await?;
        let candidates = ranked.len();
        let page = paginate(
            ranked,
            options.effective_page(),
            options.effective_page_size(),
        );

        if candidates < self.config.cache_candidate_limit {
            self.caches.results.insert(key, page.clone()).await;
        } else {
            tracing::debug!(candidates, "result set too large to cache");
        }

        self.record_metrics(started, memory_before, page.len(), queried, false);
        Ok(page)
    }

    /// Stream results source by source, each carrying a resumable cursor.
    ///
    /// Sources are queried strictly one after another in priority order,
    /// until `max_results` (default `default_max_results`) results have been
    /// produced. Results are not ranked, deduplicated or cached. When
    /// `options.cursor` is set the stream resumes right after the result
    /// that carried it.
    ///
    /// Errors are yielded as [`SearchError::System`].
    pub fn search_stream<'a>(
        &'a self,
        options: &UnifiedSearchOptions,
    ) -> impl Stream<Item = Result<UnifiedSearchResult>> + Send + 'a {
        let query = self.normalize(&options.query);
        self.stream_normalized(query, options.clone(), None)
            .map_err(|e| SearchError::system("search_stream", e))
    }

    fn stream_normalized<'a>(
        &'a self,
        query: String,
        options: UnifiedSearchOptions,
        queried: Option<&'a AtomicUsize>,
    ) -> impl Stream<Item = Result<UnifiedSearchResult>> + Send + 'a {
        try_stream! {
            let resume = options
                .cursor
                .as_deref()
                .map(StreamCursor::decode)
                .transpose()?;
            let cap = options
                .max_results
                .filter(|&m| m > 0)
                .unwrap_or(self.config.default_max_results);
            let limits = self.limits(&options);
            let fallback_on_error = self.config.source_priority.fallback_on_error();
            let order = if query.is_empty() {
                Vec::new()
            } else {
                self.active_sources(&options)
            };

            let mut produced = 0usize;
            let mut seeking = resume.is_some();
            'sources: for source in order {
                if produced >= cap {
                    break;
                }
                let kind = source.kind();
                let start = match resume {
                    Some(cursor) if seeking => {
                        if cursor.source != kind {
                            continue;
                        }
                        seeking = false;
                        cursor.index + 1
                    }
                    _ => 0,
                };

                if let Some(counter) = queried {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                // A resumed source must return everything up to the cursor
                // plus what is still wanted after it.
                let source_limits = SourceQuery {
                    max_results: limits
                        .max_results
                        .max(start.saturating_add(cap - produced)),
                    ..limits
                };
                let outcome = search_with_fallback(
                    source.as_ref(),
                    &self.telemetry,
                    &query,
                    &source_limits,
                    fallback_on_error,
                )
                .await?;
                self.relieve_memory_pressure().await;

                for (index, mut result) in outcome.results.into_iter().enumerate().skip(start) {
                    if produced >= cap {
                        break 'sources;
                    }
                    result.cursor = Some(StreamCursor::new(kind, index).encode());
                    produced += 1;
                    yield result;
                }
            }
        }
    }

    /// The best exact-name match for `name` across every source.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::System`] when a source fails with fallback disabled.
    pub async fn find_by_name(
        &self,
        name: &str,
        element_type: Option<ElementType>,
    ) -> Result<Option<UnifiedSearchResult>> {
        self.exact_matches(name, element_type)
            .await
            .map(|matches| matches.into_iter().next())
            .map_err(|e| SearchError::system("find_by_name", e))
    }

    /// Every place an element named `name` exists more than once.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::System`] when a source fails with fallback disabled.
    pub async fn check_duplicates(
        &self,
        name: &str,
        element_type: Option<ElementType>,
    ) -> Result<Vec<DuplicateReport>> {
        self.exact_matches(name, element_type)
            .await
            .map(|matches| duplicate_reports(&matches))
            .map_err(|e| SearchError::system("check_duplicates", e))
    }

    /// Ranked results from all sources whose name equals `name`.
    async fn exact_matches(
        &self,
        name: &str,
        element_type: Option<ElementType>,
    ) -> Result<Vec<UnifiedSearchResult>> {
        let query = self.normalize(name);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let options = UnifiedSearchOptions {
            element_type,
            ..UnifiedSearchOptions::everywhere(query.clone())
        };
        let wanted = query.to_lowercase();
        let (ranked, _) = self.gather(&query, &options).await?;
        Ok(ranked
            .into_iter()
            .filter(|r| r.entry.name.to_lowercase() == wanted)
            .collect())
    }

    /// Clear both caches and tell every source that `action` changed the
    /// portfolio. Source failures are logged, not returned.
    pub async fn invalidate_after_action(&self, action: &str) {
        tracing::info!(action, "invalidating unified index after action");
        self.caches.clear().await;
        for source in &self.sources {
            if let Err(err) = source.invalidate_after_action(action).await {
                tracing::warn!(
                    source = %source.kind(),
                    action,
                    error = %err,
                    "source invalidation failed"
                );
            }
        }
    }

    /// Clear caches and telemetry, then rebuild every source.
    ///
    /// All sources are rebuilt even if one fails.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::System`] wrapping the first source failure.
    pub async fn rebuild_all(&self) -> Result<()> {
        tracing::info!("rebuilding all unified index sources");
        self.caches.clear().await;
        self.telemetry.reset();

        let outcomes = futures::future::join_all(self.sources.iter().map(|source| async move {
            (source.kind(), source.rebuild().await)
        }))
        .await;

        let mut first_error = None;
        for (kind, outcome) in outcomes {
            if let Err(err) = outcome {
                tracing::warn!(source = %kind, error = %err, "source rebuild failed");
                if first_error.is_none() {
                    first_error = Some(SearchError::source_failure(kind, err));
                }
            }
        }
        match first_error {
            Some(err) => Err(SearchError::system("rebuild_all", err)),
            None => Ok(()),
        }
    }

    pub async fn stats(&self) -> UnifiedIndexStats {
        let sources =
            futures::future::join_all(self.sources.iter().map(|source| source.status())).await;
        UnifiedIndexStats {
            sources,
            results_cache: self.caches.results.stats(),
            index_cache: self.caches.index.stats(),
            telemetry: self.telemetry.snapshot(),
        }
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn reset_telemetry(&self) {
        self.telemetry.reset();
    }

    /// Query, rank, flag and sort; everything short of pagination.
    ///
    /// Returns the sorted candidates and how many sources were queried.
    async fn gather(
        &self,
        query: &str,
        options: &UnifiedSearchOptions,
    ) -> Result<(Vec<UnifiedSearchResult>, usize)> {
        let sources = self.active_sources(options);
        let limits = self.limits(options);
        let stop_on_first = self.config.source_priority.stop_on_first() && !options.include_all;

        let (mut results, queried) = if stop_on_first {
            self.query_until_first(&sources, query, &limits).await?
        } else {
            self.query_all(&sources, query, &limits).await?
        };

        rank_results(&mut results, query, self.config.yield_every).await;
        mark_duplicates(&mut results, Utc::now(), self.config.yield_every).await;
        sort_results(&mut results, options.sort_by);
        Ok((results, queried))
    }

    async fn query_until_first(
        &self,
        sources: &[Arc<dyn ElementSource>],
        query: &str,
        limits: &SourceQuery,
    ) -> Result<(Vec<UnifiedSearchResult>, usize)> {
        let fallback_on_error = self.config.source_priority.fallback_on_error();
        let mut combined = Vec::new();
        let mut queried = 0;
        for source in sources {
            queried += 1;
            let outcome = search_with_fallback(
                source.as_ref(),
                &self.telemetry,
                query,
                limits,
                fallback_on_error,
            )
            .await?;
            self.relieve_memory_pressure().await;

            let done = outcome.satisfies_short_circuit();
            combined.extend(outcome.results);
            if done {
                tracing::debug!(source = %outcome.source, "stopping after first source with results");
                break;
            }
        }
        Ok((combined, queried))
    }

    async fn query_all(
        &self,
        sources: &[Arc<dyn ElementSource>],
        query: &str,
        limits: &SourceQuery,
    ) -> Result<(Vec<UnifiedSearchResult>, usize)> {
        let fallback_on_error = self.config.source_priority.fallback_on_error();
        let outcomes: Vec<SourceOutcome> = futures::stream::iter(sources)
            .map(move |source| async move {
                let outcome = search_with_fallback(
                    source.as_ref(),
                    &self.telemetry,
                    query,
                    limits,
                    fallback_on_error,
                )
                .await;
                self.relieve_memory_pressure().await;
                outcome
            })
            .buffered(self.config.max_concurrent_sources)
            .try_collect()
            .await?;

        let combined = outcomes.into_iter().flat_map(|o| o.results).collect();
        Ok((combined, sources.len()))
    }

    /// Source order for this call: explicit override, else preferred source
    /// first, else the configured priority.
    fn effective_order(&self, options: &UnifiedSearchOptions) -> Vec<Source> {
        let mut order: Vec<Source> = match (&options.source_priority, options.preferred_source) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(preferred)) => std::iter::once(preferred)
                .chain(self.config.source_priority.priority().iter().copied())
                .collect(),
            (None, None) => self.config.source_priority.priority().to_vec(),
        };
        let mut seen = Vec::with_capacity(order.len());
        order.retain(|s| {
            let first = !seen.contains(s);
            seen.push(*s);
            first
        });
        order
    }

    fn active_sources(&self, options: &UnifiedSearchOptions) -> Vec<Arc<dyn ElementSource>> {
        self.effective_order(options)
            .into_iter()
            .filter(|&kind| self.is_available(kind, options))
            .filter_map(|kind| self.source(kind).cloned())
            .collect()
    }

    /// Whether `kind` is both enabled by the call's flags and registered.
    ///
    /// Memoised per source and flag combination.
    fn is_available(&self, kind: Source, options: &UnifiedSearchOptions) -> bool {
        let flags = (
            options.include_local,
            options.include_github,
            options.include_collection,
        );
        let mut memo = self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *memo
            .entry((kind, flags))
            .or_insert_with(|| options.includes(kind) && self.source(kind).is_some())
    }

    fn source(&self, kind: Source) -> Option<&Arc<dyn ElementSource>> {
        self.sources.iter().find(|s| s.kind() == kind)
    }

    fn limits(&self, options: &UnifiedSearchOptions) -> SourceQuery {
        SourceQuery {
            element_type: options.element_type,
            max_results: options
                .max_results
                .filter(|&m| m > 0)
                .unwrap_or(self.config.default_max_results),
        }
    }

    /// Canonicalise `raw` and report the outcome on the audit target.
    fn normalize(&self, raw: &str) -> String {
        let normalized = normalize_query(raw);
        if normalized.needs_audit() {
            let issues: Vec<&str> = normalized.issues.iter().map(|i| i.as_str()).collect();
            tracing::warn!(
                target: "unified_index::audit",
                ?issues,
                "search query contained suspicious unicode"
            );
        } else {
            tracing::debug!(
                target: "unified_index::audit",
                modified = normalized.text != raw,
                "search query normalized"
            );
        }
        normalized.text
    }

    /// Clean caches when resident memory is above the configured threshold.
    async fn relieve_memory_pressure(&self) {
        let Some(resident) = self.memory.resident_bytes() else {
            return;
        };
        let threshold = self.config.memory_threshold_bytes();
        if resident > threshold {
            tracing::warn!(resident, threshold, "memory above threshold, cleaning caches");
            self.caches.cleanup().await;
        }
    }

    fn record_metrics(
        &self,
        started: Instant,
        memory_before: Option<u64>,
        result_count: usize,
        sources_queried: usize,
        cache_hit: bool,
    ) {
        let metrics = SearchMetrics {
            duration: started.elapsed(),
            result_count,
            sources_queried,
            cache_hit,
            memory_delta_bytes: memory_delta(memory_before, self.memory.resident_bytes()),
        };
        tracing::debug!(
            duration_ms = metrics.duration.as_millis() as u64,
            result_count,
            sources_queried,
            cache_hit,
            "search complete"
        );
        self.monitor.record_search(&metrics);
    }
}
