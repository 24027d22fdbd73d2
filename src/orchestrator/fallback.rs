//! Per-source search with telemetry and fallback-on-error.
//!
//! A failed primary search either aborts the whole query or, when the
//! priority config allows it, is replaced by the source's degraded path:
//! the same source re-queried with stale data accepted, its scores scaled
//! by [`Source::fallback_factor`]. A failing degraded path yields no
//! results rather than an error.

use std::time::Instant;

use crate::error::SearchError;
use crate::provider::Freshness;
use crate::sources::{ElementSource, SourceQuery};
use crate::telemetry::SourceTelemetry;
use crate::types::{Source, UnifiedSearchResult};

/// What one source contributed to a search.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: Source,
    pub results: Vec<UnifiedSearchResult>,
    /// `false` when the results came from the degraded path.
    pub primary: bool,
}

impl SourceOutcome {
    /// Whether this outcome should end a `stop_on_first` search.
    pub fn satisfies_short_circuit(&self) -> bool {
        self.primary && !self.results.is_empty()
    }
}

/// Search one source, falling back to its degraded path on failure.
///
/// Every primary attempt is recorded in `telemetry`, failures included.
///
/// # Errors
///
/// Returns [`SearchError::Source`] when the primary search fails and
/// `fallback_on_error` is `false`.
pub async fn search_with_fallback(
    source: &dyn ElementSource,
    telemetry: &SourceTelemetry,
    query: &str,
    limits: &SourceQuery,
    fallback_on_error: bool,
) -> Result<SourceOutcome, SearchError> {
    let kind = source.kind();
    let started = Instant::now();
    let primary = source.search(query, limits, Freshness::Current).await;
    let elapsed = started.elapsed();

    match primary {
        Ok(results) => {
            telemetry.record(kind, results.len(), elapsed);
            tracing::debug!(source = %kind, count = results.len(), ?elapsed, "source returned results");
            Ok(SourceOutcome {
                source: kind,
                results,
                primary: true,
            })
        }
        Err(err) => {
            telemetry.record(kind, 0, elapsed);
            if !fallback_on_error {
                tracing::warn!(source = %kind, error = %err, "source search failed");
                return Err(SearchError::source_failure(kind, err));
            }
            tracing::warn!(source = %kind, error = %err, "source search failed, trying stale data");
            Ok(SourceOutcome {
                source: kind,
                results: degraded_search(source, query, limits).await,
                primary: false,
            })
        }
    }
}

/// Re-query `source` accepting stale data and de-rate the scores.
pub async fn degraded_search(
    source: &dyn ElementSource,
    query: &str,
    limits: &SourceQuery,
) -> Vec<UnifiedSearchResult> {
    let kind = source.kind();
    match source.search(query, limits, Freshness::AcceptStale).await {
        Ok(mut results) => {
            let factor = kind.fallback_factor();
            for result in &mut results {
                result.score *= factor;
            }
            tracing::info!(source = %kind, count = results.len(), factor, "served stale results");
            results
        }
        Err(err) => {
            tracing::warn!(source = %kind, error = %err, "fallback search failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::sources::SourceStatus;
    use crate::types::{ElementType, EntryOrigin, MatchType, UnifiedIndexEntry};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Fails on fresh reads; `stale_ok` decides whether stale reads work.
    struct FlakySource {
        kind: Source,
        fail_primary: bool,
        stale_ok: bool,
    }

    fn hit(kind: Source) -> UnifiedSearchResult {
        let origin = match kind {
            Source::Local => EntryOrigin::Local {
                file_path: "/p/writer.md".into(),
            },
            Source::GitHub => EntryOrigin::GitHub {
                path: "personas/writer.md".into(),
                sha: "s".into(),
                html_url: "u".into(),
                repository: "r".into(),
            },
            Source::Collection => EntryOrigin::Collection {
                path: "library/personas/writer.md".into(),
                sha: None,
                tags: vec![],
                license: None,
            },
        };
        UnifiedSearchResult::new(
            UnifiedIndexEntry {
                name: "Writer".into(),
                description: None,
                version: None,
                author: None,
                element_type: ElementType::Persona,
                last_modified: Utc::now(),
                origin,
            },
            MatchType::Name,
            10.0,
        )
    }

    #[async_trait]
    impl ElementSource for FlakySource {
        fn kind(&self) -> Source {
            self.kind
        }

        async fn search(
            &self,
            _query: &str,
            _limits: &SourceQuery,
            freshness: Freshness,
        ) -> Result<Vec<UnifiedSearchResult>, IndexError> {
            let ok = match freshness {
                Freshness::Current => !self.fail_primary,
                Freshness::AcceptStale => self.stale_ok,
            };
            if ok {
                Ok(vec![hit(self.kind)])
            } else {
                Err(IndexError::Unavailable("offline".into()))
            }
        }

        async fn invalidate_after_action(&self, _action: &str) -> Result<(), IndexError> {
            Ok(())
        }

        async fn rebuild(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn status(&self) -> SourceStatus {
            SourceStatus::Unavailable {
                source: self.kind,
                message: "test".into(),
            }
        }
    }

    fn limits() -> SourceQuery {
        SourceQuery {
            element_type: None,
            max_results: 10,
        }
    }

    #[tokio::test]
    async fn primary_success_is_recorded() {
        let source = FlakySource {
            kind: Source::Local,
            fail_primary: false,
            stale_ok: false,
        };
        let telemetry = SourceTelemetry::new();
        let outcome = search_with_fallback(&source, &telemetry, "writer", &limits(), true)
            .await
            .expect("outcome");
        assert!(outcome.primary);
        assert!(outcome.satisfies_short_circuit());
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.get(Source::Local).map(|s| s.total_results), Some(1));
    }

    #[tokio::test]
    async fn fallback_scores_are_de_rated_per_source() {
        for (kind, factor) in [
            (Source::Local, 0.8),
            (Source::GitHub, 0.7),
            (Source::Collection, 0.6),
        ] {
            let source = FlakySource {
                kind,
                fail_primary: true,
                stale_ok: true,
            };
            let telemetry = SourceTelemetry::new();
            let outcome = search_with_fallback(&source, &telemetry, "writer", &limits(), true)
                .await
                .expect("outcome");
            assert!(!outcome.primary);
            assert!(!outcome.satisfies_short_circuit());
            assert!((outcome.results[0].score - 10.0 * factor).abs() < 1e-9);
            assert_eq!(telemetry.snapshot().get(kind).map(|s| s.searches), Some(1));
        }
    }

    #[tokio::test]
    async fn failing_fallback_returns_empty() {
        let source = FlakySource {
            kind: Source::GitHub,
            fail_primary: true,
            stale_ok: false,
        };
        let outcome = search_with_fallback(&source, &SourceTelemetry::new(), "w", &limits(), true)
            .await
            .expect("outcome");
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn disabled_fallback_propagates_source_error() {
        let source = FlakySource {
            kind: Source::Collection,
            fail_primary: true,
            stale_ok: true,
        };
        let err = search_with_fallback(&source, &SourceTelemetry::new(), "w", &limits(), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::Source {
                kind: Source::Collection,
                ..
            }
        ));
    }
}
