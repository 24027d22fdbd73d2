//! Per-source usage telemetry.
//!
//! Every native source search, successful or not, is recorded with its
//! result count and duration. [`SourceTelemetry::snapshot`] derives averages
//! and the most-used and fastest sources from the raw counters.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Source;

#[derive(Debug, Clone, Copy, Default)]
struct SourceUsage {
    searches: u64,
    total_results: u64,
    total_duration: Duration,
    last_used: Option<DateTime<Utc>>,
}

/// Derived usage figures for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceUsageSummary {
    pub source: Source,
    pub searches: u64,
    pub total_results: u64,
    pub average_duration: Duration,
    pub average_results: f64,
    pub last_used: Option<DateTime<Utc>>,
}

/// A point-in-time view of source usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// One row per source that has been searched, in source order.
    pub sources: Vec<SourceUsageSummary>,
    /// The source searched most often. Ties go to the earlier source.
    pub most_used: Option<Source>,
    /// The source with the lowest average duration.
    pub fastest: Option<Source>,
}

impl TelemetrySnapshot {
    pub fn get(&self, source: Source) -> Option<&SourceUsageSummary> {
        self.sources.iter().find(|s| s.source == source)
    }
}

/// Thread-safe per-source usage counters.
#[derive(Debug, Default)]
pub struct SourceTelemetry {
    usage: Mutex<BTreeMap<Source, SourceUsage>>,
}

impl SourceTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one native search against `source`.
    pub fn record(&self, source: Source, result_count: usize, duration: Duration) {
        let mut usage = self.lock();
        let entry = usage.entry(source).or_default();
        entry.searches += 1;
        entry.total_results += result_count as u64;
        entry.total_duration += duration;
        entry.last_used = Some(Utc::now());
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let usage = self.lock();
        let sources: Vec<SourceUsageSummary> = usage
            .iter()
            .filter(|(_, u)| u.searches > 0)
            .map(|(&source, u)| SourceUsageSummary {
                source,
                searches: u.searches,
                total_results: u.total_results,
                average_duration: average_duration(u.total_duration, u.searches),
                average_results: u.total_results as f64 / u.searches as f64,
                last_used: u.last_used,
            })
            .collect();

        let most_used = sources
            .iter()
            .fold(None::<&SourceUsageSummary>, |best, s| match best {
                Some(b) if b.searches >= s.searches => Some(b),
                _ => Some(s),
            })
            .map(|s| s.source);
        let fastest = sources
            .iter()
            .fold(None::<&SourceUsageSummary>, |best, s| match best {
                Some(b) if b.average_duration <= s.average_duration => Some(b),
                _ => Some(s),
            })
            .map(|s| s.source);

        TelemetrySnapshot {
            sources,
            most_used,
            fastest,
        }
    }

    /// Forget all recorded usage.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Source, SourceUsage>> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn average_duration(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(n) if n > 0 => total / n,
        Ok(_) => Duration::ZERO,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}
