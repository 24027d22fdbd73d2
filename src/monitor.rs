//! Performance monitoring hooks and resident-memory probing.
//!
//! The [`PerformanceMonitor`] trait lets the owning application forward
//! search metrics to whatever backend it uses, while keeping the
//! orchestrator decoupled from any specific metrics system. The default
//! [`NoopMonitor`] does nothing.
//!
//! # Thread Safety
//!
//! All methods take `&self` so a single monitor can be shared by concurrent
//! searches. Implementors should use interior mutability as needed.

use std::time::Duration;

/// Measurements for one completed [`crate::UnifiedSearch::search`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMetrics {
    /// Wall time from entry to return.
    pub duration: Duration,
    /// Number of results returned to the caller (after pagination).
    pub result_count: usize,
    /// Sources whose native search was invoked. Zero on a cache hit.
    pub sources_queried: usize,
    pub cache_hit: bool,
    /// Change in resident memory across the call, when the probe can tell.
    pub memory_delta_bytes: Option<i64>,
}

/// Sink for orchestrator performance metrics.
pub trait PerformanceMonitor: Send + Sync {
    /// Record a completed search.
    fn record_search(&self, metrics: &SearchMetrics);

    /// Record a lookup served from the named cache.
    fn record_cache_hit(&self, cache: &str);

    /// Record a lookup that missed the named cache.
    fn record_cache_miss(&self, cache: &str);
}

/// No-op monitor (default implementation).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl PerformanceMonitor for NoopMonitor {
    fn record_search(&self, _metrics: &SearchMetrics) {
        // No-op
    }

    fn record_cache_hit(&self, _cache: &str) {
        // No-op
    }

    fn record_cache_miss(&self, _cache: &str) {
        // No-op
    }
}

/// Reports the current process's resident memory.
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in bytes, or `None` when the platform cannot tell.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads resident memory from the operating system.
///
/// Uses platform-specific sources:
/// - Linux: `VmRSS` in `/proc/self/status`
/// - macOS: `ps -o rss= -p <pid>`
/// - Other: `None`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn resident_bytes(&self) -> Option<u64> {
        #[cfg(target_os = "linux")]
        {
            linux_resident_bytes()
        }
        #[cfg(target_os = "macos")]
        {
            macos_resident_bytes()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(target_os = "linux")]
fn linux_resident_bytes() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    content
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(parse_kib)
}

#[cfg(target_os = "macos")]
fn macos_resident_bytes() -> Option<u64> {
    let output = std::process::Command::new("ps")
        .args(["-o", "rss=", "-p"])
        .arg(std::process::id().to_string())
        .output()
        .ok()?;
    parse_kib(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `"  12345 kB"` or `"12345"` as KiB and convert to bytes.
#[cfg_attr(not(any(target_os = "macos", target_os = "linux")), allow(dead_code))]
fn parse_kib(raw: &str) -> Option<u64> {
    raw.split_whitespace()
        .next()?
        .parse::<u64>()
        .ok()
        .map(|kib| kib.saturating_mul(1024))
}

/// Signed difference `after - before`, when both readings exist.
pub(crate) fn memory_delta(before: Option<u64>, after: Option<u64>) -> Option<i64> {
    let (before, after) = (before?, after?);
    let delta = i128::from(after) - i128::from(before);
    i64::try_from(delta).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        searches: AtomicUsize,
        hits: AtomicUsize,
        misses: AtomicUsize,
    }

    impl PerformanceMonitor for Counting {
        fn record_search(&self, _metrics: &SearchMetrics) {
            self.searches.fetch_add(1, Ordering::SeqCst);
        }

        fn record_cache_hit(&self, _cache: &str) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn record_cache_miss(&self, _cache: &str) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_monitor_accepts_everything() {
        let monitor = NoopMonitor;
        monitor.record_search(&SearchMetrics {
            duration: Duration::from_millis(5),
            result_count: 3,
            sources_queried: 2,
            cache_hit: false,
            memory_delta_bytes: None,
        });
        monitor.record_cache_hit("search-results");
        monitor.record_cache_miss("search-results");
    }

    #[test]
    fn monitor_is_object_safe() {
        let counting = std::sync::Arc::new(Counting::default());
        let monitor: std::sync::Arc<dyn PerformanceMonitor> = counting.clone();
        monitor.record_cache_miss("index");
        monitor.record_cache_hit("index");
        monitor.record_cache_hit("index");
        assert_eq!(counting.hits.load(Ordering::SeqCst), 2);
        assert_eq!(counting.misses.load(Ordering::SeqCst), 1);
        assert_eq!(counting.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parse_kib_handles_proc_and_ps_formats() {
        assert_eq!(parse_kib("   2048 kB"), Some(2048 * 1024));
        assert_eq!(parse_kib("512\n"), Some(512 * 1024));
        assert_eq!(parse_kib(""), None);
        assert_eq!(parse_kib("lots"), None);
    }

    #[test]
    fn memory_delta_is_signed() {
        assert_eq!(memory_delta(Some(100), Some(150)), Some(50));
        assert_eq!(memory_delta(Some(150), Some(100)), Some(-50));
        assert_eq!(memory_delta(None, Some(100)), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_memory_reports_something_on_linux() {
        let rss = ProcessMemory.resident_bytes();
        assert!(rss.is_some_and(|bytes| bytes > 0));
    }
}
