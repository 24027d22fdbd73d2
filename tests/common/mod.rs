//! In-memory collaborators for orchestrator integration tests.
//!
//! Each mock counts its calls and can be told to fail fresh reads, stale
//! reads or rebuilds, so tests can observe short-circuiting, caching and
//! fallback behaviour without any real index.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use unified_index::provider::{
    CollectionCacheStats, CollectionIndex, CollectionIndexEntry, CollectionIndexSnapshot,
    Freshness, GitHubCacheStats, GitHubIndex, GitHubIndexEntry, GitHubIndexSnapshot, LocalIndex,
    LocalIndexEntry, LocalIndexStats, LocalSearchHit, LocalSearchOptions,
};
use unified_index::{ElementType, IndexError, MatchType};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn matches_query(query: &str, name: &str) -> bool {
    let name = name.to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .any(|term| name.contains(term))
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

pub fn local_hit(name: &str, version: Option<&str>, score: f64, age_days: i64) -> LocalSearchHit {
    LocalSearchHit {
        entry: LocalIndexEntry {
            file_path: format!(
                "/home/user/.dollhouse/portfolio/personas/{}.md",
                name.to_lowercase().replace(' ', "-")
            )
            .into(),
            name: name.into(),
            element_type: ElementType::Persona,
            description: Some(format!("{name} persona")),
            version: version.map(str::to_string),
            author: Some("user".into()),
            last_modified: Utc::now() - ChronoDuration::days(age_days),
        },
        match_type: MatchType::Name,
        score,
    }
}

#[derive(Default)]
pub struct MockLocal {
    pub hits: Vec<LocalSearchHit>,
    pub fail_primary: AtomicBool,
    pub fail_stale: AtomicBool,
    pub fail_rebuild: AtomicBool,
    pub searches: AtomicUsize,
    pub rebuilds: AtomicUsize,
    pub seen: Mutex<Vec<LocalSearchOptions>>,
}

impl MockLocal {
    pub fn with_hits(hits: Vec<LocalSearchHit>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            ..Default::default()
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalIndex for MockLocal {
    async fn search(
        &self,
        query: &str,
        options: &LocalSearchOptions,
    ) -> Result<Vec<LocalSearchHit>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(options.clone());
        let failing = if options.accept_stale {
            &self.fail_stale
        } else {
            &self.fail_primary
        };
        if failing.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("local index corrupt".into()));
        }
        Ok(self
            .hits
            .iter()
            .filter(|h| matches_query(query, &h.entry.name))
            .filter(|h| options.element_type.map_or(true, |t| t == h.entry.element_type))
            .take(options.max_results)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<LocalIndexStats, IndexError> {
        Ok(LocalIndexStats {
            total_elements: self.hits.len(),
            elements_by_type: Default::default(),
            last_built: Some(Utc::now()),
            is_stale: false,
        })
    }

    async fn rebuild_index(&self) -> Result<(), IndexError> {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        if self.fail_rebuild.load(Ordering::SeqCst) {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "portfolio not readable",
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

pub fn github_entry(name: &str, version: Option<&str>) -> GitHubIndexEntry {
    let slug = name.to_lowercase().replace(' ', "-");
    GitHubIndexEntry {
        path: format!("personas/{slug}.md"),
        name: name.into(),
        element_type: ElementType::Persona,
        sha: format!("sha-{slug}"),
        html_url: format!("https://github.com/user/dollhouse-portfolio/blob/main/personas/{slug}.md"),
        description: None,
        version: version.map(str::to_string),
        author: Some("user".into()),
        last_modified: Utc::now() - ChronoDuration::days(30),
        size: 1024,
    }
}

#[derive(Default)]
pub struct MockGitHub {
    pub entries: Vec<GitHubIndexEntry>,
    pub fail_current: AtomicBool,
    pub fail_stale: AtomicBool,
    pub current_calls: AtomicUsize,
    pub stale_calls: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub clears: AtomicUsize,
}

impl MockGitHub {
    pub fn with_entries(entries: Vec<GitHubIndexEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            ..Default::default()
        })
    }

    pub fn fetches(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> GitHubIndexSnapshot {
        let mut elements_by_type: HashMap<ElementType, Vec<GitHubIndexEntry>> = HashMap::new();
        for entry in &self.entries {
            elements_by_type
                .entry(entry.element_type)
                .or_default()
                .push(entry.clone());
        }
        GitHubIndexSnapshot {
            username: "user".into(),
            repository: "dollhouse-portfolio".into(),
            elements_by_type,
            total_elements: self.entries.len(),
            last_updated: Utc::now(),
        }
    }
}

#[async_trait]
impl GitHubIndex for MockGitHub {
    async fn index(&self, freshness: Freshness) -> Result<Arc<GitHubIndexSnapshot>, IndexError> {
        let failing = match freshness {
            Freshness::Current => {
                self.current_calls.fetch_add(1, Ordering::SeqCst);
                &self.fail_current
            }
            Freshness::AcceptStale => {
                self.stale_calls.fetch_add(1, Ordering::SeqCst);
                &self.fail_stale
            }
        };
        if failing.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("GitHub API rate limit exceeded".into()));
        }
        Ok(Arc::new(self.snapshot()))
    }

    fn cache_stats(&self) -> GitHubCacheStats {
        GitHubCacheStats {
            is_stale: false,
            last_fetch: Some(Utc::now()),
        }
    }

    async fn invalidate_after_action(&self, _action: &str) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    async fn clear_cache(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

pub fn collection_entry(name: &str, version: Option<&str>, tags: &[&str]) -> CollectionIndexEntry {
    let slug = name.to_lowercase().replace(' ', "-");
    CollectionIndexEntry {
        path: format!("library/personas/{slug}.md"),
        name: name.into(),
        description: Some(format!("Community {name}")),
        version: version.map(str::to_string),
        author: Some("community".into()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        sha: None,
        license: Some("CC-BY-SA-4.0".into()),
        created: Utc::now() - ChronoDuration::days(60),
    }
}

#[derive(Default)]
pub struct MockCollection {
    pub personas: Vec<CollectionIndexEntry>,
    pub fail_current: AtomicBool,
    pub fail_stale: AtomicBool,
    pub current_calls: AtomicUsize,
    pub stale_calls: AtomicUsize,
    pub clears: AtomicUsize,
}

impl MockCollection {
    pub fn with_personas(personas: Vec<CollectionIndexEntry>) -> Arc<Self> {
        Arc::new(Self {
            personas,
            ..Default::default()
        })
    }

    pub fn fetches(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionIndex for MockCollection {
    async fn index(
        &self,
        freshness: Freshness,
    ) -> Result<Arc<CollectionIndexSnapshot>, IndexError> {
        let failing = match freshness {
            Freshness::Current => {
                self.current_calls.fetch_add(1, Ordering::SeqCst);
                &self.fail_current
            }
            Freshness::AcceptStale => {
                self.stale_calls.fetch_add(1, Ordering::SeqCst);
                &self.fail_stale
            }
        };
        if failing.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("collection index download failed".into()));
        }
        Ok(Arc::new(CollectionIndexSnapshot {
            index_by_type: HashMap::from([("personas".to_string(), self.personas.clone())]),
            total_elements: self.personas.len(),
            version: "2.0.0".into(),
        }))
    }

    fn cache_stats(&self) -> CollectionCacheStats {
        CollectionCacheStats {
            is_valid: true,
            has_cache: true,
            age: Some(Duration::from_secs(60)),
        }
    }

    async fn clear_cache(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}
