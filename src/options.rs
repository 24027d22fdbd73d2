//! Per-call search options.

use serde::{Deserialize, Serialize};

use crate::types::{ElementType, SortBy, Source};

/// Default page size when a call does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Options for a single [`crate::UnifiedSearch::search`] call.
///
/// Use [`UnifiedSearchOptions::new`] for the defaults (local and GitHub
/// enabled, collection disabled, relevance order, first page of 20) and
/// override fields with struct update syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedSearchOptions {
    pub query: String,
    pub include_local: bool,
    pub include_github: bool,
    pub include_collection: bool,
    /// Only return elements of this type.
    pub element_type: Option<ElementType>,
    /// 1-based page number. `None` or `Some(0)` means the first page.
    pub page: Option<usize>,
    /// Page size. `None` or `Some(0)` means [`DEFAULT_PAGE_SIZE`].
    pub page_size: Option<usize>,
    pub sort_by: SortBy,
    /// Produce results source by source with cursors instead of ranking them.
    pub stream_results: bool,
    /// Resume a stream after the result that carried this cursor.
    pub cursor: Option<String>,
    /// Per-source cap, and the total cap in streaming mode.
    pub max_results: Option<usize>,
    /// Query every enabled source even when `stop_on_first` is configured.
    pub include_all: bool,
    /// Consult this source first, then the default order.
    pub preferred_source: Option<Source>,
    /// Replace the configured source order outright.
    pub source_priority: Option<Vec<Source>>,
}

impl Default for UnifiedSearchOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            include_local: true,
            include_github: true,
            include_collection: false,
            element_type: None,
            page: None,
            page_size: None,
            sort_by: SortBy::Relevance,
            stream_results: false,
            cursor: None,
            max_results: None,
            include_all: false,
            preferred_source: None,
            source_priority: None,
        }
    }
}

impl UnifiedSearchOptions {
    /// Default options for `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Enable every source and disable the short-circuit.
    pub fn everywhere(query: impl Into<String>) -> Self {
        Self {
            include_collection: true,
            include_all: true,
            ..Self::new(query)
        }
    }

    /// Whether the per-call flags enable `source`.
    pub fn includes(&self, source: Source) -> bool {
        match source {
            Source::Local => self.include_local,
            Source::GitHub => self.include_github,
            Source::Collection => self.include_collection,
        }
    }

    pub fn effective_page(&self) -> usize {
        self.page.filter(|&p| p > 0).unwrap_or(1)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.filter(|&s| s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }
}
