//! Core types for unified index entries, search results and source identity.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// The catalogs a unified search can draw from.
///
/// The derived ordering (`Local < GitHub < Collection`) is the ordering used
/// when sorting results by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The user's local portfolio on disk.
    Local,
    /// The user's GitHub-backed portfolio repository.
    GitHub,
    /// The shared community collection.
    Collection,
}

impl Source {
    /// Returns the canonical lowercase name of this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::GitHub => "github",
            Self::Collection => "collection",
        }
    }

    /// Score multiplier applied to results served from this source's
    /// degraded (stale) path after a primary failure.
    pub fn fallback_factor(&self) -> f64 {
        match self {
            Self::Local => 0.8,
            Self::GitHub => 0.7,
            Self::Collection => 0.6,
        }
    }

    /// Returns all sources in default priority order.
    pub fn all() -> &'static [Source] {
        &[Self::Local, Self::GitHub, Self::Collection]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "github" => Ok(Self::GitHub),
            "collection" => Ok(Self::Collection),
            other => Err(SearchError::Configuration(format!(
                "invalid source '{other}': expected one of local, github, collection"
            ))),
        }
    }
}

/// Kinds of portfolio element that the indexes catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementType {
    #[serde(rename = "personas")]
    Persona,
    #[serde(rename = "skills")]
    Skill,
    #[serde(rename = "templates")]
    Template,
    #[serde(rename = "agents")]
    Agent,
    #[serde(rename = "memories")]
    Memory,
    #[serde(rename = "ensembles")]
    Ensemble,
}

impl ElementType {
    /// Plural directory-style name (`personas`, `skills`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "personas",
            Self::Skill => "skills",
            Self::Template => "templates",
            Self::Agent => "agents",
            Self::Memory => "memories",
            Self::Ensemble => "ensembles",
        }
    }

    pub fn all() -> &'static [ElementType] {
        &[
            Self::Persona,
            Self::Skill,
            Self::Template,
            Self::Agent,
            Self::Memory,
            Self::Ensemble,
        ]
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = SearchError;

    /// Accepts singular or plural names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persona" | "personas" => Ok(Self::Persona),
            "skill" | "skills" => Ok(Self::Skill),
            "template" | "templates" => Ok(Self::Template),
            "agent" | "agents" => Ok(Self::Agent),
            "memory" | "memories" => Ok(Self::Memory),
            "ensemble" | "ensembles" => Ok(Self::Ensemble),
            other => Err(SearchError::Configuration(format!(
                "unknown element type '{other}'"
            ))),
        }
    }
}

/// Where an entry came from, with the fields only that source knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum EntryOrigin {
    /// An element file in the local portfolio.
    Local {
        /// Absolute path of the element file.
        file_path: PathBuf,
    },
    /// An element in the user's GitHub portfolio repository.
    #[serde(rename = "github")]
    GitHub {
        /// Path inside the repository.
        path: String,
        /// Git blob SHA of the element file.
        sha: String,
        /// Browser URL of the element file.
        html_url: String,
        /// `owner/repository` the element lives in.
        repository: String,
    },
    /// An element published to the shared collection.
    Collection {
        /// Path inside the collection repository.
        path: String,
        /// Git blob SHA, when the collection index records one.
        sha: Option<String>,
        /// Free-form discovery tags.
        tags: Vec<String>,
        /// SPDX license identifier, when declared.
        license: Option<String>,
    },
}

impl EntryOrigin {
    /// The source tag for this origin.
    pub fn source(&self) -> Source {
        match self {
            Self::Local { .. } => Source::Local,
            Self::GitHub { .. } => Source::GitHub,
            Self::Collection { .. } => Source::Collection,
        }
    }

    /// A human-readable location for logs and reports.
    pub fn location(&self) -> String {
        match self {
            Self::Local { file_path } => file_path.display().to_string(),
            Self::GitHub {
                path, repository, ..
            } => format!("{repository}:{path}"),
            Self::Collection { path, .. } => path.clone(),
        }
    }
}

/// A catalog entry normalised across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedIndexEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub element_type: ElementType,
    pub last_modified: DateTime<Utc>,
    /// Source-specific fields, tagged by `source`.
    #[serde(flatten)]
    pub origin: EntryOrigin,
}

impl UnifiedIndexEntry {
    /// Which source produced this entry.
    pub fn source(&self) -> Source {
        self.origin.source()
    }

    /// Rough heap footprint, used to weigh cache entries.
    pub(crate) fn estimated_bytes(&self) -> usize {
        let optional = |s: &Option<String>| s.as_ref().map_or(0, String::len);
        let origin = match &self.origin {
            EntryOrigin::Local { file_path } => file_path.as_os_str().len(),
            EntryOrigin::GitHub {
                path,
                sha,
                html_url,
                repository,
            } => path.len() + sha.len() + html_url.len() + repository.len(),
            EntryOrigin::Collection {
                path,
                sha,
                tags,
                license,
            } => {
                path.len()
                    + optional(sha)
                    + optional(license)
                    + tags.iter().map(|t| t.len() + 24).sum::<usize>()
            }
        };
        std::mem::size_of::<Self>()
            + self.name.len()
            + optional(&self.description)
            + optional(&self.version)
            + optional(&self.author)
            + origin
    }
}

/// Which part of an entry matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Name,
    Description,
    Tag,
    Keyword,
    Path,
    Content,
}

/// Disagreement about an element's version across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConflict {
    /// The version each source reports for the element.
    pub versions: BTreeMap<Source, String>,
    /// The source whose copy should be preferred.
    pub recommended: Source,
    /// Which resolution rule picked `recommended`, in plain words.
    pub reason: String,
}

/// A single ranked hit returned from [`crate::UnifiedSearch::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSearchResult {
    pub entry: UnifiedIndexEntry,
    pub match_type: MatchType,
    /// Relevance score (higher is better).
    pub score: f64,
    /// Set when another source holds an element with the same type and name.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_conflict: Option<VersionConflict>,
    /// Opaque continuation token, only set in streaming mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl UnifiedSearchResult {
    /// Wrap an entry as a fresh, unflagged result.
    pub fn new(entry: UnifiedIndexEntry, match_type: MatchType, score: f64) -> Self {
        Self {
            entry,
            match_type,
            score,
            is_duplicate: false,
            version_conflict: None,
            cursor: None,
        }
    }

    pub fn source(&self) -> Source {
        self.entry.source()
    }

    pub(crate) fn estimated_bytes(&self) -> usize {
        let conflict = self.version_conflict.as_ref().map_or(0, |c| {
            c.reason.len() + c.versions.values().map(|v| v.len() + 16).sum::<usize>()
        });
        self.entry.estimated_bytes()
            + conflict
            + self.cursor.as_ref().map_or(0, String::len)
            + 32
    }
}

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Score, highest first.
    #[default]
    Relevance,
    /// Local, then GitHub, then collection.
    Source,
    /// Case-insensitive name, ascending.
    Name,
    /// Semantic version, newest first.
    Version,
}
