//! Duplicate detection and version-conflict resolution.
//!
//! Results are grouped by element type and lowercased name. Every member of
//! a group with more than one member is flagged as a duplicate; nothing is
//! removed, since each copy lives somewhere different and the caller may
//! want any of them. When a group disagrees about its version, all members
//! share one [`VersionConflict`] naming the copy to prefer:
//!
//! 1. a local copy modified within the last 7 days;
//! 2. otherwise the single copy with the highest semantic version;
//! 3. otherwise the most recently modified copy.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::{ElementType, Source, UnifiedSearchResult, VersionConflict};
use crate::version::{compare_versions, is_known_version};

/// How recently a local edit must have happened to win a conflict outright.
pub const LOCAL_RECENCY_DAYS: i64 = 7;

/// Where one copy of a duplicated element lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateLocation {
    pub source: Source,
    pub version: Option<String>,
    pub location: String,
    pub last_modified: DateTime<Utc>,
}

/// An element that exists in more than one place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub name: String,
    pub element_type: ElementType,
    pub locations: Vec<DuplicateLocation>,
    pub version_conflict: Option<VersionConflict>,
}

/// Indices of results sharing `(element_type, lowercased name)`, in
/// first-seen order. Singletons are included.
fn group_indices(results: &[UnifiedSearchResult]) -> Vec<Vec<usize>> {
    let mut slots: HashMap<(ElementType, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, result) in results.iter().enumerate() {
        let key = (result.entry.element_type, result.entry.name.to_lowercase());
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}

/// Flag duplicates and attach version conflicts in place.
///
/// Yields to the scheduler every `yield_every` groups.
pub async fn mark_duplicates(
    results: &mut [UnifiedSearchResult],
    now: DateTime<Utc>,
    yield_every: usize,
) {
    let yield_every = yield_every.max(1);
    let groups = group_indices(results);
    for (n, group) in groups.iter().filter(|g| g.len() > 1).enumerate() {
        let members: Vec<&UnifiedSearchResult> = group.iter().map(|&i| &results[i]).collect();
        let conflict = detect_conflict(&members, now);
        if let Some(conflict) = &conflict {
            tracing::debug!(
                name = %members[0].entry.name,
                recommended = %conflict.recommended,
                reason = %conflict.reason,
                "version conflict"
            );
        }
        for &i in group {
            results[i].is_duplicate = true;
            results[i].version_conflict = conflict.clone();
        }
        if (n + 1) % yield_every == 0 {
            tokio::task::yield_now().await;
        }
    }
}

/// Build a conflict for a duplicate group, or `None` when fewer than two
/// distinct known versions are present.
pub fn detect_conflict(
    members: &[&UnifiedSearchResult],
    now: DateTime<Utc>,
) -> Option<VersionConflict> {
    let known: Vec<(&UnifiedSearchResult, &str)> = members
        .iter()
        .filter_map(|m| {
            m.entry
                .version
                .as_deref()
                .filter(|v| is_known_version(v))
                .map(|v| (*m, v))
        })
        .collect();

    let distinct: BTreeSet<&str> = known.iter().map(|(_, v)| *v).collect();
    if distinct.len() < 2 {
        return None;
    }

    let mut versions = BTreeMap::new();
    for (member, version) in &known {
        versions
            .entry(member.source())
            .or_insert_with(|| (*version).to_string());
    }

    let (recommended, reason) = resolve(members, &known, now);
    Some(VersionConflict {
        versions,
        recommended,
        reason,
    })
}

fn resolve(
    members: &[&UnifiedSearchResult],
    known: &[(&UnifiedSearchResult, &str)],
    now: DateTime<Utc>,
) -> (Source, String) {
    let recent_cutoff = now - Duration::days(LOCAL_RECENCY_DAYS);
    if members
        .iter()
        .any(|m| m.source() == Source::Local && m.entry.last_modified >= recent_cutoff)
    {
        return (
            Source::Local,
            format!("Local version modified within {LOCAL_RECENCY_DAYS} days"),
        );
    }

    let highest = known
        .iter()
        .max_by(|a, b| compare_versions(Some(a.1), Some(b.1)));
    if let Some(&(best, version)) = highest {
        let ties = known
            .iter()
            .filter(|(_, v)| compare_versions(Some(*v), Some(version)).is_eq())
            .count();
        if ties == 1 {
            return (
                best.source(),
                format!("Highest version ({version}) from {}", best.source()),
            );
        }
    }

    let newest = members
        .iter()
        .max_by_key(|m| m.entry.last_modified)
        .map_or(Source::Local, |m| m.source());
    (newest, format!("Most recently modified ({newest})"))
}

/// Summarise every duplicate group in `results`.
///
/// Expects results that have already been through [`mark_duplicates`].
pub fn duplicate_reports(results: &[UnifiedSearchResult]) -> Vec<DuplicateReport> {
    group_indices(results)
        .into_iter()
        .filter(|g| g.len() > 1)
        .map(|group| {
            let first = &results[group[0]];
            DuplicateReport {
                name: first.entry.name.clone(),
                element_type: first.entry.element_type,
                locations: group
                    .iter()
                    .map(|&i| {
                        let r = &results[i];
                        DuplicateLocation {
                            source: r.source(),
                            version: r.entry.version.clone(),
                            location: r.entry.origin.location(),
                            last_modified: r.entry.last_modified,
                        }
                    })
                    .collect(),
                version_conflict: first.version_conflict.clone(),
            }
        })
        .collect()
}
