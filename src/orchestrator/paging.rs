//! Result ordering and pagination.

use std::cmp::Ordering;

use crate::types::{SortBy, UnifiedSearchResult};
use crate::version::compare_versions;

/// Sort `results` in place by the requested key.
///
/// The sort is stable, so results that compare equal keep the order the
/// sources produced them in.
pub fn sort_results(results: &mut [UnifiedSearchResult], sort_by: SortBy) {
    match sort_by {
        SortBy::Relevance => results.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
        }),
        SortBy::Name => {
            results.sort_by_cached_key(|r| r.entry.name.to_lowercase());
        }
        SortBy::Source => results.sort_by_key(UnifiedSearchResult::source),
        SortBy::Version => results.sort_by(|a, b| {
            compare_versions(b.entry.version.as_deref(), a.entry.version.as_deref())
        }),
    }
}

/// Return the 1-based `page` of `page_size` results.
///
/// Pages past the end are empty.
pub fn paginate(
    results: Vec<UnifiedSearchResult>,
    page: usize,
    page_size: usize,
) -> Vec<UnifiedSearchResult> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    results.into_iter().skip(start).take(page_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementType, EntryOrigin, MatchType, Source, UnifiedIndexEntry};
    use chrono::Utc;

    fn make_result(name: &str, source: Source, version: &str, score: f64) -> UnifiedSearchResult {
        let origin = match source {
            Source::Local => EntryOrigin::Local {
                file_path: format!("/p/{name}").into(),
            },
            Source::GitHub => EntryOrigin::GitHub {
                path: name.into(),
                sha: "s".into(),
                html_url: "u".into(),
                repository: "r".into(),
            },
            Source::Collection => EntryOrigin::Collection {
                path: name.into(),
                sha: None,
                tags: vec![],
                license: None,
            },
        };
        UnifiedSearchResult::new(
            UnifiedIndexEntry {
                name: name.into(),
                description: None,
                version: Some(version.into()),
                author: None,
                element_type: ElementType::Skill,
                last_modified: Utc::now(),
                origin,
            },
            MatchType::Name,
            score,
        )
    }

    fn names(results: &[UnifiedSearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.entry.name.as_str()).collect()
    }

    fn sample() -> Vec<UnifiedSearchResult> {
        vec![
            make_result("beta", Source::Collection, "1.10.0", 1.0),
            make_result("Alpha", Source::GitHub, "1.2.0", 3.0),
            make_result("gamma", Source::Local, "2.0.0", 2.0),
        ]
    }

    #[test]
    fn sorts_by_relevance() {
        let mut results = sample();
        sort_results(&mut results, SortBy::Relevance);
        assert_eq!(names(&results), ["Alpha", "gamma", "beta"]);
    }

    #[test]
    fn sorts_by_name_case_insensitively() {
        let mut results = sample();
        sort_results(&mut results, SortBy::Name);
        assert_eq!(names(&results), ["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn sorts_by_source_order() {
        let mut results = sample();
        sort_results(&mut results, SortBy::Source);
        assert_eq!(names(&results), ["gamma", "Alpha", "beta"]);
    }

    #[test]
    fn sorts_by_semantic_version_descending() {
        let mut results = sample();
        sort_results(&mut results, SortBy::Version);
        assert_eq!(names(&results), ["gamma", "beta", "Alpha"]);
    }

    #[test]
    fn relevance_sort_is_stable_on_ties() {
        let mut results = vec![
            make_result("first", Source::Local, "1.0.0", 1.0),
            make_result("second", Source::GitHub, "1.0.0", 1.0),
        ];
        sort_results(&mut results, SortBy::Relevance);
        assert_eq!(names(&results), ["first", "second"]);
    }

    #[test]
    fn second_page_of_ten() {
        let results: Vec<_> = (0..25)
            .map(|i| make_result(&format!("r{i}"), Source::Local, "1.0.0", 0.0))
            .collect();
        let page = paginate(results, 2, 10);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].entry.name, "r10");
        assert_eq!(page[9].entry.name, "r19");
    }

    #[test]
    fn last_partial_page_and_past_end() {
        let results: Vec<_> = (0..25)
            .map(|i| make_result(&format!("r{i}"), Source::Local, "1.0.0", 0.0))
            .collect();
        assert_eq!(paginate(results.clone(), 3, 10).len(), 5);
        assert!(paginate(results, 4, 10).is_empty());
    }
}
