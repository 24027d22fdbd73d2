//! Relevance ranking applied once every source has answered.
//!
//! Assigns final scores based on:
//! - An exact, case-insensitive name match (multiplies the score)
//! - The entry's semantic version (small additive bonus for newer entries)
//!
//! Formula: `score = (base + major * 0.1 + minor * 0.01) * (exact ? 2.0 : 1.0)`
//!
//! The boost applies last, so an exact match always scores at least twice
//! an otherwise identical partial match.
//!
//! The source an entry came from never affects its score.

use crate::types::UnifiedSearchResult;
use crate::version::SemVersion;

/// Multiplier for results whose name equals the query.
pub const EXACT_NAME_BOOST: f64 = 2.0;

/// Calculate the ranked score of one result.
///
/// `query_lower` must already be normalised and lowercased.
pub fn rank_score(result: &UnifiedSearchResult, query_lower: &str) -> f64 {
    let mut score = result.score;
    if let Some(version) = result.entry.version.as_deref().and_then(SemVersion::parse) {
        score += version.ranking_bonus();
    }
    if result.entry.name.to_lowercase() == query_lower {
        score *= EXACT_NAME_BOOST;
    }
    score
}

/// Re-score every result in place.
///
/// Yields to the scheduler every `yield_every` results so a large batch
/// does not monopolise the worker thread.
pub async fn rank_results(results: &mut [UnifiedSearchResult], query: &str, yield_every: usize) {
    let query_lower = query.to_lowercase();
    let yield_every = yield_every.max(1);
    for (i, result) in results.iter_mut().enumerate() {
        result.score = rank_score(result, &query_lower);
        if (i + 1) % yield_every == 0 {
            tokio::task::yield_now().await;
        }
    }
}
