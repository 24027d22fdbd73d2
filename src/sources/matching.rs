//! Query matching for remote index snapshots.
//!
//! The local index scores its own hits; GitHub and collection snapshots are
//! plain listings, so their adapters score entries here.
//!
//! | Field | Condition | Points |
//! |-------|-----------|--------|
//! | name | equals query | 5.0 |
//! | name | contains query | 3.0 |
//! | name | per query term found | 1.0 |
//! | description | contains query | 2.0 |
//! | description | per query term found | 0.5 |
//! | tags | per tag equal to query or a term | 1.0 |
//! | path | contains query (spaces as `-`) | 0.5 |
//!
//! Name scoring takes the first row that applies; description likewise.
//! The field contributing the most points decides the [`MatchType`].

use crate::types::MatchType;

/// The searchable fields of one snapshot entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub tags: &'a [String],
    pub path: &'a str,
}

/// A lowercased query and its terms.
#[derive(Debug, Clone)]
pub(crate) struct QueryMatcher {
    query: String,
    slug: String,
    terms: Vec<String>,
}

impl QueryMatcher {
    pub fn new(query: &str) -> Self {
        let query = query.to_lowercase();
        let terms = query.split_whitespace().map(str::to_string).collect();
        let slug = query.split_whitespace().collect::<Vec<_>>().join("-");
        Self { query, slug, terms }
    }

    /// Score `candidate`, or `None` when nothing matches.
    pub fn score(&self, candidate: &Candidate<'_>) -> Option<(MatchType, f64)> {
        if self.query.is_empty() {
            return None;
        }

        let name = candidate.name.to_lowercase();
        let name_score = if name == self.query {
            5.0
        } else if name.contains(&self.query) {
            3.0
        } else {
            self.terms_in(&name) as f64
        };

        let description_score = candidate.description.map_or(0.0, |d| {
            let d = d.to_lowercase();
            if d.contains(&self.query) {
                2.0
            } else {
                self.terms_in(&d) as f64 * 0.5
            }
        });

        let tag_score = candidate
            .tags
            .iter()
            .filter(|tag| {
                let tag = tag.to_lowercase();
                tag == self.query || self.terms.iter().any(|t| *t == tag)
            })
            .count() as f64;

        let path = candidate.path.to_lowercase();
        let path_score = if path.contains(&self.query) || path.contains(&self.slug) {
            0.5
        } else {
            0.0
        };

        let total = name_score + description_score + tag_score + path_score;
        if total <= 0.0 {
            return None;
        }

        // Ties resolve in table order.
        let mut best = (MatchType::Name, name_score);
        for (match_type, score) in [
            (MatchType::Description, description_score),
            (MatchType::Tag, tag_score),
            (MatchType::Path, path_score),
        ] {
            if score > best.1 {
                best = (match_type, score);
            }
        }
        Some((best.0, total))
    }

    fn terms_in(&self, haystack: &str) -> usize {
        self.terms
            .iter()
            .filter(|t| haystack.contains(t.as_str()))
            .count()
    }
}
