//! Lenient semantic-version parsing for element metadata.
//!
//! Element authors write versions by hand, so parsing is forgiving: a
//! leading `v` is ignored, missing `minor`/`patch` segments default to 0,
//! and pre-release or build suffixes (`-beta`, `+sha`) are dropped.
//! Anything whose first segment is not numeric, including the literal
//! `"unknown"`, does not parse.

use std::cmp::Ordering;
use std::fmt;

/// A parsed `major.minor.patch` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVersion {
    /// Parse a version string, returning `None` when it carries no usable
    /// numeric prefix.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let core = trimmed.split(&['-', '+'][..]).next().unwrap_or_default();
        if core.is_empty() {
            return None;
        }

        let mut segments = core.split('.').map(leading_number);
        let major = segments.next().flatten()?;
        let minor = segments.next().flatten().unwrap_or(0);
        let patch = segments.next().flatten().unwrap_or(0);
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    /// Tie-break bonus used by ranking: `major * 0.1 + minor * 0.01`.
    pub fn ranking_bonus(&self) -> f64 {
        self.major as f64 * 0.1 + self.minor as f64 * 0.01
    }
}

impl fmt::Display for SemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether a version string carries real information.
///
/// Empty strings and `"unknown"` are placeholders some indexes emit when an
/// element has no version metadata.
pub fn is_known_version(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("unknown")
}

/// Compare two optional version strings; unparsable versions sort as `0.0.0`.
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    let parse = |v: Option<&str>| v.and_then(SemVersion::parse).unwrap_or_default();
    parse(a).cmp(&parse(b))
}

fn leading_number(segment: &str) -> Option<u64> {
    let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v = SemVersion::parse("2.4.1").expect("parse");
        assert_eq!((v.major, v.minor, v.patch), (2, 4, 1));
    }

    #[test]
    fn missing_segments_default_to_zero() {
        assert_eq!(
            SemVersion::parse("3").expect("parse"),
            SemVersion {
                major: 3,
                minor: 0,
                patch: 0
            }
        );
        assert_eq!(SemVersion::parse("1.5").expect("parse").patch, 0);
    }

    #[test]
    fn strips_prefix_and_suffixes() {
        assert_eq!(SemVersion::parse("v1.2.3").expect("parse").to_string(), "1.2.3");
        assert_eq!(
            SemVersion::parse("1.2.3-beta.1").expect("parse").to_string(),
            "1.2.3"
        );
        assert_eq!(
            SemVersion::parse("1.2.3+build7").expect("parse").to_string(),
            "1.2.3"
        );
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(SemVersion::parse("unknown").is_none());
        assert!(SemVersion::parse("").is_none());
        assert!(SemVersion::parse("latest").is_none());
    }

    #[test]
    fn numeric_prefix_of_segment_is_used() {
        assert_eq!(SemVersion::parse("1.2rc.0").expect("parse").minor, 2);
    }

    #[test]
    fn comparison_is_numeric_not_lexicographic() {
        assert_eq!(
            compare_versions(Some("1.10.0"), Some("1.9.9")),
            Ordering::Greater
        );
        assert_eq!(compare_versions(Some("2.0"), Some("2.0.0")), Ordering::Equal);
        assert_eq!(compare_versions(None, Some("0.0.1")), Ordering::Less);
        assert_eq!(compare_versions(Some("unknown"), None), Ordering::Equal);
    }

    #[test]
    fn ranking_bonus_formula() {
        let v = SemVersion::parse("2.3.9").expect("parse");
        assert!((v.ranking_bonus() - 0.23).abs() < 1e-9);
    }

    #[test]
    fn known_version_placeholders() {
        assert!(is_known_version("1.0.0"));
        assert!(!is_known_version("unknown"));
        assert!(!is_known_version("UNKNOWN"));
        assert!(!is_known_version("  "));
    }
}
