//! Query canonicalisation applied before any comparison or cache lookup.
//!
//! Canonicalises query text so that visually identical queries compare as
//! equal and hidden characters cannot smuggle alternate meanings past the
//! matchers:
//!
//! 1. Unicode NFC composition.
//! 2. Removal of zero-width characters (ZWSP, ZWJ, ZWNJ, word joiner, BOM).
//! 3. Removal of bidirectional control characters (embeddings, overrides,
//!    isolates, LRM/RLM).
//! 4. Removal of remaining control characters other than whitespace.
//! 5. Whitespace runs collapsed to a single space and the ends trimmed.

use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Something suspicious that normalisation removed or rewrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationIssue {
    /// The text was not in NFC form.
    NonCanonicalForm,
    /// Zero-width characters were present.
    ZeroWidth,
    /// Bidirectional override or isolate characters were present.
    BidiControl,
    /// Other non-whitespace control characters were present.
    ControlCharacter,
}

impl NormalizationIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonCanonicalForm => "non_canonical_form",
            Self::ZeroWidth => "zero_width",
            Self::BidiControl => "bidi_control",
            Self::ControlCharacter => "control_character",
        }
    }
}

/// The outcome of normalising a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// The canonical query text.
    pub text: String,
    /// Issues found, in the order the checks run. Empty for clean input.
    pub issues: Vec<NormalizationIssue>,
}

impl NormalizedQuery {
    /// Whether normalisation found anything worth auditing.
    pub fn needs_audit(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Normalise a raw query string. See the module docs for the steps applied.
///
/// # Examples
///
/// ```
/// use unified_index::normalize::normalize_query;
///
/// let q = normalize_query("  creative\u{200B}   writer ");
/// assert_eq!(q.text, "creative writer");
/// assert!(q.needs_audit());
/// ```
pub fn normalize_query(raw: &str) -> NormalizedQuery {
    let mut issues = Vec::new();

    let composed: String = if is_nfc(raw) {
        raw.to_string()
    } else {
        issues.push(NormalizationIssue::NonCanonicalForm);
        raw.nfc().collect()
    };

    let mut saw_zero_width = false;
    let mut saw_bidi = false;
    let mut saw_control = false;
    let filtered: String = composed
        .chars()
        .filter(|&c| {
            if is_zero_width(c) {
                saw_zero_width = true;
                false
            } else if is_bidi_control(c) {
                saw_bidi = true;
                false
            } else if c.is_control() && !c.is_whitespace() {
                saw_control = true;
                false
            } else {
                true
            }
        })
        .collect();

    if saw_zero_width {
        issues.push(NormalizationIssue::ZeroWidth);
    }
    if saw_bidi {
        issues.push(NormalizationIssue::BidiControl);
    }
    if saw_control {
        issues.push(NormalizationIssue::ControlCharacter);
    }

    let text = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    NormalizedQuery { text, issues }
}

fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}
