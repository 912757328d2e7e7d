//! Text normalization for name matching
//!
//! Both sides of every comparison (indexed names and query names) go through
//! the same functions, which keeps scoring symmetric:
//! - Unicode compatibility decomposition with combining marks dropped
//!   ("nicolás" -> "nicolas", full-width forms folded)
//! - Lowercase conversion
//! - `.`, `,` and `'` deleted; other punctuation replaced with a space
//! - Whitespace collapsing
//! - Optional legal suffix removal

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Common legal suffixes to optionally strip during normalization
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "llc",
    "ltd",
    "limited",
    "plc",
    "sa",
    "ag",
    "gmbh",
    "co",
    "company",
    "lp",
    "llp",
    "nv",
    "bv",
    "sarl",
    "sas",
    "se",
    "kg",
    "ohg",
    "pty",
    "pte",
    "jsc",
    "ojsc",
    "pjsc",
    "ooo",
    "zao",
    "fze",
];

/// Normalize a name for matching.
///
/// When suffix stripping would leave nothing ("Co."), the unstripped form is
/// returned instead.
///
/// # Examples
///
/// ```
/// use watchlist_screening::normalize::normalize_name;
///
/// assert_eq!(normalize_name("nicolás maduro", false), "nicolas maduro");
/// assert_eq!(normalize_name("ANGLO-CARIBBEAN ", false), "anglo caribbean");
/// assert_eq!(normalize_name("COBALT REFINERY CO. INC.", true), "cobalt refinery");
/// ```
pub fn normalize_name(s: &str, strip_legal_suffixes: bool) -> String {
    let mut folded = String::with_capacity(s.len());
    for c in s.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            '.' | ',' | '\'' | '\u{2019}' => {}
            c if c.is_alphanumeric() => folded.extend(c.to_lowercase()),
            _ => folded.push(' '),
        }
    }

    let tokens: Vec<&str> = folded.split_whitespace().collect();
    if strip_legal_suffixes {
        let filtered: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !is_legal_suffix(t))
            .collect();
        if !filtered.is_empty() {
            return filtered.join(" ");
        }
    }
    tokens.join(" ")
}

/// Check if a token is a common legal suffix
pub fn is_legal_suffix(token: &str) -> bool {
    LEGAL_SUFFIXES.contains(&token)
}

/// Split already-normalized text into tokens
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Reorder a "LAST, First" person name into "First LAST".
///
/// Returns `None` unless the name has exactly one comma with text on both
/// sides.
pub fn reorder_person_name(name: &str) -> Option<String> {
    let (last, first) = name.split_once(',')?;
    if first.contains(',') {
        return None;
    }
    let (last, first) = (last.trim(), first.trim());
    if last.is_empty() || first.is_empty() {
        return None;
    }
    Some(format!("{first} {last}"))
}
