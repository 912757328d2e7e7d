//! Name matching and entity scoring
//!
//! Scores are in `[0.0, 1.0]`. The name component compares normalized
//! names two ways and keeps the better result:
//! 1. Jaro-Winkler over the whole name with spaces removed
//! 2. token similarity: each token is paired with its best Jaro-Winkler
//!    partner on the other side, weighted by token length, averaged over
//!    both directions
//!
//! Identical normalized names short-circuit to `1.0`. Strings sharing no
//! characters score `0.0`. Every comparison is symmetric.
//!
//! The entity score is the best name score over the primary name, the
//! "First LAST" reordering of person names and all alternate identities,
//! refined upward by address and program hints:
//!
//! ```text
//! s'  = s  + (1 - s)  * address_weight * address_similarity
//! s'' = s' + (1 - s') * program_weight        (program hint matched)
//! ```

use serde::Serialize;
use std::cmp::Ordering;

use crate::config::ScoringWeights;
use crate::index::PreparedEntity;
use crate::normalize::{normalize_name, tokenize};

/// Where a prepared name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOrigin {
    Primary,
    /// "LAST, First" rewritten as "First LAST"
    Reordered,
    Alternate,
}

/// A name normalized and tokenized once, compared many times
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedName {
    /// Name as published
    pub display: String,
    pub normalized: String,
    /// Normalized tokens joined without spaces
    pub compact: String,
    pub tokens: Vec<String>,
    pub origin: NameOrigin,
}

impl PreparedName {
    pub fn new(display: impl Into<String>, origin: NameOrigin, strip_legal_suffixes: bool) -> Self {
        let display = display.into();
        let normalized = normalize_name(&display, strip_legal_suffixes);
        let tokens = tokenize(&normalized);
        Self {
            compact: tokens.concat(),
            display,
            normalized,
            tokens,
            origin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// An address normalized for comparison
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAddress {
    pub text: PreparedName,
    pub country: String,
}

impl PreparedAddress {
    pub fn new(text: &str, country: &str) -> Self {
        Self {
            text: PreparedName::new(text, NameOrigin::Primary, false),
            country: normalize_name(country, false),
        }
    }
}

/// A query prepared for candidate retrieval and scoring
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub name: PreparedName,
    pub address: Option<PreparedName>,
    pub country: Option<String>,
    /// Program code, uppercased
    pub program: Option<String>,
}

impl PreparedQuery {
    pub fn new(name: &str, strip_legal_suffixes: bool) -> Self {
        Self {
            name: PreparedName::new(name, NameOrigin::Primary, strip_legal_suffixes),
            address: None,
            country: None,
            program: None,
        }
    }

    pub fn with_address(mut self, address: Option<&str>) -> Self {
        self.address = address
            .map(|a| PreparedName::new(a, NameOrigin::Primary, false))
            .filter(|a| !a.is_empty());
        self
    }

    pub fn with_country(mut self, country: Option<&str>) -> Self {
        self.country = country
            .map(|c| normalize_name(c, false))
            .filter(|c| !c.is_empty());
        self
    }

    pub fn with_program(mut self, program: Option<&str>) -> Self {
        self.program = program
            .map(|p| p.trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty());
        self
    }

    fn has_address_hint(&self) -> bool {
        self.address.is_some() || self.country.is_some()
    }
}

/// How a score was reached, returned with debug searches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub name_score: f64,
    pub name_origin: NameOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_score: Option<f64>,
    pub program_match: bool,
    pub final_score: f64,
}

/// Result of scoring one entity
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub score: f64,
    /// The name variant that produced the name score
    pub matched_name: String,
    pub breakdown: ScoreBreakdown,
}

/// Similarity of two raw names, normalized without suffix stripping
///
/// # Examples
///
/// ```
/// use watchlist_screening::name_similarity;
///
/// assert_eq!(name_similarity("John SMITH", "  john smith "), 1.0);
/// assert_eq!(name_similarity("abc", "xyz"), 0.0);
/// ```
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = PreparedName::new(a, NameOrigin::Primary, false);
    let b = PreparedName::new(b, NameOrigin::Primary, false);
    prepared_similarity(&a, &b)
}

/// Similarity of two prepared names
pub fn prepared_similarity(a: &PreparedName, b: &PreparedName) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.normalized == b.normalized {
        return 1.0;
    }
    let whole = jaro_winkler(&a.compact, &b.compact);
    let tokens = token_similarity(&a.tokens, &b.tokens);
    whole.max(tokens).clamp(0.0, 1.0)
}

/// Jaro-Winkler with a fixed argument order, so swapping inputs cannot change
/// the result
fn jaro_winkler(a: &str, b: &str) -> f64 {
    if a <= b {
        strsim::jaro_winkler(a, b)
    } else {
        strsim::jaro_winkler(b, a)
    }
}

fn token_similarity(a: &[String], b: &[String]) -> f64 {
    (directional_similarity(a, b) + directional_similarity(b, a)) / 2.0
}

fn directional_similarity(from: &[String], to: &[String]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for token in from {
        let weight = token.chars().count() as f64;
        let best = to
            .iter()
            .map(|other| jaro_winkler(token, other))
            .fold(0.0, f64::max);
        weighted += weight * best;
        total += weight;
    }
    if total == 0.0 {
        0.0
    } else {
        weighted / total
    }
}

/// Entity scorer
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, query: &PreparedQuery, entity: &PreparedEntity) -> MatchScore {
        let mut best: Option<(&PreparedName, f64)> = None;
        for name in &entity.names {
            let score = prepared_similarity(&query.name, name);
            let better = match best {
                None => true,
                Some((_, current)) => score.total_cmp(&current) == Ordering::Greater,
            };
            if better {
                best = Some((name, score));
            }
        }

        let (matched_name, name_origin, name_score) = match best {
            Some((name, score)) => (name.display.clone(), name.origin, score),
            None => (entity.entity.name.clone(), NameOrigin::Primary, 0.0),
        };

        let mut score = name_score;

        let address_score = if query.has_address_hint() {
            address_similarity(query, entity)
        } else {
            None
        };
        if let Some(address) = address_score {
            score += (1.0 - score) * self.weights.address_weight * address;
        }

        let program_match = query
            .program
            .as_ref()
            .is_some_and(|p| entity.programs.iter().any(|ep| ep == p));
        if program_match {
            score += (1.0 - score) * self.weights.program_weight;
        }

        let score = score.clamp(0.0, 1.0);
        MatchScore {
            score,
            matched_name,
            breakdown: ScoreBreakdown {
                name_score,
                name_origin,
                address_score,
                program_match,
                final_score: score,
            },
        }
    }
}

/// Best address agreement over the entity's addresses; `None` when the
/// entity has no address to compare against
fn address_similarity(query: &PreparedQuery, entity: &PreparedEntity) -> Option<f64> {
    entity
        .addresses
        .iter()
        .map(|address| {
            let mut parts = 0.0;
            let mut sum = 0.0;
            if let Some(text) = &query.address {
                sum += prepared_similarity(text, &address.text);
                parts += 1.0;
            }
            if let Some(country) = &query.country {
                if *country == address.country {
                    sum += 1.0;
                }
                parts += 1.0;
            }
            if parts == 0.0 {
                0.0
            } else {
                sum / parts
            }
        })
        .reduce(f64::max)
}
