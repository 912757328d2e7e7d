//! Error types for list loading, querying and configuration
//!
//! The taxonomy follows how far a failure reaches:
//! - `RowError`: one malformed record, recovered by skipping the row
//! - `StructuralError`: a whole section is unusable, fatal to the reload
//! - `ReloadError`: what a caller of `reload` sees
//! - `QueryError`: invalid `find_entity` options, rejected before the index is read

use std::path::PathBuf;

use thiserror::Error;

use crate::reader::{RecordPosition, Section};

/// A malformed record, reported with the position it was read at
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{section} {position}: {kind}")]
pub struct RowError {
    pub section: Section,
    pub position: RecordPosition,
    pub kind: RowErrorKind,
}

/// What was wrong with a single record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowErrorKind {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid number in '{field}': {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid date in '{field}': {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("missing required value '{field}'")]
    MissingValue { field: &'static str },
}

/// A section-wide failure; the reload that hit it is abandoned
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("{section}: header mismatch, expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        section: Section,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("{section}: missing required column '{column}'")]
    MissingColumn {
        section: Section,
        column: &'static str,
    },

    #[error("{section}: read failed: {source}")]
    Read {
        section: Section,
        #[source]
        source: csv::Error,
    },

    #[error("{section} supplied more than once")]
    DuplicateSection { section: Section },
}

impl StructuralError {
    pub fn section(&self) -> Section {
        match self {
            StructuralError::HeaderMismatch { section, .. }
            | StructuralError::MissingColumn { section, .. }
            | StructuralError::Read { section, .. }
            | StructuralError::DuplicateSection { section } => *section,
        }
    }
}

/// Errors returned by a reload attempt
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("No source sections supplied")]
    NoSources,

    #[error("Source file unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reload task failed: {0}")]
    Task(String),
}

/// Invalid query options
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Query name is empty")]
    EmptyName,

    #[error("Invalid limit {limit}: must be between 1 and {max}")]
    InvalidLimit { limit: usize, max: usize },

    #[error("Invalid threshold {0}: must be within [0.0, 1.0]")]
    InvalidThreshold(f64),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
