//! Non-fatal issues collected during a reload
//!
//! Diagnostics never abort a reload. They are aggregated per list batch and
//! returned in the `ReloadReport` with the position of the offending record.

use serde::Serialize;
use std::fmt;

use crate::error::RowError;
use crate::model::{EntityId, SourceList};
use crate::reader::{RecordPosition, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Record could not be parsed and was skipped
    MalformedRow,
    /// Child record referencing an entity id absent from the batch
    OrphanReference,
    /// Core record repeating an id already seen; the first one is kept
    DuplicateEntity,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedRow => "malformed_row",
            DiagnosticKind::OrphanReference => "orphan_reference",
            DiagnosticKind::DuplicateEntity => "duplicate_entity",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub source_list: SourceList,
    pub section: Section,
    pub position: Option<RecordPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    pub message: String,
}

impl Diagnostic {
    pub fn malformed(error: &RowError) -> Self {
        Self {
            kind: DiagnosticKind::MalformedRow,
            source_list: error.section.source_list(),
            section: error.section,
            position: Some(error.position),
            entity_id: None,
            message: error.kind.to_string(),
        }
    }

    pub fn orphan(section: Section, position: RecordPosition, parent_id: &str) -> Self {
        Self {
            kind: DiagnosticKind::OrphanReference,
            source_list: section.source_list(),
            section,
            position: Some(position),
            entity_id: Some(parent_id.to_string()),
            message: format!("no {} entity with id {parent_id}", section.source_list()),
        }
    }

    pub fn duplicate(section: Section, position: RecordPosition, id: &str) -> Self {
        Self {
            kind: DiagnosticKind::DuplicateEntity,
            source_list: section.source_list(),
            section,
            position: Some(position),
            entity_id: Some(id.to_string()),
            message: format!("duplicate entity id {id}, keeping first occurrence"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.section)?;
        if let Some(position) = self.position {
            write!(f, " {position}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowErrorKind;

    #[test]
    fn test_malformed_from_row_error() {
        let error = RowError {
            section: Section::Addresses,
            position: RecordPosition { line: 4, record: 3 },
            kind: RowErrorKind::MissingValue { field: "add_num" },
        };
        let diagnostic = Diagnostic::malformed(&error);
        assert_eq!(diagnostic.kind, DiagnosticKind::MalformedRow);
        assert_eq!(diagnostic.source_list, SourceList::UsOfac);
        assert_eq!(
            diagnostic.to_string(),
            "[malformed_row] addresses line 4 (record 3): missing required value 'add_num'"
        );
    }

    #[test]
    fn test_orphan_serializes_entity_id() {
        let diagnostic = Diagnostic::orphan(Section::Addresses, RecordPosition::default(), "999");
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "orphan_reference");
        assert_eq!(json["entity_id"], "999");
    }
}
