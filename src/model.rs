//! Entity model for loaded watch lists
//!
//! An `Entity` is the canonical in-memory record for one listed party. It is
//! assembled by the entity builder from the rows of one source list and is
//! immutable once published into a `SearchIndex`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an entity, unique within its source list
pub type EntityId = String;

/// Source list an entity was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceList {
    /// OFAC Specially Designated Nationals list (sdn/add/alt/comments sections)
    UsOfac,
    /// US Consolidated Screening List
    UsCsl,
}

impl SourceList {
    pub const ALL: [SourceList; 2] = [SourceList::UsOfac, SourceList::UsCsl];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceList::UsOfac => "us_ofac",
            SourceList::UsCsl => "us_csl",
        }
    }
}

impl fmt::Display for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of listed party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Organization,
    Vessel,
    Aircraft,
    Other,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
            EntityKind::Vessel => "vessel",
            EntityKind::Aircraft => "aircraft",
            EntityKind::Other => "other",
        }
    }

    /// Map the SDN `sdn_type` cell. An empty cell (`-0-`) marks an organization.
    pub fn from_sdn_type(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => EntityKind::Organization,
            "individual" => EntityKind::Person,
            "vessel" => EntityKind::Vessel,
            "aircraft" => EntityKind::Aircraft,
            _ => EntityKind::Other,
        }
    }

    /// Map the CSL `type` column
    pub fn from_csl_type(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "individual" => EntityKind::Person,
            "entity" => EntityKind::Organization,
            "vessel" => EntityKind::Vessel,
            "aircraft" => EntityKind::Aircraft,
            _ => EntityKind::Other,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vessel particulars carried on SDN and CSL vessel records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselInfo {
    pub call_sign: String,
    pub vessel_type: String,
    pub tonnage: Option<u64>,
    pub gross_registered_tonnage: Option<u64>,
    pub flag: String,
    pub owner: String,
}

impl VesselInfo {
    pub fn is_empty(&self) -> bool {
        self.call_sign.is_empty()
            && self.vessel_type.is_empty()
            && self.tonnage.is_none()
            && self.gross_registered_tonnage.is_none()
            && self.flag.is_empty()
            && self.owner.is_empty()
    }
}

/// Sanctions programs and flags for an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionsInfo {
    /// Program codes, e.g. "SDGT", "IRGC"
    pub programs: Vec<String>,
    /// Subject to secondary sanctions
    pub secondary: bool,
}

impl SanctionsInfo {
    /// Build from an SDN program cell (`"SDGT] [NPWMD] [IRGC"`) and remarks.
    pub fn from_sdn(program_cell: &str, remarks: &str) -> Self {
        let programs = program_cell
            .split("] [")
            .map(|p| p.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace()))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            programs,
            secondary: mentions_secondary_sanctions(remarks),
        }
    }

    /// Build from CSL `programs` values and remarks.
    pub fn from_csl(programs: Vec<String>, remarks: &str) -> Self {
        Self {
            programs,
            secondary: mentions_secondary_sanctions(remarks),
        }
    }
}

fn mentions_secondary_sanctions(remarks: &str) -> bool {
    remarks.to_ascii_lowercase().contains("secondary sanctions")
}

/// A physical location attached to an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub entity_id: EntityId,
    /// Publisher sequence number within the entity (SDN `add_num`)
    pub sequence: u32,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub remarks: String,
}

impl Address {
    /// One-line rendering with empty parts skipped
    pub fn format(&self) -> String {
        [
            self.line1.as_str(),
            self.line2.as_str(),
            self.city.as_str(),
            self.postal_code.as_str(),
            self.state.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.line1.is_empty()
            && self.line2.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.postal_code.is_empty()
            && self.country.is_empty()
    }
}

/// Type of an alternate name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltNameType {
    /// also known as
    Aka,
    /// formerly known as
    Fka,
    /// now known as
    Nka,
    Other,
}

impl AltNameType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().trim_end_matches('.') {
            "aka" | "a.k.a" => AltNameType::Aka,
            "fka" | "f.k.a" => AltNameType::Fka,
            "nka" | "n.k.a" => AltNameType::Nka,
            _ => AltNameType::Other,
        }
    }
}

/// An alternate name for an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateIdentity {
    pub entity_id: EntityId,
    /// Publisher sequence number within the entity (SDN `alt_num`)
    pub sequence: u32,
    pub name: String,
    pub name_type: AltNameType,
    /// Weak alias (low-quality a.k.a.)
    pub weak: bool,
    pub remarks: String,
}

/// A free-text note attached to an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub entity_id: EntityId,
    pub text: String,
}

/// Canonical record for one listed party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Display name (original casing)
    pub name: String,
    pub kind: EntityKind,
    pub source: SourceList,
    pub title: String,
    pub remarks: String,
    pub sanctions: SanctionsInfo,
    pub vessel: Option<VesselInfo>,
    /// Publishing list inside the consolidated list (CSL `source` column)
    pub issuing_list: Option<String>,
    pub listed_on: Option<NaiveDate>,
    pub delisted_on: Option<NaiveDate>,
    pub addresses: Vec<Address>,
    pub alternate_identities: Vec<AlternateIdentity>,
    pub comments: Vec<Comment>,
}

impl Entity {
    /// Create an entity with only the core fields populated
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        kind: EntityKind,
        source: SourceList,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            source,
            title: String::new(),
            remarks: String::new(),
            sanctions: SanctionsInfo::default(),
            vessel: None,
            issuing_list: None,
            listed_on: None,
            delisted_on: None,
            addresses: Vec::new(),
            alternate_identities: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn programs(&self) -> &[String] {
        &self.sanctions.programs
    }

    pub fn alt_names(&self) -> impl Iterator<Item = &str> {
        self.alternate_identities.iter().map(|alt| alt.name.as_str())
    }
}
