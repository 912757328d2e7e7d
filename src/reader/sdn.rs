//! OFAC SDN section layouts
//!
//! The SDN list is published as four headerless comma-delimited files that
//! share the `ent_num` key: core records, addresses, alternate identities
//! and extended comments.

use crate::error::RowErrorKind;
use crate::model::{
    Address, AlternateIdentity, AltNameType, Comment, Entity, EntityKind, SanctionsInfo,
    SourceList, VesselInfo,
};
use crate::reader::{Fields, HeaderMode, Section, SectionRecord};

/// Core SDN record (`sdn.csv`)
#[derive(Debug, Clone, PartialEq)]
pub struct SdnRow {
    pub ent_num: String,
    pub name: String,
    pub sdn_type: String,
    /// Raw program cell, e.g. `SDGT] [NPWMD`
    pub program: String,
    pub title: String,
    pub call_sign: String,
    pub vessel_type: String,
    pub tonnage: Option<u64>,
    pub gross_registered_tonnage: Option<u64>,
    pub vessel_flag: String,
    pub vessel_owner: String,
    pub remarks: String,
}

impl SectionRecord for SdnRow {
    const SECTION: Section = Section::Sdn;
    const COLUMNS: &'static [&'static str] = &[
        "ent_num",
        "sdn_name",
        "sdn_type",
        "program",
        "title",
        "call_sign",
        "vess_type",
        "tonnage",
        "grt",
        "vess_flag",
        "vess_owner",
        "remarks",
    ];
    const REQUIRED_COLUMNS: &'static [&'static str] = Self::COLUMNS;
    const HEADER: HeaderMode = HeaderMode::Optional;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind> {
        let ent_num = fields.numeric_id(0, "ent_num")?;
        let name = fields.text(1);
        if name.is_empty() {
            return Err(RowErrorKind::MissingValue { field: "sdn_name" });
        }

        Ok(Self {
            ent_num,
            name,
            sdn_type: fields.text(2),
            program: fields.text(3),
            title: fields.text(4),
            call_sign: fields.text(5),
            vessel_type: fields.text(6),
            tonnage: fields.optional_number(7, "tonnage")?,
            gross_registered_tonnage: fields.optional_number(8, "grt")?,
            vessel_flag: fields.text(9),
            vessel_owner: fields.text(10),
            remarks: fields.text(11),
        })
    }
}

impl SdnRow {
    /// Convert into an entity without children attached
    pub fn into_entity(self) -> Entity {
        let kind = EntityKind::from_sdn_type(&self.sdn_type);
        let vessel = VesselInfo {
            call_sign: self.call_sign,
            vessel_type: self.vessel_type,
            tonnage: self.tonnage,
            gross_registered_tonnage: self.gross_registered_tonnage,
            flag: self.vessel_flag,
            owner: self.vessel_owner,
        };

        let mut entity = Entity::new(self.ent_num, self.name, kind, SourceList::UsOfac);
        entity.sanctions = SanctionsInfo::from_sdn(&self.program, &self.remarks);
        entity.title = self.title;
        entity.remarks = self.remarks;
        entity.vessel = (!vessel.is_empty()).then_some(vessel);
        entity
    }
}

/// Address record (`add.csv`)
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRow {
    pub ent_num: String,
    pub add_num: u32,
    pub address: String,
    /// Combined "City/State/Province/Postal Code" cell
    pub city_state_postal: String,
    pub country: String,
    pub remarks: String,
}

impl SectionRecord for AddressRow {
    const SECTION: Section = Section::Addresses;
    const COLUMNS: &'static [&'static str] = &[
        "ent_num",
        "add_num",
        "address",
        "city_state_province_postal_code",
        "country",
        "add_remarks",
    ];
    const REQUIRED_COLUMNS: &'static [&'static str] = Self::COLUMNS;
    const HEADER: HeaderMode = HeaderMode::Optional;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind> {
        Ok(Self {
            ent_num: fields.numeric_id(0, "ent_num")?,
            add_num: fields.sequence(1, "add_num")?,
            address: fields.text(2),
            city_state_postal: fields.text(3),
            country: fields.text(4),
            remarks: fields.text(5),
        })
    }
}

impl AddressRow {
    pub fn into_address(self) -> Address {
        let (city, state, postal_code) = split_city_state_postal(&self.city_state_postal);
        Address {
            entity_id: self.ent_num,
            sequence: self.add_num,
            line1: self.address,
            line2: String::new(),
            city,
            state,
            postal_code,
            country: self.country,
            remarks: self.remarks,
        }
    }
}

/// Alternate identity record (`alt.csv`)
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateIdentityRow {
    pub ent_num: String,
    pub alt_num: u32,
    pub alt_type: String,
    pub alt_name: String,
    pub remarks: String,
}

impl SectionRecord for AlternateIdentityRow {
    const SECTION: Section = Section::AlternateIdentities;
    const COLUMNS: &'static [&'static str] =
        &["ent_num", "alt_num", "alt_type", "alt_name", "alt_remarks"];
    const REQUIRED_COLUMNS: &'static [&'static str] = Self::COLUMNS;
    const HEADER: HeaderMode = HeaderMode::Optional;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind> {
        let ent_num = fields.numeric_id(0, "ent_num")?;
        let alt_num = fields.sequence(1, "alt_num")?;
        let alt_name = fields.text(3);
        if alt_name.is_empty() {
            return Err(RowErrorKind::MissingValue { field: "alt_name" });
        }
        Ok(Self {
            ent_num,
            alt_num,
            alt_type: fields.text(2),
            alt_name,
            remarks: fields.text(4),
        })
    }
}

impl AlternateIdentityRow {
    pub fn into_alternate_identity(self) -> AlternateIdentity {
        let name_type = AltNameType::from_raw(&self.alt_type);
        let weak = self.remarks.to_ascii_lowercase().contains("weak")
            || self.alt_type.to_ascii_lowercase().contains("weak");
        AlternateIdentity {
            entity_id: self.ent_num,
            sequence: self.alt_num,
            name: self.alt_name,
            name_type,
            weak,
            remarks: self.remarks,
        }
    }
}

/// Extended comment record (`sdn_comments.csv`)
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub ent_num: String,
    pub text: String,
}

impl SectionRecord for CommentRow {
    const SECTION: Section = Section::Comments;
    const COLUMNS: &'static [&'static str] = &["ent_num", "remarks_extended"];
    const REQUIRED_COLUMNS: &'static [&'static str] = Self::COLUMNS;
    const HEADER: HeaderMode = HeaderMode::Optional;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind> {
        Ok(Self {
            ent_num: fields.numeric_id(0, "ent_num")?,
            text: fields.text(1),
        })
    }
}

impl CommentRow {
    pub fn into_comment(self) -> Comment {
        Comment {
            entity_id: self.ent_num,
            text: self.text,
        }
    }
}

/// Split the combined SDN "City/State/Province/Postal Code" cell.
///
/// Comma-separated parts map to city, state and postal code; a trailing part
/// containing digits is taken as the postal code. Without commas, trailing
/// words containing digits form the postal code ("London SW1A 2AA").
fn split_city_state_postal(cell: &str) -> (String, String, String) {
    let parts: Vec<&str> = cell
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [] => (String::new(), String::new(), String::new()),
        [single] => {
            let words: Vec<&str> = single.split_whitespace().collect();
            let split = words
                .iter()
                .rposition(|w| !w.chars().any(|c| c.is_ascii_digit()))
                .map(|idx| idx + 1)
                .unwrap_or(0);
            (words[..split].join(" "), String::new(), words[split..].join(" "))
        }
        [city, rest @ ..] => {
            let (postal, state_parts) = match rest.split_last() {
                Some((last, init)) if last.chars().any(|c| c.is_ascii_digit()) => {
                    (last.to_string(), init)
                }
                _ => (String::new(), rest),
            };
            (city.to_string(), state_parts.join(", "), postal)
        }
    }
}
