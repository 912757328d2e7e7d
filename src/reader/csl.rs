//! Consolidated Screening List layout
//!
//! Unlike the OFAC sections, the CSL export always starts with a header row
//! and columns are located by name, so publisher column reordering or added
//! columns do not break parsing.

use chrono::NaiveDate;

use crate::error::RowErrorKind;
use crate::model::{
    Address, AlternateIdentity, AltNameType, Entity, EntityKind, SanctionsInfo, SourceList,
    VesselInfo,
};
use crate::reader::{Fields, HeaderMode, Section, SectionRecord};

// Layout column indexes into CslRow::COLUMNS
const ID: usize = 0;
const SOURCE: usize = 1;
const ENTITY_NUMBER: usize = 2;
const TYPE: usize = 3;
const PROGRAMS: usize = 4;
const NAME: usize = 5;
const TITLE: usize = 6;
const ADDRESSES: usize = 7;
const START_DATE: usize = 8;
const END_DATE: usize = 9;
const CALL_SIGN: usize = 10;
const VESSEL_TYPE: usize = 11;
const GROSS_TONNAGE: usize = 12;
const GROSS_REGISTERED_TONNAGE: usize = 13;
const VESSEL_FLAG: usize = 14;
const VESSEL_OWNER: usize = 15;
const REMARKS: usize = 16;
const ALT_NAMES: usize = 17;

/// One CSL record
#[derive(Debug, Clone, PartialEq)]
pub struct CslRow {
    pub id: String,
    /// Issuing list, e.g. "Entity List (EL) - Bureau of Industry and Security"
    pub source: String,
    pub entity_number: String,
    pub kind: String,
    pub programs: Vec<String>,
    pub name: String,
    pub title: String,
    pub addresses: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub call_sign: String,
    pub vessel_type: String,
    pub gross_tonnage: Option<u64>,
    pub gross_registered_tonnage: Option<u64>,
    pub vessel_flag: String,
    pub vessel_owner: String,
    pub remarks: String,
    pub alt_names: Vec<String>,
}

impl SectionRecord for CslRow {
    const SECTION: Section = Section::CslUs;
    const COLUMNS: &'static [&'static str] = &[
        "_id",
        "source",
        "entity_number",
        "type",
        "programs",
        "name",
        "title",
        "addresses",
        "start_date",
        "end_date",
        "call_sign",
        "vessel_type",
        "gross_tonnage",
        "gross_registered_tonnage",
        "vessel_flag",
        "vessel_owner",
        "remarks",
        "alt_names",
    ];
    const REQUIRED_COLUMNS: &'static [&'static str] = &["_id", "type", "name"];
    const HEADER: HeaderMode = HeaderMode::Required;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, RowErrorKind> {
        let id = fields.text(ID);
        if id.is_empty() {
            return Err(RowErrorKind::MissingValue { field: "_id" });
        }
        let name = fields.text(NAME);
        if name.is_empty() {
            return Err(RowErrorKind::MissingValue { field: "name" });
        }

        Ok(Self {
            id,
            source: fields.text(SOURCE),
            entity_number: fields.text(ENTITY_NUMBER),
            kind: fields.text(TYPE),
            programs: fields.list(PROGRAMS),
            name,
            title: fields.text(TITLE),
            addresses: fields.list(ADDRESSES),
            start_date: fields.optional_date(START_DATE, "start_date")?,
            end_date: fields.optional_date(END_DATE, "end_date")?,
            call_sign: fields.text(CALL_SIGN),
            vessel_type: fields.text(VESSEL_TYPE),
            gross_tonnage: fields.optional_number(GROSS_TONNAGE, "gross_tonnage")?,
            gross_registered_tonnage: fields
                .optional_number(GROSS_REGISTERED_TONNAGE, "gross_registered_tonnage")?,
            vessel_flag: fields.text(VESSEL_FLAG),
            vessel_owner: fields.text(VESSEL_OWNER),
            remarks: fields.text(REMARKS),
            alt_names: fields.list(ALT_NAMES),
        })
    }
}

impl CslRow {
    /// Convert into a complete entity; CSL rows carry their own children.
    pub fn into_entity(self) -> Entity {
        let kind = EntityKind::from_csl_type(&self.kind);
        let vessel = VesselInfo {
            call_sign: self.call_sign,
            vessel_type: self.vessel_type,
            tonnage: self.gross_tonnage,
            gross_registered_tonnage: self.gross_registered_tonnage,
            flag: self.vessel_flag,
            owner: self.vessel_owner,
        };

        let mut entity = Entity::new(self.id, self.name, kind, SourceList::UsCsl);
        entity.sanctions = SanctionsInfo::from_csl(self.programs, &self.remarks);
        entity.title = self.title;
        entity.remarks = self.remarks;
        entity.vessel = (!vessel.is_empty()).then_some(vessel);
        entity.issuing_list = (!self.source.is_empty()).then_some(self.source);
        entity.listed_on = self.start_date;
        entity.delisted_on = self.end_date;

        entity.addresses = self
            .addresses
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_address(&entity.id, i as u32 + 1, raw))
            .filter(|address| !address.is_empty())
            .collect();
        entity.alternate_identities = self
            .alt_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| AlternateIdentity {
                entity_id: entity.id.clone(),
                sequence: i as u32 + 1,
                name,
                name_type: AltNameType::Aka,
                weak: false,
                remarks: String::new(),
            })
            .collect();
        entity
    }
}

/// Parse one free-text CSL address: `"line, city, postal, country"`.
///
/// The last comma-separated part is the country; a short part containing a
/// digit right before it is the postal code; the next one is the city and
/// whatever remains forms the street line.
fn parse_address(entity_id: &str, sequence: u32, raw: &str) -> Address {
    let mut parts: Vec<&str> = split_multi_commas(raw);
    let mut address = Address {
        entity_id: entity_id.to_string(),
        sequence,
        ..Default::default()
    };

    if let Some(country) = parts.pop() {
        address.country = country.to_string();
    }
    if let Some(last) = parts.last() {
        if last.len() <= 12 && last.chars().any(|c| c.is_ascii_digit()) {
            address.postal_code = last.to_string();
            parts.pop();
        }
    }
    if let Some(city) = parts.pop() {
        address.city = city.to_string();
    }
    address.line1 = parts.join(", ");
    address
}

fn split_multi_commas(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}
