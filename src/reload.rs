//! Reload pipeline: raw sections → entity batches → new `SearchIndex`
//!
//! One reload reads every supplied section to completion, groups the rows by
//! source list, finalizes each list's batch and builds a fresh index. Any
//! structural error aborts the whole reload before anything is published.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::builder::{EntityBuilder, ListBatch};
use crate::config::SearchConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{ReloadError, StructuralError};
use crate::index::SearchIndex;
use crate::model::SourceList;
use crate::reader::{
    AddressRow, AlternateIdentityRow, CommentRow, CslRow, Positioned, ReadError, SdnRow, Section,
    SectionReader, SectionRecord,
};

/// Raw section streams for one reload
#[derive(Default)]
pub struct ReloadSources {
    sections: Vec<(Section, Box<dyn Read + Send>)>,
}

impl ReloadSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: Section, reader: impl Read + Send + 'static) -> Self {
        self.add(section, reader);
        self
    }

    pub fn add(&mut self, section: Section, reader: impl Read + Send + 'static) {
        self.sections.push((section, Box::new(reader)));
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.sections.iter().map(|(section, _)| *section)
    }
}

impl fmt::Debug for ReloadSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sections()).finish()
    }
}

/// Counters for one section read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub accepted: u64,
    pub rejected: u64,
    pub bytes: u64,
    pub hash: String,
}

/// Outcome for one source list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListReport {
    pub entities: usize,
    pub hash: String,
    pub sections: BTreeMap<Section, SectionReport>,
}

/// Summary of a successful reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub lists: BTreeMap<SourceList, ListReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReloadReport {
    pub fn total_entities(&self) -> usize {
        self.lists.values().map(|l| l.entities).sum()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

/// Read all sections and build a new index; nothing is published here.
pub(crate) fn build_index(
    sources: ReloadSources,
    config: &SearchConfig,
) -> Result<(SearchIndex, ReloadReport), ReloadError> {
    if sources.is_empty() {
        return Err(ReloadError::NoSources);
    }

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let timer = Instant::now();

    let mut sections = sources.sections;
    let mut seen = BTreeSet::new();
    for (section, _) in &sections {
        if !seen.insert(*section) {
            return Err(StructuralError::DuplicateSection { section: *section }.into());
        }
    }
    // core sections first so child counts in logs are meaningful
    sections.sort_by_key(|(section, _)| *section);

    info!(%run_id, sections = sections.len(), "Starting reload");

    let mut builders: BTreeMap<SourceList, EntityBuilder> = BTreeMap::new();
    let mut section_reports: BTreeMap<SourceList, BTreeMap<Section, SectionReport>> =
        BTreeMap::new();

    for (section, reader) in sections {
        let list = section.source_list();
        let builder = builders
            .entry(list)
            .or_insert_with(|| EntityBuilder::new(list));

        let report = read_into(section, reader, builder).map_err(|e| {
            warn!(%run_id, %section, error = %e, "Reload aborted by structural error");
            e
        })?;
        debug!(
            %run_id,
            %section,
            accepted = report.accepted,
            rejected = report.rejected,
            bytes = report.bytes,
            "Section read"
        );
        section_reports
            .entry(list)
            .or_default()
            .insert(section, report);
    }

    let batches: Vec<ListBatch> = builders
        .into_values()
        .map(|builder| {
            let source = builder.source();
            let staged = builder.staged_entities();
            let batch = builder.finish();
            debug!(%run_id, %source, staged, "List batch finished");
            batch
        })
        .collect();

    let mut lists = BTreeMap::new();
    let mut diagnostics = Vec::new();
    for batch in &batches {
        lists.insert(
            batch.source,
            ListReport {
                entities: batch.entities.len(),
                hash: batch.content_hash(),
                sections: section_reports.remove(&batch.source).unwrap_or_default(),
            },
        );
        diagnostics.extend(batch.diagnostics.iter().cloned());
    }

    let ended_at = Utc::now();
    let index = SearchIndex::build(batches, config).with_reload_window(started_at, ended_at);

    let report = ReloadReport {
        run_id,
        started_at,
        ended_at,
        elapsed_ms: timer.elapsed().as_millis() as u64,
        lists,
        diagnostics,
    };

    if !report.diagnostics.is_empty() {
        warn!(
            %run_id,
            malformed = report.count(DiagnosticKind::MalformedRow),
            orphans = report.count(DiagnosticKind::OrphanReference),
            duplicates = report.count(DiagnosticKind::DuplicateEntity),
            "Reload finished with diagnostics"
        );
    }
    info!(
        %run_id,
        entities = report.total_entities(),
        elapsed_ms = report.elapsed_ms,
        "Reload built new index"
    );

    Ok((index, report))
}

fn read_into(
    section: Section,
    reader: Box<dyn Read + Send>,
    builder: &mut EntityBuilder,
) -> Result<SectionReport, StructuralError> {
    match section {
        Section::Sdn => read_section::<SdnRow>(reader, builder, |b, p| {
            b.add_entity(Section::Sdn, p.position, p.row.into_entity());
        }),
        Section::Addresses => read_section::<AddressRow>(reader, builder, |b, p| {
            b.add_address(p.position, p.row.into_address());
        }),
        Section::AlternateIdentities => {
            read_section::<AlternateIdentityRow>(reader, builder, |b, p| {
                b.add_alternate_identity(p.position, p.row.into_alternate_identity());
            })
        }
        Section::Comments => read_section::<CommentRow>(reader, builder, |b, p| {
            b.add_comment(p.position, p.row.into_comment());
        }),
        Section::CslUs => read_section::<CslRow>(reader, builder, |b, p| {
            b.add_entity(Section::CslUs, p.position, p.row.into_entity());
        }),
    }
}

fn read_section<T: SectionRecord>(
    reader: Box<dyn Read + Send>,
    builder: &mut EntityBuilder,
    mut accept: impl FnMut(&mut EntityBuilder, Positioned<T>),
) -> Result<SectionReport, StructuralError> {
    let mut rows = SectionReader::<_, T>::new(reader);
    for item in rows.by_ref() {
        match item {
            Ok(row) => accept(builder, row),
            Err(ReadError::Row(error)) => builder.add_row_error(&error),
            Err(ReadError::Structural(error)) => return Err(error),
        }
    }

    let hash = rows.content_hash();
    builder.set_section_hash(T::SECTION, hash.clone());
    Ok(SectionReport {
        accepted: rows.accepted(),
        rejected: rows.rejected(),
        bytes: rows.bytes_read(),
        hash,
    })
}
