//! Entity assembly for one source list
//!
//! Core rows are staged by entity id and child rows are buffered by parent
//! id, so sections may arrive in any order. `finish` resolves children once
//! every section of the list has been read: children sort by
//! `(sequence, position)`, and children whose parent never appeared are
//! dropped with an `orphan_reference` diagnostic.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::RowError;
use crate::model::{Address, AlternateIdentity, Comment, Entity, EntityId, SourceList};
use crate::reader::{RecordPosition, Section};

/// Entities of one source list from one reload, ready for indexing
#[derive(Debug, Clone)]
pub struct ListBatch {
    pub source: SourceList,
    pub entities: BTreeMap<EntityId, Entity>,
    pub diagnostics: Vec<Diagnostic>,
    /// SHA-256 (hex) per section read for this list
    pub section_hashes: BTreeMap<Section, String>,
}

impl ListBatch {
    /// Combined content hash of the list.
    ///
    /// A single-section list reports that section's hash unchanged.
    pub fn content_hash(&self) -> String {
        if self.section_hashes.len() == 1 {
            if let Some(hash) = self.section_hashes.values().next() {
                return hash.clone();
            }
        }
        let mut hasher = Sha256::new();
        for (section, hash) in &self.section_hashes {
            hasher.update(section.as_str().as_bytes());
            hasher.update(b":");
            hasher.update(hash.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

struct Staged<T> {
    position: RecordPosition,
    value: T,
}

/// Accumulates the rows of one source list
pub struct EntityBuilder {
    source: SourceList,
    entities: BTreeMap<EntityId, Staged<Entity>>,
    addresses: BTreeMap<EntityId, Vec<Staged<Address>>>,
    alternates: BTreeMap<EntityId, Vec<Staged<AlternateIdentity>>>,
    comments: BTreeMap<EntityId, Vec<Staged<Comment>>>,
    diagnostics: Vec<Diagnostic>,
    section_hashes: BTreeMap<Section, String>,
}

impl EntityBuilder {
    pub fn new(source: SourceList) -> Self {
        Self {
            source,
            entities: BTreeMap::new(),
            addresses: BTreeMap::new(),
            alternates: BTreeMap::new(),
            comments: BTreeMap::new(),
            diagnostics: Vec::new(),
            section_hashes: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> SourceList {
        self.source
    }

    /// Stage a core record. Returns false when the id was already staged.
    pub fn add_entity(
        &mut self,
        section: Section,
        position: RecordPosition,
        entity: Entity,
    ) -> bool {
        if self.entities.contains_key(&entity.id) {
            debug!(source = %self.source, id = %entity.id, %position, "duplicate entity id");
            self.diagnostics
                .push(Diagnostic::duplicate(section, position, &entity.id));
            return false;
        }
        self.entities
            .insert(entity.id.clone(), Staged { position, value: entity });
        true
    }

    pub fn add_address(&mut self, position: RecordPosition, address: Address) {
        self.addresses
            .entry(address.entity_id.clone())
            .or_default()
            .push(Staged { position, value: address });
    }

    pub fn add_alternate_identity(&mut self, position: RecordPosition, alt: AlternateIdentity) {
        self.alternates
            .entry(alt.entity_id.clone())
            .or_default()
            .push(Staged { position, value: alt });
    }

    pub fn add_comment(&mut self, position: RecordPosition, comment: Comment) {
        self.comments
            .entry(comment.entity_id.clone())
            .or_default()
            .push(Staged { position, value: comment });
    }

    /// Record a malformed row
    pub fn add_row_error(&mut self, error: &RowError) {
        debug!(source = %self.source, %error, "skipping malformed row");
        self.diagnostics.push(Diagnostic::malformed(error));
    }

    pub fn set_section_hash(&mut self, section: Section, hash: String) {
        self.section_hashes.insert(section, hash);
    }

    pub fn staged_entities(&self) -> usize {
        self.entities.len()
    }

    /// Resolve children and produce the batch
    pub fn finish(self) -> ListBatch {
        let EntityBuilder {
            source,
            entities,
            addresses,
            alternates,
            comments,
            mut diagnostics,
            section_hashes,
        } = self;

        let mut entities: BTreeMap<EntityId, Entity> = entities
            .into_iter()
            .map(|(id, staged)| (id, staged.value))
            .collect();

        attach(
            &mut entities,
            addresses,
            Section::Addresses,
            |a| a.sequence,
            |entity, children| entity.addresses.extend(children),
            &mut diagnostics,
        );
        attach(
            &mut entities,
            alternates,
            Section::AlternateIdentities,
            |a| a.sequence,
            |entity, children| entity.alternate_identities.extend(children),
            &mut diagnostics,
        );
        attach(
            &mut entities,
            comments,
            Section::Comments,
            |_| 0,
            |entity, children| entity.comments.extend(children),
            &mut diagnostics,
        );

        diagnostics.sort_by_key(|d| (d.section, d.position));

        ListBatch {
            source,
            entities,
            diagnostics,
            section_hashes,
        }
    }
}

fn attach<T>(
    entities: &mut BTreeMap<EntityId, Entity>,
    staged: BTreeMap<EntityId, Vec<Staged<T>>>,
    section: Section,
    sequence: impl Fn(&T) -> u32,
    mut apply: impl FnMut(&mut Entity, Vec<T>),
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (parent_id, mut children) in staged {
        match entities.get_mut(&parent_id) {
            Some(entity) => {
                children.sort_by_key(|c| (sequence(&c.value), c.position));
                apply(entity, children.into_iter().map(|c| c.value).collect());
            }
            None => {
                for child in children {
                    debug!(
                        %section,
                        parent = %parent_id,
                        position = %child.position,
                        "orphan child row"
                    );
                    diagnostics.push(Diagnostic::orphan(section, child.position, &parent_id));
                }
            }
        }
    }
}
