//! Immutable search index over the entities of one reload
//!
//! The `SearchIndex` is built once from the `ListBatch`es of a reload and
//! never mutated afterwards; a newer reload produces a new index that
//! replaces it. Besides the entities themselves it carries the lookup maps
//! used to pre-filter candidates before scoring:
//!
//! - token index: normalized name token → entity positions
//! - phonetic index: Double Metaphone key of a token → entity positions
//! - prefix index: first `prefix_len` characters of a token → entity positions
//!
//! A query's candidate set is the union over its tokens of all three maps.

use chrono::{DateTime, Utc};
use rphonetic::{DoubleMetaphone, Encoder};
use serde::Serialize;
use smallvec::{Array, SmallVec};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::builder::ListBatch;
use crate::config::SearchConfig;
use crate::matcher::{NameOrigin, PreparedAddress, PreparedName, PreparedQuery};
use crate::model::{Entity, EntityId, EntityKind, SourceList};
use crate::normalize::reorder_person_name;

/// Position of an entity inside the index
pub type EntityPos = u32;

/// An entity with its names and addresses prepared for scoring
#[derive(Debug, Clone)]
pub struct PreparedEntity {
    pub entity: Entity,
    /// Primary name first, then the reordered form, then alternates
    pub names: Vec<PreparedName>,
    pub addresses: Vec<PreparedAddress>,
    /// Program codes, uppercased
    pub programs: Vec<String>,
}

impl PreparedEntity {
    pub fn new(entity: Entity, strip_legal_suffixes: bool) -> Self {
        let mut names = vec![PreparedName::new(
            entity.name.as_str(),
            NameOrigin::Primary,
            strip_legal_suffixes,
        )];
        if entity.kind == EntityKind::Person {
            if let Some(reordered) = reorder_person_name(&entity.name) {
                names.push(PreparedName::new(
                    reordered,
                    NameOrigin::Reordered,
                    strip_legal_suffixes,
                ));
            }
        }
        for alt in &entity.alternate_identities {
            names.push(PreparedName::new(
                alt.name.as_str(),
                NameOrigin::Alternate,
                strip_legal_suffixes,
            ));
        }
        names.retain(|n| !n.is_empty());

        let addresses = entity
            .addresses
            .iter()
            .map(|a| PreparedAddress::new(&a.format(), &a.country))
            .collect();
        let programs = entity
            .programs()
            .iter()
            .map(|p| p.to_ascii_uppercase())
            .collect();

        Self {
            entity,
            names,
            addresses,
            programs,
        }
    }
}

/// Candidate entities for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Sorted, deduplicated entity positions
    Filtered(Vec<EntityPos>),
    /// The query carries no usable token; scan everything
    All,
}

/// Per-list summary of what a reload published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    pub entities: usize,
    /// SHA-256 (hex) of the list's raw content
    pub hash: String,
    pub diagnostics: usize,
}

/// Index statistics
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub entity_count: usize,
    pub name_variants: usize,
    pub token_index_size: usize,
    pub phonetic_index_size: usize,
    pub prefix_index_size: usize,
    pub kind_count: usize,
    pub lists: BTreeMap<SourceList, usize>,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Search Index Statistics:")?;
        writeln!(f, "  Entities: {}", self.entity_count)?;
        for (list, count) in &self.lists {
            writeln!(f, "    {list}: {count}")?;
        }
        writeln!(f, "  Name variants: {}", self.name_variants)?;
        writeln!(f, "  Token index entries: {}", self.token_index_size)?;
        writeln!(f, "  Phonetic index entries: {}", self.phonetic_index_size)?;
        writeln!(f, "  Prefix index entries: {}", self.prefix_index_size)?;
        writeln!(f, "  Entity kinds: {}", self.kind_count)?;
        Ok(())
    }
}

/// Immutable snapshot of all loaded entities
#[derive(Debug)]
pub struct SearchIndex {
    entities: Vec<PreparedEntity>,
    id_index: HashMap<EntityId, SmallVec<[EntityPos; 2]>>,
    token_index: HashMap<String, SmallVec<[EntityPos; 8]>>,
    phonetic_index: HashMap<String, SmallVec<[EntityPos; 8]>>,
    prefix_index: HashMap<String, SmallVec<[EntityPos; 16]>>,
    kind_index: HashMap<EntityKind, Vec<EntityPos>>,
    lists: BTreeMap<SourceList, ListSummary>,
    prefix_len: usize,
    strip_legal_suffixes: bool,
    /// When the reload that produced this index ran; unset for `empty`
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl SearchIndex {
    /// An index holding nothing, used before the first reload
    pub fn empty(config: &SearchConfig) -> Self {
        Self::build(Vec::new(), config)
    }

    /// Build an index from the batches of one reload.
    ///
    /// Entities are ordered by `(source, id)`; every map is derived from that
    /// order, so identical batches give identical indexes.
    pub fn build(batches: Vec<ListBatch>, config: &SearchConfig) -> Self {
        let prefix_len = config.prefix_len.max(1);
        let strip = config.strip_legal_suffixes;

        let mut batches = batches;
        batches.sort_by_key(|b| b.source);

        let mut lists = BTreeMap::new();
        let mut entities = Vec::new();
        for batch in batches {
            lists.insert(
                batch.source,
                ListSummary {
                    entities: batch.entities.len(),
                    hash: batch.content_hash(),
                    diagnostics: batch.diagnostics.len(),
                },
            );
            // BTreeMap iteration gives id order within the list
            entities.extend(
                batch
                    .entities
                    .into_values()
                    .map(|entity| PreparedEntity::new(entity, strip)),
            );
        }

        let encoder = DoubleMetaphone::default();
        let mut id_index: HashMap<EntityId, SmallVec<[EntityPos; 2]>> = HashMap::new();
        let mut token_index: HashMap<String, SmallVec<[EntityPos; 8]>> = HashMap::new();
        let mut phonetic_index: HashMap<String, SmallVec<[EntityPos; 8]>> = HashMap::new();
        let mut prefix_index: HashMap<String, SmallVec<[EntityPos; 16]>> = HashMap::new();
        let mut kind_index: HashMap<EntityKind, Vec<EntityPos>> = HashMap::new();

        for (pos, prepared) in entities.iter().enumerate() {
            let pos = pos as EntityPos;
            id_index
                .entry(prepared.entity.id.clone())
                .or_default()
                .push(pos);
            kind_index.entry(prepared.entity.kind).or_default().push(pos);

            let tokens: BTreeSet<&str> = prepared
                .names
                .iter()
                .flat_map(|n| n.tokens.iter().map(String::as_str))
                .collect();
            for token in tokens {
                push_unique(token_index.entry(token.to_string()).or_default(), pos);
                push_unique(
                    prefix_index.entry(prefix_key(token, prefix_len)).or_default(),
                    pos,
                );
                if let Some(key) = phonetic_key(&encoder, token) {
                    push_unique(phonetic_index.entry(key).or_default(), pos);
                }
            }
        }

        Self {
            entities,
            id_index,
            token_index,
            phonetic_index,
            prefix_index,
            kind_index,
            lists,
            prefix_len,
            strip_legal_suffixes: strip,
            started_at: None,
            ended_at: None,
        }
    }

    /// Stamp the index with the reload that built it
    pub(crate) fn with_reload_window(
        mut self,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        self.started_at = Some(started_at);
        self.ended_at = Some(ended_at);
        self
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn strip_legal_suffixes(&self) -> bool {
        self.strip_legal_suffixes
    }

    /// All entities in `(source, id)` order
    pub fn entities(&self) -> impl Iterator<Item = &PreparedEntity> {
        self.entities.iter()
    }

    pub fn entity_at(&self, pos: EntityPos) -> Option<&PreparedEntity> {
        self.entities.get(pos as usize)
    }

    /// Exact lookup within one list
    pub fn get(&self, source: SourceList, id: &str) -> Option<&Entity> {
        self.id_index.get(id).and_then(|positions| {
            positions
                .iter()
                .filter_map(|pos| self.entity_at(*pos))
                .map(|prepared| &prepared.entity)
                .find(|entity| entity.source == source)
        })
    }

    /// Exact lookup across all lists
    pub fn lookup_id(&self, id: &str) -> Vec<&Entity> {
        self.id_index
            .get(id)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|pos| self.entity_at(*pos))
                    .map(|prepared| &prepared.entity)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entity positions of one kind
    pub fn by_kind(&self, kind: EntityKind) -> &[EntityPos] {
        self.kind_index
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Candidate positions sharing a token, phonetic key or prefix with the
    /// query name
    pub fn candidates(&self, query: &PreparedQuery) -> Candidates {
        if query.name.tokens.is_empty() {
            return Candidates::All;
        }

        let encoder = DoubleMetaphone::default();
        let mut found: BTreeSet<EntityPos> = BTreeSet::new();
        for token in &query.name.tokens {
            if let Some(positions) = self.token_index.get(token) {
                found.extend(positions.iter().copied());
            }
            if let Some(positions) = self.prefix_index.get(&prefix_key(token, self.prefix_len)) {
                found.extend(positions.iter().copied());
            }
            if let Some(key) = phonetic_key(&encoder, token) {
                if let Some(positions) = self.phonetic_index.get(&key) {
                    found.extend(positions.iter().copied());
                }
            }
        }
        Candidates::Filtered(found.into_iter().collect())
    }

    /// Per-list counts and hashes
    pub fn lists(&self) -> &BTreeMap<SourceList, ListSummary> {
        &self.lists
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entity_count: self.entities.len(),
            name_variants: self.entities.iter().map(|e| e.names.len()).sum(),
            token_index_size: self.token_index.len(),
            phonetic_index_size: self.phonetic_index.len(),
            prefix_index_size: self.prefix_index.len(),
            kind_count: self.kind_index.len(),
            lists: self
                .lists
                .iter()
                .map(|(list, summary)| (*list, summary.entities))
                .collect(),
        }
    }
}

fn push_unique<A: Array<Item = EntityPos>>(positions: &mut SmallVec<A>, pos: EntityPos) {
    // positions arrive in ascending order, so a duplicate can only be the last
    if positions.last() != Some(&pos) {
        positions.push(pos);
    }
}

fn prefix_key(token: &str, prefix_len: usize) -> String {
    token.chars().take(prefix_len).collect()
}

fn phonetic_key(encoder: &DoubleMetaphone, token: &str) -> Option<String> {
    if !token.chars().any(char::is_alphabetic) {
        return None;
    }
    let key = encoder.encode(token);
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EntityBuilder;
    use crate::model::AlternateIdentity;
    use crate::reader::{RecordPosition, Section};

    fn batch(source: SourceList, entities: Vec<Entity>) -> ListBatch {
        let section = match source {
            SourceList::UsOfac => Section::Sdn,
            SourceList::UsCsl => Section::CslUs,
        };
        let mut builder = EntityBuilder::new(source);
        for (i, entity) in entities.into_iter().enumerate() {
            let position = RecordPosition {
                line: i as u64 + 1,
                record: i as u64,
            };
            builder.add_entity(section, position, entity);
        }
        builder.finish()
    }

    fn sample_index() -> SearchIndex {
        let ofac = batch(
            SourceList::UsOfac,
            vec![
                Entity::new("2", "JON SMYTHE", EntityKind::Person, SourceList::UsOfac),
                Entity::new("1", "JOHN SMITH", EntityKind::Person, SourceList::UsOfac),
                Entity::new("3", "ACME CORP", EntityKind::Organization, SourceList::UsOfac),
            ],
        );
        let csl = batch(
            SourceList::UsCsl,
            vec![Entity::new("1", "ZETA TRADING", EntityKind::Organization, SourceList::UsCsl)],
        );
        SearchIndex::build(vec![csl, ofac], &SearchConfig::default())
    }

    #[test]
    fn test_entities_ordered_by_source_then_id() {
        let index = sample_index();
        let order: Vec<(SourceList, &str)> = index
            .entities()
            .map(|e| (e.entity.source, e.entity.id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (SourceList::UsOfac, "1"),
                (SourceList::UsOfac, "2"),
                (SourceList::UsOfac, "3"),
                (SourceList::UsCsl, "1"),
            ]
        );
    }

    #[test]
    fn test_get_and_lookup_id() {
        let index = sample_index();
        assert_eq!(index.get(SourceList::UsOfac, "3").unwrap().name, "ACME CORP");
        assert_eq!(index.get(SourceList::UsCsl, "1").unwrap().name, "ZETA TRADING");
        assert!(index.get(SourceList::UsCsl, "3").is_none());
        assert_eq!(index.lookup_id("1").len(), 2);
        assert!(index.lookup_id("999").is_empty());
    }

    #[test]
    fn test_phonetic_candidates() {
        let index = sample_index();
        let query = PreparedQuery::new("John Smith", true);
        let Candidates::Filtered(positions) = index.candidates(&query) else {
            panic!("expected filtered candidates");
        };
        let ids: Vec<&str> = positions
            .iter()
            .map(|p| index.entity_at(*p).unwrap().entity.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_empty_query_scans_all() {
        let index = sample_index();
        let query = PreparedQuery::new("!!!", true);
        assert_eq!(index.candidates(&query), Candidates::All);
    }

    #[test]
    fn test_alternate_names_indexed() {
        let mut entity = Entity::new(
            "306",
            "BANCO NACIONAL DE CUBA",
            EntityKind::Organization,
            SourceList::UsOfac,
        );
        entity.alternate_identities.push(AlternateIdentity {
            entity_id: "306".into(),
            sequence: 1,
            name: "NATIONAL BANK OF CUBA".into(),
            name_type: crate::model::AltNameType::Aka,
            weak: false,
            remarks: String::new(),
        });
        let index = SearchIndex::build(
            vec![batch(SourceList::UsOfac, vec![entity])],
            &SearchConfig::default(),
        );
        let query = PreparedQuery::new("bank", true);
        assert_eq!(index.candidates(&query), Candidates::Filtered(vec![0]));
    }

    #[test]
    fn test_stats() {
        let index = sample_index();
        let stats = index.stats();
        assert_eq!(stats.entity_count, 4);
        assert_eq!(stats.lists[&SourceList::UsOfac], 3);
        assert_eq!(stats.kind_count, 2);
        assert!(stats.to_string().contains("Entities: 4"));
        assert_eq!(index.by_kind(EntityKind::Person).len(), 2);
    }
}
