//! Query orchestration over the published index
//!
//! `WatchlistService` owns the current `SearchIndex` behind an `ArcSwap`.
//! Queries load a snapshot without locking; `reload` builds a replacement off
//! to the side and publishes it with a single store, so a query sees either
//! the old index or the new one, never a mix. A failed reload publishes
//! nothing.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::config::{ScoringWeights, ScreeningConfig, SearchConfig};
use crate::error::{QueryError, ReloadError};
use crate::index::{Candidates, EntityPos, ListSummary, PreparedEntity, SearchIndex};
use crate::matcher::{MatchScore, PreparedQuery, ScoreBreakdown, Scorer};
use crate::model::{Entity, EntityId, EntityKind, SourceList};
use crate::normalize::normalize_name;
use crate::reload::{self, ReloadReport, ReloadSources};

/// What to search for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    pub name: String,
    /// Free-text address hint
    pub address: Option<String>,
    pub country: Option<String>,
    /// Sanctions program hint, e.g. "SDGT"
    pub program: Option<String>,
}

impl EntityQuery {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }
}

/// Search options; unset values fall back to `SearchConfig`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Minimum score in `[0, 1]`
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
    pub kind: Option<EntityKind>,
    pub source: Option<SourceList>,
    /// Attach a score breakdown to each hit
    pub debug: bool,
}

impl FindOptions {
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn source(mut self, source: SourceList) -> Self {
        self.source = Some(source);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub entity_id: EntityId,
    /// Primary display name
    pub name: String,
    /// Name variant that scored best
    pub matched_name: String,
    pub score: f64,
    pub source_list: SourceList,
    pub entity_kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl SearchHit {
    fn new(entity: &PreparedEntity, matched: MatchScore, debug: bool) -> Self {
        Self {
            entity_id: entity.entity.id.clone(),
            name: entity.entity.name.clone(),
            matched_name: matched.matched_name,
            score: matched.score,
            source_list: entity.entity.source,
            entity_kind: entity.entity.kind,
            breakdown: debug.then_some(matched.breakdown),
        }
    }
}

/// What is currently loaded
#[derive(Debug, Clone, Serialize)]
pub struct ListInfo {
    pub lists: BTreeMap<SourceList, ListSummary>,
    pub total_entities: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub version: &'static str,
}

/// Screening service: current index, scorer and reload entry point
pub struct WatchlistService {
    index: ArcSwap<SearchIndex>,
    search: SearchConfig,
    scorer: Scorer,
    reload_lock: Mutex<()>,
}

impl WatchlistService {
    /// Create a service with an empty index
    pub fn new(search: SearchConfig, scoring: ScoringWeights) -> Self {
        Self {
            index: ArcSwap::from_pointee(SearchIndex::empty(&search)),
            search,
            scorer: Scorer::new(scoring),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.search.clone(), config.scoring.clone())
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// The currently published index
    pub fn snapshot(&self) -> Arc<SearchIndex> {
        self.index.load_full()
    }

    /// Rebuild the index from raw sections and publish it.
    ///
    /// Reloads are serialized; on error the previous index stays active.
    pub fn reload(&self, sources: ReloadSources) -> Result<ReloadReport, ReloadError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match reload::build_index(sources, &self.search) {
            Ok((index, report)) => {
                self.index.store(Arc::new(index));
                info!(
                    run_id = %report.run_id,
                    entities = report.total_entities(),
                    "Published new index"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping previous index");
                Err(e)
            }
        }
    }

    /// Ranked fuzzy search
    pub fn find_entity(
        &self,
        query: &EntityQuery,
        options: &FindOptions,
    ) -> Result<Vec<SearchHit>, QueryError> {
        let (threshold, limit) = self.validate(query, options)?;

        let index = self.index.load();
        let prepared = PreparedQuery::new(&query.name, index.strip_legal_suffixes())
            .with_address(query.address.as_deref())
            .with_country(query.country.as_deref())
            .with_program(query.program.as_deref());

        let candidates = index.candidates(&prepared);
        let positions: Vec<EntityPos> = match &candidates {
            Candidates::Filtered(positions) => positions.clone(),
            Candidates::All => match options.kind {
                Some(kind) => index.by_kind(kind).to_vec(),
                None => (0..index.len() as EntityPos).collect(),
            },
        };
        let scanned = positions.len();

        let mut hits: Vec<SearchHit> = positions
            .into_iter()
            .filter_map(|pos| index.entity_at(pos))
            .filter(|e| options.kind.map_or(true, |kind| e.entity.kind == kind))
            .filter(|e| options.source.map_or(true, |source| e.entity.source == source))
            .filter_map(|e| {
                let matched = self.scorer.score(&prepared, e);
                (matched.score >= threshold).then(|| SearchHit::new(e, matched, options.debug))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
                .then_with(|| a.source_list.cmp(&b.source_list))
        });
        let matched = hits.len();
        hits.truncate(limit);

        debug!(
            query = %query.name,
            full_scan = matches!(candidates, Candidates::All),
            scanned,
            matched,
            returned = hits.len(),
            "find_entity"
        );
        Ok(hits)
    }

    fn validate(
        &self,
        query: &EntityQuery,
        options: &FindOptions,
    ) -> Result<(f64, usize), QueryError> {
        // punctuation-only names normalize to nothing and would match everything
        if normalize_name(&query.name, false).is_empty() {
            return Err(QueryError::EmptyName);
        }
        let limit = options.limit.unwrap_or(self.search.default_limit);
        if limit == 0 || limit > self.search.max_limit {
            return Err(QueryError::InvalidLimit {
                limit,
                max: self.search.max_limit,
            });
        }
        let threshold = options.threshold.unwrap_or(self.search.default_threshold);
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(QueryError::InvalidThreshold(threshold));
        }
        Ok((threshold, limit))
    }

    /// Exact lookup within one list
    pub fn get_entity(&self, source: SourceList, id: &str) -> Option<Entity> {
        self.index.load().get(source, id).cloned()
    }

    /// Exact lookup across all lists
    pub fn lookup_id(&self, id: &str) -> Vec<Entity> {
        self.index
            .load()
            .lookup_id(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn list_info(&self) -> ListInfo {
        // one load, so counts and timestamps come from the same reload
        let index = self.index.load();
        ListInfo {
            lists: index.lists().clone(),
            total_entities: index.len(),
            started_at: index.started_at(),
            ended_at: index.ended_at(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
