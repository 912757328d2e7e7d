//! Watchlist Screening - streaming list reader and fuzzy entity search
//!
//! Loads sanctions/watch-list sources (the OFAC SDN sections and the
//! consolidated US screening list) into an immutable, queryable snapshot and
//! answers `find_entity` queries against it with ranked fuzzy matches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Raw sections: sdn.csv, add.csv, alt.csv, sdn_comments.csv,      │
//! │                csl.csv                                           │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Record Parser (reader)                        │
//! │            bytes -> typed rows + positions                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Entity Builder (builder)                       │
//! │        staged by entity id, finalized per list batch             │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  SearchIndex (index)                             │
//! │     token / phonetic / prefix maps, built once per reload        │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          WatchlistService (service) + Scorer (matcher)           │
//! │        find_entity over the published snapshot (ArcSwap)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use watchlist_screening::{
//!     EntityQuery, FindOptions, ReloadSources, ScreeningConfig, Section, WatchlistService,
//! };
//!
//! let config = ScreeningConfig::from_file("config/watchlist.yaml")?;
//! let service = WatchlistService::new(config.search.clone(), config.scoring.clone());
//!
//! let sources = ReloadSources::new()
//!     .with_section(Section::Sdn, std::fs::File::open("data/sdn.csv")?)
//!     .with_section(Section::Addresses, std::fs::File::open("data/add.csv")?);
//! let report = service.reload(sources)?;
//!
//! let hits = service.find_entity(&EntityQuery::name("John Smith"), &FindOptions::default())?;
//! ```

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod reader;
pub mod refresh;
pub mod reload;
pub mod service;

// Re-export main types
pub use builder::{EntityBuilder, ListBatch};
pub use config::{
    DataConfig, RefreshConfig, ScoringWeights, ScreeningConfig, SearchConfig, StartupMode,
};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{ConfigError, QueryError, ReloadError, RowError, StructuralError};
pub use index::{Candidates, IndexStats, SearchIndex};
pub use matcher::{name_similarity, MatchScore, NameOrigin, PreparedQuery, ScoreBreakdown, Scorer};
pub use model::{
    Address, AlternateIdentity, AltNameType, Comment, Entity, EntityId, EntityKind,
    SanctionsInfo, SourceList, VesselInfo,
};
pub use reader::{RecordPosition, Section};
pub use refresh::{
    spawn_refresh_loop, DirectorySource, RefreshHandle, RefreshStatus, SourceProvider,
    TriggerOutcome,
};
pub use reload::{ReloadReport, ReloadSources};
pub use service::{EntityQuery, FindOptions, ListInfo, SearchHit, WatchlistService};
