//! Integration tests for ranked search over the fixture lists
//!
//! Tests verify:
//! 1. Exact and near-exact names rank first, ties broken by entity id
//! 2. Alternate names and reordered person names are matched
//! 3. Limit, kind and source filters
//! 4. Address and program hints only ever raise a score

use std::fs::File;
use std::path::PathBuf;

use watchlist_screening::{
    EntityKind, EntityQuery, FindOptions, NameOrigin, ReloadSources, ScoringWeights,
    SearchConfig, Section, SourceList, WatchlistService,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn loaded_service() -> WatchlistService {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/testdata");
    let mut sources = ReloadSources::new();
    for section in Section::ALL {
        sources.add(
            section,
            File::open(dir.join(section.default_file_name())).unwrap(),
        );
    }
    let service = WatchlistService::new(SearchConfig::default(), ScoringWeights::default());
    service.reload(sources).unwrap();
    service
}

fn ids(hits: &[watchlist_screening::SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.entity_id.as_str()).collect()
}

// ============================================================================
// RANKING
// ============================================================================

#[test]
fn test_john_smith_ranking() {
    let service = loaded_service();
    let hits = service
        .find_entity(&EntityQuery::name("John Smith"), &FindOptions::default().threshold(0.8))
        .unwrap();

    assert_eq!(ids(&hits), vec!["50001", "50002"]);
    assert_eq!(hits[0].score, 1.0);
    assert!(hits[1].score >= 0.8 && hits[1].score < 1.0);
    assert!(hits.iter().all(|h| h.entity_id != "50003"));
}

#[test]
fn test_verbatim_name_ignores_case_and_spacing() {
    let service = loaded_service();
    let hits = service
        .find_entity(
            &EntityQuery::name("  banco   NACIONAL de cuba "),
            &FindOptions::default(),
        )
        .unwrap();

    assert_eq!(hits[0].entity_id, "306");
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[0].name, "BANCO NACIONAL DE CUBA");
}

#[test]
fn test_every_entity_found_by_its_own_name() {
    let service = loaded_service();
    let snapshot = service.snapshot();
    assert_eq!(snapshot.len(), 12);

    for prepared in snapshot.entities() {
        let entity = &prepared.entity;
        let hits = service
            .find_entity(&EntityQuery::name(entity.name.as_str()), &FindOptions::default())
            .unwrap();
        let hit = hits
            .iter()
            .find(|h| h.entity_id == entity.id && h.source_list == entity.source)
            .unwrap_or_else(|| panic!("{} not found by its own name", entity.name));
        assert_eq!(hit.score, 1.0, "{}", entity.name);
    }
}

#[test]
fn test_misspelling_still_ranks_first() {
    let service = loaded_service();
    let hits = service
        .find_entity(&EntityQuery::name("Banco Nacional de Kuba"), &FindOptions::default())
        .unwrap();

    assert_eq!(hits[0].entity_id, "306");
    assert!(hits[0].score >= 0.9 && hits[0].score < 1.0);
}

#[test]
fn test_same_person_on_two_lists_tie_breaks_by_id() {
    let service = loaded_service();
    let hits = service
        .find_entity(&EntityQuery::name("Marco Di Lauro"), &FindOptions::default())
        .unwrap();

    assert_eq!(ids(&hits)[..2], ["16128", "f00d0001"]);
    assert_eq!(hits[0].source_list, SourceList::UsOfac);
    assert_eq!(hits[1].source_list, SourceList::UsCsl);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].score, 1.0);
}

#[test]
fn test_legal_suffixes_ignored() {
    let service = loaded_service();
    let hits = service
        .find_entity(&EntityQuery::name("Zeta Trading Co Ltd"), &FindOptions::default())
        .unwrap();

    assert_eq!(hits[0].entity_id, "e5a9c2d1");
    assert_eq!(hits[0].score, 1.0);
}

// ============================================================================
// NAME VARIANTS
// ============================================================================

#[test]
fn test_alias_match_reports_matched_name() {
    let service = loaded_service();
    let hits = service
        .find_entity(
            &EntityQuery::name("National Bank of Cuba"),
            &FindOptions::default().debug(true),
        )
        .unwrap();

    let hit = &hits[0];
    assert_eq!(hit.entity_id, "306");
    assert_eq!(hit.score, 1.0);
    assert_eq!(hit.matched_name, "NATIONAL BANK OF CUBA");
    assert_eq!(hit.name, "BANCO NACIONAL DE CUBA");
    assert_eq!(hit.breakdown.as_ref().unwrap().name_origin, NameOrigin::Alternate);
}

#[test]
fn test_csl_alt_names_searchable() {
    let service = loaded_service();
    let hits = service
        .find_entity(&EntityQuery::name("Zeta HK"), &FindOptions::default())
        .unwrap();

    assert_eq!(hits[0].entity_id, "e5a9c2d1");
    assert_eq!(hits[0].matched_name, "ZETA HK");
}

// ============================================================================
// FILTERS
// ============================================================================

#[test]
fn test_limit_truncates_after_ranking() {
    let service = loaded_service();
    let hits = service
        .find_entity(
            &EntityQuery::name("John Smith"),
            &FindOptions::default().threshold(0.0).limit(1),
        )
        .unwrap();

    assert_eq!(ids(&hits), vec!["50001"]);
}

#[test]
fn test_source_filter() {
    let service = loaded_service();
    let hits = service
        .find_entity(
            &EntityQuery::name("Marco Di Lauro"),
            &FindOptions::default().source(SourceList::UsCsl),
        )
        .unwrap();

    assert_eq!(ids(&hits), vec!["f00d0001"]);
}

#[test]
fn test_kind_filter() {
    let service = loaded_service();
    let vessels = service
        .find_entity(
            &EntityQuery::name("Sea Star"),
            &FindOptions::default().kind(EntityKind::Vessel),
        )
        .unwrap();
    assert_eq!(ids(&vessels), vec!["v0000001"]);

    let people = service
        .find_entity(
            &EntityQuery::name("Sea Star"),
            &FindOptions::default().kind(EntityKind::Person),
        )
        .unwrap();
    assert!(people.is_empty());
}

#[test]
fn test_breakdown_only_when_requested() {
    let service = loaded_service();
    let query = EntityQuery::name("Artavil");

    let plain = service.find_entity(&query, &FindOptions::default()).unwrap();
    assert_eq!(plain[0].entity_id, "15036");
    assert!(plain[0].breakdown.is_none());

    let debug = service
        .find_entity(&query, &FindOptions::default().debug(true))
        .unwrap();
    let breakdown = debug[0].breakdown.as_ref().unwrap();
    assert_eq!(breakdown.name_score, 1.0);
    assert_eq!(breakdown.final_score, debug[0].score);
    assert!(breakdown.address_score.is_none());
    assert!(!breakdown.program_match);
}

// ============================================================================
// HINTS
// ============================================================================

#[test]
fn test_address_hint_raises_score() {
    let service = loaded_service();
    let options = FindOptions::default().threshold(0.5).debug(true);
    let plain = service
        .find_entity(&EntityQuery::name("Banco Nacional"), &options)
        .unwrap();
    let hinted = service
        .find_entity(
            &EntityQuery::name("Banco Nacional").with_address("Madrid, Spain"),
            &options,
        )
        .unwrap();

    let before = plain.iter().find(|h| h.entity_id == "306").unwrap();
    let after = hinted.iter().find(|h| h.entity_id == "306").unwrap();
    assert!(after.score > before.score);
    assert!(after.breakdown.as_ref().unwrap().address_score.unwrap() > 0.0);
}

#[test]
fn test_program_hint_never_lowers() {
    let service = loaded_service();
    let options = FindOptions::default().threshold(0.5).debug(true);
    let query = EntityQuery::name("Tidewater Middle East");

    let plain = service.find_entity(&query, &options).unwrap();
    let matching = service
        .find_entity(&query.clone().with_program("IRGC"), &options)
        .unwrap();
    let other = service
        .find_entity(&query.clone().with_program("CUBA"), &options)
        .unwrap();

    assert_eq!(plain[0].entity_id, "12803");
    assert!(matching[0].breakdown.as_ref().unwrap().program_match);
    assert!(matching[0].score >= plain[0].score);
    assert!(!other[0].breakdown.as_ref().unwrap().program_match);
    assert_eq!(other[0].score, plain[0].score);
}
