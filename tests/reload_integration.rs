//! Integration tests for the reload pipeline
//!
//! Tests verify:
//! 1. Fixture lists load into complete entities (children, vessels, CSL)
//! 2. Malformed rows and orphans become diagnostics, not failures
//! 3. Header failures leave the published index untouched; sections of
//!    nothing but bad rows do not
//! 4. Identical input bytes give identical indexes
//! 5. Concurrent queries see either the old or the new index, never a mix

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use watchlist_screening::{
    DiagnosticKind, EntityKind, EntityQuery, FindOptions, ReloadError, ReloadSources,
    ScoringWeights, SearchConfig, Section, SourceList, StructuralError, WatchlistService,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn testdata(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(file)
}

fn fixture_sources() -> ReloadSources {
    sections_from(&Section::ALL)
}

fn sections_from(sections: &[Section]) -> ReloadSources {
    let mut sources = ReloadSources::new();
    for section in sections {
        let file = File::open(testdata(section.default_file_name())).unwrap();
        sources.add(*section, file);
    }
    sources
}

fn service() -> WatchlistService {
    WatchlistService::new(SearchConfig::default(), ScoringWeights::default())
}

fn bytes(s: &str) -> Cursor<Vec<u8>> {
    Cursor::new(s.as_bytes().to_vec())
}

fn sdn_row(id: u32, name: &str) -> String {
    format!("{id},\"{name}\",-0- ,\"SDGT\",-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- \n")
}

// ============================================================================
// FIXTURE LOADING
// ============================================================================

#[test]
fn test_fixture_reload_counts() {
    let service = service();
    let report = service.reload(fixture_sources()).unwrap();

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.lists[&SourceList::UsOfac].entities, 9);
    assert_eq!(report.lists[&SourceList::UsCsl].entities, 3);
    assert_eq!(report.total_entities(), 12);

    let sdn = &report.lists[&SourceList::UsOfac].sections[&Section::Sdn];
    assert_eq!(sdn.accepted, 9);
    assert_eq!(sdn.rejected, 0);
}

#[test]
fn test_fixture_children_attached_in_sequence_order() {
    let service = service();
    service.reload(fixture_sources()).unwrap();

    let bank = service.get_entity(SourceList::UsOfac, "306").unwrap();
    assert_eq!(bank.kind, EntityKind::Organization);
    let cities: Vec<&str> = bank.addresses.iter().map(|a| a.city.as_str()).collect();
    assert_eq!(cities, vec!["Madrid", "Tokyo"]);
    assert_eq!(bank.addresses[1].postal_code, "103");
    assert_eq!(bank.alt_names().collect::<Vec<_>>(), vec!["NATIONAL BANK OF CUBA"]);
    assert_eq!(bank.comments.len(), 1);
    assert_eq!(bank.remarks, "a.k.a. 'BNC'.");

    let tidewater = service.get_entity(SourceList::UsOfac, "12803").unwrap();
    assert_eq!(
        tidewater.programs(),
        ["SDGT", "NPWMD", "IRGC", "IFSR", "IFCA"].map(String::from)
    );
    assert!(tidewater.sanctions.secondary);

    let vessel = service.get_entity(SourceList::UsOfac, "15036").unwrap();
    assert_eq!(vessel.kind, EntityKind::Vessel);
    let details = vessel.vessel.unwrap();
    assert_eq!(details.call_sign, "9HXE9");
    assert_eq!(details.tonnage, Some(159_681));
    assert_eq!(details.owner, "NATIONAL IRANIAN TANKER COMPANY");
}

#[test]
fn test_fixture_csl_entities() {
    let service = service();
    service.reload(fixture_sources()).unwrap();

    let zeta = service.get_entity(SourceList::UsCsl, "e5a9c2d1").unwrap();
    assert_eq!(zeta.kind, EntityKind::Organization);
    assert_eq!(zeta.addresses.len(), 1);
    assert_eq!(zeta.addresses[0].line1, "Room 1201, Tower A");
    assert_eq!(zeta.addresses[0].city, "Kowloon");
    assert_eq!(zeta.addresses[0].country, "Hong Kong");
    assert_eq!(zeta.alternate_identities.len(), 2);

    let ship = service.get_entity(SourceList::UsCsl, "v0000001").unwrap();
    assert_eq!(ship.kind, EntityKind::Vessel);
    assert_eq!(ship.programs(), ["IRAN", "IFSR"].map(String::from));
    assert_eq!(ship.vessel.unwrap().tonnage, Some(12_500));

    // the same party on both lists stays two records
    let ofac = service.get_entity(SourceList::UsOfac, "16128").unwrap();
    let csl = service.get_entity(SourceList::UsCsl, "f00d0001").unwrap();
    assert_eq!(ofac.name, csl.name);
}

#[test]
fn test_csl_hash_matches_file_bytes() {
    let service = service();
    let report = service.reload(fixture_sources()).unwrap();

    let raw = std::fs::read(testdata("csl.csv")).unwrap();
    let expected = hex::encode(Sha256::digest(&raw));
    assert_eq!(report.lists[&SourceList::UsCsl].hash, expected);
    assert_eq!(service.list_info().lists[&SourceList::UsCsl].hash, expected);
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[test]
fn test_one_malformed_row_among_good_rows() {
    let mut sdn = String::new();
    for id in 1..=5 {
        sdn.push_str(&sdn_row(id, &format!("ENTITY NUMBER {id}")));
    }
    sdn.push_str("6,\"BROKEN\",-0- \n");
    for id in 7..=9 {
        sdn.push_str(&sdn_row(id, &format!("ENTITY NUMBER {id}")));
    }

    let service = service();
    let report = service
        .reload(ReloadSources::new().with_section(Section::Sdn, bytes(&sdn)))
        .unwrap();

    assert_eq!(report.total_entities(), 8);
    assert_eq!(report.diagnostics.len(), 1);
    let diagnostic = &report.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::MalformedRow);
    assert_eq!(diagnostic.section, Section::Sdn);
    assert_eq!(diagnostic.position.unwrap().line, 6);
}

#[test]
fn test_orphan_address_reported() {
    let sources = ReloadSources::new()
        .with_section(Section::Sdn, bytes(&sdn_row(1, "KNOWN PARTY")))
        .with_section(
            Section::Addresses,
            bytes("999,1,\"1 Unknown Rd\",\"Havana\",\"Cuba\",-0- \n"),
        );

    let service = service();
    let report = service.reload(sources).unwrap();

    assert_eq!(report.count(DiagnosticKind::OrphanReference), 1);
    let orphan = &report.diagnostics[0];
    assert_eq!(orphan.entity_id.as_deref(), Some("999"));
    assert_eq!(orphan.section, Section::Addresses);
    assert!(service.get_entity(SourceList::UsOfac, "999").is_none());
    assert!(service
        .get_entity(SourceList::UsOfac, "1")
        .unwrap()
        .addresses
        .is_empty());
}

#[test]
fn test_duplicate_core_row_keeps_first() {
    let sdn = format!("{}{}", sdn_row(7, "FIRST NAME"), sdn_row(7, "SECOND NAME"));
    let service = service();
    let report = service
        .reload(ReloadSources::new().with_section(Section::Sdn, bytes(&sdn)))
        .unwrap();

    assert_eq!(report.count(DiagnosticKind::DuplicateEntity), 1);
    assert_eq!(
        service.get_entity(SourceList::UsOfac, "7").unwrap().name,
        "FIRST NAME"
    );
}

// ============================================================================
// FAILED RELOADS
// ============================================================================

#[test]
fn test_structural_failure_keeps_previous_index() {
    let service = service();
    service.reload(fixture_sources()).unwrap();

    let query = EntityQuery::name("Banco Nacional de Cuba");
    let before = service.find_entity(&query, &FindOptions::default()).unwrap();
    let info_before = service.list_info();
    assert_eq!(before[0].entity_id, "306");

    let bad = ReloadSources::new()
        .with_section(Section::Sdn, bytes(&sdn_row(1, "REPLACEMENT")))
        .with_section(
            Section::Comments,
            bytes("ent_num,remarks,extra\n1,\"note\",x\n"),
        );
    let err = service.reload(bad).unwrap_err();
    assert!(matches!(
        err,
        ReloadError::Structural(StructuralError::HeaderMismatch {
            section: Section::Comments,
            ..
        })
    ));

    let after = service.find_entity(&query, &FindOptions::default()).unwrap();
    assert_eq!(before, after);
    assert_eq!(service.list_info().total_entities, info_before.total_entities);
    assert!(service.get_entity(SourceList::UsOfac, "1").is_none());
}

#[test]
fn test_section_of_only_bad_rows_is_not_fatal() {
    let service = service();
    let report = service
        .reload(
            ReloadSources::new()
                .with_section(Section::Sdn, bytes(&sdn_row(1, "HEALTHY PARTY")))
                .with_section(Section::Comments, bytes("1A,\"typo in ent_num\"\n"))
                .with_section(Section::AlternateIdentities, bytes("a,b\nc,d\n")),
        )
        .unwrap();

    assert_eq!(report.total_entities(), 1);
    assert_eq!(report.count(DiagnosticKind::MalformedRow), 3);
    let ofac = &report.lists[&SourceList::UsOfac];
    assert_eq!(ofac.sections[&Section::Comments].rejected, 1);
    assert_eq!(ofac.sections[&Section::AlternateIdentities].rejected, 2);
    assert!(service.get_entity(SourceList::UsOfac, "1").is_some());
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_reload_twice_gives_identical_answers() {
    let service = service();
    let first_report = service.reload(fixture_sources()).unwrap();
    let queries = ["John Smith", "Marco Di Lauro", "cobalt refinery", "Zeta Trading"];
    let options = FindOptions::default().threshold(0.5).debug(true);

    let first: Vec<_> = queries
        .iter()
        .map(|q| service.find_entity(&EntityQuery::name(*q), &options).unwrap())
        .collect();

    let second_report = service.reload(fixture_sources()).unwrap();
    let second: Vec<_> = queries
        .iter()
        .map(|q| service.find_entity(&EntityQuery::name(*q), &options).unwrap())
        .collect();

    assert_eq!(first, second);
    assert_ne!(first_report.run_id, second_report.run_id);
    assert_eq!(
        first_report.lists[&SourceList::UsOfac].hash,
        second_report.lists[&SourceList::UsOfac].hash
    );
}

// ============================================================================
// CONCURRENT QUERIES
// ============================================================================

#[test]
fn test_queries_during_reloads_see_whole_snapshots() {
    const OFAC_ONLY: [Section; 4] = [
        Section::Sdn,
        Section::Addresses,
        Section::AlternateIdentities,
        Section::Comments,
    ];
    let query = EntityQuery::name("Marco Di Lauro");
    let options = FindOptions::default().debug(true);

    let expected = |sources: ReloadSources| {
        let reference = service();
        reference.reload(sources).unwrap();
        reference.find_entity(&query, &options).unwrap()
    };
    let with_csl = expected(fixture_sources());
    let without_csl = expected(sections_from(&OFAC_ONLY));
    assert_ne!(with_csl, without_csl);

    let service = service();
    service.reload(fixture_sources()).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut answered = 0;
                while !done.load(Ordering::Acquire) || answered == 0 {
                    let hits = service.find_entity(&query, &options).unwrap();
                    assert!(
                        hits == with_csl || hits == without_csl,
                        "mixed snapshot: {hits:?}"
                    );
                    let info = service.list_info();
                    assert!(info.total_entities == 12 || info.total_entities == 9);
                    answered += 1;
                }
            });
        }

        for round in 0..20 {
            let sources = if round % 2 == 0 {
                sections_from(&OFAC_ONLY)
            } else {
                fixture_sources()
            };
            service.reload(sources).unwrap();
        }
        done.store(true, Ordering::Release);
    });
}
