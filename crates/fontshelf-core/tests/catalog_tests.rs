//! Catalog lifecycle tests: build, query, persist and exchange through CSV.

use fontshelf_core::analysis::classify;
use fontshelf_core::catalog::{Attack, Brightness, HarmonicQuality, Richness, TimbreFeatures};
use fontshelf_core::persistence::backup_path_for;
use fontshelf_core::{
    export_csv, import_csv, load_catalog, save_catalog, CatalogIndex, CatalogRng, FilterCriteria,
    FontshelfError, NoteRange, Quality, RecordEdit, SimilarityWeights, SoundfontRecord,
    SoundfontSelection, Timbre,
};
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnv {
    _dir: TempDir,
    catalog_path: PathBuf,
    csv_path: PathBuf,
}

fn create_test_env() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let catalog_path = dir.path().join("soundfonts.json");
    let csv_path = dir.path().join("export").join("soundfonts.csv");
    TestEnv {
        _dir: dir,
        catalog_path,
        csv_path,
    }
}

/// Records A, B and C: two bright-ish pianos and a drum kit.
fn abc_catalog() -> (CatalogIndex, [u64; 3]) {
    let mut catalog = CatalogIndex::new();
    let a = SoundfontRecord::new("/library/A.sf2")
        .with_instrument_type("piano")
        .with_quality(Quality::High)
        .with_tags(["piano", "bright"]);
    let b = SoundfontRecord::new("/library/B.sf2")
        .with_instrument_type("piano")
        .with_quality(Quality::High)
        .with_tags(["piano"]);
    let c = SoundfontRecord::new("/library/C.sf2")
        .with_instrument_type("drum")
        .with_quality(Quality::Low)
        .with_tags(["drum"]);

    let ids = [
        catalog.insert_or_update(a, false).unwrap(),
        catalog.insert_or_update(b, false).unwrap(),
        catalog.insert_or_update(c, false).unwrap(),
    ];
    (catalog, ids)
}

fn detailed_record(path: &str) -> SoundfontRecord {
    let mut record = SoundfontRecord::new(path)
        .with_instrument_type("Strings")
        .with_quality(Quality::Medium)
        .with_tags(["Warm", "legato", "strings"])
        .with_genre(["Classical", "film"])
        .with_timbre(Timbre::new(
            Brightness::Dark,
            Richness::Rich,
            Attack::Soft,
            HarmonicQuality::Harmonic,
        ))
        .with_size(14 * 1024 * 1024);
    record.note_range = Some(NoteRange::new(28, 103, [30, 31]));
    record.polyphony = 64;
    record.sample_rate = 44_100;
    record.bit_depth = 24;
    record.author = "Jane Doe, Studio".into();
    record.license = "CC-BY 4.0".into();
    record.description = "Section strings \"sul tasto\"\nrecorded dry".into();
    record.hash = "ab".repeat(32);
    record
}

#[test]
fn test_abc_similarity_filter_and_search() {
    let (catalog, [a, b, c]) = abc_catalog();

    let similar = catalog.similar(a, 2).unwrap();
    let ids: Vec<u64> = similar.iter().map(|r| r.record.id).collect();
    assert_eq!(ids, [b, c]);
    assert!(similar[0].score > similar[1].score);

    let pianos: Vec<u64> = catalog
        .filter(&FilterCriteria::new().with_instrument_type("piano"))
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(pianos, [a, b]);

    let hits: Vec<u64> = catalog.search("bright").iter().map(|h| h.record.id).collect();
    assert_eq!(hits, [a]);
}

#[test]
fn test_similar_contract() {
    let (mut catalog, [a, ..]) = abc_catalog();
    for i in 0..6 {
        let record = SoundfontRecord::new(format!("/library/extra{i}.sf2"))
            .with_instrument_type(if i % 2 == 0 { "piano" } else { "organ" })
            .with_quality(Quality::Medium)
            .with_tags(["piano"]);
        catalog.insert_or_update(record, false).unwrap();
    }

    for limit in [0, 1, 3, 50] {
        let results = catalog.similar(a, limit).unwrap();
        assert!(results.len() <= limit);
        assert!(results.iter().all(|r| r.record.id != a));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
    assert_eq!(catalog.similar(a, 50).unwrap().len(), catalog.len() - 1);

    let tags_only = SimilarityWeights {
        instrument_type: 0.0,
        tags: 1.0,
        genre: 0.0,
        timbre: 0.0,
        quality: 0.0,
        ..SimilarityWeights::default()
    };
    let by_tags = catalog.similar_with(a, 50, &tags_only).unwrap();
    assert!(by_tags.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    assert!(matches!(
        catalog.similar(999, 3),
        Err(FontshelfError::SoundfontNotFound { id: 999 })
    ));
}

#[test]
fn test_tag_superset_filter() {
    let (catalog, [a, b, _]) = abc_catalog();

    let piano: Vec<u64> = catalog
        .filter(&FilterCriteria::new().with_tags(["PIANO"]))
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(piano, [a, b]);

    let both: Vec<u64> = catalog
        .filter(&FilterCriteria::new().with_tags(["piano", "bright"]))
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(both, [a]);

    assert!(catalog
        .filter(&FilterCriteria::new().with_tags(["piano", "drum"]))
        .is_empty());
}

#[test]
fn test_mutations_keep_indices_consistent() {
    let (mut catalog, [a, b, c]) = abc_catalog();

    let edit = RecordEdit {
        tags: Some(["organ".to_string()].into()),
        instrument_type: Some("Organ".into()),
        ..RecordEdit::default()
    };
    catalog.update(b, &edit).unwrap();
    assert!(catalog.remove(c));
    assert!(!catalog.remove(c));
    assert!(catalog.indices_consistent());

    assert_eq!(catalog.by_instrument_type("organ").len(), 1);
    assert!(catalog.by_tag("drum").is_empty());
    assert_eq!(catalog.by_tag("piano").iter().map(|r| r.id).collect::<Vec<_>>(), [a]);

    let next = catalog
        .insert_or_update(SoundfontRecord::new("/library/D.sf2"), false)
        .unwrap();
    assert!(next > c);
}

#[test]
fn test_reinsert_preserves_identity_across_save() {
    let env = create_test_env();
    let (catalog, [a, ..]) = abc_catalog();
    save_catalog(&env.catalog_path, &catalog).unwrap();

    let mut reloaded = load_catalog(&env.catalog_path).unwrap();
    let original = reloaded.get(a).unwrap().clone();
    let again = SoundfontRecord::new("/library/A.sf2")
        .with_instrument_type("keyboard")
        .with_quality(Quality::Medium);
    assert_eq!(reloaded.insert_or_update(again, false).unwrap(), a);

    let updated = reloaded.get(a).unwrap();
    assert_eq!(updated.date_added, original.date_added);
    assert_eq!(updated.instrument_type, "keyboard");
    assert_eq!(reloaded.len(), 3);
}

#[test]
fn test_save_load_round_trip_with_backup() {
    let env = create_test_env();
    let (mut catalog, _) = abc_catalog();
    catalog
        .insert_or_update(detailed_record("/library/Strings.sf2"), false)
        .unwrap();

    save_catalog(&env.catalog_path, &catalog).unwrap();
    assert!(!backup_path_for(&env.catalog_path).exists());
    let first = std::fs::read_to_string(&env.catalog_path).unwrap();

    catalog.remove(1);
    save_catalog(&env.catalog_path, &catalog).unwrap();
    let backup = std::fs::read_to_string(backup_path_for(&env.catalog_path)).unwrap();
    assert_eq!(backup, first);

    let loaded = load_catalog(&env.catalog_path).unwrap();
    assert_eq!(loaded.len(), catalog.len());
    assert_eq!(loaded.next_id(), catalog.next_id());
    for record in catalog.all() {
        assert_eq!(loaded.get(record.id), Some(record));
    }
}

#[test]
fn test_csv_round_trip_preserves_records() {
    let env = create_test_env();
    let (mut catalog, _) = abc_catalog();
    catalog
        .insert_or_update(detailed_record("/library/Strings.sf2"), false)
        .unwrap();
    let analyzed = detailed_record("/library/Analyzed Strings.sf2").with_timbre(classify(
        &TimbreFeatures {
            spectral_centroid: 1800.0,
            spectral_bandwidth: 1450.25,
            spectral_rolloff: 3987.6,
            zero_crossing_rate: 0.0371,
            harmonic_ratio: 4.75,
        },
    ));
    let analyzed_id = catalog.insert_or_update(analyzed, false).unwrap();

    assert_eq!(export_csv(&env.csv_path, catalog.all()).unwrap(), 5);
    let imported = import_csv(&env.csv_path).unwrap();
    let original: Vec<SoundfontRecord> = catalog.all().cloned().collect();
    assert_eq!(imported, original);
    let restored = imported.iter().find(|r| r.id == analyzed_id).unwrap();
    assert_eq!(
        restored.timbre.as_ref().and_then(|t| t.features).map(|f| f.spectral_centroid),
        Some(1800.0)
    );

    let mut fresh = CatalogIndex::new();
    assert_eq!(fresh.import_records(imported.clone(), false), 5);
    assert_eq!(fresh.import_records(imported, false), 0);
    assert!(fresh.indices_consistent());
}

#[test]
fn test_legacy_document_with_unknown_fields() {
    let env = create_test_env();
    std::fs::write(
        &env.catalog_path,
        r#"[
            {
                "id": 1,
                "name": "Old Piano",
                "path": "pianos/old.sf2",
                "timbre": "",
                "mapped_notes": {"min_note": "A0", "max_note": "C8", "missing_notes": []},
                "quality": "high",
                "size_mb": 12.5,
                "last_modified": 1700000000.5,
                "favourite": true
            },
            {"id": 2, "path": "drums/kit.sf2", "genre": ["Rock"]}
        ]"#,
    )
    .unwrap();

    let catalog = load_catalog(&env.catalog_path).unwrap();
    assert_eq!(catalog.len(), 2);

    let piano = catalog.get(1).unwrap();
    assert_eq!(piano.file_path, "pianos/old.sf2");
    assert_eq!(piano.quality, Quality::High);
    assert!(piano.timbre.is_none());
    let range = piano.note_range.as_ref().unwrap();
    assert_eq!((range.lowest, range.highest), (21, 108));
    assert!(piano.last_modified.is_some());

    let kit = catalog.get(2).unwrap();
    assert!(kit.genre.contains("rock"));
    assert_eq!(kit.quality, Quality::Unknown);
    assert_eq!(catalog.by_genre("rock").len(), 1);
    assert!(catalog.next_id() > 2);
}

#[test]
fn test_seeded_selection_is_reproducible() {
    let (catalog, [a, b, _]) = abc_catalog();
    let pianos = SoundfontSelection::Matching(FilterCriteria::new().with_instrument_type("piano"));

    let picks = |seed| {
        let mut rng = CatalogRng::seeded(seed);
        (0..10)
            .map(|_| catalog.select_for_playback(&pianos, &mut rng).unwrap().id)
            .collect::<Vec<_>>()
    };
    assert_eq!(picks(3), picks(3));
    assert!(picks(3).iter().all(|id| *id == a || *id == b));

    let mut rng = CatalogRng::seeded(0);
    let none = SoundfontSelection::Matching(FilterCriteria::new().with_instrument_type("tuba"));
    assert!(catalog.select_for_playback(&none, &mut rng).is_err());
    assert!(matches!(
        catalog.select_for_playback(&SoundfontSelection::Id(42), &mut rng),
        Err(FontshelfError::SoundfontNotFound { id: 42 })
    ));
}

#[test]
fn test_statistics_summarize_catalog() {
    let (mut catalog, _) = abc_catalog();
    catalog
        .insert_or_update(detailed_record("/library/Strings.sf2"), false)
        .unwrap();

    let stats = catalog.statistics();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.instrument_types[0].label, "piano");
    assert_eq!(stats.instrument_types[0].count, 2);
    assert_eq!(stats.total_size_bytes, 14 * 1024 * 1024);
    assert!((stats.total_size_mb() - 14.0).abs() < 1e-9);
    assert!(stats.to_string().contains("Total soundfonts: 4"));
}
