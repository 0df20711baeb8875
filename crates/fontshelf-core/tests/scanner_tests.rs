//! Integration tests for directory scanning with stand-in extractors.

use fontshelf_core::catalog::{Attack, Brightness, HarmonicQuality, Richness};
use fontshelf_core::extract::{compute_sha256, FileFacts, Sf2Facts};
use fontshelf_core::{
    load_catalog, save_catalog, CancellationToken, CatalogIndex, ExtractOptions, Extraction,
    FontshelfError, LibraryScanner, MetadataExtractor, Quality, RecordReviewer, Result, ScanMode,
    ScanObserver, ScanOptions, SoundfontRecord, Timbre,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a library directory with three soundfonts and one unrelated file.
fn create_test_env() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join("nested")).unwrap();
    std::fs::write(root.join("Concert Piano.sf2"), b"piano").unwrap();
    std::fs::write(root.join("Rock Kit.sf2"), b"drums").unwrap();
    std::fs::write(root.join("broken.sf2"), b"").unwrap();
    std::fs::write(root.join("nested/Choir.sf2"), b"voices").unwrap();
    std::fs::write(root.join("notes.txt"), b"ignore me").unwrap();

    temp_dir
}

/// Extractor that reads real file facts but makes up the SF2 structure.
///
/// Empty files are reported as unreadable.
#[derive(Clone, Default)]
struct StubExtractor {
    calls: Arc<AtomicUsize>,
}

impl MetadataExtractor for StubExtractor {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn extract(&self, path: &Path, options: &ExtractOptions) -> Extraction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut extraction = Extraction::new(path);
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            extraction.warn("empty file");
            return extraction;
        }

        extraction.file = FileFacts {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            file_size_bytes: size,
            last_modified: None,
            hash: options.compute_hash.then(|| compute_sha256(path).unwrap()),
        };
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        extraction.sf2 = Some(Sf2Facts {
            bank_name: stem.clone(),
            author: "Test Author".into(),
            preset_names: vec![stem],
            sample_count: 12,
            sample_rate: Some(44_100),
            bit_depth: 16,
            covered_keys: (36..=96).collect::<BTreeSet<u8>>(),
            ..Sf2Facts::default()
        });
        extraction
    }
}

fn bright_timbre(_: &Path) -> Result<Timbre> {
    Ok(Timbre::new(
        Brightness::Bright,
        Richness::Simple,
        Attack::Hard,
        HarmonicQuality::Balanced,
    ))
}

fn scanner<'a>(extractor: &StubExtractor) -> LibraryScanner<'a> {
    LibraryScanner::new(Box::new(extractor.clone())).with_timbre_analyzer(bright_timbre)
}

#[derive(Default)]
struct CountingObserver {
    files: Vec<PathBuf>,
    batches: Vec<usize>,
}

impl ScanObserver for CountingObserver {
    fn on_file(&mut self, progress: &fontshelf_core::library::ScanProgress<'_>) {
        assert_eq!(progress.position, self.files.len() + 1);
        self.files.push(progress.path.to_path_buf());
    }

    fn on_batch(&mut self, catalog: &CatalogIndex) -> Result<()> {
        self.batches.push(catalog.len());
        Ok(())
    }
}

fn path_key(root: &Path, name: &str) -> String {
    root.join(name).to_string_lossy().into_owned()
}

#[test]
fn test_full_scan_builds_records() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let mut observer = CountingObserver::default();

    let report = scanner(&extractor)
        .scan(
            &mut catalog,
            &ScanOptions::new(env.path()),
            &mut observer,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.discovered, 3);
    assert_eq!(report.added, 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("broken.sf2"));
    assert!(!report.is_success());
    assert_eq!(observer.files.len(), 3);

    let piano = catalog.by_path(&path_key(env.path(), "Concert Piano.sf2")).unwrap();
    assert_eq!(piano.name, "Concert Piano");
    assert_eq!(piano.instrument_type, "piano");
    assert_eq!(piano.author, "Test Author");
    assert!(piano.timbre.is_some());
    assert!(piano.genre.contains("rock"));
    assert_ne!(piano.quality, Quality::Unknown);
    let range = piano.note_range.as_ref().unwrap();
    assert_eq!((range.lowest, range.highest), (36, 96));

    let kit = catalog.by_path(&path_key(env.path(), "Rock Kit.sf2")).unwrap();
    assert_eq!(kit.instrument_type, "drums");
    assert!(catalog.indices_consistent());
}

#[test]
fn test_basic_mode_skips_timbre() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let options = ScanOptions {
        mode: ScanMode::Basic,
        ..ScanOptions::new(env.path())
    };

    scanner(&extractor)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &CancellationToken::new())
        .unwrap();

    assert!(catalog.all().all(|r| r.timbre.is_none() && r.genre.is_empty()));
}

#[test]
fn test_recursive_scan_finds_nested() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let options = ScanOptions {
        recursive: true,
        ..ScanOptions::new(env.path())
    };

    let report = scanner(&extractor)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.discovered, 4);
    assert_eq!(report.added, 3);
    let choir = catalog.by_path(&path_key(env.path(), "nested/Choir.sf2")).unwrap();
    assert_eq!(choir.instrument_type, "vocal");
}

#[test]
fn test_rescan_skips_unchanged_and_updates_changed() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let options = ScanOptions::new(env.path());
    let cancel = CancellationToken::new();

    scanner(&extractor)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &cancel)
        .unwrap();
    let piano_key = path_key(env.path(), "Concert Piano.sf2");
    let before = catalog.by_path(&piano_key).unwrap().clone();
    let calls_after_first = extractor.calls.load(Ordering::SeqCst);

    let report = scanner(&extractor)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &cancel)
        .unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.added + report.updated, 0);
    // Only the broken file is extracted again.
    assert_eq!(extractor.calls.load(Ordering::SeqCst), calls_after_first + 1);

    std::fs::write(env.path().join("Concert Piano.sf2"), b"a new piano").unwrap();
    let report = scanner(&extractor)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &cancel)
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);

    let after = catalog.by_path(&piano_key).unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.date_added, before.date_added);
    assert_ne!(after.hash, before.hash);
    assert_eq!(after.file_size_bytes, 11);
}

#[test]
fn test_force_reprocesses_everything() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let cancel = CancellationToken::new();

    scanner(&extractor)
        .scan(&mut catalog, &ScanOptions::new(env.path()), &mut CountingObserver::default(), &cancel)
        .unwrap();
    let ids: Vec<u64> = catalog.all().map(|r| r.id).collect();

    let forced = ScanOptions {
        force: true,
        ..ScanOptions::new(env.path())
    };
    let report = scanner(&extractor)
        .scan(&mut catalog, &forced, &mut CountingObserver::default(), &cancel)
        .unwrap();

    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(catalog.all().map(|r| r.id).collect::<Vec<_>>(), ids);
}

#[test]
fn test_batch_hook_runs_every_batch() {
    let env = create_test_env();
    for i in 0..5 {
        std::fs::write(env.path().join(format!("extra{i}.sf2")), b"extra").unwrap();
    }
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let mut observer = CountingObserver::default();
    let options = ScanOptions {
        batch_size: 3,
        ..ScanOptions::new(env.path())
    };

    let report = scanner(&extractor)
        .scan(&mut catalog, &options, &mut observer, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.added, 7);
    assert_eq!(observer.batches, [3, 6]);
}

#[test]
fn test_batch_hook_persists_partial_work() {
    struct Saver<'a>(&'a Path);

    impl ScanObserver for Saver<'_> {
        fn on_batch(&mut self, catalog: &CatalogIndex) -> Result<()> {
            save_catalog(self.0, catalog)
        }
    }

    let env = create_test_env();
    let db = TempDir::new().unwrap();
    let db_path = db.path().join("soundfonts.json");
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let options = ScanOptions {
        batch_size: 1,
        ..ScanOptions::new(env.path())
    };

    scanner(&extractor)
        .scan(&mut catalog, &options, &mut Saver(&db_path), &CancellationToken::new())
        .unwrap();

    let saved = load_catalog(&db_path).unwrap();
    assert_eq!(saved.len(), 2);
}

#[test]
fn test_cancelled_scan_stops_early() {
    struct CancelAfterFirst(CancellationToken);

    impl ScanObserver for CancelAfterFirst {
        fn on_file(&mut self, _: &fontshelf_core::library::ScanProgress<'_>) {
            self.0.cancel();
        }
    }

    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let cancel = CancellationToken::new();

    let report = scanner(&extractor)
        .scan(
            &mut catalog,
            &ScanOptions::new(env.path()),
            &mut CancelAfterFirst(cancel.clone()),
            &cancel,
        )
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.added + report.failed.len(), 1);
    assert!(!report.is_success());
    assert_eq!(catalog.len(), report.added);
}

#[test]
fn test_failed_timbre_is_not_fatal() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();

    let report = LibraryScanner::new(Box::new(extractor))
        .with_timbre_analyzer(|_| {
            Err(FontshelfError::AnalysisFailed {
                message: "silent".into(),
            })
        })
        .scan(
            &mut catalog,
            &ScanOptions::new(env.path()),
            &mut CountingObserver::default(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.added, 2);
    assert!(catalog.all().all(|r| r.timbre.is_none()));
}

/// Renames pianos, drops drums and stops at the first choir.
struct ScriptedReviewer {
    seen: Vec<String>,
}

impl RecordReviewer for ScriptedReviewer {
    fn review(&mut self, mut record: SoundfontRecord, extraction: &Extraction) -> Result<Option<SoundfontRecord>> {
        assert!(extraction.sf2.is_some());
        self.seen.push(record.file_name.clone());
        match record.instrument_type.as_str() {
            "piano" => {
                record.name = "Reviewed Piano".into();
                record.tags.insert("reviewed".into());
                Ok(Some(record))
            }
            "drums" => Ok(None),
            "vocal" => Err(FontshelfError::Cancelled),
            _ => Ok(Some(record)),
        }
    }
}

#[test]
fn test_interactive_reviewer_edits_and_skips() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let mut reviewer = ScriptedReviewer { seen: Vec::new() };
    let options = ScanOptions {
        mode: ScanMode::Interactive,
        ..ScanOptions::new(env.path())
    };

    let report = scanner(&extractor)
        .with_reviewer(&mut reviewer)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(catalog.len(), 1);
    let piano = catalog.all().next().unwrap();
    assert_eq!(piano.name, "Reviewed Piano");
    assert!(piano.tags.contains("reviewed"));
    assert_eq!(reviewer.seen, ["Concert Piano.sf2", "Rock Kit.sf2"]);
}

#[test]
fn test_reviewer_cancel_stops_scan() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let mut reviewer = ScriptedReviewer { seen: Vec::new() };
    let options = ScanOptions {
        mode: ScanMode::Interactive,
        recursive: true,
        ..ScanOptions::new(env.path())
    };

    let report = scanner(&extractor)
        .with_reviewer(&mut reviewer)
        .scan(&mut catalog, &options, &mut CountingObserver::default(), &CancellationToken::new())
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(reviewer.seen.len(), 3);
    assert!(catalog.by_path(&path_key(env.path(), "nested/Choir.sf2")).is_none());
}

#[test]
fn test_reviewer_ignored_outside_interactive_mode() {
    let env = create_test_env();
    let extractor = StubExtractor::default();
    let mut catalog = CatalogIndex::new();
    let mut reviewer = ScriptedReviewer { seen: Vec::new() };

    let report = scanner(&extractor)
        .with_reviewer(&mut reviewer)
        .scan(
            &mut catalog,
            &ScanOptions::new(env.path()),
            &mut CountingObserver::default(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.added, 2);
    assert!(reviewer.seen.is_empty());
}
