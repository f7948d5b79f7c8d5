//! End-to-end tests for the tiling job runner.

use std::path::Path;

use storage::{
    DirectoryTileStore, FileExecutionContext, MemoryTileStore, StoreError, StoreResult, TileStore,
};
use test_utils::fixtures::{self, ASCAT_PATH, ASCAT_ROWS, SMALL_PATH};
use tiler::TilingJob;
use tiler_common::{ExecutionContext, MemoryExecutionContext, TileDescriptor};
use tiling::{SliceConfig, CURRENT_TILE_SPEC_INDEX_KEY};

fn rows_config() -> SliceConfig {
    SliceConfig::new(["NUMROWS", "NUMCELLS"], "NUMROWS")
}

fn cursor_key(path: &str) -> String {
    format!("file://{}/{}", path, CURRENT_TILE_SPEC_INDEX_KEY)
}

/// A store that fails once it has accepted `allowed` batches.
struct FailingStore {
    inner: MemoryTileStore,
    allowed: usize,
}

impl TileStore for FailingStore {
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize> {
        if self.allowed == 0 {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.allowed -= 1;
        self.inner.save(tiles)
    }
}

// ============================================================================
// Resume after interruption
// ============================================================================

#[test]
fn test_interrupted_job_resumes_with_remaining_tiles_only() {
    let opener = fixtures::fixture_opener();
    let mut context = MemoryExecutionContext::new();
    let mut store = FailingStore {
        inner: MemoryTileStore::new(),
        allowed: 10,
    };

    // First run dies after 10 committed tiles
    let mut job = TilingJob::new(&opener, rows_config(), &mut context, &mut store);
    let err = job.run_granule(Path::new(ASCAT_PATH)).unwrap_err();
    assert!(format!("{:#}", err).contains("disk full"));
    drop(job);

    assert_eq!(context.get_int(&cursor_key(ASCAT_PATH)).unwrap(), Some(10));
    assert_eq!(store.inner.len(), 10);
    assert_eq!(opener.open_handles(), 0);

    // Rerun with the store healthy again
    store.allowed = usize::MAX;
    let mut job = TilingJob::new(&opener, rows_config(), &mut context, &mut store);
    let summary = job.run_granule(Path::new(ASCAT_PATH)).unwrap();

    assert_eq!(summary.resumed_from, 10);
    assert_eq!(summary.emitted, ASCAT_ROWS - 10);
    assert_eq!(summary.stored, ASCAT_ROWS - 10);
    assert_eq!(store.inner.len(), ASCAT_ROWS);
    assert_eq!(store.inner.writes(), ASCAT_ROWS);
}

#[test]
fn test_replayed_tiles_do_not_duplicate_records() {
    let opener = fixtures::fixture_opener();
    let mut context = MemoryExecutionContext::new();
    let mut store = MemoryTileStore::new();

    let mut job = TilingJob::new(&opener, rows_config(), &mut context, &mut store);
    job.run_granule(Path::new(ASCAT_PATH)).unwrap();
    drop(job);

    // Simulate a crash that lost the last checkpoints but not the saves
    context.put_int(&cursor_key(ASCAT_PATH), 3000).unwrap();

    let mut job = TilingJob::new(&opener, rows_config(), &mut context, &mut store);
    let summary = job.run_granule(Path::new(ASCAT_PATH)).unwrap();
    assert_eq!(summary.emitted, ASCAT_ROWS - 3000);
    assert_eq!(summary.stored, 0);
    assert_eq!(store.len(), ASCAT_ROWS);
}

#[test]
fn test_completed_granule_emits_nothing_on_rerun() {
    let opener = fixtures::fixture_opener();
    let mut job = TilingJob::new(
        &opener,
        rows_config(),
        MemoryExecutionContext::new(),
        MemoryTileStore::new(),
    )
    .with_batch_size(16);

    let first = job.run(&[SMALL_PATH]);
    let second = job.run(&[SMALL_PATH]);
    assert_eq!(first.total_emitted(), 2);
    assert_eq!(second.total_emitted(), 0);
    assert_eq!(second.granules[0].resumed_from, 2);
}

#[test]
fn test_alternate_path_spelling_shares_checkpoint_and_records() {
    let opener = fixtures::fixture_opener();
    let mut job = TilingJob::new(
        &opener,
        rows_config(),
        MemoryExecutionContext::new(),
        MemoryTileStore::new(),
    );

    let first = job.run_granule(Path::new(SMALL_PATH)).unwrap();
    let second = job.run_granule(Path::new("/granules/./small.nc")).unwrap();

    assert_eq!(second.source_reference, first.source_reference);
    assert_eq!(second.resumed_from, first.total_tiles);
    assert_eq!(second.emitted, 0);
    assert_eq!(job.store().len(), 2);
    assert_eq!(job.context().len(), 1);
}

#[test]
fn test_on_disk_path_spellings_share_checkpoint_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let granule = fixtures::write_manifest(dir.path(), "small.json", &fixtures::small_granule());
    let spellings = [
        granule.clone(),
        dir.path().join("sub").join("..").join("small.json"),
    ];
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let mut job = TilingJob::new(
        granule_reader::ManifestOpener,
        rows_config(),
        MemoryExecutionContext::new(),
        MemoryTileStore::new(),
    );
    let summary = job.run(&spellings);
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.granules[1].resumed_from, 2);
    assert_eq!(summary.total_emitted(), 2);
    assert_eq!(job.store().len(), 2);

    #[cfg(unix)]
    {
        let link = dir.path().join("link.json");
        std::os::unix::fs::symlink(&granule, &link).unwrap();
        let linked = job.run_granule(&link).unwrap();
        assert_eq!(linked.emitted, 0);
        assert_eq!(job.store().len(), 2);
    }
}

// ============================================================================
// Multiple granules
// ============================================================================

#[test]
fn test_granules_keep_separate_checkpoints() {
    let opener = fixtures::fixture_opener();
    let mut job = TilingJob::new(
        &opener,
        rows_config(),
        MemoryExecutionContext::new(),
        MemoryTileStore::new(),
    )
    .with_batch_size(100);

    let summary = job.run(&[ASCAT_PATH, SMALL_PATH]);
    assert!(summary.is_success());
    assert_eq!(summary.total_stored(), ASCAT_ROWS + 2);

    let (context, store) = job.into_parts();
    assert_eq!(context.len(), 2);
    assert_eq!(
        context.get_int(&cursor_key(ASCAT_PATH)).unwrap(),
        Some(ASCAT_ROWS as i64)
    );
    assert_eq!(context.get_int(&cursor_key(SMALL_PATH)).unwrap(), Some(2));
    assert_eq!(store.len(), ASCAT_ROWS + 2);
}

#[test]
fn test_misconfigured_granule_is_reported() {
    // SMAP has no named dimensions, so a name-addressed config cannot tile it
    let opener = fixtures::fixture_opener();
    let mut job = TilingJob::new(
        &opener,
        rows_config(),
        MemoryExecutionContext::new(),
        MemoryTileStore::new(),
    );

    let summary = job.run(&[fixtures::SMAP_PATH, SMALL_PATH]);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("None of the requested dimensions"));
    assert_eq!(summary.total_stored(), 2);
}

// ============================================================================
// On-disk backends
// ============================================================================

#[test]
fn test_file_backends_survive_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let granule = fixtures::write_manifest(dir.path(), "small.json", &fixtures::small_granule());
    let checkpoint_path = dir.path().join("state/checkpoints.json");
    let tiles_dir = dir.path().join("tiles");

    for expected_emitted in [2, 0] {
        let context = FileExecutionContext::open(&checkpoint_path).unwrap();
        let store = DirectoryTileStore::open(&tiles_dir).unwrap();
        let mut job = TilingJob::new(granule_reader::ManifestOpener, rows_config(), context, store);

        let summary = job.run(&[&granule]);
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(summary.total_emitted(), expected_emitted);
    }

    let store = DirectoryTileStore::open(&tiles_dir).unwrap();
    assert_eq!(store.len().unwrap(), 2);

    let canonical = std::fs::canonicalize(&granule).unwrap();
    let tile = TileDescriptor::new(
        "NUMROWS:1:2,NUMCELLS:0:82",
        format!("file://{}", canonical.display()),
    );
    assert_eq!(store.get(&tile.tile_id()).unwrap(), Some(tile));
}
