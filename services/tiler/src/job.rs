//! Tiling job runner.
//!
//! Drives one [`TileSpecStream`] per granule: tiles are saved to the store
//! in batches and the stream cursor is checkpointed after every successful
//! save. A rerun after a crash resumes each granule from its last
//! checkpoint, and the content-derived tile ids make any replayed tile a
//! no-op in the store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use granule_reader::GranuleOpener;
use storage::TileStore;
use tiler_common::{ExecutionContext, MemoryExecutionContext, ScopedContext, TileDescriptor};
use tiling::{resolve_source_reference, SliceConfig, TileSpecStream};

/// Outcome of tiling one granule.
#[derive(Debug, Clone, Serialize)]
pub struct GranuleSummary {
    pub source_reference: String,
    /// Tiles in the granule
    pub total_tiles: usize,
    /// Cursor restored on open
    pub resumed_from: usize,
    /// Tiles emitted during this run
    pub emitted: usize,
    /// Tiles the store had not seen before
    pub stored: usize,
}

/// A granule that could not be tiled.
#[derive(Debug, Clone, Serialize)]
pub struct GranuleFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a whole job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub granules: Vec<GranuleSummary>,
    pub failures: Vec<GranuleFailure>,
}

impl JobSummary {
    pub fn total_emitted(&self) -> usize {
        self.granules.iter().map(|g| g.emitted).sum()
    }

    pub fn total_stored(&self) -> usize {
        self.granules.iter().map(|g| g.stored).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tiles granules into a store, checkpointing into an execution context.
pub struct TilingJob<O, C, S> {
    opener: O,
    slicer: SliceConfig,
    context: C,
    store: S,
    batch_size: usize,
}

impl<O, C, S> TilingJob<O, C, S>
where
    O: GranuleOpener,
    C: ExecutionContext,
    S: TileStore,
{
    pub fn new(opener: O, slicer: SliceConfig, context: C, store: S) -> Self {
        Self {
            opener,
            slicer,
            context,
            store,
            batch_size: 1,
        }
    }

    /// Number of tiles per store write. Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Tile every granule, continuing past failed ones.
    pub fn run<P: AsRef<Path>>(&mut self, granules: &[P]) -> JobSummary {
        let started_at = Utc::now();
        let mut summary = JobSummary {
            started_at,
            finished_at: started_at,
            granules: Vec::new(),
            failures: Vec::new(),
        };

        for path in granules {
            let path = path.as_ref();
            match self.run_granule(path) {
                Ok(granule) => summary.granules.push(granule),
                Err(e) => {
                    error!(path = %path.display(), error = %format!("{:#}", e), "Granule failed");
                    summary.failures.push(GranuleFailure {
                        path: path.to_path_buf(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        summary.finished_at = Utc::now();
        info!(
            granules = summary.granules.len(),
            failures = summary.failures.len(),
            emitted = summary.total_emitted(),
            stored = summary.total_stored(),
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "Tiling job finished"
        );
        summary
    }

    /// Tile one granule, resuming from its checkpoint.
    pub fn run_granule(&mut self, path: &Path) -> Result<GranuleSummary> {
        let source_reference = resolve_source_reference(path)
            .with_context(|| format!("Failed to resolve granule path {:?}", path))?;
        let mut context = ScopedContext::new(&mut self.context, source_reference.clone());

        let mut stream = TileSpecStream::new(&self.opener, self.slicer.clone(), path)?;
        stream.open(&mut context)?;

        let resumed_from = stream.cursor();
        let total_tiles = stream.len();

        let (emitted, stored) =
            match drain(&mut self.store, &mut stream, &mut context, self.batch_size) {
                Ok(counts) => counts,
                Err(e) => {
                    if let Err(close_err) = stream.close() {
                        warn!(error = %close_err, "Failed to close granule after error");
                    }
                    return Err(e);
                }
            };
        stream.close()?;

        info!(
            source = %source_reference,
            total = total_tiles,
            resumed_from = resumed_from,
            emitted = emitted,
            stored = stored,
            "Granule tiled"
        );

        Ok(GranuleSummary {
            source_reference,
            total_tiles,
            resumed_from,
            emitted,
            stored,
        })
    }

    /// List the tile specs of a granule without touching the checkpoint
    /// store or the tile store.
    pub fn plan_granule(&self, path: &Path) -> Result<Vec<String>> {
        let mut scratch = MemoryExecutionContext::new();
        let mut stream = TileSpecStream::new(&self.opener, self.slicer.clone(), path)?;
        stream.open(&mut scratch)?;
        let specs = stream.plan().map(|plan| plan.to_vec()).unwrap_or_default();
        stream.close()?;
        Ok(specs)
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (C, S) {
        (self.context, self.store)
    }
}

/// Emit the remaining tiles of an open stream into the store.
///
/// Returns the tiles emitted and the tiles newly stored.
fn drain<O, C, S>(
    store: &mut S,
    stream: &mut TileSpecStream<O>,
    context: &mut C,
    batch_size: usize,
) -> Result<(usize, usize)>
where
    O: GranuleOpener,
    C: ExecutionContext,
    S: TileStore,
{
    let mut batch: Vec<TileDescriptor> = Vec::with_capacity(batch_size);
    let mut emitted = 0;
    let mut stored = 0;

    while let Some(tile) = stream.next_tile()? {
        emitted += 1;
        batch.push(tile);
        if batch.len() >= batch_size {
            stored += commit(store, stream, context, &mut batch)?;
        }
    }
    if !batch.is_empty() {
        stored += commit(store, stream, context, &mut batch)?;
    }

    Ok((emitted, stored))
}

/// Save a batch, then checkpoint the cursor past it.
fn commit<O, C, S>(
    store: &mut S,
    stream: &TileSpecStream<O>,
    context: &mut C,
    batch: &mut Vec<TileDescriptor>,
) -> Result<usize>
where
    O: GranuleOpener,
    C: ExecutionContext,
    S: TileStore,
{
    let stored = store
        .save(batch.as_slice())
        .with_context(|| format!("Failed to save {} tile(s)", batch.len()))?;
    stream.checkpoint(context)?;
    batch.clear();
    Ok(stored)
}
