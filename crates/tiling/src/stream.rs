//! Resumable tile spec streams.
//!
//! A [`TileSpecStream`] walks the tile specs of one granule, emitting a
//! [`TileDescriptor`] per spec. Its cursor is the unit of resumability: it
//! is restored from an [`ExecutionContext`] on open and written back by
//! [`TileSpecStream::checkpoint`], which the driver calls once a tile has
//! been committed downstream. A crash between emit and checkpoint replays
//! the tile on restart; no tile is ever skipped.
//!
//! # Lifecycle
//!
//! ```text
//! Closed --open()--> Open --next_tile()*--> Open --close()--> Closed
//! ```

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};

use granule_reader::{Granule, GranuleError, GranuleOpener};
use tiler_common::{ExecutionContext, TileDescriptor};

use crate::catalog::extract_dimensions;
use crate::config::{SliceConfig, SliceStrategy};
use crate::error::{OpenCause, Result, TilingError};
use crate::slicer::{Advance, TileSpecPlan};

/// Execution context key holding the index of the next tile spec.
pub const CURRENT_TILE_SPEC_INDEX_KEY: &str = "current.tile.spec.index";

/// Stable `file://` locator for a granule path.
///
/// Existing paths are canonicalized, so symlinks and `.`/`..` spellings of
/// one file share a locator. Paths that do not exist on disk are made
/// absolute against the current directory and normalized lexically.
pub fn resolve_source_reference(path: &Path) -> std::io::Result<String> {
    let absolute = match std::fs::canonicalize(path) {
        Ok(canonical) => canonical,
        Err(_) if path.is_absolute() => normalize_lexically(path),
        Err(_) => normalize_lexically(&std::env::current_dir()?.join(path)),
    };
    Ok(format!("file://{}", absolute.display()))
}

/// Drop `.` components and resolve `..` against the preceding component.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

struct OpenGranule<G> {
    granule: G,
    plan: TileSpecPlan,
}

/// A restartable stream of tile descriptors over one granule.
pub struct TileSpecStream<O: GranuleOpener> {
    opener: O,
    config: SliceConfig,
    strategy: SliceStrategy,
    path: PathBuf,
    source_reference: String,
    cursor: usize,
    open: Option<OpenGranule<O::Granule>>,
}

impl<O: GranuleOpener> TileSpecStream<O> {
    /// Create a closed stream. The configuration is validated here.
    pub fn new(opener: O, config: SliceConfig, path: impl Into<PathBuf>) -> Result<Self> {
        let strategy = config.strategy()?;
        let path = path.into();
        let source_reference = format!("file://{}", normalize_lexically(&path).display());

        Ok(Self {
            opener,
            config,
            strategy,
            path,
            source_reference,
            cursor: 0,
            open: None,
        })
    }

    /// Open the granule, plan its tiles and restore the cursor.
    ///
    /// An absent checkpoint starts at 0 and is written back immediately.
    pub fn open<C>(&mut self, ctx: &mut C) -> Result<()>
    where
        C: ExecutionContext + ?Sized,
    {
        if self.open.is_some() {
            return Err(TilingError::AlreadyOpen(self.source_reference.clone()));
        }

        let source_reference = resolve_source_reference(&self.path)
            .map_err(|e| self.open_error(GranuleError::from(e).into()))?;
        self.source_reference = source_reference;

        let granule = self
            .opener
            .open(&self.path)
            .map_err(|e| self.open_error(e.into()))?;

        let (plan, cursor) = match self.prepare(&granule, ctx) {
            Ok(prepared) => prepared,
            Err(cause) => {
                if let Err(e) = granule.close() {
                    warn!(
                        source = %self.source_reference,
                        error = %e,
                        "Failed to release granule after open failure"
                    );
                }
                return Err(self.open_error(cause));
            }
        };

        if tracing::enabled!(Level::TRACE) {
            for (index, spec) in plan.iter().enumerate() {
                trace!(index = index, spec = %spec, "Tile specification");
            }
        }

        info!(
            source = %self.source_reference,
            tiles = plan.len(),
            cursor = cursor,
            slice_by = %self.strategy.slice_dimension_id(),
            positional = self.strategy.is_positional(),
            "Opened tile stream"
        );

        self.cursor = cursor;
        self.open = Some(OpenGranule { granule, plan });
        Ok(())
    }

    fn prepare<C>(
        &self,
        granule: &O::Granule,
        ctx: &mut C,
    ) -> std::result::Result<(TileSpecPlan, usize), OpenCause>
    where
        C: ExecutionContext + ?Sized,
    {
        let lengths = extract_dimensions(granule, &self.config, &self.strategy)?;
        let plan = TileSpecPlan::new(&lengths, &self.strategy.slice_dimension_id());

        let cursor = match ctx.get_int(CURRENT_TILE_SPEC_INDEX_KEY)? {
            None => {
                ctx.put_int(CURRENT_TILE_SPEC_INDEX_KEY, 0)?;
                0
            }
            Some(stored) => usize::try_from(stored)
                .ok()
                .filter(|cursor| *cursor <= plan.len())
                .ok_or(OpenCause::CursorOutOfRange {
                    cursor: stored,
                    len: plan.len(),
                })?,
        };

        if cursor > 0 {
            debug!(
                source = %self.source_reference,
                cursor = cursor,
                "Resuming tile stream from checkpoint"
            );
        }

        Ok((plan, cursor))
    }

    fn open_error(&self, cause: OpenCause) -> TilingError {
        TilingError::Open {
            source_reference: self.source_reference.clone(),
            cause,
        }
    }

    /// Emit the tile at the cursor and advance it.
    ///
    /// Returns `Ok(None)` once every tile has been emitted, on every call
    /// after that too. The cursor is not persisted here.
    pub fn next_tile(&mut self) -> Result<Option<TileDescriptor>> {
        let open = self.open.as_ref().ok_or(TilingError::NotOpen)?;

        match open.plan.advance(self.cursor, &self.source_reference) {
            Advance::Emitted {
                descriptor,
                next_cursor,
            } => {
                trace!(
                    index = self.cursor,
                    spec = %descriptor.coordinate_spec,
                    "Emitting tile"
                );
                self.cursor = next_cursor;
                Ok(Some(descriptor))
            }
            Advance::EndOfStream => Ok(None),
        }
    }

    /// Persist the cursor.
    pub fn checkpoint<C>(&self, ctx: &mut C) -> Result<()>
    where
        C: ExecutionContext + ?Sized,
    {
        if self.open.is_none() {
            return Err(TilingError::NotOpen);
        }

        ctx.put_int(CURRENT_TILE_SPEC_INDEX_KEY, self.cursor as i64)
            .map_err(|source| TilingError::Checkpoint {
                key: CURRENT_TILE_SPEC_INDEX_KEY.to_string(),
                source,
            })
    }

    /// Release the granule. Closing a closed stream does nothing.
    ///
    /// The stream is closed afterwards even if releasing the handle failed.
    pub fn close(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };

        open.granule.close().map_err(|source| TilingError::Close {
            source_reference: self.source_reference.clone(),
            source,
        })?;

        info!(
            source = %self.source_reference,
            cursor = self.cursor,
            tiles = open.plan.len(),
            "Closed tile stream"
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Index of the next tile to emit.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of tiles in the open granule, 0 when closed.
    pub fn len(&self) -> usize {
        self.open.as_ref().map_or(0, |open| open.plan.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tiles left to emit.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.cursor)
    }

    pub fn source_reference(&self) -> &str {
        &self.source_reference
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn strategy(&self) -> &SliceStrategy {
        &self.strategy
    }

    /// The tile plan of the open granule.
    pub fn plan(&self) -> Option<&TileSpecPlan> {
        self.open.as_ref().map(|open| &open.plan)
    }
}

/// Yields the remaining tiles; yields nothing while the stream is closed.
impl<O: GranuleOpener> Iterator for TileSpecStream<O> {
    type Item = Result<TileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_open() {
            return None;
        }
        self.next_tile().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use granule_reader::{MemoryGranule, MemoryOpener};
    use tiler_common::MemoryExecutionContext;

    fn opener() -> MemoryOpener {
        MemoryOpener::new().with_granule(
            "/g/rows.nc",
            MemoryGranule::new()
                .with_dimension("NUMROWS", 3)
                .with_dimension("NUMCELLS", 4),
        )
    }

    fn stream(opener: &MemoryOpener) -> TileSpecStream<&MemoryOpener> {
        TileSpecStream::new(
            opener,
            SliceConfig::new(["NUMROWS", "NUMCELLS"], "NUMROWS"),
            "/g/rows.nc",
        )
        .unwrap()
    }

    #[test]
    fn test_source_reference_is_file_url() {
        assert_eq!(
            resolve_source_reference(Path::new("/data/g.nc")).unwrap(),
            "file:///data/g.nc"
        );
        let relative = resolve_source_reference(Path::new("g.nc")).unwrap();
        assert!(relative.starts_with("file:///"));
        assert!(relative.ends_with("/g.nc"));
    }

    #[test]
    fn test_source_reference_normalizes_missing_paths() {
        for spelling in [
            "/granules/./small.nc",
            "/granules/l2/../small.nc",
            "/granules//small.nc",
        ] {
            assert_eq!(
                resolve_source_reference(Path::new(spelling)).unwrap(),
                "file:///granules/small.nc",
                "{}",
                spelling
            );
        }
        assert_eq!(
            resolve_source_reference(Path::new("/../granules/small.nc")).unwrap(),
            "file:///granules/small.nc"
        );
    }

    #[test]
    fn test_source_reference_canonicalizes_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("l2")).unwrap();
        let file = dir.path().join("g.nc");
        std::fs::write(&file, b"").unwrap();

        let expected = format!("file://{}", std::fs::canonicalize(&file).unwrap().display());
        let dotted = dir.path().join("l2").join("..").join(".").join("g.nc");
        assert_eq!(resolve_source_reference(&file).unwrap(), expected);
        assert_eq!(resolve_source_reference(&dotted).unwrap(), expected);

        #[cfg(unix)]
        {
            let link = dir.path().join("link.nc");
            std::os::unix::fs::symlink(&file, &link).unwrap();
            assert_eq!(resolve_source_reference(&link).unwrap(), expected);
        }
    }

    #[test]
    fn test_open_writes_default_cursor() {
        let opener = opener();
        let mut ctx = MemoryExecutionContext::new();
        let mut s = stream(&opener);

        s.open(&mut ctx).unwrap();
        assert_eq!(ctx.get_int(CURRENT_TILE_SPEC_INDEX_KEY).unwrap(), Some(0));
        assert_eq!(s.len(), 3);
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn test_next_does_not_checkpoint() {
        let opener = opener();
        let mut ctx = MemoryExecutionContext::new();
        let mut s = stream(&opener);
        s.open(&mut ctx).unwrap();

        let tile = s.next_tile().unwrap().unwrap();
        assert_eq!(tile.coordinate_spec, "NUMROWS:0:1,NUMCELLS:0:4");
        assert_eq!(tile.source_reference, "file:///g/rows.nc");
        assert_eq!(ctx.get_int(CURRENT_TILE_SPEC_INDEX_KEY).unwrap(), Some(0));

        s.checkpoint(&mut ctx).unwrap();
        assert_eq!(ctx.get_int(CURRENT_TILE_SPEC_INDEX_KEY).unwrap(), Some(1));
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let opener = opener();
        let mut ctx = MemoryExecutionContext::new();
        let mut s = stream(&opener);
        s.open(&mut ctx).unwrap();
        assert!(matches!(s.open(&mut ctx), Err(TilingError::AlreadyOpen(_))));
        assert_eq!(opener.open_handles(), 1);
    }

    #[test]
    fn test_closed_stream_operations() {
        let opener = opener();
        let mut ctx = MemoryExecutionContext::new();
        let mut s = stream(&opener);
        assert!(matches!(s.next_tile(), Err(TilingError::NotOpen)));
        assert!(matches!(s.checkpoint(&mut ctx), Err(TilingError::NotOpen)));
        assert!(s.close().is_ok());
        assert!(s.next().is_none());
    }

    #[test]
    fn test_checkpoint_out_of_range_fails_open_and_releases_granule() {
        let opener = opener();
        let mut ctx = MemoryExecutionContext::new();
        ctx.put_int(CURRENT_TILE_SPEC_INDEX_KEY, 4).unwrap();
        let mut s = stream(&opener);

        match s.open(&mut ctx) {
            Err(TilingError::Open {
                cause: OpenCause::CursorOutOfRange { cursor, len },
                ..
            }) => {
                assert_eq!(cursor, 4);
                assert_eq!(len, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!s.is_open());
        assert_eq!(opener.open_handles(), 0);
    }
}
