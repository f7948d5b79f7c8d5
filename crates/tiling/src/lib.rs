//! Granule tiling.
//!
//! Decomposes a scientific array granule into tiles addressed by
//! per-dimension index ranges, and streams them with checkpoint/restart
//! support.
//!
//! # Architecture
//!
//! - [`catalog`]: extracts the dimension → length mapping from a granule,
//!   by declared name or by the axes of a representative variable
//! - [`slicer`]: plans the ordered tile specs (cartesian product of the
//!   per-dimension ranges, one slice per index of the slice dimension)
//! - [`stream`]: the resumable [`TileSpecStream`] over a plan
//!
//! # Example
//!
//! ```
//! use granule_reader::{MemoryGranule, MemoryOpener};
//! use tiler_common::MemoryExecutionContext;
//! use tiling::{SliceConfig, TileSpecStream};
//!
//! let opener = MemoryOpener::new().with_granule(
//!     "/data/g.nc",
//!     MemoryGranule::new().with_dimension("NUMROWS", 2).with_dimension("NUMCELLS", 82),
//! );
//! let config = SliceConfig::new(["NUMROWS", "NUMCELLS"], "NUMROWS");
//! let mut ctx = MemoryExecutionContext::new();
//!
//! let mut stream = TileSpecStream::new(&opener, config, "/data/g.nc")?;
//! stream.open(&mut ctx)?;
//! let first = stream.next_tile()?.unwrap();
//! assert_eq!(first.coordinate_spec, "NUMROWS:0:1,NUMCELLS:0:82");
//! stream.checkpoint(&mut ctx)?;
//! stream.close()?;
//! # Ok::<(), tiling::TilingError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod slicer;
pub mod stream;

// Re-exports
pub use catalog::{extract_dimensions, DimensionLengths};
pub use config::{SliceConfig, SliceStrategy, DEFAULT_DIMENSION_NAME_PREFIX};
pub use error::{ConfigurationError, OpenCause, Result, TilingError};
pub use slicer::{
    format_tile_spec, generate_tile_boundary_slices, parse_tile_spec, Advance, DimensionBound,
    SpecParseError, TileSpecPlan,
};
pub use stream::{resolve_source_reference, TileSpecStream, CURRENT_TILE_SPEC_INDEX_KEY};
