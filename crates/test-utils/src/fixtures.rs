//! Common granule fixtures.
//!
//! The shapes mirror real L2 products so tile counts in tests match what
//! the tiler produces on the actual files.

use granule_reader::{MemoryGranule, MemoryOpener};
use std::path::{Path, PathBuf};

/// ASCAT MetOp-B L2 ocean wind granule (named dimensions).
pub const ASCAT_PATH: &str =
    "/granules/ascat_20121029_010301_metopb_00588_eps_o_coa_2101_ovw.l2.nc";

/// SMAP L2B sea surface salinity granule (plain HDF5, no dimension names).
pub const SMAP_PATH: &str = "/granules/SMAP_L2B_SSS_04892_20160101T005507_R13080.h5";

/// Two-row granule for hand-checkable expectations.
pub const SMALL_PATH: &str = "/granules/small.nc";

/// Row/cell counts of the ASCAT fixture
pub const ASCAT_ROWS: usize = 3163;
pub const ASCAT_CELLS: usize = 82;

/// Axis lengths of the SMAP fixture swath variables
pub const SMAP_AXIS0: usize = 812;
pub const SMAP_AXIS1: usize = 1624;

pub fn ascat_granule() -> MemoryGranule {
    MemoryGranule::new()
        .with_dimension("NUMROWS", ASCAT_ROWS)
        .with_dimension("NUMCELLS", ASCAT_CELLS)
        .with_variable("time", vec![ASCAT_ROWS, ASCAT_CELLS])
        .with_variable("lat", vec![ASCAT_ROWS, ASCAT_CELLS])
        .with_variable("lon", vec![ASCAT_ROWS, ASCAT_CELLS])
        .with_variable("wind_speed", vec![ASCAT_ROWS, ASCAT_CELLS])
}

pub fn smap_granule() -> MemoryGranule {
    MemoryGranule::new()
        .with_variable("row_time", vec![SMAP_AXIS0])
        .with_variable("lat", vec![SMAP_AXIS0, SMAP_AXIS1])
        .with_variable("lon", vec![SMAP_AXIS0, SMAP_AXIS1])
        .with_variable("smap_sss", vec![SMAP_AXIS0, SMAP_AXIS1])
}

pub fn small_granule() -> MemoryGranule {
    MemoryGranule::new()
        .with_dimension("NUMROWS", 2)
        .with_dimension("NUMCELLS", 82)
        .with_variable("lat", vec![2, 82])
}

/// An opener with every fixture registered under its `*_PATH` constant.
pub fn fixture_opener() -> MemoryOpener {
    MemoryOpener::new()
        .with_granule(ASCAT_PATH, ascat_granule())
        .with_granule(SMAP_PATH, smap_granule())
        .with_granule(SMALL_PATH, small_granule())
}

/// Write a granule as a JSON manifest into `dir` and return its path.
pub fn write_manifest(dir: &Path, file_name: &str, granule: &MemoryGranule) -> PathBuf {
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(granule).expect("Failed to serialize manifest");
    std::fs::write(&path, json).expect("Failed to write manifest");
    path
}
