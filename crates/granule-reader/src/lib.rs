//! Granule handle abstraction for scientific array files.
//!
//! A granule is one source file (NetCDF-4, HDF5, ...) that gets decomposed
//! into tiles. Tiling only needs the file's structural metadata, so this
//! crate exposes exactly that:
//!
//! - declared dimensions (name and length)
//! - variables (short name and per-axis lengths)
//!
//! # Backends
//!
//! - [`MemoryGranule`] / [`MemoryOpener`]: in-process granules, used by tests
//!   and fixtures
//! - [`ManifestOpener`]: reads a JSON manifest describing a granule's
//!   structure, handy when the native libraries are not installed
//! - `NetCdfOpener` (feature `netcdf`): native libnetcdf/HDF5 reading
//!
//! # HDF5 Dimension Names
//!
//! Plain HDF5 files declare no dimension names. libnetcdf surfaces their axes
//! as `phony_dim_<n>`, and callers that slice such files address axes by
//! position instead of by name.

pub mod error;
pub mod manifest;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod native;

pub use error::{GranuleError, GranuleResult};
pub use manifest::ManifestOpener;
pub use memory::{MemoryGranule, MemoryOpener};
#[cfg(feature = "netcdf")]
pub use native::{silence_hdf5_errors, NetCdfGranule, NetCdfOpener};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dimension declared by a granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionInfo {
    /// Dimension short name
    pub name: String,
    /// Number of indices along the dimension
    pub len: usize,
}

impl DimensionInfo {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// A variable declared by a granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    /// Variable short name (no group path)
    pub short_name: String,
    /// Length of each axis, outermost first
    pub shape: Vec<usize>,
}

impl VariableInfo {
    pub fn new(short_name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            short_name: short_name.into(),
            shape,
        }
    }

    /// Number of declared dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Length of the axis at `index`, if the variable has that many axes.
    pub fn axis_len(&self, index: usize) -> Option<usize> {
        self.shape.get(index).copied()
    }
}

/// An open granule handle.
pub trait Granule {
    /// Dimensions in declaration order.
    fn dimensions(&self) -> GranuleResult<Vec<DimensionInfo>>;

    /// Variables in declaration order.
    fn variables(&self) -> GranuleResult<Vec<VariableInfo>>;

    /// Release the handle.
    fn close(self) -> GranuleResult<()>
    where
        Self: Sized;
}

/// Opens granules from paths.
pub trait GranuleOpener {
    type Granule: Granule;

    fn open(&self, path: &Path) -> GranuleResult<Self::Granule>;
}

impl<O: GranuleOpener + ?Sized> GranuleOpener for &O {
    type Granule = O::Granule;

    fn open(&self, path: &Path) -> GranuleResult<Self::Granule> {
        (**self).open(path)
    }
}
