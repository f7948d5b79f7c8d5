//! Native NetCDF reading using the netcdf library.
//!
//! Wraps libnetcdf (which in turn wraps HDF5), so both NetCDF-4 and plain
//! HDF5 granules can be opened. Only root-group metadata is read.

use std::path::Path;
use std::sync::Once;
use tracing::debug;

use crate::error::{GranuleError, GranuleResult};
use crate::{DimensionInfo, Granule, GranuleOpener, VariableInfo};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when errors are
/// handled by the Rust code, e.g. when probing a plain HDF5 file for
/// dimension scales that don't exist. Call early, before any HDF5/NetCDF
/// operation; repeated calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// An open NetCDF/HDF5 file.
pub struct NetCdfGranule {
    file: netcdf::File,
}

impl Granule for NetCdfGranule {
    fn dimensions(&self) -> GranuleResult<Vec<DimensionInfo>> {
        Ok(self
            .file
            .dimensions()
            .map(|dim| DimensionInfo::new(dim.name(), dim.len()))
            .collect())
    }

    fn variables(&self) -> GranuleResult<Vec<VariableInfo>> {
        Ok(self
            .file
            .variables()
            .map(|var| {
                let shape = var.dimensions().iter().map(|d| d.len()).collect();
                VariableInfo::new(var.name(), shape)
            })
            .collect())
    }

    fn close(self) -> GranuleResult<()> {
        // libnetcdf releases the handle when the file is dropped
        drop(self.file);
        Ok(())
    }
}

/// Opens granules with libnetcdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfOpener;

impl GranuleOpener for NetCdfOpener {
    type Granule = NetCdfGranule;

    fn open(&self, path: &Path) -> GranuleResult<NetCdfGranule> {
        silence_hdf5_errors();

        if !path.exists() {
            return Err(GranuleError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let file = netcdf::open(path).map_err(|e| {
            GranuleError::InvalidFormat(format!("Failed to open NetCDF {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "Opened NetCDF granule");

        Ok(NetCdfGranule { file })
    }
}
