//! JSON granule manifests.
//!
//! A manifest records the structure of a granule without its data:
//!
//! ```json
//! {
//!   "dimensions": [{ "name": "NUMROWS", "len": 3163 }, { "name": "NUMCELLS", "len": 82 }],
//!   "variables": [{ "short_name": "lat", "shape": [3163, 82] }]
//! }
//! ```

use std::path::Path;
use tracing::debug;

use crate::error::{GranuleError, GranuleResult};
use crate::memory::MemoryGranule;
use crate::GranuleOpener;

/// Opens `.json` granule manifests from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestOpener;

impl ManifestOpener {
    /// Parse a manifest document.
    pub fn parse(content: &str) -> GranuleResult<MemoryGranule> {
        serde_json::from_str(content)
            .map_err(|e| GranuleError::InvalidFormat(format!("Failed to parse manifest: {}", e)))
    }
}

impl GranuleOpener for ManifestOpener {
    type Granule = MemoryGranule;

    fn open(&self, path: &Path) -> GranuleResult<MemoryGranule> {
        let content = std::fs::read_to_string(path)?;
        let granule = Self::parse(&content).map_err(|e| match e {
            GranuleError::InvalidFormat(msg) => {
                GranuleError::InvalidFormat(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        debug!(
            path = %path.display(),
            dimensions = granule.dimensions.len(),
            variables = granule.variables.len(),
            "Loaded granule manifest"
        );

        Ok(granule)
    }
}
