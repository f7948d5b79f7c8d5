//! Tile descriptor records.
//!
//! A descriptor names one tile of a granule: the per-dimension index ranges
//! it covers and where the granule lives. No payload is carried; downstream
//! consumers extract the data themselves.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tile of a granule, as emitted by a tile stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDescriptor {
    /// Comma-joined `<dimension>:<start>:<end>` bounds
    pub coordinate_spec: String,
    /// Stable locator of the source granule (a `file://` URL)
    pub source_reference: String,
}

impl TileDescriptor {
    pub fn new(coordinate_spec: impl Into<String>, source_reference: impl Into<String>) -> Self {
        Self {
            coordinate_spec: coordinate_spec.into(),
            source_reference: source_reference.into(),
        }
    }

    /// Deterministic identifier for this tile.
    ///
    /// The same granule and coordinate spec always yield the same id, so
    /// storage keyed by it is content-addressed and re-emitting a tile after
    /// a restart overwrites rather than duplicates.
    pub fn tile_id(&self) -> Uuid {
        let name = format!("{}#{}", self.source_reference, self.coordinate_spec);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
    }

    /// Serialize to the JSON wire form consumed by downstream storage.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
