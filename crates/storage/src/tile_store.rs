//! Tile record stores.
//!
//! Records are keyed by [`TileDescriptor::tile_id`], which is derived from
//! the descriptor's content. Saving a tile that is already present leaves
//! the stored record untouched, so replaying tiles after a restart is safe.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use tiler_common::TileDescriptor;

use crate::error::StoreResult;

/// Destination for emitted tile records.
pub trait TileStore {
    /// Persist a batch of tiles. Returns how many were not already stored.
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize>;
}

impl<S: TileStore + ?Sized> TileStore for &mut S {
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize> {
        (**self).save(tiles)
    }
}

impl<S: TileStore + ?Sized> TileStore for Box<S> {
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize> {
        (**self).save(tiles)
    }
}

/// In-memory tile store holding the serialized records.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileStore {
    records: BTreeMap<Uuid, Bytes>,
    writes: usize,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tiles stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total tiles passed to `save`, duplicates included.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.records.contains_key(id)
    }

    /// Raw record bytes.
    pub fn get_raw(&self, id: &Uuid) -> Option<Bytes> {
        self.records.get(id).cloned()
    }

    pub fn get(&self, id: &Uuid) -> StoreResult<Option<TileDescriptor>> {
        match self.records.get(id) {
            Some(raw) => Ok(Some(serde_json::from_slice(raw)?)),
            None => Ok(None),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &Uuid> {
        self.records.keys()
    }
}

impl TileStore for MemoryTileStore {
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize> {
        let mut added = 0;
        for tile in tiles {
            self.writes += 1;
            let id = tile.tile_id();
            if self.records.contains_key(&id) {
                continue;
            }
            self.records.insert(id, Bytes::from(tile.to_json_bytes()?));
            added += 1;
        }
        Ok(added)
    }
}

/// Stores each tile as `<root>/<tile id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryTileStore {
    root: PathBuf,
}

impl DirectoryTileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Opened directory tile store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `id`.
    pub fn record_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    pub fn get(&self, id: &Uuid) -> StoreResult<Option<TileDescriptor>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Number of records on disk.
    pub fn len(&self) -> StoreResult<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl TileStore for DirectoryTileStore {
    fn save(&mut self, tiles: &[TileDescriptor]) -> StoreResult<usize> {
        let mut added = 0;
        for tile in tiles {
            let path = self.record_path(&tile.tile_id());
            if path.exists() {
                debug!(spec = %tile.coordinate_spec, "Tile already stored");
                continue;
            }

            // Write to a sibling temp file so readers never see a partial record
            let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
            tmp.write_all(&tile.to_json_bytes()?)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            added += 1;
        }
        Ok(added)
    }
}
