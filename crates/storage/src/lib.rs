//! Storage abstractions for the granule tiler.
//!
//! Provides unified interfaces for:
//! - Tile record stores (in-memory, one file per tile on disk)
//! - Persistent checkpoint contexts (JSON file, Redis)

pub mod checkpoint;
pub mod error;
pub mod tile_store;

pub use checkpoint::{FileExecutionContext, RedisExecutionContext};
pub use error::{StoreError, StoreResult};
pub use tile_store::{DirectoryTileStore, MemoryTileStore, TileStore};
