//! Common types shared across the granule tiler crates.
//!
//! - [`TileDescriptor`]: the record emitted for every tile of a granule
//! - [`ExecutionContext`]: the key/value checkpoint store a tile stream
//!   persists its cursor into, plus an in-memory implementation and a
//!   key-scoping wrapper

pub mod context;
pub mod descriptor;
pub mod error;

pub use context::{ExecutionContext, MemoryExecutionContext, ScopedContext};
pub use descriptor::TileDescriptor;
pub use error::{ContextError, ContextResult};
