//! Granule tiler service.
//!
//! Loads a job configuration, builds the checkpoint context and tile store
//! it names, and tiles each granule given on the command line.

pub mod config;
pub mod job;

pub use config::{load_config, parse_config, GranuleFormat, TilerConfig};
pub use job::{GranuleFailure, GranuleSummary, JobSummary, TilingJob};
