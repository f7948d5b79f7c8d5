//! Error types for the tiling crate.

use thiserror::Error;

use granule_reader::GranuleError;
use tiler_common::ContextError;

/// Invalid slicing configuration, or a configuration that does not fit the
/// granule it is applied to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No dimensions configured")]
    EmptyDimensions,

    #[error("Dimension '{0}' is listed more than once")]
    DuplicateDimension(String),

    #[error("Slice-by dimension is blank")]
    EmptySliceBy,

    #[error("Positional slice axis {axis} is outside 0..{dimension_count}")]
    AxisOutOfRange { axis: i64, dimension_count: usize },

    #[error(
        "No representative variable found for positional slicing \
         (need a coordinate variable or a variable with {rank} dimension(s))"
    )]
    NoRepresentativeVariable { rank: usize },

    #[error("None of the requested dimensions {requested:?} exist in the granule")]
    NoMatchingDimensions { requested: Vec<String> },

    #[error("Slice-by dimension '{slice_by}' is not among the granule dimensions {available:?}")]
    UnknownSliceDimension {
        slice_by: String,
        available: Vec<String>,
    },
}

/// Why a stream failed to open.
#[derive(Error, Debug)]
pub enum OpenCause {
    #[error(transparent)]
    Granule(#[from] GranuleError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to read checkpoint: {0}")]
    Checkpoint(#[from] ContextError),

    #[error("Checkpointed cursor {cursor} is outside 0..={len}")]
    CursorOutOfRange { cursor: i64, len: usize },
}

/// Errors that can occur while tiling a granule.
#[derive(Error, Debug)]
pub enum TilingError {
    #[error("Failed to open granule {source_reference}: {cause}")]
    Open {
        source_reference: String,
        #[source]
        cause: OpenCause,
    },

    #[error("Failed to close granule {source_reference}: {source}")]
    Close {
        source_reference: String,
        #[source]
        source: GranuleError,
    },

    #[error("Failed to write checkpoint '{key}': {source}")]
    Checkpoint {
        key: String,
        #[source]
        source: ContextError,
    },

    #[error("Invalid slicing configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Tile stream is not open")]
    NotOpen,

    #[error("Tile stream is already open for {0}")]
    AlreadyOpen(String),
}

impl TilingError {
    /// The configuration problem behind this error, if any.
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        match self {
            TilingError::Configuration(e) => Some(e),
            TilingError::Open {
                cause: OpenCause::Configuration(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Result type for tiling operations.
pub type Result<T> = std::result::Result<T, TilingError>;
