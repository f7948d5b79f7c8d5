//! Slicing configuration.
//!
//! Describes which dimensions of a granule take part in tiling and along
//! which one the granule is cut.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConfigurationError;

/// Prefix used for generated identifiers of anonymous dimensions.
///
/// Matches the names libnetcdf and the python netCDF4 bindings give to the
/// unnamed axes of plain HDF5 files.
pub const DEFAULT_DIMENSION_NAME_PREFIX: &str = "phony_dim_";

fn default_prefix() -> String {
    DEFAULT_DIMENSION_NAME_PREFIX.to_string()
}

/// Slicing options for one granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Dimensions of interest, by name or by axis position ("0", "1", ...)
    pub dimensions: Vec<String>,
    /// Dimension to cut along; an integer selects positional mode
    pub slice_by_dimension: String,
    /// Prefix for generated names in positional mode
    #[serde(default = "default_prefix")]
    pub dimension_name_prefix: String,
}

/// How dimensions are addressed, resolved once from a [`SliceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceStrategy {
    /// Dimensions are declared by name in the granule.
    Named { slice_by: String },
    /// Dimensions are anonymous and addressed by axis position.
    Positional { axis: usize, prefix: String },
}

impl SliceStrategy {
    /// Identifier of the slice dimension as it appears in tile specs.
    pub fn slice_dimension_id(&self) -> String {
        match self {
            SliceStrategy::Named { slice_by } => slice_by.clone(),
            SliceStrategy::Positional { axis, prefix } => format!("{}{}", prefix, axis),
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, SliceStrategy::Positional { .. })
    }
}

impl SliceConfig {
    pub fn new<I, S>(dimensions: I, slice_by_dimension: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            slice_by_dimension: slice_by_dimension.into(),
            dimension_name_prefix: default_prefix(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dimension_name_prefix = prefix.into();
        self
    }

    /// The prefix for positional mode; blank means the default.
    pub fn effective_prefix(&self) -> &str {
        if self.dimension_name_prefix.trim().is_empty() {
            DEFAULT_DIMENSION_NAME_PREFIX
        } else {
            &self.dimension_name_prefix
        }
    }

    /// Validate the configuration and pick the addressing strategy.
    ///
    /// A slice-by value that parses as an integer selects positional mode.
    pub fn strategy(&self) -> Result<SliceStrategy, ConfigurationError> {
        if self.dimensions.is_empty() {
            return Err(ConfigurationError::EmptyDimensions);
        }

        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.as_str()) {
                return Err(ConfigurationError::DuplicateDimension(dim.clone()));
            }
        }

        let slice_by = self.slice_by_dimension.trim();
        if slice_by.is_empty() {
            return Err(ConfigurationError::EmptySliceBy);
        }

        match slice_by.parse::<i64>() {
            Ok(axis) => {
                let dimension_count = self.dimensions.len();
                if axis < 0 || axis as usize >= dimension_count {
                    return Err(ConfigurationError::AxisOutOfRange {
                        axis,
                        dimension_count,
                    });
                }
                Ok(SliceStrategy::Positional {
                    axis: axis as usize,
                    prefix: self.effective_prefix().to_string(),
                })
            }
            Err(_) => Ok(SliceStrategy::Named {
                slice_by: slice_by.to_string(),
            }),
        }
    }
}
