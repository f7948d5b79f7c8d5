//! Dimension catalog extraction.
//!
//! Turns an open granule into the ordered dimension → length mapping that
//! slicing works on, using either the granule's declared dimension names or
//! the axes of a representative variable.

use std::collections::HashSet;
use tracing::{debug, warn};

use granule_reader::{Granule, VariableInfo};

use crate::config::{SliceConfig, SliceStrategy};
use crate::error::{ConfigurationError, OpenCause};

/// Variable names conventionally used for geospatial coordinates.
const COORDINATE_VARIABLE_NAMES: [&str; 4] = ["lat", "latitude", "lon", "longitude"];

/// Ordered mapping from dimension identifier to length.
///
/// Iteration order is insertion order and determines tile spec order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionLengths {
    entries: Vec<(String, usize)>,
}

impl DimensionLengths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a dimension. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, len: usize) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = len,
            None => self.entries.push((name, len)),
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| *len)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, len)| (n.as_str(), *len))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for DimensionLengths {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut lengths = DimensionLengths::new();
        for (name, len) in iter {
            lengths.insert(name, len);
        }
        lengths
    }
}

/// Extract the dimensions that take part in slicing.
///
/// The result is validated: it is non-empty and contains the slice
/// dimension.
pub fn extract_dimensions<G: Granule>(
    granule: &G,
    config: &SliceConfig,
    strategy: &SliceStrategy,
) -> Result<DimensionLengths, OpenCause> {
    let lengths = match strategy {
        SliceStrategy::Named { .. } => named_dimensions(granule, &config.dimensions)?,
        SliceStrategy::Positional { prefix, .. } => {
            let variables = granule.variables()?;
            positional_dimensions(&variables, config.dimensions.len(), prefix)?
        }
    };

    if lengths.is_empty() {
        return Err(ConfigurationError::NoMatchingDimensions {
            requested: config.dimensions.clone(),
        }
        .into());
    }

    let slice_by = strategy.slice_dimension_id();
    if !lengths.contains(&slice_by) {
        return Err(ConfigurationError::UnknownSliceDimension {
            slice_by,
            available: lengths.names(),
        }
        .into());
    }

    debug!(
        dimensions = ?lengths,
        slice_by = %slice_by,
        "Extracted granule dimensions"
    );

    Ok(lengths)
}

/// Declared dimensions that appear in `requested`, in declaration order.
fn named_dimensions<G: Granule>(
    granule: &G,
    requested: &[String],
) -> Result<DimensionLengths, OpenCause> {
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();

    let lengths: DimensionLengths = granule
        .dimensions()?
        .into_iter()
        .filter(|dim| wanted.contains(dim.name.as_str()))
        .map(|dim| (dim.name, dim.len))
        .collect();

    for name in requested {
        if !lengths.contains(name) {
            warn!(dimension = %name, "Requested dimension not declared by granule");
        }
    }

    Ok(lengths)
}

/// Generated `<prefix><axis>` dimensions sized by a representative variable.
pub fn positional_dimensions(
    variables: &[VariableInfo],
    rank: usize,
    prefix: &str,
) -> Result<DimensionLengths, ConfigurationError> {
    let var = representative_variable(variables, rank)
        .ok_or(ConfigurationError::NoRepresentativeVariable { rank })?;

    debug!(
        variable = %var.short_name,
        shape = ?var.shape,
        "Selected representative variable for positional slicing"
    );

    Ok((0..rank)
        .filter_map(|axis| var.axis_len(axis).map(|len| (format!("{}{}", prefix, axis), len)))
        .collect())
}

/// Pick the variable whose axes stand in for the granule's dimensions.
///
/// Coordinate variables (lat/lon) win when they have enough axes;
/// otherwise the first variable of exactly `rank` dimensions is used.
pub fn representative_variable(variables: &[VariableInfo], rank: usize) -> Option<&VariableInfo> {
    variables
        .iter()
        .find(|var| {
            let name = var.short_name.to_lowercase();
            COORDINATE_VARIABLE_NAMES.contains(&name.as_str()) && var.rank() >= rank
        })
        .or_else(|| variables.iter().find(|var| var.rank() == rank))
}

#[cfg(test)]
mod tests {
    use super::*;
    use granule_reader::MemoryGranule;

    #[test]
    fn test_dimension_lengths_keep_insertion_order() {
        let mut lengths = DimensionLengths::new();
        lengths.insert("b", 2);
        lengths.insert("a", 1);
        lengths.insert("b", 5);
        let items: Vec<_> = lengths.iter().collect();
        assert_eq!(items, vec![("b", 5), ("a", 1)]);
    }

    #[test]
    fn test_named_mode_filters_and_keeps_file_order() {
        let granule = MemoryGranule::new()
            .with_dimension("time", 1)
            .with_dimension("NUMROWS", 3163)
            .with_dimension("NUMCELLS", 82);
        let config = SliceConfig::new(["NUMCELLS", "NUMROWS"], "NUMROWS");
        let strategy = config.strategy().unwrap();

        let lengths = extract_dimensions(&granule, &config, &strategy).unwrap();
        assert_eq!(lengths.names(), vec!["NUMROWS", "NUMCELLS"]);
        assert_eq!(lengths.get("NUMROWS"), Some(3163));
        assert!(!lengths.contains("time"));
    }

    #[test]
    fn test_named_mode_unknown_slice_dimension() {
        let granule = MemoryGranule::new()
            .with_dimension("NUMROWS", 3)
            .with_dimension("NUMCELLS", 4);
        let config = SliceConfig::new(["NUMROWS", "NUMCELLS"], "ROWS");
        let strategy = config.strategy().unwrap();

        match extract_dimensions(&granule, &config, &strategy) {
            Err(OpenCause::Configuration(ConfigurationError::UnknownSliceDimension {
                slice_by,
                available,
            })) => {
                assert_eq!(slice_by, "ROWS");
                assert_eq!(available, vec!["NUMROWS", "NUMCELLS"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_named_mode_no_matching_dimensions() {
        let granule = MemoryGranule::new().with_dimension("x", 3);
        let config = SliceConfig::new(["NUMROWS"], "NUMROWS");
        let strategy = config.strategy().unwrap();

        assert!(matches!(
            extract_dimensions(&granule, &config, &strategy),
            Err(OpenCause::Configuration(
                ConfigurationError::NoMatchingDimensions { .. }
            ))
        ));
    }

    #[test]
    fn test_representative_prefers_coordinate_variable() {
        let variables = vec![
            VariableInfo::new("flags", vec![10, 20]),
            VariableInfo::new("Latitude", vec![30, 40]),
        ];
        let var = representative_variable(&variables, 2).unwrap();
        assert_eq!(var.short_name, "Latitude");
    }

    #[test]
    fn test_representative_skips_coordinate_with_too_few_axes() {
        let variables = vec![
            VariableInfo::new("lat", vec![30]),
            VariableInfo::new("sss", vec![30, 40]),
        ];
        let var = representative_variable(&variables, 2).unwrap();
        assert_eq!(var.short_name, "sss");
    }

    #[test]
    fn test_positional_dimensions_use_prefix_and_axes() {
        let variables = vec![
            VariableInfo::new("row_time", vec![812]),
            VariableInfo::new("lat", vec![812, 1624]),
        ];
        let lengths = positional_dimensions(&variables, 2, "phony_dim_").unwrap();
        let items: Vec<_> = lengths.iter().collect();
        assert_eq!(items, vec![("phony_dim_0", 812), ("phony_dim_1", 1624)]);
    }

    #[test]
    fn test_positional_without_candidate_fails() {
        let variables = vec![VariableInfo::new("row_time", vec![812])];
        assert_eq!(
            positional_dimensions(&variables, 2, "phony_dim_"),
            Err(ConfigurationError::NoRepresentativeVariable { rank: 2 })
        );
    }
}
