//! Tile boundary slicing.
//!
//! A granule is cut along one dimension into slices of width 1; every other
//! dimension stays whole. The tile specs are the cartesian product of each
//! dimension's ranges, with the first dimension varying slowest:
//!
//! ```text
//! {NUMROWS: 2, NUMCELLS: 82}, slice by NUMROWS
//!   0  NUMROWS:0:1,NUMCELLS:0:82
//!   1  NUMROWS:1:2,NUMCELLS:0:82
//! ```
//!
//! The order is part of the checkpoint contract: cursor `k` always names
//! the same spec for the same granule. [`TileSpecPlan`] computes the k-th
//! spec directly rather than materializing the whole list.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use tiler_common::TileDescriptor;

use crate::catalog::DimensionLengths;

/// Error parsing a tile coordinate spec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid tile spec '{spec}': {reason}")]
pub struct SpecParseError {
    pub spec: String,
    pub reason: String,
}

/// The half-open range `[start, end)` of one dimension within a tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionBound {
    pub dimension: String,
    pub start: usize,
    pub end: usize,
}

impl DimensionBound {
    pub fn new(dimension: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            dimension: dimension.into(),
            start,
            end,
        }
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

impl fmt::Display for DimensionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.dimension, self.start, self.end)
    }
}

impl FromStr for DimensionBound {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| SpecParseError {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        // Dimension names may themselves contain ':', so split from the right
        let mut parts = s.rsplitn(3, ':');
        let end = parts.next().ok_or_else(|| fail("missing end"))?;
        let start = parts.next().ok_or_else(|| fail("missing start"))?;
        let dimension = parts.next().ok_or_else(|| fail("missing dimension"))?;

        if dimension.is_empty() {
            return Err(fail("empty dimension name"));
        }
        let start: usize = start.parse().map_err(|_| fail("start is not an index"))?;
        let end: usize = end.parse().map_err(|_| fail("end is not an index"))?;
        if end < start {
            return Err(fail("end precedes start"));
        }

        Ok(DimensionBound::new(dimension, start, end))
    }
}

/// Parse a comma-joined tile coordinate spec back into its bounds.
pub fn parse_tile_spec(spec: &str) -> Result<Vec<DimensionBound>, SpecParseError> {
    spec.split(',').map(str::parse).collect()
}

/// Render bounds as a tile coordinate spec.
pub fn format_tile_spec(bounds: &[DimensionBound]) -> String {
    bounds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AxisPlan {
    dimension: String,
    len: usize,
    step: usize,
    /// Number of ranges along this axis
    count: usize,
}

impl AxisPlan {
    fn new(dimension: &str, len: usize, step: usize) -> Self {
        let count = if len == 0 { 0 } else { len.div_ceil(step) };
        Self {
            dimension: dimension.to_string(),
            len,
            step,
            count,
        }
    }

    fn bound(&self, position: usize) -> DimensionBound {
        let start = position * self.step;
        let end = (start + self.step).min(self.len);
        DimensionBound::new(self.dimension.clone(), start, end)
    }
}

/// Result of advancing a cursor over a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A tile was produced; the cursor moves to `next_cursor`.
    Emitted {
        descriptor: TileDescriptor,
        next_cursor: usize,
    },
    /// The cursor is at the end of the plan.
    EndOfStream,
}

/// The ordered set of tile specs for one granule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSpecPlan {
    axes: Vec<AxisPlan>,
    total: usize,
}

impl TileSpecPlan {
    /// Plan the slicing of `lengths` along `slice_by`.
    ///
    /// The slice dimension gets step 1, every other dimension a single
    /// full-length range. If `slice_by` names no dimension, every dimension
    /// is left whole and the plan holds one spec.
    pub fn new(lengths: &DimensionLengths, slice_by: &str) -> Self {
        let axes: Vec<AxisPlan> = lengths
            .iter()
            .map(|(name, len)| {
                let step = if name == slice_by { 1 } else { len };
                AxisPlan::new(name, len, step)
            })
            .collect();

        let total = if axes.is_empty() {
            0
        } else {
            axes.iter().map(|axis| axis.count).product()
        };

        Self { axes, total }
    }

    /// Number of tile specs.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Dimension identifiers in spec order.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|axis| axis.dimension.as_str())
    }

    /// Bounds of the spec at `index`.
    pub fn bounds(&self, index: usize) -> Option<Vec<DimensionBound>> {
        if index >= self.total {
            return None;
        }

        // Mixed-radix decomposition, last axis varies fastest
        let mut remainder = index;
        let mut bounds: Vec<DimensionBound> = self
            .axes
            .iter()
            .rev()
            .map(|axis| {
                let position = remainder % axis.count;
                remainder /= axis.count;
                axis.bound(position)
            })
            .collect();
        bounds.reverse();

        Some(bounds)
    }

    /// The spec at `index`.
    pub fn get(&self, index: usize) -> Option<String> {
        self.bounds(index).map(|b| format_tile_spec(&b))
    }

    pub fn iter(&self) -> TileSpecs<'_> {
        self.iter_from(0)
    }

    /// Iterate specs starting at `start`.
    pub fn iter_from(&self, start: usize) -> TileSpecs<'_> {
        TileSpecs {
            plan: self,
            next: start.min(self.total),
        }
    }

    /// Materialize every spec.
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().collect()
    }

    /// Produce the tile at `cursor`, if any.
    pub fn advance(&self, cursor: usize, source_reference: &str) -> Advance {
        match self.get(cursor) {
            Some(spec) => Advance::Emitted {
                descriptor: TileDescriptor::new(spec, source_reference),
                next_cursor: cursor + 1,
            },
            None => Advance::EndOfStream,
        }
    }
}

/// Iterator over the specs of a [`TileSpecPlan`].
#[derive(Debug, Clone)]
pub struct TileSpecs<'a> {
    plan: &'a TileSpecPlan,
    next: usize,
}

impl Iterator for TileSpecs<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let spec = self.plan.get(self.next)?;
        self.next += 1;
        Some(spec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len() - self.next;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<String> {
        self.next = self.next.saturating_add(n).min(self.plan.len());
        self.next()
    }
}

impl ExactSizeIterator for TileSpecs<'_> {}

/// Generate every tile boundary spec for `lengths` sliced along `slice_by`.
pub fn generate_tile_boundary_slices(slice_by: &str, lengths: &DimensionLengths) -> Vec<String> {
    TileSpecPlan::new(lengths, slice_by).to_vec()
}
