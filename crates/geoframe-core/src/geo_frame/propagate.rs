//! Active-name propagation for derived tables.
//!
//! Every operation that builds a new table from existing ones describes
//! itself with a [`Derivation`]; [`reconstruct`] classifies the produced host
//! table and decides which active geometry name, if any, it inherits.

use serde::{Deserialize, Serialize};

use crate::frame::{DataFrame, JoinHow, MergeOptions};

use super::{
    error::{GeoFrameError, GeoFrameResult},
    narrow::classify,
    GeoDataFrame, Table, DEFAULT_GEOMETRY_NAME,
};

/// The operation that produced a derived table, with the inputs its
/// propagation rule needs.
#[derive(Debug, Clone, Copy)]
pub enum Derivation<'a> {
    /// Selection, slicing, filtering and other row/column subsets.
    Default(&'a GeoDataFrame),
    /// Row- or column-wise function application.
    Apply(&'a GeoDataFrame),
    /// Key or index join; the name comes from the left input only.
    Merge {
        /// Primary input.
        left: &'a Table,
        /// Secondary input.
        right: &'a Table,
    },
    /// Stacking; the name comes from the first input and must be unique in
    /// the result.
    Concat {
        /// Inputs in order.
        inputs: &'a [&'a Table],
    },
    /// Pivots that break one-geometry-per-row; the name is cleared.
    Reshape,
    /// Fresh construction; `geometry` is adopted when it is unique.
    Construct,
}

/// Axis of a concatenation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Stack rows.
    #[default]
    Rows,
    /// Place side by side.
    Columns,
}

/// Classify `frame` and attach the active name its derivation allows.
pub(crate) fn reconstruct(frame: DataFrame, derivation: Derivation<'_>) -> GeoFrameResult<Table> {
    let candidate = candidate_name(&frame, derivation)?;
    let promote = match derivation {
        Derivation::Default(src) | Derivation::Apply(src) => {
            src.promote_default_name
        }
        Derivation::Merge { left, .. } => left
            .as_geo()
            .is_some_and(|g| g.promote_default_name),
        Derivation::Concat { inputs } => inputs
            .first()
            .and_then(|t| t.as_geo())
            .is_some_and(|g| g.promote_default_name),
        Derivation::Reshape | Derivation::Construct => false,
    };
    Ok(match classify(frame) {
        Table::Plain(frame) => Table::Plain(frame),
        Table::Geo(mut gdf) => {
            gdf.active = candidate.filter(|name| {
                gdf.frame.positions(name).len() == 1
                    && gdf.frame.column(name).is_ok_and(|c| c.is_geometry())
            });
            gdf.promote_default_name = promote;
            Table::Geo(gdf)
        }
    })
}

fn candidate_name(frame: &DataFrame, derivation: Derivation<'_>) -> GeoFrameResult<Option<String>> {
    Ok(match derivation {
        Derivation::Default(src) | Derivation::Apply(src) => {
            src.active.clone()
        }
        Derivation::Merge { left, .. } => left.active_geometry_name().map(str::to_string),
        Derivation::Concat { inputs } => {
            let name = inputs.first().and_then(|t| t.active_geometry_name());
            if let Some(name) = name {
                if frame.positions(name).len() > 1 {
                    return Err(GeoFrameError::AmbiguousConcatGeometry {
                        name: name.to_string(),
                    });
                }
            }
            name.map(str::to_string)
        }
        Derivation::Reshape => None,
        Derivation::Construct => (frame.positions(DEFAULT_GEOMETRY_NAME).len() == 1)
            .then(|| DEFAULT_GEOMETRY_NAME.to_string()),
    })
}

/// Concatenate tables along an axis.
///
/// The result inherits the first input's active geometry name; several
/// columns carrying that name after concatenation is an error.
pub fn concat(tables: &[&Table], axis: Axis) -> GeoFrameResult<Table> {
    let frames: Vec<&DataFrame> = tables.iter().map(|t| t.frame()).collect();
    let frame = match axis {
        Axis::Rows => DataFrame::concat_rows(&frames)?,
        Axis::Columns => DataFrame::concat_columns(&frames)?,
    };
    reconstruct(frame, Derivation::Concat { inputs: tables })
}

impl Table {
    /// Key join with `right`; the active geometry comes from `self`.
    pub fn merge(&self, right: &Table, opts: &MergeOptions) -> GeoFrameResult<Table> {
        let frame = self.frame().merge(right.frame(), opts)?;
        reconstruct(frame, Derivation::Merge { left: self, right })
    }

    /// Index join with `right`; the active geometry comes from `self`.
    pub fn join(&self, right: &Table, how: JoinHow) -> GeoFrameResult<Table> {
        let frame = self.frame().join(right.frame(), how)?;
        reconstruct(frame, Derivation::Merge { left: self, right })
    }

    /// Build from a host table, adopting a unique `geometry` column.
    pub fn construct(frame: DataFrame) -> GeoFrameResult<Table> {
        reconstruct(frame, Derivation::Construct)
    }
}

impl GeoDataFrame {
    /// Key join with `right`.
    pub fn merge(&self, right: &Table, opts: &MergeOptions) -> GeoFrameResult<Table> {
        Table::Geo(self.clone()).merge(right, opts)
    }

    /// Index join with `right`.
    pub fn join(&self, right: &Table, how: JoinHow) -> GeoFrameResult<Table> {
        Table::Geo(self.clone()).join(right, how)
    }

    /// Pivot the last index level into columns. The result has no active
    /// geometry.
    pub fn unstack(&self) -> GeoFrameResult<Table> {
        reconstruct(self.frame.unstack()?, Derivation::Reshape)
    }

    /// Swap rows and columns. The result has no active geometry.
    pub fn transpose(&self) -> GeoFrameResult<Table> {
        reconstruct(self.frame.transpose()?, Derivation::Reshape)
    }
}
