//! The geometry-aware table.
//!
//! A [`GeoDataFrame`] is a host [`DataFrame`] plus one piece of metadata: the
//! name of its *active* geometry column. Everything geometry-aware (CRS,
//! reprojection, dissolve, spatial joins, serialization) reads through that
//! name.
//!
//! Invariants maintained by every operation in this module tree:
//!
//! - if the active name is set, exactly one column carries it and that column
//!   is geometry-typed;
//! - the table CRS is never stored on the table; it is read from the active
//!   column's [`GeometryArray`];
//! - results of slicing, selection and every derived-object path are
//!   re-classified by dtype into [`Table`] / [`AnySeries`] values rather than
//!   keeping the caller's type.
//!
//! Submodules:
//!
//! - `registry`: active-name bookkeeping, `set_geometry`, assignment
//! - `crs_guard`: CRS read-through, `set_crs`, `to_crs`
//! - `narrow`: dtype-driven re-classification of selections
//! - `propagate`: active-name propagation across merge/concat/reshape
//! - `reshape`: `dissolve` and `explode`
//! - `apply`: row/column-wise function application
//! - `series`: the single-column [`GeoSeries`]

pub mod apply;
pub mod crs_guard;
pub mod error;
pub mod narrow;
pub mod propagate;
pub mod registry;
pub mod reshape;
pub mod series;

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::{
    crs::{display_opt, Crs},
    frame::{Column, ColumnData, DataFrame, Index, Series},
    geometry::GeometryArray,
    value::Value,
};

pub use error::{GeoFrameError, GeoFrameResult};
pub use propagate::{concat, Axis, Derivation};
pub use registry::{to_geometry_aware, SetGeometryOptions};
pub use reshape::{DissolveOptions, ExplodeOptions};
pub use series::GeoSeries;

/// Name inferred as the active geometry when none is given.
pub const DEFAULT_GEOMETRY_NAME: &str = "geometry";

/// A table with zero or more geometry columns, one of which may be active.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDataFrame {
    pub(crate) frame: DataFrame,
    pub(crate) active: Option<String>,
    pub(crate) promote_default_name: bool,
}

/// Where the active geometry of a new table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryInput {
    /// An existing column, by name.
    Column(String),
    /// A geometry array (its CRS, if any, is checked against the `crs` option).
    Array(GeometryArray),
    /// Dynamically-typed values coerced through the geometry kernel.
    Values(Vec<Value>),
    /// A named geometry series; its name becomes the column name.
    Series(GeoSeries),
}

impl From<&str> for GeometryInput {
    fn from(name: &str) -> Self {
        GeometryInput::Column(name.to_string())
    }
}

impl From<String> for GeometryInput {
    fn from(name: String) -> Self {
        GeometryInput::Column(name)
    }
}

impl From<GeometryArray> for GeometryInput {
    fn from(values: GeometryArray) -> Self {
        GeometryInput::Array(values)
    }
}

impl From<Vec<Geometry<f64>>> for GeometryInput {
    fn from(values: Vec<Geometry<f64>>) -> Self {
        GeometryInput::Array(GeometryArray::from_geometries(values, None))
    }
}

impl From<Vec<Value>> for GeometryInput {
    fn from(values: Vec<Value>) -> Self {
        GeometryInput::Values(values)
    }
}

impl From<GeoSeries> for GeometryInput {
    fn from(series: GeoSeries) -> Self {
        GeometryInput::Series(series)
    }
}

/// Constructor options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoFrameOptions {
    /// Explicit active geometry. When absent a column literally named
    /// `geometry` is inferred if it holds geometry-coercible data.
    pub geometry: Option<GeometryInput>,
    /// CRS for the active geometry.
    pub crs: Option<Crs>,
    /// Promote a `geometry` column assigned later, while no active geometry
    /// is set. Off by default; promotion logs a deprecation warning.
    pub infer_active_geometry_from_default_name: bool,
}

impl GeoFrameOptions {
    /// Set the geometry source.
    pub fn with_geometry(mut self, geometry: impl Into<GeometryInput>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Set the CRS.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Opt into default-name promotion on assignment.
    pub fn with_default_name_inference(mut self, enabled: bool) -> Self {
        self.infer_active_geometry_from_default_name = enabled;
        self
    }
}

/// A table that is either plain or geometry-aware, decided by its dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// No geometry-typed columns.
    Plain(DataFrame),
    /// At least one geometry-typed column.
    Geo(GeoDataFrame),
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Table::Plain(frame)
    }
}

impl From<GeoDataFrame> for Table {
    fn from(gdf: GeoDataFrame) -> Self {
        Table::Geo(gdf)
    }
}

impl Table {
    /// Host table view.
    pub fn frame(&self) -> &DataFrame {
        match self {
            Table::Plain(f) => f,
            Table::Geo(g) => &g.frame,
        }
    }

    /// Unwrap the host table.
    pub fn into_frame(self) -> DataFrame {
        match self {
            Table::Plain(f) => f,
            Table::Geo(g) => g.frame,
        }
    }

    /// Whether the table is geometry-aware.
    pub fn is_geo(&self) -> bool {
        matches!(self, Table::Geo(_))
    }

    /// Borrow as a geometry-aware table.
    pub fn as_geo(&self) -> Option<&GeoDataFrame> {
        match self {
            Table::Geo(g) => Some(g),
            Table::Plain(_) => None,
        }
    }

    /// Convert into a geometry-aware table.
    pub fn into_geo(self) -> Option<GeoDataFrame> {
        match self {
            Table::Geo(g) => Some(g),
            Table::Plain(_) => None,
        }
    }

    /// Active geometry name, if geometry-aware and set.
    pub fn active_geometry_name(&self) -> Option<&str> {
        self.as_geo().and_then(GeoDataFrame::active_geometry_name)
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.frame().nrows()
    }
}

/// A single column that is either plain or geometry-typed.
#[derive(Debug, Clone, PartialEq)]
pub enum AnySeries {
    /// Plain values.
    Plain(Series),
    /// Geometry values.
    Geo(GeoSeries),
}

impl AnySeries {
    /// Series name.
    pub fn name(&self) -> Option<&str> {
        match self {
            AnySeries::Plain(s) => s.name.as_deref(),
            AnySeries::Geo(s) => s.name.as_deref(),
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            AnySeries::Plain(s) => s.len(),
            AnySeries::Geo(s) => s.len(),
        }
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as a geometry series.
    pub fn as_geo(&self) -> Option<&GeoSeries> {
        match self {
            AnySeries::Geo(s) => Some(s),
            AnySeries::Plain(_) => None,
        }
    }

    /// Convert into a geometry series.
    pub fn into_geo(self) -> Option<GeoSeries> {
        match self {
            AnySeries::Geo(s) => Some(s),
            AnySeries::Plain(_) => None,
        }
    }

    /// Convert into a plain series (geometry values keep their storage).
    pub fn into_series(self) -> Series {
        match self {
            AnySeries::Plain(s) => s,
            AnySeries::Geo(s) => s.to_series(),
        }
    }
}

/// Result of indexing a table by column name.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The name resolved to several columns.
    Table(Table),
    /// The name resolved to one column.
    Series(AnySeries),
}

impl Selection {
    /// The single-column result, if any.
    pub fn into_series(self) -> Option<AnySeries> {
        match self {
            Selection::Series(s) => Some(s),
            Selection::Table(_) => None,
        }
    }

    /// The multi-column result, if any.
    pub fn into_table(self) -> Option<Table> {
        match self {
            Selection::Table(t) => Some(t),
            Selection::Series(_) => None,
        }
    }
}

impl GeoDataFrame {
    /// Build a geometry-aware table from a plain or geometry-aware table.
    ///
    /// Without an explicit `geometry` option the active name is carried over
    /// from a geometry-aware input, and a column literally named `geometry`
    /// is inferred as active when it holds coercible data. Failed inference
    /// leaves the table without an active geometry instead of failing.
    pub fn new(data: impl Into<Table>, opts: GeoFrameOptions) -> GeoFrameResult<Self> {
        let GeoFrameOptions {
            geometry,
            crs,
            infer_active_geometry_from_default_name,
        } = opts;

        let (frame, inherited) = match data.into() {
            Table::Plain(frame) => (frame, None),
            Table::Geo(gdf) => {
                let existing = gdf.active_array().ok().map(|g| g.crs().cloned());
                (gdf.frame, Some((gdf.active, existing)))
            }
        };
        let mut out = GeoDataFrame {
            frame,
            active: None,
            promote_default_name: infer_active_geometry_from_default_name,
        };

        let mut geometry = geometry;
        if geometry.is_none() {
            if let Some((active, existing)) = inherited {
                if let (Some(existing), Some(supplied)) = (&existing, &crs) {
                    if existing.as_ref() != Some(supplied) {
                        return Err(GeoFrameError::CrsMismatch {
                            existing: display_opt(existing.as_ref()),
                            supplied: supplied.to_string(),
                        });
                    }
                }
                out.active = active;
            }
            if out.infer_default_column(crs.as_ref())? {
                geometry = Some(GeometryInput::Column(DEFAULT_GEOMETRY_NAME.to_string()));
            }
        }

        match geometry {
            Some(geometry) => {
                let geometry = match geometry {
                    GeometryInput::Series(mut s) => {
                        if s.name.as_deref().is_some_and(|n| n != DEFAULT_GEOMETRY_NAME) {
                            s.name = Some(DEFAULT_GEOMETRY_NAME.to_string());
                        }
                        GeometryInput::Series(s)
                    }
                    other => other,
                };
                out.set_geometry_in_place(
                    geometry,
                    SetGeometryOptions {
                        crs,
                        drop: None,
                    },
                )?;
            }
            None if crs.is_some() && out.active.is_none() => {
                return Err(GeoFrameError::CrsWithoutGeometry);
            }
            None => {}
        }
        Ok(out)
    }

    /// Build from columns with a default range index.
    pub fn from_columns(columns: Vec<Column>, opts: GeoFrameOptions) -> GeoFrameResult<Self> {
        Self::new(DataFrame::from_columns(columns)?, opts)
    }

    /// Build from row records.
    pub fn from_records(
        names: &[&str],
        rows: Vec<Vec<Value>>,
        opts: GeoFrameOptions,
    ) -> GeoFrameResult<Self> {
        Self::new(DataFrame::from_records(names, rows)?, opts)
    }

    /// Coerce a column named `geometry` in place when it is a candidate for
    /// inference. Returns whether the column is now geometry-typed.
    fn infer_default_column(&mut self, crs: Option<&Crs>) -> GeoFrameResult<bool> {
        let matches = self.frame.positions(DEFAULT_GEOMETRY_NAME);
        match matches.len() {
            0 => return Ok(false),
            1 => {}
            _ => return Err(GeoFrameError::DuplicateGeometryColumn),
        }
        let data = self.frame.column(DEFAULT_GEOMETRY_NAME)?;
        if let (Some(existing), Some(supplied)) = (data.as_geometry().and_then(|g| g.crs()), crs) {
            if existing != supplied {
                return Err(GeoFrameError::CrsMismatch {
                    existing: existing.to_string(),
                    supplied: supplied.to_string(),
                });
            }
        }
        let candidate = match data {
            ColumnData::Geometry(_) | ColumnData::Object(_) => true,
            ColumnData::Array(_) => data.is_empty() || data.is_all_null(),
        };
        if !candidate {
            return Ok(false);
        }
        match registry::ensure_geometry(data, crs) {
            Ok(values) => {
                self.frame
                    .set_column(DEFAULT_GEOMETRY_NAME, ColumnData::Geometry(values))?;
                Ok(true)
            }
            Err(err) => {
                log::debug!("column 'geometry' left untyped: {err}");
                Ok(false)
            }
        }
    }

    /// Host table view.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Unwrap the host table, discarding geometry metadata.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.frame.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.frame.ncols()
    }

    /// Row index.
    pub fn index(&self) -> &Index {
        self.frame.index()
    }

    /// Column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.frame.column_names()
    }

    /// Names of every geometry-typed column.
    pub fn geometry_columns(&self) -> Vec<String> {
        self.frame
            .columns()
            .iter()
            .filter(|c| c.data.is_geometry())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Whether default-name promotion is enabled.
    pub fn infers_active_geometry_from_default_name(&self) -> bool {
        self.promote_default_name
    }
}
