//! Spatial reshapes: `dissolve` and `explode`.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::{
    frame::{AggSpec, By, Column, ColumnData, DataFrame, GroupOptions, Index},
    geometry::{
        kernel::{self, UnionMethod},
        GeometryArray,
    },
    value::Label,
};

use super::{
    error::{GeoFrameError, GeoFrameResult},
    propagate::{reconstruct, Derivation},
    GeoDataFrame, Table,
};

/// Options for [`GeoDataFrame::dissolve`].
#[derive(Debug, Clone)]
pub struct DissolveOptions {
    /// Grouping; [`By::None`] dissolves everything into one row.
    pub by: By,
    /// Aggregation of the non-geometry columns.
    pub aggfunc: AggSpec,
    /// Keep the group keys as the index (otherwise they become columns).
    pub as_index: bool,
    /// Sort groups by key.
    pub sort: bool,
    /// Drop rows with a missing key.
    pub dropna: bool,
    /// Union strategy for the geometry of each group.
    pub method: UnionMethod,
    /// Fixed-precision grid; only valid with [`UnionMethod::Unary`].
    pub grid_size: Option<f64>,
}

impl Default for DissolveOptions {
    fn default() -> Self {
        Self {
            by: By::None,
            aggfunc: AggSpec::default(),
            as_index: true,
            sort: true,
            dropna: true,
            method: UnionMethod::Unary,
            grid_size: None,
        }
    }
}

impl DissolveOptions {
    /// Group by one column.
    pub fn by_column(name: impl Into<String>) -> Self {
        Self {
            by: By::column(name),
            ..Self::default()
        }
    }

    /// Set the grouping.
    pub fn with_by(mut self, by: By) -> Self {
        self.by = by;
        self
    }

    /// Set the attribute aggregation.
    pub fn with_aggfunc(mut self, aggfunc: impl Into<AggSpec>) -> Self {
        self.aggfunc = aggfunc.into();
        self
    }

    /// Keep keys as index or as columns.
    pub fn with_as_index(mut self, as_index: bool) -> Self {
        self.as_index = as_index;
        self
    }

    /// Sort groups by key.
    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    /// Drop rows with a missing key.
    pub fn with_dropna(mut self, dropna: bool) -> Self {
        self.dropna = dropna;
        self
    }

    /// Set the union strategy.
    pub fn with_method(mut self, method: UnionMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the precision grid.
    pub fn with_grid_size(mut self, grid_size: f64) -> Self {
        self.grid_size = Some(grid_size);
        self
    }
}

/// Options for [`GeoDataFrame::explode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplodeOptions {
    /// Column to explode; defaults to the active geometry.
    pub column: Option<String>,
    /// Replace the index with a range.
    pub ignore_index: bool,
    /// Append the part ordinal as a trailing index level.
    pub index_parts: bool,
}

impl Default for ExplodeOptions {
    fn default() -> Self {
        Self {
            column: None,
            ignore_index: false,
            index_parts: true,
        }
    }
}

impl ExplodeOptions {
    /// Explode a named column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Replace the index with a range.
    pub fn with_ignore_index(mut self, ignore_index: bool) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    /// Keep or discard the part ordinal level.
    pub fn with_index_parts(mut self, index_parts: bool) -> Self {
        self.index_parts = index_parts;
        self
    }
}

/// Split every geometry into its parts.
///
/// Returns the source row of each part, the parts (sharing the input CRS)
/// and each part's ordinal within its row. Missing geometries and empty
/// multi-part geometries produce one row unchanged.
pub(crate) fn explode_values(values: &GeometryArray) -> (Vec<usize>, GeometryArray, Vec<i64>) {
    let mut positions = Vec::with_capacity(values.len());
    let mut parts: Vec<Option<Geometry<f64>>> = Vec::with_capacity(values.len());
    let mut ordinals = Vec::with_capacity(values.len());
    for (row, geom) in values.iter().enumerate() {
        let split = geom.map(kernel::parts).unwrap_or_default();
        if split.is_empty() {
            positions.push(row);
            parts.push(geom.cloned());
            ordinals.push(0);
            continue;
        }
        for (ordinal, part) in split.into_iter().enumerate() {
            positions.push(row);
            parts.push(Some(part));
            ordinals.push(ordinal as i64);
        }
    }
    (positions, GeometryArray::new(parts, values.crs().cloned()), ordinals)
}

impl GeoDataFrame {
    /// Group rows, union the active geometry of each group and aggregate
    /// the remaining columns.
    ///
    /// The result carries the input CRS and has the geometry column first.
    /// Missing geometries are skipped; a group with none gets an empty
    /// collection.
    pub fn dissolve(&self, opts: &DissolveOptions) -> GeoFrameResult<GeoDataFrame> {
        let values = self.active_array()?;
        let name = self.active.clone().unwrap_or_default();
        if opts.grid_size.is_some() && opts.method != UnionMethod::Unary {
            return Err(GeoFrameError::InvalidArgument {
                message: format!(
                    "grid_size is only supported with method 'unary', not '{}'",
                    opts.method
                ),
            });
        }

        let data = self.frame.drop_column(&name)?;
        let groups = data.groupby(
            &opts.by,
            &GroupOptions {
                sort: opts.sort,
                dropna: opts.dropna,
            },
        )?;
        let aggregated = data.aggregate(&groups, &opts.aggfunc)?;

        let merged = groups
            .members
            .iter()
            .map(|rows| {
                let geoms = rows.iter().filter_map(|&r| values.get(r));
                kernel::union_all(geoms, opts.method, opts.grid_size).map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = Vec::with_capacity(aggregated.ncols() + 1);
        columns.push(Column::new(
            name.as_str(),
            GeometryArray::new(merged, values.crs().cloned()),
        ));
        columns.extend(aggregated.columns().iter().cloned());
        let mut frame = DataFrame::new(groups.index()?, columns)?;
        if !opts.as_index {
            frame = frame.reset_index(false)?;
        }
        Ok(GeoDataFrame {
            frame,
            active: Some(name),
            promote_default_name: self.promote_default_name,
        })
    }

    /// One row per part of every multi-part geometry in the target column,
    /// repeating the other columns.
    ///
    /// A target column that is not geometry-typed is exploded by the host
    /// engine as a list column.
    pub fn explode(&self, opts: &ExplodeOptions) -> GeoFrameResult<Table> {
        let column = match &opts.column {
            Some(c) => c.clone(),
            None => {
                self.active_array()?;
                self.active.clone().unwrap_or_default()
            }
        };
        let data = self.frame.column(&column)?;
        let ColumnData::Geometry(values) = data else {
            let frame = self.frame.explode(&column, opts.ignore_index)?;
            return reconstruct(frame, Derivation::Default(self));
        };

        let (positions, parts, ordinals) = explode_values(values);
        let mut frame = self.frame.take(&positions)?;
        frame.set_column(&column, ColumnData::Geometry(parts))?;
        let frame = if opts.ignore_index {
            frame.with_index(Index::range(positions.len()))?
        } else if opts.index_parts {
            let labels = ordinals.into_iter().map(Label::Int).collect();
            frame.append_index_level(None, labels)?
        } else {
            frame
        };
        reconstruct(frame, Derivation::Default(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crs::Crs,
        frame::AggFunc,
        geo_frame::GeoFrameOptions,
        value::Value,
    };
    use geo_types::{point, MultiPoint, Point};

    fn pt(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Point(point!(x: x, y: y))
    }

    fn sample() -> GeoFrameResult<GeoDataFrame> {
        GeoDataFrame::from_columns(
            vec![
                Column::new("name", vec!["a", "a", "b"]),
                Column::new("pop", vec![1_i64, 2, 3]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries([pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0)], None),
                ),
            ],
            GeoFrameOptions::default().with_crs(Crs::from_epsg(4326)),
        )
    }

    #[test]
    fn dissolve_by_column_unions_each_group() -> GeoFrameResult<()> {
        let out = sample()?.dissolve(&DissolveOptions::by_column("name"))?;
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.column_names(), vec!["geometry", "pop"]);
        assert_eq!(
            out.index().keys(),
            &[vec![Label::from("a")], vec![Label::from("b")]]
        );
        assert_eq!(out.crs()?, Some(&Crs::from_epsg(4326)));
        let g = out.geometry()?;
        assert_eq!(
            g.get(0),
            Some(&Geometry::MultiPoint(MultiPoint(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0)
            ])))
        );
        assert_eq!(g.get(1), Some(&pt(2.0, 2.0)));
        Ok(())
    }

    #[test]
    fn dissolve_everything_with_aggregation() -> GeoFrameResult<()> {
        let out = sample()?.dissolve(
            &DissolveOptions::default()
                .with_aggfunc(AggSpec::PerColumn(vec![("pop".into(), AggFunc::Sum)])),
        )?;
        assert_eq!(out.nrows(), 1);
        assert_eq!(out.frame().column("pop")?.value(0), Value::Int(6));
        Ok(())
    }

    #[test]
    fn dissolve_as_columns_and_grid_validation() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let flat = gdf.dissolve(&DissolveOptions::by_column("name").with_as_index(false))?;
        assert_eq!(flat.column_names(), vec!["name", "geometry", "pop"]);
        assert!(flat.index().is_range());
        assert_eq!(flat.active_geometry_name(), Some("geometry"));

        let err = gdf
            .dissolve(
                &DissolveOptions::by_column("name")
                    .with_method(UnionMethod::Coverage)
                    .with_grid_size(0.5),
            )
            .unwrap_err();
        assert!(matches!(err, GeoFrameError::InvalidArgument { .. }));
        Ok(())
    }

    #[test]
    fn explode_appends_part_level() -> GeoFrameResult<()> {
        let multi = Geometry::MultiPoint(MultiPoint(vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]));
        let gdf = GeoDataFrame::from_columns(
            vec![
                Column::new("id", vec![7_i64, 8]),
                Column::new(
                    "geometry",
                    GeometryArray::new(vec![Some(multi.clone()), None], None),
                ),
            ],
            GeoFrameOptions::default(),
        )?;

        let Some(parts) = gdf.explode(&ExplodeOptions::default())?.into_geo() else {
            panic!("expected a geometry-aware table");
        };
        assert_eq!(parts.nrows(), 3);
        assert_eq!(parts.index().nlevels(), 2);
        assert_eq!(parts.index().key(1), Some(&[Label::Int(0), Label::Int(1)][..]));
        assert_eq!(parts.frame().column("id")?.value(1), Value::Int(7));
        assert_eq!(parts.geometry()?.union_all(UnionMethod::Unary, None)?, multi);

        let Some(flat) = gdf
            .explode(&ExplodeOptions::default().with_index_parts(false))?
            .into_geo()
        else {
            panic!("expected a geometry-aware table");
        };
        assert_eq!(flat.index().nlevels(), 1);
        assert_eq!(flat.index().key(1), Some(&[Label::Int(0)][..]));

        let Some(fresh) = gdf
            .explode(&ExplodeOptions::default().with_ignore_index(true))?
            .into_geo()
        else {
            panic!("expected a geometry-aware table");
        };
        assert!(fresh.index().is_range());
        Ok(())
    }

    #[test]
    fn explode_non_geometry_column_delegates() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let out = gdf.explode(&ExplodeOptions::default().with_column("pop"))?;
        assert_eq!(out.nrows(), 3);
        assert_eq!(out.active_geometry_name(), Some("geometry"));
        Ok(())
    }
}
