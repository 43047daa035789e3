//! Function application with geometry re-attachment.
//!
//! The host engine applies functions without knowing about geometry, so a
//! result may hold the old active column as untyped values. These wrappers
//! re-coerce it, re-attach the active name and restore a CRS the function
//! dropped. Whether that CRS is still correct after an arbitrary function is
//! up to the caller.

use crate::frame::{ColumnData, DataFrame, FrameResult, Series};

use super::{
    error::GeoFrameResult,
    propagate::{reconstruct, Derivation},
    registry::ensure_geometry,
    AnySeries, GeoDataFrame, GeoSeries, Table,
};

impl GeoDataFrame {
    /// Apply `f` to every row; each returned series becomes a row.
    pub fn apply_rows<F>(&self, f: F) -> GeoFrameResult<Table>
    where
        F: FnMut(&Series) -> FrameResult<Series>,
    {
        let frame = self.frame.apply_rows(f)?;
        self.reattach(frame)
    }

    /// Apply `f` to every column; each returned series replaces the column.
    pub fn apply_columns<F>(&self, f: F) -> GeoFrameResult<Table>
    where
        F: FnMut(&Series) -> FrameResult<Series>,
    {
        let frame = self.frame.apply_columns(f)?;
        self.reattach(frame)
    }

    /// Apply `f` to every row, producing one value per row.
    ///
    /// A result made of geometries (and missing values) becomes a geometry
    /// series without CRS. An all-missing result stays plain.
    pub fn apply_rows_to_values<F>(&self, f: F) -> GeoFrameResult<AnySeries>
    where
        F: FnMut(&Series) -> FrameResult<crate::value::Value>,
    {
        let series = self.frame.apply_rows_to_values(f)?;
        if series.data.is_all_null() {
            return Ok(AnySeries::Plain(series));
        }
        if let ColumnData::Object(values) = &series.data {
            if let Ok(values) = crate::geometry::GeometryArray::from_values(values, None) {
                return Ok(AnySeries::Geo(GeoSeries::new(
                    series.name,
                    series.index,
                    values,
                )?));
            }
        }
        Ok(AnySeries::Plain(series))
    }

    fn reattach(&self, mut frame: DataFrame) -> GeoFrameResult<Table> {
        if let Some(name) = self.active.as_deref() {
            if frame.positions(name).len() == 1 {
                let data = frame.column(name)?;
                if let Ok(values) = ensure_geometry(data, None) {
                    let values = match (values.crs(), self.crs()) {
                        (None, Ok(Some(crs))) => values.with_crs(Some(crs.clone())),
                        _ => values,
                    };
                    frame.set_column(name, ColumnData::Geometry(values))?;
                }
            }
        }
        reconstruct(frame, Derivation::Apply(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crs::Crs,
        frame::Column,
        geo_frame::GeoFrameOptions,
        geometry::{kernel, GeometryArray},
        value::Value,
    };
    use geo::MapCoords;
    use geo_types::{point, Geometry};

    fn sample() -> GeoFrameResult<GeoDataFrame> {
        GeoDataFrame::from_columns(
            vec![
                Column::new("v", vec![1_i64, 2]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries(
                        [
                            Geometry::Point(point!(x: 0.0, y: 0.0)),
                            Geometry::Point(point!(x: 1.0, y: 1.0)),
                        ],
                        None,
                    ),
                ),
            ],
            GeoFrameOptions::default().with_crs(Crs::from_epsg(3857)),
        )
    }

    #[test]
    fn row_apply_reattaches_geometry_and_crs() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let out = gdf.apply_rows(|row| Ok(row.clone()))?;
        let Some(out) = out.into_geo() else {
            panic!("expected a geometry-aware table");
        };
        assert_eq!(out.active_geometry_name(), Some("geometry"));
        assert_eq!(out.crs()?, Some(&Crs::from_epsg(3857)));
        Ok(())
    }

    #[test]
    fn column_apply_keeps_storage() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let out = gdf.apply_columns(|col| match &col.data {
            ColumnData::Geometry(g) => {
                let shifted = g
                    .iter()
                    .map(|p| p.map(|p| p.map_coords(|c| c + (10.0, 0.0).into())))
                    .collect();
                Ok(Series {
                    data: ColumnData::Geometry(GeometryArray::new(shifted, None)),
                    ..col.clone()
                })
            }
            _ => Ok(col.clone()),
        })?;
        let Some(out) = out.into_geo() else {
            panic!("expected a geometry-aware table");
        };
        assert_eq!(out.crs()?, Some(&Crs::from_epsg(3857)));
        assert_eq!(
            out.geometry()?.get(0).and_then(kernel::bounds),
            Some([10.0, 0.0, 10.0, 0.0])
        );
        Ok(())
    }

    #[test]
    fn value_apply_narrows_geometry_results() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let geoms = gdf.apply_rows_to_values(|row| Ok(row.get("geometry").unwrap_or(Value::Null)))?;
        assert!(matches!(geoms, AnySeries::Geo(ref s) if s.crs().is_none()));

        let nulls = gdf.apply_rows_to_values(|_| Ok(Value::Null))?;
        assert!(matches!(nulls, AnySeries::Plain(_)));

        let numbers = gdf.apply_rows_to_values(|row| Ok(row.get("v").unwrap_or(Value::Null)))?;
        assert!(matches!(numbers, AnySeries::Plain(_)));
        Ok(())
    }
}
