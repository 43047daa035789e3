//! A single geometry column with its index.

use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, StringArray};
use geo_types::Geometry;

use crate::{
    crs::Crs,
    frame::{ColumnData, DataFrame, FrameError, Index, Series},
    geometry::{
        codec,
        kernel::{self, UnionMethod},
        project::{BuiltinProjector, Projector},
        GeometryArray,
    },
    value::{Label, Value},
};

use super::{
    crs_guard::{reproject, retag},
    error::GeoFrameResult,
    reshape::explode_values,
    GeoDataFrame, DEFAULT_GEOMETRY_NAME,
};

/// A named, indexed geometry array.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSeries {
    /// Series name.
    pub name: Option<String>,
    /// Row labels.
    pub index: Index,
    pub(crate) values: GeometryArray,
}

impl GeoSeries {
    /// Build a series; index and values must have the same length.
    pub fn new(name: Option<String>, index: Index, values: GeometryArray) -> GeoFrameResult<Self> {
        if index.len() != values.len() {
            return Err(FrameError::LengthMismatch {
                what: "geometry values".to_string(),
                expected: index.len(),
                found: values.len(),
            }
            .into());
        }
        Ok(Self {
            name,
            index,
            values,
        })
    }

    /// Series with a default range index.
    pub fn from_array(name: Option<String>, values: GeometryArray) -> Self {
        Self {
            name,
            index: Index::range(values.len()),
            values,
        }
    }

    /// Coerce dynamically-typed values.
    pub fn from_values(name: Option<String>, values: &[Value], crs: Option<Crs>) -> GeoFrameResult<Self> {
        Ok(Self::from_array(name, GeometryArray::from_values(values, crs)?))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Geometry at position `i`; `None` for a missing value.
    pub fn get(&self, i: usize) -> Option<&Geometry<f64>> {
        self.values.get(i)
    }

    /// Underlying array.
    pub fn values(&self) -> &GeometryArray {
        &self.values
    }

    /// Unwrap the underlying array.
    pub fn into_values(self) -> GeometryArray {
        self.values
    }

    /// CRS of the values.
    pub fn crs(&self) -> Option<&Crs> {
        self.values.crs()
    }

    /// Retag without transforming coordinates.
    pub fn set_crs(&self, crs: Option<Crs>, allow_override: bool) -> GeoFrameResult<GeoSeries> {
        Ok(Self {
            name: self.name.clone(),
            index: self.index.clone(),
            values: retag(&self.values, crs, allow_override)?,
        })
    }

    /// Reproject with the built-in projector.
    pub fn to_crs(&self, crs: &Crs) -> GeoFrameResult<GeoSeries> {
        self.to_crs_with(crs, &BuiltinProjector)
    }

    /// Reproject with a caller-supplied projector.
    pub fn to_crs_with(&self, crs: &Crs, projector: &dyn Projector) -> GeoFrameResult<GeoSeries> {
        Ok(Self {
            name: self.name.clone(),
            index: self.index.clone(),
            values: reproject(&self.values, crs, projector)?,
        })
    }

    /// Per-row `[minx, miny, maxx, maxy]`.
    pub fn bounds(&self) -> Vec<Option<[f64; 4]>> {
        self.values.bounds()
    }

    /// Bounds of all non-missing geometries.
    pub fn total_bounds(&self) -> Option<[f64; 4]> {
        self.values.total_bounds()
    }

    /// Union of every non-missing geometry.
    pub fn union_all(&self, method: UnionMethod, grid_size: Option<f64>) -> GeoFrameResult<Geometry<f64>> {
        Ok(kernel::union_all(self.values.iter().flatten(), method, grid_size)?)
    }

    /// One row per part of every multi-part geometry.
    ///
    /// With `index_parts` the part ordinal becomes a trailing index level;
    /// `ignore_index` replaces the index with a range.
    pub fn explode(&self, ignore_index: bool, index_parts: bool) -> GeoFrameResult<GeoSeries> {
        let (positions, values, ordinals) = explode_values(&self.values);
        let index = if ignore_index {
            Index::range(values.len())
        } else if index_parts {
            let labels = ordinals.into_iter().map(Label::Int).collect();
            self.index.take(&positions).append_level(None, labels)?
        } else {
            self.index.take(&positions)
        };
        GeoSeries::new(self.name.clone(), index, values)
    }

    /// Encode as WKB bytes, or hex text with `hex`.
    pub fn to_wkb(&self, hex: bool) -> GeoFrameResult<Series> {
        let array: ArrayRef = if hex {
            let encoded = self
                .values
                .iter()
                .map(|g| g.map(codec::to_wkb_hex).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(StringArray::from(encoded))
        } else {
            let encoded = self
                .values
                .iter()
                .map(|g| g.map(codec::to_wkb).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(encoded.iter().map(|b| b.as_deref()).collect::<BinaryArray>())
        };
        Ok(Series {
            name: self.name.clone(),
            index: self.index.clone(),
            data: ColumnData::Array(array),
        })
    }

    /// Encode as WKT text.
    pub fn to_wkt(&self) -> Series {
        let encoded: Vec<Option<String>> = self.values.iter().map(|g| g.map(codec::to_wkt)).collect();
        Series {
            name: self.name.clone(),
            index: self.index.clone(),
            data: ColumnData::Array(Arc::new(StringArray::from(encoded))),
        }
    }

    /// As a plain series whose values keep geometry storage.
    pub fn to_series(&self) -> Series {
        Series {
            name: self.name.clone(),
            index: self.index.clone(),
            data: ColumnData::Geometry(self.values.clone()),
        }
    }

    /// One-column geometry-aware table with this series active.
    pub fn to_frame(&self) -> GeoFrameResult<GeoDataFrame> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_GEOMETRY_NAME.to_string());
        let frame = DataFrame::new(
            self.index.clone(),
            vec![crate::frame::Column::new(name.clone(), self.values.clone())],
        )?;
        Ok(GeoDataFrame {
            frame,
            active: Some(name),
            promote_default_name: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use geo_types::{line_string, point, MultiPoint};

    fn multi() -> Geometry<f64> {
        Geometry::MultiPoint(MultiPoint(vec![point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 1.0)]))
    }

    #[test]
    fn explode_then_union_restores_multipart() -> GeoFrameResult<()> {
        let s = GeoSeries::from_array(Some("g".into()), GeometryArray::from_geometries([multi()], None));
        let parts = s.explode(false, true)?;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.index.nlevels(), 2);
        assert_eq!(parts.union_all(UnionMethod::Unary, None)?, multi());
        Ok(())
    }

    #[test]
    fn wkb_and_wkt_encoding_keeps_nulls() -> GeoFrameResult<()> {
        let s = GeoSeries::new(
            None,
            Index::range(2),
            GeometryArray::new(
                vec![Some(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into()), None],
                None,
            ),
        )?;
        let wkt = s.to_wkt();
        let ColumnData::Array(arr) = &wkt.data else {
            panic!("expected arrow storage");
        };
        let text = arr.as_string::<i32>().value(0);
        assert!(text.starts_with("LINESTRING"));
        assert_eq!(Some(&codec::from_wkt(text)?), s.get(0));
        assert!(arr.is_null(1));

        let hex = s.to_wkb(true)?;
        let ColumnData::Array(arr) = &hex.data else {
            panic!("expected arrow storage");
        };
        let decoded = codec::from_wkb_hex(arr.as_string::<i32>().value(0))?;
        assert_eq!(Some(&decoded), s.get(0));
        Ok(())
    }

    #[test]
    fn to_frame_activates_series() -> GeoFrameResult<()> {
        let s = GeoSeries::from_array(None, GeometryArray::from_geometries([multi()], Some(Crs::from_epsg(4326))));
        let gdf = s.to_frame()?;
        assert_eq!(gdf.active_geometry_name(), Some("geometry"));
        assert_eq!(gdf.crs()?, Some(&Crs::from_epsg(4326)));
        Ok(())
    }
}
