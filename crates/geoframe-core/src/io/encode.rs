//! Whole-table text and binary geometry encoders.

use crate::{
    frame::{ColumnData, DataFrame},
    geo_frame::{GeoDataFrame, GeoSeries},
};

use super::error::IoResult;

impl GeoDataFrame {
    /// Plain copy with every geometry column encoded as WKB (hex text when
    /// `hex` is set).
    pub fn to_wkb(&self, hex: bool) -> IoResult<DataFrame> {
        self.encode_geometry_columns(|series| Ok(series.to_wkb(hex)?.data))
    }

    /// Plain copy with every geometry column encoded as WKT.
    pub fn to_wkt(&self) -> IoResult<DataFrame> {
        self.encode_geometry_columns(|series| Ok(series.to_wkt().data))
    }

    fn encode_geometry_columns<F>(&self, mut encode: F) -> IoResult<DataFrame>
    where
        F: FnMut(&GeoSeries) -> IoResult<ColumnData>,
    {
        let mut out = self.frame.clone();
        for (position, column) in self.frame.columns().iter().enumerate() {
            let ColumnData::Geometry(values) = &column.data else {
                continue;
            };
            let series = GeoSeries::new(
                Some(column.name.clone()),
                self.frame.index().clone(),
                values.clone(),
            )?;
            out.set_column_at(position, encode(&series)?)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::{Column, DType},
        geo_frame::GeoFrameOptions,
        geometry::{codec, GeometryArray},
    };
    use arrow::{array::AsArray, datatypes::DataType};
    use geo_types::{point, Geometry};

    fn sample() -> IoResult<GeoDataFrame> {
        let pts = GeometryArray::from_geometries([Geometry::Point(point!(x: 1.0, y: 2.0))], None);
        Ok(GeoDataFrame::from_columns(
            vec![
                Column::new("name", vec!["a"]),
                Column::new("geometry", pts.clone()),
                Column::new("other", pts),
            ],
            GeoFrameOptions::default(),
        )?)
    }

    #[test]
    fn encodes_every_geometry_column() -> IoResult<()> {
        let gdf = sample()?;
        let out = gdf.to_wkb(true)?;
        assert_eq!(out.column("geometry")?.dtype(), DType::Arrow(DataType::Utf8));
        assert_eq!(out.column("other")?.dtype(), DType::Arrow(DataType::Utf8));
        assert_eq!(out.column("name")?.dtype(), DType::Arrow(DataType::Utf8));

        let binary = gdf.to_wkb(false)?;
        let ColumnData::Array(arr) = binary.column("geometry")? else {
            panic!("expected an arrow column");
        };
        let decoded = codec::from_wkb(arr.as_binary::<i32>().value(0))?;
        assert_eq!(decoded, Geometry::Point(point!(x: 1.0, y: 2.0)));
        Ok(())
    }

    #[test]
    fn wkt_output_is_plain_text() -> IoResult<()> {
        let out = sample()?.to_wkt()?;
        assert!(!out.columns().iter().any(|c| c.data.is_geometry()));
        assert!(matches!(
            out.column("other")?.value(0),
            crate::value::Value::Str(s) if s.starts_with("POINT")
        ));
        Ok(())
    }
}
