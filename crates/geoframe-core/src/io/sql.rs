//! Spatial database seam.
//!
//! Drivers implement [`SpatialDatabase`] over Arrow record batches; geometry
//! travels as WKB (binary or hex text), which is what PostGIS returns for a
//! `geometry` column and accepts on insert.

use arrow::{
    array::{ArrayRef, AsArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use serde::{Deserialize, Serialize};

use crate::{
    crs::Crs,
    frame::{Column, ColumnData, DataFrame},
    geo_frame::{GeoDataFrame, GeoFrameOptions},
    geometry::{codec, GeometryArray},
};

use super::{
    error::{IoError, IoResult},
    geoarrow::{decode_geometry, ArrowOptions},
};

/// Behaviour when the target table exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfExists {
    /// Raise [`IoError::TableExists`].
    #[default]
    Fail,
    /// Drop and recreate.
    Replace,
    /// Insert into the existing table.
    Append,
}

/// A database that stores and returns record batches.
pub trait SpatialDatabase {
    /// Whether a table with this name exists.
    fn table_exists(&self, name: &str) -> IoResult<bool>;

    /// Run a query and return its result set.
    fn query(&self, sql: &str) -> IoResult<RecordBatch>;

    /// Store a batch. `if_exists` is never [`IfExists::Fail`] when the table
    /// exists; that case is rejected before the call.
    fn write_table(&mut self, name: &str, batch: &RecordBatch, if_exists: IfExists) -> IoResult<()>;
}

impl GeoDataFrame {
    /// Run `sql` and build a table whose active geometry is `geom_col`.
    ///
    /// The geometry column may hold binary or hex-encoded WKB. `crs`
    /// overrides whatever the driver reported.
    pub fn from_postgis(
        sql: &str,
        db: &dyn SpatialDatabase,
        geom_col: &str,
        crs: Option<Crs>,
    ) -> IoResult<Self> {
        let batch = db.query(sql)?;
        let schema = batch.schema();
        let mut columns = Vec::with_capacity(batch.num_columns());
        let mut found = false;
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let data = if field.name() == geom_col {
                found = true;
                ColumnData::Geometry(decode_wkb_column(geom_col, array, crs.clone())?)
            } else {
                ColumnData::Array(array.clone())
            };
            columns.push(Column::new(field.name().as_str(), data));
        }
        if !found {
            return Err(IoError::MissingGeometry {
                requested: Some(geom_col.to_string()),
            });
        }
        let frame = DataFrame::from_columns(columns)?;
        Ok(GeoDataFrame::new(
            frame,
            GeoFrameOptions::default().with_geometry(geom_col),
        )?)
    }

    /// Store the table as `name`. The index is not written.
    pub fn to_postgis(
        &self,
        name: &str,
        db: &mut dyn SpatialDatabase,
        if_exists: IfExists,
    ) -> IoResult<()> {
        if if_exists == IfExists::Fail && db.table_exists(name)? {
            return Err(IoError::TableExists {
                name: name.to_string(),
            });
        }
        let batch = self.to_arrow(&ArrowOptions::default().with_index(false))?;
        db.write_table(name, &batch, if_exists)?;
        log::debug!("wrote {} rows to table {name:?}", batch.num_rows());
        Ok(())
    }
}

fn decode_wkb_column(name: &str, array: &ArrayRef, crs: Option<Crs>) -> IoResult<GeometryArray> {
    match array.data_type() {
        DataType::Utf8 => {
            let text = array.as_string::<i32>();
            let values = text
                .iter()
                .map(|hex| hex.map(codec::from_wkb_hex).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GeometryArray::new(values, crs))
        }
        _ => {
            let values = decode_geometry(name, array, None)?;
            Ok(match crs {
                Some(crs) => values.with_crs(Some(crs)),
                None => values,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::{Field, Schema},
    };
    use geo_types::{point, Geometry};
    use std::{collections::HashMap, sync::Arc};

    #[derive(Default)]
    struct MemoryDatabase {
        tables: HashMap<String, RecordBatch>,
    }

    impl SpatialDatabase for MemoryDatabase {
        fn table_exists(&self, name: &str) -> IoResult<bool> {
            Ok(self.tables.contains_key(name))
        }

        fn query(&self, sql: &str) -> IoResult<RecordBatch> {
            let name = sql.rsplit(' ').next().unwrap_or_default();
            self.tables.get(name).cloned().ok_or(IoError::Database {
                message: format!("relation {name:?} does not exist"),
            })
        }

        fn write_table(&mut self, name: &str, batch: &RecordBatch, if_exists: IfExists) -> IoResult<()> {
            let merged = match (if_exists, self.tables.get(name)) {
                (IfExists::Append, Some(existing)) => {
                    arrow::compute::concat_batches(&existing.schema(), [existing, batch])?
                }
                _ => batch.clone(),
            };
            self.tables.insert(name.to_string(), merged);
            Ok(())
        }
    }

    fn sample() -> IoResult<GeoDataFrame> {
        Ok(GeoDataFrame::from_columns(
            vec![
                Column::new("id", vec![1_i64]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries(
                        [Geometry::Point(point!(x: 3.0, y: 4.0))],
                        Some(Crs::from_epsg(4326)),
                    ),
                ),
            ],
            GeoFrameOptions::default(),
        )?)
    }

    #[test]
    fn write_modes() -> IoResult<()> {
        let gdf = sample()?;
        let mut db = MemoryDatabase::default();
        gdf.to_postgis("places", &mut db, IfExists::Fail)?;
        assert!(matches!(
            gdf.to_postgis("places", &mut db, IfExists::Fail),
            Err(IoError::TableExists { .. })
        ));
        gdf.to_postgis("places", &mut db, IfExists::Append)?;
        assert_eq!(db.tables["places"].num_rows(), 2);
        gdf.to_postgis("places", &mut db, IfExists::Replace)?;
        assert_eq!(db.tables["places"].num_rows(), 1);
        Ok(())
    }

    #[test]
    fn reads_hex_wkb_with_crs() -> IoResult<()> {
        let hex = codec::to_wkb_hex(&Geometry::Point(point!(x: 3.0, y: 4.0)))?;
        let schema = Arc::new(Schema::new(vec![
            Field::new("gid", DataType::Int64, false),
            Field::new("geom", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![9_i64])),
                Arc::new(StringArray::from(vec![Some(hex)])),
            ],
        )?;
        let mut db = MemoryDatabase::default();
        db.tables.insert("roads".to_string(), batch);

        let gdf = GeoDataFrame::from_postgis(
            "SELECT * FROM roads",
            &db,
            "geom",
            Some(Crs::from_epsg(4326)),
        )?;
        assert_eq!(gdf.active_geometry_name(), Some("geom"));
        assert_eq!(gdf.crs()?, Some(&Crs::from_epsg(4326)));
        assert_eq!(gdf.frame().column("gid")?.value(0), Value::Int(9));

        assert!(matches!(
            GeoDataFrame::from_postgis("SELECT * FROM roads", &db, "missing", None),
            Err(IoError::MissingGeometry { .. })
        ));
        Ok(())
    }

    #[test]
    fn round_trip_through_binary_wkb() -> IoResult<()> {
        let mut db = MemoryDatabase::default();
        sample()?.to_postgis("places", &mut db, IfExists::Fail)?;
        let back = GeoDataFrame::from_postgis("SELECT * FROM places", &db, "geometry", None)?;
        assert_eq!(back.geometry()?.get(0), Some(&Geometry::Point(point!(x: 3.0, y: 4.0))));
        Ok(())
    }
}
