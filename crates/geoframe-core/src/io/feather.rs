//! Feather (Arrow IPC file) with GeoParquet `geo` schema metadata.

use std::{fs::File, path::Path, sync::Arc};

use arrow::{
    compute::concat_batches,
    datatypes::Schema,
    error::ArrowError,
    ipc::{reader::FileReader, writer::FileWriter},
    record_batch::RecordBatch,
};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::geo_frame::GeoDataFrame;

use super::{
    error::{FileSnafu, InvalidMetadataSnafu, IoResult},
    geoparquet::{decode_geo_batch, encode_geo_batch, ParquetOptions, SchemaVersion, GEO_METADATA_KEY},
};

/// Options for [`GeoDataFrame::to_feather`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatherOptions {
    /// Write the row index as columns; `None` writes a non-default index.
    pub index: Option<bool>,
    /// Version of the `geo` metadata.
    pub schema_version: SchemaVersion,
}

impl FeatherOptions {
    /// Control index columns.
    pub fn with_index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the metadata version.
    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }
}

impl GeoDataFrame {
    /// Write a Feather file.
    pub fn to_feather(&self, path: impl AsRef<Path>, opts: &FeatherOptions) -> IoResult<()> {
        let path = path.as_ref();
        let parquet_opts = ParquetOptions {
            index: opts.index,
            schema_version: opts.schema_version,
            ..ParquetOptions::default()
        };
        let (batch, geo) = encode_geo_batch(self, &parquet_opts)?;
        let schema = batch.schema();
        let mut metadata = schema.metadata().clone();
        metadata.insert(GEO_METADATA_KEY.to_string(), geo);
        let schema = Arc::new(Schema::new_with_metadata(schema.fields().clone(), metadata));
        let batch = RecordBatch::try_new(schema.clone(), batch.columns().to_vec())?;

        let file = File::create(path).context(FileSnafu { path })?;
        let mut writer = FileWriter::try_new(file, &schema)?;
        writer.write(&batch)?;
        writer.finish()?;
        log::debug!("wrote {} rows to {}", batch.num_rows(), path.display());
        Ok(())
    }

    /// Read a Feather file.
    pub fn from_feather(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(FileSnafu { path })?;
        let reader = FileReader::try_new(file, None)?;
        let schema = reader.schema();
        let geo = schema
            .metadata()
            .get(GEO_METADATA_KEY)
            .cloned()
            .context(InvalidMetadataSnafu {
                message: "missing `geo` metadata; the file holds no geometry columns",
            })?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
        let batch = concat_batches(&schema, &batches)?;
        decode_geo_batch(&batch, &geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crs::Crs,
        frame::Column,
        geo_frame::GeoFrameOptions,
        geometry::GeometryArray,
        io::IoError,
    };
    use geo_types::{point, Geometry};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn feather_round_trip() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("points.feather");
        let gdf = GeoDataFrame::from_columns(
            vec![
                Column::new("v", vec![1.5_f64, 2.5]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries(
                        [
                            Geometry::Point(point!(x: 0.0, y: 1.0)),
                            Geometry::Point(point!(x: 2.0, y: 3.0)),
                        ],
                        Some(Crs::from_epsg(4326)),
                    ),
                ),
            ],
            GeoFrameOptions::default(),
        )?;
        gdf.to_feather(&path, &FeatherOptions::default())?;

        let back = GeoDataFrame::from_feather(&path)?;
        assert_eq!(back.nrows(), 2);
        assert_eq!(back.active_geometry_name(), Some("geometry"));
        assert_eq!(back.crs()?, Some(&Crs::from_epsg(4326)));
        assert_eq!(back.geometry()?.get(1), gdf.geometry()?.get(1));
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GeoDataFrame::from_feather("/nonexistent/dir/x.feather");
        assert!(matches!(err, Err(IoError::File { .. })));
    }
}
