//! Format dispatch by file extension.

use std::{fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use snafu::prelude::*;

use crate::{crs::Crs, geo_frame::GeoDataFrame};

use super::{
    error::{FileSnafu, IoError, IoResult},
    feather::FeatherOptions,
    features::{FromFeaturesOptions, JsonOptions},
    geoparquet::{ParquetOptions, SchemaVersion},
};

/// A file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// GeoParquet.
    Parquet,
    /// Feather / Arrow IPC file.
    Feather,
    /// GeoJSON `FeatureCollection`.
    GeoJson,
}

impl Driver {
    /// Infer the format from the path's extension.
    pub fn from_path(path: &Path) -> IoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("parquet" | "geoparquet") => Ok(Driver::Parquet),
            Some("feather" | "arrow" | "ipc") => Ok(Driver::Feather),
            Some("geojson" | "json") => Ok(Driver::GeoJson),
            _ => Err(IoError::UnsupportedDriver {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Parquet => "parquet",
            Driver::Feather => "feather",
            Driver::GeoJson => "geojson",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Driver::from_path(Path::new(&format!("file.{s}")))
    }
}

/// Options for [`GeoDataFrame::to_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Format; inferred from the extension when unset.
    pub driver: Option<Driver>,
    /// GeoParquet metadata version for Parquet and Feather output.
    pub schema_version: SchemaVersion,
    /// Write the row index as columns (Parquet and Feather).
    pub index: Option<bool>,
}

impl FileOptions {
    /// Force a format.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Set the metadata version.
    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }
}

impl GeoDataFrame {
    /// Read any supported file, choosing the format by extension.
    ///
    /// GeoJSON input is taken to be WGS84 unless it carries a legacy `crs`
    /// member.
    pub fn from_file(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let driver = Driver::from_path(path)?;
        log::debug!("reading {} as {driver}", path.display());
        match driver {
            Driver::Parquet => GeoDataFrame::from_parquet(path),
            Driver::Feather => GeoDataFrame::from_feather(path),
            Driver::GeoJson => {
                let text = fs::read_to_string(path).context(FileSnafu { path })?;
                let json: JsonValue = serde_json::from_str(&text)?;
                let crs = match json.pointer("/crs/properties/name").and_then(JsonValue::as_str) {
                    Some(name) => Crs::parse(name).map_err(|e| IoError::InvalidMetadata {
                        message: e.to_string(),
                    })?,
                    None => Crs::wgs84(),
                };
                GeoDataFrame::from_features(&json, &FromFeaturesOptions::default().with_crs(crs))
            }
        }
    }

    /// Write to any supported file.
    pub fn to_file(&self, path: impl AsRef<Path>, opts: &FileOptions) -> IoResult<()> {
        let path = path.as_ref();
        let driver = match opts.driver {
            Some(driver) => driver,
            None => Driver::from_path(path)?,
        };
        log::debug!("writing {} as {driver}", path.display());
        match driver {
            Driver::Parquet => self.to_parquet(
                path,
                &ParquetOptions {
                    index: opts.index,
                    schema_version: opts.schema_version,
                    ..ParquetOptions::default()
                },
            ),
            Driver::Feather => self.to_feather(
                path,
                &FeatherOptions {
                    index: opts.index,
                    schema_version: opts.schema_version,
                },
            ),
            Driver::GeoJson => {
                let text = self.to_json(&JsonOptions::default())?;
                fs::write(path, text).context(FileSnafu { path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::Column, geo_frame::GeoFrameOptions, geometry::GeometryArray};
    use geo_types::{point, Geometry};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn driver_from_extension() -> IoResult<()> {
        assert_eq!(Driver::from_path(Path::new("a/b.GeoJSON"))?, Driver::GeoJson);
        assert_eq!(Driver::from_path(Path::new("x.arrow"))?, Driver::Feather);
        assert_eq!("parquet".parse::<Driver>()?, Driver::Parquet);
        assert!(matches!(
            Driver::from_path(Path::new("x.shp")),
            Err(IoError::UnsupportedDriver { .. })
        ));
        Ok(())
    }

    #[test]
    fn geojson_round_trip_keeps_crs_member() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.geojson");
        let gdf = GeoDataFrame::from_columns(
            vec![
                Column::new("n", vec![7_i64]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries(
                        [Geometry::Point(point!(x: 100.0, y: 200.0))],
                        Some(Crs::from_epsg(3857)),
                    ),
                ),
            ],
            GeoFrameOptions::default(),
        )?;
        gdf.to_file(&path, &FileOptions::default())?;

        let back = GeoDataFrame::from_file(&path)?;
        assert_eq!(back.crs()?, Some(&Crs::from_epsg(3857)));
        assert_eq!(back.column_names(), vec!["geometry", "n"]);
        Ok(())
    }
}
