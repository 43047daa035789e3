//! GeoParquet files.
//!
//! The file-level `geo` key-value metadata records the primary geometry
//! column and, per geometry column, its encoding, geometry types, CRS and
//! bounding box. The metadata layout follows the requested schema version.

use std::{collections::HashMap, fmt, fs::File, path::Path, str::FromStr, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, Float64Array, StructArray},
    buffer::NullBuffer,
    compute::concat_batches,
    datatypes::{DataType, Field, Fields, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    file::{metadata::KeyValue, properties::WriterProperties},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use snafu::prelude::*;

use crate::{
    crs::Crs,
    geo_frame::GeoDataFrame,
    geometry::{codec, GeometryArray},
};

use super::{
    error::{FileSnafu, InvalidMetadataSnafu, IoError, IoResult},
    geoarrow::{crs_from_json, decode_batch, ArrowOptions, GeometryEncoding},
};

/// Key of the GeoParquet metadata.
pub const GEO_METADATA_KEY: &str = "geo";
/// Name of the covering bounding-box column.
pub const BBOX_COLUMN: &str = "bbox";

/// GeoParquet metadata schema version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// 0.1.0
    #[serde(rename = "0.1.0")]
    V0_1_0,
    /// 0.4.0
    #[serde(rename = "0.4.0")]
    V0_4_0,
    /// 1.0.0
    #[default]
    #[serde(rename = "1.0.0")]
    V1_0_0,
    /// 1.1.0
    #[serde(rename = "1.1.0")]
    V1_1_0,
}

impl SchemaVersion {
    /// Version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V0_1_0 => "0.1.0",
            SchemaVersion::V0_4_0 => "0.4.0",
            SchemaVersion::V1_0_0 => "1.0.0",
            SchemaVersion::V1_1_0 => "1.1.0",
        }
    }

    fn is_pre_1_0(&self) -> bool {
        matches!(self, SchemaVersion::V0_1_0 | SchemaVersion::V0_4_0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.1.0" => Ok(SchemaVersion::V0_1_0),
            "0.4.0" => Ok(SchemaVersion::V0_4_0),
            "1.0.0" => Ok(SchemaVersion::V1_0_0),
            "1.1.0" => Ok(SchemaVersion::V1_1_0),
            other => Err(IoError::UnsupportedSchemaVersion {
                version: other.to_string(),
            }),
        }
    }
}

/// Options for [`GeoDataFrame::to_parquet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetOptions {
    /// Write the row index as columns; see [`ArrowOptions::index`].
    pub index: Option<bool>,
    /// Metadata schema version.
    pub schema_version: SchemaVersion,
    /// Geometry encoding. Native encodings need schema version 1.1.0.
    pub geometry_encoding: GeometryEncoding,
    /// Add a `bbox` covering column (schema version 1.1.0 only).
    pub write_covering_bbox: bool,
}

impl ParquetOptions {
    /// Control index columns.
    pub fn with_index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the schema version.
    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }

    /// Set the geometry encoding.
    pub fn with_encoding(mut self, encoding: GeometryEncoding) -> Self {
        self.geometry_encoding = encoding;
        self
    }

    /// Toggle the covering bounding-box column.
    pub fn with_covering_bbox(mut self, write: bool) -> Self {
        self.write_covering_bbox = write;
        self
    }
}

impl GeoDataFrame {
    /// Write a GeoParquet file.
    pub fn to_parquet(&self, path: impl AsRef<Path>, opts: &ParquetOptions) -> IoResult<()> {
        let path = path.as_ref();
        let (batch, geo) = encode_geo_batch(self, opts)?;
        let props = WriterProperties::builder()
            .set_key_value_metadata(Some(vec![KeyValue::new(GEO_METADATA_KEY.to_string(), geo)]))
            .build();
        let file = File::create(path).context(FileSnafu { path })?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        log::debug!("wrote {} rows to {}", batch.num_rows(), path.display());
        Ok(())
    }

    /// Read a GeoParquet file.
    pub fn from_parquet(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(FileSnafu { path })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let geo = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kv| kv.iter().find(|kv| kv.key == GEO_METADATA_KEY))
            .and_then(|kv| kv.value.clone())
            .or_else(|| builder.schema().metadata().get(GEO_METADATA_KEY).cloned())
            .context(InvalidMetadataSnafu {
                message: "missing `geo` metadata; the file holds no geometry columns",
            })?;
        let schema = builder.schema().clone();
        let batches = builder
            .build()?
            .collect::<Result<Vec<_>, ArrowError>>()?;
        let batch = concat_batches(&schema, &batches)?;
        decode_geo_batch(&batch, &geo)
    }
}

/// Encode a table for a GeoParquet-style file: the record batch and the
/// `geo` metadata JSON text.
pub(crate) fn encode_geo_batch(
    gdf: &GeoDataFrame,
    opts: &ParquetOptions,
) -> IoResult<(RecordBatch, String)> {
    let primary = gdf.active_array()?;
    let primary_name = gdf.active_geometry_name().unwrap_or_default().to_string();
    if opts.write_covering_bbox && opts.schema_version != SchemaVersion::V1_1_0 {
        return InvalidMetadataSnafu {
            message: format!(
                "a covering bbox column needs schema version 1.1.0, not {}",
                opts.schema_version
            ),
        }
        .fail();
    }

    if opts.geometry_encoding == GeometryEncoding::Geoarrow
        && opts.schema_version != SchemaVersion::V1_1_0
    {
        return Err(IoError::UnsupportedEncoding {
            column: primary_name,
            encoding: opts.geometry_encoding.as_geoparquet().to_string(),
            reason: format!(
                "native encodings need schema version 1.1.0, not {}",
                opts.schema_version
            ),
        });
    }

    let mut columns = Map::new();
    for column in gdf.frame().columns() {
        let Some(values) = column.data.as_geometry() else {
            continue;
        };
        let mut meta = column_metadata(values, opts.geometry_encoding, opts.schema_version);
        if opts.write_covering_bbox && column.name == primary_name {
            meta.insert(
                "covering".to_string(),
                json!({"bbox": {
                    "xmin": [BBOX_COLUMN, "xmin"],
                    "ymin": [BBOX_COLUMN, "ymin"],
                    "xmax": [BBOX_COLUMN, "xmax"],
                    "ymax": [BBOX_COLUMN, "ymax"],
                }}),
            );
        }
        columns.insert(column.name.clone(), JsonValue::Object(meta));
    }

    let geo = json!({
        "primary_column": primary_name,
        "columns": columns,
        "version": opts.schema_version.as_str(),
        "creator": {"library": "geoframe", "version": env!("CARGO_PKG_VERSION")},
    });

    let arrow_opts = ArrowOptions {
        index: opts.index,
        geometry_encoding: opts.geometry_encoding,
        ..ArrowOptions::default()
    };
    let mut batch = gdf.to_arrow(&arrow_opts)?;
    if opts.write_covering_bbox {
        batch = with_bbox_column(batch, primary)?;
    }
    Ok((batch, geo.to_string()))
}

fn column_metadata(
    values: &GeometryArray,
    encoding: GeometryEncoding,
    version: SchemaVersion,
) -> Map<String, JsonValue> {
    let mut types: Vec<&str> = values
        .iter()
        .flatten()
        .map(codec::geometry_type_name)
        .collect();
    types.sort_unstable();
    types.dedup();

    let mut meta = Map::new();
    meta.insert("encoding".to_string(), json!(encoding.as_geoparquet()));
    if version.is_pre_1_0() {
        let geometry_type = match types.as_slice() {
            [single] => json!(single),
            many => json!(many),
        };
        meta.insert("geometry_type".to_string(), geometry_type);
    } else {
        meta.insert("geometry_types".to_string(), json!(types));
    }
    meta.insert("crs".to_string(), crs_metadata(values.crs(), version));
    if let Some(bbox) = values.total_bounds() {
        meta.insert("bbox".to_string(), json!(bbox));
    }
    meta
}

/// CRS as written in column metadata: the identifier string for 0.1.0, a
/// PROJJSON-style object with an `id` member otherwise.
fn crs_metadata(crs: Option<&Crs>, version: SchemaVersion) -> JsonValue {
    let Some(crs) = crs else {
        return JsonValue::Null;
    };
    if version == SchemaVersion::V0_1_0 {
        return json!(crs.as_str());
    }
    match crs.to_authority() {
        Some((authority, code)) => {
            let code = code.parse::<u64>().map_or_else(|_| json!(code), |c| json!(c));
            json!({"name": crs.as_str(), "id": {"authority": authority, "code": code}})
        }
        None => json!(crs.as_str()),
    }
}

fn with_bbox_column(batch: RecordBatch, primary: &GeometryArray) -> IoResult<RecordBatch> {
    let schema = batch.schema();
    if schema.field_with_name(BBOX_COLUMN).is_ok() {
        return Err(IoError::DuplicateColumns {
            name: BBOX_COLUMN.to_string(),
        });
    }
    let bounds = primary.bounds();
    let axis = |i: usize| -> ArrayRef {
        Arc::new(bounds.iter().map(|b| b.map(|b| b[i])).collect::<Float64Array>())
    };
    let fields: Fields = ["xmin", "ymin", "xmax", "ymax"]
        .iter()
        .map(|name| Field::new(*name, DataType::Float64, true))
        .collect();
    let valid: Vec<bool> = bounds.iter().map(Option::is_some).collect();
    let nulls = valid.contains(&false).then(|| NullBuffer::from(valid));
    let bbox = StructArray::try_new(fields, (0..4).map(axis).collect(), nulls)?;

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(BBOX_COLUMN, bbox.data_type().clone(), true));
    let mut arrays = batch.columns().to_vec();
    arrays.push(Arc::new(bbox));
    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
}

#[derive(Debug, Deserialize)]
struct GeoMetadata {
    primary_column: String,
    columns: HashMap<String, Map<String, JsonValue>>,
    #[serde(default)]
    version: Option<String>,
}

/// Decode a batch described by `geo` metadata text.
pub(crate) fn decode_geo_batch(batch: &RecordBatch, geo: &str) -> IoResult<GeoDataFrame> {
    let meta: GeoMetadata = serde_json::from_str(geo).map_err(|e| IoError::InvalidMetadata {
        message: e.to_string(),
    })?;
    if let Some(version) = meta.version.as_deref() {
        if SchemaVersion::from_str(version).is_err() {
            log::warn!("Reading GeoParquet metadata with unknown schema version {version:?}");
        }
    }

    let mut geometry_columns = HashMap::new();
    let mut skip = Vec::new();
    for (name, column) in &meta.columns {
        match column.get("encoding").and_then(JsonValue::as_str) {
            Some(enc) if enc.eq_ignore_ascii_case("wkb") || enc == "point" => {}
            other => {
                return Err(IoError::UnsupportedEncoding {
                    column: name.clone(),
                    encoding: other.unwrap_or("<missing>").to_string(),
                    reason: "only WKB and point encodings can be read".to_string(),
                })
            }
        }
        // A missing `crs` member means OGC:CRS84; an explicit null means none.
        let crs = match column.get("crs") {
            None => Some(Crs::parse("OGC:CRS84").map_err(|e| IoError::InvalidMetadata {
                message: e.to_string(),
            })?),
            Some(value) => crs_from_json(value)?,
        };
        geometry_columns.insert(name.clone(), crs);
        if let Some(covering) = column
            .get("covering")
            .and_then(|c| c.pointer("/bbox/xmin/0"))
            .and_then(JsonValue::as_str)
        {
            skip.push(covering.to_string());
        }
    }
    let skip: Vec<&str> = skip.iter().map(String::as_str).collect();
    decode_batch(batch, &geometry_columns, &meta.primary_column, &skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::{Column, Index},
        geo_frame::GeoFrameOptions,
        value::{Label, Value},
    };
    use geo_types::{point, polygon, Geometry};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample() -> IoResult<GeoDataFrame> {
        Ok(GeoDataFrame::from_columns(
            vec![
                Column::new("name", vec!["a", "b"]),
                Column::new(
                    "geometry",
                    GeometryArray::new(
                        vec![
                            Some(Geometry::Point(point!(x: 1.0, y: 2.0))),
                            Some(Geometry::Polygon(polygon![
                                (x: 0.0, y: 0.0),
                                (x: 4.0, y: 0.0),
                                (x: 4.0, y: 4.0),
                            ])),
                        ],
                        Some(Crs::from_epsg(3857)),
                    ),
                ),
            ],
            GeoFrameOptions::default(),
        )?)
    }

    fn geo_json(gdf: &GeoDataFrame, opts: &ParquetOptions) -> IoResult<JsonValue> {
        let (_, geo) = encode_geo_batch(gdf, opts)?;
        Ok(serde_json::from_str(&geo)?)
    }

    #[test]
    fn metadata_layout_follows_version() -> IoResult<()> {
        let gdf = sample()?;
        let v1 = geo_json(&gdf, &ParquetOptions::default())?;
        assert_eq!(v1["version"], json!("1.0.0"));
        assert_eq!(v1["primary_column"], json!("geometry"));
        let column = &v1["columns"]["geometry"];
        assert_eq!(column["encoding"], json!("WKB"));
        assert_eq!(column["geometry_types"], json!(["Point", "Polygon"]));
        assert_eq!(column["crs"]["id"], json!({"authority": "EPSG", "code": 3857}));
        assert_eq!(column["bbox"], json!([0.0, 0.0, 4.0, 4.0]));

        let v01 = geo_json(
            &gdf,
            &ParquetOptions::default().with_schema_version(SchemaVersion::V0_1_0),
        )?;
        assert_eq!(v01["columns"]["geometry"]["crs"], json!("EPSG:3857"));
        assert_eq!(
            v01["columns"]["geometry"]["geometry_type"],
            json!(["Point", "Polygon"])
        );
        Ok(())
    }

    #[test]
    fn versions_parse_and_reject_unknown() {
        assert_eq!("1.1.0".parse::<SchemaVersion>().ok(), Some(SchemaVersion::V1_1_0));
        assert!(matches!(
            "2.0.0".parse::<SchemaVersion>(),
            Err(IoError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn native_encoding_needs_1_1_0() -> IoResult<()> {
        let gdf = sample()?;
        let opts = ParquetOptions::default().with_encoding(GeometryEncoding::Geoarrow);
        assert!(matches!(
            encode_geo_batch(&gdf, &opts),
            Err(IoError::UnsupportedEncoding { .. })
        ));
        Ok(())
    }

    #[test]
    fn parquet_round_trip_with_covering() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("data.parquet");
        let gdf = sample()?;
        let opts = ParquetOptions::default()
            .with_schema_version(SchemaVersion::V1_1_0)
            .with_covering_bbox(true);
        gdf.to_parquet(&path, &opts)?;

        let back = GeoDataFrame::from_parquet(&path)?;
        assert_eq!(back.column_names(), vec!["name", "geometry"]);
        assert_eq!(back.crs()?, Some(&Crs::from_epsg(3857)));
        assert_eq!(back.geometry()?.get(0), gdf.geometry()?.get(0));
        assert_eq!(back.geometry()?.total_bounds(), Some([0.0, 0.0, 4.0, 4.0]));
        Ok(())
    }

    #[test]
    fn parquet_round_trip_keeps_index() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("indexed.parquet");
        let mut gdf = sample()?;
        gdf.frame
            .set_index(Index::from_labels(None, vec![Label::Int(10), Label::Int(20)]))?;
        gdf.to_parquet(&path, &ParquetOptions::default())?;

        let back = GeoDataFrame::from_parquet(&path)?;
        assert_eq!(back.index().key(1), Some(&[Label::Int(20)][..]));
        assert_eq!(back.frame().column("name")?.value(0), Value::from("a"));
        Ok(())
    }

    #[test]
    fn missing_crs_member_means_crs84() -> IoResult<()> {
        let gdf = sample()?;
        let batch = gdf.to_arrow(&ArrowOptions::default())?;
        let geo = json!({
            "primary_column": "geometry",
            "columns": {"geometry": {"encoding": "WKB", "geometry_types": []}},
            "version": "1.0.0",
        });
        let back = decode_geo_batch(&batch, &geo.to_string())?;
        assert_eq!(back.crs()?.map(Crs::is_wgs84), Some(true));
        Ok(())
    }
}
