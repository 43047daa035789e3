//! Arrow record batches with GeoArrow extension metadata.
//!
//! Geometry columns are written as `geoarrow.wkb` (binary WKB) or, for
//! point-only columns, as native `geoarrow.point` coordinates. The CRS
//! travels in the field's `ARROW:extension:metadata`. A non-default row
//! index is written as leading columns and described in the schema
//! metadata so it can be restored on read.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BinaryArray, FixedSizeListArray, Float64Array,
        GenericBinaryArray, OffsetSizeTrait, StringArray, StructArray,
    },
    buffer::NullBuffer,
    datatypes::{DataType, Field, Fields, Float64Type, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use snafu::prelude::*;

use crate::{
    crs::Crs,
    frame::{Column, ColumnData, DataFrame, Index},
    geo_frame::{GeoDataFrame, GeoFrameOptions, DEFAULT_GEOMETRY_NAME},
    geometry::{codec, GeometryArray},
    value::{Label, Value},
};

use super::error::{
    IoError, IoResult, InvalidMetadataSnafu, UnsupportedEncodingSnafu, UnsupportedTypeSnafu,
};

/// Field metadata key naming the extension type.
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";
/// Field metadata key holding the extension's JSON metadata.
pub const EXTENSION_METADATA_KEY: &str = "ARROW:extension:metadata";
/// Extension name of WKB-encoded geometry.
pub const WKB_EXTENSION: &str = "geoarrow.wkb";
/// Extension name of native point coordinates.
pub const POINT_EXTENSION: &str = "geoarrow.point";
/// Schema metadata key describing index columns.
pub const TABLE_METADATA_KEY: &str = "geoframe";

/// Physical encoding of geometry columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryEncoding {
    /// Well-known binary.
    #[default]
    Wkb,
    /// Native GeoArrow coordinates (point columns only).
    Geoarrow,
}

impl GeometryEncoding {
    /// Name used in GeoParquet metadata.
    pub fn as_geoparquet(&self) -> &'static str {
        match self {
            GeometryEncoding::Wkb => "WKB",
            GeometryEncoding::Geoarrow => "point",
        }
    }
}

/// Options for [`GeoDataFrame::to_arrow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrowOptions {
    /// Write the row index as columns. `None` writes it unless it is the
    /// default range index.
    pub index: Option<bool>,
    /// Geometry encoding.
    pub geometry_encoding: GeometryEncoding,
    /// Native encoding only: interleaved `[x, y]` lists instead of
    /// separate `x`/`y` struct fields.
    pub interleaved: bool,
    /// Native encoding only: add a `z` coordinate. Planar geometries have no
    /// z value, so it is filled with `NaN`.
    pub include_z: bool,
}

impl Default for ArrowOptions {
    fn default() -> Self {
        Self {
            index: None,
            geometry_encoding: GeometryEncoding::Wkb,
            interleaved: true,
            include_z: false,
        }
    }
}

impl ArrowOptions {
    /// Control index columns.
    pub fn with_index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the geometry encoding.
    pub fn with_encoding(mut self, encoding: GeometryEncoding) -> Self {
        self.geometry_encoding = encoding;
        self
    }

    /// Choose interleaved or separated coordinates.
    pub fn with_interleaved(mut self, interleaved: bool) -> Self {
        self.interleaved = interleaved;
        self
    }

    /// Toggle the z coordinate.
    pub fn with_z(mut self, include_z: bool) -> Self {
        self.include_z = include_z;
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TableMetadata {
    index_columns: Vec<String>,
    index_names: Vec<Option<String>>,
}

impl GeoDataFrame {
    /// Encode as a record batch.
    pub fn to_arrow(&self, opts: &ArrowOptions) -> IoResult<RecordBatch> {
        if let Some(name) = self.frame.duplicated_names().first() {
            return Err(IoError::DuplicateColumns {
                name: name.to_string(),
            });
        }

        let mut fields = Vec::with_capacity(self.ncols());
        let mut arrays = Vec::with_capacity(self.ncols());
        let mut meta = TableMetadata::default();

        let index = self.frame.index();
        if opts.index.unwrap_or(!index.is_range()) {
            for (level, name) in index.names().iter().enumerate() {
                let column = name
                    .clone()
                    .unwrap_or_else(|| format!("__index_level_{level}__"));
                let labels = index.level(level)?.into_iter().map(Value::from).collect();
                let array = plain_array(&ColumnData::from_values(labels));
                fields.push(Field::new(&column, array.data_type().clone(), true));
                arrays.push(array);
                meta.index_columns.push(column);
                meta.index_names.push(name.clone());
            }
        }

        for column in self.frame.columns() {
            let (field, array) = match &column.data {
                ColumnData::Geometry(values) => encode_geometry(&column.name, values, opts)?,
                data => {
                    let array = plain_array(data);
                    let field = Field::new(&column.name, array.data_type().clone(), true);
                    (field, array)
                }
            };
            fields.push(field);
            arrays.push(array);
        }

        let metadata = HashMap::from([(
            TABLE_METADATA_KEY.to_string(),
            serde_json::to_string(&meta)?,
        )]);
        let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
        let options = RecordBatchOptions::new().with_row_count(Some(self.nrows()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    /// Decode a record batch.
    ///
    /// Geometry columns are recognised by their GeoArrow extension name.
    /// The active geometry is the `geometry` argument when given, otherwise the column
    /// named `geometry`, otherwise the first geometry column.
    pub fn from_arrow(batch: &RecordBatch, geometry: Option<&str>) -> IoResult<Self> {
        let schema = batch.schema();
        let mut geometry_columns = HashMap::new();
        for field in schema.fields() {
            let metadata = field.metadata();
            let is_geometry = metadata
                .get(EXTENSION_NAME_KEY)
                .is_some_and(|ext| ext == WKB_EXTENSION || ext == POINT_EXTENSION);
            if !is_geometry {
                continue;
            }
            let crs = match metadata.get(EXTENSION_METADATA_KEY) {
                Some(text) if !text.is_empty() => {
                    let meta: JsonValue = serde_json::from_str(text)?;
                    match meta.get("crs") {
                        Some(crs) => crs_from_json(crs)?,
                        None => None,
                    }
                }
                _ => None,
            };
            geometry_columns.insert(field.name().clone(), crs);
        }
        let primary = match geometry {
            Some(name) => name.to_string(),
            None => default_primary(&schema, &geometry_columns)?,
        };
        decode_batch(batch, &geometry_columns, &primary, &[])
    }
}

fn default_primary(schema: &Schema, geometry_columns: &HashMap<String, Option<Crs>>) -> IoResult<String> {
    if geometry_columns.contains_key(DEFAULT_GEOMETRY_NAME) {
        return Ok(DEFAULT_GEOMETRY_NAME.to_string());
    }
    schema
        .fields()
        .iter()
        .map(|f| f.name())
        .find(|name| geometry_columns.contains_key(name.as_str()))
        .cloned()
        .ok_or(IoError::MissingGeometry { requested: None })
}

/// Build a table from a batch whose geometry columns (and their CRS) are
/// already known. Columns in `skip` are left out.
pub(crate) fn decode_batch(
    batch: &RecordBatch,
    geometry_columns: &HashMap<String, Option<Crs>>,
    primary: &str,
    skip: &[&str],
) -> IoResult<GeoDataFrame> {
    if !geometry_columns.contains_key(primary) || batch.column_by_name(primary).is_none() {
        return Err(IoError::MissingGeometry {
            requested: Some(primary.to_string()),
        });
    }

    let schema = batch.schema();
    let meta: TableMetadata = match schema.metadata().get(TABLE_METADATA_KEY) {
        Some(text) => serde_json::from_str(text)?,
        None => TableMetadata::default(),
    };

    let mut index_names = Vec::new();
    let mut index_levels: Vec<Vec<Label>> = Vec::new();
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        if skip.contains(&name.as_str()) {
            continue;
        }
        if let Some(level) = meta.index_columns.iter().position(|c| c == name) {
            let data = ColumnData::Array(array.clone());
            index_levels.push(
                (0..data.len())
                    .map(|i| data.value(i).to_label().unwrap_or(Label::Null))
                    .collect(),
            );
            index_names.push(meta.index_names.get(level).cloned().flatten());
            continue;
        }
        let data = match geometry_columns.get(name) {
            Some(crs) => ColumnData::Geometry(decode_geometry(name, array, crs.clone())?),
            None => ColumnData::Array(array.clone()),
        };
        columns.push(Column::new(name.as_str(), data));
    }

    let index = if index_levels.is_empty() {
        Index::range(batch.num_rows())
    } else {
        let keys = (0..batch.num_rows())
            .map(|row| index_levels.iter().map(|level| level[row].clone()).collect())
            .collect();
        Index::from_keys(index_names, keys)?
    };
    let frame = DataFrame::new(index, columns)?;
    Ok(GeoDataFrame::new(
        frame,
        GeoFrameOptions::default().with_geometry(primary),
    )?)
}

/// Decode a WKB or native point array.
pub(crate) fn decode_geometry(
    name: &str,
    array: &ArrayRef,
    crs: Option<Crs>,
) -> IoResult<GeometryArray> {
    let values = match array.data_type() {
        DataType::Binary => wkb_values(array.as_binary::<i32>())?,
        DataType::LargeBinary => wkb_values(array.as_binary::<i64>())?,
        DataType::FixedSizeList(_, size) if *size >= 2 => {
            let list = array.as_fixed_size_list();
            let coords = list
                .values()
                .as_primitive_opt::<Float64Type>()
                .context(UnsupportedTypeSnafu {
                    column: name,
                    data_type: array.data_type().to_string(),
                })?;
            (0..list.len())
                .map(|i| {
                    let start = list.value_offset(i) as usize;
                    (!list.is_null(i)).then(|| {
                        Geometry::Point(Point::new(coords.value(start), coords.value(start + 1)))
                    })
                })
                .collect()
        }
        DataType::Struct(_) => {
            let points = array.as_struct();
            let axis = |axis: &str| {
                points
                    .column_by_name(axis)
                    .and_then(|c| c.as_primitive_opt::<Float64Type>())
                    .context(UnsupportedTypeSnafu {
                        column: name,
                        data_type: array.data_type().to_string(),
                    })
            };
            let (x, y) = (axis("x")?, axis("y")?);
            (0..points.len())
                .map(|i| {
                    (!points.is_null(i))
                        .then(|| Geometry::Point(Point::new(x.value(i), y.value(i))))
                })
                .collect()
        }
        other => {
            return UnsupportedTypeSnafu {
                column: name,
                data_type: other.to_string(),
            }
            .fail()
        }
    };
    Ok(GeometryArray::new(values, crs))
}

fn wkb_values<O: OffsetSizeTrait>(
    array: &GenericBinaryArray<O>,
) -> IoResult<Vec<Option<Geometry<f64>>>> {
    Ok(array
        .iter()
        .map(|bytes| bytes.map(codec::from_wkb).transpose())
        .collect::<Result<_, _>>()?)
}

fn encode_geometry(
    name: &str,
    values: &GeometryArray,
    opts: &ArrowOptions,
) -> IoResult<(Field, ArrayRef)> {
    let (extension, array): (&str, ArrayRef) = match opts.geometry_encoding {
        GeometryEncoding::Wkb => {
            let encoded = values
                .iter()
                .map(|g| g.map(codec::to_wkb).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            let array: BinaryArray = encoded.iter().map(|b| b.as_deref()).collect();
            (WKB_EXTENSION, Arc::new(array))
        }
        GeometryEncoding::Geoarrow => (POINT_EXTENSION, encode_points(name, values, opts)?),
    };
    let metadata = HashMap::from([
        (EXTENSION_NAME_KEY.to_string(), extension.to_string()),
        (
            EXTENSION_METADATA_KEY.to_string(),
            extension_metadata(values.crs()),
        ),
    ]);
    let field = Field::new(name, array.data_type().clone(), true).with_metadata(metadata);
    Ok((field, array))
}

fn encode_points(name: &str, values: &GeometryArray, opts: &ArrowOptions) -> IoResult<ArrayRef> {
    let dims = if opts.include_z { 3 } else { 2 };
    let mut coords: Vec<[f64; 3]> = Vec::with_capacity(values.len());
    let mut valid = Vec::with_capacity(values.len());
    for geom in values.iter() {
        match geom {
            Some(Geometry::Point(p)) => {
                coords.push([p.x(), p.y(), f64::NAN]);
                valid.push(true);
            }
            None => {
                coords.push([f64::NAN; 3]);
                valid.push(false);
            }
            Some(other) => {
                return UnsupportedEncodingSnafu {
                    column: name,
                    encoding: POINT_EXTENSION,
                    reason: format!(
                        "found {}; only Point geometries have a native encoding",
                        codec::geometry_type_name(other)
                    ),
                }
                .fail()
            }
        }
    }
    let nulls = valid.contains(&false).then(|| NullBuffer::from(valid));

    if opts.interleaved {
        let flat: Vec<f64> = coords.iter().flat_map(|c| c[..dims].to_vec()).collect();
        let child = Arc::new(Field::new(
            if opts.include_z { "xyz" } else { "xy" },
            DataType::Float64,
            false,
        ));
        let list =
            FixedSizeListArray::try_new(child, dims as i32, Arc::new(Float64Array::from(flat)), nulls)?;
        Ok(Arc::new(list))
    } else {
        let fields: Fields = ["x", "y", "z"][..dims]
            .iter()
            .map(|axis| Field::new(*axis, DataType::Float64, false))
            .collect();
        let arrays: Vec<ArrayRef> = (0..dims)
            .map(|d| {
                let axis: Float64Array = coords.iter().map(|c| c[d]).collect::<Vec<_>>().into();
                Arc::new(axis) as ArrayRef
            })
            .collect();
        Ok(Arc::new(StructArray::try_new(fields, arrays, nulls)?))
    }
}

fn extension_metadata(crs: Option<&Crs>) -> String {
    match crs {
        None => "{}".to_string(),
        Some(crs) if crs.to_authority().is_some() => {
            json!({"crs": crs.as_str(), "crs_type": "authority_code"}).to_string()
        }
        Some(crs) => json!({"crs": crs.as_str()}).to_string(),
    }
}

/// Arrow array for a non-geometry column; untyped values become text.
pub(crate) fn plain_array(data: &ColumnData) -> ArrayRef {
    match data {
        ColumnData::Array(array) => array.clone(),
        other => {
            let text: StringArray = other
                .to_values()
                .iter()
                .map(|v| match v {
                    v if v.is_null() => None,
                    Value::Geometry(g) => Some(codec::to_wkt(g)),
                    v => Some(v.to_string()),
                })
                .collect();
            Arc::new(text)
        }
    }
}

/// CRS from a JSON metadata value: an identifier string, an EPSG code, or
/// a PROJJSON object with an `id` member. `null` means no CRS.
pub(crate) fn crs_from_json(value: &JsonValue) -> IoResult<Option<Crs>> {
    let parse = |text: &str| {
        Crs::parse(text).map_err(|e| IoError::InvalidMetadata {
            message: e.to_string(),
        })
    };
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(text) => parse(text).map(Some),
        JsonValue::Number(code) => code
            .as_u64()
            .and_then(|c| u32::try_from(c).ok())
            .map(Crs::from_epsg)
            .map(Some)
            .context(InvalidMetadataSnafu {
                message: format!("invalid EPSG code {code}"),
            }),
        JsonValue::Object(projjson) => {
            let id = projjson.get("id").context(InvalidMetadataSnafu {
                message: "PROJJSON CRS without an `id` member",
            })?;
            let authority = id.get("authority").and_then(JsonValue::as_str);
            let code = match id.get("code") {
                Some(JsonValue::String(code)) => Some(code.clone()),
                Some(JsonValue::Number(code)) => Some(code.to_string()),
                _ => None,
            };
            match (authority, code) {
                (Some(authority), Some(code)) => parse(&format!("{authority}:{code}")).map(Some),
                _ => InvalidMetadataSnafu {
                    message: "PROJJSON `id` needs `authority` and `code`",
                }
                .fail(),
            }
        }
        other => InvalidMetadataSnafu {
            message: format!("unexpected CRS value {other}"),
        }
        .fail(),
    }
}
