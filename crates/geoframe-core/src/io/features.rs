//! GeoJSON-like feature mappings.
//!
//! A table maps to a `FeatureCollection`: one feature per row, the active
//! geometry as the feature geometry, every other column as a property and
//! the row label as the feature `id`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::{
    crs::Crs,
    frame::{Column, ColumnData, DataFrame},
    geo_frame::{GeoDataFrame, GeoFrameOptions, DEFAULT_GEOMETRY_NAME},
    geometry::{codec, kernel, GeometryArray},
    value::{format_key, Value},
};

use super::error::{IoError, IoResult};

/// Treatment of missing property values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaPolicy {
    /// Emit missing values as JSON `null`.
    #[default]
    Null,
    /// Leave missing properties out of the feature.
    Drop,
    /// Keep missing values as they are. JSON has no `NaN`, so they are
    /// written as `null` as well.
    Keep,
}

/// Options for [`GeoDataFrame::iterfeatures`] and [`GeoDataFrame::to_geo_dict`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureOptions {
    /// Missing-value policy.
    pub na: NaPolicy,
    /// Add a `bbox` member to every feature and to the collection.
    pub show_bbox: bool,
    /// Leave out the feature `id`.
    pub drop_id: bool,
}

impl FeatureOptions {
    /// Set the missing-value policy.
    pub fn with_na(mut self, na: NaPolicy) -> Self {
        self.na = na;
        self
    }

    /// Toggle bounding boxes.
    pub fn with_bbox(mut self, show_bbox: bool) -> Self {
        self.show_bbox = show_bbox;
        self
    }

    /// Toggle feature ids.
    pub fn with_drop_id(mut self, drop_id: bool) -> Self {
        self.drop_id = drop_id;
        self
    }
}

/// Options for [`GeoDataFrame::to_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Feature options.
    #[serde(flatten)]
    pub features: FeatureOptions,
    /// Reproject to WGS84 before encoding.
    pub to_wgs84: bool,
}

impl JsonOptions {
    /// Set the feature options.
    pub fn with_features(mut self, features: FeatureOptions) -> Self {
        self.features = features;
        self
    }

    /// Toggle reprojection to WGS84.
    pub fn with_wgs84(mut self, to_wgs84: bool) -> Self {
        self.to_wgs84 = to_wgs84;
        self
    }
}

/// Options for [`GeoDataFrame::from_features`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromFeaturesOptions {
    /// CRS of the feature geometries.
    pub crs: Option<Crs>,
    /// Properties to keep, in output order. `None` keeps all of them.
    pub columns: Option<Vec<String>>,
}

impl FromFeaturesOptions {
    /// Set the CRS.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Restrict and order the properties.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl GeoDataFrame {
    /// Iterate over rows as GeoJSON-like feature objects.
    pub fn iterfeatures<'a>(
        &'a self,
        opts: &'a FeatureOptions,
    ) -> IoResult<impl Iterator<Item = IoResult<JsonValue>> + 'a> {
        if let Some(name) = self.frame.duplicated_names().first() {
            return Err(IoError::DuplicateColumns {
                name: name.to_string(),
            });
        }
        let geometry = self.active_array()?;
        let active = self.active.as_deref();
        let properties: Vec<&Column> = self
            .frame
            .columns()
            .iter()
            .filter(|c| Some(c.name.as_str()) != active)
            .collect();

        Ok((0..self.nrows()).map(move |row| {
            let mut props = Map::new();
            for column in &properties {
                let value = column.data.value(row);
                if value.is_null() && opts.na == NaPolicy::Drop {
                    continue;
                }
                props.insert(column.name.clone(), value_to_json(&value)?);
            }

            let mut feature = Map::new();
            if !opts.drop_id {
                let id = self.frame.index().key(row).map(format_key);
                feature.insert("id".to_string(), json!(id));
            }
            feature.insert("type".to_string(), json!("Feature"));
            feature.insert("properties".to_string(), JsonValue::Object(props));
            let geom = geometry.get(row);
            feature.insert(
                "geometry".to_string(),
                geom.map(codec::to_geojson).transpose()?.unwrap_or(JsonValue::Null),
            );
            if opts.show_bbox {
                if let Some(bbox) = geom.and_then(kernel::bounds) {
                    feature.insert("bbox".to_string(), json!(bbox));
                }
            }
            Ok(JsonValue::Object(feature))
        }))
    }

    /// The table as a `FeatureCollection` mapping.
    pub fn to_geo_dict(&self, opts: &FeatureOptions) -> IoResult<JsonValue> {
        let features = self.iterfeatures(opts)?.collect::<IoResult<Vec<_>>>()?;
        let mut collection = Map::new();
        collection.insert("type".to_string(), json!("FeatureCollection"));
        collection.insert("features".to_string(), JsonValue::Array(features));
        if opts.show_bbox {
            if let Some(bbox) = self.active_array()?.total_bounds() {
                collection.insert("bbox".to_string(), json!(bbox));
            }
        }
        Ok(JsonValue::Object(collection))
    }

    /// `FeatureCollection` mapping with nulls, ids and bounding boxes.
    pub fn geo_interface(&self) -> IoResult<JsonValue> {
        self.to_geo_dict(&FeatureOptions::default().with_bbox(true))
    }

    /// GeoJSON text.
    ///
    /// A CRS other than EPSG:4326 is written as a legacy `crs` member in
    /// OGC URN form; one without a URN form is left out with a warning.
    pub fn to_json(&self, opts: &JsonOptions) -> IoResult<String> {
        let reprojected;
        let source = if opts.to_wgs84 {
            if self.crs()?.is_none() {
                return Err(IoError::CrsRequired);
            }
            reprojected = self.to_crs(&Crs::wgs84())?;
            &reprojected
        } else {
            self
        };

        let mut geo = source.to_geo_dict(&opts.features)?;
        if let Some(crs) = source.crs()?.filter(|c| c.epsg() != Some(4326)) {
            match crs.to_ogc_urn() {
                Some(urn) => {
                    if let JsonValue::Object(map) = &mut geo {
                        map.insert(
                            "crs".to_string(),
                            json!({"type": "name", "properties": {"name": urn}}),
                        );
                    }
                }
                None => log::warn!(
                    "GeoDataFrame's CRS is not representable in URN OGC format. \
                     Resulting JSON will contain no CRS information."
                ),
            }
        }
        Ok(serde_json::to_string(&geo)?)
    }

    /// Build from a `FeatureCollection` mapping or an array of features.
    ///
    /// The `geometry` column comes first, followed by the properties in
    /// order of first appearance. Nested property values are stored as
    /// JSON text.
    pub fn from_features(features: &JsonValue, opts: &FromFeaturesOptions) -> IoResult<Self> {
        let items = match features {
            JsonValue::Array(items) => items.as_slice(),
            JsonValue::Object(map) => match map.get("features") {
                Some(JsonValue::Array(items)) => items.as_slice(),
                _ => {
                    return Err(IoError::InvalidFeature {
                        position: 0,
                        message: "expected a FeatureCollection with a `features` array"
                            .to_string(),
                    })
                }
            },
            _ => {
                return Err(IoError::InvalidFeature {
                    position: 0,
                    message: "expected a FeatureCollection or an array of features".to_string(),
                })
            }
        };

        let mut geometries = Vec::with_capacity(items.len());
        let mut names: Vec<String> = Vec::new();
        let mut values: Vec<Vec<Value>> = Vec::new();
        for (position, item) in items.iter().enumerate() {
            let JsonValue::Object(feature) = item else {
                return Err(IoError::InvalidFeature {
                    position,
                    message: "feature is not an object".to_string(),
                });
            };
            let geometry = match feature.get("geometry") {
                None | Some(JsonValue::Null) => None,
                Some(g) => Some(codec::from_geojson(g.clone())?),
            };
            geometries.push(geometry);

            let empty = Map::new();
            let props = match feature.get("properties") {
                None | Some(JsonValue::Null) => &empty,
                Some(JsonValue::Object(props)) => props,
                Some(_) => {
                    return Err(IoError::InvalidFeature {
                        position,
                        message: "`properties` is not an object".to_string(),
                    })
                }
            };
            for (key, value) in props {
                let slot = match names.iter().position(|n| n == key) {
                    Some(slot) => slot,
                    None => {
                        names.push(key.clone());
                        values.push(vec![Value::Null; position]);
                        names.len() - 1
                    }
                };
                values[slot].push(json_to_value(value));
            }
            for column in values.iter_mut() {
                column.resize(position + 1, Value::Null);
            }
        }

        let mut columns = vec![Column::new(
            DEFAULT_GEOMETRY_NAME,
            GeometryArray::new(geometries, None),
        )];
        let mut properties: Vec<(String, Vec<Value>)> = names.into_iter().zip(values).collect();
        if let Some(keep) = &opts.columns {
            properties = keep
                .iter()
                .filter(|name| name.as_str() != DEFAULT_GEOMETRY_NAME)
                .map(|name| {
                    let found = properties.iter().find(|(n, _)| n == name);
                    let column = found
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![Value::Null; items.len()]);
                    (name.clone(), column)
                })
                .collect();
        }
        columns.extend(
            properties
                .into_iter()
                .filter(|(name, _)| name != DEFAULT_GEOMETRY_NAME)
                .map(|(name, v)| Column::new(name, ColumnData::from_values(v))),
        );

        let mut gdf_opts = GeoFrameOptions::default().with_geometry(DEFAULT_GEOMETRY_NAME);
        if let Some(crs) = &opts.crs {
            gdf_opts = gdf_opts.with_crs(crs.clone());
        }
        Ok(GeoDataFrame::new(DataFrame::from_columns(columns)?, gdf_opts)?)
    }
}

/// JSON form of a cell value. Geometries become GeoJSON geometry objects.
pub(crate) fn value_to_json(value: &Value) -> IoResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Float(f) if f.is_nan() => JsonValue::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::Geometry(g) => codec::to_geojson(g)?,
    })
}

/// Cell value of a JSON scalar; arrays and objects are kept as JSON text.
pub(crate) fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        JsonValue::String(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Geometry};

    fn sample(crs: Option<Crs>) -> IoResult<GeoDataFrame> {
        let mut opts = GeoFrameOptions::default();
        if let Some(crs) = crs {
            opts = opts.with_crs(crs);
        }
        Ok(GeoDataFrame::from_columns(
            vec![
                Column::new("name", vec![Value::from("a"), Value::Null]),
                Column::new(
                    "geometry",
                    GeometryArray::new(
                        vec![Some(Geometry::Point(point!(x: 1.0, y: 2.0))), None],
                        None,
                    ),
                ),
            ],
            opts,
        )?)
    }

    #[test]
    fn features_carry_id_properties_and_geometry() -> IoResult<()> {
        let gdf = sample(None)?;
        let features: Vec<JsonValue> = gdf
            .iterfeatures(&FeatureOptions::default().with_bbox(true))?
            .collect::<IoResult<_>>()?;
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["id"], json!("0"));
        assert_eq!(features[0]["type"], json!("Feature"));
        assert_eq!(features[0]["properties"], json!({"name": "a"}));
        assert_eq!(features[0]["geometry"]["type"], json!("Point"));
        assert_eq!(features[0]["bbox"], json!([1.0, 2.0, 1.0, 2.0]));
        assert_eq!(features[1]["geometry"], JsonValue::Null);
        assert_eq!(features[1]["properties"], json!({"name": null}));
        Ok(())
    }

    #[test]
    fn drop_policy_and_drop_id() -> IoResult<()> {
        let gdf = sample(None)?;
        let opts = FeatureOptions::default()
            .with_na(NaPolicy::Drop)
            .with_drop_id(true);
        let features: Vec<JsonValue> = gdf.iterfeatures(&opts)?.collect::<IoResult<_>>()?;
        assert_eq!(features[1]["properties"], json!({}));
        assert!(features[0].get("id").is_none());
        Ok(())
    }

    #[test]
    fn geo_interface_has_collection_bbox() -> IoResult<()> {
        let geo = sample(None)?.geo_interface()?;
        assert_eq!(geo["type"], json!("FeatureCollection"));
        assert_eq!(geo["bbox"], json!([1.0, 2.0, 1.0, 2.0]));
        Ok(())
    }

    #[test]
    fn json_crs_member_only_for_non_wgs84() -> IoResult<()> {
        let mercator: JsonValue =
            serde_json::from_str(&sample(Some(Crs::from_epsg(3857)))?.to_json(&JsonOptions::default())?)?;
        assert_eq!(
            mercator["crs"]["properties"]["name"],
            json!("urn:ogc:def:crs:EPSG::3857")
        );

        let wgs84: JsonValue =
            serde_json::from_str(&sample(Some(Crs::wgs84()))?.to_json(&JsonOptions::default())?)?;
        assert!(wgs84.get("crs").is_none());
        Ok(())
    }

    #[test]
    fn reprojecting_without_crs_fails() -> IoResult<()> {
        let gdf = sample(None)?;
        assert!(matches!(
            gdf.to_json(&JsonOptions::default().with_wgs84(true)),
            Err(IoError::CrsRequired)
        ));
        Ok(())
    }

    #[test]
    fn from_features_builds_geometry_first() -> IoResult<()> {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"a": 1, "b": "x"},
                 "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}},
                {"type": "Feature", "properties": {"c": [1, 2]}, "geometry": null},
            ]
        });
        let gdf = GeoDataFrame::from_features(
            &collection,
            &FromFeaturesOptions::default().with_crs(Crs::wgs84()),
        )?;
        assert_eq!(gdf.column_names(), vec!["geometry", "a", "b", "c"]);
        assert_eq!(gdf.active_geometry_name(), Some("geometry"));
        assert_eq!(gdf.crs()?, Some(&Crs::wgs84()));
        assert_eq!(gdf.frame().column("a")?.value(1), Value::Null);
        assert_eq!(gdf.frame().column("c")?.value(1), Value::from("[1,2]"));

        let subset = GeoDataFrame::from_features(
            &collection,
            &FromFeaturesOptions::default().with_columns(["b"]),
        )?;
        assert_eq!(subset.column_names(), vec!["geometry", "b"]);
        Ok(())
    }

    #[test]
    fn features_round_trip_through_json() -> IoResult<()> {
        let gdf = sample(Some(Crs::wgs84()))?;
        let text = gdf.to_json(&JsonOptions::default())?;
        let back = GeoDataFrame::from_features(
            &serde_json::from_str(&text)?,
            &FromFeaturesOptions::default().with_crs(Crs::wgs84()),
        )?;
        assert_eq!(back.nrows(), 2);
        assert_eq!(
            back.geometry()?.get(0),
            Some(&Geometry::Point(point!(x: 1.0, y: 2.0)))
        );
        Ok(())
    }
}
