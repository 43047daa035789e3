//! WKB / WKT / GeoJSON codecs for single geometries.

use std::str::FromStr;

use geo_types::{Geometry, GeometryCollection, LineString, Polygon};
use wkt::ToWkt;

use super::error::{GeometryError, GeometryResult};

/// Canonical geometry type name (GeoJSON / GeoParquet spelling).
pub fn geometry_type_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Replace the convenience variants (`Line`, `Rect`, `Triangle`) with their
/// simple-features equivalents.
pub fn normalize(geom: &Geometry<f64>) -> Geometry<f64> {
    match geom {
        Geometry::Line(l) => Geometry::LineString(LineString::from(vec![l.start, l.end])),
        Geometry::Rect(r) => Geometry::Polygon(r.to_polygon()),
        Geometry::Triangle(t) => Geometry::Polygon(Polygon::new(
            LineString::from(vec![t.0, t.1, t.2, t.0]),
            vec![],
        )),
        Geometry::GeometryCollection(gc) => {
            Geometry::GeometryCollection(GeometryCollection(gc.0.iter().map(normalize).collect()))
        }
        other => other.clone(),
    }
}

/// Encode as little-endian ISO WKB.
pub fn to_wkb(geom: &Geometry<f64>) -> GeometryResult<Vec<u8>> {
    wkb::geom_to_wkb(&normalize(geom)).map_err(|e| GeometryError::WkbWrite {
        message: format!("{e:?}"),
    })
}

/// Encode as upper-case hex WKB.
pub fn to_wkb_hex(geom: &Geometry<f64>) -> GeometryResult<String> {
    Ok(hex::encode_upper(to_wkb(geom)?))
}

/// Decode WKB bytes.
pub fn from_wkb(bytes: &[u8]) -> GeometryResult<Geometry<f64>> {
    let mut reader = bytes;
    wkb::wkb_to_geom(&mut reader).map_err(|e| GeometryError::WkbRead {
        message: format!("{e:?}"),
    })
}

/// Decode hex-encoded WKB (as stored by most spatial databases).
pub fn from_wkb_hex(text: &str) -> GeometryResult<Geometry<f64>> {
    let bytes = hex::decode(text.trim()).map_err(|source| GeometryError::HexDecode { source })?;
    from_wkb(&bytes)
}

/// Encode as WKT.
pub fn to_wkt(geom: &Geometry<f64>) -> String {
    normalize(geom).wkt_string()
}

/// Parse WKT text.
pub fn from_wkt(text: &str) -> GeometryResult<Geometry<f64>> {
    wkt::Wkt::<f64>::from_str(text)
        .map_err(|e| GeometryError::WktParse {
            message: format!("{e:?}"),
        })
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| GeometryError::WktParse {
                    message: format!("{e:?}"),
                })
        })
}

/// Convert to a GeoJSON geometry object.
pub fn to_geojson(geom: &Geometry<f64>) -> GeometryResult<serde_json::Value> {
    let value = geojson::Value::from(&normalize(geom));
    serde_json::to_value(geojson::Geometry::new(value)).map_err(|e| GeometryError::GeoJson {
        message: e.to_string(),
    })
}

/// Convert a GeoJSON geometry object.
pub fn from_geojson(value: serde_json::Value) -> GeometryResult<Geometry<f64>> {
    let geometry = geojson::Geometry::from_json_value(value).map_err(|e| GeometryError::GeoJson {
        message: e.to_string(),
    })?;
    Geometry::<f64>::try_from(geometry.value).map_err(|e| GeometryError::GeoJson {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, MultiPoint};

    #[test]
    fn wkb_roundtrip() -> GeometryResult<()> {
        let poly: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 0.0)].into();
        assert_eq!(from_wkb(&to_wkb(&poly)?)?, poly);
        let hexed = to_wkb_hex(&poly)?;
        assert_eq!(from_wkb_hex(&hexed)?, poly);
        Ok(())
    }

    #[test]
    fn point_wkb_matches_reference_encoding() -> GeometryResult<()> {
        let p: Geometry<f64> = point!(x: 1.0, y: 2.0).into();
        assert_eq!(
            to_wkb_hex(&p)?,
            "0101000000000000000000F03F0000000000000040"
        );
        Ok(())
    }

    #[test]
    fn wkt_roundtrip() -> GeometryResult<()> {
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.5)].into();
        let text = to_wkt(&line);
        assert!(text.starts_with("LINESTRING"));
        assert_eq!(from_wkt(&text)?, line);
        Ok(())
    }

    #[test]
    fn malformed_wkt_is_an_error() {
        assert!(matches!(
            from_wkt("POINT (1"),
            Err(GeometryError::WktParse { .. })
        ));
    }

    #[test]
    fn geojson_roundtrip() -> GeometryResult<()> {
        let mp: Geometry<f64> =
            MultiPoint::from(vec![point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 1.0)]).into();
        let json = to_geojson(&mp)?;
        assert_eq!(json["type"], "MultiPoint");
        assert_eq!(from_geojson(json)?, mp);
        Ok(())
    }
}
