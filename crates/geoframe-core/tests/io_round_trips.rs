//! Integration tests writing tables to disk and reading them back.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use geo_types::{line_string, point, Geometry};
use geoframe_core::crs::Crs;
use geoframe_core::frame::{Column, Index};
use geoframe_core::geo_frame::{GeoDataFrame, GeoFrameError, GeoFrameOptions};
use geoframe_core::geometry::GeometryArray;
use geoframe_core::io::{Driver, FileOptions, ParquetOptions, SchemaVersion};
use geoframe_core::value::{Label, Value};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn roads() -> Result<GeoDataFrame, GeoFrameError> {
    let gdf = GeoDataFrame::from_columns(
        vec![
            Column::new("name", vec!["north", "south"]),
            Column::new("lanes", vec![2_i64, 4]),
            Column::new(
                "geometry",
                GeometryArray::new(
                    vec![
                        Some(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)])),
                        None,
                    ],
                    Some(Crs::from_epsg(3857)),
                ),
            ),
        ],
        GeoFrameOptions::default(),
    )?;
    let index = Index::from_labels(
        Some("road_id".to_string()),
        vec![Label::Int(10), Label::Int(20)],
    );
    let frame = gdf.frame().with_index(index)?;
    GeoDataFrame::new(frame, GeoFrameOptions::default())
}

fn assert_same_table(back: &GeoDataFrame, original: &GeoDataFrame) -> TestResult {
    assert_eq!(back.nrows(), original.nrows());
    assert_eq!(back.active_geometry_name(), Some("geometry"));
    assert_eq!(back.crs()?, original.crs()?);
    assert_eq!(back.geometry()?.get(0), original.geometry()?.get(0));
    assert_eq!(back.geometry()?.get(1), None);
    assert_eq!(back.frame().column("lanes")?.value(1), Value::Int(4));
    Ok(())
}

#[test]
fn geoparquet_keeps_index_crs_and_nulls() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("roads.parquet");
    let original = roads()?;
    original.to_parquet(&path, &ParquetOptions::default())?;

    let back = GeoDataFrame::from_parquet(&path)?;
    assert_same_table(&back, &original)?;
    assert_eq!(back.index().names(), &[Some("road_id".to_string())]);
    assert_eq!(back.index().key(1), Some(&[Label::Int(20)][..]));
    Ok(())
}

#[test]
fn every_schema_version_reads_back() -> TestResult {
    let dir = TempDir::new()?;
    let original = roads()?;
    for version in [
        SchemaVersion::V0_1_0,
        SchemaVersion::V0_4_0,
        SchemaVersion::V1_0_0,
        SchemaVersion::V1_1_0,
    ] {
        let path = dir.path().join(format!("roads-{version}.parquet"));
        original.to_file(&path, &FileOptions::default().with_schema_version(version))?;
        let back = GeoDataFrame::from_file(&path)?;
        assert_same_table(&back, &original)?;
    }
    Ok(())
}

#[test]
fn feather_and_geojson_dispatch_by_extension() -> TestResult {
    let dir = TempDir::new()?;
    let original = roads()?;

    let feather = dir.path().join("roads.arrow");
    original.to_file(&feather, &FileOptions::default())?;
    assert_same_table(&GeoDataFrame::from_file(&feather)?, &original)?;

    let geojson = dir.path().join("roads.geojson");
    original.to_file(&geojson, &FileOptions::default())?;
    let back = GeoDataFrame::from_file(&geojson)?;
    assert_eq!(back.nrows(), 2);
    assert_eq!(back.crs()?, Some(&Crs::from_epsg(3857)));
    assert_eq!(back.geometry()?.get(1), None);

    let forced = dir.path().join("roads.dat");
    original.to_file(&forced, &FileOptions::default().with_driver(Driver::Parquet))?;
    assert_same_table(&GeoDataFrame::from_parquet(&forced)?, &original)?;
    Ok(())
}

#[test]
fn wgs84_geojson_has_no_crs_member() -> TestResult {
    let gdf = GeoDataFrame::from_columns(
        vec![Column::new(
            "geometry",
            GeometryArray::from_geometries(
                [Geometry::Point(point!(x: 13.4, y: 52.5))],
                Some(Crs::from_epsg(4326)),
            ),
        )],
        GeoFrameOptions::default(),
    )?;
    let text = gdf.to_json(&Default::default())?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    assert!(json.get("crs").is_none());
    assert_eq!(json["features"][0]["geometry"]["type"], "Point");
    Ok(())
}
