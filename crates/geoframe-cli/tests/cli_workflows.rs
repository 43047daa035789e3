#![allow(missing_docs)]

use std::path::Path;

use assert_cmd::Command;
use geoframe_core::geo_frame::GeoDataFrame;
use predicates::prelude::*;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const PLACES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "a", "pop": 1},
     "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}},
    {"type": "Feature", "properties": {"name": "a", "pop": 2},
     "geometry": {"type": "Point", "coordinates": [1.0, 1.0]}},
    {"type": "Feature", "properties": {"name": "b", "pop": 3},
     "geometry": {"type": "MultiPoint", "coordinates": [[2.0, 2.0], [3.0, 3.0]]}}
  ]
}"#;

fn write_places(dir: &Path) -> Result<std::path::PathBuf, std::io::Error> {
    let path = dir.join("places.geojson");
    std::fs::write(&path, PLACES)?;
    Ok(path)
}

fn cli() -> Result<Command, assert_cmd::cargo::CargoError> {
    Command::cargo_bin("geoframe")
}

#[test]
fn info_reports_rows_geometry_and_bounds() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;

    cli()?
        .arg("info")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("rows: 3"))
        .stdout(predicate::str::contains("active_geometry: geometry"))
        .stdout(predicate::str::contains("total_bounds: [0, 0, 3, 3]"));
    Ok(())
}

#[test]
fn head_renders_wkt_preview() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;

    cli()?
        .args(["head", "--rows", "2"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Preview output"))
        .stdout(predicate::str::contains("POINT"))
        .stdout(predicate::str::contains("MULTIPOINT").not());
    Ok(())
}

#[test]
fn convert_to_geoparquet_and_back() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;
    let output = tmp.path().join("places.parquet");

    cli()?
        .arg("convert")
        .arg(&input)
        .arg(&output)
        .args(["--schema-version", "1.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 rows"));

    let back = GeoDataFrame::from_file(&output)?;
    assert_eq!(back.nrows(), 3);
    assert_eq!(back.active_geometry_name(), Some("geometry"));
    Ok(())
}

#[test]
fn dissolve_groups_by_column() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;
    let output = tmp.path().join("groups.parquet");

    cli()?
        .arg("dissolve")
        .arg(&input)
        .arg(&output)
        .args(["--by", "name", "--agg", "sum"])
        .assert()
        .success();

    let back = GeoDataFrame::from_file(&output)?;
    assert_eq!(back.nrows(), 2);
    Ok(())
}

#[test]
fn explode_splits_multi_parts() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;
    let output = tmp.path().join("parts.geojson");

    cli()?
        .arg("explode")
        .arg(&input)
        .arg(&output)
        .arg("--ignore-index")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 rows"));
    Ok(())
}

#[test]
fn reprojects_to_web_mercator() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;
    let output = tmp.path().join("mercator.parquet");

    cli()?
        .arg("to-crs")
        .arg(&input)
        .arg(&output)
        .args(["--crs", "EPSG:3857"])
        .assert()
        .success();

    cli()?
        .arg("info")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("crs: EPSG:3857"));
    Ok(())
}

#[test]
fn bad_arguments_exit_with_error() -> TestResult {
    let tmp = TempDir::new()?;
    let input = write_places(tmp.path())?;

    cli()?
        .arg("info")
        .arg(tmp.path().join("places.shp"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to read"));

    cli()?
        .arg("dissolve")
        .arg(&input)
        .arg(tmp.path().join("out.parquet"))
        .args(["--method", "coverage", "--grid-size", "0.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("grid_size"));

    cli()?
        .arg("dissolve")
        .arg(&input)
        .arg(tmp.path().join("out.parquet"))
        .args(["--agg", "median"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --agg"));
    Ok(())
}
