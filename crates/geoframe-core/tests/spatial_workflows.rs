//! Integration tests chaining spatial operations.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use geo::Area;
use geo_types::{point, Geometry, Rect};
use geoframe_core::crs::Crs;
use geoframe_core::frame::{AggFunc, Column};
use geoframe_core::geo_frame::{DissolveOptions, GeoDataFrame, GeoFrameError, GeoFrameOptions, Table};
use geoframe_core::geometry::GeometryArray;
use geoframe_core::spatial::{ClipOptions, OverlayHow, OverlayOptions, SjoinHow, SjoinOptions};
use geoframe_core::value::Value;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn square(x0: f64, y0: f64, side: f64) -> Geometry<f64> {
    Rect::new((x0, y0), (x0 + side, y0 + side)).to_polygon().into()
}

fn districts() -> Result<GeoDataFrame, GeoFrameError> {
    GeoDataFrame::from_columns(
        vec![
            Column::new("district", vec!["west", "east"]),
            Column::new(
                "geometry",
                GeometryArray::from_geometries([square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)], None),
            ),
        ],
        GeoFrameOptions::default().with_crs(Crs::from_epsg(3857)),
    )
}

fn shops() -> Result<GeoDataFrame, GeoFrameError> {
    GeoDataFrame::from_columns(
        vec![
            Column::new("revenue", vec![5_i64, 7, 11]),
            Column::new(
                "geometry",
                GeometryArray::from_geometries(
                    [
                        Geometry::Point(point!(x: 2.0, y: 2.0)),
                        Geometry::Point(point!(x: 3.0, y: 8.0)),
                        Geometry::Point(point!(x: 15.0, y: 5.0)),
                    ],
                    None,
                ),
            ),
        ],
        GeoFrameOptions::default().with_crs(Crs::from_epsg(3857)),
    )
}

#[test]
fn join_then_dissolve_sums_by_district() -> TestResult {
    let Table::Geo(joined) = shops()?.sjoin(&districts()?, &SjoinOptions::default())? else {
        panic!("sjoin keeps the left geometry");
    };
    let totals = joined.dissolve(&DissolveOptions::by_column("district").with_aggfunc(AggFunc::Sum))?;
    assert_eq!(totals.nrows(), 2);
    assert_eq!(totals.frame().column("revenue")?.value(0), Value::Int(11));
    assert_eq!(totals.frame().column("revenue")?.value(1), Value::Int(12));
    assert_eq!(totals.crs()?, Some(&Crs::from_epsg(3857)));
    Ok(())
}

#[test]
fn right_join_lists_every_district() -> TestResult {
    let opts = SjoinOptions::default().with_how(SjoinHow::Right);
    let out = shops()?.sjoin(&districts()?, &opts)?;
    assert_eq!(out.nrows(), 3);
    assert_eq!(out.frame().column("index_left")?.value(2), Value::Int(2));
    assert_eq!(out.active_geometry_name(), Some("geometry"));
    Ok(())
}

#[test]
fn clip_then_overlay_preserves_area() -> TestResult {
    let Table::Geo(clipped) = districts()?.clip([5.0, 0.0, 15.0, 10.0], &ClipOptions::default())? else {
        panic!("clip keeps geometry");
    };
    assert_eq!(clipped.nrows(), 2);

    let opts = OverlayOptions::default().with_how(OverlayHow::Identity);
    let Table::Geo(pieces) = districts()?.overlay(&clipped, &opts)? else {
        panic!("overlay keeps geometry");
    };
    let area: f64 = pieces
        .geometry()?
        .values()
        .iter()
        .flatten()
        .map(|g| g.unsigned_area())
        .sum();
    assert!((area - 200.0).abs() < 1e-6);
    assert_eq!(pieces.frame().column_names(), vec!["district_1", "district_2", "geometry"]);
    Ok(())
}
