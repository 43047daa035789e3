//! Integration tests for the active-geometry and CRS invariants of GeoDataFrame.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use geo_types::{point, Geometry, MultiPoint};
use geoframe_core::crs::Crs;
use geoframe_core::frame::{Column, DataFrame};
use geoframe_core::geo_frame::{
    DissolveOptions, ExplodeOptions, GeoDataFrame, GeoFrameError, GeoFrameOptions,
    SetGeometryOptions, Table,
};
use geoframe_core::geometry::{codec, kernel::UnionMethod, GeometryArray};
use geoframe_core::value::{Label, Value};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn pt(x: f64, y: f64) -> Geometry<f64> {
    Geometry::Point(point!(x: x, y: y))
}

fn named_points() -> Result<GeoDataFrame, GeoFrameError> {
    GeoDataFrame::from_columns(
        vec![
            Column::new("name", vec!["a", "a", "b"]),
            Column::new(
                "geometry",
                GeometryArray::from_geometries([pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0)], None),
            ),
        ],
        GeoFrameOptions::default().with_crs(Crs::from_epsg(4326)),
    )
}

#[test]
fn dissolve_by_name_unions_each_group() -> TestResult {
    let out = named_points()?.dissolve(&DissolveOptions::by_column("name"))?;
    assert_eq!(out.nrows(), 2);
    assert_eq!(
        out.index().keys(),
        &[vec![Label::from("a")], vec![Label::from("b")]]
    );
    let geometry = out.geometry()?;
    assert_eq!(
        geometry.get(0),
        Some(&Geometry::MultiPoint(MultiPoint::new(vec![
            point!(x: 0.0, y: 0.0),
            point!(x: 1.0, y: 1.0),
        ])))
    );
    assert_eq!(out.crs()?, Some(&Crs::from_epsg(4326)));
    Ok(())
}

#[test]
fn duplicate_geometry_names_fail_before_coercion() -> TestResult {
    let frame = DataFrame::from_columns(vec![
        Column::new("geometry", vec![Value::from("not wkt"), Value::Null]),
        Column::new("geometry", vec![Value::Null, Value::Null]),
    ])?;
    let err = GeoDataFrame::new(frame, GeoFrameOptions::default());
    assert!(matches!(err, Err(GeoFrameError::DuplicateGeometryColumn)));
    Ok(())
}

#[test]
fn set_geometry_checks_only_the_new_data() -> TestResult {
    let gdf = GeoDataFrame::from_columns(
        vec![Column::new(
            "geometry",
            GeometryArray::from_geometries([pt(5.0, 5.0)], Some(Crs::from_epsg(4326))),
        )],
        GeoFrameOptions::default(),
    )?;
    let out = gdf.set_geometry(
        vec![pt(0.0, 0.0)],
        SetGeometryOptions::default().with_crs(Crs::from_epsg(3857)),
    )?;
    assert_eq!(out.crs()?, Some(&Crs::from_epsg(3857)));
    assert_eq!(out.geometry()?.get(0), Some(&pt(0.0, 0.0)));
    Ok(())
}

#[test]
fn set_crs_requires_override_to_change() -> TestResult {
    let gdf = named_points()?;
    let err = gdf.set_crs(Some(Crs::from_epsg(3857)), false);
    assert!(matches!(err, Err(GeoFrameError::CrsOverride { .. })));
    let out = gdf.set_crs(Some(Crs::from_epsg(3857)), true)?;
    assert_eq!(out.crs()?, Some(&Crs::from_epsg(3857)));
    Ok(())
}

#[test]
fn copy_is_independent_of_later_retagging() -> TestResult {
    let gdf = named_points()?;
    let copy = gdf.copy();
    let retagged = copy.set_crs(Some(Crs::from_epsg(3857)), true)?;
    assert_eq!(copy.active_geometry_name(), Some("geometry"));
    assert_eq!(gdf.crs()?, Some(&Crs::from_epsg(4326)));
    assert_eq!(copy.crs()?, Some(&Crs::from_epsg(4326)));
    assert_eq!(retagged.crs()?, Some(&Crs::from_epsg(3857)));
    Ok(())
}

#[test]
fn explode_is_undone_by_union() -> TestResult {
    let parts = vec![point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 0.0), point!(x: 2.0, y: 0.0)];
    let original = Geometry::MultiPoint(MultiPoint::new(parts));
    let gdf = GeoDataFrame::from_columns(
        vec![
            Column::new("kind", vec!["well"]),
            Column::new("geometry", GeometryArray::from_geometries([original.clone()], None)),
        ],
        GeoFrameOptions::default(),
    )?;
    let Table::Geo(out) = gdf.explode(&ExplodeOptions::default())? else {
        panic!("explode should keep the active geometry");
    };
    assert_eq!(out.nrows(), 3);
    assert_eq!(out.index().nlevels(), 2);
    for i in 0..3 {
        assert_eq!(out.frame().column("kind")?.value(i), Value::from("well"));
    }
    assert_eq!(out.geometry()?.union_all(UnionMethod::Unary, None)?, original);
    Ok(())
}

#[test]
fn wkb_and_wkt_round_trip() -> TestResult {
    let geom = pt(1.5, -2.25);
    assert_eq!(codec::from_wkb(&codec::to_wkb(&geom)?)?, geom);
    assert_eq!(codec::from_wkt(&codec::to_wkt(&geom))?, geom);
    Ok(())
}

#[test]
fn selecting_away_geometry_yields_plain_table() -> TestResult {
    let gdf = named_points()?;
    assert!(matches!(gdf.select(&["name"])?, Table::Plain(_)));
    let Table::Geo(kept) = gdf.select(&["geometry"])? else {
        panic!("geometry selection should stay geometry-aware");
    };
    assert_eq!(kept.active_geometry_name(), Some("geometry"));
    Ok(())
}
