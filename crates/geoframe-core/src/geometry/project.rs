//! Projection engine seam.
//!
//! Reprojection is delegated through the [`Projector`] trait so callers can
//! plug in a full projection library. [`BuiltinProjector`] covers the
//! identity transform and WGS84 longitude/latitude to and from spherical Web
//! Mercator, which is enough for web-map workflows and for tests.

use std::f64::consts::PI;

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use snafu::prelude::*;

use crate::crs::Crs;

/// Errors from a projection engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProjectionError {
    /// The engine has no transform between the two systems.
    #[snafu(display("No transformation available from {from} to {to}"))]
    Unsupported {
        /// Source CRS.
        from: String,
        /// Target CRS.
        to: String,
    },

    /// A coordinate is outside the valid domain of the source system.
    #[snafu(display("Coordinate ({x}, {y}) is outside the domain of {crs}"))]
    OutOfRange {
        /// Offending x.
        x: f64,
        /// Offending y.
        y: f64,
        /// CRS whose domain was violated.
        crs: String,
    },
}

/// Result alias for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// A coordinate transformation engine.
pub trait Projector {
    /// Transform one geometry from `from` to `to`.
    fn transform(
        &self,
        geom: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Geometry<f64>>;
}

/// Equatorial radius used by spherical Web Mercator.
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the Web Mercator square.
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Built-in transforms: identity, and EPSG:4326 / OGC:CRS84 to and from
/// EPSG:3857.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProjector;

fn is_web_mercator(crs: &Crs) -> bool {
    matches!(crs.epsg(), Some(3857) | Some(900913))
}

fn lonlat_to_mercator(c: Coord<f64>) -> ProjectionResult<Coord<f64>> {
    ensure!(
        c.y.abs() <= 90.0 && c.x.is_finite() && c.y.is_finite(),
        OutOfRangeSnafu {
            x: c.x,
            y: c.y,
            crs: "EPSG:4326",
        }
    );
    let lat = c.y.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
    Ok(Coord {
        x: WEB_MERCATOR_RADIUS * c.x.to_radians(),
        y: WEB_MERCATOR_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln(),
    })
}

fn mercator_to_lonlat(c: Coord<f64>) -> ProjectionResult<Coord<f64>> {
    ensure!(
        c.x.is_finite() && c.y.is_finite(),
        OutOfRangeSnafu {
            x: c.x,
            y: c.y,
            crs: "EPSG:3857",
        }
    );
    Ok(Coord {
        x: (c.x / WEB_MERCATOR_RADIUS).to_degrees(),
        y: (2.0 * (c.y / WEB_MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    })
}

impl Projector for BuiltinProjector {
    fn transform(
        &self,
        geom: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Geometry<f64>> {
        if from == to || (from.is_wgs84() && to.is_wgs84()) {
            return Ok(geom.clone());
        }
        if from.is_wgs84() && is_web_mercator(to) {
            return geom.try_map_coords(lonlat_to_mercator);
        }
        if is_web_mercator(from) && to.is_wgs84() {
            return geom.try_map_coords(mercator_to_lonlat);
        }
        UnsupportedSnafu {
            from: from.to_string(),
            to: to.to_string(),
        }
        .fail()
    }
}

/// UTM zone EPSG code (`326xx` north, `327xx` south) containing a
/// longitude/latitude position.
pub fn utm_epsg_for(lon: f64, lat: f64) -> u32 {
    let zone = (((lon + 180.0) / 6.0).floor() as i64).rem_euclid(60) + 1;
    let base = if lat >= 0.0 { 32600 } else { 32700 };
    base + zone as u32
}
