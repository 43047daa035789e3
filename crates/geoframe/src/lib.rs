//! # geoframe
//!
//! Geometry-aware data frames: an ordinary table that knows which of its
//! columns holds geometry, keeps coordinate reference systems consistent
//! and decides whether each derived table is still geometry-aware.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust,ignore
//! use geoframe::prelude::*;
//!
//! let gdf = GeoDataFrame::from_file("parcels.parquet")?;
//! let projected = gdf.to_crs(&Crs::from_epsg(3857))?;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Host table engine (geometry-unaware).
pub mod frame {
    pub use geoframe_core::frame::{
        AggFunc, AggSpec, By, Column, ColumnData, DType, DataFrame, FrameError, FrameResult,
        GroupOptions, Index, JoinHow, MergeOptions, Series,
    };
}

/// Geometry storage, codecs and kernel.
pub mod geometry {
    pub use geoframe_core::geometry::kernel::UnionMethod;
    pub use geoframe_core::geometry::project::{BuiltinProjector, Projector};
    pub use geoframe_core::geometry::{GeometryArray, GeometryError};
}

/// Readers and writers.
pub mod io {
    pub use geoframe_core::io::*;
}

/// Spatial joins, clipping and overlay.
pub mod spatial {
    pub use geoframe_core::spatial::*;
}

pub use geoframe_core::crs::{Crs, CrsError};
pub use geoframe_core::geo_frame::{
    concat, to_geometry_aware, AnySeries, Axis, DissolveOptions, ExplodeOptions, GeoDataFrame,
    GeoFrameError, GeoFrameOptions, GeoFrameResult, GeoSeries, GeometryInput, Selection,
    SetGeometryOptions, Table, DEFAULT_GEOMETRY_NAME,
};
pub use geoframe_core::value::{Label, Value};
