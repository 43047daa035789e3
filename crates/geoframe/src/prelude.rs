//! Wrapper prelude.
//!
//! The `geoframe` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::frame::{Column, DataFrame};
pub use crate::io::{FileOptions, IoError};
pub use crate::{
    concat, Axis, Crs, DissolveOptions, ExplodeOptions, GeoDataFrame, GeoFrameError,
    GeoFrameOptions, GeoSeries, Table, Value,
};
