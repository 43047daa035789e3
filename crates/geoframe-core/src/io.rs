//! Serialization of geometry-aware tables.
//!
//! Codecs are grouped by target:
//! - [`features`]: GeoJSON-like feature mappings and JSON text,
//! - [`geoarrow`]: Arrow record batches with geometry extension metadata,
//! - [`geoparquet`] and [`feather`]: files carrying GeoParquet `geo` metadata,
//! - [`file`]: extension-based dispatch over the file formats,
//! - [`sql`]: the spatial database seam.
//!
//! Every reader produces a [`GeoDataFrame`](crate::geo_frame::GeoDataFrame)
//! through the regular constructor, so the active-geometry and CRS rules are
//! the same as for in-memory construction.

pub mod encode;
pub mod error;
pub mod feather;
pub mod features;
pub mod file;
pub mod geoarrow;
pub mod geoparquet;
pub mod sql;

pub use error::{IoError, IoResult};
pub use feather::FeatherOptions;
pub use features::{FeatureOptions, FromFeaturesOptions, JsonOptions, NaPolicy};
pub use file::{Driver, FileOptions};
pub use geoarrow::{ArrowOptions, GeometryEncoding};
pub use geoparquet::{ParquetOptions, SchemaVersion};
pub use sql::{IfExists, SpatialDatabase};
