//! Errors from the geometry kernel adapter and geometry codecs.

use snafu::prelude::*;

/// Errors produced while coercing, encoding or combining geometries.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GeometryError {
    /// A value supplied as geometry is not a geometry (TypeError class).
    #[snafu(display(
        "Input must be valid geometry objects: value at position {position} is of type {found}"
    ))]
    NotGeometry {
        /// Row position of the offending value.
        position: usize,
        /// Type name of the offending value.
        found: &'static str,
    },

    /// WKB bytes could not be decoded.
    #[snafu(display("Invalid WKB: {message}"))]
    WkbRead {
        /// Decoder message.
        message: String,
    },

    /// A geometry could not be encoded as WKB.
    #[snafu(display("Failed to encode geometry as WKB: {message}"))]
    WkbWrite {
        /// Encoder message.
        message: String,
    },

    /// Hex-encoded WKB was not valid hexadecimal.
    #[snafu(display("Invalid hex WKB: {source}"))]
    HexDecode {
        /// Underlying hex error.
        source: hex::FromHexError,
    },

    /// WKT text could not be parsed.
    #[snafu(display("Invalid WKT: {message}"))]
    WktParse {
        /// Parser message.
        message: String,
    },

    /// A GeoJSON geometry object could not be converted.
    #[snafu(display("Invalid GeoJSON geometry: {message}"))]
    GeoJson {
        /// Conversion message.
        message: String,
    },

    /// Stacking geometry arrays carrying different CRS tags.
    #[snafu(display("Cannot determine common CRS for concatenation inputs, got {crs:?}"))]
    ConcatCrsConflict {
        /// Distinct CRS values encountered.
        crs: Vec<String>,
    },

    /// Fixed-precision union requested for a method that does not support it.
    #[snafu(display("grid_size is only supported for the unary union method, got {method}"))]
    GridSizeUnsupported {
        /// The union method that was requested.
        method: String,
    },

    /// Grid size must be a positive finite number.
    #[snafu(display("grid_size must be positive and finite, got {grid_size}"))]
    InvalidGridSize {
        /// The rejected value.
        grid_size: f64,
    },

    /// An operation that only accepts some geometry families saw another.
    #[snafu(display("{operation} does not support {geometry_type} geometries"))]
    UnsupportedGeometry {
        /// Operation name.
        operation: &'static str,
        /// Geometry type encountered.
        geometry_type: &'static str,
    },
}

/// Result alias for geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;
