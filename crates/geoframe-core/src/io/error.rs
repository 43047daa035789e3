//! Errors raised by codecs and file formats.

use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::{frame::FrameError, geo_frame::GeoFrameError, geometry::GeometryError};

/// Errors from serialization and file I/O.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IoError {
    /// Filesystem failure.
    #[snafu(display("I/O error at {}: {source}", path.display()))]
    File {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Arrow failure while building or reading batches.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying error.
        source: ArrowError,
    },

    /// Parquet failure.
    #[snafu(display("Parquet error: {source}"))]
    Parquet {
        /// Underlying error.
        source: ParquetError,
    },

    /// JSON encoding or decoding failure.
    #[snafu(display("JSON error: {source}"))]
    Json {
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Geometry codec failure.
    #[snafu(display("{source}"))]
    Geometry {
        /// Underlying error.
        source: GeometryError,
    },

    /// Table engine failure.
    #[snafu(display("{source}"))]
    Frame {
        /// Underlying error.
        source: FrameError,
    },

    /// Geometry-aware table failure.
    #[snafu(display("{source}"))]
    GeoFrame {
        /// Underlying error.
        source: GeoFrameError,
    },

    /// No driver is known for the file extension.
    #[snafu(display("Cannot infer a file format from {}", path.display()))]
    UnsupportedDriver {
        /// The path.
        path: PathBuf,
    },

    /// Geo metadata is missing or malformed.
    #[snafu(display("Invalid geo metadata: {message}"))]
    InvalidMetadata {
        /// What was wrong.
        message: String,
    },

    /// Unknown GeoParquet schema version.
    #[snafu(display(
        "Unsupported GeoParquet schema version {version:?}; expected one of 0.1.0, 0.4.0, 1.0.0, 1.1.0"
    ))]
    UnsupportedSchemaVersion {
        /// Requested version.
        version: String,
    },

    /// A geometry encoding that can not hold the given data or version.
    #[snafu(display("Cannot encode column {column:?} as {encoding}: {reason}"))]
    UnsupportedEncoding {
        /// Column name.
        column: String,
        /// Encoding name.
        encoding: String,
        /// Why it failed.
        reason: String,
    },

    /// A column type with no counterpart in the table model.
    #[snafu(display("Column {column:?} has unsupported type {data_type}"))]
    UnsupportedType {
        /// Column name.
        column: String,
        /// Arrow type description.
        data_type: String,
    },

    /// Column names must be unique for this output.
    #[snafu(display("GeoDataFrame cannot contain duplicated column names ({name:?})"))]
    DuplicateColumns {
        /// A repeated name.
        name: String,
    },

    /// The input holds no geometry column.
    #[snafu(display("No geometry column found{}", requested.as_ref().map(|r| format!(" (expected {r:?})")).unwrap_or_default()))]
    MissingGeometry {
        /// Name that was asked for, if any.
        requested: Option<String>,
    },

    /// A feature object without the expected members.
    #[snafu(display("Invalid feature at position {position}: {message}"))]
    InvalidFeature {
        /// Feature position.
        position: usize,
        /// What was wrong.
        message: String,
    },

    /// Reprojecting to WGS84 without a CRS.
    #[snafu(display("CRS is not set. Cannot re-project to WGS84 (EPSG:4326)."))]
    CrsRequired,

    /// Writing a table that already exists with `IfExists::Fail`.
    #[snafu(display("Table {name:?} already exists"))]
    TableExists {
        /// Table name.
        name: String,
    },

    /// Failure reported by a database backend.
    #[snafu(display("Database error: {message}"))]
    Database {
        /// Backend message.
        message: String,
    },
}

impl From<GeoFrameError> for IoError {
    fn from(source: GeoFrameError) -> Self {
        IoError::GeoFrame { source }
    }
}

impl From<FrameError> for IoError {
    fn from(source: FrameError) -> Self {
        IoError::Frame { source }
    }
}

impl From<GeometryError> for IoError {
    fn from(source: GeometryError) -> Self {
        IoError::Geometry { source }
    }
}

impl From<ArrowError> for IoError {
    fn from(source: ArrowError) -> Self {
        IoError::Arrow { source }
    }
}

impl From<ParquetError> for IoError {
    fn from(source: ParquetError) -> Self {
        IoError::Parquet { source }
    }
}

impl From<serde_json::Error> for IoError {
    fn from(source: serde_json::Error) -> Self {
        IoError::Json { source }
    }
}

/// Result alias for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
