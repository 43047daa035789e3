//! Errors from the host table engine.

use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::geometry::GeometryError;

/// Errors raised by generic table operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FrameError {
    /// A column label is not present.
    #[snafu(display("Column {name:?} not found"))]
    ColumnNotFound {
        /// The missing column name.
        name: String,
    },

    /// A column, index or key vector does not match the table length.
    #[snafu(display("Length of {what} ({found}) does not match length of index ({expected})"))]
    LengthMismatch {
        /// What was being attached.
        what: String,
        /// Required length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },

    /// A row position is out of range.
    #[snafu(display("Position {position} is out of bounds for length {len}"))]
    PositionOutOfBounds {
        /// Requested position.
        position: usize,
        /// Number of rows.
        len: usize,
    },

    /// An index level number is out of range.
    #[snafu(display("Index has {nlevels} level(s), level {level} requested"))]
    LevelOutOfRange {
        /// Requested level.
        level: usize,
        /// Number of levels.
        nlevels: usize,
    },

    /// Operation needs unique labels but found duplicates.
    #[snafu(display("Duplicate labels are not allowed for {operation}"))]
    DuplicateLabels {
        /// Operation name.
        operation: &'static str,
    },

    /// Operation needs unique column names but found duplicates.
    #[snafu(display("Duplicate column name {name:?} is not allowed for {operation}"))]
    DuplicateColumnName {
        /// Duplicated name.
        name: String,
        /// Operation name.
        operation: &'static str,
    },

    /// A value that cannot act as a key (for example a geometry) was used
    /// to group or join.
    #[snafu(display("Column {column:?} holds unhashable {found} values and cannot be used as a key"))]
    Unhashable {
        /// Key column.
        column: String,
        /// Type name encountered.
        found: &'static str,
    },

    /// An aggregation function does not apply to a column's values.
    #[snafu(display("Cannot compute {func} of column {column:?} holding {found} values"))]
    AggregationUnsupported {
        /// Function name.
        func: String,
        /// Column name.
        column: String,
        /// Type name encountered.
        found: &'static str,
    },

    /// A user-supplied aggregation returned an error.
    #[snafu(display("Aggregation {func} failed: {message}"))]
    CustomAggregation {
        /// Function name.
        func: String,
        /// Failure message.
        message: String,
    },

    /// An unknown aggregation function name.
    #[snafu(display("Unknown aggregation function {name:?}"))]
    UnknownAggregation {
        /// Rejected name.
        name: String,
    },

    /// Unstacking needs at least two index levels.
    #[snafu(display("Unstack requires a multi-level index, got {nlevels} level(s)"))]
    NotMultiIndex {
        /// Number of levels.
        nlevels: usize,
    },

    /// Combining geometry columns failed.
    #[snafu(display("{source}"))]
    Geometry {
        /// Underlying geometry error.
        source: GeometryError,
    },

    /// Arrow compute kernel failure.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying arrow error.
        source: ArrowError,
    },
}

/// Result alias for table engine operations.
pub type FrameResult<T> = Result<T, FrameError>;
