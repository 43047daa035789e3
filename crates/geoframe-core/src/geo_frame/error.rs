//! Errors raised by the geometry-aware table.

use snafu::prelude::*;

use crate::{
    crs::CrsError,
    frame::FrameError,
    geometry::{project::ProjectionError, GeometryError},
};

/// Errors from geometry-aware table operations.
///
/// Invariant violations and CRS conflicts are raised before the table being
/// modified is touched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GeoFrameError {
    /// More than one column is literally named `geometry`.
    #[snafu(display(
        "GeoDataFrame does not support multiple columns using the geometry column name 'geometry'"
    ))]
    DuplicateGeometryColumn,

    /// Concatenation produced several columns with the active geometry name.
    #[snafu(display(
        "Concat operation has resulted in multiple columns using the geometry column name '{name}'. \
         Please ensure this column from the first DataFrame is not repeated."
    ))]
    AmbiguousConcatGeometry {
        /// The active geometry name.
        name: String,
    },

    /// No active geometry column is set.
    #[snafu(display(
        "You are calling a geospatial method on the GeoDataFrame, but the active geometry column \
         to use has not been set. {}",
        geometry_hint(geometry_columns)
    ))]
    NoActiveGeometry {
        /// Geometry-typed columns that could be activated.
        geometry_columns: Vec<String>,
    },

    /// The active geometry name does not resolve to a geometry column.
    #[snafu(display(
        "You are calling a geospatial method on the GeoDataFrame, but the active geometry column \
         ('{name}') is not present. {}",
        geometry_hint(geometry_columns)
    ))]
    ActiveGeometryMissing {
        /// The dangling active name.
        name: String,
        /// Geometry-typed columns that could be activated.
        geometry_columns: Vec<String>,
    },

    /// Setting a CRS on a table without an active geometry column.
    #[snafu(display(
        "Assigning CRS to a GeoDataFrame without a geometry column is not supported. \
         Use GeoDataFrame.set_geometry to set the active geometry column."
    ))]
    CrsWithoutActiveGeometry,

    /// A CRS was passed to the constructor but there is no geometry.
    #[snafu(display(
        "Assigning CRS to a GeoDataFrame without a geometry column is not supported. \
         Supply geometry using the 'geometry' option, or by providing a DataFrame with \
         column name 'geometry'"
    ))]
    CrsWithoutGeometry,

    /// A column name passed as geometry does not exist.
    #[snafu(display("Unknown column {name}"))]
    UnknownColumn {
        /// The missing name.
        name: String,
    },

    /// A column name passed as geometry resolves to several columns.
    #[snafu(display(
        "GeoDataFrame does not support setting the geometry column where the column name \
         '{name}' is shared by multiple columns."
    ))]
    AmbiguousColumn {
        /// The shared name.
        name: String,
    },

    /// An explicit CRS disagrees with the CRS carried by the data.
    #[snafu(display(
        "CRS mismatch between CRS of the passed geometries ({existing}) and 'crs' ({supplied}). \
         Use 'GeoDataFrame.set_crs(crs, allow_override=true)' to overwrite CRS or \
         'GeoDataFrame.to_crs(crs)' to reproject geometries."
    ))]
    CrsMismatch {
        /// CRS already on the data.
        existing: String,
        /// CRS that was supplied.
        supplied: String,
    },

    /// `set_crs` without `allow_override` over a different existing CRS.
    #[snafu(display(
        "The GeoDataFrame already has a CRS ({existing}) which is not equal to the passed CRS \
         ({supplied}). Specify 'allow_override=true' to allow replacing the existing CRS without \
         doing any transformation. If you actually want to transform the geometries, use \
         'GeoDataFrame.to_crs' instead."
    ))]
    CrsOverride {
        /// CRS already on the data.
        existing: String,
        /// CRS that was supplied.
        supplied: String,
    },

    /// Reprojecting geometries that have no CRS.
    #[snafu(display(
        "Cannot transform naive geometries. Please set a crs on the object first."
    ))]
    NaiveGeometry,

    /// Renaming the geometry onto an existing column.
    #[snafu(display("Column named {name} already exists"))]
    ColumnExists {
        /// The taken name.
        name: String,
    },

    /// Data supplied as geometry could not be coerced.
    #[snafu(display("Column {column:?} could not be used as geometry: {source}"))]
    Coercion {
        /// Target column.
        column: String,
        /// Kernel error.
        source: GeometryError,
    },

    /// An argument outside the accepted domain.
    #[snafu(display("{message}"))]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// Geometry kernel failure.
    #[snafu(display("{source}"))]
    Kernel {
        /// Kernel error.
        source: GeometryError,
    },

    /// Host table engine failure.
    #[snafu(display("{source}"))]
    Frame {
        /// Engine error.
        source: FrameError,
    },

    /// Projection engine failure.
    #[snafu(display("{source}"))]
    Projection {
        /// Projection error.
        source: ProjectionError,
    },

    /// CRS parsing failure.
    #[snafu(display("{source}"))]
    Crs {
        /// CRS error.
        source: CrsError,
    },
}

fn geometry_hint(columns: &[String]) -> String {
    if columns.is_empty() {
        "There are no existing columns with geometry data type. You can add a geometry column \
         as the active geometry column with set_geometry."
            .to_string()
    } else {
        format!(
            "There are columns with geometry data type ({columns:?}), and you can either set one \
             as the active geometry with set_geometry(\"name\") or access the column as a \
             GeoSeries with get(\"name\") and call the method directly on it."
        )
    }
}

impl From<FrameError> for GeoFrameError {
    fn from(source: FrameError) -> Self {
        GeoFrameError::Frame { source }
    }
}

impl From<GeometryError> for GeoFrameError {
    fn from(source: GeometryError) -> Self {
        GeoFrameError::Kernel { source }
    }
}

/// Result alias for geometry-aware table operations.
pub type GeoFrameResult<T> = Result<T, GeoFrameError>;
