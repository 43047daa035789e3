use geoframe_core::{
    crs::CrsError, frame::FrameError, geo_frame::GeoFrameError, io::IoError,
};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Failed to read {path}. Supported extensions: parquet, feather, arrow, geojson, json"))]
    ReadTable {
        path: String,
        #[snafu(source(from(IoError, Box::new)))]
        source: Box<IoError>,
    },

    #[snafu(display("Failed to write {path}"))]
    WriteTable {
        path: String,
        #[snafu(source(from(IoError, Box::new)))]
        source: Box<IoError>,
    },

    #[snafu(display("{operation} failed"))]
    Operation {
        operation: &'static str,
        #[snafu(source(from(GeoFrameError, Box::new)))]
        source: Box<GeoFrameError>,
    },

    #[snafu(display("Invalid --crs '{spec}': {source}"))]
    InvalidCrs { spec: String, source: CrsError },

    #[snafu(display("Invalid --schema-version '{spec}': {source}"))]
    InvalidSchemaVersion {
        spec: String,
        #[snafu(source(from(IoError, Box::new)))]
        source: Box<IoError>,
    },

    #[snafu(display("Invalid --agg '{spec}': {source}"))]
    InvalidAggregation { spec: String, source: FrameError },

    #[snafu(display("Invalid --method: {message}"))]
    InvalidMethod { message: String },

    #[snafu(display("{operation} produced a table without geometry; nothing to write"))]
    NoGeometry { operation: &'static str },

    #[snafu(display("Failed to render output: {source}"))]
    Render {
        #[snafu(source(from(IoError, Box::new)))]
        source: Box<IoError>,
    },
}
