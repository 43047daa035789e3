//! Core engine for geometry-aware tables.
//!
//! This crate provides the foundational pieces for `geoframe`:
//!
//! - A small columnar host table with row indexes, joins, reshapes and
//!   grouping that treats geometry as one more dtype (`frame` module).
//! - Geometry storage, WKB/WKT codecs, a planar kernel and reprojection
//!   (`geometry` module), tagged with coordinate reference systems
//!   (`crs` module).
//! - `GeoDataFrame` and `GeoSeries`, which track the active geometry
//!   column, keep CRS invariants and decide how every derived table
//!   narrows back to a plain or geometry-aware table (`geo_frame` module).
//! - Spatial joins, clipping and overlay (`spatial` module).
//! - GeoJSON, GeoArrow, GeoParquet, Feather and spatial database codecs
//!   (`io` module).
//!
//! Higher-level crates (the `geoframe` facade and the CLI) depend on this
//! core crate rather than re-implementing table semantics.
#![warn(missing_docs)]
pub mod crs;
pub mod frame;
pub mod geo_frame;
pub mod geometry;
pub mod io;
pub mod spatial;
pub mod value;
