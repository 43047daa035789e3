//! Clipping to a polygonal mask.

use geo_types::{Coord, Geometry, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    crs::Crs,
    frame::ColumnData,
    geo_frame::{
        propagate::{reconstruct, Derivation},
        GeoDataFrame, GeoFrameError, GeoFrameResult, GeoSeries, Table,
    },
    geometry::{
        kernel::{self, UnionMethod},
        GeometryArray,
    },
};

use super::check_crs;

/// Area a table is clipped to.
#[derive(Debug, Clone)]
pub enum ClipMask {
    /// `[minx, miny, maxx, maxy]`.
    Rect([f64; 4]),
    /// A polygon or multi-polygon.
    Geometry(Geometry<f64>),
    /// The union of a series.
    Series(GeoSeries),
    /// The union of a table's active geometry.
    Table(GeoDataFrame),
}

impl From<[f64; 4]> for ClipMask {
    fn from(rect: [f64; 4]) -> Self {
        ClipMask::Rect(rect)
    }
}

impl From<Geometry<f64>> for ClipMask {
    fn from(geom: Geometry<f64>) -> Self {
        ClipMask::Geometry(geom)
    }
}

impl From<GeoSeries> for ClipMask {
    fn from(series: GeoSeries) -> Self {
        ClipMask::Series(series)
    }
}

impl From<GeoDataFrame> for ClipMask {
    fn from(gdf: GeoDataFrame) -> Self {
        ClipMask::Table(gdf)
    }
}

impl ClipMask {
    /// Polygonal mask and, for tabular masks, the CRS it carries.
    fn resolve(self) -> GeoFrameResult<(MultiPolygon<f64>, Option<Option<Crs>>)> {
        let (geom, crs) = match self {
            ClipMask::Rect([minx, miny, maxx, maxy]) => {
                if !(minx <= maxx && miny <= maxy) {
                    return Err(GeoFrameError::InvalidArgument {
                        message: format!(
                            "mask bounds must be ordered as [minx, miny, maxx, maxy], got \
                             [{minx}, {miny}, {maxx}, {maxy}]"
                        ),
                    });
                }
                let rect = Rect::new(Coord { x: minx, y: miny }, Coord { x: maxx, y: maxy });
                (Geometry::Polygon(rect.to_polygon()), None)
            }
            ClipMask::Geometry(geom) => (geom, None),
            ClipMask::Series(series) => {
                let crs = series.crs().cloned();
                (series.union_all(UnionMethod::Unary, None)?, Some(crs))
            }
            ClipMask::Table(gdf) => {
                let series = gdf.geometry()?;
                let crs = series.crs().cloned();
                (series.union_all(UnionMethod::Unary, None)?, Some(crs))
            }
        };
        let polygons = kernel::polygonal(&geom).ok_or_else(|| GeoFrameError::InvalidArgument {
            message: "mask must be a Polygon or MultiPolygon".to_string(),
        })?;
        Ok((polygons, crs))
    }
}

/// Options for [`GeoDataFrame::clip`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    /// Drop clipped parts whose dimension differs from the input geometry.
    pub keep_geom_type: bool,
    /// Keep the input row order.
    pub sort: bool,
}

impl ClipOptions {
    /// Keep only parts of the input's dimension.
    pub fn with_keep_geom_type(mut self, keep: bool) -> Self {
        self.keep_geom_type = keep;
        self
    }

    /// Keep the input row order.
    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }
}

impl GeoDataFrame {
    /// Rows whose active geometry meets `mask`, with the geometry cut to it.
    ///
    /// Rows with missing geometry or lying outside the mask are dropped.
    /// Unless `sort` is set, rows entirely inside the mask come first,
    /// followed by the rows that had to be cut, each group in input order.
    pub fn clip(&self, mask: impl Into<ClipMask>, opts: &ClipOptions) -> GeoFrameResult<Table> {
        let values = self.active_array()?;
        let (mask, mask_crs) = mask.into().resolve()?;
        if let Some(crs) = &mask_crs {
            check_crs("clip", values.crs(), crs.as_ref());
        }
        let mask_geom = Geometry::MultiPolygon(mask.clone());

        let mut inside = Vec::new();
        let mut cut = Vec::new();
        for (row, geom) in values.iter().enumerate() {
            let Some(geom) = geom else { continue };
            if !kernel::intersects(geom, &mask_geom) {
                continue;
            }
            if kernel::within(geom, &mask_geom) {
                inside.push((row, geom.clone()));
                continue;
            }
            let Some(clipped) = kernel::clip_to_mask(geom, &mask) else {
                continue;
            };
            let clipped = if opts.keep_geom_type {
                match kernel::keep_family(clipped, kernel::family(geom)) {
                    Some(g) => g,
                    None => continue,
                }
            } else {
                clipped
            };
            cut.push((row, clipped));
        }

        let mut rows = inside;
        rows.extend(cut);
        if opts.sort {
            rows.sort_by_key(|(row, _)| *row);
        }
        let positions: Vec<usize> = rows.iter().map(|(row, _)| *row).collect();
        let geometry = GeometryArray::new(
            rows.into_iter().map(|(_, g)| Some(g)).collect(),
            values.crs().cloned(),
        );
        let mut frame = self.frame.take(&positions)?;
        let name = self.active.as_deref().unwrap_or_default();
        frame.set_column(name, ColumnData::Geometry(geometry))?;
        log::debug!("clip kept {} of {} rows", frame.nrows(), self.nrows());
        reconstruct(frame, Derivation::Default(self))
    }
}
