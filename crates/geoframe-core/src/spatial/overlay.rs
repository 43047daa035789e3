//! Set-theoretic overlay of two polygon tables.

use std::{fmt, str::FromStr};

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::{
    frame::{Column, ColumnData, DataFrame, Index},
    geo_frame::{
        propagate::{reconstruct, Derivation},
        GeoDataFrame, GeoFrameError, GeoFrameResult, Table, DEFAULT_GEOMETRY_NAME,
    },
    geometry::{
        codec::geometry_type_name,
        kernel::{self, OverlayOp},
        GeometryArray,
    },
};

use super::{apply_suffixes, check_crs, gather};

/// Which pieces of the overlay are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayHow {
    /// Areas covered by both sides.
    #[default]
    Intersection,
    /// Areas covered by either side.
    Union,
    /// Areas covered by the left side, split by the right.
    Identity,
    /// Areas covered by exactly one side.
    SymmetricDifference,
    /// Areas of the left side not covered by the right.
    Difference,
}

impl OverlayHow {
    /// Name as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayHow::Intersection => "intersection",
            OverlayHow::Union => "union",
            OverlayHow::Identity => "identity",
            OverlayHow::SymmetricDifference => "symmetric_difference",
            OverlayHow::Difference => "difference",
        }
    }
}

impl fmt::Display for OverlayHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayHow {
    type Err = GeoFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intersection" => Ok(OverlayHow::Intersection),
            "union" => Ok(OverlayHow::Union),
            "identity" => Ok(OverlayHow::Identity),
            "symmetric_difference" => Ok(OverlayHow::SymmetricDifference),
            "difference" => Ok(OverlayHow::Difference),
            other => Err(GeoFrameError::InvalidArgument {
                message: format!(
                    "`how` was {other:?} but is expected to be in ['intersection', 'union', \
                     'identity', 'symmetric_difference', 'difference']"
                ),
            }),
        }
    }
}

/// Options for [`GeoDataFrame::overlay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Kind of overlay.
    pub how: OverlayHow,
}

impl OverlayOptions {
    /// Set the kind of overlay.
    pub fn with_how(mut self, how: OverlayHow) -> Self {
        self.how = how;
        self
    }
}

/// One output piece: its source rows and geometry.
type Piece = (Option<usize>, Option<usize>, Geometry<f64>);

impl GeoDataFrame {
    /// Overlay the active geometries of two polygon tables.
    ///
    /// Each output row is one piece of the overlay carrying the attributes
    /// of the rows it came from; attributes of a side the piece does not
    /// touch are missing, and `difference` keeps only left attributes.
    /// Names present on both sides get `_1` / `_2`. The geometry column
    /// takes the left active name and comes last; the index is reset.
    pub fn overlay(&self, right: &GeoDataFrame, opts: &OverlayOptions) -> GeoFrameResult<Table> {
        let (lvalues, rvalues) = (self.active_array()?, right.active_array()?);
        check_crs("overlay", lvalues.crs(), rvalues.crs());
        ensure_polygonal(lvalues)?;
        ensure_polygonal(rvalues)?;

        let mut pieces: Vec<Piece> = Vec::new();
        if matches!(
            opts.how,
            OverlayHow::Intersection | OverlayHow::Union | OverlayHow::Identity
        ) {
            pieces.extend(intersections(lvalues, rvalues)?);
        }
        if matches!(
            opts.how,
            OverlayHow::Union
                | OverlayHow::Identity
                | OverlayHow::SymmetricDifference
                | OverlayHow::Difference
        ) {
            let diffs = differences(lvalues, rvalues)?;
            pieces.extend(diffs.into_iter().map(|(i, g)| (Some(i), None, g)));
        }
        if matches!(opts.how, OverlayHow::Union | OverlayHow::SymmetricDifference) {
            let diffs = differences(rvalues, lvalues)?;
            pieces.extend(diffs.into_iter().map(|(j, g)| (None, Some(j), g)));
        }

        let lrows: Vec<Option<usize>> = pieces.iter().map(|p| p.0).collect();
        let rrows: Vec<Option<usize>> = pieces.iter().map(|p| p.1).collect();
        let (lname, rname) = (self.active.as_deref(), right.active.as_deref());
        let mut lcols = gather(&self.frame, &lrows, lname)?;
        let mut rcols = match opts.how {
            OverlayHow::Difference => Vec::new(),
            _ => gather(&right.frame, &rrows, rname)?,
        };
        apply_suffixes(&mut lcols, &mut rcols, ("_1", "_2"), (None, None));

        let name = lname.unwrap_or(DEFAULT_GEOMETRY_NAME);
        let geometry = GeometryArray::new(
            pieces.into_iter().map(|(_, _, g)| Some(g)).collect(),
            lvalues.crs().cloned(),
        );
        let nrows = geometry.len();
        let mut columns = lcols;
        columns.extend(rcols);
        columns.push(Column::new(name, ColumnData::Geometry(geometry)));
        let frame = DataFrame::new(Index::range(nrows), columns)?;
        log::debug!("overlay ({}) produced {nrows} pieces", opts.how);

        let (ltable, rtable) = (Table::Geo(self.clone()), Table::Geo(right.clone()));
        reconstruct(
            frame,
            Derivation::Merge {
                left: &ltable,
                right: &rtable,
            },
        )
    }
}

fn ensure_polygonal(values: &GeometryArray) -> GeoFrameResult<()> {
    for geom in values.iter().flatten() {
        if kernel::family(geom) != kernel::Family::Polygonal {
            return Err(GeoFrameError::InvalidArgument {
                message: format!(
                    "overlay only supports polygonal geometries, found {}",
                    geometry_type_name(geom)
                ),
            });
        }
    }
    Ok(())
}

fn intersections(left: &GeometryArray, right: &GeometryArray) -> GeoFrameResult<Vec<Piece>> {
    let mut out = Vec::new();
    for (i, a) in left.iter().enumerate() {
        let Some(a) = a else { continue };
        for (j, b) in right.iter().enumerate() {
            let Some(b) = b else { continue };
            if !kernel::intersects(a, b) {
                continue;
            }
            if let Some(piece) = kernel::overlay_polygons(a, b, OverlayOp::Intersection)? {
                out.push((Some(i), Some(j), piece));
            }
        }
    }
    Ok(out)
}

/// Each geometry of `left` minus everything in `right`; empty results are
/// dropped.
fn differences(
    left: &GeometryArray,
    right: &GeometryArray,
) -> GeoFrameResult<Vec<(usize, Geometry<f64>)>> {
    let mut out = Vec::new();
    'rows: for (i, a) in left.iter().enumerate() {
        let Some(a) = a else { continue };
        let mut rest = a.clone();
        for b in right.iter().flatten() {
            if !kernel::intersects(&rest, b) {
                continue;
            }
            match kernel::overlay_polygons(&rest, b, OverlayOp::Difference)? {
                Some(g) => rest = g,
                None => continue 'rows,
            }
        }
        out.push((i, rest));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geo_frame::GeoFrameOptions, value::Value};
    use geo::Area;
    use geo_types::{point, Rect};

    fn square(x0: f64, y0: f64, side: f64) -> Geometry<f64> {
        Rect::new((x0, y0), (x0 + side, y0 + side)).to_polygon().into()
    }

    fn table(attr: &str, values: Vec<i64>, geoms: Vec<Geometry<f64>>) -> GeoFrameResult<GeoDataFrame> {
        GeoDataFrame::from_columns(
            vec![
                Column::new(attr, values),
                Column::new("geometry", GeometryArray::from_geometries(geoms, None)),
            ],
            GeoFrameOptions::default(),
        )
    }

    fn sides() -> GeoFrameResult<(GeoDataFrame, GeoDataFrame)> {
        Ok((
            table("df1", vec![1, 2], vec![square(0.0, 0.0, 2.0), square(2.0, 2.0, 2.0)])?,
            table("df2", vec![1, 2], vec![square(1.0, 1.0, 2.0), square(3.0, 3.0, 2.0)])?,
        ))
    }

    fn area(table: &Table, row: usize) -> f64 {
        match table.frame().column("geometry") {
            Ok(ColumnData::Geometry(g)) => g.get(row).map(|g| g.unsigned_area()).unwrap_or_default(),
            _ => f64::NAN,
        }
    }

    #[test]
    fn intersection_pairs_overlapping_rows() -> GeoFrameResult<()> {
        let (left, right) = sides()?;
        let out = left.overlay(&right, &OverlayOptions::default())?;
        // (0,0)-(2,2) meets (1,1)-(3,3); (2,2)-(4,4) meets both right squares
        assert_eq!(out.nrows(), 3);
        assert_eq!(out.frame().column_names(), vec!["df1", "df2", "geometry"]);
        assert!((area(&out, 0) - 1.0).abs() < 1e-9);
        assert_eq!(out.frame().column("df1")?.value(2), Value::Int(2));
        assert_eq!(out.frame().column("df2")?.value(2), Value::Int(2));
        assert_eq!(out.active_geometry_name(), Some("geometry"));
        Ok(())
    }

    #[test]
    fn union_adds_both_differences() -> GeoFrameResult<()> {
        let (left, right) = sides()?;
        let out = left.overlay(&right, &OverlayOptions::default().with_how(OverlayHow::Union))?;
        assert_eq!(out.nrows(), 3 + 2 + 2);
        assert_eq!(out.frame().column("df2")?.value(3), Value::Null);
        assert_eq!(out.frame().column("df1")?.value(5), Value::Null);
        Ok(())
    }

    #[test]
    fn difference_keeps_left_attributes_only() -> GeoFrameResult<()> {
        let (left, right) = sides()?;
        let opts = OverlayOptions::default().with_how(OverlayHow::Difference);
        let out = left.overlay(&right, &opts)?;
        assert_eq!(out.frame().column_names(), vec!["df1", "geometry"]);
        assert_eq!(out.nrows(), 2);
        assert!((area(&out, 0) - 3.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn shared_names_get_numbered_suffixes() -> GeoFrameResult<()> {
        let left = table("v", vec![1], vec![square(0.0, 0.0, 1.0)])?;
        let right = table("v", vec![2], vec![square(0.0, 0.0, 1.0)])?;
        let out = left.overlay(&right, &OverlayOptions::default())?;
        assert_eq!(out.frame().column_names(), vec!["v_1", "v_2", "geometry"]);
        Ok(())
    }

    #[test]
    fn points_are_rejected() -> GeoFrameResult<()> {
        let (left, _) = sides()?;
        let points = table("p", vec![0], vec![Geometry::Point(point!(x: 0.0, y: 0.0))])?;
        assert!(matches!(
            left.overlay(&points, &OverlayOptions::default()),
            Err(GeoFrameError::InvalidArgument { .. })
        ));
        assert!("bogus".parse::<OverlayHow>().is_err());
        Ok(())
    }
}
