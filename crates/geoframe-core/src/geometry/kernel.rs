//! Geometry kernel adapter.
//!
//! Thin, total wrappers over the `geo` crate for the handful of operations
//! the table layer needs: bounds, multi-part decomposition, union, grid
//! snapping, planar distance, binary predicates, clipping and polygon
//! overlay. Inputs are never mutated; every function returns new values.

use std::{cmp::Ordering, fmt, str::FromStr};

use geo::{BooleanOps, BoundingRect, CoordsIter, Intersects, MapCoords, Relate};
use geo_types::{
    Coord, Geometry, GeometryCollection, Line, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use serde::{Deserialize, Serialize};

use super::{
    codec::{geometry_type_name, normalize},
    error::{GeometryError, GeometryResult},
};

/// Bounds `[minx, miny, maxx, maxy]`; `None` for empty geometries.
pub fn bounds(geom: &Geometry<f64>) -> Option<[f64; 4]> {
    geom.bounding_rect()
        .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
}

/// Whether the geometry has no coordinates.
pub fn is_empty(geom: &Geometry<f64>) -> bool {
    geom.coords_count() == 0
}

/// Whether the geometry is a multi-part container.
pub fn is_multipart(geom: &Geometry<f64>) -> bool {
    matches!(
        geom,
        Geometry::MultiPoint(_)
            | Geometry::MultiLineString(_)
            | Geometry::MultiPolygon(_)
            | Geometry::GeometryCollection(_)
    )
}

/// Direct members of a multi-part geometry; a single-part geometry is its
/// own only part. Collections are not flattened recursively.
pub fn parts(geom: &Geometry<f64>) -> Vec<Geometry<f64>> {
    match geom {
        Geometry::MultiPoint(mp) => mp.0.iter().copied().map(Geometry::Point).collect(),
        Geometry::MultiLineString(ml) => ml.0.iter().cloned().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(mp) => mp.0.iter().cloned().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(gc) => gc.0.clone(),
        other => vec![normalize(other)],
    }
}

/// Snap every coordinate to a grid of the given cell size.
pub fn snap_to_grid(geom: &Geometry<f64>, grid_size: f64) -> Geometry<f64> {
    geom.map_coords(|c| Coord {
        x: (c.x / grid_size).round() * grid_size,
        y: (c.y / grid_size).round() * grid_size,
    })
}

/// Strategy used by [`union_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMethod {
    /// General union of arbitrary input.
    #[default]
    Unary,
    /// Union of polygons forming a coverage (edges may touch, interiors
    /// should not overlap).
    Coverage,
    /// Union that only merges the subsets of the input that intersect.
    DisjointSubset,
}

impl UnionMethod {
    /// Name as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            UnionMethod::Unary => "unary",
            UnionMethod::Coverage => "coverage",
            UnionMethod::DisjointSubset => "disjoint_subset",
        }
    }
}

impl fmt::Display for UnionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "unary" => Ok(UnionMethod::Unary),
            "coverage" => Ok(UnionMethod::Coverage),
            "disjoint_subset" => Ok(UnionMethod::DisjointSubset),
            other => Err(format!(
                "method must be one of unary, coverage or disjoint_subset, got {other:?}"
            )),
        }
    }
}

/// Single-part atoms of a geometry split by dimension.
#[derive(Debug, Default)]
struct Atoms {
    points: Vec<Point<f64>>,
    lines: Vec<LineString<f64>>,
    polygons: Vec<Polygon<f64>>,
}

impl Atoms {
    fn push(&mut self, geom: &Geometry<f64>) {
        match geom {
            Geometry::Point(p) => self.points.push(*p),
            Geometry::MultiPoint(mp) => self.points.extend(mp.0.iter().copied()),
            Geometry::Line(l) => self.lines.push(LineString::from(vec![l.start, l.end])),
            Geometry::LineString(ls) => {
                if !ls.0.is_empty() {
                    self.lines.push(ls.clone());
                }
            }
            Geometry::MultiLineString(ml) => {
                self.lines.extend(ml.0.iter().filter(|l| !l.0.is_empty()).cloned())
            }
            Geometry::Polygon(p) => {
                if !p.exterior().0.is_empty() {
                    self.polygons.push(p.clone());
                }
            }
            Geometry::MultiPolygon(mp) => self.polygons.extend(
                mp.0.iter()
                    .filter(|p| !p.exterior().0.is_empty())
                    .cloned(),
            ),
            Geometry::Rect(r) => self.polygons.push(r.to_polygon()),
            Geometry::Triangle(t) => self.polygons.push(t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| self.push(g)),
        }
    }
}

/// Assemble a result from per-dimension parts, collapsing single members.
fn assemble(
    polygons: Vec<Polygon<f64>>,
    lines: Vec<LineString<f64>>,
    points: Vec<Point<f64>>,
) -> Geometry<f64> {
    let mut members: Vec<Geometry<f64>> = Vec::new();
    match polygons.len() {
        0 => {}
        1 => members.extend(polygons.into_iter().map(Geometry::Polygon)),
        _ => members.push(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
    match lines.len() {
        0 => {}
        1 => members.extend(lines.into_iter().map(Geometry::LineString)),
        _ => members.push(Geometry::MultiLineString(MultiLineString::new(lines))),
    }
    match points.len() {
        0 => {}
        1 => members.extend(points.into_iter().map(Geometry::Point)),
        _ => members.push(Geometry::MultiPoint(MultiPoint::new(points))),
    }
    if members.len() == 1 {
        members.remove(0)
    } else {
        Geometry::GeometryCollection(GeometryCollection(members))
    }
}

fn cmp_coord(a: &Coord<f64>, b: &Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn union_polygons(polygons: Vec<Polygon<f64>>, method: UnionMethod) -> MultiPolygon<f64> {
    match method {
        UnionMethod::Unary | UnionMethod::Coverage => polygons
            .into_iter()
            .fold(MultiPolygon::new(vec![]), |acc, p| {
                acc.union(&MultiPolygon::new(vec![p]))
            }),
        UnionMethod::DisjointSubset => {
            // Grow connected components of intersecting polygons, then union
            // each component on its own.
            let mut components: Vec<MultiPolygon<f64>> = Vec::new();
            for p in polygons {
                let mut merged = MultiPolygon::new(vec![p]);
                let mut rest = Vec::with_capacity(components.len());
                for c in components {
                    if c.intersects(&merged) {
                        merged = merged.union(&c);
                    } else {
                        rest.push(c);
                    }
                }
                rest.push(merged);
                components = rest;
            }
            MultiPolygon::new(components.into_iter().flat_map(|c| c.0).collect())
        }
    }
}

fn same_line(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    a == b || a.0.iter().rev().eq(b.0.iter())
}

/// Union of all geometries.
///
/// Missing slots are the caller's concern; pass only present geometries.
/// An empty input unions to an empty `GeometryCollection`. `grid_size`
/// snaps input and output to a fixed-precision grid and is only accepted
/// together with [`UnionMethod::Unary`].
pub fn union_all<'a, I>(
    geoms: I,
    method: UnionMethod,
    grid_size: Option<f64>,
) -> GeometryResult<Geometry<f64>>
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    if let Some(g) = grid_size {
        if method != UnionMethod::Unary {
            return Err(GeometryError::GridSizeUnsupported {
                method: method.to_string(),
            });
        }
        if !(g.is_finite() && g > 0.0) {
            return Err(GeometryError::InvalidGridSize { grid_size: g });
        }
    }

    let mut atoms = Atoms::default();
    for geom in geoms {
        match grid_size {
            Some(g) => atoms.push(&snap_to_grid(geom, g)),
            None => atoms.push(geom),
        }
    }

    let polygon_union = union_polygons(atoms.polygons, method);
    let area: Option<Geometry<f64>> =
        (!polygon_union.0.is_empty()).then(|| Geometry::MultiPolygon(polygon_union.clone()));

    let mut lines: Vec<LineString<f64>> = Vec::new();
    let raw_lines = match &area {
        Some(_) => polygon_union
            .clip(&MultiLineString::new(atoms.lines), true)
            .0
            .into_iter()
            .filter(|l| l.0.len() > 1)
            .collect(),
        None => atoms.lines,
    };
    for line in raw_lines {
        if !lines.iter().any(|l| same_line(l, &line)) {
            lines.push(line);
        }
    }
    let linework: Option<Geometry<f64>> =
        (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines.clone())));

    let mut points = atoms.points;
    points.sort_by(|a, b| cmp_coord(&a.0, &b.0));
    points.dedup();
    points.retain(|p| {
        let p = Geometry::Point(*p);
        !area.as_ref().is_some_and(|a| a.intersects(&p))
            && !linework.as_ref().is_some_and(|l| l.intersects(&p))
    });

    let out = assemble(polygon_union.0, lines, points);
    Ok(match grid_size {
        Some(g) => snap_to_grid(&out, g),
        None => out,
    })
}

/// Whether `a` and `b` share any point.
pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}

/// Whether `b` lies in `a` with at least one interior point in common.
pub fn contains(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_contains()
}

/// Whether `a` lies in `b`.
pub fn within(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_within()
}

fn point_segment_distance(p: Coord<f64>, seg: &Line<f64>) -> f64 {
    let d = seg.end - seg.start;
    let len2 = d.x * d.x + d.y * d.y;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - seg.start.x) * d.x + (p.y - seg.start.y) * d.y) / len2).clamp(0.0, 1.0)
    };
    let proj = Coord {
        x: seg.start.x + t * d.x,
        y: seg.start.y + t * d.y,
    };
    ((p.x - proj.x).powi(2) + (p.y - proj.y).powi(2)).sqrt()
}

fn segment_distance(a: &Line<f64>, b: &Line<f64>) -> f64 {
    if a.start == a.end {
        return point_segment_distance(a.start, b);
    }
    if b.start == b.end {
        return point_segment_distance(b.start, a);
    }
    if a.intersects(b) {
        return 0.0;
    }
    point_segment_distance(a.start, b)
        .min(point_segment_distance(a.end, b))
        .min(point_segment_distance(b.start, a))
        .min(point_segment_distance(b.end, a))
}

/// Segments of a geometry, with points as zero-length segments.
fn segments(geom: &Geometry<f64>) -> Vec<Line<f64>> {
    match geom {
        Geometry::Point(p) => vec![Line::new(p.0, p.0)],
        Geometry::MultiPoint(mp) => mp.0.iter().map(|p| Line::new(p.0, p.0)).collect(),
        Geometry::Line(l) => vec![*l],
        Geometry::LineString(ls) => ls.lines().collect(),
        Geometry::MultiLineString(ml) => ml.0.iter().flat_map(|ls| ls.lines()).collect(),
        Geometry::Polygon(p) => polygon_segments(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().flat_map(polygon_segments).collect(),
        Geometry::Rect(r) => polygon_segments(&r.to_polygon()),
        Geometry::Triangle(t) => polygon_segments(&t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(segments).collect(),
    }
}

fn polygon_segments(p: &Polygon<f64>) -> Vec<Line<f64>> {
    p.exterior()
        .lines()
        .chain(p.interiors().iter().flat_map(|r| r.lines()))
        .collect()
}

/// Planar Euclidean distance; `0` when the geometries intersect. `None`
/// when either side is empty.
pub fn distance(a: &Geometry<f64>, b: &Geometry<f64>) -> Option<f64> {
    if is_empty(a) || is_empty(b) {
        return None;
    }
    if a.intersects(b) {
        return Some(0.0);
    }
    let sa = segments(a);
    let sb = segments(b);
    sa.iter()
        .flat_map(|x| sb.iter().map(move |y| segment_distance(x, y)))
        .min_by(f64::total_cmp)
}

/// Polygonal content of a geometry as a multi-polygon; `None` when the
/// geometry has no polygonal parts.
pub fn polygonal(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mut atoms = Atoms::default();
    atoms.push(geom);
    (!atoms.polygons.is_empty()).then(|| MultiPolygon::new(atoms.polygons))
}

/// Dimension family of a geometry, used to keep clipped output homogeneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Points and multi-points.
    Puntal,
    /// Lines and multi-lines.
    Lineal,
    /// Polygons and multi-polygons.
    Polygonal,
    /// Collections mixing dimensions.
    Mixed,
}

/// Family of a geometry.
pub fn family(geom: &Geometry<f64>) -> Family {
    let mut atoms = Atoms::default();
    atoms.push(geom);
    match (
        atoms.points.is_empty(),
        atoms.lines.is_empty(),
        atoms.polygons.is_empty(),
    ) {
        (false, true, true) => Family::Puntal,
        (true, false, true) => Family::Lineal,
        (true, true, false) => Family::Polygonal,
        _ => Family::Mixed,
    }
}

/// Intersection of a geometry with a polygonal mask; `None` when nothing
/// remains.
pub fn clip_to_mask(geom: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let mut atoms = Atoms::default();
    atoms.push(geom);
    let polygons = if atoms.polygons.is_empty() {
        Vec::new()
    } else {
        MultiPolygon::new(atoms.polygons).intersection(mask).0
    };
    let lines = if atoms.lines.is_empty() {
        Vec::new()
    } else {
        mask.clip(&MultiLineString::new(atoms.lines), false)
            .0
            .into_iter()
            .filter(|l| l.0.len() > 1)
            .collect()
    };
    let mask_geom = Geometry::MultiPolygon(mask.clone());
    let points: Vec<Point<f64>> = atoms
        .points
        .into_iter()
        .filter(|p| mask_geom.intersects(p))
        .collect();
    if polygons.is_empty() && lines.is_empty() && points.is_empty() {
        None
    } else {
        Some(assemble(polygons, lines, points))
    }
}

/// Keep only the parts of `geom` whose family matches `family`.
pub fn keep_family(geom: Geometry<f64>, family: Family) -> Option<Geometry<f64>> {
    let mut atoms = Atoms::default();
    atoms.push(&geom);
    let out = match family {
        Family::Puntal => assemble(vec![], vec![], atoms.points),
        Family::Lineal => assemble(vec![], atoms.lines, vec![]),
        Family::Polygonal => assemble(atoms.polygons, vec![], vec![]),
        Family::Mixed => return Some(geom),
    };
    (!is_empty(&out)).then_some(out)
}

/// Boolean overlay operation on polygonal geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayOp {
    /// Area common to both.
    Intersection,
    /// Area of either.
    Union,
    /// Area of the first not in the second.
    Difference,
    /// Area of exactly one.
    SymmetricDifference,
}

/// Overlay two polygonal geometries; `None` when the result is empty.
pub fn overlay_polygons(
    a: &Geometry<f64>,
    b: &Geometry<f64>,
    op: OverlayOp,
) -> GeometryResult<Option<Geometry<f64>>> {
    let pa = polygonal(a).ok_or(GeometryError::UnsupportedGeometry {
        operation: "overlay",
        geometry_type: geometry_type_name(a),
    })?;
    let pb = polygonal(b).ok_or(GeometryError::UnsupportedGeometry {
        operation: "overlay",
        geometry_type: geometry_type_name(b),
    })?;
    let out = match op {
        OverlayOp::Intersection => pa.intersection(&pb),
        OverlayOp::Union => pa.union(&pb),
        OverlayOp::Difference => pa.difference(&pb),
        OverlayOp::SymmetricDifference => pa.xor(&pb),
    };
    Ok(match out.0.len() {
        0 => None,
        1 => out.0.into_iter().next().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(out)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use geo_types::{line_string, point, polygon, Rect};

    fn square(x0: f64, y0: f64, side: f64) -> Geometry<f64> {
        Rect::new((x0, y0), (x0 + side, y0 + side)).to_polygon().into()
    }

    #[test]
    fn union_of_points_is_sorted_and_deduplicated() -> GeometryResult<()> {
        let geoms: Vec<Geometry<f64>> = vec![
            point!(x: 1.0, y: 1.0).into(),
            point!(x: 0.0, y: 0.0).into(),
            point!(x: 1.0, y: 1.0).into(),
        ];
        let out = union_all(&geoms, UnionMethod::Unary, None)?;
        assert_eq!(
            out,
            Geometry::MultiPoint(MultiPoint::new(vec![
                point!(x: 0.0, y: 0.0),
                point!(x: 1.0, y: 1.0)
            ]))
        );
        Ok(())
    }

    #[test]
    fn single_point_union_stays_a_point() -> GeometryResult<()> {
        let geoms: Vec<Geometry<f64>> = vec![point!(x: 2.0, y: 2.0).into()];
        assert_eq!(
            union_all(&geoms, UnionMethod::Unary, None)?,
            Geometry::Point(point!(x: 2.0, y: 2.0))
        );
        Ok(())
    }

    #[test]
    fn overlapping_squares_merge_for_every_method() -> GeometryResult<()> {
        let geoms = vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)];
        for method in [
            UnionMethod::Unary,
            UnionMethod::Coverage,
            UnionMethod::DisjointSubset,
        ] {
            let out = union_all(&geoms, method, None)?;
            assert!(matches!(out, Geometry::Polygon(_)), "{method}");
            assert!((out.unsigned_area() - 7.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn disjoint_inputs_stay_separate() -> GeometryResult<()> {
        let geoms = vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)];
        let out = union_all(&geoms, UnionMethod::DisjointSubset, None)?;
        match out {
            Geometry::MultiPolygon(mp) => assert_eq!(mp.0.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn points_inside_polygons_are_absorbed() -> GeometryResult<()> {
        let geoms = vec![square(0.0, 0.0, 2.0), point!(x: 1.0, y: 1.0).into()];
        let out = union_all(&geoms, UnionMethod::Unary, None)?;
        assert!(matches!(out, Geometry::Polygon(_)));
        Ok(())
    }

    #[test]
    fn empty_union_is_an_empty_collection() -> GeometryResult<()> {
        let out = union_all(std::iter::empty(), UnionMethod::Unary, None)?;
        assert_eq!(out, Geometry::GeometryCollection(GeometryCollection(vec![])));
        Ok(())
    }

    #[test]
    fn grid_size_is_validated() {
        let geoms = vec![square(0.0, 0.0, 1.0)];
        assert!(matches!(
            union_all(&geoms, UnionMethod::Coverage, Some(0.1)),
            Err(GeometryError::GridSizeUnsupported { .. })
        ));
        assert!(matches!(
            union_all(&geoms, UnionMethod::Unary, Some(-1.0)),
            Err(GeometryError::InvalidGridSize { .. })
        ));
        assert!(union_all(&geoms, UnionMethod::Unary, Some(0.5)).is_ok());
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("disjoint-subset".parse(), Ok(UnionMethod::DisjointSubset));
        assert_eq!("Coverage".parse(), Ok(UnionMethod::Coverage));
        assert!("fast".parse::<UnionMethod>().is_err());
    }

    #[test]
    fn parts_do_not_recurse() {
        let mp: Geometry<f64> =
            MultiPoint::new(vec![point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 0.0)]).into();
        assert_eq!(parts(&mp).len(), 2);
        let single: Geometry<f64> = point!(x: 0.0, y: 0.0).into();
        assert_eq!(parts(&single), vec![single.clone()]);
    }

    #[test]
    fn planar_distance() {
        let a: Geometry<f64> = point!(x: 0.0, y: 0.0).into();
        let b: Geometry<f64> = line_string![(x: 3.0, y: -1.0), (x: 3.0, y: 1.0)].into();
        assert_eq!(distance(&a, &b), Some(3.0));
        let inside: Geometry<f64> = point!(x: 0.5, y: 0.5).into();
        assert_eq!(distance(&inside, &square(0.0, 0.0, 1.0)), Some(0.0));
    }

    #[test]
    fn clipping_keeps_only_the_masked_part() {
        let mask = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)
        ]]);
        let line: Geometry<f64> = line_string![(x: -1.0, y: 1.0), (x: 3.0, y: 1.0)].into();
        let clipped = clip_to_mask(&line, &mask);
        assert_eq!(clipped.as_ref().map(family), Some(Family::Lineal));
        let outside: Geometry<f64> = point!(x: 9.0, y: 9.0).into();
        assert_eq!(clip_to_mask(&outside, &mask), None);
    }

    #[test]
    fn predicates() {
        let big = square(0.0, 0.0, 4.0);
        let small = square(1.0, 1.0, 1.0);
        assert!(contains(&big, &small));
        assert!(within(&small, &big));
        assert!(intersects(&big, &small));
        assert!(!contains(&small, &big));
    }
}
