//! Spatial joins.

use std::{fmt, str::FromStr, sync::Arc};

use arrow::array::Float64Array;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::{
    frame::{Column, ColumnData, DataFrame},
    geo_frame::{
        propagate::{reconstruct, Derivation},
        GeoDataFrame, GeoFrameError, GeoFrameResult, Table,
    },
    geometry::{kernel, GeometryArray},
};

use super::{apply_suffixes, check_crs, gather, index_columns};

/// Binary predicate evaluated as `predicate(left, right)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Any shared point.
    #[default]
    Intersects,
    /// Right lies inside left.
    Contains,
    /// Left lies inside right.
    Within,
}

impl Predicate {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Intersects => "intersects",
            Predicate::Contains => "contains",
            Predicate::Within => "within",
        }
    }

    fn eval(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        match self {
            Predicate::Intersects => kernel::intersects(left, right),
            Predicate::Contains => kernel::contains(left, right),
            Predicate::Within => kernel::within(left, right),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Predicate {
    type Err = GeoFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intersects" => Ok(Predicate::Intersects),
            "contains" => Ok(Predicate::Contains),
            "within" => Ok(Predicate::Within),
            other => Err(GeoFrameError::InvalidArgument {
                message: format!(
                    "predicate must be one of intersects, contains or within, got {other:?}"
                ),
            }),
        }
    }
}

/// Which side's rows and geometry survive a spatial join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SjoinHow {
    /// Matched pairs only; left geometry and index.
    #[default]
    Inner,
    /// Every left row; left geometry and index.
    Left,
    /// Every right row; right geometry and index.
    Right,
}

impl FromStr for SjoinHow {
    type Err = GeoFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inner" => Ok(SjoinHow::Inner),
            "left" => Ok(SjoinHow::Left),
            "right" => Ok(SjoinHow::Right),
            other => Err(GeoFrameError::InvalidArgument {
                message: format!("how must be one of inner, left or right, got {other:?}"),
            }),
        }
    }
}

/// Options for [`GeoDataFrame::sjoin`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SjoinOptions {
    /// Join type.
    pub how: SjoinHow,
    /// Match condition.
    pub predicate: Predicate,
    /// Suffix for overlapping left column names.
    pub lsuffix: String,
    /// Suffix for overlapping right column names.
    pub rsuffix: String,
}

impl Default for SjoinOptions {
    fn default() -> Self {
        Self {
            how: SjoinHow::Inner,
            predicate: Predicate::Intersects,
            lsuffix: "left".to_string(),
            rsuffix: "right".to_string(),
        }
    }
}

impl SjoinOptions {
    /// Set the join type.
    pub fn with_how(mut self, how: SjoinHow) -> Self {
        self.how = how;
        self
    }

    /// Set the predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Set both suffixes.
    pub fn with_suffixes(mut self, left: &str, right: &str) -> Self {
        self.lsuffix = left.to_string();
        self.rsuffix = right.to_string();
        self
    }
}

/// Options for [`GeoDataFrame::sjoin_nearest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SjoinNearestOptions {
    /// Join type. `Right` searches from each right row.
    pub how: SjoinHow,
    /// Ignore candidates farther than this; must be positive.
    pub max_distance: Option<f64>,
    /// Suffix for overlapping left column names.
    pub lsuffix: String,
    /// Suffix for overlapping right column names.
    pub rsuffix: String,
    /// Name of a column receiving the match distance.
    pub distance_col: Option<String>,
    /// Skip candidates equal to the query geometry.
    pub exclusive: bool,
}

impl Default for SjoinNearestOptions {
    fn default() -> Self {
        Self {
            how: SjoinHow::Inner,
            max_distance: None,
            lsuffix: "left".to_string(),
            rsuffix: "right".to_string(),
            distance_col: None,
            exclusive: false,
        }
    }
}

impl SjoinNearestOptions {
    /// Set the join type.
    pub fn with_how(mut self, how: SjoinHow) -> Self {
        self.how = how;
        self
    }

    /// Bound the search radius.
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    /// Report distances in `name`.
    pub fn with_distance_col(mut self, name: &str) -> Self {
        self.distance_col = Some(name.to_string());
        self
    }

    /// Skip equal geometries.
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

/// Row pairs `(left, right)` of a join; `None` is an unmatched side.
type Pairs = Vec<(Option<usize>, Option<usize>)>;

impl GeoDataFrame {
    /// Join rows whose active geometries satisfy a predicate.
    ///
    /// The result keeps the geometry and index of the preserved side and
    /// records the other side's index labels in `index_right` (or
    /// `index_left` for a right join). Overlapping column names get
    /// `_{lsuffix}` / `_{rsuffix}`. Rows are ordered by the preserved side,
    /// then by the other side.
    pub fn sjoin(&self, right: &GeoDataFrame, opts: &SjoinOptions) -> GeoFrameResult<Table> {
        let (lvalues, rvalues) = (self.active_array()?, right.active_array()?);
        check_crs("sjoin", lvalues.crs(), rvalues.crs());

        let pairs = match opts.how {
            SjoinHow::Inner | SjoinHow::Left => {
                let hits = |l: &Geometry<f64>, r: &Geometry<f64>| opts.predicate.eval(l, r);
                match_rows(lvalues, rvalues, hits, opts.how == SjoinHow::Left)
            }
            SjoinHow::Right => {
                let hits = |r: &Geometry<f64>, l: &Geometry<f64>| opts.predicate.eval(l, r);
                flip(match_rows(rvalues, lvalues, hits, true))
            }
        };
        log::debug!("sjoin ({}) matched {} rows", opts.predicate, pairs.len());
        assemble(self, right, &pairs, opts.how, (&opts.lsuffix, &opts.rsuffix), None)
    }

    /// Join each row to its nearest row on the other side.
    ///
    /// Equidistant candidates all match, so a row may appear several
    /// times. Rows without a candidate (missing geometry, or nothing within
    /// `max_distance`) are dropped by an inner join and kept with missing
    /// values otherwise.
    pub fn sjoin_nearest(
        &self,
        right: &GeoDataFrame,
        opts: &SjoinNearestOptions,
    ) -> GeoFrameResult<Table> {
        if let Some(max) = opts.max_distance {
            if !(max > 0.0) {
                return Err(GeoFrameError::InvalidArgument {
                    message: format!("max_distance must be greater than 0, got {max}"),
                });
            }
        }
        let (lvalues, rvalues) = (self.active_array()?, right.active_array()?);
        check_crs("sjoin_nearest", lvalues.crs(), rvalues.crs());

        let (query, tree) = match opts.how {
            SjoinHow::Right => (rvalues, lvalues),
            SjoinHow::Inner | SjoinHow::Left => (lvalues, rvalues),
        };
        let mut pairs = Vec::new();
        let mut distances = Vec::new();
        for (q, geom) in query.iter().enumerate() {
            let found = geom.map(|g| nearest(g, tree, opts)).unwrap_or_default();
            if found.is_empty() {
                if opts.how != SjoinHow::Inner {
                    pairs.push((Some(q), None));
                    distances.push(None);
                }
                continue;
            }
            for (t, d) in found {
                pairs.push((Some(q), Some(t)));
                distances.push(Some(d));
            }
        }
        let pairs = match opts.how {
            SjoinHow::Right => flip(pairs),
            SjoinHow::Inner | SjoinHow::Left => pairs,
        };
        let distance = opts
            .distance_col
            .as_deref()
            .map(|name| Column::new(name, ColumnData::Array(Arc::new(Float64Array::from(distances)))));
        assemble(self, right, &pairs, opts.how, (&opts.lsuffix, &opts.rsuffix), distance)
    }
}

/// For every row of `query`, the rows of `other` that `hits` accepts.
fn match_rows<F>(query: &GeometryArray, other: &GeometryArray, hits: F, keep_unmatched: bool) -> Pairs
where
    F: Fn(&Geometry<f64>, &Geometry<f64>) -> bool,
{
    let mut pairs = Vec::new();
    for (q, geom) in query.iter().enumerate() {
        let matched: Vec<usize> = match geom {
            Some(g) => other
                .iter()
                .enumerate()
                .filter_map(|(o, candidate)| candidate.filter(|c| hits(g, c)).map(|_| o))
                .collect(),
            None => Vec::new(),
        };
        if matched.is_empty() {
            if keep_unmatched {
                pairs.push((Some(q), None));
            }
        } else {
            pairs.extend(matched.into_iter().map(|o| (Some(q), Some(o))));
        }
    }
    pairs
}

fn flip(pairs: Pairs) -> Pairs {
    pairs.into_iter().map(|(a, b)| (b, a)).collect()
}

/// Rows of `tree` at minimum distance from `geom`, with that distance.
fn nearest(geom: &Geometry<f64>, tree: &GeometryArray, opts: &SjoinNearestOptions) -> Vec<(usize, f64)> {
    let mut best = Vec::new();
    let mut min = f64::INFINITY;
    for (i, candidate) in tree.iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        if opts.exclusive && candidate == geom {
            continue;
        }
        let Some(d) = kernel::distance(geom, candidate) else { continue };
        if opts.max_distance.is_some_and(|max| d > max) {
            continue;
        }
        if d < min {
            min = d;
            best.clear();
            best.push((i, d));
        } else if d == min {
            best.push((i, d));
        }
    }
    best
}

fn assemble(
    left: &GeoDataFrame,
    right: &GeoDataFrame,
    pairs: &[(Option<usize>, Option<usize>)],
    how: SjoinHow,
    suffixes: (&str, &str),
    extra: Option<Column>,
) -> GeoFrameResult<Table> {
    let lrows: Vec<Option<usize>> = pairs.iter().map(|p| p.0).collect();
    let rrows: Vec<Option<usize>> = pairs.iter().map(|p| p.1).collect();
    let (lname, rname) = (left.active.as_deref(), right.active.as_deref());
    let suffixes = (format!("_{}", suffixes.0), format!("_{}", suffixes.1));
    let suffixes = (suffixes.0.as_str(), suffixes.1.as_str());
    let (ltable, rtable) = (Table::Geo(left.clone()), Table::Geo(right.clone()));

    let (frame, derivation) = match how {
        SjoinHow::Inner | SjoinHow::Left => {
            let mut lcols = gather(&left.frame, &lrows, None)?;
            let mut rcols = gather(&right.frame, &rrows, rname)?;
            apply_suffixes(&mut lcols, &mut rcols, suffixes, (lname, None));
            let positions: Vec<usize> = lrows.iter().flatten().copied().collect();
            let mut columns = lcols;
            columns.extend(index_columns(right.frame.index(), &rrows, "index_right")?);
            columns.extend(rcols);
            columns.extend(extra);
            let frame = DataFrame::new(left.frame.index().take(&positions), columns)?;
            (
                frame,
                Derivation::Merge {
                    left: &ltable,
                    right: &rtable,
                },
            )
        }
        SjoinHow::Right => {
            let mut lcols = gather(&left.frame, &lrows, lname)?;
            let mut rcols = gather(&right.frame, &rrows, None)?;
            apply_suffixes(&mut lcols, &mut rcols, suffixes, (None, rname));
            let positions: Vec<usize> = rrows.iter().flatten().copied().collect();
            let mut columns = index_columns(left.frame.index(), &lrows, "index_left")?;
            columns.extend(lcols);
            columns.extend(rcols);
            columns.extend(extra);
            let frame = DataFrame::new(right.frame.index().take(&positions), columns)?;
            (
                frame,
                Derivation::Merge {
                    left: &rtable,
                    right: &ltable,
                },
            )
        }
    };
    reconstruct(frame, derivation)
}
