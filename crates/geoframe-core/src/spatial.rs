//! Spatial composition of geometry-aware tables.
//!
//! - [`sjoin`]: predicate and nearest-neighbour joins,
//! - [`clip`]: cut a table to a polygonal mask,
//! - [`overlay`]: set-theoretic overlay of two polygon tables.
//!
//! All operations compare the active geometry columns of their inputs and
//! derive the result through the regular propagation rules.

pub mod clip;
pub mod overlay;
pub mod sjoin;

pub use clip::{ClipMask, ClipOptions};
pub use overlay::{OverlayHow, OverlayOptions};
pub use sjoin::{Predicate, SjoinHow, SjoinNearestOptions, SjoinOptions};

use std::collections::HashSet;

use log::warn;

use crate::{
    crs::{display_opt, Crs},
    frame::{Column, ColumnData, DataFrame, Index},
    geo_frame::GeoFrameResult,
    value::Value,
};

/// Log a warning when two operands disagree on CRS.
pub(crate) fn check_crs(operation: &str, left: Option<&Crs>, right: Option<&Crs>) {
    if left != right {
        warn!(
            "CRS mismatch between the CRS of left geometries and the CRS of right geometries in \
             {operation}. Use `to_crs()` to reproject one of the input geometries to match the \
             CRS of the other. Left CRS: {}, right CRS: {}",
            display_opt(left),
            display_opt(right)
        );
    }
}

/// Every column of `frame` gathered at `rows`, minus `exclude`.
pub(crate) fn gather(
    frame: &DataFrame,
    rows: &[Option<usize>],
    exclude: Option<&str>,
) -> GeoFrameResult<Vec<Column>> {
    frame
        .columns()
        .iter()
        .filter(|c| Some(c.name.as_str()) != exclude)
        .map(|c| Ok(Column::new(c.name.as_str(), c.data.take(rows)?)))
        .collect()
}

/// Append suffixes to names present on both sides.
///
/// `keep` names one column per side that is never renamed.
pub(crate) fn apply_suffixes(
    left: &mut [Column],
    right: &mut [Column],
    suffixes: (&str, &str),
    keep: (Option<&str>, Option<&str>),
) {
    let left_names: HashSet<String> = left.iter().map(|c| c.name.clone()).collect();
    let right_names: HashSet<String> = right.iter().map(|c| c.name.clone()).collect();
    for col in left.iter_mut() {
        if right_names.contains(&col.name) && Some(col.name.as_str()) != keep.0 {
            col.name = format!("{}{}", col.name, suffixes.0);
        }
    }
    for col in right.iter_mut() {
        if left_names.contains(&col.name) && Some(col.name.as_str()) != keep.1 {
            col.name = format!("{}{}", col.name, suffixes.1);
        }
    }
}

/// Index labels gathered at `rows` as ordinary columns.
///
/// Unnamed levels are called `prefix` (single level) or `prefix{n}`.
pub(crate) fn index_columns(
    index: &Index,
    rows: &[Option<usize>],
    prefix: &str,
) -> GeoFrameResult<Vec<Column>> {
    let nlevels = index.nlevels();
    (0..nlevels)
        .map(|level| {
            let labels = index.level(level)?;
            let values = rows
                .iter()
                .map(|row| {
                    row.and_then(|r| labels.get(r).cloned())
                        .map_or(Value::Null, Value::from)
                })
                .collect();
            let name = match &index.names()[level] {
                Some(name) => name.clone(),
                None if nlevels == 1 => prefix.to_string(),
                None => format!("{prefix}{level}"),
            };
            Ok(Column::new(name, ColumnData::from_values(values)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Label;

    #[test]
    fn suffixes_skip_kept_columns() {
        let mut left = vec![Column::new("v", vec![1_i64]), Column::new("geometry", vec![0_i64])];
        let mut right = vec![Column::new("v", vec![2_i64]), Column::new("geometry", vec![0_i64])];
        apply_suffixes(&mut left, &mut right, ("_left", "_right"), (Some("geometry"), None));
        let names: Vec<&str> = left.iter().chain(&right).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["v_left", "geometry", "v_right", "geometry_right"]);
    }

    #[test]
    fn index_columns_name_unnamed_levels() -> GeoFrameResult<()> {
        let index = Index::from_labels(None, vec![Label::Int(5), Label::Int(7)]);
        let cols = index_columns(&index, &[Some(1), None], "index_right")?;
        assert_eq!(cols[0].name, "index_right");
        assert_eq!(cols[0].data.value(0), Value::Int(7));
        assert_eq!(cols[0].data.value(1), Value::Null);
        Ok(())
    }
}
