//! Multi-table and reshaping operations: concat, merge, index join, list
//! explode, unstack, transpose and apply.

use std::collections::{HashMap, HashSet};

use arrow::{
    array::{Array, AsArray},
    datatypes::DataType,
};
use serde::{Deserialize, Serialize};

use crate::value::{format_key, Label, Value};

use super::{
    column::ColumnData,
    error::{FrameError, FrameResult},
    index::Index,
    Column, DataFrame, Series,
};

/// Which keys survive a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    /// Keys present on both sides.
    #[default]
    Inner,
    /// Every left row.
    Left,
    /// Every right row.
    Right,
    /// Every row of either side.
    Outer,
}

/// Options for [`DataFrame::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Key columns of the left table.
    pub left_on: Vec<String>,
    /// Key columns of the right table.
    pub right_on: Vec<String>,
    /// Join type.
    pub how: JoinHow,
    /// Suffixes for overlapping non-key column names.
    pub suffixes: (String, String),
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            left_on: Vec::new(),
            right_on: Vec::new(),
            how: JoinHow::Inner,
            suffixes: ("_x".to_string(), "_y".to_string()),
        }
    }
}

impl MergeOptions {
    /// Join on columns with the same names on both sides.
    pub fn on<I, S>(cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cols: Vec<String> = cols.into_iter().map(Into::into).collect();
        Self {
            left_on: cols.clone(),
            right_on: cols,
            ..Self::default()
        }
    }

    /// Set the join type.
    pub fn with_how(mut self, how: JoinHow) -> Self {
        self.how = how;
        self
    }

    /// Set the suffixes.
    pub fn with_suffixes(mut self, left: &str, right: &str) -> Self {
        self.suffixes = (left.to_string(), right.to_string());
        self
    }
}

/// Row pairs `(left, right)` produced by matching keys.
fn match_keys(
    left: &[Vec<Label>],
    right: &[Vec<Label>],
    how: JoinHow,
) -> Vec<(Option<usize>, Option<usize>)> {
    let mut pairs = Vec::new();
    match how {
        JoinHow::Right => {
            let mut by_key: HashMap<&[Label], Vec<usize>> = HashMap::new();
            for (i, k) in left.iter().enumerate() {
                by_key.entry(k.as_slice()).or_default().push(i);
            }
            for (j, k) in right.iter().enumerate() {
                match by_key.get(k.as_slice()) {
                    Some(ls) => pairs.extend(ls.iter().map(|&i| (Some(i), Some(j)))),
                    None => pairs.push((None, Some(j))),
                }
            }
        }
        _ => {
            let mut by_key: HashMap<&[Label], Vec<usize>> = HashMap::new();
            for (j, k) in right.iter().enumerate() {
                by_key.entry(k.as_slice()).or_default().push(j);
            }
            let mut used = vec![false; right.len()];
            for (i, k) in left.iter().enumerate() {
                match by_key.get(k.as_slice()) {
                    Some(rs) => {
                        for &j in rs {
                            used[j] = true;
                            pairs.push((Some(i), Some(j)));
                        }
                    }
                    None if how != JoinHow::Inner => pairs.push((Some(i), None)),
                    None => {}
                }
            }
            if how == JoinHow::Outer {
                pairs.extend(
                    used.iter()
                        .enumerate()
                        .filter(|(_, u)| !**u)
                        .map(|(j, _)| (None, Some(j))),
                );
            }
        }
    }
    pairs
}

/// Values from `left` where present, otherwise from `right`.
fn coalesce(
    left: &ColumnData,
    right: &ColumnData,
    pairs: &[(Option<usize>, Option<usize>)],
) -> FrameResult<ColumnData> {
    if pairs.iter().all(|(l, _)| l.is_some()) {
        let idx: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
        return left.take(&idx);
    }
    Ok(ColumnData::from_values(
        pairs
            .iter()
            .map(|(l, r)| match (l, r) {
                (Some(i), _) => left.value(*i),
                (None, Some(j)) => right.value(*j),
                (None, None) => Value::Null,
            })
            .collect(),
    ))
}

fn key_labels(frame: &DataFrame, cols: &[String]) -> FrameResult<Vec<Vec<Label>>> {
    let per_col = cols
        .iter()
        .map(|c| frame.column_labels(c))
        .collect::<FrameResult<Vec<_>>>()?;
    Ok((0..frame.nrows())
        .map(|i| per_col.iter().map(|c| c[i].clone()).collect())
        .collect())
}

impl DataFrame {
    /// Stack tables vertically.
    ///
    /// Tables with identical column layouts are stacked positionally (so
    /// duplicate names are kept); otherwise columns are aligned by name and
    /// missing ones are filled with nulls of the present dtype.
    pub fn concat_rows(frames: &[&DataFrame]) -> FrameResult<DataFrame> {
        let Some(first) = frames.first() else {
            return Ok(DataFrame::empty());
        };
        let index = Index::concat(&frames.iter().map(|f| &f.index).collect::<Vec<_>>())?;
        let same_layout = frames
            .windows(2)
            .all(|w| w[0].column_names() == w[1].column_names());

        let mut columns = Vec::new();
        if same_layout {
            for (pos, col) in first.columns.iter().enumerate() {
                let parts: Vec<&ColumnData> = frames.iter().map(|f| &f.columns[pos].data).collect();
                columns.push(Column {
                    name: col.name.clone(),
                    data: ColumnData::concat(&parts)?,
                });
            }
            return DataFrame::new(index, columns);
        }

        let mut names: Vec<&str> = Vec::new();
        for f in frames {
            if let Some(dup) = f.duplicated_names().first() {
                return Err(FrameError::DuplicateColumnName {
                    name: (*dup).to_string(),
                    operation: "concat",
                });
            }
            for n in f.column_names() {
                if !names.contains(&n) {
                    names.push(n);
                }
            }
        }
        for name in names {
            let template = frames
                .iter()
                .find_map(|f| f.column(name).ok())
                .ok_or_else(|| FrameError::ColumnNotFound {
                    name: name.to_string(),
                })?;
            let filled: Vec<ColumnData> = frames
                .iter()
                .map(|f| match f.column(name) {
                    Ok(d) => d.clone(),
                    Err(_) => template.nulls_like(f.nrows()),
                })
                .collect();
            let parts: Vec<&ColumnData> = filled.iter().collect();
            columns.push(Column::new(name, ColumnData::concat(&parts)?));
        }
        DataFrame::new(index, columns)
    }

    /// Place tables side by side, aligning rows on the index (outer join of
    /// the row labels). Column names are kept as they are, duplicates
    /// included.
    pub fn concat_columns(frames: &[&DataFrame]) -> FrameResult<DataFrame> {
        let Some(first) = frames.first() else {
            return Ok(DataFrame::empty());
        };
        if frames.iter().all(|f| f.index == first.index) {
            let columns = frames.iter().flat_map(|f| f.columns.iter().cloned()).collect();
            return DataFrame::new(first.index.clone(), columns);
        }

        let mut keys: Vec<Vec<Label>> = Vec::new();
        let mut seen: HashSet<Vec<Label>> = HashSet::new();
        for f in frames {
            for k in f.index.keys() {
                if seen.insert(k.clone()) {
                    keys.push(k.clone());
                }
            }
        }
        let index = Index::from_keys(first.index.names().to_vec(), keys)?;
        let mut columns = Vec::new();
        for f in frames {
            let positions = f.index.positions("concat")?;
            let idx: Vec<Option<usize>> = index
                .keys()
                .iter()
                .map(|k| positions.get(k.as_slice()).copied())
                .collect();
            for c in &f.columns {
                columns.push(Column {
                    name: c.name.clone(),
                    data: c.data.take(&idx)?,
                });
            }
        }
        DataFrame::new(index, columns)
    }

    /// Database-style join on key columns. The result has a fresh range
    /// index.
    pub fn merge(&self, right: &DataFrame, opts: &MergeOptions) -> FrameResult<DataFrame> {
        if opts.left_on.len() != opts.right_on.len() {
            return Err(FrameError::LengthMismatch {
                what: "right_on".to_string(),
                expected: opts.left_on.len(),
                found: opts.right_on.len(),
            });
        }
        let lkeys = key_labels(self, &opts.left_on)?;
        let rkeys = key_labels(right, &opts.right_on)?;
        let pairs = match_keys(&lkeys, &rkeys, opts.how);
        let lidx: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
        let ridx: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();

        // Keys shared by name appear once, coalesced from both sides.
        let shared: Vec<(&str, &str)> = opts
            .left_on
            .iter()
            .zip(&opts.right_on)
            .filter(|(l, r)| l == r)
            .map(|(l, r)| (l.as_str(), r.as_str()))
            .collect();
        let is_shared_left = |n: &str| shared.iter().any(|(l, _)| *l == n);
        let is_shared_right = |n: &str| shared.iter().any(|(_, r)| *r == n);

        let left_names: HashSet<&str> = self
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| !is_shared_left(*n))
            .collect();
        let right_names: HashSet<&str> = right
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| !is_shared_right(*n))
            .collect();

        let mut columns = Vec::with_capacity(self.ncols() + right.ncols());
        for c in &self.columns {
            if is_shared_left(c.name.as_str()) {
                let other = right.column(&c.name)?;
                columns.push(Column {
                    name: c.name.clone(),
                    data: coalesce(&c.data, other, &pairs)?,
                });
                continue;
            }
            let name = if right_names.contains(c.name.as_str()) {
                format!("{}{}", c.name, opts.suffixes.0)
            } else {
                c.name.clone()
            };
            columns.push(Column {
                name,
                data: c.data.take(&lidx)?,
            });
        }
        for c in &right.columns {
            if is_shared_right(c.name.as_str()) {
                continue;
            }
            let name = if left_names.contains(c.name.as_str()) {
                format!("{}{}", c.name, opts.suffixes.1)
            } else {
                c.name.clone()
            };
            columns.push(Column {
                name,
                data: c.data.take(&ridx)?,
            });
        }
        DataFrame::new(Index::range(pairs.len()), columns)
    }

    /// Join another table on the row index. Overlapping column names are
    /// rejected.
    pub fn join(&self, right: &DataFrame, how: JoinHow) -> FrameResult<DataFrame> {
        for c in &right.columns {
            if self.contains(&c.name) {
                return Err(FrameError::DuplicateColumnName {
                    name: c.name.clone(),
                    operation: "join",
                });
            }
        }
        let pairs = match_keys(self.index.keys(), right.index.keys(), how);
        let keys = pairs
            .iter()
            .map(|(l, r)| match (l, r) {
                (Some(i), _) => self.index.keys()[*i].clone(),
                (None, Some(j)) => right.index.keys()[*j].clone(),
                (None, None) => Vec::new(),
            })
            .collect();
        let index = Index::from_keys(self.index.names().to_vec(), keys)?;
        let lidx: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
        let ridx: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();
        let mut columns = Vec::with_capacity(self.ncols() + right.ncols());
        for c in &self.columns {
            columns.push(Column {
                name: c.name.clone(),
                data: c.data.take(&lidx)?,
            });
        }
        for c in &right.columns {
            columns.push(Column {
                name: c.name.clone(),
                data: c.data.take(&ridx)?,
            });
        }
        DataFrame::new(index, columns)
    }

    /// Expand list-valued cells of `column` into one row each, repeating
    /// the other columns and the index. Empty and missing lists produce a
    /// single missing value. Non-list columns are returned unchanged.
    pub fn explode(&self, column: &str, ignore_index: bool) -> FrameResult<DataFrame> {
        let data = self.column(column)?;
        let lists: Option<Vec<Vec<Value>>> = match data {
            ColumnData::Array(a) => match a.data_type() {
                DataType::List(_) => {
                    let list = a.as_list::<i32>();
                    Some(
                        (0..list.len())
                            .map(|i| {
                                if list.is_null(i) {
                                    Vec::new()
                                } else {
                                    ColumnData::Array(list.value(i)).to_values()
                                }
                            })
                            .collect(),
                    )
                }
                DataType::LargeList(_) => {
                    let list = a.as_list::<i64>();
                    Some(
                        (0..list.len())
                            .map(|i| {
                                if list.is_null(i) {
                                    Vec::new()
                                } else {
                                    ColumnData::Array(list.value(i)).to_values()
                                }
                            })
                            .collect(),
                    )
                }
                _ => None,
            },
            _ => None,
        };
        let Some(lists) = lists else {
            let mut out = self.clone();
            if ignore_index {
                out.index = Index::range(out.nrows());
            }
            return Ok(out);
        };

        let mut positions = Vec::new();
        let mut values = Vec::new();
        for (row, items) in lists.into_iter().enumerate() {
            if items.is_empty() {
                positions.push(row);
                values.push(Value::Null);
            } else {
                positions.extend(std::iter::repeat(row).take(items.len()));
                values.extend(items);
            }
        }
        let mut out = self.take(&positions)?;
        for c in out.columns.iter_mut().filter(|c| c.name == column) {
            c.data = ColumnData::from_values(values.clone());
        }
        if ignore_index {
            out.index = Index::range(out.nrows());
        }
        Ok(out)
    }

    /// Pivot the innermost index level into the columns. Output columns are
    /// named `(column, label)`; outer keys and inner labels are sorted.
    pub fn unstack(&self) -> FrameResult<DataFrame> {
        let nlevels = self.index.nlevels();
        if nlevels < 2 {
            return Err(FrameError::NotMultiIndex { nlevels });
        }
        let mut outer: Vec<Vec<Label>> = Vec::new();
        let mut inner: Vec<Label> = Vec::new();
        let mut cells: HashMap<(Vec<Label>, Label), usize> = HashMap::new();
        for (i, key) in self.index.keys().iter().enumerate() {
            let (o, l) = key.split_at(nlevels - 1);
            let o = o.to_vec();
            let l = l[0].clone();
            if !outer.contains(&o) {
                outer.push(o.clone());
            }
            if !inner.contains(&l) {
                inner.push(l.clone());
            }
            if cells.insert((o, l), i).is_some() {
                return Err(FrameError::DuplicateLabels {
                    operation: "unstack",
                });
            }
        }
        outer.sort();
        inner.sort();

        let mut columns = Vec::with_capacity(self.ncols() * inner.len());
        for c in &self.columns {
            for l in &inner {
                let idx: Vec<Option<usize>> = outer
                    .iter()
                    .map(|o| cells.get(&(o.clone(), l.clone())).copied())
                    .collect();
                columns.push(Column {
                    name: format_key(&[Label::from(c.name.as_str()), l.clone()]),
                    data: c.data.take(&idx)?,
                });
            }
        }
        let names = self.index.names()[..nlevels - 1].to_vec();
        DataFrame::new(Index::from_keys(names, outer)?, columns)
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> FrameResult<DataFrame> {
        let mut columns = Vec::with_capacity(self.nrows());
        for i in 0..self.nrows() {
            let row = self.row(i)?;
            columns.push(Column {
                name: row.name.unwrap_or_else(|| i.to_string()),
                data: row.data,
            });
        }
        DataFrame::new(self.columns_index(), columns)
    }

    /// Apply `f` to every row, producing one value per row.
    pub fn apply_rows_to_values<F>(&self, mut f: F) -> FrameResult<Series>
    where
        F: FnMut(&Series) -> FrameResult<Value>,
    {
        let mut values = Vec::with_capacity(self.nrows());
        for i in 0..self.nrows() {
            values.push(f(&self.row(i)?)?);
        }
        Ok(Series {
            name: None,
            index: self.index.clone(),
            data: ColumnData::from_values(values),
        })
    }

    /// Apply `f` to every row, expanding each returned row into columns.
    /// Output columns are the union of the returned labels, in order of first
    /// appearance; values are re-inferred per column.
    pub fn apply_rows<F>(&self, mut f: F) -> FrameResult<DataFrame>
    where
        F: FnMut(&Series) -> FrameResult<Series>,
    {
        let mut rows = Vec::with_capacity(self.nrows());
        let mut names: Vec<String> = Vec::new();
        for i in 0..self.nrows() {
            let out = f(&self.row(i)?)?;
            for key in out.index.keys() {
                let name = format_key(key);
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            rows.push(out);
        }
        let columns = names
            .iter()
            .map(|name| {
                let values = rows
                    .iter()
                    .map(|r| {
                        r.index
                            .keys()
                            .iter()
                            .position(|k| format_key(k) == *name)
                            .map_or(Value::Null, |p| r.value(p))
                    })
                    .collect();
                Column::new(name.as_str(), ColumnData::from_values(values))
            })
            .collect();
        DataFrame::new(self.index.clone(), columns)
    }

    /// Apply `f` to every column. Results keep their storage and must share
    /// one length; the result index is taken from the first column result.
    pub fn apply_columns<F>(&self, mut f: F) -> FrameResult<DataFrame>
    where
        F: FnMut(&Series) -> FrameResult<Series>,
    {
        let mut index: Option<Index> = None;
        let mut columns = Vec::with_capacity(self.ncols());
        for pos in 0..self.ncols() {
            let out = f(&self.get_at(pos)?)?;
            let index = index.get_or_insert_with(|| out.index.clone());
            if out.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    what: format!("result for column {:?}", self.columns[pos].name),
                    expected: index.len(),
                    found: out.len(),
                });
            }
            columns.push(Column {
                name: self.columns[pos].name.clone(),
                data: out.data,
            });
        }
        DataFrame::new(index.unwrap_or_else(|| self.index.clone()), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::{
        array::{ArrayRef, ListArray},
        datatypes::Int64Type,
    };

    fn people() -> FrameResult<DataFrame> {
        DataFrame::from_columns(vec![
            Column::new("id", vec![1_i64, 2, 3]),
            Column::new("name", vec!["ann", "bob", "cy"]),
        ])
    }

    fn scores() -> FrameResult<DataFrame> {
        DataFrame::from_columns(vec![
            Column::new("id", vec![2_i64, 3, 4]),
            Column::new("name", vec!["B", "C", "D"]),
        ])
    }

    #[test]
    fn merge_inner_suffixes_overlaps() -> FrameResult<()> {
        let out = people()?.merge(&scores()?, &MergeOptions::on(["id"]))?;
        assert_eq!(out.column_names(), vec!["id", "name_x", "name_y"]);
        assert_eq!(out.nrows(), 2);
        assert!(out.index().is_range());
        Ok(())
    }

    #[test]
    fn merge_outer_coalesces_keys() -> FrameResult<()> {
        let opts = MergeOptions::on(["id"]).with_how(JoinHow::Outer);
        let out = people()?.merge(&scores()?, &opts)?;
        assert_eq!(out.nrows(), 4);
        assert_eq!(out.column("id")?.value(3), Value::Int(4));
        assert_eq!(out.column("name_x")?.value(3), Value::Null);
        Ok(())
    }

    #[test]
    fn concat_rows_aligns_by_name() -> FrameResult<()> {
        let a = people()?;
        let b = DataFrame::from_columns(vec![Column::new("id", vec![9_i64])])?;
        let out = DataFrame::concat_rows(&[&a, &b])?;
        assert_eq!(out.nrows(), 4);
        assert_eq!(out.column("name")?.value(3), Value::Null);
        Ok(())
    }

    #[test]
    fn concat_columns_outer_aligns_rows() -> FrameResult<()> {
        let a = people()?;
        let b = DataFrame::from_columns(vec![Column::new("extra", vec![1.5_f64])])?
            .with_index(Index::from_labels(None, vec![Label::Int(7)]))?;
        let out = DataFrame::concat_columns(&[&a, &b])?;
        assert_eq!(out.nrows(), 4);
        assert_eq!(out.column("extra")?.value(0), Value::Null);
        assert_eq!(out.column("extra")?.value(3), Value::Float(1.5));
        Ok(())
    }

    #[test]
    fn list_explode_repeats_rows() -> FrameResult<()> {
        let lists = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            Some(vec![]),
        ]);
        let df = DataFrame::from_columns(vec![
            Column::new("k", vec!["a", "b"]),
            Column::new("v", ColumnData::Array(Arc::new(lists) as ArrayRef)),
        ])?;
        let out = df.explode("v", false)?;
        assert_eq!(out.nrows(), 3);
        assert_eq!(out.column("v")?.to_values(), vec![Value::Int(1), Value::Int(2), Value::Null]);
        assert_eq!(out.index().key(1), Some(&[Label::Int(0)][..]));
        Ok(())
    }

    #[test]
    fn unstack_pivots_the_last_level() -> FrameResult<()> {
        let df = DataFrame::from_columns(vec![Column::new("v", vec![1_i64, 2, 3, 4])])?
            .with_index(Index::from_keys(
                vec![None, None],
                vec![
                    vec![Label::from("a"), Label::Int(0)],
                    vec![Label::from("a"), Label::Int(1)],
                    vec![Label::from("b"), Label::Int(0)],
                    vec![Label::from("b"), Label::Int(1)],
                ],
            )?)?;
        let out = df.unstack()?;
        assert_eq!(out.column_names(), vec!["(v, 0)", "(v, 1)"]);
        assert_eq!(out.nrows(), 2);
        assert!(people()?.unstack().is_err());
        Ok(())
    }

    #[test]
    fn transpose_swaps_axes() -> FrameResult<()> {
        let out = people()?.transpose()?;
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.column_names(), vec!["0", "1", "2"]);
        Ok(())
    }

    #[test]
    fn row_apply_expands_columns() -> FrameResult<()> {
        let df = people()?;
        let out = df.apply_rows(|row| {
            Series::new(
                None,
                Index::from_labels(None, vec![Label::from("twice")]),
                ColumnData::from_values(vec![Value::Int(
                    row.get("id").and_then(|v| v.as_f64()).unwrap_or_default() as i64 * 2,
                )]),
            )
        })?;
        assert_eq!(out.column("twice")?.value(2), Value::Int(6));
        let counts = df.apply_rows_to_values(|row| Ok(Value::Int(row.len() as i64)))?;
        assert_eq!(counts.value(0), Value::Int(2));
        Ok(())
    }
}
