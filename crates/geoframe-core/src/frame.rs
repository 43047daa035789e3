//! Host table engine.
//!
//! A small, geometry-unaware columnar table: named columns of equal length
//! sharing one row [`Index`]. It knows that a geometry dtype exists (so a
//! geometry column survives selection, slicing, concatenation and joins
//! unchanged) but attaches no meaning to it; the geometry-aware layer in
//! [`crate::geo_frame`] re-classifies every result this engine produces.
//!
//! - columns, dtypes and storage (`column` module)
//! - single and multi-level row indexes (`index` module)
//! - concat, merge, explode, unstack, transpose and apply (`ops` module)
//! - grouping and aggregation (`aggregate` module)

pub mod aggregate;
pub mod column;
pub mod error;
pub mod index;
pub mod ops;

use std::collections::HashSet;

pub use aggregate::{AggFunc, AggSpec, By, GroupOptions, Groups};
pub use column::{ColumnData, DType};
pub use error::{FrameError, FrameResult};
pub use index::Index;
pub use ops::{JoinHow, MergeOptions};

use crate::value::{Label, Value};

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column label.
    pub name: String,
    /// Column storage.
    pub data: ColumnData,
}

impl Column {
    /// Build a column.
    pub fn new(name: impl Into<String>, data: impl Into<ColumnData>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A one-dimensional labelled array.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Series name.
    pub name: Option<String>,
    /// Row labels.
    pub index: Index,
    /// Values.
    pub data: ColumnData,
}

impl Series {
    /// Build a series; index and data must have the same length.
    pub fn new(name: Option<String>, index: Index, data: ColumnData) -> FrameResult<Self> {
        if index.len() != data.len() {
            return Err(FrameError::LengthMismatch {
                what: "series values".to_string(),
                expected: index.len(),
                found: data.len(),
            });
        }
        Ok(Self { name, index, data })
    }

    /// Series with a default range index.
    pub fn from_data(name: Option<String>, data: ColumnData) -> Self {
        Self {
            name,
            index: Index::range(data.len()),
            data,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Value at position `i`.
    pub fn value(&self, i: usize) -> Value {
        self.data.value(i)
    }

    /// Value whose (single-level) label is `label`.
    pub fn get(&self, label: &str) -> Option<Value> {
        let key = [Label::from(label)];
        self.index
            .keys()
            .iter()
            .position(|k| k.as_slice() == key.as_slice())
            .map(|i| self.data.value(i))
    }

    /// Gather by position.
    pub fn take(&self, positions: &[usize]) -> FrameResult<Self> {
        Ok(Self {
            name: self.name.clone(),
            index: self.index.take(positions),
            data: self.data.take_positions(positions)?,
        })
    }

    /// Turn into a one-column table.
    pub fn to_frame(&self) -> DataFrame {
        DataFrame {
            index: self.index.clone(),
            columns: vec![Column {
                name: self.name.clone().unwrap_or_else(|| "0".to_string()),
                data: self.data.clone(),
            }],
        }
    }
}

/// A two-dimensional table of named columns sharing one row index.
///
/// Column names need not be unique; lookups by name return the first
/// match unless documented otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    index: Index,
    columns: Vec<Column>,
}

impl Default for DataFrame {
    fn default() -> Self {
        Self::empty()
    }
}

impl DataFrame {
    /// Build from an index and columns of matching length.
    pub fn new(index: Index, columns: Vec<Column>) -> FrameResult<Self> {
        for c in &columns {
            if c.data.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    what: format!("column {:?}", c.name),
                    expected: index.len(),
                    found: c.data.len(),
                });
            }
        }
        Ok(Self { index, columns })
    }

    /// Build from columns with a default range index.
    pub fn from_columns(columns: Vec<Column>) -> FrameResult<Self> {
        let len = columns.first().map_or(0, |c| c.data.len());
        Self::new(Index::range(len), columns)
    }

    /// Build from row records; values are type-inferred per column.
    pub fn from_records(names: &[&str], rows: Vec<Vec<Value>>) -> FrameResult<Self> {
        let mut cols: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(FrameError::LengthMismatch {
                    what: format!("record {r}"),
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (c, v) in row.into_iter().enumerate() {
                cols[c].push(v);
            }
        }
        let len = cols.first().map_or(0, Vec::len);
        let columns = names
            .iter()
            .zip(cols)
            .map(|(n, v)| Column::new(*n, ColumnData::from_values(v)))
            .collect();
        Self::new(Index::range(len), columns)
    }

    /// Table with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            index: Index::range(0),
            columns: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Row index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Replace the row index.
    pub fn set_index(&mut self, index: Index) -> FrameResult<()> {
        if index.len() != self.nrows() {
            return Err(FrameError::LengthMismatch {
                what: "index".to_string(),
                expected: self.nrows(),
                found: index.len(),
            });
        }
        self.index = index;
        Ok(())
    }

    /// Copy with a different row index.
    pub fn with_index(&self, index: Index) -> FrameResult<Self> {
        let mut out = self.clone();
        out.set_index(index)?;
        Ok(out)
    }

    /// All columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The column axis as an index (the index of a row extracted from this
    /// table).
    pub fn columns_index(&self) -> Index {
        Index::from_labels(
            None,
            self.columns
                .iter()
                .map(|c| Label::from(c.name.as_str()))
                .collect(),
        )
    }

    /// `(name, dtype)` for every column.
    pub fn dtypes(&self) -> Vec<(&str, DType)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.data.dtype()))
            .collect()
    }

    /// Positions of every column with this name.
    pub fn positions(&self, name: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether a column with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Names that occur more than once.
    pub fn duplicated_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for c in &self.columns {
            if !seen.insert(c.name.as_str()) && !dups.contains(&c.name.as_str()) {
                dups.push(c.name.as_str());
            }
        }
        dups
    }

    /// First column with this name.
    pub fn column(&self, name: &str) -> FrameResult<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| FrameError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Column at a position.
    pub fn column_at(&self, position: usize) -> FrameResult<&Column> {
        self.columns
            .get(position)
            .ok_or(FrameError::PositionOutOfBounds {
                position,
                len: self.columns.len(),
            })
    }

    /// First column with this name as a series.
    pub fn get(&self, name: &str) -> FrameResult<Series> {
        Ok(Series {
            name: Some(name.to_string()),
            index: self.index.clone(),
            data: self.column(name)?.clone(),
        })
    }

    /// Column at a position as a series.
    pub fn get_at(&self, position: usize) -> FrameResult<Series> {
        let col = self.column_at(position)?;
        Ok(Series {
            name: Some(col.name.clone()),
            index: self.index.clone(),
            data: col.data.clone(),
        })
    }

    /// Sub-table of the named columns; a name matching several columns
    /// selects all of them.
    pub fn select(&self, names: &[&str]) -> FrameResult<Self> {
        let mut columns = Vec::new();
        for name in names {
            let positions = self.positions(name);
            if positions.is_empty() {
                return Err(FrameError::ColumnNotFound {
                    name: (*name).to_string(),
                });
            }
            columns.extend(positions.into_iter().map(|p| self.columns[p].clone()));
        }
        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }

    /// Sub-table of columns at the given positions.
    pub fn select_positions(&self, positions: &[usize]) -> FrameResult<Self> {
        let columns = positions
            .iter()
            .map(|&p| self.column_at(p).cloned())
            .collect::<FrameResult<_>>()?;
        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }

    /// Replace the first column with this name, or append a new one.
    pub fn set_column(&mut self, name: &str, data: ColumnData) -> FrameResult<()> {
        if data.len() != self.nrows() && !(self.columns.is_empty() && self.nrows() == 0) {
            return Err(FrameError::LengthMismatch {
                what: format!("values for column {name:?}"),
                expected: self.nrows(),
                found: data.len(),
            });
        }
        if self.columns.is_empty() && self.nrows() == 0 {
            self.index = Index::range(data.len());
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.data = data,
            None => self.columns.push(Column::new(name, data)),
        }
        Ok(())
    }

    /// Replace the column at `position`, keeping its name.
    pub fn set_column_at(&mut self, position: usize, data: ColumnData) -> FrameResult<()> {
        let nrows = self.nrows();
        let ncols = self.columns.len();
        let col = self
            .columns
            .get_mut(position)
            .ok_or(FrameError::PositionOutOfBounds {
                position,
                len: ncols,
            })?;
        if data.len() != nrows {
            return Err(FrameError::LengthMismatch {
                what: format!("values for column {:?}", col.name),
                expected: nrows,
                found: data.len(),
            });
        }
        col.data = data;
        Ok(())
    }

    /// Insert a column at a position.
    pub fn insert_column(&mut self, position: usize, name: &str, data: ColumnData) -> FrameResult<()> {
        if data.len() != self.nrows() {
            return Err(FrameError::LengthMismatch {
                what: format!("values for column {name:?}"),
                expected: self.nrows(),
                found: data.len(),
            });
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, Column::new(name, data));
        Ok(())
    }

    /// New table without every column of this name.
    pub fn drop_column(&self, name: &str) -> FrameResult<Self> {
        if !self.contains(name) {
            return Err(FrameError::ColumnNotFound {
                name: name.to_string(),
            });
        }
        Ok(Self {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| c.name != name)
                .cloned()
                .collect(),
        })
    }

    /// New table with every column named `from` renamed to `to`.
    pub fn rename_column(&self, from: &str, to: &str) -> FrameResult<Self> {
        if !self.contains(from) {
            return Err(FrameError::ColumnNotFound {
                name: from.to_string(),
            });
        }
        let mut out = self.clone();
        for c in out.columns.iter_mut().filter(|c| c.name == from) {
            c.name = to.to_string();
        }
        Ok(out)
    }

    /// Gather rows by position.
    pub fn take(&self, positions: &[usize]) -> FrameResult<Self> {
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.nrows()) {
            return Err(FrameError::PositionOutOfBounds {
                position: bad,
                len: self.nrows(),
            });
        }
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Ok(Column {
                    name: c.name.clone(),
                    data: c.data.take_positions(positions)?,
                })
            })
            .collect::<FrameResult<_>>()?;
        Ok(Self {
            index: self.index.take(positions),
            columns,
        })
    }

    /// Keep rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> FrameResult<Self> {
        if mask.len() != self.nrows() {
            return Err(FrameError::LengthMismatch {
                what: "boolean mask".to_string(),
                expected: self.nrows(),
                found: mask.len(),
            });
        }
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(i, _)| i)
            .collect();
        self.take(&positions)
    }

    /// Rows `start..end`, clamped to the table.
    pub fn slice(&self, start: usize, end: usize) -> FrameResult<Self> {
        let end = end.min(self.nrows());
        let start = start.min(end);
        let positions: Vec<usize> = (start..end).collect();
        self.take(&positions)
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> FrameResult<Self> {
        self.slice(0, n)
    }

    /// Row `i` as a series indexed by the column names.
    ///
    /// When every column is geometry-typed the row is materialised as a
    /// geometry array, as a columnar engine concatenating same-typed cells
    /// would.
    pub fn row(&self, i: usize) -> FrameResult<Series> {
        if i >= self.nrows() {
            return Err(FrameError::PositionOutOfBounds {
                position: i,
                len: self.nrows(),
            });
        }
        let all_geometry = !self.columns.is_empty() && self.columns.iter().all(|c| c.data.is_geometry());
        let data = if all_geometry {
            let geoms = self
                .columns
                .iter()
                .map(|c| c.data.as_geometry().and_then(|g| g.get(i).cloned()))
                .collect();
            ColumnData::Geometry(crate::geometry::GeometryArray::new(geoms, None))
        } else {
            ColumnData::from_values(self.columns.iter().map(|c| c.data.value(i)).collect())
        };
        Ok(Series {
            name: self.index.key(i).map(crate::value::format_key),
            index: self.columns_index(),
            data,
        })
    }

    /// Move the index into leading columns and install a range index; with
    /// `drop` the index is discarded instead.
    pub fn reset_index(&self, drop: bool) -> FrameResult<Self> {
        let mut columns = Vec::with_capacity(self.ncols() + self.index.nlevels());
        if !drop {
            for (level, name) in self.index.column_names().into_iter().enumerate() {
                let values = self.index.level(level)?.into_iter().map(Value::from).collect();
                columns.push(Column::new(name, ColumnData::from_values(values)));
            }
        }
        columns.extend(self.columns.iter().cloned());
        Ok(Self {
            index: Index::range(self.nrows()),
            columns,
        })
    }

    /// Add an index level after the existing ones.
    pub fn append_index_level(&self, name: Option<String>, labels: Vec<Label>) -> FrameResult<Self> {
        Ok(Self {
            index: self.index.append_level(name, labels)?,
            columns: self.columns.clone(),
        })
    }

    /// Labels of the rows of one column, for grouping and joining.
    pub(crate) fn column_labels(&self, name: &str) -> FrameResult<Vec<Label>> {
        let data = self.column(name)?;
        (0..self.nrows())
            .map(|i| {
                let v = data.value(i);
                v.to_label().ok_or(FrameError::Unhashable {
                    column: name.to_string(),
                    found: v.type_name(),
                })
            })
            .collect()
    }
}
