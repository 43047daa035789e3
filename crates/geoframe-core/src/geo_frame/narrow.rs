//! Dtype-driven classification of selections.
//!
//! A selection is geometry-aware because of what it holds, never because of
//! what it was selected from: a single geometry-typed column narrows to a
//! [`GeoSeries`], a table with at least one geometry column stays a
//! [`GeoDataFrame`], and everything else decays to the plain types.

use crate::frame::{ColumnData, DataFrame, FrameError, Index, Series};

use super::{
    error::GeoFrameResult,
    propagate::{reconstruct, Derivation},
    AnySeries, GeoDataFrame, GeoSeries, Selection, Table,
};

/// Classify a host table by its dtypes. The active name is left unset.
pub(crate) fn classify(frame: DataFrame) -> Table {
    if frame.columns().iter().any(|c| c.data.is_geometry()) {
        Table::Geo(GeoDataFrame {
            frame,
            active: None,
            promote_default_name: false,
        })
    } else {
        Table::Plain(frame)
    }
}

/// Classify a single column.
///
/// `row_axis` is the column index of the table a row was extracted from; a
/// series indexed by it is a row proxy and stays plain even when every cell
/// is a geometry.
pub(crate) fn narrow_series(series: Series, row_axis: Option<&Index>) -> AnySeries {
    let row_proxy = row_axis.is_some_and(|axis| &series.index == axis);
    let Series { name, index, data } = series;
    match data {
        ColumnData::Geometry(values) if !row_proxy => AnySeries::Geo(GeoSeries {
            name,
            index,
            values,
        }),
        data => AnySeries::Plain(Series { name, index, data }),
    }
}

impl GeoDataFrame {
    /// Column(s) named `name`.
    pub fn get(&self, name: &str) -> GeoFrameResult<Selection> {
        let positions = self.frame.positions(name);
        match positions.len() {
            0 => Err(FrameError::ColumnNotFound {
                name: name.to_string(),
            }
            .into()),
            1 => {
                let series = self.frame.get_at(positions[0])?;
                Ok(Selection::Series(narrow_series(series, None)))
            }
            _ => {
                let frame = self.frame.select_positions(&positions)?;
                Ok(Selection::Table(reconstruct(frame, Derivation::Default(self))?))
            }
        }
    }

    /// Columns by name, in the given order.
    pub fn select(&self, names: &[&str]) -> GeoFrameResult<Table> {
        let frame = self.frame.select(names)?;
        reconstruct(frame, Derivation::Default(self))
    }

    /// Row `i`, indexed by the column names.
    pub fn row(&self, i: usize) -> GeoFrameResult<AnySeries> {
        let series = self.frame.row(i)?;
        let axis = self.frame.columns_index();
        Ok(narrow_series(series, Some(&axis)))
    }

    /// Rows by position.
    pub fn take(&self, positions: &[usize]) -> GeoFrameResult<Table> {
        reconstruct(self.frame.take(positions)?, Derivation::Default(self))
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> GeoFrameResult<Table> {
        reconstruct(self.frame.filter(mask)?, Derivation::Default(self))
    }

    /// Rows `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> GeoFrameResult<Table> {
        reconstruct(self.frame.slice(start, end)?, Derivation::Default(self))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> GeoFrameResult<Table> {
        reconstruct(self.frame.head(n)?, Derivation::Default(self))
    }

    /// Shallow copy: storage is shared, and every later change to either
    /// table copies first.
    pub fn copy(&self) -> GeoDataFrame {
        GeoDataFrame {
            frame: self.frame.clone(),
            active: self.active.clone(),
            promote_default_name: self.promote_default_name,
        }
    }
}
