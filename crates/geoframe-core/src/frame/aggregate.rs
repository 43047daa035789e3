//! Grouping and aggregation.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use crate::{
    geometry::GeometryArray,
    value::{Label, Value},
};

use super::{
    column::ColumnData,
    error::{FrameError, FrameResult},
    index::Index,
    Column, DataFrame,
};

/// What rows are grouped by.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum By {
    /// A single group holding every row, keyed `0`.
    #[default]
    None,
    /// Values of one or more columns.
    Columns(Vec<String>),
    /// One explicit key per row.
    Labels(Vec<Label>),
    /// One level of the row index.
    Level(usize),
}

impl By {
    /// Group by one column.
    pub fn column(name: impl Into<String>) -> Self {
        By::Columns(vec![name.into()])
    }
}

/// Grouping options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    /// Sort groups by key (otherwise first-appearance order).
    pub sort: bool,
    /// Drop rows whose key contains a missing label.
    pub dropna: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            sort: true,
            dropna: true,
        }
    }
}

/// The result of grouping: one key and member row positions per group.
#[derive(Debug, Clone, PartialEq)]
pub struct Groups {
    /// Names of the key levels.
    pub names: Vec<Option<String>>,
    /// Group keys.
    pub keys: Vec<Vec<Label>>,
    /// Row positions of each group, in table order.
    pub members: Vec<Vec<usize>>,
    /// Columns that formed the key and are excluded from aggregation.
    pub key_columns: Vec<String>,
}

impl Groups {
    /// Number of groups.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index labelling the groups.
    pub fn index(&self) -> FrameResult<Index> {
        Index::from_keys(self.names.clone(), self.keys.clone())
    }
}

/// A user-supplied reduction.
pub type CustomAgg = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// A reduction over the values of one group.
#[derive(Clone)]
pub enum AggFunc {
    /// First non-missing value.
    First,
    /// Last non-missing value.
    Last,
    /// Sum of numbers (or concatenation of strings).
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Number of non-missing values.
    Count,
    /// Named closure.
    Custom {
        /// Name used for output columns and messages.
        name: String,
        /// The reduction.
        func: CustomAgg,
    },
}

impl AggFunc {
    /// Wrap a closure.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        AggFunc::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        match self {
            AggFunc::First => "first",
            AggFunc::Last => "last",
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Custom { name, .. } => name,
        }
    }

    fn reduce(&self, column: &str, values: &[Value]) -> FrameResult<Value> {
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        let unsupported = |found: &'static str| FrameError::AggregationUnsupported {
            func: self.name().to_string(),
            column: column.to_string(),
            found,
        };
        let non_numeric = present
            .iter()
            .find(|v| !matches!(v, Value::Int(_) | Value::Float(_) | Value::Bool(_)));

        match self {
            AggFunc::First => Ok(present.first().map_or(Value::Null, |v| (*v).clone())),
            AggFunc::Last => Ok(present.last().map_or(Value::Null, |v| (*v).clone())),
            AggFunc::Count => Ok(Value::Int(present.len() as i64)),
            AggFunc::Sum => {
                if present.iter().all(|v| matches!(v, Value::Str(_))) && !present.is_empty() {
                    let mut out = String::new();
                    for v in &present {
                        if let Value::Str(s) = v {
                            out.push_str(s);
                        }
                    }
                    return Ok(Value::Str(out));
                }
                if let Some(bad) = non_numeric {
                    return Err(unsupported(bad.type_name()));
                }
                if let Some(total) = int_sum(&present) {
                    return Ok(Value::Int(total));
                }
                Ok(Value::Float(present.iter().filter_map(|v| v.as_f64()).sum()))
            }
            AggFunc::Mean => {
                if let Some(bad) = non_numeric {
                    return Err(unsupported(bad.type_name()));
                }
                if present.is_empty() {
                    return Ok(Value::Null);
                }
                let total: f64 = present.iter().filter_map(|v| v.as_f64()).sum();
                Ok(Value::Float(total / present.len() as f64))
            }
            AggFunc::Min | AggFunc::Max => {
                let want_max = matches!(self, AggFunc::Max);
                if present.iter().all(|v| matches!(v, Value::Str(_))) {
                    let pick = if want_max {
                        present.iter().max_by_key(|v| v.to_string())
                    } else {
                        present.iter().min_by_key(|v| v.to_string())
                    };
                    return Ok(pick.map_or(Value::Null, |v| (*v).clone()));
                }
                if let Some(bad) = non_numeric {
                    return Err(unsupported(bad.type_name()));
                }
                let cmp = |a: &&&Value, b: &&&Value| {
                    a.as_f64()
                        .unwrap_or(f64::NAN)
                        .total_cmp(&b.as_f64().unwrap_or(f64::NAN))
                };
                let pick = if want_max {
                    present.iter().max_by(cmp)
                } else {
                    present.iter().min_by(cmp)
                };
                Ok(pick.map_or(Value::Null, |v| (*v).clone()))
            }
            AggFunc::Custom { name, func } => {
                func(values).map_err(|message| FrameError::CustomAggregation {
                    func: name.clone(),
                    message,
                })
            }
        }
    }
}

/// Exact sum of integer and boolean cells; `None` when a float is present
/// or the total overflows `i64`, in which case the caller sums as floats.
fn int_sum(values: &[&Value]) -> Option<i64> {
    values.iter().try_fold(0_i64, |acc, v| match v {
        Value::Int(i) => acc.checked_add(*i),
        Value::Bool(b) => acc.checked_add(i64::from(*b)),
        _ => None,
    })
}

impl fmt::Debug for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggFunc::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for AggFunc {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "first" => AggFunc::First,
            "last" => AggFunc::Last,
            "sum" => AggFunc::Sum,
            "mean" => AggFunc::Mean,
            "min" => AggFunc::Min,
            "max" => AggFunc::Max,
            "count" => AggFunc::Count,
            other => {
                return Err(FrameError::UnknownAggregation {
                    name: other.to_string(),
                })
            }
        })
    }
}

/// How the non-key columns are aggregated.
#[derive(Debug, Clone)]
pub enum AggSpec {
    /// One function for every column; names are kept.
    Single(AggFunc),
    /// Several functions for every column; outputs are named
    /// `<column>_<function>`.
    Multi(Vec<AggFunc>),
    /// Explicit functions for listed columns only.
    PerColumn(Vec<(String, AggFunc)>),
}

impl Default for AggSpec {
    fn default() -> Self {
        AggSpec::Single(AggFunc::First)
    }
}

impl From<AggFunc> for AggSpec {
    fn from(f: AggFunc) -> Self {
        AggSpec::Single(f)
    }
}

fn aggregate_column(
    name: &str,
    data: &ColumnData,
    groups: &Groups,
    func: &AggFunc,
) -> FrameResult<ColumnData> {
    // Picking a member keeps geometry columns typed.
    if let (Some(geoms), AggFunc::First | AggFunc::Last) = (data.as_geometry(), func) {
        let picked = groups
            .members
            .iter()
            .map(|rows| {
                let mut present = rows.iter().filter_map(|&r| geoms.get(r));
                let pick = match func {
                    AggFunc::Last => present.last(),
                    _ => present.next(),
                };
                pick.cloned()
            })
            .collect();
        return Ok(ColumnData::Geometry(GeometryArray::new(
            picked,
            geoms.crs().cloned(),
        )));
    }
    let mut out = Vec::with_capacity(groups.len());
    for rows in &groups.members {
        let values: Vec<Value> = rows.iter().map(|&r| data.value(r)).collect();
        out.push(func.reduce(name, &values)?);
    }
    Ok(ColumnData::from_values(out))
}

impl DataFrame {
    /// Partition rows into groups.
    pub fn groupby(&self, by: &By, opts: &GroupOptions) -> FrameResult<Groups> {
        let (names, row_keys, key_columns): (Vec<Option<String>>, Vec<Vec<Label>>, Vec<String>) =
            match by {
                By::None => (vec![None], vec![vec![Label::Int(0)]; self.nrows()], Vec::new()),
                By::Columns(cols) => {
                    let per_col = cols
                        .iter()
                        .map(|c| self.column_labels(c))
                        .collect::<FrameResult<Vec<_>>>()?;
                    let keys = (0..self.nrows())
                        .map(|i| per_col.iter().map(|c| c[i].clone()).collect())
                        .collect();
                    (cols.iter().cloned().map(Some).collect(), keys, cols.clone())
                }
                By::Labels(labels) => {
                    if labels.len() != self.nrows() {
                        return Err(FrameError::LengthMismatch {
                            what: "group keys".to_string(),
                            expected: self.nrows(),
                            found: labels.len(),
                        });
                    }
                    (
                        vec![None],
                        labels.iter().cloned().map(|l| vec![l]).collect(),
                        Vec::new(),
                    )
                }
                By::Level(level) => {
                    let labels = self.index.level(*level)?;
                    (
                        vec![self.index.names()[*level].clone()],
                        labels.into_iter().map(|l| vec![l]).collect(),
                        Vec::new(),
                    )
                }
            };

        let mut slot: HashMap<Vec<Label>, usize> = HashMap::new();
        let mut keys: Vec<Vec<Label>> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for (row, key) in row_keys.into_iter().enumerate() {
            if opts.dropna && key.iter().any(Label::is_null) {
                continue;
            }
            let g = *slot.entry(key.clone()).or_insert_with(|| {
                keys.push(key);
                members.push(Vec::new());
                keys.len() - 1
            });
            members[g].push(row);
        }
        if opts.sort {
            let mut order: Vec<usize> = (0..keys.len()).collect();
            order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
            keys = order.iter().map(|&i| keys[i].clone()).collect();
            members = order.iter().map(|&i| members[i].clone()).collect();
        }
        Ok(Groups {
            names,
            keys,
            members,
            key_columns,
        })
    }

    /// Aggregate the non-key columns per group. The result is indexed by
    /// the group keys.
    pub fn aggregate(&self, groups: &Groups, spec: &AggSpec) -> FrameResult<DataFrame> {
        let targets: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| !groups.key_columns.contains(&c.name))
            .collect();
        let mut columns = Vec::new();
        match spec {
            AggSpec::Single(func) => {
                for c in targets {
                    columns.push(Column {
                        name: c.name.clone(),
                        data: aggregate_column(&c.name, &c.data, groups, func)?,
                    });
                }
            }
            AggSpec::Multi(funcs) => {
                for c in targets {
                    for func in funcs {
                        columns.push(Column {
                            name: format!("{}_{}", c.name, func.name()),
                            data: aggregate_column(&c.name, &c.data, groups, func)?,
                        });
                    }
                }
            }
            AggSpec::PerColumn(pairs) => {
                for (name, func) in pairs {
                    let data = self.column(name)?;
                    columns.push(Column {
                        name: name.clone(),
                        data: aggregate_column(name, data, groups, func)?,
                    });
                }
            }
        }
        DataFrame::new(groups.index()?, columns)
    }
}
