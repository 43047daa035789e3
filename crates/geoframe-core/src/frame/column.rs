//! Column storage.
//!
//! A column is either a typed Arrow array, a [`GeometryArray`], or an
//! `Object` vector of dynamically-typed [`Value`]s for anything that does
//! not fit a single Arrow type (mixed scalars, geometry objects that were
//! never coerced, all-missing data).

use std::{fmt, sync::Arc};

use arrow::{
    array::{
        new_null_array, Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array,
        StringArray, UInt32Array,
    },
    compute,
    datatypes::{
        DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
        UInt16Type, UInt32Type, UInt64Type, UInt8Type,
    },
    util::display::array_value_to_string,
};
use snafu::prelude::*;

use crate::{geometry::GeometryArray, value::Value};

use super::error::{ArrowSnafu, FrameResult, GeometrySnafu};

/// Element type of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DType {
    /// A typed Arrow array.
    Arrow(DataType),
    /// Geometry values with a CRS.
    Geometry,
    /// Dynamically-typed values.
    Object,
}

impl DType {
    /// Whether this is the geometry dtype.
    pub fn is_geometry(&self) -> bool {
        matches!(self, DType::Geometry)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Arrow(DataType::Boolean) => f.write_str("bool"),
            DType::Arrow(DataType::Int64) => f.write_str("int64"),
            DType::Arrow(DataType::Float64) => f.write_str("float64"),
            DType::Arrow(DataType::Utf8) => f.write_str("string"),
            DType::Arrow(other) => write!(f, "{}", other.to_string().to_ascii_lowercase()),
            DType::Geometry => f.write_str("geometry"),
            DType::Object => f.write_str("object"),
        }
    }
}

/// Storage of one column.
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// Typed Arrow array.
    Array(ArrayRef),
    /// Geometry column.
    Geometry(GeometryArray),
    /// Dynamically-typed values.
    Object(Arc<Vec<Value>>),
}

impl PartialEq for ColumnData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnData::Array(a), ColumnData::Array(b)) => a.to_data() == b.to_data(),
            (ColumnData::Geometry(a), ColumnData::Geometry(b)) => a == b,
            (ColumnData::Object(a), ColumnData::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<GeometryArray> for ColumnData {
    fn from(g: GeometryArray) -> Self {
        ColumnData::Geometry(g)
    }
}

impl From<ArrayRef> for ColumnData {
    fn from(a: ArrayRef) -> Self {
        ColumnData::Array(a)
    }
}

impl From<Vec<Value>> for ColumnData {
    fn from(values: Vec<Value>) -> Self {
        ColumnData::from_values(values)
    }
}

impl From<Vec<i64>> for ColumnData {
    fn from(values: Vec<i64>) -> Self {
        ColumnData::Array(Arc::new(Int64Array::from(values)))
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(values: Vec<f64>) -> Self {
        ColumnData::Array(Arc::new(Float64Array::from(values)))
    }
}

impl From<Vec<&str>> for ColumnData {
    fn from(values: Vec<&str>) -> Self {
        ColumnData::Array(Arc::new(StringArray::from(values)))
    }
}

impl From<Vec<String>> for ColumnData {
    fn from(values: Vec<String>) -> Self {
        ColumnData::Array(Arc::new(StringArray::from(values)))
    }
}

impl From<Vec<bool>> for ColumnData {
    fn from(values: Vec<bool>) -> Self {
        ColumnData::Array(Arc::new(BooleanArray::from(values)))
    }
}

fn is_numeric(dt: &DataType) -> bool {
    dt.is_integer() || dt.is_floating()
}

impl ColumnData {
    /// Infer storage for dynamically-typed values: homogeneous booleans,
    /// integers, numbers or strings become Arrow arrays; anything else
    /// (including geometry objects and all-missing data) stays `Object`.
    pub fn from_values(values: Vec<Value>) -> Self {
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        if present.is_empty() {
            return ColumnData::Object(Arc::new(values));
        }
        if present.iter().all(|v| matches!(v, Value::Bool(_))) {
            let arr: BooleanArray = values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            return ColumnData::Array(Arc::new(arr));
        }
        if present.iter().all(|v| matches!(v, Value::Int(_))) {
            let arr: Int64Array = values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            return ColumnData::Array(Arc::new(arr));
        }
        if present
            .iter()
            .all(|v| matches!(v, Value::Int(_) | Value::Float(_)))
        {
            let arr: Float64Array = values
                .iter()
                .map(|v| match v {
                    Value::Int(_) | Value::Float(_) => v.as_f64(),
                    _ => None,
                })
                .collect();
            return ColumnData::Array(Arc::new(arr));
        }
        if present.iter().all(|v| matches!(v, Value::Str(_))) {
            let arr: StringArray = values
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            return ColumnData::Array(Arc::new(arr));
        }
        ColumnData::Object(Arc::new(values))
    }

    /// Missing values of the same dtype.
    pub fn nulls_like(&self, len: usize) -> Self {
        match self {
            ColumnData::Array(a) => ColumnData::Array(new_null_array(a.data_type(), len)),
            ColumnData::Geometry(g) => {
                ColumnData::Geometry(GeometryArray::nulls(len, g.crs().cloned()))
            }
            ColumnData::Object(_) => ColumnData::Object(Arc::new(vec![Value::Null; len])),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Array(a) => a.len(),
            ColumnData::Geometry(g) => g.len(),
            ColumnData::Object(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Array(a) => DType::Arrow(a.data_type().clone()),
            ColumnData::Geometry(_) => DType::Geometry,
            ColumnData::Object(_) => DType::Object,
        }
    }

    /// Whether the column is geometry-typed.
    pub fn is_geometry(&self) -> bool {
        matches!(self, ColumnData::Geometry(_))
    }

    /// Borrow the geometry array, if geometry-typed.
    pub fn as_geometry(&self) -> Option<&GeometryArray> {
        match self {
            ColumnData::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Whether every value is missing.
    pub fn is_all_null(&self) -> bool {
        match self {
            ColumnData::Array(a) => a.null_count() == a.len(),
            ColumnData::Geometry(g) => g.is_all_null(),
            ColumnData::Object(v) => v.iter().all(Value::is_null),
        }
    }

    /// Value at row `i` (`Null` when out of range).
    pub fn value(&self, i: usize) -> Value {
        match self {
            ColumnData::Array(a) => array_value(a, i),
            ColumnData::Geometry(g) => Value::from(g.get(i).cloned()),
            ColumnData::Object(v) => v.get(i).cloned().unwrap_or(Value::Null),
        }
    }

    /// All values.
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            ColumnData::Geometry(g) => g.to_values(),
            ColumnData::Object(v) => v.as_ref().clone(),
            ColumnData::Array(_) => (0..self.len()).map(|i| self.value(i)).collect(),
        }
    }

    /// Gather rows; `None` positions become missing values.
    pub fn take(&self, indices: &[Option<usize>]) -> FrameResult<Self> {
        Ok(match self {
            ColumnData::Array(a) => {
                let idx: UInt32Array = indices.iter().map(|i| i.map(|i| i as u32)).collect();
                ColumnData::Array(compute::take(a.as_ref(), &idx, None).context(ArrowSnafu)?)
            }
            ColumnData::Geometry(g) => ColumnData::Geometry(g.take(indices)),
            ColumnData::Object(v) => ColumnData::Object(Arc::new(
                indices
                    .iter()
                    .map(|i| i.and_then(|i| v.get(i).cloned()).unwrap_or(Value::Null))
                    .collect(),
            )),
        })
    }

    /// Gather rows by position.
    pub fn take_positions(&self, positions: &[usize]) -> FrameResult<Self> {
        let indices: Vec<Option<usize>> = positions.iter().copied().map(Some).collect();
        self.take(&indices)
    }

    /// Stack columns end to end, widening types when they disagree.
    pub fn concat(parts: &[&ColumnData]) -> FrameResult<Self> {
        let Some(first) = parts.first() else {
            return Ok(ColumnData::Object(Arc::new(Vec::new())));
        };

        // Geometry columns absorb all-missing parts of any dtype.
        if let Some(template) = parts.iter().find_map(|p| p.as_geometry()) {
            if parts.iter().all(|p| p.is_geometry() || p.is_all_null()) {
                let filled: Vec<GeometryArray> = parts
                    .iter()
                    .map(|p| match p {
                        ColumnData::Geometry(g) => g.clone(),
                        other => GeometryArray::nulls(other.len(), template.crs().cloned()),
                    })
                    .collect();
                let refs: Vec<&GeometryArray> = filled.iter().collect();
                return Ok(ColumnData::Geometry(
                    GeometryArray::concat(&refs).context(GeometrySnafu)?,
                ));
            }
        }

        let arrays: Option<Vec<&ArrayRef>> = parts
            .iter()
            .map(|p| match p {
                ColumnData::Array(a) => Some(a),
                _ => None,
            })
            .collect();
        if let Some(arrays) = arrays {
            let mut types: Vec<&DataType> = Vec::new();
            for a in &arrays {
                let dt = a.data_type();
                if *dt != DataType::Null && !types.contains(&dt) {
                    types.push(dt);
                }
            }
            let target = match types.as_slice() {
                [] => Some(DataType::Null),
                [only] => Some((*only).clone()),
                many if many.iter().all(|t| is_numeric(t)) => Some(DataType::Float64),
                _ => None,
            };
            if let Some(target) = target {
                let cast: Vec<ArrayRef> = arrays
                    .iter()
                    .map(|a| compute::cast(a.as_ref(), &target))
                    .collect::<Result<_, _>>()
                    .context(ArrowSnafu)?;
                let refs: Vec<&dyn Array> = cast.iter().map(|a| a.as_ref()).collect();
                return Ok(ColumnData::Array(compute::concat(&refs).context(ArrowSnafu)?));
            }
        }

        if parts.len() == 1 {
            return Ok((*first).clone());
        }
        let mut values = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for p in parts {
            values.extend(p.to_values());
        }
        Ok(ColumnData::Object(Arc::new(values)))
    }
}

fn array_value(a: &ArrayRef, i: usize) -> Value {
    if i >= a.len() || a.is_null(i) {
        return Value::Null;
    }
    match a.data_type() {
        DataType::Boolean => Value::Bool(a.as_boolean().value(i)),
        DataType::Int8 => Value::Int(a.as_primitive::<Int8Type>().value(i) as i64),
        DataType::Int16 => Value::Int(a.as_primitive::<Int16Type>().value(i) as i64),
        DataType::Int32 => Value::Int(a.as_primitive::<Int32Type>().value(i) as i64),
        DataType::Int64 => Value::Int(a.as_primitive::<Int64Type>().value(i)),
        DataType::UInt8 => Value::Int(a.as_primitive::<UInt8Type>().value(i) as i64),
        DataType::UInt16 => Value::Int(a.as_primitive::<UInt16Type>().value(i) as i64),
        DataType::UInt32 => Value::Int(a.as_primitive::<UInt32Type>().value(i) as i64),
        DataType::UInt64 => Value::Int(a.as_primitive::<UInt64Type>().value(i) as i64),
        DataType::Float32 => Value::Float(a.as_primitive::<Float32Type>().value(i) as f64),
        DataType::Float64 => Value::Float(a.as_primitive::<Float64Type>().value(i)),
        DataType::Utf8 => Value::Str(a.as_string::<i32>().value(i).to_string()),
        DataType::LargeUtf8 => Value::Str(a.as_string::<i64>().value(i).to_string()),
        _ => array_value_to_string(a.as_ref(), i)
            .map(Value::Str)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use geo_types::point;

    #[test]
    fn inference_picks_arrow_types() {
        let ints = ColumnData::from_values(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        assert_eq!(ints.dtype(), DType::Arrow(DataType::Int64));
        assert_eq!(ints.value(1), Value::Null);

        let mixed = ColumnData::from_values(vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(mixed.dtype(), DType::Arrow(DataType::Float64));

        let objects = ColumnData::from_values(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(objects.dtype(), DType::Object);
    }

    #[test]
    fn geometry_objects_stay_untyped() {
        let col = ColumnData::from_values(vec![Value::Geometry(point!(x: 0.0, y: 0.0).into())]);
        assert_eq!(col.dtype(), DType::Object);
        let empty = ColumnData::from_values(vec![Value::Null, Value::Null]);
        assert_eq!(empty.dtype(), DType::Object);
    }

    #[test]
    fn take_with_missing_positions() -> FrameResult<()> {
        let col = ColumnData::from(vec![10_i64, 20, 30]);
        let out = col.take(&[Some(2), None, Some(0)])?;
        assert_eq!(
            out.to_values(),
            vec![Value::Int(30), Value::Null, Value::Int(10)]
        );
        Ok(())
    }

    #[test]
    fn concat_widens_numbers_and_fills_geometry() -> FrameResult<()> {
        let a = ColumnData::from(vec![1_i64]);
        let b = ColumnData::from(vec![2.5_f64]);
        let out = ColumnData::concat(&[&a, &b])?;
        assert_eq!(out.dtype(), DType::Arrow(DataType::Float64));

        let g = ColumnData::Geometry(GeometryArray::from_geometries(
            [point!(x: 1.0, y: 1.0).into()],
            Some(Crs::wgs84()),
        ));
        let missing = g.nulls_like(2).to_values();
        let missing = ColumnData::Object(Arc::new(missing));
        let out = ColumnData::concat(&[&g, &missing])?;
        let geoms = out.as_geometry().map(|g| (g.len(), g.crs().cloned()));
        assert_eq!(geoms, Some((3, Some(Crs::wgs84()))));
        Ok(())
    }

    #[test]
    fn concat_of_incompatible_types_falls_back_to_objects() -> FrameResult<()> {
        let a = ColumnData::from(vec![1_i64]);
        let b = ColumnData::from(vec!["x"]);
        let out = ColumnData::concat(&[&a, &b])?;
        assert_eq!(out.dtype(), DType::Object);
        assert_eq!(out.to_values(), vec![Value::Int(1), Value::from("x")]);
        Ok(())
    }
}
