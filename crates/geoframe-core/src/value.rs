//! Dynamically-typed cell values and hashable labels.
//!
//! [`Value`] is what a single cell of any column looks like once it is
//! pulled out of its columnar storage: a scalar, a geometry, or null.
//! [`Label`] is the restricted, hashable subset used for index labels and
//! group keys (geometries and other non-hashable values cannot be labels).

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use geo_types::Geometry;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float. `NaN` is treated as missing by [`Value::is_null`].
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// A geometry object (not yet, or no longer, inside a geometry column).
    Geometry(Geometry<f64>),
}

impl Value {
    /// Whether this value counts as missing (`Null` or a `NaN` float).
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Geometry(_) => "geometry",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Convert into a [`Label`]; geometries have no label form.
    pub fn to_label(&self) -> Option<Label> {
        match self {
            Value::Null => Some(Label::Null),
            Value::Bool(b) => Some(Label::Bool(*b)),
            Value::Int(i) => Some(Label::Int(*i)),
            Value::Float(f) if f.is_nan() => Some(Label::Null),
            Value::Float(f) => Some(Label::Float(*f)),
            Value::Str(s) => Some(Label::Str(s.clone())),
            Value::Geometry(_) => None,
        }
    }

    /// Borrow the geometry, if this is one.
    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }
}

impl From<Label> for Value {
    fn from(label: Label) -> Self {
        match label {
            Label::Null => Value::Null,
            Label::Bool(b) => Value::Bool(b),
            Label::Int(i) => Value::Int(i),
            Label::Float(f) => Value::Float(f),
            Label::Str(s) => Value::Str(s),
        }
    }
}

impl From<Geometry<f64>> for Value {
    fn from(g: Geometry<f64>) -> Self {
        Value::Geometry(g)
    }
}

impl From<Option<Geometry<f64>>> for Value {
    fn from(g: Option<Geometry<f64>>) -> Self {
        g.map_or(Value::Null, Value::Geometry)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Geometry(g) => write!(f, "{}", crate::geometry::codec::geometry_type_name(g)),
        }
    }
}

/// Hashable, totally ordered scalar used for index labels and group keys.
///
/// Floats compare by `total_cmp` and hash by bit pattern, so `-0.0` and
/// `0.0` are distinct labels.
#[derive(Debug, Clone)]
pub enum Label {
    /// Missing label (`None` / `NaN`).
    Null,
    /// Boolean label.
    Bool(bool),
    /// Integer label.
    Int(i64),
    /// Float label.
    Float(f64),
    /// String label.
    Str(String),
}

impl Label {
    fn rank(&self) -> u8 {
        match self {
            Label::Null => 0,
            Label::Bool(_) => 1,
            Label::Int(_) => 2,
            Label::Float(_) => 3,
            Label::Str(_) => 4,
        }
    }

    /// Whether the label is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Label::Null)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Label::Bool(a), Label::Bool(b)) => a.cmp(b),
            (Label::Int(a), Label::Int(b)) => a.cmp(b),
            (Label::Float(a), Label::Float(b)) => a.total_cmp(b),
            (Label::Int(a), Label::Float(b)) => (*a as f64).total_cmp(b),
            (Label::Float(a), Label::Int(b)) => a.total_cmp(&(*b as f64)),
            (Label::Str(a), Label::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Label::Null => 0u8.hash(state),
            Label::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // Int and Float compare equal across variants when numerically
            // equal, so they must hash identically.
            Label::Int(i) => {
                2u8.hash(state);
                (*i as f64).to_bits().hash(state);
            }
            Label::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Label::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Null => write!(f, "None"),
            Label::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Label::Int(i) => write!(f, "{i}"),
            Label::Float(x) => write!(f, "{x}"),
            Label::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Str(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Str(s)
    }
}

impl From<i64> for Label {
    fn from(i: i64) -> Self {
        Label::Int(i)
    }
}

/// Render a (possibly multi-level) index key the way it is shown to users:
/// a bare label for one level, a tuple for several.
pub fn format_key(key: &[Label]) -> String {
    match key {
        [single] => single.to_string(),
        many => {
            let parts: Vec<String> = many.iter().map(|l| l.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}
