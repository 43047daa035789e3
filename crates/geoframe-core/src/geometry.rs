//! Geometry columns.
//!
//! A [`GeometryArray`] is the storage behind every geometry-typed column: a
//! shared, immutable vector of optional geometries plus one CRS tag owned by
//! the array value. Clones share storage; mutation goes through
//! [`GeometryArray::values_mut`] which copies on write. The CRS tag is never
//! shared, so retagging one clone can not leak into a sibling table.

pub mod codec;
pub mod error;
pub mod kernel;
pub mod project;

use std::sync::Arc;

use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use log::warn;

use crate::{crs::Crs, value::Value};

pub use error::{GeometryError, GeometryResult};

/// A column of optional geometries with a single optional CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryArray {
    values: Arc<Vec<Option<Geometry<f64>>>>,
    crs: Option<Crs>,
}

impl GeometryArray {
    /// Wrap already-typed geometries.
    pub fn new(values: Vec<Option<Geometry<f64>>>, crs: Option<Crs>) -> Self {
        Self {
            values: Arc::new(values),
            crs,
        }
    }

    /// Build from non-null geometries.
    pub fn from_geometries<I>(geoms: I, crs: Option<Crs>) -> Self
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        Self::new(geoms.into_iter().map(Some).collect(), crs)
    }

    /// An all-null array of `len` rows.
    pub fn nulls(len: usize, crs: Option<Crs>) -> Self {
        Self::new(vec![None; len], crs)
    }

    /// Coerce dynamically-typed values into geometries.
    ///
    /// Nulls (including `NaN`) become missing geometries; any other
    /// non-geometry value fails with [`GeometryError::NotGeometry`].
    pub fn from_values(values: &[Value], crs: Option<Crs>) -> GeometryResult<Self> {
        let mut out = Vec::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            match value {
                Value::Geometry(g) => out.push(Some(g.clone())),
                v if v.is_null() => out.push(None),
                other => {
                    return Err(GeometryError::NotGeometry {
                        position,
                        found: other.type_name(),
                    });
                }
            }
        }
        Ok(Self::new(out, crs))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the array has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Geometry at `i` (`None` when missing or out of range).
    pub fn get(&self, i: usize) -> Option<&Geometry<f64>> {
        self.values.get(i).and_then(Option::as_ref)
    }

    /// All slots.
    pub fn values(&self) -> &[Option<Geometry<f64>>] {
        &self.values
    }

    /// Iterate over slots.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Geometry<f64>>> {
        self.values.iter().map(Option::as_ref)
    }

    /// Mutable access to the slots, copying the storage first if it is
    /// shared with another array.
    pub fn values_mut(&mut self) -> &mut Vec<Option<Geometry<f64>>> {
        Arc::make_mut(&mut self.values)
    }

    /// Whether two arrays currently share the same storage buffer.
    pub fn shares_storage_with(&self, other: &GeometryArray) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// The CRS tag.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Retag this array value only.
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// A shallow copy carrying a different CRS tag.
    pub fn with_crs(&self, crs: Option<Crs>) -> Self {
        Self {
            values: Arc::clone(&self.values),
            crs,
        }
    }

    /// Whether every slot is missing.
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Gather rows; `None` indices produce missing geometries.
    pub fn take(&self, indices: &[Option<usize>]) -> Self {
        let values = indices
            .iter()
            .map(|idx| idx.and_then(|i| self.values.get(i).cloned().flatten()))
            .collect();
        Self::new(values, self.crs.clone())
    }

    /// Stack arrays end to end.
    ///
    /// Inputs must agree on a CRS; untagged inputs adopt the common CRS of
    /// the tagged ones (with a warning).
    pub fn concat(parts: &[&GeometryArray]) -> GeometryResult<Self> {
        let crs = common_crs(parts.iter().map(|p| p.crs()))?;
        let mut values = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for part in parts {
            values.extend(part.values.iter().cloned());
        }
        Ok(Self::new(values, crs))
    }

    /// Values as dynamically-typed cells.
    pub fn to_values(&self) -> Vec<Value> {
        self.values.iter().cloned().map(Value::from).collect()
    }

    /// Per-row bounds `[minx, miny, maxx, maxy]`.
    pub fn bounds(&self) -> Vec<Option<[f64; 4]>> {
        self.values
            .iter()
            .map(|g| g.as_ref().and_then(kernel::bounds))
            .collect()
    }

    /// Bounds of the whole column, ignoring missing and empty geometries.
    pub fn total_bounds(&self) -> Option<[f64; 4]> {
        let mut acc: Option<Rect<f64>> = None;
        for g in self.values.iter().flatten() {
            if let Some(r) = g.bounding_rect() {
                acc = Some(match acc {
                    None => r,
                    Some(a) => Rect::new(
                        (a.min().x.min(r.min().x), a.min().y.min(r.min().y)),
                        (a.max().x.max(r.max().x), a.max().y.max(r.max().y)),
                    ),
                });
            }
        }
        acc.map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
    }
}

/// Resolve the CRS shared by several inputs.
pub(crate) fn common_crs<'a, I>(crs: I) -> GeometryResult<Option<Crs>>
where
    I: IntoIterator<Item = Option<&'a Crs>>,
{
    let all: Vec<Option<&Crs>> = crs.into_iter().collect();
    let mut distinct: Vec<&Crs> = Vec::new();
    for c in all.iter().flatten() {
        if !distinct.contains(c) {
            distinct.push(c);
        }
    }
    match distinct.as_slice() {
        [] => Ok(None),
        [only] => {
            if all.iter().any(Option::is_none) {
                warn!("CRS not set for some of the concatenation inputs; setting output CRS to {only}");
            }
            Ok(Some((*only).clone()))
        }
        many => Err(GeometryError::ConcatCrsConflict {
            crs: many.iter().map(|c| c.to_string()).collect(),
        }),
    }
}
