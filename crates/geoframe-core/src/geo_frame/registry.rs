//! Active geometry bookkeeping.
//!
//! Every path that attaches geometry to a table (construction,
//! [`GeoDataFrame::set_geometry`], assignment to the active column) goes
//! through [`ensure_geometry`] for coercion and [`reconcile_crs`] for the CRS
//! decision table before the table is touched.

use log::warn;
use snafu::prelude::*;

use crate::{
    crs::{display_opt, Crs},
    frame::{ColumnData, DataFrame},
    geometry::{GeometryArray, GeometryError, GeometryResult},
    value::Value,
};

use super::{
    error::{CoercionSnafu, GeoFrameError, GeoFrameResult},
    propagate::{reconstruct, Derivation},
    GeoDataFrame, GeoSeries, GeometryInput, Table, DEFAULT_GEOMETRY_NAME,
};

const DROP_DEPRECATED: &str = "The `drop` option of set_geometry is deprecated; in future the only \
    supported behaviour will match drop=false. To replicate drop=true, call set_geometry(new), \
    then drop the old column and rename_geometry(old).";

const DROP_NO_EFFECT: &str = "The `drop` option of set_geometry is deprecated and has no effect \
    when the geometry is given as values. Stop passing `drop` in this case.";

fn warn_drop_no_effect(drop: Option<bool>) {
    if drop == Some(true) {
        warn!("{DROP_NO_EFFECT}");
    }
}

/// Options for [`GeoDataFrame::set_geometry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetGeometryOptions {
    /// CRS for the new active geometry. Conflicts with a CRS already carried
    /// by the data are rejected.
    pub crs: Option<Crs>,
    /// Deprecated. `Some(true)` replaces the current active column with the
    /// named column's values; `Some(false)` behaves like `None` but warns.
    pub drop: Option<bool>,
}

impl SetGeometryOptions {
    /// Set the CRS.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Set the deprecated `drop` flag.
    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = Some(drop);
        self
    }
}

/// Coerce column data into a geometry array.
///
/// Data that is already geometry-typed keeps its own CRS; `crs` is only
/// attached when the data has none, and then to a fresh array value.
pub fn ensure_geometry(data: &ColumnData, crs: Option<&Crs>) -> GeometryResult<GeometryArray> {
    match data {
        ColumnData::Geometry(g) if g.crs().is_none() && crs.is_some() => {
            Ok(g.with_crs(crs.cloned()))
        }
        ColumnData::Geometry(g) => Ok(g.clone()),
        ColumnData::Object(values) => GeometryArray::from_values(values, crs.cloned()),
        ColumnData::Array(_) => {
            let first = (0..data.len())
                .map(|i| data.value(i))
                .enumerate()
                .find(|(_, v)| !v.is_null());
            match first {
                None => Ok(GeometryArray::nulls(data.len(), crs.cloned())),
                Some((position, found)) => Err(GeometryError::NotGeometry {
                    position,
                    found: found.type_name(),
                }),
            }
        }
    }
}

/// Apply the CRS decision table to incoming geometry.
///
/// | incoming | supplied | result |
/// |---|---|---|
/// | any | none | incoming kept |
/// | none | set | tagged copy |
/// | set | equal | kept |
/// | set | different | [`GeoFrameError::CrsMismatch`] |
pub fn reconcile_crs(incoming: GeometryArray, supplied: Option<&Crs>) -> GeoFrameResult<GeometryArray> {
    match (incoming.crs(), supplied) {
        (_, None) => Ok(incoming),
        (None, Some(crs)) => Ok(incoming.with_crs(Some(crs.clone()))),
        (Some(existing), Some(crs)) if existing == crs => Ok(incoming),
        (Some(existing), Some(crs)) => Err(GeoFrameError::CrsMismatch {
            existing: display_opt(Some(existing)),
            supplied: crs.to_string(),
        }),
    }
}

/// Turn a plain table into a geometry-aware one with `column` as active
/// geometry.
pub fn to_geometry_aware(
    plain: DataFrame,
    column: impl Into<GeometryInput>,
    crs: Option<Crs>,
) -> GeoFrameResult<GeoDataFrame> {
    let mut out = GeoDataFrame {
        frame: plain,
        active: None,
        promote_default_name: false,
    };
    out.set_geometry_in_place(column.into(), SetGeometryOptions { crs, drop: None })?;
    Ok(out)
}

impl GeoDataFrame {
    /// Name of the active geometry column, if set.
    pub fn active_geometry_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active geometry array.
    pub(crate) fn active_array(&self) -> GeoFrameResult<&GeometryArray> {
        let Some(name) = self.active.as_deref() else {
            return Err(GeoFrameError::NoActiveGeometry {
                geometry_columns: self.geometry_columns(),
            });
        };
        let missing = || GeoFrameError::ActiveGeometryMissing {
            name: name.to_string(),
            geometry_columns: self.geometry_columns(),
        };
        if self.frame.positions(name).len() != 1 {
            return Err(missing());
        }
        match self.frame.column(name) {
            Ok(ColumnData::Geometry(g)) => Ok(g),
            _ => Err(missing()),
        }
    }

    /// The active geometry column as a series.
    pub fn geometry(&self) -> GeoFrameResult<GeoSeries> {
        let values = self.active_array()?.clone();
        GeoSeries::new(self.active.clone(), self.index().clone(), values)
    }

    /// New table whose active geometry is `col`.
    ///
    /// A column name becomes active in place (its values re-tagged if `crs`
    /// is given). Arrays, values and series are written into the current
    /// active column name (or `geometry`), except that a named series keeps
    /// its name.
    pub fn set_geometry(
        &self,
        col: impl Into<GeometryInput>,
        opts: SetGeometryOptions,
    ) -> GeoFrameResult<GeoDataFrame> {
        let mut out = self.clone();
        out.set_geometry_in_place(col.into(), opts)?;
        Ok(out)
    }

    /// Worker for [`GeoDataFrame::set_geometry`]. Callers discard `self` on
    /// error.
    pub(crate) fn set_geometry_in_place(
        &mut self,
        col: GeometryInput,
        opts: SetGeometryOptions,
    ) -> GeoFrameResult<()> {
        let SetGeometryOptions { crs, drop } = opts;
        let mut target = self
            .active
            .clone()
            .unwrap_or_else(|| DEFAULT_GEOMETRY_NAME.to_string());

        let incoming = match col {
            GeometryInput::Column(name) => {
                match self.frame.positions(&name).len() {
                    0 => return Err(GeoFrameError::UnknownColumn { name }),
                    1 => {}
                    _ => return Err(GeoFrameError::AmbiguousColumn { name }),
                }
                let data = self.frame.column(&name)?.clone();
                match drop {
                    Some(true) => {
                        warn!("{DROP_DEPRECATED}");
                        self.frame = self.frame.drop_column(&name)?;
                    }
                    Some(false) => {
                        warn!("{DROP_DEPRECATED}");
                        target = name;
                    }
                    None => target = name,
                }
                ensure_geometry(&data, None).context(CoercionSnafu {
                    column: target.clone(),
                })?
            }
            GeometryInput::Array(values) => {
                warn_drop_no_effect(drop);
                values
            }
            GeometryInput::Values(values) => {
                warn_drop_no_effect(drop);
                GeometryArray::from_values(&values, None).context(CoercionSnafu {
                    column: target.clone(),
                })?
            }
            GeometryInput::Series(series) => {
                warn_drop_no_effect(drop);
                if let Some(name) = &series.name {
                    target = name.clone();
                }
                series.into_values()
            }
        };

        let values = reconcile_crs(incoming, crs.as_ref())?;
        self.active = Some(target.clone());
        self.frame.set_column(&target, ColumnData::Geometry(values))?;
        Ok(())
    }

    /// New table with the active geometry column renamed.
    pub fn rename_geometry(&self, name: &str) -> GeoFrameResult<GeoDataFrame> {
        self.active_array()?;
        let Some(current) = self.active.as_deref() else {
            return Err(GeoFrameError::NoActiveGeometry {
                geometry_columns: self.geometry_columns(),
            });
        };
        if self.frame.contains(name) {
            return Err(GeoFrameError::ColumnExists {
                name: name.to_string(),
            });
        }
        Ok(GeoDataFrame {
            frame: self.frame.rename_column(current, name)?,
            active: Some(name.to_string()),
            promote_default_name: self.promote_default_name,
        })
    }

    /// Assign a column.
    ///
    /// Data assigned to the active geometry name is coerced to geometry and
    /// keeps the table CRS unless it carries its own. Data that is not
    /// geometry is stored as a plain column and the table loses its active
    /// geometry.
    pub fn assign(&mut self, name: &str, data: impl Into<ColumnData>) -> GeoFrameResult<()> {
        let data = data.into();
        let is_active = self.active.as_deref() == Some(name);
        let is_default_slot = self.active.is_none() && name == DEFAULT_GEOMETRY_NAME;
        if !is_active && !is_default_slot {
            self.frame.set_column(name, data)?;
            return Ok(());
        }

        let crs = self.active_array().ok().and_then(|g| g.crs().cloned());
        match ensure_geometry(&data, crs.as_ref()) {
            Ok(values) => {
                let promote = is_default_slot && self.promotes_default_name(name);
                self.frame.set_column(name, ColumnData::Geometry(values))?;
                if promote {
                    self.promote_default_geometry(name);
                }
            }
            Err(_) => {
                warn!("Geometry column does not contain geometry.");
                self.frame.set_column(name, data)?;
                if is_active {
                    self.active = None;
                }
            }
        }
        Ok(())
    }

    /// Assign one value to every row of a column.
    pub fn assign_scalar(&mut self, name: &str, value: impl Into<Value>) -> GeoFrameResult<()> {
        let values = vec![value.into(); self.nrows()];
        let data = match values.first() {
            Some(Value::Geometry(_)) => ColumnData::Geometry(GeometryArray::from_values(&values, None)?),
            _ => ColumnData::from_values(values),
        };
        self.assign(name, data)
    }

    fn promotes_default_name(&self, name: &str) -> bool {
        self.promote_default_name && !self.frame.contains(name)
    }

    /// Only called once the column is stored, so the active name always
    /// resolves.
    fn promote_default_geometry(&mut self, name: &str) {
        warn!(
            "You are adding a column named 'geometry' to a GeoDataFrame constructed without an \
             active geometry column. This sets the active geometry column to 'geometry'; use \
             set_geometry(\"geometry\") to set it explicitly."
        );
        self.active = Some(name.to_string());
    }

    /// Drop every column with this name; dropping the active geometry leaves
    /// the result without one (or a plain table when no geometry is left).
    pub fn drop_column(&self, name: &str) -> GeoFrameResult<Table> {
        let frame = self.frame.drop_column(name)?;
        reconstruct(frame, Derivation::Default(self))
    }
}
