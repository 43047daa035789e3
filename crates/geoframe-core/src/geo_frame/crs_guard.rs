//! CRS read-through and retagging.
//!
//! The table CRS is the CRS of its active geometry array. `set_crs` only
//! retags metadata; `to_crs` reprojects the active column through a
//! [`Projector`] and leaves every other geometry column alone.

use snafu::prelude::*;

use crate::{
    crs::{display_opt, Crs},
    frame::ColumnData,
    geometry::{
        project::{utm_epsg_for, BuiltinProjector, Projector},
        GeometryArray,
    },
};

use super::{
    error::{GeoFrameError, GeoFrameResult, ProjectionSnafu},
    GeoDataFrame,
};

/// Retag an array, refusing to replace a different existing CRS unless
/// `allow_override` is set.
pub(crate) fn retag(
    values: &GeometryArray,
    crs: Option<Crs>,
    allow_override: bool,
) -> GeoFrameResult<GeometryArray> {
    if let Some(existing) = values.crs() {
        if !allow_override && Some(existing) != crs.as_ref() {
            return Err(GeoFrameError::CrsOverride {
                existing: existing.to_string(),
                supplied: display_opt(crs.as_ref()),
            });
        }
    }
    Ok(values.with_crs(crs))
}

/// Reproject every geometry of an array.
pub(crate) fn reproject(
    values: &GeometryArray,
    to: &Crs,
    projector: &dyn Projector,
) -> GeoFrameResult<GeometryArray> {
    let from = values.crs().ok_or(GeoFrameError::NaiveGeometry)?;
    if from == to {
        return Ok(values.clone());
    }
    let out = values
        .iter()
        .map(|g| g.map(|g| projector.transform(g, from, to)).transpose())
        .collect::<Result<Vec<_>, _>>()
        .context(ProjectionSnafu)?;
    Ok(GeometryArray::new(out, Some(to.clone())))
}

impl GeoDataFrame {
    /// CRS of the active geometry column.
    ///
    /// Fails when there is no active geometry; a table without one has no
    /// CRS, not a missing one.
    pub fn crs(&self) -> GeoFrameResult<Option<&Crs>> {
        Ok(self.active_array()?.crs())
    }

    /// New table whose active geometry is tagged with `crs`, without
    /// transforming coordinates.
    ///
    /// `None` removes the tag. Replacing or removing an existing CRS
    /// requires `allow_override`.
    pub fn set_crs(&self, crs: Option<Crs>, allow_override: bool) -> GeoFrameResult<GeoDataFrame> {
        if self.active.is_none() {
            return Err(GeoFrameError::CrsWithoutActiveGeometry);
        }
        let values = retag(self.active_array()?, crs, allow_override)?;
        self.with_active_values(values)
    }

    /// [`GeoDataFrame::set_crs`] from an EPSG code.
    pub fn set_crs_epsg(&self, code: u32, allow_override: bool) -> GeoFrameResult<GeoDataFrame> {
        self.set_crs(Some(Crs::from_epsg(code)), allow_override)
    }

    /// Reproject the active geometry with the built-in projector.
    pub fn to_crs(&self, crs: &Crs) -> GeoFrameResult<GeoDataFrame> {
        self.to_crs_with(crs, &BuiltinProjector)
    }

    /// Reproject the active geometry with a caller-supplied projector.
    pub fn to_crs_with(&self, crs: &Crs, projector: &dyn Projector) -> GeoFrameResult<GeoDataFrame> {
        let values = reproject(self.active_array()?, crs, projector)?;
        self.with_active_values(values)
    }

    /// UTM zone CRS containing the centre of the active geometry's bounds.
    pub fn estimate_utm_crs(&self) -> GeoFrameResult<Crs> {
        let values = self.active_array()?;
        let crs = values.crs().ok_or(GeoFrameError::NaiveGeometry)?;
        let lonlat = if crs.is_wgs84() {
            values.clone()
        } else {
            reproject(values, &Crs::wgs84(), &BuiltinProjector)?
        };
        let [minx, miny, maxx, maxy] =
            lonlat
                .total_bounds()
                .ok_or_else(|| GeoFrameError::InvalidArgument {
                    message: "Cannot determine a UTM zone for empty geometries".to_string(),
                })?;
        let code = utm_epsg_for((minx + maxx) / 2.0, (miny + maxy) / 2.0);
        Ok(Crs::from_epsg(code))
    }

    fn with_active_values(&self, values: GeometryArray) -> GeoFrameResult<GeoDataFrame> {
        let mut out = self.clone();
        if let Some(name) = self.active.as_deref() {
            out.frame.set_column(name, ColumnData::Geometry(values))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, DataFrame};
    use crate::geo_frame::{GeoFrameOptions, SetGeometryOptions};
    use geo_types::{point, Geometry};

    fn sample() -> GeoFrameResult<GeoDataFrame> {
        GeoDataFrame::from_columns(
            vec![
                Column::new("a", vec![1_i64]),
                Column::new(
                    "geometry",
                    GeometryArray::from_geometries([Geometry::Point(point!(x: 10.0, y: 50.0))], None),
                ),
            ],
            GeoFrameOptions::default().with_crs(Crs::from_epsg(4326)),
        )
    }

    #[test]
    fn set_crs_requires_override_to_replace() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let same = gdf.set_crs(Some(Crs::from_epsg(4326)), false)?;
        assert_eq!(same.crs()?, Some(&Crs::from_epsg(4326)));

        assert!(matches!(
            gdf.set_crs_epsg(3857, false),
            Err(GeoFrameError::CrsOverride { .. })
        ));
        let replaced = gdf.set_crs_epsg(3857, true)?;
        assert_eq!(replaced.crs()?, Some(&Crs::from_epsg(3857)));
        assert_eq!(gdf.crs()?, Some(&Crs::from_epsg(4326)));
        Ok(())
    }

    #[test]
    fn set_crs_without_active_geometry_fails() -> GeoFrameResult<()> {
        let gdf = GeoDataFrame::new(
            DataFrame::from_columns(vec![Column::new("a", vec![1_i64])])?,
            GeoFrameOptions::default(),
        )?;
        assert!(matches!(
            gdf.set_crs_epsg(4326, false),
            Err(GeoFrameError::CrsWithoutActiveGeometry)
        ));
        Ok(())
    }

    #[test]
    fn to_crs_only_touches_active_column() -> GeoFrameResult<()> {
        let mut gdf = sample()?;
        gdf.assign(
            "other",
            GeometryArray::from_geometries(
                [Geometry::Point(point!(x: 1.0, y: 1.0))],
                Some(Crs::from_epsg(4326)),
            ),
        )?;
        let merc = gdf.to_crs(&Crs::from_epsg(3857))?;
        assert_eq!(merc.crs()?, Some(&Crs::from_epsg(3857)));
        let other = merc.frame().column("other")?.as_geometry().and_then(|g| g.crs());
        assert_eq!(other, Some(&Crs::from_epsg(4326)));
        let back = merc.to_crs(&Crs::from_epsg(4326))?;
        let p = back.geometry()?;
        match p.get(0) {
            Some(Geometry::Point(p)) => {
                assert!((p.x() - 10.0).abs() < 1e-9 && (p.y() - 50.0).abs() < 1e-9)
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn removing_a_crs_needs_override() -> GeoFrameResult<()> {
        assert!(matches!(
            sample()?.set_crs(None, false),
            Err(GeoFrameError::CrsOverride { .. })
        ));
        let naive = sample()?.set_crs(None, true)?;
        assert_eq!(naive.crs()?, None);
        let tagged = naive.set_crs(None, false)?.set_crs_epsg(3857, false)?;
        assert_eq!(tagged.crs()?, Some(&Crs::from_epsg(3857)));
        Ok(())
    }

    #[test]
    fn naive_geometry_can_not_be_reprojected() -> GeoFrameResult<()> {
        let gdf = sample()?.set_crs(None, true)?;
        assert_eq!(gdf.crs()?, None);
        assert!(matches!(
            gdf.to_crs(&Crs::from_epsg(3857)),
            Err(GeoFrameError::NaiveGeometry)
        ));
        Ok(())
    }

    #[test]
    fn utm_zone_is_estimated_from_bounds() -> GeoFrameResult<()> {
        assert_eq!(sample()?.estimate_utm_crs()?, Crs::from_epsg(32632));
        let merc = sample()?.to_crs(&Crs::from_epsg(3857))?;
        assert_eq!(merc.estimate_utm_crs()?, Crs::from_epsg(32632));
        Ok(())
    }

    #[test]
    fn copy_on_write_crs() -> GeoFrameResult<()> {
        let gdf = sample()?;
        let copy = gdf.copy();
        let retagged = copy.set_crs_epsg(3857, true)?;
        assert_eq!(gdf.crs()?, Some(&Crs::from_epsg(4326)));
        assert_eq!(retagged.crs()?, Some(&Crs::from_epsg(3857)));
        let untouched = gdf.set_geometry("geometry", SetGeometryOptions::default())?;
        assert_eq!(untouched.crs()?, Some(&Crs::from_epsg(4326)));
        Ok(())
    }
}
