//! Preparation of forcing maps for plotting
//!
//! Rendering is left to the caller. This module produces what a diverging, zero-centred map
//! of forcing needs: the time-mean field, symmetric colour limits and a longitude axis that
//! wraps around the dateline.

use crate::errors::{RfmipError, RfmipResult};
use crate::grid::{Axis, FloatValue, GriddedField};
use ndarray::{concatenate, ArrayD, Axis as NdAxis};
use serde::{Deserialize, Serialize};

/// Full circle in degrees longitude
const FULL_CIRCLE: FloatValue = 360.0;

/// Plain mean over time, if the field has a time axis
pub fn time_mean_map(field: &GriddedField) -> RfmipResult<GriddedField> {
    if field.has_axis(Axis::Time) {
        field.mean_over(Axis::Time)
    } else {
        Ok(field.clone())
    }
}

/// `(-v, v)` with `v` the largest finite magnitude in `values`
pub fn symmetric_limits(values: &ArrayD<FloatValue>) -> RfmipResult<(FloatValue, FloatValue)> {
    let extent = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .fold(None, |acc: Option<FloatValue>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        })
        .ok_or_else(|| {
            RfmipError::DegenerateInput("no finite values to derive colour limits from".to_string())
        })?;
    Ok((-extent, extent))
}

/// Repeat the first longitude column at `lon[0] + 360`
pub fn add_cyclic_point(field: &GriddedField) -> RfmipResult<GriddedField> {
    let position = field.axis_index(Axis::Longitude)?;
    let longitudes = field
        .longitudes()
        .ok_or_else(|| RfmipError::MissingAxis {
            axis: Axis::Longitude.to_string(),
        })?;
    if longitudes.is_empty() {
        return Err(RfmipError::DegenerateInput(
            "longitude axis is empty".to_string(),
        ));
    }

    let axis = NdAxis(position);
    let first = field.values().index_axis(axis, 0).insert_axis(axis);
    let values = concatenate(axis, &[field.values().view(), first])
        .map_err(|e| RfmipError::Error(e.to_string()))?;

    let mut wrapped = longitudes.to_vec();
    wrapped.push(longitudes[0] + FULL_CIRCLE);
    let coords = field.coords().with(Axis::Longitude, wrapped.into());
    GriddedField::new(values, field.axes().to_vec(), coords)
}

/// Everything needed to draw one forcing map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    /// Time-mean field with a cyclic longitude point
    pub map: GriddedField,
    pub vmin: FloatValue,
    pub vmax: FloatValue,
}

/// Time mean, colour limits and cyclic point in one go
///
/// Limits are taken from the time-mean field before the cyclic column is added.
pub fn summarise_map(field: &GriddedField) -> RfmipResult<MapSummary> {
    let mean = time_mean_map(field)?;
    let (vmin, vmax) = symmetric_limits(mean.values())?;
    Ok(MapSummary {
        map: add_cyclic_point(&mean)?,
        vmin,
        vmax,
    })
}
