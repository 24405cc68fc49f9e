//! Spatial and temporal aggregation of gridded fields
//!
//! Two weighting schemes are provided:
//!
//! - [`area_weighted_mean`] / [`global_mean`]: each latitude row is weighted by
//!   $\cos(\phi)$, proportional to the surface area of a regular latitude-longitude cell.
//!   This only needs the latitude coordinates.
//! - [`time_series`]: each cell is weighted by its physical area
//!   $R^2 \, \Delta\phi \, \Delta\lambda \cos(\phi)$, restricted to the cells that hold data at a
//!   reference time step, giving a global mean series over the valid (e.g. land-only or
//!   ocean-only) region.
//!
//! Full precision is kept throughout. The RFMIP reports quote global means to two decimals;
//! use [`round_to`] at the presentation boundary.

use crate::errors::{RfmipError, RfmipResult};
use crate::grid::{Axis, FloatValue, GriddedField};
use crate::utils::guarded_division::guarded_divide;
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayD, Ix3, IxDyn};
use serde::{Deserialize, Serialize};

/// Earth radius used for cell areas
///
/// unit: m
pub const EARTH_RADIUS_M: FloatValue = 6.37e6;

/// Weight of each latitude row: $\cos(\phi)$ with $\phi$ in radians
pub fn latitude_weights(latitudes: &Array1<FloatValue>) -> Array1<FloatValue> {
    latitudes.mapv(|lat| lat.to_radians().cos())
}

/// Result of [`global_mean`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMean {
    /// Area-weighted mean over the horizontal axes, keeping any other axis (usually time)
    pub area_mean: GriddedField,
    /// Plain mean of `area_mean` over all remaining axes
    pub global: FloatValue,
}

/// Cosine-latitude weighted mean over latitude and, if present, longitude
///
/// Missing (NaN) cells are skipped and the weights renormalised over the valid cells. A slice
/// without any valid cell yields NaN. The remaining axes keep their order and coordinates, so a
/// `(time, lat, lon)` field becomes a `(time)` series and a `(lat, lon)` map a zero-dimensional
/// field.
///
/// # Errors
/// [`RfmipError::MissingAxis`] if the field has no latitude axis.
pub fn area_weighted_mean(field: &GriddedField) -> RfmipResult<GriddedField> {
    let lat_axis = field.axis_index(Axis::Latitude)?;
    let lon_axis = field.axis_index(Axis::Longitude).ok();
    let latitudes = field.latitudes().ok_or_else(|| RfmipError::MissingAxis {
        axis: Axis::Latitude.to_string(),
    })?;

    let shape = field.shape();
    let kept: Vec<usize> = (0..shape.len())
        .filter(|i| *i != lat_axis && Some(*i) != lon_axis)
        .collect();
    let kept_shape: Vec<usize> = kept.iter().map(|i| shape[*i]).collect();
    let n_lon = lon_axis.map(|i| shape[i]).unwrap_or(1);

    let mut order = kept.clone();
    order.push(lat_axis);
    order.extend(lon_axis);

    let weights = latitude_weights(latitudes);
    let permuted = field.values().view().permuted_axes(order);
    let spatial = latitudes.len() * n_lon;
    let outer = kept_shape.iter().product::<usize>();

    let mut means = Vec::with_capacity(outer);
    let mut empty_slices = 0;
    let flat: Vec<FloatValue> = permuted.iter().copied().collect();
    for chunk in flat.chunks(spatial.max(1)).take(outer) {
        let (mut weighted_sum, mut weight_sum) = (0.0, 0.0);
        for (k, value) in chunk.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            let w = weights[k / n_lon];
            weighted_sum += w * value;
            weight_sum += w;
        }
        if weight_sum == 0.0 {
            empty_slices += 1;
        }
        means.push(guarded_divide(weighted_sum, weight_sum, 0.0, FloatValue::NAN));
    }
    if empty_slices > 0 {
        warn!(
            "{} of {} slices have no valid cells; their area-weighted mean is NaN",
            empty_slices, outer
        );
    }

    let values = ArrayD::from_shape_vec(IxDyn(&kept_shape), means)
        .map_err(|e| RfmipError::Error(e.to_string()))?;
    let kept_axes: Vec<Axis> = kept.iter().map(|i| field.axes()[*i]).collect();
    let coords = field.coords().without(Axis::Latitude).without(Axis::Longitude);
    GriddedField::new(values, kept_axes, coords)
}

/// Area-weighted mean followed by a plain mean over whatever axes remain
///
/// NaN entries of the area mean are ignored by the second step.
pub fn global_mean(field: &GriddedField) -> RfmipResult<GlobalMean> {
    debug!("Computing global mean of field with axes {:?}", field.axes());
    let area_mean = area_weighted_mean(field)?;

    let valid: Vec<FloatValue> = area_mean
        .values()
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    let global = if valid.is_empty() {
        FloatValue::NAN
    } else {
        valid.iter().sum::<FloatValue>() / valid.len() as FloatValue
    };

    Ok(GlobalMean { area_mean, global })
}

/// Options for [`time_series`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesOptions {
    /// Spacing between grid points in both latitude and longitude
    /// unit: degrees
    pub grid_spacing_deg: FloatValue,
    /// unit: m
    pub earth_radius_m: FloatValue,
    /// Time step whose missing values define the mask
    pub reference_index: usize,
}

impl Default for TimeSeriesOptions {
    fn default() -> Self {
        Self {
            grid_spacing_deg: 1.0,
            earth_radius_m: EARTH_RADIUS_M,
            reference_index: 0,
        }
    }
}

impl TimeSeriesOptions {
    pub fn with_grid_spacing(grid_spacing_deg: FloatValue) -> Self {
        Self {
            grid_spacing_deg,
            ..Self::default()
        }
    }

    fn validate(&self) -> RfmipResult<()> {
        if !(self.grid_spacing_deg.is_finite() && self.grid_spacing_deg > 0.0) {
            return Err(RfmipError::InvalidGrid(format!(
                "Grid spacing must be positive, got {}",
                self.grid_spacing_deg
            )));
        }
        if !(self.earth_radius_m.is_finite() && self.earth_radius_m > 0.0) {
            return Err(RfmipError::InvalidGrid(format!(
                "Earth radius must be positive, got {}",
                self.earth_radius_m
            )));
        }
        Ok(())
    }
}

/// Surface area of each `(lat, lon)` cell: $R^2 \, \Delta\phi \, \Delta\lambda \cos(\phi)$
///
/// unit: m^2
pub fn cell_areas(
    latitudes: &Array1<FloatValue>,
    n_lon: usize,
    options: &TimeSeriesOptions,
) -> Array2<FloatValue> {
    let spacing = options.grid_spacing_deg.to_radians();
    let row_area = latitudes
        .mapv(|lat| options.earth_radius_m.powi(2) * spacing * spacing * lat.to_radians().cos());
    Array2::from_shape_fn((latitudes.len(), n_lon), |(i, _)| row_area[i])
}

/// Area-weighted series over the cells that are valid at the reference time step
///
/// Cells that are NaN at `options.reference_index` are excluded from both numerator and
/// denominator. The total area of the valid cells is fixed for every time step; NaN values at
/// later steps inside valid cells add nothing to that step's sum.
///
/// # Errors
///
/// * [`RfmipError::MissingAxis`] unless the field has time, latitude and longitude axes
/// * [`RfmipError::DegenerateInput`] if no cell is valid at the reference time step
/// * [`RfmipError::InvalidGrid`] for non-positive grid spacing or radius
pub fn time_series(field: &GriddedField, options: &TimeSeriesOptions) -> RfmipResult<GriddedField> {
    options.validate()?;
    let order = [
        field.axis_index(Axis::Time)?,
        field.axis_index(Axis::Latitude)?,
        field.axis_index(Axis::Longitude)?,
    ];
    let latitudes = field.latitudes().ok_or_else(|| RfmipError::MissingAxis {
        axis: Axis::Latitude.to_string(),
    })?;

    let values = field
        .values()
        .view()
        .permuted_axes(order.to_vec())
        .into_dimensionality::<Ix3>()
        .map_err(|e| RfmipError::Error(e.to_string()))?;
    let (n_time, n_lat, n_lon) = values.dim();
    if options.reference_index >= n_time {
        return Err(RfmipError::Error(format!(
            "Reference index {} is out of bounds for {} time steps",
            options.reference_index, n_time
        )));
    }

    let areas = cell_areas(latitudes, n_lon, options);
    let reference = values.index_axis(ndarray::Axis(0), options.reference_index);
    let pixel_area = Array2::from_shape_fn((n_lat, n_lon), |(i, j)| {
        if reference[[i, j]].is_nan() {
            0.0
        } else {
            areas[[i, j]]
        }
    });
    let total_area: FloatValue = pixel_area.sum();
    if total_area <= 0.0 {
        return Err(RfmipError::DegenerateInput(format!(
            "no valid cells at reference time step {}; total area is zero",
            options.reference_index
        )));
    }
    debug!(
        "Weighted time series over {} time steps, valid area {:.4e} m^2",
        n_time, total_area
    );

    let series = Array1::from_shape_fn(n_time, |t| {
        let step = values.index_axis(ndarray::Axis(0), t);
        let weighted: FloatValue = step
            .iter()
            .zip(pixel_area.iter())
            .filter(|(v, a)| **a > 0.0 && !v.is_nan())
            .map(|(v, a)| v * a)
            .sum();
        weighted / total_area
    });

    GriddedField::from_time_series(series, field.times().cloned())
}

/// Round to `decimals` places for reporting (half away from zero)
pub fn round_to(value: FloatValue, decimals: u32) -> FloatValue {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
