//! Python entry points for the forcing and statistics functions
//!
//! Signatures follow the `forcing_tools` package so existing notebooks keep working:
//!
//! ```python
//! from rfmip.core import FluxBundle, compute_forcings_allsky, global_mean
//!
//! sw, lw = compute_forcings_allsky(aerosol, control)
//! area_mean, value = global_mean(sw)
//! ```

use super::field::{PyFluxBundle, PyGriddedField};
use crate::aggregate::TimeSeriesOptions;
use crate::grid::{FloatValue, GriddedField};
use crate::stats::PopulationMean;
use crate::{aggregate, cloudy, ensemble, forcing, map, stats};
use numpy::{IntoPyArray, PyArrayDyn, PyReadonlyArrayDyn};
use pyo3::prelude::*;

type FieldPair = (PyGriddedField, PyGriddedField);

fn population_mean(value: &Bound<'_, PyAny>) -> PyResult<PopulationMean> {
    if let Ok(scalar) = value.extract::<FloatValue>() {
        return Ok(PopulationMean::Scalar(scalar));
    }
    let array: PyReadonlyArrayDyn<'_, FloatValue> = value.extract()?;
    Ok(PopulationMean::Field(array.as_array().to_owned()))
}

/// Shortwave and longwave all-sky forcing (aerosol minus control)
#[pyfunction]
pub fn compute_forcings_allsky(
    aerosol: PyRef<'_, PyFluxBundle>,
    control: PyRef<'_, PyFluxBundle>,
) -> PyResult<FieldPair> {
    let result = forcing::compute_forcings_allsky(&aerosol.0, &control.0)?;
    Ok((
        PyGriddedField(result.shortwave),
        PyGriddedField(result.longwave),
    ))
}

/// Shortwave and longwave clear-sky forcing (aerosol minus control)
#[pyfunction]
pub fn compute_forcings_clearsky(
    aerosol: PyRef<'_, PyFluxBundle>,
    control: PyRef<'_, PyFluxBundle>,
) -> PyResult<FieldPair> {
    let result = forcing::compute_forcings_clearsky(&aerosol.0, &control.0)?;
    Ok((
        PyGriddedField(result.shortwave),
        PyGriddedField(result.longwave),
    ))
}

/// Cloudy-sky forcing as `(sw_control, sw_aerosol, lw_control, lw_aerosol)`
#[pyfunction]
pub fn compute_cloudy_sky(
    aerosol: PyRef<'_, PyFluxBundle>,
    control: PyRef<'_, PyFluxBundle>,
) -> PyResult<(PyGriddedField, PyGriddedField, PyGriddedField, PyGriddedField)> {
    let (sw_control, sw_aerosol, lw_control, lw_aerosol) =
        cloudy::compute_cloudy_sky(&aerosol.0, &control.0)?.into_tuple();
    Ok((
        PyGriddedField(sw_control),
        PyGriddedField(sw_aerosol),
        PyGriddedField(lw_control),
        PyGriddedField(lw_aerosol),
    ))
}

/// Cos-latitude weighted mean, returned as `(area_mean, global_value)`
#[pyfunction]
pub fn global_mean(field: PyRef<'_, PyGriddedField>) -> PyResult<(PyGriddedField, FloatValue)> {
    let result = aggregate::global_mean(&field.0)?;
    Ok((PyGriddedField(result.area_mean), result.global))
}

/// Area-weighted time series over the cells valid at `reference_index`
#[pyfunction]
#[pyo3(signature = (field, grid_dist=1.0, reference_index=0))]
pub fn time_series(
    field: PyRef<'_, PyGriddedField>,
    grid_dist: FloatValue,
    reference_index: usize,
) -> PyResult<PyGriddedField> {
    let options = TimeSeriesOptions {
        reference_index,
        ..TimeSeriesOptions::with_grid_spacing(grid_dist)
    };
    Ok(PyGriddedField(aggregate::time_series(&field.0, &options)?))
}

/// One-sample t-test over the time axis, returned as `(t_statistic, p_value)`
#[pyfunction]
#[pyo3(signature = (field, n, pop_mean=None))]
pub fn t_test(
    field: PyRef<'_, PyGriddedField>,
    n: usize,
    pop_mean: Option<Bound<'_, PyAny>>,
) -> PyResult<FieldPair> {
    let mu = match pop_mean {
        Some(value) => population_mean(&value)?,
        None => PopulationMean::default(),
    };
    let (t, p) = stats::t_test(&field.0, n, &mu)?;
    Ok((PyGriddedField(t), PyGriddedField(p)))
}

/// One-sample t-test over one axis of a numpy array
#[pyfunction]
#[pyo3(signature = (data, n, pop_mean=None, axis=0))]
pub fn t_test_nd<'py>(
    py: Python<'py>,
    data: PyReadonlyArrayDyn<'py, FloatValue>,
    n: usize,
    pop_mean: Option<Bound<'py, PyAny>>,
    axis: usize,
) -> PyResult<(
    Bound<'py, PyArrayDyn<FloatValue>>,
    Bound<'py, PyArrayDyn<FloatValue>>,
)> {
    let mu = match pop_mean {
        Some(value) => population_mean(&value)?,
        None => PopulationMean::default(),
    };
    let result = stats::t_test_nd(&data.as_array().to_owned(), axis, n, &mu)?;
    Ok((
        result.t_statistic.into_pyarray_bound(py),
        result.p_value.into_pyarray_bound(py),
    ))
}

/// Mean of several realizations of one field
#[pyfunction]
pub fn ensemble_mean(members: Vec<PyGriddedField>) -> PyResult<PyGriddedField> {
    let members: Vec<GriddedField> = members.into_iter().map(|m| m.0).collect();
    Ok(PyGriddedField(ensemble::ensemble_mean(&members)?))
}

/// Time-mean map with a cyclic longitude, returned as `(map, vmin, vmax)`
#[pyfunction]
pub fn summarise_map(
    field: PyRef<'_, PyGriddedField>,
) -> PyResult<(PyGriddedField, FloatValue, FloatValue)> {
    let summary = map::summarise_map(&field.0)?;
    Ok((PyGriddedField(summary.map), summary.vmin, summary.vmax))
}
