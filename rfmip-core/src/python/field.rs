//! Python wrappers for gridded fields and flux bundles

use crate::errors::RfmipResult;
use crate::flux::{FluxBundle, FluxVariable};
use crate::grid::{Axis, Coordinates, FloatValue, GriddedField};
use numpy::{PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArrayDyn, ToPyArray};
use pyo3::prelude::*;

/// Python wrapper for GriddedField
///
/// Example:
///     field = GriddedField(
///         values,               # numpy array with shape (time, lat, lon)
///         ["time", "lat", "lon"],
///         lat=lat,
///         lon=lon,
///     )
#[pyclass]
#[pyo3(name = "GriddedField")]
#[derive(Debug, Clone)]
pub struct PyGriddedField(pub GriddedField);

#[pymethods]
impl PyGriddedField {
    #[new]
    #[pyo3(signature = (values, axes, lat=None, lon=None, time=None))]
    fn new(
        values: PyReadonlyArrayDyn<'_, FloatValue>,
        axes: Vec<String>,
        lat: Option<PyReadonlyArray1<'_, FloatValue>>,
        lon: Option<PyReadonlyArray1<'_, FloatValue>>,
        time: Option<PyReadonlyArray1<'_, FloatValue>>,
    ) -> PyResult<Self> {
        let axes = axes
            .iter()
            .map(|a| a.parse::<Axis>())
            .collect::<RfmipResult<Vec<Axis>>>()?;
        let coords = Coordinates {
            time: time.map(|t| t.as_array().to_owned()),
            latitude: lat.map(|l| l.as_array().to_owned()),
            longitude: lon.map(|l| l.as_array().to_owned()),
        };
        Ok(Self(GriddedField::new(
            values.as_array().to_owned(),
            axes,
            coords,
        )?))
    }

    #[getter]
    fn values<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<FloatValue>> {
        self.0.values().to_pyarray_bound(py)
    }

    #[getter]
    fn axes(&self) -> Vec<String> {
        self.0.axes().iter().map(|a| a.to_string()).collect()
    }

    #[getter]
    fn shape(&self) -> Vec<usize> {
        self.0.shape().to_vec()
    }

    #[getter]
    fn lat<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<FloatValue>>> {
        self.0.latitudes().map(|l| l.to_pyarray_bound(py))
    }

    #[getter]
    fn lon<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<FloatValue>>> {
        self.0.longitudes().map(|l| l.to_pyarray_bound(py))
    }

    #[getter]
    fn time<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<FloatValue>>> {
        self.0.times().map(|t| t.to_pyarray_bound(py))
    }

    /// Plain mean over the named axis
    fn mean_over(&self, axis: &str) -> PyResult<Self> {
        Ok(Self(self.0.mean_over(axis.parse()?)?))
    }

    fn __repr__(&self) -> String {
        format!(
            "GriddedField(axes={:?}, shape={:?})",
            self.axes(),
            self.0.shape()
        )
    }
}

/// Python wrapper for FluxBundle
///
/// Fields are keyed by CMIP6 short name (`rsdt`, `rsut`, `rlut`, `rsutcs`, `rlutcs`, `clt`).
#[pyclass]
#[pyo3(name = "FluxBundle")]
#[derive(Debug, Clone, Default)]
pub struct PyFluxBundle(pub FluxBundle);

#[pymethods]
impl PyFluxBundle {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, variable: &str, field: PyGriddedField) -> PyResult<()> {
        self.0.insert(variable.parse()?, field.0);
        Ok(())
    }

    fn get(&self, variable: &str) -> PyResult<PyGriddedField> {
        Ok(PyGriddedField(self.0.get(variable.parse()?)?.clone()))
    }

    fn variables(&self) -> Vec<String> {
        self.0.variables().map(|v| v.to_string()).collect()
    }

    /// Per-variable mean over realizations
    #[staticmethod]
    fn ensemble_mean(members: Vec<PyFluxBundle>) -> PyResult<Self> {
        let members: Vec<FluxBundle> = members.into_iter().map(|m| m.0).collect();
        Ok(Self(FluxBundle::ensemble_mean(&members)?))
    }

    fn __len__(&self) -> usize {
        self.0.len()
    }

    fn __contains__(&self, variable: &str) -> bool {
        variable
            .parse::<FluxVariable>()
            .map(|v| self.0.contains(v))
            .unwrap_or(false)
    }

    fn __getitem__(&self, variable: &str) -> PyResult<PyGriddedField> {
        self.get(variable)
    }

    fn __setitem__(&mut self, variable: &str, field: PyGriddedField) -> PyResult<()> {
        self.insert(variable, field)
    }

    fn __repr__(&self) -> String {
        format!("FluxBundle(variables={:?})", self.variables())
    }
}
