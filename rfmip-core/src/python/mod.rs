use crate::errors::RfmipError;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::{pymodule, wrap_pyfunction, Bound, PyResult};

pub mod field;
pub mod functions;

pub use field::{PyFluxBundle, PyGriddedField};

impl From<RfmipError> for PyErr {
    fn from(err: RfmipError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGriddedField>()?;
    m.add_class::<PyFluxBundle>()?;
    m.add_function(wrap_pyfunction!(functions::compute_forcings_allsky, m)?)?;
    m.add_function(wrap_pyfunction!(functions::compute_forcings_clearsky, m)?)?;
    m.add_function(wrap_pyfunction!(functions::compute_cloudy_sky, m)?)?;
    m.add_function(wrap_pyfunction!(functions::global_mean, m)?)?;
    m.add_function(wrap_pyfunction!(functions::time_series, m)?)?;
    m.add_function(wrap_pyfunction!(functions::t_test, m)?)?;
    m.add_function(wrap_pyfunction!(functions::t_test_nd, m)?)?;
    m.add_function(wrap_pyfunction!(functions::ensemble_mean, m)?)?;
    m.add_function(wrap_pyfunction!(functions::summarise_map, m)?)?;
    Ok(())
}
