//! One-sample Student's t-test for the significance of forcing fields
//!
//! Each cell of the result tests whether the mean over the sample axis (usually time, or
//! realizations) differs from a population mean:
//!
//! $$ t = \frac{\bar{x} - \mu}{s / \sqrt{n}} $$
//!
//! with $s$ the sample standard deviation using $n - 1$ degrees of freedom. The two-sided p-value
//! is $p = 2 \cdot P(T_{n-1} > |t|)$.

use crate::errors::{RfmipError, RfmipResult};
use crate::grid::{Axis, FloatValue, GriddedField};
use log::{debug, warn};
use ndarray::{ArrayD, Axis as NdAxis, Zip};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Mean of the null hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PopulationMean {
    Scalar(FloatValue),
    /// Broadcast against the data with the sample axis removed
    Field(ArrayD<FloatValue>),
}

impl Default for PopulationMean {
    fn default() -> Self {
        PopulationMean::Scalar(0.0)
    }
}

impl From<FloatValue> for PopulationMean {
    fn from(value: FloatValue) -> Self {
        PopulationMean::Scalar(value)
    }
}

impl From<ArrayD<FloatValue>> for PopulationMean {
    fn from(value: ArrayD<FloatValue>) -> Self {
        PopulationMean::Field(value)
    }
}

impl PopulationMean {
    fn broadcast(&self, shape: &[usize]) -> RfmipResult<ArrayD<FloatValue>> {
        match self {
            PopulationMean::Scalar(value) => Ok(ArrayD::from_elem(shape, *value)),
            PopulationMean::Field(values) => values
                .broadcast(shape)
                .map(|view| view.to_owned())
                .ok_or_else(|| RfmipError::ShapeMismatch {
                    context: "population mean".to_string(),
                    expected: shape.to_vec(),
                    found: values.shape().to_vec(),
                }),
        }
    }
}

/// t statistic and two-sided p-value per cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_statistic: ArrayD<FloatValue>,
    pub p_value: ArrayD<FloatValue>,
}

impl TTestResult {
    /// Cells whose p-value is below `alpha`. NaN p-values are never significant.
    pub fn significant(&self, alpha: FloatValue) -> ArrayD<bool> {
        self.p_value.mapv(|p| p < alpha)
    }
}

/// One-sample t-test along `sample_axis` of an n-dimensional array
///
/// `n` must equal the length of the sample axis and be at least 2.
///
/// Cells with zero sample variance follow IEEE arithmetic: a non-zero difference gives
/// $t = \pm\infty$ and $p = 0$, no difference gives NaN for both. Isolated constant cells are
/// expected in real output (e.g. permanently cloud-free or masked regions) and are reported per
/// cell. If every cell is constant along the sample axis, no cell carries any sampling
/// variability, which means the wrong axis was chosen or the samples are copies of one another;
/// the call then fails with [`RfmipError::DegenerateInput`] instead of returning a result made
/// only of infinities and NaN.
pub fn t_test_nd(
    data: &ArrayD<FloatValue>,
    sample_axis: usize,
    n: usize,
    population_mean: &PopulationMean,
) -> RfmipResult<TTestResult> {
    if sample_axis >= data.ndim() {
        return Err(RfmipError::Error(format!(
            "Sample axis {} is out of bounds for data with {} dimensions",
            sample_axis,
            data.ndim()
        )));
    }
    let axis_length = data.shape()[sample_axis];
    if n < 2 || n != axis_length {
        return Err(RfmipError::InvalidSampleSize { n, axis_length });
    }

    let axis = NdAxis(sample_axis);
    let mean = data
        .mean_axis(axis)
        .ok_or_else(|| RfmipError::DegenerateInput("empty sample axis".to_string()))?;
    let variance = data.var_axis(axis, 1.0);
    let mu = population_mean.broadcast(mean.shape())?;

    let zero_variance = variance.iter().filter(|v| **v == 0.0).count();
    if zero_variance > 0 {
        if zero_variance == variance.len() {
            return Err(RfmipError::DegenerateInput(
                "sample variance is zero in every cell".to_string(),
            ));
        }
        warn!(
            "{} of {} cells have zero sample variance",
            zero_variance,
            variance.len()
        );
    }

    let n_samples = n as FloatValue;
    let t_statistic = Zip::from(&mean)
        .and(&variance)
        .and(&mu)
        .map_collect(|&m, &var, &mu| (m - mu) / (var / n_samples).sqrt());

    let distribution = StudentsT::new(0.0, 1.0, n_samples - 1.0)
        .map_err(|e| RfmipError::Error(e.to_string()))?;
    let p_value = t_statistic.mapv(|t| {
        if t.is_nan() {
            FloatValue::NAN
        } else {
            2.0 * distribution.sf(t.abs())
        }
    });

    debug!(
        "t-test over axis {} with n={} on {} cells",
        sample_axis,
        n,
        t_statistic.len()
    );
    Ok(TTestResult {
        t_statistic,
        p_value,
    })
}

/// One-sample t-test over the time axis of a gridded field
///
/// Returns `(t_statistic, p_value)` fields sharing the input grid without its time axis.
///
/// # Errors
///
/// * [`RfmipError::MissingAxis`] if the field has no time axis
/// * [`RfmipError::InvalidSampleSize`] if `n < 2` or `n` differs from the number of time steps
pub fn t_test(
    field: &GriddedField,
    n: usize,
    population_mean: &PopulationMean,
) -> RfmipResult<(GriddedField, GriddedField)> {
    let sample_axis = field.axis_index(Axis::Time)?;
    let result = t_test_nd(field.values(), sample_axis, n, population_mean)?;
    Ok((
        field.reduced(Axis::Time, result.t_statistic),
        field.reduced(Axis::Time, result.p_value),
    ))
}
