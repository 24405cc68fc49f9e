//! Division with an explicit policy for near-zero denominators.
//!
//! Cloud fractions close to zero and fully masked rows would otherwise amplify noise into
//! huge or non-finite values. Rather than masking and dividing at each call site, callers state
//! a threshold and the value to use below it.

use crate::errors::{RfmipError, RfmipResult};
use ndarray::{ArrayD, Zip};
use num::Float;

/// Divide `numerator` by `denominator`, returning `fallback` when `|denominator| < threshold`.
///
/// An exactly zero denominator always yields the fallback, even with a zero threshold. The
/// fallback is returned regardless of the numerator, so NaN or infinite numerators never leak
/// through a guarded cell.
///
/// # Example
/// ```
/// use rfmip_core::utils::guarded_division::guarded_divide;
///
/// assert_eq!(guarded_divide(3.0, 2.0, 0.01, 0.0), 1.5);
/// assert_eq!(guarded_divide(3.0, 0.005, 0.01, 0.0), 0.0);
/// assert_eq!(guarded_divide(f64::NAN, 0.0, 0.01, 0.0), 0.0);
/// ```
pub fn guarded_divide<T: Float>(numerator: T, denominator: T, threshold: T, fallback: T) -> T {
    if denominator == T::zero() || denominator.abs() < threshold {
        fallback
    } else {
        numerator / denominator
    }
}

/// Elementwise [`guarded_divide`] over two arrays of identical shape.
///
/// # Errors
/// Returns [`RfmipError::ShapeMismatch`] if the arrays differ in shape.
pub fn guarded_divide_arrays(
    numerator: &ArrayD<f64>,
    denominator: &ArrayD<f64>,
    threshold: f64,
    fallback: f64,
) -> RfmipResult<ArrayD<f64>> {
    if numerator.shape() != denominator.shape() {
        return Err(RfmipError::ShapeMismatch {
            context: "guarded division".to_string(),
            expected: numerator.shape().to_vec(),
            found: denominator.shape().to_vec(),
        });
    }
    Ok(Zip::from(numerator)
        .and(denominator)
        .map_collect(|&n, &d| guarded_divide(n, d, threshold, fallback)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn test_regular_division() {
        assert_eq!(guarded_divide(1.0, 4.0, 0.01, 0.0), 0.25);
        assert_eq!(guarded_divide(-1.0, -0.5, 0.01, 0.0), 2.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly at the threshold is a real division
        assert_eq!(guarded_divide(1.0, 0.01, 0.01, 0.0), 100.0);
        assert_eq!(guarded_divide(1.0, 0.0099, 0.01, 0.0), 0.0);
    }

    #[test]
    fn test_negative_denominators_use_magnitude() {
        assert_eq!(guarded_divide(1.0, -0.001, 0.01, -9.0), -9.0);
    }

    #[test]
    fn test_zero_threshold_still_guards_zero() {
        assert_eq!(guarded_divide(1.0_f64, 0.0, 0.0, 7.0), 7.0);
        assert_eq!(guarded_divide(1.0_f32, 0.0, 0.0, 7.0), 7.0);
    }

    #[test]
    fn test_non_finite_numerators_are_suppressed() {
        assert_eq!(guarded_divide(f64::INFINITY, 0.0, 0.01, 0.0), 0.0);
        assert!(guarded_divide(f64::NAN, 0.0, 0.01, f64::NAN).is_nan());
    }

    #[test]
    fn test_arrays() {
        let num = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let den = array![[2.0, 0.0], [0.001, 0.5]].into_dyn();
        let result = guarded_divide_arrays(&num, &den, 0.01, 0.0).unwrap();
        assert_eq!(result, array![[0.5, 0.0], [0.0, 8.0]].into_dyn());
    }

    #[test]
    fn test_arrays_shape_mismatch() {
        let num = ArrayD::<f64>::zeros(IxDyn(&[2, 2]));
        let den = ArrayD::<f64>::zeros(IxDyn(&[4]));
        assert!(matches!(
            guarded_divide_arrays(&num, &den, 0.01, 0.0),
            Err(RfmipError::ShapeMismatch { .. })
        ));
    }
}
