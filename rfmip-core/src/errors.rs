use thiserror::Error;

/// Error type for invalid forcing and statistics operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RfmipError {
    #[error("{0}")]
    Error(String),
    #[error("Required field '{variable}' is missing from the flux bundle")]
    MissingField { variable: String },
    #[error("Shape mismatch in {context}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Coordinate values along '{axis}' differ by {max_difference}, more than the allowed tolerance of {tolerance}")]
    CoordinateMismatch {
        axis: String,
        max_difference: f64,
        tolerance: f64,
    },
    #[error("Field has no '{axis}' axis")]
    MissingAxis { axis: String },
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    #[error("Invalid sample size {n}: the t-test needs n >= 2 and n equal to the sample axis length ({axis_length})")]
    InvalidSampleSize { n: usize, axis_length: usize },
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience type for `Result<T, RfmipError>`.
pub type RfmipResult<T> = Result<T, RfmipError>;
