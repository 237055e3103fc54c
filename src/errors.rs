//! Centralized error handling for EnsSig
//!
//! This module provides structured error types for the statistics and
//! significance pipeline, enabling better error context and type safety
//! than a generic `Box<dyn Error>`.

use std::fmt;

/// Main error type for EnsSig operations
#[derive(Debug)]
pub enum EnsSigError {
    /// Invalid number of test tails (must be 1 or 2)
    InvalidTails { tails: i32 },

    /// Unknown ensemble aggregation statistic
    InvalidStatKind { stat: String },

    /// Dimension not found on a grid
    DimensionNotFound { dim: String, dims: Vec<String> },

    /// Coordinate not found on a grid
    CoordinateNotFound { coord: String },

    /// Arrays or coordinates disagree in shape or length
    ShapeMismatch { message: String },

    /// Empty p-value input to the Wilks procedure
    EmptyPValues,

    /// Moment arrays do not match the declared pipeline axis layout
    LayoutMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl fmt::Display for EnsSigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsSigError::InvalidTails { tails } => {
                write!(f, "'tails' value must be 1 or 2, got {}", tails)
            }
            EnsSigError::InvalidStatKind { stat } => {
                write!(
                    f,
                    "'stat' value must be one of 'avg', 'std', 'n', got '{}'",
                    stat
                )
            }
            EnsSigError::DimensionNotFound { dim, dims } => {
                write!(f, "Dimension '{}' not found among {:?}", dim, dims)
            }
            EnsSigError::CoordinateNotFound { coord } => {
                write!(f, "Coordinate '{}' not found on grid", coord)
            }
            EnsSigError::ShapeMismatch { message } => write!(f, "Shape mismatch: {}", message),
            EnsSigError::EmptyPValues => {
                write!(
                    f,
                    "Wilks critical p-value is undefined for an empty p-value set"
                )
            }
            EnsSigError::LayoutMismatch { expected, found } => {
                write!(
                    f,
                    "Moment dimensions {:?} do not match the expected layout {:?}",
                    found, expected
                )
            }
            EnsSigError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            EnsSigError::ArrayError(e) => write!(f, "Array error: {}", e),
            EnsSigError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EnsSigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnsSigError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ndarray::ShapeError> for EnsSigError {
    fn from(error: ndarray::ShapeError) -> Self {
        EnsSigError::ArrayError(error)
    }
}

impl From<String> for EnsSigError {
    fn from(error: String) -> Self {
        EnsSigError::Generic(error)
    }
}

impl From<&str> for EnsSigError {
    fn from(error: &str) -> Self {
        EnsSigError::Generic(error.to_string())
    }
}

/// Result type alias for EnsSig operations
pub type Result<T> = std::result::Result<T, EnsSigError>;
