//! Generalized two-sample difference-of-means test
//!
//! Welch's t-test over broadcastable arrays: unequal variances, unequal
//! sample sizes, one- or two-tailed, with an arbitrary null-hypothesis
//! offset. Degrees of freedom follow Welch-Satterthwaite and are floored
//! to an integer before the survival function is evaluated. Degenerate
//! sample sizes (n < 2) yield NaN p-values rather than errors.

use crate::errors::{EnsSigError, Result};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Number of tails for a two-sample test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tails {
    /// One-sided alternative
    One,
    /// Two-sided alternative
    Two,
}

impl Tails {
    /// Validate a raw tail count
    ///
    /// # Errors
    ///
    /// Returns an error for any value other than 1 or 2.
    pub fn from_int(tails: i32) -> Result<Self> {
        match tails {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(EnsSigError::InvalidTails { tails: other }),
        }
    }

    /// Multiplier applied to the one-sided survival probability
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::One => 1.0,
            Self::Two => 2.0,
        }
    }
}

/// Computes elementwise p-values for the difference between two means
///
/// The inputs broadcast against each other under the usual right-aligned
/// rules; the output takes the broadcast shape. Sample counts are given
/// as floats so that count grids feed in directly.
///
/// # Errors
///
/// Returns an error if the input shapes are not mutually broadcastable.
#[allow(clippy::too_many_arguments)]
pub fn p_value(
    mean1: &ArrayD<f64>,
    mean2: &ArrayD<f64>,
    std1: &ArrayD<f64>,
    std2: &ArrayD<f64>,
    n1: &ArrayD<f64>,
    n2: &ArrayD<f64>,
    tails: Tails,
    null_offset: f64,
) -> Result<ArrayD<f64>> {
    let inputs = [mean1, mean2, std1, std2, n1, n2];
    let shape = broadcast_shape(&inputs)?;

    let mut flat: Vec<Vec<f64>> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let view = input.broadcast(IxDyn(&shape)).ok_or_else(|| {
            EnsSigError::ShapeMismatch {
                message: format!(
                    "cannot broadcast shape {:?} to {:?}",
                    input.shape(),
                    shape
                ),
            }
        })?;
        flat.push(view.iter().copied().collect());
    }

    let size: usize = shape.iter().product();
    let factor = tails.factor();
    let p: Vec<f64> = (0..size)
        .into_par_iter()
        .map(|i| {
            welch_p(
                flat[0][i],
                flat[1][i],
                flat[2][i],
                flat[3][i],
                flat[4][i],
                flat[5][i],
                factor,
                null_offset,
            )
        })
        .collect();

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), p)?)
}

/// Single-element Welch test
#[allow(clippy::too_many_arguments)]
fn welch_p(
    m1: f64,
    m2: f64,
    s1: f64,
    s2: f64,
    n1: f64,
    n2: f64,
    tails_factor: f64,
    null_offset: f64,
) -> f64 {
    let v1 = s1 * s1 / n1;
    let v2 = s2 * s2 / n2;
    let t = (m1 - m2 - null_offset) / (v1 + v2).sqrt();

    // Welch-Satterthwaite, floored; n < 2 drives this non-finite
    let df = ((v1 + v2) * (v1 + v2)) / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    let df = df.floor();

    if t.is_nan() || !df.is_finite() || df < 1.0 {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => dist.sf(t.abs()) * tails_factor,
        Err(_) => f64::NAN,
    }
}

/// Right-aligned broadcast shape of several arrays
fn broadcast_shape(inputs: &[&ArrayD<f64>]) -> Result<Vec<usize>> {
    let ndim = inputs.iter().map(|a| a.ndim()).max().unwrap_or(0);
    let mut shape = vec![1_usize; ndim];
    for input in inputs {
        let offset = ndim - input.ndim();
        for (i, &len) in input.shape().iter().enumerate() {
            let slot = &mut shape[offset + i];
            if *slot == 1 {
                *slot = len;
            } else if len != 1 && len != *slot {
                return Err(EnsSigError::ShapeMismatch {
                    message: format!(
                        "incompatible broadcast shapes {:?} and {:?}",
                        input.shape(),
                        shape
                    ),
                });
            }
        }
    }
    Ok(shape)
}
