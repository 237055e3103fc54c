//! Ensemble combination and aggregation
//!
//! This module stacks per-member grids along an `ensemble_member` axis and
//! reduces across that axis with the ensemble-specific statistics used by
//! the significance pipeline: a NaN-skipping mean, a root-mean-square
//! pooled standard deviation, and a summed sample count.

use crate::errors::{EnsSigError, Result};
use crate::grid::{Coord, CoordValues, Grid};
use ndarray::Axis;

/// Name of the axis added by [`combine`]
pub const ENSEMBLE_DIM: &str = "ensemble_member";

/// Supported ensemble aggregation statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsembleStat {
    /// Arithmetic mean across members, ignoring missing values
    Mean,
    /// Root-mean-square pooling of per-member standard deviations:
    /// sqrt(sum(value^2) / member_count). Assumes equal per-member sample
    /// sizes; this is not the sample std of the member values.
    PooledStd,
    /// Sum of per-member counts
    SumCount,
}

impl EnsembleStat {
    /// Get the string representation of the statistic
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "avg",
            Self::PooledStd => "std",
            Self::SumCount => "n",
        }
    }

    /// Parse a statistic name
    ///
    /// # Errors
    ///
    /// Returns an error naming the allowed set for any other string.
    pub fn parse(stat: &str) -> Result<Self> {
        match stat {
            "avg" => Ok(Self::Mean),
            "std" => Ok(Self::PooledStd),
            "n" => Ok(Self::SumCount),
            other => Err(EnsSigError::InvalidStatKind {
                stat: other.to_string(),
            }),
        }
    }
}

/// Stacks per-member grids along a new leading `ensemble_member` axis
///
/// Member order is meaningful: `labels[i]` names `members[i]`, and the
/// labels become a string coordinate on the new axis.
///
/// # Errors
///
/// Returns an error if the member list is empty, the label count differs,
/// or the members disagree in axis names or shape.
pub fn combine(members: &[Grid], labels: &[&str]) -> Result<Grid> {
    if members.is_empty() {
        return Err(EnsSigError::ShapeMismatch {
            message: "cannot combine an empty member list".to_string(),
        });
    }
    if labels.len() != members.len() {
        return Err(EnsSigError::ShapeMismatch {
            message: format!(
                "{} labels given for {} ensemble members",
                labels.len(),
                members.len()
            ),
        });
    }
    let first = &members[0];
    for member in &members[1..] {
        if member.dims() != first.dims() || member.shape() != first.shape() {
            return Err(EnsSigError::ShapeMismatch {
                message: "ensemble members disagree in dimensions or shape".to_string(),
            });
        }
    }

    let views: Vec<_> = members.iter().map(|m| m.data().view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)?;

    let mut dims = Vec::with_capacity(first.ndim() + 1);
    dims.push(ENSEMBLE_DIM.to_string());
    dims.extend(first.dims().iter().cloned());

    let mut coords = first.coords().clone();
    coords.insert(
        ENSEMBLE_DIM.to_string(),
        Coord {
            dim: ENSEMBLE_DIM.to_string(),
            values: CoordValues::Label(labels.iter().map(|l| (*l).to_string()).collect()),
        },
    );

    Ok(Grid::from_parts(stacked, dims, coords))
}

/// Reduces across the `ensemble_member` axis with the given statistic
///
/// # Errors
///
/// Returns an error if the grid has no `ensemble_member` axis.
pub fn aggregate(ensemble: &Grid, stat: EnsembleStat) -> Result<Grid> {
    let axis = Axis(ensemble.axis_of(ENSEMBLE_DIM)?);
    let members = ensemble.data().len_of(axis);
    let data = ensemble.data();

    let reduced = match stat {
        EnsembleStat::Mean => {
            let sum = data.fold_axis(axis, 0.0_f64, |&acc, &x| {
                if x.is_finite() {
                    acc + x
                } else {
                    acc
                }
            });
            let count = data.fold_axis(axis, 0.0_f64, |&acc, &x| {
                if x.is_finite() {
                    acc + 1.0
                } else {
                    acc
                }
            });
            let mut mean = sum;
            mean.zip_mut_with(&count, |s, &n| {
                *s = if n > 0.0 { *s / n } else { f64::NAN };
            });
            mean
        }
        EnsembleStat::PooledStd => {
            // Divides by the axis length, not the valid count
            let sumsq = data.fold_axis(axis, 0.0_f64, |&acc, &x| {
                if x.is_finite() {
                    acc + x * x
                } else {
                    acc
                }
            });
            sumsq.mapv(|s| (s / members as f64).sqrt())
        }
        EnsembleStat::SumCount => data.fold_axis(axis, 0.0_f64, |&acc, &x| {
            if x.is_finite() {
                acc + x
            } else {
                acc
            }
        }),
    };

    let kept_dims: Vec<String> = ensemble
        .dims()
        .iter()
        .filter(|d| d.as_str() != ENSEMBLE_DIM)
        .cloned()
        .collect();
    let coords = ensemble.retained_coords(&kept_dims);
    Ok(Grid::from_parts(reduced, kept_dims, coords))
}
