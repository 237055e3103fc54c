//! Control-vs-experiment significance pipeline
//!
//! Orchestrates the Welch test and the Wilks field-significance procedure
//! for one variable: validates the moment grids against a declared axis
//! layout, computes pointwise p-values, and (in Wilks mode) derives one
//! critical p-value per (ensemble, time-slice) combination. Slices are
//! independent and evaluated in parallel; a failing slice aborts the whole
//! threshold computation.

use crate::errors::{EnsSigError, Result};
use crate::grid::{Coord, Grid};
use crate::statistics::ensemble::ENSEMBLE_DIM;
use crate::statistics::moments::MomentSet;
use crate::statistics::ttest::{p_value, Tails};
use crate::statistics::wilks::wilks_pcrit;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// How the ensemble dimension appears in the moment grids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsembleRepresentation {
    /// Moments of the ensemble mean; no `ensemble_member` axis
    Mean,
    /// Per-member moments; `ensemble_member` axis retained
    AllMembers,
}

/// How the data were grouped in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalGranularity {
    Monthly,
    Yearly,
    Seasonal,
    /// Whole-period statistics; no time axis
    WholePeriod,
}

impl TemporalGranularity {
    /// Name of the time axis, or `None` for whole-period statistics
    #[must_use]
    pub const fn time_dim(self) -> Option<&'static str> {
        match self {
            Self::Monthly => Some("month"),
            Self::Yearly => Some("year"),
            Self::Seasonal => Some("season"),
            Self::WholePeriod => None,
        }
    }
}

/// How p-value significance will be evaluated downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignificanceMode {
    /// Compute Wilks critical p-values per (ensemble, time) slice
    Wilks,
    /// Leave thresholding to the caller (fixed local alpha)
    NoWilks,
}

/// Expected axis layout of the moment grids, fixed at construction
///
/// Every combination of representation and granularity is valid by
/// construction; mismatches against actual data are reported by
/// [`SignificancePipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLayout {
    pub representation: EnsembleRepresentation,
    pub granularity: TemporalGranularity,
}

impl AxisLayout {
    #[must_use]
    pub const fn new(
        representation: EnsembleRepresentation,
        granularity: TemporalGranularity,
    ) -> Self {
        Self {
            representation,
            granularity,
        }
    }

    /// Ordered axis names the moment grids must carry
    #[must_use]
    pub fn expected_dims(&self) -> Vec<&'static str> {
        let mut dims = Vec::with_capacity(4);
        if self.representation == EnsembleRepresentation::AllMembers {
            dims.push(ENSEMBLE_DIM);
        }
        if let Some(time_dim) = self.granularity.time_dim() {
            dims.push(time_dim);
        }
        dims.push("lat");
        dims.push("lon");
        dims
    }

    fn has_ensemble_axis(&self) -> bool {
        self.representation == EnsembleRepresentation::AllMembers
    }
}

/// Output of a pipeline run
#[derive(Debug, Clone)]
pub struct SignificanceResult {
    /// Pointwise p-values on the layout's axes
    pub p_values: Grid,
    /// Wilks critical p-values, shape (ensemble count, time-slice count);
    /// `None` in [`SignificanceMode::NoWilks`]
    pub p_crit: Option<Array2<f64>>,
}

/// Significance test runner for one variable at a time
#[derive(Debug, Clone)]
pub struct SignificancePipeline {
    mode: SignificanceMode,
    layout: AxisLayout,
    alpha_local: f64,
}

impl SignificancePipeline {
    /// Create a pipeline with the default local significance level of 0.05
    #[must_use]
    pub fn new(mode: SignificanceMode, layout: AxisLayout) -> Self {
        Self {
            mode,
            layout,
            alpha_local: 0.05,
        }
    }

    /// Override the local significance level used by the Wilks procedure
    #[must_use]
    pub fn with_alpha(mut self, alpha_local: f64) -> Self {
        self.alpha_local = alpha_local;
        self
    }

    /// Runs the test for `variable`, experiment against control
    ///
    /// `tails_for_variable` maps a variable name to its tail count;
    /// physically one-sided variables use [`Tails::One`]. See
    /// [`tails_for_radiative_fluxes`] for the conventional rule.
    ///
    /// # Errors
    ///
    /// Returns an error if either moment set does not match the declared
    /// layout, or if any Wilks slice has no finite p-values.
    pub fn run<F>(
        &self,
        control: &MomentSet,
        experiment: &MomentSet,
        variable: &str,
        tails_for_variable: F,
    ) -> Result<SignificanceResult>
    where
        F: Fn(&str) -> Tails,
    {
        let expected = self.layout.expected_dims();
        self.check_layout(control, &expected)?;
        self.check_layout(experiment, &expected)?;

        let tails = tails_for_variable(variable);
        let p_values = p_value(
            experiment.mean.data(),
            control.mean.data(),
            experiment.std.data(),
            control.std.data(),
            experiment.count.data(),
            control.count.data(),
            tails,
            0.0,
        )?;

        let dims: Vec<String> = expected.iter().map(|d| (*d).to_string()).collect();
        let coords: BTreeMap<String, Coord> = experiment
            .mean
            .coords()
            .iter()
            .filter(|(_, c)| {
                dims.iter().position(|d| *d == c.dim).map_or(false, |axis| {
                    c.values.len() == p_values.len_of(Axis(axis))
                })
            })
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect();
        let p_values = Grid::from_parts(p_values, dims, coords);

        let p_crit = match self.mode {
            SignificanceMode::NoWilks => None,
            SignificanceMode::Wilks => Some(self.wilks_thresholds(&p_values)?),
        };

        Ok(SignificanceResult { p_values, p_crit })
    }

    fn check_layout(&self, moments: &MomentSet, expected: &[&str]) -> Result<()> {
        let found = moments.dims();
        if found.len() != expected.len() || found.iter().zip(expected).any(|(f, e)| f != e) {
            return Err(EnsSigError::LayoutMismatch {
                expected: expected.iter().map(|d| (*d).to_string()).collect(),
                found: found.to_vec(),
            });
        }
        Ok(())
    }

    /// One Wilks critical p-value per (ensemble, time) slice, in parallel
    fn wilks_thresholds(&self, p_values: &Grid) -> Result<Array2<f64>> {
        let has_ensemble = self.layout.has_ensemble_axis();
        let has_time = self.layout.granularity.time_dim().is_some();
        let ens_count = if has_ensemble {
            p_values.size_of(ENSEMBLE_DIM)?
        } else {
            1
        };
        let time_count = match self.layout.granularity.time_dim() {
            Some(time_dim) => p_values.size_of(time_dim)?,
            None => 1,
        };

        let addresses: Vec<(usize, usize)> = (0..ens_count)
            .flat_map(|e| (0..time_count).map(move |t| (e, t)))
            .collect();

        let data = p_values.data();
        let thresholds: Vec<f64> = addresses
            .par_iter()
            .map(|&(e, t)| {
                let mut view = data.view();
                if has_ensemble {
                    view = view.index_axis_move(Axis(0), e);
                }
                if has_time {
                    view = view.index_axis_move(Axis(0), t);
                }
                let slice: Vec<f64> = view.iter().copied().collect();
                wilks_pcrit(&slice, self.alpha_local)
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Array2::from_shape_vec((ens_count, time_count), thresholds)?)
    }
}

/// Conventional tail rule: bounded radiative fluxes (`FLDS`, `FLUT`) are
/// one-sided, everything else two-sided
#[must_use]
pub fn tails_for_radiative_fluxes(variable: &str) -> Tails {
    if variable == "FLDS" || variable == "FLUT" {
        Tails::One
    } else {
        Tails::Two
    }
}
