//! EnsSig: ensemble significance testing for climate model output
//!
//! A Rust library for computing the statistical significance of
//! differences between two geophysical model ensembles (a control and an
//! experiment run) on a shared named-axis grid, with false-discovery-rate
//! control of the field-wide significance threshold.
//!
//! ## Key Features
//!
//! - **Moment estimation**: mean/std/count over arbitrary axis groupings,
//!   with cos(lat) area weighting and a two-stage mean-of-group-means
//!   reduction for interannual statistics
//! - **Ensemble aggregation**: member stacking and mean / pooled-std /
//!   summed-count reduction across the ensemble axis
//! - **Welch's t-test**: generalized two-sample difference of means with
//!   floored Welch-Satterthwaite degrees of freedom
//! - **Wilks field significance**: FDR-controlled critical p-value over a
//!   grid of local tests
//! - **Parallel Processing**: Rayon-backed reductions and per-slice loops
//!
//! ## Module Organization
//!
//! - [`grid`]: named-axis arrays with latitude and grouping coordinates
//! - [`statistics`]: moment, ensemble, t-test, and Wilks computations
//! - [`significance`]: the per-variable significance pipeline
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use enssig::prelude::*;
//!
//! # fn demo(control_samples: Grid, experiment_samples: Grid) -> enssig::Result<()> {
//! // Whole-period moments, area weighted over the spatial axes' latitude
//! let control = compute_moments(&control_samples, &["time"], None)?;
//! let experiment = compute_moments(&experiment_samples, &["time"], None)?;
//!
//! // Pointwise Welch test plus one Wilks threshold per slice
//! let layout = AxisLayout::new(
//!     EnsembleRepresentation::Mean,
//!     TemporalGranularity::WholePeriod,
//! );
//! let result = SignificancePipeline::new(SignificanceMode::Wilks, layout)
//!     .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)?;
//! # Ok(())
//! # }
//! ```
//!
//! The library is a pure in-memory numerical core: dataset loading,
//! regridding, and plotting live upstream and downstream of it.

// Core modules
pub mod errors;
pub mod grid;
pub mod parallel;
pub mod significance;
pub mod statistics;

// Direct re-exports for the public API
pub use errors::*;
pub use grid::*;
pub use parallel::*;
pub use significance::*;
pub use statistics::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::errors::{EnsSigError, Result};
    pub use crate::grid::{Coord, CoordValues, Grid};
    pub use crate::parallel::ParallelConfig;
    pub use crate::significance::{
        tails_for_radiative_fluxes, AxisLayout, EnsembleRepresentation, SignificanceMode,
        SignificancePipeline, SignificanceResult, TemporalGranularity,
    };
    pub use crate::statistics::{
        aggregate, combine, compute_grouped_moments, compute_moments, p_value, wilks_pcrit,
        EnsembleStat, MomentSet, Tails, ENSEMBLE_DIM,
    };
}
