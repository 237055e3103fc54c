//! Statistical computations for ensemble comparison
//!
//! This module provides the numerical building blocks of the significance
//! pipeline.
//!
//! # Organization
//!
//! - [`moments`]: mean/std/count reductions with area weighting and
//!   grouped (including two-stage mean-of-group-means) variants
//! - [`ensemble`]: ensemble member stacking and aggregation
//! - [`ttest`]: Welch two-sample difference-of-means test
//! - [`wilks`]: FDR-controlled Wilks field-significance threshold

pub mod ensemble;
pub mod moments;
pub mod ttest;
pub mod wilks;

// Re-export the main types and functions for convenience
pub use ensemble::{aggregate, combine, EnsembleStat, ENSEMBLE_DIM};
pub use moments::{compute_grouped_moments, compute_moments, MomentSet};
pub use ttest::{p_value, Tails};
pub use wilks::wilks_pcrit;
