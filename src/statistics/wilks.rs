//! Wilks false-discovery-rate field significance
//!
//! Converts a set of local p-values into a single critical p-value using
//! the FDR-controlled procedure of Wilks (2016): the nominal level is
//! doubled to compensate for spatial and temporal correlation among the
//! tests, and any local p-value at or below the returned threshold is
//! field-significant.

use crate::errors::{EnsSigError, Result};

/// Computes the Wilks critical p-value for a set of local p-values
///
/// Non-finite entries are ignored. With alpha_fdr = 2 * `alpha_local` and
/// the remaining N p-values sorted ascending, the threshold is determined
/// by the first index k (1-based) where p_(k) exceeds its control line
/// (k/N) * alpha_fdr:
///
/// - no such k: every point is significant, return the largest p-value;
/// - k = 1: no point is significant, return 0;
/// - otherwise return p_(k-1).
///
/// # Errors
///
/// Returns an error if no finite p-values are supplied.
pub fn wilks_pcrit(p_values: &[f64], alpha_local: f64) -> Result<f64> {
    let mut sorted: Vec<f64> = p_values.iter().copied().filter(|p| p.is_finite()).collect();
    if sorted.is_empty() {
        return Err(EnsSigError::EmptyPValues);
    }
    sorted.sort_by(f64::total_cmp);

    let alpha_fdr = 2.0 * alpha_local;
    let n = sorted.len() as f64;
    let first_above = sorted
        .iter()
        .enumerate()
        .position(|(i, &p)| p - ((i + 1) as f64 / n) * alpha_fdr > 0.0);

    Ok(match first_above {
        None => sorted[sorted.len() - 1],
        Some(0) => 0.0,
        Some(k) => sorted[k - 1],
    })
}
