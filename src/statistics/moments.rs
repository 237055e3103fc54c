//! Moment estimation over named axes
//!
//! This module reduces gridded samples into (mean, standard deviation,
//! count) triples over one or more named axes, NaN-skipping throughout.
//! Reductions that include the `lat` axis are area-weighted by cos(lat).
//! Grouped variants partition the data along an integer coordinate first,
//! and a two-stage variant implements the mean-of-group-means reduction
//! used for interannual statistics.

use crate::errors::{EnsSigError, Result};
use crate::grid::{Coord, CoordValues, Grid};
use ndarray::{ArrayD, Axis, IxDyn};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Mean, sample standard deviation, and valid-sample count with a shared
/// shape, one element per retained coordinate combination
#[derive(Debug, Clone)]
pub struct MomentSet {
    /// NaN-skipping (optionally area-weighted) mean; NaN where count = 0
    pub mean: Grid,
    /// Sample standard deviation (ddof = 1); NaN where count < 2
    pub std: Grid,
    /// Number of valid (finite) samples per cell
    pub count: Grid,
}

impl MomentSet {
    /// Axis names shared by the three component grids
    #[must_use]
    pub fn dims(&self) -> &[String] {
        self.mean.dims()
    }
}

/// Computes moments over the given axes, optionally partitioned by an
/// integer grouping coordinate
///
/// Without a group, the reduction runs directly over `reduce_dims`. With
/// a group, it runs independently inside each group and the results are
/// stacked along a new axis named after the grouping coordinate, whose
/// keys (sorted ascending) become an integer coordinate on that axis.
///
/// When `lat` is among `reduce_dims` and the grid carries a latitude
/// coordinate, the mean and standard deviation are weighted by cos(lat);
/// the count stays unweighted.
///
/// # Errors
///
/// Returns an error if a named axis or the grouping coordinate is absent,
/// or if the per-group results cannot be stacked.
pub fn compute_moments(
    data: &Grid,
    reduce_dims: &[&str],
    group_coord: Option<&str>,
) -> Result<MomentSet> {
    match group_coord {
        None => reduce_moments(data, reduce_dims),
        Some(name) => {
            let (group_dim, keys) = {
                let (d, k) = data.group_keys(name)?;
                (d.to_string(), k.to_vec())
            };
            let groups = group_indices(&keys);
            if groups.is_empty() {
                return Err(EnsSigError::ShapeMismatch {
                    message: format!("grouping coordinate '{}' has no values", name),
                });
            }

            let mut means = Vec::with_capacity(groups.len());
            let mut stds = Vec::with_capacity(groups.len());
            let mut counts = Vec::with_capacity(groups.len());
            let mut group_keys_out = Vec::with_capacity(groups.len());
            for (key, indices) in &groups {
                let sub = data.select(&group_dim, indices)?;
                let moments = reduce_moments(&sub, reduce_dims)?;
                means.push(moments.mean);
                stds.push(moments.std);
                counts.push(moments.count);
                group_keys_out.push(*key);
            }

            let coords = stacked_coords(&means[0], name, &group_keys_out);
            let dims = stacked_dims(&means[0], name);
            Ok(MomentSet {
                mean: stack_grids(&means, dims.clone(), coords.clone())?,
                std: stack_grids(&stds, dims.clone(), coords.clone())?,
                count: stack_grids(&counts, dims, coords)?,
            })
        }
    }
}

/// Two-stage mean-of-group-means reduction
///
/// Stage 1 partitions the data by `group1` and computes the mean over
/// `inner_reduce` within each partition (sub-grouped by `group2` when
/// given); each partition is fully materialized. Stage 2 concatenates the
/// per-group means along a new axis named `concat_dim` (keyed by the
/// ascending `group1` keys) and computes mean/std/count over
/// `outer_reduce` of that concatenation.
///
/// This intentionally differs from a single-stage reduction whenever the
/// groups have unequal sizes: the result is a mean of group means, not a
/// global mean. Latitude weighting applies at stage 1 when `lat` is among
/// `inner_reduce`.
///
/// # Errors
///
/// Returns an error if any named axis or grouping coordinate is absent,
/// or if the per-group results cannot be stacked.
pub fn compute_grouped_moments(
    data: &Grid,
    group1: &str,
    group2: Option<&str>,
    concat_dim: &str,
    inner_reduce: &[&str],
    outer_reduce: &[&str],
) -> Result<MomentSet> {
    let (group_dim, keys) = {
        let (d, k) = data.group_keys(group1)?;
        (d.to_string(), k.to_vec())
    };
    let groups = group_indices(&keys);
    if groups.is_empty() {
        return Err(EnsSigError::ShapeMismatch {
            message: format!("grouping coordinate '{}' has no values", group1),
        });
    }

    let mut stage1 = Vec::with_capacity(groups.len());
    let mut concat_keys = Vec::with_capacity(groups.len());
    for (key, indices) in &groups {
        let sub = data.select(&group_dim, indices)?;
        let reduced = match group2 {
            Some(inner) => compute_moments(&sub, inner_reduce, Some(inner))?.mean,
            None => reduce_moments(&sub, inner_reduce)?.mean,
        };
        stage1.push(reduced);
        concat_keys.push(*key);
    }

    let coords = stacked_coords(&stage1[0], concat_dim, &concat_keys);
    let dims = stacked_dims(&stage1[0], concat_dim);
    let concatenated = stack_grids(&stage1, dims, coords)?;

    reduce_moments(&concatenated, outer_reduce)
}

/// Direct (ungrouped) moment reduction over named axes
fn reduce_moments(grid: &Grid, reduce_dims: &[&str]) -> Result<MomentSet> {
    let mut reduce_axes = Vec::with_capacity(reduce_dims.len());
    for dim in reduce_dims {
        reduce_axes.push(grid.axis_of(dim)?);
    }
    reduce_axes.sort_unstable();
    reduce_axes.dedup();

    let shape = grid.shape().to_vec();
    let kept_axes: Vec<usize> = (0..shape.len())
        .filter(|a| !reduce_axes.contains(a))
        .collect();
    let kept_dims: Vec<String> = kept_axes.iter().map(|&a| grid.dims()[a].clone()).collect();
    let out_shape: Vec<usize> = kept_axes.iter().map(|&a| shape[a]).collect();
    let out_size: usize = out_shape.iter().product();

    // cos(lat) area weights apply only when lat is being reduced
    let lat_weights: Option<(usize, Vec<f64>)> = if reduce_dims.contains(&"lat") {
        match (grid.axis_of("lat"), grid.latitudes()) {
            (Ok(axis), Some(lats)) => Some((
                axis,
                lats.iter().map(|l| l.to_radians().cos()).collect(),
            )),
            _ => None,
        }
    } else {
        None
    };

    let data = grid.data();
    let cells: Vec<(f64, f64, f64)> = (0..out_size)
        .into_par_iter()
        .map(|flat| {
            let kept_idx = unravel(flat, &out_shape);
            cell_moments(
                data,
                &shape,
                &kept_axes,
                &kept_idx,
                &reduce_axes,
                lat_weights.as_ref().map(|(a, w)| (*a, w.as_slice())),
            )
        })
        .collect();

    let mut means = Vec::with_capacity(out_size);
    let mut stds = Vec::with_capacity(out_size);
    let mut counts = Vec::with_capacity(out_size);
    for (m, s, n) in cells {
        means.push(m);
        stds.push(s);
        counts.push(n);
    }

    let coords = grid.retained_coords(&kept_dims);
    let build = |values: Vec<f64>| -> Result<Grid> {
        let array = ArrayD::from_shape_vec(IxDyn(&out_shape), values)?;
        Ok(Grid::from_parts(array, kept_dims.clone(), coords.clone()))
    };
    Ok(MomentSet {
        mean: build(means)?,
        std: build(stds)?,
        count: build(counts)?,
    })
}

/// Two-pass weighted moment accumulation for one output cell
fn cell_moments(
    data: &ArrayD<f64>,
    shape: &[usize],
    kept_axes: &[usize],
    kept_idx: &[usize],
    reduce_axes: &[usize],
    lat_weights: Option<(usize, &[f64])>,
) -> (f64, f64, f64) {
    let mut coords = vec![0_usize; shape.len()];
    for (pos, &axis) in kept_axes.iter().enumerate() {
        coords[axis] = kept_idx[pos];
    }

    // Pass 1: weighted sum and valid count
    let mut sum_w = 0.0_f64;
    let mut sum_wx = 0.0_f64;
    let mut n = 0_u64;
    for_each_reduced(shape, reduce_axes, &mut coords, |full| {
        if let Some(&value) = data.get(full) {
            if value.is_finite() {
                let w = point_weight(full, lat_weights);
                sum_w += w;
                sum_wx += w * value;
                n += 1;
            }
        }
    });

    if n == 0 {
        return (f64::NAN, f64::NAN, 0.0);
    }
    let mean = sum_wx / sum_w;

    // Pass 2: weighted squared deviations with reliability correction,
    // which reduces to the ddof = 1 sample variance for equal weights
    let mut sum_w2 = 0.0_f64;
    let mut sum_wd2 = 0.0_f64;
    for_each_reduced(shape, reduce_axes, &mut coords, |full| {
        if let Some(&value) = data.get(full) {
            if value.is_finite() {
                let w = point_weight(full, lat_weights);
                sum_w2 += w * w;
                sum_wd2 += w * (value - mean) * (value - mean);
            }
        }
    });

    let denom = sum_w - sum_w2 / sum_w;
    let std = if n >= 2 && denom > 0.0 {
        (sum_wd2 / denom).sqrt()
    } else {
        f64::NAN
    };

    (mean, std, n as f64)
}

fn point_weight(coords: &[usize], lat_weights: Option<(usize, &[f64])>) -> f64 {
    match lat_weights {
        Some((axis, weights)) => weights[coords[axis]],
        None => 1.0,
    }
}

/// Visit every combination of indices along the reduced axes, keeping the
/// kept-axis entries of `coords` fixed
fn for_each_reduced<F: FnMut(&[usize])>(
    shape: &[usize],
    reduce_axes: &[usize],
    coords: &mut [usize],
    mut visit: F,
) {
    for &axis in reduce_axes {
        coords[axis] = 0;
        if shape[axis] == 0 {
            return;
        }
    }
    loop {
        visit(coords);
        // odometer advance over the reduced axes, last axis fastest
        let mut pos = reduce_axes.len();
        loop {
            if pos == 0 {
                return;
            }
            pos -= 1;
            let axis = reduce_axes[pos];
            coords[axis] += 1;
            if coords[axis] < shape[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }
}

fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut idx = vec![0_usize; shape.len()];
    for i in (0..shape.len()).rev() {
        if shape[i] > 0 {
            idx[i] = flat % shape[i];
            flat /= shape[i];
        }
    }
    idx
}

fn group_indices(keys: &[i64]) -> Vec<(i64, Vec<usize>)> {
    let mut map: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &key) in keys.iter().enumerate() {
        map.entry(key).or_default().push(i);
    }
    map.into_iter().collect()
}

fn stacked_dims(first: &Grid, new_dim: &str) -> Vec<String> {
    let mut dims = Vec::with_capacity(first.ndim() + 1);
    dims.push(new_dim.to_string());
    dims.extend(first.dims().iter().cloned());
    dims
}

fn stacked_coords(first: &Grid, new_dim: &str, keys: &[i64]) -> BTreeMap<String, Coord> {
    let mut coords = first.coords().clone();
    coords.insert(
        new_dim.to_string(),
        Coord {
            dim: new_dim.to_string(),
            values: CoordValues::Int(keys.to_vec()),
        },
    );
    coords
}

/// Stack same-shaped grids along a new leading axis
fn stack_grids(
    grids: &[Grid],
    dims: Vec<String>,
    coords: BTreeMap<String, Coord>,
) -> Result<Grid> {
    let views: Vec<_> = grids.iter().map(|g| g.data().view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)?;
    Ok(Grid::from_parts(stacked, dims, coords))
}
