//! Tests for the per-variable significance pipeline
//!
//! These exercise the layout validation, the pointwise Welch step, and
//! the per-(ensemble, time) Wilks threshold loop end to end.

use approx::assert_relative_eq;
use enssig::{
    errors::EnsSigError,
    grid::Grid,
    significance::{
        tails_for_radiative_fluxes, AxisLayout, EnsembleRepresentation, SignificanceMode,
        SignificancePipeline, TemporalGranularity,
    },
    statistics::{MomentSet, Tails},
};
use ndarray::{ArrayD, IxDyn};

fn constant_grid(shape: &[usize], dims: &[&str], value: f64) -> Grid {
    Grid::new(ArrayD::from_elem(IxDyn(shape), value), dims).unwrap()
}

fn constant_moments(shape: &[usize], dims: &[&str], mean: f64, std: f64, count: f64) -> MomentSet {
    MomentSet {
        mean: constant_grid(shape, dims, mean),
        std: constant_grid(shape, dims, std),
        count: constant_grid(shape, dims, count),
    }
}

#[test]
fn test_mean_whole_period_wilks_threshold_shape() {
    let shape = [3, 4];
    let dims = ["lat", "lon"];
    let control = constant_moments(&shape, &dims, 0.0, 1.0, 31.0);

    // Three strongly shifted points, nine unshifted ones
    let mut exp_mean = ArrayD::from_elem(IxDyn(&shape), 0.0);
    exp_mean[[0, 0]] = 2.0;
    exp_mean[[1, 2]] = 2.0;
    exp_mean[[2, 3]] = 2.0;
    let experiment = MomentSet {
        mean: Grid::new(exp_mean, &dims).unwrap(),
        std: constant_grid(&shape, &dims, 1.0),
        count: constant_grid(&shape, &dims, 31.0),
    };

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::WholePeriod,
    );
    let result = SignificancePipeline::new(SignificanceMode::Wilks, layout)
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap();

    assert_eq!(result.p_values.dims(), &["lat", "lon"]);
    assert_eq!(result.p_values.shape(), &[3, 4]);
    for &p in result.p_values.data() {
        assert!((0.0..=1.0).contains(&p));
    }
    // Unshifted points test at p = 1; shifted ones far below alpha
    assert_relative_eq!(result.p_values.data()[[0, 1]], 1.0, max_relative = 1e-12);
    assert!(result.p_values.data()[[0, 0]] < 1e-5);

    let p_crit = result.p_crit.unwrap();
    assert_eq!(p_crit.dim(), (1, 1));
    // The three shifted points clear the FDR lines, the rest do not
    assert!(p_crit[[0, 0]] > 0.0);
    assert!(p_crit[[0, 0]] < 0.05);
}

#[test]
fn test_all_members_monthly_threshold_addressing() {
    let shape = [2, 3, 2, 2];
    let dims = ["ensemble_member", "month", "lat", "lon"];
    let control = constant_moments(&shape, &dims, 0.0, 1.0, 20.0);
    let experiment = constant_moments(&shape, &dims, 3.0, 1.0, 20.0);

    let layout = AxisLayout::new(
        EnsembleRepresentation::AllMembers,
        TemporalGranularity::Monthly,
    );
    let result = SignificancePipeline::new(SignificanceMode::Wilks, layout)
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap();

    let p_crit = result.p_crit.unwrap();
    // One threshold per (member, month) slice
    assert_eq!(p_crit.dim(), (2, 3));
    // Every point is shifted, so every slice lands in the
    // all-significant branch with a common threshold
    let expected = *result
        .p_values
        .data()
        .first()
        .unwrap();
    for &threshold in &p_crit {
        assert_relative_eq!(threshold, expected, max_relative = 1e-9);
    }
}

#[test]
fn test_degenerate_slice_aborts_wilks_run() {
    let shape = [2, 2, 2];
    let dims = ["month", "lat", "lon"];
    let control = constant_moments(&shape, &dims, 0.0, 1.0, 31.0);

    // Month 1 has a single sample, so its whole p-value slice is NaN
    let mut exp_count = ArrayD::from_elem(IxDyn(&shape), 31.0);
    exp_count.index_axis_mut(ndarray::Axis(0), 1).fill(1.0);
    let experiment = MomentSet {
        mean: constant_grid(&shape, &dims, 1.0),
        std: constant_grid(&shape, &dims, 1.0),
        count: Grid::new(exp_count, &dims).unwrap(),
    };

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::Monthly,
    );
    let result = SignificancePipeline::new(SignificanceMode::Wilks, layout).run(
        &control,
        &experiment,
        "TREFHT",
        tails_for_radiative_fluxes,
    );

    // The failing slice aborts the run; no partial threshold array
    assert!(matches!(result, Err(EnsSigError::EmptyPValues)));

    // The same data is fine when the caller skips the Wilks step
    let no_wilks = SignificancePipeline::new(SignificanceMode::NoWilks, layout)
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap();
    assert!(no_wilks.p_crit.is_none());
    assert!(no_wilks.p_values.data()[[1, 0, 0]].is_nan());
    assert!(no_wilks.p_values.data()[[0, 0, 0]] < 1.0);
}

#[test]
fn test_no_wilks_mode_produces_no_thresholds() {
    let shape = [2, 2];
    let dims = ["lat", "lon"];
    let control = constant_moments(&shape, &dims, 0.0, 1.0, 31.0);
    let experiment = constant_moments(&shape, &dims, 1.0, 1.0, 31.0);

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::WholePeriod,
    );
    let result = SignificancePipeline::new(SignificanceMode::NoWilks, layout)
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap();

    assert!(result.p_crit.is_none());
    assert_eq!(result.p_values.shape(), &[2, 2]);
}

#[test]
fn test_layout_mismatch_fails_before_computation() {
    let control = constant_moments(&[2, 2], &["lat", "lon"], 0.0, 1.0, 31.0);
    let experiment = constant_moments(&[2, 2], &["lat", "lon"], 1.0, 1.0, 31.0);

    // Layout promises an ensemble axis the grids do not have
    let layout = AxisLayout::new(
        EnsembleRepresentation::AllMembers,
        TemporalGranularity::WholePeriod,
    );
    let err = SignificancePipeline::new(SignificanceMode::Wilks, layout)
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap_err();
    assert!(matches!(err, EnsSigError::LayoutMismatch { .. }));
    assert!(format!("{}", err).contains("expected layout"));
}

#[test]
fn test_expected_dims_per_layout() {
    let layout = AxisLayout::new(
        EnsembleRepresentation::AllMembers,
        TemporalGranularity::Seasonal,
    );
    assert_eq!(
        layout.expected_dims(),
        &["ensemble_member", "season", "lat", "lon"]
    );

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::Yearly,
    );
    assert_eq!(layout.expected_dims(), &["year", "lat", "lon"]);

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::WholePeriod,
    );
    assert_eq!(layout.expected_dims(), &["lat", "lon"]);
}

#[test]
fn test_radiative_flux_tail_rule() {
    assert_eq!(tails_for_radiative_fluxes("FLDS"), Tails::One);
    assert_eq!(tails_for_radiative_fluxes("FLUT"), Tails::One);
    assert_eq!(tails_for_radiative_fluxes("TREFHT"), Tails::Two);
    assert_eq!(tails_for_radiative_fluxes("PRECT"), Tails::Two);
}

#[test]
fn test_one_sided_variable_halves_pipeline_p_values() {
    let shape = [2, 2];
    let dims = ["lat", "lon"];
    let control = constant_moments(&shape, &dims, 0.0, 1.0, 31.0);
    let experiment = constant_moments(&shape, &dims, 0.5, 1.0, 31.0);

    let layout = AxisLayout::new(
        EnsembleRepresentation::Mean,
        TemporalGranularity::WholePeriod,
    );
    let pipeline = SignificancePipeline::new(SignificanceMode::NoWilks, layout);

    let one_sided = pipeline
        .run(&control, &experiment, "FLUT", tails_for_radiative_fluxes)
        .unwrap();
    let two_sided = pipeline
        .run(&control, &experiment, "TREFHT", tails_for_radiative_fluxes)
        .unwrap();

    assert_relative_eq!(
        *one_sided.p_values.data().first().unwrap(),
        *two_sided.p_values.data().first().unwrap() / 2.0,
        max_relative = 1e-12
    );
}
