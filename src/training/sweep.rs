//! Residual and score sweeps over packed inputs.
//!
//! These are the hot loops of a boosting step: apply an expanded update
//! tensor to every case of a dataset, then recompute what the dataset
//! caches — residuals for training sets, scores plus an accumulated metric
//! for validation sets.
//!
//! The per-case work is factored into small helpers generic over the bin
//! stream, so the compiler monomorphizes a scalar-combination variant (bin
//! fixed at 0) and a bit-packed variant per loss route. Within each helper
//! the vector length and the loss branch are loop-invariant.

use crate::data::{Dataset, FeatureCombination};
use crate::training::stats;

/// The loss-specific path a trainer runs. Resolved once at initialization;
/// never re-examined inside the sweep loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LossRoute {
    Regression,
    /// Binary classification with a single log-odds score per case.
    Binary,
    /// Multiclass (or expanded-binary) classification with one log-weight
    /// per class. `zero_residual` pins one class's residual to zero.
    Multiclass {
        n_classes: usize,
        zero_residual: Option<usize>,
    },
}

impl LossRoute {
    /// Values per case in score/residual arrays.
    #[inline]
    pub(crate) fn vector_len(&self) -> usize {
        match *self {
            LossRoute::Regression | LossRoute::Binary => 1,
            LossRoute::Multiclass { n_classes, .. } => n_classes,
        }
    }

    #[inline]
    pub(crate) fn is_classification(&self) -> bool {
        !matches!(self, LossRoute::Regression)
    }
}

// =============================================================================
// Residual initialization
// =============================================================================

/// Fill a freshly built dataset's cached arrays from its targets and the
/// optional initial prediction scores.
pub(crate) fn initialize_dataset(
    route: LossRoute,
    data: &mut Dataset,
    real_targets: Option<&[f64]>,
    initial_scores: Option<&[f64]>,
) {
    if let (Some(scores), Some(initial)) = (data.scores.as_mut(), initial_scores) {
        scores.copy_from_slice(initial);
    }

    let Some(residuals) = data.residuals.as_mut() else {
        return;
    };
    match route {
        LossRoute::Regression => {
            let targets = real_targets.expect("regression datasets carry real targets");
            for (case, residual) in residuals.iter_mut().enumerate() {
                let score = initial_scores.map_or(0.0, |s| s[case]);
                *residual = stats::regression_residual(targets[case] - score);
            }
        }
        LossRoute::Binary => {
            let targets = data.targets.as_deref().expect("classification sets store targets");
            let scores = data.scores.as_deref().expect("classification sets store scores");
            for (case, residual) in residuals.iter_mut().enumerate() {
                *residual = stats::binary_residual(scores[case], targets[case]);
            }
        }
        LossRoute::Multiclass {
            n_classes,
            zero_residual,
        } => {
            let targets = data.targets.as_deref().expect("classification sets store targets");
            let scores = data.scores.as_deref().expect("classification sets store scores");
            for case in 0..targets.len() {
                let base = case * n_classes;
                let row = &scores[base..base + n_classes];
                let sum_exp: f64 = row.iter().map(|s| s.exp()).sum();
                for k in 0..n_classes {
                    residuals[base + k] =
                        stats::multiclass_residual(sum_exp, row[k], targets[case], k);
                }
                if let Some(zero) = zero_residual {
                    residuals[base + zero] = 0.0;
                }
            }
        }
    }
}

// =============================================================================
// Training sweep
// =============================================================================

/// Apply an expanded update tensor to the training set, recomputing the
/// cached residuals (and scores, for classification).
///
/// `update` must hold `tensor_cells * vector_len` values in the
/// combination's expanded layout.
pub(crate) fn update_training_set(
    route: LossRoute,
    combination: &FeatureCombination,
    data: &mut Dataset,
    update: &[f64],
) {
    let n_cases = data.n_cases();
    debug_assert_eq!(
        update.len(),
        combination.tensor_cells() * route.vector_len()
    );

    match route {
        LossRoute::Regression => {
            let residuals = data
                .residuals
                .as_deref_mut()
                .expect("regression training set stores residuals");
            if combination.is_scalar() {
                train_regression(constant_bins(n_cases), update, residuals);
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                train_regression(reader, update, residuals);
            }
        }
        LossRoute::Binary => {
            let residuals = data
                .residuals
                .as_deref_mut()
                .expect("classification training set stores residuals");
            let scores = data
                .scores
                .as_deref_mut()
                .expect("classification training set stores scores");
            let targets = data
                .targets
                .as_deref()
                .expect("classification training set stores targets");
            if combination.is_scalar() {
                train_binary(constant_bins(n_cases), update, scores, residuals, targets);
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                train_binary(reader, update, scores, residuals, targets);
            }
        }
        LossRoute::Multiclass {
            n_classes,
            zero_residual,
        } => {
            let residuals = data
                .residuals
                .as_deref_mut()
                .expect("classification training set stores residuals");
            let scores = data
                .scores
                .as_deref_mut()
                .expect("classification training set stores scores");
            let targets = data
                .targets
                .as_deref()
                .expect("classification training set stores targets");
            if combination.is_scalar() {
                train_multiclass(
                    constant_bins(n_cases),
                    update,
                    scores,
                    residuals,
                    targets,
                    n_classes,
                    zero_residual,
                );
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                train_multiclass(
                    reader,
                    update,
                    scores,
                    residuals,
                    targets,
                    n_classes,
                    zero_residual,
                );
            }
        }
    }
}

// =============================================================================
// Validation sweep
// =============================================================================

/// Apply an expanded update tensor to the validation set and return the
/// metric: RMSE for regression, summed log loss for classification.
pub(crate) fn evaluate_validation_set(
    route: LossRoute,
    combination: &FeatureCombination,
    data: &mut Dataset,
    update: &[f64],
) -> f64 {
    let n_cases = data.n_cases();
    debug_assert!(n_cases > 0);

    match route {
        LossRoute::Regression => {
            let residuals = data
                .residuals
                .as_deref_mut()
                .expect("regression validation set stores residuals");
            let sum_squares = if combination.is_scalar() {
                valid_regression(constant_bins(n_cases), update, residuals)
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                valid_regression(reader, update, residuals)
            };
            (sum_squares / n_cases as f64).sqrt()
        }
        LossRoute::Binary => {
            let scores = data
                .scores
                .as_deref_mut()
                .expect("classification validation set stores scores");
            let targets = data
                .targets
                .as_deref()
                .expect("classification validation set stores targets");
            if combination.is_scalar() {
                valid_binary(constant_bins(n_cases), update, scores, targets)
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                valid_binary(reader, update, scores, targets)
            }
        }
        LossRoute::Multiclass { n_classes, .. } => {
            let scores = data
                .scores
                .as_deref_mut()
                .expect("classification validation set stores scores");
            let targets = data
                .targets
                .as_deref()
                .expect("classification validation set stores targets");
            if combination.is_scalar() {
                valid_multiclass(constant_bins(n_cases), update, scores, targets, n_classes)
            } else {
                let reader = data.packed[combination.index].reader(n_cases);
                valid_multiclass(reader, update, scores, targets, n_classes)
            }
        }
    }
}

// =============================================================================
// Per-route loop bodies
// =============================================================================

/// Bin stream of a scalar combination: every case hits cell 0.
#[inline]
fn constant_bins(n_cases: usize) -> impl Iterator<Item = usize> {
    std::iter::repeat(0).take(n_cases)
}

fn train_regression(bins: impl Iterator<Item = usize>, update: &[f64], residuals: &mut [f64]) {
    for (residual, bin) in residuals.iter_mut().zip(bins) {
        *residual = stats::regression_residual(*residual - update[bin]);
    }
}

fn train_binary(
    bins: impl Iterator<Item = usize>,
    update: &[f64],
    scores: &mut [f64],
    residuals: &mut [f64],
    targets: &[usize],
) {
    for (case, bin) in bins.enumerate() {
        let score = scores[case] + update[bin];
        scores[case] = score;
        residuals[case] = stats::binary_residual(score, targets[case]);
    }
}

#[allow(clippy::too_many_arguments)]
fn train_multiclass(
    bins: impl Iterator<Item = usize>,
    update: &[f64],
    scores: &mut [f64],
    residuals: &mut [f64],
    targets: &[usize],
    n_classes: usize,
    zero_residual: Option<usize>,
) {
    for (case, bin) in bins.enumerate() {
        let score_base = case * n_classes;
        let cell = &update[bin * n_classes..(bin + 1) * n_classes];
        let mut sum_exp = 0.0;
        for (score, delta) in scores[score_base..score_base + n_classes].iter_mut().zip(cell) {
            *score += delta;
            sum_exp += score.exp();
        }
        let target = targets[case];
        for k in 0..n_classes {
            residuals[score_base + k] =
                stats::multiclass_residual(sum_exp, scores[score_base + k], target, k);
        }
        if let Some(zero) = zero_residual {
            residuals[score_base + zero] = 0.0;
        }
    }
}

fn valid_regression(
    bins: impl Iterator<Item = usize>,
    update: &[f64],
    residuals: &mut [f64],
) -> f64 {
    let mut sum_squares = 0.0;
    for (residual, bin) in residuals.iter_mut().zip(bins) {
        let updated = stats::regression_residual(*residual - update[bin]);
        sum_squares += updated * updated;
        *residual = updated;
    }
    sum_squares
}

fn valid_binary(
    bins: impl Iterator<Item = usize>,
    update: &[f64],
    scores: &mut [f64],
    targets: &[usize],
) -> f64 {
    let mut sum_log_loss = 0.0;
    for (case, bin) in bins.enumerate() {
        let score = scores[case] + update[bin];
        scores[case] = score;
        sum_log_loss += stats::binary_log_loss(score, targets[case]);
    }
    sum_log_loss
}

fn valid_multiclass(
    bins: impl Iterator<Item = usize>,
    update: &[f64],
    scores: &mut [f64],
    targets: &[usize],
    n_classes: usize,
) -> f64 {
    let mut sum_log_loss = 0.0;
    for (case, bin) in bins.enumerate() {
        let score_base = case * n_classes;
        let cell = &update[bin * n_classes..(bin + 1) * n_classes];
        let mut sum_exp = 0.0;
        for (score, delta) in scores[score_base..score_base + n_classes].iter_mut().zip(cell) {
            *score += delta;
            sum_exp += score.exp();
        }
        sum_log_loss +=
            stats::multiclass_log_loss(sum_exp, scores[score_base + targets[case]]);
    }
    sum_log_loss
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DatasetLayout, Feature, FeatureKind};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn ordinal(n_states: usize, index: usize) -> Feature {
        Feature {
            n_states,
            index,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }
    }

    fn single_feature_setup(
        n_states: usize,
        inputs: ndarray::Array2<i64>,
        class_targets: Option<&[usize]>,
        layout: DatasetLayout,
        vector_len: usize,
    ) -> (Vec<FeatureCombination>, Dataset) {
        let features = vec![ordinal(n_states, 0)];
        let combos = vec![FeatureCombination::build(&features, &[0], 0).unwrap()];
        let n_cases = inputs.nrows();
        let data = Dataset::new(
            &features,
            &combos,
            inputs.view(),
            n_cases,
            class_targets,
            layout,
            vector_len,
        )
        .unwrap();
        (combos, data)
    }

    #[test]
    fn regression_update_shifts_residuals_per_bin() {
        let (combos, mut data) = single_feature_setup(
            2,
            array![[0i64], [1], [0]],
            None,
            DatasetLayout::training(false),
            1,
        );
        initialize_dataset(
            LossRoute::Regression,
            &mut data,
            Some(&[1.0, 2.0, 3.0]),
            None,
        );
        assert_eq!(data.residuals().unwrap(), &[1.0, 2.0, 3.0]);

        update_training_set(LossRoute::Regression, &combos[0], &mut data, &[0.5, -1.0]);
        assert_eq!(data.residuals().unwrap(), &[0.5, 3.0, 2.5]);
    }

    #[test]
    fn binary_update_moves_scores_and_residuals() {
        let targets = vec![0usize, 1];
        let (combos, mut data) = single_feature_setup(
            2,
            array![[0i64], [1]],
            Some(&targets),
            DatasetLayout::training(true),
            1,
        );
        initialize_dataset(LossRoute::Binary, &mut data, None, None);
        assert_eq!(data.residuals().unwrap(), &[-0.5, 0.5]);

        update_training_set(LossRoute::Binary, &combos[0], &mut data, &[-1.0, 1.0]);
        assert_eq!(data.scores().unwrap(), &[-1.0, 1.0]);
        assert_abs_diff_eq!(
            data.residuals().unwrap()[0],
            -stats::sigmoid(-1.0),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            data.residuals().unwrap()[1],
            1.0 - stats::sigmoid(1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn multiclass_zero_residual_slot_is_pinned() {
        let targets = vec![2usize];
        let (combos, mut data) = single_feature_setup(
            2,
            array![[1i64]],
            Some(&targets),
            DatasetLayout::training(true),
            3,
        );
        let route = LossRoute::Multiclass {
            n_classes: 3,
            zero_residual: Some(0),
        };
        initialize_dataset(route, &mut data, None, None);
        assert_eq!(data.residuals().unwrap()[0], 0.0);

        let update = vec![0.0, 0.0, 0.0, 0.3, -0.2, 0.1];
        update_training_set(route, &combos[0], &mut data, &update);
        assert_eq!(data.scores().unwrap(), &[0.3, -0.2, 0.1]);
        assert_eq!(data.residuals().unwrap()[0], 0.0);

        let sum_exp: f64 = [0.3f64, -0.2, 0.1].iter().map(|s| s.exp()).sum();
        assert_abs_diff_eq!(
            data.residuals().unwrap()[2],
            1.0 - (0.1f64).exp() / sum_exp,
            epsilon = 1e-12
        );
    }

    #[test]
    fn regression_validation_returns_rmse() {
        let (combos, mut data) = single_feature_setup(
            2,
            array![[0i64], [1]],
            None,
            DatasetLayout::validation(false),
            1,
        );
        initialize_dataset(LossRoute::Regression, &mut data, Some(&[3.0, 4.0]), None);

        let metric =
            evaluate_validation_set(LossRoute::Regression, &combos[0], &mut data, &[3.0, 4.0]);
        assert_abs_diff_eq!(metric, 0.0, epsilon = 1e-12);

        let metric =
            evaluate_validation_set(LossRoute::Regression, &combos[0], &mut data, &[-1.0, -2.0]);
        assert_abs_diff_eq!(metric, (5.0f64 / 2.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn binary_validation_sums_log_loss() {
        let targets = vec![1usize, 0];
        let (combos, mut data) = single_feature_setup(
            2,
            array![[0i64], [1]],
            Some(&targets),
            DatasetLayout::validation(true),
            1,
        );
        initialize_dataset(LossRoute::Binary, &mut data, None, None);

        let metric =
            evaluate_validation_set(LossRoute::Binary, &combos[0], &mut data, &[2.0, -2.0]);
        let expected = stats::binary_log_loss(2.0, 1) + stats::binary_log_loss(-2.0, 0);
        assert_abs_diff_eq!(metric, expected, epsilon = 1e-12);
    }
}
