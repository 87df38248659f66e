//! Trainer state and the boosting driver.
//!
//! A [`Trainer`] owns everything one boosting run touches: features and
//! combinations, packed datasets, sampling sets, the current and best model
//! tensors, scratch update tensors, and the tree learner's cached buffers.
//! The driver operations are [`generate_update`](Trainer::generate_update),
//! [`apply_update`](Trainer::apply_update) /
//! [`apply_pending_update`](Trainer::apply_pending_update),
//! [`step`](Trainer::step), and the model accessors.
//!
//! One trainer is single-threaded; calls must be externally serialized.
//! Independent trainers can run in parallel.

use ndarray::ArrayView2;

use crate::data::{Dataset, DatasetLayout, Feature, FeatureCombination, FeatureKind};
use crate::error::TrainError;
use crate::tensor::{SegmentedTensor, MAX_DIMENSIONS};
use crate::training::learner::{GreedyTreeLearner, LearnerScratch, TrainingView, TreeLearner};
use crate::training::sampling::{generate_sampling_sets, SamplingSet};
use crate::training::sweep::{self, LossRoute};

// =============================================================================
// Boundary descriptions
// =============================================================================

/// One feature as the caller describes it. Counts are 64-bit and converted
/// (checked) into host sizes during initialization.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    /// Number of discrete bin values, `>= 0`.
    pub n_bins: i64,
    pub kind: FeatureKind,
    pub has_missing: bool,
}

/// One feature combination: the ordered feature indices whose cross-product
/// indexes its tensor.
#[derive(Debug, Clone)]
pub struct CombinationSpec {
    pub feature_indices: Vec<i64>,
}

/// Regression dataset input: real targets plus the row-major
/// `case × feature` bin-index matrix.
#[derive(Debug, Clone, Copy)]
pub struct RegressionData<'a> {
    pub targets: &'a [f64],
    pub inputs: ArrayView2<'a, i64>,
    /// Initial prediction scores (`n_cases`); zeros when absent.
    pub initial_scores: Option<&'a [f64]>,
}

/// Classification dataset input: integer class targets plus the bin-index
/// matrix.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationData<'a> {
    pub targets: &'a [i64],
    pub inputs: ArrayView2<'a, i64>,
    /// Initial scores (`n_cases * vector_len`); zeros when absent.
    pub initial_scores: Option<&'a [f64]>,
}

// =============================================================================
// Parameters
// =============================================================================

/// Trainer-lifetime configuration.
#[derive(Debug, Clone)]
pub struct TrainerParams {
    /// Seed for sampling-set generation.
    pub seed: u64,
    /// Bootstrap sets per step. Zero trains on the full data with one
    /// effective set.
    pub inner_bag_count: usize,
    /// Multiclass identifiability: pin this class's residual to zero after
    /// every residual update.
    pub zero_residual_index: Option<usize>,
    /// Represent binary problems with one logit per class. The per-step
    /// update is halved to keep the effective learning rate unchanged.
    pub expand_binary_logits: bool,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            seed: 42,
            inner_bag_count: 0,
            zero_residual_index: None,
            expand_binary_logits: false,
        }
    }
}

/// Per-step parameters for `generate_update` / `step`.
#[derive(Debug, Clone)]
pub struct UpdateParams {
    pub learning_rate: f64,
    /// Split budget for single-dimensional tree fits.
    pub max_tree_splits: usize,
    /// Minimum cases a segment needs before it may be split further.
    pub min_cases_for_parent_split: usize,
    /// Reserved; must be `None`.
    pub case_weights: Option<Vec<f64>>,
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_tree_splits: 4,
            min_cases_for_parent_split: 2,
            case_weights: None,
        }
    }
}

/// What the trainer is learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningMode {
    Regression,
    Classification { n_classes: usize },
}

// =============================================================================
// Trainer
// =============================================================================

/// The boosting trainer: owned state plus the step operations.
///
/// Generic over the tree learner so tests and callers can inject their own
/// fits; [`GreedyTreeLearner`] is the default.
#[derive(Debug)]
pub struct Trainer<L: TreeLearner = GreedyTreeLearner> {
    mode: LearningMode,
    /// `None` for degenerate classification (`n_classes <= 1`), where every
    /// driver call short-circuits.
    route: Option<LossRoute>,
    vector_len: usize,
    features: Vec<Feature>,
    combinations: Vec<FeatureCombination>,
    training: Option<Dataset>,
    validation: Option<Dataset>,
    sampling_sets: Vec<SamplingSet>,
    /// Model tensors, kept expanded from allocation.
    current: Vec<SegmentedTensor>,
    best: Vec<SegmentedTensor>,
    best_metric: f64,
    /// Scratch the learner overwrites once per bag.
    per_bag: SegmentedTensor,
    /// Bag updates summed, scaled and expanded; aliased by
    /// [`pending_update`](Self::pending_update).
    accumulated: SegmentedTensor,
    /// Which combination the accumulated tensor currently belongs to.
    pending: Option<usize>,
    scratch: LearnerScratch,
    learner: L,
    /// Extra factor of 1/2 applied to updates under expanded binary logits.
    halve_updates: bool,
}

impl Trainer<GreedyTreeLearner> {
    /// Initialize a regression trainer with the built-in tree learner.
    pub fn regression(
        features: &[FeatureSpec],
        combinations: &[CombinationSpec],
        training: Option<RegressionData<'_>>,
        validation: Option<RegressionData<'_>>,
        params: TrainerParams,
    ) -> Result<Self, TrainError> {
        Self::regression_with_learner(features, combinations, training, validation, params, GreedyTreeLearner)
    }

    /// Initialize a classification trainer with the built-in tree learner.
    pub fn classification(
        features: &[FeatureSpec],
        combinations: &[CombinationSpec],
        n_classes: i64,
        training: Option<ClassificationData<'_>>,
        validation: Option<ClassificationData<'_>>,
        params: TrainerParams,
    ) -> Result<Self, TrainError> {
        Self::classification_with_learner(
            features,
            combinations,
            n_classes,
            training,
            validation,
            params,
            GreedyTreeLearner,
        )
    }
}

impl<L: TreeLearner> Trainer<L> {
    /// Regression initialization with a caller-supplied tree learner.
    pub fn regression_with_learner(
        features: &[FeatureSpec],
        combinations: &[CombinationSpec],
        training: Option<RegressionData<'_>>,
        validation: Option<RegressionData<'_>>,
        params: TrainerParams,
        learner: L,
    ) -> Result<Self, TrainError> {
        log::debug!(
            "initializing regression trainer: {} features, {} combinations",
            features.len(),
            combinations.len()
        );
        let training = training.map(|d| PreparedData {
            n_cases: d.targets.len(),
            inputs: d.inputs,
            real_targets: Some(d.targets),
            class_targets: None,
            initial_scores: d.initial_scores,
        });
        let validation = validation.map(|d| PreparedData {
            n_cases: d.targets.len(),
            inputs: d.inputs,
            real_targets: Some(d.targets),
            class_targets: None,
            initial_scores: d.initial_scores,
        });
        Self::initialize(
            LearningMode::Regression,
            params,
            features,
            combinations,
            training,
            validation,
            learner,
        )
    }

    /// Classification initialization with a caller-supplied tree learner.
    pub fn classification_with_learner(
        features: &[FeatureSpec],
        combinations: &[CombinationSpec],
        n_classes: i64,
        training: Option<ClassificationData<'_>>,
        validation: Option<ClassificationData<'_>>,
        params: TrainerParams,
        learner: L,
    ) -> Result<Self, TrainError> {
        let n_classes = convert_count(n_classes, "class count")?;
        log::debug!(
            "initializing classification trainer: {} classes, {} features, {} combinations",
            n_classes,
            features.len(),
            combinations.len()
        );
        let training = training
            .map(|d| {
                Ok::<_, TrainError>(PreparedData {
                    n_cases: d.targets.len(),
                    inputs: d.inputs,
                    real_targets: None,
                    class_targets: Some(convert_class_targets(d.targets, n_classes)?),
                    initial_scores: d.initial_scores,
                })
            })
            .transpose()?;
        let validation = validation
            .map(|d| {
                Ok::<_, TrainError>(PreparedData {
                    n_cases: d.targets.len(),
                    inputs: d.inputs,
                    real_targets: None,
                    class_targets: Some(convert_class_targets(d.targets, n_classes)?),
                    initial_scores: d.initial_scores,
                })
            })
            .transpose()?;
        Self::initialize(
            LearningMode::Classification { n_classes },
            params,
            features,
            combinations,
            training,
            validation,
            learner,
        )
    }

    fn initialize(
        mode: LearningMode,
        params: TrainerParams,
        feature_specs: &[FeatureSpec],
        combination_specs: &[CombinationSpec],
        training: Option<PreparedData<'_>>,
        validation: Option<PreparedData<'_>>,
        learner: L,
    ) -> Result<Self, TrainError> {
        let features = build_features(feature_specs)?;
        let combinations = build_combinations(&features, combination_specs)?;

        let (route, vector_len, halve_updates) = resolve_route(mode, &params)?;

        // Empty datasets behave as absent ones.
        let training = training.filter(|d| d.n_cases > 0);
        let validation = validation.filter(|d| d.n_cases > 0);

        if route.is_none() {
            log::warn!("classification with <= 1 class: trainer is degenerate, all steps are no-ops");
            return Ok(Self {
                mode,
                route: None,
                vector_len: 0,
                features,
                combinations,
                training: None,
                validation: None,
                sampling_sets: Vec::new(),
                current: Vec::new(),
                best: Vec::new(),
                best_metric: f64::INFINITY,
                per_bag: SegmentedTensor::new(MAX_DIMENSIONS, 0),
                accumulated: SegmentedTensor::new(MAX_DIMENSIONS, 0),
                pending: None,
                scratch: LearnerScratch::new(true, 1, 0),
                learner,
                halve_updates: false,
            });
        }
        let route_value = route.expect("non-degenerate route");

        let training = training
            .map(|d| build_dataset(&features, &combinations, route_value, &d, DatasetLayout::training(route_value.is_classification())))
            .transpose()?;
        let validation = validation
            .map(|d| build_dataset(&features, &combinations, route_value, &d, DatasetLayout::validation(route_value.is_classification())))
            .transpose()?;

        let sampling_sets = match &training {
            Some(training) => {
                generate_sampling_sets(training.n_cases(), params.inner_bag_count, params.seed)
            }
            None => Vec::new(),
        };

        let mut current = Vec::with_capacity(combinations.len());
        let mut best = Vec::with_capacity(combinations.len());
        for combination in &combinations {
            current.push(allocate_model_tensor(combination, vector_len)?);
            best.push(allocate_model_tensor(combination, vector_len)?);
        }

        let max_cells = combinations
            .iter()
            .map(FeatureCombination::tensor_cells)
            .max()
            .unwrap_or(1);
        let scratch = LearnerScratch::new(route_value.is_classification(), max_cells, vector_len);

        log::debug!(
            "trainer ready: vector_len={}, {} sampling sets, {} model tensors",
            vector_len,
            sampling_sets.len(),
            current.len()
        );
        Ok(Self {
            mode,
            route,
            vector_len,
            features,
            combinations,
            training,
            validation,
            sampling_sets,
            current,
            best,
            best_metric: f64::INFINITY,
            per_bag: SegmentedTensor::new(MAX_DIMENSIONS, vector_len),
            accumulated: SegmentedTensor::new(MAX_DIMENSIONS, vector_len),
            pending: None,
            scratch,
            learner,
            halve_updates,
        })
    }

    // =========================================================================
    // Driver operations
    // =========================================================================

    /// Fit one candidate update for a combination: one tree per sampling
    /// set, summed, scaled by `learning_rate / bag_count`, and expanded to
    /// the combination's full shape.
    ///
    /// Returns the average gain across bags (non-positive by convention).
    /// The update itself is readable through
    /// [`pending_update`](Self::pending_update) and applied with
    /// [`apply_pending_update`](Self::apply_pending_update); it stays valid
    /// until the next state-mutating call.
    pub fn generate_update(
        &mut self,
        combination_index: usize,
        params: &UpdateParams,
    ) -> Result<f64, TrainError> {
        log::trace!("generate_update: combination {combination_index}");
        self.pending = None;
        if params.case_weights.is_some() {
            return Err(TrainError::WeightsUnsupported);
        }
        debug_assert!(params.learning_rate.is_finite());
        let combination = self.combinations.get(combination_index).ok_or(
            TrainError::CombinationIndexOutOfBounds {
                index: combination_index,
                n_combinations: self.combinations.len(),
            },
        )?;
        if self.vector_len == 0 {
            log::warn!("generate_update on degenerate classification trainer");
            return Ok(0.0);
        }

        let dims = combination.dim_count();
        self.accumulated.set_dim_count(dims);
        self.accumulated.reset();

        let mut total_gain = 0.0;
        if let Some(training) = self.training.as_ref() {
            self.per_bag.set_dim_count(dims);
            let view = TrainingView {
                n_cases: training.n_cases(),
                vector_len: self.vector_len,
                residuals: training
                    .residuals()
                    .expect("training sets store residuals"),
                packed: training.packed(combination_index),
            };
            let n_bags = self.sampling_sets.len();
            debug_assert!(n_bags > 0);
            for bag in &self.sampling_sets {
                let mut gain = 0.0;
                match dims {
                    0 => self.learner.fit_zero_dim(
                        &mut self.scratch,
                        bag,
                        &view,
                        &mut self.per_bag,
                    )?,
                    1 => self.learner.fit_single_dim(
                        &mut self.scratch,
                        bag,
                        &view,
                        combination,
                        params.max_tree_splits,
                        params.min_cases_for_parent_split,
                        &mut self.per_bag,
                        &mut gain,
                    )?,
                    _ => self.learner.fit_multi_dim(
                        &mut self.scratch,
                        bag,
                        &view,
                        combination,
                        &mut self.per_bag,
                    )?,
                }
                total_gain += gain;
                self.accumulated.add(&self.per_bag)?;
            }
            total_gain /= n_bags as f64;

            let mut factor = params.learning_rate / n_bags as f64;
            if self.halve_updates {
                factor /= 2.0;
            }
            self.accumulated.multiply(factor);
        }

        // Expanding here makes every downstream lookup a direct index.
        self.accumulated.expand(combination.state_counts())?;
        debug_assert!(total_gain <= 1e-9, "gain convention: non-positive, got {total_gain}");
        self.pending = Some(combination_index);
        log::trace!("generate_update done: gain {total_gain}");
        Ok(total_gain)
    }

    /// The update produced by the last [`generate_update`](Self::generate_update),
    /// in the combination's expanded layout.
    pub fn pending_update(&self) -> Option<&[f64]> {
        self.pending?;
        self.accumulated.expanded_values().ok()
    }

    /// Apply the pending generated update to the model, sweep the training
    /// and validation sets, and promote the best model when the validation
    /// metric improved. Returns the metric (0 without a validation set).
    pub fn apply_pending_update(&mut self, combination_index: usize) -> Result<f64, TrainError> {
        let Some(route) = self.route else {
            return Ok(0.0);
        };
        if self.pending != Some(combination_index) {
            return Err(TrainError::NoPendingUpdate(combination_index));
        }
        let update = self.accumulated.expanded_values()?;
        apply_update_inner(
            route,
            &self.combinations,
            combination_index,
            self.training.as_mut(),
            self.validation.as_mut(),
            &mut self.current,
            &mut self.best,
            &mut self.best_metric,
            update,
        )
    }

    /// Apply a caller-provided expanded update tensor. `None` is a no-op
    /// returning metric 0.
    pub fn apply_update(
        &mut self,
        combination_index: usize,
        update: Option<&[f64]>,
    ) -> Result<f64, TrainError> {
        log::trace!("apply_update: combination {combination_index}");
        let Some(update) = update else {
            return Ok(0.0);
        };
        let Some(route) = self.route else {
            return Ok(0.0);
        };
        if combination_index >= self.combinations.len() {
            return Err(TrainError::CombinationIndexOutOfBounds {
                index: combination_index,
                n_combinations: self.combinations.len(),
            });
        }
        apply_update_inner(
            route,
            &self.combinations,
            combination_index,
            self.training.as_mut(),
            self.validation.as_mut(),
            &mut self.current,
            &mut self.best,
            &mut self.best_metric,
            update,
        )
    }

    /// One boosting step: generate an update and apply it. The gain is
    /// discarded; the validation metric is returned.
    pub fn step(&mut self, combination_index: usize, params: &UpdateParams) -> Result<f64, TrainError> {
        if self.vector_len == 0 {
            // Even the generate half is skipped: a single-class model already
            // predicts perfectly.
            log::warn!("step on degenerate classification trainer");
            return Ok(0.0);
        }
        self.generate_update(combination_index, params)?;
        self.apply_pending_update(combination_index)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Dense expanded values of the current model for one combination.
    ///
    /// `None` for degenerate classification or an out-of-range index. The
    /// slice aliases trainer storage and is valid until the next mutating
    /// call.
    pub fn current_values(&self, combination_index: usize) -> Option<&[f64]> {
        if self.vector_len == 0 {
            return None;
        }
        self.current.get(combination_index).map(SegmentedTensor::values)
    }

    /// Dense expanded values of the best-so-far model for one combination.
    pub fn best_values(&self, combination_index: usize) -> Option<&[f64]> {
        if self.vector_len == 0 {
            return None;
        }
        self.best.get(combination_index).map(SegmentedTensor::values)
    }

    /// Lowest validation metric seen so far (infinity before the first
    /// improvement).
    #[inline]
    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    #[inline]
    pub fn mode(&self) -> LearningMode {
        self.mode
    }

    /// Values per case in model and score arrays (0 when degenerate).
    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// The tree learner, e.g. to inspect state a custom learner records.
    #[inline]
    pub fn learner(&self) -> &L {
        &self.learner
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn n_combinations(&self) -> usize {
        self.combinations.len()
    }
}

// =============================================================================
// Initialization helpers
// =============================================================================

/// Dataset inputs normalized across the two learning modes.
struct PreparedData<'a> {
    n_cases: usize,
    inputs: ArrayView2<'a, i64>,
    real_targets: Option<&'a [f64]>,
    class_targets: Option<Vec<usize>>,
    initial_scores: Option<&'a [f64]>,
}

fn convert_count(value: i64, what: &'static str) -> Result<usize, TrainError> {
    if value < 0 {
        return Err(TrainError::NegativeCount { what, got: value });
    }
    usize::try_from(value).map_err(|_| TrainError::IntegerWidth(value))
}

fn convert_class_targets(targets: &[i64], n_classes: usize) -> Result<Vec<usize>, TrainError> {
    targets
        .iter()
        .map(|&target| {
            usize::try_from(target)
                .ok()
                .filter(|&t| t < n_classes)
                .ok_or(TrainError::TargetOutOfRange {
                    got: target,
                    n_classes,
                })
        })
        .collect()
}

fn build_features(specs: &[FeatureSpec]) -> Result<Vec<Feature>, TrainError> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let n_states = convert_count(spec.n_bins, "feature bin count")?;
            if spec.kind == FeatureKind::Nominal {
                log::warn!("feature {index} is nominal; bins are treated as ordered");
            }
            if spec.has_missing {
                log::warn!("feature {index} declares a missing bin; it is treated as a regular bin");
            }
            Ok(Feature {
                n_states,
                index,
                kind: spec.kind,
                has_missing: spec.has_missing,
            })
        })
        .collect()
}

fn build_combinations(
    features: &[Feature],
    specs: &[CombinationSpec],
) -> Result<Vec<FeatureCombination>, TrainError> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let indices = spec
                .feature_indices
                .iter()
                .map(|&i| convert_count(i, "combination feature index"))
                .collect::<Result<Vec<_>, _>>()?;
            FeatureCombination::build(features, &indices, index)
        })
        .collect()
}

fn resolve_route(
    mode: LearningMode,
    params: &TrainerParams,
) -> Result<(Option<LossRoute>, usize, bool), TrainError> {
    match mode {
        LearningMode::Regression => Ok((Some(LossRoute::Regression), 1, false)),
        LearningMode::Classification { n_classes } => {
            if n_classes <= 1 {
                return Ok((None, 0, false));
            }
            if n_classes == 2 && !params.expand_binary_logits {
                return Ok((Some(LossRoute::Binary), 1, false));
            }
            if let Some(zero) = params.zero_residual_index {
                if zero >= n_classes {
                    return Err(TrainError::ZeroResidualOutOfRange {
                        got: zero,
                        n_classes,
                    });
                }
            }
            let route = LossRoute::Multiclass {
                n_classes,
                zero_residual: params.zero_residual_index,
            };
            Ok((Some(route), n_classes, n_classes == 2))
        }
    }
}

fn build_dataset(
    features: &[Feature],
    combinations: &[FeatureCombination],
    route: LossRoute,
    parts: &PreparedData<'_>,
    layout: DatasetLayout,
) -> Result<Dataset, TrainError> {
    let vector_len = route.vector_len();
    if let Some(scores) = parts.initial_scores {
        let expected = parts.n_cases * vector_len;
        if scores.len() != expected {
            return Err(TrainError::LengthMismatch {
                what: "initial prediction scores",
                got: scores.len(),
                expected,
            });
        }
    }
    let mut dataset = Dataset::new(
        features,
        combinations,
        parts.inputs,
        parts.n_cases,
        parts.class_targets.as_deref(),
        layout,
        vector_len,
    )?;
    sweep::initialize_dataset(route, &mut dataset, parts.real_targets, parts.initial_scores);
    Ok(dataset)
}

/// Allocate a model tensor pre-expanded to a combination's full shape so
/// external lookups are direct indexing from the start.
fn allocate_model_tensor(
    combination: &FeatureCombination,
    vector_len: usize,
) -> Result<SegmentedTensor, TrainError> {
    let mut tensor = SegmentedTensor::new(combination.dim_count(), vector_len);
    tensor.set_dim_count(combination.dim_count());
    tensor.expand(combination.state_counts())?;
    Ok(tensor)
}

#[allow(clippy::too_many_arguments)]
fn apply_update_inner(
    route: LossRoute,
    combinations: &[FeatureCombination],
    combination_index: usize,
    training: Option<&mut Dataset>,
    validation: Option<&mut Dataset>,
    current: &mut [SegmentedTensor],
    best: &mut [SegmentedTensor],
    best_metric: &mut f64,
    update: &[f64],
) -> Result<f64, TrainError> {
    let combination = &combinations[combination_index];
    let expected = combination.tensor_cells() * route.vector_len();
    if update.len() != expected {
        return Err(TrainError::UpdateShapeMismatch {
            got: update.len(),
            expected,
        });
    }

    current[combination_index].add_expanded(update)?;

    if let Some(training) = training {
        sweep::update_training_set(route, combination, training, update);
    }

    let mut metric = 0.0;
    if let Some(validation) = validation {
        metric = sweep::evaluate_validation_set(route, combination, validation, update);
        debug_assert!(metric >= 0.0);
        if metric < *best_metric {
            *best_metric = metric;
            for (best, current) in best.iter_mut().zip(current.iter()) {
                best.copy_from(current);
            }
            log::trace!("best model updated: metric {metric}");
        }
    }
    Ok(metric)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn ordinal_spec(n_bins: i64) -> FeatureSpec {
        FeatureSpec {
            n_bins,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }
    }

    #[test]
    fn rejects_negative_bin_counts() {
        let err = Trainer::regression(
            &[ordinal_spec(-3)],
            &[CombinationSpec {
                feature_indices: vec![0],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::NegativeCount { .. }));
    }

    #[test]
    fn rejects_out_of_range_class_targets() {
        let inputs = Array2::<i64>::zeros((2, 0));
        let err = Trainer::classification(
            &[],
            &[],
            3,
            Some(ClassificationData {
                targets: &[0, 3],
                inputs: inputs.view(),
                initial_scores: None,
            }),
            None,
            TrainerParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::TargetOutOfRange { got: 3, .. }));
    }

    #[test]
    fn rejects_zero_residual_index_out_of_range() {
        let err = Trainer::classification(
            &[],
            &[],
            3,
            None,
            None,
            TrainerParams {
                zero_residual_index: Some(3),
                ..TrainerParams::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::ZeroResidualOutOfRange { .. }));
    }

    #[test]
    fn rejects_reserved_case_weights() {
        let mut trainer = Trainer::regression(
            &[],
            &[CombinationSpec {
                feature_indices: vec![],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap();
        let err = trainer
            .generate_update(
                0,
                &UpdateParams {
                    case_weights: Some(vec![1.0]),
                    ..UpdateParams::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, TrainError::WeightsUnsupported);
    }

    #[test]
    fn generate_without_training_data_yields_zero_update() {
        let mut trainer = Trainer::regression(
            &[ordinal_spec(3)],
            &[CombinationSpec {
                feature_indices: vec![0],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap();
        let gain = trainer.generate_update(0, &UpdateParams::default()).unwrap();
        assert_eq!(gain, 0.0);
        assert_eq!(trainer.pending_update().unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn apply_none_is_a_no_op() {
        let mut trainer = Trainer::regression(
            &[],
            &[CombinationSpec {
                feature_indices: vec![],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap();
        assert_eq!(trainer.apply_update(0, None).unwrap(), 0.0);
    }

    #[test]
    fn apply_pending_requires_matching_generate() {
        let mut trainer = Trainer::regression(
            &[],
            &[CombinationSpec {
                feature_indices: vec![],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap();
        let err = trainer.apply_pending_update(0).unwrap_err();
        assert_eq!(err, TrainError::NoPendingUpdate(0));
    }

    #[test]
    fn model_tensors_are_expanded_from_the_start() {
        let trainer = Trainer::regression(
            &[ordinal_spec(4)],
            &[CombinationSpec {
                feature_indices: vec![0],
            }],
            None,
            None,
            TrainerParams::default(),
        )
        .unwrap();
        assert_eq!(trainer.current_values(0).unwrap(), &[0.0; 4]);
        assert_eq!(trainer.best_values(0).unwrap(), &[0.0; 4]);
        assert!(trainer.current_values(1).is_none());
    }
}
