//! gamboost: a training core for gradient-boosted additive models.
//!
//! The trained model is a sum of per-feature (and per-feature-combination)
//! lookup tables. Each boosting step fits a small tree over residuals for
//! one combination on bootstrap-resampled bags, averages the per-bag fits
//! into a dense update tensor, applies it to the running model, and tracks
//! the best model by held-out validation metric.
//!
//! # Key Types
//!
//! - [`Trainer`] - Training state with the step operations
//! - [`TrainerParams`] / [`UpdateParams`] - Configuration
//! - [`FeatureSpec`] / [`CombinationSpec`] - Model structure description
//! - [`SegmentedTensor`] - Compressed n-dimensional lookup tables
//! - [`TreeLearner`] - Seam for substituting the tree-fit algorithm
//!
//! # Training
//!
//! Describe features and combinations, initialize a [`Trainer`] for
//! regression or classification, then call [`Trainer::step`] with a
//! combination index per boosting round; read the result with
//! [`Trainer::best_values`].

pub mod data;
pub mod error;
pub mod tensor;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{Dataset, DatasetLayout, Feature, FeatureCombination, FeatureKind};
pub use error::TrainError;
pub use tensor::{SegmentedTensor, MAX_DIMENSIONS};
pub use training::{
    ClassificationData, CombinationSpec, FeatureSpec, GreedyTreeLearner, LearnerScratch,
    LearningMode, RegressionData, SamplingSet, Trainer, TrainerParams, TrainingView, TreeLearner,
    UpdateParams,
};
