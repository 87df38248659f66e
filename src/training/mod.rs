//! Training infrastructure for the boosting driver.
//!
//! ## Components
//!
//! - [`Trainer`]: owned training state plus the step operations
//! - [`TreeLearner`] / [`GreedyTreeLearner`]: the per-bag tree-fit seam and
//!   its default implementation
//! - [`SamplingSet`]: bootstrap inner bags
//! - [`stats`]: residual, log-loss and Newton-step math
//!
//! The residual/score sweep loops live in a private module; they are driven
//! exclusively through [`Trainer`].

pub mod learner;
pub mod sampling;
pub mod stats;
mod sweep;
mod trainer;

pub use learner::{
    ClassificationScratch, GreedyTreeLearner, LearnerScratch, RegressionScratch, TrainingView,
    TreeLearner,
};
pub use sampling::{generate_sampling_sets, SamplingSet};
pub use trainer::{
    ClassificationData, CombinationSpec, FeatureSpec, LearningMode, RegressionData, Trainer,
    TrainerParams, UpdateParams,
};
