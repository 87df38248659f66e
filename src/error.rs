//! Error types for trainer construction and boosting steps.

/// Errors surfaced by trainer initialization and the boosting driver.
///
/// All variants are terminal for the call that produced them; the trainer
/// itself stays usable after a failed step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainError {
    /// A boundary integer does not fit the host address width.
    #[error("integer value {0} does not fit the host address width")]
    IntegerWidth(i64),

    /// A count that must be non-negative was negative.
    #[error("{what} must be non-negative, got {got}")]
    NegativeCount { what: &'static str, got: i64 },

    /// A feature index referenced by a combination is out of bounds.
    #[error("feature index {index} out of bounds ({n_features} features)")]
    FeatureIndexOutOfBounds { index: usize, n_features: usize },

    /// A combination index passed to a driver operation is out of bounds.
    #[error("combination index {index} out of bounds ({n_combinations} combinations)")]
    CombinationIndexOutOfBounds {
        index: usize,
        n_combinations: usize,
    },

    /// A combination has more significant dimensions than the tensor
    /// machinery supports.
    #[error("combination {index} has {got} significant dimensions (max {max})")]
    TooManyDimensions {
        index: usize,
        got: usize,
        max: usize,
    },

    /// A classification target is outside `[0, class_count)`.
    #[error("target {got} out of range for {n_classes} classes")]
    TargetOutOfRange { got: i64, n_classes: usize },

    /// An input bin index is outside its feature's state range.
    #[error("bin index {got} out of range for feature with {n_states} states")]
    BinOutOfRange { got: i64, n_states: usize },

    /// An input slice has the wrong length for the declared shape.
    #[error("{what} has length {got}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// A tensor capacity computation overflowed `usize`.
    #[error("tensor capacity overflow")]
    CapacityOverflow,

    /// An update tensor passed to `apply_update` does not match the
    /// combination's expanded shape.
    #[error("update tensor has {got} values, combination expects {expected}")]
    UpdateShapeMismatch { got: usize, expected: usize },

    /// The configured zero-residual class does not exist.
    #[error("zero-residual index {got} out of range for {n_classes} classes")]
    ZeroResidualOutOfRange { got: usize, n_classes: usize },

    /// `apply_pending_update` was called without a matching
    /// `generate_update`.
    #[error("no pending update for combination {0}")]
    NoPendingUpdate(usize),

    /// Per-case weights are accepted by the interface but not implemented.
    #[error("per-case weights are reserved and must be empty")]
    WeightsUnsupported,

    /// The tree learner reported a failure for one of the sampling sets.
    #[error("tree learner failed: {0}")]
    TreeLearner(String),

    /// A tensor operation was invoked in a state that does not permit it.
    #[error("tensor is not in expanded form")]
    TensorNotExpanded,
}
