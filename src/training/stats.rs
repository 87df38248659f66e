//! Loss-function math shared by the sweep loops and tree learners.
//!
//! Prediction scores are raw: predicted values for regression, log-odds for
//! binary classification, unnormalized log-weights for multiclass. Residuals
//! are `target - prediction` under the matching link function.

/// Logistic function.
#[inline]
pub fn sigmoid(score: f64) -> f64 {
    1.0 / (1.0 + (-score).exp())
}

/// Post-process a regression residual. Identity under squared loss; the
/// indirection marks the spot where a different regression loss would bend
/// the residual.
#[inline]
pub fn regression_residual(residual: f64) -> f64 {
    residual
}

/// Residual of a binary case: `y - sigmoid(score)` with `y` in {0, 1}.
#[inline]
pub fn binary_residual(score: f64, target: usize) -> f64 {
    debug_assert!(target <= 1);
    target as f64 - sigmoid(score)
}

/// Residual of one class of a multiclass case:
/// `1{y == k} - exp(score_k) / sum_exp`.
#[inline]
pub fn multiclass_residual(sum_exp: f64, score_k: f64, target: usize, k: usize) -> f64 {
    let indicator = if target == k { 1.0 } else { 0.0 };
    indicator - score_k.exp() / sum_exp
}

/// Per-case log loss of a binary score: `ln(1 + exp(-score))` for positive
/// targets, `ln(1 + exp(score))` for negative ones.
#[inline]
pub fn binary_log_loss(score: f64, target: usize) -> f64 {
    debug_assert!(target <= 1);
    if target == 1 {
        (1.0 + (-score).exp()).ln()
    } else {
        (1.0 + score.exp()).ln()
    }
}

/// Per-case log loss of a multiclass score vector:
/// `ln(sum_exp) - score_target`.
#[inline]
pub fn multiclass_log_loss(sum_exp: f64, score_target: f64) -> f64 {
    sum_exp.ln() - score_target
}

/// Curvature contribution of one classification residual, used as the
/// Newton-step denominator: `|r| * (1 - |r|)`.
#[inline]
pub fn classification_hessian(residual: f64) -> f64 {
    let p = residual.abs();
    p * (1.0 - p)
}

/// Newton step for a segment: summed residuals over summed curvature.
/// Degenerate segments (no curvature mass) get no update.
#[inline]
pub fn newton_step(sum_residual: f64, sum_hessian: f64) -> f64 {
    if sum_hessian.abs() < f64::EPSILON {
        0.0
    } else {
        sum_residual / sum_hessian
    }
}

/// Objective value of a segment under the second-order approximation:
/// `-(sum_residual)^2 / sum_hessian`. Always non-positive; splitting can
/// only lower the total.
#[inline]
pub fn segment_objective(sum_residual: f64, sum_hessian: f64) -> f64 {
    if sum_hessian.abs() < f64::EPSILON {
        0.0
    } else {
        -(sum_residual * sum_residual) / sum_hessian
    }
}
