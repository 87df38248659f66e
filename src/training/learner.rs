//! The tree-learner seam and the built-in greedy learner.
//!
//! The boosting driver is generic over [`TreeLearner`]: one fit per sampling
//! set, writing a (usually compressed) update tensor into driver-owned
//! scratch. [`GreedyTreeLearner`] is the default implementation; callers and
//! tests can substitute their own, e.g. to inject fixed updates.

use crate::data::{FeatureCombination, PackedColumn};
use crate::error::TrainError;
use crate::tensor::SegmentedTensor;
use crate::training::sampling::SamplingSet;
use crate::training::stats;

// =============================================================================
// TrainingView
// =============================================================================

/// The slice of training state a tree fit reads: residuals plus the packed
/// bin column of the combination being fit.
#[derive(Debug, Clone, Copy)]
pub struct TrainingView<'a> {
    pub n_cases: usize,
    pub vector_len: usize,
    /// Interleaved residuals, `n_cases * vector_len`.
    pub residuals: &'a [f64],
    /// Packed combined bins of the target combination; empty for scalar
    /// combinations.
    pub packed: &'a PackedColumn,
}

// =============================================================================
// Cached learner resources
// =============================================================================

/// Per-bin accumulation buffers for regression fits.
#[derive(Debug)]
pub struct RegressionScratch {
    /// Residual sums per bin.
    sums: Vec<f64>,
    /// Summed case multiplicities per bin; doubles as the Newton denominator
    /// since squared loss has unit curvature.
    counts: Vec<f64>,
}

/// Per-bin accumulation buffers for classification fits.
#[derive(Debug)]
pub struct ClassificationScratch {
    /// Residual sums per bin and class.
    sums: Vec<f64>,
    /// Curvature sums per bin and class.
    hessians: Vec<f64>,
    /// Summed case multiplicities per bin.
    counts: Vec<f64>,
}

/// Learner working buffers, allocated once per trainer and reused across
/// steps. The variant is fixed by the learning mode for the trainer's whole
/// lifetime.
#[derive(Debug)]
pub enum LearnerScratch {
    Regression(RegressionScratch),
    Classification(ClassificationScratch),
}

impl LearnerScratch {
    /// Allocate buffers able to hold the largest combination's bin grid.
    pub fn new(is_classification: bool, max_cells: usize, vector_len: usize) -> Self {
        let per_class = max_cells * vector_len.max(1);
        if is_classification {
            Self::Classification(ClassificationScratch {
                sums: vec![0.0; per_class],
                hessians: vec![0.0; per_class],
                counts: vec![0.0; max_cells],
            })
        } else {
            Self::Regression(RegressionScratch {
                sums: vec![0.0; per_class],
                counts: vec![0.0; max_cells],
            })
        }
    }

    /// Zero the leading `cells` bins for a new fit.
    fn reset(&mut self, cells: usize, vector_len: usize) {
        let per_class = cells * vector_len;
        match self {
            Self::Regression(scratch) => {
                scratch.sums[..per_class].fill(0.0);
                scratch.counts[..cells].fill(0.0);
            }
            Self::Classification(scratch) => {
                scratch.sums[..per_class].fill(0.0);
                scratch.hessians[..per_class].fill(0.0);
                scratch.counts[..cells].fill(0.0);
            }
        }
    }
}

// =============================================================================
// TreeLearner
// =============================================================================

/// One candidate-update fit per sampling set.
///
/// Implementations write the fit into `out`, which the driver has already
/// sized to the combination's dimensionality. Compressed output (divisions
/// plus per-segment values) is expected; the driver merges and expands.
pub trait TreeLearner {
    /// Fit a scalar combination: a single-cell update over the bag.
    fn fit_zero_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        out: &mut SegmentedTensor,
    ) -> Result<(), TrainError>;

    /// Fit a one-dimensional combination, reporting gain through `gain`.
    #[allow(clippy::too_many_arguments)]
    fn fit_single_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        combination: &FeatureCombination,
        max_splits: usize,
        min_parent_cases: usize,
        out: &mut SegmentedTensor,
        gain: &mut f64,
    ) -> Result<(), TrainError>;

    /// Fit a combination of two or more dimensions.
    fn fit_multi_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        combination: &FeatureCombination,
        out: &mut SegmentedTensor,
    ) -> Result<(), TrainError>;
}

// =============================================================================
// GreedyTreeLearner
// =============================================================================

/// Default tree learner.
///
/// Accumulates per-bin residual statistics over the bag, then:
/// - zero dimensions: one Newton step,
/// - one dimension: greedy best-first segment splitting bounded by
///   `max_splits` and `min_parent_cases`, reporting the objective change as
///   gain (non-positive),
/// - two or more dimensions: a Newton step per cell of the full grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyTreeLearner;

impl TreeLearner for GreedyTreeLearner {
    fn fit_zero_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        out: &mut SegmentedTensor,
    ) -> Result<(), TrainError> {
        let vector_len = data.vector_len;
        scratch.reset(1, vector_len);
        accumulate_bins(scratch, bag, data, BinSource::Constant);

        out.reset();
        let values = out.values_mut();
        for k in 0..vector_len {
            let (sum, hessian) = bin_stat(scratch, 0, k, vector_len);
            values[k] = stats::newton_step(sum, hessian);
        }
        Ok(())
    }

    fn fit_single_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        combination: &FeatureCombination,
        max_splits: usize,
        min_parent_cases: usize,
        out: &mut SegmentedTensor,
        gain: &mut f64,
    ) -> Result<(), TrainError> {
        let vector_len = data.vector_len;
        let n_bins = combination.state_counts()[0];
        scratch.reset(n_bins, vector_len);
        accumulate_bins(scratch, bag, data, BinSource::Packed);

        // Prefix statistics over bins make every range query O(vector_len).
        let mut prefix_sums = vec![0.0; (n_bins + 1) * vector_len];
        let mut prefix_hessians = vec![0.0; (n_bins + 1) * vector_len];
        let mut prefix_counts = vec![0.0; n_bins + 1];
        for bin in 0..n_bins {
            for k in 0..vector_len {
                let (sum, hessian) = bin_stat(scratch, bin, k, vector_len);
                prefix_sums[(bin + 1) * vector_len + k] =
                    prefix_sums[bin * vector_len + k] + sum;
                prefix_hessians[(bin + 1) * vector_len + k] =
                    prefix_hessians[bin * vector_len + k] + hessian;
            }
            prefix_counts[bin + 1] = prefix_counts[bin] + bin_count(scratch, bin);
        }

        let range_objective = |lo: usize, hi: usize| -> f64 {
            (0..vector_len)
                .map(|k| {
                    let sum = prefix_sums[hi * vector_len + k] - prefix_sums[lo * vector_len + k];
                    let hessian =
                        prefix_hessians[hi * vector_len + k] - prefix_hessians[lo * vector_len + k];
                    stats::segment_objective(sum, hessian)
                })
                .sum()
        };

        // Best-first splitting: repeatedly take the cut with the most
        // negative objective change until the split budget runs out or no
        // cut improves.
        let mut segments: Vec<(usize, usize)> = vec![(0, n_bins)];
        let mut divisions: Vec<usize> = Vec::new();
        let mut total_gain = 0.0;
        for _ in 0..max_splits {
            let mut best: Option<(f64, usize, usize)> = None;
            for (segment_index, &(lo, hi)) in segments.iter().enumerate() {
                if hi - lo < 2 {
                    continue;
                }
                let parent_cases = prefix_counts[hi] - prefix_counts[lo];
                if parent_cases < min_parent_cases as f64 {
                    continue;
                }
                let parent_objective = range_objective(lo, hi);
                for cut in lo + 1..hi {
                    let delta =
                        range_objective(lo, cut) + range_objective(cut, hi) - parent_objective;
                    if delta < -1e-12 && best.map_or(true, |(d, _, _)| delta < d) {
                        best = Some((delta, segment_index, cut));
                    }
                }
            }
            let Some((delta, segment_index, cut)) = best else {
                break;
            };
            let (lo, hi) = segments[segment_index];
            segments[segment_index] = (lo, cut);
            segments.push((cut, hi));
            divisions.push(cut);
            total_gain += delta;
        }
        divisions.sort_unstable();

        out.reset();
        out.set_divisions(0, &divisions);
        out.resize_values()?;
        let values = out.values_mut();
        let mut lo = 0usize;
        for (segment, &division) in divisions.iter().chain(std::iter::once(&n_bins)).enumerate() {
            for k in 0..vector_len {
                let sum =
                    prefix_sums[division * vector_len + k] - prefix_sums[lo * vector_len + k];
                let hessian = prefix_hessians[division * vector_len + k]
                    - prefix_hessians[lo * vector_len + k];
                values[segment * vector_len + k] = stats::newton_step(sum, hessian);
            }
            lo = division;
        }

        *gain = total_gain;
        Ok(())
    }

    fn fit_multi_dim(
        &mut self,
        scratch: &mut LearnerScratch,
        bag: &SamplingSet,
        data: &TrainingView<'_>,
        combination: &FeatureCombination,
        out: &mut SegmentedTensor,
    ) -> Result<(), TrainError> {
        let vector_len = data.vector_len;
        let cells = combination.tensor_cells();
        scratch.reset(cells, vector_len);
        accumulate_bins(scratch, bag, data, BinSource::Packed);

        out.reset();
        out.expand(combination.state_counts())?;
        let values = out.values_mut();
        for bin in 0..cells {
            for k in 0..vector_len {
                let (sum, hessian) = bin_stat(scratch, bin, k, vector_len);
                values[bin * vector_len + k] = stats::newton_step(sum, hessian);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Accumulation helpers
// =============================================================================

enum BinSource {
    /// Every case lands in bin 0.
    Constant,
    /// Bins come from the view's packed column.
    Packed,
}

fn accumulate_bins(
    scratch: &mut LearnerScratch,
    bag: &SamplingSet,
    data: &TrainingView<'_>,
    source: BinSource,
) {
    match source {
        BinSource::Constant => {
            accumulate_from(scratch, bag, data, std::iter::repeat(0).take(data.n_cases))
        }
        BinSource::Packed => {
            accumulate_from(scratch, bag, data, data.packed.reader(data.n_cases))
        }
    }
}

fn accumulate_from(
    scratch: &mut LearnerScratch,
    bag: &SamplingSet,
    data: &TrainingView<'_>,
    bins: impl Iterator<Item = usize>,
) {
    let vector_len = data.vector_len;
    match scratch {
        LearnerScratch::Regression(scratch) => {
            for (case, bin) in bins.enumerate() {
                let multiplicity = bag.counts()[case];
                if multiplicity == 0 {
                    continue;
                }
                let weight = multiplicity as f64;
                scratch.sums[bin] += weight * data.residuals[case];
                scratch.counts[bin] += weight;
            }
        }
        LearnerScratch::Classification(scratch) => {
            for (case, bin) in bins.enumerate() {
                let multiplicity = bag.counts()[case];
                if multiplicity == 0 {
                    continue;
                }
                let weight = multiplicity as f64;
                let base = case * vector_len;
                for k in 0..vector_len {
                    let residual = data.residuals[base + k];
                    scratch.sums[bin * vector_len + k] += weight * residual;
                    scratch.hessians[bin * vector_len + k] +=
                        weight * stats::classification_hessian(residual);
                }
                scratch.counts[bin] += weight;
            }
        }
    }
}

/// Residual sum and Newton denominator of one bin and class.
fn bin_stat(scratch: &LearnerScratch, bin: usize, k: usize, vector_len: usize) -> (f64, f64) {
    match scratch {
        LearnerScratch::Regression(scratch) => (scratch.sums[bin], scratch.counts[bin]),
        LearnerScratch::Classification(scratch) => (
            scratch.sums[bin * vector_len + k],
            scratch.hessians[bin * vector_len + k],
        ),
    }
}

fn bin_count(scratch: &LearnerScratch, bin: usize) -> f64 {
    match scratch {
        LearnerScratch::Regression(scratch) => scratch.counts[bin],
        LearnerScratch::Classification(scratch) => scratch.counts[bin],
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::packed::pack_words;
    use approx::assert_abs_diff_eq;

    fn packed_column(bins: &[usize], n_states: usize) -> PackedColumn {
        use crate::data::packed;
        let bits = packed::bits_required(n_states);
        let items = packed::items_per_word(bits);
        let width = packed::bits_per_item(items);
        PackedColumn::from_raw(pack_words(bins, items, width), items, width)
    }

    fn view<'a>(residuals: &'a [f64], packed: &'a PackedColumn, vector_len: usize) -> TrainingView<'a> {
        TrainingView {
            n_cases: residuals.len() / vector_len,
            vector_len,
            residuals,
            packed,
        }
    }

    #[test]
    fn zero_dim_regression_fits_mean_residual() {
        let mut learner = GreedyTreeLearner;
        let mut scratch = LearnerScratch::new(false, 1, 1);
        let bag = SamplingSet::full(4);
        let residuals = [1.0, 2.0, 3.0, 6.0];
        let column = PackedColumn::default();
        let data = view(&residuals, &column, 1);

        let mut out = SegmentedTensor::new(0, 1);
        learner
            .fit_zero_dim(&mut scratch, &bag, &data, &mut out)
            .unwrap();
        assert_abs_diff_eq!(out.values()[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_dim_respects_bag_multiplicities() {
        let mut learner = GreedyTreeLearner;
        let mut scratch = LearnerScratch::new(false, 1, 1);
        // Case 0 drawn three times, case 1 once, case 2 left out.
        let bag = SamplingSet::from_counts(vec![3, 1, 0]);
        let residuals = [2.0, 6.0, 100.0];
        let column = PackedColumn::default();
        let data = view(&residuals, &column, 1);
        let mut out = SegmentedTensor::new(0, 1);
        learner
            .fit_zero_dim(&mut scratch, &bag, &data, &mut out)
            .unwrap();
        assert_abs_diff_eq!(out.values()[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn single_dim_splits_between_distinct_groups() {
        // Bins 0 and 1 carry clearly different residual levels; one split
        // separates them exactly.
        let mut learner = GreedyTreeLearner;
        let mut scratch = LearnerScratch::new(false, 2, 1);
        let bag = SamplingSet::full(4);
        let residuals = [10.0, 10.0, -10.0, -10.0];
        let column = packed_column(&[0, 0, 1, 1], 2);
        let data = view(&residuals, &column, 1);

        let mut out = SegmentedTensor::new(1, 1);
        out.set_dim_count(1);
        let mut gain = 0.0;
        learner
            .fit_single_dim(&mut scratch, &bag, &data, &combo_two_states(), 4, 2, &mut out, &mut gain)
            .unwrap();

        assert_eq!(out.divisions(0), &[1]);
        assert_abs_diff_eq!(out.values()[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.values()[1], -10.0, epsilon = 1e-12);
        assert!(gain < 0.0);
    }

    #[test]
    fn single_dim_honors_split_budget() {
        let mut learner = GreedyTreeLearner;
        let mut scratch = LearnerScratch::new(false, 4, 1);
        let bag = SamplingSet::full(4);
        let residuals = [1.0, 2.0, 3.0, 4.0];
        let column = packed_column(&[0, 1, 2, 3], 4);
        let data = view(&residuals, &column, 1);

        let mut out = SegmentedTensor::new(1, 1);
        out.set_dim_count(1);
        let mut gain = 0.0;
        learner
            .fit_single_dim(&mut scratch, &bag, &data, &combo_four_states(), 0, 2, &mut out, &mut gain)
            .unwrap();
        assert!(out.divisions(0).is_empty());
        assert_abs_diff_eq!(out.values()[0], 2.5, epsilon = 1e-12);
        assert_eq!(gain, 0.0);
    }

    fn combo_two_states() -> FeatureCombination {
        use crate::data::{Feature, FeatureKind};
        let features = vec![Feature {
            n_states: 2,
            index: 0,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }];
        FeatureCombination::build(&features, &[0], 0).unwrap()
    }

    fn combo_four_states() -> FeatureCombination {
        use crate::data::{Feature, FeatureKind};
        let features = vec![Feature {
            n_states: 4,
            index: 0,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }];
        FeatureCombination::build(&features, &[0], 0).unwrap()
    }
}
