//! Features, feature combinations and per-combination datasets.
//!
//! Training data enters as a row-major `case × feature` matrix of bin
//! indices. For every [`FeatureCombination`] the indices of its features are
//! folded into a single combined bin and bit-packed several cases per word
//! (see [`packed`]), which keeps the sweep loops cache-resident.

mod dataset;
pub mod packed;

pub use dataset::{Dataset, DatasetLayout, PackedColumn};

use crate::error::TrainError;
use crate::tensor::MAX_DIMENSIONS;

// =============================================================================
// Feature
// =============================================================================

/// Whether a feature's bins carry an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Bins are ordered (binned continuous values or ordered categories).
    Ordinal,
    /// Bins are unordered categories.
    Nominal,
}

/// A single input feature, pre-binned into `n_states` discrete values.
///
/// Features with `n_states <= 1` are degenerate: every case shares one value,
/// so they contribute no tensor dimension.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Number of distinct bin values.
    pub n_states: usize,
    /// Position of this feature in the input matrix.
    pub index: usize,
    pub kind: FeatureKind,
    /// Whether a missing-value bin is present.
    pub has_missing: bool,
}

impl Feature {
    /// Whether this feature carries information worth a tensor dimension.
    #[inline]
    pub fn is_significant(&self) -> bool {
        self.n_states > 1
    }
}

// =============================================================================
// FeatureCombination
// =============================================================================

/// An ordered set of features whose cross-product indexes one model tensor.
///
/// Degenerate features are dropped at construction; a combination left with
/// zero significant features is *scalar* and owns a single-cell tensor.
#[derive(Debug, Clone)]
pub struct FeatureCombination {
    /// Position of this combination in the trainer's combination list.
    pub index: usize,
    /// Indices (into the feature array) of the significant features, in the
    /// order the caller listed them. Dimension 0 is the fastest-varying in
    /// the combined bin and tensor layouts.
    feature_indices: Vec<usize>,
    /// `n_states` of each significant feature.
    state_counts: Vec<usize>,
    /// Product of `state_counts`; 1 for scalar combinations.
    n_tensor_states: usize,
    /// How many combined bins are packed into one storage word.
    items_per_word: usize,
    /// Shift width per packed item.
    bits_per_item: u32,
}

impl FeatureCombination {
    /// Build a combination from feature indices, dropping degenerate
    /// features and sizing the bit-pack layout.
    pub fn build(
        features: &[Feature],
        indices: &[usize],
        index: usize,
    ) -> Result<Self, TrainError> {
        let mut feature_indices = Vec::with_capacity(indices.len());
        let mut state_counts = Vec::with_capacity(indices.len());
        let mut n_tensor_states = 1usize;

        for &feature_index in indices {
            let feature = features.get(feature_index).ok_or(
                TrainError::FeatureIndexOutOfBounds {
                    index: feature_index,
                    n_features: features.len(),
                },
            )?;
            if !feature.is_significant() {
                log::debug!(
                    "combination {index}: dropping feature {feature_index} with {} states",
                    feature.n_states
                );
                continue;
            }
            n_tensor_states = n_tensor_states
                .checked_mul(feature.n_states)
                .ok_or(TrainError::CapacityOverflow)?;
            feature_indices.push(feature_index);
            state_counts.push(feature.n_states);
        }

        if feature_indices.len() > MAX_DIMENSIONS {
            return Err(TrainError::TooManyDimensions {
                index,
                got: feature_indices.len(),
                max: MAX_DIMENSIONS,
            });
        }

        let bits_required = packed::bits_required(n_tensor_states);
        let items_per_word = packed::items_per_word(bits_required);
        let bits_per_item = packed::bits_per_item(items_per_word);

        Ok(Self {
            index,
            feature_indices,
            state_counts,
            n_tensor_states,
            items_per_word,
            bits_per_item,
        })
    }

    /// Number of significant dimensions.
    #[inline]
    pub fn dim_count(&self) -> usize {
        self.feature_indices.len()
    }

    /// Whether this combination has no significant dimensions.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.feature_indices.is_empty()
    }

    /// Indices of the significant features.
    #[inline]
    pub fn feature_indices(&self) -> &[usize] {
        &self.feature_indices
    }

    /// Per-dimension state counts.
    #[inline]
    pub fn state_counts(&self) -> &[usize] {
        &self.state_counts
    }

    /// Number of cells in the fully expanded tensor.
    #[inline]
    pub fn tensor_cells(&self) -> usize {
        self.n_tensor_states
    }

    /// Combined bins packed per storage word.
    #[inline]
    pub fn items_per_word(&self) -> usize {
        self.items_per_word
    }

    /// Shift width of each packed item.
    #[inline]
    pub fn bits_per_item(&self) -> u32 {
        self.bits_per_item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinal(n_states: usize, index: usize) -> Feature {
        Feature {
            n_states,
            index,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }
    }

    #[test]
    fn degenerate_features_are_dropped() {
        let features = vec![ordinal(1, 0), ordinal(4, 1), ordinal(0, 2)];
        let combo = FeatureCombination::build(&features, &[0, 1, 2], 0).unwrap();
        assert_eq!(combo.dim_count(), 1);
        assert_eq!(combo.feature_indices(), &[1]);
        assert_eq!(combo.state_counts(), &[4]);
        assert_eq!(combo.tensor_cells(), 4);
    }

    #[test]
    fn scalar_combination_has_one_cell() {
        let features = vec![ordinal(1, 0)];
        let combo = FeatureCombination::build(&features, &[0], 0).unwrap();
        assert!(combo.is_scalar());
        assert_eq!(combo.tensor_cells(), 1);
    }

    #[test]
    fn empty_combination_is_scalar() {
        let combo = FeatureCombination::build(&[], &[], 3).unwrap();
        assert!(combo.is_scalar());
        assert_eq!(combo.index, 3);
    }

    #[test]
    fn pack_layout_for_two_state_pair() {
        // 2 x 2 states -> 4 combined bins -> 2 bits required -> 32 items
        // per 64-bit word at 2 bits each.
        let features = vec![ordinal(2, 0), ordinal(2, 1)];
        let combo = FeatureCombination::build(&features, &[0, 1], 0).unwrap();
        assert_eq!(combo.tensor_cells(), 4);
        assert_eq!(combo.items_per_word(), 32);
        assert_eq!(combo.bits_per_item(), 2);
    }

    #[test]
    fn rejects_out_of_range_feature_index() {
        let features = vec![ordinal(2, 0)];
        let err = FeatureCombination::build(&features, &[1], 0).unwrap_err();
        assert!(matches!(err, TrainError::FeatureIndexOutOfBounds { .. }));
    }

    #[test]
    fn rejects_excess_dimensionality() {
        let features: Vec<Feature> = (0..MAX_DIMENSIONS + 1).map(|i| ordinal(2, i)).collect();
        let indices: Vec<usize> = (0..MAX_DIMENSIONS + 1).collect();
        let err = FeatureCombination::build(&features, &indices, 0).unwrap_err();
        assert!(matches!(err, TrainError::TooManyDimensions { .. }));
    }
}
