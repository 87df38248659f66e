//! Per-combination packed datasets.

use ndarray::ArrayView2;

use super::packed::{self, BitPackedReader};
use super::{Feature, FeatureCombination};
use crate::error::TrainError;

// =============================================================================
// DatasetLayout
// =============================================================================

/// Which per-case arrays a dataset carries.
///
/// Training sets always track residuals; scores and integer targets are only
/// needed for classification, where residuals are a function of score and
/// target rather than the state itself. Validation sets for regression keep
/// residuals (the running error *is* the state), while classification
/// validation keeps scores and targets and recomputes loss on the fly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetLayout {
    pub stores_residuals: bool,
    pub stores_scores: bool,
    pub stores_targets: bool,
}

impl DatasetLayout {
    /// Layout of a training dataset.
    pub fn training(is_classification: bool) -> Self {
        Self {
            stores_residuals: true,
            stores_scores: is_classification,
            stores_targets: is_classification,
        }
    }

    /// Layout of a validation dataset.
    pub fn validation(is_classification: bool) -> Self {
        Self {
            stores_residuals: !is_classification,
            stores_scores: is_classification,
            stores_targets: is_classification,
        }
    }
}

// =============================================================================
// PackedColumn
// =============================================================================

/// The bit-packed combined-bin stream of one feature combination.
#[derive(Debug, Clone, Default)]
pub struct PackedColumn {
    words: Vec<u64>,
    items_per_word: usize,
    bits_per_item: u32,
}

impl PackedColumn {
    /// Assemble a column from already-packed words.
    pub(crate) fn from_raw(words: Vec<u64>, items_per_word: usize, bits_per_item: u32) -> Self {
        Self {
            words,
            items_per_word,
            bits_per_item,
        }
    }

    /// Packed storage words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn items_per_word(&self) -> usize {
        self.items_per_word
    }

    #[inline]
    pub fn bits_per_item(&self) -> u32 {
        self.bits_per_item
    }

    /// Stream the column's combined bins back out.
    pub fn reader(&self, n_cases: usize) -> BitPackedReader<'_> {
        BitPackedReader::new(&self.words, self.items_per_word, self.bits_per_item, n_cases)
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// One dataset (training or validation) with per-combination packed inputs.
///
/// All per-case vector arrays are interleaved: case `c`'s values occupy
/// `[c * vector_len, (c + 1) * vector_len)`.
#[derive(Debug)]
pub struct Dataset {
    n_cases: usize,
    vector_len: usize,
    /// One column per feature combination; scalar combinations get an empty
    /// column.
    pub(crate) packed: Vec<PackedColumn>,
    /// Class targets, when the layout stores them.
    pub(crate) targets: Option<Vec<usize>>,
    /// Prediction scores (`n_cases * vector_len`), when stored.
    pub(crate) scores: Option<Vec<f64>>,
    /// Residuals (`n_cases * vector_len`), when stored.
    pub(crate) residuals: Option<Vec<f64>>,
}

impl Dataset {
    /// Build a dataset: validate and pack the input matrix per combination
    /// and allocate the per-case arrays the layout asks for.
    ///
    /// `inputs` is row-major `n_cases × n_features` of bin indices.
    pub fn new(
        features: &[Feature],
        combinations: &[FeatureCombination],
        inputs: ArrayView2<'_, i64>,
        n_cases: usize,
        class_targets: Option<&[usize]>,
        layout: DatasetLayout,
        vector_len: usize,
    ) -> Result<Self, TrainError> {
        debug_assert!(n_cases > 0);
        if inputs.nrows() != n_cases || inputs.ncols() != features.len() {
            return Err(TrainError::LengthMismatch {
                what: "input matrix",
                got: inputs.nrows() * inputs.ncols(),
                expected: n_cases * features.len(),
            });
        }

        let mut packed_columns = Vec::with_capacity(combinations.len());
        let mut bins = Vec::with_capacity(n_cases);
        for combination in combinations {
            if combination.is_scalar() {
                packed_columns.push(PackedColumn::default());
                continue;
            }
            bins.clear();
            for case in 0..n_cases {
                let mut combined = 0usize;
                let mut stride = 1usize;
                for (&feature_index, &n_states) in combination
                    .feature_indices()
                    .iter()
                    .zip(combination.state_counts())
                {
                    let raw = inputs[[case, feature_index]];
                    let bin = usize::try_from(raw)
                        .ok()
                        .filter(|&b| b < n_states)
                        .ok_or(TrainError::BinOutOfRange { got: raw, n_states })?;
                    combined += bin * stride;
                    stride *= n_states;
                }
                bins.push(combined);
            }
            packed_columns.push(PackedColumn {
                words: packed::pack_words(
                    &bins,
                    combination.items_per_word(),
                    combination.bits_per_item(),
                ),
                items_per_word: combination.items_per_word(),
                bits_per_item: combination.bits_per_item(),
            });
        }

        let vector_total = n_cases
            .checked_mul(vector_len)
            .ok_or(TrainError::CapacityOverflow)?;

        let targets = if layout.stores_targets {
            let targets = class_targets.ok_or(TrainError::LengthMismatch {
                what: "class targets",
                got: 0,
                expected: n_cases,
            })?;
            if targets.len() != n_cases {
                return Err(TrainError::LengthMismatch {
                    what: "class targets",
                    got: targets.len(),
                    expected: n_cases,
                });
            }
            Some(targets.to_vec())
        } else {
            None
        };

        Ok(Self {
            n_cases,
            vector_len,
            packed: packed_columns,
            targets,
            scores: layout.stores_scores.then(|| vec![0.0; vector_total]),
            residuals: layout.stores_residuals.then(|| vec![0.0; vector_total]),
        })
    }

    /// Number of cases.
    #[inline]
    pub fn n_cases(&self) -> usize {
        self.n_cases
    }

    /// Values per case in the score/residual arrays.
    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// Packed column of one combination.
    #[inline]
    pub fn packed(&self, combination_index: usize) -> &PackedColumn {
        &self.packed[combination_index]
    }

    /// Residual array, when stored.
    #[inline]
    pub fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    /// Prediction-score array, when stored.
    #[inline]
    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    /// Class targets, when stored.
    #[inline]
    pub fn targets(&self) -> Option<&[usize]> {
        self.targets.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureKind;
    use ndarray::array;

    fn ordinal(n_states: usize, index: usize) -> Feature {
        Feature {
            n_states,
            index,
            kind: FeatureKind::Ordinal,
            has_missing: false,
        }
    }

    #[test]
    fn packs_combined_bins_per_combination() {
        let features = vec![ordinal(2, 0), ordinal(3, 1)];
        let combos = vec![
            FeatureCombination::build(&features, &[0], 0).unwrap(),
            FeatureCombination::build(&features, &[0, 1], 1).unwrap(),
        ];
        let inputs = array![[0i64, 2], [1, 0], [1, 1]];
        let data = Dataset::new(
            &features,
            &combos,
            inputs.view(),
            3,
            None,
            DatasetLayout::training(false),
            1,
        )
        .unwrap();

        let single: Vec<usize> = data.packed(0).reader(3).collect();
        assert_eq!(single, vec![0, 1, 1]);

        // combined = f0 + 2 * f1 (dimension 0 fastest)
        let pair: Vec<usize> = data.packed(1).reader(3).collect();
        assert_eq!(pair, vec![4, 1, 3]);

        assert_eq!(data.residuals().unwrap().len(), 3);
        assert!(data.scores().is_none());
        assert!(data.targets().is_none());
    }

    #[test]
    fn scalar_combination_gets_empty_column() {
        let features = vec![ordinal(1, 0)];
        let combos = vec![FeatureCombination::build(&features, &[0], 0).unwrap()];
        let inputs = array![[0i64], [0]];
        let data = Dataset::new(
            &features,
            &combos,
            inputs.view(),
            2,
            None,
            DatasetLayout::training(false),
            1,
        )
        .unwrap();
        assert!(data.packed(0).words().is_empty());
    }

    #[test]
    fn classification_layout_allocates_scores_and_targets() {
        let features = vec![ordinal(2, 0)];
        let combos = vec![FeatureCombination::build(&features, &[0], 0).unwrap()];
        let inputs = array![[0i64], [1]];
        let targets = vec![1usize, 0];
        let data = Dataset::new(
            &features,
            &combos,
            inputs.view(),
            2,
            Some(&targets),
            DatasetLayout::validation(true),
            1,
        )
        .unwrap();
        assert!(data.residuals().is_none());
        assert_eq!(data.scores().unwrap().len(), 2);
        assert_eq!(data.targets().unwrap(), &[1, 0]);
    }

    #[test]
    fn rejects_out_of_range_bins() {
        let features = vec![ordinal(2, 0)];
        let combos = vec![FeatureCombination::build(&features, &[0], 0).unwrap()];
        let inputs = array![[0i64], [2]];
        let err = Dataset::new(
            &features,
            &combos,
            inputs.view(),
            2,
            None,
            DatasetLayout::training(false),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::BinOutOfRange { got: 2, .. }));
    }
}
