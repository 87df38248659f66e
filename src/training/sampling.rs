//! Bootstrap sampling sets for inner bagging.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-case multiplicities of one bootstrap resample of the training set.
///
/// A case drawn `k` times participates in a bag's tree fit with weight `k`;
/// cases drawn zero times are left out of that bag.
#[derive(Debug, Clone)]
pub struct SamplingSet {
    counts: Vec<u32>,
}

impl SamplingSet {
    /// The unbagged set: every case exactly once.
    pub fn full(n_cases: usize) -> Self {
        Self {
            counts: vec![1; n_cases],
        }
    }

    /// Build a set from explicit per-case multiplicities.
    pub fn from_counts(counts: Vec<u32>) -> Self {
        Self { counts }
    }

    /// Draw `n_cases` cases with replacement.
    pub fn bootstrap(n_cases: usize, rng: &mut StdRng) -> Self {
        let mut counts = vec![0u32; n_cases];
        for _ in 0..n_cases {
            counts[rng.gen_range(0..n_cases)] += 1;
        }
        Self { counts }
    }

    /// Multiplicity per case.
    #[inline]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of cases covered (the training-set size, not the draw count).
    #[inline]
    pub fn n_cases(&self) -> usize {
        self.counts.len()
    }
}

/// Generate the trainer's sampling sets.
///
/// Zero requested sets means boosting without inner bagging: one effective
/// set covering the full training data.
pub fn generate_sampling_sets(n_cases: usize, n_sets: usize, seed: u64) -> Vec<SamplingSet> {
    if n_sets == 0 {
        log::debug!("inner bagging disabled, using one full sampling set");
        return vec![SamplingSet::full(n_cases)];
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_sets)
        .map(|_| SamplingSet::bootstrap(n_cases, &mut rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_set_covers_every_case_once() {
        let set = SamplingSet::full(5);
        assert_eq!(set.counts(), &[1, 1, 1, 1, 1]);
    }

    #[test]
    fn bootstrap_preserves_total_draw_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let set = SamplingSet::bootstrap(100, &mut rng);
        let total: u32 = set.counts().iter().sum();
        assert_eq!(total, 100);
        assert_eq!(set.n_cases(), 100);
    }

    #[test]
    fn zero_requested_sets_yields_one_full_set() {
        let sets = generate_sampling_sets(4, 0, 1);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].counts(), &[1, 1, 1, 1]);
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_sampling_sets(50, 3, 99);
        let b = generate_sampling_sets(50, 3, 99);
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.counts(), y.counts());
        }
    }
}
