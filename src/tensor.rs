//! Segmented lookup tensors.
//!
//! A [`SegmentedTensor`] maps a discrete n-dimensional bin space to vector
//! values of length `vector_len`. Each dimension is partitioned by a sorted
//! list of *division points* into contiguous runs, and one value vector is
//! stored per run cross-product cell. Two forms exist:
//!
//! - **Compressed**: only the divisions a tree fit actually produced. A
//!   dimension with no divisions is a single run covering every bin.
//! - **Expanded**: divisions `{1, 2, ..., n_states - 1}` in every dimension,
//!   i.e. one cell per full coordinate, so lookups are a single multiply-add.
//!
//! Model tensors are kept expanded from allocation; scratch tensors move
//! between the forms as updates are accumulated, merged and finally expanded
//! for the sweep loops.

use crate::error::TrainError;

/// Maximum number of significant dimensions a combination may carry.
pub const MAX_DIMENSIONS: usize = 8;

// =============================================================================
// SegmentedTensor
// =============================================================================

/// An n-dimensional value table with per-dimension division points.
///
/// Values are laid out with dimension 0 fastest-varying: the flat cell index
/// of segment coordinates `(s0, s1, ...)` is `s0 + c0 * (s1 + c1 * ...)`
/// where `c_d` is the segment count of dimension `d`. Each cell holds
/// `vector_len` consecutive `f64` values.
#[derive(Debug, Clone)]
pub struct SegmentedTensor {
    max_dims: usize,
    vector_len: usize,
    dim_count: usize,
    /// Division points per dimension; only `[..dim_count]` are active.
    /// Each list is strictly increasing with entries in `1..n_states`.
    divisions: Vec<Vec<usize>>,
    /// `total_cells() * vector_len` values.
    values: Vec<f64>,
    expanded: bool,
}

impl SegmentedTensor {
    /// Allocate a tensor able to hold up to `max_dims` dimensions.
    ///
    /// Starts as a zero-dimensional, compressed, all-zero single cell.
    pub fn new(max_dims: usize, vector_len: usize) -> Self {
        debug_assert!(max_dims <= MAX_DIMENSIONS);
        Self {
            max_dims,
            vector_len,
            dim_count: 0,
            divisions: vec![Vec::new(); max_dims],
            values: vec![0.0; vector_len],
            expanded: false,
        }
    }

    /// Vector length per cell.
    #[inline]
    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    /// Active dimensionality.
    #[inline]
    pub fn dim_count(&self) -> usize {
        self.dim_count
    }

    /// Whether the tensor is in expanded form.
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Set the active dimensionality. Does not touch divisions or values;
    /// callers follow up with [`reset`](Self::reset) or a copy.
    pub fn set_dim_count(&mut self, dim_count: usize) {
        debug_assert!(dim_count <= self.max_dims);
        self.dim_count = dim_count;
    }

    /// Division points of one dimension.
    #[inline]
    pub fn divisions(&self, dim: usize) -> &[usize] {
        &self.divisions[dim]
    }

    /// Replace the division points of one dimension.
    ///
    /// Used by tree learners writing a compressed fit result. The list must
    /// be strictly increasing. The caller resizes values afterwards via
    /// [`resize_values`](Self::resize_values).
    pub fn set_divisions(&mut self, dim: usize, divisions: &[usize]) {
        debug_assert!(divisions.windows(2).all(|w| w[0] < w[1]));
        self.divisions[dim].clear();
        self.divisions[dim].extend_from_slice(divisions);
    }

    /// Resize the value buffer to match the current division layout,
    /// zero-filling. Fails if the cell count overflows.
    pub fn resize_values(&mut self) -> Result<(), TrainError> {
        let cells = self.total_cells()?;
        let len = cells
            .checked_mul(self.vector_len)
            .ok_or(TrainError::CapacityOverflow)?;
        self.values.clear();
        self.values.resize(len, 0.0);
        Ok(())
    }

    /// Return to compressed form: no divisions, a single all-zero cell.
    pub fn reset(&mut self) {
        for divisions in &mut self.divisions[..self.dim_count] {
            divisions.clear();
        }
        self.values.clear();
        self.values.resize(self.vector_len, 0.0);
        self.expanded = false;
    }

    /// The raw value buffer. Length is `total_cells * vector_len`; the cell
    /// layout is only coordinate-addressable once expanded.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the raw value buffer.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// The dense per-coordinate value buffer.
    ///
    /// Only readable in expanded form; compressed tensors have no stable
    /// coordinate layout.
    pub fn expanded_values(&self) -> Result<&[f64], TrainError> {
        if !self.expanded {
            return Err(TrainError::TensorNotExpanded);
        }
        Ok(&self.values)
    }

    /// Total number of cells across the active dimensions.
    fn total_cells(&self) -> Result<usize, TrainError> {
        self.divisions[..self.dim_count]
            .iter()
            .try_fold(1usize, |acc, d| {
                acc.checked_mul(d.len() + 1)
                    .ok_or(TrainError::CapacityOverflow)
            })
    }

    /// Transform into expanded form with shape exactly `state_counts`.
    ///
    /// Idempotent when already expanded with an identical shape. Values are
    /// redistributed so the represented function is unchanged.
    pub fn expand(&mut self, state_counts: &[usize]) -> Result<(), TrainError> {
        debug_assert_eq!(state_counts.len(), self.dim_count);

        let target: Vec<Vec<usize>> = state_counts
            .iter()
            .map(|&n| (1..n.max(1)).collect())
            .collect();
        if self.expanded && self.divisions[..self.dim_count] == target[..] {
            return Ok(());
        }

        self.values = self.remapped_sum(&target, None)?;
        for (dst, src) in self.divisions[..self.dim_count].iter_mut().zip(target) {
            *dst = src;
        }
        self.expanded = true;
        Ok(())
    }

    /// Add another tensor of the same dimensionality and vector length.
    ///
    /// The result covers the union of both division sets; each operand's
    /// values are redistributed onto the union grid and summed. Adding into
    /// an expanded tensor leaves it expanded.
    pub fn add(&mut self, other: &SegmentedTensor) -> Result<(), TrainError> {
        debug_assert_eq!(self.dim_count, other.dim_count);
        debug_assert_eq!(self.vector_len, other.vector_len);

        let union: Vec<Vec<usize>> = (0..self.dim_count)
            .map(|d| merge_divisions(&self.divisions[d], &other.divisions[d]))
            .collect();

        self.values = self.remapped_sum(&union, Some(other))?;
        for (dst, src) in self.divisions[..self.dim_count].iter_mut().zip(union) {
            *dst = src;
        }
        self.expanded = self.expanded || other.expanded;
        Ok(())
    }

    /// Elementwise add a dense value buffer into expanded storage.
    pub fn add_expanded(&mut self, values: &[f64]) -> Result<(), TrainError> {
        if !self.expanded {
            return Err(TrainError::TensorNotExpanded);
        }
        if values.len() != self.values.len() {
            return Err(TrainError::LengthMismatch {
                what: "expanded update values",
                got: values.len(),
                expected: self.values.len(),
            });
        }
        for (dst, src) in self.values.iter_mut().zip(values) {
            *dst += src;
        }
        Ok(())
    }

    /// Scale every value. Never changes shape or form.
    pub fn multiply(&mut self, scalar: f64) {
        for value in &mut self.values {
            *value *= scalar;
        }
    }

    /// Deep copy of `src` including shape and expansion state.
    pub fn copy_from(&mut self, src: &SegmentedTensor) {
        debug_assert!(src.dim_count <= self.max_dims);
        debug_assert_eq!(self.vector_len, src.vector_len);
        self.dim_count = src.dim_count;
        for (dst, other) in self.divisions.iter_mut().zip(&src.divisions) {
            dst.clear();
            dst.extend_from_slice(other);
        }
        self.values.clear();
        self.values.extend_from_slice(&src.values);
        self.expanded = src.expanded;
    }

    /// Build a value buffer over the `target` division grid holding `self`
    /// (plus `other`, when given) redistributed onto it.
    ///
    /// `target` must be a superset of each operand's divisions per dimension,
    /// which makes every target segment lie inside exactly one source
    /// segment.
    fn remapped_sum(
        &self,
        target: &[Vec<usize>],
        other: Option<&SegmentedTensor>,
    ) -> Result<Vec<f64>, TrainError> {
        let total = target.iter().try_fold(1usize, |acc, d| {
            acc.checked_mul(d.len() + 1)
                .ok_or(TrainError::CapacityOverflow)
        })?;
        let len = total
            .checked_mul(self.vector_len)
            .ok_or(TrainError::CapacityOverflow)?;
        let mut merged = vec![0.0; len];

        scatter_add(&mut merged, target, &self.values, &self.divisions[..self.dim_count], self.vector_len);
        if let Some(other) = other {
            scatter_add(&mut merged, target, &other.values, &other.divisions[..other.dim_count], self.vector_len);
        }
        Ok(merged)
    }
}

/// Merge two strictly-increasing division lists into their sorted union.
fn merge_divisions(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

/// Add `src_values` (laid out over `src_divs`) into `dst` (laid out over
/// `dst_divs`), mapping each destination segment to the source segment that
/// contains its start coordinate.
fn scatter_add(
    dst: &mut [f64],
    dst_divs: &[Vec<usize>],
    src_values: &[f64],
    src_divs: &[Vec<usize>],
    vector_len: usize,
) {
    let n_dims = dst_divs.len();
    debug_assert_eq!(src_divs.len(), n_dims);

    let dst_counts: Vec<usize> = dst_divs.iter().map(|d| d.len() + 1).collect();
    let src_counts: Vec<usize> = src_divs.iter().map(|d| d.len() + 1).collect();

    // Per dimension, the source segment index of each destination segment.
    // A destination segment starting at coordinate c lies in the source
    // segment counting the divisions at or below c.
    let seg_map: Vec<Vec<usize>> = (0..n_dims)
        .map(|d| {
            (0..dst_counts[d])
                .map(|seg| {
                    let start = if seg == 0 { 0 } else { dst_divs[d][seg - 1] };
                    src_divs[d].partition_point(|&div| div <= start)
                })
                .collect()
        })
        .collect();

    let total: usize = dst_counts.iter().product();
    let mut coords = vec![0usize; n_dims];
    for dst_cell in 0..total {
        let mut src_cell = 0usize;
        let mut stride = 1usize;
        for d in 0..n_dims {
            src_cell += seg_map[d][coords[d]] * stride;
            stride *= src_counts[d];
        }
        let dst_base = dst_cell * vector_len;
        let src_base = src_cell * vector_len;
        for l in 0..vector_len {
            dst[dst_base + l] += src_values[src_base + l];
        }
        for d in 0..n_dims {
            coords[d] += 1;
            if coords[d] < dst_counts[d] {
                break;
            }
            coords[d] = 0;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensional_tensor_is_single_cell() {
        let mut tensor = SegmentedTensor::new(MAX_DIMENSIONS, 3);
        assert_eq!(tensor.values().len(), 3);
        tensor.expand(&[]).unwrap();
        assert!(tensor.is_expanded());
        assert_eq!(tensor.expanded_values().unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn expand_redistributes_single_segment() {
        let mut tensor = SegmentedTensor::new(2, 1);
        tensor.set_dim_count(1);
        tensor.reset();
        tensor.values_mut()[0] = 2.5;

        tensor.expand(&[4]).unwrap();
        assert!(tensor.is_expanded());
        assert_eq!(tensor.expanded_values().unwrap(), &[2.5, 2.5, 2.5, 2.5]);
    }

    #[test]
    fn expand_is_idempotent() {
        let mut tensor = SegmentedTensor::new(1, 1);
        tensor.set_dim_count(1);
        tensor.reset();
        tensor.set_divisions(0, &[2]);
        tensor.resize_values().unwrap();
        tensor.values_mut().copy_from_slice(&[1.0, 3.0]);

        tensor.expand(&[4]).unwrap();
        let first = tensor.expanded_values().unwrap().to_vec();
        tensor.expand(&[4]).unwrap();
        assert_eq!(tensor.expanded_values().unwrap(), first.as_slice());
        assert_eq!(first, vec![1.0, 1.0, 3.0, 3.0]);
    }

    #[test]
    fn add_merges_division_sets() {
        // Dimension of 4 states. a splits at 2, b splits at 1.
        let mut a = SegmentedTensor::new(1, 1);
        a.set_dim_count(1);
        a.reset();
        a.set_divisions(0, &[2]);
        a.resize_values().unwrap();
        a.values_mut().copy_from_slice(&[1.0, 5.0]);

        let mut b = SegmentedTensor::new(1, 1);
        b.set_dim_count(1);
        b.reset();
        b.set_divisions(0, &[1]);
        b.resize_values().unwrap();
        b.values_mut().copy_from_slice(&[10.0, 20.0]);

        a.add(&b).unwrap();
        assert_eq!(a.divisions(0), &[1, 2]);
        assert_eq!(a.values(), &[11.0, 21.0, 25.0]);
    }

    #[test]
    fn add_into_expanded_stays_expanded() {
        let mut a = SegmentedTensor::new(1, 1);
        a.set_dim_count(1);
        a.reset();
        a.expand(&[3]).unwrap();
        a.values_mut().copy_from_slice(&[1.0, 2.0, 3.0]);

        let mut b = SegmentedTensor::new(1, 1);
        b.set_dim_count(1);
        b.reset();
        b.values_mut()[0] = 0.5;

        a.add(&b).unwrap();
        assert!(a.is_expanded());
        assert_eq!(a.values(), &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn multiply_scales_without_reshaping() {
        let mut tensor = SegmentedTensor::new(1, 2);
        tensor.set_dim_count(1);
        tensor.reset();
        tensor.values_mut().copy_from_slice(&[1.0, -2.0]);
        tensor.multiply(0.5);
        assert_eq!(tensor.values(), &[0.5, -1.0]);
        assert!(!tensor.is_expanded());
    }

    #[test]
    fn copy_preserves_shape_and_form() {
        let mut src = SegmentedTensor::new(2, 1);
        src.set_dim_count(2);
        src.reset();
        src.expand(&[2, 3]).unwrap();
        src.values_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let mut dst = SegmentedTensor::new(2, 1);
        dst.copy_from(&src);
        assert_eq!(dst.dim_count(), 2);
        assert!(dst.is_expanded());
        assert_eq!(dst.values(), src.values());
    }

    #[test]
    fn two_dimensional_expand_layout() {
        // 2 x 3 grid, dimension 0 fastest. One division in dim 1 at index 1:
        // segments (full dim0) x {[0,1), [1,3)} with values 1 and 2.
        let mut tensor = SegmentedTensor::new(2, 1);
        tensor.set_dim_count(2);
        tensor.reset();
        tensor.set_divisions(1, &[1]);
        tensor.resize_values().unwrap();
        tensor.values_mut().copy_from_slice(&[1.0, 2.0]);

        tensor.expand(&[2, 3]).unwrap();
        // Cells in (i0, i1) order with i0 fastest:
        // (0,0) (1,0) | (0,1) (1,1) | (0,2) (1,2)
        assert_eq!(
            tensor.expanded_values().unwrap(),
            &[1.0, 1.0, 2.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn compressed_tensor_refuses_expanded_reads() {
        let tensor = SegmentedTensor::new(1, 1);
        assert_eq!(
            tensor.expanded_values(),
            Err(TrainError::TensorNotExpanded)
        );
    }
}
