//! Column-major layout utilities: strides, index conversion, permutations.

use crate::error::{Result, UniTensorError};

/// Compute column-major strides for a shape.
///
/// For shape `[d0, d1, d2]` the strides are `[1, d0, d0*d1]`.
///
/// # Examples
///
/// ```
/// use unitensors::layout::strides_of;
///
/// assert_eq!(strides_of(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(strides_of(&[]), Vec::<usize>::new());
/// ```
pub fn strides_of(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Total element count of a shape; a rank-0 (scalar) shape counts as 1.
pub fn total_of(shape: &[usize]) -> usize {
    shape.iter().product::<usize>().max(1)
}

/// Convert cartesian indices to a linear column-major index.
#[inline]
pub fn linear_index(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&i, &s)| i * s)
        .sum()
}

/// Convert a linear column-major index back to cartesian indices.
pub fn cartesian_index(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());
    for &dim in shape {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}

/// Check that `perm` is a valid permutation of `0..rank`.
pub fn validate_permutation(perm: &[usize], rank: usize) -> Result<()> {
    let invalid = || UniTensorError::InvalidPermutation {
        perm: perm.to_vec(),
        rank,
    };
    if perm.len() != rank {
        return Err(invalid());
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }
    Ok(())
}

/// True iff `perm` maps every index to itself.
pub fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

/// Inverse of a valid permutation.
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    inv
}

/// Apply a permutation to a slice: `out[i] = values[perm[i]]`.
pub fn apply_permutation<T: Clone>(values: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().map(|&p| values[p].clone()).collect()
}
