//! Dense storage: a contiguous column-major element buffer.

use crate::scalar::Scalar;

/// Flat element buffer; shape and strides live on the owning tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense<ElT: Scalar> {
    data: Vec<ElT>,
}

impl<ElT: Scalar> Dense<ElT> {
    /// Zero-initialized buffer of the given length.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![ElT::zero(); len],
        }
    }

    /// Take ownership of an existing vector.
    pub fn from_vec(data: Vec<ElT>) -> Self {
        Self { data }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[ElT] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ElT] {
        &mut self.data
    }

    /// Consume the buffer, returning the underlying vector.
    pub fn into_vec(self) -> Vec<ElT> {
        self.data
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: ElT) {
        for x in &mut self.data {
            *x = value;
        }
    }
}

impl<ElT: Scalar> std::ops::Index<usize> for Dense<ElT> {
    type Output = ElT;

    #[inline]
    fn index(&self, i: usize) -> &ElT {
        &self.data[i]
    }
}

impl<ElT: Scalar> std::ops::IndexMut<usize> for Dense<ElT> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut ElT {
        &mut self.data[i]
    }
}
