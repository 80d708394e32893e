//! Storage backends for tensor payloads.
//!
//! The element layout is picked at construction time from the bonds:
//! dense for unconstrained tensors, a 1-D diagonal buffer for `is_diag`
//! tensors, and sector-keyed blocks when the bonds carry symmetries.

pub mod block;
pub mod dense;

pub use block::{BlockStorage, Sector, SectorKey};
pub use dense::Dense;

use crate::scalar::Scalar;

/// Closed set of payload layouts a tensor can own.
#[derive(Debug, Clone, PartialEq)]
pub enum UniTensorStorage<ElT: Scalar> {
    /// Contiguous column-major buffer covering every element.
    Dense(Dense<ElT>),
    /// Diagonal of a square rank-2 tensor, length `dim`.
    Diag(Dense<ElT>),
    /// Symmetry-admissible elements only, grouped by fused qnum.
    Block(BlockStorage<ElT>),
}

impl<ElT: Scalar> UniTensorStorage<ElT> {
    /// Number of actually stored elements.
    pub fn len(&self) -> usize {
        match self {
            UniTensorStorage::Dense(d) => d.len(),
            UniTensorStorage::Diag(d) => d.len(),
            UniTensorStorage::Block(b) => b.nnz(),
        }
    }

    /// Whether no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
