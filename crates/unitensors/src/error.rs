//! Error types for unitensors.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UniTensorError>;

/// Errors that can occur while building or manipulating symmetric tensors.
///
/// Every invariant violation is reported synchronously at the call that
/// would break the invariant; there is no internal retry or fallback path.
#[derive(Debug, Error)]
pub enum UniTensorError {
    /// Cyclic group of order zero requested.
    #[error("Zn symmetry requires n >= 1, got n = {n}")]
    InvalidSymmetryOrder { n: usize },

    /// A quantum number fails the symmetry's validity check.
    #[error("quantum number {qnum} is invalid for symmetry {sym}")]
    InvalidQnum { qnum: i64, sym: String },

    /// Number of qnum slots disagrees with the bond dimension.
    #[error("bond expects {dim} qnum slots, got {actual}")]
    QnumCountMismatch { dim: usize, actual: usize },

    /// A qnum vector's width disagrees with the generator count.
    #[error("qnum vector has {actual} components, expected {nsym} (one per symmetry)")]
    QnumWidthMismatch { nsym: usize, actual: usize },

    /// Bonds with different symmetry lists cannot fuse.
    #[error("cannot combine bonds with different symmetry lists")]
    SymmetryMismatch,

    /// Tagged and untagged bonds cannot fuse or coexist in one tensor.
    #[error("cannot mix tagged (bra/ket) bonds with untagged bonds")]
    MixedBondTags,

    /// Bonds of a tensor must all have dimension >= 1.
    #[error("all bonds must have dimension >= 1")]
    ZeroDimBond,

    /// Labels must be pairwise distinct.
    #[error("labels cannot contain duplicated elements")]
    DuplicateLabels,

    /// Label list length disagrees with the bond count.
    #[error("labels must have the same length as bonds: expected {expected}, got {actual}")]
    LabelCountMismatch { expected: usize, actual: usize },

    /// Row-rank outside `0..=rank`.
    #[error("row-rank {rowrank} out of range for a rank-{rank} tensor")]
    RowrankOutOfRange { rowrank: usize, rank: usize },

    /// Untagged tensors need an explicit row-rank.
    #[error("rowrank must be given explicitly for untagged bonds")]
    RowrankRequired,

    /// Operation not defined on a tagged tensor.
    #[error("{op} is not supported on a tagged tensor")]
    TaggedUnsupported { op: &'static str },

    /// Operation only defined on a block-sparse tensor.
    #[error("{op} requires a symmetric (block form) tensor")]
    NotBlockForm { op: &'static str },

    /// Diagonal tensors must be square and rank 2.
    #[error("is_diag requires exactly 2 bonds of equal dimension")]
    DiagShapeMismatch,

    /// Operation not defined on a diagonal tensor.
    #[error("{op} is not supported on a diagonal tensor; densify with to_dense() first")]
    DiagUnsupported { op: &'static str },

    /// Operation not defined on a block-sparse tensor.
    #[error("{op} is not supported on a block-sparse tensor")]
    BlockUnsupported { op: &'static str },

    /// A requested label does not exist on the tensor.
    #[error("label {label} not found on this tensor")]
    LabelNotFound { label: i64 },

    /// Declared but intentionally unimplemented code path.
    #[error("{what} is not implemented")]
    NotImplemented { what: &'static str },

    /// Invalid permutation of bond indices.
    #[error("invalid permutation {perm:?} for a rank-{rank} tensor")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    /// Total element count mismatch (reshape, put_block).
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Wrong number of indices for element access.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Cartesian index out of bounds.
    #[error("index {index} out of range for dimension of size {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Element forbidden by quantum-number conservation.
    #[error("element {index:?} is not admissible under the tensor's symmetry")]
    InadmissibleElement { index: Vec<usize> },

    /// No block stored for the requested sector.
    #[error("no block for quantum-number sector {qnum:?}")]
    SectorNotFound { qnum: Vec<i64> },

    /// Fewer than two bonds passed to combine_bonds.
    #[error("the number of bonds to combine must be >= 2")]
    CombineTooFew,

    /// Requested device has no backend support.
    #[error("device {device} is not supported")]
    DeviceUnsupported { device: String },

    /// Network operation invoked before initialization.
    #[error("network {op} called on an uninitialized network")]
    UninitializedNetwork { op: &'static str },

    /// Slot name or index unknown to the network.
    #[error("network has no slot {slot}")]
    UnknownSlot { slot: String },

    /// Bound tensor's rank disagrees with the slot's label script.
    #[error("slot {slot} declares {expected} labels, tensor has rank {actual}")]
    SlotRankMismatch {
        slot: String,
        expected: usize,
        actual: usize,
    },

    /// Launch with an empty slot.
    #[error("slot {slot} has no tensor bound")]
    UnboundSlot { slot: String },

    /// Shared label with conflicting bond dimensions.
    #[error("label {label} is shared with incompatible dimensions {dim_a} vs {dim_b}")]
    IncompatibleContraction { label: i64, dim_a: usize, dim_b: usize },

    /// Shared label pairing two bonds of the same direction.
    #[error("label {label} pairs two bonds of the same direction")]
    DirectionMismatch { label: i64 },

    /// Malformed network script.
    #[error("invalid network script: {reason}")]
    InvalidScript { reason: String },
}
