//! Scalar trait for tensor element types.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul};

use faer_traits::ComplexField;

pub use faer::c64;

/// Trait for element types a [`crate::UniTensor`] can hold.
///
/// Wraps faer's `ComplexField` with the arithmetic and construction bounds
/// the contraction kernels need.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + 'static
{
    /// Additive identity.
    fn zero() -> Self {
        Self::default()
    }

    /// Multiplicative identity.
    fn one() -> Self;

    /// Lift a real value into the scalar type.
    fn from_f64(v: f64) -> Self;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Scalar for c64 {
    fn one() -> Self {
        c64::new(1.0, 0.0)
    }

    fn from_f64(v: f64) -> Self {
        c64::new(v, 0.0)
    }
}
