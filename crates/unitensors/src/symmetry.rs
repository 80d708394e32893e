//! Abelian symmetry groups grading tensor bonds.
//!
//! A [`Symmetry`] names the group a conserved quantum number lives in and
//! supplies the fusion rule used when bonds are combined. Two variants
//! exist: the unbounded additive group U1 and the cyclic group Zn.

use crate::error::{Result, UniTensorError};

/// An abelian group describing valid quantum numbers and their fusion.
///
/// Stateless value type; two symmetries compare equal iff they have the
/// same kind and modulus.
///
/// # Examples
///
/// ```
/// use unitensors::Symmetry;
///
/// let u1 = Symmetry::U1;
/// assert!(u1.check_qnum(-7));
///
/// let z3 = Symmetry::zn(3).unwrap();
/// assert!(z3.check_qnum(2));
/// assert!(!z3.check_qnum(3));
/// assert_eq!(z3.combine_rule(&[0, 1, 2], &[0, 1, 2]),
///            vec![0, 1, 2, 1, 2, 0, 2, 0, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    /// Unbounded additive integer group.
    U1,
    /// Cyclic group of order `n >= 1`.
    Zn(usize),
}

impl Symmetry {
    /// Construct the cyclic group of order `n`.
    ///
    /// # Errors
    ///
    /// Fails with [`UniTensorError::InvalidSymmetryOrder`] when `n == 0`.
    pub fn zn(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(UniTensorError::InvalidSymmetryOrder { n });
        }
        Ok(Symmetry::Zn(n))
    }

    /// Group modulus: the cyclic order for Zn, 1 for the unbounded U1.
    pub fn n(&self) -> usize {
        match self {
            Symmetry::U1 => 1,
            Symmetry::Zn(n) => *n,
        }
    }

    /// Whether `q` is a valid quantum number under this group.
    pub fn check_qnum(&self, q: i64) -> bool {
        match self {
            Symmetry::U1 => true,
            Symmetry::Zn(n) => 0 <= q && q < *n as i64,
        }
    }

    /// Conjunction of [`Symmetry::check_qnum`] over a sequence.
    pub fn check_qnums(&self, qs: &[i64]) -> bool {
        qs.iter().all(|&q| self.check_qnum(q))
    }

    /// Fuse a single pair of quantum numbers.
    #[inline]
    pub fn fuse(&self, a: i64, b: i64) -> i64 {
        match self {
            Symmetry::U1 => a + b,
            // A directly built Zn(0) validates no qnums; keep the sum
            // unreduced rather than take a zero modulus.
            Symmetry::Zn(0) => a + b,
            Symmetry::Zn(n) => (a + b).rem_euclid(*n as i64),
        }
    }

    /// Group inverse of a quantum number.
    #[inline]
    pub fn reverse_rule(&self, q: i64) -> i64 {
        match self {
            Symmetry::U1 => -q,
            Symmetry::Zn(0) => -q,
            Symmetry::Zn(n) => (-q).rem_euclid(*n as i64),
        }
    }

    /// Cartesian-product fusion of two quantum-number sequences.
    ///
    /// Iterates `q1` in the outer loop and `q2` in the inner loop; the
    /// output order is part of the contract since bond fusion depends on
    /// it. Output length is `q1.len() * q2.len()`.
    pub fn combine_rule(&self, q1: &[i64], q2: &[i64]) -> Vec<i64> {
        let mut out = Vec::new();
        self.combine_rule_into(&mut out, q1, q2);
        out
    }

    /// In-place variant of [`Symmetry::combine_rule`]; clears `out` first.
    pub fn combine_rule_into(&self, out: &mut Vec<i64>, q1: &[i64], q2: &[i64]) {
        out.clear();
        out.reserve(q1.len() * q2.len());
        for &a in q1 {
            for &b in q2 {
                out.push(self.fuse(a, b));
            }
        }
    }
}

impl std::fmt::Display for Symmetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symmetry::U1 => write!(f, "U1"),
            Symmetry::Zn(n) => write!(f, "Z{n}"),
        }
    }
}
