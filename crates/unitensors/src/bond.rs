//! Quantum-number-graded tensor indices.
//!
//! A [`Bond`] is a dimensioned index, optionally tagged with a bra/ket
//! direction and graded by one quantum-number vector per degeneracy slot.
//! Fusing two bonds multiplies their dimensions and combines their qnums
//! through each attached [`Symmetry`]'s rule.

use crate::error::{Result, UniTensorError};
use crate::symmetry::Symmetry;

/// Direction tag of a bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondType {
    /// Untagged (regular) bond.
    Reg,
    /// Outgoing / row-dual direction.
    Bra,
    /// Incoming / row direction.
    Ket,
}

impl BondType {
    /// Whether the bond carries a bra/ket direction.
    pub fn is_tagged(&self) -> bool {
        !matches!(self, BondType::Reg)
    }

    /// The opposite direction; `Reg` is its own reverse.
    pub fn reversed(&self) -> BondType {
        match self {
            BondType::Reg => BondType::Reg,
            BondType::Bra => BondType::Ket,
            BondType::Ket => BondType::Bra,
        }
    }
}

/// A tagged, dimensioned index, optionally graded by conserved quantum
/// numbers.
///
/// When symmetric, `qnums` holds one vector per degeneracy slot (length
/// `dim`), each vector one integer per generator in `syms`.
///
/// # Examples
///
/// ```
/// use unitensors::{Bond, BondType};
///
/// let b1 = Bond::with_qnums(1, BondType::Bra, vec![vec![0, 1]]).unwrap();
/// let b2 = Bond::with_qnums(1, BondType::Bra, vec![vec![0, 2]]).unwrap();
/// let fused = b1.combine_bond(&b2).unwrap();
/// assert_eq!(fused.dim(), 1);
/// assert_eq!(fused.qnums(), &[vec![0, 3]]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    dim: usize,
    btype: BondType,
    qnums: Vec<Vec<i64>>,
    syms: Vec<Symmetry>,
}

impl Bond {
    /// Plain untagged bond of the given dimension, no symmetry.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            btype: BondType::Reg,
            qnums: Vec::new(),
            syms: Vec::new(),
        }
    }

    /// Tagged bond with no symmetry.
    pub fn with_type(dim: usize, btype: BondType) -> Self {
        Self {
            dim,
            btype,
            qnums: Vec::new(),
            syms: Vec::new(),
        }
    }

    /// Tagged, symmetric bond; one U1 generator is inferred per qnum
    /// component.
    pub fn with_qnums(dim: usize, btype: BondType, qnums: Vec<Vec<i64>>) -> Result<Self> {
        let nsym = qnums.first().map_or(0, |q| q.len());
        let syms = vec![Symmetry::U1; nsym];
        Self::with_syms(dim, btype, qnums, syms)
    }

    /// Tagged, symmetric bond with an explicit generator list.
    pub fn with_syms(
        dim: usize,
        btype: BondType,
        qnums: Vec<Vec<i64>>,
        syms: Vec<Symmetry>,
    ) -> Result<Self> {
        if qnums.len() != dim {
            return Err(UniTensorError::QnumCountMismatch {
                dim,
                actual: qnums.len(),
            });
        }
        for q in &qnums {
            if q.len() != syms.len() {
                return Err(UniTensorError::QnumWidthMismatch {
                    nsym: syms.len(),
                    actual: q.len(),
                });
            }
            for (&v, sym) in q.iter().zip(syms.iter()) {
                if !sym.check_qnum(v) {
                    return Err(UniTensorError::InvalidQnum {
                        qnum: v,
                        sym: sym.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            dim,
            btype,
            qnums,
            syms,
        })
    }

    /// Total (degeneracy-summed) dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Direction tag.
    pub fn btype(&self) -> BondType {
        self.btype
    }

    /// Quantum-number vectors, one per degeneracy slot.
    pub fn qnums(&self) -> &[Vec<i64>] {
        &self.qnums
    }

    /// Attached symmetry generators.
    pub fn syms(&self) -> &[Symmetry] {
        &self.syms
    }

    /// Number of conserved quantum numbers.
    pub fn nsym(&self) -> usize {
        self.syms.len()
    }

    /// Whether the bond carries a bra/ket tag.
    pub fn is_tagged(&self) -> bool {
        self.btype.is_tagged()
    }

    /// Independent copy of the generator list.
    pub fn syms_clone(&self) -> Vec<Symmetry> {
        self.syms.clone()
    }

    /// Retag the bond; qnum content is untouched.
    pub fn set_type(&mut self, btype: BondType) {
        self.btype = btype;
    }

    /// Drop the direction tag, leaving a regular bond.
    pub fn clear_type(&mut self) {
        self.btype = BondType::Reg;
    }

    /// Flip bra to ket and vice versa; regular bonds are unchanged.
    pub fn redirect_(&mut self) {
        self.btype = self.btype.reversed();
    }

    /// Non-mutating form of [`Bond::redirect_`].
    pub fn redirect(&self) -> Bond {
        let mut out = self.clone();
        out.redirect_();
        out
    }

    /// Number of degeneracy slots carrying exactly this qnum vector.
    pub fn get_degeneracy(&self, qnum: &[i64]) -> usize {
        self.qnums.iter().filter(|q| q.as_slice() == qnum).count()
    }

    /// Sorted distinct quantum-number vectors present on this bond.
    ///
    /// Sort key is lexicographic over the vector components, ascending.
    pub fn get_unique_qnums(&self) -> Vec<Vec<i64>> {
        self.get_unique_qnums_with_counts().0
    }

    /// Sorted distinct qnum vectors together with their degeneracies.
    pub fn get_unique_qnums_with_counts(&self) -> (Vec<Vec<i64>>, Vec<usize>) {
        let mut sorted = self.qnums.clone();
        sorted.sort();
        let mut unique: Vec<Vec<i64>> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for q in sorted {
            match unique.last() {
                Some(last) if *last == q => *counts.last_mut().unwrap() += 1,
                _ => {
                    unique.push(q);
                    counts.push(1);
                }
            }
        }
        (unique, counts)
    }

    /// Fuse with another bond, producing a new bond.
    ///
    /// Both bonds must carry identical symmetry lists and agree on
    /// tagged-ness; the result keeps `self`'s direction. The fused qnum
    /// list is collapsed (identical vectors merged, degeneracies summed)
    /// and re-sorted ascending, then expanded back to one slot per
    /// degeneracy unit.
    pub fn combine_bond(&self, other: &Bond) -> Result<Bond> {
        self.check_fusable(other)?;
        let dim = self.dim * other.dim;
        if self.nsym() == 0 {
            return Ok(Bond {
                dim,
                btype: self.btype,
                qnums: Vec::new(),
                syms: Vec::new(),
            });
        }
        let mut qnums = self.raw_fused_qnums(other);
        qnums.sort();
        Ok(Bond {
            dim,
            btype: self.btype,
            qnums,
            syms: self.syms.clone(),
        })
    }

    /// In-place form of [`Bond::combine_bond`].
    pub fn combine_bond_(&mut self, other: &Bond) -> Result<()> {
        *self = self.combine_bond(other)?;
        Ok(())
    }

    /// The raw-slot to fused-slot permutation implied by fusing with
    /// `other`.
    ///
    /// Raw slot `r = i * other.dim() + j` (outer over `self`, inner over
    /// `other`, matching [`Symmetry::combine_rule`]) lands at
    /// `map[r]` in the collapsed, sorted fused bond. Slots with equal
    /// qnums keep their raw relative order. Identity for non-symmetric
    /// bonds.
    pub fn fuse_slot_map(&self, other: &Bond) -> Result<Vec<usize>> {
        self.check_fusable(other)?;
        let total = self.dim * other.dim;
        if self.nsym() == 0 {
            return Ok((0..total).collect());
        }
        let raw = self.raw_fused_qnums(other);
        let mut order: Vec<usize> = (0..total).collect();
        order.sort_by(|&a, &b| raw[a].cmp(&raw[b]));
        let mut map = vec![0; total];
        for (sorted_pos, &raw_slot) in order.iter().enumerate() {
            map[raw_slot] = sorted_pos;
        }
        Ok(map)
    }

    fn check_fusable(&self, other: &Bond) -> Result<()> {
        if self.is_tagged() != other.is_tagged() {
            return Err(UniTensorError::MixedBondTags);
        }
        if self.syms != other.syms {
            return Err(UniTensorError::SymmetryMismatch);
        }
        Ok(())
    }

    /// Per-slot fused qnum vectors in raw Cartesian order.
    fn raw_fused_qnums(&self, other: &Bond) -> Vec<Vec<i64>> {
        let mut out = Vec::with_capacity(self.dim * other.dim);
        for qa in &self.qnums {
            for qb in &other.qnums {
                let fused: Vec<i64> = self
                    .syms
                    .iter()
                    .zip(qa.iter().zip(qb.iter()))
                    .map(|(sym, (&a, &b))| sym.fuse(a, b))
                    .collect();
                out.push(fused);
            }
        }
        out
    }
}
