//! Sector-keyed block storage for symmetric tensors.
//!
//! With the bonds split at the row-rank into a row side and a column
//! side, an element multi-index is admissible iff the fused quantum
//! number of its row side equals that of its column side (bra
//! contributions enter through the group inverse). All admissible
//! elements sharing one fused qnum form a sector, stored as a dense
//! `deg_row x deg_col` block in column-major order; positions inside a
//! sector follow ascending composite index order.

use smallvec::SmallVec;

use crate::bond::{Bond, BondType};
use crate::layout::cartesian_index;
use crate::scalar::Scalar;
use crate::storage::dense::Dense;
use crate::symmetry::Symmetry;

/// Fused quantum-number key of a sector, one entry per generator.
pub type SectorKey = SmallVec<[i64; 4]>;

/// One dense sub-block addressing a single quantum-number sector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sector<ElT: Scalar> {
    key: SectorKey,
    /// Admissible row-side composite indices, ascending.
    rows: Vec<usize>,
    /// Admissible column-side composite indices, ascending.
    cols: Vec<usize>,
    /// `rows.len() * cols.len()` elements, column-major.
    data: Dense<ElT>,
}

impl<ElT: Scalar> Sector<ElT> {
    /// The fused qnum vector keying this sector.
    pub fn key(&self) -> &[i64] {
        &self.key
    }

    /// Row degeneracy of the sector.
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Column degeneracy of the sector.
    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Flat block payload.
    pub fn data(&self) -> &Dense<ElT> {
        &self.data
    }

    /// Mutable flat block payload.
    pub fn data_mut(&mut self) -> &mut Dense<ElT> {
        &mut self.data
    }
}

/// Block storage: the Block variant payload of a symmetric tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStorage<ElT: Scalar> {
    /// Fused charge of every row-side composite index.
    row_charges: Vec<SectorKey>,
    /// Fused (inverted) charge of every column-side composite index.
    col_charges: Vec<SectorKey>,
    /// Sectors present on both sides, sorted by key.
    sectors: Vec<Sector<ElT>>,
}

impl<ElT: Scalar> BlockStorage<ElT> {
    /// Derive the valid sectors for `bonds` split at `rowrank` and
    /// allocate zeroed blocks.
    ///
    /// Callers must have validated that every bond carries the same
    /// nonempty symmetry list and a bra/ket tag.
    pub fn new(bonds: &[Bond], rowrank: usize) -> Self {
        let syms = bonds[0].syms();
        let row_charges = side_charges(&bonds[..rowrank], syms, false);
        let col_charges = side_charges(&bonds[rowrank..], syms, true);

        let mut keys: Vec<SectorKey> = row_charges.clone();
        keys.sort();
        keys.dedup();

        let mut sectors = Vec::new();
        for key in keys {
            let rows: Vec<usize> = (0..row_charges.len())
                .filter(|&r| row_charges[r] == key)
                .collect();
            let cols: Vec<usize> = (0..col_charges.len())
                .filter(|&c| col_charges[c] == key)
                .collect();
            if rows.is_empty() || cols.is_empty() {
                continue;
            }
            let data = Dense::zeros(rows.len() * cols.len());
            sectors.push(Sector {
                key,
                rows,
                cols,
                data,
            });
        }
        Self {
            row_charges,
            col_charges,
            sectors,
        }
    }

    /// Number of stored sectors.
    pub fn nsec(&self) -> usize {
        self.sectors.len()
    }

    /// All sectors, sorted by key.
    pub fn sectors(&self) -> &[Sector<ElT>] {
        &self.sectors
    }

    /// Mutable sector access.
    pub fn sectors_mut(&mut self) -> &mut [Sector<ElT>] {
        &mut self.sectors
    }

    /// Sector addressed by its fused qnum vector.
    pub fn sector(&self, key: &[i64]) -> Option<&Sector<ElT>> {
        self.sectors
            .binary_search_by(|s| s.key.as_slice().cmp(key))
            .ok()
            .map(|i| &self.sectors[i])
    }

    /// Total number of admissible (stored) elements.
    pub fn nnz(&self) -> usize {
        self.sectors.iter().map(|s| s.data.len()).sum()
    }

    /// Whether the element at (row composite, col composite) is allowed
    /// by charge conservation.
    pub fn is_admissible(&self, row: usize, col: usize) -> bool {
        self.row_charges[row] == self.col_charges[col]
    }

    /// Read an element by composite indices; `None` when inadmissible.
    pub fn get(&self, row: usize, col: usize) -> Option<ElT> {
        let (idx, rpos, cpos) = self.position(row, col)?;
        let sector = &self.sectors[idx];
        Some(sector.data[rpos + sector.rows.len() * cpos])
    }

    /// Write an element by composite indices; `false` when inadmissible.
    pub fn set(&mut self, row: usize, col: usize, value: ElT) -> bool {
        match self.position(row, col) {
            Some((idx, rpos, cpos)) => {
                let sector = &mut self.sectors[idx];
                let nrows = sector.rows.len();
                sector.data[rpos + nrows * cpos] = value;
                true
            }
            None => false,
        }
    }

    /// Visit every stored element as (row composite, col composite, value).
    pub fn for_each(&self, mut f: impl FnMut(usize, usize, ElT)) {
        for sector in &self.sectors {
            for (cpos, &col) in sector.cols.iter().enumerate() {
                for (rpos, &row) in sector.rows.iter().enumerate() {
                    f(row, col, sector.data[rpos + sector.rows.len() * cpos]);
                }
            }
        }
    }

    /// Visit every stored element mutably.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, usize, &mut ElT)) {
        for sector in &mut self.sectors {
            let nrows = sector.rows.len();
            for (cpos, &col) in sector.cols.iter().enumerate() {
                for (rpos, &row) in sector.rows.iter().enumerate() {
                    f(row, col, &mut sector.data[rpos + nrows * cpos]);
                }
            }
        }
    }

    /// (sector index, row position, col position) of an admissible
    /// element, `None` otherwise.
    fn position(&self, row: usize, col: usize) -> Option<(usize, usize, usize)> {
        if !self.is_admissible(row, col) {
            return None;
        }
        let key = &self.row_charges[row];
        let idx = self
            .sectors
            .binary_search_by(|s| s.key.cmp(key))
            .ok()?;
        let sector = &self.sectors[idx];
        let rpos = sector.rows.binary_search(&row).ok()?;
        let cpos = sector.cols.binary_search(&col).ok()?;
        Some((idx, rpos, cpos))
    }
}

/// Fused charge of every composite index of one side.
///
/// Kets contribute their qnum directly, bras through the group inverse;
/// `invert` flips the final result, which makes a column side comparable
/// to a row side. An empty side yields the single identity charge.
fn side_charges(bonds: &[Bond], syms: &[Symmetry], invert: bool) -> Vec<SectorKey> {
    let dims: Vec<usize> = bonds.iter().map(|b| b.dim()).collect();
    let total: usize = dims.iter().product::<usize>().max(1);
    let mut charges = Vec::with_capacity(total);
    for linear in 0..total {
        let cart = cartesian_index(linear, &dims);
        let mut acc: SectorKey = syms.iter().map(|_| 0).collect();
        for (bond, &slot) in bonds.iter().zip(cart.iter()) {
            let q = &bond.qnums()[slot];
            for (g, sym) in syms.iter().enumerate() {
                let contrib = if bond.btype() == BondType::Ket {
                    q[g]
                } else {
                    sym.reverse_rule(q[g])
                };
                acc[g] = sym.fuse(acc[g], contrib);
            }
        }
        if invert {
            for (g, sym) in syms.iter().enumerate() {
                acc[g] = sym.reverse_rule(acc[g]);
            }
        }
        charges.push(acc);
    }
    charges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::BondType;

    fn u1_pair() -> Vec<Bond> {
        vec![
            Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap(),
            Bond::with_qnums(2, BondType::Bra, vec![vec![0], vec![1]]).unwrap(),
        ]
    }

    #[test]
    fn test_u1_pair_sectors() {
        let bonds = u1_pair();
        let st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        assert_eq!(st.nsec(), 2);
        assert_eq!(st.sectors()[0].key(), &[0]);
        assert_eq!(st.sectors()[1].key(), &[1]);
        assert_eq!(st.nnz(), 2);
    }

    #[test]
    fn test_admissibility() {
        let bonds = u1_pair();
        let st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        assert!(st.is_admissible(0, 0));
        assert!(st.is_admissible(1, 1));
        assert!(!st.is_admissible(0, 1));
        assert!(!st.is_admissible(1, 0));
    }

    #[test]
    fn test_get_set() {
        let bonds = u1_pair();
        let mut st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        assert!(st.set(1, 1, 3.5));
        assert_eq!(st.get(1, 1), Some(3.5));
        assert_eq!(st.get(0, 0), Some(0.0));
        assert_eq!(st.get(0, 1), None);
        assert!(!st.set(0, 1, 1.0));
    }

    #[test]
    fn test_degenerate_sector() {
        // Two degeneracy slots share qnum 0 on each side: one 2x2 block.
        let bonds = vec![
            Bond::with_qnums(3, BondType::Ket, vec![vec![0], vec![0], vec![1]]).unwrap(),
            Bond::with_qnums(3, BondType::Bra, vec![vec![0], vec![1], vec![0]]).unwrap(),
        ];
        let st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        let s0 = st.sector(&[0]).unwrap();
        assert_eq!(s0.nrows(), 2);
        assert_eq!(s0.ncols(), 2);
        let s1 = st.sector(&[1]).unwrap();
        assert_eq!(s1.nrows(), 1);
        assert_eq!(s1.ncols(), 1);
        assert_eq!(st.nnz(), 5);
    }

    #[test]
    fn test_set_in_degenerate_sector() {
        let bonds = vec![
            Bond::with_qnums(3, BondType::Ket, vec![vec![0], vec![0], vec![1]]).unwrap(),
            Bond::with_qnums(3, BondType::Bra, vec![vec![0], vec![1], vec![0]]).unwrap(),
        ];
        let mut st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        // second row slot, second col slot of the degenerate qnum-0 sector
        assert!(st.set(1, 2, 4.0));
        assert_eq!(st.get(1, 2), Some(4.0));
        assert!(st.set(2, 1, -1.0));
        assert_eq!(st.get(2, 1), Some(-1.0));
        assert_eq!(st.get(0, 0), Some(0.0));
        assert!(!st.set(2, 0, 9.0));
    }

    #[test]
    fn test_zn_charges_wrap() {
        let z2 = vec![Symmetry::Zn(2)];
        let bonds = vec![
            Bond::with_syms(2, BondType::Ket, vec![vec![0], vec![1]], z2.clone()).unwrap(),
            Bond::with_syms(2, BondType::Ket, vec![vec![0], vec![1]], z2.clone()).unwrap(),
            Bond::with_syms(2, BondType::Bra, vec![vec![0], vec![1]], z2).unwrap(),
        ];
        let st: BlockStorage<f64> = BlockStorage::new(&bonds, 2);
        // Row charges: (0,0)->0 (1,0)->1 (0,1)->1 (1,1)->0 (mod 2).
        assert!(st.is_admissible(0, 0));
        assert!(st.is_admissible(3, 0));
        assert!(st.is_admissible(1, 1));
        assert!(!st.is_admissible(1, 0));
    }

    #[test]
    fn test_for_each_visits_all() {
        let bonds = u1_pair();
        let mut st: BlockStorage<f64> = BlockStorage::new(&bonds, 1);
        st.set(0, 0, 1.0);
        st.set(1, 1, 2.0);
        let mut seen = Vec::new();
        st.for_each(|r, c, v| seen.push((r, c, v)));
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, vec![(0, 0, 1.0), (1, 1, 2.0)]);
    }

    #[test]
    fn test_empty_column_side() {
        // rowrank == rank: the column side is the identity charge only,
        // so only the net-zero rows are stored.
        let bonds = vec![
            Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap(),
            Bond::with_qnums(2, BondType::Bra, vec![vec![0], vec![1]]).unwrap(),
        ];
        let st: BlockStorage<f64> = BlockStorage::new(&bonds, 2);
        assert_eq!(st.nsec(), 1);
        let s = st.sector(&[0]).unwrap();
        assert_eq!(s.nrows(), 2);
        assert_eq!(s.ncols(), 1);
    }
}
