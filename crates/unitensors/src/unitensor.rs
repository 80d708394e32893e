//! The labeled, symmetry-aware tensor type.
//!
//! A [`UniTensor`] owns an ordered bond list, one integer label per bond,
//! and a row-rank splitting the bonds into a row side and a column side.
//! The payload layout is chosen at construction: dense, diagonal, or
//! block-sparse when the bonds carry quantum numbers. Mutating operations
//! come in pairs, an in-place `_` form holding the invariant-update logic
//! and a clone-then-mutate wrapper.

use crate::bond::{Bond, BondType};
use crate::error::{Result, UniTensorError};
use crate::layout;
use crate::scalar::Scalar;
use crate::storage::{BlockStorage, Dense, UniTensorStorage};

/// Placement of a tensor's storage. Only [`Device::Cpu`] has a backend;
/// requesting anything else errors rather than silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

/// A tensor with labeled, optionally graded bonds.
///
/// # Examples
///
/// ```
/// use unitensors::{Bond, UniTensor};
///
/// let mut t: UniTensor<f64> = UniTensor::from_bonds(
///     vec![Bond::new(2), Bond::new(3)], 1).unwrap();
/// t.set_at(&[1, 2], 5.0).unwrap();
/// assert_eq!(t.at(&[1, 2]).unwrap(), 5.0);
/// assert_eq!(t.labels(), &[0, 1]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UniTensor<ElT: Scalar> {
    bonds: Vec<Bond>,
    labels: Vec<i64>,
    rowrank: usize,
    is_diag: bool,
    is_tag: bool,
    is_braket_form: bool,
    /// Cleared by `permute_`, restored by `contiguous_`.
    contiguous: bool,
    device: Device,
    storage: UniTensorStorage<ElT>,
}

impl<ElT: Scalar> UniTensor<ElT> {
    /// Full constructor.
    ///
    /// Validates the bond list, resolves defaults for `labels` and
    /// `rowrank`, deep-clones nothing from the caller (the `Vec`s are
    /// moved in and owned exclusively), and allocates zeroed storage.
    ///
    /// Bonds carrying quantum numbers produce block-sparse storage; they
    /// must then all be tagged, share one symmetry list, and `is_diag`
    /// must be false.
    pub fn new(
        bonds: Vec<Bond>,
        labels: Option<Vec<i64>>,
        rowrank: Option<usize>,
        device: Device,
        is_diag: bool,
    ) -> Result<Self> {
        if device != Device::Cpu {
            return Err(UniTensorError::DeviceUnsupported {
                device: device.to_string(),
            });
        }
        let rank = bonds.len();

        let tagged = bonds.iter().filter(|b| b.is_tagged()).count();
        if tagged != 0 && tagged != rank {
            return Err(UniTensorError::MixedBondTags);
        }
        let is_tag = rank > 0 && tagged == rank;

        if bonds.iter().any(|b| b.dim() == 0) {
            return Err(UniTensorError::ZeroDimBond);
        }

        let rowrank = if is_tag {
            rowrank.unwrap_or_else(|| {
                bonds.iter().filter(|b| b.btype() == BondType::Ket).count()
            })
        } else {
            match rowrank {
                Some(r) => r,
                None if rank == 0 => 0,
                None => return Err(UniTensorError::RowrankRequired),
            }
        };
        if rowrank > rank {
            return Err(UniTensorError::RowrankOutOfRange { rowrank, rank });
        }

        let labels = match labels {
            Some(l) => {
                if l.len() != rank {
                    return Err(UniTensorError::LabelCountMismatch {
                        expected: rank,
                        actual: l.len(),
                    });
                }
                if has_duplicates(&l) {
                    return Err(UniTensorError::DuplicateLabels);
                }
                l
            }
            None => (0..rank as i64).collect(),
        };

        if is_diag {
            if rank != 2 || bonds[0].dim() != bonds[1].dim() {
                return Err(UniTensorError::DiagShapeMismatch);
            }
            if rowrank != 1 {
                return Err(UniTensorError::RowrankOutOfRange { rowrank, rank });
            }
        }

        let symmetric = bonds.iter().any(|b| b.nsym() > 0);
        if symmetric {
            let syms = bonds[0].syms();
            if bonds.iter().any(|b| b.syms() != syms) {
                return Err(UniTensorError::SymmetryMismatch);
            }
            if !is_tag {
                return Err(UniTensorError::MixedBondTags);
            }
            if is_diag {
                return Err(UniTensorError::BlockUnsupported { op: "is_diag" });
            }
        }

        let storage = if symmetric {
            UniTensorStorage::Block(BlockStorage::new(&bonds, rowrank))
        } else if is_diag {
            UniTensorStorage::Diag(Dense::zeros(bonds[0].dim()))
        } else {
            let dims: Vec<usize> = bonds.iter().map(|b| b.dim()).collect();
            UniTensorStorage::Dense(Dense::zeros(layout::total_of(&dims)))
        };

        let mut t = Self {
            bonds,
            labels,
            rowrank,
            is_diag,
            is_tag,
            is_braket_form: false,
            contiguous: true,
            device,
            storage,
        };
        t.recompute_braket();
        Ok(t)
    }

    /// Dense or block tensor with default labels on the CPU.
    pub fn from_bonds(bonds: Vec<Bond>, rowrank: usize) -> Result<Self> {
        Self::new(bonds, None, Some(rowrank), Device::Cpu, false)
    }

    /// Tagged tensor with the row-rank defaulted to the ket count.
    pub fn from_tagged_bonds(bonds: Vec<Bond>) -> Result<Self> {
        Self::new(bonds, None, None, Device::Cpu, false)
    }

    /// Rank-0 tensor holding a single value.
    pub fn from_scalar(value: ElT) -> Self {
        Self::from_parts(
            Vec::new(),
            Vec::new(),
            0,
            UniTensorStorage::Dense(Dense::from_vec(vec![value])),
        )
    }

    pub(crate) fn from_parts(
        bonds: Vec<Bond>,
        labels: Vec<i64>,
        rowrank: usize,
        storage: UniTensorStorage<ElT>,
    ) -> Self {
        let is_tag = !bonds.is_empty() && bonds.iter().all(|b| b.is_tagged());
        let is_diag = matches!(storage, UniTensorStorage::Diag(_));
        let mut t = Self {
            bonds,
            labels,
            rowrank,
            is_diag,
            is_tag,
            is_braket_form: false,
            contiguous: true,
            device: Device::Cpu,
            storage,
        };
        t.recompute_braket();
        t
    }

    // ---- introspection ----

    /// Number of bonds.
    pub fn rank(&self) -> usize {
        self.bonds.len()
    }

    /// Bond dimensions in declared order.
    pub fn shape(&self) -> Vec<usize> {
        self.bonds.iter().map(|b| b.dim()).collect()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn rowrank(&self) -> usize {
        self.rowrank
    }

    pub fn is_diag(&self) -> bool {
        self.is_diag
    }

    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    pub fn is_braket_form(&self) -> bool {
        self.is_braket_form
    }

    pub fn is_contiguous(&self) -> bool {
        self.contiguous
    }

    /// Whether the payload is block-sparse (symmetric) storage.
    pub fn is_blockform(&self) -> bool {
        matches!(self.storage, UniTensorStorage::Block(_))
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Name of the element type.
    pub fn dtype_name(&self) -> &'static str {
        std::any::type_name::<ElT>()
    }

    /// Position of a label, if present.
    pub fn label_index(&self, label: i64) -> Option<usize> {
        self.labels.iter().position(|&l| l == label)
    }

    pub(crate) fn storage(&self) -> &UniTensorStorage<ElT> {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut UniTensorStorage<ElT> {
        &mut self.storage
    }

    // ---- labels and row-rank ----

    /// Replace the whole label list.
    pub fn set_labels(&mut self, labels: Vec<i64>) -> Result<()> {
        if labels.len() != self.rank() {
            return Err(UniTensorError::LabelCountMismatch {
                expected: self.rank(),
                actual: labels.len(),
            });
        }
        if has_duplicates(&labels) {
            return Err(UniTensorError::DuplicateLabels);
        }
        self.labels = labels;
        Ok(())
    }

    /// Relabel one bond.
    pub fn set_label(&mut self, idx: usize, label: i64) -> Result<()> {
        if idx >= self.rank() {
            return Err(UniTensorError::IndexOutOfBounds {
                index: idx,
                dim_size: self.rank(),
            });
        }
        if self.labels.iter().enumerate().any(|(i, &l)| i != idx && l == label) {
            return Err(UniTensorError::DuplicateLabels);
        }
        self.labels[idx] = label;
        Ok(())
    }

    /// Move the row/column split. Block storage is re-sectored so every
    /// admissible element keeps its value.
    pub fn set_rowrank(&mut self, rowrank: usize) -> Result<()> {
        let rank = self.rank();
        if rowrank > rank || (self.is_diag && rowrank != 1) {
            return Err(UniTensorError::RowrankOutOfRange { rowrank, rank });
        }
        let rebuilt = match &self.storage {
            UniTensorStorage::Block(b) if rowrank != self.rowrank => {
                let shape = self.shape();
                let mut ns = BlockStorage::new(&self.bonds, rowrank);
                let row_dims = &shape[..self.rowrank];
                let col_dims = &shape[self.rowrank..];
                b.for_each(|r, c, v| {
                    let mut cart = layout::cartesian_index(r, row_dims);
                    cart.extend(layout::cartesian_index(c, col_dims));
                    let (nr, nc) = composite_pair(&cart, &shape, rowrank);
                    let ok = ns.set(nr, nc, v);
                    debug_assert!(ok);
                });
                Some(UniTensorStorage::Block(ns))
            }
            _ => None,
        };
        if let Some(s) = rebuilt {
            self.storage = s;
        }
        self.rowrank = rowrank;
        self.recompute_braket();
        Ok(())
    }

    // ---- element access ----

    /// Read one element. Off-diagonal reads on a diagonal tensor yield
    /// zero; symmetry-forbidden elements error.
    pub fn at(&self, idx: &[usize]) -> Result<ElT> {
        self.check_indices(idx)?;
        match &self.storage {
            UniTensorStorage::Dense(d) => {
                let strides = layout::strides_of(&self.shape());
                Ok(d[layout::linear_index(idx, &strides)])
            }
            UniTensorStorage::Diag(d) => {
                if idx[0] == idx[1] {
                    Ok(d[idx[0]])
                } else {
                    Ok(ElT::zero())
                }
            }
            UniTensorStorage::Block(b) => {
                let (r, c) = composite_pair(idx, &self.shape(), self.rowrank);
                b.get(r, c).ok_or(UniTensorError::InadmissibleElement {
                    index: idx.to_vec(),
                })
            }
        }
    }

    /// Write one element; same admissibility rules as [`UniTensor::at`],
    /// except an off-diagonal write on a diagonal tensor errors.
    pub fn set_at(&mut self, idx: &[usize], value: ElT) -> Result<()> {
        self.check_indices(idx)?;
        let shape = self.shape();
        let rowrank = self.rowrank;
        match &mut self.storage {
            UniTensorStorage::Dense(d) => {
                let strides = layout::strides_of(&shape);
                d[layout::linear_index(idx, &strides)] = value;
                Ok(())
            }
            UniTensorStorage::Diag(d) => {
                if idx[0] != idx[1] {
                    return Err(UniTensorError::DiagUnsupported {
                        op: "off-diagonal element write",
                    });
                }
                d[idx[0]] = value;
                Ok(())
            }
            UniTensorStorage::Block(b) => {
                let (r, c) = composite_pair(idx, &shape, rowrank);
                if b.set(r, c, value) {
                    Ok(())
                } else {
                    Err(UniTensorError::InadmissibleElement {
                        index: idx.to_vec(),
                    })
                }
            }
        }
    }

    /// Copy out the dense payload (dense and diagonal variants).
    pub fn get_block(&self) -> Result<Dense<ElT>> {
        match &self.storage {
            UniTensorStorage::Dense(d) | UniTensorStorage::Diag(d) => Ok(d.clone()),
            UniTensorStorage::Block(_) => {
                Err(UniTensorError::BlockUnsupported { op: "get_block" })
            }
        }
    }

    /// Replace the dense payload; length must match.
    pub fn put_block(&mut self, data: Dense<ElT>) -> Result<()> {
        match &mut self.storage {
            UniTensorStorage::Dense(d) | UniTensorStorage::Diag(d) => {
                if d.len() != data.len() {
                    return Err(UniTensorError::ShapeMismatch {
                        expected: d.len(),
                        actual: data.len(),
                    });
                }
                *d = data;
                Ok(())
            }
            UniTensorStorage::Block(_) => {
                Err(UniTensorError::BlockUnsupported { op: "put_block" })
            }
        }
    }

    /// Copy out one sector's block of a symmetric tensor.
    pub fn get_block_by_qnum(&self, qnum: &[i64]) -> Result<Dense<ElT>> {
        match &self.storage {
            UniTensorStorage::Block(b) => b
                .sector(qnum)
                .map(|s| s.data().clone())
                .ok_or(UniTensorError::SectorNotFound {
                    qnum: qnum.to_vec(),
                }),
            _ => Err(UniTensorError::NotBlockForm {
                op: "get_block_by_qnum",
            }),
        }
    }

    /// Replace one sector's block of a symmetric tensor.
    pub fn put_block_by_qnum(&mut self, qnum: &[i64], data: Dense<ElT>) -> Result<()> {
        match &mut self.storage {
            UniTensorStorage::Block(b) => {
                let sector = b
                    .sectors_mut()
                    .iter_mut()
                    .find(|s| s.key() == qnum)
                    .ok_or(UniTensorError::SectorNotFound {
                        qnum: qnum.to_vec(),
                    })?;
                if sector.data().len() != data.len() {
                    return Err(UniTensorError::ShapeMismatch {
                        expected: sector.data().len(),
                        actual: data.len(),
                    });
                }
                *sector.data_mut() = data;
                Ok(())
            }
            _ => Err(UniTensorError::NotBlockForm {
                op: "put_block_by_qnum",
            }),
        }
    }

    // ---- structural operations ----

    /// Reorder bonds and labels by `mapper` (a permutation of bond
    /// indices).
    ///
    /// Diagonal tensors remap metadata only and require `new_rowrank`,
    /// if given, to be 1. Otherwise the payload is reordered too and the
    /// contiguity flag is cleared on a non-identity mapper; block storage
    /// is re-sectored, preserving every admissible element.
    pub fn permute_(&mut self, mapper: &[usize], new_rowrank: Option<usize>) -> Result<()> {
        let rank = self.rank();
        layout::validate_permutation(mapper, rank)?;

        if self.is_diag {
            if let Some(r) = new_rowrank {
                if r != 1 {
                    return Err(UniTensorError::RowrankOutOfRange { rowrank: r, rank });
                }
            }
            self.bonds = layout::apply_permutation(&self.bonds, mapper);
            self.labels = layout::apply_permutation(&self.labels, mapper);
            self.recompute_braket();
            return Ok(());
        }

        if let Some(r) = new_rowrank {
            if r >= rank && !(r == 0 && rank == 0) {
                return Err(UniTensorError::RowrankOutOfRange { rowrank: r, rank });
            }
        }
        let rr = new_rowrank.unwrap_or(self.rowrank);
        let shape = self.shape();

        let new_storage = match &self.storage {
            UniTensorStorage::Dense(d) => {
                if layout::is_identity(mapper) {
                    None
                } else {
                    self.contiguous = false;
                    Some(UniTensorStorage::Dense(Dense::from_vec(permute_dense(
                        d.as_slice(),
                        &shape,
                        mapper,
                    ))))
                }
            }
            UniTensorStorage::Block(b) => {
                let new_bonds = layout::apply_permutation(&self.bonds, mapper);
                let new_dims = layout::apply_permutation(&shape, mapper);
                let mut ns = BlockStorage::new(&new_bonds, rr);
                let row_dims = &shape[..self.rowrank];
                let col_dims = &shape[self.rowrank..];
                b.for_each(|r, c, v| {
                    let mut cart = layout::cartesian_index(r, row_dims);
                    cart.extend(layout::cartesian_index(c, col_dims));
                    let new_cart: Vec<usize> =
                        mapper.iter().map(|&p| cart[p]).collect();
                    let (nr, nc) = composite_pair(&new_cart, &new_dims, rr);
                    let ok = ns.set(nr, nc, v);
                    debug_assert!(ok);
                });
                Some(UniTensorStorage::Block(ns))
            }
            UniTensorStorage::Diag(_) => None,
        };
        if let Some(s) = new_storage {
            self.storage = s;
        }

        self.bonds = layout::apply_permutation(&self.bonds, mapper);
        self.labels = layout::apply_permutation(&self.labels, mapper);
        self.rowrank = rr;
        self.recompute_braket();
        Ok(())
    }

    /// Non-mutating form of [`UniTensor::permute_`].
    pub fn permute(&self, mapper: &[usize], new_rowrank: Option<usize>) -> Result<Self> {
        let mut out = self.clone();
        out.permute_(mapper, new_rowrank)?;
        Ok(out)
    }

    /// Permutation by labels is declared but not implemented.
    pub fn permute_by_labels_(
        &mut self,
        _labels: &[i64],
        _new_rowrank: Option<usize>,
    ) -> Result<()> {
        Err(UniTensorError::NotImplemented {
            what: "permutation by labels",
        })
    }

    /// Materialize the logical bond order into storage order.
    ///
    /// The dense backend reorders its buffer at permute time, so this
    /// only restores the contiguity flag. Block storage is rebuilt by
    /// [`UniTensor::permute_`] itself and never leaves the contiguous
    /// state.
    pub fn contiguous_(&mut self) {
        self.contiguous = true;
    }

    /// Non-mutating form of [`UniTensor::contiguous_`].
    pub fn contiguous(&self) -> Self {
        let mut out = self.clone();
        out.contiguous_();
        out
    }

    /// Reinterpret the dense payload under a new shape. Untagged dense
    /// tensors only; labels reset to defaults.
    pub fn reshape_(&mut self, new_shape: &[usize], new_rowrank: usize) -> Result<()> {
        if self.is_diag {
            return Err(UniTensorError::DiagUnsupported { op: "reshape" });
        }
        if self.is_tag {
            return Err(UniTensorError::TaggedUnsupported { op: "reshape" });
        }
        if matches!(self.storage, UniTensorStorage::Block(_)) {
            return Err(UniTensorError::BlockUnsupported { op: "reshape" });
        }
        if new_shape.iter().any(|&d| d == 0) {
            return Err(UniTensorError::ZeroDimBond);
        }
        let total = layout::total_of(new_shape);
        if total != self.storage.len() {
            return Err(UniTensorError::ShapeMismatch {
                expected: self.storage.len(),
                actual: total,
            });
        }
        if new_rowrank > new_shape.len() {
            return Err(UniTensorError::RowrankOutOfRange {
                rowrank: new_rowrank,
                rank: new_shape.len(),
            });
        }
        self.bonds = new_shape.iter().map(|&d| Bond::new(d)).collect();
        self.labels = (0..new_shape.len() as i64).collect();
        self.rowrank = new_rowrank;
        self.contiguous_();
        self.recompute_braket();
        Ok(())
    }

    /// Non-mutating form of [`UniTensor::reshape_`].
    pub fn reshape(&self, new_shape: &[usize], new_rowrank: usize) -> Result<Self> {
        let mut out = self.clone();
        out.reshape_(new_shape, new_rowrank)?;
        Ok(out)
    }

    /// Expand diagonal or block storage into a full dense payload.
    /// Inadmissible elements densify to zero; bonds and labels are kept.
    pub fn to_dense_(&mut self) -> Result<()> {
        let new_storage = match &self.storage {
            UniTensorStorage::Dense(_) => None,
            UniTensorStorage::Diag(d) => {
                let n = self.bonds[0].dim();
                let mut full = Dense::zeros(n * n);
                for i in 0..n {
                    full[i + n * i] = d[i];
                }
                Some(UniTensorStorage::Dense(full))
            }
            UniTensorStorage::Block(b) => {
                let shape = self.shape();
                let row_total = layout::total_of(&shape[..self.rowrank]);
                let mut full = Dense::zeros(layout::total_of(&shape));
                b.for_each(|r, c, v| full[r + row_total * c] = v);
                Some(UniTensorStorage::Dense(full))
            }
        };
        if let Some(s) = new_storage {
            self.storage = s;
            self.is_diag = false;
        }
        Ok(())
    }

    /// Non-mutating form of [`UniTensor::to_dense_`].
    pub fn to_dense(&self) -> Result<Self> {
        let mut out = self.clone();
        out.to_dense_()?;
        Ok(out)
    }

    /// Fuse the bonds at `idxs` (in indicator order) into a single bond.
    ///
    /// The fused bond takes the direction and label of the first
    /// indicated bond. Without `permute_back` it lands at position 0,
    /// or at the start of the column side when every indicated bond came
    /// from the column side; with it, at the first indicator's original
    /// position among the surviving bonds. Diagonal tensors must be
    /// densified first.
    pub fn combine_bonds_(&mut self, idxs: &[usize], permute_back: bool) -> Result<()> {
        if idxs.len() < 2 {
            return Err(UniTensorError::CombineTooFew);
        }
        if self.is_diag {
            return Err(UniTensorError::DiagUnsupported { op: "combine_bonds" });
        }
        let rank = self.rank();
        let mut seen = vec![false; rank];
        for &i in idxs {
            if i >= rank {
                return Err(UniTensorError::IndexOutOfBounds {
                    index: i,
                    dim_size: rank,
                });
            }
            if seen[i] {
                return Err(UniTensorError::InvalidPermutation {
                    perm: idxs.to_vec(),
                    rank,
                });
            }
            seen[i] = true;
        }
        let unsel: Vec<usize> = (0..rank).filter(|i| !seen[*i]).collect();
        let old_rowrank = self.rowrank;
        let row_selected = idxs.iter().filter(|&&i| i < old_rowrank).count();
        let new_rank = unsel.len() + 1;
        let target = if permute_back {
            unsel.iter().filter(|&&u| u < idxs[0]).count()
        } else if row_selected == 0 {
            // Column-only fusion leaves the row side untouched; the
            // fused bond opens the column side.
            old_rowrank
        } else {
            0
        };
        let new_rowrank = if permute_back {
            if idxs[0] < old_rowrank {
                old_rowrank - row_selected + 1
            } else {
                old_rowrank - row_selected
            }
        } else if row_selected > 0 {
            old_rowrank - row_selected + 1
        } else {
            old_rowrank
        }
        .min(new_rank);

        // Symmetric fusion needs all fused bonds pointing the same way,
        // otherwise the fused qnum list would not describe the block.
        if self.bonds[idxs[0]].nsym() > 0 {
            let dir = self.bonds[idxs[0]].btype();
            for &i in &idxs[1..] {
                if self.bonds[i].btype() != dir {
                    return Err(UniTensorError::DirectionMismatch {
                        label: self.labels[i],
                    });
                }
            }
        }

        let mut fused = self.bonds[idxs[0]].clone();
        let mut step_maps: Vec<Vec<usize>> = Vec::with_capacity(idxs.len() - 1);
        for &i in &idxs[1..] {
            step_maps.push(fused.fuse_slot_map(&self.bonds[i])?);
            fused.combine_bond_(&self.bonds[i])?;
        }

        match &self.storage {
            UniTensorStorage::Block(b) => {
                let mut new_bonds: Vec<Bond> =
                    unsel.iter().map(|&i| self.bonds[i].clone()).collect();
                let mut new_labels: Vec<i64> =
                    unsel.iter().map(|&i| self.labels[i]).collect();
                new_bonds.insert(target, fused);
                new_labels.insert(target, self.labels[idxs[0]]);
                let new_dims: Vec<usize> = new_bonds.iter().map(|b| b.dim()).collect();

                let shape = self.shape();
                let row_dims = &shape[..old_rowrank];
                let col_dims = &shape[old_rowrank..];
                let mut ns = BlockStorage::new(&new_bonds, new_rowrank);
                b.for_each(|r, c, v| {
                    let mut cart = layout::cartesian_index(r, row_dims);
                    cart.extend(layout::cartesian_index(c, col_dims));
                    let mut slot = cart[idxs[0]];
                    for (t, &i) in idxs[1..].iter().enumerate() {
                        slot = step_maps[t][slot * self.bonds[i].dim() + cart[i]];
                    }
                    let mut new_cart: Vec<usize> =
                        unsel.iter().map(|&i| cart[i]).collect();
                    new_cart.insert(target, slot);
                    let (nr, nc) = composite_pair(&new_cart, &new_dims, new_rowrank);
                    let ok = ns.set(nr, nc, v);
                    debug_assert!(ok);
                });
                self.storage = UniTensorStorage::Block(ns);
                self.bonds = new_bonds;
                self.labels = new_labels;
            }
            _ => {
                // Group the fused axes to the front; merging leading
                // axes of a column-major buffer is then a pure
                // metadata change.
                let mut mapper: Vec<usize> = idxs.to_vec();
                mapper.extend(unsel.iter().copied());
                self.permute_(&mapper, None)?;
                self.contiguous_();

                let mut mid_bonds = vec![fused];
                mid_bonds.extend_from_slice(&self.bonds[idxs.len()..]);
                let mut mid_labels = vec![self.labels[0]];
                mid_labels.extend_from_slice(&self.labels[idxs.len()..]);
                self.bonds = mid_bonds;
                self.labels = mid_labels;
                self.rowrank = self.rowrank.min(self.rank());

                if target > 0 {
                    let back: Vec<usize> = (0..new_rank)
                        .map(|j| match j.cmp(&target) {
                            std::cmp::Ordering::Less => j + 1,
                            std::cmp::Ordering::Equal => 0,
                            std::cmp::Ordering::Greater => j,
                        })
                        .collect();
                    self.permute_(&back, None)?;
                    self.contiguous_();
                }
            }
        }

        self.rowrank = new_rowrank;
        self.recompute_braket();
        Ok(())
    }

    /// Non-mutating form of [`UniTensor::combine_bonds_`].
    pub fn combine_bonds(&self, idxs: &[usize], permute_back: bool) -> Result<Self> {
        let mut out = self.clone();
        out.combine_bonds_(idxs, permute_back)?;
        Ok(out)
    }

    /// [`UniTensor::combine_bonds_`] with the bonds named by label.
    pub fn combine_bonds_by_labels_(
        &mut self,
        labels: &[i64],
        permute_back: bool,
    ) -> Result<()> {
        let idxs = labels
            .iter()
            .map(|&l| {
                self.label_index(l)
                    .ok_or(UniTensorError::LabelNotFound { label: l })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.combine_bonds_(&idxs, permute_back)
    }

    /// Non-mutating form of [`UniTensor::combine_bonds_by_labels_`].
    pub fn combine_bonds_by_labels(
        &self,
        labels: &[i64],
        permute_back: bool,
    ) -> Result<Self> {
        let mut out = self.clone();
        out.combine_bonds_by_labels_(labels, permute_back)?;
        Ok(out)
    }

    // ---- internals ----

    fn check_indices(&self, idx: &[usize]) -> Result<()> {
        if idx.len() != self.rank() {
            return Err(UniTensorError::WrongNumberOfIndices {
                expected: self.rank(),
                actual: idx.len(),
            });
        }
        for (&i, bond) in idx.iter().zip(self.bonds.iter()) {
            if i >= bond.dim() {
                return Err(UniTensorError::IndexOutOfBounds {
                    index: i,
                    dim_size: bond.dim(),
                });
            }
        }
        Ok(())
    }

    fn recompute_braket(&mut self) {
        self.is_braket_form = self.is_tag
            && self.bonds[..self.rowrank]
                .iter()
                .all(|b| b.btype() == BondType::Ket)
            && self.bonds[self.rowrank..]
                .iter()
                .all(|b| b.btype() == BondType::Bra);
    }
}

/// Split a full cartesian index into (row, column) composite indices,
/// both column-major within their side.
pub(crate) fn composite_pair(cart: &[usize], dims: &[usize], rowrank: usize) -> (usize, usize) {
    let row = layout::linear_index(
        &cart[..rowrank],
        &layout::strides_of(&dims[..rowrank]),
    );
    let col = layout::linear_index(
        &cart[rowrank..],
        &layout::strides_of(&dims[rowrank..]),
    );
    (row, col)
}

/// Reorder a column-major buffer so axis `k` of the output is axis
/// `perm[k]` of the input.
pub(crate) fn permute_dense<ElT: Scalar>(
    data: &[ElT],
    shape: &[usize],
    perm: &[usize],
) -> Vec<ElT> {
    let new_shape = layout::apply_permutation(shape, perm);
    let old_strides = layout::strides_of(shape);
    let total = layout::total_of(&new_shape);
    let mut out = Vec::with_capacity(total);
    for linear in 0..total {
        let cart = layout::cartesian_index(linear, &new_shape);
        let mut old = 0;
        for (k, &p) in perm.iter().enumerate() {
            old += cart[k] * old_strides[p];
        }
        out.push(data[old]);
    }
    out
}

fn has_duplicates(labels: &[i64]) -> bool {
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[0] == w[1])
}
