//! Label-driven pairwise contraction.
//!
//! Two tensors contract over every label they share; surviving bonds keep
//! their order, first the left operand's then the right's. The dense
//! kernel permutes each operand to a [free | contracted] matrix view and
//! delegates the multiply to faer.

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};
use log::debug;

use crate::bond::Bond;
use crate::error::{Result, UniTensorError};
use crate::layout;
use crate::scalar::Scalar;
use crate::storage::{BlockStorage, Dense, UniTensorStorage};
use crate::unitensor::UniTensor;

/// Index bookkeeping for one pairwise contraction.
struct ContractionProperties {
    /// (index in a, index in b) per shared label, in a's bond order.
    contracted: Vec<(usize, usize)>,
    free_a: Vec<usize>,
    free_b: Vec<usize>,
    /// a permuted to [free | contracted].
    perm_a: Vec<usize>,
    /// b permuted to [contracted | free], contracted axes in a's order.
    perm_b: Vec<usize>,
    dleft: usize,
    dmid: usize,
    dright: usize,
}

impl ContractionProperties {
    fn compute<ElT: Scalar>(a: &UniTensor<ElT>, b: &UniTensor<ElT>) -> Result<Self> {
        if a.rank() > 0 && b.rank() > 0 && a.is_tag() != b.is_tag() {
            return Err(UniTensorError::MixedBondTags);
        }
        let mut contracted = Vec::new();
        for (ia, &la) in a.labels().iter().enumerate() {
            if let Some(ib) = b.label_index(la) {
                let da = a.bonds()[ia].dim();
                let db = b.bonds()[ib].dim();
                if da != db {
                    return Err(UniTensorError::IncompatibleContraction {
                        label: la,
                        dim_a: da,
                        dim_b: db,
                    });
                }
                if a.is_tag()
                    && b.is_tag()
                    && a.bonds()[ia].btype() != b.bonds()[ib].btype().reversed()
                {
                    return Err(UniTensorError::DirectionMismatch { label: la });
                }
                contracted.push((ia, ib));
            }
        }
        let free_a: Vec<usize> = (0..a.rank())
            .filter(|i| !contracted.iter().any(|&(ia, _)| ia == *i))
            .collect();
        let free_b: Vec<usize> = (0..b.rank())
            .filter(|j| !contracted.iter().any(|&(_, ib)| ib == *j))
            .collect();

        let mut perm_a = free_a.clone();
        perm_a.extend(contracted.iter().map(|&(ia, _)| ia));
        let mut perm_b: Vec<usize> = contracted.iter().map(|&(_, ib)| ib).collect();
        perm_b.extend(free_b.iter().copied());

        let dleft = free_a
            .iter()
            .map(|&i| a.bonds()[i].dim())
            .product::<usize>()
            .max(1);
        let dmid = contracted
            .iter()
            .map(|&(ia, _)| a.bonds()[ia].dim())
            .product::<usize>()
            .max(1);
        let dright = free_b
            .iter()
            .map(|&j| b.bonds()[j].dim())
            .product::<usize>()
            .max(1);

        Ok(Self {
            contracted,
            free_a,
            free_b,
            perm_a,
            perm_b,
            dleft,
            dmid,
            dright,
        })
    }
}

/// Contract `a` and `b` over all shared labels.
///
/// Surviving labels are a's free labels followed by b's, and the result's
/// row-rank is a's surviving bond count. Diagonal and block operands are
/// densified for the kernel; when both operands are symmetric the result
/// is repacked into block form. No shared labels yields the outer
/// product, full overlap a rank-0 tensor.
pub fn contract<ElT: Scalar>(a: &UniTensor<ElT>, b: &UniTensor<ElT>) -> Result<UniTensor<ElT>> {
    let repack = a.is_blockform() && b.is_blockform();
    if repack && a.bonds()[0].syms() != b.bonds()[0].syms() {
        return Err(UniTensorError::SymmetryMismatch);
    }
    let props = ContractionProperties::compute(a, b)?;
    debug!(
        "contract: {} shared labels, dleft={} dmid={} dright={}",
        props.contracted.len(),
        props.dleft,
        props.dmid,
        props.dright
    );

    let pa = a.to_dense()?.permute(&props.perm_a, None)?;
    let pb = b.to_dense()?.permute(&props.perm_b, None)?;
    let a_data = pa.get_block()?;
    let b_data = pb.get_block()?;
    let out = matmul_faer(
        a_data.as_slice(),
        b_data.as_slice(),
        props.dleft,
        props.dmid,
        props.dright,
    );

    let mut bonds: Vec<Bond> = props
        .free_a
        .iter()
        .map(|&i| a.bonds()[i].clone())
        .collect();
    bonds.extend(props.free_b.iter().map(|&j| b.bonds()[j].clone()));
    let mut labels: Vec<i64> = props.free_a.iter().map(|&i| a.labels()[i]).collect();
    labels.extend(props.free_b.iter().map(|&j| b.labels()[j]));
    let rowrank = props.free_a.len();

    if bonds.is_empty() {
        return Ok(UniTensor::from_scalar(out[0]));
    }

    let dense = Dense::from_vec(out);
    if repack {
        let dims: Vec<usize> = bonds.iter().map(|b| b.dim()).collect();
        let row_total = layout::total_of(&dims[..rowrank]);
        let mut bs = BlockStorage::new(&bonds, rowrank);
        bs.for_each_mut(|r, c, v| *v = dense[r + row_total * c]);
        return Ok(UniTensor::from_parts(
            bonds,
            labels,
            rowrank,
            UniTensorStorage::Block(bs),
        ));
    }
    Ok(UniTensor::from_parts(
        bonds,
        labels,
        rowrank,
        UniTensorStorage::Dense(dense),
    ))
}

/// C(m,n) = A(m,k) * B(k,n), all column-major, via faer.
fn matmul_faer<ElT: Scalar>(a: &[ElT], b: &[ElT], m: usize, k: usize, n: usize) -> Vec<ElT> {
    let mut out = vec![ElT::zero(); m * n];
    let a_mat = MatRef::from_column_major_slice(a, m, k);
    let b_mat = MatRef::from_column_major_slice(b, k, n);
    let c_mat = MatMut::from_column_major_slice_mut(&mut out, m, n);
    // C = alpha * A * B, alpha = 1, replacing C
    matmul(c_mat, Accum::Replace, a_mat, b_mat, ElT::one(), Par::Seq);
    out
}

/// Reference triple-loop kernel the GEMM path is checked against.
#[allow(dead_code)]
fn matmul_naive<ElT: Scalar>(a: &[ElT], b: &[ElT], m: usize, k: usize, n: usize) -> Vec<ElT> {
    let mut out = vec![ElT::zero(); m * n];
    for j in 0..n {
        for l in 0..k {
            let bv = b[l + k * j];
            for i in 0..m {
                out[i + m * j] += a[i + m * l] * bv;
            }
        }
    }
    out
}
