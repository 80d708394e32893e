//! Integration tests for UniTensor structural operations.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use unitensors::layout::inverse_permutation;
use unitensors::{Bond, BondType, UniTensor, UniTensorError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_dense(shape: &[usize], rowrank: usize, seed: u64) -> UniTensor<f64> {
    let bonds = shape.iter().map(|&d| Bond::new(d)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    UniTensor::random_with_rng(bonds, Some(rowrank), &mut rng).unwrap()
}

fn u1_block_tensor() -> UniTensor<f64> {
    let bonds = vec![
        Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap(),
        Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap(),
        Bond::with_qnums(3, BondType::Bra, vec![vec![0], vec![1], vec![2]]).unwrap(),
    ];
    UniTensor::from_tagged_bonds(bonds).unwrap()
}

fn fill_admissible(t: &mut UniTensor<f64>) {
    let shape = t.shape();
    let mut counter = 1.0;
    let total: usize = shape.iter().product();
    for linear in 0..total {
        let mut idx = Vec::with_capacity(shape.len());
        let mut rem = linear;
        for &d in &shape {
            idx.push(rem % d);
            rem /= d;
        }
        if t.set_at(&idx, counter).is_ok() {
            counter += 1.0;
        }
    }
}

#[test]
fn test_permute_contiguous_roundtrip() {
    init_logging();
    let t = random_dense(&[2, 3, 4], 1, 11);
    let perm = [2, 0, 1];
    let p = t.permute(&perm, None).unwrap().contiguous();
    let back = p.permute(&inverse_permutation(&perm), None).unwrap().contiguous();
    assert_eq!(back.labels(), t.labels());
    assert_eq!(back.shape(), t.shape());
    for i in 0..2 {
        for j in 0..3 {
            for k in 0..4 {
                assert_relative_eq!(
                    back.at(&[i, j, k]).unwrap(),
                    t.at(&[i, j, k]).unwrap()
                );
            }
        }
    }
}

#[test]
fn test_permute_clears_contiguity_flag() {
    let mut t = random_dense(&[2, 3], 1, 3);
    assert!(t.is_contiguous());
    t.permute_(&[1, 0], None).unwrap();
    assert!(!t.is_contiguous());
    t.contiguous_();
    assert!(t.is_contiguous());
}

#[test]
fn test_block_permute_preserves_all_admissible_elements() {
    let mut t = u1_block_tensor();
    fill_admissible(&mut t);
    let perm = [1, 2, 0];
    let p = t.permute(&perm, Some(1)).unwrap();
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..3 {
                let orig = t.at(&[i, j, k]);
                let moved = p.at(&[j, k, i]);
                match (orig, moved) {
                    (Ok(a), Ok(b)) => assert_relative_eq!(a, b),
                    (Err(_), Err(_)) => {}
                    (a, b) => panic!("admissibility changed: {a:?} vs {b:?}"),
                }
            }
        }
    }
}

#[test]
fn test_combine_bonds_dense_preserves_multiset() {
    let t = random_dense(&[2, 3, 4], 1, 19);
    let c = t.combine_bonds(&[0, 1], false).unwrap();
    assert_eq!(c.shape(), vec![6, 4]);
    let mut before: Vec<f64> = t.get_block().unwrap().into_vec();
    let mut after: Vec<f64> = c.get_block().unwrap().into_vec();
    before.sort_by(f64::total_cmp);
    after.sort_by(f64::total_cmp);
    assert_eq!(before, after);
}

#[test]
fn test_combine_bonds_block_preserves_elements() {
    let mut t = u1_block_tensor();
    fill_admissible(&mut t);
    let map = t.bonds()[0].fuse_slot_map(&t.bonds()[1]).unwrap();
    let c = t.combine_bonds(&[0, 1], false).unwrap();
    assert_eq!(c.shape(), vec![4, 3]);
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..3 {
                if let Ok(v) = t.at(&[i, j, k]) {
                    let slot = map[i * 2 + j];
                    assert_relative_eq!(c.at(&[slot, k]).unwrap(), v);
                }
            }
        }
    }
}

#[test]
fn test_combine_bonds_diag_fatal() {
    let mut t = UniTensor::<f64>::new(
        vec![Bond::new(3), Bond::new(3)],
        None,
        Some(1),
        unitensors::Device::Cpu,
        true,
    )
    .unwrap();
    assert!(matches!(
        t.combine_bonds_(&[0, 1], false),
        Err(UniTensorError::DiagUnsupported { .. })
    ));
    // densify first, then combining works
    t.to_dense_().unwrap();
    assert!(t.combine_bonds_(&[0, 1], false).is_ok());
    assert_eq!(t.shape(), vec![9]);
}

#[test]
fn test_combine_bonds_by_labels() {
    let mut t = random_dense(&[2, 3, 4], 1, 23);
    t.set_labels(vec![10, 20, 30]).unwrap();
    let c = t.combine_bonds_by_labels(&[20, 30], false).unwrap();
    // both fused bonds sat on the column side, so the row side survives
    assert_eq!(c.shape(), vec![2, 12]);
    assert_eq!(c.labels(), &[10, 20]);
    assert_eq!(c.rowrank(), 1);
    assert!(matches!(
        t.combine_bonds_by_labels_(&[20, 99], false),
        Err(UniTensorError::LabelNotFound { label: 99 })
    ));
}

#[test]
fn test_block_inadmissible_elements() {
    let bonds = vec![
        Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap(),
        Bond::with_qnums(2, BondType::Bra, vec![vec![0], vec![1]]).unwrap(),
    ];
    let mut t: UniTensor<f64> = UniTensor::from_tagged_bonds(bonds).unwrap();
    assert!(t.set_at(&[0, 0], 1.0).is_ok());
    assert!(t.set_at(&[1, 1], 2.0).is_ok());
    assert!(matches!(
        t.set_at(&[0, 1], 3.0),
        Err(UniTensorError::InadmissibleElement { .. })
    ));
    let dense = t.to_dense().unwrap();
    assert_relative_eq!(dense.at(&[0, 1]).unwrap(), 0.0);
    assert_relative_eq!(dense.at(&[1, 0]).unwrap(), 0.0);
    assert_relative_eq!(dense.at(&[0, 0]).unwrap(), 1.0);
}

#[test]
fn test_block_sector_lookup() {
    let bonds = vec![
        Bond::with_qnums(3, BondType::Ket, vec![vec![0], vec![0], vec![1]]).unwrap(),
        Bond::with_qnums(3, BondType::Bra, vec![vec![0], vec![1], vec![0]]).unwrap(),
    ];
    let t: UniTensor<f64> = UniTensor::from_tagged_bonds(bonds).unwrap();
    assert_eq!(t.get_block_by_qnum(&[0]).unwrap().len(), 4);
    assert_eq!(t.get_block_by_qnum(&[1]).unwrap().len(), 1);
    assert!(matches!(
        t.get_block_by_qnum(&[2]),
        Err(UniTensorError::SectorNotFound { .. })
    ));
}

#[test]
fn test_reshape_roundtrip() {
    let t = random_dense(&[4, 6], 1, 31);
    let r = t.reshape(&[2, 2, 6], 1).unwrap();
    assert_eq!(r.shape(), vec![2, 2, 6]);
    let back = r.reshape(&[4, 6], 1).unwrap();
    assert_eq!(back.get_block().unwrap(), t.get_block().unwrap());
}

#[test]
fn test_tagged_permute_keeps_braket_bookkeeping() {
    let t: UniTensor<f64> = UniTensor::from_tagged_bonds(vec![
        Bond::with_type(2, BondType::Ket),
        Bond::with_type(3, BondType::Bra),
    ])
    .unwrap();
    assert!(t.is_braket_form());
    let p = t.permute(&[1, 0], Some(1)).unwrap();
    assert!(!p.is_braket_form());
    let back = p.permute(&[1, 0], Some(1)).unwrap();
    assert!(back.is_braket_form());
}

#[test]
fn test_scalar_tensor() {
    let t = UniTensor::from_scalar(4.5);
    assert_eq!(t.rank(), 0);
    assert_eq!(t.shape(), Vec::<usize>::new());
    assert_relative_eq!(t.at(&[]).unwrap(), 4.5);
}
