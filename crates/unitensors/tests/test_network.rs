//! Integration tests for network scheduling against manual contraction.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use unitensors::{Bond, BondType, Network, NetworkRecord, UniTensor, UniTensorError, contract};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_dense(shape: &[usize], seed: u64) -> UniTensor<f64> {
    let bonds = shape.iter().map(|&d| Bond::new(d)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    UniTensor::random_with_rng(bonds, Some(1), &mut rng).unwrap()
}

fn chain_network() -> Network<f64> {
    Network::from_records(
        vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("B", vec![1, 2]),
            NetworkRecord::new("C", vec![2, 3]),
        ],
        vec![0, 3],
    )
    .unwrap()
}

#[test]
fn test_launch_matches_manual_contraction() {
    init_logging();
    let a = random_dense(&[2, 3], 1);
    let b = random_dense(&[3, 4], 2);
    let c = random_dense(&[4, 5], 3);

    let mut net = chain_network();
    net.put_tensor_clone("A", &a).unwrap();
    net.put_tensor_clone("B", &b).unwrap();
    net.put_tensor_clone("C", &c).unwrap();
    let scripted = net.launch().unwrap();

    let mut ma = a.clone();
    ma.set_labels(vec![0, 1]).unwrap();
    let mut mb = b.clone();
    mb.set_labels(vec![1, 2]).unwrap();
    let mut mc = c.clone();
    mc.set_labels(vec![2, 3]).unwrap();
    let manual = contract(&contract(&ma, &mb).unwrap(), &mc).unwrap();

    assert_eq!(scripted.labels(), manual.labels());
    assert_eq!(scripted.shape(), manual.shape());
    for i in 0..2 {
        for j in 0..5 {
            assert_relative_eq!(
                scripted.at(&[i, j]).unwrap(),
                manual.at(&[i, j]).unwrap(),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_launch_is_deterministic() {
    let mut net = chain_network();
    net.put_tensor("A", random_dense(&[2, 3], 10)).unwrap();
    net.put_tensor("B", random_dense(&[3, 4], 11)).unwrap();
    net.put_tensor("C", random_dense(&[4, 5], 12)).unwrap();
    let first = net.launch().unwrap();
    let second = net.launch().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rebind_changes_result() {
    let mut net = chain_network();
    net.put_tensor("A", random_dense(&[2, 3], 20)).unwrap();
    net.put_tensor("B", random_dense(&[3, 4], 21)).unwrap();
    net.put_tensor("C", random_dense(&[4, 5], 22)).unwrap();
    let first = net.launch().unwrap();

    let a2 = random_dense(&[2, 3], 99);
    net.put_tensor_clone("A", &a2).unwrap();
    let second = net.launch().unwrap();
    assert_ne!(first, second);

    // consistent with manual contraction over the same script
    let mut ma = a2;
    ma.set_labels(vec![0, 1]).unwrap();
    let mut mb = random_dense(&[3, 4], 21);
    mb.set_labels(vec![1, 2]).unwrap();
    let mut mc = random_dense(&[4, 5], 22);
    mc.set_labels(vec![2, 3]).unwrap();
    let manual = contract(&contract(&ma, &mb).unwrap(), &mc).unwrap();
    for i in 0..2 {
        for j in 0..5 {
            assert_relative_eq!(
                second.at(&[i, j]).unwrap(),
                manual.at(&[i, j]).unwrap(),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_out_label_order_respected() {
    let net: Network<f64> = Network::from_records(
        vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("B", vec![1, 2]),
        ],
        vec![2, 0],
    )
    .unwrap();
    let mut net = net;
    net.put_tensor("A", random_dense(&[2, 3], 40)).unwrap();
    net.put_tensor("B", random_dense(&[3, 4], 41)).unwrap();
    let out = net.launch().unwrap();
    assert_eq!(out.labels(), &[2, 0]);
    assert_eq!(out.shape(), vec![4, 2]);
}

#[test]
fn test_clear_keeps_plan() {
    let mut net = chain_network();
    net.put_tensor("A", random_dense(&[2, 3], 50)).unwrap();
    net.clear().unwrap();
    assert!(net.is_initialized());
    assert!(matches!(
        net.launch(),
        Err(UniTensorError::UnboundSlot { .. })
    ));
    net.put_tensor("A", random_dense(&[2, 3], 50)).unwrap();
    net.put_tensor("B", random_dense(&[3, 4], 51)).unwrap();
    net.put_tensor("C", random_dense(&[4, 5], 52)).unwrap();
    assert!(net.launch().is_ok());
}

#[test]
fn test_dimension_conflict_at_launch() {
    let mut net = chain_network();
    net.put_tensor("A", random_dense(&[2, 3], 60)).unwrap();
    // label 1 has dim 3 in A but dim 7 here
    net.put_tensor("B", random_dense(&[7, 4], 61)).unwrap();
    net.put_tensor("C", random_dense(&[4, 5], 62)).unwrap();
    assert!(matches!(
        net.launch(),
        Err(UniTensorError::IncompatibleContraction { label: 1, .. })
    ));
}

#[test]
fn test_uninitialized_network_is_inert() {
    let mut net: Network<f64> = Network::default();
    assert!(matches!(
        net.launch(),
        Err(UniTensorError::UninitializedNetwork { .. })
    ));
    assert!(matches!(
        net.clear(),
        Err(UniTensorError::UninitializedNetwork { .. })
    ));
    assert!(matches!(
        net.put_tensor("A", UniTensor::from_scalar(1.0)),
        Err(UniTensorError::UninitializedNetwork { .. })
    ));
}

#[test]
fn test_symmetric_network_launch() {
    init_logging();
    let ket = Bond::with_qnums(2, BondType::Ket, vec![vec![0], vec![1]]).unwrap();
    let bra = ket.redirect();
    let mut a: UniTensor<f64> =
        UniTensor::from_tagged_bonds(vec![ket.clone(), bra.clone()]).unwrap();
    let mut b: UniTensor<f64> =
        UniTensor::from_tagged_bonds(vec![ket.clone(), bra.clone()]).unwrap();
    a.set_at(&[0, 0], 2.0).unwrap();
    a.set_at(&[1, 1], 3.0).unwrap();
    b.set_at(&[0, 0], 5.0).unwrap();
    b.set_at(&[1, 1], -1.0).unwrap();

    let mut net: Network<f64> = Network::from_records(
        vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("B", vec![1, 2]),
        ],
        vec![0, 2],
    )
    .unwrap();
    net.put_tensor("A", a).unwrap();
    net.put_tensor("B", b).unwrap();
    let out = net.launch().unwrap();
    assert!(out.is_blockform());
    assert_relative_eq!(out.at(&[0, 0]).unwrap(), 10.0);
    assert_relative_eq!(out.at(&[1, 1]).unwrap(), -3.0);
}
