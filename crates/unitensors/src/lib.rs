//! unitensors - symmetry-constrained tensors and network contraction
//!
//! This crate provides labeled tensors whose indices (bonds) may carry
//! conserved quantum numbers, and a scheduler that contracts a whole
//! tensor network from a label script.
//!
//! # Architecture
//!
//! ```text
//! Symmetry  → abelian group (U1, Zn) and its fusion rule
//! Bond      → dimensioned, directed index graded by quantum numbers
//! UniTensor → bonds + labels + row-rank over dense/diag/block storage
//! Network   → slots + cached pairwise contraction plan
//! ```
//!
//! # Example
//!
//! ```
//! use unitensors::{Bond, Network, NetworkRecord, UniTensor, contract};
//!
//! // C[i,k] = sum_j A[i,j] * B[j,k], scripted through a network
//! let mut net: Network<f64> = Network::from_records(
//!     vec![
//!         NetworkRecord::new("A", vec![0, 1]),
//!         NetworkRecord::new("B", vec![1, 2]),
//!     ],
//!     vec![0, 2],
//! ).unwrap();
//!
//! let a = UniTensor::from_bonds(vec![Bond::new(2), Bond::new(3)], 1).unwrap();
//! let b = UniTensor::from_bonds(vec![Bond::new(3), Bond::new(4)], 1).unwrap();
//! net.put_tensor("A", a).unwrap();
//! net.put_tensor("B", b).unwrap();
//!
//! let c = net.launch().unwrap();
//! assert_eq!(c.shape(), vec![2, 4]);
//! ```

pub mod bond;
pub mod contract;
pub mod error;
pub mod layout;
pub mod network;
pub mod random;
pub mod scalar;
pub mod storage;
pub mod symmetry;
pub mod unitensor;

pub use bond::{Bond, BondType};
pub use contract::contract;
pub use error::{Result, UniTensorError};
pub use network::{Network, NetworkRecord};
pub use random::{RandomNormal, RandomUniform};
pub use scalar::{Scalar, c64};
pub use storage::{BlockStorage, Dense, UniTensorStorage};
pub use symmetry::Symmetry;
pub use unitensor::{Device, UniTensor};
