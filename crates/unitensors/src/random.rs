//! Random filling of tensors.
//!
//! Uniform and normal sampling for real and complex element types. Block
//! storage is filled sector by sector, so symmetry-forbidden elements
//! stay zero.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::bond::Bond;
use crate::error::Result;
use crate::scalar::{Scalar, c64};
use crate::storage::UniTensorStorage;
use crate::unitensor::UniTensor;

/// Trait for types that can be sampled from a uniform distribution.
pub trait RandomUniform: Scalar {
    /// Sample a random value from the uniform distribution [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;
}

impl RandomUniform for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }
}

impl RandomUniform for c64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        c64::new(rng.sample(StandardUniform), rng.sample(StandardUniform))
    }
}

/// Trait for types that can be sampled from a normal distribution.
pub trait RandomNormal: Scalar {
    /// Sample a random value from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomNormal for f64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomNormal for c64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        // Real and imaginary parts independent N(0, 1/2) so |z|^2 has mean 1.
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

fn fill_with<ElT: Scalar>(storage: &mut UniTensorStorage<ElT>, mut f: impl FnMut() -> ElT) {
    match storage {
        UniTensorStorage::Dense(d) | UniTensorStorage::Diag(d) => {
            for x in d.as_mut_slice() {
                *x = f();
            }
        }
        UniTensorStorage::Block(b) => b.for_each_mut(|_, _, v| *v = f()),
    }
}

impl<ElT: RandomUniform> UniTensor<ElT> {
    /// Tensor over `bonds` with uniform random values in [0, 1).
    pub fn random(bonds: Vec<Bond>, rowrank: Option<usize>) -> Result<Self> {
        Self::random_with_rng(bonds, rowrank, &mut rand::rng())
    }

    /// [`UniTensor::random`] with a caller-supplied RNG, for
    /// reproducibility.
    ///
    /// # Example
    ///
    /// ```
    /// use unitensors::{Bond, UniTensor};
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let bonds = vec![Bond::new(2), Bond::new(3)];
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let t: UniTensor<f64> =
    ///     UniTensor::random_with_rng(bonds, Some(1), &mut rng).unwrap();
    /// assert!(t.at(&[0, 0]).unwrap() < 1.0);
    /// ```
    pub fn random_with_rng<R: Rng>(
        bonds: Vec<Bond>,
        rowrank: Option<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let mut t = Self::new(bonds, None, rowrank, crate::unitensor::Device::Cpu, false)?;
        t.randomize_(rng);
        Ok(t)
    }

    /// Overwrite every stored element with a uniform sample.
    pub fn randomize_<R: Rng>(&mut self, rng: &mut R) {
        fill_with(self.storage_mut(), || ElT::sample_uniform(rng));
    }
}

impl<ElT: RandomNormal> UniTensor<ElT> {
    /// Tensor over `bonds` with standard normal random values.
    pub fn randn(bonds: Vec<Bond>, rowrank: Option<usize>) -> Result<Self> {
        Self::randn_with_rng(bonds, rowrank, &mut rand::rng())
    }

    /// [`UniTensor::randn`] with a caller-supplied RNG.
    pub fn randn_with_rng<R: Rng>(
        bonds: Vec<Bond>,
        rowrank: Option<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let mut t = Self::new(bonds, None, rowrank, crate::unitensor::Device::Cpu, false)?;
        t.randomize_normal_(rng);
        Ok(t)
    }

    /// Overwrite every stored element with a normal sample.
    pub fn randomize_normal_<R: Rng>(&mut self, rng: &mut R) {
        fill_with(self.storage_mut(), || ElT::sample_normal(rng));
    }
}
