use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Supplies the annual return draws a trial consumes, one per simulated year.
pub trait ReturnSource {
    fn next_return(&mut self, mean: f64, std_dev: f64) -> f64;
}

/// Normally distributed returns drawn from any `rand` generator.
#[derive(Debug, Clone)]
pub struct NormalReturns<R> {
    rng: R,
}

impl<R: Rng> NormalReturns<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl NormalReturns<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Independent stream for one trial of a seeded run.
    pub fn for_trial(base_seed: u64, trial_index: u32) -> Self {
        Self::seeded(derive_seed(base_seed, trial_index))
    }
}

impl NormalReturns<rand::rngs::ThreadRng> {
    pub fn unseeded() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> ReturnSource for NormalReturns<R> {
    fn next_return(&mut self, mean: f64, std_dev: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + std_dev * z
    }
}

pub(crate) fn derive_seed(base_seed: u64, trial_index: u32) -> u64 {
    let mixed = base_seed ^ ((trial_index as u64) << 32) ^ trial_index as u64;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
