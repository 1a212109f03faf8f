/*!
Sources of randomness injected into every sampler call.

All samplers take `&mut impl RandomSource` instead of reaching for a global generator, so a
run is reproducible from its seed and independent chains only need independently seeded
streams.

```rust
use couple_mcmc::rng::{RandomSource, RandomStream};

let mut a = RandomStream::new(42);
let mut b = RandomStream::new(42);
assert_eq!(a.standard_normal(), b.standard_normal());

let u = a.uniform01();
assert!((0.0..1.0).contains(&u));
```
*/

use ndarray::Array1;
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{McmcError, Result};

/// Primitive draws every sampler needs.
pub trait RandomSource {
    /// A draw from Uniform(0, 1). Implementations may return exactly `0.0`.
    fn uniform01(&mut self) -> f64;

    /// A draw from N(0, 1).
    fn standard_normal(&mut self) -> f64;

    /// `dim` independent N(0, 1) draws.
    fn standard_normal_vec(&mut self, dim: usize) -> Array1<f64> {
        Array1::from_shape_fn(dim, |_| self.standard_normal())
    }

    /// A draw from N(mean, std²).
    fn normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.standard_normal()
    }

    /// A draw from Uniform(low, high).
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform01()
    }

    /// `ln(u)` for `u ~ Uniform(0, 1)`, failing on the degenerate draw `u == 0`.
    fn log_uniform(&mut self) -> Result<f64> {
        let u = self.uniform01();
        if u > 0.0 {
            Ok(u.ln())
        } else {
            Err(McmcError::Numeric(format!(
                "log of degenerate uniform draw {u}"
            )))
        }
    }
}

/// A seedable stream backed by [`SmallRng`].
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    rng: SmallRng,
}

impl RandomStream {
    /// Creates a stream from a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Creates a stream from a random seed. The seed stays retrievable through [`Self::seed`].
    pub fn from_entropy() -> Self {
        Self::new(thread_rng().gen::<u64>())
    }

    /// Returns a new stream seeded with `seed`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    /// Restarts the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// The seed this stream was last (re)started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives an independent stream for chain `index`, seeded with `seed + index`.
    pub fn split(&self, index: u64) -> Self {
        Self::new(self.seed.wrapping_add(index))
    }
}

impl RandomSource for RandomStream {
    fn uniform01(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn standard_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}
