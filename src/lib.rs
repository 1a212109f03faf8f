/*!
Metropolis–Hastings, maximally coupled Metropolis–Hastings and elliptical slice sampling.

All samplers draw their randomness from a caller-owned [`rng::RandomSource`], so a fixed
seed reproduces a chain exactly.

```rust
use couple_mcmc::coupling::CoupledMetropolisSampler;
use couple_mcmc::rng::RandomStream;

let sampler = CoupledMetropolisSampler::new(|x: f64| 0.5 * x * x, 1.0)?;
let chain = sampler.sample(-3.0, 3.0, 2_000, &mut RandomStream::new(7))?;
assert_eq!(chain.len(), 2_001);
# Ok::<(), couple_mcmc::error::McmcError>(())
```
*/

pub mod chain;
pub mod core;
pub mod coupling;
pub mod elliptical_slice;
pub mod error;
pub mod metropolis;
pub mod rng;
pub mod stats;
pub mod target;
