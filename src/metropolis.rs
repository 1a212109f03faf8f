/*!
# Random-Walk Metropolis Sampler

One-dimensional Metropolis–Hastings with a Gaussian random-walk proposal. The target is given
through its energy `U(x) = -log p(x) + const`; because the proposal kernel is symmetric, the
log acceptance ratio reduces to `U(x) - U(x')`.

## Example Usage

```rust
use couple_mcmc::metropolis::MetropolisSampler;
use couple_mcmc::rng::RandomStream;

// U(x) = x² is the energy of N(0, 0.5).
let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
let mut rng = RandomStream::new(42);
let chain = mh.sample(0.0, 1_000, &mut rng).unwrap();

assert_eq!(chain.len(), 1_001);
assert_eq!(chain[0], 0.0);
assert!(chain.iter().all(|x| x.is_finite()));
```
*/

use log::debug;

use crate::chain::Chain;
use crate::core::{progress_bar, run_chain, run_chain_with_progress, Transition};
use crate::error::{check_finite, check_positive, Result};
use crate::rng::RandomSource;
use crate::target::{energy_drop, Energy};

/// A random-walk Metropolis sampler over scalar states.
#[derive(Debug, Clone, PartialEq)]
pub struct MetropolisSampler<U> {
    /// Energy of the target distribution.
    pub energy: U,
    /// Standard deviation of the Gaussian proposal.
    step_size: f64,
}

impl<U: Energy> MetropolisSampler<U> {
    /// Creates a sampler, rejecting a non-finite or non-positive `step_size`.
    pub fn new(energy: U, step_size: f64) -> Result<Self> {
        check_positive("step_size", step_size)?;
        Ok(Self { energy, step_size })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /**
    Performs one Metropolis update from `x`.

    Draws `x' = x + N(0, v²)` and then `log u = ln U(0, 1)`, and returns `x'` iff
    `log u < U(x) - U(x')`; otherwise returns `x`.

    # Errors
    [`McmcError::Numeric`](crate::error::McmcError::Numeric) if an energy is NaN or `-inf`,
    if both energies are `+inf`, or if the uniform draw is exactly 0.
    */
    pub fn step<R: RandomSource + ?Sized>(&self, x: f64, rng: &mut R) -> Result<f64> {
        metropolis_update(&self.energy, x, self.step_size, rng)
    }

    /// Runs `n_iter` steps from `x0`; the chain has `n_iter + 1` states.
    pub fn sample<R: RandomSource + ?Sized>(
        &self,
        x0: f64,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<Chain<f64>> {
        let chain = run_chain(self, x0, n_iter, rng)?;
        log_summary(&chain);
        Ok(chain)
    }

    /// Same as [`Self::sample`], with a progress bar.
    pub fn sample_progress<R: RandomSource + ?Sized>(
        &self,
        x0: f64,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<Chain<f64>> {
        let pb = progress_bar(n_iter, "Metropolis");
        let chain = run_chain_with_progress(self, x0, n_iter, rng, &pb)?;
        log_summary(&chain);
        Ok(chain)
    }
}

impl<U: Energy> Transition<f64> for MetropolisSampler<U> {
    fn transition<R: RandomSource + ?Sized>(&self, state: &f64, rng: &mut R) -> Result<f64> {
        self.step(*state, rng)
    }

    fn validate(&self, state: &f64) -> Result<()> {
        check_finite("initial state", [*state].iter())
    }
}

fn log_summary(chain: &Chain<f64>) {
    debug!(
        "metropolis: {} iterations, acceptance rate {:.3}",
        chain.n_iter(),
        chain.acceptance_rate()
    );
}

/// One Metropolis update of `x` under `energy` with proposal standard deviation `step_size`.
///
/// Free-function form of [`MetropolisSampler::step`] for one-off calls.
pub fn metropolis_step<U, R>(energy: &U, x: f64, step_size: f64, rng: &mut R) -> Result<f64>
where
    U: Energy + ?Sized,
    R: RandomSource + ?Sized,
{
    check_positive("step_size", step_size)?;
    metropolis_update(energy, x, step_size, rng)
}

fn metropolis_update<U, R>(energy: &U, x: f64, step_size: f64, rng: &mut R) -> Result<f64>
where
    U: Energy + ?Sized,
    R: RandomSource + ?Sized,
{
    let proposal = rng.normal(x, step_size);
    let log_u = rng.log_uniform()?;
    if log_u < energy_drop(energy, x, proposal)? {
        Ok(proposal)
    } else {
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McmcError;
    use crate::rng::testing::Scripted;
    use crate::rng::RandomStream;
    use crate::target::GaussianEnergy;
    use approx::assert_abs_diff_eq;

    const SEED: u64 = 42;

    #[test]
    fn zero_iterations_returns_initial_state() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
        let chain = mh.sample(3.5, 0, &mut RandomStream::new(SEED)).unwrap();
        assert_eq!(chain.as_slice(), &[3.5]);
    }

    #[test]
    fn quadratic_energy_scenario() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
        let chain = mh.sample(0.0, 1000, &mut RandomStream::new(SEED)).unwrap();
        assert_eq!(chain.len(), 1001);
        assert_eq!(chain[0], 0.0);
        assert!(chain.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn every_state_is_previous_or_its_proposal() {
        let step_size = 0.8;
        let mh = MetropolisSampler::new(|x: f64| x * x, step_size).unwrap();
        let chain = mh.sample(1.0, 500, &mut RandomStream::new(SEED)).unwrap();

        // Replay the same stream in the order the sampler consumes it.
        let mut replay = RandomStream::new(SEED);
        for w in chain.as_slice().windows(2) {
            let proposal = w[0] + step_size * replay.standard_normal();
            replay.uniform01();
            assert!(
                w[1] == w[0] || w[1] == proposal,
                "state {} is neither {} nor its proposal {}",
                w[1],
                w[0],
                proposal
            );
        }
    }

    #[test]
    fn accept_and_reject_follow_the_energy_drop() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();

        // proposal 1.0: drop = -1 < ln 0.5, rejected
        let mut rng = Scripted::new(vec![0.5], vec![1.0]);
        assert_eq!(mh.step(0.0, &mut rng).unwrap(), 0.0);

        // proposal -0.1: drop = -0.01 > ln 0.5, accepted
        let mut rng = Scripted::new(vec![0.5], vec![-0.1]);
        assert_eq!(mh.step(0.0, &mut rng).unwrap(), -0.1);

        // downhill moves are always accepted
        let mut rng = Scripted::new(vec![0.999], vec![-1.0]);
        assert_eq!(mh.step(2.0, &mut rng).unwrap(), 1.0);
    }

    #[test]
    fn converges_to_gaussian_moments() {
        const N_ITER: usize = 200_000;
        const BURNIN: usize = 2_000;
        let target = GaussianEnergy::new(2.0, 0.5).unwrap();
        let mh = MetropolisSampler::new(target, 1.0).unwrap();
        let chain = mh.sample(0.0, N_ITER, &mut RandomStream::new(SEED)).unwrap();

        let kept = &chain.as_slice()[BURNIN..];
        let n = kept.len() as f64;
        let mean = kept.iter().sum::<f64>() / n;
        let var = kept.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert_abs_diff_eq!(mean, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(var, 0.5, epsilon = 0.05);
    }

    #[test]
    fn rejects_invalid_step_size_without_drawing() {
        for v in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                MetropolisSampler::new(|x: f64| x * x, v),
                Err(McmcError::InvalidParameter(_))
            ));
        }
        let mut rng = Scripted::new(vec![0.5], vec![1.0]);
        assert!(metropolis_step(&|x: f64| x * x, 0.0, 0.0, &mut rng).is_err());
        assert!(metropolis_step(&|x: f64| x * x, 0.0, 1.0, &mut rng).is_ok());
    }

    #[test]
    fn rejects_non_finite_initial_state() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
        let err = mh.sample(f64::NAN, 10, &mut RandomStream::new(SEED)).unwrap_err();
        assert!(matches!(err, McmcError::InvalidParameter(_)));
    }

    #[test]
    fn nan_energy_aborts_the_run() {
        let mh = MetropolisSampler::new(|x: f64| if x > 0.5 { f64::NAN } else { 0.0 }, 1.0)
            .unwrap();
        let err = mh.sample(0.0, 10_000, &mut RandomStream::new(SEED)).unwrap_err();
        assert!(matches!(err, McmcError::Numeric(_)));
    }

    #[test]
    fn degenerate_uniform_draw_is_numeric_error() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
        let mut rng = Scripted::new(vec![0.0], vec![0.3]);
        assert!(matches!(mh.step(0.0, &mut rng), Err(McmcError::Numeric(_))));
    }

    #[test]
    fn infinite_energy_region_is_never_entered() {
        let half_line = |x: f64| if x > 0.0 { f64::INFINITY } else { x * x };
        let mh = MetropolisSampler::new(half_line, 1.0).unwrap();
        let chain = mh.sample(-1.0, 5_000, &mut RandomStream::new(SEED)).unwrap();
        assert!(chain.iter().all(|&x| x <= 0.0));
    }

    #[test]
    fn progress_run_matches_plain_run() {
        let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
        let plain = mh.sample(0.0, 200, &mut RandomStream::new(SEED)).unwrap();
        let with_bar = mh
            .sample_progress(0.0, 200, &mut RandomStream::new(SEED))
            .unwrap();
        assert_eq!(plain, with_bar);
    }
}
