/*!
# Elliptical Slice Sampler

Elliptical slice sampling (Murray, Adams & MacKay, 2010) for a log-likelihood `L` under a
Gaussian prior. Each transition draws an auxiliary Gaussian vector `w`, a slice height under
`L(x)`, and then searches the ellipse `x cos θ + w sin θ` for an angle above the slice,
shrinking the angular bracket towards `θ = 0` (the current state) after every miss. The
search needs no step size and always ends with a move.

With the default standard-normal prior the chain leaves `N(0, I) × L` invariant; use
[`EllipticalSliceSampler::with_prior`] for another Gaussian prior. A Gaussian likelihood
N(m, V) under the default prior is therefore sampled as the posterior N((I + V⁻¹)⁻¹ V⁻¹ m,
(I + V⁻¹)⁻¹), e.g. N(0, I/2) for `m = 0, V = I`. To draw from N(m, V) itself, pass it as the
prior and use a constant likelihood, e.g. a `fn flat(_: ArrayView1<f64>) -> f64` returning 0.

```rust
use couple_mcmc::elliptical_slice::EllipticalSliceSampler;
use couple_mcmc::rng::RandomStream;
use couple_mcmc::target::GaussianLikelihood;
use ndarray::{arr1, arr2};

let likelihood = GaussianLikelihood::new(
    arr1(&[0.0, 0.0]),
    arr2(&[[1.0, 0.0], [0.0, 1.0]]),
).unwrap();
let ess = EllipticalSliceSampler::new(likelihood);
let chain = ess.sample(arr1(&[1.0, -1.0]), 100, &mut RandomStream::new(42)).unwrap();

assert_eq!(chain.len(), 101);
assert_eq!(chain.to_array2().dim(), (101, 2));
```
*/

use std::f64::consts::PI;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1};

use crate::chain::Chain;
use crate::core::{
    progress_bar, retry_bounded, run_chain, run_chain_with_progress, SamplerConfig, Transition,
};
use crate::error::{check_finite, McmcError, Result};
use crate::rng::RandomSource;
use crate::target::{check_dim, CovarianceFactor, LogLikelihood};

/// Gaussian prior N(mean, L Lᵀ) defining the ellipses.
#[derive(Debug, Clone, PartialEq)]
struct EllipsePrior {
    mean: Array1<f64>,
    lower: Array2<f64>,
}

/// Result of one elliptical slice transition.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticalMove {
    /// The new state.
    pub state: Array1<f64>,
    /// `L(state)`, always strictly above `threshold`.
    pub log_likelihood: f64,
    /// The slice height `L(x) + ln u`.
    pub threshold: f64,
    /// Angles tried, including the accepted one.
    pub attempts: usize,
}

/// Elliptical slice sampler over vector states.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticalSliceSampler<L> {
    pub likelihood: L,
    prior: Option<EllipsePrior>,
    config: SamplerConfig,
}

impl<L: LogLikelihood> EllipticalSliceSampler<L> {
    /// Creates a sampler with a standard-normal prior.
    pub fn new(likelihood: L) -> Self {
        Self {
            likelihood,
            prior: None,
            config: SamplerConfig::default(),
        }
    }

    /// Uses the prior N(mean, cov) instead of N(0, I).
    ///
    /// # Errors
    /// Fails like [`GaussianLikelihood::new`](crate::target::GaussianLikelihood::new) on an
    /// invalid covariance, and with
    /// [`McmcError::InvalidParameter`] if the dimension disagrees with the likelihood.
    pub fn with_prior(mut self, mean: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
        check_finite("prior mean", mean.iter())?;
        if let Some(d) = self.likelihood.dim() {
            check_dim("prior mean", mean.len(), d)?;
        }
        let factor = CovarianceFactor::new(&cov, mean.len())?;
        self.prior = Some(EllipsePrior {
            mean,
            lower: factor.lower,
        });
        Ok(self)
    }

    /// Replaces the loop bounds.
    pub fn set_config(mut self, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn check_state(&self, x: ArrayView1<f64>) -> Result<()> {
        if let Some(d) = self.likelihood.dim() {
            check_dim("state", x.len(), d)?;
        }
        if let Some(prior) = &self.prior {
            check_dim("state", x.len(), prior.mean.len())?;
        }
        check_finite("state", x.iter())
    }

    /// The point at angle `theta` on the ellipse through `x` and `w`.
    fn ellipse_point(&self, x: ArrayView1<f64>, w: &Array1<f64>, theta: f64) -> Array1<f64> {
        let (sin, cos) = theta.sin_cos();
        match &self.prior {
            None => &x * cos + w * sin,
            Some(prior) => &prior.mean + &((&x - &prior.mean) * cos) + w * sin,
        }
    }

    /**
    One elliptical slice transition from `x`, with its bookkeeping.

    Draws `w`, then the slice height `L(x) + ln u`, then `θ ~ U(0, 2π)` with bracket
    `(θ - 2π, θ)`. A rejected angle replaces the bracket end on its side of zero and a new
    angle is drawn from the shrunken bracket.

    # Errors
    - [`McmcError::InvalidParameter`] if `x` has the wrong dimension or non-finite entries.
    - [`McmcError::Numeric`] if `L(x)` is not finite or a likelihood evaluation fails.
    - [`McmcError::LoopBoundExceeded`] after `max_slice_attempts` rejected angles.
    */
    pub fn transition_detailed<R: RandomSource + ?Sized>(
        &self,
        x: ArrayView1<f64>,
        rng: &mut R,
    ) -> Result<EllipticalMove> {
        self.check_state(x)?;
        let log_p_x = self.likelihood.log_likelihood(x)?;
        if !log_p_x.is_finite() {
            return Err(McmcError::Numeric(format!(
                "log-likelihood of the current state is {log_p_x}"
            )));
        }

        let z = rng.standard_normal_vec(x.len());
        let w = match &self.prior {
            None => z,
            Some(prior) => prior.lower.dot(&z),
        };
        let threshold = log_p_x + rng.log_uniform()?;

        let mut theta = rng.uniform(0.0, 2.0 * PI);
        let (mut theta_min, mut theta_max) = (theta - 2.0 * PI, theta);
        let mut attempts = 0;
        let (state, log_likelihood) =
            retry_bounded("elliptical slice shrinkage", self.config.max_slice_attempts, |_| {
                attempts += 1;
                let proposal = self.ellipse_point(x, &w, theta);
                let lp = self.likelihood.log_likelihood(proposal.view())?;
                if lp > threshold {
                    return Ok(Some((proposal, lp)));
                }
                if theta < 0.0 {
                    theta_min = theta;
                } else {
                    theta_max = theta;
                }
                theta = rng.uniform(theta_min, theta_max);
                Ok(None)
            })?;

        debug_assert!(log_likelihood > threshold);
        Ok(EllipticalMove {
            state,
            log_likelihood,
            threshold,
            attempts,
        })
    }

    /// One elliptical slice transition from `x`.
    pub fn transition<R: RandomSource + ?Sized>(
        &self,
        x: ArrayView1<f64>,
        rng: &mut R,
    ) -> Result<Array1<f64>> {
        self.transition_detailed(x, rng).map(|m| m.state)
    }

    /// Runs `n_iter` transitions from `x0`; the chain has `n_iter + 1` states.
    pub fn sample<R: RandomSource + ?Sized>(
        &self,
        x0: Array1<f64>,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<Chain<Array1<f64>>> {
        let chain = run_chain(self, x0, n_iter, rng)?;
        log_summary(&chain);
        Ok(chain)
    }

    /// Same as [`Self::sample`], with a progress bar.
    pub fn sample_progress<R: RandomSource + ?Sized>(
        &self,
        x0: Array1<f64>,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<Chain<Array1<f64>>> {
        let pb = progress_bar(n_iter, "Elliptical slice");
        let chain = run_chain_with_progress(self, x0, n_iter, rng, &pb)?;
        log_summary(&chain);
        Ok(chain)
    }
}

fn log_summary(chain: &Chain<Array1<f64>>) {
    debug!(
        "elliptical slice: {} iterations in dimension {}",
        chain.n_iter(),
        chain.first().len()
    );
}

impl<L: LogLikelihood> Transition<Array1<f64>> for EllipticalSliceSampler<L> {
    fn transition<R: RandomSource + ?Sized>(
        &self,
        state: &Array1<f64>,
        rng: &mut R,
    ) -> Result<Array1<f64>> {
        EllipticalSliceSampler::transition(self, state.view(), rng)
    }

    fn validate(&self, state: &Array1<f64>) -> Result<()> {
        self.check_state(state.view())
    }
}
