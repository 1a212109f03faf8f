/*!
# Coupled Metropolis Sampler

Advances two random-walk Metropolis chains `x` and `y` jointly. Their Gaussian proposals are
drawn from a maximal coupling, and both accept/reject decisions share one uniform draw, so
once the chains meet they stay together forever. The meeting time bounds how far either chain
still is from stationarity, which makes it a convergence diagnostic.

Each chain on its own is an ordinary Metropolis chain: the coupling only changes the joint law.

```rust
use couple_mcmc::coupling::CoupledMetropolisSampler;
use couple_mcmc::rng::RandomStream;

let sampler = CoupledMetropolisSampler::new(|x: f64| 0.5 * x * x, 1.0).unwrap();
let chain = sampler.sample(-3.0, 3.0, 1_000, &mut RandomStream::new(42)).unwrap();

assert_eq!(chain.len(), 1_001);
assert_eq!(chain[0], (-3.0, 3.0));
if let Some(tau) = chain.meeting_time() {
    assert!(chain.iter().skip(tau).all(|(x, y)| x == y));
}
```
*/

use log::debug;

use crate::chain::CoupledChain;
use crate::core::{
    progress_bar, retry_bounded, run_chain, run_chain_with_progress, SamplerConfig, Transition,
};
use crate::error::{check_finite, check_positive, Result};
use crate::rng::RandomSource;
use crate::target::{energy_drop, Energy};

/// Outcome of one draw from the maximal coupling of two Gaussians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoupledProposal {
    /// Both proposals coincide.
    Common(f64),
    /// The proposals differ; `attempts` counts draws in the rejection loop.
    Distinct { x: f64, y: f64, attempts: usize },
}

impl CoupledProposal {
    pub fn pair(&self) -> (f64, f64) {
        match *self {
            CoupledProposal::Common(p) => (p, p),
            CoupledProposal::Distinct { x, y, .. } => (x, y),
        }
    }

    pub fn is_common(&self) -> bool {
        matches!(self, CoupledProposal::Common(_))
    }
}

/**
Draws `(px, py)` from the maximal coupling of N(m1, v²) and N(m2, v²).

`px ~ N(m1, v²)` is kept for both components with probability `min(1, q2(px) / q1(px))`.
Otherwise `py` is drawn from N(m2, v²) until it lands where `q2` exceeds `q1` by the
log-uniform margin, and `py != px` is enforced. The probability that the two proposals
coincide is the overlap `2 Φ(-|m1 - m2| / 2v)`, the largest any coupling can achieve.

If `m1 == m2` the common proposal is returned without a uniform draw, for every `v`.

# Errors
- [`McmcError::InvalidParameter`](crate::error::McmcError::InvalidParameter) if `v` is not a
  positive finite number.
- [`McmcError::LoopBoundExceeded`](crate::error::McmcError::LoopBoundExceeded) if the
  rejection loop needs more than `max_attempts` draws.
- [`McmcError::Numeric`](crate::error::McmcError::Numeric) on a degenerate uniform draw.
*/
pub fn couple_gaussian_proposal<R: RandomSource + ?Sized>(
    m1: f64,
    m2: f64,
    v: f64,
    max_attempts: usize,
    rng: &mut R,
) -> Result<CoupledProposal> {
    check_positive("step_size", v)?;
    maximal_coupling(m1, m2, v, max_attempts, rng)
}

fn maximal_coupling<R: RandomSource + ?Sized>(
    m1: f64,
    m2: f64,
    v: f64,
    max_attempts: usize,
    rng: &mut R,
) -> Result<CoupledProposal> {
    let px = rng.normal(m1, v);
    if m1 == m2 {
        return Ok(CoupledProposal::Common(px));
    }
    let log_w = rng.log_uniform()?;
    if log_w <= potential_gap(px, m1, m2, v) {
        return Ok(CoupledProposal::Common(px));
    }

    let mut attempts = 0;
    let py = retry_bounded("maximal coupling", max_attempts, |_| {
        attempts += 1;
        let py = rng.normal(m2, v);
        let log_w = rng.log_uniform()?;
        let accepted =
            log_w > potential_gap(py, m2, m1, v) && py != px;
        Ok(accepted.then_some(py))
    })?;
    Ok(CoupledProposal::Distinct {
        x: px,
        y: py,
        attempts,
    })
}

/// `φ(x, a) - φ(x, b)` with `φ(x, m) = (x - m)² / 2v²`, factored so that a large `v`
/// does not overflow the squares.
fn potential_gap(x: f64, a: f64, b: f64, v: f64) -> f64 {
    0.5 * ((b - a) / v) * ((2.0 * x - a - b) / v)
}

fn log_summary(chain: &CoupledChain) {
    debug!(
        "coupled metropolis: {} iterations, meeting time {:?}",
        chain.n_iter(),
        chain.meeting_time()
    );
}

/// Two random-walk Metropolis chains with maximally coupled proposals and a shared
/// acceptance draw.
#[derive(Debug, Clone, PartialEq)]
pub struct CoupledMetropolisSampler<U> {
    /// Energy of the target distribution.
    pub energy: U,
    step_size: f64,
    config: SamplerConfig,
}

impl<U: Energy> CoupledMetropolisSampler<U> {
    /// Creates a sampler, rejecting a non-finite or non-positive `step_size`.
    pub fn new(energy: U, step_size: f64) -> Result<Self> {
        check_positive("step_size", step_size)?;
        Ok(Self {
            energy,
            step_size,
            config: SamplerConfig::default(),
        })
    }

    /// Replaces the loop bounds.
    pub fn set_config(mut self, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draws a coupled proposal centred at the current states.
    pub fn propose<R: RandomSource + ?Sized>(
        &self,
        x: f64,
        y: f64,
        rng: &mut R,
    ) -> Result<CoupledProposal> {
        maximal_coupling(x, y, self.step_size, self.config.max_coupling_attempts, rng)
    }

    /**
    Advances both chains by one coupled Metropolis step.

    One log-uniform `log_w` decides both moves: `x` moves iff `log_w < U(x) - U(px)` and
    `y` moves iff `log_w < U(y) - U(py)`.
    */
    pub fn coupled_step<R: RandomSource + ?Sized>(
        &self,
        x: f64,
        y: f64,
        rng: &mut R,
    ) -> Result<(f64, f64)> {
        let (px, py) = self.propose(x, y, rng)?.pair();
        let log_w = rng.log_uniform()?;
        let next_x = if log_w < energy_drop(&self.energy, x, px)? {
            px
        } else {
            x
        };
        let next_y = if log_w < energy_drop(&self.energy, y, py)? {
            py
        } else {
            y
        };
        Ok((next_x, next_y))
    }

    /// Runs `n_iter` coupled steps from `(x0, y0)`, one pair per iteration.
    ///
    /// The run does not stop when the chains meet; see [`CoupledChain::meeting_time`].
    pub fn sample<R: RandomSource + ?Sized>(
        &self,
        x0: f64,
        y0: f64,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<CoupledChain> {
        let chain = run_chain(self, (x0, y0), n_iter, rng)?;
        log_summary(&chain);
        Ok(chain)
    }

    /// Same as [`Self::sample`], with a progress bar.
    pub fn sample_progress<R: RandomSource + ?Sized>(
        &self,
        x0: f64,
        y0: f64,
        n_iter: usize,
        rng: &mut R,
    ) -> Result<CoupledChain> {
        let pb = progress_bar(n_iter, "Coupled");
        let chain = run_chain_with_progress(self, (x0, y0), n_iter, rng, &pb)?;
        log_summary(&chain);
        Ok(chain)
    }

    /// Steps from `(x0, y0)` until the chains meet, giving up after `max_iter` steps.
    ///
    /// Consumes the stream exactly like [`Self::sample`] up to the meeting time.
    pub fn meeting_time<R: RandomSource + ?Sized>(
        &self,
        x0: f64,
        y0: f64,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<Option<usize>> {
        self.validate(&(x0, y0))?;
        let (mut x, mut y) = (x0, y0);
        for t in 0..=max_iter {
            if x == y {
                return Ok(Some(t));
            }
            if t < max_iter {
                (x, y) = self.coupled_step(x, y, rng)?;
            }
        }
        Ok(None)
    }
}

impl<U: Energy> Transition<(f64, f64)> for CoupledMetropolisSampler<U> {
    fn transition<R: RandomSource + ?Sized>(
        &self,
        state: &(f64, f64),
        rng: &mut R,
    ) -> Result<(f64, f64)> {
        self.coupled_step(state.0, state.1, rng)
    }

    fn validate(&self, state: &(f64, f64)) -> Result<()> {
        check_finite("initial state", [state.0, state.1].iter())
    }
}
