//! Driver loops and loop guards shared by the samplers.

use indicatif::{ProgressBar, ProgressStyle};
use log::{trace, warn};

use crate::chain::Chain;
use crate::error::{McmcError, Result};
use crate::rng::RandomSource;

/// A Markov transition kernel over states of type `S`.
pub trait Transition<S> {
    /// Draws the next state given the current one.
    fn transition<R: RandomSource + ?Sized>(&self, state: &S, rng: &mut R) -> Result<S>;

    /// Checks an initial state before any randomness is consumed.
    fn validate(&self, _state: &S) -> Result<()> {
        Ok(())
    }
}

/// Bounds on the sampler's inner retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Maximum draws in the rejection branch of the maximal coupling.
    pub max_coupling_attempts: usize,
    /// Maximum angle proposals in one elliptical slice transition.
    pub max_slice_attempts: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_coupling_attempts: 100_000,
            max_slice_attempts: 1_000,
        }
    }
}

impl SamplerConfig {
    pub fn set_max_coupling_attempts(mut self, attempts: usize) -> Self {
        self.max_coupling_attempts = attempts;
        self
    }

    pub fn set_max_slice_attempts(mut self, attempts: usize) -> Self {
        self.max_slice_attempts = attempts;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_coupling_attempts == 0 || self.max_slice_attempts == 0 {
            return Err(McmcError::InvalidParameter(format!(
                "loop bounds must be positive, got {self:?}"
            )));
        }
        Ok(())
    }
}

/**
Runs `attempt` until it yields a value, at most `max_attempts` times.

`attempt` receives the zero-based attempt index and returns `Ok(None)` to ask for another
try. Errors from `attempt` are propagated immediately.

```rust
use couple_mcmc::core::retry_bounded;

let v = retry_bounded("countdown", 10, |i| Ok((i == 3).then_some(i))).unwrap();
assert_eq!(v, 3);
assert!(retry_bounded("never", 5, |_| Ok(None::<()>)).is_err());
```
*/
pub fn retry_bounded<T, F>(routine: &'static str, max_attempts: usize, mut attempt: F) -> Result<T>
where
    F: FnMut(usize) -> Result<Option<T>>,
{
    for i in 0..max_attempts {
        if let Some(value) = attempt(i)? {
            trace!("{routine} accepted after {} attempt(s)", i + 1);
            return Ok(value);
        }
    }
    warn!("{routine} gave up after {max_attempts} attempts");
    Err(McmcError::LoopBoundExceeded {
        routine,
        attempts: max_attempts,
    })
}

/// Applies `kernel` `n_iter` times starting from `init`.
///
/// The returned chain has `n_iter + 1` states, `init` first. A failing transition aborts
/// the run and the partial chain is dropped.
pub fn run_chain<S, K, R>(kernel: &K, init: S, n_iter: usize, rng: &mut R) -> Result<Chain<S>>
where
    K: Transition<S> + ?Sized,
    R: RandomSource + ?Sized,
{
    kernel.validate(&init)?;
    let mut chain = Chain::with_capacity(init, n_iter);
    for _ in 0..n_iter {
        let next = kernel.transition(chain.last(), rng)?;
        chain.push(next);
    }
    Ok(chain)
}

/// Like [`run_chain`], ticking `pb` once per transition.
pub fn run_chain_with_progress<S, K, R>(
    kernel: &K,
    init: S,
    n_iter: usize,
    rng: &mut R,
    pb: &ProgressBar,
) -> Result<Chain<S>>
where
    K: Transition<S> + ?Sized,
    R: RandomSource + ?Sized,
{
    kernel.validate(&init)?;
    pb.set_length(n_iter as u64);
    let mut chain = Chain::with_capacity(init, n_iter);
    for _ in 0..n_iter {
        let next = kernel.transition(chain.last(), rng)?;
        chain.push(next);
        pb.inc(1);
    }
    pb.finish_with_message("Done!");
    Ok(chain)
}

/// A progress bar in the crate's house style.
pub fn progress_bar(n_iter: usize, prefix: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");
    let pb = ProgressBar::new(n_iter as u64);
    pb.set_prefix(prefix.to_string());
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RandomStream;

    /// Adds one to the state, failing once it reaches `fail_at`.
    struct Counter {
        fail_at: u32,
    }

    impl Transition<u32> for Counter {
        fn transition<R: RandomSource + ?Sized>(&self, state: &u32, _rng: &mut R) -> Result<u32> {
            if *state == self.fail_at {
                Err(McmcError::Numeric("boom".into()))
            } else {
                Ok(state + 1)
            }
        }

        fn validate(&self, state: &u32) -> Result<()> {
            if *state > self.fail_at {
                Err(McmcError::InvalidParameter("past the end".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn run_chain_has_n_plus_one_states() {
        let mut rng = RandomStream::new(0);
        let chain = run_chain(&Counter { fail_at: 100 }, 0, 5, &mut rng).unwrap();
        assert_eq!(chain.as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn run_chain_zero_iterations() {
        let mut rng = RandomStream::new(0);
        let chain = run_chain(&Counter { fail_at: 100 }, 7, 0, &mut rng).unwrap();
        assert_eq!(chain.as_slice(), &[7]);
    }

    #[test]
    fn run_chain_propagates_failure() {
        let mut rng = RandomStream::new(0);
        let err = run_chain(&Counter { fail_at: 2 }, 0, 5, &mut rng).unwrap_err();
        assert!(matches!(err, McmcError::Numeric(_)));
        let err = run_chain(&Counter { fail_at: 2 }, 3, 5, &mut rng).unwrap_err();
        assert!(matches!(err, McmcError::InvalidParameter(_)));
    }

    #[test]
    fn run_chain_with_progress_matches_plain_run() {
        let mut rng = RandomStream::new(0);
        let pb = ProgressBar::hidden();
        let chain = run_chain_with_progress(&Counter { fail_at: 100 }, 0, 3, &mut rng, &pb).unwrap();
        assert_eq!(chain.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn retry_bounded_counts_attempts() {
        let mut calls = 0;
        let err = retry_bounded("stubborn", 4, |_| {
            calls += 1;
            Ok(None::<u8>)
        })
        .unwrap_err();
        assert_eq!(calls, 4);
        assert!(matches!(
            err,
            McmcError::LoopBoundExceeded {
                routine: "stubborn",
                attempts: 4
            }
        ));
    }

    #[test]
    fn retry_bounded_propagates_errors() {
        let err = retry_bounded("failing", 4, |_| {
            Err::<Option<u8>, _>(McmcError::Numeric("nan".into()))
        })
        .unwrap_err();
        assert!(matches!(err, McmcError::Numeric(_)));
    }

    #[test]
    fn config_defaults_and_builders() {
        let config = SamplerConfig::default();
        assert!(config.validate().is_ok());
        let config = config.set_max_coupling_attempts(5).set_max_slice_attempts(7);
        assert_eq!(config.max_coupling_attempts, 5);
        assert_eq!(config.max_slice_attempts, 7);
        assert!(config.set_max_slice_attempts(0).validate().is_err());
    }
}
