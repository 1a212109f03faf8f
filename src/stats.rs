//! Summary statistics and convergence diagnostics for finished chains.

use ndarray::prelude::*;
use ndarray_stats::CorrelationExt;
use num_traits::{Float, FromPrimitive};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::chain::Chain;
use crate::error::{McmcError, Result};

/// Moments and acceptance rate of a scalar chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    pub n: usize,
    pub mean: f64,
    /// Unbiased sample variance.
    pub variance: f64,
    pub acceptance_rate: f64,
}

/// Summarizes `chain`, skipping the first `discard` states as burn-in.
pub fn summarize(chain: &Chain<f64>, discard: usize) -> Result<ChainSummary> {
    let kept = chain.as_slice().get(discard..).unwrap_or(&[]);
    let mean = sample_mean(kept).ok_or_else(|| empty_input("summary"))?;
    let variance = sample_variance(kept).ok_or_else(|| empty_input("summary"))?;
    Ok(ChainSummary {
        n: kept.len(),
        mean,
        variance,
        acceptance_rate: chain.acceptance_rate(),
    })
}

fn empty_input(what: &str) -> McmcError {
    McmcError::InvalidParameter(format!("{what} needs more samples"))
}

/// Arithmetic mean, `None` for an empty slice.
pub fn sample_mean<T: Float + FromPrimitive>(xs: &[T]) -> Option<T> {
    if xs.is_empty() {
        return None;
    }
    let sum = xs.iter().fold(T::zero(), |acc, &x| acc + x);
    Some(sum / T::from_usize(xs.len())?)
}

/// Unbiased sample variance, `None` for fewer than two values.
pub fn sample_variance<T: Float + FromPrimitive>(xs: &[T]) -> Option<T> {
    if xs.len() < 2 {
        return None;
    }
    let mean = sample_mean(xs)?;
    let ss = xs.iter().fold(T::zero(), |acc, &x| acc + (x - mean) * (x - mean));
    Some(ss / T::from_usize(xs.len() - 1)?)
}

/// Column means and unbiased covariance of an `(n, d)` sample matrix.
pub fn mean_and_cov(samples: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    if samples.nrows() < 2 {
        return Err(empty_input("covariance"));
    }
    let mean = samples
        .mean_axis(Axis(0))
        .ok_or_else(|| empty_input("covariance"))?;
    let cov = samples
        .t()
        .cov(1.0)
        .map_err(|_| empty_input("covariance"))?;
    Ok((mean, cov))
}

/**
Gelman–Rubin potential scale reduction factor of several scalar chains of equal length.

Values close to 1 indicate the chains explore the same distribution.

# Errors
[`McmcError::InvalidParameter`] for fewer than two chains, fewer than two states per chain,
chains of different lengths, or zero within-chain variance.
*/
pub fn rhat(chains: &[&[f64]]) -> Result<f64> {
    if chains.len() < 2 {
        return Err(McmcError::InvalidParameter(
            "rhat needs at least two chains".into(),
        ));
    }
    let n = chains[0].len();
    if n < 2 || chains.iter().any(|c| c.len() != n) {
        return Err(McmcError::InvalidParameter(
            "rhat needs chains of equal length >= 2".into(),
        ));
    }

    let means: Vec<f64> = chains.iter().filter_map(|c| sample_mean(*c)).collect();
    let within = chains
        .iter()
        .filter_map(|c| sample_variance(*c))
        .sum::<f64>()
        / chains.len() as f64;
    if within <= 0.0 {
        return Err(McmcError::InvalidParameter(
            "rhat is undefined for zero within-chain variance".into(),
        ));
    }
    let n = n as f64;
    let between = n * sample_variance(means.as_slice()).unwrap_or(0.0);
    let var = within * (n - 1.0) / n + between / n;
    Ok((var / within).sqrt())
}

/**
Effective sample size of a single scalar chain.

Autocorrelations come from an FFT of the zero-padded centred chain; the integrated
autocorrelation time is truncated with Geyer's initial monotone sequence.

# References
- STAN Reference Manual, section on effective sample size.
*/
pub fn effective_sample_size(xs: &[f64]) -> Result<f64> {
    if xs.len() < 4 {
        return Err(empty_input("effective sample size"));
    }
    let acov = autocov_fft(xs);
    if acov[0] <= 0.0 {
        return Err(McmcError::InvalidParameter(
            "effective sample size is undefined for a constant chain".into(),
        ));
    }
    let rho: Vec<f64> = acov.iter().map(|c| c / acov[0]).collect();

    let mut min = rho[0] + rho[1];
    let mut sum = 0.0;
    for pair in rho.chunks_exact(2) {
        let mut p_t = pair[0] + pair[1];
        if p_t <= 0.0 {
            break;
        }
        if p_t > min {
            p_t = min;
        }
        min = p_t;
        sum += p_t;
    }
    let tau = (-1.0 + 2.0 * sum).max(f64::EPSILON);
    Ok(xs.len() as f64 / tau)
}

/// Biased autocovariance at every lag, `1/n Σ (x_t - x̄)(x_{t+k} - x̄)`.
fn autocov_fft(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    // Next power of two >= 2n - 1 so the circular correlation does not wrap.
    let mut n_padded = 1;
    while n_padded < 2 * n - 1 {
        n_padded <<= 1;
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_padded);
    let ffti = planner.plan_fft_inverse(n_padded);

    let mean = xs.iter().sum::<f64>() / n as f64;
    let mut buf: Vec<Complex<f64>> = xs
        .iter()
        .map(|x| Complex::new(x - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
        .collect();
    fft.process(&mut buf);
    buf.iter_mut()
        .for_each(|c| *c = Complex::new(c.norm_sqr(), 0.0));
    ffti.process(&mut buf);
    // rustfft does not normalize
    buf.iter()
        .take(n)
        .map(|c| c.re / n_padded as f64 / n as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RandomSource, RandomStream};
    use approx::assert_abs_diff_eq;

    fn autocov_bf(xs: &[f64]) -> Vec<f64> {
        let n = xs.len();
        let mean = xs.iter().sum::<f64>() / n as f64;
        (0..n)
            .map(|lag| {
                (0..n - lag)
                    .map(|t| (xs[t] - mean) * (xs[t + lag] - mean))
                    .sum::<f64>()
                    / n as f64
            })
            .collect()
    }

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = RandomStream::new(seed);
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x = phi * x + rng.standard_normal();
                x
            })
            .collect()
    }

    #[test]
    fn mean_and_variance() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(sample_mean(&xs), Some(2.5));
        assert_abs_diff_eq!(sample_variance(&xs).unwrap(), 5.0 / 3.0, epsilon = 1e-12);
        assert_eq!(sample_mean::<f64>(&[]), None);
        assert_eq!(sample_variance(&[1.0f32]), None);
        assert_eq!(sample_mean(&[1.0f32, 2.0]), Some(1.5));
    }

    #[test]
    fn matrix_moments() {
        let samples = arr2(&[[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]]);
        let (mean, cov) = mean_and_cov(samples.view()).unwrap();
        assert_abs_diff_eq!(mean, arr1(&[3.0, 6.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(cov, arr2(&[[4.0, 8.0], [8.0, 16.0]]), epsilon = 1e-12);
        assert!(mean_and_cov(arr2(&[[1.0, 2.0]]).view()).is_err());
    }

    #[test]
    fn rhat_of_identical_chains() {
        let c = [0.0, 1.0, 0.0, 1.0];
        let r = rhat(&[&c, &c]).unwrap();
        assert_abs_diff_eq!(r, 0.75_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rhat_flags_separated_chains() {
        let r = rhat(&[&[0.0, 1.0], &[10.0, 11.0]]).unwrap();
        assert_abs_diff_eq!(r, 100.5_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rhat_input_errors() {
        assert!(rhat(&[&[0.0, 1.0]]).is_err());
        assert!(rhat(&[&[0.0, 1.0], &[0.0, 1.0, 2.0]]).is_err());
        assert!(rhat(&[&[1.0, 1.0], &[2.0, 2.0]]).is_err());
    }

    #[test]
    fn fft_autocov_matches_brute_force() {
        let xs = ar1(0.5, 300, 1);
        let fast = autocov_fft(&xs);
        let slow = autocov_bf(&xs);
        for (a, b) in fast.iter().zip(&slow) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn ess_of_independent_draws_is_close_to_n() {
        let xs = ar1(0.0, 10_000, 2);
        let ess = effective_sample_size(&xs).unwrap();
        assert!((8_000.0..12_000.0).contains(&ess), "ess = {ess}");
    }

    #[test]
    fn ess_of_ar1_matches_theory() {
        const N: usize = 50_000;
        let phi = 0.9;
        let xs = ar1(phi, N, 3);
        let expected = N as f64 * (1.0 - phi) / (1.0 + phi);
        let ess = effective_sample_size(&xs).unwrap();
        assert!(
            (ess - expected).abs() < 0.3 * expected,
            "ess = {ess}, expected ~{expected}"
        );
    }

    #[test]
    fn ess_rejects_constant_chain() {
        assert!(effective_sample_size(&[1.0; 10]).is_err());
        assert!(effective_sample_size(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn summary_of_metropolis_chain() {
        use crate::metropolis::MetropolisSampler;
        let mh = MetropolisSampler::new(|x: f64| 0.5 * x * x, 2.0).unwrap();
        let chain = mh.sample(0.0, 50_000, &mut RandomStream::new(42)).unwrap();
        let summary = summarize(&chain, 1_000).unwrap();
        assert_eq!(summary.n, 49_001);
        assert_abs_diff_eq!(summary.mean, 0.0, epsilon = 0.1);
        assert_abs_diff_eq!(summary.variance, 1.0, epsilon = 0.1);
        assert!(summary.acceptance_rate > 0.2 && summary.acceptance_rate < 0.8);
        assert!(summarize(&chain, 60_000).is_err());
    }
}
