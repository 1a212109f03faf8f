/*!
Targets the samplers evaluate: scalar energy functions for the Metropolis family and
log-likelihoods over vectors for elliptical slice sampling.

Both are traits with a blanket implementation for plain closures, so a target can be either
a struct or a lambda.

```rust
use couple_mcmc::target::{gaussian_potential, Energy, GaussianLikelihood, LogLikelihood};
use ndarray::{arr1, arr2};

// U(x) = x² is the energy of N(0, 0.5).
let u = |x: f64| x * x;
assert_eq!(u.energy(2.0), 4.0);
assert_eq!(gaussian_potential(1.0, 0.0, 0.5), 1.0);

let lik = GaussianLikelihood::new(arr1(&[0.0, 0.0]), arr2(&[[1.0, 0.0], [0.0, 1.0]])).unwrap();
assert_eq!(lik.log_likelihood(arr1(&[1.0, 1.0]).view()).unwrap(), -1.0);
```
*/

use nalgebra as na;
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{McmcError, Result};

/// Negative log of an unnormalized target density over scalar states.
pub trait Energy {
    /// Returns `U(x)`. Must be deterministic in `x`.
    fn energy(&self, x: f64) -> f64;
}

impl<F> Energy for F
where
    F: Fn(f64) -> f64,
{
    fn energy(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Gaussian potential `(x - m)² / (2v)`, the energy of N(m, v) where `v` is the variance.
pub fn gaussian_potential(x: f64, m: f64, v: f64) -> f64 {
    (x - m).powi(2) / (2.0 * v)
}

/// Energy of a univariate Gaussian N(mean, variance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianEnergy {
    pub mean: f64,
    pub variance: f64,
}

impl GaussianEnergy {
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        crate::error::check_positive("variance", variance)?;
        Ok(Self { mean, variance })
    }
}

impl Energy for GaussianEnergy {
    fn energy(&self, x: f64) -> f64 {
        gaussian_potential(x, self.mean, self.variance)
    }
}

/// Evaluates `U(x)`, rejecting NaN and `-inf`. `+inf` is a legal zero-density energy.
pub(crate) fn checked_energy<U: Energy + ?Sized>(energy: &U, x: f64) -> Result<f64> {
    let e = energy.energy(x);
    if e.is_nan() || e == f64::NEG_INFINITY {
        Err(McmcError::Numeric(format!("energy at {x} evaluated to {e}")))
    } else {
        Ok(e)
    }
}

/// `U(from) - U(to)`, the log acceptance ratio of a symmetric proposal `from -> to`.
pub(crate) fn energy_drop<U: Energy + ?Sized>(energy: &U, from: f64, to: f64) -> Result<f64> {
    let gap = checked_energy(energy, from)? - checked_energy(energy, to)?;
    if gap.is_nan() {
        Err(McmcError::Numeric(format!(
            "undefined energy difference between {from} and {to}"
        )))
    } else {
        Ok(gap)
    }
}

/// Log-likelihood over vector states, as used by elliptical slice sampling.
pub trait LogLikelihood {
    /// Returns `log L(z)` up to an additive constant.
    fn log_likelihood(&self, z: ArrayView1<f64>) -> Result<f64>;

    /// The state dimension this likelihood expects, if it is fixed.
    fn dim(&self) -> Option<usize> {
        None
    }
}

impl<F> LogLikelihood for F
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    fn log_likelihood(&self, z: ArrayView1<f64>) -> Result<f64> {
        let lp = self(z);
        if lp.is_nan() {
            Err(McmcError::Numeric("log-likelihood evaluated to NaN".into()))
        } else {
            Ok(lp)
        }
    }
}

/**
Unnormalized Gaussian log-likelihood `-½ (z - m)ᵀ V⁻¹ (z - m)`.

The covariance is validated and inverted once, at construction. The fields are read-only;
build a new likelihood to change the target.

# Errors
- [`McmcError::InvalidParameter`] if the covariance is not square, does not match the mean's
  dimension, has non-finite entries, is not symmetric, or is invertible but not positive-definite.
- [`McmcError::Numeric`] if the covariance is singular.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianLikelihood {
    mean: Array1<f64>,
    cov: Array2<f64>,
    precision: Array2<f64>,
}

impl GaussianLikelihood {
    pub fn new(mean: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
        crate::error::check_finite("mean", mean.iter())?;
        let factor = CovarianceFactor::new(&cov, mean.len())?;
        Ok(Self {
            mean,
            cov,
            precision: factor.precision,
        })
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// The inverse covariance.
    pub fn precision(&self) -> &Array2<f64> {
        &self.precision
    }
}

impl LogLikelihood for GaussianLikelihood {
    fn log_likelihood(&self, z: ArrayView1<f64>) -> Result<f64> {
        check_dim("state", z.len(), self.mean.len())?;
        let diff = &z - &self.mean;
        let lp = -0.5 * diff.dot(&self.precision.dot(&diff));
        if lp.is_finite() {
            Ok(lp)
        } else {
            Err(McmcError::Numeric(format!(
                "Gaussian log-likelihood evaluated to {lp}"
            )))
        }
    }

    fn dim(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

pub(crate) fn check_dim(name: &str, found: usize, expected: usize) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(McmcError::InvalidParameter(format!(
            "{name} has dimension {found}, expected {expected}"
        )))
    }
}

/// Cholesky factor and inverse of a validated covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CovarianceFactor {
    pub lower: Array2<f64>,
    pub precision: Array2<f64>,
}

impl CovarianceFactor {
    pub fn new(cov: &Array2<f64>, dim: usize) -> Result<Self> {
        let (rows, cols) = cov.dim();
        if rows != cols {
            return Err(McmcError::InvalidParameter(format!(
                "covariance must be square, got {rows}x{cols}"
            )));
        }
        check_dim("covariance", rows, dim)?;
        crate::error::check_finite("covariance", cov.iter())?;
        for i in 0..dim {
            for j in (i + 1)..dim {
                if !approx::relative_eq!(
                    cov[[i, j]],
                    cov[[j, i]],
                    epsilon = 1e-12,
                    max_relative = 1e-9
                ) {
                    return Err(McmcError::InvalidParameter(format!(
                        "covariance is not symmetric at ({i}, {j})"
                    )));
                }
            }
        }

        let m = na::DMatrix::from_fn(dim, dim, |i, j| cov[[i, j]]);
        if m.clone().try_inverse().is_none() {
            return Err(McmcError::Numeric("covariance is singular".into()));
        }
        let chol = na::Cholesky::new(m).ok_or_else(|| {
            McmcError::InvalidParameter("covariance is not positive-definite".into())
        })?;
        let l = chol.l();
        if l.diagonal().iter().any(|d| !(*d > 0.0)) {
            return Err(McmcError::Numeric("covariance is numerically singular".into()));
        }
        let inv = chol.inverse();
        Ok(Self {
            lower: Array2::from_shape_fn((dim, dim), |(i, j)| l[(i, j)]),
            precision: Array2::from_shape_fn((dim, dim), |(i, j)| inv[(i, j)]),
        })
    }
}
