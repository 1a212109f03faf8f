//! Error type shared by all samplers.

use thiserror::Error;

/// Errors raised by the samplers and targets of this crate.
///
/// A failed transition aborts the surrounding driver loop; the chain built up to
/// that point is dropped and only the error reaches the caller.
#[derive(Debug, Error)]
pub enum McmcError {
    /// A non-finite energy or log-density, or `ln(0)` from a degenerate uniform draw.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Rejected at call time, before any randomness is consumed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A rejection or shrinkage loop ran out of attempts.
    #[error("{routine} did not terminate within {attempts} attempts")]
    LoopBoundExceeded {
        routine: &'static str,
        attempts: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, McmcError>;

/// Fails with [`McmcError::InvalidParameter`] unless `v` is finite and strictly positive.
pub(crate) fn check_positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(McmcError::InvalidParameter(format!(
            "{name} must be finite and > 0, got {v}"
        )))
    }
}

/// Fails with [`McmcError::InvalidParameter`] unless every value is finite.
pub(crate) fn check_finite<'a, I>(name: &str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a f64>,
{
    match values.into_iter().find(|v| !v.is_finite()) {
        Some(v) => Err(McmcError::InvalidParameter(format!(
            "{name} must be finite, found {v}"
        ))),
        None => Ok(()),
    }
}
