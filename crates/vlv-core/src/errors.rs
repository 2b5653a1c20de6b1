//! Error types for the vanilla local-volatility workspace.
//!
//! Model construction fails only on configuration problems, detected before
//! any calibration work starts. Numerical trouble during calibration is
//! handled locally and never surfaces as an `Error`; `Numerical` is reserved
//! for post-construction queries such as implied volatility.

use thiserror::Error;

/// The top-level error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Precondition violated (raised by [`ensure!`](crate::ensure)).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// A wing grid and its slope array differ in length.
    #[error("{wing} wing: grid has {grid} points but {slopes} slopes were given")]
    GridMismatch {
        /// Which wing ("right" or "left").
        wing: &'static str,
        /// Number of grid points.
        grid: usize,
        /// Number of slopes.
        slopes: usize,
    },

    /// A wing grid does not move strictly away from the center.
    #[error("{wing} wing: grid is not strictly monotonic away from the center at index {index}")]
    NonMonotonicGrid {
        /// Which wing ("right" or "left").
        wing: &'static str,
        /// First offending index.
        index: usize,
    },

    /// A numerical routine could not produce a result.
    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Shorthand `Result` type used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Return `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use vlv_core::{ensure, errors::Error};
/// fn positive(x: f64) -> vlv_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(matches!(positive(-1.0), Err(Error::Precondition(_))));
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked_expiry(t: f64) -> Result<f64> {
        crate::ensure!(t > 0.0, "expiry must be positive, got {t}");
        Ok(t)
    }

    #[test]
    fn ensure_passes_and_fails() {
        assert_eq!(checked_expiry(1.0), Ok(1.0));
        let err = checked_expiry(0.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "precondition not satisfied: expiry must be positive, got 0"
        );
    }

    #[test]
    fn grid_mismatch_message() {
        let err = Error::GridMismatch {
            wing: "right",
            grid: 2,
            slopes: 1,
        };
        assert_eq!(
            err.to_string(),
            "right wing: grid has 2 points but 1 slopes were given"
        );
    }
}
