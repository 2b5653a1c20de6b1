//! # vlv-math
//!
//! Mathematical utilities for the vanilla local-volatility model: the
//! standard normal distribution (via statrs), closed-form integrals of
//! exponentials against a Gaussian density, a bracketing root finder and
//! a small dense linear solve (via nalgebra).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Probability distributions.
pub mod distributions;

/// Closed-form Gaussian integrals.
pub mod integrals;

/// Small dense linear systems.
pub mod linear;

/// 1D root-finding solvers.
pub mod solvers1d;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use distributions::{normal_cdf, normal_pdf};
pub use integrals::TiltedGaussian;
pub use linear::solve_2x2;
pub use solvers1d::{bracket_upwards, brent};
