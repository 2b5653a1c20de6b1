//! # vanilla-local-vol
//!
//! Parametric local-volatility smile model for a single expiry, calibrated
//! to the forward and the ATM straddle.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on this crate rather than the individual
//! `vlv-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use vanilla_local_vol::model::{
//!     CalibrationControls, ModelParams, VanillaLocalVolModel, Wing, WingInput,
//! };
//!
//! let model = VanillaLocalVolModel::from_levels(
//!     ModelParams::new(1.0, 100.0, 20.0),
//!     WingInput::new(vec![110.0, 130.0], vec![-0.1, 0.0]),
//!     WingInput::new(vec![90.0, 70.0], vec![-0.3, 0.0]),
//!     CalibrationControls::default(),
//! )
//! .unwrap();
//! let put = model.expectation(Wing::Left, 90.0);
//! assert!(put > 0.0);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use vlv_core as core;

/// Normal distribution, Gaussian integrals, root finding, small linear solves.
pub use vlv_math as math;

/// The local-volatility model, its builder and calibration diagnostics.
pub use vlv_model as model;

pub use vlv_core::{Error, Result};
pub use vlv_model::{ModelBuilder, VanillaLocalVolModel};
