//! # vlv-model
//!
//! Parametric vanilla local-volatility model for a single expiry.
//!
//! The underlying is `S = S(x)` with `x ~ N(0, T)` and `dS/dx = σ(S)`, where
//! `σ` is piecewise linear in `S`. Knots are given per wing, either as levels
//! or as coordinates `x`. Construction solves the map wing by wing,
//! calibrates the coordinate shift `mu` and central vol `sigma0` to the
//! forward and the ATM straddle, and optionally applies an exact affine
//! adjustment `alpha S + nu`.
//!
//! ## Build pipeline
//!
//! ```text
//! ModelBuilder ── validate ──▶ ValidatedInputs
//!      │
//!      ▼
//! calibrate_atm ── LocalVolGrid::build ── solve_wing (×2)
//!      │
//!      ▼
//! adjust_atm ──▶ VanillaLocalVolModel (immutable)
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Inputs ───────────────────────────────────────────────────────────────
pub mod builder;
pub mod params;

// ── Construction ─────────────────────────────────────────────────────────
mod adjuster;
pub mod calibration;
mod solver;
pub mod segment;
pub mod trace;

// ── Evaluation ───────────────────────────────────────────────────────────
mod evaluator;
pub mod model;
mod smile;

// ── Re-exports ───────────────────────────────────────────────────────────
pub use builder::ModelBuilder;
pub use calibration::CalibrationOutcome;
pub use model::VanillaLocalVolModel;
pub use params::{CalibrationControls, GridForm, ModelParams, Wing, WingInput};
pub use segment::{Knot, WingGrid};
pub use trace::{CalibrationEvent, CalibrationObserver, NoTrace, TraceLog, TruncationReason};
