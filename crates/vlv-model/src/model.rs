//! The calibrated, immutable local-volatility model.

use crate::adjuster::adjust_atm;
use crate::builder::{ModelBuilder, ValidatedInputs};
use crate::calibration::{calibrate_atm, CalibrationOutcome};
use crate::params::{CalibrationControls, GridForm, ModelParams, Wing, WingInput};
use crate::segment::WingGrid;
use crate::solver::LocalVolGrid;
use crate::trace::{CalibrationObserver, Fanout, TraceLog};
use std::f64::consts::FRAC_2_PI;
use vlv_core::{Real, Result, Size, Time, Volatility};

/// Parametric vanilla local-volatility model for a single expiry.
///
/// Local vol is piecewise linear in the underlying level, with knots given
/// per wing as levels or as coordinates of the driving Gaussian. After
/// construction the model is a plain value: every query is `&self` and
/// side-effect free.
#[derive(Debug, Clone, PartialEq)]
pub struct VanillaLocalVolModel {
    inputs: ValidatedInputs,
    straddle_atm: Real,
    grid: LocalVolGrid,
    alpha: Real,
    nu: Real,
    outcome: CalibrationOutcome,
    trace: Vec<String>,
}

impl VanillaLocalVolModel {
    /// Build from level grids; see [`ModelBuilder::from_levels`].
    pub fn from_levels(
        params: ModelParams,
        right: WingInput,
        left: WingInput,
        controls: CalibrationControls,
    ) -> Result<Self> {
        ModelBuilder::from_levels(params, right, left)
            .with_controls(controls)
            .build()
    }

    /// Build from coordinate grids; see [`ModelBuilder::from_coordinates`].
    pub fn from_coordinates(
        params: ModelParams,
        sigma0: Volatility,
        right: WingInput,
        left: WingInput,
        controls: CalibrationControls,
    ) -> Result<Self> {
        ModelBuilder::from_coordinates(params, sigma0, right, left)
            .with_controls(controls)
            .build()
    }

    pub(crate) fn calibrated(inputs: ValidatedInputs, observer: &mut dyn CalibrationObserver) -> Self {
        let params = inputs.params;
        let straddle_atm = params.sigma_atm * (params.expiry * FRAC_2_PI).sqrt();
        let mut sink = Fanout {
            log: inputs.controls.enable_logging.then(TraceLog::new),
            external: Some(observer),
        };

        let (grid, outcome) = calibrate_atm(&inputs, straddle_atm, &mut sink);
        let (alpha, nu) = if inputs.controls.adjust_atm {
            adjust_atm(&grid, straddle_atm, &mut sink)
        } else {
            (1.0, 0.0)
        };
        let trace = sink.log.map(TraceLog::into_records).unwrap_or_default();

        Self {
            inputs,
            straddle_atm,
            grid,
            alpha,
            nu,
            outcome,
            trace,
        }
    }

    // ── Inspectors ───────────────────────────────────────────────────────────

    /// Diagnostic records, empty unless logging was enabled.
    pub fn logging(&self) -> &[String] {
        &self.trace
    }

    /// Time to expiry `T`.
    pub fn time_to_expiry(&self) -> Time {
        self.inputs.params.expiry
    }

    /// Forward `S0`.
    pub fn forward(&self) -> Real {
        self.inputs.params.forward
    }

    /// Target ATM normal volatility.
    pub fn sigma_atm(&self) -> Volatility {
        self.inputs.params.sigma_atm
    }

    /// Target ATM straddle `sigma_atm √T √(2/π)`.
    pub fn straddle_atm(&self) -> Real {
        self.straddle_atm
    }

    /// Calibrated central local vol.
    pub fn sigma0(&self) -> Volatility {
        self.grid.sigma0
    }

    /// Adjuster scale (1 when adjustment is off or was rejected).
    pub fn alpha(&self) -> Real {
        self.alpha
    }

    /// Calibrated forward shift of the coordinate grid.
    pub fn mu(&self) -> Real {
        self.grid.mu
    }

    /// Adjuster shift (0 when adjustment is off or was rejected).
    pub fn nu(&self) -> Real {
        self.nu
    }

    /// Cap on calibration rounds.
    pub fn max_calibration_iters(&self) -> Size {
        self.inputs.controls.max_calibration_iters
    }

    /// Leading rounds that only move `mu`.
    pub fn only_forward_calibration_iters(&self) -> Size {
        self.inputs.controls.only_forward_calibration_iters
    }

    /// Whether the ATM adjuster was requested.
    pub fn adjust_atm_flag(&self) -> bool {
        self.inputs.controls.adjust_atm
    }

    /// Whether the in-model trace was requested.
    pub fn enable_logging(&self) -> bool {
        self.inputs.controls.enable_logging
    }

    /// Whether calibration started from a caller-supplied `mu`.
    pub fn use_initial_mu(&self) -> bool {
        self.inputs.controls.initial_mu.is_some()
    }

    /// Caller-supplied seed for `mu`.
    pub fn initial_mu(&self) -> Option<Real> {
        self.inputs.controls.initial_mu
    }

    /// How calibration ended.
    pub fn outcome(&self) -> CalibrationOutcome {
        self.outcome
    }

    /// How the wing grids were supplied. Coordinate grids are mapped to
    /// levels once, through the seed center, before calibration.
    pub fn grid_form(&self) -> GridForm {
        self.inputs.form
    }

    /// Controls the model was built with.
    pub fn controls(&self) -> &CalibrationControls {
        &self.inputs.controls
    }

    /// The solved grid of one wing.
    pub fn wing(&self, wing: Wing) -> &WingGrid {
        self.grid.wing(wing)
    }

    // ── Full grid, in increasing level order ─────────────────────────────────

    fn merged<F>(&self, field: F, center: Real) -> Vec<Real>
    where
        F: Fn(&WingGrid) -> &[Real],
    {
        let left = field(&self.grid.left);
        let right = field(&self.grid.right);
        let mut out = Vec::with_capacity(left.len() + right.len() + 1);
        out.extend(left.iter().rev());
        out.push(center);
        out.extend_from_slice(right);
        out
    }

    /// Coordinates of all knots, the center included.
    pub fn underlying_x(&self) -> Vec<Real> {
        self.merged(WingGrid::x, self.grid.mu)
    }

    /// Levels of all knots, the center included.
    pub fn underlying_s(&self) -> Vec<Real> {
        self.merged(WingGrid::s, self.grid.forward)
    }

    /// Local vols at all knots.
    pub fn local_vols(&self) -> Vec<Volatility> {
        self.merged(WingGrid::sigma, self.grid.sigma0)
    }

    /// Slope of the segment ending at each knot, zero at the center.
    pub fn local_vol_slopes(&self) -> Vec<Real> {
        self.merged(WingGrid::slopes, 0.0)
    }

    // ── Evaluation ───────────────────────────────────────────────────────────

    /// Local vol at level `s`; flat beyond the outermost knots.
    pub fn local_vol(&self, s: Real) -> Volatility {
        self.grid.local_vol(s)
    }

    /// Level `S(x)` of coordinate `x`.
    pub fn level(&self, x: Real) -> Real {
        self.grid.level(x)
    }

    /// Coordinate `x(S)` of level `s`.
    pub fn coord(&self, s: Real) -> Real {
        self.grid.coord(s)
    }

    /// Forward price of the option on `wing` under the adjusted level
    /// `αS + ν`: `E[(αS + ν − K) 1{S > K}]` on the right and
    /// `E[(K − αS − ν) 1{S < K}]` on the left. Exercise is decided on the
    /// raw level `S`. Strikes on the other side of the forward are handled
    /// by parity.
    pub fn expectation(&self, wing: Wing, strike: Real) -> Real {
        self.grid.expectation(wing, strike, self.alpha, self.nu)
    }

    /// `E[(αS + ν − K)² 1{S > K}]` on the right wing and
    /// `E[(αS + ν − K)² 1{S < K}]` on the left, with exercise decided on the
    /// raw level `S`.
    pub fn variance(&self, wing: Wing, strike: Real) -> Real {
        self.grid.variance(wing, strike, self.alpha, self.nu)
    }
}
