//! Model inputs and numerical controls.

use vlv_core::{Real, Size, Time, Volatility};

/// One half of the smile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Wing {
    /// Levels above the forward.
    Right,
    /// Levels below the forward.
    Left,
}

impl Wing {
    /// `+1` for the right wing, `-1` for the left wing.
    #[inline]
    pub fn direction(self) -> Real {
        match self {
            Wing::Right => 1.0,
            Wing::Left => -1.0,
        }
    }

    /// Lower-case name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Wing::Right => "right",
            Wing::Left => "left",
        }
    }
}

impl std::fmt::Display for Wing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the wing grids were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GridForm {
    /// Underlying levels `S`; coordinates are derived.
    Levels,
    /// Normalized coordinates `x`, mapped to levels once through the seed
    /// center before calibration.
    Coordinates,
}

/// Market inputs of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelParams {
    /// Time to expiry in years.
    pub expiry: Time,
    /// Forward level `S0`.
    pub forward: Real,
    /// ATM normal volatility; defines the straddle target.
    pub sigma_atm: Volatility,
}

impl ModelParams {
    /// Bundle expiry, forward and ATM normal volatility.
    pub fn new(expiry: Time, forward: Real, sigma_atm: Volatility) -> Self {
        Self {
            expiry,
            forward,
            sigma_atm,
        }
    }
}

/// Grid points of one wing and the local-vol slope on each segment.
///
/// `slopes[k]` applies between point `k - 1` (or the center for `k = 0`)
/// and point `k`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WingInput {
    /// Levels or coordinates, moving away from the center.
    pub grid: Vec<Real>,
    /// Slope `dσ/dS` per segment.
    pub slopes: Vec<Real>,
}

impl WingInput {
    /// Create from grid points and slopes.
    pub fn new(grid: Vec<Real>, slopes: Vec<Real>) -> Self {
        Self { grid, slopes }
    }
}

/// Numerical controls of grid construction and ATM calibration.
///
/// ```
/// use vlv_model::CalibrationControls;
/// let controls = CalibrationControls::default()
///     .with_max_calibration_iters(10)
///     .with_logging(true);
/// assert_eq!(controls.max_calibration_iters, 10);
/// assert!(controls.adjust_atm);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationControls {
    /// Half-width of the modelled coordinate range in standard deviations.
    pub extrapolation_stdevs: Real,
    /// Maximum number of calibration rounds.
    pub max_calibration_iters: Size,
    /// Leading rounds that only calibrate the forward.
    pub only_forward_calibration_iters: Size,
    /// Convergence tolerance on the change of `sigma0`.
    pub sigma0_tol: Real,
    /// Convergence tolerance on the forward error.
    pub s0_tol: Real,
    /// Apply the post-calibration `(alpha, nu)` adjustment.
    pub adjust_atm: bool,
    /// Record a text trace of the calibration.
    pub enable_logging: bool,
    /// Seed for the forward shift `mu`; `None` starts from zero.
    pub initial_mu: Option<Real>,
}

impl Default for CalibrationControls {
    fn default() -> Self {
        Self {
            extrapolation_stdevs: 10.0,
            max_calibration_iters: 5,
            only_forward_calibration_iters: 0,
            sigma0_tol: 1.0e-12,
            s0_tol: 1.0e-12,
            adjust_atm: true,
            enable_logging: false,
            initial_mu: None,
        }
    }
}

impl CalibrationControls {
    /// Set the extrapolation width in standard deviations.
    pub fn with_extrapolation_stdevs(mut self, stdevs: Real) -> Self {
        self.extrapolation_stdevs = stdevs;
        self
    }

    /// Set the maximum number of calibration rounds.
    pub fn with_max_calibration_iters(mut self, n: Size) -> Self {
        self.max_calibration_iters = n;
        self
    }

    /// Set the number of forward-only warm-up rounds.
    pub fn with_only_forward_calibration_iters(mut self, n: Size) -> Self {
        self.only_forward_calibration_iters = n;
        self
    }

    /// Set both convergence tolerances.
    pub fn with_tolerances(mut self, sigma0_tol: Real, s0_tol: Real) -> Self {
        self.sigma0_tol = sigma0_tol;
        self.s0_tol = s0_tol;
        self
    }

    /// Enable or disable the post-calibration adjustment.
    pub fn with_adjust_atm(mut self, flag: bool) -> Self {
        self.adjust_atm = flag;
        self
    }

    /// Enable or disable the text trace.
    pub fn with_logging(mut self, flag: bool) -> Self {
        self.enable_logging = flag;
        self
    }

    /// Seed the forward shift `mu`.
    pub fn with_initial_mu(mut self, mu: Real) -> Self {
        self.initial_mu = Some(mu);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = CalibrationControls::default();
        assert_eq!(c.extrapolation_stdevs, 10.0);
        assert_eq!(c.max_calibration_iters, 5);
        assert_eq!(c.only_forward_calibration_iters, 0);
        assert!(c.adjust_atm);
        assert!(!c.enable_logging);
        assert_eq!(c.initial_mu, None);
    }

    #[test]
    fn setters_chain() {
        let c = CalibrationControls::default()
            .with_only_forward_calibration_iters(2)
            .with_tolerances(1e-8, 1e-9)
            .with_adjust_atm(false)
            .with_initial_mu(0.25);
        assert_eq!(c.only_forward_calibration_iters, 2);
        assert_eq!(c.sigma0_tol, 1e-8);
        assert_eq!(c.s0_tol, 1e-9);
        assert!(!c.adjust_atm);
        assert_eq!(c.initial_mu, Some(0.25));
    }

    #[test]
    fn wing_direction() {
        assert_eq!(Wing::Right.direction(), 1.0);
        assert_eq!(Wing::Left.direction(), -1.0);
        assert_eq!(Wing::Left.to_string(), "left");
    }
}
