//! Validated construction shared by both public factories.

use crate::model::VanillaLocalVolModel;
use crate::params::{CalibrationControls, GridForm, ModelParams, Wing, WingInput};
use crate::segment::Knot;
use crate::solver::levels_from_coordinates;
use crate::trace::{CalibrationObserver, NoTrace};
use vlv_core::{ensure, Error, Real, Result, Volatility};

/// Inputs that passed validation; the solver relies on these invariants.
///
/// Both wings hold levels. `form` records how they were supplied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidatedInputs {
    pub(crate) params: ModelParams,
    pub(crate) form: GridForm,
    pub(crate) right: WingInput,
    pub(crate) left: WingInput,
    pub(crate) initial_sigma0: Volatility,
    pub(crate) controls: CalibrationControls,
}

/// Builder for [`VanillaLocalVolModel`].
///
/// ```
/// use vlv_model::{CalibrationControls, ModelBuilder, ModelParams, WingInput};
///
/// let model = ModelBuilder::from_levels(
///     ModelParams::new(1.0, 100.0, 20.0),
///     WingInput::new(vec![110.0, 130.0], vec![-0.1, 0.0]),
///     WingInput::new(vec![90.0, 70.0], vec![-0.3, 0.0]),
/// )
/// .with_controls(CalibrationControls::default().with_max_calibration_iters(10))
/// .build()
/// .unwrap();
/// assert!((model.model_forward() - 100.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBuilder {
    params: ModelParams,
    form: GridForm,
    right: WingInput,
    left: WingInput,
    initial_sigma0: Option<Volatility>,
    controls: CalibrationControls,
}

impl ModelBuilder {
    /// Start from level grids: right levels above, left levels below the forward.
    pub fn from_levels(params: ModelParams, right: WingInput, left: WingInput) -> Self {
        Self {
            params,
            form: GridForm::Levels,
            right,
            left,
            initial_sigma0: None,
            controls: CalibrationControls::default(),
        }
    }

    /// Start from coordinate grids (right positive, left negative) and the
    /// central vol `sigma0` that maps them to levels.
    pub fn from_coordinates(
        params: ModelParams,
        sigma0: Volatility,
        right: WingInput,
        left: WingInput,
    ) -> Self {
        Self {
            params,
            form: GridForm::Coordinates,
            right,
            left,
            initial_sigma0: Some(sigma0),
            controls: CalibrationControls::default(),
        }
    }

    /// Replace the numerical controls.
    pub fn with_controls(mut self, controls: CalibrationControls) -> Self {
        self.controls = controls;
        self
    }

    /// Override the initial guess for `sigma0` (defaults to `sigma_atm`
    /// for level grids).
    pub fn with_initial_sigma0(mut self, sigma0: Volatility) -> Self {
        self.initial_sigma0 = Some(sigma0);
        self
    }

    /// Validate, calibrate and freeze the model.
    pub fn build(self) -> Result<VanillaLocalVolModel> {
        self.build_with_observer(&mut NoTrace)
    }

    /// As [`build`](Self::build), additionally reporting every calibration
    /// event to `observer`.
    pub fn build_with_observer(
        self,
        observer: &mut dyn CalibrationObserver,
    ) -> Result<VanillaLocalVolModel> {
        let inputs = self.validate()?;
        Ok(VanillaLocalVolModel::calibrated(inputs, observer))
    }

    pub(crate) fn validate(self) -> Result<ValidatedInputs> {
        let ModelParams {
            expiry,
            forward,
            sigma_atm,
        } = self.params;
        ensure!(
            expiry.is_finite() && expiry > 0.0,
            "expiry must be positive, got {expiry}"
        );
        ensure!(forward.is_finite(), "forward must be finite, got {forward}");
        ensure!(
            sigma_atm.is_finite() && sigma_atm > 0.0,
            "ATM volatility must be positive, got {sigma_atm}"
        );

        let seed_mu = self.controls.initial_mu.unwrap_or(0.0);
        ensure!(seed_mu.is_finite(), "initial mu must be finite, got {seed_mu}");

        let origin = match self.form {
            GridForm::Levels => forward,
            GridForm::Coordinates => seed_mu,
        };
        validate_wing(Wing::Right, origin, &self.right)?;
        validate_wing(Wing::Left, origin, &self.left)?;

        let initial_sigma0 = self.initial_sigma0.unwrap_or(sigma_atm);
        ensure!(
            initial_sigma0.is_finite() && initial_sigma0 > 0.0,
            "initial sigma0 must be positive, got {initial_sigma0}"
        );

        let c = &self.controls;
        ensure!(
            c.extrapolation_stdevs.is_finite() && c.extrapolation_stdevs > 0.0,
            "extrapolation width must be positive, got {}",
            c.extrapolation_stdevs
        );
        ensure!(
            c.sigma0_tol > 0.0 && c.s0_tol > 0.0,
            "tolerances must be positive, got sigma0 {} and S0 {}",
            c.sigma0_tol,
            c.s0_tol
        );

        let (right, left) = match self.form {
            GridForm::Levels => (self.right, self.left),
            GridForm::Coordinates => {
                // Coordinates only fix the levels, through the seed center.
                let center = Knot {
                    x: seed_mu,
                    s: forward,
                    sigma: initial_sigma0,
                };
                let to_levels = |wing, input: WingInput| -> Result<WingInput> {
                    let levels =
                        levels_from_coordinates(wing, &input.grid, &input.slopes, center)?;
                    Ok(WingInput::new(levels, input.slopes))
                };
                (
                    to_levels(Wing::Right, self.right)?,
                    to_levels(Wing::Left, self.left)?,
                )
            }
        };

        Ok(ValidatedInputs {
            params: self.params,
            form: self.form,
            right,
            left,
            initial_sigma0,
            controls: self.controls,
        })
    }
}

/// Grid and slopes of one wing: equal length, finite, strictly moving away
/// from `origin` (the forward level or the seed coordinate).
fn validate_wing(wing: Wing, origin: Real, input: &WingInput) -> Result<()> {
    let WingInput { grid, slopes } = input;
    if grid.len() != slopes.len() {
        return Err(Error::GridMismatch {
            wing: wing.name(),
            grid: grid.len(),
            slopes: slopes.len(),
        });
    }
    ensure!(!grid.is_empty(), "{wing} wing needs at least one grid point");
    ensure!(
        grid.iter().chain(slopes).all(|v| v.is_finite()),
        "{wing} wing contains non-finite values"
    );

    let dir = wing.direction();
    let mut previous = origin;
    for (index, &point) in grid.iter().enumerate() {
        if dir * (point - previous) <= 0.0 {
            return Err(Error::NonMonotonicGrid {
                wing: wing.name(),
                index,
            });
        }
        previous = point;
    }
    Ok(())
}
