//! ATM calibration of the forward shift `mu` and the central vol `sigma0`.
//!
//! Each round prices the forward and the ATM straddle on the current grid
//! and takes one Newton step per parameter:
//!
//! * `mu += (E[S] − S0) / E[σ(S)]`. For level grids the whole map shifts
//!   with `mu`, so `dE[S]/dmu = −E[σ(S)]` exactly.
//! * `log sigma0 −= (straddle − target) / straddle`. The straddle is
//!   proportional to `sigma0` for a flat smile; the step is clamped to ±1.
//!
//! The first `only_forward_calibration_iters` rounds skip the `sigma0` step
//! and cannot converge.

use crate::builder::ValidatedInputs;
use crate::solver::LocalVolGrid;
use crate::trace::{notify, CalibrationEvent, CalibrationObserver};
use vlv_core::{Real, Size};

const MAX_LOG_SIGMA0_STEP: Real = 1.0;

/// How calibration ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    /// Forward error and `sigma0` change fell below their tolerances.
    Converged {
        /// Rounds used.
        iterations: Size,
        /// Forward error of the final grid (before adjustment).
        forward_residual: Real,
        /// Straddle error of the final grid (before adjustment).
        straddle_residual: Real,
    },
    /// Round cap reached or an update was not finite; the last state is kept.
    BestEffort {
        /// Rounds used.
        iterations: Size,
        /// Forward error of the final grid (before adjustment).
        forward_residual: Real,
        /// Straddle error of the final grid (before adjustment).
        straddle_residual: Real,
    },
}

impl CalibrationOutcome {
    /// Whether both tolerances were met.
    pub fn is_converged(&self) -> bool {
        matches!(self, CalibrationOutcome::Converged { .. })
    }

    /// Rounds used.
    pub fn iterations(&self) -> Size {
        match *self {
            CalibrationOutcome::Converged { iterations, .. }
            | CalibrationOutcome::BestEffort { iterations, .. } => iterations,
        }
    }

    /// Forward error of the final grid, before adjustment.
    pub fn forward_residual(&self) -> Real {
        match *self {
            CalibrationOutcome::Converged {
                forward_residual, ..
            }
            | CalibrationOutcome::BestEffort {
                forward_residual, ..
            } => forward_residual,
        }
    }

    /// Straddle error of the final grid, before adjustment.
    pub fn straddle_residual(&self) -> Real {
        match *self {
            CalibrationOutcome::Converged {
                straddle_residual, ..
            }
            | CalibrationOutcome::BestEffort {
                straddle_residual, ..
            } => straddle_residual,
        }
    }
}

/// Run the calibration loop; returns the final grid and outcome.
pub(crate) fn calibrate_atm(
    inputs: &ValidatedInputs,
    straddle_target: Real,
    observer: &mut dyn CalibrationObserver,
) -> (LocalVolGrid, CalibrationOutcome) {
    let controls = &inputs.controls;
    let mut mu = controls.initial_mu.unwrap_or(0.0);
    let mut sigma0 = inputs.initial_sigma0;
    let mut grid = LocalVolGrid::build(inputs, mu, sigma0, observer);
    let mut iterations = 0;
    let mut converged = false;

    for round in 0..controls.max_calibration_iters {
        iterations = round + 1;
        let atm = grid.atm_residuals(straddle_target);
        let warm_up = round < controls.only_forward_calibration_iters;

        let d_mu = atm.forward_error / atm.expected_vol;
        let d_log_sigma0 = if warm_up {
            0.0
        } else {
            (-atm.straddle_error / atm.straddle).clamp(-MAX_LOG_SIGMA0_STEP, MAX_LOG_SIGMA0_STEP)
        };
        if !(d_mu.is_finite() && d_log_sigma0.is_finite()) {
            notify(observer, CalibrationEvent::UpdateNotFinite { round });
            break;
        }

        let next_sigma0 = sigma0 * d_log_sigma0.exp();
        let sigma0_change = next_sigma0 - sigma0;
        mu += d_mu;
        sigma0 = next_sigma0;
        grid = LocalVolGrid::build(inputs, mu, sigma0, observer);
        notify(
            observer,
            CalibrationEvent::Round {
                round,
                warm_up,
                mu,
                sigma0,
                forward_error: atm.forward_error,
                straddle_error: atm.straddle_error,
            },
        );

        if !warm_up
            && atm.forward_error.abs() < controls.s0_tol
            && sigma0_change.abs() < controls.sigma0_tol
        {
            converged = true;
            break;
        }
    }

    let last = grid.atm_residuals(straddle_target);
    let outcome = if converged {
        notify(observer, CalibrationEvent::Converged { iterations });
        CalibrationOutcome::Converged {
            iterations,
            forward_residual: last.forward_error,
            straddle_residual: last.straddle_error,
        }
    } else {
        notify(
            observer,
            CalibrationEvent::NotConverged {
                iterations,
                forward_residual: last.forward_error,
                straddle_residual: last.straddle_error,
            },
        );
        CalibrationOutcome::BestEffort {
            iterations,
            forward_residual: last.forward_error,
            straddle_residual: last.straddle_error,
        }
    };
    (grid, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::params::{CalibrationControls, ModelParams, WingInput};
    use crate::trace::{NoTrace, TraceLog};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    use tracing_test::traced_test;

    fn skewed(controls: CalibrationControls) -> ValidatedInputs {
        ModelBuilder::from_levels(
            ModelParams::new(1.0, 100.0, 20.0),
            WingInput::new(vec![110.0, 130.0, 160.0], vec![-0.2, -0.1, 0.0]),
            WingInput::new(vec![90.0, 70.0, 40.0], vec![-0.4, -0.2, 0.0]),
        )
        .with_controls(controls)
        .validate()
        .unwrap()
    }

    fn target() -> Real {
        20.0 * (2.0 / PI).sqrt()
    }

    #[test]
    fn skewed_smile_converges_towards_targets() {
        let controls = CalibrationControls::default()
            .with_max_calibration_iters(50)
            .with_tolerances(1e-10, 1e-10);
        let (grid, outcome) = calibrate_atm(&skewed(controls), target(), &mut NoTrace);
        assert!(outcome.is_converged(), "{outcome:?}");
        assert_abs_diff_eq!(outcome.forward_residual(), 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(outcome.straddle_residual(), 0.0, epsilon = 1e-6);
        // downside skew pushes the center of the coordinate grid
        assert!(grid.mu != 0.0);
        assert!(grid.sigma0 > 0.0);
    }

    #[test]
    fn warm_up_holds_sigma0() {
        let controls = CalibrationControls::default()
            .with_max_calibration_iters(2)
            .with_only_forward_calibration_iters(2);
        let inputs = skewed(controls);
        let (grid, outcome) = calibrate_atm(&inputs, target(), &mut NoTrace);
        assert_eq!(grid.sigma0, inputs.initial_sigma0);
        assert!(!outcome.is_converged());
        assert_eq!(outcome.iterations(), 2);
    }

    #[test]
    fn zero_rounds_keep_the_seed() {
        let controls = CalibrationControls::default()
            .with_max_calibration_iters(0)
            .with_initial_mu(0.05);
        let mut log = TraceLog::new();
        let (grid, outcome) = calibrate_atm(&skewed(controls), target(), &mut log);
        assert_eq!(grid.mu, 0.05);
        assert_eq!(grid.sigma0, 20.0);
        assert_eq!(outcome.iterations(), 0);
        assert!(log
            .records()
            .iter()
            .any(|r| r.starts_with("calibration did not converge after 0 iterations")));
    }

    #[traced_test]
    #[test]
    fn non_convergence_is_reported_through_tracing() {
        let controls = CalibrationControls::default().with_max_calibration_iters(1);
        let _ = calibrate_atm(&skewed(controls), target(), &mut NoTrace);
        assert!(logs_contain("calibration did not converge"));
    }
}
