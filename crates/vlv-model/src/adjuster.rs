//! Post-calibration ATM adjustment.
//!
//! Prices are linear in `(alpha, nu)` (see [`crate::evaluator`]), so
//! matching the forward and the ATM straddle exactly is a 2×2 linear
//! system. The grid itself is left untouched.

use crate::params::Wing;
use crate::solver::LocalVolGrid;
use crate::trace::{notify, CalibrationEvent, CalibrationObserver};
use vlv_core::{ensure, Real, Result};
use vlv_math::solve_2x2;

/// Solve for `(alpha, nu)`; falls back to `(1, 0)` if the system is
/// singular or the scale comes out non-positive.
pub(crate) fn adjust_atm(
    grid: &LocalVolGrid,
    straddle_target: Real,
    observer: &mut dyn CalibrationObserver,
) -> (Real, Real) {
    match solve_adjusters(grid, straddle_target) {
        Ok((alpha, nu)) => {
            notify(observer, CalibrationEvent::AdjustmentApplied { alpha, nu });
            (alpha, nu)
        }
        Err(err) => {
            notify(
                observer,
                CalibrationEvent::AdjustmentRejected {
                    reason: err.to_string(),
                },
            );
            (1.0, 0.0)
        }
    }
}

fn solve_adjusters(grid: &LocalVolGrid, straddle_target: Real) -> Result<(Real, Real)> {
    let s0 = grid.forward;
    // Integrals of S and of 1 on each side of the forward.
    let level = |wing| grid.wing_moments(wing, s0, 1.0, s0).first;
    let mass = |wing| grid.wing_moments(wing, s0, 0.0, 1.0 + s0).first;
    let (level_right, level_left) = (level(Wing::Right), level(Wing::Left));
    let (mass_right, mass_left) = (mass(Wing::Right), mass(Wing::Left));

    // alpha E[S] + nu (P+ + P-) = S0
    // alpha (I+ - I-) + nu (P+ - P-) = target + S0 (P+ - P-)
    let [alpha, nu] = solve_2x2(
        [
            [level_right + level_left, mass_right + mass_left],
            [level_right - level_left, mass_right - mass_left],
        ],
        [s0, straddle_target + s0 * (mass_right - mass_left)],
    )?;
    ensure!(alpha > 0.0, "scale must be positive, got {alpha}");
    Ok((alpha, nu))
}
