//! ODE local-vol solver: walks each wing outward from the center.

use crate::builder::ValidatedInputs;
use crate::params::Wing;
use crate::segment::{Knot, Segment, WingGrid};
use crate::trace::{notify, CalibrationEvent, CalibrationObserver, TruncationReason};
use vlv_core::{ensure, Real, Result, Size, Volatility};
use vlv_math::TiltedGaussian;

/// Both wings solved for one `(mu, sigma0)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalVolGrid {
    pub(crate) mu: Real,
    pub(crate) sigma0: Volatility,
    pub(crate) forward: Real,
    pub(crate) gaussian: TiltedGaussian,
    pub(crate) right: WingGrid,
    pub(crate) left: WingGrid,
}

impl LocalVolGrid {
    pub(crate) fn build(
        inputs: &ValidatedInputs,
        mu: Real,
        sigma0: Volatility,
        observer: &mut dyn CalibrationObserver,
    ) -> Self {
        let center = Knot {
            x: mu,
            s: inputs.params.forward,
            sigma: sigma0,
        };
        let width = inputs.controls.extrapolation_stdevs * inputs.params.expiry.sqrt();
        let right = solve_wing(
            Wing::Right,
            &inputs.right.grid,
            &inputs.right.slopes,
            center,
            mu + width,
            observer,
        );
        let left = solve_wing(
            Wing::Left,
            &inputs.left.grid,
            &inputs.left.slopes,
            center,
            mu - width,
            observer,
        );
        Self {
            mu,
            sigma0,
            forward: inputs.params.forward,
            gaussian: TiltedGaussian::new(inputs.params.expiry),
            right,
            left,
        }
    }

    pub(crate) fn wing(&self, wing: Wing) -> &WingGrid {
        match wing {
            Wing::Right => &self.right,
            Wing::Left => &self.left,
        }
    }

    fn wing_for_level(&self, s: Real) -> &WingGrid {
        if s >= self.forward {
            &self.right
        } else {
            &self.left
        }
    }

    fn wing_for_coord(&self, x: Real) -> &WingGrid {
        if x >= self.mu {
            &self.right
        } else {
            &self.left
        }
    }

    pub(crate) fn local_vol(&self, s: Real) -> Volatility {
        let grid = self.wing_for_level(s);
        grid.segment(grid.segment_for_level(s)).local_vol(s)
    }

    pub(crate) fn level(&self, x: Real) -> Real {
        let grid = self.wing_for_coord(x);
        grid.segment(grid.segment_for_coord(x)).level_of(x)
    }

    pub(crate) fn coord(&self, s: Real) -> Real {
        let grid = self.wing_for_level(s);
        grid.segment(grid.segment_for_level(s)).coord_of(s)
    }
}

/// Outcome of one solver step before it is accepted.
fn candidate(segment: &Segment, level: Real) -> Knot {
    Knot {
        x: segment.coord_of(level),
        s: level,
        sigma: segment.local_vol(level),
    }
}

/// Map a coordinate grid to levels through the segments anchored at
/// `center`. Runs once, before calibration; the solver only ever sees
/// levels.
pub(crate) fn levels_from_coordinates(
    wing: Wing,
    coords: &[Real],
    slopes: &[Real],
    center: Knot,
) -> Result<Vec<Real>> {
    let dir = wing.direction();
    let mut anchor = center;
    let mut levels = Vec::with_capacity(coords.len());
    for (index, (&x, &slope)) in coords.iter().zip(slopes).enumerate() {
        let segment = Segment { anchor, slope };
        let s = segment.level_of(x);
        let knot = Knot {
            x,
            s,
            sigma: segment.local_vol(s),
        };
        ensure!(
            degeneracy(dir, &anchor, &knot).is_none(),
            "{wing} wing: coordinate {x} at index {index} has no valid level"
        );
        levels.push(s);
        anchor = knot;
    }
    Ok(levels)
}

/// Why `knot` cannot follow `anchor`, if it cannot.
fn degeneracy(dir: Real, anchor: &Knot, knot: &Knot) -> Option<TruncationReason> {
    if knot.sigma <= 0.0 {
        return Some(TruncationReason::NonPositiveVol);
    }
    if !(knot.x.is_finite() && knot.s.is_finite() && knot.sigma.is_finite()) {
        return Some(TruncationReason::NonFinite);
    }
    if dir * (knot.x - anchor.x) <= 0.0 || dir * (knot.s - anchor.s) <= 0.0 {
        return Some(TruncationReason::NonMonotonic);
    }
    None
}

fn rejection(dir: Real, anchor: &Knot, knot: &Knot, bound: Real) -> Option<TruncationReason> {
    degeneracy(dir, anchor, knot)
        .or_else(|| (dir * (bound - knot.x) <= 0.0).then_some(TruncationReason::BeyondBound))
}

/// Solve one wing outward from `center`.
///
/// Every accepted knot lies strictly inside the bound. The last input
/// point, or the first rejected one, is replaced by the point where the
/// segment meets the bound; if the segment cannot reach it with a finite,
/// positive vol it is flattened instead. At most `grid.len()` steps.
pub(crate) fn solve_wing(
    wing: Wing,
    grid: &[Real],
    slopes: &[Real],
    center: Knot,
    bound: Real,
    observer: &mut dyn CalibrationObserver,
) -> WingGrid {
    let dir = wing.direction();
    let n = grid.len();
    let mut solved = WingGrid::new(wing, center, n);
    let mut anchor = center;

    for (k, (&point, &slope)) in grid.iter().zip(slopes).enumerate() {
        let segment = Segment { anchor, slope };
        let knot = candidate(&segment, point);
        let reason = rejection(dir, &anchor, &knot, bound);
        let is_last = k + 1 == n;

        if reason.is_none() && !is_last {
            solved.push(knot, slope);
            anchor = knot;
            continue;
        }

        if let Some(reason) = reason {
            if !is_last || reason != TruncationReason::BeyondBound {
                solved.mark_truncated(k);
                notify(
                    observer,
                    CalibrationEvent::WingTruncated {
                        wing,
                        index: k,
                        reason,
                    },
                );
            }
        }
        close_at_bound(&mut solved, wing, k, &segment, bound, observer);
        break;
    }
    solved
}

/// Append the knot where `segment` meets the bound.
fn close_at_bound(
    solved: &mut WingGrid,
    wing: Wing,
    k: Size,
    segment: &Segment,
    bound: Real,
    observer: &mut dyn CalibrationObserver,
) {
    let s = segment.level_of(bound);
    let knot = Knot {
        x: bound,
        s,
        sigma: segment.local_vol(s),
    };
    if degeneracy(wing.direction(), &segment.anchor, &knot).is_none() {
        solved.push(knot, segment.slope);
        return;
    }
    let flat = Segment {
        anchor: segment.anchor,
        slope: 0.0,
    };
    let s = flat.level_of(bound);
    solved.push(
        Knot {
            x: bound,
            s,
            sigma: segment.anchor.sigma,
        },
        0.0,
    );
    notify(observer, CalibrationEvent::SegmentFlattened { wing, index: k });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{NoTrace, TraceLog};
    use approx::assert_abs_diff_eq;

    fn center() -> Knot {
        Knot {
            x: 0.0,
            s: 100.0,
            sigma: 20.0,
        }
    }

    #[test]
    fn last_point_lands_on_the_bound() {
        let g = solve_wing(
            Wing::Right,
            &[110.0, 130.0],
            &[0.1, 0.0],
            center(),
            10.0,
            &mut NoTrace,
        );
        assert_eq!(g.len(), 2);
        assert_eq!(g.truncated_at(), None);
        assert_eq!(g.x()[1], 10.0);
        assert_abs_diff_eq!(g.s()[0], 110.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g.sigma()[0], 21.0, epsilon = 1e-12);
        // flat beyond the first knot
        assert_abs_diff_eq!(g.sigma()[1], 21.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g.s()[1], 110.0 + 21.0 * (10.0 - g.x()[0]), epsilon = 1e-9);
    }

    #[test]
    fn level_past_the_vol_zero_truncates() {
        // sigma hits zero at S = 100 + 20 / 0.5 = 140 on the right wing.
        let mut log = TraceLog::new();
        let g = solve_wing(
            Wing::Right,
            &[150.0, 160.0, 170.0],
            &[-0.5, 0.0, 0.0],
            center(),
            10.0,
            &mut log,
        );
        assert_eq!(g.len(), 1);
        assert_eq!(g.truncated_at(), Some(0));
        assert_eq!(g.x()[0], 10.0);
        assert!(g.sigma()[0] > 0.0);
        assert!(g.s()[0] < 140.0);
        assert_eq!(log.records().len(), 1);
        assert!(log.records()[0].contains("non-positive local vol"));
    }

    #[test]
    fn point_beyond_bound_truncates_left_wing() {
        let g = solve_wing(
            Wing::Left,
            &[90.0, -500.0, -600.0],
            &[0.0, 0.0, 0.0],
            center(),
            -10.0,
            &mut NoTrace,
        );
        assert_eq!(g.len(), 2);
        assert_eq!(g.truncated_at(), Some(1));
        assert_eq!(g.x(), &[-0.5, -10.0]);
        assert_abs_diff_eq!(g.s()[1], 100.0 - 200.0, epsilon = 1e-9);
    }

    #[test]
    fn coordinates_map_to_levels_once() {
        let levels =
            levels_from_coordinates(Wing::Right, &[0.5, 1.0, 2.0], &[0.0, 0.1, 0.0], center())
                .unwrap();
        assert_abs_diff_eq!(levels[0], 110.0, epsilon = 1e-12);
        // sigma 20 at 110, then expm1(0.1 * 0.5) / 0.1 per unit vol
        assert_abs_diff_eq!(levels[1], 110.0 + 20.0 * (0.05f64).exp_m1() / 0.1, epsilon = 1e-12);
        assert!(levels[2] > levels[1]);

        // solving the levels from the same center gives the coordinates back
        let g = solve_wing(Wing::Right, &levels, &[0.0, 0.1, 0.0], center(), 10.0, &mut NoTrace);
        assert_abs_diff_eq!(g.x()[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(g.x()[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn left_coordinates_map_below_the_forward() {
        let levels =
            levels_from_coordinates(Wing::Left, &[-0.5, -1.5], &[-0.4, 0.0], center()).unwrap();
        assert!(levels[0] < 100.0 && levels[1] < levels[0]);
    }

    #[test]
    fn coordinate_overflow_is_a_configuration_error() {
        let r = levels_from_coordinates(Wing::Right, &[5.0], &[500.0], center());
        assert!(matches!(r, Err(vlv_core::Error::Precondition(_))));
    }

    #[test]
    fn shifted_center_leaves_level_knots_in_place() {
        // Moving the center in x translates the map; level knots survive.
        let levels =
            levels_from_coordinates(Wing::Right, &[0.5, 1.0], &[-0.2, 0.0], center()).unwrap();
        let shifted = Knot { x: 0.7, ..center() };
        let g = solve_wing(Wing::Right, &levels, &[-0.2, 0.0], shifted, 10.7, &mut NoTrace);
        assert_eq!(g.truncated_at(), None);
        assert_eq!(g.len(), 2);
        assert_abs_diff_eq!(g.x()[0], 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(g.s()[0], levels[0], epsilon = 1e-12);
    }

    #[test]
    fn overflowing_segment_is_flattened() {
        let mut log = TraceLog::new();
        let g = solve_wing(
            Wing::Right,
            &[110.0],
            &[500.0],
            center(),
            10.0,
            &mut log,
        );
        assert_eq!(g.slopes(), &[0.0]);
        assert_eq!(g.sigma(), &[20.0]);
        assert!(log.records()[0].contains("flattened"));
    }
}
