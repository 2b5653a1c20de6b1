//! Per-segment closed forms.
//!
//! On every segment the local vol is linear in the level,
//! `σ(S) = σ_a + m (S − S_a)`, anchored at the inner knot `a`. Solving
//! `dS/dx = σ(S)` from that knot gives
//!
//! ```text
//! S(x) = S_a + σ_a · expm1(m (x − x_a)) / m        (S_a + σ_a (x − x_a) for m = 0)
//! x(S) = x_a + ln_1p(m (S − S_a) / σ_a) / m
//! ```
//!
//! and `σ(S(x)) = σ_a · exp(m (x − x_a))`, which is positive for every
//! finite `x`. These are the only places where level/coordinate algebra
//! happens.

use crate::params::Wing;
use vlv_core::{Real, Size, Volatility};
use vlv_math::TiltedGaussian;

/// A point of the grid: coordinate, level and local vol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knot {
    /// Normalized coordinate.
    pub x: Real,
    /// Underlying level.
    pub s: Real,
    /// Local vol at `s`.
    pub sigma: Volatility,
}

/// One segment: its inner anchor knot and slope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Segment {
    pub(crate) anchor: Knot,
    pub(crate) slope: Real,
}

impl Segment {
    #[inline]
    pub(crate) fn local_vol(&self, s: Real) -> Volatility {
        self.anchor.sigma + self.slope * (s - self.anchor.s)
    }

    #[inline]
    pub(crate) fn level_of(&self, x: Real) -> Real {
        let Knot { x: xa, s: sa, sigma } = self.anchor;
        let m = self.slope;
        if m == 0.0 {
            sa + sigma * (x - xa)
        } else {
            sa + sigma * (m * (x - xa)).exp_m1() / m
        }
    }

    #[inline]
    pub(crate) fn coord_of(&self, s: Real) -> Real {
        let Knot { x: xa, s: sa, sigma } = self.anchor;
        let m = self.slope;
        if m == 0.0 {
            xa + (s - sa) / sigma
        } else {
            xa + (m * (s - sa) / sigma).ln_1p() / m
        }
    }

    /// Antiderivative of `[alpha S(x) + nu] p(x)`.
    #[inline]
    pub(crate) fn primitive_f(&self, tg: &TiltedGaussian, x: Real, alpha: Real, nu: Real) -> Real {
        let c = alpha * self.anchor.s + nu;
        let d = alpha * self.anchor.sigma;
        c * tg.cdf(x) + d * tg.first_difference(self.slope, self.anchor.x, x)
    }

    /// Antiderivative of `[alpha S(x) + nu]² p(x)`.
    #[inline]
    pub(crate) fn primitive_f_square(
        &self,
        tg: &TiltedGaussian,
        x: Real,
        alpha: Real,
        nu: Real,
    ) -> Real {
        let c = alpha * self.anchor.s + nu;
        let d = alpha * self.anchor.sigma;
        c * c * tg.cdf(x)
            + 2.0 * c * d * tg.first_difference(self.slope, self.anchor.x, x)
            + d * d * tg.second_difference(self.slope, self.anchor.x, x)
    }

    /// Antiderivative of `σ(S(x)) p(x)`.
    #[inline]
    pub(crate) fn primitive_vol(&self, tg: &TiltedGaussian, x: Real) -> Real {
        self.anchor.sigma * tg.tilted_cdf(self.slope, self.anchor.x, x)
    }
}

/// The solved grid of one wing, ordered away from the center.
///
/// Segment `k < n` runs from knot `k − 1` (the center for `k = 0`) to knot
/// `k`; segment `n` is the flat tail beyond the last knot.
#[derive(Debug, Clone, PartialEq)]
pub struct WingGrid {
    wing: Wing,
    center: Knot,
    x: Vec<Real>,
    s: Vec<Real>,
    sigma: Vec<Volatility>,
    slopes: Vec<Real>,
    truncated_at: Option<Size>,
}

impl WingGrid {
    pub(crate) fn new(wing: Wing, center: Knot, capacity: Size) -> Self {
        Self {
            wing,
            center,
            x: Vec::with_capacity(capacity),
            s: Vec::with_capacity(capacity),
            sigma: Vec::with_capacity(capacity),
            slopes: Vec::with_capacity(capacity),
            truncated_at: None,
        }
    }

    pub(crate) fn push(&mut self, knot: Knot, slope: Real) {
        self.x.push(knot.x);
        self.s.push(knot.s);
        self.sigma.push(knot.sigma);
        self.slopes.push(slope);
    }

    pub(crate) fn mark_truncated(&mut self, index: Size) {
        self.truncated_at = Some(index);
    }

    /// Which wing this is.
    pub fn wing(&self) -> Wing {
        self.wing
    }

    /// The center knot `(mu, S0, sigma0)`.
    pub fn center(&self) -> Knot {
        self.center
    }

    /// Coordinates, moving away from the center.
    pub fn x(&self) -> &[Real] {
        &self.x
    }

    /// Levels, moving away from the center.
    pub fn s(&self) -> &[Real] {
        &self.s
    }

    /// Local vols at the knots.
    pub fn sigma(&self) -> &[Volatility] {
        &self.sigma
    }

    /// Effective slope per segment (zero where a segment was flattened).
    pub fn slopes(&self) -> &[Real] {
        &self.slopes
    }

    /// Index of the input point where the solver stopped early, if any.
    pub fn truncated_at(&self) -> Option<Size> {
        self.truncated_at
    }

    /// Number of knots.
    pub fn len(&self) -> Size {
        self.x.len()
    }

    /// Whether the wing has no knots (never true once solved).
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// The outermost knot, or the center if there is none.
    pub fn last_knot(&self) -> Knot {
        self.knot_before(self.len())
    }

    /// Inner anchor of segment `k`. Unchecked: `k <= len()`.
    #[inline]
    fn knot_before(&self, k: Size) -> Knot {
        if k == 0 {
            self.center
        } else {
            Knot {
                x: self.x[k - 1],
                s: self.s[k - 1],
                sigma: self.sigma[k - 1],
            }
        }
    }

    /// Segment `k`, the tail for `k == len()`. Unchecked: `k <= len()`.
    #[inline]
    pub(crate) fn segment(&self, k: Size) -> Segment {
        Segment {
            anchor: self.knot_before(k),
            slope: if k < self.len() { self.slopes[k] } else { 0.0 },
        }
    }

    /// Outer coordinate of segment `k` (`±∞` for the tail).
    #[inline]
    pub(crate) fn outer_x(&self, k: Size) -> Real {
        if k < self.len() {
            self.x[k]
        } else {
            self.wing.direction() * Real::INFINITY
        }
    }

    /// Segment holding level `s` (on this wing's side of the center).
    pub(crate) fn segment_for_level(&self, s: Real) -> Size {
        match self.wing {
            Wing::Right => self.s.partition_point(|&v| v <= s),
            Wing::Left => self.s.partition_point(|&v| v >= s),
        }
    }

    /// Segment holding coordinate `x` (on this wing's side of the center).
    pub(crate) fn segment_for_coord(&self, x: Real) -> Size {
        match self.wing {
            Wing::Right => self.x.partition_point(|&v| v <= x),
            Wing::Left => self.x.partition_point(|&v| v >= x),
        }
    }

    /// Sum of `primitive(segment, outer) − primitive(segment, inner)` from
    /// coordinate `x_from` in segment `k_from` out to infinity, oriented so
    /// that the result is an integral over increasing coordinates.
    pub(crate) fn integrate_outward<F>(&self, k_from: Size, x_from: Real, primitive: F) -> Real
    where
        F: Fn(&Segment, Real) -> Real,
    {
        let dir = self.wing.direction();
        (k_from..=self.len())
            .map(|k| {
                let segment = self.segment(k);
                let inner = if k == k_from { x_from } else { segment.anchor.x };
                dir * (primitive(&segment, self.outer_x(k)) - primitive(&segment, inner))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn segment(slope: Real) -> Segment {
        Segment {
            anchor: Knot {
                x: 0.1,
                s: 100.0,
                sigma: 20.0,
            },
            slope,
        }
    }

    #[test]
    fn level_and_coord_are_inverse() {
        for m in [0.0, 1e-9, 0.05, -0.3] {
            let seg = segment(m);
            for x in [-0.8, 0.1, 0.4, 1.3] {
                let s = seg.level_of(x);
                assert_abs_diff_eq!(seg.coord_of(s), x, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn vol_along_path_is_exponential() {
        let seg = segment(-0.3);
        for x in [0.2, 1.0, 5.0] {
            let s = seg.level_of(x);
            let expected = 20.0 * (-0.3 * (x - 0.1)).exp();
            assert_abs_diff_eq!(seg.local_vol(s), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn ode_is_satisfied() {
        let seg = segment(0.2);
        let x = 0.7;
        let h = 1e-6;
        let derivative = (seg.level_of(x + h) - seg.level_of(x - h)) / (2.0 * h);
        assert_abs_diff_eq!(derivative, seg.local_vol(seg.level_of(x)), epsilon = 1e-6);
    }

    #[test]
    fn primitive_f_with_unit_scale_integrates_level() {
        // Flat vol: S = 100 + 20 (x - 0.1), E[S] over the line = 100 - 2.
        let tg = TiltedGaussian::new(1.0);
        let seg = segment(0.0);
        let total = seg.primitive_f(&tg, Real::INFINITY, 1.0, 0.0)
            - seg.primitive_f(&tg, Real::NEG_INFINITY, 1.0, 0.0);
        assert_abs_diff_eq!(total, 98.0, epsilon = 1e-12);
        let second = seg.primitive_f_square(&tg, Real::INFINITY, 1.0, -98.0)
            - seg.primitive_f_square(&tg, Real::NEG_INFINITY, 1.0, -98.0);
        assert_abs_diff_eq!(second, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn segment_lookup_and_tail() {
        let center = Knot {
            x: 0.0,
            s: 100.0,
            sigma: 20.0,
        };
        let mut grid = WingGrid::new(Wing::Left, center, 2);
        grid.push(Knot { x: -0.5, s: 90.0, sigma: 20.0 }, 0.0);
        grid.push(Knot { x: -1.0, s: 80.0, sigma: 20.0 }, 0.0);
        assert_eq!(grid.segment_for_level(95.0), 0);
        assert_eq!(grid.segment_for_level(85.0), 1);
        assert_eq!(grid.segment_for_level(10.0), 2);
        assert_eq!(grid.segment_for_coord(-0.7), 1);
        assert_eq!(grid.outer_x(2), Real::NEG_INFINITY);
        assert_eq!(grid.segment(2).slope, 0.0);
        assert_eq!(grid.segment(2).anchor.s, 80.0);
        assert_eq!(grid.last_knot().x, -1.0);
    }
}
