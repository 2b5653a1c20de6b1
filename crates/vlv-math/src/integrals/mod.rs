//! Closed-form integrals of exponentials against a centred Gaussian density.
//!
//! Let `p` be the `N(0, t)` density and, for a tilt `λ` and an anchor `a`,
//!
//! ```text
//! E(λ; x) = ∫_{-∞}^{x} exp(λ(ξ - a)) p(ξ) dξ
//!         = exp(-λa + λ²t/2) · Φ((x - λt)/√t)
//! ```
//!
//! The local-volatility segment maps are of the form
//! `S(ξ) = S_a + σ_a · g(ξ)` with `g(ξ) = expm1(m(ξ - a)) / m`, so their
//! first and second moments reduce to the divided differences
//!
//! ```text
//! ∫^x g  p = [E(m) - E(0)] / m
//! ∫^x g² p = [E(2m) - 2E(m) + E(0)] / m²
//! ```
//!
//! Both cancel catastrophically as `m → 0`; below a small tilt they are
//! evaluated from a fifth-order Taylor expansion of `E` around `λ = 0`
//! instead, which also yields the exact linear limit at `m = 0`.

use crate::distributions::{normal_cdf, normal_pdf};
use vlv_core::Real;

/// Below this value of `|m|·max(√t, |a|)` the Taylor branch is used.
const SMALL_TILT: Real = 1.0e-3;

/// Binomial coefficients `C(j, i)` for `j < 6`.
const BINOMIAL: [[Real; 6]; 6] = [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    [1.0, 2.0, 1.0, 0.0, 0.0, 0.0],
    [1.0, 3.0, 3.0, 1.0, 0.0, 0.0],
    [1.0, 4.0, 6.0, 4.0, 1.0, 0.0],
    [1.0, 5.0, 10.0, 10.0, 5.0, 1.0],
];

const FACTORIAL: [Real; 6] = [1.0, 1.0, 2.0, 6.0, 24.0, 120.0];

/// Integrals against the `N(0, t)` density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltedGaussian {
    t: Real,
    sqrt_t: Real,
}

impl TiltedGaussian {
    /// Create for variance `t` (must be positive; not checked).
    pub fn new(t: Real) -> Self {
        Self { t, sqrt_t: t.sqrt() }
    }

    /// The variance `t`.
    pub fn variance(&self) -> Real {
        self.t
    }

    /// Standard deviation `√t`.
    pub fn std_dev(&self) -> Real {
        self.sqrt_t
    }

    /// Distribution function `P(X ≤ x) = Φ(x/√t)`.
    #[inline]
    pub fn cdf(&self, x: Real) -> Real {
        normal_cdf(x / self.sqrt_t)
    }

    /// `E(λ; x)` as defined in the module docs.
    pub fn tilted_cdf(&self, lambda: Real, anchor: Real, x: Real) -> Real {
        if lambda == 0.0 {
            return self.cdf(x);
        }
        let scale = (-lambda * anchor + 0.5 * lambda * lambda * self.t).exp();
        scale * normal_cdf((x - lambda * self.t) / self.sqrt_t)
    }

    /// `∫^x g(ξ) p(ξ) dξ` with `g(ξ) = expm1(m(ξ - a)) / m` (`g = ξ - a` at `m = 0`).
    pub fn first_difference(&self, m: Real, anchor: Real, x: Real) -> Real {
        if self.is_small_tilt(m, anchor) {
            let e = self.taylor_coefficients(anchor, x);
            return e[1] + m * (e[2] + m * (e[3] + m * (e[4] + m * e[5])));
        }
        (self.tilted_cdf(m, anchor, x) - self.cdf(x)) / m
    }

    /// `∫^x g(ξ)² p(ξ) dξ` with `g` as in [`first_difference`](Self::first_difference).
    pub fn second_difference(&self, m: Real, anchor: Real, x: Real) -> Real {
        if self.is_small_tilt(m, anchor) {
            let e = self.taylor_coefficients(anchor, x);
            return 2.0 * e[2] + m * (6.0 * e[3] + m * (14.0 * e[4] + m * 30.0 * e[5]));
        }
        (self.tilted_cdf(2.0 * m, anchor, x) - 2.0 * self.tilted_cdf(m, anchor, x)
            + self.cdf(x))
            / (m * m)
    }

    fn is_small_tilt(&self, m: Real, anchor: Real) -> bool {
        m.abs() * self.sqrt_t.max(anchor.abs()) < SMALL_TILT
    }

    /// Taylor coefficients `E⁽ʲ⁾(0) / j!`, `j = 0..=5`.
    ///
    /// `exp(-λa + λ²t/2)` is the moment generating function of `N(-a, t)`,
    /// so its derivatives are raw moments; the derivatives of
    /// `Φ((x - λt)/√t)` are Hermite polynomials times `φ`.
    fn taylor_coefficients(&self, anchor: Real, x: Real) -> [Real; 6] {
        let t = self.t;
        let v = self.sqrt_t;
        let c = -anchor;
        let moments = [
            1.0,
            c,
            c * c + t,
            c * c * c + 3.0 * c * t,
            c.powi(4) + 6.0 * c * c * t + 3.0 * t * t,
            c.powi(5) + 10.0 * c.powi(3) * t + 15.0 * c * t * t,
        ];

        let y = x / v;
        let mut cdf_derivs = [normal_cdf(y), 0.0, 0.0, 0.0, 0.0, 0.0];
        let phi = normal_pdf(y);
        if phi > 0.0 {
            let y2 = y * y;
            cdf_derivs[1] = -v * phi;
            cdf_derivs[2] = -t * y * phi;
            cdf_derivs[3] = -t * v * (y2 - 1.0) * phi;
            cdf_derivs[4] = t * t * y * (3.0 - y2) * phi;
            cdf_derivs[5] = -t * t * v * (y2 * y2 - 6.0 * y2 + 3.0) * phi;
        }

        let mut coefficients = [0.0; 6];
        for (j, coefficient) in coefficients.iter_mut().enumerate() {
            let derivative: Real = (0..=j)
                .map(|i| BINOMIAL[j][i] * moments[i] * cdf_derivs[j - i])
                .sum();
            *coefficient = derivative / FACTORIAL[j];
        }
        coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Composite Simpson rule on `[lo, hi]`.
    fn simpson<F: Fn(Real) -> Real>(f: F, lo: Real, hi: Real) -> Real {
        let n = 4000;
        let h = (hi - lo) / n as Real;
        let mut sum = f(lo) + f(hi);
        for i in 1..n {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += w * f(lo + i as Real * h);
        }
        sum * h / 3.0
    }

    fn density(t: Real) -> impl Fn(Real) -> Real {
        move |x| normal_pdf(x / t.sqrt()) / t.sqrt()
    }

    fn g(m: Real, a: Real) -> impl Fn(Real) -> Real {
        move |x| {
            if m == 0.0 {
                x - a
            } else {
                (m * (x - a)).exp_m1() / m
            }
        }
    }

    #[test]
    fn tilted_cdf_matches_quadrature() {
        let tg = TiltedGaussian::new(0.5);
        let p = density(0.5);
        let (lambda, a) = (0.7, 0.3);
        let exact = tg.tilted_cdf(lambda, a, 1.2) - tg.tilted_cdf(lambda, a, -0.4);
        let numeric = simpson(|x| (lambda * (x - a)).exp() * p(x), -0.4, 1.2);
        assert_abs_diff_eq!(exact, numeric, epsilon = 1e-11);
    }

    #[test]
    fn divided_differences_match_quadrature() {
        let t = 1.5;
        let tg = TiltedGaussian::new(t);
        let p = density(t);
        for &(m, a) in &[(0.0, 0.2), (1e-7, 0.2), (5e-4, -0.3), (0.3, 0.1), (-0.8, -1.0)] {
            let (lo, hi) = (-2.0, 3.0);
            let gf = g(m, a);
            let first = tg.first_difference(m, a, hi) - tg.first_difference(m, a, lo);
            let first_numeric = simpson(|x| gf(x) * p(x), lo, hi);
            assert_abs_diff_eq!(first, first_numeric, epsilon = 1e-10);

            let second = tg.second_difference(m, a, hi) - tg.second_difference(m, a, lo);
            let second_numeric = simpson(|x| gf(x) * gf(x) * p(x), lo, hi);
            assert_abs_diff_eq!(second, second_numeric, epsilon = 1e-10);
        }
    }

    #[test]
    fn taylor_and_closed_form_agree_at_the_switch() {
        let tg = TiltedGaussian::new(1.0);
        let a = 0.5;
        let below = 0.999e-3;
        let above = 1.001e-3;
        for x in [-1.0, 0.4, 2.0] {
            let f_below = tg.first_difference(below, a, x);
            let f_above = tg.first_difference(above, a, x);
            assert_abs_diff_eq!(f_below, f_above, epsilon = 1e-4);
            let s_below = tg.second_difference(below, a, x);
            let s_above = tg.second_difference(above, a, x);
            assert_abs_diff_eq!(s_below, s_above, epsilon = 1e-4);
        }
    }

    #[test]
    fn full_line_moments_of_linear_map() {
        // g = x - a on the whole line: mean -a, second moment t + a².
        let tg = TiltedGaussian::new(2.0);
        let a = 0.7;
        let mean = tg.first_difference(0.0, a, Real::INFINITY)
            - tg.first_difference(0.0, a, Real::NEG_INFINITY);
        assert_abs_diff_eq!(mean, -a, epsilon = 1e-15);
        let second = tg.second_difference(0.0, a, Real::INFINITY)
            - tg.second_difference(0.0, a, Real::NEG_INFINITY);
        assert_abs_diff_eq!(second, 2.0 + a * a, epsilon = 1e-14);
    }
}
