//! Payoff integrals over the solved grid.
//!
//! Payoffs use the adjusted level `alpha S + nu` with exercise decided by
//! the raw level `S` against the strike. This keeps every price linear in
//! `(alpha, nu)`, which is what the ATM adjuster relies on.

use crate::params::Wing;
use crate::solver::LocalVolGrid;
use vlv_core::{Real, Volatility};

/// First and second moments of `alpha S + nu − strike` over a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Moments {
    pub(crate) first: Real,
    pub(crate) second: Real,
}

/// Forward and straddle errors of the unadjusted model at `S0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AtmResiduals {
    pub(crate) forward_error: Real,
    pub(crate) straddle: Real,
    pub(crate) straddle_error: Real,
    pub(crate) expected_vol: Volatility,
}

impl LocalVolGrid {
    /// Moments over the part of `wing` beyond `strike`, which must lie on
    /// that wing's side of the forward (or on it).
    pub(crate) fn wing_moments(&self, wing: Wing, strike: Real, alpha: Real, nu: Real) -> Moments {
        let grid = self.wing(wing);
        let k0 = grid.segment_for_level(strike);
        let x0 = grid.segment(k0).coord_of(strike);
        let tg = &self.gaussian;
        let shift = nu - strike;
        Moments {
            first: grid.integrate_outward(k0, x0, |seg, x| seg.primitive_f(tg, x, alpha, shift)),
            second: grid.integrate_outward(k0, x0, |seg, x| {
                seg.primitive_f_square(tg, x, alpha, shift)
            }),
        }
    }

    /// Moments over the whole line.
    pub(crate) fn total_moments(&self, strike: Real, alpha: Real, nu: Real) -> Moments {
        let r = self.wing_moments(Wing::Right, self.forward, alpha, nu - strike + self.forward);
        let l = self.wing_moments(Wing::Left, self.forward, alpha, nu - strike + self.forward);
        Moments {
            first: r.first + l.first,
            second: r.second + l.second,
        }
    }

    fn on_own_side(&self, wing: Wing, strike: Real) -> bool {
        match wing {
            Wing::Right => strike >= self.forward,
            Wing::Left => strike <= self.forward,
        }
    }

    /// `E[(alpha S + nu − K) 1{S > K}]` (right) or `E[(K − alpha S − nu) 1{S < K}]` (left).
    pub(crate) fn expectation(&self, wing: Wing, strike: Real, alpha: Real, nu: Real) -> Real {
        let dir = wing.direction();
        if self.on_own_side(wing, strike) {
            return dir * self.wing_moments(wing, strike, alpha, nu).first;
        }
        let other = opposite(wing);
        let total = self.total_moments(strike, alpha, nu).first;
        self.expectation(other, strike, alpha, nu) + dir * total
    }

    /// `E[(alpha S + nu − K)² 1{S > K}]` (right) or the same over `S < K` (left).
    pub(crate) fn variance(&self, wing: Wing, strike: Real, alpha: Real, nu: Real) -> Real {
        if self.on_own_side(wing, strike) {
            return self.wing_moments(wing, strike, alpha, nu).second;
        }
        let other = opposite(wing);
        self.total_moments(strike, alpha, nu).second - self.variance(other, strike, alpha, nu)
    }

    /// `E[σ(S)]`, the exact sensitivity `−dE[S]/dmu` for level grids.
    pub(crate) fn expected_local_vol(&self) -> Volatility {
        let tg = &self.gaussian;
        [&self.right, &self.left]
            .iter()
            .map(|grid| grid.integrate_outward(0, self.mu, |seg, x| seg.primitive_vol(tg, x)))
            .sum()
    }

    /// Errors of the unadjusted model against the straddle `target`.
    pub(crate) fn atm_residuals(&self, target: Real) -> AtmResiduals {
        let call = self.expectation(Wing::Right, self.forward, 1.0, 0.0);
        let put = self.expectation(Wing::Left, self.forward, 1.0, 0.0);
        let straddle = call + put;
        AtmResiduals {
            forward_error: call - put,
            straddle,
            straddle_error: straddle - target,
            expected_vol: self.expected_local_vol(),
        }
    }
}

fn opposite(wing: Wing) -> Wing {
    match wing {
        Wing::Right => Wing::Left,
        Wing::Left => Wing::Right,
    }
}
