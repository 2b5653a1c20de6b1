//! Smile-section view of the model: vanilla prices at any strike and
//! Bachelier implied volatilities.

use crate::model::VanillaLocalVolModel;
use crate::params::Wing;
use vlv_core::{ensure, Real, Result, Volatility};
use vlv_math::{bracket_upwards, brent, normal_cdf, normal_pdf};

const IMPLIED_VOL_ACCURACY: Real = 1e-12;
const MAX_BRACKET_DOUBLINGS: u32 = 60;

/// Undiscounted Bachelier call `E[(F + sd Z − K)⁺]`.
pub(crate) fn bachelier_call(forward: Real, strike: Real, std_dev: Real) -> Real {
    let moneyness = forward - strike;
    if std_dev <= 0.0 {
        return moneyness.max(0.0);
    }
    let d = moneyness / std_dev;
    moneyness * normal_cdf(d) + std_dev * normal_pdf(d)
}

impl VanillaLocalVolModel {
    /// Forward price of a call struck at `strike`.
    pub fn call(&self, strike: Real) -> Real {
        self.expectation(Wing::Right, strike)
    }

    /// Forward price of a put struck at `strike`.
    pub fn put(&self, strike: Real) -> Real {
        self.expectation(Wing::Left, strike)
    }

    /// Call plus put at `strike`.
    pub fn straddle(&self, strike: Real) -> Real {
        self.call(strike) + self.put(strike)
    }

    /// `E[alpha S + nu]`; equals the forward once calibrated and adjusted.
    pub fn model_forward(&self) -> Real {
        self.forward() + self.call(self.forward()) - self.put(self.forward())
    }

    /// Normal (Bachelier) implied volatility of the model price at `strike`,
    /// taken from the out-of-the-money side.
    pub fn implied_normal_vol(&self, strike: Real) -> Result<Volatility> {
        let forward = self.forward();
        let sqrt_t = self.time_to_expiry().sqrt();
        // Against the model forward so that an unadjusted model is still consistent.
        let model_forward = self.model_forward();
        let (price, call_side) = if strike >= forward {
            (self.call(strike), true)
        } else {
            (self.put(strike), false)
        };
        let intrinsic = if call_side {
            (model_forward - strike).max(0.0)
        } else {
            (strike - model_forward).max(0.0)
        };
        ensure!(
            price.is_finite() && price > intrinsic,
            "no implied volatility for price {price} at strike {strike}"
        );

        let objective = |vol: Real| {
            let c = bachelier_call(model_forward, strike, vol * sqrt_t);
            let p = if call_side { c } else { c - model_forward + strike };
            p - price
        };
        let guess = self.sigma_atm().max(self.local_vol(strike));
        let hi = bracket_upwards(objective, 0.0, guess, MAX_BRACKET_DOUBLINGS)?;
        brent(objective, 0.0, hi, IMPLIED_VOL_ACCURACY)
    }
}
