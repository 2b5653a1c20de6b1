//! Standard normal distribution.
//!
//! The cumulative function uses Hart's double-precision rational
//! approximation (as arranged by West, 2005) for `|x| < 5√2`, with an
//! absolute error of a few ulps. Beyond that `Φ` is below `1e-12` and the
//! tail is taken from `statrs`' complementary error function.

use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use vlv_core::Real;

/// `|x|` from which the tail is delegated to `erfc`.
const HART_CUTOFF: Real = 7.071_067_811_865_47;

const HART_NUMERATOR: [Real; 7] = [
    0.035_262_496_599_891_1,
    0.700_383_064_443_688,
    6.373_962_203_531_65,
    33.912_866_078_383,
    112.079_291_497_871,
    221.213_596_169_931,
    220.206_867_912_376,
];

const HART_DENOMINATOR: [Real; 8] = [
    0.088_388_347_648_318_4,
    1.755_667_163_182_64,
    16.064_177_579_207,
    86.780_732_202_946_1,
    296.564_248_779_674,
    637.333_633_378_831,
    793.826_512_519_948,
    440.413_735_824_752,
];

/// Polynomial with coefficients from the highest power down.
#[inline]
fn horner(coefficients: &[Real], z: Real) -> Real {
    coefficients.iter().fold(0.0, |acc, &c| acc * z + c)
}

/// `Φ(−z)` for `z ≥ 0`.
#[inline]
fn lower_tail(z: Real) -> Real {
    if z < HART_CUTOFF {
        (-0.5 * z * z).exp() * horner(&HART_NUMERATOR, z) / horner(&HART_DENOMINATOR, z)
    } else {
        0.5 * erfc(z * FRAC_1_SQRT_2)
    }
}

/// The standard normal probability density function.
///
/// `φ(x) = exp(-x²/2) / √(2π)`; returns `0` at `±∞`.
#[inline]
pub fn normal_pdf(x: Real) -> Real {
    if x.is_infinite() {
        return 0.0;
    }
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// The standard normal cumulative distribution function Φ(x).
///
/// Exactly symmetric: `Φ(x) + Φ(−x) = 1` up to the final rounding.
#[inline]
pub fn normal_cdf(x: Real) -> Real {
    if x == Real::INFINITY {
        return 1.0;
    }
    if x == Real::NEG_INFINITY {
        return 0.0;
    }
    let tail = lower_tail(x.abs());
    if x > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}
