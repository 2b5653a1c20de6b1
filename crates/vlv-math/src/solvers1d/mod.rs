//! 1D root finding.

use vlv_core::{
    errors::{Error, Result},
    Real,
};

const MAX_ITERATIONS: u32 = 100;
const DEFAULT_ACCURACY: Real = 1.0e-11;

/// Brent's method for finding a root of `f(x)` in `[x_min, x_max]`.
///
/// Combines bisection, secant, and inverse quadratic interpolation.
pub fn brent<F>(f: F, x_min: Real, x_max: Real, accuracy: Real) -> Result<Real>
where
    F: Fn(Real) -> Real,
{
    let acc = if accuracy > 0.0 {
        accuracy
    } else {
        DEFAULT_ACCURACY
    };
    let mut a = x_min;
    let mut b = x_max;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa * fb > 0.0 {
        return Err(Error::Precondition(format!(
            "Brent: f({a}) and f({b}) must have opposite signs"
        )));
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..MAX_ITERATIONS {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * acc;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            return Ok(b);
        }
        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (p, q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                let p = s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0));
                (p, (q - 1.0) * (r - 1.0) * (s - 1.0))
            };
            let (p, q) = if p > 0.0 { (p, -q) } else { (-p, q) };
            if 2.0 * p < (3.0 * xm * q - (tol * q).abs()) && 2.0 * p < (e * q).abs() {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }
        a = b;
        fa = fb;
        b += if d.abs() > tol {
            d
        } else if xm > 0.0 {
            tol
        } else {
            -tol
        };
        fb = f(b);
    }
    Err(Error::Numerical(
        "Brent solver: maximum iterations reached".into(),
    ))
}

/// Expand `hi` geometrically until `f(lo)` and `f(hi)` bracket a root.
///
/// Gives up after `max_doublings` expansions.
pub fn bracket_upwards<F>(f: F, lo: Real, hi: Real, max_doublings: u32) -> Result<Real>
where
    F: Fn(Real) -> Real,
{
    let f_lo = f(lo);
    let mut hi = hi;
    for _ in 0..=max_doublings {
        if f_lo * f(hi) <= 0.0 {
            return Ok(hi);
        }
        hi *= 2.0;
    }
    Err(Error::Numerical(format!(
        "no sign change found in [{lo}, {hi}]"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn brent_sqrt2() {
        let root = brent(|x| x * x - 2.0, 0.0, 2.0, 1e-12).unwrap();
        assert_abs_diff_eq!(root, std::f64::consts::SQRT_2, epsilon = 1e-11);
    }

    #[test]
    fn brent_requires_bracket() {
        assert!(brent(|x| x * x + 1.0, -1.0, 1.0, 1e-12).is_err());
    }

    #[test]
    fn bracket_expands_until_sign_change() {
        let hi = bracket_upwards(|x| x - 10.0, 0.0, 1.0, 10).unwrap();
        assert!(hi >= 10.0);
        assert!(bracket_upwards(|x| x + 1.0, 0.0, 1.0, 5).is_err());
    }

    #[test]
    fn bracket_from_zero_then_solve() {
        // price-like objective: negative at zero vol, rising and saturating
        let f = |v: Real| 1.0 - (-v).exp() - 0.7;
        let hi = bracket_upwards(f, 0.0, 0.25, 60).unwrap();
        assert_eq!(hi, 2.0);
        let root = brent(f, 0.0, hi, 1e-12).unwrap();
        assert_abs_diff_eq!(root, (1.0_f64 / 0.3).ln(), epsilon = 1e-11);
    }

    #[test]
    fn exhausted_doublings_report_numerical_error() {
        let f = |v: Real| 1.0 - (-v).exp() - 0.7;
        // tries 0.25, 0.5 and 1.0 only
        let err = bracket_upwards(f, 0.0, 0.25, 2).unwrap_err();
        assert!(matches!(err, Error::Numerical(_)));
    }

    #[test]
    fn root_at_the_lower_end_is_returned_as_is() {
        // a price equal to intrinsic value has implied vol zero
        let f = |v: Real| v * (v + 1.0);
        let hi = bracket_upwards(f, 0.0, 1.0, 0).unwrap();
        assert_eq!(hi, 1.0);
        assert_eq!(brent(f, 0.0, hi, 1e-12).unwrap(), 0.0);
    }
}
