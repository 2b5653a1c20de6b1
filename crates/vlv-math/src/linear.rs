//! Small dense linear systems (thin wrapper over nalgebra).

use nalgebra::{Matrix2, Vector2};
use vlv_core::{
    errors::{Error, Result},
    Real,
};

/// Solve the 2×2 system `A · z = b` with `A` given row-major.
///
/// Uses an LU decomposition with partial pivoting. Returns
/// `Error::Numerical` when `A` is singular or the solution is not finite.
pub fn solve_2x2(a: [[Real; 2]; 2], b: [Real; 2]) -> Result<[Real; 2]> {
    let m = Matrix2::new(a[0][0], a[0][1], a[1][0], a[1][1]);
    let rhs = Vector2::new(b[0], b[1]);
    let z = m
        .lu()
        .solve(&rhs)
        .ok_or_else(|| Error::Numerical("2x2 system is singular".into()))?;
    if !(z[0].is_finite() && z[1].is_finite()) {
        return Err(Error::Numerical("2x2 solution is not finite".into()));
    }
    Ok([z[0], z[1]])
}
