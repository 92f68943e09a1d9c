//! Exponentially screened Coulomb law with a short-range correction,
//! U = Q e^{-κr} / r · (1 + a e^{-b r}).
//!
//! Per pair: `[Q, κ, a, b]`. Short range only.

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

pub const N_PARAMS: usize = 4;

pub fn matrix(
    species: &SpeciesTable,
    units: &Units,
    kappa: f64,
    amplitude: f64,
    decay: f64,
) -> Result<PotentialMatrix> {
    if !(kappa > 0.0 && decay > 0.0) {
        return Err(SimError::config(format!(
            "exponential screening needs positive screening and decay, got κ = {kappa}, b = {decay}"
        )));
    }
    if species.iter().all(|s| s.charge == 0.0) {
        return Err(SimError::config("exponential screening requires charged species"));
    }
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        out[0] = species.get(i).charge * species.get(j).charge / units.fourpie0;
        out[1] = kappa;
        out[2] = amplitude;
        out[3] = decay;
    }))
}

#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let (q, kappa, a, b) = (p[0], p[1], p[2], p[3]);
    let k2 = kappa + b;
    let e1 = (-kappa * r).exp();
    let e2 = a * (-k2 * r).exp();
    let u = q * (e1 + e2) / r;
    let f = q * (e1 * (1.0 + kappa * r) + e2 * (1.0 + k2 * r)) / (r * r);
    (u, f / r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn force_matches_numerical_derivative() {
        let p = [1.0, 0.5, 2.0, 3.0];
        let r = 0.7;
        let h = 1e-6;
        let du = (force(r + h, &p).0 - force(r - h, &p).0) / (2.0 * h);
        assert_relative_eq!(force(r, &p).1 * r, -du, max_relative = 1e-6);
    }
}
