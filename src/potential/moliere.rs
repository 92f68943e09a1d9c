//! Moliere screened nuclear repulsion, U = Q/r Σ_k C_k e^{-b_k r}.
//!
//! Per pair: `[Q, C1, C2, C3, b1, b2, b3]`.

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

pub const N_PARAMS: usize = 7;

pub fn matrix(
    species: &SpeciesTable,
    units: &Units,
    coefficients: [f64; 3],
    decays: [f64; 3],
) -> Result<PotentialMatrix> {
    if decays.iter().any(|&b| !(b > 0.0)) {
        return Err(SimError::config("Moliere decay constants must be positive"));
    }
    if species.iter().all(|s| s.charge == 0.0) {
        return Err(SimError::config("Moliere interaction requires charged species"));
    }
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        out[0] = species.get(i).charge * species.get(j).charge / units.fourpie0;
        out[1..4].copy_from_slice(&coefficients);
        out[4..7].copy_from_slice(&decays);
    }))
}

#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let q = p[0];
    let mut u = 0.0;
    let mut f = 0.0;
    for k in 0..3 {
        let c = p[1 + k];
        let b = p[4 + k];
        let e = c * (-b * r).exp();
        u += e;
        f += e * (1.0 + b * r);
    }
    (q * u / r, q * f / (r * r * r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_moliere_coefficients_sum_to_one() {
        // Moliere: C = (0.35, 0.55, 0.10), b = (0.3, 1.2, 6.0)
        let p = [1.0, 0.35, 0.55, 0.10, 0.3, 1.2, 6.0];
        let r = 1e-4;
        // close to the bare Coulomb law at short range
        assert_relative_eq!(force(r, &p).0 * r, 1.0, max_relative = 1e-3);
        let h = 1e-6;
        let r = 0.8;
        let du = (force(r + h, &p).0 - force(r - h, &p).0) / (2.0 * h);
        assert_relative_eq!(force(r, &p).1 * r, -du, max_relative = 1e-6);
    }
}
