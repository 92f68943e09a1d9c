//! Yukawa (screened Coulomb) interaction with its Ewald real-space part.
//!
//! Per pair: `[q_i q_j / 4πε0, κ, α]`. The real-space complement is
//!
//! U(r) = Q / 2r · [ e^{κr} erfc(αr + κ/2α) + e^{-κr} erfc(αr - κ/2α) ]
//!
//! which reduces to the bare Q e^{-κr} / r when α = 0.

use std::f64::consts::PI;

use statrs::function::erf::erfc;

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

pub const N_PARAMS: usize = 3;

pub fn matrix(
    species: &SpeciesTable,
    units: &Units,
    kappa: f64,
    alpha: f64,
) -> Result<PotentialMatrix> {
    if !(kappa.is_finite() && kappa > 0.0) {
        return Err(SimError::config(format!(
            "Yukawa screening wavenumber must be positive, got {kappa}"
        )));
    }
    if species.iter().all(|s| s.charge == 0.0) {
        return Err(SimError::config("Yukawa interaction requires charged species"));
    }
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        out[0] = species.get(i).charge * species.get(j).charge / units.fourpie0;
        out[1] = kappa;
        out[2] = alpha;
    }))
}

/// Returns `(U, F/r)`.
#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let (q, kappa, alpha) = (p[0], p[1], p[2]);
    if alpha == 0.0 {
        let e = (-kappa * r).exp();
        let u = q * e / r;
        let f = q * e * (1.0 + kappa * r) / (r * r);
        return (u, f / r);
    }
    let beta = kappa / (2.0 * alpha);
    let plus = (kappa * r).exp() * erfc(alpha * r + beta);
    let minus = (-kappa * r).exp() * erfc(alpha * r - beta);
    let gauss = 2.0 * alpha / PI.sqrt() * (-alpha * alpha * r * r - beta * beta).exp();

    let u = 0.5 * q * (plus + minus) / r;
    // -dU/dr
    let f = 0.5 * q * (plus + minus) / (r * r) - 0.5 * q * (kappa * (plus - minus) - 2.0 * gauss) / r;
    (u, f / r)
}
