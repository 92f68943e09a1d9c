//! Coulomb interaction and its Ewald real-space complement.
//!
//! Matrix parameters per pair: `[q_i q_j / 4πε0, α]`. With `α = 0` the bare
//! Coulomb law is evaluated (P3M disabled, open systems).

use std::f64::consts::PI;

use statrs::function::erf::erfc;

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

pub const N_PARAMS: usize = 2;

pub fn matrix(species: &SpeciesTable, units: &Units, alpha: f64) -> Result<PotentialMatrix> {
    if species.iter().all(|s| s.charge == 0.0) {
        return Err(SimError::config("Coulomb interaction requires charged species"));
    }
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        out[0] = species.get(i).charge * species.get(j).charge / units.fourpie0;
        out[1] = alpha;
    }))
}

/// Returns `(U, F/r)`.
#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let q = p[0];
    let alpha = p[1];
    let ar = alpha * r;
    let e = erfc(ar);
    let u = q * e / r;
    let f = q * (e / r + 2.0 * alpha / PI.sqrt() * (-ar * ar).exp()) / r;
    (u, f / r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bare_coulomb_without_splitting() {
        let (u, fr) = force(2.0, &[3.0, 0.0]);
        assert_relative_eq!(u, 1.5);
        assert_relative_eq!(fr * 2.0, 3.0 / 4.0);
    }

    #[test]
    fn real_space_force_is_minus_energy_derivative() {
        let p = [1.0, 0.8];
        let r = 1.3;
        let h = 1e-6;
        let du = (force(r + h, &p).0 - force(r - h, &p).0) / (2.0 * h);
        let (_, fr) = force(r, &p);
        assert_relative_eq!(fr * r, -du, max_relative = 1e-6);
    }
}
