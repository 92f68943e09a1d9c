//! Quantum statistical pseudo-potential for electron-ion plasmas.
//!
//! Deutsch diffraction term plus a Pauli repulsion between like electrons:
//!
//! U = Q/r (1 - e^{-2πr/Λ_ij}) + A e^{-d r²}
//!
//! with Λ_ij = h / sqrt(2π μ_ij k_B T_e), A = k_B T_e ln 2 and
//! d = 4π / (ln 2 Λ_ee²) for negatively charged like pairs, zero otherwise.
//! Per pair: `[Q, 2π/Λ_ij, A, d]`. Finite at r = 0.

use std::f64::consts::{LN_2, PI};

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

pub const N_PARAMS: usize = 4;

pub fn matrix(
    species: &SpeciesTable,
    units: &Units,
    electron_temperature: f64,
) -> Result<PotentialMatrix> {
    if !(electron_temperature > 0.0) {
        return Err(SimError::config(
            "quantum statistical potential needs a positive electron temperature",
        ));
    }
    let kt = units.kb * electron_temperature;
    let debroglie = |mi: f64, mj: f64| {
        let mu = mi * mj / (mi + mj);
        units.planck / (2.0 * PI * mu * kt).sqrt()
    };
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        let (si, sj) = (species.get(i), species.get(j));
        let lambda = debroglie(si.mass, sj.mass);
        out[0] = si.charge * sj.charge / units.fourpie0;
        out[1] = 2.0 * PI / lambda;
        if i == j && si.charge < 0.0 {
            out[2] = kt * LN_2;
            out[3] = 4.0 * PI / (LN_2 * lambda * lambda);
        }
    }))
}

#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let (q, c, a, d) = (p[0], p[1], p[2], p[3]);
    let e = (-c * r).exp();
    let g = a * (-d * r * r).exp();
    let u = q * (1.0 - e) / r + g;
    // the diffraction part is finite as r -> 0
    let fr = q * (1.0 - e * (1.0 + c * r)) / (r * r * r) + 2.0 * d * g;
    (u, fr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn finite_at_short_range() {
        let p = [-1.0, 2.0, 0.0, 0.0];
        let (u, _) = force(1e-8, &p);
        assert_relative_eq!(u, -2.0, max_relative = 1e-6);
    }

    #[test]
    fn force_matches_numerical_derivative() {
        let p = [1.0, 1.5, 0.3, 2.0];
        let r = 0.6;
        let h = 1e-6;
        let du = (force(r + h, &p).0 - force(r - h, &p).0) / (2.0 * h);
        assert_relative_eq!(force(r, &p).1 * r, -du, max_relative = 1e-6);
    }
}
