//! Generalised Lennard-Jones law U = 4ε [(σ/r)^m - (σ/r)^n].
//!
//! Per pair: `[ε_ij, σ_ij, m, n]` with Lorentz-Berthelot combination rules.

use super::PotentialMatrix;
use crate::error::{Result, SimError};
use crate::species::SpeciesTable;

pub const N_PARAMS: usize = 4;

pub fn matrix(species: &SpeciesTable, high: f64, low: f64) -> Result<PotentialMatrix> {
    if !(high > low && low > 0.0) {
        return Err(SimError::config(format!(
            "Lennard-Jones exponents must satisfy m > n > 0, got m = {high}, n = {low}"
        )));
    }
    let mut eps = Vec::with_capacity(species.len());
    let mut sig = Vec::with_capacity(species.len());
    for sp in species.iter() {
        match (sp.lj_epsilon, sp.lj_sigma) {
            (Some(e), Some(s)) if e > 0.0 && s > 0.0 => {
                eps.push(e);
                sig.push(s);
            }
            _ => {
                return Err(SimError::config(format!(
                    "species '{}' needs positive lj_epsilon and lj_sigma",
                    sp.name
                )))
            }
        }
    }
    Ok(PotentialMatrix::build(species.len(), N_PARAMS, |i, j, out| {
        out[0] = (eps[i] * eps[j]).sqrt();
        out[1] = 0.5 * (sig[i] + sig[j]);
        out[2] = high;
        out[3] = low;
    }))
}

/// Returns `(U, F/r)`.
#[inline]
pub fn force(r: f64, p: &[f64]) -> (f64, f64) {
    let (eps, sigma, m, n) = (p[0], p[1], p[2], p[3]);
    let s = sigma / r;
    let sm = s.powf(m);
    let sn = s.powf(n);
    let u = 4.0 * eps * (sm - sn);
    let f = 4.0 * eps * (m * sm - n * sn) / r;
    (u, f / r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn minimum_at_two_to_the_sixth_sigma() {
        let p = [1.0, 1.0, 12.0, 6.0];
        let rmin = 2f64.powf(1.0 / 6.0);
        let (u, fr) = force(rmin, &p);
        assert_relative_eq!(u, -1.0, epsilon = 1e-12);
        assert!(fr.abs() < 1e-12);
    }

    #[test]
    fn repulsive_inside_sigma() {
        let (_, fr) = force(0.9, &[1.0, 1.0, 12.0, 6.0]);
        assert!(fr > 0.0);
    }
}
