// potential/mod.rs
// Pair interaction laws, resolved once into a parameter matrix and an evaluator

pub mod coulomb;
pub mod exp_screened;
pub mod lennard_jones;
pub mod matrix;
pub mod moliere;
pub mod qsp;
pub mod yukawa;


pub use matrix::PotentialMatrix;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::{Result, SimError};
use crate::species::SpeciesTable;
use crate::units::Units;

fn default_high() -> f64 {
    12.0
}

fn default_low() -> f64 {
    6.0
}

/// Interaction law selected in the run file.
///
/// Screening is given either as an absolute `screening_length` or as `kappa`
/// in units of the inverse Wigner-Seitz radius.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PotentialLaw {
    #[default]
    Coulomb,
    Yukawa {
        #[serde(default)]
        screening_length: Option<f64>,
        #[serde(default)]
        kappa: Option<f64>,
    },
    LennardJones {
        #[serde(default = "default_high")]
        high: f64,
        #[serde(default = "default_low")]
        low: f64,
    },
    ExponentialScreened {
        #[serde(default)]
        screening_length: Option<f64>,
        #[serde(default)]
        kappa: Option<f64>,
        amplitude: f64,
        decay: f64,
    },
    Moliere {
        coefficients: [f64; 3],
        decays: [f64; 3],
    },
    QuantumStatistical {
        electron_temperature: f64,
    },
}

/// Parameters of the reciprocal-space half of an Ewald split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongRange {
    /// Screening wavenumber, zero for Coulomb.
    pub kappa: f64,
    /// Ewald splitting parameter.
    pub alpha: f64,
}

pub type PairFn = fn(f64, &[f64]) -> (f64, f64);

/// A law resolved against a species table.
///
/// `eval` is picked once here so the pair loop never matches on the law.
#[derive(Clone, Debug)]
pub struct PotentialSetup {
    pub law: PotentialLaw,
    pub matrix: PotentialMatrix,
    /// Present when a mesh solver supplies the long-range part.
    pub long_range: Option<LongRange>,
    /// Screening wavenumber of the law, if it has one.
    pub kappa: f64,
    eval: PairFn,
    /// U(rc) per species pair, subtracted from every pair energy. Empty when
    /// the energy is not shifted.
    energy_shift: Vec<f64>,
}

impl PotentialLaw {
    pub fn name(&self) -> &'static str {
        match self {
            PotentialLaw::Coulomb => "coulomb",
            PotentialLaw::Yukawa { .. } => "yukawa",
            PotentialLaw::LennardJones { .. } => "lennard_jones",
            PotentialLaw::ExponentialScreened { .. } => "exponential_screened",
            PotentialLaw::Moliere { .. } => "moliere",
            PotentialLaw::QuantumStatistical { .. } => "quantum_statistical",
        }
    }

    /// Whether the law has a 1/r tail that the mesh solver can carry.
    pub fn is_long_range(&self) -> bool {
        matches!(self, PotentialLaw::Coulomb | PotentialLaw::Yukawa { .. })
    }

    /// Screening wavenumber in simulation units. Zero for unscreened laws.
    pub fn screening_wavenumber(&self, a_ws: f64) -> Result<f64> {
        let resolve = |length: Option<f64>, kappa: Option<f64>| match (length, kappa) {
            (Some(l), _) if l > 0.0 => Ok(1.0 / l),
            (None, Some(k)) if k > 0.0 => Ok(k / a_ws),
            _ => Err(SimError::config(format!(
                "{} needs a positive screening_length or kappa",
                self.name()
            ))),
        };
        match self {
            PotentialLaw::Yukawa {
                screening_length,
                kappa,
            }
            | PotentialLaw::ExponentialScreened {
                screening_length,
                kappa,
                ..
            } => resolve(*screening_length, *kappa),
            _ => Ok(0.0),
        }
    }

    /// Build the pair matrix and evaluator.
    ///
    /// `alpha` is the Ewald splitting parameter when the mesh solver is active.
    /// Short-range laws reject it.
    pub fn setup(
        &self,
        species: &SpeciesTable,
        units: &Units,
        alpha: Option<f64>,
    ) -> Result<PotentialSetup> {
        if let Some(a) = alpha {
            if !self.is_long_range() {
                return Err(SimError::config(format!(
                    "{} is short-range only and cannot use the mesh solver",
                    self.name()
                )));
            }
            if !(a.is_finite() && a > 0.0) {
                return Err(SimError::config(format!(
                    "Ewald splitting parameter must be positive, got {a}"
                )));
            }
        }
        let kappa = self.screening_wavenumber(species.a_ws())?;
        let split = alpha.unwrap_or(0.0);

        let (matrix, eval): (PotentialMatrix, PairFn) = match self {
            PotentialLaw::Coulomb => (coulomb::matrix(species, units, split)?, coulomb::force),
            PotentialLaw::Yukawa { .. } => {
                (yukawa::matrix(species, units, kappa, split)?, yukawa::force)
            }
            PotentialLaw::LennardJones { high, low } => (
                lennard_jones::matrix(species, *high, *low)?,
                lennard_jones::force,
            ),
            PotentialLaw::ExponentialScreened {
                amplitude, decay, ..
            } => (
                exp_screened::matrix(species, units, kappa, *amplitude, *decay)?,
                exp_screened::force,
            ),
            PotentialLaw::Moliere {
                coefficients,
                decays,
            } => (
                moliere::matrix(species, units, *coefficients, *decays)?,
                moliere::force,
            ),
            PotentialLaw::QuantumStatistical {
                electron_temperature,
            } => (
                qsp::matrix(species, units, *electron_temperature)?,
                qsp::force,
            ),
        };

        Ok(PotentialSetup {
            law: self.clone(),
            matrix,
            long_range: alpha.map(|alpha| LongRange { kappa, alpha }),
            kappa,
            eval,
            energy_shift: Vec::new(),
        })
    }
}

impl PotentialSetup {
    /// `(U, F/r)` for a pair of species at separation `r`.
    #[inline]
    pub fn pair(&self, r: f64, si: usize, sj: usize) -> (f64, f64) {
        let (u, fr) = (self.eval)(r, self.matrix.params(si, sj));
        match self.energy_shift.get(si * self.matrix.n_species() + sj) {
            Some(shift) => (u - shift, fr),
            None => (u, fr),
        }
    }

    /// Make pair energies vanish at the cutoff so pairs crossing `rc` leave
    /// the total energy continuous. Forces are unchanged.
    ///
    /// Split laws are left alone: their real-space tail at `rc` is already
    /// negligible and the Ewald sum needs the unshifted term.
    pub fn shift_to_cutoff(&mut self, rc: f64) {
        if self.is_split() {
            return;
        }
        let n = self.matrix.n_species();
        self.energy_shift = (0..n * n)
            .map(|ij| (self.eval)(rc, self.matrix.params(ij / n, ij % n)).0)
            .collect();
    }

    /// Energy subtracted from pairs of species `si` and `sj`.
    pub fn energy_shift(&self, si: usize, sj: usize) -> f64 {
        self.energy_shift
            .get(si * self.matrix.n_species() + sj)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_split(&self) -> bool {
        self.long_range.is_some()
    }

    /// Interaction of each charge with its own screening cloud.
    pub fn self_energy(&self, charges: &[f64], units: &Units) -> f64 {
        let Some(lr) = self.long_range else {
            return 0.0;
        };
        let q2: f64 = charges.iter().map(|q| q * q).sum();
        let beta = lr.kappa / (2.0 * lr.alpha);
        let per_charge =
            lr.alpha / PI.sqrt() * (-beta * beta).exp() - 0.5 * lr.kappa * erfc(beta);
        q2 * per_charge / units.fourpie0
    }

    /// k = 0 energy of a net-charged system, which the mesh sum skips.
    ///
    /// Coulomb: the uniform neutralising background, −π Q²/(2Vα²).
    /// Yukawa: the finite screened term 2π Q² e^{−κ²/4α²}/(κ²V).
    pub fn background_energy(&self, net_charge: f64, volume: f64, units: &Units) -> f64 {
        let Some(lr) = self.long_range else {
            return 0.0;
        };
        let q2 = net_charge * net_charge;
        if lr.kappa == 0.0 {
            -PI * q2 / (2.0 * volume * lr.alpha * lr.alpha) / units.fourpie0
        } else {
            let beta = lr.kappa / (2.0 * lr.alpha);
            2.0 * PI * q2 * (-beta * beta).exp() / (lr.kappa * lr.kappa * volume) / units.fourpie0
        }
    }
}
