//! Species table: per-species mass, charge, count and derived plasma parameters.
//!
//! Particles of one species occupy a contiguous block of the ensemble, in the
//! order the species are listed.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::simulation_box::wigner_seitz_radius;
use crate::units::Units;

/// Species entry as written in a run file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub count: usize,
    /// Mass in the run's unit system. Takes precedence over `atomic_weight`.
    #[serde(default)]
    pub mass: Option<f64>,
    /// Mass in proton masses.
    #[serde(default)]
    pub atomic_weight: Option<f64>,
    /// Charge in the run's unit system. Takes precedence over `z`.
    #[serde(default)]
    pub charge: Option<f64>,
    /// Charge number (multiples of the elementary charge).
    #[serde(default)]
    pub z: Option<f64>,
    /// Number density. Defaults to count / box volume.
    #[serde(default)]
    pub number_density: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub temperature_ev: Option<f64>,
    #[serde(default)]
    pub lj_epsilon: Option<f64>,
    #[serde(default)]
    pub lj_sigma: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    pub name: String,
    pub mass: f64,
    pub charge: f64,
    pub count: usize,
    pub number_density: f64,
    pub temperature: f64,
    pub lj_epsilon: Option<f64>,
    pub lj_sigma: Option<f64>,
    pub plasma_frequency: f64,
    pub debye_length: f64,
    pub cyclotron_frequency: f64,
    pub coupling: f64,
}

impl Species {
    /// Wigner-Seitz radius of this species alone.
    pub fn wigner_seitz_radius(&self) -> f64 {
        wigner_seitz_radius(self.number_density)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesTable {
    species: Vec<Species>,
    offsets: Vec<usize>,
    total_density: f64,
    a_ws: f64,
    total_plasma_frequency: f64,
    total_net_charge: f64,
    average_charge: f64,
    average_mass: f64,
}

impl SpeciesTable {
    /// Resolve masses, charges and densities, then derive plasma parameters.
    ///
    /// `volume` supplies the default density for species that do not state one.
    /// `magnetic_field` is the field magnitude, zero when unmagnetized.
    pub fn from_config(
        configs: &[SpeciesConfig],
        units: &Units,
        volume: Option<f64>,
        magnetic_field: f64,
    ) -> Result<Self> {
        if configs.is_empty() {
            return Err(SimError::config("at least one species is required"));
        }
        let mut species = Vec::with_capacity(configs.len());
        for cfg in configs {
            species.push(resolve_species(cfg, units, volume)?);
        }
        let total: usize = species.iter().map(|s| s.count).sum();
        if total == 0 {
            return Err(SimError::config("species counts sum to zero"));
        }

        let total_density: f64 = species.iter().map(|s| s.number_density).sum();
        let a_ws = wigner_seitz_radius(total_density);

        let mut wp_sq = 0.0;
        let mut offsets = Vec::with_capacity(species.len() + 1);
        let mut start = 0;
        for sp in &mut species {
            offsets.push(start);
            start += sp.count;
            sp.plasma_frequency = plasma_frequency(sp, units);
            sp.debye_length = debye_length(sp, units);
            sp.cyclotron_frequency = sp.charge * magnetic_field * units.lorentz / sp.mass;
            sp.coupling = coupling(sp, units);
            wp_sq += sp.plasma_frequency * sp.plasma_frequency;
        }
        offsets.push(start);

        let total_net_charge = species.iter().map(|s| s.charge * s.count as f64).sum();
        let average_charge = species
            .iter()
            .map(|s| s.charge * s.count as f64 / total as f64)
            .sum();
        let average_mass = species
            .iter()
            .map(|s| s.mass * s.count as f64 / total as f64)
            .sum();

        Ok(Self {
            species,
            offsets,
            total_density,
            a_ws,
            total_plasma_frequency: wp_sq.sqrt(),
            total_net_charge,
            average_charge,
            average_mass,
        })
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    pub fn get(&self, index: usize) -> &Species {
        &self.species[index]
    }

    pub fn total_count(&self) -> usize {
        self.offsets[self.species.len()]
    }

    /// Particle index range occupied by species `index`.
    pub fn range(&self, index: usize) -> Range<usize> {
        self.offsets[index]..self.offsets[index + 1]
    }

    pub fn total_density(&self) -> f64 {
        self.total_density
    }

    /// Wigner-Seitz radius from the total number density.
    pub fn a_ws(&self) -> f64 {
        self.a_ws
    }

    pub fn total_plasma_frequency(&self) -> f64 {
        self.total_plasma_frequency
    }

    pub fn total_net_charge(&self) -> f64 {
        self.total_net_charge
    }

    pub fn average_charge(&self) -> f64 {
        self.average_charge
    }

    pub fn average_mass(&self) -> f64 {
        self.average_mass
    }

    /// Concentration-weighted temperature.
    pub fn mean_temperature(&self) -> f64 {
        let total = self.total_count() as f64;
        self.species
            .iter()
            .map(|s| s.temperature * s.count as f64 / total)
            .sum()
    }

    /// Number of unordered species pairs.
    pub fn pair_count(&self) -> usize {
        let n = self.species.len();
        n * (n + 1) / 2
    }

    /// Index of the unordered pair (i, j) in upper-triangular order.
    #[inline]
    pub fn pair_index(&self, i: usize, j: usize) -> usize {
        let n = self.species.len();
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        a * n - a * (a + 1) / 2 + b
    }
}

fn resolve_species(cfg: &SpeciesConfig, units: &Units, volume: Option<f64>) -> Result<Species> {
    let mass = match (cfg.mass, cfg.atomic_weight) {
        (Some(m), _) => m,
        (None, Some(w)) => w * units.mp,
        (None, None) => {
            return Err(SimError::config(format!("species '{}' has no mass", cfg.name)))
        }
    };
    if !(mass.is_finite() && mass > 0.0) {
        return Err(SimError::config(format!(
            "species '{}' mass must be positive, got {mass}",
            cfg.name
        )));
    }
    let charge = match (cfg.charge, cfg.z) {
        (Some(q), _) => q,
        (None, Some(z)) => z * units.qe,
        (None, None) => 0.0,
    };
    let number_density = match (cfg.number_density, volume) {
        (Some(n), _) => n,
        (None, Some(v)) => cfg.count as f64 / v,
        (None, None) => {
            return Err(SimError::config(format!(
                "species '{}' needs a number density when the box size is not given",
                cfg.name
            )))
        }
    };
    if !(number_density.is_finite() && number_density >= 0.0) {
        return Err(SimError::config(format!(
            "species '{}' number density must be non-negative",
            cfg.name
        )));
    }
    let temperature = match (cfg.temperature, cfg.temperature_ev) {
        (Some(t), _) => t,
        (None, Some(t_ev)) => t_ev * units.ev_to_kelvin(),
        (None, None) => 0.0,
    };
    if temperature < 0.0 {
        return Err(SimError::config(format!(
            "species '{}' temperature must be non-negative",
            cfg.name
        )));
    }

    Ok(Species {
        name: cfg.name.clone(),
        mass,
        charge,
        count: cfg.count,
        number_density,
        temperature,
        lj_epsilon: cfg.lj_epsilon,
        lj_sigma: cfg.lj_sigma,
        plasma_frequency: 0.0,
        debye_length: f64::INFINITY,
        cyclotron_frequency: 0.0,
        coupling: 0.0,
    })
}

fn plasma_frequency(sp: &Species, units: &Units) -> f64 {
    if sp.charge != 0.0 {
        (4.0 * std::f64::consts::PI * sp.charge * sp.charge * sp.number_density
            / (sp.mass * units.fourpie0))
            .sqrt()
    } else if let (Some(eps), Some(sigma)) = (sp.lj_epsilon, sp.lj_sigma) {
        // neutral systems use the LJ time scale
        (eps / (sp.mass * sigma * sigma)).sqrt()
    } else {
        0.0
    }
}

fn debye_length(sp: &Species, units: &Units) -> f64 {
    if sp.charge == 0.0 || sp.number_density == 0.0 {
        return f64::INFINITY;
    }
    (sp.temperature * units.kb * units.fourpie0
        / (4.0 * std::f64::consts::PI * sp.charge * sp.charge * sp.number_density))
        .sqrt()
}

fn coupling(sp: &Species, units: &Units) -> f64 {
    if sp.temperature == 0.0 || sp.number_density == 0.0 {
        return f64::INFINITY;
    }
    let a_i = wigner_seitz_radius(sp.number_density);
    sp.charge * sp.charge / (a_i * units.fourpie0 * units.kb * sp.temperature)
}
