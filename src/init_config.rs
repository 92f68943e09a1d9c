// init_config.rs
// Run-file loading and seeded initial conditions

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use ultraviolet::DVec3;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::particles::Particles;
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;
use crate::units::Units;

/// Attempts per particle before rejection sampling gives up.
pub const MAX_REJECTION_ATTEMPTS: usize = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Uniform positions, optionally with a rejection radius.
    #[default]
    Random,
    /// Simple cubic lattice. N must be a perfect cube.
    Lattice,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub placement: Placement,
    /// Minimum separation between randomly placed particles.
    #[serde(default)]
    pub rejection_radius: Option<f64>,
    /// Lattice jitter as a fraction of the lattice spacing.
    #[serde(default)]
    pub perturbation: f64,
    /// Zero each species' net momentum after drawing velocities.
    #[serde(default = "default_remove_drift")]
    pub remove_drift: bool,
}

fn default_remove_drift() -> bool {
    true
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            placement: Placement::Random,
            rejection_radius: None,
            perturbation: 0.0,
            remove_drift: true,
        }
    }
}

/// Read and validate a TOML run file.
pub fn load_run_file<P: AsRef<Path>>(path: P) -> Result<SimConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let config = SimConfig::from_toml(&content)?;
    info!("loaded run file {}", path.display());
    Ok(config)
}

/// Build the starting ensemble: positions per `init.placement`, then
/// Maxwell-Boltzmann velocities at each species' temperature.
pub fn initialize_particles(
    init: &InitConfig,
    species: &SpeciesTable,
    sim_box: &SimulationBox,
    units: &Units,
) -> Result<Particles> {
    let mut rng = ChaCha8Rng::seed_from_u64(init.seed);
    let mut particles = Particles::from_species(species);
    particles.pos = match init.placement {
        Placement::Random => match init.rejection_radius {
            Some(r) if r > 0.0 => random_with_rejection(&mut rng, particles.len(), sim_box, r)?,
            _ => random_positions(&mut rng, particles.len(), sim_box),
        },
        Placement::Lattice => lattice_positions(&mut rng, particles.len(), sim_box, init.perturbation)?,
    };
    maxwell_boltzmann(&mut rng, &mut particles, species, units)?;
    if init.remove_drift {
        particles.remove_drift(species);
    }
    debug!(
        "initialized {} particles ({:?}, seed {})",
        particles.len(),
        init.placement,
        init.seed
    );
    Ok(particles)
}

fn uniform_point<R: Rng>(rng: &mut R, lengths: [f64; 3]) -> DVec3 {
    DVec3::new(
        rng.random::<f64>() * lengths[0],
        rng.random::<f64>() * lengths[1],
        rng.random::<f64>() * lengths[2],
    )
}

pub fn random_positions<R: Rng>(rng: &mut R, n: usize, sim_box: &SimulationBox) -> Vec<DVec3> {
    let lengths = sim_box.lengths();
    (0..n).map(|_| uniform_point(rng, lengths)).collect()
}

/// Uniform placement keeping every pair at least `radius` apart (minimum image).
pub fn random_with_rejection<R: Rng>(
    rng: &mut R,
    n: usize,
    sim_box: &SimulationBox,
    radius: f64,
) -> Result<Vec<DVec3>> {
    let lengths = sim_box.lengths();
    let r_sq = radius * radius;
    let mut placed: Vec<DVec3> = Vec::with_capacity(n);
    for i in 0..n {
        let mut accepted = false;
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            let trial = uniform_point(rng, lengths);
            let clear = placed
                .iter()
                .all(|&p| sim_box.minimum_image(trial - p).mag_sq() >= r_sq);
            if clear {
                placed.push(trial);
                accepted = true;
                break;
            }
        }
        if !accepted {
            return Err(SimError::config(format!(
                "could not place particle {i} with rejection radius {radius} after {MAX_REJECTION_ATTEMPTS} attempts"
            )));
        }
    }
    Ok(placed)
}

/// Simple cubic lattice with uniform jitter of `perturbation` lattice spacings.
pub fn lattice_positions<R: Rng>(
    rng: &mut R,
    n: usize,
    sim_box: &SimulationBox,
    perturbation: f64,
) -> Result<Vec<DVec3>> {
    let side = (n as f64).cbrt().round() as usize;
    if side.pow(3) != n {
        return Err(SimError::config(format!(
            "lattice placement needs a perfect cube particle count, got {n}"
        )));
    }
    let lengths = sim_box.lengths();
    let d = lengths.map(|l| l / side as f64);
    let mut pos = Vec::with_capacity(n);
    for i in 0..side {
        for j in 0..side {
            for k in 0..side {
                let site = [i, j, k];
                let mut p = [0.0; 3];
                for axis in 0..3 {
                    let jitter = perturbation * (rng.random::<f64>() - 0.5);
                    let x = (site[axis] as f64 + 0.5 + jitter) * d[axis];
                    p[axis] = x.rem_euclid(lengths[axis]).min(lengths[axis] * (1.0 - f64::EPSILON));
                }
                pos.push(DVec3::new(p[0], p[1], p[2]));
            }
        }
    }
    Ok(pos)
}

/// Per-component normal velocities with variance kB T / m.
pub fn maxwell_boltzmann<R: Rng>(
    rng: &mut R,
    particles: &mut Particles,
    species: &SpeciesTable,
    units: &Units,
) -> Result<()> {
    for (s, sp) in species.iter().enumerate() {
        let sigma = (units.kb * sp.temperature / sp.mass).sqrt();
        let normal = Normal::new(0.0, sigma).map_err(|e| {
            SimError::config(format!("bad thermal velocity for species {}: {e}", sp.name))
        })?;
        for i in species.range(s) {
            particles.vel[i] = DVec3::new(normal.sample(rng), normal.sample(rng), normal.sample(rng));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::SpeciesConfig;

    fn table(count: usize, temperature: f64) -> SpeciesTable {
        let cfg = SpeciesConfig {
            name: "ion".into(),
            count,
            mass: Some(1.0),
            charge: Some(1.0),
            number_density: Some(1.0),
            temperature: Some(temperature),
            ..Default::default()
        };
        SpeciesTable::from_config(&[cfg], &Units::reduced(), None, 0.0).unwrap()
    }

    #[test]
    fn same_seed_same_ensemble() {
        let t = table(50, 1.0);
        let b = SimulationBox::periodic_cube(5.0).unwrap();
        let init = InitConfig {
            seed: 7,
            ..Default::default()
        };
        let a = initialize_particles(&init, &t, &b, &Units::reduced()).unwrap();
        let c = initialize_particles(&init, &t, &b, &Units::reduced()).unwrap();
        assert_eq!(a, c);
        a.validate(&t, &b).unwrap();
    }

    #[test]
    fn drift_is_removed() {
        let t = table(200, 2.0);
        let b = SimulationBox::periodic_cube(6.0).unwrap();
        let p = initialize_particles(&InitConfig::default(), &t, &b, &Units::reduced()).unwrap();
        let momentum = p.vel.iter().fold(DVec3::zero(), |acc, v| acc + *v);
        assert!(momentum.mag() < 1e-10);
        let temp = p.kinetic_temperature(&t, 1.0)[0];
        assert!((temp - 2.0).abs() < 0.5, "T = {temp}");
    }

    #[test]
    fn rejection_radius_is_respected() {
        let b = SimulationBox::periodic_cube(5.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pos = random_with_rejection(&mut rng, 30, &b, 0.8).unwrap();
        for i in 0..pos.len() {
            for j in i + 1..pos.len() {
                assert!(b.minimum_image(pos[i] - pos[j]).mag() >= 0.8);
            }
        }
    }

    #[test]
    fn overfull_rejection_fails() {
        let b = SimulationBox::periodic_cube(1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(random_with_rejection(&mut rng, 10, &b, 0.9).is_err());
    }

    #[test]
    fn lattice_needs_a_cube() {
        let b = SimulationBox::periodic_cube(4.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(lattice_positions(&mut rng, 10, &b, 0.0).is_err());
        let pos = lattice_positions(&mut rng, 64, &b, 0.0).unwrap();
        assert_eq!(pos[0], DVec3::new(0.5, 0.5, 0.5));
        assert!(pos.iter().all(|&p| b.contains(p)));
    }
}
