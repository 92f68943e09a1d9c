// particles.rs
// Structure-of-arrays particle ensemble

use ultraviolet::DVec3;

use crate::error::{Result, SimError};
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;

/// Particle state. Every array has the same length N; species blocks are contiguous.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Particles {
    pub pos: Vec<DVec3>,
    pub vel: Vec<DVec3>,
    pub acc: Vec<DVec3>,
    pub charge: Vec<f64>,
    pub mass: Vec<f64>,
    pub species: Vec<usize>,
    /// Net number of periodic wraps per axis.
    pub image: Vec<[i64; 3]>,
    /// Set once a particle has hit an absorbing wall.
    pub absorbed: Vec<bool>,
}

impl Particles {
    /// Zeroed ensemble with mass, charge and species filled from the table.
    pub fn from_species(table: &SpeciesTable) -> Self {
        let n = table.total_count();
        let mut p = Self {
            pos: vec![DVec3::zero(); n],
            vel: vec![DVec3::zero(); n],
            acc: vec![DVec3::zero(); n],
            charge: vec![0.0; n],
            mass: vec![0.0; n],
            species: vec![0; n],
            image: vec![[0; 3]; n],
            absorbed: vec![false; n],
        };
        for (s, sp) in table.iter().enumerate() {
            for i in table.range(s) {
                p.charge[i] = sp.charge;
                p.mass[i] = sp.mass;
                p.species[i] = s;
            }
        }
        p
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Check the ensemble against the species table and box.
    pub fn validate(&self, table: &SpeciesTable, sim_box: &SimulationBox) -> Result<()> {
        let n = self.pos.len();
        let lens = [
            self.vel.len(),
            self.acc.len(),
            self.charge.len(),
            self.mass.len(),
            self.species.len(),
            self.image.len(),
            self.absorbed.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(SimError::config("particle arrays have inconsistent lengths"));
        }
        if n != table.total_count() {
            return Err(SimError::config(format!(
                "ensemble holds {n} particles but species counts sum to {}",
                table.total_count()
            )));
        }
        for s in 0..table.len() {
            if let Some(i) = table.range(s).find(|&i| self.species[i] != s) {
                return Err(SimError::config(format!(
                    "particle {i} is not in its species block {s}"
                )));
            }
        }
        if let Some(i) = (0..n).find(|&i| !sim_box.contains(self.pos[i])) {
            return Err(SimError::config(format!(
                "particle {i} at {:?} lies outside the box",
                self.pos[i]
            )));
        }
        Ok(())
    }

    pub fn reset_acceleration(&mut self) {
        self.acc.iter_mut().for_each(|a| *a = DVec3::zero());
    }

    pub fn total_charge(&self) -> f64 {
        self.charge.iter().sum()
    }

    /// Kinetic energy per species.
    pub fn kinetic_energy(&self, table: &SpeciesTable) -> Vec<f64> {
        (0..table.len())
            .map(|s| {
                table
                    .range(s)
                    .filter(|&i| !self.absorbed[i])
                    .map(|i| 0.5 * self.mass[i] * self.vel[i].mag_sq())
                    .sum()
            })
            .collect()
    }

    /// Particles of species `s` still in the box.
    pub fn live_count(&self, table: &SpeciesTable, s: usize) -> usize {
        table.range(s).filter(|&i| !self.absorbed[i]).count()
    }

    /// Kinetic temperature per species over live particles, T = 2K / (3 N kB).
    pub fn kinetic_temperature(&self, table: &SpeciesTable, kb: f64) -> Vec<f64> {
        self.kinetic_energy(table)
            .into_iter()
            .enumerate()
            .map(|(s, k)| {
                let n = self.live_count(table, s);
                if n == 0 {
                    0.0
                } else {
                    2.0 * k / (3.0 * kb * n as f64)
                }
            })
            .collect()
    }

    /// Remove each species' centre-of-mass drift. Absorbed particles stay pinned.
    pub fn remove_drift(&mut self, table: &SpeciesTable) {
        for s in 0..table.len() {
            let mut momentum = DVec3::zero();
            let mut mass = 0.0;
            for i in table.range(s).filter(|&i| !self.absorbed[i]) {
                momentum += self.vel[i] * self.mass[i];
                mass += self.mass[i];
            }
            if mass == 0.0 {
                continue;
            }
            let drift = momentum / mass;
            for i in table.range(s) {
                if !self.absorbed[i] {
                    self.vel[i] -= drift;
                }
            }
        }
    }

    /// Positions with periodic wraps undone.
    pub fn unwrapped_positions(&self, sim_box: &SimulationBox) -> Vec<DVec3> {
        let l = sim_box.lengths();
        self.pos
            .iter()
            .zip(&self.image)
            .map(|(p, img)| {
                DVec3::new(
                    p.x + img[0] as f64 * l[0],
                    p.y + img[1] as f64 * l[1],
                    p.z + img[2] as f64 * l[2],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::SpeciesConfig;
    use crate::units::Units;
    use approx::assert_relative_eq;

    fn table() -> SpeciesTable {
        let cfg = |name: &str, count, mass| SpeciesConfig {
            name: name.into(),
            count,
            mass: Some(mass),
            z: Some(1.0),
            number_density: Some(1.0),
            ..Default::default()
        };
        SpeciesTable::from_config(&[cfg("a", 3, 1.0), cfg("b", 2, 4.0)], &Units::reduced(), None, 0.0)
            .unwrap()
    }

    #[test]
    fn species_blocks_are_filled() {
        let p = Particles::from_species(&table());
        assert_eq!(p.species, vec![0, 0, 0, 1, 1]);
        assert_eq!(p.mass[4], 4.0);
    }

    #[test]
    fn remove_drift_zeroes_species_momentum() {
        let t = table();
        let mut p = Particles::from_species(&t);
        for (i, v) in p.vel.iter_mut().enumerate() {
            *v = DVec3::new(i as f64, 1.0, -2.0);
        }
        p.remove_drift(&t);
        for s in 0..t.len() {
            let m: DVec3 = t.range(s).map(|i| p.vel[i] * p.mass[i]).fold(DVec3::zero(), |a, b| a + b);
            assert!(m.mag() < 1e-12);
        }
    }

    #[test]
    fn temperature_from_kinetic_energy() {
        let t = table();
        let mut p = Particles::from_species(&t);
        for v in p.vel.iter_mut() {
            *v = DVec3::new(1.0, 0.0, 0.0);
        }
        let temps = p.kinetic_temperature(&t, 1.0);
        // K = 3 * 0.5 * 1 * 1 -> T = 2K / (3 * 3) = 1/3
        assert_relative_eq!(temps[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(temps[1], 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn absorbed_particles_sit_out_drift_and_temperature() {
        let t = table();
        let mut p = Particles::from_species(&t);
        p.vel[0] = DVec3::new(3.0, 0.0, 0.0);
        p.vel[1] = DVec3::new(1.0, 0.0, 0.0);
        p.absorbed[2] = true;
        p.remove_drift(&t);
        assert_eq!(p.vel[2], DVec3::zero());
        assert_relative_eq!(p.vel[0].x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.vel[1].x, -1.0, epsilon = 1e-12);

        assert_eq!(p.live_count(&t, 0), 2);
        // K = 0.5 * (1 + 1) over two live particles -> T = 1/3
        assert_relative_eq!(p.kinetic_temperature(&t, 1.0)[0], 1.0 / 3.0, epsilon = 1e-12);
    }
}
