//! Combined force evaluation.
//!
//! Accelerations are rebuilt from zero on every call: pair part first, then
//! the mesh part when the interaction is split.

use log::debug;
use serde::{Deserialize, Serialize};

use super::pair::PairForceSolver;
use crate::error::{Result, SimError};
use crate::particles::Particles;
use crate::potential::PotentialSetup;
use crate::pppm::MeshForceSolver;
use crate::profile_scope;
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;

/// Potential energy split by solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialEnergy {
    pub pair: f64,
    pub mesh: f64,
}

impl PotentialEnergy {
    pub fn total(&self) -> f64 {
        self.pair + self.mesh
    }
}

pub struct ForceField {
    pub potential: PotentialSetup,
    pub pair: PairForceSolver,
    pub mesh: Option<MeshForceSolver>,
    /// Self and background energies removed from the mesh sum.
    mesh_offset: f64,
}

impl ForceField {
    pub fn new(
        potential: PotentialSetup,
        pair: PairForceSolver,
        mesh: Option<MeshForceSolver>,
        mesh_offset: f64,
    ) -> Self {
        Self {
            potential,
            pair,
            mesh,
            mesh_offset,
        }
    }

    pub fn mesh_offset(&self) -> f64 {
        self.mesh_offset
    }

    /// Recompute every acceleration. Fails on a non-finite result.
    pub fn compute(
        &mut self,
        particles: &mut Particles,
        species: &SpeciesTable,
        sim_box: &SimulationBox,
        step: usize,
    ) -> Result<PotentialEnergy> {
        profile_scope!("forces");
        particles.reset_acceleration();
        let pair = self
            .pair
            .compute(particles, &self.potential, species, sim_box, step)?;
        let mesh = match self.mesh.as_mut() {
            Some(solver) => solver.compute(particles) - self.mesh_offset,
            None => 0.0,
        };

        let bad: Vec<usize> = particles
            .acc
            .iter()
            .enumerate()
            .filter(|(_, a)| !(a.x.is_finite() && a.y.is_finite() && a.z.is_finite()))
            .map(|(i, _)| i)
            .collect();
        if !bad.is_empty() {
            return Err(SimError::instability(step, bad, "non-finite acceleration"));
        }
        debug!("step {step}: U_pp = {pair:.6e}, U_pm = {mesh:.6e}");
        Ok(PotentialEnergy { pair, mesh })
    }
}
