// pppm/mod.rs
// Particle-particle particle-mesh long-range solver

pub mod error_estimate;
pub mod fft;
pub mod green;
pub mod mesh;
pub mod spline;
pub mod tuning;


pub use error_estimate::ErrorEstimate;
pub use green::GreenFunction;
pub use mesh::MeshForceSolver;
pub use tuning::{assess, tune, TuneStrategy, TuningBounds, TuningResult};

use crate::error::{Result, SimError};
use crate::simulation_box::SimulationBox;

/// Highest supported charge assignment order.
pub const MAX_CAO: usize = 7;

/// Alias images summed per axis in the optimized influence function.
pub const DEFAULT_ALIASES: usize = 3;

/// Parameters of one P3M split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct P3mParams {
    /// Ewald splitting parameter.
    pub alpha: f64,
    /// Pair cutoff.
    pub rc: f64,
    pub mesh: [usize; 3],
    /// Charge assignment order, 1 (nearest grid point) to `MAX_CAO`.
    pub cao: usize,
    /// Alias images summed on each side of the first Brillouin zone.
    pub aliases: [usize; 3],
}

impl P3mParams {
    pub fn mesh_points(&self) -> usize {
        self.mesh.iter().product()
    }

    pub fn spacing(&self, sim_box: &SimulationBox) -> [f64; 3] {
        let l = sim_box.lengths();
        [
            l[0] / self.mesh[0] as f64,
            l[1] / self.mesh[1] as f64,
            l[2] / self.mesh[2] as f64,
        ]
    }

    /// Reject parameters that cannot run on `sim_box`.
    pub fn validate(&self, sim_box: &SimulationBox) -> Result<()> {
        if !sim_box.all_periodic() {
            return Err(SimError::config(
                "the mesh solver needs periodic boundaries on every axis",
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(SimError::config(format!(
                "Ewald splitting parameter must be positive, got {}",
                self.alpha
            )));
        }
        if !(self.cao >= 1 && self.cao <= MAX_CAO) {
            return Err(SimError::config(format!(
                "charge assignment order must be in 1..={MAX_CAO}, got {}",
                self.cao
            )));
        }
        for (axis, &m) in self.mesh.iter().enumerate() {
            if m < self.cao {
                return Err(SimError::config(format!(
                    "mesh size {m} along axis {axis} is smaller than the assignment order {}",
                    self.cao
                )));
            }
        }
        sim_box.check_cutoff(self.rc)
    }
}
