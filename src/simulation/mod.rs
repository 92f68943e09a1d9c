// simulation/mod.rs
// Re-exports and module declarations for simulation submodules

pub mod forces;
pub mod integrator;
pub mod pair;
pub mod simulation;
pub mod thermal;
pub use forces::{ForceField, PotentialEnergy};
pub use integrator::{Integrator, IntegratorKind};
pub use pair::{PairForceSolver, RdfHistogram};
pub use simulation::*;
pub use thermal::{Berendsen, Thermostat};

#[cfg(test)]
mod tests;
