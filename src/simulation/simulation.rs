// simulation/simulation.rs
// The Simulation struct: setup from a SimConfig, stepping and halting

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::forces::{ForceField, PotentialEnergy};
use super::integrator::Integrator;
use super::pair::{PairForceSolver, RdfHistogram};
use super::thermal::{Berendsen, Thermostat};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::init_config::initialize_particles;
use crate::io::{CheckpointSink, FileCheckpoint, Snapshot};
use crate::particles::Particles;
use crate::pppm::{self, ErrorEstimate, MeshForceSolver, P3mParams};
use crate::profile_scope;
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;
use crate::units::Units;
use crate::utils::from_array;

/// Energies after a completed step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyReport {
    pub kinetic: f64,
    pub potential: PotentialEnergy,
    pub total: f64,
    /// Kinetic temperature per species.
    pub temperatures: Vec<f64>,
}

impl EnergyReport {
    fn measure(particles: &Particles, species: &SpeciesTable, units: &Units, potential: PotentialEnergy) -> Self {
        let kinetic: f64 = particles.kinetic_energy(species).iter().sum();
        Self {
            kinetic,
            potential,
            total: kinetic + potential.total(),
            temperatures: particles.kinetic_temperature(species, units.kb),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HaltReason {
    StepLimit,
    StopRequested,
    NonFiniteAcceleration { step: usize, particles: Vec<usize> },
    EnergyDivergence { step: usize, energy: f64, reference: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    Running,
    Halted(HaltReason),
}

/// Mesh parameters in use and their force error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct P3mSummary {
    pub params: P3mParams,
    /// Analytic PP/PM estimate.
    pub estimate: ErrorEstimate,
    /// PM error from the residual of the optimized influence function sum.
    pub mesh_pm_error: f64,
}

pub struct Simulation {
    config: SimConfig,
    units: Units,
    sim_box: SimulationBox,
    species: SpeciesTable,
    particles: Particles,
    forces: ForceField,
    integrator: Integrator,
    thermostat: Option<Box<dyn Thermostat>>,
    checkpoint: Option<Box<dyn CheckpointSink>>,
    p3m: Option<P3mSummary>,
    step: usize,
    state: RunState,
    stop: Arc<AtomicBool>,
    energy: EnergyReport,
    /// E0 for the divergence check.
    reference_energy: f64,
    was_thermostatted: bool,
}

impl Simulation {
    /// Full setup with particles drawn from `config.init`.
    pub fn new(config: SimConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Setup with a caller-supplied ensemble. Species blocks must match the table.
    pub fn with_particles(config: SimConfig, particles: Particles) -> Result<Self> {
        Self::build(config, Some(particles))
    }

    fn build(config: SimConfig, particles: Option<Particles>) -> Result<Self> {
        profile_scope!("setup");
        config.validate()?;
        let units = Units::new(config.units);
        let field = from_array(config.integrator.magnetic_field);

        let (sim_box, species) = resolve_system(&config, &units)?;
        let a_ws = species.a_ws();
        info!(
            "{} particles in {} species, box {:?}, a_ws = {a_ws:.6e}",
            species.total_count(),
            species.len(),
            sim_box.lengths()
        );
        for sp in species.iter() {
            debug!(
                "species {}: n = {:.4e}, wp = {:.4e}, Gamma = {:.4e}, lambda_D = {:.4e}",
                sp.name, sp.number_density, sp.plasma_frequency, sp.coupling, sp.debye_length
            );
        }

        let law = &config.potential.law;
        let kappa = law.screening_wavenumber(a_ws)?;
        let (p3m, mesh) = if config.pppm.enabled {
            let (params, estimate) = select_p3m(&config, &sim_box, &species, kappa)?;
            let solver = MeshForceSolver::new(
                params,
                &sim_box,
                kappa,
                units.fourpie0,
                species.total_count(),
                a_ws,
            )?;
            let summary = P3mSummary {
                params,
                estimate,
                mesh_pm_error: solver.green().pm_error,
            };
            report_p3m(&summary, config.pppm.tolerance);
            (Some(summary), Some(solver))
        } else {
            (None, None)
        };
        let mut potential = law.setup(&species, &units, p3m.map(|p| p.params.alpha))?;
        if law.is_long_range() && kappa == 0.0 && p3m.is_none() {
            warn!("bare Coulomb truncated at rc without the mesh solver");
        }

        let rc = match (p3m, config.potential.rc) {
            (Some(p), _) => p.params.rc,
            (None, Some(rc)) => rc,
            (None, None) => return Err(SimError::config("no pair cutoff configured")),
        };
        potential.shift_to_cutoff(rc);
        let pair = PairForceSolver::new(
            &sim_box,
            rc,
            config.potential.min_separation,
            config.potential.linked_list,
            config.potential.rdf_nbins,
            species.pair_count(),
        )?;

        let mut particles = match particles {
            Some(p) => p,
            None => initialize_particles(&config.init, &species, &sim_box, &units)?,
        };
        particles.validate(&species, &sim_box)?;

        let offset = if mesh.is_some() {
            potential.self_energy(&particles.charge, &units)
                - potential.background_energy(particles.total_charge(), sim_box.volume(), &units)
        } else {
            0.0
        };
        let mut forces = ForceField::new(potential, pair, mesh, offset);

        let thermostat: Option<Box<dyn Thermostat>> = if config.thermostat.enabled {
            let targets = config
                .thermostat
                .temperatures
                .clone()
                .unwrap_or_else(|| species.iter().map(|s| s.temperature).collect());
            Some(Box::new(Berendsen::new(
                targets,
                config.thermostat.tau,
                config.thermostat.activation_step,
                config.thermostat.off_step,
            )))
        } else {
            None
        };
        let checkpoint: Option<Box<dyn CheckpointSink>> = match &config.output.dir {
            Some(dir) if config.output.dump_every > 0 => Some(Box::new(FileCheckpoint::new(
                dir,
                config.output.format,
                config.output.compress,
            )?)),
            _ => None,
        };

        let integrator = Integrator::new(
            config.integrator.kind,
            config.integrator.dt,
            field,
            units.lorentz,
            config.magnetization_start(),
        );

        let potential_energy = match forces.compute(&mut particles, &species, &sim_box, 0) {
            Ok(e) => e,
            Err(SimError::NumericalInstability { particles: bad, .. }) => {
                return Err(SimError::config(format!(
                    "initial configuration gives non-finite forces on particles {bad:?}"
                )));
            }
            Err(e) => return Err(e),
        };
        let energy = EnergyReport::measure(&particles, &species, &units, potential_energy);
        info!(
            "E0 = {:.8e} (K = {:.6e}, U_pp = {:.6e}, U_pm = {:.6e})",
            energy.total, energy.kinetic, energy.potential.pair, energy.potential.mesh
        );

        Ok(Self {
            reference_energy: energy.total,
            config,
            units,
            sim_box,
            species,
            particles,
            forces,
            integrator,
            thermostat,
            checkpoint,
            p3m,
            step: 0,
            state: RunState::Running,
            stop: Arc::new(AtomicBool::new(false)),
            energy,
            was_thermostatted: false,
        })
    }

    /// Advance one step. Does nothing once halted.
    ///
    /// A non-finite acceleration halts the run and is also returned as
    /// `NumericalInstability`.
    pub fn step(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Ok(());
        }
        if self.stop.load(Ordering::Relaxed) {
            info!("stop requested at step {}", self.step);
            self.state = RunState::Halted(HaltReason::StopRequested);
            return Ok(());
        }
        if self.step >= self.config.run.steps {
            self.state = RunState::Halted(HaltReason::StepLimit);
            return Ok(());
        }
        profile_scope!("simulation_step");

        let step = self.step + 1;
        let potential = match self.integrator.step(
            step,
            &mut self.particles,
            &self.sim_box,
            &self.species,
            &mut self.forces,
        ) {
            Ok(u) => u,
            Err(e) => {
                if let SimError::NumericalInstability { step, particles, .. } = &e {
                    warn!("halting: non-finite acceleration at step {step} on {particles:?}");
                    self.state = RunState::Halted(HaltReason::NonFiniteAcceleration {
                        step: *step,
                        particles: particles.clone(),
                    });
                }
                return Err(e);
            }
        };
        self.step = step;

        let every = self.config.integrator.remove_drift_every;
        if every > 0 && step % every == 0 {
            self.particles.remove_drift(&self.species);
        }

        let mut thermostatted = false;
        if let Some(thermostat) = self.thermostat.as_mut() {
            if thermostat.is_active(step) {
                let temps = self.particles.kinetic_temperature(&self.species, self.units.kb);
                thermostat.rescale(step, &temps, &self.species, &mut self.particles.vel);
                thermostatted = true;
            }
        }

        self.energy = EnergyReport::measure(&self.particles, &self.species, &self.units, potential);
        if self.was_thermostatted && !thermostatted {
            // free evolution starts here
            self.reference_energy = self.energy.total;
            info!("thermostat off at step {step}, E0 = {:.8e}", self.reference_energy);
        }
        self.was_thermostatted = thermostatted;

        let log_every = self.config.run.log_every;
        if log_every > 0 && step % log_every == 0 {
            debug!(
                "step {step}: E = {:.8e}, K = {:.6e}, U = {:.6e}, T = {:?}",
                self.energy.total,
                self.energy.kinetic,
                self.energy.potential.total(),
                self.energy.temperatures
            );
        }

        let time = self.time();
        if let Some(sink) = self.checkpoint.as_mut() {
            let every = self.config.output.dump_every;
            if every > 0 && step % every == 0 {
                let snap = Snapshot::capture(step, time, &self.particles, self.energy.clone());
                sink.dump(&snap);
            }
        }

        if !thermostatted && self.energy_diverged() {
            warn!(
                "halting: energy {:.6e} left the bound around E0 = {:.6e} at step {step}",
                self.energy.total, self.reference_energy
            );
            self.state = RunState::Halted(HaltReason::EnergyDivergence {
                step,
                energy: self.energy.total,
                reference: self.reference_energy,
            });
        } else if self.step >= self.config.run.steps {
            self.state = RunState::Halted(HaltReason::StepLimit);
        }
        Ok(())
    }

    /// Step until halted and return why. Queued snapshots are on disk when
    /// this returns `Ok`.
    pub fn run(&mut self) -> Result<HaltReason> {
        loop {
            if let RunState::Halted(reason) = &self.state {
                info!("run halted after {} steps: {reason:?}", self.step);
                if let Some(sink) = self.checkpoint.as_mut() {
                    sink.flush();
                }
                return Ok(reason.clone());
            }
            self.step()?;
        }
    }

    fn energy_diverged(&self) -> bool {
        let reference = self.reference_energy.abs();
        if !self.energy.total.is_finite() {
            return true;
        }
        reference > 0.0
            && (self.energy.total - self.reference_energy).abs()
                > self.config.run.energy_divergence_factor * reference
    }

    /// Handle for halting from another thread. Checked between steps.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn set_thermostat(&mut self, thermostat: Option<Box<dyn Thermostat>>) {
        self.thermostat = thermostat;
    }

    pub fn set_checkpoint(&mut self, sink: Option<Box<dyn CheckpointSink>>) {
        self.checkpoint = sink;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.step, self.time(), &self.particles, self.energy.clone())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn sim_box(&self) -> &SimulationBox {
        &self.sim_box
    }

    pub fn species(&self) -> &SpeciesTable {
        &self.species
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    pub fn forces(&self) -> &ForceField {
        &self.forces
    }

    pub fn p3m(&self) -> Option<&P3mSummary> {
        self.p3m.as_ref()
    }

    pub fn rdf(&self) -> Option<&RdfHistogram> {
        self.forces.pair.rdf()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.step as f64 * self.integrator.dt
    }

    pub fn energy(&self) -> &EnergyReport {
        &self.energy
    }

    pub fn reference_energy(&self) -> f64 {
        self.reference_energy
    }
}

/// Box and species table. Without explicit lengths the box is a cube sized
/// from the species densities.
pub fn resolve_system(config: &SimConfig, units: &Units) -> Result<(SimulationBox, SpeciesTable)> {
    let b_mag = from_array(config.integrator.magnetic_field).mag();
    match config.sim_box.lengths {
        Some(lengths) => {
            let sim_box = SimulationBox::new(lengths, config.sim_box.boundaries)?;
            let species =
                SpeciesTable::from_config(&config.species, units, Some(sim_box.volume()), b_mag)?;
            Ok((sim_box, species))
        }
        None => {
            let species = SpeciesTable::from_config(&config.species, units, None, b_mag)?;
            let side =
                SimulationBox::cube_side_from_density(species.total_count(), species.total_density());
            Ok((SimulationBox::new([side; 3], config.sim_box.boundaries)?, species))
        }
    }
}

/// Explicit or tuned mesh parameters with their analytic error.
fn select_p3m(
    config: &SimConfig,
    sim_box: &SimulationBox,
    species: &SpeciesTable,
    kappa: f64,
) -> Result<(P3mParams, ErrorEstimate)> {
    let cfg = &config.pppm;
    if cfg.tune {
        let result = pppm::tune(&cfg.search, cfg.tolerance, cfg.aliases, sim_box, species, kappa)?;
        if let Some(rc) = config.potential.rc {
            if rc != result.chosen.params.rc {
                info!("tuned cutoff {:.6e} replaces configured rc {rc:.6e}", result.chosen.params.rc);
            }
        }
        return Ok((result.chosen.params, result.chosen.estimate));
    }
    let (Some(alpha), Some(mesh), Some(rc)) = (cfg.alpha, cfg.mesh, config.potential.rc) else {
        return Err(SimError::config("pppm needs alpha, mesh and rc when tune = false"));
    };
    let params = P3mParams {
        alpha,
        rc,
        mesh,
        cao: cfg.cao,
        aliases: cfg.aliases,
    };
    params.validate(sim_box)?;
    let estimate = pppm::assess(&params, sim_box, species, kappa);
    if estimate.total > cfg.tolerance {
        warn!(
            "explicit P3M parameters exceed the force tolerance: {:.3e} > {:.3e}",
            estimate.total, cfg.tolerance
        );
    }
    Ok((params, estimate))
}

fn report_p3m(summary: &P3mSummary, tolerance: f64) {
    let p = &summary.params;
    info!(
        "P3M: alpha = {:.6e}, rc = {:.6e}, mesh = {:?}, cao = {}, aliases = {:?}",
        p.alpha, p.rc, p.mesh, p.cao, p.aliases
    );
    info!(
        "force error estimate: PP = {:.3e}, PM = {:.3e} (mesh sum {:.3e}), total = {:.3e}",
        summary.estimate.pp, summary.estimate.pm, summary.mesh_pm_error, summary.estimate.total
    );
    if summary.mesh_pm_error > tolerance {
        warn!(
            "mesh-sum PM error {:.3e} exceeds the force tolerance {:.3e}",
            summary.mesh_pm_error, tolerance
        );
    }
}
