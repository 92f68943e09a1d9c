use std::sync::atomic::Ordering;
use std::sync::Arc;

use approx::assert_relative_eq;
use parking_lot::Mutex;
use ultraviolet::DVec3;

use super::integrator::{boris_rotate, enforce_boundaries};
use super::*;
use crate::config::{
    BoxConfig, IntegratorConfig, OutputConfig, PotentialConfig, RunConfig, SimConfig,
    ThermostatConfig,
};
use crate::error::SimError;
use crate::init_config::{InitConfig, Placement};
use crate::io::{CheckpointSink, Snapshot};
use crate::particles::Particles;
use crate::potential::PotentialLaw;
use crate::simulation_box::{BoundaryKind, SimulationBox};
use crate::species::{SpeciesConfig, SpeciesTable};
use crate::units::Units;

fn ion(count: usize, temperature: f64) -> SpeciesConfig {
    SpeciesConfig {
        name: "ion".into(),
        count,
        mass: Some(1.0),
        charge: Some(1.0),
        temperature: Some(temperature),
        ..Default::default()
    }
}

/// 64 Yukawa particles on a perturbed 4x4x4 lattice at unit density.
fn yukawa_lattice(steps: usize) -> SimConfig {
    SimConfig {
        sim_box: BoxConfig {
            lengths: Some([4.0; 3]),
            ..Default::default()
        },
        species: vec![ion(64, 0.01)],
        potential: PotentialConfig {
            law: PotentialLaw::Yukawa {
                screening_length: None,
                kappa: Some(1.0),
            },
            rc: Some(1.85),
            ..Default::default()
        },
        integrator: IntegratorConfig {
            dt: 0.005,
            ..Default::default()
        },
        init: InitConfig {
            seed: 11,
            placement: Placement::Lattice,
            perturbation: 0.05,
            ..Default::default()
        },
        run: RunConfig {
            steps,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn pair_config(positions: [[f64; 3]; 2], length: f64) -> (SimConfig, Particles) {
    let mut cfg = yukawa_lattice(0);
    cfg.sim_box.lengths = Some([length; 3]);
    cfg.species = vec![ion(2, 0.0)];
    cfg.potential.rc = Some(0.45 * length);
    let units = Units::reduced();
    let table = SpeciesTable::from_config(&cfg.species, &units, Some(length.powi(3)), 0.0).unwrap();
    let mut p = Particles::from_species(&table);
    p.pos = positions.iter().map(|&a| DVec3::new(a[0], a[1], a[2])).collect();
    (cfg, p)
}

#[test]
fn energy_is_conserved_on_a_yukawa_lattice() {
    let mut sim = Simulation::new(yukawa_lattice(400)).unwrap();
    let e0 = sim.energy().total;
    let reason = sim.run().unwrap();
    assert_eq!(reason, HaltReason::StepLimit);
    assert_eq!(sim.step_count(), 400);
    let drift = (sim.energy().total - e0).abs() / e0.abs();
    assert!(drift < 0.01, "relative energy drift {drift:e}");
}

#[test]
fn pair_forces_are_equal_and_opposite() {
    let (cfg, p) = pair_config([[1.0, 2.0, 2.0], [2.3, 2.5, 1.6]], 5.0);
    let sim = Simulation::with_particles(cfg, p).unwrap();
    let f = sim.forces().pair.forces();
    assert_eq!(f[0], -f[1]);
    assert!(f[0].mag() > 0.0);
}

#[test]
fn total_pair_force_vanishes() {
    let sim = Simulation::new(yukawa_lattice(0)).unwrap();
    let total = sim
        .forces()
        .pair
        .forces()
        .iter()
        .fold(DVec3::zero(), |acc, f| acc + *f);
    assert!(total.mag() < 1e-10, "net force {total:?}");
}

#[test]
fn cell_list_matches_all_pairs() {
    let mut cfg = yukawa_lattice(0);
    cfg.init.placement = Placement::Random;
    cfg.init.rejection_radius = Some(0.3);
    let with_cells = Simulation::new(cfg.clone()).unwrap();
    cfg.potential.linked_list = false;
    let brute = Simulation::new(cfg).unwrap();
    assert!(with_cells.forces().pair.uses_cells());
    assert!(!brute.forces().pair.uses_cells());
    assert_relative_eq!(
        with_cells.energy().potential.pair,
        brute.energy().potential.pair,
        max_relative = 1e-12
    );
    for (a, b) in with_cells.particles().acc.iter().zip(&brute.particles().acc) {
        assert!((*a - *b).mag() <= 1e-10 * (1.0 + a.mag()));
    }
}

#[test]
fn cutoff_beyond_half_box_is_rejected() {
    let mut cfg = yukawa_lattice(0);
    cfg.potential.rc = Some(0.6 * 4.0);
    let err = Simulation::new(cfg).err().unwrap();
    assert!(matches!(err, SimError::Configuration(_)), "{err}");
    assert!(err.is_setup_error());
}

#[test]
fn minimum_image_pairs_across_the_boundary() {
    let l = 4.0;
    let (cfg, p) = pair_config([[0.1 * l, 2.0, 2.0], [0.9 * l, 2.0, 2.0]], l);
    let sim = Simulation::with_particles(cfg, p).unwrap();
    let acc = &sim.particles().acc;
    let r = 0.2 * l;
    let (_, f_over_r) = sim.forces().potential.pair(r, 0, 0);
    // repulsion pushes particle 0 away from the image of 1 at x = -0.1 L
    assert!(acc[0].x > 0.0 && acc[1].x < 0.0);
    assert_relative_eq!(acc[0].x, f_over_r * r, max_relative = 1e-12);
    assert_eq!(acc[0].y, 0.0);
}

#[test]
fn runs_are_bit_identical() {
    let mut a = Simulation::new(yukawa_lattice(25)).unwrap();
    let mut b = Simulation::new(yukawa_lattice(25)).unwrap();
    a.run().unwrap();
    b.run().unwrap();
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn boris_rotation_keeps_speed() {
    let v = DVec3::new(0.3, -1.2, 0.7);
    let b = DVec3::new(0.0, 0.0, 1.0);
    for theta in [0.01, 0.5, 2.0, -1.0] {
        let w = boris_rotate(v, b, theta);
        assert_relative_eq!(w.mag(), v.mag(), max_relative = 1e-14);
        assert_relative_eq!(w.z, v.z, max_relative = 1e-14);
    }
}

#[test]
fn magnetized_free_particle_gyrates_at_constant_speed() {
    let mut cfg = yukawa_lattice(200);
    cfg.sim_box.lengths = Some([10.0; 3]);
    cfg.species = vec![ion(1, 0.0)];
    cfg.potential.rc = Some(3.0);
    cfg.integrator.kind = IntegratorKind::MagneticBoris;
    cfg.integrator.magnetic_field = [0.0, 0.0, 2.0];
    cfg.integrator.dt = 0.01;
    let table = SpeciesTable::from_config(&cfg.species, &Units::reduced(), Some(1000.0), 2.0).unwrap();
    let mut p = Particles::from_species(&table);
    p.pos[0] = DVec3::new(5.0, 5.0, 5.0);
    p.vel[0] = DVec3::new(1.0, 0.0, 0.1);
    let mut sim = Simulation::with_particles(cfg, p).unwrap();
    sim.run().unwrap();
    let v = sim.particles().vel[0];
    assert_relative_eq!(v.mag(), DVec3::new(1.0, 0.0, 0.1).mag(), max_relative = 1e-12);
    assert_relative_eq!(v.z, 0.1, max_relative = 1e-12);
    // 200 steps at omega_c = 2 turn the velocity by 4 rad
    assert_relative_eq!(v.x, 4.0f64.cos(), epsilon = 1e-9);
}

#[test]
fn stop_flag_halts_between_steps() {
    let mut sim = Simulation::new(yukawa_lattice(100)).unwrap();
    sim.step().unwrap();
    sim.stop_handle().store(true, Ordering::Relaxed);
    assert_eq!(sim.run().unwrap(), HaltReason::StopRequested);
    assert_eq!(sim.step_count(), 1);
}

#[test]
fn energy_divergence_halts() {
    let mut cfg = yukawa_lattice(100);
    cfg.run.energy_divergence_factor = 1e-15;
    cfg.species[0].temperature = Some(1.0);
    let mut sim = Simulation::new(cfg).unwrap();
    let reason = sim.run().unwrap();
    assert!(matches!(reason, HaltReason::EnergyDivergence { .. }), "{reason:?}");
    assert!(sim.step_count() < 100);
}

struct StepLog(Arc<Mutex<Vec<usize>>>);

impl CheckpointSink for StepLog {
    fn dump(&mut self, snapshot: &Snapshot) {
        self.0.lock().push(snapshot.step);
    }
}

#[test]
fn checkpoints_follow_dump_interval() {
    let mut cfg = yukawa_lattice(12);
    cfg.output = OutputConfig {
        dump_every: 5,
        ..Default::default()
    };
    let mut sim = Simulation::new(cfg).unwrap();
    let steps = Arc::new(Mutex::new(Vec::new()));
    sim.set_checkpoint(Some(Box::new(StepLog(Arc::clone(&steps)))));
    sim.run().unwrap();
    assert_eq!(*steps.lock(), vec![5, 10]);
}

#[test]
fn thermostat_holds_target_during_activation() {
    let mut cfg = yukawa_lattice(20);
    cfg.thermostat = ThermostatConfig {
        enabled: true,
        temperatures: Some(vec![0.05]),
        activation_step: 10,
        ..Default::default()
    };
    let mut sim = Simulation::new(cfg).unwrap();
    for _ in 0..5 {
        sim.step().unwrap();
    }
    assert_relative_eq!(sim.energy().temperatures[0], 0.05, max_relative = 1e-10);
}

#[test]
fn drift_removal_zeroes_momentum() {
    let mut cfg = yukawa_lattice(10);
    cfg.integrator.remove_drift_every = 5;
    cfg.init.remove_drift = false;
    let mut sim = Simulation::new(cfg).unwrap();
    sim.run().unwrap();
    let p = sim.particles().vel.iter().fold(DVec3::zero(), |acc, v| acc + *v);
    assert!(p.mag() < 1e-12, "momentum {p:?}");
}

#[test]
fn drift_removal_leaves_absorbed_particles_pinned() {
    let (mut cfg, mut p) = pair_config([[4.993, 2.5, 2.5], [1.0, 2.5, 2.5]], 5.0);
    cfg.sim_box.boundaries = [BoundaryKind::Open, BoundaryKind::Periodic, BoundaryKind::Periodic];
    cfg.integrator.remove_drift_every = 1;
    cfg.run.steps = 10;
    p.vel = vec![DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 0.3, 0.0)];
    let mut sim = Simulation::with_particles(cfg, p).unwrap();
    assert_eq!(sim.run().unwrap(), HaltReason::StepLimit);

    let p = sim.particles();
    assert!(p.absorbed[0]);
    assert_eq!(p.pos[0].x, 5.0);
    assert_eq!(p.vel[0], DVec3::zero());
    assert!(!p.absorbed[1]);
    assert!(p.vel[1].mag() < 1e-12, "{:?}", p.vel[1]);
    assert_eq!(sim.energy().temperatures[0], 0.0);
}

#[test]
fn pair_energy_goes_to_zero_at_the_cutoff() {
    // rc = 2.25 for a box of 5
    let (cfg, p) = pair_config([[1.0, 2.0, 2.0], [3.249, 2.0, 2.0]], 5.0);
    let sim = Simulation::with_particles(cfg, p).unwrap();
    let u = sim.energy().potential.pair;
    assert!(u > 0.0 && u < 1e-3, "pair energy {u}");
    assert!(sim.forces().potential.energy_shift(0, 0) > 0.0);
}

#[test]
fn rdf_bins_a_pair_by_separation_and_species() {
    let mut cfg = yukawa_lattice(0);
    cfg.sim_box.lengths = Some([5.0; 3]);
    let anion = SpeciesConfig {
        name: "anion".into(),
        charge: Some(-1.0),
        ..ion(1, 0.0)
    };
    cfg.species = vec![ion(1, 0.0), anion];
    cfg.potential.rc = Some(2.25);
    cfg.potential.rdf_nbins = 10;
    let table = SpeciesTable::from_config(&cfg.species, &Units::reduced(), Some(125.0), 0.0).unwrap();
    let mut p = Particles::from_species(&table);
    p.pos = vec![DVec3::new(1.0, 2.0, 2.0), DVec3::new(1.0, 3.3, 2.0)];
    let sim = Simulation::with_particles(cfg, p).unwrap();

    let rdf = sim.rdf().unwrap();
    assert_eq!(rdf.samples, 1);
    assert_eq!(rdf.pairs, 3);
    let cross = sim.species().pair_index(1, 0);
    assert_eq!(cross, 1);
    // r = 1.3 with bins of 0.225
    assert_eq!(rdf.counts[cross * rdf.nbins + 5], 1);
    assert_eq!(rdf.counts.iter().sum::<u64>(), 1);
}

#[test]
fn rdf_of_a_uniform_gas_is_flat() {
    let mut cfg = yukawa_lattice(0);
    cfg.sim_box.lengths = Some([10.0; 3]);
    cfg.species = vec![ion(1000, 0.01)];
    cfg.potential.rc = Some(4.0);
    cfg.potential.rdf_nbins = 8;
    cfg.init.placement = Placement::Random;
    let sim = Simulation::new(cfg).unwrap();

    let rdf = sim.rdf().unwrap();
    let g = rdf.normalized(sim.species(), sim.sim_box().volume());
    assert_eq!(g.len(), 1);
    // the innermost shell holds too few pairs for a tight bound
    for (bin, value) in g[0].iter().enumerate().skip(1) {
        assert!((value - 1.0).abs() < 0.1, "g(r) = {value} in bin {bin}");
    }
    assert_eq!(rdf.radii()[0], 0.25);
}

#[test]
fn open_wall_absorbs_and_mirror_reflects() {
    let b = SimulationBox::new(
        [2.0; 3],
        [BoundaryKind::Open, BoundaryKind::Mirror, BoundaryKind::Periodic],
    )
    .unwrap();
    let table = SpeciesTable::from_config(&[ion(2, 0.0)], &Units::reduced(), Some(8.0), 0.0).unwrap();
    let mut p = Particles::from_species(&table);
    p.pos = vec![DVec3::new(2.1, 1.0, 1.0), DVec3::new(1.0, 2.05, 2.3)];
    p.vel = vec![DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 1.0, 0.0)];
    enforce_boundaries(&mut p, &b, 0.1);

    assert!(p.absorbed[0]);
    assert_eq!(p.charge[0], 0.0);
    assert_eq!(p.vel[0], DVec3::zero());
    assert_eq!(p.pos[0].x, 2.0);

    assert!(!p.absorbed[1]);
    assert_eq!(p.vel[1].y, -1.0);
    assert_relative_eq!(p.pos[1].y, 1.95, epsilon = 1e-12);
    assert_relative_eq!(p.pos[1].z, 0.3, epsilon = 1e-12);
    assert_eq!(p.image[1], [0, 0, 1]);
}

#[test]
fn setup_reports_configuration_errors() {
    let mut cfg = yukawa_lattice(0);
    cfg.init.placement = Placement::Lattice;
    cfg.species[0].count = 50;
    assert!(matches!(Simulation::new(cfg), Err(SimError::Configuration(_))));
}
