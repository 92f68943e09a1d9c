use std::path::PathBuf;

use plasma_md::init_config::load_run_file;
use plasma_md::io::{load_snapshot, SaveFormat};
use plasma_md::pppm::TuneStrategy;
use plasma_md::simulation::IntegratorKind;
use plasma_md::{HaltReason, SimError, Simulation};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn demo_run_files_parse() {
    let ocp = load_run_file(demo("yukawa_ocp.toml")).unwrap();
    assert!(ocp.pppm.tune);
    assert_eq!(ocp.pppm.search.strategy, TuneStrategy::Balanced);
    assert_eq!(ocp.output.format, SaveFormat::Binary);
    assert_eq!(ocp.species[0].count, 1000);

    let mag = load_run_file(demo("magnetized_coulomb.toml")).unwrap();
    assert_eq!(mag.integrator.kind, IntegratorKind::MagneticBoris);
    assert_eq!(mag.magnetization_start(), 500);
    assert_eq!(mag.species.len(), 2);
}

#[test]
fn missing_run_file_is_an_io_error() {
    let err = load_run_file(demo("does_not_exist.toml")).unwrap_err();
    assert!(matches!(err, SimError::Io(_)));
}

#[test]
fn magnetized_demo_runs_a_few_steps() {
    let mut cfg = load_run_file(demo("magnetized_coulomb.toml")).unwrap();
    cfg.run.steps = 3;
    let mut sim = Simulation::new(cfg).unwrap();
    assert_eq!(sim.run().unwrap(), HaltReason::StepLimit);
    assert_eq!(sim.step_count(), 3);
    assert!(sim.energy().total.is_finite());
}

#[test]
fn snapshots_land_on_disk() {
    let dir = std::env::temp_dir().join(format!("plasma_md_run_files_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut cfg = load_run_file(demo("magnetized_coulomb.toml")).unwrap();
    cfg.run.steps = 4;
    cfg.output.dir = Some(dir.to_string_lossy().into_owned());
    cfg.output.dump_every = 2;
    cfg.output.format = SaveFormat::Binary;
    cfg.output.compress = true;
    let mut sim = Simulation::new(cfg).unwrap();
    sim.run().unwrap();

    let snap = load_snapshot(dir.join("snapshot_00000004.bin.gz")).unwrap();
    assert_eq!(snap.step, 4);
    assert_eq!(snap.pos.len(), 512);
    assert_eq!(snap, sim.snapshot());
    assert!(dir.join("snapshot_00000002.bin.gz").exists());
    let _ = std::fs::remove_dir_all(&dir);
}
