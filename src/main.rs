use log::{error, info};
use std::process::ExitCode;

use plasma_md::init_config::load_run_file;
use plasma_md::{HaltReason, Simulation};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: plasma_md <run-file.toml>");
        return ExitCode::from(2);
    };

    let config = match load_run_file(&path) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    let mut sim = match Simulation::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("setup failed: {e}");
            return ExitCode::from(2);
        }
    };

    let result = sim.run();

    #[cfg(feature = "profiling")]
    plasma_md::PROFILER.lock().print_and_clear();

    match result {
        Ok(reason) => {
            let e = sim.energy();
            info!(
                "finished at step {} (t = {:.6e}): E = {:.8e}, drift = {:.3e}",
                sim.step_count(),
                sim.time(),
                e.total,
                (e.total - sim.reference_energy()) / sim.reference_energy().abs().max(f64::MIN_POSITIVE)
            );
            match reason {
                HaltReason::StepLimit | HaltReason::StopRequested => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
