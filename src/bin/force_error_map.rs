// Tabulate the analytic P3M force error over the (alpha, rc) search window of a run file.
//
// usage: force_error_map <run-file.toml> [out.csv]
// Values are reduced: alpha in 1/a_ws, rc in a_ws, errors in Q^2/(4 pi eps0 a_ws^2).

use log::{error, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use plasma_md::init_config::load_run_file;
use plasma_md::pppm::error_estimate::{error_map, prefactor};
use plasma_md::pppm::tuning::{mesh_for, reduced_spacing};
use plasma_md::pppm::P3mParams;
use plasma_md::simulation::resolve_system;
use plasma_md::units::Units;
use plasma_md::utils::linspace;
use plasma_md::Result;

fn write_map(path: &str, out: &mut dyn Write) -> Result<()> {
    let config = load_run_file(path)?;
    let units = Units::new(config.units);
    let (sim_box, species) = resolve_system(&config, &units)?;
    let a = species.a_ws();
    let kappa = config.potential.law.screening_wavenumber(a)? * a;
    let search = &config.pppm.search;

    let params = P3mParams {
        alpha: 1.0,
        rc: 1.0,
        mesh: config
            .pppm
            .mesh
            .unwrap_or_else(|| mesh_for(search.mesh[1], &sim_box)),
        cao: config.pppm.cao,
        aliases: config.pppm.aliases,
    };
    let h = reduced_spacing(&params, &sim_box, a);
    let pre = prefactor(species.total_count(), a, sim_box.volume());
    let rc_hi = search
        .rc_max
        .unwrap_or(f64::INFINITY)
        .min(0.5 * sim_box.min_length() / a);
    let alphas = linspace(search.alpha[0], search.alpha[1], search.alpha_steps.max(2));
    let rcs = linspace(search.rc_min, rc_hi, search.rc_steps.max(2));
    info!(
        "error map: mesh {:?}, cao {}, h = {h:.4} a_ws, kappa = {kappa:.4}",
        params.mesh, params.cao
    );

    writeln!(out, "alpha,rc,pp_error,pm_error,total_error")?;
    for (row, &alpha) in error_map(&alphas, &rcs, h, params.cao, kappa, pre)
        .iter()
        .zip(&alphas)
    {
        for (e, &rc) in row.iter().zip(&rcs) {
            writeln!(out, "{alpha:.6},{rc:.6},{:.6e},{:.6e},{:.6e}", e.pp, e.pm, e.total)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: force_error_map <run-file.toml> [out.csv]");
        return ExitCode::from(2);
    };

    let result = match args.get(2) {
        Some(out) => match File::create(out) {
            Ok(f) => write_map(path, &mut BufWriter::new(f)),
            Err(e) => Err(e.into()),
        },
        None => write_map(path, &mut io::stdout().lock()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
