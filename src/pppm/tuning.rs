//! Parameter search for a target force error.
//!
//! Every candidate `(cao, mesh, α, rc)` inside the configured bounds is scored
//! with the analytic estimates. A candidate is feasible when its total error is
//! at most the tolerance. The strategy then picks among the feasible ones.

use std::f64::consts::PI;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error_estimate::{self, ErrorEstimate};
use super::{P3mParams, MAX_CAO};
use crate::error::{Result, SimError};
use crate::profile_scope;
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;
use crate::utils::{is_smooth, linspace, next_smooth};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuneStrategy {
    /// Smallest |ln(PP/PM)|, cost breaks ties.
    #[default]
    Balanced,
    /// Lowest estimated cost per step.
    Cheapest,
}

/// Search bounds. `alpha` is in units of 1/a_ws, `rc` in units of a_ws.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningBounds {
    pub strategy: TuneStrategy,
    pub cao: [usize; 2],
    /// Mesh points along the longest box axis.
    pub mesh: [usize; 2],
    pub alpha: [f64; 2],
    pub alpha_steps: usize,
    /// Upper end defaults to half the shortest periodic box length.
    pub rc_min: f64,
    pub rc_max: Option<f64>,
    pub rc_steps: usize,
}

impl Default for TuningBounds {
    fn default() -> Self {
        Self {
            strategy: TuneStrategy::Balanced,
            cao: [3, MAX_CAO],
            mesh: [8, 64],
            alpha: [0.2, 1.5],
            alpha_steps: 14,
            rc_min: 1.0,
            rc_max: None,
            rc_steps: 12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub params: P3mParams,
    pub estimate: ErrorEstimate,
    pub cost: f64,
}

#[derive(Clone, Debug)]
pub struct TuningResult {
    pub chosen: Candidate,
    pub evaluated: usize,
    pub feasible: usize,
}

/// Mesh dimensions with roughly uniform spacing for `longest` points on the
/// longest axis.
pub fn mesh_for(longest: usize, sim_box: &SimulationBox) -> [usize; 3] {
    let lengths = sim_box.lengths();
    let lmax = lengths.iter().cloned().fold(0.0, f64::max);
    let h = lmax / longest as f64;
    lengths.map(|l| next_smooth((l / h).round() as usize).max(1))
}

/// Largest mesh spacing in units of a_ws.
pub fn reduced_spacing(params: &P3mParams, sim_box: &SimulationBox, a_ws: f64) -> f64 {
    params
        .spacing(sim_box)
        .iter()
        .cloned()
        .fold(0.0, f64::max)
        / a_ws
}

/// Rough operation count of one force evaluation: four transforms of M points,
/// the assignment and interpolation stencils, and N·(4π/3)rc³·n pair visits.
pub fn cost(params: &P3mParams, n_particles: usize, density: f64) -> f64 {
    let m = params.mesh_points() as f64;
    let n = n_particles as f64;
    let transforms = 4.0 * m * m.log2();
    let stencil = 2.0 * n * (params.cao as f64).powi(3);
    let pairs = n * (4.0 * PI / 3.0) * density * params.rc.powi(3);
    transforms + stencil + pairs
}

/// Analytic error of an explicit parameter set.
pub fn assess(
    params: &P3mParams,
    sim_box: &SimulationBox,
    species: &SpeciesTable,
    kappa: f64,
) -> ErrorEstimate {
    let a = species.a_ws();
    let pre = error_estimate::prefactor(species.total_count(), a, sim_box.volume());
    error_estimate::estimate(
        params.alpha * a,
        params.rc / a,
        reduced_spacing(params, sim_box, a),
        params.cao,
        kappa * a,
        pre,
    )
}

/// Search `bounds` for parameters meeting `tolerance` (reduced force units).
pub fn tune(
    bounds: &TuningBounds,
    tolerance: f64,
    aliases: [usize; 3],
    sim_box: &SimulationBox,
    species: &SpeciesTable,
    kappa: f64,
) -> Result<TuningResult> {
    profile_scope!("tune");
    if !(tolerance > 0.0) {
        return Err(SimError::config("force-error tolerance must be positive"));
    }
    let a = species.a_ws();
    let n = species.total_count();
    let density = species.total_density();
    let pre = error_estimate::prefactor(n, a, sim_box.volume());
    let kappa_red = kappa * a;

    let cao_lo = bounds.cao[0].max(1);
    let cao_hi = bounds.cao[1].min(MAX_CAO);
    if cao_lo > cao_hi {
        return Err(SimError::config("empty charge assignment order range"));
    }
    let meshes: Vec<usize> = (bounds.mesh[0].max(1)..=bounds.mesh[1])
        .filter(|&m| is_smooth(m))
        .collect();
    if meshes.is_empty() {
        return Err(SimError::config("empty mesh search range"));
    }
    let half_box = 0.5 * sim_box.min_length() / a;
    let rc_hi = bounds.rc_max.map_or(half_box, |r| r.min(half_box));
    if !(bounds.rc_min > 0.0 && bounds.rc_min <= rc_hi) {
        return Err(SimError::config(format!(
            "cutoff search range [{}, {rc_hi}] a_ws is empty or exceeds half the box",
            bounds.rc_min
        )));
    }
    let rcs = linspace(bounds.rc_min, rc_hi, bounds.rc_steps.max(1));
    let alphas = linspace(bounds.alpha[0], bounds.alpha[1], bounds.alpha_steps.max(1));
    if alphas.iter().any(|&x| !(x > 0.0)) {
        return Err(SimError::config("alpha search range must be positive"));
    }

    let mut outer = Vec::new();
    for cao in cao_lo..=cao_hi {
        for &m in &meshes {
            let mesh = mesh_for(m, sim_box);
            if mesh.iter().any(|&d| d < cao) {
                continue;
            }
            for &alpha in &alphas {
                outer.push((cao, mesh, alpha));
            }
        }
    }

    let scored: Vec<Vec<Candidate>> = outer
        .par_iter()
        .map(|&(cao, mesh, alpha_red)| {
            let mut params = P3mParams {
                alpha: alpha_red / a,
                rc: 0.0,
                mesh,
                cao,
                aliases,
            };
            let h = reduced_spacing(&params, sim_box, a);
            let pm = error_estimate::pm_error(alpha_red, h, cao, kappa_red, pre);
            rcs.iter()
                .map(|&rc_red| {
                    params.rc = rc_red * a;
                    let pp = error_estimate::pp_error(alpha_red, rc_red, kappa_red, pre);
                    Candidate {
                        params,
                        estimate: ErrorEstimate::new(pp, pm),
                        cost: cost(&params, n, density),
                    }
                })
                .collect()
        })
        .collect();

    let all: Vec<Candidate> = scored.into_iter().flatten().collect();
    let evaluated = all.len();
    let feasible: Vec<&Candidate> = all
        .iter()
        .filter(|c| c.estimate.total <= tolerance)
        .collect();
    debug!("tuning: {evaluated} candidates, {} feasible", feasible.len());

    let chosen = match bounds.strategy {
        TuneStrategy::Balanced => feasible.iter().copied().min_by(|x, y| {
            imbalance(x)
                .total_cmp(&imbalance(y))
                .then(x.cost.total_cmp(&y.cost))
        }),
        TuneStrategy::Cheapest => feasible.iter().copied().min_by(|x, y| {
            x.cost
                .total_cmp(&y.cost)
                .then(x.estimate.total.total_cmp(&y.estimate.total))
        }),
    };

    match chosen {
        Some(c) => {
            info!(
                "tuned P3M: cao = {}, mesh = {:?}, alpha = {:.4} /a_ws, rc = {:.4} a_ws, errors PP {:.3e} PM {:.3e} total {:.3e}",
                c.params.cao,
                c.params.mesh,
                c.params.alpha * a,
                c.params.rc / a,
                c.estimate.pp,
                c.estimate.pm,
                c.estimate.total
            );
            Ok(TuningResult {
                chosen: *c,
                evaluated,
                feasible: feasible.len(),
            })
        }
        None => {
            let best = all
                .iter()
                .map(|c| c.estimate.total)
                .fold(f64::INFINITY, f64::min);
            Err(SimError::ToleranceUnattainable { tolerance, best })
        }
    }
}

fn imbalance(c: &Candidate) -> f64 {
    (c.estimate.pp / c.estimate.pm).ln().abs()
}
