//! Analytic P3M force error estimates.
//!
//! All lengths are reduced by the Wigner-Seitz radius: `alpha`, `kappa` in
//! units of 1/a_ws and `rc`, `h` in units of a_ws. Errors are in units of
//! Q² / (4πε0 a_ws²) and include the `sqrt(N a_ws³ / V)` prefactor.
//!
//! PP error after Dharuman et al., J. Chem. Phys. 146, 024112 (2017), eq. 30.
//! PM error from eqs. 35-37 with the Deserno-Holm coefficients.

use std::f64::consts::PI;

use serde::Serialize;

use super::MAX_CAO;
use crate::utils::linspace;

/// Deserno & Holm, J. Chem. Phys. 109, 7694 (1998), C_m^(p) for p = 1..=7.
const CMP: [&[f64]; MAX_CAO] = [
    &[2.0 / 3.0],
    &[2.0 / 45.0, 8.0 / 189.0],
    &[4.0 / 495.0, 2.0 / 225.0, 8.0 / 1485.0],
    &[2.0 / 4725.0, 16.0 / 10395.0, 5528.0 / 3869775.0, 32.0 / 42525.0],
    &[
        4.0 / 93555.0,
        2764.0 / 11609325.0,
        8.0 / 25515.0,
        7234.0 / 32531625.0,
        350936.0 / 3206852775.0,
    ],
    &[
        2764.0 / 638512875.0,
        16.0 / 467775.0,
        7234.0 / 119282625.0,
        1403744.0 / 25196700375.0,
        1396888.0 / 40521009375.0,
        2485856.0 / 152506344375.0,
    ],
    &[
        8.0 / 18243225.0,
        7234.0 / 1550674125.0,
        701872.0 / 65511420975.0,
        2793776.0 / 225759909375.0,
        1242928.0 / 132172165125.0,
        1890912728.0 / 352985880121875.0,
        21053792.0 / 8533724574375.0,
    ],
];

const BETA_LO: f64 = 1e-4;
const BETA_HI: f64 = 500.0;
const BETA_NODES: usize = 5000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ErrorEstimate {
    pub pp: f64,
    pub pm: f64,
    pub total: f64,
}

impl ErrorEstimate {
    pub fn new(pp: f64, pm: f64) -> Self {
        Self {
            pp,
            pm,
            total: (pp * pp + pm * pm).sqrt(),
        }
    }
}

/// `sqrt(N a_ws³ / V)`.
pub fn prefactor(n_particles: usize, a_ws: f64, volume: f64) -> f64 {
    (n_particles as f64 * a_ws.powi(3) / volume).sqrt()
}

/// Real-space truncation error of the Ewald split.
pub fn pp_error(alpha: f64, rc: f64, kappa: f64, prefactor: f64) -> f64 {
    let b = 0.5 * kappa / alpha;
    2.0 * (-b * b - alpha * alpha * rc * rc).exp() / rc.sqrt() * prefactor
}

/// Truncation error of a purely short-range screened law cut at `rc`.
pub fn pp_error_short_range(rc: f64, kappa: f64, prefactor: f64) -> f64 {
    (2.0 * PI * kappa).sqrt() * (-kappa * rc).exp() * prefactor
}

fn reduced_kernel(x: f64, alpha: f64, kappa: f64) -> f64 {
    let two_alpha = 2.0 * alpha;
    4.0 * PI * (-(x * x + kappa * kappa) / (two_alpha * two_alpha)).exp() / (kappa * kappa + x * x)
}

/// β(m) of eq. 37: ∫ Ĝ(x)² x^{2(m+p+2)} dx by the trapezoid rule.
pub fn beta(m: usize, p: usize, alpha: f64, kappa: f64) -> f64 {
    let xs = linspace(BETA_LO, BETA_HI, BETA_NODES);
    let power = 2 * (m + p + 2) as i32;
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            let g = reduced_kernel(x, alpha, kappa);
            g * g * x.powi(power)
        })
        .collect();
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}

/// Aliasing error of the mesh solver with spacing `h` and order `cao`.
pub fn pm_error(alpha: f64, h: f64, cao: usize, kappa: f64, prefactor: f64) -> f64 {
    let coefficients = CMP[cao - 1];
    let sum: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(m, c)| {
            let expp = 2 * (m + cao);
            c * (2.0 / (1.0 + expp as f64)) * beta(m, cao, alpha, kappa) * (0.5 * h).powi(expp as i32)
        })
        .sum();
    (3.0 * sum).sqrt() / (2.0 * PI) * prefactor
}

/// Combined estimate for one parameter set.
pub fn estimate(
    alpha: f64,
    rc: f64,
    h: f64,
    cao: usize,
    kappa: f64,
    prefactor: f64,
) -> ErrorEstimate {
    ErrorEstimate::new(
        pp_error(alpha, rc, kappa, prefactor),
        pm_error(alpha, h, cao, kappa, prefactor),
    )
}

/// Error table over an `alphas × rcs` grid at fixed mesh spacing and order.
///
/// Row `i` holds the estimates for `alphas[i]`.
pub fn error_map(
    alphas: &[f64],
    rcs: &[f64],
    h: f64,
    cao: usize,
    kappa: f64,
    prefactor: f64,
) -> Vec<Vec<ErrorEstimate>> {
    alphas
        .iter()
        .map(|&alpha| {
            let pm = pm_error(alpha, h, cao, kappa, prefactor);
            rcs.iter()
                .map(|&rc| ErrorEstimate::new(pp_error(alpha, rc, kappa, prefactor), pm))
                .collect()
        })
        .collect()
}
