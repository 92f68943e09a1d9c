//! Optimized influence function on the reciprocal mesh.
//!
//! For every mesh wavevector k ≠ 0 the alias sum
//!
//! G(k) = Σ_m U²(k_m) Ĝ(k_m) (k · k_m) / ( [Σ_m U²(k_m)]² k² )
//!
//! runs over `k_m = k + 2π m / h` for `|m_d| <= aliases_d`, where
//! U(k) = Π_d sinc(k_d h_d / 2)^p is the assignment function transform and
//! Ĝ(k) = 4π e^{-(k² + κ²)/4α²} / (k² + κ²) / 4πε0 is the continuum kernel.
//! The residual of the same sum gives a mesh-based PM force error.

use std::f64::consts::PI;

use rayon::prelude::*;

use super::P3mParams;
use crate::profile_scope;
use crate::simulation_box::SimulationBox;

#[derive(Clone, Debug)]
pub struct GreenFunction {
    pub dims: [usize; 3],
    /// Real-valued G(k), flat row-major over `dims`. `G(0) = 0`.
    pub values: Vec<f64>,
    /// Wavenumbers per axis in FFT order.
    pub k: [Vec<f64>; 3],
    /// Wavenumbers used for the spectral derivative; zero at the Nyquist index.
    pub k_derivative: [Vec<f64>; 3],
    /// Mesh-sum PM force error, same normalisation as the analytic estimate.
    pub pm_error: f64,
}

/// Shifted index: `n` for the lower half of the mesh, `n - m` for the upper.
#[inline]
pub fn shifted(n: usize, m: usize) -> i64 {
    if n < (m + 1) / 2 {
        n as i64
    } else {
        n as i64 - m as i64
    }
}

#[inline]
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Continuum long-range kernel.
#[inline]
pub fn continuum_kernel(k_sq: f64, kappa: f64, alpha: f64, fourpie0: f64) -> f64 {
    let kk = k_sq + kappa * kappa;
    4.0 * PI * (-kk / (4.0 * alpha * alpha)).exp() / kk / fourpie0
}

impl GreenFunction {
    /// Build G(k) for `params` on `sim_box`.
    ///
    /// `n_particles` and `a_ws` only scale the reported error.
    pub fn optimized(
        params: &P3mParams,
        sim_box: &SimulationBox,
        kappa: f64,
        fourpie0: f64,
        n_particles: usize,
        a_ws: f64,
    ) -> Self {
        profile_scope!("green_function");
        let dims = params.mesh;
        let lengths = sim_box.lengths();
        let h = params.spacing(sim_box);
        let p = params.cao as i32;
        let alpha = params.alpha;

        let k: [Vec<f64>; 3] = std::array::from_fn(|d| {
            (0..dims[d])
                .map(|n| 2.0 * PI * shifted(n, dims[d]) as f64 / lengths[d])
                .collect()
        });
        let k_derivative: [Vec<f64>; 3] = std::array::from_fn(|d| {
            let m = dims[d];
            k[d].iter()
                .enumerate()
                .map(|(n, &kd)| if m % 2 == 0 && n == m / 2 { 0.0 } else { kd })
                .collect()
        });
        // alias offsets 2π m / h per axis
        let alias: [Vec<f64>; 3] = std::array::from_fn(|d| {
            let a = params.aliases[d] as i64;
            (-a..=a).map(|m| 2.0 * PI * m as f64 / h[d]).collect()
        });

        let plane = dims[1] * dims[2];
        let mut values = vec![0.0; dims[0] * plane];
        let partial: Vec<f64> = values
            .par_chunks_mut(plane)
            .enumerate()
            .map(|(ix, slab)| {
                let kx = k[0][ix];
                let mut err = 0.0;
                for iy in 0..dims[1] {
                    let ky = k[1][iy];
                    for iz in 0..dims[2] {
                        let kz = k[2][iz];
                        let k_sq = kx * kx + ky * ky + kz * kz;
                        if k_sq == 0.0 {
                            continue;
                        }
                        let mut u_sq_sum = 0.0;
                        let mut u_g_sum = 0.0;
                        for &ox in &alias[0] {
                            let kmx = kx + ox;
                            let ux = sinc(0.5 * kmx * h[0]).powi(2 * p);
                            for &oy in &alias[1] {
                                let kmy = ky + oy;
                                let uy = sinc(0.5 * kmy * h[1]).powi(2 * p);
                                for &oz in &alias[2] {
                                    let kmz = kz + oz;
                                    let uz = sinc(0.5 * kmz * h[2]).powi(2 * p);
                                    let u_sq = ux * uy * uz;
                                    let km_sq = kmx * kmx + kmy * kmy + kmz * kmz;
                                    let g = continuum_kernel(km_sq, kappa, alpha, fourpie0);
                                    let dot = kx * kmx + ky * kmy + kz * kmz;
                                    u_sq_sum += u_sq;
                                    u_g_sum += u_sq * g * dot;
                                }
                            }
                        }
                        let denom = u_sq_sum * u_sq_sum * k_sq;
                        slab[iy * dims[2] + iz] = u_g_sum / denom;
                        let g_hat = continuum_kernel(k_sq, kappa, alpha, fourpie0);
                        err += g_hat * g_hat * k_sq - u_g_sum * u_g_sum / denom;
                    }
                }
                err
            })
            .collect();
        let residual: f64 = partial.iter().sum();

        let volume = sim_box.volume();
        let pm_error = residual.abs().sqrt() / volume.cbrt()
            * (n_particles as f64).sqrt()
            * a_ws
            * a_ws
            * fourpie0
            / volume.powf(2.0 / 3.0);

        Self {
            dims,
            values,
            k,
            k_derivative,
            pm_error,
        }
    }

    #[inline]
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (ix * self.dims[1] + iy) * self.dims[2] + iz
    }
}
