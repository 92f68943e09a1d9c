//! Particle-mesh long-range solver.
//!
//! Each call assigns charges to the mesh with B-splines, transforms, applies
//! the influence function with an ik derivative, transforms back once per field
//! component and interpolates the field onto the particles with the same
//! stencils used for assignment.

use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::fft::Fft3;
use super::green::GreenFunction;
use super::spline::{self, Stencil};
use super::P3mParams;
use crate::error::Result;
use crate::particles::Particles;
use crate::profile_scope;
use crate::simulation_box::SimulationBox;
use crate::utils::to_array;

struct ComponentBuffer {
    spectrum: Vec<Complex<f64>>,
    field: Vec<f64>,
}

pub struct MeshForceSolver {
    params: P3mParams,
    spacing: [f64; 3],
    volume: f64,
    green: GreenFunction,
    fft: Fft3,
    charge: Vec<f64>,
    charge_k: Vec<Complex<f64>>,
    components: Vec<ComponentBuffer>,
    stencils: Vec<Stencil>,
}

impl MeshForceSolver {
    pub fn new(
        params: P3mParams,
        sim_box: &SimulationBox,
        kappa: f64,
        fourpie0: f64,
        n_particles: usize,
        a_ws: f64,
    ) -> Result<Self> {
        params.validate(sim_box)?;
        let green = GreenFunction::optimized(&params, sim_box, kappa, fourpie0, n_particles, a_ws);
        let fft = Fft3::new(params.mesh);
        let len = fft.len();
        let components = (0..3)
            .map(|_| ComponentBuffer {
                spectrum: vec![Complex::default(); len],
                field: vec![0.0; len],
            })
            .collect();
        Ok(Self {
            params,
            spacing: params.spacing(sim_box),
            volume: sim_box.volume(),
            green,
            fft,
            charge: vec![0.0; len],
            charge_k: vec![Complex::default(); len],
            components,
            stencils: vec![Stencil::default(); n_particles],
        })
    }

    pub fn params(&self) -> &P3mParams {
        &self.params
    }

    pub fn green(&self) -> &GreenFunction {
        &self.green
    }

    /// Mesh charges after the last assignment.
    pub fn mesh_charge(&self) -> &[f64] {
        &self.charge
    }

    /// Spread particle charges onto the mesh.
    pub fn assign(&mut self, particles: &Particles) {
        profile_scope!("pm_assign");
        let order = self.params.cao;
        let dims = self.params.mesh;
        let spacing = self.spacing;

        self.stencils.resize(particles.len(), Stencil::default());
        self.stencils
            .par_iter_mut()
            .zip(particles.pos.par_iter())
            .for_each(|(s, &p)| *s = spline::stencil(to_array(p), spacing, order));

        // sequential so the mesh sums are reproducible
        self.charge.iter_mut().for_each(|c| *c = 0.0);
        for (s, &q) in self.stencils.iter().zip(&particles.charge) {
            if q == 0.0 {
                continue;
            }
            for a in 0..order {
                let ix = wrap(s.first[0] + a as i64, dims[0]);
                let wx = q * s.weights[0][a];
                for b in 0..order {
                    let iy = wrap(s.first[1] + b as i64, dims[1]);
                    let wxy = wx * s.weights[1][b];
                    let row = (ix * dims[1] + iy) * dims[2];
                    for c in 0..order {
                        let iz = wrap(s.first[2] + c as i64, dims[2]);
                        self.charge[row + iz] += wxy * s.weights[2][c];
                    }
                }
            }
        }
    }

    /// Add the long-range acceleration to `particles.acc` and return the raw
    /// reciprocal-space energy (self and background terms not removed).
    pub fn compute(&mut self, particles: &mut Particles) -> f64 {
        profile_scope!("pm");
        self.assign(particles);

        for (dst, &q) in self.charge_k.iter_mut().zip(&self.charge) {
            *dst = Complex::new(q, 0.0);
        }
        self.fft.forward(&mut self.charge_k);

        let energy = 0.5 / self.volume
            * self
                .charge_k
                .iter()
                .zip(&self.green.values)
                .map(|(rho, g)| g * rho.norm_sqr())
                .sum::<f64>();

        self.solve_fields();
        self.interpolate(particles);
        energy
    }

    fn solve_fields(&mut self) {
        profile_scope!("pm_fields");
        let dims = self.params.mesh;
        let green = &self.green;
        let charge_k = &self.charge_k;
        let fft = &self.fft;
        let inv_volume = 1.0 / self.volume;

        self.components
            .par_iter_mut()
            .enumerate()
            .for_each(|(axis, buf)| {
                for ix in 0..dims[0] {
                    for iy in 0..dims[1] {
                        for iz in 0..dims[2] {
                            let i = green.index(ix, iy, iz);
                            let k = match axis {
                                0 => green.k_derivative[0][ix],
                                1 => green.k_derivative[1][iy],
                                _ => green.k_derivative[2][iz],
                            };
                            // E(k) = -i k G(k) ρ(k)
                            let rho = charge_k[i];
                            let s = k * green.values[i];
                            buf.spectrum[i] = Complex::new(s * rho.im, -s * rho.re);
                        }
                    }
                }
                fft.inverse(&mut buf.spectrum);
                for (f, e) in buf.field.iter_mut().zip(&buf.spectrum) {
                    *f = e.re * inv_volume;
                }
            });
    }

    fn interpolate(&self, particles: &mut Particles) {
        profile_scope!("pm_interpolate");
        let order = self.params.cao;
        let dims = self.params.mesh;
        let fields = [
            &self.components[0].field,
            &self.components[1].field,
            &self.components[2].field,
        ];
        let stencils = &self.stencils;
        let charge = &particles.charge;
        let mass = &particles.mass;

        particles
            .acc
            .par_iter_mut()
            .enumerate()
            .for_each(|(j, acc)| {
                let q = charge[j];
                if q == 0.0 {
                    return;
                }
                let s = &stencils[j];
                let mut e = [0.0; 3];
                for a in 0..order {
                    let ix = wrap(s.first[0] + a as i64, dims[0]);
                    let wx = s.weights[0][a];
                    for b in 0..order {
                        let iy = wrap(s.first[1] + b as i64, dims[1]);
                        let wxy = wx * s.weights[1][b];
                        let row = (ix * dims[1] + iy) * dims[2];
                        for c in 0..order {
                            let iz = wrap(s.first[2] + c as i64, dims[2]);
                            let w = wxy * s.weights[2][c];
                            for d in 0..3 {
                                e[d] += w * fields[d][row + iz];
                            }
                        }
                    }
                }
                let qm = q / mass[j];
                acc.x += qm * e[0];
                acc.y += qm * e[1];
                acc.z += qm * e[2];
            });
    }
}

#[inline]
fn wrap(n: i64, m: usize) -> usize {
    n.rem_euclid(m as i64) as usize
}
