//! Velocity stepping and boundary enforcement.
//!
//! Both schemes end a step with freshly computed accelerations, which the
//! next step's first half-kick consumes.

use serde::{Deserialize, Serialize};
use ultraviolet::DVec3;

use super::forces::{ForceField, PotentialEnergy};
use crate::error::Result;
use crate::particles::Particles;
use crate::profile_scope;
use crate::simulation_box::{BoundaryKind, SimulationBox};
use crate::species::SpeciesTable;
use crate::utils::{component, component_mut};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    #[default]
    Verlet,
    /// Velocity Verlet with an exact rotation about a uniform magnetic field.
    MagneticBoris,
}

pub struct Integrator {
    pub kind: IntegratorKind,
    pub dt: f64,
    /// Unit vector along the field; zero when unmagnetized.
    b_hat: DVec3,
    /// |B| times the Lorentz factor of the unit system.
    b_lorentz: f64,
    /// Steps run with plain Verlet before the field is switched on.
    magnetization_start: usize,
}

impl Integrator {
    pub fn new(
        kind: IntegratorKind,
        dt: f64,
        magnetic_field: DVec3,
        lorentz: f64,
        magnetization_start: usize,
    ) -> Self {
        let b = magnetic_field.mag();
        let b_hat = if b > 0.0 { magnetic_field / b } else { DVec3::zero() };
        Self {
            kind,
            dt,
            b_hat,
            b_lorentz: b * lorentz,
            magnetization_start,
        }
    }

    pub fn is_magnetized_at(&self, step: usize) -> bool {
        self.kind == IntegratorKind::MagneticBoris
            && self.b_lorentz > 0.0
            && step >= self.magnetization_start
    }

    /// Advance one step and return the potential energy at the new positions.
    pub fn step(
        &self,
        step: usize,
        particles: &mut Particles,
        sim_box: &SimulationBox,
        species: &SpeciesTable,
        forces: &mut ForceField,
    ) -> Result<PotentialEnergy> {
        profile_scope!("integrator");
        let half = 0.5 * self.dt;
        if self.is_magnetized_at(step) {
            kick(particles, half);
            self.rotate(particles);
            kick(particles, half);
            drift(particles, self.dt);
            enforce_boundaries(particles, sim_box, self.dt);
            forces.compute(particles, species, sim_box, step)
        } else {
            kick(particles, half);
            drift(particles, self.dt);
            enforce_boundaries(particles, sim_box, self.dt);
            let energy = forces.compute(particles, species, sim_box, step)?;
            kick(particles, half);
            Ok(energy)
        }
    }

    /// Rotate every velocity about the field by ω_c dt.
    fn rotate(&self, particles: &mut Particles) {
        let b = self.b_hat;
        for ((v, &q), &m) in particles.vel.iter_mut().zip(&particles.charge).zip(&particles.mass) {
            let theta = q * self.b_lorentz / m * self.dt;
            if theta == 0.0 {
                continue;
            }
            *v = boris_rotate(*v, b, theta);
        }
    }
}

/// Exact rotation of `v` under dv/dt = ω v × b̂ over an angle `theta = ω dt`.
#[inline]
pub fn boris_rotate(v: DVec3, b_hat: DVec3, theta: f64) -> DVec3 {
    let vxb = v.cross(b_hat);
    let bbv = b_hat.cross(b_hat.cross(v));
    v + vxb * theta.sin() + bbv * (1.0 - theta.cos())
}

fn kick(particles: &mut Particles, dt: f64) {
    for (v, a) in particles.vel.iter_mut().zip(&particles.acc) {
        *v += *a * dt;
    }
}

fn drift(particles: &mut Particles, dt: f64) {
    for (x, v) in particles.pos.iter_mut().zip(&particles.vel) {
        *x += *v * dt;
    }
}

/// Apply the per-axis boundary kind to every particle.
pub fn enforce_boundaries(particles: &mut Particles, sim_box: &SimulationBox, dt: f64) {
    for axis in 0..3 {
        let l = sim_box.length(axis);
        match sim_box.boundary(axis) {
            BoundaryKind::Periodic => {
                for (x, img) in particles.pos.iter_mut().zip(particles.image.iter_mut()) {
                    let c = component_mut(x, axis);
                    if *c >= 0.0 && *c < l {
                        continue;
                    }
                    let mut wraps = (*c / l).floor();
                    *c -= wraps * l;
                    if *c >= l {
                        *c -= l;
                        wraps += 1.0;
                    }
                    if *c < 0.0 {
                        *c = 0.0;
                    }
                    img[axis] += wraps as i64;
                }
            }
            BoundaryKind::Mirror => {
                for (x, v) in particles.pos.iter_mut().zip(particles.vel.iter_mut()) {
                    let c = component(*x, axis);
                    if c >= 0.0 && c <= l {
                        continue;
                    }
                    let vc = component_mut(v, axis);
                    *vc = -*vc;
                    let restored = (c + *vc * dt).clamp(0.0, l);
                    *component_mut(x, axis) = restored;
                }
            }
            BoundaryKind::Open => {
                for i in 0..particles.len() {
                    let c = component(particles.pos[i], axis);
                    if c >= 0.0 && c <= l {
                        continue;
                    }
                    *component_mut(&mut particles.pos[i], axis) = c.clamp(0.0, l);
                    particles.vel[i] = DVec3::zero();
                    particles.acc[i] = DVec3::zero();
                    particles.charge[i] = 0.0;
                    particles.absorbed[i] = true;
                }
            }
        }
    }
}
