// thermal.rs
// Temperature control hook and the Berendsen thermostat

use log::debug;
use ultraviolet::DVec3;

use crate::species::SpeciesTable;

/// Velocity rescaling invoked after a completed step.
pub trait Thermostat: Send {
    /// Whether the hook runs at `step`.
    fn is_active(&self, step: usize) -> bool;

    /// Rescale `vel` given the current per-species kinetic temperatures.
    fn rescale(&mut self, step: usize, temperatures: &[f64], species: &SpeciesTable, vel: &mut [DVec3]);
}

/// Berendsen weak coupling.
///
/// Up to `activation_step` velocities are rescaled straight to the target;
/// afterwards the factor is sqrt(1 + (T0/T - 1) / tau) with `tau` the
/// relaxation time in steps.
#[derive(Clone, Debug, PartialEq)]
pub struct Berendsen {
    pub targets: Vec<f64>,
    pub tau: f64,
    pub activation_step: usize,
    pub off_step: Option<usize>,
}

impl Berendsen {
    pub fn new(targets: Vec<f64>, tau: f64, activation_step: usize, off_step: Option<usize>) -> Self {
        Self {
            targets,
            tau,
            activation_step,
            off_step,
        }
    }

    pub fn factor(&self, step: usize, target: f64, current: f64) -> f64 {
        if current <= 0.0 {
            return 1.0;
        }
        let ratio = target / current;
        if step <= self.activation_step {
            ratio.sqrt()
        } else {
            (1.0 + (ratio - 1.0) / self.tau).max(0.0).sqrt()
        }
    }
}

impl Thermostat for Berendsen {
    fn is_active(&self, step: usize) -> bool {
        self.off_step.map_or(true, |off| step < off)
    }

    fn rescale(&mut self, step: usize, temperatures: &[f64], species: &SpeciesTable, vel: &mut [DVec3]) {
        for (s, (&t, &t0)) in temperatures.iter().zip(&self.targets).enumerate() {
            let fact = self.factor(step, t0, t);
            for v in &mut vel[species.range(s)] {
                *v *= fact;
            }
            if step % 1000 == 0 {
                debug!("[thermostat] step={step} species={s} T={t:.4e} target={t0:.4e} scale={fact:.5}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Particles;
    use crate::species::SpeciesConfig;
    use crate::units::Units;
    use approx::assert_relative_eq;

    fn table() -> SpeciesTable {
        let cfg = SpeciesConfig {
            name: "ion".into(),
            count: 50,
            mass: Some(2.0),
            charge: Some(1.0),
            number_density: Some(1.0),
            temperature: Some(0.5),
            ..Default::default()
        };
        SpeciesTable::from_config(&[cfg], &Units::reduced(), None, 0.0).unwrap()
    }

    #[test]
    fn drives_temperature_to_target() {
        let t = table();
        let mut p = Particles::from_species(&t);
        for (i, v) in p.vel.iter_mut().enumerate() {
            let x = i as f64 * 0.1;
            *v = DVec3::new(x.sin(), x.cos(), (2.0 * x).sin()) * 3.0;
        }
        let mut thermostat = Berendsen::new(vec![0.5], 5.0, 0, None);
        let kb = 1.0;
        for step in 1..200 {
            let temps = p.kinetic_temperature(&t, kb);
            thermostat.rescale(step, &temps, &t, &mut p.vel);
        }
        assert_relative_eq!(p.kinetic_temperature(&t, kb)[0], 0.5, max_relative = 1e-6);
    }

    #[test]
    fn weak_coupling_moves_partway() {
        let b = Berendsen::new(vec![1.0], 10.0, 0, None);
        let f = b.factor(5, 1.0, 2.0);
        assert!(f < 1.0 && f > (0.5f64).sqrt());
        assert_eq!(b.factor(5, 1.0, 0.0), 1.0);
    }

    #[test]
    fn switches_off() {
        let b = Berendsen::new(vec![1.0], 10.0, 0, Some(100));
        assert!(b.is_active(99));
        assert!(!b.is_active(100));
    }
}
