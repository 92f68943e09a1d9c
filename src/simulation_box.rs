//! Box geometry and per-axis boundary classification.

use serde::{Deserialize, Serialize};
use ultraviolet::DVec3;

use crate::error::{Result, SimError};
use crate::utils::{component, component_mut};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    #[default]
    Periodic,
    /// Absorbing wall: particles reaching it are pinned and neutralised.
    Open,
    /// Reflecting wall.
    Mirror,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationBox {
    lengths: [f64; 3],
    boundaries: [BoundaryKind; 3],
}

impl SimulationBox {
    pub fn new(lengths: [f64; 3], boundaries: [BoundaryKind; 3]) -> Result<Self> {
        for (axis, &l) in lengths.iter().enumerate() {
            if !(l.is_finite() && l > 0.0) {
                return Err(SimError::config(format!(
                    "box length along axis {axis} must be positive, got {l}"
                )));
            }
        }
        Ok(Self { lengths, boundaries })
    }

    pub fn periodic_cube(length: f64) -> Result<Self> {
        Self::new([length; 3], [BoundaryKind::Periodic; 3])
    }

    /// Cube side holding `total` particles at number density `density`.
    pub fn cube_side_from_density(total: usize, density: f64) -> f64 {
        let a_ws = wigner_seitz_radius(density);
        a_ws * (4.0 * std::f64::consts::PI * total as f64 / 3.0).cbrt()
    }

    #[inline]
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    #[inline]
    pub fn length(&self, axis: usize) -> f64 {
        self.lengths[axis]
    }

    pub fn volume(&self) -> f64 {
        self.lengths.iter().product()
    }

    #[inline]
    pub fn boundary(&self, axis: usize) -> BoundaryKind {
        self.boundaries[axis]
    }

    pub fn boundaries(&self) -> [BoundaryKind; 3] {
        self.boundaries
    }

    #[inline]
    pub fn is_periodic(&self, axis: usize) -> bool {
        self.boundaries[axis] == BoundaryKind::Periodic
    }

    pub fn all_periodic(&self) -> bool {
        (0..3).all(|a| self.is_periodic(a))
    }

    pub fn min_length(&self) -> f64 {
        self.lengths.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Shortest periodic image of a separation vector. Non-periodic axes are untouched.
    #[inline]
    pub fn minimum_image(&self, mut dr: DVec3) -> DVec3 {
        for axis in 0..3 {
            if self.boundaries[axis] == BoundaryKind::Periodic {
                let l = self.lengths[axis];
                let d = component_mut(&mut dr, axis);
                *d -= l * (*d / l).round();
            }
        }
        dr
    }

    /// Minimum-image validity: the cutoff may not exceed half the box on any periodic axis.
    pub fn check_cutoff(&self, rc: f64) -> Result<()> {
        if !(rc > 0.0) {
            return Err(SimError::config(format!("cutoff radius must be positive, got {rc}")));
        }
        for axis in 0..3 {
            if self.is_periodic(axis) && rc > 0.5 * self.lengths[axis] {
                return Err(SimError::config(format!(
                    "cutoff {rc} exceeds half the periodic box length {} along axis {axis}",
                    self.lengths[axis]
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, pos: DVec3) -> bool {
        (0..3).all(|a| {
            let x = component(pos, a);
            x >= 0.0 && x <= self.lengths[a]
        })
    }
}

/// Wigner-Seitz radius for a total number density.
pub fn wigner_seitz_radius(density: f64) -> f64 {
    (3.0 / (4.0 * std::f64::consts::PI * density)).cbrt()
}
