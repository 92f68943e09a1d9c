//! Physical constants for the supported unit systems.
//!
//! A single `Units` value is built once from the run configuration and passed by
//! reference to every component that needs a constant. There is no global unit state.
//!
//! - `Cgs`: Gaussian electrostatics, 4πε0 = 1, Lorentz force carries 1/c
//! - `Mks`: SI
//! - `Reduced`: every constant set to one (handy for tests and dimensionless runs)

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Cgs,
    Mks,
    #[default]
    Reduced,
}

/// Speed of light in cm/s.
pub const C_CGS: f64 = 2.997_924_58e10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Units {
    pub system: UnitSystem,
    /// Electrostatic constant 4πε0.
    pub fourpie0: f64,
    /// Boltzmann constant.
    pub kb: f64,
    /// Planck constant.
    pub planck: f64,
    /// Elementary charge.
    pub qe: f64,
    /// Electron mass.
    pub me: f64,
    /// Proton mass.
    pub mp: f64,
    /// Factor multiplying q v×B in the Lorentz force (1/c in Gaussian units).
    pub lorentz: f64,
}

impl Units {
    pub fn new(system: UnitSystem) -> Self {
        match system {
            UnitSystem::Cgs => Self {
                system,
                fourpie0: 1.0,
                kb: 1.380_649e-16,
                planck: 6.626_070_15e-27,
                qe: 4.803_204_71e-10,
                me: 9.109_383_701_5e-28,
                mp: 1.672_621_923_69e-24,
                lorentz: 1.0 / C_CGS,
            },
            UnitSystem::Mks => Self {
                system,
                fourpie0: 4.0 * std::f64::consts::PI * 8.854_187_812_8e-12,
                kb: 1.380_649e-23,
                planck: 6.626_070_15e-34,
                qe: 1.602_176_634e-19,
                me: 9.109_383_701_5e-31,
                mp: 1.672_621_923_69e-27,
                lorentz: 1.0,
            },
            UnitSystem::Reduced => Self {
                system,
                fourpie0: 1.0,
                kb: 1.0,
                planck: 1.0,
                qe: 1.0,
                me: 1.0,
                mp: 1.0,
                lorentz: 1.0,
            },
        }
    }

    pub fn reduced() -> Self {
        Self::new(UnitSystem::Reduced)
    }

    /// Temperature in this system's units from electronvolts.
    pub fn ev_to_kelvin(&self) -> f64 {
        match self.system {
            UnitSystem::Reduced => 1.0,
            // eV / kB, with the eV expressed in the matching energy unit
            UnitSystem::Cgs => 1.602_176_634e-12 / self.kb,
            UnitSystem::Mks => 1.602_176_634e-19 / self.kb,
        }
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::reduced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ev_is_about_11604_kelvin() {
        for system in [UnitSystem::Cgs, UnitSystem::Mks] {
            let k = Units::new(system).ev_to_kelvin();
            assert!((k - 11_604.5).abs() < 1.0, "{system:?}: {k}");
        }
    }

    #[test]
    fn gaussian_units_have_unit_electrostatic_constant() {
        assert_eq!(Units::new(UnitSystem::Cgs).fourpie0, 1.0);
        assert!(Units::new(UnitSystem::Mks).fourpie0 < 1e-9);
    }
}
