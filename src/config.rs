// Centralized configuration for simulation parameters

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::init_config::InitConfig;
use crate::io::SaveFormat;
use crate::potential::PotentialLaw;
use crate::pppm::{TuningBounds, DEFAULT_ALIASES};
use crate::simulation::IntegratorKind;
use crate::simulation_box::BoundaryKind;
use crate::species::SpeciesConfig;
use crate::units::UnitSystem;

// ====================
// Pair Solver Defaults
// ====================
/// Separations below this are clamped before the pair law is evaluated.
pub const DEFAULT_MIN_SEPARATION: f64 = 1e-6;
/// Cell list on by default; the all-pairs loop is a small-N fallback.
pub const DEFAULT_LINKED_LIST: bool = true;

// ====================
// Mesh Solver Defaults
// ====================
pub const DEFAULT_CAO: usize = 5;
/// Target force error in units of Q² / (4πε0 a_ws²).
pub const DEFAULT_FORCE_TOLERANCE: f64 = 1e-5;

// ====================
// Run Control
// ====================
pub const DEFAULT_LOG_EVERY: usize = 100;
/// Halt once |E - E0| exceeds this multiple of |E0|.
pub const DEFAULT_ENERGY_DIVERGENCE_FACTOR: f64 = 10.0;

// ====================
// Thermostat Defaults
// ====================
/// Berendsen relaxation time in steps.
pub const DEFAULT_THERMOSTAT_TAU: f64 = 10.0;

fn default_min_separation() -> f64 {
    DEFAULT_MIN_SEPARATION
}

fn default_linked_list() -> bool {
    DEFAULT_LINKED_LIST
}

fn default_cao() -> usize {
    DEFAULT_CAO
}

fn default_aliases() -> [usize; 3] {
    [DEFAULT_ALIASES; 3]
}

fn default_tolerance() -> f64 {
    DEFAULT_FORCE_TOLERANCE
}

fn default_log_every() -> usize {
    DEFAULT_LOG_EVERY
}

fn default_divergence() -> f64 {
    DEFAULT_ENERGY_DIVERGENCE_FACTOR
}

fn default_tau() -> f64 {
    DEFAULT_THERMOSTAT_TAU
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    /// Box edges. When omitted a cube is sized from the species densities.
    #[serde(default)]
    pub lengths: Option<[f64; 3]>,
    #[serde(default)]
    pub boundaries: [BoundaryKind; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PotentialConfig {
    #[serde(default)]
    pub law: PotentialLaw,
    /// Pair cutoff. Taken from the tuner when parameter search is on.
    #[serde(default)]
    pub rc: Option<f64>,
    #[serde(default = "default_min_separation")]
    pub min_separation: f64,
    #[serde(default = "default_linked_list")]
    pub linked_list: bool,
    /// Radial distribution bins up to rc, 0 to disable.
    #[serde(default)]
    pub rdf_nbins: usize,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            law: PotentialLaw::default(),
            rc: None,
            min_separation: DEFAULT_MIN_SEPARATION,
            linked_list: DEFAULT_LINKED_LIST,
            rdf_nbins: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PppmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mesh: Option<[usize; 3]>,
    #[serde(default = "default_cao")]
    pub cao: usize,
    /// Ewald splitting parameter in simulation units.
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default = "default_aliases")]
    pub aliases: [usize; 3],
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Search mesh, order, α and rc instead of using the explicit values.
    #[serde(default)]
    pub tune: bool,
    #[serde(default)]
    pub search: TuningBounds,
}

impl Default for PppmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mesh: None,
            cao: DEFAULT_CAO,
            alpha: None,
            aliases: default_aliases(),
            tolerance: DEFAULT_FORCE_TOLERANCE,
            tune: false,
            search: TuningBounds::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    #[serde(default)]
    pub kind: IntegratorKind,
    pub dt: f64,
    #[serde(default)]
    pub magnetic_field: [f64; 3],
    /// Run plain Verlet for `magnetization_start` steps before the field acts.
    #[serde(default)]
    pub electrostatic_equilibration: bool,
    #[serde(default)]
    pub magnetization_start: usize,
    /// Remove centre-of-mass drift every n steps, 0 to disable.
    #[serde(default)]
    pub remove_drift_every: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermostatConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Per-species targets. Defaults to each species' temperature.
    #[serde(default)]
    pub temperatures: Option<Vec<f64>>,
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default)]
    pub activation_step: usize,
    #[serde(default)]
    pub off_step: Option<usize>,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            temperatures: None,
            tau: DEFAULT_THERMOSTAT_TAU,
            activation_step: 0,
            off_step: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot directory; no snapshots are written when absent.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub dump_every: usize,
    #[serde(default)]
    pub format: SaveFormat,
    #[serde(default)]
    pub compress: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub steps: usize,
    #[serde(default = "default_log_every")]
    pub log_every: usize,
    #[serde(default = "default_divergence")]
    pub energy_divergence_factor: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 0,
            log_every: DEFAULT_LOG_EVERY,
            energy_divergence_factor: DEFAULT_ENERGY_DIVERGENCE_FACTOR,
        }
    }
}

/// Complete run description as read from a TOML run file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(rename = "box", default)]
    pub sim_box: BoxConfig,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub potential: PotentialConfig,
    #[serde(default)]
    pub pppm: PppmConfig,
    pub integrator: IntegratorConfig,
    #[serde(default)]
    pub thermostat: ThermostatConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub init: InitConfig,
    pub run: RunConfig,
}

impl SimConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the derived species quantities.
    pub fn validate(&self) -> Result<()> {
        if self.species.is_empty() {
            return Err(SimError::config("at least one species is required"));
        }
        if !(self.integrator.dt.is_finite() && self.integrator.dt > 0.0) {
            return Err(SimError::config(format!(
                "time step must be positive, got {}",
                self.integrator.dt
            )));
        }
        if !(self.potential.min_separation > 0.0) {
            return Err(SimError::config("min_separation must be positive"));
        }
        if let Some(rc) = self.potential.rc {
            if !(rc.is_finite() && rc > 0.0) {
                return Err(SimError::config(format!("cutoff must be positive, got {rc}")));
            }
        } else if !(self.pppm.enabled && self.pppm.tune) {
            return Err(SimError::config(
                "potential.rc is required unless the mesh parameters are tuned",
            ));
        }
        if self.pppm.enabled {
            if !self.potential.law.is_long_range() {
                return Err(SimError::config(format!(
                    "{} cannot be split onto the mesh; disable pppm",
                    self.potential.law.name()
                )));
            }
            if self.sim_box.boundaries.iter().any(|b| *b != BoundaryKind::Periodic) {
                return Err(SimError::config(
                    "the mesh solver needs periodic boundaries on every axis",
                ));
            }
            if !self.pppm.tune && (self.pppm.alpha.is_none() || self.pppm.mesh.is_none()) {
                return Err(SimError::config(
                    "pppm needs alpha and mesh when tune = false",
                ));
            }
        }
        if self.thermostat.enabled {
            if !(self.thermostat.tau >= 1.0) {
                return Err(SimError::config("thermostat tau must be at least one step"));
            }
            if let Some(t) = &self.thermostat.temperatures {
                if t.len() != self.species.len() {
                    return Err(SimError::config(format!(
                        "thermostat lists {} temperatures for {} species",
                        t.len(),
                        self.species.len()
                    )));
                }
            }
        }
        if !(self.run.energy_divergence_factor > 0.0) {
            return Err(SimError::config("energy_divergence_factor must be positive"));
        }
        Ok(())
    }

    pub fn magnetization_start(&self) -> usize {
        if self.integrator.electrostatic_equilibration {
            self.integrator.magnetization_start
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"
units = "reduced"

[box]
lengths = [10.0, 10.0, 10.0]

[[species]]
name = "ion"
count = 100
mass = 1.0
charge = 1.0
temperature = 0.01

[potential]
rc = 3.0
law = { kind = "yukawa", kappa = 1.0 }

[pppm]
enabled = true
mesh = [16, 16, 16]
alpha = 0.8

[integrator]
dt = 0.01

[run]
steps = 10
"#;

    #[test]
    fn run_file_parses_with_defaults() {
        let cfg = SimConfig::from_toml(RUN).unwrap();
        assert_eq!(cfg.units, UnitSystem::Reduced);
        assert_eq!(cfg.pppm.cao, DEFAULT_CAO);
        assert_eq!(cfg.pppm.aliases, [DEFAULT_ALIASES; 3]);
        assert_eq!(cfg.potential.min_separation, DEFAULT_MIN_SEPARATION);
        assert_eq!(cfg.sim_box.boundaries, [BoundaryKind::Periodic; 3]);
        assert_eq!(cfg.run.log_every, DEFAULT_LOG_EVERY);
        assert_eq!(cfg.integrator.kind, IntegratorKind::Verlet);
    }

    #[test]
    fn mesh_on_open_box_is_rejected() {
        let text = RUN.replace(
            "lengths = [10.0, 10.0, 10.0]",
            "lengths = [10.0, 10.0, 10.0]\nboundaries = [\"periodic\", \"periodic\", \"open\"]",
        );
        assert!(matches!(
            SimConfig::from_toml(&text),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn short_range_law_cannot_use_mesh() {
        let text = RUN.replace(
            "law = { kind = \"yukawa\", kappa = 1.0 }",
            "law = { kind = \"lennard_jones\" }",
        );
        assert!(SimConfig::from_toml(&text).is_err());
    }

    #[test]
    fn missing_cutoff_needs_tuning() {
        let text = RUN.replace("rc = 3.0\n", "");
        assert!(SimConfig::from_toml(&text).is_err());
        let tuned = text.replace("alpha = 0.8", "alpha = 0.8\ntune = true");
        assert!(SimConfig::from_toml(&tuned).is_ok());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            SimConfig::from_toml("species = 3"),
            Err(SimError::Parse(_))
        ));
    }
}
