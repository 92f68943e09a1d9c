//! Error taxonomy for setup and stepping.
//!
//! Setup failures (`Configuration`, `ToleranceUnattainable`) are fatal before the
//! first step. `NumericalInstability` halts a running simulation. `Io` and `Parse`
//! are only produced by the outer shell (run-file loading, checkpoints).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("force-error tolerance {tolerance:e} unattainable within search bounds (best total error {best:e})")]
    ToleranceUnattainable { tolerance: f64, best: f64 },

    #[error("numerical instability at step {step}: {reason} (particles {particles:?})")]
    NumericalInstability {
        step: usize,
        particles: Vec<usize>,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run file parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    pub fn instability(step: usize, particles: Vec<usize>, reason: impl Into<String>) -> Self {
        SimError::NumericalInstability {
            step,
            particles,
            reason: reason.into(),
        }
    }

    /// True for errors raised before any step executes.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            SimError::Configuration(_) | SimError::ToleranceUnattainable { .. }
        )
    }
}
