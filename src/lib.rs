pub mod cell_list;
pub mod config;
pub mod error;
pub mod init_config;
pub mod io;
pub mod particles;
pub mod potential;
pub mod pppm;
pub mod profiler;
pub mod simulation;
pub mod simulation_box;
pub mod species;
pub mod units;
pub mod utils;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use simulation::{HaltReason, RunState, Simulation};

#[cfg(feature = "profiling")]
use once_cell::sync::Lazy;
#[cfg(feature = "profiling")]
use parking_lot::Mutex;

#[cfg(feature = "profiling")]
pub static PROFILER: Lazy<Mutex<profiler::Profiler>> =
    Lazy::new(|| Mutex::new(profiler::Profiler::new()));
