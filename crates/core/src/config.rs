//! Parameter bundle loaded from a run's parameter file (spec.md §6).
//!
//! Mirrors the teacher's `StrataConfig`/`strata.toml` pattern: one
//! `#[derive(Deserialize)]` struct per parameter group, `#[serde(default)]`
//! for optional fields, and a documented default template.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SageError, SageResult};

/// Parameter file name convention, analogous to the teacher's `strata.toml`.
pub const PARAMETER_FILE_NAME: &str = "sage.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CosmologyParams {
    pub omega: f64,
    pub omega_lambda: f64,
    pub hubble_h: f64,
    pub particle_mass: f64,
    pub baryon_fraction: f64,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    #[serde(default = "default_hubble")]
    pub hubble: f64,
}

fn default_gravity() -> f64 {
    6.674e-8 // CGS
}

fn default_hubble() -> f64 {
    100.0 // (km/s)/Mpc, scaled by hubble_h
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitsParams {
    pub length_cm: f64,
    pub mass_g: f64,
    pub velocity_cm_per_s: f64,
    #[serde(default)]
    pub time_s: Option<f64>,
}

impl UnitsParams {
    /// Derived time unit, `length / velocity`, when not given explicitly.
    pub fn time_unit_s(&self) -> f64 {
        self.time_s.unwrap_or(self.length_cm / self.velocity_cm_per_s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationParams {
    pub max_snapshot: u32,
    pub output_snapshots: Vec<u32>,
    /// Cosmic time (in internal time units) indexed by snapshot; length >= max_snapshot+1.
    pub snapshot_ages: Vec<f64>,
    /// Number of sub-steps each inter-snapshot interval is divided into (§4.8).
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Fixed capacity of the merger queue per FOF per sub-step (§4.5).
    #[serde(default = "default_max_galaxies_per_halo")]
    pub max_galaxies_per_halo: usize,
}

fn default_steps() -> usize {
    10
}

fn default_max_galaxies_per_halo() -> usize {
    1024
}

impl SimulationParams {
    /// `Age[n] - Age[n-1]`, divided by STEPS (§4.8 sub-step time convention).
    pub fn dt_for_snapshot(&self, n: u32) -> SageResult<f64> {
        if n == 0 {
            return Ok(0.0);
        }
        let ages = &self.snapshot_ages;
        let (prev, cur) = (
            ages.get(n as usize - 1),
            ages.get(n as usize),
        );
        match (prev, cur) {
            (Some(&prev), Some(&cur)) => Ok((cur - prev) / self.steps as f64),
            _ => Err(SageError::Config(format!(
                "snapshot_ages has no entry for snapshot {n} or {}",
                n - 1
            ))),
        }
    }

    pub fn age_at(&self, n: u32) -> SageResult<f64> {
        self.snapshot_ages
            .get(n as usize)
            .copied()
            .ok_or_else(|| SageError::Config(format!("snapshot_ages has no entry for snapshot {n}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IoParams {
    pub tree_type: String,
    pub output_format: String,
    #[serde(default = "default_file_nr_mulfac")]
    pub file_nr_mulfac: u64,
    #[serde(default = "default_forest_nr_mulfac")]
    pub forest_nr_mulfac: u64,
}

fn default_file_nr_mulfac() -> u64 {
    1_000_000_000_000
}

fn default_forest_nr_mulfac() -> u64 {
    1_000_000
}

/// How a violated reservoir invariant (I4/I5) is handled (§7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvariantPolicy {
    #[default]
    Fatal,
    ClampAndWarn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeParams {
    #[serde(default)]
    pub module_directory: Option<String>,
    #[serde(default)]
    pub enable_module_discovery: bool,
    pub merger_handler_module: String,
    pub merger_handler_function: String,
    pub disruption_handler_module: String,
    pub disruption_handler_function: String,
    #[serde(default)]
    pub invariant_policy: InvariantPolicy,
    /// If true, a module step's error code stops the rest of the phase's steps
    /// (§4.4 "configuration flag allows fail-fast"). Default is error-tolerant.
    #[serde(default)]
    pub fail_fast: bool,
}

/// The full parameter bundle for a run (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SageConfig {
    pub cosmology: CosmologyParams,
    pub units: UnitsParams,
    pub simulation: SimulationParams,
    pub io: IoParams,
    pub runtime: RuntimeParams,
}

impl SageConfig {
    pub fn from_file(path: &Path) -> SageResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SageError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| SageError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn default_toml() -> &'static str {
        r#"# sage parameter file
[cosmology]
omega = 0.25
omega_lambda = 0.75
hubble_h = 0.73
particle_mass = 0.0860657
baryon_fraction = 0.17

[units]
length_cm = 3.08568e24
mass_g = 1.989e43
velocity_cm_per_s = 1e5

[simulation]
max_snapshot = 63
output_snapshots = [63]
snapshot_ages = []
steps = 10
max_galaxies_per_halo = 1024

[io]
tree_type = "lhalo_binary"
output_format = "binary"

[runtime]
enable_module_discovery = false
merger_handler_module = "mergers"
merger_handler_function = "process_merger"
disruption_handler_module = "mergers"
disruption_handler_function = "process_disruption"
invariant_policy = "fatal"
fail_fast = false
"#
    }
}
