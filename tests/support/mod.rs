//! Shared helpers for the end-to-end scenario and invariant tests.

use sage_core::config::{CosmologyParams, IoParams, RuntimeParams, SimulationParams, UnitsParams};
use sage_core::types::Vec3;
use sage_core::{Halo, HaloIndex, InvariantPolicy, SageConfig, Snapshot};

/// A bare halo at `snapshot` with the given virial mass; every link field
/// defaults to "no link" so callers only set what the scenario needs.
pub fn halo(snapshot: u32, mvir: f64) -> Halo {
    Halo {
        snapshot: Snapshot(snapshot),
        mvir,
        vvir: 100.0,
        rvir: 50.0,
        vmax: 120.0,
        pos: Vec3 { x: 1.0, y: 2.0, z: 3.0 },
        vel: Vec3::ZERO,
        spin: Vec3::ZERO,
        len: (mvir / 1e10).max(1.0) as u32,
        most_bound_particle_id: 0,
        fof_root: HaloIndex(0),
        next_in_fof: None,
        first_progenitor: None,
        next_progenitor: None,
        descendant: None,
    }
}

/// A parameter bundle with one sub-step per snapshot and ages `0, 1, 2, ...`
/// up to `max_snapshot`, small enough for hand-built forests.
pub fn config(max_snapshot: u32, output_snapshots: Vec<u32>, max_galaxies_per_halo: usize) -> SageConfig {
    config_with_steps(max_snapshot, output_snapshots, max_galaxies_per_halo, 1)
}

/// As `config`, but with an explicit sub-step count (spec.md §4.8).
pub fn config_with_steps(
    max_snapshot: u32,
    output_snapshots: Vec<u32>,
    max_galaxies_per_halo: usize,
    steps: usize,
) -> SageConfig {
    SageConfig {
        cosmology: CosmologyParams {
            omega: 0.25,
            omega_lambda: 0.75,
            hubble_h: 0.73,
            particle_mass: 0.0860657,
            baryon_fraction: 0.17,
            gravity: 6.674e-8,
            hubble: 100.0,
        },
        units: UnitsParams { length_cm: 1.0, mass_g: 1.0, velocity_cm_per_s: 1.0, time_s: Some(1.0) },
        simulation: SimulationParams {
            max_snapshot,
            output_snapshots,
            snapshot_ages: (0..=max_snapshot).map(|s| s as f64).collect(),
            steps,
            max_galaxies_per_halo,
        },
        io: IoParams {
            tree_type: "test".into(),
            output_format: "test".into(),
            file_nr_mulfac: 1_000_000,
            forest_nr_mulfac: 1_000,
        },
        runtime: RuntimeParams {
            module_directory: None,
            enable_module_discovery: false,
            merger_handler_module: "mergers".into(),
            merger_handler_function: "process_merger".into(),
            disruption_handler_module: "mergers".into(),
            disruption_handler_function: "process_disruption".into(),
            invariant_policy: InvariantPolicy::Fatal,
            fail_fast: false,
        },
    }
}
