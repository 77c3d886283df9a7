//! A reference `mergers` module, registered by the CLI under the names
//! `RuntimeParams::merger_handler_*`/`disruption_handler_*` default to
//! (spec.md §4.5, §6). Bundled physics modules are out of scope for the
//! core (spec.md §1); this is the minimal handler pair that lets a
//! freshly-checked-out run actually drain its merger queue rather than
//! fail at startup with `ModuleNotFound`.

use sage_core::types::GalaxyType;
use sage_engine::PipelineContext;

/// Folds a satellite's reservoirs into its central and tombstones it.
pub fn process_merger(ctx: &mut PipelineContext) -> i32 {
    let Some(event) = ctx.merger_event else {
        return 1;
    };

    let Some(satellite) = ctx.fof_buffer.get(event.satellite_idx).cloned() else {
        return 1;
    };

    let Some(central) = ctx.fof_buffer.get_mut(event.central_idx) else {
        return 1;
    };
    central.reservoirs.cold_disk_gas.mass += satellite.reservoirs.cold_disk_gas.mass;
    central.reservoirs.cold_disk_gas.metals += satellite.reservoirs.cold_disk_gas.metals;
    central.reservoirs.stellar_disk.mass += satellite.reservoirs.stellar_disk.mass;
    central.reservoirs.stellar_disk.metals += satellite.reservoirs.stellar_disk.metals;
    central.reservoirs.stellar_bulge.mass += satellite.reservoirs.stellar_bulge.mass;
    central.reservoirs.stellar_bulge.metals += satellite.reservoirs.stellar_bulge.metals;
    central.reservoirs.hot_halo_gas.mass += satellite.reservoirs.hot_halo_gas.mass;
    central.reservoirs.hot_halo_gas.metals += satellite.reservoirs.hot_halo_gas.metals;
    central.reservoirs.ejected_gas.mass += satellite.reservoirs.ejected_gas.mass;
    central.reservoirs.ejected_gas.metals += satellite.reservoirs.ejected_gas.metals;
    central.reservoirs.black_hole.mass += satellite.reservoirs.black_hole.mass;
    central.reservoirs.black_hole.metals += satellite.reservoirs.black_hole.metals;
    central.reservoirs.intracluster_stars.mass += satellite.reservoirs.intracluster_stars.mass;
    central.reservoirs.intracluster_stars.metals += satellite.reservoirs.intracluster_stars.metals;

    let Some(satellite) = ctx.fof_buffer.get_mut(event.satellite_idx) else {
        return 1;
    };
    satellite.galaxy_type = GalaxyType::Merged;
    satellite.merged = true;
    satellite.time_of_last_merger = ctx.time;
    satellite.merger.remaining_merger_time = 0.0;

    0
}

/// Counts a not-yet-due merger event down by one sub-step.
pub fn process_disruption(ctx: &mut PipelineContext) -> i32 {
    let Some(event) = ctx.merger_event else {
        return 1;
    };
    let Some(satellite) = ctx.fof_buffer.get_mut(event.satellite_idx) else {
        return 1;
    };
    satellite.merger.remaining_merger_time = (event.remaining_merger_time - event.dt).max(0.0);
    0
}
