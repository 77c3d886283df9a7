//! Quantified invariants from spec.md §8 (P1-P12), checked against the full
//! `ForestDriver::run_forest` path (or, where the invariant concerns
//! transient assembly state the driver doesn't expose, against
//! `FofAssembler::assemble` directly, the same entry point
//! `crates/engine/src/fof_assembler.rs`'s own unit tests use).

mod support;

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use sage_core::types::{Galaxy, GalaxyType, MergerType};
use sage_core::{ForestId, GalaxyIndex, GalaxyRecord, GalaxyWriter, HaloIndex, SageResult, Snapshot};
use sage_engine::merger_queue::MergerEvent;
use sage_engine::module::ModuleTypeTag;
use sage_engine::{AssemblyDiagnostics, FofAssembler, ForestDriver, MergerHandlers, ModuleRegistry, Pipeline, PipelineContext};
use sage_primitives::PropertyTable;
use sage_storage::GalaxyContainer;

struct CollectingWriter {
    records: Vec<GalaxyRecord>,
}

impl CollectingWriter {
    fn new() -> Self {
        CollectingWriter { records: Vec::new() }
    }
}

impl GalaxyWriter for CollectingWriter {
    fn write(&mut self, record: GalaxyRecord) -> SageResult<()> {
        self.records.push(record);
        Ok(())
    }
}

fn no_op_handlers() -> MergerHandlers {
    MergerHandlers {
        merger_module: sage_core::ModuleId(0),
        merger_function: "process_merger",
        disruption_module: sage_core::ModuleId(0),
        disruption_function: "process_disruption",
    }
}

/// One FOF group at snapshot 10 with a central and a satellite, each
/// descending from its own trivial FOF at snapshot 9 (same shape as the
/// satellite-via-infall scenario).
fn central_and_satellite_halos() -> Vec<sage_core::Halo> {
    let mut halos = vec![
        support::halo(10, 2e12),
        support::halo(10, 5e11),
        support::halo(9, 2e12),
        support::halo(9, 5e11),
    ];
    halos[0].next_in_fof = Some(HaloIndex(1));
    halos[0].first_progenitor = Some(HaloIndex(2));
    halos[1].fof_root = HaloIndex(0);
    halos[1].first_progenitor = Some(HaloIndex(3));
    halos[2].fof_root = HaloIndex(2);
    halos[3].fof_root = HaloIndex(3);
    halos
}

#[test]
fn p1_and_p2_exactly_one_central_with_consistent_reference() {
    let halos = central_and_satellite_halos();
    let cfg = support::config(10, vec![10], 16);
    let registry = ModuleRegistry::new();
    let pipeline = Pipeline::create("p1p2", false);
    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, no_op_handlers(), &properties, &mut writer)
        .unwrap();

    let centrals: Vec<_> = writer.records.iter().filter(|r| matches!(r.galaxy.galaxy_type, GalaxyType::Central)).collect();
    assert_eq!(centrals.len(), 1, "P1: exactly one central in the FOF group's output");
    let central = centrals[0];

    for record in &writer.records {
        // P2: every galaxy's `fof_central` resolves to a record that is
        // itself typed Central and lives in the same FOF group (here,
        // "same FOF group" means the same current_halo root, i.e. halo 0).
        assert_eq!(record.central_galaxy_index, central.galaxy_index);
        assert!(matches!(central.galaxy.galaxy_type, GalaxyType::Central));
    }
}

#[test]
fn p3_and_p4_reservoir_invariants_are_enforced_after_a_substep() {
    use sage_core::InvariantPolicy;

    let mut halos = vec![support::halo(0, 1e12)];
    halos[0].fof_root = HaloIndex(0);
    let mut cfg = support::config(0, vec![0], 8);
    cfg.runtime.invariant_policy = InvariantPolicy::ClampAndWarn;

    let mut registry = ModuleRegistry::new();
    let corrupt = registry.register("corrupt_reservoir", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            corrupt,
            "corrupt",
            |ctx: &mut PipelineContext| -> i32 {
                if let Some(g) = ctx.fof_buffer.get_mut(ctx.central_index) {
                    g.reservoirs.stellar_disk.mass = -5.0;
                    g.reservoirs.cold_disk_gas.mass = 10.0;
                    g.reservoirs.cold_disk_gas.metals = 50.0;
                }
                0
            },
            "corrupt(ctx)",
        )
        .unwrap();
    let mut pipeline = Pipeline::create("p3p4", false);
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, corrupt, "corrupt").unwrap();

    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, no_op_handlers(), &properties, &mut writer)
        .unwrap();

    let galaxy = &writer.records[0].galaxy;
    assert!(galaxy.reservoirs.all_valid());
    assert_eq!(galaxy.reservoirs.stellar_disk.mass, 0.0);
    assert_eq!(galaxy.reservoirs.cold_disk_gas.metals, galaxy.reservoirs.cold_disk_gas.mass);
}

#[test]
fn p3_and_p4_clamp_to_valid_restores_invariants_for_arbitrary_inputs() {
    use sage_core::types::Reservoirs;

    let mut cases = vec![(-1.0, 2.0), (5.0, -3.0), (3.0, 9.0), (0.0, 0.0), (7.0, 7.0)];
    for (mass, metals) in cases.drain(..) {
        let mut reservoirs = Reservoirs::default();
        reservoirs.cold_disk_gas.mass = mass;
        reservoirs.cold_disk_gas.metals = metals;
        reservoirs.clamp_to_valid();
        assert!(reservoirs.all_valid(), "mass={mass} metals={metals} left invalid after clamping");
    }
}

#[test]
fn p5_and_p6_galaxy_nr_and_output_index_are_unique() {
    let halos = central_and_satellite_halos();
    let cfg = support::config(10, vec![9, 10], 16);
    let registry = ModuleRegistry::new();
    let pipeline = Pipeline::create("p5p6", false);
    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, no_op_handlers(), &properties, &mut writer)
        .unwrap();

    let mut galaxy_nrs: Vec<u64> = writer.records.iter().map(|r| r.galaxy.galaxy_nr.0).collect();
    galaxy_nrs.sort_unstable();
    let before = galaxy_nrs.len();
    galaxy_nrs.dedup();
    assert_eq!(galaxy_nrs.len(), before, "P5: galaxy_nr must be unique within the forest");

    let mut indices: Vec<u64> = writer.records.iter().map(|r| r.galaxy_index).collect();
    indices.sort_unstable();
    let before = indices.len();
    indices.dedup();
    assert_eq!(indices.len(), before, "P6: GalaxyIndex must be unique within the output file");
}

#[test]
fn p7_merged_galaxies_never_appear_in_output() {
    let mut halos = central_and_satellite_halos();
    halos.truncate(4);
    let cfg = support::config_with_steps(10, vec![10], 16, 3);

    let mut registry = ModuleRegistry::new();
    let queuer = registry.register("queue_merger", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            queuer,
            "maybe_queue",
            |ctx: &mut PipelineContext| -> i32 {
                if ctx.step != 0 {
                    return 0;
                }
                let Some(idx) = ctx.current_galaxy else { return 0 };
                let is_satellite = ctx.fof_buffer.get(idx).map(|g| matches!(g.galaxy_type, GalaxyType::Satellite)).unwrap_or(false);
                if !is_satellite {
                    return 0;
                }
                let event = MergerEvent {
                    satellite_idx: idx,
                    central_idx: ctx.central_index,
                    remaining_merger_time: 0.0,
                    time: ctx.time,
                    dt: ctx.dt,
                    fof_root: ctx.fof_root,
                    snapshot: ctx.snapshot,
                    step: ctx.step,
                    merger_type: MergerType::Minor,
                };
                let _ = ctx.merger_queue.queue_event(event);
                0
            },
            "maybe_queue(ctx)",
        )
        .unwrap();
    let mergers = registry.register("mergers", 1, ModuleTypeTag::Mergers, None, None);
    registry
        .register_function(
            mergers,
            "process_merger",
            |ctx: &mut PipelineContext| -> i32 {
                let Some(event) = ctx.merger_event else { return 1 };
                if let Some(s) = ctx.fof_buffer.get_mut(event.satellite_idx) {
                    s.galaxy_type = GalaxyType::Merged;
                    s.merged = true;
                }
                0
            },
            "process_merger(ctx)",
        )
        .unwrap();
    registry.register_function(mergers, "process_disruption", |_: &mut PipelineContext| -> i32 { 0 }, "process_disruption(ctx)").unwrap();

    let mut pipeline = Pipeline::create("p7", false);
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, queuer, "maybe_queue").unwrap();
    let handlers = MergerHandlers {
        merger_module: mergers,
        merger_function: "process_merger",
        disruption_module: mergers,
        disruption_function: "process_disruption",
    };

    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, handlers, &properties, &mut writer)
        .unwrap();

    assert!(writer.records.iter().all(|r| !r.galaxy.merged && !matches!(r.galaxy.galaxy_type, GalaxyType::Merged)));
    assert_eq!(writer.records.len(), 1);
}

#[test]
fn p8_running_the_same_forest_twice_is_idempotent() {
    let halos = central_and_satellite_halos();
    let cfg = support::config(10, vec![10], 16);

    let run = || {
        let registry = ModuleRegistry::new();
        let pipeline = Pipeline::create("p8", false);
        let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
        let driver = ForestDriver::new(&cfg);
        let mut writer = CollectingWriter::new();
        let forest = ForestId { file_nr: 0, forest_nr: 0 };
        driver
            .run_forest(forest, &halos, &cfg, &registry, &pipeline, no_op_handlers(), &properties, &mut writer)
            .unwrap();
        writer.records
    };

    let first = run();
    let second = run();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.galaxy.galaxy_nr, b.galaxy.galaxy_nr);
        assert_eq!(a.galaxy_index, b.galaxy_index);
        assert!(matches!((a.galaxy.galaxy_type.clone(), b.galaxy.galaxy_type.clone()), (x, y) if format!("{x:?}") == format!("{y:?}")));
        assert_eq!(a.galaxy.pos.x, b.galaxy.pos.x);
        assert_eq!(a.galaxy.reservoirs.total_baryonic_mass(), b.galaxy.reservoirs.total_baryonic_mass());
    }
}

static P9_OBSERVATIONS: OnceLock<Mutex<Vec<(usize, bool)>>> = OnceLock::new();

fn p9_observations() -> &'static Mutex<Vec<(usize, bool)>> {
    P9_OBSERVATIONS.get_or_init(|| Mutex::new(Vec::new()))
}

#[test]
fn p9_galaxy_phase_never_observes_a_merge_from_its_own_substep() {
    p9_observations().lock().unwrap().clear();

    let halos = central_and_satellite_halos();
    let cfg = support::config_with_steps(10, vec![10], 16, 3);

    let mut registry = ModuleRegistry::new();
    let probe = registry.register("probe", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            probe,
            "observe",
            |ctx: &mut PipelineContext| -> i32 {
                let Some(idx) = ctx.current_galaxy else { return 0 };
                let is_satellite_like = ctx
                    .fof_buffer
                    .get(idx)
                    .map(|g| matches!(g.galaxy_type, GalaxyType::Satellite))
                    .unwrap_or(false);
                if is_satellite_like {
                    let merged = ctx.fof_buffer.get(idx).map(|g| g.merged).unwrap_or(false);
                    p9_observations().lock().unwrap().push((ctx.step, merged));
                }
                0
            },
            "observe(ctx)",
        )
        .unwrap();
    let queuer = registry.register("queue_merger", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            queuer,
            "maybe_queue",
            |ctx: &mut PipelineContext| -> i32 {
                if ctx.step != 1 {
                    return 0;
                }
                let Some(idx) = ctx.current_galaxy else { return 0 };
                let is_satellite = ctx.fof_buffer.get(idx).map(|g| matches!(g.galaxy_type, GalaxyType::Satellite)).unwrap_or(false);
                if !is_satellite {
                    return 0;
                }
                let event = MergerEvent {
                    satellite_idx: idx,
                    central_idx: ctx.central_index,
                    remaining_merger_time: 0.0,
                    time: ctx.time,
                    dt: ctx.dt,
                    fof_root: ctx.fof_root,
                    snapshot: ctx.snapshot,
                    step: ctx.step,
                    merger_type: MergerType::Minor,
                };
                let _ = ctx.merger_queue.queue_event(event);
                0
            },
            "maybe_queue(ctx)",
        )
        .unwrap();
    let mergers = registry.register("mergers", 1, ModuleTypeTag::Mergers, None, None);
    registry
        .register_function(
            mergers,
            "process_merger",
            |ctx: &mut PipelineContext| -> i32 {
                let Some(event) = ctx.merger_event else { return 1 };
                if let Some(s) = ctx.fof_buffer.get_mut(event.satellite_idx) {
                    s.galaxy_type = GalaxyType::Merged;
                    s.merged = true;
                }
                0
            },
            "process_merger(ctx)",
        )
        .unwrap();
    registry.register_function(mergers, "process_disruption", |_: &mut PipelineContext| -> i32 { 0 }, "process_disruption(ctx)").unwrap();

    let mut pipeline = Pipeline::create("p9", false);
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, probe, "observe").unwrap();
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, queuer, "maybe_queue").unwrap();
    let handlers = MergerHandlers {
        merger_module: mergers,
        merger_function: "process_merger",
        disruption_module: mergers,
        disruption_function: "process_disruption",
    };

    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, handlers, &properties, &mut writer)
        .unwrap();

    let observations = p9_observations().lock().unwrap().clone();
    // Steps 0 and 1: the satellite is still live and unmerged during its own
    // GALAXY phase, even step 1 where the merge is queued (it resolves only
    // in that same substep's POST drain). Step 2: already tombstoned, so the
    // GALAXY-phase loop's skip check excludes it entirely — no observation.
    assert_eq!(observations, vec![(0, false), (1, false)]);
}

static P10_ORDER: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

fn p10_order() -> &'static Mutex<Vec<String>> {
    P10_ORDER.get_or_init(|| Mutex::new(Vec::new()))
}

#[test]
fn p10_phases_run_in_fixed_order_with_ascending_galaxy_index_within_galaxy_phase() {
    p10_order().lock().unwrap().clear();

    let halos = central_and_satellite_halos();
    let cfg = support::config(10, vec![10], 16);

    let mut registry = ModuleRegistry::new();
    let tracker = registry.register("phase_tracker", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            tracker,
            "halo_mark",
            |_ctx: &mut PipelineContext| -> i32 {
                p10_order().lock().unwrap().push("halo".to_string());
                0
            },
            "halo_mark(ctx)",
        )
        .unwrap();
    registry
        .register_function(
            tracker,
            "galaxy_mark",
            |ctx: &mut PipelineContext| -> i32 {
                let idx = ctx.current_galaxy.unwrap();
                p10_order().lock().unwrap().push(format!("galaxy:{}", idx.0));
                0
            },
            "galaxy_mark(ctx)",
        )
        .unwrap();
    registry
        .register_function(
            tracker,
            "post_mark",
            |_ctx: &mut PipelineContext| -> i32 {
                p10_order().lock().unwrap().push("post".to_string());
                0
            },
            "post_mark(ctx)",
        )
        .unwrap();
    registry
        .register_function(
            tracker,
            "final_mark",
            |_ctx: &mut PipelineContext| -> i32 {
                p10_order().lock().unwrap().push("final".to_string());
                0
            },
            "final_mark(ctx)",
        )
        .unwrap();

    let mut pipeline = Pipeline::create("p10", false);
    pipeline.add_step(&registry, sage_engine::Phase::Halo, tracker, "halo_mark").unwrap();
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, tracker, "galaxy_mark").unwrap();
    pipeline.add_step(&registry, sage_engine::Phase::Post, tracker, "post_mark").unwrap();
    pipeline.add_step(&registry, sage_engine::Phase::Final, tracker, "final_mark").unwrap();

    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, no_op_handlers(), &properties, &mut writer)
        .unwrap();

    let order = p10_order().lock().unwrap().clone();
    assert_eq!(order[0], "halo");
    assert_eq!(order.last().unwrap(), "final");
    let galaxy_positions: Vec<usize> = order.iter().filter(|s| s.starts_with("galaxy:")).map(|s| s[7..].parse().unwrap()).collect();
    let mut sorted = galaxy_positions.clone();
    sorted.sort_unstable();
    assert_eq!(galaxy_positions, sorted, "GALAXY steps run in ascending galaxy index order within a sub-step");
    let post_idx = order.iter().position(|s| s == "post").unwrap();
    let last_galaxy_idx = order.iter().rposition(|s| s.starts_with("galaxy:")).unwrap();
    assert!(post_idx > last_galaxy_idx, "POST runs after every GALAXY step");
}

static P11_ORDER: OnceLock<Mutex<Vec<u32>>> = OnceLock::new();

fn p11_order() -> &'static Mutex<Vec<u32>> {
    P11_ORDER.get_or_init(|| Mutex::new(Vec::new()))
}

#[test]
fn p11_drained_events_are_handled_in_fifo_insertion_order() {
    p11_order().lock().unwrap().clear();

    // One central plus three satellites, all at the same FOF group, each
    // queuing a merger event during the GALAXY phase in ascending buffer
    // (and therefore insertion) order.
    let mut halos = vec![
        support::halo(10, 3e12),
        support::halo(10, 1e11),
        support::halo(10, 1e11),
        support::halo(10, 1e11),
        support::halo(9, 3e12),
        support::halo(9, 1e11),
        support::halo(9, 1e11),
        support::halo(9, 1e11),
    ];
    halos[0].next_in_fof = Some(HaloIndex(1));
    halos[1].next_in_fof = Some(HaloIndex(2));
    halos[2].next_in_fof = Some(HaloIndex(3));
    halos[0].first_progenitor = Some(HaloIndex(4));
    halos[1].fof_root = HaloIndex(0);
    halos[1].first_progenitor = Some(HaloIndex(5));
    halos[2].fof_root = HaloIndex(0);
    halos[2].first_progenitor = Some(HaloIndex(6));
    halos[3].fof_root = HaloIndex(0);
    halos[3].first_progenitor = Some(HaloIndex(7));
    halos[4].fof_root = HaloIndex(4);
    halos[5].fof_root = HaloIndex(5);
    halos[6].fof_root = HaloIndex(6);
    halos[7].fof_root = HaloIndex(7);

    let cfg = support::config(10, vec![10], 16);

    let mut registry = ModuleRegistry::new();
    let queuer = registry.register("queue_all", 1, ModuleTypeTag::UserDefined("test".into()), None, None);
    registry
        .register_function(
            queuer,
            "queue_if_satellite",
            |ctx: &mut PipelineContext| -> i32 {
                let Some(idx) = ctx.current_galaxy else { return 0 };
                let is_satellite = ctx.fof_buffer.get(idx).map(|g| matches!(g.galaxy_type, GalaxyType::Satellite)).unwrap_or(false);
                if !is_satellite {
                    return 0;
                }
                let event = MergerEvent {
                    satellite_idx: idx,
                    central_idx: ctx.central_index,
                    remaining_merger_time: 0.0,
                    time: ctx.time,
                    dt: ctx.dt,
                    fof_root: ctx.fof_root,
                    snapshot: ctx.snapshot,
                    step: ctx.step,
                    merger_type: MergerType::Minor,
                };
                let _ = ctx.merger_queue.queue_event(event);
                0
            },
            "queue_if_satellite(ctx)",
        )
        .unwrap();
    let mergers = registry.register("mergers", 1, ModuleTypeTag::Mergers, None, None);
    registry
        .register_function(
            mergers,
            "process_merger",
            |ctx: &mut PipelineContext| -> i32 {
                let Some(event) = ctx.merger_event else { return 1 };
                p11_order().lock().unwrap().push(event.satellite_idx.0);
                if let Some(s) = ctx.fof_buffer.get_mut(event.satellite_idx) {
                    s.galaxy_type = GalaxyType::Merged;
                    s.merged = true;
                }
                0
            },
            "process_merger(ctx)",
        )
        .unwrap();
    registry.register_function(mergers, "process_disruption", |_: &mut PipelineContext| -> i32 { 0 }, "process_disruption(ctx)").unwrap();

    let mut pipeline = Pipeline::create("p11", false);
    pipeline.add_step(&registry, sage_engine::Phase::Galaxy, queuer, "queue_if_satellite").unwrap();
    let handlers = MergerHandlers {
        merger_module: mergers,
        merger_function: "process_merger",
        disruption_module: mergers,
        disruption_function: "process_disruption",
    };

    let properties = PropertyTable::with_standard_properties(cfg.simulation.steps).unwrap();
    let driver = ForestDriver::new(&cfg);
    let mut writer = CollectingWriter::new();
    let forest = ForestId { file_nr: 0, forest_nr: 0 };

    driver
        .run_forest(forest, &halos, &cfg, &registry, &pipeline, handlers, &properties, &mut writer)
        .unwrap();

    let order = p11_order().lock().unwrap().clone();
    assert_eq!(order.len(), 3);
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted, "events drained in ascending GalaxyIndex order == insertion order (GALAXY phase iterates 0..count)");
}

#[test]
fn p12_exactly_one_orphan_per_non_main_branch_progenitor() {
    // Two progenitors at snapshot 9 feed one halo at snapshot 10: the
    // larger is the main branch, the smaller's halo is disrupted (no
    // surviving descendant), so it must produce exactly one orphan.
    let mut halos = vec![
        support::halo(10, 2.5e12),
        support::halo(9, 2e12),
        support::halo(9, 5e11),
    ];
    halos[0].first_progenitor = Some(HaloIndex(1));
    halos[1].next_progenitor = Some(HaloIndex(2));

    let properties = PropertyTable::with_standard_properties(1).unwrap();
    let mut previous = GalaxyContainer::new();
    let main_galaxy = Galaxy::primordial(sage_core::GalaxyNr(0), &halos[1], HaloIndex(1), Snapshot(9), 1);
    let main_idx = previous.append(&main_galaxy, &properties);
    let disrupted_galaxy = Galaxy::primordial(sage_core::GalaxyNr(1), &halos[2], HaloIndex(2), Snapshot(9), 1);
    let disrupted_idx = previous.append(&disrupted_galaxy, &properties);

    let mut galaxies_by_halo = HashMap::new();
    galaxies_by_halo.insert(HaloIndex(1), vec![main_idx]);
    galaxies_by_halo.insert(HaloIndex(2), vec![disrupted_idx]);

    let mut processed = vec![false, false];
    let mut diagnostics = AssemblyDiagnostics::default();
    let mut next_nr = 2u64;
    let assembler = FofAssembler::new(1);

    let result = assembler
        .assemble(&halos, HaloIndex(0), Snapshot(10), &previous, &galaxies_by_halo, &mut processed, &properties, &mut next_nr, &mut diagnostics)
        .unwrap();

    let orphans: Vec<_> = result.buffer.iter().filter(|g| matches!(g.galaxy_type, GalaxyType::Orphan)).collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].mvir, 0.0);
    assert!(orphans[0].merged);
    assert_eq!(diagnostics.orphans_created, 1);
}
