//! The Forest Driver (spec.md §4.10): orchestrates the Tree Walker, FOF
//! Assembler and Evolution Loop across one forest's snapshots, stages
//! output, and folds per-forest diagnostics into a run-level summary
//! (SPEC_FULL.md "RunSummary" supplement).

use std::collections::{BTreeMap, HashMap, HashSet};

use sage_core::{
    ForestId, GalaxyIndex, GalaxyWriter, Halo, HaloIndex, SageConfig, SageError, SageResult,
    Snapshot,
};
use sage_primitives::PropertyTable;
use sage_storage::GalaxyContainer;

use crate::evolution::{EvolutionDiagnostics, EvolutionLoop, MergerHandlers};
use crate::fof_assembler::{AssemblyDiagnostics, FofAssembler};
use crate::merger_queue::MergerQueue;
use crate::module::ModuleRegistry;
use crate::pipeline::Pipeline;
use crate::tree_walker::TreeWalker;

/// Per-forest diagnostics, folded into a `RunSummary` once the forest
/// completes (SPEC_FULL.md supplement).
#[derive(Debug, Clone)]
pub struct ForestSummary {
    pub forest: ForestId,
    pub galaxies_output: u64,
    pub orphans_created: u64,
    pub orphans_rescued: u64,
    pub complete_fof_disruption_losses: u64,
    pub mergers_resolved: u64,
    pub disruptions_resolved: u64,
    pub stale_merger_events_skipped: u64,
    /// FOF groups whose assembly or evolution hit a fof-fatal error
    /// (spec.md §4.8): discarded and skipped rather than aborting the forest.
    pub failed_fofs: u64,
    pub gap_histogram: BTreeMap<u32, u32>,
}

/// Aggregated diagnostics across every forest a run processes
/// (SPEC_FULL.md "RunSummary" supplement). Forests whose processing hits a
/// `is_fatal_for_forest` error are skipped, not fatal to the run — their
/// error is recorded here rather than aborting remaining forests.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub forests_completed: u64,
    pub forests_skipped: u64,
    pub galaxies_output: u64,
    pub orphans_created: u64,
    pub orphans_rescued: u64,
    pub complete_fof_disruption_losses: u64,
    pub mergers_resolved: u64,
    pub disruptions_resolved: u64,
    pub stale_merger_events_skipped: u64,
    pub failed_fofs: u64,
    pub gap_histogram: BTreeMap<u32, u32>,
    pub failed_forests: Vec<(ForestId, String)>,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary::default()
    }

    pub fn record_success(&mut self, summary: ForestSummary) {
        self.forests_completed += 1;
        self.galaxies_output += summary.galaxies_output;
        self.orphans_created += summary.orphans_created;
        self.orphans_rescued += summary.orphans_rescued;
        self.complete_fof_disruption_losses += summary.complete_fof_disruption_losses;
        self.mergers_resolved += summary.mergers_resolved;
        self.disruptions_resolved += summary.disruptions_resolved;
        self.stale_merger_events_skipped += summary.stale_merger_events_skipped;
        self.failed_fofs += summary.failed_fofs;
        for (gap, count) in summary.gap_histogram {
            *self.gap_histogram.entry(gap).or_insert(0) += count;
        }
    }

    /// Records a forest whose processing hit a forest-fatal error
    /// (`SageError::is_fatal_for_forest`); the run continues with the next
    /// forest rather than aborting entirely.
    pub fn record_failure(&mut self, forest: ForestId, err: &SageError) {
        self.forests_skipped += 1;
        self.failed_forests.push((forest, err.to_string()));
    }
}

/// Orchestrates one forest's full snapshot sequence (spec.md §4.10).
pub struct ForestDriver {
    assembler: FofAssembler,
    evolution: EvolutionLoop,
    output: crate::output::OutputStager,
}

impl ForestDriver {
    pub fn new(config: &SageConfig) -> Self {
        ForestDriver {
            assembler: FofAssembler::new(config.simulation.steps),
            evolution: EvolutionLoop::new(config.simulation.steps, config.runtime.invariant_policy),
            output: crate::output::OutputStager::new(config.io.file_nr_mulfac, config.io.forest_nr_mulfac),
        }
    }

    /// Processes one forest end to end: walks its tree, assembles and
    /// evolves every FOF group at every snapshot in ascending order, stages
    /// output at configured snapshots, and returns the forest's diagnostics.
    #[allow(clippy::too_many_arguments)]
    pub fn run_forest(
        &self,
        forest: ForestId,
        halos: &[Halo],
        config: &SageConfig,
        registry: &ModuleRegistry,
        pipeline: &Pipeline,
        handlers: MergerHandlers,
        properties: &PropertyTable,
        writer: &mut dyn GalaxyWriter,
    ) -> SageResult<ForestSummary> {
        let mut walker = TreeWalker::new(halos);
        let dispatch = walker.walk(forest)?;

        let output_snapshots: HashSet<u32> = config.simulation.output_snapshots.iter().copied().collect();
        let merger_capacity = config.simulation.max_galaxies_per_halo;

        let mut previous = GalaxyContainer::new();
        let mut next_galaxy_nr: u64 = 0;
        let mut assembly_diag = AssemblyDiagnostics::default();
        let mut evo_diag = EvolutionDiagnostics::default();
        let mut galaxies_output = 0u64;
        let mut total_failed_fofs = 0u64;

        let mut cursor = 0;
        while cursor < dispatch.len() {
            let snapshot = dispatch[cursor].0;
            let mut roots = Vec::new();
            while cursor < dispatch.len() && dispatch[cursor].0 == snapshot {
                roots.push(dispatch[cursor].1);
                cursor += 1;
            }

            let mut galaxies_by_halo: HashMap<HaloIndex, Vec<GalaxyIndex>> = HashMap::new();
            for (idx, galaxy) in previous.iter().enumerate() {
                galaxies_by_halo.entry(galaxy.current_halo).or_default().push(GalaxyIndex(idx as u32));
            }
            let mut previous_processed = vec![false; previous.count()];

            let dt = config.simulation.dt_for_snapshot(snapshot.0)?;
            let age_prev = if snapshot.0 == 0 { 0.0 } else { config.simulation.age_at(snapshot.0 - 1)? };

            let mut this_snapshot = GalaxyContainer::new();
            let mut failed_fofs = 0u64;

            for fof_root in roots {
                let mut merger_queue = MergerQueue::new(merger_capacity);
                let assembled = match self.assembler.assemble(
                    halos,
                    fof_root,
                    snapshot,
                    &previous,
                    &galaxies_by_halo,
                    &mut previous_processed,
                    properties,
                    &mut next_galaxy_nr,
                    &mut assembly_diag,
                ) {
                    Ok(assembled) => assembled,
                    Err(err) if err.is_fatal_for_fof() => {
                        tracing::warn!(forest = %forest, snapshot = %snapshot.0, fof_root = %fof_root, error = %err, "FOF assembly aborted; discarding this FOF and continuing with the next one");
                        failed_fofs += 1;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let mut buffer = assembled.buffer;
                let central_index = assembled.central_index;

                if let Err(err) = self.evolution.run_fof(
                    &mut buffer,
                    central_index,
                    pipeline,
                    registry,
                    &mut merger_queue,
                    properties,
                    forest,
                    fof_root,
                    snapshot,
                    age_prev,
                    dt,
                    handlers,
                    &mut evo_diag,
                ) {
                    if err.is_fatal_for_fof() {
                        tracing::warn!(forest = %forest, snapshot = %snapshot.0, fof_root = %fof_root, error = %err, "FOF evolution aborted; discarding this FOF and continuing with the next one");
                        failed_fofs += 1;
                        continue;
                    }
                    return Err(err);
                }

                let mut mapping = Vec::with_capacity(buffer.count());
                for galaxy in buffer.iter() {
                    mapping.push(this_snapshot.append(galaxy, properties));
                }
                if !mapping.is_empty() {
                    let new_central = mapping[central_index.0 as usize];
                    for &new_idx in &mapping {
                        if let Some(galaxy) = this_snapshot.get_mut(new_idx) {
                            galaxy.fof_central = new_central;
                        }
                    }
                }
            }

            // Any previous-snapshot galaxy never claimed by assembly or
            // orphan rescue at this snapshot is acknowledged as lost
            // (spec.md §4.7 "complete FOF disruption" edge case).
            let losses = previous_processed.iter().filter(|claimed| !**claimed).count() as u64;
            assembly_diag.complete_fof_disruption_losses += losses;
            total_failed_fofs += failed_fofs;

            if output_snapshots.contains(&snapshot.0) {
                galaxies_output += self.output.stage(&this_snapshot, forest, writer)?;
            }

            previous = this_snapshot;
        }

        Ok(ForestSummary {
            forest,
            galaxies_output,
            orphans_created: assembly_diag.orphans_created,
            orphans_rescued: assembly_diag.orphans_rescued,
            complete_fof_disruption_losses: assembly_diag.complete_fof_disruption_losses,
            mergers_resolved: evo_diag.mergers_resolved,
            disruptions_resolved: evo_diag.disruptions_resolved,
            stale_merger_events_skipped: evo_diag.stale_merger_events_skipped,
            failed_fofs: total_failed_fofs,
            gap_histogram: walker.gap_histogram().clone(),
        })
    }
}
