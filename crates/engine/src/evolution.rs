//! The Evolution Loop (spec.md §4.8): advances one FOF group's transient
//! buffer across STEPS sub-steps, running the Pipeline's four phases each
//! sub-step and draining the merger queue in between.

use sage_core::types::GalaxyType;
use sage_core::{
    ForestId, GalaxyIndex, HaloIndex, InvariantPolicy, ModuleId, SageError, SageResult, Snapshot,
};
use sage_primitives::PropertyTable;
use sage_storage::GalaxyContainer;

use crate::merger_queue::MergerQueue;
use crate::module::ModuleRegistry;
use crate::pipeline::{Phase, Pipeline, PipelineContext};

/// Diagnostics accumulated across one FOF group's sub-steps (SPEC_FULL.md
/// "RunSummary" supplement).
#[derive(Debug, Default, Clone, Copy)]
pub struct EvolutionDiagnostics {
    pub mergers_resolved: u64,
    pub disruptions_resolved: u64,
    /// A drained event referenced a satellite or central index no longer
    /// present in the buffer; logged and skipped rather than treated as fatal.
    pub stale_merger_events_skipped: u64,
}

/// A configured merger/disruption handler: the module and function name the
/// Evolution Loop calls when draining a merger-queue event (spec.md §6
/// `RuntimeParams`, resolved once at forest-driver setup via
/// `ModuleRegistry::module_id_by_name`).
#[derive(Debug, Clone, Copy)]
pub struct MergerHandlers {
    pub merger_module: ModuleId,
    pub merger_function: &'static str,
    pub disruption_module: ModuleId,
    pub disruption_function: &'static str,
}

/// Advances one FOF group's transient buffer across STEPS sub-steps
/// (spec.md §4.8).
pub struct EvolutionLoop {
    steps: usize,
    invariant_policy: InvariantPolicy,
}

impl EvolutionLoop {
    pub fn new(steps: usize, invariant_policy: InvariantPolicy) -> Self {
        EvolutionLoop { steps, invariant_policy }
    }

    /// Runs every sub-step's HALO/GALAXY/POST phases plus the merger drain,
    /// then the single FINAL phase after the last sub-step.
    ///
    /// `age_prev` is `Age[N-1]`; `dt` is the fixed `(Age[N]-Age[N-1])/STEPS`
    /// sub-step duration (spec.md §4.8, §9 "Δt convention" — reused for every
    /// sub-step even when the progenitor gap spans more than one snapshot).
    #[allow(clippy::too_many_arguments)]
    pub fn run_fof(
        &self,
        buffer: &mut GalaxyContainer,
        central_index: GalaxyIndex,
        pipeline: &Pipeline,
        registry: &ModuleRegistry,
        merger_queue: &mut MergerQueue,
        properties: &PropertyTable,
        forest: ForestId,
        fof_root: HaloIndex,
        snapshot: Snapshot,
        age_prev: f64,
        dt: f64,
        handlers: MergerHandlers,
        diagnostics: &mut EvolutionDiagnostics,
    ) -> SageResult<()> {
        merger_queue.init();

        for step in 0..self.steps {
            let time = age_prev + step as f64 * dt;

            {
                let mut ctx = PipelineContext::new(
                    buffer, merger_queue, properties, central_index, forest, snapshot, fof_root, time, dt, step,
                );
                let result = pipeline.execute_phase(&mut ctx, Phase::Halo);
                self.tolerate_or_propagate(pipeline, result, "halo")?;
            }

            for i in 0..buffer.count() {
                let idx = GalaxyIndex(i as u32);
                let skip = buffer
                    .get(idx)
                    .map(|g| matches!(g.galaxy_type, GalaxyType::Merged) || g.merged)
                    .unwrap_or(true);
                if skip {
                    continue;
                }
                let mut ctx = PipelineContext::new(
                    buffer, merger_queue, properties, central_index, forest, snapshot, fof_root, time, dt, step,
                );
                ctx.current_galaxy = Some(idx);
                let result = pipeline.execute_phase(&mut ctx, Phase::Galaxy);
                self.tolerate_or_propagate(pipeline, result, "galaxy")?;
            }

            {
                let mut ctx = PipelineContext::new(
                    buffer, merger_queue, properties, central_index, forest, snapshot, fof_root, time, dt, step,
                );
                let result = pipeline.execute_phase(&mut ctx, Phase::Post);
                self.tolerate_or_propagate(pipeline, result, "post")?;
            }

            self.drain_mergers(
                buffer,
                merger_queue,
                registry,
                pipeline,
                properties,
                central_index,
                forest,
                snapshot,
                fof_root,
                time,
                dt,
                step,
                handlers,
                diagnostics,
            )?;

            self.enforce_invariants(buffer, forest, snapshot)?;
        }

        let final_time = age_prev + self.steps as f64 * dt;
        {
            let mut ctx = PipelineContext::new(
                buffer,
                merger_queue,
                properties,
                central_index,
                forest,
                snapshot,
                fof_root,
                final_time,
                dt,
                self.steps,
            );
            let result = pipeline.execute_phase(&mut ctx, Phase::Final);
            self.tolerate_or_propagate(pipeline, result, "final")?;
        }

        for i in 0..buffer.count() {
            if let Some(galaxy) = buffer.get_mut(GalaxyIndex(i as u32)) {
                galaxy.snapshot = snapshot;
            }
        }

        Ok(())
    }

    /// A module invocation failure is never fatal by itself (spec.md §4.3,
    /// §7): outside `fail_fast`, it is logged and swallowed here so the FOF
    /// keeps running; any other error (or a `ModuleInvocationFailure` under
    /// `fail_fast`) aborts the FOF's further phases, to be caught by the
    /// Forest Driver at the per-FOF level.
    fn tolerate_or_propagate(&self, pipeline: &Pipeline, result: SageResult<()>, phase: &str) -> SageResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_module_invocation_error() && !pipeline.fail_fast() => {
                tracing::warn!(error = %err, phase, "module invocation failed; tolerant policy continues to the next step");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Drains the merger queue (populated during this sub-step's GALAXY
    /// phase) and dispatches each event to the merger or disruption handler
    /// based on `remaining_merger_time` (spec.md §4.5: `<= 0.0` means the
    /// merger completes now, otherwise the event is a disruption check).
    ///
    /// This is a core-owned step, not a configurable pipeline step: a plain
    /// `ModuleFn` has no way to reach the registry to invoke a second named
    /// function, so draining happens here rather than as a `Pipeline` step
    /// (see `DESIGN.md`).
    #[allow(clippy::too_many_arguments)]
    fn drain_mergers(
        &self,
        buffer: &mut GalaxyContainer,
        merger_queue: &mut MergerQueue,
        registry: &ModuleRegistry,
        pipeline: &Pipeline,
        properties: &PropertyTable,
        central_index: GalaxyIndex,
        forest: ForestId,
        snapshot: Snapshot,
        fof_root: HaloIndex,
        time: f64,
        dt: f64,
        step: usize,
        handlers: MergerHandlers,
        diagnostics: &mut EvolutionDiagnostics,
    ) -> SageResult<()> {
        let events = merger_queue.drain();
        for event in events {
            let sat_ok = buffer.get(event.satellite_idx).is_some();
            let cen_ok = buffer.get(event.central_idx).is_some();
            if !sat_ok || !cen_ok {
                tracing::warn!(
                    satellite = ?event.satellite_idx,
                    central = ?event.central_idx,
                    "merger event referenced a galaxy no longer present in the buffer; skipping"
                );
                diagnostics.stale_merger_events_skipped += 1;
                continue;
            }

            let (module_id, function) = if event.remaining_merger_time <= 0.0 {
                diagnostics.mergers_resolved += 1;
                (handlers.merger_module, handlers.merger_function)
            } else {
                diagnostics.disruptions_resolved += 1;
                (handlers.disruption_module, handlers.disruption_function)
            };

            let mut ctx = PipelineContext::new(
                buffer, merger_queue, properties, central_index, forest, snapshot, fof_root, time, dt, step,
            );
            ctx.current_galaxy = Some(event.satellite_idx);
            ctx.merger_event = Some(event);
            let result = registry.invoke(module_id, function, &mut ctx);
            self.tolerate_or_propagate(pipeline, result, "merger_drain")?;
        }
        Ok(())
    }

    /// Checks I4/I5 over every live galaxy's reservoirs after a sub-step
    /// (spec.md P3, P4). Under `InvariantPolicy::Fatal` the first violation
    /// aborts the forest; under `ClampAndWarn` every violation is clamped in
    /// place and logged, and processing continues.
    fn enforce_invariants(&self, buffer: &mut GalaxyContainer, forest: ForestId, snapshot: Snapshot) -> SageResult<()> {
        for i in 0..buffer.count() {
            let idx = GalaxyIndex(i as u32);
            let Some(galaxy) = buffer.get_mut(idx) else { continue };
            if !galaxy.is_output_eligible() {
                continue;
            }
            if galaxy.reservoirs.all_valid() {
                continue;
            }
            match self.invariant_policy {
                InvariantPolicy::Fatal => {
                    return Err(SageError::InvariantViolation {
                        forest,
                        snapshot,
                        galaxy: idx,
                        reason: "reservoir mass/metals violated I4 or I5".to_string(),
                    });
                }
                InvariantPolicy::ClampAndWarn => {
                    galaxy.reservoirs.clamp_to_valid();
                    tracing::warn!(forest = %forest, snapshot = %snapshot.0, galaxy = %idx, "clamped reservoir invariant violation");
                }
            }
        }
        Ok(())
    }
}
