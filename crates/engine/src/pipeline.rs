//! The Pipeline (spec.md §4.4): ordered steps bound to one of the four
//! execution phases, and the context a step sees while it runs.

use sage_core::{ForestId, GalaxyIndex, HaloIndex, ModuleId, SageError, SageResult, Snapshot};
use sage_primitives::PropertyTable;
use sage_storage::GalaxyContainer;

use crate::merger_queue::{MergerEvent, MergerQueue};
use crate::module::{ModuleFn, ModuleRegistry};

/// The four execution phases a sub-step runs through, in this order
/// (spec.md §4.4, invariant P10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Halo,
    Galaxy,
    Post,
    Final,
}

/// The read/write surface a module step sees. Borrowed for the duration of
/// one step invocation only — modules must not retain references across
/// phase boundaries (spec.md §5 "Shared-resource policy").
pub struct PipelineContext<'a> {
    pub fof_buffer: &'a mut GalaxyContainer,
    pub merger_queue: &'a mut MergerQueue,
    pub properties: &'a PropertyTable,
    pub central_index: GalaxyIndex,
    pub current_galaxy: Option<GalaxyIndex>,
    pub forest: ForestId,
    pub snapshot: Snapshot,
    pub fof_root: HaloIndex,
    pub time: f64,
    pub dt: f64,
    pub step: usize,
    /// Set only while a merger-drain handler is running (spec.md §4.5):
    /// the event that triggered the call.
    pub merger_event: Option<MergerEvent>,
}

impl<'a> PipelineContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fof_buffer: &'a mut GalaxyContainer,
        merger_queue: &'a mut MergerQueue,
        properties: &'a PropertyTable,
        central_index: GalaxyIndex,
        forest: ForestId,
        snapshot: Snapshot,
        fof_root: HaloIndex,
        time: f64,
        dt: f64,
        step: usize,
    ) -> Self {
        PipelineContext {
            fof_buffer,
            merger_queue,
            properties,
            central_index,
            current_galaxy: None,
            forest,
            snapshot,
            fof_root,
            time,
            dt,
            step,
            merger_event: None,
        }
    }
}

#[cfg(test)]
impl PipelineContext<'static> {
    /// A context over freshly leaked, empty collaborators — only for tests
    /// that exercise module dispatch in isolation from a real forest pass.
    pub fn test_empty() -> Self {
        let buffer: &'static mut GalaxyContainer = Box::leak(Box::new(GalaxyContainer::new()));
        let queue: &'static mut MergerQueue = Box::leak(Box::new(MergerQueue::new(1)));
        let properties: &'static PropertyTable = Box::leak(Box::new(PropertyTable::new(1)));
        PipelineContext::new(
            buffer,
            queue,
            properties,
            GalaxyIndex(0),
            ForestId { file_nr: 0, forest_nr: 0 },
            Snapshot(0),
            HaloIndex(0),
            0.0,
            0.0,
            0,
        )
    }
}

/// One pipeline step: a phase binding plus an already-resolved function
/// pointer (spec.md §9 — resolution happens once, at `add_step` time, not
/// per galaxy).
struct PipelineStep {
    phase: Phase,
    module_id: ModuleId,
    function_name: String,
    resolved: ModuleFn,
}

/// An ordered sequence of steps bound to phases (spec.md §4.4).
pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
    /// When true, a step's non-zero error code stops the rest of that
    /// phase's steps; otherwise execution is error-tolerant (default).
    fail_fast: bool,
}

impl Pipeline {
    pub fn create(name: &str, fail_fast: bool) -> Self {
        Pipeline { name: name.to_string(), steps: Vec::new(), fail_fast }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a step's non-zero code aborts the rest of its phase
    /// immediately. The Evolution Loop consults this to decide whether a
    /// `ModuleInvocationFailure` it sees back from `execute_phase` should
    /// abort the current FOF or just be logged (spec.md §4.3 "invocation
    /// errors are never fatal" / §7 "the core logs and continues to next
    /// step by default").
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Resolves `(module_id, function_name)` through the registry once and
    /// appends the step; order of `add_step` calls is execution order within
    /// the phase.
    pub fn add_step(
        &mut self,
        registry: &ModuleRegistry,
        phase: Phase,
        module_id: ModuleId,
        function_name: &str,
    ) -> SageResult<()> {
        let resolved = registry.resolve_by_id(module_id, function_name)?;
        self.steps.push(PipelineStep {
            phase,
            module_id,
            function_name: function_name.to_string(),
            resolved,
        });
        Ok(())
    }

    /// Runs every step bound to `phase`, in registration order.
    ///
    /// A step's non-zero code always produces a logged
    /// `ModuleInvocationFailure`; under `fail_fast` that error is returned
    /// immediately, otherwise execution continues to the next step and the
    /// last error (if any) is returned to the caller once the phase
    /// completes so the Evolution Loop can decide what to do with it.
    pub fn execute_phase(&self, ctx: &mut PipelineContext, phase: Phase) -> SageResult<()> {
        let mut last_error: Option<SageError> = None;
        for step in self.steps.iter().filter(|s| s.phase == phase) {
            let code = (step.resolved)(ctx);
            if code != 0 {
                let err = SageError::ModuleInvocationFailure {
                    module: format!("{}", step.module_id),
                    function: step.function_name.clone(),
                    code,
                };
                tracing::warn!(error = %err, "module step returned a non-zero code");
                if self.fail_fast {
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
