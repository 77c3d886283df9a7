//! The Module Registry (spec.md §4.3): the set of physics modules, their
//! lifecycle state, and a callback table of named functions.
//!
//! Grounded on the teacher's `PrimitiveRegistry` (dense id, name-keyed
//! lookup at the configuration boundary) but deliberately *not* on the
//! teacher's `OPEN_DATABASES` global-mutable singleton pattern: per
//! spec.md §9, module state is owned by an engine-constructed context,
//! never a process-wide static.
//!
//! Per spec.md §9, string lookup by (module name, function name) happens
//! only once, at pipeline configuration time; `PipelineStep` (see
//! `crate::pipeline`) then holds the resolved `ModuleFn` directly, so no
//! per-galaxy string hashing occurs on the hot path.

use rustc_hash::FxHashMap;

use sage_core::{ModuleId, SageError, SageResult};

use crate::pipeline::PipelineContext;

/// The physics domain a module belongs to. `UserDefined` covers anything
/// outside the five the spec names explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTypeTag {
    Cooling,
    StarFormation,
    Feedback,
    Mergers,
    Reionization,
    UserDefined(String),
}

/// Lifecycle state of a registered module (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Registered,
    Initialized,
    Cleaned,
}

/// A named callback a module exposes to the pipeline or to other modules.
/// Takes an error code out-parameter via its return value: `0` is success,
/// anything else becomes `SageError::ModuleInvocationFailure`.
pub type ModuleFn = fn(&mut PipelineContext) -> i32;

/// Optional per-module init/cleanup hooks, called by `initialize`/`cleanup`.
pub type InitFn = fn() -> SageResult<()>;
pub type CleanupFn = fn() -> SageResult<()>;

struct FunctionRecord {
    func: ModuleFn,
    #[allow(dead_code)]
    signature_doc: &'static str,
}

struct ModuleRecord {
    id: ModuleId,
    name: String,
    version: u32,
    type_tag: ModuleTypeTag,
    state: ModuleState,
    init_fn: Option<InitFn>,
    cleanup_fn: Option<CleanupFn>,
    functions: FxHashMap<String, FunctionRecord>,
}

/// The Module Registry (spec.md §4.3).
#[derive(Default)]
pub struct ModuleRegistry {
    by_identity: FxHashMap<(String, u32), ModuleId>,
    modules: Vec<ModuleRecord>,
    /// Registration order, preserved for `cleanup_all`'s reverse-order pass.
    registration_order: Vec<ModuleId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    /// Registers a module; idempotent on the (name, version) pair.
    pub fn register(
        &mut self,
        name: &str,
        version: u32,
        type_tag: ModuleTypeTag,
        init_fn: Option<InitFn>,
        cleanup_fn: Option<CleanupFn>,
    ) -> ModuleId {
        if let Some(&id) = self.by_identity.get(&(name.to_string(), version)) {
            return id;
        }
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(ModuleRecord {
            id,
            name: name.to_string(),
            version,
            type_tag,
            state: ModuleState::Registered,
            init_fn,
            cleanup_fn,
            functions: FxHashMap::default(),
        });
        self.by_identity.insert((name.to_string(), version), id);
        self.registration_order.push(id);
        id
    }

    /// `Registered -> Initialized`, or `Cleaned -> Initialized`. Rejects a
    /// double-init from `Initialized` with `AlreadyInitialized`.
    pub fn initialize(&mut self, module_id: ModuleId) -> SageResult<()> {
        let record = self.record_mut(module_id)?;
        match record.state {
            ModuleState::Initialized => return Err(SageError::AlreadyInitialized(module_id)),
            ModuleState::Registered | ModuleState::Cleaned => {}
        }
        if let Some(init) = record.init_fn {
            init()?;
        }
        record.state = ModuleState::Initialized;
        Ok(())
    }

    pub fn register_function(
        &mut self,
        module_id: ModuleId,
        function_name: &str,
        func: ModuleFn,
        signature_doc: &'static str,
    ) -> SageResult<()> {
        let record = self.record_mut(module_id)?;
        record.functions.insert(
            function_name.to_string(),
            FunctionRecord { func, signature_doc },
        );
        Ok(())
    }

    /// Looks up a module's id by name. Used once at startup to turn
    /// configured handler names into `ModuleId`s the Evolution Loop can
    /// carry without repeating the string lookup per invocation.
    pub fn module_id_by_name(&self, module_name: &str) -> SageResult<ModuleId> {
        self.modules
            .iter()
            .find(|m| m.name == module_name)
            .map(|m| m.id)
            .ok_or_else(|| SageError::ModuleNotFound(module_name.to_string()))
    }

    /// Resolves `(module_name, function_name)` once into a `ModuleFn` — the
    /// typed function pointer a `PipelineStep` holds for the lifetime of a
    /// run (spec.md §9).
    pub fn resolve(&self, module_name: &str, function_name: &str) -> SageResult<ModuleFn> {
        let record = self
            .modules
            .iter()
            .find(|m| m.name == module_name)
            .ok_or_else(|| SageError::ModuleNotFound(module_name.to_string()))?;
        record
            .functions
            .get(function_name)
            .map(|f| f.func)
            .ok_or_else(|| SageError::ModuleFunctionNotFound {
                module: module_name.to_string(),
                function: function_name.to_string(),
            })
    }

    /// Same resolution as `resolve`, addressed by id rather than name — used
    /// by `Pipeline::add_step` once the module has already been looked up.
    pub fn resolve_by_id(&self, module_id: ModuleId, function_name: &str) -> SageResult<ModuleFn> {
        let record = self.record(module_id)?;
        record
            .functions
            .get(function_name)
            .map(|f| f.func)
            .ok_or_else(|| SageError::ModuleFunctionNotFound {
                module: record.name.clone(),
                function: function_name.to_string(),
            })
    }

    /// Synchronous dispatch by id, mirroring spec.md §4.3's `invoke` contract.
    /// Invocation failures are never fatal to the caller — they come back as
    /// `Err(ModuleInvocationFailure)` for the caller to log and decide on.
    pub fn invoke(&self, module_id: ModuleId, function_name: &str, ctx: &mut PipelineContext) -> SageResult<()> {
        let record = self
            .modules
            .get(module_id.0 as usize)
            .ok_or_else(|| SageError::ModuleNotFound(format!("{module_id}")))?;
        let function = record
            .functions
            .get(function_name)
            .ok_or_else(|| SageError::ModuleFunctionNotFound {
                module: record.name.clone(),
                function: function_name.to_string(),
            })?;
        let code = (function.func)(ctx);
        if code != 0 {
            return Err(SageError::ModuleInvocationFailure {
                module: record.name.clone(),
                function: function_name.to_string(),
                code,
            });
        }
        Ok(())
    }

    pub fn state(&self, module_id: ModuleId) -> SageResult<ModuleState> {
        Ok(self.record(module_id)?.state)
    }

    pub fn type_tag(&self, module_id: ModuleId) -> SageResult<&ModuleTypeTag> {
        Ok(&self.record(module_id)?.type_tag)
    }

    pub fn cleanup(&mut self, module_id: ModuleId) -> SageResult<()> {
        let record = self.record_mut(module_id)?;
        if let Some(cleanup) = record.cleanup_fn {
            cleanup()?;
        }
        record.state = ModuleState::Cleaned;
        Ok(())
    }

    /// Runs every registered module's cleanup in reverse registration order.
    pub fn cleanup_all(&mut self) -> SageResult<()> {
        let ids: Vec<ModuleId> = self.registration_order.iter().rev().copied().collect();
        for id in ids {
            self.cleanup(id)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn record(&self, module_id: ModuleId) -> SageResult<&ModuleRecord> {
        self.modules
            .get(module_id.0 as usize)
            .ok_or_else(|| SageError::ModuleNotFound(format!("{module_id}")))
    }

    fn record_mut(&mut self, module_id: ModuleId) -> SageResult<&mut ModuleRecord> {
        self.modules
            .get_mut(module_id.0 as usize)
            .ok_or_else(|| SageError::ModuleNotFound(format!("{module_id}")))
    }
}
