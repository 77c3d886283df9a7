//! The closed error-kind set for the engine (spec.md §7).
//!
//! `SageError` is the unified error type returned by every public entry
//! point in `sage-core`, `sage-primitives`, `sage-storage` and `sage-engine`.
//! Variants carry the diagnostic context spec.md §7 requires: forest id,
//! snapshot, FOF root, galaxy index where applicable.

use thiserror::Error;

use crate::ids::{ForestId, GalaxyIndex, HaloIndex, ModuleId, Snapshot};

/// Result alias used throughout the workspace.
pub type SageResult<T> = std::result::Result<T, SageError>;

/// The closed set of error kinds from spec.md §7.
#[derive(Debug, Error)]
pub enum SageError {
    /// Out of memory; fatal for the current forest.
    #[error("allocation failure in forest {forest}: {context}")]
    AllocationFailure { forest: ForestId, context: String },

    /// A cycle was detected in the progenitor/descendant links; fatal for the forest.
    #[error("cycle detected in forest {forest} at halo {halo}")]
    TreeCycle { forest: ForestId, halo: HaloIndex },

    /// Structurally invalid tree input; fatal for the forest.
    #[error("tree corruption in forest {forest}: {reason}")]
    TreeCorruption { forest: ForestId, reason: String },

    /// I1–I3 violated during FOF assembly; fatal for the forest.
    #[error("assembly failure in forest {forest} at snapshot {snapshot}, fof root {fof_root}: {reason}")]
    AssemblyFailure {
        forest: ForestId,
        snapshot: Snapshot,
        fof_root: HaloIndex,
        reason: String,
    },

    /// I4/I5 violated after a sub-step. Fatal by default; configurable to
    /// "clamp and warn" via `InvariantPolicy`.
    #[error(
        "invariant violated in forest {forest} at snapshot {snapshot}, galaxy {galaxy}: {reason}"
    )]
    InvariantViolation {
        forest: ForestId,
        snapshot: Snapshot,
        galaxy: GalaxyIndex,
        reason: String,
    },

    /// The merger queue overflowed; fatal for the current FOF.
    #[error("merger queue overflow in forest {forest} at fof root {fof_root}, capacity {capacity}")]
    QueueFull {
        forest: ForestId,
        fof_root: HaloIndex,
        capacity: usize,
    },

    /// A (module, function) pair was not found. Fatal at startup.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A named function on a registered module was not found. Fatal at startup.
    #[error("function not found: {module}::{function}")]
    ModuleFunctionNotFound { module: String, function: String },

    /// `initialize` called twice on the same module without an intervening cleanup.
    #[error("module {0:?} already initialized")]
    AlreadyInitialized(ModuleId),

    /// Module discovery was enabled but no manifests were found. Fatal at startup.
    #[error("module discovery enabled but no manifests were found")]
    NoModulesDiscovered,

    /// Registering a property under a name already used with a different kind/arity.
    #[error("property {name:?} re-registered with conflicting kind/arity")]
    PropertyConflict { name: String },

    /// A property accessor indexed outside its declared arity.
    #[error("property {name:?} index {index} out of range (arity {arity})")]
    PropertyIndexOutOfRange {
        name: String,
        index: usize,
        arity: usize,
    },

    /// A module callback returned a non-zero code. Never fatal by itself; the
    /// core logs it and, outside fail-fast configuration, continues.
    #[error("module invocation failed in {module}::{function}: code {code}")]
    ModuleInvocationFailure {
        module: String,
        function: String,
        code: i32,
    },

    /// Parameter file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wraps a tree-reader / writer collaborator error (spec.md §6); the core
    /// only needs these to propagate, not to interpret.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SageError {
    /// Errors that abort the current forest but let the run continue with the next one.
    ///
    /// `QueueFull` is deliberately excluded: spec.md §7 scopes it to "fatal
    /// for the current FOF", not the whole forest — the Forest Driver
    /// catches it per FOF-root and moves on to the next one, same as an
    /// untolerated `ModuleInvocationFailure` (see `is_fatal_for_fof`).
    pub fn is_fatal_for_forest(&self) -> bool {
        matches!(
            self,
            SageError::AllocationFailure { .. }
                | SageError::TreeCycle { .. }
                | SageError::TreeCorruption { .. }
                | SageError::AssemblyFailure { .. }
                | SageError::InvariantViolation { .. }
        )
    }

    /// Errors that abort only the FOF group currently being assembled or
    /// evolved; the Forest Driver discards that FOF's buffer and continues
    /// with the next FOF root at the same snapshot (spec.md §4.8 "aborts the
    /// FOF's further phases … and moves to the next FOF").
    pub fn is_fatal_for_fof(&self) -> bool {
        !self.is_fatal_for_forest() && !self.is_startup_fatal()
    }

    /// Configuration/module errors that should abort the whole run at startup.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            SageError::ModuleNotFound(_)
                | SageError::ModuleFunctionNotFound { .. }
                | SageError::AlreadyInitialized(_)
                | SageError::NoModulesDiscovered
                | SageError::PropertyConflict { .. }
                | SageError::PropertyIndexOutOfRange { .. }
        )
    }

    /// Module invocation errors are logged and the core decides whether to continue.
    pub fn is_module_invocation_error(&self) -> bool {
        matches!(self, SageError::ModuleInvocationFailure { .. })
    }
}
