//! # sage
//!
//! A semi-analytic galaxy formation engine: walks merger-tree forests and
//! evolves a galaxy population over cosmological snapshots.
//!
//! sage takes a dense, per-forest halo array (from an external tree reader)
//! and, for every snapshot in ascending order, assembles each friends-of-
//! friends group's transient galaxy buffer, runs it through a configurable
//! pipeline of physics modules across a fixed number of sub-steps, and
//! stages the surviving galaxies for an external writer. Physics itself —
//! cooling, star formation, feedback — lives outside this crate, as named
//! functions registered against the Module Registry; sage owns the
//! orchestration those modules run inside of, not the astrophysics.
//!
//! # Quick Start
//!
//! ```no_run
//! use sage_core::SageConfig;
//! use sage_engine::{ForestDriver, MergerHandlers, ModuleRegistry, Pipeline};
//! use sage_primitives::PropertyTable;
//!
//! fn main() -> sage_core::SageResult<()> {
//!     let config = SageConfig::from_file(std::path::Path::new("sage.toml"))?;
//!     let registry = ModuleRegistry::new();
//!     let pipeline = Pipeline::create("default", config.runtime.fail_fast);
//!     let properties = PropertyTable::with_standard_properties(config.simulation.steps)?;
//!     let driver = ForestDriver::new(&config);
//!     let _ = (registry, pipeline, properties, driver);
//!     Ok(())
//! }
//! ```
//!
//! # Components
//!
//! | Component | Purpose | Crate |
//! |-----------|---------|-------|
//! | **Property System** | Typed, named per-galaxy fields beyond the core struct | [`sage_primitives`] |
//! | **Galaxy Container** | Index-stable per-snapshot working set | [`sage_storage`] |
//! | **Module Registry** | Lifecycle and named callbacks for physics modules | [`sage_engine::module`] |
//! | **Pipeline** | Ordered steps bound to HALO/GALAXY/POST/FINAL phases | [`sage_engine::pipeline`] |
//! | **Merger Queue** | Fixed-capacity FIFO of deferred merger/disruption events | [`sage_engine::merger_queue`] |
//! | **Tree Walker** | Ascending-snapshot FOF dispatch order for one forest | [`sage_engine::tree_walker`] |
//! | **FOF Assembler** | Builds a FOF group's transient buffer from the prior snapshot | [`sage_engine::fof_assembler`] |
//! | **Evolution Loop** | Sub-steps one FOF buffer through the pipeline | [`sage_engine::evolution`] |
//! | **Output Staging** | Filters and globally indexes galaxies for the writer | [`sage_engine::output`] |
//! | **Forest Driver** | Orchestrates the above across a forest's full snapshot sequence | [`sage_engine::forest_driver`] |
//!
//! # Architecture
//!
//! `sage-core` fixes the vocabulary (`Halo`, `Galaxy`, the id newtypes,
//! `SageError`, `SageConfig`) with no notion of modules or pipelines.
//! `sage-primitives` and `sage-storage` build the per-galaxy property and
//! container machinery on top of it. `sage-engine` is the orchestration
//! layer; `sage-cli` is a thin, parameter-file-driven binary over it. Only
//! the re-exports below are the stable public surface of this crate.

pub use sage_core::{
    config, error, ids, scaling, traits, types, CosmologyParams, ForestDescriptor, ForestId,
    GalaxyIndex, GalaxyNr, GalaxyRecord, GalaxyWriter, HaloIndex, InvariantPolicy, IoParams,
    ModuleId, PropertyId, RuntimeParams, SageConfig, SageError, SageResult, SimulationParams,
    Snapshot, TreeReader, UnitsParams,
};
pub use sage_engine::{
    evolution, fof_assembler, forest_driver, merger_queue, module, output, pipeline, tree_walker,
    AssemblyDiagnostics, AssemblyResult, CleanupFn, EvolutionDiagnostics, EvolutionLoop,
    FofAssembler, ForestDriver, ForestSummary, InitFn, MergerEvent, MergerHandlers, MergerQueue,
    ModuleFn, ModuleRegistry, ModuleState, ModuleTypeTag, OutputStager, Phase, Pipeline,
    PipelineContext, RunSummary, TreeWalker,
};
pub use sage_primitives::{Arity, PropertyDescriptor, PropertyKind, PropertyTable, PropertyValue};
pub use sage_storage::GalaxyContainer;
