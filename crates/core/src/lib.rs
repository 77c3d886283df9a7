//! Shared types, ids, errors, configuration and external-collaborator
//! traits for the sage galaxy formation engine.
//!
//! This crate has no notion of modules, pipelines, or forests — it only
//! fixes the vocabulary (`Halo`, `Galaxy`, the id newtypes), the error
//! surface, and the parameter schema that every other crate in the
//! workspace builds on.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod ids;
pub mod scaling;
pub mod traits;
pub mod types;

pub use config::{
    CosmologyParams, InvariantPolicy, IoParams, RuntimeParams, SageConfig, SimulationParams,
    UnitsParams,
};
pub use error::{SageError, SageResult};
pub use ids::{ForestId, GalaxyIndex, GalaxyNr, HaloIndex, ModuleId, PropertyId, Snapshot};
pub use traits::{ForestDescriptor, GalaxyRecord, GalaxyWriter, TreeReader};
pub use types::{
    Galaxy, GalaxyType, Halo, MergerBookkeeping, MergerType, PropertyBag, PropertySlot,
    Reservoir, Reservoirs, Vec3,
};
