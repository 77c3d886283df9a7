//! External-collaborator interfaces (spec.md §6).
//!
//! The tree-file readers, galaxy-record writers, and the concrete parameter
//! file parser/CLI are explicitly out of scope (spec.md §1). What the core
//! does own is the *shape* of the boundary it talks to them through.

use crate::error::SageResult;
use crate::ids::ForestId;
use crate::types::{Galaxy, Halo};

/// One forest's worth of input, as handed over by the tree reader.
#[derive(Debug, Clone)]
pub struct ForestDescriptor {
    pub forest_id: ForestId,
    pub halo_count: u32,
}

/// Boundary with the tree reader (spec.md §6): a fully-materialised, dense
/// halo array per forest. No I/O happens inside the core; this trait is
/// implemented by an external collaborator and handed to the Forest Driver.
pub trait TreeReader {
    /// All forests available from this reader, in the order they should be processed.
    fn forests(&self) -> SageResult<Vec<ForestDescriptor>>;

    /// The dense, 0-indexed halo array for one forest. Stable for the
    /// lifetime of that forest's processing.
    fn load_halos(&self, forest: &ForestDescriptor) -> SageResult<Vec<Halo>>;
}

/// A fully-staged galaxy record, ready for the writer (spec.md §4.9, §6).
/// Carries the core fields plus globally-unique indices; property fields
/// declared for output are attached by the caller via `extra_properties`
/// (serialized opaquely — the writer's record format is out of scope here).
#[derive(Debug, Clone)]
pub struct GalaxyRecord {
    pub galaxy: Galaxy,
    pub galaxy_index: u64,
    pub central_galaxy_index: u64,
    pub extra_properties: Vec<u8>,
}

/// Boundary with the galaxy-record writer (spec.md §6): accepts
/// fully-materialised, already-filtered records in staging order. No I/O
/// happens inside the core.
pub trait GalaxyWriter {
    fn write(&mut self, record: GalaxyRecord) -> SageResult<()>;
}
