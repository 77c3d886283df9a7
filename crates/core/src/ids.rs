//! Dense identifiers used across the engine.
//!
//! All of these are plain index types into flat, forest-local arrays —
//! never pointers, never cross-forest. See DESIGN.md for the
//! arena-plus-stable-index discipline this enforces.

use std::fmt;

/// Index of a halo within a forest's halo array. Dense, starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HaloIndex(pub u32);

impl fmt::Display for HaloIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "halo#{}", self.0)
    }
}

/// A galaxy's position within a transient FOF buffer or a Galaxy Container.
/// Stable for the lifetime of the container that issued it; never an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GalaxyIndex(pub u32);

impl fmt::Display for GalaxyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "galaxy_idx#{}", self.0)
    }
}

/// Monotonic, forest-local galaxy identity (`galaxy_nr` in spec.md §3, invariant I7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GalaxyNr(pub u64);

impl fmt::Display for GalaxyNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "galaxy_nr#{}", self.0)
    }
}

/// Dense id assigned to a registered physics module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Dense id assigned to a registered property (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(pub u32);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property#{}", self.0)
    }
}

/// Index of a snapshot in ascending cosmic-time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snapshot(pub u32);

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snap#{}", self.0)
    }
}

/// Identity of a forest within a tree file (spec.md §6 forest descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForestId {
    /// Index of the tree file this forest was read from.
    pub file_nr: u32,
    /// Index of the forest within that file.
    pub forest_nr: u32,
}

impl fmt::Display for ForestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forest(file={}, idx={})", self.file_nr, self.forest_nr)
    }
}
