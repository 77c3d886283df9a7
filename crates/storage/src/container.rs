//! The Galaxy Container (spec.md §4.2): a growable, index-stable sequence
//! of galaxies used as the per-snapshot working set.
//!
//! Indices are stable across appends — growth reallocates the backing
//! `Vec`, but a previously issued `GalaxyIndex` keeps pointing at the same
//! logical slot for the container's lifetime. This is the arena-plus-
//! stable-index discipline spec.md §9 calls for in place of pointer-based
//! references.

use sage_core::types::Galaxy;
use sage_core::GalaxyIndex;
use sage_primitives::PropertyTable;

/// A growable sequence of galaxies with stable indices (spec.md §4.2).
///
/// A Forest Driver owns exactly two of these: "previous snapshot" (read-only
/// during a snapshot's processing) and "this snapshot" (write target).
#[derive(Debug, Default)]
pub struct GalaxyContainer {
    galaxies: Vec<Galaxy>,
}

impl GalaxyContainer {
    pub fn new() -> Self {
        GalaxyContainer { galaxies: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GalaxyContainer { galaxies: Vec::with_capacity(capacity) }
    }

    /// Deep-copies `galaxy` (via the property table) into the next free slot
    /// and returns its stable index.
    pub fn append(&mut self, galaxy: &Galaxy, properties: &PropertyTable) -> GalaxyIndex {
        let mut stored = galaxy.clone();
        // `Galaxy::clone` already clones the property bag field-for-field;
        // routing through `properties.copy` keeps the property system as the
        // sole owner of that decision (spec.md §3 "Ownership").
        let _ = properties.copy(&mut stored, galaxy);
        let index = GalaxyIndex(self.galaxies.len() as u32);
        self.galaxies.push(stored);
        index
    }

    pub fn get(&self, index: GalaxyIndex) -> Option<&Galaxy> {
        self.galaxies.get(index.0 as usize)
    }

    pub fn get_mut(&mut self, index: GalaxyIndex) -> Option<&mut Galaxy> {
        self.galaxies.get_mut(index.0 as usize)
    }

    pub fn count(&self) -> usize {
        self.galaxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.galaxies.is_empty()
    }

    /// Bulk, read-only access to the backing storage (spec.md §4.2).
    pub fn raw_data(&self) -> &[Galaxy] {
        &self.galaxies
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Galaxy> {
        self.galaxies.iter()
    }

    /// Drops all entries but keeps the backing allocation, ready for the
    /// next snapshot's appends.
    pub fn clear(&mut self) {
        self.galaxies.clear();
    }

    /// Releases the backing allocation entirely.
    pub fn free(&mut self) {
        self.galaxies = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::{GalaxyNr, Halo, HaloIndex, Snapshot, Vec3};

    fn halo() -> Halo {
        Halo {
            snapshot: Snapshot(0),
            mvir: 1.0,
            vvir: 1.0,
            rvir: 1.0,
            vmax: 1.0,
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            spin: Vec3::ZERO,
            len: 1,
            most_bound_particle_id: 0,
            fof_root: HaloIndex(0),
            next_in_fof: None,
            first_progenitor: None,
            next_progenitor: None,
            descendant: None,
        }
    }

    #[test]
    fn append_returns_stable_growing_indices() {
        let mut container = GalaxyContainer::new();
        let props = PropertyTable::new(10);
        let g0 = Galaxy::primordial(GalaxyNr(0), &halo(), HaloIndex(0), Snapshot(0), 10);
        let g1 = Galaxy::primordial(GalaxyNr(1), &halo(), HaloIndex(0), Snapshot(0), 10);
        let i0 = container.append(&g0, &props);
        let i1 = container.append(&g1, &props);
        assert_eq!(i0, GalaxyIndex(0));
        assert_eq!(i1, GalaxyIndex(1));
        assert_eq!(container.count(), 2);
    }

    #[test]
    fn indices_remain_valid_after_growth_past_initial_capacity() {
        let mut container = GalaxyContainer::with_capacity(1);
        let props = PropertyTable::new(10);
        let mut indices = Vec::new();
        for n in 0..16u64 {
            let g = Galaxy::primordial(GalaxyNr(n), &halo(), HaloIndex(0), Snapshot(0), 10);
            indices.push(container.append(&g, &props));
        }
        for (n, idx) in indices.iter().enumerate() {
            assert_eq!(container.get(*idx).unwrap().galaxy_nr, GalaxyNr(n as u64));
        }
    }

    #[test]
    fn clear_empties_but_keeps_container_usable() {
        let mut container = GalaxyContainer::new();
        let props = PropertyTable::new(10);
        let g = Galaxy::primordial(GalaxyNr(0), &halo(), HaloIndex(0), Snapshot(0), 10);
        container.append(&g, &props);
        container.clear();
        assert_eq!(container.count(), 0);
        let idx = container.append(&g, &props);
        assert_eq!(idx, GalaxyIndex(0));
    }
}
