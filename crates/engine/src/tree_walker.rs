//! The Tree Walker (spec.md §4.6): produces, for each forest, the sequence
//! of (snapshot, FOF-root) pairs in a valid processing order.

use std::collections::BTreeMap;

use sage_core::types::Halo;
use sage_core::{ForestId, HaloIndex, SageError, SageResult, Snapshot};

/// Bound on progenitor/descendant chain length before a cycle is assumed.
/// Any acyclic forest has chains no longer than its halo count.
fn cycle_bound(halo_count: usize) -> usize {
    halo_count + 1
}

/// Walks one forest's halo array in ascending-snapshot, FOF-dispatch order
/// (spec.md §4.6).
pub struct TreeWalker<'a> {
    halos: &'a [Halo],
    processed: Vec<bool>,
    /// Gap length (in snapshots) -> count of progenitor links spanning it
    /// (SPEC_FULL.md supplemented diagnostic; spec.md §4.6 "gap handling").
    gap_histogram: BTreeMap<u32, u32>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(halos: &'a [Halo]) -> Self {
        TreeWalker {
            halos,
            processed: vec![false; halos.len()],
            gap_histogram: BTreeMap::new(),
        }
    }

    pub fn gap_histogram(&self) -> &BTreeMap<u32, u32> {
        &self.gap_histogram
    }

    /// Produces the (snapshot, FOF-root) dispatch sequence for this forest.
    /// Detects progenitor/descendant cycles via bounded traversal depth.
    pub fn walk(&mut self, forest: ForestId) -> SageResult<Vec<(Snapshot, HaloIndex)>> {
        self.validate_acyclic(forest)?;

        let mut by_snapshot: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, halo) in self.halos.iter().enumerate() {
            by_snapshot.entry(halo.snapshot.0).or_default().push(idx);
        }

        let mut dispatch = Vec::new();
        for (snapshot, indices) in by_snapshot {
            for idx in indices {
                if self.processed[idx] {
                    continue;
                }
                let root = self.halos[idx].fof_root;
                self.record_progenitor_gaps(idx);
                self.mark_fof_processed(root);
                dispatch.push((Snapshot(snapshot), root));
            }
        }
        Ok(dispatch)
    }

    /// Marks every halo in the FOF group rooted at `root` as processed, by
    /// following the `next_in_fof` chain.
    fn mark_fof_processed(&mut self, root: HaloIndex) {
        let mut cursor = Some(root);
        let mut steps = 0;
        while let Some(idx) = cursor {
            self.processed[idx.0 as usize] = true;
            cursor = self.halos[idx.0 as usize].next_in_fof;
            steps += 1;
            if steps > cycle_bound(self.halos.len()) {
                break; // already validated acyclic; defensive stop only
            }
        }
    }

    /// Records the gap between a halo and its first progenitor, if any
    /// (spec.md §4.6 "gap handling" — diagnostics only, does not affect Δt).
    fn record_progenitor_gaps(&mut self, idx: usize) {
        if let Some(prog) = self.halos[idx].first_progenitor {
            let here = self.halos[idx].snapshot.0;
            let prog_snap = self.halos[prog.0 as usize].snapshot.0;
            if here > prog_snap + 1 {
                let gap = here - prog_snap - 1;
                *self.gap_histogram.entry(gap).or_insert(0) += 1;
            }
        }
    }

    /// Bounded traversal over every halo's descendant chain; a chain longer
    /// than the halo count can only occur if it cycles back on itself.
    fn validate_acyclic(&self, forest: ForestId) -> SageResult<()> {
        for (idx, halo) in self.halos.iter().enumerate() {
            let mut cursor = halo.descendant;
            let mut steps = 0;
            while let Some(next) = cursor {
                steps += 1;
                if steps > cycle_bound(self.halos.len()) {
                    return Err(SageError::TreeCycle { forest, halo: HaloIndex(idx as u32) });
                }
                cursor = self.halos[next.0 as usize].descendant;
            }
        }
        Ok(())
    }
}
