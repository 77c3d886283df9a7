//! The FOF Assembler (spec.md §4.7): builds the transient per-FOF galaxy
//! buffer at snapshot N from the galaxies that existed at snapshot N-1,
//! assigns types, and spawns orphans.

use std::collections::HashMap;

use sage_core::types::{Galaxy, GalaxyType, Halo};
use sage_core::{GalaxyIndex, GalaxyNr, HaloIndex, SageResult, Snapshot};
use sage_primitives::PropertyTable;
use sage_storage::GalaxyContainer;

/// Diagnostics accumulated while assembling one forest (SPEC_FULL.md
/// "RunSummary" supplement plus spec.md §4.10's "orphans created").
#[derive(Debug, Default, Clone, Copy)]
pub struct AssemblyDiagnostics {
    pub orphans_created: u64,
    pub orphans_rescued: u64,
    /// Counter for spec.md §4.7's acknowledged-lossy complete-FOF-disruption
    /// edge case: incremented whenever a previous-snapshot galaxy is never
    /// claimed by any FOF group at the current snapshot.
    pub complete_fof_disruption_losses: u64,
}

/// The elected central plus the assembled transient buffer for one FOF group.
pub struct AssemblyResult {
    pub buffer: GalaxyContainer,
    pub central_index: GalaxyIndex,
}

/// Builds transient FOF buffers (spec.md §4.7).
pub struct FofAssembler {
    steps: usize,
}

impl FofAssembler {
    pub fn new(steps: usize) -> Self {
        FofAssembler { steps }
    }

    /// Returns the halo indices of the direct progenitors of `h`, in the
    /// order given by the `first_progenitor`/`next_progenitor` chain.
    fn progenitors_of(halos: &[Halo], h: HaloIndex) -> Vec<HaloIndex> {
        let mut result = Vec::new();
        let mut cursor = halos[h.0 as usize].first_progenitor;
        while let Some(p) = cursor {
            result.push(p);
            cursor = halos[p.0 as usize].next_progenitor;
        }
        result
    }

    /// Halo indices making up the FOF group rooted at `root`, via `next_in_fof`.
    fn fof_members(halos: &[Halo], root: HaloIndex) -> Vec<HaloIndex> {
        let mut result = Vec::new();
        let mut cursor = Some(root);
        while let Some(idx) = cursor {
            result.push(idx);
            cursor = halos[idx.0 as usize].next_in_fof;
        }
        result
    }

    /// Assembles the transient FOF buffer at `fof_root`, snapshot `snapshot`.
    ///
    /// `galaxies_by_halo` maps a previous-snapshot `HaloIndex` to the
    /// indices (into `previous`) of galaxies currently hosted there; built
    /// once per snapshot by the Forest Driver and shared across every FOF
    /// group dispatched at that snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        halos: &[Halo],
        fof_root: HaloIndex,
        snapshot: Snapshot,
        previous: &GalaxyContainer,
        galaxies_by_halo: &HashMap<HaloIndex, Vec<GalaxyIndex>>,
        previous_processed: &mut [bool],
        properties: &PropertyTable,
        next_galaxy_nr: &mut u64,
        diagnostics: &mut AssemblyDiagnostics,
    ) -> SageResult<AssemblyResult> {
        let mut buffer = GalaxyContainer::new();

        for &h in &Self::fof_members(halos, fof_root) {
            self.assemble_one_halo(
                halos,
                h,
                fof_root,
                previous,
                galaxies_by_halo,
                previous_processed,
                properties,
                next_galaxy_nr,
                &mut buffer,
                diagnostics,
            )?;
        }

        // Orphan rescue (spec.md §4.7 step 4): previous-snapshot galaxies
        // whose own halo vanished but whose FOF-central's halo descended
        // into this FOF group.
        self.rescue_orphans(
            halos,
            fof_root,
            previous,
            previous_processed,
            properties,
            &mut buffer,
            diagnostics,
        )?;

        let central_index = self.elect_central(halos, fof_root, &mut buffer, properties, next_galaxy_nr, snapshot)?;

        for i in 0..buffer.count() {
            if let Some(galaxy) = buffer.get_mut(GalaxyIndex(i as u32)) {
                galaxy.fof_central = central_index;
            }
        }

        Ok(AssemblyResult { buffer, central_index })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_one_halo(
        &self,
        halos: &[Halo],
        h: HaloIndex,
        fof_root: HaloIndex,
        previous: &GalaxyContainer,
        galaxies_by_halo: &HashMap<HaloIndex, Vec<GalaxyIndex>>,
        previous_processed: &mut [bool],
        properties: &PropertyTable,
        next_galaxy_nr: &mut u64,
        buffer: &mut GalaxyContainer,
        diagnostics: &mut AssemblyDiagnostics,
    ) -> SageResult<()> {
        let progenitors = Self::progenitors_of(halos, h);

        if progenitors.is_empty() {
            if h == fof_root {
                let galaxy_nr = GalaxyNr(*next_galaxy_nr);
                *next_galaxy_nr += 1;
                let mut primordial = Galaxy::primordial(galaxy_nr, &halos[h.0 as usize], h, snapshot_of(halos, h), self.steps);
                properties.allocate(&mut primordial)?;
                buffer.append(&primordial, properties);
            }
            return Ok(());
        }

        // First-occupied progenitor: largest particle count among those
        // hosting at least one galaxy, ties broken by lowest halo index.
        let main_branch = progenitors
            .iter()
            .copied()
            .filter(|p| galaxies_by_halo.get(p).map(|v| !v.is_empty()).unwrap_or(false))
            .max_by(|a, b| {
                let len_a = halos[a.0 as usize].len;
                let len_b = halos[b.0 as usize].len;
                len_a.cmp(&len_b).then(b.0.cmp(&a.0))
            });

        for &p in &progenitors {
            let Some(galaxy_indices) = galaxies_by_halo.get(&p) else { continue };
            for &g_idx in galaxy_indices {
                if previous_processed[g_idx.0 as usize] {
                    continue;
                }
                let Some(src) = previous.get(g_idx) else { continue };
                let mut copied = src.inherit(h);
                if Some(p) == main_branch {
                    if matches!(src.galaxy_type, GalaxyType::Central) {
                        let halo = &halos[h.0 as usize];
                        copied.pos = halo.pos;
                        copied.vel = halo.vel;
                        copied.mvir = halo.mvir;
                        copied.rvir = halo.rvir;
                        copied.vvir = halo.vvir;
                        copied.vmax = halo.vmax;
                    }
                    // else: main-branch non-central galaxies keep their
                    // geometry, only adopt `h` as current halo (already
                    // done by `inherit`).
                } else {
                    copied.galaxy_type = GalaxyType::Orphan;
                    copied.merged = true;
                    copied.mvir = 0.0;
                    diagnostics.orphans_created += 1;
                }
                let _ = properties.copy(&mut copied, src);
                buffer.append(&copied, properties);
                previous_processed[g_idx.0 as usize] = true;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn rescue_orphans(
        &self,
        halos: &[Halo],
        fof_root: HaloIndex,
        previous: &GalaxyContainer,
        previous_processed: &mut [bool],
        properties: &PropertyTable,
        buffer: &mut GalaxyContainer,
        diagnostics: &mut AssemblyDiagnostics,
    ) -> SageResult<()> {
        for (idx, galaxy) in previous.raw_data().iter().enumerate() {
            if previous_processed[idx] {
                continue;
            }
            let host_halo = &halos[galaxy.current_halo.0 as usize];
            if host_halo.descendant.is_some() {
                continue; // host halo survives; this galaxy is handled elsewhere
            }
            let Some(central) = previous.get(galaxy.fof_central) else { continue };
            let central_host = &halos[central.current_halo.0 as usize];
            let Some(central_descendant) = central_host.descendant else { continue };
            if halos[central_descendant.0 as usize].fof_root != fof_root {
                continue;
            }
            let mut rescued = galaxy.inherit(fof_root);
            rescued.galaxy_type = GalaxyType::Orphan;
            rescued.merged = true;
            rescued.mvir = 0.0;
            let _ = properties.copy(&mut rescued, galaxy);
            buffer.append(&rescued, properties);
            previous_processed[idx] = true;
            diagnostics.orphans_rescued += 1;
        }
        Ok(())
    }

    fn elect_central(
        &self,
        halos: &[Halo],
        fof_root: HaloIndex,
        buffer: &mut GalaxyContainer,
        properties: &PropertyTable,
        next_galaxy_nr: &mut u64,
        snapshot: Snapshot,
    ) -> SageResult<GalaxyIndex> {
        let count = buffer.count();
        let existing_central = (0..count)
            .map(|i| GalaxyIndex(i as u32))
            .find(|&idx| buffer.get(idx).map(|g| matches!(g.galaxy_type, GalaxyType::Central)).unwrap_or(false));

        let central_index = match existing_central {
            Some(idx) => idx,
            None if count > 0 => {
                let best = (0..count)
                    .map(|i| GalaxyIndex(i as u32))
                    .max_by(|a, b| {
                        let ma = buffer.get(*a).unwrap().mvir;
                        let mb = buffer.get(*b).unwrap().mvir;
                        ma.partial_cmp(&mb).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .expect("count > 0");
                buffer.get_mut(best).unwrap().galaxy_type = GalaxyType::Central;
                best
            }
            None => {
                // Empty FOF group with no assembled candidate at all: create
                // one primordial central (spec.md §4.7 "Empty FOF group").
                let galaxy_nr = GalaxyNr(*next_galaxy_nr);
                *next_galaxy_nr += 1;
                let mut primordial = Galaxy::primordial(galaxy_nr, &halos[fof_root.0 as usize], fof_root, snapshot, self.steps);
                properties.allocate(&mut primordial)?;
                buffer.append(&primordial, properties)
            }
        };

        for idx in (0..buffer.count()).map(|i| GalaxyIndex(i as u32)) {
            if idx == central_index {
                continue;
            }
            let galaxy = buffer.get_mut(idx).expect("index within buffer bounds");
            let current_halo = galaxy.current_halo;
            let host = &halos[current_halo.0 as usize];
            let is_subhalo_of_root = host.fof_root == fof_root && current_halo != fof_root;
            if is_subhalo_of_root {
                galaxy.galaxy_type = GalaxyType::Satellite;
            } else if !matches!(galaxy.galaxy_type, GalaxyType::Orphan) {
                galaxy.galaxy_type = GalaxyType::Orphan;
                galaxy.merged = true;
                galaxy.mvir = 0.0;
            }
        }

        Ok(central_index)
    }
}

fn snapshot_of(halos: &[Halo], h: HaloIndex) -> Snapshot {
    halos[h.0 as usize].snapshot
}
