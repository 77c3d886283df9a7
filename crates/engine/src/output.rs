//! Output Staging (spec.md §4.9): turns one snapshot's this-snapshot
//! container into the filtered, globally-indexed records the external
//! `GalaxyWriter` collaborator receives.

use sage_core::{ForestId, GalaxyRecord, GalaxyWriter, SageError, SageResult};
use sage_storage::GalaxyContainer;

/// Computes the two global output indices and hands eligible records to a
/// `GalaxyWriter` (spec.md §4.9).
///
/// `file_nr_mulfac`/`forest_nr_mulfac` come from `IoParams`; the formula is
/// `file_nr * file_nr_mulfac + forest_nr * forest_nr_mulfac + galaxy_nr`,
/// applied identically to a galaxy's own index and to its central's.
pub struct OutputStager {
    file_nr_mulfac: u64,
    forest_nr_mulfac: u64,
}

impl OutputStager {
    pub fn new(file_nr_mulfac: u64, forest_nr_mulfac: u64) -> Self {
        OutputStager { file_nr_mulfac, forest_nr_mulfac }
    }

    fn global_index(&self, forest: ForestId, galaxy_nr: u64) -> u64 {
        forest.file_nr as u64 * self.file_nr_mulfac + forest.forest_nr as u64 * self.forest_nr_mulfac + galaxy_nr
    }

    /// Filters out merged/tombstoned galaxies (spec.md §4.9 "skip
    /// `merged==true` or `type==Merged`"), computes both global indices, and
    /// writes every surviving record in container order.
    pub fn stage(
        &self,
        container: &GalaxyContainer,
        forest: ForestId,
        writer: &mut dyn GalaxyWriter,
    ) -> SageResult<u64> {
        let mut written = 0u64;
        for galaxy in container.iter() {
            if !galaxy.is_output_eligible() {
                continue;
            }
            let central = container
                .get(galaxy.fof_central)
                .ok_or_else(|| SageError::TreeCorruption {
                    forest,
                    reason: format!("fof_central {} has no record in this-snapshot container", galaxy.fof_central),
                })?;

            let galaxy_index = self.global_index(forest, galaxy.galaxy_nr.0);
            let central_galaxy_index = self.global_index(forest, central.galaxy_nr.0);

            writer.write(GalaxyRecord {
                galaxy: galaxy.clone(),
                galaxy_index,
                central_galaxy_index,
                extra_properties: Vec::new(),
            })?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::types::{Galaxy, GalaxyType, Halo, Vec3};
    use sage_core::{GalaxyIndex, GalaxyNr, HaloIndex, Snapshot};
    use sage_primitives::PropertyTable;

    fn halo() -> Halo {
        Halo {
            snapshot: Snapshot(1),
            mvir: 1e12,
            vvir: 100.0,
            rvir: 100.0,
            vmax: 150.0,
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            spin: Vec3::ZERO,
            len: 100,
            most_bound_particle_id: 0,
            fof_root: HaloIndex(0),
            next_in_fof: None,
            first_progenitor: None,
            next_progenitor: None,
            descendant: None,
        }
    }

    struct CollectingWriter {
        records: Vec<GalaxyRecord>,
    }

    impl GalaxyWriter for CollectingWriter {
        fn write(&mut self, record: GalaxyRecord) -> SageResult<()> {
            self.records.push(record);
            Ok(())
        }
    }

    #[test]
    fn merged_galaxies_are_filtered_out() {
        let h = halo();
        let properties = PropertyTable::new(1);
        let mut container = GalaxyContainer::new();

        let central = Galaxy::primordial(GalaxyNr(0), &h, HaloIndex(0), Snapshot(1), 1);
        let central_idx = container.append(&central, &properties);
        container.get_mut(central_idx).unwrap().fof_central = central_idx;

        let mut merged = Galaxy::primordial(GalaxyNr(1), &h, HaloIndex(0), Snapshot(1), 1);
        merged.galaxy_type = GalaxyType::Merged;
        merged.merged = true;
        merged.fof_central = central_idx;
        container.append(&merged, &properties);

        let forest = ForestId { file_nr: 0, forest_nr: 0 };
        let stager = OutputStager::new(1_000_000, 1_000);
        let mut writer = CollectingWriter { records: Vec::new() };
        let written = stager.stage(&container, forest, &mut writer).unwrap();

        assert_eq!(written, 1);
        assert_eq!(writer.records.len(), 1);
        assert_eq!(writer.records[0].galaxy.galaxy_nr, GalaxyNr(0));
    }

    #[test]
    fn indices_follow_file_forest_galaxy_nr_formula() {
        let h = halo();
        let properties = PropertyTable::new(1);
        let mut container = GalaxyContainer::new();
        let g = Galaxy::primordial(GalaxyNr(7), &h, HaloIndex(0), Snapshot(1), 1);
        let idx = container.append(&g, &properties);
        container.get_mut(idx).unwrap().fof_central = idx;

        let forest = ForestId { file_nr: 2, forest_nr: 3 };
        let stager = OutputStager::new(1_000_000, 1_000);
        let mut writer = CollectingWriter { records: Vec::new() };
        stager.stage(&container, forest, &mut writer).unwrap();

        let expected = 2 * 1_000_000 + 3 * 1_000 + 7;
        assert_eq!(writer.records[0].galaxy_index, expected);
        assert_eq!(writer.records[0].central_galaxy_index, expected);
    }
}
