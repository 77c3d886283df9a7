//! A minimal dense binary merger-tree reader.
//!
//! Mirrors the shape of the classic L-Halo Tree binary format this engine's
//! `IoParams::tree_type = "lhalo_binary"` default names, trimmed to exactly
//! the fields `sage_core::types::Halo` carries. Real tree files in the wild
//! use a denser, version-specific layout; this reader is the reference
//! implementation the CLI ships so the crate is runnable end to end.
//!
//! Layout (little-endian):
//! ```text
//! u32                     forest_count
//! forest_count * {
//!     u32                 file_nr
//!     u32                 forest_nr
//!     u32                 halo_count
//!     halo_count * Halo record (see `read_halo`)
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use sage_core::types::{Halo, Vec3};
use sage_core::{ForestDescriptor, ForestId, HaloIndex, SageError, SageResult, Snapshot, TreeReader};

/// One forest's dense halo array plus its descriptor, read eagerly.
struct LoadedForest {
    descriptor: ForestDescriptor,
    halos: Vec<Halo>,
}

/// Reads every forest from a tree file into memory up front. Fine for the
/// forest sizes this engine targets (spec.md §5 "bounded per-forest
/// working set"); a production reader would stream per forest instead.
pub struct BinaryTreeReader {
    forests: Vec<LoadedForest>,
}

impl BinaryTreeReader {
    pub fn open(path: &Path) -> SageResult<Self> {
        let file = File::open(path).map_err(|e| SageError::Io(format!("{}: {e}", path.display())))?;
        let mut reader = BufReader::new(file);

        let forest_count = read_u32(&mut reader)?;
        let mut forests = Vec::with_capacity(forest_count as usize);
        for _ in 0..forest_count {
            let file_nr = read_u32(&mut reader)?;
            let forest_nr = read_u32(&mut reader)?;
            let halo_count = read_u32(&mut reader)?;
            let forest_id = ForestId { file_nr, forest_nr };

            let mut halos = Vec::with_capacity(halo_count as usize);
            for _ in 0..halo_count {
                halos.push(read_halo(&mut reader)?);
            }

            forests.push(LoadedForest {
                descriptor: ForestDescriptor { forest_id, halo_count },
                halos,
            });
        }

        Ok(BinaryTreeReader { forests })
    }
}

impl TreeReader for BinaryTreeReader {
    fn forests(&self) -> SageResult<Vec<ForestDescriptor>> {
        Ok(self.forests.iter().map(|f| f.descriptor.clone()).collect())
    }

    fn load_halos(&self, forest: &ForestDescriptor) -> SageResult<Vec<Halo>> {
        self.forests
            .iter()
            .find(|f| f.descriptor.forest_id == forest.forest_id)
            .map(|f| f.halos.clone())
            .ok_or_else(|| SageError::Io(format!("unknown forest {}", forest.forest_id)))
    }
}

fn read_u32<R: Read>(r: &mut R) -> SageResult<u32> {
    r.read_u32::<LittleEndian>().map_err(|e| SageError::Io(e.to_string()))
}

fn read_i32<R: Read>(r: &mut R) -> SageResult<i32> {
    r.read_i32::<LittleEndian>().map_err(|e| SageError::Io(e.to_string()))
}

fn read_i64<R: Read>(r: &mut R) -> SageResult<i64> {
    r.read_i64::<LittleEndian>().map_err(|e| SageError::Io(e.to_string()))
}

fn read_f64<R: Read>(r: &mut R) -> SageResult<f64> {
    r.read_f64::<LittleEndian>().map_err(|e| SageError::Io(e.to_string()))
}

fn read_link<R: Read>(r: &mut R) -> SageResult<Option<HaloIndex>> {
    let raw = read_i32(r)?;
    Ok(if raw < 0 { None } else { Some(HaloIndex(raw as u32)) })
}

fn read_vec3<R: Read>(r: &mut R) -> SageResult<Vec3> {
    Ok(Vec3 { x: read_f64(r)?, y: read_f64(r)?, z: read_f64(r)? })
}

fn read_halo<R: Read>(r: &mut R) -> SageResult<Halo> {
    let snapshot = Snapshot(read_u32(r)?);
    let mvir = read_f64(r)?;
    let vvir = read_f64(r)?;
    let rvir = read_f64(r)?;
    let vmax = read_f64(r)?;
    let pos = read_vec3(r)?;
    let vel = read_vec3(r)?;
    let spin = read_vec3(r)?;
    let len = read_u32(r)?;
    let most_bound_particle_id = read_i64(r)?;
    let fof_root = HaloIndex(read_u32(r)?);
    let next_in_fof = read_link(r)?;
    let first_progenitor = read_link(r)?;
    let next_progenitor = read_link(r)?;
    let descendant = read_link(r)?;

    Ok(Halo {
        snapshot,
        mvir,
        vvir,
        rvir,
        vmax,
        pos,
        vel,
        spin,
        len,
        most_bound_particle_id,
        fof_root,
        next_in_fof,
        first_progenitor,
        next_progenitor,
        descendant,
    })
}
