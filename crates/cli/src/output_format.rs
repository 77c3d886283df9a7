//! A minimal fixed-width binary galaxy-record writer.
//!
//! Mirrors the classic SAGE `model_z*` per-snapshot output files in spirit
//! (one fixed-size record per surviving galaxy) without reproducing their
//! exact historical layout. This is the reference writer the CLI ships so
//! `sage_core::traits::GalaxyWriter` has a concrete, runnable implementation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use sage_core::traits::GalaxyRecord;
use sage_core::{GalaxyWriter, SageError, SageResult};

pub struct BinaryGalaxyWriter {
    writer: BufWriter<File>,
}

impl BinaryGalaxyWriter {
    pub fn create(path: &Path) -> SageResult<Self> {
        let file = File::create(path).map_err(|e| SageError::Io(format!("{}: {e}", path.display())))?;
        Ok(BinaryGalaxyWriter { writer: BufWriter::new(file) })
    }
}

impl GalaxyWriter for BinaryGalaxyWriter {
    fn write(&mut self, record: GalaxyRecord) -> SageResult<()> {
        let g = &record.galaxy;
        let w = &mut self.writer;

        w.write_u64::<LittleEndian>(record.galaxy_index).map_err(io_err)?;
        w.write_u64::<LittleEndian>(record.central_galaxy_index).map_err(io_err)?;
        w.write_u64::<LittleEndian>(g.galaxy_nr.0).map_err(io_err)?;
        w.write_u32::<LittleEndian>(g.snapshot.0).map_err(io_err)?;
        w.write_u8(g.galaxy_type as u8).map_err(io_err)?;
        w.write_f64::<LittleEndian>(g.mvir).map_err(io_err)?;
        w.write_f64::<LittleEndian>(g.rvir).map_err(io_err)?;
        w.write_f64::<LittleEndian>(g.vvir).map_err(io_err)?;
        w.write_f64::<LittleEndian>(g.vmax).map_err(io_err)?;
        for reservoir in g.reservoirs.iter() {
            w.write_f64::<LittleEndian>(reservoir.mass).map_err(io_err)?;
            w.write_f64::<LittleEndian>(reservoir.metals).map_err(io_err)?;
        }
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> SageError {
    SageError::Io(e.to_string())
}
