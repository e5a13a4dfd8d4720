//! Terrain grid definition file: the target sampling lattice shared by
//! the preparation pipeline and the propagation engine.
//!
//! Layout (all little-endian): `i32` row count, `i32` column count,
//! `f64[rows]` row axis, `f64[cols]` column axis. The engine-side file
//! continues with a height block after the axes; this reader consumes
//! only the grid definition and leaves any trailing payload unread.

use crate::io::LeReader;
use crate::types::{Axis, RfError, RfResult, TerrainGrid};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

impl TerrainGrid {
    /// Read the grid definition from a byte stream.
    pub fn read<R: Read>(reader: R) -> RfResult<Self> {
        let mut r = LeReader::new(reader);
        let rows = r.read_i32("row count")?;
        let cols = r.read_i32("column count")?;
        if rows <= 0 || cols <= 0 {
            return Err(RfError::Format(format!(
                "non-positive terrain grid size {}x{}",
                rows, cols
            )));
        }
        let row_values = r.read_f64_vec(rows as usize, "row axis")?;
        let col_values = r.read_f64_vec(cols as usize, "column axis")?;
        log::debug!(
            "read terrain grid {}x{} ({} header+axis bytes)",
            rows,
            cols,
            r.offset()
        );
        Ok(TerrainGrid {
            rows: Axis::new(row_values)?,
            cols: Axis::new(col_values)?,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        log::info!("Reading terrain grid from: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::read(BufReader::new(file))
    }

    /// Write the grid definition in the same layout the reader expects.
    pub fn write<W: Write>(&self, mut writer: W) -> RfResult<()> {
        writer.write_all(&(self.rows.len() as i32).to_le_bytes())?;
        writer.write_all(&(self.cols.len() as i32).to_le_bytes())?;
        for &v in self.rows.values() {
            writer.write_all(&v.to_le_bytes())?;
        }
        for &v in self.cols.values() {
            writer.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> RfResult<()> {
        log::info!("Writing terrain grid to: {}", path.as_ref().display());
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
