//! Clutter height file: the quantized, oversampled height grid handed
//! to the propagation engine.
//!
//! Layout (all little-endian): `i32` row count, `i32` column count,
//! `f64[rows]` row axis, `f64[cols]` column axis, then `rows` records
//! of `cols` quantized heights. Grid records are written with row order
//! reversed relative to the in-memory raster (highest row index first)
//! so that the record order follows the ascending row axis; the engine
//! depends on this convention, it is a format contract.
//!
//! The value encoding is versioned (see [`ClutterEncoding`]) and the
//! file does not self-describe it; readers must be told which variant
//! they are looking at.

use crate::io::LeReader;
use crate::types::{Axis, ClutterEncoding, HeightGrid, RfError, RfResult};
use ndarray::Array2;
use num_traits::{NumCast, PrimInt, Unsigned};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Quantize one height to the target integer width. Values that do not
/// fit the width are a hard error, never wrapped.
fn quantize<T>(height_m: f64, scale: f64) -> RfResult<T>
where
    T: PrimInt + Unsigned + NumCast,
{
    let q = (height_m * scale).round();
    T::from(q).ok_or_else(|| RfError::Range {
        value: q as i64,
        max: T::max_value().to_u64().unwrap_or(u64::MAX),
    })
}

/// Serialize oversampled axes and a smoothed height grid to a stream.
///
/// `heights` is in raster orientation (row 0 at the top of the raster);
/// records are emitted in reverse row order per the format contract.
pub fn write_clutter<W: Write>(
    mut writer: W,
    row_axis: &Axis,
    col_axis: &Axis,
    heights: &HeightGrid,
    encoding: ClutterEncoding,
) -> RfResult<()> {
    let (rows, cols) = heights.dim();
    if rows != row_axis.len() || cols != col_axis.len() {
        return Err(RfError::Format(format!(
            "height grid {}x{} does not match axes {}x{}",
            rows,
            cols,
            row_axis.len(),
            col_axis.len()
        )));
    }

    writer.write_all(&(rows as i32).to_le_bytes())?;
    writer.write_all(&(cols as i32).to_le_bytes())?;
    for &v in row_axis.values() {
        writer.write_all(&v.to_le_bytes())?;
    }
    for &v in col_axis.values() {
        writer.write_all(&v.to_le_bytes())?;
    }

    let scale = encoding.scale();
    for i in (0..rows).rev() {
        for j in 0..cols {
            match encoding {
                ClutterEncoding::Decimeters8 => {
                    writer.write_all(&[quantize::<u8>(heights[[i, j]], scale)?])?;
                }
                ClutterEncoding::Centimeters16 => {
                    writer.write_all(&quantize::<u16>(heights[[i, j]], scale)?.to_le_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// Write a clutter file atomically: the bytes go to a temporary file in
/// the destination directory which is persisted only on success, so an
/// aborted run never leaves a partial artifact behind.
pub fn write_clutter_file<P: AsRef<Path>>(
    path: P,
    row_axis: &Axis,
    col_axis: &Axis,
    heights: &HeightGrid,
    encoding: ClutterEncoding,
) -> RfResult<()> {
    let path = path.as_ref();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))?;
    {
        let mut buffered = BufWriter::new(tmp.as_file_mut());
        write_clutter(&mut buffered, row_axis, col_axis, heights, encoding)?;
        buffered.flush()?;
    }
    tmp.persist(path).map_err(|e| RfError::Io(e.error))?;
    log::info!(
        "Wrote clutter file {} ({}x{}, {:?})",
        path.display(),
        row_axis.len(),
        col_axis.len(),
        encoding
    );
    Ok(())
}

/// Parsed clutter file.
#[derive(Debug, Clone)]
pub struct ClutterFile {
    pub rows: Axis,
    pub cols: Axis,
    pub encoding: ClutterEncoding,
    /// Quantized values in record order: row `k` aligns with
    /// `rows.values()[k]`, i.e. reversed relative to raster row order.
    pub values: Array2<u16>,
}

impl ClutterFile {
    /// Parse a clutter file. The encoding is supplied by the caller
    /// because the format carries no version marker.
    pub fn read<R: Read>(reader: R, encoding: ClutterEncoding) -> RfResult<Self> {
        let mut r = LeReader::new(reader);
        let rows = r.read_i32("row count")?;
        let cols = r.read_i32("column count")?;
        if rows <= 0 || cols <= 0 {
            return Err(RfError::Format(format!(
                "non-positive clutter grid size {}x{}",
                rows, cols
            )));
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let row_values = r.read_f64_vec(rows, "row axis")?;
        let col_values = r.read_f64_vec(cols, "column axis")?;

        let mut values = Array2::zeros((rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                values[[i, j]] = match encoding {
                    ClutterEncoding::Decimeters8 => r.read_u8("height record")? as u16,
                    ClutterEncoding::Centimeters16 => r.read_u16("height record")?,
                };
            }
        }
        log::debug!("read clutter grid {}x{} ({} bytes)", rows, cols, r.offset());
        Ok(ClutterFile {
            rows: Axis::new(row_values)?,
            cols: Axis::new(col_values)?,
            encoding,
            values,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, encoding: ClutterEncoding) -> RfResult<Self> {
        log::info!("Reading clutter file from: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::read(BufReader::new(file), encoding)
    }

    /// Dequantized heights in meters, record order.
    pub fn heights_m(&self) -> HeightGrid {
        let scale = self.encoding.scale();
        self.values.mapv(|q| q as f64 / scale)
    }

    /// Quantized height at the grid node nearest to world point (x, y).
    pub fn nearest(&self, x: f64, y: f64) -> u16 {
        self.values[[self.rows.nearest(y), self.cols.nearest(x)]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn axes() -> (Axis, Axis) {
        (
            Axis::new(vec![0.0, 1.0]).unwrap(),
            Axis::new(vec![0.0, 1.0, 2.0]).unwrap(),
        )
    }

    #[test]
    fn test_rows_are_written_in_reverse_order() {
        let (rows, cols) = axes();
        let heights = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut buf = Vec::new();
        write_clutter(&mut buf, &rows, &cols, &heights, ClutterEncoding::Decimeters8).unwrap();
        // header (8) + axes (2*8 + 3*8) then records, bottom raster row first
        let records = &buf[8 + 40..];
        assert_eq!(records, &[40, 50, 60, 10, 20, 30]);
    }

    #[test]
    fn test_quantization_range_is_enforced() {
        let (rows, cols) = axes();
        // 25.6 m exceeds u8 decimeters (255)
        let heights = array![[1.0, 2.0, 3.0], [4.0, 5.0, 25.6]];
        let mut buf = Vec::new();
        let err = write_clutter(&mut buf, &rows, &cols, &heights, ClutterEncoding::Decimeters8)
            .unwrap_err();
        assert!(matches!(err, RfError::Range { value: 256, max: 255 }));
        // the same grid fits the legacy 16-bit centimeter encoding
        let mut buf = Vec::new();
        write_clutter(&mut buf, &rows, &cols, &heights, ClutterEncoding::Centimeters16).unwrap();
    }

    #[test]
    fn test_negative_height_is_range_error() {
        let (rows, cols) = axes();
        let heights = array![[1.0, 2.0, 3.0], [4.0, 5.0, -0.3]];
        let mut buf = Vec::new();
        let err = write_clutter(&mut buf, &rows, &cols, &heights, ClutterEncoding::Decimeters8)
            .unwrap_err();
        assert!(matches!(err, RfError::Range { value: -3, .. }));
    }

    #[test]
    fn test_round_trip_both_encodings() {
        let (rows, cols) = axes();
        let heights = array![[0.0, 8.0, 15.0], [0.1, 6.0, 0.1]];
        for encoding in [ClutterEncoding::Decimeters8, ClutterEncoding::Centimeters16] {
            let mut buf = Vec::new();
            write_clutter(&mut buf, &rows, &cols, &heights, encoding).unwrap();
            let back = ClutterFile::read(buf.as_slice(), encoding).unwrap();
            assert_eq!(back.rows, rows);
            assert_eq!(back.cols, cols);
            let decoded = back.heights_m();
            // undo the row reversal to compare against raster orientation
            for i in 0..2 {
                for j in 0..3 {
                    let expected =
                        (heights[[i, j]] * encoding.scale()).round() / encoding.scale();
                    assert!((decoded[[1 - i, j]] - expected).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_quantization_is_idempotent() {
        let encoding = ClutterEncoding::Decimeters8;
        let once = quantize::<u8>(6.04, encoding.scale()).unwrap();
        let dequantized = once as f64 / encoding.scale();
        let twice = quantize::<u8>(dequantized, encoding.scale()).unwrap();
        assert_eq!(once, twice);
    }
}
