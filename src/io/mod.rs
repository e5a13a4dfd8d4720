//! Binary file formats exchanged with the propagation engine.

pub mod clutter;
pub mod result;
pub mod terrain;

pub use clutter::ClutterFile;
pub use result::PropagationResult;

use crate::types::{RfError, RfResult};
use std::io::Read;

/// Little-endian field reader that tracks the byte offset for error
/// reporting. Truncation surfaces as a format error naming the field
/// and the offset; other I/O failures pass through untouched.
pub(crate) struct LeReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> LeReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    fn fill(&mut self, buf: &mut [u8], field: &str) -> RfResult<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RfError::Format(
                format!("truncated {} at byte {}", field, self.offset),
            )),
            Err(e) => Err(RfError::Io(e)),
        }
    }

    pub(crate) fn read_i32(&mut self, field: &str) -> RfResult<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, field)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub(crate) fn read_u16(&mut self, field: &str) -> RfResult<u16> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf, field)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub(crate) fn read_u8(&mut self, field: &str) -> RfResult<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf, field)?;
        Ok(buf[0])
    }

    pub(crate) fn read_f64(&mut self, field: &str) -> RfResult<f64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf, field)?;
        Ok(f64::from_le_bytes(buf))
    }

    pub(crate) fn read_f64_vec(&mut self, count: usize, field: &str) -> RfResult<Vec<f64>> {
        let mut raw = vec![0u8; count * 8];
        self.fill(&mut raw, field)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }
}
