//! Propagation result file: the engine's radial-ray path-loss output.
//!
//! Layout (all little-endian): `f64` x0, `f64` y0, `f64` radius,
//! `f64` ares (angular step, degrees), `i32` n (samples per ray), then
//! consecutive `n x f64` blocks, one per ray, until the file ends. Ray
//! `k` lies at azimuth `k * ares` degrees; its samples sit at equal
//! distance steps from 0 to the radius.

use crate::io::LeReader;
use crate::types::{RfError, RfResult};
use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const HEADER_BYTES: usize = 4 * 8 + 4;

/// Parsed propagation result.
#[derive(Debug, Clone)]
pub struct PropagationResult {
    /// Transmitter position (ray origin).
    pub x0: f64,
    pub y0: f64,
    /// Sampling radius in the same units as the origin.
    pub radius: f64,
    /// Angular step between successive rays, degrees.
    pub ares_deg: f64,
    /// Path-loss samples, one row per ray.
    pub losses: Array2<f64>,
}

impl PropagationResult {
    /// Read a complete result stream. A trailing partial ray is a format
    /// error; it must not be accepted as a short ray.
    pub fn read<R: Read>(mut reader: R) -> RfResult<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        let mut r = LeReader::new(raw.as_slice());
        let x0 = r.read_f64("x0")?;
        let y0 = r.read_f64("y0")?;
        let radius = r.read_f64("radius")?;
        let ares_deg = r.read_f64("ares")?;
        let n = r.read_i32("samples per ray")?;
        if n <= 0 {
            return Err(RfError::Format(format!(
                "non-positive samples-per-ray count {}",
                n
            )));
        }
        let n = n as usize;

        let body = &raw[HEADER_BYTES..];
        let ray_bytes = n * 8;
        if body.len() % ray_bytes != 0 {
            return Err(RfError::Format(format!(
                "result body of {} bytes is not a multiple of the {}-byte ray record \
                 ({} trailing bytes after byte {})",
                body.len(),
                ray_bytes,
                body.len() % ray_bytes,
                HEADER_BYTES + (body.len() / ray_bytes) * ray_bytes
            )));
        }
        let ray_count = body.len() / ray_bytes;

        let samples: Vec<f64> = body
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        let losses = Array2::from_shape_vec((ray_count, n), samples)
            .map_err(|e| RfError::Format(format!("ray block reshape failed: {}", e)))?;

        log::debug!(
            "read propagation result: origin ({}, {}), radius {}, {} rays of {} samples",
            x0,
            y0,
            radius,
            ray_count,
            n
        );
        Ok(PropagationResult {
            x0,
            y0,
            radius,
            ares_deg,
            losses,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        log::info!("Reading propagation result from: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::read(file)
    }

    pub fn ray_count(&self) -> usize {
        self.losses.nrows()
    }

    pub fn samples_per_ray(&self) -> usize {
        self.losses.ncols()
    }

    /// Azimuth of ray `k` in degrees.
    pub fn angle_deg(&self, ray: usize) -> f64 {
        ray as f64 * self.ares_deg
    }

    /// Sample distances from the origin: `n` evenly spaced steps from 0
    /// to the radius inclusive.
    pub fn distances(&self) -> Vec<f64> {
        let n = self.samples_per_ray();
        if n == 1 {
            return vec![0.0];
        }
        let step = self.radius / (n - 1) as f64;
        (0..n).map(|i| step * i as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(x0: f64, y0: f64, radius: f64, ares: f64, n: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&x0.to_le_bytes());
        buf.extend_from_slice(&y0.to_le_bytes());
        buf.extend_from_slice(&radius.to_le_bytes());
        buf.extend_from_slice(&ares.to_le_bytes());
        buf.extend_from_slice(&n.to_le_bytes());
        buf
    }

    #[test]
    fn test_reads_rays_until_exhausted() {
        let mut buf = header(618588.1, 507098.9, 15000.0, 1.0, 3);
        for v in [100.0, 110.0, 120.0, 101.0, 111.0, 121.0] {
            buf.extend_from_slice(&f64::to_le_bytes(v));
        }
        let result = PropagationResult::read(buf.as_slice()).unwrap();
        assert_eq!(result.ray_count(), 2);
        assert_eq!(result.samples_per_ray(), 3);
        assert_eq!(result.losses[[1, 2]], 121.0);
        assert_eq!(result.angle_deg(0), 0.0);
        assert_eq!(result.angle_deg(1), 1.0);
        assert_eq!(result.distances(), vec![0.0, 7500.0, 15000.0]);
    }

    #[test]
    fn test_partial_trailing_ray_is_format_error() {
        // n=4: ray records are 32 bytes; body of 2 rays + 3 stray bytes
        let mut buf = header(0.0, 0.0, 10.0, 90.0, 4);
        for _ in 0..8 {
            buf.extend_from_slice(&1.0f64.to_le_bytes());
        }
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let err = PropagationResult::read(buf.as_slice()).unwrap_err();
        assert!(matches!(err, RfError::Format(_)), "got {:?}", err);
    }

    #[test]
    fn test_truncated_header_is_format_error() {
        let buf = header(0.0, 0.0, 10.0, 90.0, 4);
        let err = PropagationResult::read(&buf[..20]).unwrap_err();
        assert!(matches!(err, RfError::Format(_)));
    }

    #[test]
    fn test_non_positive_ray_length_rejected() {
        let buf = header(0.0, 0.0, 10.0, 90.0, 0);
        assert!(PropagationResult::read(buf.as_slice()).is_err());
    }

    #[test]
    fn test_empty_body_is_valid() {
        let buf = header(5.0, 6.0, 100.0, 45.0, 8);
        let result = PropagationResult::read(buf.as_slice()).unwrap();
        assert_eq!(result.ray_count(), 0);
    }
}
