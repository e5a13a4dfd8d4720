//! End-to-end clutter preparation: terrain grid in, clutter file out.
//!
//! The pipeline is fail-fast: any stage error aborts the run before the
//! clutter file is persisted, because a partially valid clutter grid
//! would corrupt the downstream propagation run without warning.

use crate::core::classify::{classify_heights, HeightTable};
use crate::core::reproject::{
    bridge_grids, reproject_nearest, write_inspection_raster, LandCoverRaster,
};
use crate::core::smooth::smooth_heights;
use crate::io::clutter::write_clutter_file;
use crate::types::{ClutterEncoding, RfError, RfResult, SmoothingMode, TerrainGrid};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters of one preparation run. Passed explicitly into the
/// pipeline; there is no process-wide configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Source land-cover raster (any single-band categorical raster
    /// GDAL can open).
    pub land_cover_path: PathBuf,
    /// Terrain grid file defining the target lattice.
    pub terrain_path: PathBuf,
    /// Clutter file to produce.
    pub clutter_path: PathBuf,
    /// Destination CRS definition, e.g. "EPSG:2180".
    pub destination_crs: String,
    /// Ratio between the clutter lattice and the terrain lattice.
    pub oversample: usize,
    /// Worker threads for the resampler; 0 selects one per CPU.
    pub threads: usize,
    #[serde(default)]
    pub height_table: HeightTable,
    pub smoothing: SmoothingMode,
    /// Window/sigma for the smoother; `2 * oversample` when absent.
    #[serde(default)]
    pub smoothing_factor: Option<usize>,
    pub encoding: ClutterEncoding,
    /// Optional GeoTIFF dump of the reprojected classification.
    #[serde(default)]
    pub inspection_raster_path: Option<PathBuf>,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSummary {
    pub rows: usize,
    pub cols: usize,
    pub min_height_m: f64,
    pub max_height_m: f64,
}

/// Run the whole preparation pipeline.
pub fn prepare_clutter(config: &PrepareConfig) -> RfResult<PrepareSummary> {
    if config.oversample < 1 {
        return Err(RfError::Format(
            "oversample factor must be at least 1".to_string(),
        ));
    }
    log::info!(
        "Preparing clutter grid: {} -> {} (oversample {}, {:?}, {:?})",
        config.land_cover_path.display(),
        config.clutter_path.display(),
        config.oversample,
        config.smoothing,
        config.encoding
    );

    let terrain = TerrainGrid::from_file(&config.terrain_path)?;
    let raster = LandCoverRaster::open(&config.land_cover_path)?;

    let grid = bridge_grids(
        &terrain,
        &config.destination_crs,
        raster.spatial_ref_wkt(),
        config.oversample,
    )?;
    let codes = reproject_nearest(&raster, &grid, config.threads)?;

    if let Some(path) = &config.inspection_raster_path {
        write_inspection_raster(path, &codes, &grid)?;
    }

    let heights = classify_heights(&codes, &config.height_table)?;
    let factor = config.smoothing_factor.unwrap_or(2 * config.oversample);
    let smoothed = smooth_heights(&heights, config.smoothing, factor);

    let row_axis = terrain.rows.oversampled(config.oversample);
    let col_axis = terrain.cols.oversampled(config.oversample);
    write_clutter_file(
        &config.clutter_path,
        &row_axis,
        &col_axis,
        &smoothed,
        config.encoding,
    )?;

    let mut min_height = f64::INFINITY;
    let mut max_height = f64::NEG_INFINITY;
    for &h in smoothed.iter() {
        min_height = min_height.min(h);
        max_height = max_height.max(h);
    }
    let summary = PrepareSummary {
        rows: smoothed.nrows(),
        cols: smoothed.ncols(),
        min_height_m: min_height,
        max_height_m: max_height,
    };
    log::info!(
        "Clutter grid ready: {}x{}, heights {:.1}..{:.1} m",
        summary.rows,
        summary.cols,
        summary.min_height_m,
        summary.max_height_m
    );
    Ok(summary)
}
