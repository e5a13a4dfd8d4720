//! Coordinate bridging and nearest-neighbor reprojection of the
//! categorical land-cover raster onto the oversampled terrain grid.

use crate::types::{Bounds, ClassGrid, GeoTransform, RfError, RfResult, TerrainGrid};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};

/// Rows per parallel work unit. Fixed so the region split (and the
/// output) never depends on the worker count.
const BAND_ROWS: usize = 64;

/// Single-band categorical raster loaded for reprojection. Read-only
/// for the lifetime of a pipeline run.
pub struct LandCoverRaster {
    codes: ClassGrid,
    transform: GeoTransform,
    wkt: String,
    path: PathBuf,
}

impl LandCoverRaster {
    /// Open a georeferenced land-cover raster and pull band 1 into
    /// memory together with its CRS and geotransform.
    pub fn open<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        log::info!("Opening land cover raster: {}", path.as_ref().display());
        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(1)?;
        let band_data = rasterband.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
        let codes = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| RfError::Format(format!("failed to reshape raster band: {}", e)))?;

        let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let spatial_ref = dataset.spatial_ref()?;
        let wkt = spatial_ref.to_wkt()?;
        log::debug!("land cover raster size: {}x{}", width, height);

        Ok(Self {
            codes,
            transform,
            wkt,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// WKT of the raster's coordinate reference system.
    pub fn spatial_ref_wkt(&self) -> &str {
        &self.wkt
    }

    pub fn shape(&self) -> (usize, usize) {
        self.codes.dim()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Destination-grid description produced by the coordinate bridge.
#[derive(Debug, Clone)]
pub struct BridgedGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub dst_wkt: String,
    pub src_wkt: String,
}

fn spatial_ref_from_definition(definition: &str) -> RfResult<SpatialRef> {
    let spatial_ref = SpatialRef::from_definition(definition).map_err(|e| {
        RfError::CoordinateTransform(format!("unsupported CRS '{}': {}", definition, e))
    })?;
    spatial_ref
        .set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(spatial_ref)
}

fn spatial_ref_from_wkt(wkt: &str) -> RfResult<SpatialRef> {
    let spatial_ref = SpatialRef::from_wkt(wkt)
        .map_err(|e| RfError::CoordinateTransform(format!("invalid CRS definition: {}", e)))?;
    spatial_ref
        .set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(spatial_ref)
}

fn transform_between(
    from: &SpatialRef,
    to: &SpatialRef,
    context: &str,
) -> RfResult<CoordTransform> {
    CoordTransform::new(from, to).map_err(|e| {
        RfError::CoordinateTransform(format!("no transform {}: {}", context, e))
    })
}

fn transformed_bounds(
    transform: &CoordTransform,
    bounds: &Bounds,
    context: &str,
) -> RfResult<Bounds> {
    let mut xs = [bounds.left, bounds.right, bounds.right, bounds.left];
    let mut ys = [bounds.bottom, bounds.bottom, bounds.top, bounds.top];
    let mut zs = [0.0; 4];
    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| {
            RfError::CoordinateTransform(format!("corner transform {} failed: {}", context, e))
        })?;
    let out = Bounds::enclosing(&xs, &ys);
    if out.is_degenerate() {
        return Err(RfError::CoordinateTransform(format!(
            "degenerate bounding box {} ({}x{} world units)",
            context,
            out.width(),
            out.height()
        )));
    }
    Ok(out)
}

/// Compute the destination grid a reprojection must fill: take the
/// terrain grid's corner coordinates in the destination CRS, bridge
/// them through the source raster's CRS to find the covering window,
/// and lay an `oversample`-times-finer pixel lattice over it.
pub fn bridge_grids(
    terrain: &TerrainGrid,
    destination_crs: &str,
    source_wkt: &str,
    oversample: usize,
) -> RfResult<BridgedGrid> {
    if oversample == 0 {
        return Err(RfError::Format(
            "oversample factor must be at least 1".to_string(),
        ));
    }
    let dst_ref = spatial_ref_from_definition(destination_crs)?;
    let src_ref = spatial_ref_from_wkt(source_wkt)?;

    let corners = Bounds {
        left: terrain.cols.first(),
        right: terrain.cols.last(),
        bottom: terrain.rows.first(),
        top: terrain.rows.last(),
    };
    // the terrain axes may run either way; normalize to a window
    let corners = Bounds {
        left: corners.left.min(corners.right),
        right: corners.left.max(corners.right),
        bottom: corners.bottom.min(corners.top),
        top: corners.bottom.max(corners.top),
    };

    let to_src = transform_between(
        &dst_ref,
        &src_ref,
        &format!("from '{}' to the source raster CRS", destination_crs),
    )?;
    let source_window = transformed_bounds(&to_src, &corners, "in the source CRS")?;

    // round-trip the covering source window back so the destination
    // lattice is georeferenced in the destination CRS
    let to_dst = transform_between(
        &src_ref,
        &dst_ref,
        &format!("from the source raster CRS to '{}'", destination_crs),
    )?;
    let window = transformed_bounds(&to_dst, &source_window, "in the destination CRS")?;

    let height = terrain.rows.len() * oversample;
    let width = terrain.cols.len() * oversample;
    let transform = GeoTransform {
        top_left_x: window.left,
        pixel_width: window.width() / width as f64,
        rotation_x: 0.0,
        top_left_y: window.top,
        rotation_y: 0.0,
        pixel_height: -(window.height() / height as f64),
    };

    log::debug!(
        "bridged {}x{} destination grid over window ({:.3}, {:.3})..({:.3}, {:.3})",
        height,
        width,
        window.left,
        window.bottom,
        window.right,
        window.top
    );
    Ok(BridgedGrid {
        transform,
        width,
        height,
        dst_wkt: dst_ref.to_wkt()?,
        src_wkt: src_ref.to_wkt()?,
    })
}

/// Reproject one horizontal band of destination rows. Each band owns
/// its coordinate transform, so bands share no mutable state.
fn reproject_band(
    raster: &LandCoverRaster,
    grid: &BridgedGrid,
    inverse_source: &GeoTransform,
    start_row: usize,
) -> RfResult<Array2<u8>> {
    let end_row = (start_row + BAND_ROWS).min(grid.height);
    let rows = end_row - start_row;
    let width = grid.width;

    let dst_ref = spatial_ref_from_wkt(&grid.dst_wkt)?;
    let src_ref = spatial_ref_from_wkt(&grid.src_wkt)?;
    let to_src = transform_between(&dst_ref, &src_ref, "for a reprojection band")?;

    let mut xs = Vec::with_capacity(rows * width);
    let mut ys = Vec::with_capacity(rows * width);
    for i in start_row..end_row {
        for j in 0..width {
            let (x, y) = grid.transform.pixel_center(i, j);
            xs.push(x);
            ys.push(y);
        }
    }
    let mut zs = vec![0.0; rows * width];
    to_src
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| {
            RfError::CoordinateTransform(format!(
                "pixel transform failed for rows {}..{}: {}",
                start_row, end_row, e
            ))
        })?;

    let (source_height, source_width) = raster.codes.dim();
    // cells that project outside the source raster keep the fill value 0
    let mut band = Array2::zeros((rows, width));
    for (k, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
        let (col, row) = inverse_source.apply(x, y);
        let col = col.floor();
        let row = row.floor();
        if col >= 0.0 && col < source_width as f64 && row >= 0.0 && row < source_height as f64 {
            band[[k / width, k % width]] = raster.codes[[row as usize, col as usize]];
        }
    }
    Ok(band)
}

/// Nearest-neighbor reprojection of the raster onto the bridged grid.
///
/// Nearest-neighbor exclusively: the band is categorical, and blending
/// class codes would synthesize classes that do not exist. Bands of
/// rows are processed in parallel on a pool of `threads` workers
/// (0 = one per CPU); the split is fixed, so the output is identical
/// for any worker count.
pub fn reproject_nearest(
    raster: &LandCoverRaster,
    grid: &BridgedGrid,
    threads: usize,
) -> RfResult<ClassGrid> {
    let inverse_source = raster.transform.inverted()?;
    let band_starts: Vec<usize> = (0..grid.height).step_by(BAND_ROWS).collect();
    log::info!(
        "Reprojecting {} onto {}x{} grid ({} bands, {} threads)",
        raster.path().display(),
        grid.height,
        grid.width,
        band_starts.len(),
        threads
    );

    let bands = compute_bands(raster, grid, &inverse_source, &band_starts, threads)?;

    let mut output = Array2::zeros((grid.height, grid.width));
    for (&start_row, band) in band_starts.iter().zip(bands.iter()) {
        let end_row = (start_row + BAND_ROWS).min(grid.height);
        output.slice_mut(s![start_row..end_row, ..]).assign(band);
    }
    Ok(output)
}

#[cfg(feature = "parallel")]
fn compute_bands(
    raster: &LandCoverRaster,
    grid: &BridgedGrid,
    inverse_source: &GeoTransform,
    band_starts: &[usize],
    threads: usize,
) -> RfResult<Vec<Array2<u8>>> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| RfError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    pool.install(|| {
        band_starts
            .par_iter()
            .map(|&start| reproject_band(raster, grid, inverse_source, start))
            .collect()
    })
}

#[cfg(not(feature = "parallel"))]
fn compute_bands(
    raster: &LandCoverRaster,
    grid: &BridgedGrid,
    inverse_source: &GeoTransform,
    band_starts: &[usize],
    _threads: usize,
) -> RfResult<Vec<Array2<u8>>> {
    band_starts
        .iter()
        .map(|&start| reproject_band(raster, grid, inverse_source, start))
        .collect()
}

/// Persist the reprojected classification as a GeoTIFF in the
/// destination CRS. Inspection aid only; the preparation pipeline does
/// not read it back.
pub fn write_inspection_raster<P: AsRef<Path>>(
    path: P,
    codes: &ClassGrid,
    grid: &BridgedGrid,
) -> RfResult<()> {
    log::info!("Saving reprojected classes as GeoTIFF: {}", path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = codes.dim();
    let mut dataset =
        driver.create_with_band_type::<u8, _>(path.as_ref(), width as isize, height as isize, 1)?;
    dataset.set_geo_transform(&grid.transform.to_gdal())?;
    dataset.set_spatial_ref(&spatial_ref_from_wkt(&grid.dst_wkt)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<u8> = codes.iter().cloned().collect();
    let buffer = gdal::raster::Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;
    Ok(())
}
