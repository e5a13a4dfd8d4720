use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Reprojected categorical land-cover codes.
pub type ClassGrid = Array2<u8>;

/// Continuous clutter-height field in meters.
pub type HeightGrid = Array2<f64>;

/// Ordered sequence of world coordinates along one grid dimension.
///
/// Strictly monotonic (ascending or descending) and immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    values: Vec<f64>,
}

impl Axis {
    /// Build an axis, validating strict monotonicity.
    pub fn new(values: Vec<f64>) -> RfResult<Self> {
        if values.is_empty() {
            return Err(RfError::Format(
                "axis must contain at least one coordinate".to_string(),
            ));
        }
        if values.len() > 1 {
            let ascending = values[1] > values[0];
            for pair in values.windows(2) {
                let ordered = if ascending {
                    pair[1] > pair[0]
                } else {
                    pair[1] < pair[0]
                };
                if !ordered {
                    return Err(RfError::Format(format!(
                        "axis is not strictly monotonic near coordinate {}",
                        pair[0]
                    )));
                }
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Evenly spaced axis between the same endpoints with `factor` times
    /// the number of coordinates.
    ///
    /// The coordinates are recomputed by interpolation, not replicated, so
    /// the oversampled axis is uniform even if the original was not.
    pub fn oversampled(&self, factor: usize) -> Axis {
        let count = self.values.len() * factor.max(1);
        let first = self.first();
        let last = self.last();
        if count == 1 {
            return Axis { values: vec![first] };
        }
        let step = (last - first) / (count - 1) as f64;
        Axis {
            values: (0..count).map(|i| first + step * i as f64).collect(),
        }
    }

    /// Index of the coordinate nearest to `target`, clamped at the ends.
    /// Ties resolve toward the later coordinate.
    pub fn nearest(&self, target: f64) -> usize {
        let v = &self.values;
        if v.len() == 1 {
            return 0;
        }
        let ascending = v[1] > v[0];
        let pos = v.partition_point(|&c| if ascending { c < target } else { c > target });
        if pos == 0 {
            return 0;
        }
        if pos == v.len() {
            return v.len() - 1;
        }
        if (target - v[pos - 1]).abs() < (v[pos] - target).abs() {
            pos - 1
        } else {
            pos
        }
    }
}

/// Target sampling lattice read from the engine's terrain file: a row
/// axis (y) and a column axis (x). All downstream rasters align to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub rows: Axis,
    pub cols: Axis,
}

impl TerrainGrid {
    /// (row count, column count)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }
}

/// Six-parameter affine mapping pixel coordinates to world coordinates,
/// GDAL ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Apply the affine to fractional pixel coordinates (col, row).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// World coordinates of the center of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Inverse affine: applying the result to (x, y) yields (col, row).
    pub fn inverted(&self) -> RfResult<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 {
            return Err(RfError::CoordinateTransform(
                "geotransform is singular and cannot be inverted".to_string(),
            ));
        }
        let inv_pw = self.pixel_height / det;
        let inv_rx = -self.rotation_x / det;
        let inv_ry = -self.rotation_y / det;
        let inv_ph = self.pixel_width / det;
        Ok(GeoTransform {
            top_left_x: -(inv_pw * self.top_left_x + inv_rx * self.top_left_y),
            pixel_width: inv_pw,
            rotation_x: inv_rx,
            top_left_y: -(inv_ry * self.top_left_x + inv_ph * self.top_left_y),
            rotation_y: inv_ry,
            pixel_height: inv_ph,
        })
    }
}

/// Axis-aligned window in projected coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Bounds {
    /// Smallest window enclosing a set of points.
    pub fn enclosing(xs: &[f64], ys: &[f64]) -> Self {
        let mut bounds = Bounds {
            left: f64::INFINITY,
            right: f64::NEG_INFINITY,
            bottom: f64::INFINITY,
            top: f64::NEG_INFINITY,
        };
        for &x in xs {
            bounds.left = bounds.left.min(x);
            bounds.right = bounds.right.max(x);
        }
        for &y in ys {
            bounds.bottom = bounds.bottom.min(y);
            bounds.top = bounds.top.max(y);
        }
        bounds
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Zero extent along either dimension.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Fixed land-cover class set of the source rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandCover {
    Water,
    Trees,
    FloodedVegetation,
    Crops,
    BuiltArea,
    BareGround,
    SnowIce,
    Clouds,
    Rangeland,
}

impl LandCover {
    pub const ALL: [LandCover; 9] = [
        LandCover::Water,
        LandCover::Trees,
        LandCover::FloodedVegetation,
        LandCover::Crops,
        LandCover::BuiltArea,
        LandCover::BareGround,
        LandCover::SnowIce,
        LandCover::Clouds,
        LandCover::Rangeland,
    ];

    /// Raster class code; the code space is sparse.
    pub fn code(self) -> u8 {
        match self {
            LandCover::Water => 1,
            LandCover::Trees => 2,
            LandCover::FloodedVegetation => 4,
            LandCover::Crops => 5,
            LandCover::BuiltArea => 7,
            LandCover::BareGround => 8,
            LandCover::SnowIce => 9,
            LandCover::Clouds => 10,
            LandCover::Rangeland => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        LandCover::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Default clutter height contribution in meters.
    pub fn default_height(self) -> f64 {
        match self {
            LandCover::Water => 0.0,
            LandCover::Trees => 8.0,
            LandCover::FloodedVegetation => 0.1,
            LandCover::Crops => 0.1,
            LandCover::BuiltArea => 15.0,
            LandCover::BareGround => 0.1,
            LandCover::SnowIce => 0.1,
            LandCover::Clouds => 0.1,
            LandCover::Rangeland => 0.1,
        }
    }
}

impl std::fmt::Display for LandCover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LandCover::Water => "water",
            LandCover::Trees => "trees",
            LandCover::FloodedVegetation => "flooded vegetation",
            LandCover::Crops => "crops",
            LandCover::BuiltArea => "built area",
            LandCover::BareGround => "bare ground",
            LandCover::SnowIce => "snow/ice",
            LandCover::Clouds => "clouds",
            LandCover::Rangeland => "rangeland",
        };
        write!(f, "{}", name)
    }
}

/// Versioned clutter-file value encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClutterEncoding {
    /// Canonical: decimeter units stored as unsigned 8-bit.
    Decimeters8,
    /// Legacy: centimeter units stored as unsigned 16-bit.
    Centimeters16,
}

impl ClutterEncoding {
    /// Quantization scale: stored value = round(height_m * scale).
    pub fn scale(self) -> f64 {
        match self {
            ClutterEncoding::Decimeters8 => 10.0,
            ClutterEncoding::Centimeters16 => 100.0,
        }
    }

    /// Largest storable quantized value.
    pub fn max_quantized(self) -> u64 {
        match self {
            ClutterEncoding::Decimeters8 => u8::MAX as u64,
            ClutterEncoding::Centimeters16 => u16::MAX as u64,
        }
    }

    pub fn bytes_per_value(self) -> usize {
        match self {
            ClutterEncoding::Decimeters8 => 1,
            ClutterEncoding::Centimeters16 => 2,
        }
    }
}

/// Smoothing strategy applied to the classified height field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmoothingMode {
    /// Canonical three-stage pipeline: 30th-percentile filter, Gaussian
    /// blur, 15th-percentile filter.
    PercentileGaussian,
    /// Legacy single Gaussian pass.
    GaussianOnly,
}

/// Error types for grid preparation and result rendering.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data format: {0}")]
    Format(String),

    #[error("unknown land cover class {code}")]
    UnknownLandCoverClass { code: u8 },

    #[error("coordinate transform error: {0}")]
    CoordinateTransform(String),

    #[error("quantized height {value} out of range 0..={max}")]
    Range { value: i64, max: u64 },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for grid operations.
pub type RfResult<T> = Result<T, RfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_rejects_non_monotonic() {
        assert!(Axis::new(vec![0.0, 1.0, 1.0]).is_err());
        assert!(Axis::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(Axis::new(vec![]).is_err());
        assert!(Axis::new(vec![3.0, 2.0, 1.0]).is_ok());
    }

    #[test]
    fn test_axis_oversampled_endpoints() {
        let axis = Axis::new(vec![0.0, 1.0]).unwrap();
        let fine = axis.oversampled(2);
        assert_eq!(fine.len(), 4);
        assert_eq!(fine.first(), 0.0);
        assert_eq!(fine.last(), 1.0);
        let spacing = fine.values()[1] - fine.values()[0];
        assert!((spacing - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_axis_nearest_clamps_and_ties() {
        let axis = Axis::new(vec![0.0, 10.0, 20.0]).unwrap();
        assert_eq!(axis.nearest(-5.0), 0);
        assert_eq!(axis.nearest(25.0), 2);
        assert_eq!(axis.nearest(4.0), 0);
        assert_eq!(axis.nearest(6.0), 1);
        // tie resolves toward the later coordinate
        assert_eq!(axis.nearest(5.0), 1);
    }

    #[test]
    fn test_geotransform_round_trip() {
        let gt = GeoTransform::from_gdal([100.0, 2.0, 0.0, 500.0, 0.0, -2.0]);
        let (x, y) = gt.apply(3.0, 4.0);
        assert_eq!((x, y), (106.0, 492.0));
        let inv = gt.inverted().unwrap();
        let (col, row) = inv.apply(x, y);
        assert!((col - 3.0).abs() < 1e-12);
        assert!((row - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_land_cover_codes() {
        for class in LandCover::ALL {
            assert_eq!(LandCover::from_code(class.code()), Some(class));
        }
        assert_eq!(LandCover::from_code(3), None);
        assert_eq!(LandCover::from_code(0), None);
    }
}
