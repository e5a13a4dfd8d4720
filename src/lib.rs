//! rfgrid: input-grid preparation and output rendering for a
//! point-to-point radio propagation engine.
//!
//! The engine itself is an external process. This crate covers both
//! sides of it: turning a categorical land-cover raster into the
//! smoothed, quantized clutter-height grid the engine consumes
//! (terrain grid -> CRS bridge -> nearest-neighbor reprojection ->
//! height classification -> spatial smoothing -> clutter file), and
//! turning the engine's radial-ray path-loss output back into a
//! regular field with signal-level classification (result file ->
//! Delaunay resampling -> S-unit mapping).

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::types::{
    Axis, ClassGrid, ClutterEncoding, GeoTransform, HeightGrid, LandCover, RfError, RfResult,
    SmoothingMode, TerrainGrid,
};

pub use crate::core::{
    classify_heights, interpolate_field, loss_to_s_values, prepare_clutter, HeightTable,
    InterpolatedField, LinkBudget, PrepareConfig, PrepareSummary, SignalScale,
};

pub use crate::io::{ClutterFile, PropagationResult};
