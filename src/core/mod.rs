//! Core numerical pipelines: clutter preparation and result rendering.

pub mod classify;
pub mod pipeline;
pub mod polar;
pub mod reproject;
pub mod signal;
pub mod smooth;

// Re-export main types
pub use classify::{classify_heights, HeightTable};
pub use pipeline::{prepare_clutter, PrepareConfig, PrepareSummary};
pub use polar::{interpolate_field, project_rays, InterpolatedField};
pub use reproject::{bridge_grids, reproject_nearest, BridgedGrid, LandCoverRaster};
pub use signal::{loss_to_s_values, LinkBudget, SUnit, SignalScale};
pub use smooth::{gaussian_blur, percentile_filter, smooth_heights};
