//! Reconstruction of a continuous 2D field from the engine's radial-ray
//! sample set, for rendering and signal classification.
//!
//! Every ray sample is projected to Cartesian coordinates, the pooled
//! point set is Delaunay-triangulated, and the field is evaluated on a
//! regular grid by linear barycentric interpolation. Grid nodes outside
//! the convex hull stay NaN; they are undefined, not zero.
//!
//! All rays share the origin sample, so the pooled set always contains
//! coincident points. Exact duplicates are collapsed keeping the first
//! occurrence, which makes ray 0's origin loss the one that wins.

use crate::io::PropagationResult;
use crate::types::{RfError, RfResult};
use delaunator::{triangulate, Point};
use ndarray::Array2;
use std::collections::HashSet;

/// Barycentric tolerance for nodes on triangle edges.
const EDGE_EPS: f64 = 1e-10;

/// Regular Cartesian field sampled from the polar result. `values` is
/// indexed `[row, col]` with `row` along `y` and `col` along `x`; NaN
/// marks nodes outside the sampled region.
#[derive(Debug, Clone)]
pub struct InterpolatedField {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub values: Array2<f64>,
}

impl InterpolatedField {
    /// Apply a value mapping, leaving undefined nodes undefined (NaN
    /// propagates through any finite mapping).
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> InterpolatedField {
        InterpolatedField {
            x: self.x.clone(),
            y: self.y.clone(),
            values: self.values.mapv(|v| f(v)),
        }
    }
}

/// Unit direction for an azimuth in degrees. Cardinal angles map to
/// exact unit vectors so that opposite rays project onto one line
/// instead of a near-degenerate sliver.
fn unit_vector(angle_deg: f64) -> (f64, f64) {
    match angle_deg.rem_euclid(360.0) {
        a if a == 0.0 => (1.0, 0.0),
        a if a == 90.0 => (0.0, 1.0),
        a if a == 180.0 => (-1.0, 0.0),
        a if a == 270.0 => (0.0, -1.0),
        a => {
            let r = a.to_radians();
            (r.cos(), r.sin())
        }
    }
}

/// Project every ray sample to Cartesian `(x, y, loss)`.
pub fn project_rays(result: &PropagationResult) -> Vec<[f64; 3]> {
    let distances = result.distances();
    let mut points = Vec::with_capacity(result.ray_count() * result.samples_per_ray());
    for ray in 0..result.ray_count() {
        let (cos, sin) = unit_vector(result.angle_deg(ray));
        for (sample, &d) in distances.iter().enumerate() {
            points.push([
                result.x0 + d * cos,
                result.y0 + d * sin,
                result.losses[[ray, sample]],
            ]);
        }
    }
    points
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Inclusive grid-index range covered by `[lo, hi]` on an axis starting
/// at `origin` with spacing `step`.
fn index_range(origin: f64, step: f64, lo: f64, hi: f64, count: usize) -> Option<(usize, usize)> {
    if step <= 0.0 {
        return Some((0, count - 1));
    }
    let start = ((lo - origin) / step - 1e-9).ceil().max(0.0) as usize;
    let end = ((hi - origin) / step + 1e-9).floor();
    if end < 0.0 {
        return None;
    }
    let end = (end as usize).min(count - 1);
    if start > end {
        return None;
    }
    Some((start, end))
}

fn interp_1d(ts: &[f64], vs: &[f64], t: f64) -> f64 {
    if t <= ts[0] {
        return vs[0];
    }
    if t >= ts[ts.len() - 1] {
        return vs[vs.len() - 1];
    }
    let hi = ts.partition_point(|&c| c < t);
    let lo = hi - 1;
    if ts[hi] == ts[lo] {
        return vs[lo];
    }
    let w = (t - ts[lo]) / (ts[hi] - ts[lo]);
    vs[lo] + w * (vs[hi] - vs[lo])
}

/// Degenerate (collinear) point sets have no triangulation; interpolate
/// along the common line instead so two-ray results still render.
fn fill_collinear(points: &[[f64; 3]], xs: &[f64], ys: &[f64], values: &mut Array2<f64>) {
    let origin = points[0];
    let mut best = 0;
    let mut best_d2 = 0.0;
    for (idx, p) in points.iter().enumerate() {
        let d2 = (p[0] - origin[0]).powi(2) + (p[1] - origin[1]).powi(2);
        if d2 > best_d2 {
            best = idx;
            best_d2 = d2;
        }
    }
    let length = best_d2.sqrt();
    let ux = (points[best][0] - origin[0]) / length;
    let uy = (points[best][1] - origin[1]) / length;

    let mut samples: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p[0] - origin[0]) * ux + (p[1] - origin[1]) * uy, p[2]))
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    let ts: Vec<f64> = samples.iter().map(|s| s.0).collect();
    let vs: Vec<f64> = samples.iter().map(|s| s.1).collect();

    let eps = 1e-9 * length.max(1.0);
    for (iy, &y) in ys.iter().enumerate() {
        for (jx, &x) in xs.iter().enumerate() {
            let dx = x - origin[0];
            let dy = y - origin[1];
            let t = dx * ux + dy * uy;
            let perpendicular = (dx * uy - dy * ux).abs();
            if perpendicular <= eps && t >= ts[0] - eps && t <= ts[ts.len() - 1] + eps {
                values[[iy, jx]] = interp_1d(&ts, &vs, t);
            }
        }
    }
}

/// Triangulate the polar sample set and evaluate the loss field on a
/// `grid_size` x `grid_size` lattice over its bounding box. Grid
/// density is a rendering parameter, not a correctness parameter.
pub fn interpolate_field(
    result: &PropagationResult,
    grid_size: usize,
) -> RfResult<InterpolatedField> {
    let grid_size = grid_size.max(2);

    let mut seen = HashSet::new();
    let points: Vec<[f64; 3]> = project_rays(result)
        .into_iter()
        .filter(|p| seen.insert((p[0].to_bits(), p[1].to_bits())))
        .collect();
    if points.len() < 2 {
        return Err(RfError::Format(format!(
            "result holds {} distinct sample points, too few to interpolate",
            points.len()
        )));
    }

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in &points {
        min_x = min_x.min(p[0]);
        max_x = max_x.max(p[0]);
        min_y = min_y.min(p[1]);
        max_y = max_y.max(p[1]);
    }
    let xs = linspace(min_x, max_x, grid_size);
    let ys = linspace(min_y, max_y, grid_size);
    let step_x = (max_x - min_x) / (grid_size - 1) as f64;
    let step_y = (max_y - min_y) / (grid_size - 1) as f64;

    let mut values = Array2::from_elem((grid_size, grid_size), f64::NAN);

    let vertices: Vec<Point> = points.iter().map(|p| Point { x: p[0], y: p[1] }).collect();
    let triangulation = triangulate(&vertices);
    if triangulation.triangles.is_empty() {
        log::debug!("sample set is collinear, falling back to 1D interpolation");
        fill_collinear(&points, &xs, &ys, &mut values);
        return Ok(InterpolatedField { x: xs, y: ys, values });
    }
    log::debug!(
        "triangulated {} points into {} triangles",
        points.len(),
        triangulation.triangles.len() / 3
    );

    for tri in triangulation.triangles.chunks_exact(3) {
        let a = points[tri[0]];
        let b = points[tri[1]];
        let c = points[tri[2]];
        let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        if det == 0.0 {
            continue;
        }

        let lo_x = a[0].min(b[0]).min(c[0]);
        let hi_x = a[0].max(b[0]).max(c[0]);
        let lo_y = a[1].min(b[1]).min(c[1]);
        let hi_y = a[1].max(b[1]).max(c[1]);
        let Some((jx0, jx1)) = index_range(min_x, step_x, lo_x, hi_x, grid_size) else {
            continue;
        };
        let Some((iy0, iy1)) = index_range(min_y, step_y, lo_y, hi_y, grid_size) else {
            continue;
        };

        for iy in iy0..=iy1 {
            let y = ys[iy];
            for jx in jx0..=jx1 {
                let x = xs[jx];
                let wa = ((b[1] - c[1]) * (x - c[0]) + (c[0] - b[0]) * (y - c[1])) / det;
                let wb = ((c[1] - a[1]) * (x - c[0]) + (a[0] - c[0]) * (y - c[1])) / det;
                let wc = 1.0 - wa - wb;
                if wa >= -EDGE_EPS && wb >= -EDGE_EPS && wc >= -EDGE_EPS {
                    values[[iy, jx]] = wa * a[2] + wb * b[2] + wc * c[2];
                }
            }
        }
    }

    Ok(InterpolatedField { x: xs, y: ys, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn result_from(
        x0: f64,
        y0: f64,
        radius: f64,
        ares_deg: f64,
        rays: Vec<Vec<f64>>,
    ) -> PropagationResult {
        let n = rays[0].len();
        let flat: Vec<f64> = rays.iter().flatten().copied().collect();
        PropagationResult {
            x0,
            y0,
            radius,
            ares_deg,
            losses: Array2::from_shape_vec((rays.len(), n), flat).unwrap(),
        }
    }

    #[test]
    fn test_projection_geometry() {
        let result = result_from(1.0, 2.0, 10.0, 90.0, vec![vec![5.0, 6.0], vec![7.0, 8.0]]);
        let points = project_rays(&result);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], [1.0, 2.0, 5.0]);
        assert_eq!(points[1], [11.0, 2.0, 6.0]);
        // 90 degrees: along +y
        assert!((points[3][0] - 1.0).abs() < 1e-9);
        assert!((points[3][1] - 12.0).abs() < 1e-9);
        assert_eq!(points[3][2], 8.0);
    }

    #[test]
    fn test_two_ray_collinear_interpolation() {
        // opposite rays along the x axis; a degenerate set for the
        // triangulation, served by the 1D fallback
        let result = result_from(
            0.0,
            0.0,
            10.0,
            180.0,
            vec![vec![100.0, 110.0], vec![120.0, 130.0]],
        );
        let field = interpolate_field(&result, 5).unwrap();
        assert_eq!(field.x, vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
        // halfway between the origin (100) and the +x tip (110)
        assert!((field.values[[0, 3]] - 105.0).abs() < 1e-9);
        // halfway between the -x tip (130) and the origin (100)
        assert!((field.values[[0, 1]] - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_ray_wins_at_shared_origin() {
        let result = result_from(
            0.0,
            0.0,
            10.0,
            180.0,
            vec![vec![100.0, 110.0], vec![120.0, 130.0]],
        );
        let field = interpolate_field(&result, 5).unwrap();
        assert!((field.values[[0, 2]] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_pattern_triangulation() {
        // four rays at 90-degree steps form a diamond hull
        let result = result_from(
            0.0,
            0.0,
            10.0,
            90.0,
            vec![
                vec![50.0, 60.0],
                vec![50.0, 70.0],
                vec![50.0, 80.0],
                vec![50.0, 90.0],
            ],
        );
        let field = interpolate_field(&result, 5).unwrap();
        // vertices reproduce their sample values
        assert!((field.values[[2, 2]] - 50.0).abs() < 1e-9);
        assert!((field.values[[2, 4]] - 60.0).abs() < 1e-9);
        assert!((field.values[[4, 2]] - 70.0).abs() < 1e-9);
        assert!((field.values[[2, 0]] - 80.0).abs() < 1e-9);
        assert!((field.values[[0, 2]] - 90.0).abs() < 1e-9);
        // midpoint of the origin-to-east edge
        assert!((field.values[[2, 3]] - 55.0).abs() < 1e-9);
        // corners lie outside the convex hull and stay undefined
        assert!(field.values[[0, 0]].is_nan());
        assert!(field.values[[4, 4]].is_nan());
    }

    #[test]
    fn test_too_few_points_rejected() {
        let result = result_from(0.0, 0.0, 10.0, 90.0, vec![vec![1.0]]);
        assert!(interpolate_field(&result, 5).is_err());
    }

    #[test]
    fn test_map_values_preserves_nan() {
        let field = InterpolatedField {
            x: vec![0.0, 1.0],
            y: vec![0.0, 1.0],
            values: ndarray::array![[1.0, f64::NAN], [3.0, 4.0]],
        };
        let mapped = field.map_values(|v| v * 2.0);
        assert_eq!(mapped.values[[0, 0]], 2.0);
        assert!(mapped.values[[0, 1]].is_nan());
    }
}
