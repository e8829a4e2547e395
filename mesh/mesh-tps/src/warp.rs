//! Applying solved coefficients to points and meshes.

use mesh_types::IndexedMesh;
use nalgebra::Point3;
use rayon::prelude::*;

use crate::coefficients::TpsCoefficients;

/// Below this many points the warp runs on the calling thread.
const PARALLEL_THRESHOLD: usize = 1000;

/// Warps `p` and blends the result with the original point.
///
/// Returns `p + blend * (f(p) - p)`. The blend factor is not clamped:
/// values outside `[0, 1]` extrapolate.
#[must_use]
pub fn warp_point(coefficients: &TpsCoefficients, p: &Point3<f64>, blend: f64) -> Point3<f64> {
    p + (coefficients.evaluate(p) - p) * blend
}

/// Warps every point in `points` in place.
pub fn warp_points_in_place(coefficients: &TpsCoefficients, points: &mut [Point3<f64>], blend: f64) {
    if points.len() > PARALLEL_THRESHOLD {
        points
            .par_iter_mut()
            .for_each(|p| *p = warp_point(coefficients, p, blend));
    } else {
        for p in points.iter_mut() {
            *p = warp_point(coefficients, p, blend);
        }
    }
}

/// Returns a copy of `mesh` with every vertex warped and normals recomputed.
///
/// The vertex count and faces are unchanged.
#[must_use]
pub fn warp_mesh(coefficients: &TpsCoefficients, mesh: &IndexedMesh, blend: f64) -> IndexedMesh {
    let mut result = mesh.clone();
    if result.vertices.len() > PARALLEL_THRESHOLD {
        result
            .vertices
            .par_iter_mut()
            .for_each(|v| v.position = warp_point(coefficients, &v.position, blend));
    } else {
        for v in &mut result.vertices {
            v.position = warp_point(coefficients, &v.position, blend);
        }
    }
    result.recalculate_normals();
    result
}
