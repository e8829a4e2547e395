//! The TPS coefficient solver.
//!
//! Builds the `(n + 4)²` system
//!
//! ```text
//! | K   P | | w |   | v |
//! | Pᵀ  0 | | a | = | 0 |
//! ```
//!
//! where `K` holds `U(|sᵢ - sⱼ|)`, `P` rows are `[1, x, y, z]` of each source
//! landmark and `v` holds the destination coordinates. The three right-hand
//! sides (x, y, z) share one SVD.

use nalgebra::{DMatrix, Point3, Vector3};
use tracing::debug;

use crate::coefficients::{normalize_or, radial_basis, TpsCoefficients, TpsTerm};
use crate::error::{TpsError, TpsResult};

/// Singular values below this are treated as zero during the solve.
const SVD_EPSILON: f64 = 1e-10;

/// A source landmark and where it should end up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Location in the source configuration.
    pub source: Point3<f64>,
    /// Location in the destination configuration.
    pub destination: Point3<f64>,
}

impl Correspondence {
    /// Creates a correspondence.
    #[must_use]
    pub const fn new(source: Point3<f64>, destination: Point3<f64>) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Everything the solver needs: paired landmarks plus affine toggles.
///
/// Each toggle is independent; disabling one does not affect the others.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ThinPlateSplineInputs {
    /// Paired landmarks.
    pub landmarks: Vec<Correspondence>,
    /// Keep the affine translation (`a1`).
    pub apply_affine_translation: bool,
    /// Keep the scale held in the affine basis.
    pub apply_affine_scale: bool,
    /// Keep the rotation held in the affine basis.
    pub apply_affine_rotation: bool,
    /// Keep the non-affine (radial) terms.
    pub apply_non_affine_warp: bool,
}

impl ThinPlateSplineInputs {
    /// Creates inputs with every component enabled.
    #[must_use]
    pub const fn new(landmarks: Vec<Correspondence>) -> Self {
        Self {
            landmarks,
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
        }
    }
}

/// Solves the TPS coefficients for `inputs`.
///
/// After the solve the toggles are applied in order: translation, scale,
/// rotation, non-affine.
///
/// # Errors
///
/// Returns [`TpsError::InsufficientLandmarks`] for an empty landmark list and
/// [`TpsError::DegenerateSystem`] if the system cannot be solved.
///
/// # Example
///
/// ```
/// use mesh_tps::{solve_coefficients, warp_point, Correspondence, ThinPlateSplineInputs};
/// use nalgebra::Point3;
///
/// let landmarks = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// ]
/// .into_iter()
/// .map(|p| Correspondence::new(p, p * 2.0))
/// .collect();
///
/// let coefficients = solve_coefficients(&ThinPlateSplineInputs::new(landmarks)).unwrap();
/// let warped = warp_point(&coefficients, &Point3::new(0.5, 0.5, 0.5), 1.0);
/// assert!((warped - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-9);
/// ```
pub fn solve_coefficients(inputs: &ThinPlateSplineInputs) -> TpsResult<TpsCoefficients> {
    let landmarks = &inputs.landmarks;
    if landmarks.is_empty() {
        return Err(TpsError::InsufficientLandmarks {
            required: 1,
            provided: 0,
        });
    }

    let n = landmarks.len();
    let size = n + 4;

    let mut matrix = DMatrix::<f64>::zeros(size, size);
    for (i, li) in landmarks.iter().enumerate() {
        for (j, lj) in landmarks.iter().enumerate() {
            matrix[(i, j)] = radial_basis(&li.source, &lj.source);
        }

        let p = &li.source;
        for (k, value) in [1.0, p.x, p.y, p.z].into_iter().enumerate() {
            matrix[(i, n + k)] = value;
            matrix[(n + k, i)] = value;
        }
    }

    let mut rhs = DMatrix::<f64>::zeros(size, 3);
    for (i, landmark) in landmarks.iter().enumerate() {
        rhs[(i, 0)] = landmark.destination.x;
        rhs[(i, 1)] = landmark.destination.y;
        rhs[(i, 2)] = landmark.destination.z;
    }

    let svd = matrix.svd(true, true);
    let solution = svd
        .solve(&rhs, SVD_EPSILON)
        .map_err(|e| TpsError::DegenerateSystem(e.to_string()))?;
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(TpsError::DegenerateSystem(
            "solution contains non-finite values".to_string(),
        ));
    }

    let row = |r: usize| Vector3::new(solution[(r, 0)], solution[(r, 1)], solution[(r, 2)]);
    let mut coefficients = TpsCoefficients {
        a1: row(n),
        a2: row(n + 1),
        a3: row(n + 2),
        a4: row(n + 3),
        weights: landmarks
            .iter()
            .enumerate()
            .map(|(i, landmark)| TpsTerm {
                control_point: landmark.source,
                weight: row(i),
            })
            .collect(),
    };

    if !inputs.apply_affine_translation {
        coefficients.a1 = Vector3::zeros();
    }
    if !inputs.apply_affine_scale {
        coefficients.a2 = normalize_or(&coefficients.a2, Vector3::x());
        coefficients.a3 = normalize_or(&coefficients.a3, Vector3::y());
        coefficients.a4 = normalize_or(&coefficients.a4, Vector3::z());
    }
    if !inputs.apply_affine_rotation {
        coefficients.a2 = Vector3::new(coefficients.a2.norm(), 0.0, 0.0);
        coefficients.a3 = Vector3::new(0.0, coefficients.a3.norm(), 0.0);
        coefficients.a4 = Vector3::new(0.0, 0.0, coefficients.a4.norm());
    }
    if !inputs.apply_non_affine_warp {
        coefficients.weights.clear();
    }

    debug!(landmarks = n, "Solved TPS coefficients");
    Ok(coefficients)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn tetrahedron_plus_one() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.7, 0.4, 0.9),
        ]
    }

    fn bumped_inputs() -> ThinPlateSplineInputs {
        let mut landmarks: Vec<_> = tetrahedron_plus_one()
            .into_iter()
            .map(|p| Correspondence::new(p, p))
            .collect();
        landmarks[4].destination.z += 0.3;
        ThinPlateSplineInputs::new(landmarks)
    }

    #[test]
    fn empty_landmarks_are_rejected() {
        let result = solve_coefficients(&ThinPlateSplineInputs::new(Vec::new()));
        assert!(matches!(
            result,
            Err(TpsError::InsufficientLandmarks {
                required: 1,
                provided: 0
            })
        ));
    }

    #[test]
    fn affine_correspondence_is_reproduced_everywhere() {
        let a = Matrix3::new(2.0, 0.1, 0.0, 0.0, 1.5, 0.0, 0.2, 0.0, 0.8);
        let b = Vector3::new(0.5, -1.0, 2.0);
        let landmarks = tetrahedron_plus_one()
            .into_iter()
            .map(|p| Correspondence::new(p, Point3::from(a * p.coords + b)))
            .collect();

        let coefficients = solve_coefficients(&ThinPlateSplineInputs::new(landmarks)).unwrap();

        for p in [Point3::new(3.0, -2.0, 0.5), Point3::new(-0.25, 0.1, 4.0)] {
            let expected = Point3::from(a * p.coords + b);
            assert_relative_eq!(coefficients.evaluate(&p), expected, epsilon = 1e-8);
        }
        for term in &coefficients.weights {
            assert!(term.weight.norm() < 1e-8);
        }
    }

    #[test]
    fn interpolates_landmarks_exactly() {
        let inputs = bumped_inputs();
        let coefficients = solve_coefficients(&inputs).unwrap();
        assert_eq!(coefficients.weights.len(), inputs.landmarks.len());
        for landmark in &inputs.landmarks {
            assert_relative_eq!(
                coefficients.evaluate(&landmark.source),
                landmark.destination,
                epsilon = 1e-8
            );
        }
    }

    #[test]
    fn disabling_translation_zeroes_a1_only() {
        let mut inputs = bumped_inputs();
        for landmark in &mut inputs.landmarks {
            landmark.destination += Vector3::new(5.0, 0.0, 0.0);
        }
        let full = solve_coefficients(&inputs).unwrap();
        inputs.apply_affine_translation = false;
        let without = solve_coefficients(&inputs).unwrap();

        assert_eq!(without.a1, Vector3::zeros());
        assert_eq!(without.a2, full.a2);
        assert_eq!(without.weights, full.weights);
    }

    #[test]
    fn disabling_scale_normalizes_basis() {
        let landmarks = tetrahedron_plus_one()
            .into_iter()
            .map(|p| Correspondence::new(p, p * 3.0))
            .collect();
        let mut inputs = ThinPlateSplineInputs::new(landmarks);
        inputs.apply_affine_scale = false;

        let coefficients = solve_coefficients(&inputs).unwrap();
        assert_relative_eq!(coefficients.a2.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(coefficients.a3.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(coefficients.a4.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn disabling_rotation_keeps_axis_aligned_lengths() {
        let rotation = nalgebra::Rotation3::from_axis_angle(&Vector3::y_axis(), 0.4);
        let landmarks = tetrahedron_plus_one()
            .into_iter()
            .map(|p| Correspondence::new(p, rotation * p * 2.0))
            .collect();
        let mut inputs = ThinPlateSplineInputs::new(landmarks);
        inputs.apply_affine_rotation = false;

        let coefficients = solve_coefficients(&inputs).unwrap();
        assert_relative_eq!(coefficients.a2, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-8);
        assert_relative_eq!(coefficients.a3, Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-8);
        assert_relative_eq!(coefficients.a4, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-8);
    }

    #[test]
    fn disabling_non_affine_clears_weights() {
        let mut inputs = bumped_inputs();
        inputs.apply_non_affine_warp = false;
        let coefficients = solve_coefficients(&inputs).unwrap();
        assert!(coefficients.weights.is_empty());
    }

    #[test]
    fn solve_is_deterministic() {
        let inputs = bumped_inputs();
        assert_eq!(
            solve_coefficients(&inputs).unwrap(),
            solve_coefficients(&inputs).unwrap()
        );
    }
}
