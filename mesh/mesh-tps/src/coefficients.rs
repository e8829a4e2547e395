//! Solved TPS coefficients and their evaluation.

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// The radial basis function `U(r) = |r|`.
///
/// This is the 3D biharmonic kernel. The classic `r² log r` kernel is the
/// 2D form.
#[must_use]
pub fn radial_basis(control_point: &Point3<f64>, p: &Point3<f64>) -> f64 {
    (control_point - p).norm()
}

/// One non-affine term: a weight applied to `U(|control_point - p|)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpsTerm {
    /// Source landmark location the term is centered on.
    pub control_point: Point3<f64>,
    /// Per-axis weight of the term.
    pub weight: Vector3<f64>,
}

/// Solved thin-plate spline coefficients.
///
/// The warp is `f(p) = a1 + a2*x + a3*y + a4*z + Σ wᵢ U(|cᵢ - p|)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TpsCoefficients {
    /// Affine translation.
    pub a1: Vector3<f64>,
    /// Affine basis column multiplied by `p.x`.
    pub a2: Vector3<f64>,
    /// Affine basis column multiplied by `p.y`.
    pub a3: Vector3<f64>,
    /// Affine basis column multiplied by `p.z`.
    pub a4: Vector3<f64>,
    /// Non-affine terms, one per landmark.
    pub weights: Vec<TpsTerm>,
}

impl Default for TpsCoefficients {
    fn default() -> Self {
        Self::identity()
    }
}

impl TpsCoefficients {
    /// Coefficients that map every point onto itself.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            a1: Vector3::zeros(),
            a2: Vector3::x(),
            a3: Vector3::y(),
            a4: Vector3::z(),
            weights: Vec::new(),
        }
    }

    /// The affine basis as a matrix with columns `a2`, `a3`, `a4`.
    #[must_use]
    pub fn affine_basis(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.a2, self.a3, self.a4])
    }

    /// Evaluates the full (unblended) warp at `p`.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_tps::TpsCoefficients;
    /// use nalgebra::Point3;
    ///
    /// let p = Point3::new(1.0, 2.0, 3.0);
    /// assert_eq!(TpsCoefficients::identity().evaluate(&p), p);
    /// ```
    #[must_use]
    pub fn evaluate(&self, p: &Point3<f64>) -> Point3<f64> {
        let mut out = self.a1 + self.a2 * p.x + self.a3 * p.y + self.a4 * p.z;
        for term in &self.weights {
            out += term.weight * radial_basis(&term.control_point, p);
        }
        Point3::from(out)
    }
}

/// Normalizes `v`, falling back to `axis` when `v` has no usable length.
pub(crate) fn normalize_or(v: &Vector3<f64>, axis: Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(f64::EPSILON).unwrap_or(axis)
}

/// Extracts the rigid part of the affine warp.
///
/// The rotation is built from the independently normalized basis columns
/// (re-orthonormalized to the nearest proper rotation) and the translation
/// is `a1`. The non-affine terms are ignored.
///
/// Only meaningful when the coefficients were solved with both affine
/// rotation and affine translation enabled.
#[must_use]
pub fn affine_transform_without_scale(coefficients: &TpsCoefficients) -> Isometry3<f64> {
    let basis = Matrix3::from_columns(&[
        normalize_or(&coefficients.a2, Vector3::x()),
        normalize_or(&coefficients.a3, Vector3::y()),
        normalize_or(&coefficients.a4, Vector3::z()),
    ]);
    let rotation = Rotation3::from_matrix(&basis);
    Isometry3::from_parts(
        Translation3::from(coefficients.a1),
        UnitQuaternion::from_rotation_matrix(&rotation),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radial_basis_is_distance() {
        let u = radial_basis(&Point3::new(1.0, 0.0, 0.0), &Point3::new(1.0, 3.0, 4.0));
        assert_relative_eq!(u, 5.0);
    }

    #[test]
    fn evaluate_includes_non_affine_terms() {
        let mut coefficients = TpsCoefficients::identity();
        coefficients.weights.push(TpsTerm {
            control_point: Point3::origin(),
            weight: Vector3::new(0.0, 0.0, 0.5),
        });
        let warped = coefficients.evaluate(&Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(warped, Point3::new(2.0, 0.0, 1.0));
    }

    #[test]
    fn affine_transform_drops_scale() {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3);
        let scaled = rotation.matrix() * 2.5;
        let coefficients = TpsCoefficients {
            a1: Vector3::new(1.0, -2.0, 0.5),
            a2: scaled.column(0).into_owned(),
            a3: scaled.column(1).into_owned(),
            a4: scaled.column(2).into_owned(),
            weights: Vec::new(),
        };

        let transform = affine_transform_without_scale(&coefficients);
        assert_relative_eq!(transform.translation.vector, coefficients.a1);
        assert_relative_eq!(
            transform.rotation.to_rotation_matrix().into_inner(),
            rotation.into_inner(),
            epsilon = 1e-9
        );
    }
}
