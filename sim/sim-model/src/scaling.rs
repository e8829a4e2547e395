//! Whole-model mass scaling and per-body geometric scaling.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use tracing::info;

use crate::component::{Body, Component, ComponentKind};
use crate::error::{ModelError, Result};
use crate::model::Model;

/// A per-axis scale to apply to one body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyScale {
    /// Absolute path of the body.
    pub body: String,
    /// Scale along the body's X, Y and Z axes.
    pub factors: Vector3<f64>,
}

impl BodyScale {
    /// Creates a body scale.
    #[must_use]
    pub fn new(body: impl Into<String>, factors: Vector3<f64>) -> Self {
        Self {
            body: body.into(),
            factors,
        }
    }
}

fn scale_point(p: &Point3<f64>, factors: &Vector3<f64>) -> Point3<f64> {
    Point3::from(p.coords.component_mul(factors))
}

impl Model {
    /// Sum of all body masses.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.iter_components()
            .filter_map(|(_, c)| match &c.kind {
                ComponentKind::Body(body) => Some(body.mass),
                _ => None,
            })
            .sum()
    }

    /// Rescales every body so the total mass becomes `target`.
    ///
    /// Each body keeps its share of the total; inertias scale with mass.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ZeroMass`] if the model has no mass to scale.
    pub fn scale_mass_preserving_distribution(&mut self, target: f64) -> Result<()> {
        let total = self.total_mass();
        if total <= 0.0 {
            return Err(ModelError::ZeroMass);
        }
        let ratio = target / total;
        self.visit_components_mut(&mut |_: &str, component: &mut Component| {
            if let ComponentKind::Body(body) = &mut component.kind {
                body.mass *= ratio;
                body.inertia *= ratio;
            }
        });
        info!(from = total, to = target, "Scaled model mass");
        Ok(())
    }

    /// Scales bodies along their own axes.
    ///
    /// Each body's mass center and inertia are scaled, and so is its mass
    /// (by the product of the factors) unless `preserve_masses` is set.
    /// Components attached directly to a scaled body follow it: station and
    /// path point locations, offset frame translations, mesh scale factors,
    /// and wrap cylinder translation, radius (by the mean of the X and Y
    /// factors) and length (by the Z factor).
    ///
    /// # Errors
    ///
    /// Returns an error if any path is not a body. Nothing is changed in
    /// that case.
    pub fn scale_bodies(&mut self, scales: &[BodyScale], preserve_masses: bool) -> Result<()> {
        for scale in scales {
            self.find_as::<Body>(&scale.body)?;
        }
        let factors: HashMap<&str, Vector3<f64>> = scales
            .iter()
            .map(|scale| (scale.body.as_str(), scale.factors))
            .collect();

        self.visit_components_mut(&mut |path: &str, component: &mut Component| match &mut component.kind {
            ComponentKind::Body(body) => {
                if let Some(f) = factors.get(path) {
                    let mass_ratio = if preserve_masses { 1.0 } else { f.x * f.y * f.z };
                    body.mass *= mass_ratio;
                    body.mass_center = body.mass_center.component_mul(f);
                    body.inertia = Vector3::new(
                        body.inertia.x * mass_ratio * 0.5 * (f.y * f.y + f.z * f.z),
                        body.inertia.y * mass_ratio * 0.5 * (f.x * f.x + f.z * f.z),
                        body.inertia.z * mass_ratio * 0.5 * (f.x * f.x + f.y * f.y),
                    );
                }
            }
            ComponentKind::Station(station) => {
                if let Some(f) = factors.get(station.parent_frame.as_str()) {
                    station.location = scale_point(&station.location, f);
                }
            }
            ComponentKind::PathPoint(point) => {
                if let Some(f) = factors.get(point.parent_frame.as_str()) {
                    point.location = scale_point(&point.location, f);
                }
            }
            ComponentKind::OffsetFrame(frame) => {
                if let Some(f) = factors.get(frame.parent.as_str()) {
                    frame.translation = frame.translation.component_mul(f);
                }
            }
            ComponentKind::Mesh(mesh) => {
                if let Some(f) = factors.get(mesh.frame.as_str()) {
                    mesh.scale_factors = mesh.scale_factors.component_mul(f);
                }
            }
            ComponentKind::WrapCylinder(cylinder) => {
                if let Some(f) = factors.get(cylinder.frame.as_str()) {
                    cylinder.translation = cylinder.translation.component_mul(f);
                    cylinder.radius *= 0.5 * (f.x + f.y);
                    cylinder.length *= f.z;
                }
            }
            ComponentKind::Ground | ComponentKind::Group | ComponentKind::Joint(_) => {}
        });

        info!(bodies = scales.len(), preserve_masses, "Scaled bodies");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::component::{Joint, Mesh, OffsetFrame, Station, WrapCylinder};
    use approx::assert_relative_eq;

    fn arm() -> Model {
        let mut model = Model::new("arm");
        model
            .add_component("/", Component::new("humerus", Body::new(2.0).into()))
            .unwrap();
        model
            .add_component("/", Component::new("radius", Body::new(1.0).into()))
            .unwrap();
        model
            .add_component("/", Component::new("shoulder", Joint::new("/ground", "/humerus").into()))
            .unwrap();
        model
            .add_component(
                "/humerus",
                Component::new("elbow_marker", Station::new("/humerus", Point3::new(0.1, -0.3, 0.0)).into()),
            )
            .unwrap();
        model
            .add_component(
                "/humerus",
                Component::new("elbow_offset", OffsetFrame::new("/humerus", Vector3::new(0.0, -0.3, 0.0)).into()),
            )
            .unwrap();
        model
            .add_component(
                "/humerus",
                Component::new("geom", Mesh::from_file("/humerus", "humerus.stl").into()),
            )
            .unwrap();
        let mut cylinder = WrapCylinder::new("/humerus", 0.02, 0.1);
        cylinder.translation = Vector3::new(0.0, -0.28, 0.01);
        model
            .add_component("/humerus", Component::new("elbow_wrap", cylinder.into()))
            .unwrap();
        model.finalize().unwrap();
        model
    }

    #[test]
    fn mass_rescale_preserves_distribution() {
        let mut model = arm();
        model.scale_mass_preserving_distribution(6.0).unwrap();
        assert_relative_eq!(model.total_mass(), 6.0);
        assert_relative_eq!(model.find_as::<Body>("/humerus").unwrap().mass, 4.0);
        assert_relative_eq!(model.find_as::<Body>("/radius").unwrap().mass, 2.0);
    }

    #[test]
    fn zero_mass_model_cannot_be_rescaled() {
        let mut model = Model::new("massless");
        assert!(matches!(
            model.scale_mass_preserving_distribution(70.0),
            Err(ModelError::ZeroMass)
        ));
    }

    #[test]
    fn scaling_a_body_moves_attached_components() {
        let mut model = arm();
        let factors = Vector3::new(2.0, 1.5, 1.0);
        model
            .scale_bodies(&[BodyScale::new("/humerus", factors)], false)
            .unwrap();

        assert_relative_eq!(model.find_as::<Body>("/humerus").unwrap().mass, 6.0);
        assert_relative_eq!(
            model.find_as::<Station>("/humerus/elbow_marker").unwrap().location,
            Point3::new(0.2, -0.45, 0.0)
        );
        assert_relative_eq!(
            model.find_as::<OffsetFrame>("/humerus/elbow_offset").unwrap().translation,
            Vector3::new(0.0, -0.45, 0.0)
        );
        assert_eq!(
            model.find_as::<Mesh>("/humerus/geom").unwrap().scale_factors,
            factors
        );
        let cylinder = model.find_as::<WrapCylinder>("/humerus/elbow_wrap").unwrap();
        assert_relative_eq!(cylinder.radius, 0.035);
        assert_relative_eq!(cylinder.length, 0.1);
        assert_relative_eq!(cylinder.translation, Vector3::new(0.0, -0.42, 0.01));

        // the other body is untouched
        assert_eq!(model.find_as::<Body>("/radius").unwrap().mass, 1.0);
        assert!(!model.is_finalized());
    }

    #[test]
    fn preserve_masses_keeps_mass() {
        let mut model = arm();
        model
            .scale_bodies(&[BodyScale::new("/humerus", Vector3::repeat(2.0))], true)
            .unwrap();
        let body = model.find_as::<Body>("/humerus").unwrap();
        assert_eq!(body.mass, 2.0);
        assert_relative_eq!(body.inertia, Vector3::repeat(4.0));
    }

    #[test]
    fn unknown_body_changes_nothing() {
        let mut model = arm();
        let before = model.components().to_vec();
        let result = model.scale_bodies(
            &[
                BodyScale::new("/humerus", Vector3::repeat(2.0)),
                BodyScale::new("/humerus/geom", Vector3::repeat(2.0)),
            ],
            false,
        );
        assert!(matches!(result, Err(ModelError::WrongComponentType { .. })));
        assert_eq!(model.components(), before.as_slice());
    }
}
