//! Steps that edit wrap cylinders.

use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use sim_model::{
    body_xyz_from_rotation, rotation_from_body_xyz, Model, Station, WrapCylinder,
};
use tracing::debug;

use super::tps::{set_shared_property, shared_property_names, AffineToggles, TpsLandmarks};
use super::{PropertyValue, StepOperation, StepType};
use crate::cache::{ScalingCache, TpsInputs};
use crate::error::{WarpError, WarpResult};
use crate::parameters::{ParameterDeclaration, ScalingParameters};
use crate::validation::StepValidationMessage;

/// Warps the `translation`, `xyz_body_rotation` and `radius` of wrap cylinders.
///
/// Three points are warped in the cylinder's frame: the origin, a point
/// `midline_projection_distance` along the midline, and a point on the
/// surface at angle `surface_projection_theta` from the cylinder's +X axis.
/// The new cylinder is rebuilt from the warped points: +Z runs from the
/// origin to the midline point, +X is the surface direction (made
/// orthogonal to Z) turned back by theta, and the radius is the surface
/// offset projected onto that X axis. With a nonzero theta the radius is
/// therefore scaled by `cos(theta)`. `length` and `quadrant` are left as
/// they are.
///
/// Fails with [`WarpError::Precondition`] when the warp collapses any of
/// the three points onto each other or onto the midline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsWrapCylindersStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Warp components to apply.
    #[serde(flatten)]
    pub toggles: AffineToggles,
    /// Absolute paths of wrap cylinders.
    pub wrap_cylinders: Vec<String>,
    /// How far along the midline (+Z) the direction point is projected.
    pub midline_projection_distance: f64,
    /// Angle (radians, about +Z from +X) of the projected surface point.
    pub surface_projection_theta: f64,
}

impl Default for TpsWrapCylindersStep {
    fn default() -> Self {
        Self {
            tps: TpsLandmarks::default(),
            toggles: AffineToggles::default(),
            wrap_cylinders: Vec::new(),
            midline_projection_distance: 0.001,
            surface_projection_theta: 0.0,
        }
    }
}

impl TpsWrapCylindersStep {
    fn warp_cylinder(
        &self,
        cache: &mut ScalingCache,
        model: &Model,
        path: &str,
        inputs: &TpsInputs,
    ) -> WarpResult<WrapCylinder> {
        let mut cylinder = model.find_as::<WrapCylinder>(path)?.clone();
        let transform = cylinder.transform();
        let theta = self.surface_projection_theta;

        let mut warp = |p: Point3<f64>| {
            cache.lookup_warped_rigid_point(
                model,
                &p,
                &cylinder.frame,
                &self.tps.landmarks_frame,
                inputs,
            )
        };
        let origin = warp(Point3::from(cylinder.translation))?;
        let midline = warp(transform * Point3::new(0.0, 0.0, self.midline_projection_distance))?;
        let surface = warp(
            transform * Point3::new(cylinder.radius * theta.cos(), cylinder.radius * theta.sin(), 0.0),
        )?;

        let Some(z) = (midline - origin).try_normalize(f64::EPSILON) else {
            return Err(WarpError::precondition(format!(
                "{path}: the warped midline point coincides with the warped origin"
            )));
        };
        let to_surface = surface - origin;
        let Some(surface_direction) = to_surface.try_normalize(f64::EPSILON) else {
            return Err(WarpError::precondition(format!(
                "{path}: the warped surface point coincides with the warped origin"
            )));
        };
        let rejection = to_surface - z * z.dot(&to_surface);
        let Some(rejection_direction) = rejection
            .try_normalize(f64::EPSILON)
            .filter(|_| z.dot(&surface_direction) < 1.0 - f64::EPSILON)
        else {
            return Err(WarpError::precondition(format!(
                "{path}: the warped surface point lies on the warped midline, the warping is too strong"
            )));
        };
        // undo theta so X lines up with the cylinder's original +X
        let x = Rotation3::from_axis_angle(&Unit::new_unchecked(z), -theta) * rejection_direction;
        let y = z.cross(&x);
        let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));

        cylinder.translation = origin.coords;
        cylinder.xyz_body_rotation = body_xyz_from_rotation(&rotation);
        cylinder.radius = to_surface.dot(&x);
        Ok(cylinder)
    }
}

impl StepOperation for TpsWrapCylindersStep {
    fn declarations(&self) -> Vec<ParameterDeclaration> {
        TpsLandmarks::declarations()
    }

    fn validate(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        let mut messages = self.tps.validate(source);
        if self.midline_projection_distance <= 0.0 || !self.midline_projection_distance.is_finite() {
            messages.push(StepValidationMessage::property_error(
                "midline_projection_distance",
                "`midline_projection_distance` must be a positive distance.",
            ));
        }
        for path in &self.wrap_cylinders {
            if source.find_as::<WrapCylinder>(path).is_err() {
                messages.push(StepValidationMessage::property_error(
                    "wrap_cylinders",
                    format!(
                        "{path}: Cannot find a `WrapCylinder` in 'wrap_cylinders' in the source model (or it isn't a `WrapCylinder`)."
                    ),
                ));
            }
        }
        messages
    }

    fn apply(
        &self,
        cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        _source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        let inputs = self.tps.inputs(self.toggles, parameters, result)?;
        let warped = self
            .wrap_cylinders
            .iter()
            .map(|path| Ok((path, self.warp_cylinder(cache, result, path, &inputs)?)))
            .collect::<WarpResult<Vec<_>>>()?;
        for (path, cylinder) in warped {
            *result.find_as_mut::<WrapCylinder>(path)? = cylinder;
        }
        result.finalize()?;
        debug!(cylinders = self.wrap_cylinders.len(), "Warped wrap cylinders");
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(
            true,
            &[
                "wrap_cylinders",
                "midline_projection_distance",
                "surface_projection_theta",
            ],
        )
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "wrap_cylinders" => self.wrap_cylinders = value.into_text_list(name)?,
            "midline_projection_distance" => {
                self.midline_projection_distance = value.into_real(name)?;
            }
            "surface_projection_theta" => self.surface_projection_theta = value.into_real(name)?,
            _ => set_shared_property(
                StepType::TpsWrapCylinders,
                &mut self.tps,
                Some(&mut self.toggles),
                name,
                value,
            )?,
        }
        Ok(())
    }
}

fn validate_station_and_cylinder(
    source: &Model,
    station_path: &str,
    wrap_cylinder_path: &str,
) -> Vec<StepValidationMessage> {
    let mut messages = Vec::new();
    if source.find_as::<Station>(station_path).is_err() {
        messages.push(StepValidationMessage::property_error(
            "station_path",
            format!(
                "{station_path}: Cannot find `station_path` in the source model (or it isn't a Station)."
            ),
        ));
    }
    if source.find_as::<WrapCylinder>(wrap_cylinder_path).is_err() {
        messages.push(StepValidationMessage::property_error(
            "wrap_cylinder_path",
            format!(
                "{wrap_cylinder_path}: Cannot find 'wrap_cylinder_path' in the source model (or it isn't a `WrapCylinder`)."
            ),
        ));
    }
    messages
}

/// The station's location in the cylinder's own space.
fn station_in_cylinder(
    model: &Model,
    station_path: &str,
    wrap_cylinder_path: &str,
) -> WarpResult<Point3<f64>> {
    let cylinder = model.find_as::<WrapCylinder>(wrap_cylinder_path)?;
    let cylinder_to_ground = model.frame_transform_in_ground(&cylinder.frame)? * cylinder.transform();
    let station = model.station_location_in_ground(station_path)?;
    Ok(cylinder_to_ground.inverse_transform_point(&station))
}

fn set_station_property(
    step_type: StepType,
    station_path: &mut String,
    wrap_cylinder_path: &mut String,
    name: &str,
    value: PropertyValue,
) -> WarpResult<()> {
    match name {
        "station_path" => *station_path = value.into_text(name)?,
        "wrap_cylinder_path" => *wrap_cylinder_path = value.into_text(name)?,
        _ => return Err(step_type.unknown_property(name)),
    }
    Ok(())
}

/// Sets a cylinder's radius to the distance from a station to its midline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapCylinderRadiusFromStationStep {
    /// Absolute path of the station.
    pub station_path: String,
    /// Absolute path of the wrap cylinder to edit.
    pub wrap_cylinder_path: String,
}

impl StepOperation for WrapCylinderRadiusFromStationStep {
    fn validate(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        validate_station_and_cylinder(source, &self.station_path, &self.wrap_cylinder_path)
    }

    fn apply(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        _source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        let p = station_in_cylinder(result, &self.station_path, &self.wrap_cylinder_path)?;
        // the midline is the cylinder's Z axis, so only XY matters
        let radius = p.x.hypot(p.y);
        result
            .find_as_mut::<WrapCylinder>(&self.wrap_cylinder_path)?
            .radius = radius;
        result.finalize()?;
        debug!(cylinder = %self.wrap_cylinder_path, radius, "Recalculated wrap cylinder radius");
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        vec!["station_path", "wrap_cylinder_path"]
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        set_station_property(
            StepType::WrapCylinderRadiusFromStation,
            &mut self.station_path,
            &mut self.wrap_cylinder_path,
            name,
            value,
        )
    }
}

/// Reorients a cylinder so its +Z midline points toward a station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapCylinderRotationFromStationStep {
    /// Absolute path of the station.
    pub station_path: String,
    /// Absolute path of the wrap cylinder to edit.
    pub wrap_cylinder_path: String,
}

impl StepOperation for WrapCylinderRotationFromStationStep {
    fn validate(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        validate_station_and_cylinder(source, &self.station_path, &self.wrap_cylinder_path)
    }

    fn apply(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        _source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        let p = station_in_cylinder(result, &self.station_path, &self.wrap_cylinder_path)?;
        let Some(direction) = p.coords.try_normalize(f64::EPSILON) else {
            return Err(WarpError::precondition(format!(
                "{}: the station is at the origin of '{}', so no direction can be computed",
                self.station_path, self.wrap_cylinder_path
            )));
        };
        let z = Vector3::z();
        let cos_angle = z.dot(&direction);
        if cos_angle.abs() >= 1.0 - f64::EPSILON {
            return Ok(());
        }
        let axis = Unit::new_normalize(z.cross(&direction));
        let extra = Rotation3::from_axis_angle(&axis, cos_angle.acos());

        let cylinder = result.find_as_mut::<WrapCylinder>(&self.wrap_cylinder_path)?;
        let rotation = rotation_from_body_xyz(&cylinder.xyz_body_rotation) * extra;
        cylinder.xyz_body_rotation = body_xyz_from_rotation(&rotation);
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        vec!["station_path", "wrap_cylinder_path"]
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        set_station_property(
            StepType::WrapCylinderRotationFromStation,
            &mut self.station_path,
            &mut self.wrap_cylinder_path,
            name,
            value,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::fixtures::{arm, DOUBLED_LANDMARKS, SOURCE_LANDMARKS};
    use crate::parameters::BLENDING_FACTOR;
    use approx::assert_relative_eq;
    use sim_model::{Component, ComponentKind};
    use std::f64::consts::FRAC_PI_3;

    const WRAP: &str = "/bodyset/humerus/elbow_wrap";

    fn doubling() -> TpsWrapCylindersStep {
        TpsWrapCylindersStep {
            tps: TpsLandmarks {
                source_landmarks_file: SOURCE_LANDMARKS.to_string(),
                destination_landmarks_file: DOUBLED_LANDMARKS.to_string(),
                ..TpsLandmarks::default()
            },
            wrap_cylinders: vec![WRAP.to_string()],
            ..TpsWrapCylindersStep::default()
        }
    }

    fn params() -> ScalingParameters {
        let mut params = ScalingParameters::new();
        params.set(BLENDING_FACTOR, 1.0);
        params
    }

    fn with_station(model: &mut Model, name: &str, location: Point3<f64>) -> String {
        let path = model
            .add_component(
                "/bodyset/humerus",
                Component::new(
                    name,
                    ComponentKind::Station(Station::new("/bodyset/humerus", location)),
                ),
            )
            .unwrap();
        model.finalize().unwrap();
        path
    }

    #[test]
    fn projection_defaults() {
        let step = TpsWrapCylindersStep::default();
        assert_eq!(step.midline_projection_distance, 0.001);
        assert_eq!(step.surface_projection_theta, 0.0);
    }

    #[test]
    fn doubling_moves_origin_and_radius() {
        let (_dir, source) = arm();
        let mut result = source.clone();
        doubling()
            .apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap();
        let cylinder = result.find_as::<WrapCylinder>(WRAP).unwrap();
        assert_relative_eq!(cylinder.translation, Vector3::new(0.0, -0.6, 0.0), epsilon = 1e-9);
        assert_relative_eq!(cylinder.radius, 0.04, epsilon = 1e-9);
        assert_relative_eq!(cylinder.xyz_body_rotation, Vector3::zeros(), epsilon = 1e-9);
        assert_eq!(cylinder.length, 0.1);
        assert_eq!(cylinder.quadrant, "all");
    }

    #[test]
    fn surface_angle_does_not_rotate_the_cylinder() {
        let (_dir, source) = arm();
        let mut result = source.clone();
        let mut step = doubling();
        step.surface_projection_theta = FRAC_PI_3;
        step.apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap();
        let cylinder = result.find_as::<WrapCylinder>(WRAP).unwrap();
        // surface offset projected onto the new X axis
        assert_relative_eq!(cylinder.radius, 0.04 * FRAC_PI_3.cos(), epsilon = 1e-9);
        assert_relative_eq!(cylinder.xyz_body_rotation, Vector3::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn zero_midline_distance_is_rejected() {
        let (_dir, source) = arm();
        let mut step = doubling();
        step.midline_projection_distance = 0.0;
        let messages = step.validate(&mut ScalingCache::new(), &params(), &source);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].property_name.as_deref(),
            Some("midline_projection_distance")
        );

        let mut result = source.clone();
        let err = step
            .apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap_err();
        assert!(matches!(err, WarpError::Precondition(_)));
        let cylinder = result.find_as::<WrapCylinder>(WRAP).unwrap();
        assert!(cylinder.radius.is_finite());
        assert!(cylinder.xyz_body_rotation.iter().all(|a| a.is_finite()));
    }

    #[test]
    fn missing_cylinder_is_reported() {
        let (_dir, model) = arm();
        let mut step = doubling();
        step.wrap_cylinders = vec!["/bodyset/humerus/elbow".to_string()];
        let messages = step.validate(&mut ScalingCache::new(), &params(), &model);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].message,
            "/bodyset/humerus/elbow: Cannot find a `WrapCylinder` in 'wrap_cylinders' in the source model (or it isn't a `WrapCylinder`)."
        );
    }

    #[test]
    fn radius_is_distance_to_midline() {
        let (_dir, mut source) = arm();
        let station = with_station(&mut source, "epicondyle", Point3::new(0.1, -0.3, 0.05));
        let step = WrapCylinderRadiusFromStationStep {
            station_path: station,
            wrap_cylinder_path: WRAP.to_string(),
        };
        assert!(step
            .validate(&mut ScalingCache::new(), &params(), &source)
            .is_empty());

        let mut result = source.clone();
        step.apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap();
        let cylinder = result.find_as::<WrapCylinder>(WRAP).unwrap();
        assert_relative_eq!(cylinder.radius, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn station_steps_report_both_paths() {
        let (_dir, model) = arm();
        let step = WrapCylinderRotationFromStationStep {
            station_path: "/bodyset/humerus/biceps_origin".to_string(),
            wrap_cylinder_path: String::new(),
        };
        let messages = step.validate(&mut ScalingCache::new(), &params(), &model);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].message,
            "/bodyset/humerus/biceps_origin: Cannot find `station_path` in the source model (or it isn't a Station)."
        );
        assert_eq!(messages[1].property_name.as_deref(), Some("wrap_cylinder_path"));
    }

    #[test]
    fn rotation_points_midline_at_station() {
        let (_dir, mut source) = arm();
        let station = with_station(&mut source, "epicondyle", Point3::new(0.1, -0.3, 0.0));
        let step = WrapCylinderRotationFromStationStep {
            station_path: station,
            wrap_cylinder_path: WRAP.to_string(),
        };
        let mut result = source.clone();
        step.apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap();
        let cylinder = result.find_as::<WrapCylinder>(WRAP).unwrap();
        let midline = cylinder.transform().rotation * Vector3::z();
        assert_relative_eq!(midline, Vector3::x(), epsilon = 1e-9);
        assert_relative_eq!(cylinder.translation, Vector3::new(0.0, -0.3, 0.0));
    }

    #[test]
    fn rotation_is_unchanged_for_station_on_midline() {
        let (_dir, mut source) = arm();
        let station = with_station(&mut source, "above", Point3::new(0.0, -0.3, 0.2));
        let step = WrapCylinderRotationFromStationStep {
            station_path: station,
            wrap_cylinder_path: WRAP.to_string(),
        };
        let mut result = source.clone();
        step.apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap();
        let before = source.find_as::<WrapCylinder>(WRAP).unwrap();
        let after = result.find_as::<WrapCylinder>(WRAP).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn station_at_cylinder_origin_fails() {
        let (_dir, source) = arm();
        let step = WrapCylinderRotationFromStationStep {
            station_path: "/bodyset/humerus/elbow".to_string(),
            wrap_cylinder_path: WRAP.to_string(),
        };
        let mut result = source.clone();
        let err = step
            .apply(&mut ScalingCache::new(), &params(), &source, &mut result)
            .unwrap_err();
        assert!(matches!(err, WarpError::Precondition(_)));
    }
}
