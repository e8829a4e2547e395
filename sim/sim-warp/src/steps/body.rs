//! Steps that scale bodies directly, without landmarks.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_model::{Body, BodyScale, Model};

use super::{PropertyValue, StepOperation, StepType};
use crate::cache::ScalingCache;
use crate::error::WarpResult;
use crate::parameters::{ParameterDeclaration, ScalingParameters, BLENDING_FACTOR, SUBJECT_MASS};
use crate::validation::StepValidationMessage;

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Scales every body's mass so the model weighs `subject_mass`.
///
/// Each body keeps its share of the total. With a blending factor below
/// one the target lies between the model's mass and the subject's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMassStep {}

impl StepOperation for SubjectMassStep {
    fn declarations(&self) -> Vec<ParameterDeclaration> {
        vec![
            ParameterDeclaration::new(BLENDING_FACTOR, 1.0),
            ParameterDeclaration::new(SUBJECT_MASS, 75.0),
        ]
    }

    fn validate(
        &self,
        _cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        let mut messages = Vec::new();
        if parameters.get(SUBJECT_MASS).unwrap_or(0.0) <= 0.0 {
            messages.push(StepValidationMessage::error(
                "The subject_mass scaling parameter must be greater than zero",
            ));
        }
        if source.total_mass() <= 0.0 {
            messages.push(StepValidationMessage::error(
                "Cannot scale the model's mass to the subject's mass because the model itself has a mass of zero",
            ));
        }
        messages
    }

    fn apply(
        &self,
        _cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        _source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        let subject_mass = parameters.require(SUBJECT_MASS)?;
        let blend = parameters.require(BLENDING_FACTOR)?;
        let target = lerp(result.total_mass(), subject_mass, blend);
        result.scale_mass_preserving_distribution(target)?;
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn set_property(&mut self, name: &str, _value: PropertyValue) -> WarpResult<()> {
        Err(StepType::SubjectMass.unknown_property(name))
    }
}

/// Scales the listed bodies by fixed per-axis factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualBodyScaleStep {
    /// Absolute paths of bodies.
    pub bodies: Vec<String>,
    /// Scale along each body axis, blended toward one by the blending factor.
    pub scale_factors: Vector3<f64>,
    /// Keep body masses unchanged instead of scaling them with volume.
    pub preserve_masses: bool,
}

impl Default for ManualBodyScaleStep {
    fn default() -> Self {
        Self {
            bodies: Vec::new(),
            scale_factors: Vector3::repeat(1.0),
            preserve_masses: false,
        }
    }
}

impl StepOperation for ManualBodyScaleStep {
    fn declarations(&self) -> Vec<ParameterDeclaration> {
        vec![ParameterDeclaration::new(BLENDING_FACTOR, 1.0)]
    }

    fn validate(
        &self,
        _cache: &mut ScalingCache,
        _parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        self.bodies
            .iter()
            .filter(|path| source.find_as::<Body>(path).is_err())
            .map(|path| {
                StepValidationMessage::property_error(
                    "bodies",
                    format!(
                        "{path}: Cannot find a `Body` in 'bodies' in the source model (or it isn't a `Body`)."
                    ),
                )
            })
            .collect()
    }

    fn apply(
        &self,
        _cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        _source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        let blend = parameters.require(BLENDING_FACTOR)?;
        let factors = self.scale_factors.map(|f| lerp(1.0, f, blend));
        let scales: Vec<BodyScale> = self
            .bodies
            .iter()
            .map(|body| BodyScale::new(body.clone(), factors))
            .collect();
        result.scale_bodies(&scales, self.preserve_masses)?;
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        vec!["bodies", "scale_factors", "preserve_masses"]
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "bodies" => self.bodies = value.into_text_list(name)?,
            "scale_factors" => self.scale_factors = value.into_vec3(name)?,
            "preserve_masses" => self.preserve_masses = value.into_bool(name)?,
            _ => return Err(StepType::ManualBodyScale.unknown_property(name)),
        }
        Ok(())
    }
}
