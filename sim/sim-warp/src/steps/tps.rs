//! Properties shared by the TPS-based steps.

use std::path::{Path, PathBuf};

use mesh_landmarks::read_landmarks_csv;
use serde::{Deserialize, Serialize};
use sim_model::Model;

use super::{PropertyValue, StepType};
use crate::cache::TpsInputs;
use crate::error::{WarpError, WarpResult};
use crate::parameters::{ParameterDeclaration, ScalingParameters, BLENDING_FACTOR};
use crate::validation::StepValidationMessage;

/// Landmark inputs for a TPS step.
///
/// Landmark files are resolved relative to the source model's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsLandmarks {
    /// CSV of landmarks on the source model.
    pub source_landmarks_file: String,
    /// CSV of the corresponding landmarks on the subject.
    pub destination_landmarks_file: String,
    /// Frame the landmarks are expressed in.
    pub landmarks_frame: String,
    /// Factor applied to every source landmark (e.g. `0.001` for mm to m).
    pub source_landmarks_prescale: f64,
    /// Factor applied to every destination landmark.
    pub destination_landmarks_prescale: f64,
}

impl Default for TpsLandmarks {
    fn default() -> Self {
        Self {
            source_landmarks_file: String::new(),
            destination_landmarks_file: String::new(),
            landmarks_frame: "/ground".to_string(),
            source_landmarks_prescale: 1.0,
            destination_landmarks_prescale: 1.0,
        }
    }
}

impl TpsLandmarks {
    pub(crate) const PROPERTY_NAMES: [&'static str; 5] = [
        "source_landmarks_file",
        "destination_landmarks_file",
        "landmarks_frame",
        "source_landmarks_prescale",
        "destination_landmarks_prescale",
    ];

    pub(crate) fn declarations() -> Vec<ParameterDeclaration> {
        vec![ParameterDeclaration::new(BLENDING_FACTOR, 1.0)]
    }

    pub(crate) fn set_property(
        &mut self,
        step_type: StepType,
        name: &str,
        value: PropertyValue,
    ) -> WarpResult<()> {
        match name {
            "source_landmarks_file" => self.source_landmarks_file = value.into_text(name)?,
            "destination_landmarks_file" => self.destination_landmarks_file = value.into_text(name)?,
            "landmarks_frame" => self.landmarks_frame = value.into_text(name)?,
            "source_landmarks_prescale" => self.source_landmarks_prescale = value.into_real(name)?,
            "destination_landmarks_prescale" => {
                self.destination_landmarks_prescale = value.into_real(name)?;
            }
            _ => return Err(step_type.unknown_property(name)),
        }
        Ok(())
    }

    /// Checks the landmark files and frame against `source`.
    ///
    /// Without a model location the landmark paths cannot be resolved, so
    /// that is reported alone.
    pub(crate) fn validate(&self, source: &Model) -> Vec<StepValidationMessage> {
        let Some(model_dir) = source.model_dir() else {
            return vec![StepValidationMessage::error(
                "The source model has no filesystem location.",
            )];
        };

        let mut messages = Vec::new();
        for (property, file, side) in [
            ("source_landmarks_file", &self.source_landmarks_file, "source"),
            (
                "destination_landmarks_file",
                &self.destination_landmarks_file,
                "destination",
            ),
        ] {
            if file.is_empty() {
                messages.push(StepValidationMessage::property_error(
                    property,
                    format!("`{property}` is empty."),
                ));
                continue;
            }
            let path = model_dir.join(file);
            if !path.is_file() {
                messages.push(StepValidationMessage::property_error(
                    property,
                    format!(
                        "{}: Cannot find {side} landmarks file on filesystem",
                        path.display()
                    ),
                ));
            } else if let Err(err) = read_landmarks_csv(&path) {
                messages.push(StepValidationMessage::property_error(
                    property,
                    format!("{}: Cannot read {side} landmarks file: {err}", path.display()),
                ));
            }
        }

        if !source.is_frame(&self.landmarks_frame) {
            messages.push(StepValidationMessage::property_error(
                "landmarks_frame",
                format!(
                    "{}: Cannot find this frame in the source model (or it isn't a Frame).",
                    self.landmarks_frame
                ),
            ));
        }
        messages
    }

    /// Builds the cache inputs for applying a step to `model`.
    pub(crate) fn inputs(
        &self,
        toggles: AffineToggles,
        parameters: &ScalingParameters,
        model: &Model,
    ) -> WarpResult<TpsInputs> {
        let model_dir = model_dir(model)?;
        Ok(TpsInputs {
            source_landmarks_path: model_dir.join(&self.source_landmarks_file),
            destination_landmarks_path: model_dir.join(&self.destination_landmarks_file),
            source_landmarks_prescale: self.source_landmarks_prescale,
            destination_landmarks_prescale: self.destination_landmarks_prescale,
            apply_affine_translation: toggles.apply_affine_translation,
            apply_affine_scale: toggles.apply_affine_scale,
            apply_affine_rotation: toggles.apply_affine_rotation,
            apply_non_affine_warp: toggles.apply_non_affine_warp,
            blending_factor: parameters.require(BLENDING_FACTOR)?,
        })
    }
}

pub(crate) fn model_dir(model: &Model) -> WarpResult<PathBuf> {
    model
        .model_dir()
        .map(Path::to_path_buf)
        .ok_or_else(|| WarpError::precondition("The source model has no filesystem location"))
}

/// Which parts of the TPS warp a step applies.
///
/// By default only scale and the non-affine warp are applied, so warped
/// components stay where they are in their frames and only change shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AffineToggles {
    /// Apply the affine translation.
    pub apply_affine_translation: bool,
    /// Apply the affine scale.
    pub apply_affine_scale: bool,
    /// Apply the affine rotation.
    pub apply_affine_rotation: bool,
    /// Apply the non-affine warp.
    pub apply_non_affine_warp: bool,
}

impl Default for AffineToggles {
    fn default() -> Self {
        Self {
            apply_affine_translation: false,
            apply_affine_scale: true,
            apply_affine_rotation: false,
            apply_non_affine_warp: true,
        }
    }
}

impl AffineToggles {
    /// Every component enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
        }
    }

    pub(crate) const PROPERTY_NAMES: [&'static str; 4] = [
        "apply_affine_translation",
        "apply_affine_scale",
        "apply_affine_rotation",
        "apply_non_affine_warp",
    ];

    pub(crate) fn set_property(
        &mut self,
        step_type: StepType,
        name: &str,
        value: PropertyValue,
    ) -> WarpResult<()> {
        let flag = match name {
            "apply_affine_translation" => &mut self.apply_affine_translation,
            "apply_affine_scale" => &mut self.apply_affine_scale,
            "apply_affine_rotation" => &mut self.apply_affine_rotation,
            "apply_non_affine_warp" => &mut self.apply_non_affine_warp,
            _ => return Err(step_type.unknown_property(name)),
        };
        *flag = value.into_bool(name)?;
        Ok(())
    }
}

/// Routes a property edit to the shared TPS properties.
pub(crate) fn set_shared_property(
    step_type: StepType,
    landmarks: &mut TpsLandmarks,
    toggles: Option<&mut AffineToggles>,
    name: &str,
    value: PropertyValue,
) -> WarpResult<()> {
    match toggles {
        Some(toggles) if AffineToggles::PROPERTY_NAMES.contains(&name) => {
            toggles.set_property(step_type, name, value)
        }
        _ => landmarks.set_property(step_type, name, value),
    }
}

/// Property names of a TPS step: shared ones first, then `own`.
pub(crate) fn shared_property_names(with_toggles: bool, own: &[&'static str]) -> Vec<&'static str> {
    let mut names = TpsLandmarks::PROPERTY_NAMES.to_vec();
    if with_toggles {
        names.extend(AffineToggles::PROPERTY_NAMES);
    }
    names.extend_from_slice(own);
    names
}
