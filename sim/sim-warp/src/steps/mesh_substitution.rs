//! Swaps a mesh for a subject-specific one, placed by the inverse TPS affine.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_model::{Component, ComponentKind, Mesh, Model, OffsetFrame};
use tracing::debug;

use super::tps::{model_dir, set_shared_property, shared_property_names, AffineToggles, TpsLandmarks};
use super::{PropertyValue, StepOperation, StepType};
use crate::cache::ScalingCache;
use crate::error::{WarpError, WarpResult};
use crate::parameters::{ParameterDeclaration, ScalingParameters};
use crate::validation::StepValidationMessage;

/// Replaces `source_mesh_component_path` with `destination_mesh_file`.
///
/// The destination mesh is assumed to be expressed in the subject's
/// (destination landmark) space. It is attached to a new offset frame
/// whose transform relative to the old mesh's frame is the inverse of the
/// warp's rigid affine part, and scaled by the old scale factors times
/// `destination_landmarks_prescale / source_landmarks_prescale`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsMeshSubstitutionStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Absolute path of the mesh to replace.
    pub source_mesh_component_path: String,
    /// Replacement mesh file, relative to the source model's directory.
    pub destination_mesh_file: String,
}

impl StepOperation for TpsMeshSubstitutionStep {
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

        if self.destination_mesh_file.is_empty() {
            messages.push(StepValidationMessage::property_error(
                "destination_mesh_file",
                "`destination_mesh_file` is empty.",
            ));
        } else if let Some(dir) = source.model_dir() {
            let path = dir.join(&self.destination_mesh_file);
            if !path.is_file() {
                messages.push(StepValidationMessage::property_error(
                    "destination_mesh_file",
                    format!(
                        "{}: Cannot find `destination_mesh_file` on filesystem",
                        path.display()
                    ),
                ));
            }
        }

        if source
            .find_as::<Mesh>(&self.source_mesh_component_path)
            .is_err()
        {
            messages.push(StepValidationMessage::property_error(
                "source_mesh_component_path",
                format!(
                    "{}: Cannot find Mesh 'source_mesh_component_path' in the source model (or it isn't a Mesh).",
                    self.source_mesh_component_path
                ),
            ));
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
        let inputs = self.tps.inputs(AffineToggles::all(), parameters, result)?;
        let transform = cache.lookup_affine_transform_without_scale(&inputs)?;
        let mesh_file = model_dir(result)?.join(&self.destination_mesh_file);

        let old = result.remove_component(&self.source_mesh_component_path)?;
        let ComponentKind::Mesh(old_mesh) = old.kind else {
            return Err(WarpError::precondition(format!(
                "{}: is not a Mesh",
                self.source_mesh_component_path
            )));
        };
        let scale_ratio =
            self.tps.destination_landmarks_prescale / self.tps.source_landmarks_prescale;

        let mut offset = OffsetFrame::new(old_mesh.frame.clone(), Vector3::zeros());
        offset.set_transform(&transform.inverse());
        let offset_name = unique_top_level_name(result, &format!("{}_offset", old.name));
        let offset_path = result.add_component(
            "/",
            Component::new(offset_name, ComponentKind::OffsetFrame(offset)),
        )?;

        let mut mesh = Mesh::from_file(offset_path.clone(), mesh_file);
        mesh.scale_factors = old_mesh.scale_factors * scale_ratio;
        let mesh_name = unique_top_level_name(result, &old.name);
        let mesh_path = result.add_component("/", Component::new(mesh_name, ComponentKind::Mesh(mesh)))?;

        result.finalize()?;
        debug!(
            replaced = %self.source_mesh_component_path,
            mesh = %mesh_path,
            frame = %offset_path,
            "Substituted mesh"
        );
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(false, &["source_mesh_component_path", "destination_mesh_file"])
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "source_mesh_component_path" => {
                self.source_mesh_component_path = value.into_text(name)?;
            }
            "destination_mesh_file" => self.destination_mesh_file = value.into_text(name)?,
            _ => set_shared_property(
                StepType::TpsMeshSubstitution,
                &mut self.tps,
                None,
                name,
                value,
            )?,
        }
        Ok(())
    }
}

/// `base`, or `base_1`, `base_2`, ... if a top-level component already has that name.
fn unique_top_level_name(model: &Model, base: &str) -> String {
    let taken = |name: &str| model.contains(&format!("/{name}"));
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}
