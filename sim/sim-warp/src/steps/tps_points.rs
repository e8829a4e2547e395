//! TPS steps that warp meshes and point-like components in place.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use sim_model::{Mesh, MeshSource, Model, OffsetFrame, PathPoint, Station};
use tracing::debug;

use super::tps::{set_shared_property, shared_property_names, AffineToggles, TpsLandmarks};
use super::{PropertyValue, StepOperation, StepType};
use crate::cache::ScalingCache;
use crate::error::WarpResult;
use crate::parameters::{ParameterDeclaration, ScalingParameters};
use crate::validation::StepValidationMessage;

/// Warps every vertex of the listed meshes.
///
/// Warped meshes are held in memory by the result model until exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsMeshesStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Warp components to apply.
    #[serde(flatten)]
    pub toggles: AffineToggles,
    /// Absolute paths of meshes, e.g. `/bodyset/torso/torso_geom`.
    pub meshes: Vec<String>,
}

impl StepOperation for TpsMeshesStep {
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
        if self.meshes.is_empty() {
            messages.push(StepValidationMessage::property_error(
                "meshes",
                "No mesh(es) given (e.g. `/bodyset/torso/torso_geom`).",
            ));
        }
        for path in &self.meshes {
            if source.find_as::<Mesh>(path).is_err() {
                messages.push(StepValidationMessage::property_error(
                    "meshes",
                    format!(
                        "{path}: Cannot find entry in 'meshes' in the source model (or it isn't a Mesh)."
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
        // all warps read poses, so they run before the first edit
        let mut warped = Vec::with_capacity(self.meshes.len());
        for path in &self.meshes {
            let mesh = cache.lookup_mesh_warp(result, path, &self.tps.landmarks_frame, &inputs)?;
            warped.push((path, mesh));
        }
        for (path, mesh) in warped {
            result.replace_geometry(path, MeshSource::InMemory { mesh })?;
        }
        result.finalize()?;
        debug!(meshes = self.meshes.len(), "Warped meshes");
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(true, &["meshes"])
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "meshes" => self.meshes = value.into_text_list(name)?,
            _ => set_shared_property(
                StepType::TpsMeshes,
                &mut self.tps,
                Some(&mut self.toggles),
                name,
                value,
            )?,
        }
        Ok(())
    }
}

/// Warps `(path, location, frame)` triples, returning the new locations.
fn warp_locations(
    cache: &mut ScalingCache,
    model: &Model,
    tps: &TpsLandmarks,
    toggles: AffineToggles,
    parameters: &ScalingParameters,
    points: &[(&str, Point3<f64>, String)],
) -> WarpResult<Vec<Point3<f64>>> {
    let inputs = tps.inputs(toggles, parameters, model)?;
    points
        .iter()
        .map(|(_, location, frame)| {
            cache.lookup_warped_rigid_point(model, location, frame, &tps.landmarks_frame, &inputs)
        })
        .collect()
}

/// Warps the locations of the listed stations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsStationsStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Warp components to apply.
    #[serde(flatten)]
    pub toggles: AffineToggles,
    /// Absolute paths of stations.
    pub stations: Vec<String>,
}

impl StepOperation for TpsStationsStep {
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
        for path in &self.stations {
            if source.find_as::<Station>(path).is_err() {
                messages.push(StepValidationMessage::property_error(
                    "stations",
                    format!(
                        "{path}: Cannot find a Station in 'stations' in the source model (or it isn't a Station)."
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
        let points = self
            .stations
            .iter()
            .map(|path| {
                let station = result.find_as::<Station>(path)?;
                Ok((path.as_str(), station.location, station.parent_frame.clone()))
            })
            .collect::<WarpResult<Vec<_>>>()?;
        let warped = warp_locations(cache, result, &self.tps, self.toggles, parameters, &points)?;
        for ((path, _, _), location) in points.iter().zip(warped) {
            result.find_as_mut::<Station>(path)?.location = location;
        }
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(true, &["stations"])
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "stations" => self.stations = value.into_text_list(name)?,
            _ => set_shared_property(
                StepType::TpsStations,
                &mut self.tps,
                Some(&mut self.toggles),
                name,
                value,
            )?,
        }
        Ok(())
    }
}

/// Warps the locations of the listed path points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsPathPointsStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Warp components to apply.
    #[serde(flatten)]
    pub toggles: AffineToggles,
    /// Absolute paths of path points.
    pub path_points: Vec<String>,
}

impl StepOperation for TpsPathPointsStep {
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
        for path in &self.path_points {
            if source.find_as::<PathPoint>(path).is_err() {
                messages.push(StepValidationMessage::property_error(
                    "path_points",
                    format!(
                        "{path}: Cannot find a PathPoint in 'path_points' in the source model (or it isn't a PathPoint)."
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
        let points = self
            .path_points
            .iter()
            .map(|path| {
                let point = result.find_as::<PathPoint>(path)?;
                Ok((path.as_str(), point.location, point.parent_frame.clone()))
            })
            .collect::<WarpResult<Vec<_>>>()?;
        let warped = warp_locations(cache, result, &self.tps, self.toggles, parameters, &points)?;
        for ((path, _, _), location) in points.iter().zip(warped) {
            result.find_as_mut::<PathPoint>(path)?.location = location;
        }
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(true, &["path_points"])
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "path_points" => self.path_points = value.into_text_list(name)?,
            _ => set_shared_property(
                StepType::TpsPathPoints,
                &mut self.tps,
                Some(&mut self.toggles),
                name,
                value,
            )?,
        }
        Ok(())
    }
}

/// Warps the translation of the listed offset frames.
///
/// The frame origin is warped as a point in the parent frame; the
/// orientation is left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsOffsetFramesStep {
    /// Landmark inputs.
    #[serde(flatten)]
    pub tps: TpsLandmarks,
    /// Warp components to apply.
    #[serde(flatten)]
    pub toggles: AffineToggles,
    /// Absolute paths of offset frames.
    pub offset_frames: Vec<String>,
}

impl StepOperation for TpsOffsetFramesStep {
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
        for path in &self.offset_frames {
            if source.find_as::<OffsetFrame>(path).is_err() {
                messages.push(StepValidationMessage::property_error(
                    "offset_frames",
                    format!(
                        "{path}: Cannot find an `OffsetFrame` in 'offset_frames' in the source model (or it isn't an `OffsetFrame`)."
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
        let points = self
            .offset_frames
            .iter()
            .map(|path| {
                let frame = result.find_as::<OffsetFrame>(path)?;
                Ok((path.as_str(), Point3::from(frame.translation), frame.parent.clone()))
            })
            .collect::<WarpResult<Vec<_>>>()?;
        let warped = warp_locations(cache, result, &self.tps, self.toggles, parameters, &points)?;
        for ((path, _, _), origin) in points.iter().zip(warped) {
            result.find_as_mut::<OffsetFrame>(path)?.translation = origin.coords;
        }
        result.finalize()?;
        Ok(())
    }

    fn property_names(&self) -> Vec<&'static str> {
        shared_property_names(true, &["offset_frames"])
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        match name {
            "offset_frames" => self.offset_frames = value.into_text_list(name)?,
            _ => set_shared_property(
                StepType::TpsOffsetFrames,
                &mut self.tps,
                Some(&mut self.toggles),
                name,
                value,
            )?,
        }
        Ok(())
    }
}
