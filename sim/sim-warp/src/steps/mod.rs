//! Scaling steps.
//!
//! A [`ScalingStep`] is one independently toggleable operation applied to
//! the working copy of a model. The set of step types is closed: each is a
//! variant of [`StepKind`], enumerated by [`STEP_TYPES`].
//!
//! Every step type:
//!
//! - declares the scaling parameters it reads ([`ScalingStep::declarations`])
//! - validates itself against the source model without changing anything
//!   ([`ScalingStep::validate`])
//! - applies itself to the result model, re-finalizing it afterwards
//!   ([`ScalingStep::apply`])
//!
//! Step properties can be edited by name with [`ScalingStep::set_property`].

mod body;
mod mesh_substitution;
mod tps;
mod tps_points;
mod wrap_cylinder;

pub use body::{ManualBodyScaleStep, SubjectMassStep};
pub use mesh_substitution::TpsMeshSubstitutionStep;
pub use tps::{AffineToggles, TpsLandmarks};
pub use tps_points::{TpsMeshesStep, TpsOffsetFramesStep, TpsPathPointsStep, TpsStationsStep};
pub use wrap_cylinder::{
    TpsWrapCylindersStep, WrapCylinderRadiusFromStationStep, WrapCylinderRotationFromStationStep,
};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_model::Model;

use crate::cache::ScalingCache;
use crate::error::{WarpError, WarpResult};
use crate::parameters::{ParameterDeclaration, ScalingParameters};
use crate::validation::StepValidationMessage;

/// Every step type, in the order they are offered to users.
pub const STEP_TYPES: [StepType; 10] = [
    StepType::TpsMeshes,
    StepType::TpsStations,
    StepType::TpsPathPoints,
    StepType::TpsOffsetFrames,
    StepType::TpsMeshSubstitution,
    StepType::TpsWrapCylinders,
    StepType::SubjectMass,
    StepType::ManualBodyScale,
    StepType::WrapCylinderRadiusFromStation,
    StepType::WrapCylinderRotationFromStation,
];

/// Identifies a kind of scaling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    /// Warp meshes with the TPS.
    TpsMeshes,
    /// Warp station locations with the TPS.
    TpsStations,
    /// Warp path point locations with the TPS.
    TpsPathPoints,
    /// Warp offset frame translations with the TPS.
    TpsOffsetFrames,
    /// Replace a mesh, placed by the inverse of the TPS affine transform.
    TpsMeshSubstitution,
    /// Warp wrap cylinder origin, orientation and radius with the TPS.
    TpsWrapCylinders,
    /// Scale the model's mass to the subject's mass.
    SubjectMass,
    /// Scale bodies by fixed factors.
    ManualBodyScale,
    /// Recalculate a wrap cylinder's radius from a station.
    WrapCylinderRadiusFromStation,
    /// Recalculate a wrap cylinder's orientation from a station.
    WrapCylinderRotationFromStation,
}

impl StepType {
    /// Stable type name, as stored in scaling documents.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::TpsMeshes => "TpsMeshes",
            Self::TpsStations => "TpsStations",
            Self::TpsPathPoints => "TpsPathPoints",
            Self::TpsOffsetFrames => "TpsOffsetFrames",
            Self::TpsMeshSubstitution => "TpsMeshSubstitution",
            Self::TpsWrapCylinders => "TpsWrapCylinders",
            Self::SubjectMass => "SubjectMass",
            Self::ManualBodyScale => "ManualBodyScale",
            Self::WrapCylinderRadiusFromStation => "WrapCylinderRadiusFromStation",
            Self::WrapCylinderRotationFromStation => "WrapCylinderRotationFromStation",
        }
    }

    /// Name given to new steps of this type within a document.
    #[must_use]
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::TpsMeshes => "tps_meshes",
            Self::TpsStations => "tps_stations",
            Self::TpsPathPoints => "tps_path_points",
            Self::TpsOffsetFrames => "tps_offset_frames",
            Self::TpsMeshSubstitution => "tps_mesh_substitution",
            Self::TpsWrapCylinders => "tps_wrap_cylinders",
            Self::SubjectMass => "subject_mass",
            Self::ManualBodyScale => "manual_body_scale",
            Self::WrapCylinderRadiusFromStation => "wrap_cylinder_radius_from_station",
            Self::WrapCylinderRotationFromStation => "wrap_cylinder_rotation_from_station",
        }
    }

    /// User-facing label given to new steps.
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::TpsMeshes => "Apply Thin-Plate Spline (TPS) to Meshes",
            Self::TpsStations => "Apply Thin-Plate Spline (TPS) to Stations",
            Self::TpsPathPoints => "Apply Thin-Plate Spline (TPS) to Path Points",
            Self::TpsOffsetFrames => "Apply Thin-Plate Spline (TPS) to Offset Frame translation",
            Self::TpsMeshSubstitution => {
                "Substitute Mesh via Inverse Thin-Plate Spline (TPS) Affine Transform"
            }
            Self::TpsWrapCylinders => "Apply Thin-Plate Spline (TPS) to WrapCylinder",
            Self::SubjectMass => "Scale Model Mass to Subject Mass",
            Self::ManualBodyScale => "Manually Scale Body Segments",
            Self::WrapCylinderRadiusFromStation => {
                "Recalculate WrapCylinder `radius` from Station Projection onto its Midline"
            }
            Self::WrapCylinderRotationFromStation => {
                "Recalculate WrapCylinder 'xyz_body_rotation' from Station Placed Along Its Midline"
            }
        }
    }

    /// What a step of this type does.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::TpsMeshes => {
                "Warps mesh(es) in the source model by applying a Thin-Plate Spline (TPS) warp \
                 to each vertex in the source mesh(es)."
            }
            Self::TpsStations => {
                "Warps the locations of stations in the model using the Thin-Plate Spline (TPS) \
                 warping algorithm."
            }
            Self::TpsPathPoints => {
                "Warps the locations of path points in the model using the Thin-Plate Spline \
                 (TPS) warping algorithm."
            }
            Self::TpsOffsetFrames => {
                "Uses the Thin-Plate Spline (TPS) warping algorithm to warp the translation of \
                 the given offset frames."
            }
            Self::TpsMeshSubstitution => {
                "Substitutes the source mesh in the model with a new mesh file. The mesh's \
                 rotation and translation (i.e. frame) are computed from the inverse of the \
                 affine part of the Thin-Plate Spline (TPS) between the source and destination \
                 landmarks, and its scale from the ratio of the landmark prescale factors."
            }
            Self::TpsWrapCylinders => {
                "Uses the Thin-Plate Spline (TPS) warping algorithm to warp the `translation`, \
                 `xyz_body_rotation` and `radius` of `WrapCylinder`s. The origin, a point \
                 projected along the midline and a point on the surface are warped, and the \
                 cylinder is rebuilt from them. `quadrant` and `length` are not warped."
            }
            Self::SubjectMass => {
                "Scales the masses of bodies in the model to match the subject mass, while \
                 preserving the overall mass distribution of each body in the model."
            }
            Self::ManualBodyScale => {
                "Applies a manually-specified scaling factor to the given body segments in the \
                 model."
            }
            Self::WrapCylinderRadiusFromStation => {
                "Recalculates the `radius` of the `WrapCylinder` at `wrap_cylinder_path` as the \
                 distance between the `Station` at `station_path` and the cylinder's (infinitely \
                 long) midline."
            }
            Self::WrapCylinderRotationFromStation => {
                "Recalculates the `xyz_body_rotation` of the `WrapCylinder` at \
                 `wrap_cylinder_path` such that the cylinder's +Z direction (midline) points \
                 toward the `Station` at `station_path`."
            }
        }
    }

    /// A step of this type with default properties.
    #[must_use]
    pub fn prototype(self) -> ScalingStep {
        let kind = match self {
            Self::TpsMeshes => StepKind::TpsMeshes(TpsMeshesStep::default()),
            Self::TpsStations => StepKind::TpsStations(TpsStationsStep::default()),
            Self::TpsPathPoints => StepKind::TpsPathPoints(TpsPathPointsStep::default()),
            Self::TpsOffsetFrames => StepKind::TpsOffsetFrames(TpsOffsetFramesStep::default()),
            Self::TpsMeshSubstitution => {
                StepKind::TpsMeshSubstitution(TpsMeshSubstitutionStep::default())
            }
            Self::TpsWrapCylinders => StepKind::TpsWrapCylinders(TpsWrapCylindersStep::default()),
            Self::SubjectMass => StepKind::SubjectMass(SubjectMassStep::default()),
            Self::ManualBodyScale => StepKind::ManualBodyScale(ManualBodyScaleStep::default()),
            Self::WrapCylinderRadiusFromStation => {
                StepKind::WrapCylinderRadiusFromStation(WrapCylinderRadiusFromStationStep::default())
            }
            Self::WrapCylinderRotationFromStation => StepKind::WrapCylinderRotationFromStation(
                WrapCylinderRotationFromStationStep::default(),
            ),
        };
        ScalingStep::from_kind(kind)
    }

    pub(crate) fn unknown_property(self, property: &str) -> WarpError {
        WarpError::UnknownProperty {
            step_type: self.type_name(),
            property: property.to_string(),
        }
    }
}

/// A value for a step property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A flag.
    Bool(bool),
    /// A number.
    Real(f64),
    /// A path or other string.
    Text(String),
    /// A list of component paths.
    TextList(Vec<String>),
    /// A 3-vector.
    Vec3(Vector3<f64>),
}

impl PropertyValue {
    /// Name of the kind of value held.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::TextList(_) => "text list",
            Self::Vec3(_) => "vec3",
        }
    }

    fn wrong_kind(&self, property: &str, expected: &'static str) -> WarpError {
        WarpError::WrongPropertyKind {
            property: property.to_string(),
            expected,
            found: self.kind_name(),
        }
    }

    pub(crate) fn into_bool(self, property: &str) -> WarpResult<bool> {
        match self {
            Self::Bool(v) => Ok(v),
            other => Err(other.wrong_kind(property, "bool")),
        }
    }

    pub(crate) fn into_real(self, property: &str) -> WarpResult<f64> {
        match self {
            Self::Real(v) => Ok(v),
            other => Err(other.wrong_kind(property, "real")),
        }
    }

    pub(crate) fn into_text(self, property: &str) -> WarpResult<String> {
        match self {
            Self::Text(v) => Ok(v),
            other => Err(other.wrong_kind(property, "text")),
        }
    }

    pub(crate) fn into_text_list(self, property: &str) -> WarpResult<Vec<String>> {
        match self {
            Self::TextList(v) => Ok(v),
            other => Err(other.wrong_kind(property, "text list")),
        }
    }

    pub(crate) fn into_vec3(self, property: &str) -> WarpResult<Vector3<f64>> {
        match self {
            Self::Vec3(v) => Ok(v),
            other => Err(other.wrong_kind(property, "vec3")),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

impl From<Vector3<f64>> for PropertyValue {
    fn from(v: Vector3<f64>) -> Self {
        Self::Vec3(v)
    }
}

/// Behaviour shared by every step type.
pub(crate) trait StepOperation {
    /// Parameters read at apply time.
    fn declarations(&self) -> Vec<ParameterDeclaration> {
        Vec::new()
    }

    /// Checks preconditions against the source model.
    fn validate(
        &self,
        cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage>;

    /// Applies the step to `result` and finalizes it.
    fn apply(
        &self,
        cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        source: &Model,
        result: &mut Model,
    ) -> WarpResult<()>;

    /// Names accepted by `set_property`.
    fn property_names(&self) -> Vec<&'static str>;

    /// Sets a property by name.
    fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()>;
}

/// The type-specific part of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[allow(missing_docs)]
pub enum StepKind {
    TpsMeshes(TpsMeshesStep),
    TpsStations(TpsStationsStep),
    TpsPathPoints(TpsPathPointsStep),
    TpsOffsetFrames(TpsOffsetFramesStep),
    TpsMeshSubstitution(TpsMeshSubstitutionStep),
    TpsWrapCylinders(TpsWrapCylindersStep),
    SubjectMass(SubjectMassStep),
    ManualBodyScale(ManualBodyScaleStep),
    WrapCylinderRadiusFromStation(WrapCylinderRadiusFromStationStep),
    WrapCylinderRotationFromStation(WrapCylinderRotationFromStationStep),
}

impl StepKind {
    /// The step's type.
    #[must_use]
    pub const fn step_type(&self) -> StepType {
        match self {
            Self::TpsMeshes(_) => StepType::TpsMeshes,
            Self::TpsStations(_) => StepType::TpsStations,
            Self::TpsPathPoints(_) => StepType::TpsPathPoints,
            Self::TpsOffsetFrames(_) => StepType::TpsOffsetFrames,
            Self::TpsMeshSubstitution(_) => StepType::TpsMeshSubstitution,
            Self::TpsWrapCylinders(_) => StepType::TpsWrapCylinders,
            Self::SubjectMass(_) => StepType::SubjectMass,
            Self::ManualBodyScale(_) => StepType::ManualBodyScale,
            Self::WrapCylinderRadiusFromStation(_) => StepType::WrapCylinderRadiusFromStation,
            Self::WrapCylinderRotationFromStation(_) => StepType::WrapCylinderRotationFromStation,
        }
    }

    fn operation(&self) -> &dyn StepOperation {
        match self {
            Self::TpsMeshes(s) => s,
            Self::TpsStations(s) => s,
            Self::TpsPathPoints(s) => s,
            Self::TpsOffsetFrames(s) => s,
            Self::TpsMeshSubstitution(s) => s,
            Self::TpsWrapCylinders(s) => s,
            Self::SubjectMass(s) => s,
            Self::ManualBodyScale(s) => s,
            Self::WrapCylinderRadiusFromStation(s) => s,
            Self::WrapCylinderRotationFromStation(s) => s,
        }
    }

    fn operation_mut(&mut self) -> &mut dyn StepOperation {
        match self {
            Self::TpsMeshes(s) => s,
            Self::TpsStations(s) => s,
            Self::TpsPathPoints(s) => s,
            Self::TpsOffsetFrames(s) => s,
            Self::TpsMeshSubstitution(s) => s,
            Self::TpsWrapCylinders(s) => s,
            Self::SubjectMass(s) => s,
            Self::ManualBodyScale(s) => s,
            Self::WrapCylinderRadiusFromStation(s) => s,
            Self::WrapCylinderRotationFromStation(s) => s,
        }
    }
}

/// One step of a scaling document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingStep {
    name: String,
    enabled: bool,
    label: String,
    properties: StepKind,
}

impl ScalingStep {
    /// Creates an enabled step with the type's default name and label.
    #[must_use]
    pub fn from_kind(properties: StepKind) -> Self {
        let step_type = properties.step_type();
        Self {
            name: step_type.default_name().to_string(),
            enabled: true,
            label: step_type.default_label().to_string(),
            properties,
        }
    }

    /// Name, unique within a document.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Sets the name, builder style. Documents rename steps whose name is taken.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path of the step within its document, e.g. `/tps_meshes`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.name)
    }

    /// Returns `true` if the step takes part in validation and generation.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the step.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// User-facing label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sets the user-facing label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// What the step does.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.step_type().description()
    }

    /// The step's type.
    #[must_use]
    pub const fn step_type(&self) -> StepType {
        self.properties.step_type()
    }

    /// Type-specific properties.
    #[must_use]
    pub const fn kind(&self) -> &StepKind {
        &self.properties
    }

    /// Mutable type-specific properties.
    pub fn kind_mut(&mut self) -> &mut StepKind {
        &mut self.properties
    }

    /// Scaling parameters this step reads when applied.
    #[must_use]
    pub fn declarations(&self) -> Vec<ParameterDeclaration> {
        self.properties.operation().declarations()
    }

    /// Checks the step against `source`. Never modifies anything.
    pub fn validate(
        &self,
        cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        source: &Model,
    ) -> Vec<StepValidationMessage> {
        self.properties.operation().validate(cache, parameters, source)
    }

    /// Applies the step to `result`, a working copy of `source`.
    ///
    /// The step is expected to have passed validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition does not hold or a model edit or
    /// TPS solve fails. `result` may be partially modified in that case.
    pub fn apply(
        &self,
        cache: &mut ScalingCache,
        parameters: &ScalingParameters,
        source: &Model,
        result: &mut Model,
    ) -> WarpResult<()> {
        self.properties
            .operation()
            .apply(cache, parameters, source, result)
    }

    /// Names of the step's editable properties.
    #[must_use]
    pub fn property_names(&self) -> Vec<&'static str> {
        self.properties.operation().property_names()
    }

    /// Sets a property by name.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::UnknownProperty`] or
    /// [`WarpError::WrongPropertyKind`].
    ///
    /// # Example
    ///
    /// ```
    /// use sim_warp::StepType;
    ///
    /// let mut step = StepType::TpsMeshes.prototype();
    /// step.set_property("meshes", vec!["/bodyset/femur/femur_geom".to_string()].into())
    ///     .unwrap();
    /// step.set_property("source_landmarks_file", "femur_source.csv".into())
    ///     .unwrap();
    /// assert!(step.set_property("meshes", 1.0.into()).is_err());
    /// ```
    pub fn set_property(&mut self, name: &str, value: PropertyValue) -> WarpResult<()> {
        self.properties.operation_mut().set_property(name, value)
    }
}
