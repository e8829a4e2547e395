//! Scaling documents: ordered steps plus parameter overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sim_model::object_file::{read_object_file, write_object_file};
use sim_model::Model;
use tracing::{debug, info};

use crate::cache::ScalingCache;
use crate::config::WarpConfig;
use crate::error::{parameter_conflict_message, WarpError, WarpResult};
use crate::parameters::{ParameterDeclaration, ParameterOverride, ScalingParameters};
use crate::steps::ScalingStep;
use crate::validation::{DocumentValidationMessage, StepValidationMessage};

/// Object type tag of scaling document files.
pub const DOCUMENT_OBJECT_TYPE: &str = "ModelWarperDocument";

/// An ordered list of scaling steps and the parameter overrides applied to them.
///
/// Steps run in document order. Disabled steps are kept but take no part
/// in parameter resolution, validation or generation.
///
/// # Example
///
/// ```
/// use sim_warp::{ScalingDocument, StepType, BLENDING_FACTOR};
///
/// let mut doc = ScalingDocument::new();
/// let meshes = doc.add_step(StepType::TpsMeshes.prototype());
/// let again = doc.add_step(StepType::TpsMeshes.prototype());
/// assert_eq!(meshes, "/tps_meshes");
/// assert_eq!(again, "/tps_meshes_1");
///
/// doc.set_parameter_override(BLENDING_FACTOR, 0.5);
/// let params = doc.effective_parameters().unwrap();
/// assert_eq!(params.get(BLENDING_FACTOR), Some(0.5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingDocument {
    steps: Vec<ScalingStep>,
    #[serde(default)]
    parameter_overrides: Vec<ParameterOverride>,
    #[serde(skip)]
    file_location: Option<PathBuf>,
}

impl ScalingDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a document saved with [`ScalingDocument::save`].
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::NotAScalingDocument`] if the file holds another
    /// kind of object, or an error if it cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> WarpResult<Self> {
        let path = path.as_ref();
        let file = read_object_file(path)?;
        if file.object_type != DOCUMENT_OBJECT_TYPE {
            return Err(WarpError::NotAScalingDocument(path.to_path_buf()));
        }
        let mut document: Self = file.into_object()?;
        document.file_location = Some(path.to_path_buf());
        info!(path = %path.display(), steps = document.steps.len(), "Loaded scaling document");
        Ok(document)
    }

    /// Saves the document and remembers `path` as its location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> WarpResult<()> {
        let path = path.as_ref();
        write_object_file(path, DOCUMENT_OBJECT_TYPE, self)?;
        self.file_location = Some(path.to_path_buf());
        info!(path = %path.display(), "Saved scaling document");
        Ok(())
    }

    /// Where the document was last loaded from or saved to.
    #[must_use]
    pub fn file_location(&self) -> Option<&Path> {
        self.file_location.as_deref()
    }

    /// Appends `step`, renaming it if its name is empty or taken.
    ///
    /// Returns the step's path within the document.
    pub fn add_step(&mut self, mut step: ScalingStep) -> String {
        let base = if step.name().is_empty() {
            step.step_type().default_name().to_string()
        } else {
            step.name().to_string()
        };
        let name = self.unique_step_name(&base);
        step.set_name(name);
        let path = step.path();
        debug!(step = %path, step_type = step.step_type().type_name(), "Added scaling step");
        self.steps.push(step);
        path
    }

    fn unique_step_name(&self, base: &str) -> String {
        let taken = |name: &str| self.steps.iter().any(|s| s.name() == name);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    fn index_of(&self, path: &str) -> Option<usize> {
        let name = path.strip_prefix('/').unwrap_or(path);
        self.steps.iter().position(|s| s.name() == name)
    }

    /// Removes and returns the step at `path`.
    pub fn remove_step(&mut self, path: &str) -> Option<ScalingStep> {
        self.index_of(path).map(|i| self.steps.remove(i))
    }

    /// The step at `path` (e.g. `/tps_meshes`).
    #[must_use]
    pub fn step(&self, path: &str) -> Option<&ScalingStep> {
        self.index_of(path).map(|i| &self.steps[i])
    }

    /// The step at `path`, for editing.
    pub fn step_mut(&mut self, path: &str) -> Option<&mut ScalingStep> {
        self.index_of(path).map(|i| &mut self.steps[i])
    }

    /// Disables the step at `path`. Returns `false` if there is no such step.
    pub fn disable_step(&mut self, path: &str) -> bool {
        self.step_mut(path).map(|s| s.set_enabled(false)).is_some()
    }

    /// All steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[ScalingStep] {
        &self.steps
    }

    /// Enabled steps in execution order.
    pub fn enabled_steps(&self) -> impl Iterator<Item = &ScalingStep> {
        self.steps.iter().filter(|s| s.is_enabled())
    }

    /// Returns `true` if the document has any steps, enabled or not.
    #[must_use]
    pub fn has_scaling_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Returns `true` if any enabled step reads a scaling parameter.
    #[must_use]
    pub fn has_scaling_parameters(&self) -> bool {
        self.enabled_steps().any(|s| !s.declarations().is_empty())
    }

    /// Sets an override, replacing any existing override of the same name.
    pub fn set_parameter_override(&mut self, name: &str, value: f64) {
        match self
            .parameter_overrides
            .iter_mut()
            .find(|o| o.parameter_name == name)
        {
            Some(existing) => existing.parameter_value = value,
            None => self.parameter_overrides.push(ParameterOverride {
                parameter_name: name.to_string(),
                parameter_value: value,
            }),
        }
    }

    /// Parameter overrides in the order they were first set.
    #[must_use]
    pub fn parameter_overrides(&self) -> &[ParameterOverride] {
        &self.parameter_overrides
    }

    /// Merges the enabled steps' declarations, then applies every override.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::ParameterConflict`] if two enabled steps declare
    /// the same parameter with different defaults.
    pub fn effective_parameters(&self) -> WarpResult<ScalingParameters> {
        merge_declarations(
            self.enabled_steps().map(|step| (step.path(), step.declarations())),
            &self.parameter_overrides,
        )
    }

    /// Validates every enabled step against `source`.
    ///
    /// A parameter conflict is reported as a single message on the
    /// conflicting step, since no step can be checked without parameters.
    pub fn validate(
        &self,
        cache: &mut ScalingCache,
        source: &Model,
    ) -> Vec<DocumentValidationMessage> {
        let parameters = match self.effective_parameters() {
            Ok(parameters) => parameters,
            Err(err) => return parameter_error_messages(err),
        };

        let mut messages = Vec::new();
        for step in self.enabled_steps() {
            let path = step.path();
            messages.extend(
                step.validate(cache, &parameters, source)
                    .into_iter()
                    .map(|m| DocumentValidationMessage::new(path.clone(), m)),
            );
        }
        debug!(messages = messages.len(), "Validated scaling document");
        messages
    }

    /// Applies every enabled step, in order, to a copy of `source`.
    ///
    /// Does not validate first. The first failing step aborts the run and
    /// the partially scaled copy is dropped.
    pub(crate) fn apply_steps(&self, cache: &mut ScalingCache, source: &Model) -> WarpResult<Model> {
        let mut result = source.clone();
        result.finalize()?;
        if self.enabled_steps().next().is_none() {
            return Ok(result);
        }

        let parameters = self.effective_parameters()?;
        for step in self.enabled_steps() {
            let path = step.path();
            info!(step = %path, step_type = step.step_type().type_name(), "Applying scaling step");
            step.apply(cache, &parameters, source, &mut result)
                .map_err(|source| WarpError::StepFailed {
                    step: path,
                    source: Box::new(source),
                })?;
        }
        Ok(result)
    }

    /// Validates, then generates the scaled model if nothing blocks it.
    ///
    /// Returns `Ok(None)` when `config` says the validation messages block
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::StepFailed`] if a step fails while being applied.
    pub fn try_generate_scaled_model(
        &self,
        cache: &mut ScalingCache,
        source: &Model,
        config: &WarpConfig,
    ) -> WarpResult<Option<Model>> {
        let messages = self.validate(cache, source);
        if config.blocks(&messages) {
            info!(messages = messages.len(), "Scaling blocked by validation");
            return Ok(None);
        }
        self.apply_steps(cache, source).map(Some)
    }
}

/// Merges per-step declarations in order, then applies `overrides`.
fn merge_declarations(
    declarations: impl IntoIterator<Item = (String, Vec<ParameterDeclaration>)>,
    overrides: &[ParameterOverride],
) -> WarpResult<ScalingParameters> {
    let mut parameters = ScalingParameters::new();
    for (path, step_declarations) in declarations {
        for declaration in &step_declarations {
            parameters.declare(&path, declaration)?;
        }
    }
    for o in overrides {
        parameters.set(o.parameter_name.clone(), o.parameter_value);
    }
    Ok(parameters)
}

/// Turns a failure to resolve parameters into validation messages.
///
/// A conflict lands on the step that declared the name second.
fn parameter_error_messages(err: WarpError) -> Vec<DocumentValidationMessage> {
    let (step_path, message) = match err {
        WarpError::ParameterConflict {
            step,
            first_step,
            parameter,
        } => (step, parameter_conflict_message(&parameter, &first_step)),
        err => ("/".to_string(), err.to_string()),
    };
    vec![DocumentValidationMessage::new(
        step_path,
        StepValidationMessage::error(message),
    )]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::parameters::{BLENDING_FACTOR, SUBJECT_MASS};
    use crate::steps::{StepKind, StepType, TpsMeshesStep};

    #[test]
    fn added_steps_get_unique_names() {
        let mut doc = ScalingDocument::new();
        let a = doc.add_step(StepType::SubjectMass.prototype());
        let b = doc.add_step(StepType::SubjectMass.prototype().with_name("subject_mass"));
        let c = doc.add_step(StepType::SubjectMass.prototype().with_name(""));
        assert_eq!(a, "/subject_mass");
        assert_eq!(b, "/subject_mass_1");
        assert_eq!(c, "/subject_mass_2");
        assert_eq!(doc.steps().len(), 3);
    }

    #[test]
    fn steps_are_found_by_path() {
        let mut doc = ScalingDocument::new();
        let path = doc.add_step(StepType::TpsStations.prototype());
        assert!(doc.step(&path).is_some());
        assert!(doc.step("/nope").is_none());
        assert!(doc.disable_step(&path));
        assert!(!doc.step(&path).unwrap().is_enabled());
        assert!(!doc.disable_step("/nope"));

        let removed = doc.remove_step(&path).unwrap();
        assert_eq!(removed.step_type(), StepType::TpsStations);
        assert!(!doc.has_scaling_steps());
    }

    #[test]
    fn overrides_replace_by_name() {
        let mut doc = ScalingDocument::new();
        doc.set_parameter_override(SUBJECT_MASS, 60.0);
        doc.set_parameter_override(BLENDING_FACTOR, 0.5);
        doc.set_parameter_override(SUBJECT_MASS, 80.0);
        assert_eq!(doc.parameter_overrides().len(), 2);
        assert_eq!(doc.parameter_overrides()[0].parameter_value, 80.0);
    }

    #[test]
    fn overrides_apply_without_a_declaring_step() {
        let mut doc = ScalingDocument::new();
        doc.set_parameter_override("custom", 2.0);
        let params = doc.effective_parameters().unwrap();
        assert_eq!(params.get("custom"), Some(2.0));
    }

    #[test]
    fn disabled_steps_declare_nothing() {
        let mut doc = ScalingDocument::new();
        let path = doc.add_step(StepType::SubjectMass.prototype());
        assert!(doc.has_scaling_parameters());
        doc.disable_step(&path);
        assert!(!doc.has_scaling_parameters());
        assert!(doc.effective_parameters().unwrap().is_empty());
    }

    #[test]
    fn no_steps_yields_an_unmodified_copy() {
        let mut source = Model::new("m");
        source.add_component("/", sim_model::Component::group("bodyset")).unwrap();
        let result = ScalingDocument::new()
            .apply_steps(&mut ScalingCache::new(), &source)
            .unwrap();
        assert!(result.is_finalized());
        assert!(result.contains("/bodyset"));
    }

    #[test]
    fn failed_steps_are_named() {
        let mut doc = ScalingDocument::new();
        let mut step = TpsMeshesStep::default();
        step.meshes.push("/nope".to_string());
        doc.add_step(ScalingStep::from_kind(StepKind::TpsMeshes(step)));
        // not validated, and the model has no location
        let err = doc
            .apply_steps(&mut ScalingCache::new(), &Model::new("m"))
            .unwrap_err();
        assert!(matches!(&err, WarpError::StepFailed { step, .. } if step == "/tps_meshes"));
    }

    #[test]
    fn save_and_load_keep_steps_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warp.json");

        let mut doc = ScalingDocument::new();
        let step_path = doc.add_step(StepType::ManualBodyScale.prototype());
        doc.step_mut(&step_path)
            .unwrap()
            .set_property("bodies", vec!["/bodyset/femur".to_string()].into())
            .unwrap();
        doc.set_parameter_override(BLENDING_FACTOR, 0.25);
        doc.save(&path).unwrap();
        assert_eq!(doc.file_location(), Some(path.as_path()));

        let loaded = ScalingDocument::load(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn loading_a_model_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        Model::new("m").save(&path).unwrap();
        let err = ScalingDocument::load(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "{}: is a valid object file, but doesn't contain a scaling document",
                path.display()
            )
        );
    }

    #[test]
    fn conflicting_declarations_become_one_error_on_the_later_step() {
        let err = merge_declarations(
            [
                (
                    "/tps_meshes".to_string(),
                    vec![ParameterDeclaration::new(BLENDING_FACTOR, 1.0)],
                ),
                (
                    "/custom_blend".to_string(),
                    vec![ParameterDeclaration::new(BLENDING_FACTOR, 0.5)],
                ),
            ],
            &[],
        )
        .unwrap_err();

        let messages = parameter_error_messages(err);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].step_path, "/custom_blend");
        assert_eq!(
            messages[0].payload.state,
            crate::validation::ValidationState::Error
        );
        assert!(messages[0]
            .payload
            .message
            .starts_with("declares a scaling parameter (blending_factor)"));
        assert!(messages[0].payload.message.contains("declared by /tps_meshes"));
    }

    #[test]
    fn merged_declarations_take_overrides_last() {
        let params = merge_declarations(
            [
                ("/a".to_string(), vec![ParameterDeclaration::new(BLENDING_FACTOR, 1.0)]),
                ("/b".to_string(), vec![ParameterDeclaration::new(BLENDING_FACTOR, 1.0)]),
            ],
            &[ParameterOverride {
                parameter_name: BLENDING_FACTOR.to_string(),
                parameter_value: 0.5,
            }],
        )
        .unwrap();
        assert_eq!(params.get(BLENDING_FACTOR), Some(0.5));
    }
}
