//! Interactive scaling: state, cache and a memoized outcome.

use std::fmt;
use std::path::Path;

use sim_model::Model;
use tracing::{info, warn};

use crate::cache::{CacheStats, ScalingCache};
use crate::config::WarpConfig;
use crate::export::export_warped_model;
use crate::error::{WarpError, WarpResult};
use crate::parameters::ScalingParameters;
use crate::state::ScalingState;
use crate::steps::ScalingStep;
use crate::validation::DocumentValidationMessage;

/// Result of the last scaling attempt.
#[derive(Debug, Clone)]
pub enum ScalingOutcome {
    /// The scaled model.
    Scaled(Model),
    /// Validation stopped generation.
    Invalid(Vec<DocumentValidationMessage>),
    /// A step failed while being applied.
    Failed(String),
}

impl ScalingOutcome {
    /// The scaled model, if generation succeeded.
    #[must_use]
    pub const fn scaled_model(&self) -> Option<&Model> {
        match self {
            Self::Scaled(model) => Some(model),
            _ => None,
        }
    }
}

impl fmt::Display for ScalingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaled(model) => write!(f, "scaled model '{}'", model.name),
            Self::Invalid(messages) => write!(f, "{} validation message(s)", messages.len()),
            Self::Failed(message) => write!(f, "scaling failed: {message}"),
        }
    }
}

/// Keeps a [`ScalingState`] with the cache and the outcome derived from it.
///
/// The outcome is computed on first request and kept until the state is
/// edited through the session. Apply errors end up in
/// [`ScalingOutcome::Failed`] rather than propagating.
#[derive(Debug)]
pub struct ScalingSession {
    state: ScalingState,
    cache: ScalingCache,
    config: WarpConfig,
    outcome: Option<ScalingOutcome>,
}

impl ScalingSession {
    /// Creates a session.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(state: ScalingState, config: WarpConfig) -> WarpResult<Self> {
        config.validate()?;
        Ok(Self {
            state,
            cache: ScalingCache::new(),
            config,
            outcome: None,
        })
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &ScalingState {
        &self.state
    }

    /// The session's configuration.
    #[must_use]
    pub const fn config(&self) -> &WarpConfig {
        &self.config
    }

    /// Edits the state and discards the current outcome.
    pub fn update<R>(&mut self, edit: impl FnOnce(&mut ScalingState) -> R) -> R {
        self.outcome = None;
        edit(&mut self.state)
    }

    /// Appends a step. Returns its path.
    pub fn add_step(&mut self, step: ScalingStep) -> String {
        self.update(|state| state.document_mut().add_step(step))
    }

    /// Removes the step at `path`.
    pub fn remove_step(&mut self, path: &str) -> Option<ScalingStep> {
        self.update(|state| state.document_mut().remove_step(path))
    }

    /// Edits the step at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::StepNotFound`] if there is no such step, or the
    /// error returned by `edit`.
    pub fn edit_step(
        &mut self,
        path: &str,
        edit: impl FnOnce(&mut ScalingStep) -> WarpResult<()>,
    ) -> WarpResult<()> {
        self.update(|state| {
            let step = state
                .document_mut()
                .step_mut(path)
                .ok_or_else(|| WarpError::StepNotFound(path.to_string()))?;
            edit(step)
        })
    }

    /// Sets a parameter override.
    pub fn set_parameter_override(&mut self, name: &str, value: f64) {
        self.update(|state| state.document_mut().set_parameter_override(name, value));
    }

    /// Loads a new source model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load_source_model<P: AsRef<Path>>(&mut self, path: P) -> WarpResult<()> {
        self.update(|state| state.load_source_model(path))
    }

    /// Loads a new scaling document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded.
    pub fn load_document<P: AsRef<Path>>(&mut self, path: P) -> WarpResult<()> {
        self.update(|state| state.load_document(path))
    }

    /// Effective parameters of the current document.
    ///
    /// # Errors
    ///
    /// Returns an error if two steps declare a parameter differently.
    pub fn effective_parameters(&self) -> WarpResult<ScalingParameters> {
        self.state.document().effective_parameters()
    }

    /// Validation messages for the current state.
    pub fn validate(&mut self) -> Vec<DocumentValidationMessage> {
        self.state.validate(&mut self.cache)
    }

    /// The outcome of scaling the current state, computed if needed.
    pub fn outcome(&mut self) -> &ScalingOutcome {
        let Self {
            state,
            cache,
            config,
            outcome,
        } = self;
        outcome.get_or_insert_with(|| {
            let messages = state.validate(cache);
            if config.blocks(&messages) {
                info!(messages = messages.len(), "Scaling blocked by validation");
                return ScalingOutcome::Invalid(messages);
            }
            match state.document().apply_steps(cache, state.source_model()) {
                Ok(model) => ScalingOutcome::Scaled(model),
                Err(err) => {
                    warn!(error = %err, "Scaling failed");
                    ScalingOutcome::Failed(err.to_string())
                }
            }
        })
    }

    /// Discards the outcome so the next request recomputes it.
    pub fn retry(&mut self) {
        self.outcome = None;
    }

    /// Empties the cache. The outcome is kept.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Cache counters.
    #[must_use]
    pub const fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Exports the scaled model to `output_path`, computing it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::NoScaledModel`] if scaling was blocked or
    /// failed, or an error if writing fails.
    pub fn export<P: AsRef<Path>>(&mut self, output_path: P) -> WarpResult<Model> {
        let ScalingOutcome::Scaled(model) = self.outcome() else {
            return Err(WarpError::NoScaledModel);
        };
        let model = model.clone();
        export_warped_model(
            model,
            self.state.source_model(),
            &self.config,
            output_path.as_ref(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::document::ScalingDocument;
    use crate::steps::StepType;

    fn empty_session() -> ScalingSession {
        ScalingSession::new(ScalingState::default(), WarpConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = WarpConfig::default().export_comment("two\nlines");
        assert!(ScalingSession::new(ScalingState::default(), config).is_err());
    }

    #[test]
    fn outcome_is_memoized_until_an_edit() {
        let mut session = empty_session();
        assert!(session.outcome().scaled_model().is_some());

        session.add_step(StepType::SubjectMass.prototype());
        assert!(matches!(session.outcome(), ScalingOutcome::Invalid(m) if m.len() == 1));
    }

    #[test]
    fn apply_errors_become_failed_outcomes() {
        let (_dir, model) = crate::fixtures::arm();
        let mut state = ScalingState::new(model, ScalingDocument::new());
        // the elbow station sits at the cylinder's origin, so no direction exists
        let path = state
            .document_mut()
            .add_step(StepType::WrapCylinderRotationFromStation.prototype());
        let step = state.document_mut().step_mut(&path).unwrap();
        step.set_property("station_path", "/bodyset/humerus/elbow".into())
            .unwrap();
        step.set_property("wrap_cylinder_path", "/bodyset/humerus/elbow_wrap".into())
            .unwrap();

        let mut session = ScalingSession::new(state, WarpConfig::default()).unwrap();
        assert!(session.validate().is_empty());
        let ScalingOutcome::Failed(message) = session.outcome() else {
            panic!("expected a failure");
        };
        assert!(message.starts_with("/wrap_cylinder_rotation_from_station: precondition failed"));

        session.retry();
        assert!(matches!(session.outcome(), ScalingOutcome::Failed(_)));
    }

    #[test]
    fn failed_outcome_display() {
        let outcome = ScalingOutcome::Failed("/tps_meshes: boom".to_string());
        assert_eq!(outcome.to_string(), "scaling failed: /tps_meshes: boom");
    }

    #[test]
    fn edit_step_requires_a_step() {
        let mut session = empty_session();
        let err = session.edit_step("/nope", |_| Ok(())).unwrap_err();
        assert!(matches!(err, WarpError::StepNotFound(_)));
    }

    #[test]
    fn export_needs_a_scaled_model() {
        let mut session = empty_session();
        session.add_step(StepType::SubjectMass.prototype());
        let dir = tempfile::tempdir().unwrap();
        let err = session.export(dir.path().join("out.json")).unwrap_err();
        assert!(matches!(err, WarpError::NoScaledModel));
    }
}
