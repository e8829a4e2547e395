//! Error types for the warping pipeline.

use std::path::PathBuf;

use mesh_landmarks::LandmarkError;
use mesh_tps::TpsError;
use sim_model::ModelError;
use thiserror::Error;

/// Errors raised while applying scaling steps or handling scaling documents.
///
/// Validation problems are not errors: they are reported as
/// [`StepValidationMessage`](crate::StepValidationMessage)s.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WarpError {
    /// Model query, edit or persistence error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The TPS system could not be solved.
    #[error(transparent)]
    Tps(#[from] TpsError),

    /// A landmarks file could not be read.
    #[error(transparent)]
    Landmarks(#[from] LandmarkError),

    /// A mesh could not be written.
    #[error(transparent)]
    Mesh(#[from] mesh_io::IoError),

    /// A step was applied although one of its preconditions does not hold.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A step needs a scaling parameter that has no value.
    #[error("the scaling parameter `{0}` has not been set")]
    MissingParameter(String),

    /// Two steps declare the same parameter with different defaults.
    #[error("{}: {}", .step, parameter_conflict_message(.parameter, .first_step))]
    ParameterConflict {
        /// Path of the step whose declaration conflicts.
        step: String,
        /// Path of the step that declared the parameter first.
        first_step: String,
        /// The parameter name.
        parameter: String,
    },

    /// A step has no property with this name.
    #[error("{step_type}: has no property named '{property}'")]
    UnknownProperty {
        /// Type of the step.
        step_type: &'static str,
        /// The requested property.
        property: String,
    },

    /// A property was given a value of the wrong kind.
    #[error("property '{property}' holds a {expected}, but was given a {found}")]
    WrongPropertyKind {
        /// The property.
        property: String,
        /// Kind of value the property holds.
        expected: &'static str,
        /// Kind of value that was given.
        found: &'static str,
    },

    /// An object file holds something other than a scaling document.
    #[error("{}: is a valid object file, but doesn't contain a scaling document", .0.display())]
    NotAScalingDocument(PathBuf),

    /// No step exists at the given path.
    #[error("{0}: no scaling step at this path")]
    StepNotFound(String),

    /// Applying a step failed.
    #[error("{step}: {source}")]
    StepFailed {
        /// Path of the failing step.
        step: String,
        /// What went wrong.
        #[source]
        source: Box<WarpError>,
    },

    /// An export was requested before a scaled model exists.
    #[error("there is no scaled model to export")]
    NoScaledModel,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WarpError {
    /// Create a `Precondition` error.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}

/// Describes a clash with the declaration of `parameter` made by `first_step`.
pub(crate) fn parameter_conflict_message(parameter: &str, first_step: &str) -> String {
    format!(
        "declares a scaling parameter ({parameter}) that has the same name as a scaling \
         parameter declared by {first_step}, but they differ: the engine cannot figure out how \
         to rectify this difference. The parameter should have a different name, or a \
         disambiguating prefix added to it"
    )
}

/// Result type for warping operations.
pub type WarpResult<T> = Result<T, WarpError>;
