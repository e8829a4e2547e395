//! Validation messages produced by scaling steps and documents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationState {
    /// Something looks wrong, but the step could still run.
    Warning,
    /// The step cannot run.
    Error,
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A message produced by validating one scaling step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidationMessage {
    /// The step property the message is about, if any.
    pub property_name: Option<String>,
    /// Severity.
    pub state: ValidationState,
    /// Human-readable description.
    pub message: String,
}

impl StepValidationMessage {
    /// A message about the step as a whole.
    #[must_use]
    pub fn new(state: ValidationState, message: impl Into<String>) -> Self {
        Self {
            property_name: None,
            state,
            message: message.into(),
        }
    }

    /// An error about the step as a whole.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ValidationState::Error, message)
    }

    /// An error about the value held by `property`.
    #[must_use]
    pub fn property_error(property: &str, message: impl Into<String>) -> Self {
        Self {
            property_name: Some(property.to_string()),
            ..Self::error(message)
        }
    }
}

impl fmt::Display for StepValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.message)
    }
}

/// A validation message tagged with the path of the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentValidationMessage {
    /// Path of the step within the document, e.g. `/warp_meshes`.
    pub step_path: String,
    /// The step's message.
    pub payload: StepValidationMessage,
}

impl DocumentValidationMessage {
    /// Creates a document-level message.
    #[must_use]
    pub fn new(step_path: impl Into<String>, payload: StepValidationMessage) -> Self {
        Self {
            step_path: step_path.into(),
            payload,
        }
    }
}

impl fmt::Display for DocumentValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step_path, self.payload)
    }
}
