//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{WarpError, WarpResult};
use crate::validation::{DocumentValidationMessage, ValidationState};

/// Name of the directory warped meshes are exported into, next to the source model.
pub const WARPED_GEOMETRY_DIR: &str = "WarpedGeometry";

/// Settings for generating and exporting scaled models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Refuse to generate a scaled model while any validation message,
    /// including a warning, is outstanding. When `false`, only errors block.
    pub block_on_warnings: bool,
    /// Where exported meshes are written. `None` means
    /// `<source model directory>/WarpedGeometry`.
    pub warped_geometry_dir: Option<PathBuf>,
    /// Header comment written into exported mesh files.
    pub export_comment: String,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            block_on_warnings: true,
            warped_geometry_dir: None,
            export_comment: "model-warper".to_string(),
        }
    }
}

impl WarpConfig {
    /// Let warnings through; only errors block generation.
    #[must_use]
    pub fn allow_warnings(mut self) -> Self {
        self.block_on_warnings = false;
        self
    }

    /// Set the export directory for warped meshes.
    #[must_use]
    pub fn warped_geometry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.warped_geometry_dir = Some(dir.into());
        self
    }

    /// Set the comment written into exported mesh files.
    #[must_use]
    pub fn export_comment(mut self, comment: impl Into<String>) -> Self {
        self.export_comment = comment.into();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::InvalidConfig`] if the export comment spans
    /// several lines.
    pub fn validate(&self) -> WarpResult<()> {
        if self.export_comment.contains(['\n', '\r']) {
            return Err(WarpError::InvalidConfig(
                "export_comment must be a single line".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if `messages` should stop a scaled model from being generated.
    #[must_use]
    pub fn blocks(&self, messages: &[DocumentValidationMessage]) -> bool {
        if self.block_on_warnings {
            !messages.is_empty()
        } else {
            messages
                .iter()
                .any(|m| m.payload.state == ValidationState::Error)
        }
    }
}
