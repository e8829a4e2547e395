//! A source model paired with the document that scales it.

use std::path::Path;

use sim_model::Model;
use tracing::info;

use crate::cache::ScalingCache;
use crate::config::WarpConfig;
use crate::document::ScalingDocument;
use crate::error::WarpResult;
use crate::validation::DocumentValidationMessage;

/// Owns a source model and a scaling document.
///
/// Both are held by value; clone the state for an independent copy.
#[derive(Debug, Clone, Default)]
pub struct ScalingState {
    source_model: Model,
    document: ScalingDocument,
}

impl ScalingState {
    /// Creates a state from an existing model and document.
    #[must_use]
    pub fn new(source_model: Model, document: ScalingDocument) -> Self {
        Self {
            source_model,
            document,
        }
    }

    /// The model being scaled.
    #[must_use]
    pub fn source_model(&self) -> &Model {
        &self.source_model
    }

    /// The scaling document.
    #[must_use]
    pub fn document(&self) -> &ScalingDocument {
        &self.document
    }

    /// The scaling document, for editing.
    pub fn document_mut(&mut self) -> &mut ScalingDocument {
        &mut self.document
    }

    /// Replaces the source model with one loaded from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or finalized. The
    /// current model is kept in that case.
    pub fn load_source_model<P: AsRef<Path>>(&mut self, path: P) -> WarpResult<()> {
        let model = Model::load(path)?;
        info!(model = %model.name, "Loaded source model");
        self.source_model = model;
        Ok(())
    }

    /// Replaces the source model with an empty one.
    pub fn reset_source_model(&mut self) {
        self.source_model = Model::default();
    }

    /// Replaces the document with one loaded from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded. The current
    /// document is kept in that case.
    pub fn load_document<P: AsRef<Path>>(&mut self, path: P) -> WarpResult<()> {
        self.document = ScalingDocument::load(path)?;
        Ok(())
    }

    /// Replaces the document with an empty one.
    pub fn reset_document(&mut self) {
        self.document = ScalingDocument::new();
    }

    /// Validates the document against the source model.
    pub fn validate(&self, cache: &mut ScalingCache) -> Vec<DocumentValidationMessage> {
        self.document.validate(cache, &self.source_model)
    }

    /// Returns `true` if validation reports anything.
    pub fn has_validation_issues(&self, cache: &mut ScalingCache) -> bool {
        !self.validate(cache).is_empty()
    }

    /// See [`ScalingDocument::try_generate_scaled_model`].
    ///
    /// # Errors
    ///
    /// Returns an error if a step fails while being applied.
    pub fn try_generate_scaled_model(
        &self,
        cache: &mut ScalingCache,
        config: &WarpConfig,
    ) -> WarpResult<Option<Model>> {
        self.document
            .try_generate_scaled_model(cache, &self.source_model, config)
    }
}
