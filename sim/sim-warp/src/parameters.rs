//! Scaling parameters: declarations made by steps, overrides stored in
//! documents, and the merged values steps see at apply time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{WarpError, WarpResult};

/// The blend factor every TPS step reads.
pub const BLENDING_FACTOR: &str = "blending_factor";

/// The target mass read by the mass-scaling step.
pub const SUBJECT_MASS: &str = "subject_mass";

/// A parameter a step needs at apply time, with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Parameter name.
    pub name: String,
    /// Value used when the document does not override it.
    pub default_value: f64,
}

impl ParameterDeclaration {
    /// Creates a declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, default_value: f64) -> Self {
        Self {
            name: name.into(),
            default_value,
        }
    }
}

/// A document-level value that replaces a declared default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    /// Parameter name.
    pub parameter_name: String,
    /// Value to use.
    pub parameter_value: f64,
}

/// Effective parameter values, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingParameters {
    values: BTreeMap<String, f64>,
    // name -> path of the first step that declared it
    declared_by: BTreeMap<String, String>,
}

impl ScalingParameters {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Looks up a value that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::MissingParameter`] if `name` has no value.
    pub fn require(&self, name: &str) -> WarpResult<f64> {
        self.get(name)
            .ok_or_else(|| WarpError::MissingParameter(name.to_string()))
    }

    /// Sets a value, replacing any existing one.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Adds a declared default.
    ///
    /// A name that is already present must carry the same default.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::ParameterConflict`] naming `step_path` and the
    /// step that declared the name first if the defaults differ.
    pub fn declare(&mut self, step_path: &str, declaration: &ParameterDeclaration) -> WarpResult<()> {
        match self.values.get(&declaration.name) {
            #[allow(clippy::float_cmp)]
            // defaults are literal values, so exact comparison is intended
            Some(existing) if *existing != declaration.default_value => {
                Err(WarpError::ParameterConflict {
                    step: step_path.to_string(),
                    first_step: self
                        .declared_by
                        .get(&declaration.name)
                        .cloned()
                        .unwrap_or_default(),
                    parameter: declaration.name.clone(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.values
                    .insert(declaration.name.clone(), declaration.default_value);
                self.declared_by
                    .insert(declaration.name.clone(), step_path.to_string());
                Ok(())
            }
        }
    }

    /// Name/value pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn equal_declarations_merge() {
        let mut params = ScalingParameters::new();
        params
            .declare("/a", &ParameterDeclaration::new(BLENDING_FACTOR, 1.0))
            .unwrap();
        params
            .declare("/b", &ParameterDeclaration::new(BLENDING_FACTOR, 1.0))
            .unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get(BLENDING_FACTOR), Some(1.0));
    }

    #[test]
    fn differing_declarations_conflict() {
        let mut params = ScalingParameters::new();
        params
            .declare("/a", &ParameterDeclaration::new(BLENDING_FACTOR, 1.0))
            .unwrap();
        let err = params
            .declare("/b", &ParameterDeclaration::new(BLENDING_FACTOR, 0.5))
            .unwrap_err();
        assert!(matches!(
            &err,
            WarpError::ParameterConflict { step, first_step, parameter }
                if step == "/b" && first_step == "/a" && parameter == BLENDING_FACTOR
        ));
        let message = err.to_string();
        assert!(message.starts_with("/b: declares a scaling parameter (blending_factor)"));
        assert!(message.contains("declared by /a"));
    }

    #[test]
    fn require_reports_missing_names() {
        let params = ScalingParameters::new();
        assert!(matches!(
            params.require(SUBJECT_MASS),
            Err(WarpError::MissingParameter(name)) if name == SUBJECT_MASS
        ));
    }
}
