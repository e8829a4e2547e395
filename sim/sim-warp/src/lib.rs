//! Landmark-driven scaling of anatomical models.
//!
//! A [`ScalingDocument`] is an ordered list of [`ScalingStep`]s, each one
//! editing a working copy of a source [`Model`](sim_model::Model):
//!
//! - **TPS steps** warp meshes, stations, path points, offset frames and
//!   wrap cylinders with a thin-plate spline fitted to pairs of landmark
//!   CSV files (see [`mesh_tps`])
//! - **Body steps** scale masses to a subject or scale bodies by hand
//! - **Wrap cylinder steps** refit a cylinder's radius or orientation to a
//!   station
//!
//! Steps read named scaling parameters (such as [`BLENDING_FACTOR`]) that
//! the document resolves from their declarations and its own overrides.
//! Validation reports problems as messages without touching anything;
//! generation applies the enabled steps in order and is skipped when
//! validation blocks it.
//!
//! TPS solves and mesh warps are memoized in a [`ScalingCache`], so
//! re-running a document after an edit only recomputes what changed.
//! [`ScalingSession`] ties a [`ScalingState`] to a cache and keeps the last
//! outcome until the next edit.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```no_run
//! use sim_warp::{ScalingSession, ScalingState, StepType, WarpConfig};
//!
//! let mut state = ScalingState::default();
//! state.load_source_model("subject/arm.json")?;
//!
//! let mut step = StepType::TpsMeshes.prototype();
//! step.set_property("source_landmarks_file", "arm_source.csv".into())?;
//! step.set_property("destination_landmarks_file", "arm_subject.csv".into())?;
//! step.set_property("meshes", vec!["/bodyset/humerus/humerus_geom".to_string()].into())?;
//! state.document_mut().add_step(step);
//!
//! let mut session = ScalingSession::new(state, WarpConfig::default())?;
//! println!("{}", session.outcome());
//! session.export("subject/arm_scaled.json")?;
//! # Ok::<(), sim_warp::WarpError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod cache;
mod config;
mod document;
mod error;
mod export;
mod parameters;
mod session;
mod state;
mod steps;
mod validation;

#[cfg(test)]
mod fixtures;

pub use cache::{CacheStats, ScalingCache, TpsInputs};
pub use config::{WarpConfig, WARPED_GEOMETRY_DIR};
pub use document::{ScalingDocument, DOCUMENT_OBJECT_TYPE};
pub use error::{WarpError, WarpResult};
pub use export::export_warped_model;
pub use parameters::{
    ParameterDeclaration, ParameterOverride, ScalingParameters, BLENDING_FACTOR, SUBJECT_MASS,
};
pub use session::{ScalingOutcome, ScalingSession};
pub use state::ScalingState;
pub use steps::{
    AffineToggles, ManualBodyScaleStep, PropertyValue, ScalingStep, StepKind, StepType,
    SubjectMassStep, TpsLandmarks, TpsMeshSubstitutionStep, TpsMeshesStep, TpsOffsetFramesStep,
    TpsPathPointsStep, TpsStationsStep, TpsWrapCylindersStep, WrapCylinderRadiusFromStationStep,
    WrapCylinderRotationFromStationStep, STEP_TYPES,
};
pub use validation::{DocumentValidationMessage, StepValidationMessage, ValidationState};
