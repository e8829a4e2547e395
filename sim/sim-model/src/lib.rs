//! Anatomical model used by the warping engine.
//!
//! A [`Model`] is a tree of named [`Component`]s addressed by absolute
//! paths such as `/bodyset/femur/femur_geom`:
//!
//! - **Frames** - [`ComponentKind::Ground`], [`Body`] and [`OffsetFrame`]
//! - **Attachments** - [`Station`], [`PathPoint`], [`Mesh`] and
//!   [`WrapCylinder`], each fixed to a frame through a socket
//! - **Topology** - [`Joint`]s positioning bodies relative to other frames
//!
//! Edits leave the model unresolved. [`Model::finalize`] checks names and
//! sockets and recomputes every frame's pose in ground; pose queries fail
//! with [`ModelError::NotFinalized`] until it has run.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Persistence
//!
//! Models are stored as JSON object files (see [`object_file`]). Mesh
//! files are referenced by path and resolved next to the model file or in
//! its `Geometry/` directory.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod component;
mod error;
mod model;
pub mod object_file;
mod resolve;
mod rotation;
mod scaling;

pub use component::{
    Body, Component, ComponentData, ComponentKind, Joint, Mesh, MeshSource, OffsetFrame, PathPoint,
    Station, WrapCylinder,
};
pub use error::{ModelError, Result};
pub use model::{join_path, Model, GROUND, MODEL_OBJECT_TYPE};
pub use rotation::{body_xyz_from_rotation, rotation_from_body_xyz, transform_from_parts};
pub use scaling::BodyScale;
