//! Core mesh types for the model warping pipeline.
//!
//! This crate provides the mesh container that the warping engine converts
//! model geometry into and out of:
//!
//! - [`Vertex`] - A position with an optional unit normal
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Units
//!
//! This library is **unit-agnostic**. All coordinates are `f64`. Models
//! loaded by `sim-model` are in meters.
//!
//! # Example
//!
//! ```
//! use mesh_types::{IndexedMesh, MeshTopology, Point3};
//!
//! let mut mesh = IndexedMesh::from_positions(
//!     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
//!     vec![[0, 1, 2]],
//! );
//! mesh.recalculate_normals();
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(mesh.vertices.iter().all(|v| v.normal.is_some()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod mesh;
mod traits;
mod vertex;

pub use error::{MeshError, MeshResult};
pub use mesh::{unit_cube, IndexedMesh};
pub use traits::MeshTopology;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Isometry3, Point3, Vector3};
