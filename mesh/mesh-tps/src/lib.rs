//! 3D thin-plate spline (TPS) warping.
//!
//! Given corresponding source and destination landmarks, [`solve_coefficients`]
//! fits a warp that maps each source landmark exactly onto its destination
//! and deforms the space in between as smoothly as possible. The fitted
//! [`TpsCoefficients`] are then applied to points or whole meshes.
//!
//! The warp is an affine part (translation, rotation, scale) plus one
//! radial term per landmark. The affine components and the radial part can
//! each be switched off independently through [`ThinPlateSplineInputs`].
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```
//! use mesh_tps::{solve_coefficients, warp_mesh, Correspondence, ThinPlateSplineInputs};
//! use mesh_types::unit_cube;
//! use nalgebra::{Point3, Vector3};
//!
//! let landmarks = vec![
//!     Correspondence::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)),
//!     Correspondence::new(Point3::new(1.0, 0.0, 0.0), Point3::new(1.2, 0.0, 0.0)),
//!     Correspondence::new(Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 1.0, 0.0)),
//!     Correspondence::new(Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 0.9)),
//! ];
//! let coefficients = solve_coefficients(&ThinPlateSplineInputs::new(landmarks)).unwrap();
//!
//! // Apply half of the warp
//! let warped = warp_mesh(&coefficients, &unit_cube(), 0.5);
//! assert_eq!(warped.vertices.len(), 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod coefficients;
mod error;
mod solver;
mod warp;

pub use coefficients::{affine_transform_without_scale, radial_basis, TpsCoefficients, TpsTerm};
pub use error::{TpsError, TpsResult};
pub use solver::{solve_coefficients, Correspondence, ThinPlateSplineInputs};
pub use warp::{warp_mesh, warp_point, warp_points_in_place};
