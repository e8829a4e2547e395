//! Landmark files and landmark pairing for thin-plate spline warping.
//!
//! Landmarks are stored as CSV, one landmark per row:
//!
//! ```text
//! name,x,y,z
//! knee_lateral,0.041,-0.402,0.037
//! knee_medial,-0.032,-0.398,0.041
//! ```
//!
//! The name column is optional. Source and destination landmarks are
//! paired by name with [`pair_landmarks`]; unnamed landmarks pair by the
//! order in which they appear.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```no_run
//! use mesh_landmarks::{pair_landmarks, read_landmarks_csv};
//!
//! let source = read_landmarks_csv("source.csv").unwrap();
//! let destination = read_landmarks_csv("destination.csv").unwrap();
//! let pairs = pair_landmarks(&source, &destination, |unpaired| {
//!     eprintln!("{} could not be paired", unpaired.name);
//! });
//! println!("{} landmark pairs", pairs.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod csv_io;
mod error;
mod landmark;

pub use csv_io::{read_landmarks_csv, read_landmarks_from_reader, write_landmarks_csv};
pub use error::{LandmarkError, LandmarkResult};
pub use landmark::{pair_landmarks, Landmark, LandmarkPair, PairedLandmark};
