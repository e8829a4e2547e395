//! Mesh file I/O for the model warping pipeline.
//!
//! Models reference their geometry by file. This crate loads those files
//! into [`IndexedMesh`] and writes warped meshes back out:
//!
//! - **STL** (Stereolithography) - Binary and ASCII, load only
//! - **OBJ** (Wavefront) - ASCII, load and save
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_mesh, save_obj};
//!
//! // Format detected from the extension
//! let mesh = load_mesh("Geometry/femur.stl").unwrap();
//! save_obj(&mesh, "WarpedGeometry/femur.obj", "model-warper").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod obj;
mod stl;

pub use error::{IoError, IoResult};
pub use obj::{load_obj, parse_obj, save_obj};
pub use stl::load_stl;

use std::path::Path;

use mesh_types::IndexedMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// STL (Stereolithography), binary or ASCII.
    Stl,
    /// OBJ (Wavefront), ASCII.
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension (case-insensitive).
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
        }
    }
}

/// Load a mesh from a file, detecting format from extension.
///
/// # Errors
///
/// Returns an error if:
/// - The file format cannot be determined from the extension
/// - The file cannot be read
/// - The file content is invalid for the detected format
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;

    let mesh = match format {
        MeshFormat::Stl => load_stl(path)?,
        MeshFormat::Obj => load_obj(path)?,
    };
    mesh.validate()
        .map_err(|e| IoError::invalid_content(format!("{}: {e}", path.display())))?;
    Ok(mesh)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path() {
        assert_eq!(MeshFormat::from_path("model.stl"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("model.STL"), Some(MeshFormat::Stl));
        assert_eq!(
            MeshFormat::from_path("/path/to/model.obj"),
            Some(MeshFormat::Obj)
        );
        assert_eq!(MeshFormat::from_path("model.vtp"), None);
        assert_eq!(MeshFormat::from_path("model"), None);
    }

    #[test]
    fn format_extension() {
        assert_eq!(MeshFormat::Stl.extension(), "stl");
        assert_eq!(MeshFormat::Obj.extension(), "obj");
    }

    #[test]
    fn load_mesh_rejects_unknown_extension() {
        let err = load_mesh("bone.vtp").unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { extension } if extension == "vtp"));
    }

    #[test]
    fn load_mesh_dispatches_to_obj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.OBJ");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = load_mesh(&path).unwrap();
        assert_eq!(mesh.faces.len(), 1);
    }
}
