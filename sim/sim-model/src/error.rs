//! Error types for model queries, edits and persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while querying, editing or loading a model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// No component exists at the given path.
    #[error("{0}: no component at this path")]
    ComponentNotFound(String),

    /// A component exists at the path, but it has a different type.
    #[error("{path}: expected a {expected}, found a {found}")]
    WrongComponentType {
        /// Path of the component.
        path: String,
        /// The requested component type.
        expected: &'static str,
        /// The actual component type.
        found: &'static str,
    },

    /// A component path is malformed.
    #[error("invalid component path '{0}': paths are absolute, e.g. `/bodyset/femur`")]
    InvalidPath(String),

    /// A component name is empty or contains `/`.
    #[error("invalid component name '{0}'")]
    InvalidName(String),

    /// Two siblings share a name.
    #[error("duplicate component name '{name}' under {parent}")]
    DuplicateName {
        /// Path of the parent.
        parent: String,
        /// The repeated name.
        name: String,
    },

    /// A socket does not point at a frame.
    #[error("{component}: socket `{socket}` refers to '{target}', which is not a frame in the model")]
    UnresolvedSocket {
        /// Path of the component owning the socket.
        component: String,
        /// Socket name.
        socket: &'static str,
        /// The dangling target path.
        target: String,
    },

    /// Frames or joints form a loop.
    #[error("frame cycle detected at {0}")]
    FrameCycle(String),

    /// A pose query was made on a model that has been edited since the last `finalize()`.
    #[error("model has been modified since it was last finalized")]
    NotFinalized,

    /// A mesh file could not be located.
    #[error("{file}: cannot find mesh file (searched {searched:?})")]
    MeshFileNotFound {
        /// The file named by the mesh component.
        file: PathBuf,
        /// Locations that were tried.
        searched: Vec<PathBuf>,
    },

    /// The model's total mass is zero, so it cannot be rescaled.
    #[error("cannot rescale a model with zero total mass")]
    ZeroMass,

    /// An object file holds a different object type.
    #[error("{path}: expected an object of type {expected}, found {found}")]
    WrongObjectType {
        /// Path of the file.
        path: PathBuf,
        /// The type that was requested.
        expected: String,
        /// The type stored in the file.
        found: String,
    },

    /// Mesh loading error.
    #[error("mesh error: {0}")]
    Mesh(#[from] mesh_io::IoError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Create a wrong component type error.
    pub fn wrong_type(path: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::WrongComponentType {
            path: path.into(),
            expected,
            found,
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
