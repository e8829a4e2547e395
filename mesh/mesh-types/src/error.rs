//! Error types for mesh container operations.

use thiserror::Error;

/// Errors raised by [`IndexedMesh`](crate::IndexedMesh) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MeshError {
    /// A replacement position buffer had the wrong length.
    #[error("position buffer has {provided} entries, but the mesh has {expected} vertices")]
    VertexCountMismatch {
        /// Number of vertices in the mesh.
        expected: usize,
        /// Number of positions supplied.
        provided: usize,
    },

    /// A face refers to a vertex that does not exist.
    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    FaceIndexOutOfBounds {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },
}

/// Result type for mesh container operations.
pub type MeshResult<T> = Result<T, MeshError>;
