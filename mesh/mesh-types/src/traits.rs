//! Traits for mesh types.

use crate::Vertex;

/// Minimal read-only view of a mesh's topology.
///
/// Lets downstream code count and index vertices and faces without
/// caring how a mesh stores them.
pub trait MeshTopology {
    /// Get the number of vertices.
    fn vertex_count(&self) -> usize;

    /// Get the number of faces (triangles).
    fn face_count(&self) -> usize;

    /// Check if the mesh is empty.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Get a vertex by index.
    ///
    /// Returns `None` if the index is out of bounds.
    fn vertex(&self, index: usize) -> Option<&Vertex>;

    /// Get a face by index.
    ///
    /// Returns `None` if the index is out of bounds.
    fn face(&self, index: usize) -> Option<[u32; 3]>;
}
