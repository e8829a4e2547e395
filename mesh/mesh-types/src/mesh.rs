//! Indexed triangle mesh.

use crate::{MeshError, MeshResult, MeshTopology, Vertex};
use nalgebra::{Isometry3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Face normals shorter than this are treated as degenerate.
const DEGENERATE_NORMAL_LENGTH: f64 = 1e-10;

/// An indexed triangle mesh.
///
/// Vertices and faces are stored separately, with faces referencing
/// vertices by index. Faces use counter-clockwise winding when viewed
/// from outside.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Create a mesh from bare positions and faces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{IndexedMesh, Point3, MeshTopology};
    ///
    /// let mesh = IndexedMesh::from_positions(
    ///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
    ///     vec![[0, 1, 2]],
    /// );
    /// assert_eq!(mesh.vertex_count(), 3);
    /// ```
    #[must_use]
    pub fn from_positions(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces,
        }
    }

    /// Copy the vertex positions out into their own buffer.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Overwrite every vertex position from `positions`.
    ///
    /// Normals are left untouched; call [`recalculate_normals`](Self::recalculate_normals)
    /// afterwards if the geometry changed.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::VertexCountMismatch`] if the buffer length differs
    /// from the vertex count. The mesh is not modified in that case.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> MeshResult<()> {
        if positions.len() != self.vertices.len() {
            return Err(MeshError::VertexCountMismatch {
                expected: self.vertices.len(),
                provided: positions.len(),
            });
        }
        for (vertex, position) in self.vertices.iter_mut().zip(positions) {
            vertex.position = *position;
        }
        Ok(())
    }

    /// Apply a rigid transform to every vertex position (and normal).
    pub fn transform(&mut self, transform: &Isometry3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = transform.transform_point(&vertex.position);
            if let Some(normal) = vertex.normal.as_mut() {
                *normal = transform.transform_vector(normal);
            }
        }
    }

    /// Apply the inverse of a rigid transform to every vertex position (and normal).
    pub fn inverse_transform(&mut self, transform: &Isometry3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = transform.inverse_transform_point(&vertex.position);
            if let Some(normal) = vertex.normal.as_mut() {
                *normal = transform.inverse_transform_vector(normal);
            }
        }
    }

    /// Scale every vertex position per-axis about the origin.
    ///
    /// Normals are invalidated by non-uniform scaling, so they are cleared.
    pub fn scale_nonuniform(&mut self, factors: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position.coords.component_mul_assign(factors);
            vertex.normal = None;
        }
    }

    /// Translate every vertex position.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Recompute per-vertex normals from the faces.
    ///
    /// Each face contributes its (area-weighted) normal to its three vertices,
    /// then the sums are normalized. Vertices not referenced by any
    /// non-degenerate face end up with no normal. Faces with out-of-range
    /// indices are ignored.
    pub fn recalculate_normals(&mut self) {
        let mut sums = vec![Vector3::zeros(); self.vertices.len()];

        for &[i0, i1, i2] in &self.faces {
            let (Some(a), Some(b), Some(c)) = (
                self.vertices.get(i0 as usize),
                self.vertices.get(i1 as usize),
                self.vertices.get(i2 as usize),
            ) else {
                continue;
            };
            let face_normal = (b.position - a.position).cross(&(c.position - a.position));
            sums[i0 as usize] += face_normal;
            sums[i1 as usize] += face_normal;
            sums[i2 as usize] += face_normal;
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            let len = sum.norm();
            vertex.normal = if len > DEGENERATE_NORMAL_LENGTH {
                Some(sum / len)
            } else {
                None
            };
        }
    }

    /// Clear all vertex normals.
    pub fn clear_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.normal = None;
        }
    }

    /// Check that every face index refers to an existing vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FaceIndexOutOfBounds`] for the first bad index.
    pub fn validate(&self) -> MeshResult<()> {
        let vertex_count = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::FaceIndexOutOfBounds {
                    face,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    fn face(&self, index: usize) -> Option<[u32; 3]> {
        self.faces.get(index).copied()
    }
}

/// Helper function to create a unit cube mesh.
///
/// Creates a cube from (0,0,0) to (1,1,1) with outward-facing winding.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube, MeshTopology};
///
/// let cube = unit_cube();
/// assert_eq!(cube.vertex_count(), 8);
/// assert_eq!(cube.face_count(), 12);
/// ```
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    let positions = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];
    let faces = vec![
        // -Z
        [0, 2, 1],
        [0, 3, 2],
        // +Z
        [4, 5, 6],
        [4, 6, 7],
        // -Y
        [0, 1, 5],
        [0, 5, 4],
        // +Y
        [3, 7, 6],
        [3, 6, 2],
        // -X
        [0, 4, 7],
        [0, 7, 3],
        // +X
        [1, 2, 6],
        [1, 6, 5],
    ];
    IndexedMesh::from_positions(positions, faces)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn triangle() -> IndexedMesh {
        IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn mesh_is_empty() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());

        let mut mesh2 = IndexedMesh::new();
        mesh2.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        assert!(mesh2.is_empty());

        mesh2.faces.push([0, 0, 0]);
        assert!(!mesh2.is_empty());
    }

    #[test]
    fn set_positions_rejects_wrong_length() {
        let mut mesh = triangle();
        let err = mesh.set_positions(&[Point3::origin()]).unwrap_err();
        assert!(matches!(
            err,
            MeshError::VertexCountMismatch {
                expected: 3,
                provided: 1
            }
        ));
        assert_eq!(mesh.vertices[1].position, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn set_positions_overwrites() {
        let mut mesh = triangle();
        let doubled: Vec<_> = mesh.positions().iter().map(|p| p * 2.0).collect();
        mesh.set_positions(&doubled).unwrap();
        assert_eq!(mesh.vertices[1].position, Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn recalculate_normals_triangle_points_up() {
        let mut mesh = triangle();
        mesh.recalculate_normals();
        for v in &mesh.vertices {
            let n = v.normal.unwrap();
            assert_relative_eq!(n, Vector3::z(), epsilon = 1e-12);
        }
    }

    #[test]
    fn recalculate_normals_cube_unit_length() {
        let mut cube = unit_cube();
        cube.recalculate_normals();
        for v in &cube.vertices {
            assert_relative_eq!(v.normal.unwrap().norm(), 1.0, epsilon = 1e-12);
        }
        // Corner at the origin points away from the cube.
        let n = cube.vertices[0].normal.unwrap();
        assert!(n.x < 0.0 && n.y < 0.0 && n.z < 0.0);
    }

    #[test]
    fn recalculate_normals_skips_unreferenced_vertices() {
        let mut mesh = triangle();
        mesh.vertices.push(Vertex::from_coords(5.0, 5.0, 5.0));
        mesh.recalculate_normals();
        assert!(mesh.vertices[3].normal.is_none());
    }

    #[test]
    fn transform_then_inverse_is_identity() {
        let mut mesh = unit_cube();
        let original = mesh.positions();
        let iso = Isometry3::from_parts(
            Translation3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        );
        mesh.transform(&iso);
        mesh.inverse_transform(&iso);
        for (a, b) in mesh.positions().iter().zip(&original) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn scale_nonuniform_scales_each_axis() {
        let mut mesh = triangle();
        mesh.recalculate_normals();
        mesh.scale_nonuniform(&Vector3::new(2.0, 3.0, 4.0));
        assert_eq!(mesh.vertices[1].position, Point3::new(2.0, 0.0, 0.0));
        assert_eq!(mesh.vertices[2].position, Point3::new(0.0, 3.0, 0.0));
        assert!(mesh.vertices[0].normal.is_none());
    }

    #[test]
    fn validate_catches_bad_index() {
        let mut mesh = triangle();
        assert!(mesh.validate().is_ok());
        mesh.faces.push([0, 1, 7]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::FaceIndexOutOfBounds { face: 1, index: 7, .. })
        ));
    }
}
