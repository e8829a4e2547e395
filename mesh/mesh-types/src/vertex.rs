//! Vertex type.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mesh vertex: a position plus an optional unit normal.
///
/// Normals are derived data. Anything that moves vertices is expected to
/// call [`IndexedMesh::recalculate_normals`](crate::IndexedMesh::recalculate_normals)
/// afterwards rather than transforming the old normals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in the mesh's local coordinate system.
    pub position: Point3<f64>,

    /// Unit normal, if one has been computed or loaded.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a vertex at `position` with no normal.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{Point3, Vertex};
    ///
    /// let v = Vertex::new(Point3::new(1.0, 2.0, 3.0));
    /// assert!(v.normal.is_none());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    #[must_use]
    pub const fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Create a vertex with a normal already attached.
    #[inline]
    #[must_use]
    pub const fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            normal: Some(normal),
        }
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}
