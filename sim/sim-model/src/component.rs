//! Component types.
//!
//! A model is a tree of named [`Component`]s. What a component *is* lives in
//! its [`ComponentKind`]; components that attach to a frame name it through
//! a socket holding the frame's absolute path.

use std::path::PathBuf;

use mesh_types::IndexedMesh;
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::rotation::transform_from_parts;

/// A rigid body with mass properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Mass in kilograms.
    pub mass: f64,
    /// Center of mass, expressed in the body frame.
    pub mass_center: Vector3<f64>,
    /// Principal moments of inertia `(Ixx, Iyy, Izz)` about the mass center.
    pub inertia: Vector3<f64>,
}

impl Body {
    /// Creates a body with the given mass, centered at its origin, with unit inertia.
    #[must_use]
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            mass_center: Vector3::zeros(),
            inertia: Vector3::repeat(1.0),
        }
    }
}

/// A frame rigidly offset from a parent frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetFrame {
    /// Absolute path of the parent frame.
    pub parent: String,
    /// Translation expressed in the parent frame.
    pub translation: Vector3<f64>,
    /// Body-fixed X-Y-Z orientation relative to the parent frame.
    pub orientation: Vector3<f64>,
}

impl OffsetFrame {
    /// Creates an offset frame with the given translation and no rotation.
    #[must_use]
    pub fn new(parent: impl Into<String>, translation: Vector3<f64>) -> Self {
        Self {
            parent: parent.into(),
            translation,
            orientation: Vector3::zeros(),
        }
    }

    /// The transform from this frame to its parent.
    #[must_use]
    pub fn transform(&self) -> Isometry3<f64> {
        transform_from_parts(&self.translation, &self.orientation)
    }

    /// Sets translation and orientation from a transform.
    pub fn set_transform(&mut self, transform: &Isometry3<f64>) {
        self.translation = transform.translation.vector;
        self.orientation =
            crate::rotation::body_xyz_from_rotation(&transform.rotation.to_rotation_matrix());
    }
}

/// A joint connecting a child frame to a parent frame.
///
/// Joints are held at their default (zero) coordinate, so the two frames
/// coincide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Absolute path of the parent-side frame.
    pub parent_frame: String,
    /// Absolute path of the child-side frame (a body or a frame on a body).
    pub child_frame: String,
}

impl Joint {
    /// Creates a joint.
    #[must_use]
    pub fn new(parent_frame: impl Into<String>, child_frame: impl Into<String>) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
        }
    }
}

/// A fixed point on a frame (e.g. a marker or anatomical landmark).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Absolute path of the frame the station is fixed to.
    pub parent_frame: String,
    /// Location expressed in the parent frame.
    pub location: Point3<f64>,
}

impl Station {
    /// Creates a station.
    #[must_use]
    pub fn new(parent_frame: impl Into<String>, location: Point3<f64>) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            location,
        }
    }
}

/// A muscle or ligament path point fixed to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Absolute path of the frame the point is fixed to.
    pub parent_frame: String,
    /// Location expressed in the parent frame.
    pub location: Point3<f64>,
}

impl PathPoint {
    /// Creates a path point.
    #[must_use]
    pub fn new(parent_frame: impl Into<String>, location: Point3<f64>) -> Self {
        Self {
            parent_frame: parent_frame.into(),
            location,
        }
    }
}

/// Where a mesh's vertices come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeshSource {
    /// A mesh file, resolved relative to the model's directory.
    File {
        /// File path as written in the model.
        path: PathBuf,
    },
    /// Vertices held directly by the model (e.g. a warped mesh not yet exported).
    InMemory {
        /// The mesh data, expressed in the attached frame.
        mesh: IndexedMesh,
    },
}

/// Geometry attached to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Absolute path of the frame the mesh is attached to.
    pub frame: String,
    /// Per-axis scale applied to the vertices.
    pub scale_factors: Vector3<f64>,
    /// The vertex source.
    pub source: MeshSource,
}

impl Mesh {
    /// Creates a file-backed mesh with unit scale.
    #[must_use]
    pub fn from_file(frame: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            frame: frame.into(),
            scale_factors: Vector3::repeat(1.0),
            source: MeshSource::File { path: path.into() },
        }
    }

    /// Creates an in-memory mesh with unit scale.
    #[must_use]
    pub fn in_memory(frame: impl Into<String>, mesh: IndexedMesh) -> Self {
        Self {
            frame: frame.into(),
            scale_factors: Vector3::repeat(1.0),
            source: MeshSource::InMemory { mesh },
        }
    }

    /// The mesh file, if this mesh is file-backed.
    #[must_use]
    pub fn file(&self) -> Option<&std::path::Path> {
        match &self.source {
            MeshSource::File { path } => Some(path),
            MeshSource::InMemory { .. } => None,
        }
    }
}

/// A cylindrical wrap surface attached to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapCylinder {
    /// Absolute path of the frame the cylinder is attached to.
    pub frame: String,
    /// Cylinder center, expressed in the frame.
    pub translation: Vector3<f64>,
    /// Body-fixed X-Y-Z orientation; the cylinder axis is the local +Z.
    pub xyz_body_rotation: Vector3<f64>,
    /// Cylinder radius.
    pub radius: f64,
    /// Cylinder length along its axis.
    pub length: f64,
    /// Which side of the cylinder paths wrap over (`"all"`, `"+x"`, ...).
    pub quadrant: String,
}

impl WrapCylinder {
    /// Creates an axis-aligned cylinder at the frame origin.
    #[must_use]
    pub fn new(frame: impl Into<String>, radius: f64, length: f64) -> Self {
        Self {
            frame: frame.into(),
            translation: Vector3::zeros(),
            xyz_body_rotation: Vector3::zeros(),
            radius,
            length,
            quadrant: "all".to_string(),
        }
    }

    /// The transform from cylinder space to the attached frame.
    #[must_use]
    pub fn transform(&self) -> Isometry3<f64> {
        transform_from_parts(&self.translation, &self.xyz_body_rotation)
    }
}

/// What a component is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentKind {
    /// The inertial frame. Exactly one, at `/ground`.
    Ground,
    /// A plain container (e.g. `bodyset`, `jointset`).
    Group,
    /// A rigid body (a frame).
    Body(Body),
    /// A frame offset from another frame.
    OffsetFrame(OffsetFrame),
    /// A joint.
    Joint(Joint),
    /// A station.
    Station(Station),
    /// A path point.
    PathPoint(PathPoint),
    /// Attached geometry.
    Mesh(Mesh),
    /// A wrap cylinder.
    WrapCylinder(WrapCylinder),
}

impl ComponentKind {
    /// Human-readable type name, as used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Ground => "Ground",
            Self::Group => "Group",
            Self::Body(_) => "Body",
            Self::OffsetFrame(_) => "OffsetFrame",
            Self::Joint(_) => "Joint",
            Self::Station(_) => "Station",
            Self::PathPoint(_) => "PathPoint",
            Self::Mesh(_) => "Mesh",
            Self::WrapCylinder(_) => "WrapCylinder",
        }
    }

    /// Returns `true` for components that define a frame.
    #[must_use]
    pub const fn is_frame(&self) -> bool {
        matches!(self, Self::Ground | Self::Body(_) | Self::OffsetFrame(_))
    }

    /// Socket names and the frame paths they point at.
    #[must_use]
    pub fn sockets(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Ground | Self::Group | Self::Body(_) => Vec::new(),
            Self::OffsetFrame(f) => vec![("parent", f.parent.as_str())],
            Self::Joint(j) => vec![
                ("parent_frame", j.parent_frame.as_str()),
                ("child_frame", j.child_frame.as_str()),
            ],
            Self::Station(s) => vec![("parent_frame", s.parent_frame.as_str())],
            Self::PathPoint(p) => vec![("parent_frame", p.parent_frame.as_str())],
            Self::Mesh(m) => vec![("frame", m.frame.as_str())],
            Self::WrapCylinder(w) => vec![("frame", w.frame.as_str())],
        }
    }
}

/// A named node in the model tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Name, unique among siblings.
    pub name: String,
    /// What the component is.
    pub kind: ComponentKind,
    /// Child components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Component>,
}

impl Component {
    /// Creates a component with no children.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Creates an empty group.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Group)
    }

    /// Adds a child, builder style.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

/// Typed access to the data held by a [`ComponentKind`] variant.
pub trait ComponentData: Sized {
    /// Type name used in error messages.
    const TYPE_NAME: &'static str;

    /// Borrows the data if `kind` is this type.
    fn from_kind(kind: &ComponentKind) -> Option<&Self>;

    /// Mutably borrows the data if `kind` is this type.
    fn from_kind_mut(kind: &mut ComponentKind) -> Option<&mut Self>;

    /// Wraps the data in its [`ComponentKind`] variant.
    fn into_kind(self) -> ComponentKind;
}

macro_rules! component_data {
    ($($ty:ident),* $(,)?) => {
        $(
            impl ComponentData for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_kind(kind: &ComponentKind) -> Option<&Self> {
                    match kind {
                        ComponentKind::$ty(data) => Some(data),
                        _ => None,
                    }
                }

                fn from_kind_mut(kind: &mut ComponentKind) -> Option<&mut Self> {
                    match kind {
                        ComponentKind::$ty(data) => Some(data),
                        _ => None,
                    }
                }

                fn into_kind(self) -> ComponentKind {
                    ComponentKind::$ty(self)
                }
            }

            impl From<$ty> for ComponentKind {
                fn from(data: $ty) -> Self {
                    data.into_kind()
                }
            }
        )*
    };
}

component_data!(Body, OffsetFrame, Joint, Station, PathPoint, Mesh, WrapCylinder);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn typed_access_matches_variant() {
        let mut kind = ComponentKind::from(Body::new(3.0));
        assert_eq!(Body::from_kind(&kind).unwrap().mass, 3.0);
        assert!(Station::from_kind(&kind).is_none());

        Body::from_kind_mut(&mut kind).unwrap().mass = 4.0;
        assert_eq!(Body::from_kind(&kind).unwrap().mass, 4.0);
    }

    #[test]
    fn sockets_list_frame_references() {
        let joint = ComponentKind::from(Joint::new("/ground", "/bodyset/pelvis"));
        assert_eq!(
            joint.sockets(),
            vec![("parent_frame", "/ground"), ("child_frame", "/bodyset/pelvis")]
        );
        assert!(ComponentKind::Group.sockets().is_empty());
    }

    #[test]
    fn frames_are_ground_bodies_and_offsets() {
        assert!(ComponentKind::Ground.is_frame());
        assert!(ComponentKind::from(Body::new(1.0)).is_frame());
        assert!(!ComponentKind::from(Station::new("/ground", Point3::origin())).is_frame());
    }

    #[test]
    fn offset_transform_round_trips_through_angles() {
        let mut frame = OffsetFrame::new("/ground", Vector3::new(0.1, 0.2, 0.3));
        let target = Isometry3::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.2, -0.1, 0.4));
        frame.set_transform(&target);
        approx::assert_relative_eq!(
            frame.transform().to_homogeneous(),
            target.to_homogeneous(),
            epsilon = 1e-12
        );
    }
}
