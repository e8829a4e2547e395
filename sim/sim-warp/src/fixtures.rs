//! Shared test models and landmark files.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use mesh_landmarks::{write_landmarks_csv, Landmark};
use nalgebra::{Point3, Vector3};
use sim_model::{
    Body, Component, ComponentKind, Joint, Mesh, Model, OffsetFrame, PathPoint, Station, WrapCylinder,
};
use tempfile::TempDir;

/// Landmarks on the source model.
pub const SOURCE_LANDMARKS: &str = "source.csv";
/// `SOURCE_LANDMARKS` scaled by two about the origin.
pub const DOUBLED_LANDMARKS: &str = "doubled.csv";

const CORNERS: [[f64; 3]; 5] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
];

/// Writes named landmarks at `CORNERS`, mapped through `f`.
pub fn write_landmarks(dir: &Path, file: &str, f: impl Fn(Point3<f64>) -> Point3<f64>) {
    let landmarks: Vec<Landmark> = CORNERS
        .iter()
        .enumerate()
        .map(|(i, c)| Landmark::named(format!("lm{i}"), f(Point3::new(c[0], c[1], c[2]))))
        .collect();
    write_landmarks_csv(dir.join(file), &landmarks).unwrap();
}

/// An arm in a temporary directory, with landmarks describing a 2x scale about the origin.
///
/// ```text
/// /ground
/// /bodyset/humerus                 body at the ground origin
///     humerus_geom                 unit cube mesh (cube.obj)
///     elbow                        station at (0, -0.3, 0)
///     biceps_origin                path point at (0.02, -0.05, 0)
///     elbow_offset                 offset frame at (0, -0.3, 0)
///     elbow_wrap                   cylinder at (0, -0.3, 0), radius 0.02
/// /jointset/shoulder               ground -> humerus
/// ```
pub fn arm() -> (TempDir, Model) {
    let dir = tempfile::tempdir().unwrap();
    mesh_io::save_obj(&mesh_types::unit_cube(), dir.path().join("cube.obj"), "").unwrap();
    write_landmarks(dir.path(), SOURCE_LANDMARKS, |p| p);
    write_landmarks(dir.path(), DOUBLED_LANDMARKS, |p| Point3::from(p.coords * 2.0));

    let humerus = "/bodyset/humerus";
    let mut wrap = WrapCylinder::new(humerus, 0.02, 0.1);
    wrap.translation = Vector3::new(0.0, -0.3, 0.0);

    let mut model = Model::new("arm");
    model.add_component("/", Component::group("bodyset")).unwrap();
    model
        .add_component("/bodyset", Component::new("humerus", ComponentKind::Body(Body::new(2.0))))
        .unwrap();
    let attachments = [
        ("humerus_geom", ComponentKind::Mesh(Mesh::from_file(humerus, "cube.obj"))),
        (
            "elbow",
            ComponentKind::Station(Station::new(humerus, Point3::new(0.0, -0.3, 0.0))),
        ),
        (
            "biceps_origin",
            ComponentKind::PathPoint(PathPoint::new(humerus, Point3::new(0.02, -0.05, 0.0))),
        ),
        (
            "elbow_offset",
            ComponentKind::OffsetFrame(OffsetFrame::new(humerus, Vector3::new(0.0, -0.3, 0.0))),
        ),
        ("elbow_wrap", ComponentKind::WrapCylinder(wrap)),
    ];
    for (name, kind) in attachments {
        model.add_component(humerus, Component::new(name, kind)).unwrap();
    }
    model.add_component("/", Component::group("jointset")).unwrap();
    model
        .add_component(
            "/jointset",
            Component::new(
                "shoulder",
                ComponentKind::Joint(Joint::new("/ground", humerus)),
            ),
        )
        .unwrap();
    model.set_input_file(Some(dir.path().join("arm.json")));
    model.finalize().unwrap();
    (dir, model)
}
