//! The model: a component tree plus the derived state built by `finalize`.

use std::path::{Path, PathBuf};

use mesh_types::IndexedMesh;
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{Component, ComponentData, ComponentKind, Mesh, MeshSource, PathPoint, Station};
use crate::error::{ModelError, Result};
use crate::object_file::{read_object_file, write_object_file};
use crate::resolve::{resolve, Resolved};

/// Object type tag used when models are written to object files.
pub const MODEL_OBJECT_TYPE: &str = "Model";

/// Name of the ground frame; its path is `/ground`.
pub const GROUND: &str = "ground";

/// Joins a parent path and a child name into an absolute path.
///
/// ```
/// use sim_model::join_path;
///
/// assert_eq!(join_path("/", "ground"), "/ground");
/// assert_eq!(join_path("/bodyset", "femur"), "/bodyset/femur");
/// ```
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| ModelError::InvalidPath(path.to_string()))?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ModelError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(ModelError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn check_sibling_names(parent: &str, components: &[Component]) -> Result<()> {
    for (i, component) in components.iter().enumerate() {
        check_name(&component.name)?;
        if components[..i].iter().any(|c| c.name == component.name) {
            return Err(ModelError::DuplicateName {
                parent: parent.to_string(),
                name: component.name.clone(),
            });
        }
        check_sibling_names(&join_path(parent, &component.name), &component.children)?;
    }
    Ok(())
}

fn collect<'a>(parent: &str, components: &'a [Component], out: &mut Vec<(String, &'a Component)>) {
    for component in components {
        let path = join_path(parent, &component.name);
        out.push((path.clone(), component));
        collect(&path, &component.children, out);
    }
}

fn visit_mut(parent: &str, components: &mut [Component], f: &mut dyn FnMut(&str, &mut Component)) {
    for component in components {
        let path = join_path(parent, &component.name);
        f(&path, component);
        visit_mut(&path, &mut component.children, f);
    }
}

/// An anatomical model.
///
/// Edits go through `&mut self` methods and leave the model unresolved;
/// call [`Model::finalize`] before pose queries.
///
/// # Example
///
/// ```
/// use nalgebra::{Point3, Vector3};
/// use sim_model::{Body, Component, Joint, Model, Station};
///
/// let mut model = Model::new("leg");
/// model.add_component("/", Component::group("bodyset")).unwrap();
/// model.add_component("/bodyset", Component::new("femur", Body::new(9.0).into())).unwrap();
/// model.add_component("/", Component::new("hip", Joint::new("/ground", "/bodyset/femur").into())).unwrap();
/// model.add_component(
///     "/bodyset/femur",
///     Component::new("knee", Station::new("/bodyset/femur", Point3::new(0.0, -0.4, 0.0)).into()),
/// ).unwrap();
/// model.finalize().unwrap();
///
/// let knee = model.station_location_in_ground("/bodyset/femur/knee").unwrap();
/// assert_eq!(knee, Point3::new(0.0, -0.4, 0.0));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: String,
    components: Vec<Component>,
    #[serde(skip)]
    input_file: Option<PathBuf>,
    #[serde(skip)]
    resolved: Option<Resolved>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new("model")
    }
}

impl Model {
    /// Creates a model containing only `/ground`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: vec![Component::new(GROUND, ComponentKind::Ground)],
            input_file: None,
            resolved: None,
        }
    }

    /// Loads a model from an object file and finalizes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, holds another object
    /// type, or does not finalize.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = read_object_file(path)?;
        if file.object_type != MODEL_OBJECT_TYPE {
            return Err(ModelError::WrongObjectType {
                path: path.to_path_buf(),
                expected: MODEL_OBJECT_TYPE.to_string(),
                found: file.object_type,
            });
        }
        let mut model: Self = file.into_object()?;
        model.input_file = Some(path.to_path_buf());
        model.finalize()?;
        debug!(path = %path.display(), name = %model.name, "Loaded model");
        Ok(model)
    }

    /// Writes the model to an object file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_object_file(path.as_ref(), MODEL_OBJECT_TYPE, self)
    }

    /// The file this model was loaded from, if any.
    #[must_use]
    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    /// Sets (or clears) the model's filesystem location.
    pub fn set_input_file(&mut self, path: Option<PathBuf>) {
        self.input_file = path;
    }

    /// Directory containing the model file.
    #[must_use]
    pub fn model_dir(&self) -> Option<&Path> {
        self.input_file()?.parent()
    }

    /// Top-level components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns `true` if the model has not been edited since the last `finalize()`.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.resolved.is_some()
    }

    /// Runs the resolve pass: checks names and sockets and computes frame poses.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid or duplicate names, sockets that do not
    /// point at a frame, and frame cycles.
    pub fn finalize(&mut self) -> Result<()> {
        self.resolved = None;
        check_sibling_names("/", &self.components)?;
        let components = self.iter_components().collect::<Vec<_>>();
        let resolved = resolve(&components)?;
        debug!(
            components = components.len(),
            frames = resolved.poses.len(),
            "Finalized model"
        );
        self.resolved = Some(resolved);
        Ok(())
    }

    /// All components with their absolute paths, depth first.
    pub fn iter_components(&self) -> impl Iterator<Item = (String, &Component)> {
        let mut out = Vec::new();
        collect("/", &self.components, &mut out);
        out.into_iter()
    }

    pub(crate) fn visit_components_mut(&mut self, f: &mut dyn FnMut(&str, &mut Component)) {
        self.resolved = None;
        visit_mut("/", &mut self.components, f);
    }

    /// Finds a component by absolute path.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Component> {
        let parts = split_path(path).ok()?;
        let (first, rest) = parts.split_first()?;
        let mut current = self.components.iter().find(|c| c.name == *first)?;
        for part in rest {
            current = current.children.iter().find(|c| c.name == *part)?;
        }
        Some(current)
    }

    fn find_component_mut(&mut self, path: &str) -> Option<&mut Component> {
        let parts = split_path(path).ok()?;
        let (first, rest) = parts.split_first()?;
        let mut current = self.components.iter_mut().find(|c| c.name == *first)?;
        for part in rest {
            current = current.children.iter_mut().find(|c| c.name == *part)?;
        }
        Some(current)
    }

    /// Returns `true` if a component exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Returns `true` if `path` names a frame (ground, body or offset frame).
    #[must_use]
    pub fn is_frame(&self, path: &str) -> bool {
        self.find(path).is_some_and(|c| c.kind.is_frame())
    }

    /// Finds a component and borrows its typed data.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ComponentNotFound`] or
    /// [`ModelError::WrongComponentType`].
    pub fn find_as<T: ComponentData>(&self, path: &str) -> Result<&T> {
        let component = self
            .find(path)
            .ok_or_else(|| ModelError::ComponentNotFound(path.to_string()))?;
        T::from_kind(&component.kind)
            .ok_or_else(|| ModelError::wrong_type(path, T::TYPE_NAME, component.kind.type_name()))
    }

    /// Finds a component and mutably borrows its typed data.
    ///
    /// The model must be finalized again before pose queries.
    ///
    /// # Errors
    ///
    /// See [`Model::find_as`].
    pub fn find_as_mut<T: ComponentData>(&mut self, path: &str) -> Result<&mut T> {
        self.resolved = None;
        let component = self
            .find_component_mut(path)
            .ok_or_else(|| ModelError::ComponentNotFound(path.to_string()))?;
        let found = component.kind.type_name();
        T::from_kind_mut(&mut component.kind)
            .ok_or_else(|| ModelError::wrong_type(path, T::TYPE_NAME, found))
    }

    /// Adds `component` under `parent_path` (`"/"` for the top level).
    ///
    /// Returns the new component's path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist, or the name is
    /// invalid or already used by a sibling.
    pub fn add_component(&mut self, parent_path: &str, component: Component) -> Result<String> {
        check_name(&component.name)?;
        let siblings = if parent_path == "/" {
            &mut self.components
        } else {
            &mut self
                .find_component_mut(parent_path)
                .ok_or_else(|| ModelError::ComponentNotFound(parent_path.to_string()))?
                .children
        };
        if siblings.iter().any(|c| c.name == component.name) {
            return Err(ModelError::DuplicateName {
                parent: parent_path.to_string(),
                name: component.name,
            });
        }
        let path = join_path(parent_path, &component.name);
        siblings.push(component);
        self.resolved = None;
        Ok(path)
    }

    /// Removes the component at `path`, returning it with its children.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ComponentNotFound`] if nothing is at `path`.
    pub fn remove_component(&mut self, path: &str) -> Result<Component> {
        let parts = split_path(path)?;
        let not_found = || ModelError::ComponentNotFound(path.to_string());
        let (name, parent_parts) = parts.split_last().ok_or_else(not_found)?;
        let siblings = if parent_parts.is_empty() {
            &mut self.components
        } else {
            let parent = format!("/{}", parent_parts.join("/"));
            &mut self.find_component_mut(&parent).ok_or_else(not_found)?.children
        };
        let index = siblings
            .iter()
            .position(|c| c.name == *name)
            .ok_or_else(not_found)?;
        let removed = siblings.remove(index);
        self.resolved = None;
        Ok(removed)
    }

    /// Swaps the vertex source of the mesh at `path`.
    ///
    /// In-memory sources are taken to be already expressed in the mesh's
    /// frame, so the scale factors are reset to one.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a mesh.
    pub fn replace_geometry(&mut self, path: &str, source: MeshSource) -> Result<()> {
        let mesh = self.find_as_mut::<Mesh>(path)?;
        if matches!(source, MeshSource::InMemory { .. }) {
            mesh.scale_factors = Vector3::repeat(1.0);
        }
        mesh.source = source;
        Ok(())
    }

    fn resolved(&self) -> Result<&Resolved> {
        self.resolved.as_ref().ok_or(ModelError::NotFinalized)
    }

    /// Ground pose of a frame (`X_G_F`).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFinalized`] after unfinalized edits, or an
    /// error if `path` is not a frame.
    pub fn frame_transform_in_ground(&self, path: &str) -> Result<Isometry3<f64>> {
        let resolved = self.resolved()?;
        if let Some(pose) = resolved.poses.get(path) {
            return Ok(*pose);
        }
        match self.find(path) {
            Some(component) => Err(ModelError::wrong_type(path, "Frame", component.kind.type_name())),
            None => Err(ModelError::ComponentNotFound(path.to_string())),
        }
    }

    /// Transform taking coordinates in frame `from` to coordinates in frame `to`.
    ///
    /// # Errors
    ///
    /// See [`Model::frame_transform_in_ground`].
    pub fn find_transform_between(&self, from: &str, to: &str) -> Result<Isometry3<f64>> {
        let ground_from = self.frame_transform_in_ground(from)?;
        let ground_to = self.frame_transform_in_ground(to)?;
        Ok(ground_to.inverse() * ground_from)
    }

    /// Ground location of a station or path point.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is neither, or the model is not finalized.
    pub fn station_location_in_ground(&self, path: &str) -> Result<Point3<f64>> {
        let (frame, location) = if let Ok(station) = self.find_as::<Station>(path) {
            (&station.parent_frame, station.location)
        } else {
            let point = self.find_as::<PathPoint>(path)?;
            (&point.parent_frame, point.location)
        };
        Ok(self.frame_transform_in_ground(frame)? * location)
    }

    /// Locates a mesh file named by a mesh component.
    ///
    /// Absolute paths are used as they are. Relative paths are tried
    /// against the model's directory, its `Geometry/` subdirectory, and
    /// finally the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MeshFileNotFound`] listing every location tried.
    pub fn resolve_mesh_file(&self, file: &Path) -> Result<PathBuf> {
        let mut searched = Vec::new();
        if file.is_absolute() {
            searched.push(file.to_path_buf());
        } else {
            if let Some(dir) = self.model_dir() {
                searched.push(dir.join(file));
                searched.push(dir.join("Geometry").join(file));
            }
            searched.push(file.to_path_buf());
        }
        searched
            .iter()
            .find(|candidate| candidate.is_file())
            .cloned()
            .ok_or_else(|| ModelError::MeshFileNotFound {
                file: file.to_path_buf(),
                searched,
            })
    }

    /// Loads the vertices of the mesh at `path`, expressed in its frame.
    ///
    /// The component's `scale_factors` are baked into the returned vertices.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a mesh or its file cannot be loaded.
    pub fn load_mesh(&self, path: &str) -> Result<IndexedMesh> {
        let component = self.find_as::<Mesh>(path)?;
        let mut mesh = match &component.source {
            MeshSource::File { path: file } => mesh_io::load_mesh(self.resolve_mesh_file(file)?)?,
            MeshSource::InMemory { mesh } => mesh.clone(),
        };
        if component.scale_factors != Vector3::repeat(1.0) {
            mesh.scale_nonuniform(&component.scale_factors);
        }
        mesh.recalculate_normals();
        Ok(mesh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::component::{Body, Joint, OffsetFrame};
    use approx::assert_relative_eq;

    /// pelvis sits 1m above ground; femur hangs off a hip offset on the pelvis.
    fn leg() -> Model {
        let mut model = Model::new("leg");
        model.add_component("/", Component::group("bodyset")).unwrap();
        model
            .add_component("/bodyset", Component::new("pelvis", Body::new(10.0).into()))
            .unwrap();
        model
            .add_component("/bodyset", Component::new("femur", Body::new(5.0).into()))
            .unwrap();
        model
            .add_component(
                "/bodyset/pelvis",
                Component::new(
                    "hip_in_pelvis",
                    OffsetFrame::new("/bodyset/pelvis", Vector3::new(0.0, -0.1, 0.08)).into(),
                ),
            )
            .unwrap();
        model
            .add_component(
                "/bodyset/femur",
                Component::new(
                    "hip_in_femur",
                    OffsetFrame::new("/bodyset/femur", Vector3::new(0.0, 0.2, 0.0)).into(),
                ),
            )
            .unwrap();
        model
            .add_component(
                "/",
                Component::group("jointset")
                    .with_child(
                        Component::new(
                            "ground_pelvis",
                            Joint::new("/jointset/ground_pelvis/ground_offset", "/bodyset/pelvis")
                                .into(),
                        )
                        .with_child(Component::new(
                            "ground_offset",
                            OffsetFrame::new("/ground", Vector3::new(0.0, 1.0, 0.0)).into(),
                        )),
                    )
                    .with_child(Component::new(
                        "hip",
                        Joint::new("/bodyset/pelvis/hip_in_pelvis", "/bodyset/femur/hip_in_femur")
                            .into(),
                    )),
            )
            .unwrap();
        model
            .add_component(
                "/bodyset/femur",
                Component::new(
                    "knee",
                    Station::new("/bodyset/femur", Point3::new(0.0, -0.4, 0.0)).into(),
                ),
            )
            .unwrap();
        model.finalize().unwrap();
        model
    }

    #[test]
    fn new_model_has_ground() {
        let mut model = Model::new("empty");
        assert!(model.contains("/ground"));
        model.finalize().unwrap();
        assert_eq!(
            model.frame_transform_in_ground("/ground").unwrap(),
            Isometry3::identity()
        );
    }

    #[test]
    fn body_pose_follows_joint_chain() {
        let model = leg();
        let femur = model.frame_transform_in_ground("/bodyset/femur").unwrap();
        assert_relative_eq!(
            femur.translation.vector,
            Vector3::new(0.0, 0.7, 0.08),
            epsilon = 1e-12
        );

        let knee = model.station_location_in_ground("/bodyset/femur/knee").unwrap();
        assert_relative_eq!(knee, Point3::new(0.0, 0.3, 0.08), epsilon = 1e-12);
    }

    #[test]
    fn transform_between_maps_from_one_frame_into_another() {
        let model = leg();
        let femur_to_pelvis = model
            .find_transform_between("/bodyset/femur", "/bodyset/pelvis")
            .unwrap();
        let p = femur_to_pelvis * Point3::origin();
        assert_relative_eq!(p, Point3::new(0.0, -0.3, 0.08), epsilon = 1e-12);
    }

    #[test]
    fn edits_require_refinalize() {
        let mut model = leg();
        model.find_as_mut::<Body>("/bodyset/femur").unwrap().mass = 6.0;
        assert!(!model.is_finalized());
        assert!(matches!(
            model.frame_transform_in_ground("/bodyset/femur"),
            Err(ModelError::NotFinalized)
        ));
        model.finalize().unwrap();
        assert!(model.frame_transform_in_ground("/bodyset/femur").is_ok());
    }

    #[test]
    fn typed_lookup_reports_wrong_type() {
        let model = leg();
        let err = model.find_as::<Station>("/bodyset/femur").unwrap_err();
        assert!(matches!(
            err,
            ModelError::WrongComponentType { expected: "Station", found: "Body", .. }
        ));
        assert!(matches!(
            model.find_as::<Body>("/bodyset/tibia"),
            Err(ModelError::ComponentNotFound(_))
        ));
        assert!(model.find("bodyset/femur").is_none());
    }

    #[test]
    fn dangling_socket_fails_finalize() {
        let mut model = leg();
        model
            .add_component(
                "/",
                Component::new("lost", Station::new("/bodyset/tibia", Point3::origin()).into()),
            )
            .unwrap();
        assert!(matches!(
            model.finalize(),
            Err(ModelError::UnresolvedSocket { socket: "parent_frame", .. })
        ));
    }

    #[test]
    fn socket_to_non_frame_fails_finalize() {
        let mut model = leg();
        model
            .add_component(
                "/",
                Component::new("odd", Station::new("/bodyset/femur/knee", Point3::origin()).into()),
            )
            .unwrap();
        assert!(matches!(model.finalize(), Err(ModelError::UnresolvedSocket { .. })));
    }

    #[test]
    fn offset_cycle_is_detected() {
        let mut model = Model::new("loop");
        model
            .add_component("/", Component::new("a", OffsetFrame::new("/b", Vector3::zeros()).into()))
            .unwrap();
        model
            .add_component("/", Component::new("b", OffsetFrame::new("/a", Vector3::zeros()).into()))
            .unwrap();
        assert!(matches!(model.finalize(), Err(ModelError::FrameCycle(_))));
    }

    #[test]
    fn duplicate_sibling_is_rejected() {
        let mut model = leg();
        let err = model
            .add_component("/bodyset", Component::new("femur", Body::new(1.0).into()))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { .. }));
        assert!(matches!(
            model.add_component("/", Component::group("a/b")),
            Err(ModelError::InvalidName(_))
        ));
    }

    #[test]
    fn remove_component_takes_children_along() {
        let mut model = leg();
        let removed = model.remove_component("/bodyset/femur").unwrap();
        assert_eq!(removed.children.len(), 2);
        assert!(!model.contains("/bodyset/femur/knee"));
        assert!(model.remove_component("/bodyset/femur").is_err());
    }

    #[test]
    fn iter_components_is_depth_first() {
        let model = leg();
        let paths: Vec<String> = model.iter_components().map(|(path, _)| path).collect();
        let femur = paths.iter().position(|p| p == "/bodyset/femur").unwrap();
        assert_eq!(paths[femur + 1], "/bodyset/femur/hip_in_femur");
        assert_eq!(paths[0], "/ground");
    }

    #[test]
    fn load_mesh_searches_geometry_dir_and_applies_scale() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Geometry")).unwrap();
        std::fs::write(
            dir.path().join("Geometry").join("tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();

        let mut model = leg();
        model.set_input_file(Some(dir.path().join("leg.json")));
        let mut mesh = Mesh::from_file("/bodyset/femur", "tri.obj");
        mesh.scale_factors = Vector3::new(2.0, 3.0, 1.0);
        model
            .add_component("/bodyset/femur", Component::new("geom", mesh.into()))
            .unwrap();

        let loaded = model.load_mesh("/bodyset/femur/geom").unwrap();
        assert_eq!(loaded.vertices[1].position, Point3::new(2.0, 0.0, 0.0));
        assert_eq!(loaded.vertices[2].position, Point3::new(0.0, 3.0, 0.0));

        model
            .replace_geometry("/bodyset/femur/geom", MeshSource::InMemory { mesh: loaded })
            .unwrap();
        let geom = model.find_as::<Mesh>("/bodyset/femur/geom").unwrap();
        assert_eq!(geom.scale_factors, Vector3::repeat(1.0));
        assert!(geom.file().is_none());
    }

    #[test]
    fn missing_mesh_file_lists_search_locations() {
        let mut model = leg();
        model.set_input_file(Some(PathBuf::from("/nonexistent/models/leg.json")));
        model
            .add_component(
                "/bodyset/femur",
                Component::new("geom", Mesh::from_file("/bodyset/femur", "femur.stl").into()),
            )
            .unwrap();
        match model.load_mesh("/bodyset/femur/geom") {
            Err(ModelError::MeshFileNotFound { searched, .. }) => assert_eq!(searched.len(), 3),
            other => panic!("expected MeshFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leg.json");
        let model = leg();
        model.save(&path).unwrap();

        let loaded = Model::load(&path).unwrap();
        assert_eq!(loaded.input_file(), Some(path.as_path()));
        assert_eq!(loaded.components(), model.components());
        assert!(loaded.is_finalized());
    }

    #[test]
    fn loading_other_object_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"type": "Something", "object": {}}"#).unwrap();
        assert!(matches!(
            Model::load(&path),
            Err(ModelError::WrongObjectType { .. })
        ));
    }
}
