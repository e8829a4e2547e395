//! Writing a scaled model and its warped meshes to disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use sim_model::{ComponentKind, Mesh, MeshSource, Model};
use tracing::{debug, info};

use crate::config::{WarpConfig, WARPED_GEOMETRY_DIR};
use crate::error::WarpResult;

/// Saves `result` to `output_path`, writing its in-memory meshes as OBJ files first.
///
/// Warped meshes go to `config.warped_geometry_dir`, or by default to
/// `WarpedGeometry/` next to the source model (next to `output_path` if the
/// source model has no location). Each is named after the mesh file the
/// source model used at the same path, or after the component when there is
/// none. The exported model references those files, relative to the output
/// directory where possible.
///
/// Returns the model as saved.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be written, or the model
/// does not finalize.
pub fn export_warped_model(
    mut result: Model,
    source_model: &Model,
    config: &WarpConfig,
    output_path: &Path,
) -> WarpResult<Model> {
    let output_dir = output_path
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);
    let geometry_dir = config.warped_geometry_dir.clone().unwrap_or_else(|| {
        source_model
            .model_dir()
            .unwrap_or(output_dir.as_path())
            .join(WARPED_GEOMETRY_DIR)
    });

    let in_memory: Vec<(String, String)> = result
        .iter_components()
        .filter_map(|(path, component)| match &component.kind {
            ComponentKind::Mesh(Mesh {
                source: MeshSource::InMemory { .. },
                ..
            }) => Some((path, component.name.clone())),
            _ => None,
        })
        .collect();
    if !in_memory.is_empty() {
        fs::create_dir_all(&geometry_dir)?;
    }

    let mut used_stems = HashSet::new();
    for (path, component_name) in in_memory {
        let stem = source_model
            .find_as::<Mesh>(&path)
            .ok()
            .and_then(Mesh::file)
            .and_then(Path::file_stem)
            .map_or(component_name, |s| s.to_string_lossy().into_owned());
        let stem = unique_stem(&mut used_stems, stem);
        let file = geometry_dir.join(format!("{stem}.obj"));

        let mesh = result.find_as::<Mesh>(&path)?;
        if let MeshSource::InMemory { mesh } = &mesh.source {
            mesh_io::save_obj(mesh, &file, &config.export_comment)?;
        }
        let reference = file
            .strip_prefix(&output_dir)
            .map_or_else(|_| file.clone(), Path::to_path_buf);
        debug!(mesh = %path, file = %file.display(), "Wrote warped mesh");
        result.replace_geometry(&path, MeshSource::File { path: reference })?;
    }

    result.set_input_file(Some(output_path.to_path_buf()));
    result.finalize()?;
    result.save(output_path)?;
    info!(path = %output_path.display(), "Exported warped model");
    Ok(result)
}

fn unique_stem(used: &mut HashSet<String>, stem: String) -> String {
    let mut candidate = stem.clone();
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = format!("{stem}_{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}
