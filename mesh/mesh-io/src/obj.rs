//! Wavefront OBJ loading and saving.
//!
//! Only geometry is handled: `v` positions, `vn` normals and `f` faces.
//! Polygons with more than three corners are fan-triangulated. Texture
//! coordinates, groups and materials are ignored on load.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vector3, Vertex};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Load a mesh from an OBJ file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the file is missing, or a content
/// error for malformed `v`/`f` records and out-of-range face indices.
pub fn load_obj<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| IoError::from_open(path, e))?;
    parse_obj(&text)
}

/// Parse OBJ content already held in memory.
///
/// # Errors
///
/// See [`load_obj`].
pub fn parse_obj(text: &str) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords = parse_triple(parts, line_no)?;
                mesh.vertices.push(Vertex::from_coords(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let corners: Vec<u32> = parts
                    .map(|token| resolve_index(token, mesh.vertices.len(), line_no))
                    .collect::<IoResult<_>>()?;
                if corners.len() < 3 {
                    return Err(IoError::invalid_content(format!(
                        "line {}: face needs at least 3 corners",
                        line_no + 1
                    )));
                }
                for i in 1..corners.len() - 1 {
                    mesh.faces.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            // normals are recomputed after load; comments, groups, uvs etc. are skipped
            _ => {}
        }
    }

    debug!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Parsed OBJ"
    );
    Ok(mesh)
}

fn parse_triple<'a>(parts: impl Iterator<Item = &'a str>, line_no: usize) -> IoResult<[f64; 3]> {
    let values: Vec<f64> = parts
        .take(3)
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()?;
    match values.as_slice() {
        &[x, y, z] => Ok([x, y, z]),
        _ => Err(IoError::invalid_content(format!(
            "line {}: expected 3 coordinates",
            line_no + 1
        ))),
    }
}

/// Resolve a face corner token (`7`, `7/1`, `7//3`, `-1`) to a zero-based index.
fn resolve_index(token: &str, vertex_count: usize, line_no: usize) -> IoResult<u32> {
    let raw: i64 = token.split('/').next().unwrap_or_default().parse()?;
    #[allow(clippy::cast_possible_wrap)]
    // vertex counts are far below i64::MAX
    let count = vertex_count as i64;
    let index = match raw {
        0 => -1,
        n if n > 0 => n - 1,
        n => count + n,
    };
    if index < 0 || index >= count {
        return Err(IoError::invalid_content(format!(
            "line {}: face index {raw} is out of range (have {vertex_count} vertices)",
            line_no + 1
        )));
    }
    u32::try_from(index)
        .map_err(|_| IoError::invalid_content(format!("line {}: face index too large", line_no + 1)))
}

/// Save a mesh as OBJ.
///
/// `comment` is written as a `#` header line (e.g. the tool that produced
/// the file). Vertex normals are written when every vertex has one.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
///
/// # Example
///
/// ```no_run
/// use mesh_io::{load_mesh, save_obj};
///
/// let mesh = load_mesh("Geometry/femur.stl").unwrap();
/// save_obj(&mesh, "WarpedGeometry/femur.obj", "model-warper").unwrap();
/// ```
pub fn save_obj<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, comment: &str) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer, comment)?;
    writer.flush()?;
    Ok(())
}

fn write_obj<W: Write>(mesh: &IndexedMesh, writer: &mut W, comment: &str) -> IoResult<()> {
    if !comment.is_empty() {
        writeln!(writer, "# {comment}")?;
    }

    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.position.x, v.position.y, v.position.z)?;
    }

    let normals: Option<Vec<Vector3<f64>>> = mesh.vertices.iter().map(|v| v.normal).collect();
    if let Some(normals) = &normals {
        for n in normals {
            writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
        }
    }

    for &[a, b, c] in &mesh.faces {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        if normals.is_some() {
            writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(writer, "f {a} {b} {c}")?;
        }
    }
    Ok(())
}
