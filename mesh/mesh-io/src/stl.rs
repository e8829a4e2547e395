//! STL (Stereolithography) loading.
//!
//! Both ASCII and binary STL are read. STL stores every triangle with its
//! own three corners, so the loaded mesh has `3 * face_count` vertices.
//!
//! # Format Detection
//!
//! A file is binary when its length is exactly `84 + 50 * n`, where `n` is
//! the little-endian triangle count stored after the 80-byte header. Anything
//! else that starts with `solid` is parsed as ASCII. Binary files are allowed
//! to start with `solid` too (many exporters write it into the header).

use std::fs;
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};

use crate::error::{IoError, IoResult};

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Load a mesh from an STL file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the file is missing, or a content
/// error if it is neither valid binary nor ASCII STL.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("Geometry/femur.stl").unwrap();
/// println!("Loaded {} faces", mesh.faces.len());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| IoError::from_open(path, e))?;
    parse_stl(&bytes)
}

/// Parse STL content already held in memory.
pub(crate) fn parse_stl(bytes: &[u8]) -> IoResult<IndexedMesh> {
    if looks_binary(bytes) {
        return parse_binary(bytes);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) if text.trim_start().starts_with("solid") => parse_ascii(text),
        // Room for a header, but the declared size disagrees with the file.
        _ if bytes.len() >= HEADER_SIZE + 4 => parse_binary(bytes),
        _ => Err(IoError::invalid_content("file too small to be valid STL")),
    }
}

fn declared_triangles(bytes: &[u8]) -> Option<u32> {
    let count = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?;
    Some(u32::from_le_bytes([count[0], count[1], count[2], count[3]]))
}

fn looks_binary(bytes: &[u8]) -> bool {
    declared_triangles(bytes)
        .is_some_and(|n| bytes.len() == HEADER_SIZE + 4 + n as usize * TRIANGLE_SIZE)
}

fn parse_binary(bytes: &[u8]) -> IoResult<IndexedMesh> {
    let expected = declared_triangles(bytes)
        .ok_or_else(|| IoError::invalid_content("file too small to be valid STL"))?;

    let body = &bytes[HEADER_SIZE + 4..];
    let available = body.len() / TRIANGLE_SIZE;
    if available < expected as usize {
        #[allow(clippy::cast_possible_truncation)]
        // available < expected, which is a u32
        return Err(IoError::TruncatedStl {
            expected,
            got: available as u32,
        });
    }

    let mut mesh = IndexedMesh::with_capacity(expected as usize * 3, expected as usize);
    for triangle in body.chunks_exact(TRIANGLE_SIZE).take(expected as usize) {
        // bytes 0..12 hold a facet normal, which is recomputed downstream
        #[allow(clippy::cast_possible_truncation)]
        // mesh indices are u32
        let base = mesh.vertices.len() as u32;
        for corner in 0..3 {
            let start = 12 + corner * 12;
            mesh.vertices.push(read_vertex(&triangle[start..start + 12]));
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    Ok(mesh)
}

fn read_vertex(buf: &[u8]) -> Vertex {
    let component = |i: usize| {
        f64::from(f32::from_le_bytes([
            buf[i * 4],
            buf[i * 4 + 1],
            buf[i * 4 + 2],
            buf[i * 4 + 3],
        ]))
    };
    Vertex::from_coords(component(0), component(1), component(2))
}

fn parse_ascii(text: &str) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();
    let mut corners: Vec<Vertex> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => corners.clear(),
            "vertex" => {
                let coords: Vec<f64> = parts
                    .take(3)
                    .map(str::parse::<f64>)
                    .collect::<Result<_, _>>()?;
                if coords.len() != 3 {
                    return Err(IoError::invalid_content(format!(
                        "line {}: vertex needs 3 coordinates",
                        line_no + 1
                    )));
                }
                corners.push(Vertex::from_coords(coords[0], coords[1], coords[2]));
            }
            "endfacet" => {
                if corners.len() != 3 {
                    return Err(IoError::invalid_content(format!(
                        "line {}: facet has {} vertices, expected 3",
                        line_no + 1,
                        corners.len()
                    )));
                }
                #[allow(clippy::cast_possible_truncation)]
                // mesh indices are u32
                let base = mesh.vertices.len() as u32;
                mesh.vertices.append(&mut corners);
                mesh.faces.push([base, base + 1, base + 2]);
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(mesh)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_types::MeshTopology;

    fn binary_triangle(header: &[u8]) -> Vec<u8> {
        let mut bytes = vec![b' '; HEADER_SIZE];
        bytes[..header.len()].copy_from_slice(header);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0, 0.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_ascii() {
        let text = b"solid test
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid test";
        let mesh = parse_stl(text).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertices[1].position.x, 1.0);
    }

    #[test]
    fn parses_binary_even_with_solid_header() {
        let mesh = parse_stl(&binary_triangle(b"solid exported")).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertices[1].position.x, 2.0);
        assert_eq!(mesh.vertices[2].position.y, 3.0);
    }

    #[test]
    fn truncated_binary_is_an_error() {
        let mut bytes = binary_triangle(b"binary");
        bytes[HEADER_SIZE] = 2;
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_stl(&bytes),
            Err(IoError::TruncatedStl { expected: 2, got: 0 })
        ));
    }

    #[test]
    fn ascii_facet_with_missing_vertex_is_an_error() {
        let text = b"solid t
 facet normal 0 0 1
  outer loop
   vertex 0 0 0
   vertex 1 0 0
  endloop
 endfacet
endsolid t";
        assert!(matches!(
            parse_stl(text),
            Err(IoError::InvalidContent { .. })
        ));
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_stl("nonexistent_file_12345.stl");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}
