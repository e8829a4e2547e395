//! Landmark CSV reading and writing.
//!
//! Each row is either `x,y,z` or `name,x,y,z`. Rows whose coordinates do
//! not parse (headers, for example) are skipped, as are rows with the wrong
//! number of columns.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use nalgebra::Point3;
use tracing::{debug, warn};

use crate::error::{LandmarkError, LandmarkResult};
use crate::landmark::Landmark;

/// Read landmarks from a CSV file.
///
/// # Errors
///
/// Returns [`LandmarkError::FileNotFound`] if the file does not exist, or
/// an error if it cannot be read as CSV.
///
/// # Example
///
/// ```no_run
/// use mesh_landmarks::read_landmarks_csv;
///
/// let landmarks = read_landmarks_csv("source_landmarks.csv").unwrap();
/// println!("Read {} landmarks", landmarks.len());
/// ```
pub fn read_landmarks_csv<P: AsRef<Path>>(path: P) -> LandmarkResult<Vec<Landmark>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LandmarkError::from_open(path, e))?;
    let landmarks = read_landmarks_from_reader(file)?;
    debug!(path = %path.display(), count = landmarks.len(), "Read landmarks");
    Ok(landmarks)
}

/// Read landmarks from any CSV source.
///
/// # Errors
///
/// Returns an error if the underlying reader fails.
pub fn read_landmarks_from_reader<R: Read>(reader: R) -> LandmarkResult<Vec<Landmark>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut landmarks = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if let Some(landmark) = parse_record(&record, row) {
            landmarks.push(landmark);
        }
    }
    Ok(landmarks)
}

fn parse_record(record: &StringRecord, row: usize) -> Option<Landmark> {
    let (name, coords) = match record.len() {
        3 => (None, 0),
        4 => (record.get(0).filter(|s| !s.is_empty()), 1),
        columns => {
            warn!(row = row + 1, columns, "Skipping landmark row: expected 3 or 4 columns");
            return None;
        }
    };

    let coord = |i: usize| record.get(coords + i)?.parse::<f64>().ok();
    let Some((x, y, z)) = coord(0).zip(coord(1)).zip(coord(2)).map(|((x, y), z)| (x, y, z))
    else {
        debug!(row = row + 1, "Skipping non-numeric landmark row");
        return None;
    };

    let position = Point3::new(x, y, z);
    Some(match name {
        Some(name) => Landmark::named(name, position),
        None => Landmark::new(position),
    })
}

/// Write landmarks to a CSV file as `name,x,y,z` rows under a header.
///
/// Unnamed landmarks are written with an empty name column and read back
/// as unnamed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_landmarks_csv<P: AsRef<Path>>(path: P, landmarks: &[Landmark]) -> LandmarkResult<()> {
    let file = File::create(path)?;
    write_landmarks_to_writer(file, landmarks)
}

fn write_landmarks_to_writer<W: Write>(writer: W, landmarks: &[Landmark]) -> LandmarkResult<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["name", "x", "y", "z"])?;
    for landmark in landmarks {
        let p = landmark.position;
        writer.write_record([
            landmark.name.clone().unwrap_or_default(),
            p.x.to_string(),
            p.y.to_string(),
            p.z.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn read(text: &str) -> Vec<Landmark> {
        read_landmarks_from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn reads_named_and_unnamed_rows() {
        let landmarks = read("knee, 0.1, 0.2, 0.3\n1,2,3\n");
        assert_eq!(landmarks.len(), 2);
        assert_eq!(landmarks[0].name.as_deref(), Some("knee"));
        assert_relative_eq!(landmarks[0].position, Point3::new(0.1, 0.2, 0.3));
        assert!(landmarks[1].name.is_none());
        assert_eq!(landmarks[1].position.z, 3.0);
    }

    #[test]
    fn skips_header_blank_and_malformed_rows() {
        let landmarks = read("name,x,y,z\n\n# note\na,1,2\nb,1,2,3,4\nc,4,5,6\n");
        assert_eq!(landmarks.len(), 1);
        assert_eq!(landmarks[0].name.as_deref(), Some("c"));
    }

    #[test]
    fn empty_file_yields_no_landmarks() {
        assert!(read("").is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_landmarks_csv("definitely_missing_landmarks.csv").unwrap_err();
        assert!(matches!(err, LandmarkError::FileNotFound { .. }));
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landmarks.csv");
        let landmarks = vec![
            Landmark::named("hip", Point3::new(0.0, 0.9, 0.05)),
            Landmark::new(Point3::new(-0.5, 0.25, 1.0)),
        ];

        write_landmarks_csv(&path, &landmarks).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("name,x,y,z"));

        let loaded = read_landmarks_csv(&path).unwrap();
        assert_eq!(loaded, landmarks);
    }
}
