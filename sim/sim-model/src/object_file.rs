//! Typed JSON object files.
//!
//! Every persisted object (models, scaling documents) is wrapped in an
//! envelope naming its type:
//!
//! ```json
//! { "type": "Model", "object": { ... } }
//! ```
//!
//! Readers check the tag before deserializing the payload.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An object file whose payload has not been interpreted yet.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectFile {
    /// The type tag.
    #[serde(rename = "type")]
    pub object_type: String,
    /// The untyped payload.
    pub object: serde_json::Value,
}

impl ObjectFile {
    /// Deserializes the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.object)?)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    object_type: &'a str,
    object: &'a T,
}

/// Reads an object file, leaving the payload untyped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not an object file.
pub fn read_object_file(path: &Path) -> Result<ObjectFile> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Writes `object` to `path` under the given type tag.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_object_file<T: Serialize>(path: &Path, object_type: &str, object: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &Envelope {
        object_type,
        object,
    })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
