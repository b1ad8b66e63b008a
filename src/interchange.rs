//! JSON interchange for whole sets.
//!
//! The document is the serde form of [`SetData`]: every parameter, custom data
//! entry, child transform, echoed container header and raw group table is kept,
//! so a set survives export and import unchanged.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::model::SetData;
use crate::util::{Error, Result};

/// Serialize a set to JSON.
pub fn to_json(set: &SetData, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(set)?
    } else {
        serde_json::to_string(set)?
    };
    Ok(json)
}

/// Parse a set from JSON.
pub fn from_json(json: &str) -> Result<SetData> {
    Ok(serde_json::from_str(json)?)
}

/// Write a set to a JSON file.
pub fn export_file(path: impl AsRef<Path>, set: &SetData, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_json(set, pretty)?)?;
    debug!(path = %path.display(), objects = set.len(), "exported set");
    Ok(())
}

/// Read a set from a JSON file.
pub fn import_file(path: impl AsRef<Path>) -> Result<SetData> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let set = from_json(&json)?;
    debug!(path = %path.display(), objects = set.len(), "imported set");
    Ok(set)
}
