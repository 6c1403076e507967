//! Snapshot persistence for the store
//!
//! The whole mapping is serialized as one JSON object of string arrays, so
//! snapshot files round-trip with the original deployment's data files.

use crate::error::Result;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Load a snapshot from `path`.
///
/// A missing file is an empty store, not an error; any other I/O or parse
/// failure propagates to the caller.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<String>>> {
    if !path.as_ref().exists() {
        return Ok(HashMap::new());
    }
    let file = File::open(path)?;
    // A zero-length file counts as an empty store, like a missing one.
    if file.metadata()?.len() == 0 {
        return Ok(HashMap::new());
    }
    let reader = BufReader::new(file);
    let map = serde_json::from_reader(reader)?;
    Ok(map)
}

/// Write the whole mapping to `path`, replacing any previous content.
pub fn save<P: AsRef<Path>>(path: P, map: &HashMap<String, Vec<String>>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, map)?;
    writer.flush()?;
    Ok(())
}
