use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde_json::Value;

use crate::application::AppError;

/// Parse a report payload (plain JSON, `$id`/`$ref` markers allowed).
pub fn load_payload<R: Read>(reader: R) -> Result<Value, AppError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Parse a report payload from a file.
pub fn load_payload_file(path: impl AsRef<Path>) -> Result<Value, AppError> {
    let file = File::open(path)?;
    load_payload(BufReader::new(file))
}
