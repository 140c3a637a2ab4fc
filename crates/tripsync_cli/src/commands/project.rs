//! Project command implementation.

use serde_json::Value;
use std::path::Path;
use tripsync_store::{project_membership, project_shared_message, project_trip, Document};

/// Projects a document into the requested record kind.
pub fn project(kind: &str, document: &Document) -> Result<Value, Box<dyn std::error::Error>> {
    let record = match kind {
        "membership" => serde_json::to_value(project_membership(document))?,
        "trip" => serde_json::to_value(project_trip(document))?,
        "shared" => serde_json::to_value(project_shared_message(document))?,
        other => return Err(format!("Unknown record kind: {}", other).into()),
    };
    Ok(record)
}

/// Reads a JSON object from a file.
pub fn read_document(path: &Path) -> Result<Document, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read document {:?}: {}", path, e))?;
    match serde_json::from_str(&text)? {
        Value::Object(document) => Ok(document),
        _ => Err(format!("Document {:?} is not a JSON object", path).into()),
    }
}

/// Runs the project command.
pub fn run(kind: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let document = read_document(path)?;
    let record = project(kind, &document)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
