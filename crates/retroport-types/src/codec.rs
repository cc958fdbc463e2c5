//! Serialized module interchange.
//!
//! The input collaborator hands the pipeline parsed [`ModuleDescriptor`]s and
//! the output collaborator accepts `(qualified name, bytes)` pairs; this module
//! is the codec sitting at those two interfaces. The interchange format is
//! JSON so that emitted artifacts are deterministic and diff-friendly.

use crate::descriptor::ModuleDescriptor;
use anyhow::{Context, Result};

/// File extension for serialized modules.
pub const MODULE_EXTENSION: &str = "module.json";

/// Serialize a module for emission. Output is pretty-printed and stable for
/// byte-identical repeated runs.
pub fn encode_module(module: &ModuleDescriptor) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(module)
        .with_context(|| format!("failed to encode module {}", module.name))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse a serialized module. A decode failure is a structural error: the
/// caller aborts the run with the offending module identified.
pub fn decode_module(bytes: &[u8]) -> Result<ModuleDescriptor> {
    serde_json::from_slice(bytes).context("malformed module")
}
