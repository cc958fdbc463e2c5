//! Input and output collaborators.
//!
//! The core never touches the filesystem: a [`ModuleSource`] supplies parsed
//! modules plus raw resource bytes, and an [`OutputSink`] accepts
//! `(qualified name, bytes)` pairs and decides physical placement. In-memory
//! implementations back the test suites; the CLI provides directory-backed
//! ones.

use anyhow::Result;
use retroport_types::{ModuleDescriptor, TypeName};
use std::collections::BTreeMap;

/// Supplies the input batch. Ingestion order is unspecified and must not
/// affect output.
pub trait ModuleSource {
    /// The parsed modules of the input set.
    fn modules(&mut self) -> Result<Vec<ModuleDescriptor>>;

    /// Raw non-module resources to pass through unchanged.
    fn resources(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(Vec::new())
    }
}

/// Accepts rewritten artifacts. Emission is append-only and
/// order-insensitive.
pub trait OutputSink {
    fn emit_module(&mut self, name: &TypeName, bytes: Vec<u8>) -> Result<()>;

    fn emit_resource(&mut self, name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// In-memory source for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub modules: Vec<ModuleDescriptor>,
    pub resources: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn from_modules(modules: Vec<ModuleDescriptor>) -> Self {
        Self {
            modules,
            resources: Vec::new(),
        }
    }
}

impl ModuleSource for MemorySource {
    fn modules(&mut self) -> Result<Vec<ModuleDescriptor>> {
        Ok(std::mem::take(&mut self.modules))
    }

    fn resources(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(std::mem::take(&mut self.resources))
    }
}

/// In-memory sink for tests and embedding. Keyed maps keep the collected
/// output deterministic regardless of emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub modules: BTreeMap<String, Vec<u8>>,
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an emitted module back into its descriptor (test helper).
    pub fn decoded(&self, name: &str) -> Option<ModuleDescriptor> {
        self.modules
            .get(name)
            .and_then(|bytes| retroport_types::decode_module(bytes).ok())
    }
}

impl OutputSink for MemorySink {
    fn emit_module(&mut self, name: &TypeName, bytes: Vec<u8>) -> Result<()> {
        self.modules.insert(name.as_str().to_string(), bytes);
        Ok(())
    }

    fn emit_resource(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.resources.insert(name.to_string(), bytes);
        Ok(())
    }
}
