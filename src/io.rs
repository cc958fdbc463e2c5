//! Directory-backed module I/O for the CLI.
//!
//! Modules live as `<qualified/name>.module.json` files nested by package
//! path; everything else under the input root is treated as a resource and
//! passed through byte-for-byte. Files are collected in sorted path order so
//! ingestion is deterministic regardless of directory enumeration order.

use anyhow::{Context, Result};
use retroport_core::{BackportError, ModuleSource, OutputSink};
use retroport_types::{decode_module, ModuleDescriptor, TypeName, MODULE_EXTENSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a module set from a directory tree.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read input directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read input directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn is_module_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(&format!(".{MODULE_EXTENSION}")))
}

impl ModuleSource for DirectorySource {
    fn modules(&mut self) -> Result<Vec<ModuleDescriptor>> {
        let mut modules = Vec::new();
        for path in self.files()? {
            if !is_module_path(&path) {
                continue;
            }
            let bytes =
                fs::read(&path).with_context(|| format!("read module {}", path.display()))?;
            let module = decode_module(&bytes).map_err(|err| BackportError::MalformedModule {
                name: self.relative_name(&path),
                reason: format!("{err:#}"),
            })?;
            debug!(module = %module.name, path = %path.display(), "loaded module");
            modules.push(module);
        }
        Ok(modules)
    }

    fn resources(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut resources = Vec::new();
        for path in self.files()? {
            if is_module_path(&path) {
                continue;
            }
            let bytes =
                fs::read(&path).with_context(|| format!("read resource {}", path.display()))?;
            resources.push((self.relative_name(&path), bytes));
        }
        Ok(resources)
    }
}

/// Writes rewritten artifacts under an output root, creating package
/// directories as needed.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create output directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn write(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))
    }
}

impl OutputSink for DirectorySink {
    fn emit_module(&mut self, name: &TypeName, bytes: Vec<u8>) -> Result<()> {
        self.write(&format!("{name}.{MODULE_EXTENSION}"), &bytes)
    }

    fn emit_resource(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.write(name, &bytes)
    }
}
