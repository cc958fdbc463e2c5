//! Retroport Types
//!
//! Shared module model for the retroport workspace.
//!
//! This crate provides:
//! - [`name`]: Qualified type names and deterministic derived-name construction
//! - [`descriptor`]: Module, method and field descriptors plus signature utilities
//! - [`instruction`]: The structured instruction stream consumed by the rewriter
//! - [`codec`]: Serialized module interchange used by the input/output collaborators
//! - [`diagnostics`]: Warning vocabulary shared by the analyzer and the rewriter
//!
//! Everything here is pure data. Descriptors are created once during ingestion
//! and never mutated afterwards; the rewriting stages produce new descriptors
//! instead of editing existing ones.

pub mod codec;
pub mod descriptor;
pub mod diagnostics;
pub mod instruction;
pub mod name;

// Re-export main types at crate root for convenience
pub use codec::{decode_module, encode_module, MODULE_EXTENSION};
pub use descriptor::{
    parameter_descriptors, prepend_receiver, return_descriptor, DispatchKind, FieldDescriptor,
    MethodDescriptor, MethodFlags, MethodKind, MethodReference, MethodSignature, ModuleDescriptor,
    ModuleKind, Visibility,
};
pub use diagnostics::Diagnostic;
pub use instruction::{ClosureSite, Instr};
pub use name::TypeName;
