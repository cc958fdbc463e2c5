//! Retroport Hierarchy
//!
//! Whole-program class hierarchy analysis and call-target relocation.
//!
//! This crate provides:
//! - [`hierarchy`]: The closed-world [`HierarchyAnalyzer`] registry and the
//!   three-tier method resolution algorithm
//! - [`relocation`]: The derived [`RelocationTable`] mapping original call
//!   targets to their post-rewrite targets
//!
//! # Resolution model
//!
//! Method resolution merges, in ascending priority:
//! 1. methods inherited transitively through implemented interfaces
//!    (most-derived sub-interface wins),
//! 2. superclass-inherited methods, overriding tier 1,
//! 3. the type's own declarations, overriding everything.
//!
//! This reproduces multiple-inheritance-of-behavior over
//! single-inheritance-of-state: a class declaration (even an abstract one)
//! always outranks an inherited default method.
//!
//! Resolution queries are a pure function of the registered module set, so the
//! entire input batch must be ingested before any rewrite-driving query runs.
//! Types outside the registered set are opaque: they never receive companion
//! modules and their default methods are silently ignored.

pub mod hierarchy;
pub mod relocation;

pub use hierarchy::{HierarchyAnalyzer, ResolvedMethod};
pub use relocation::RelocationTable;
