//! Command-line frontend for the retroport backporting engine.
//!
//! The heavy lifting lives in the workspace crates:
//! - `retroport-types`: module data model, descriptors, codec
//! - `retroport-hierarchy`: closed-world hierarchy analysis and relocation
//! - `retroport-core`: the two-phase rewriting pipeline
//!
//! This crate adds argument parsing and directory-backed I/O.

pub mod args;
pub mod io;

pub use args::{Args, TargetLevel};
pub use io::{DirectorySink, DirectorySource};
