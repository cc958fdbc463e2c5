//! Backporting engine: rewrites compiled modules built against a newer
//! runtime so they load and run on older runtime levels.
//!
//! Features:
//! - Two-phase pipeline: full closed-world ingestion, then per-module
//!   rewriting in deterministic name order
//! - Interface default and static bodies relocated to companion modules,
//!   with forwarding delegates generated on implementing classes
//! - Closure-creation sites reified into synthesized modules, with singleton
//!   caching for capture-free closures
//! - Target-level stripping of interface bodies and covariant bridge members
//! - Pluggable [`ModuleSource`]/[`OutputSink`] I/O seams
//!
//! The hierarchy and relocation oracles live in `retroport-hierarchy`; the
//! data model and codec live in `retroport-types`.

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod reify;
pub mod rewrite;
pub mod sink;

pub use config::{BackportConfig, RuntimeLevel};
pub use errors::BackportError;
pub use pipeline::{Pipeline, RunSummary};
pub use reify::{LambdaReifier, ReifiedClosure, FACTORY_METHOD, SINGLETON_FIELD};
pub use sink::{MemorySink, MemorySource, ModuleSource, OutputSink};
