//! Warning vocabulary shared by the analyzer and the rewriter.
//!
//! Diagnostics are recoverable by definition; anything fatal is an error, not
//! a diagnostic. The pipeline collects these and surfaces them to the caller
//! in addition to logging them as they occur.

use crate::descriptor::MethodSignature;
use crate::name::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recoverable condition surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    /// Diamond inheritance: two unrelated interfaces supply conflicting
    /// default bodies for the same signature and nothing overrides them.
    /// Well-formed input does not contain this; the first candidate in
    /// declaration order is kept.
    AmbiguousDefaultInheritance {
        site: TypeName,
        signature: MethodSignature,
        kept: TypeName,
        ignored: TypeName,
    },
    /// A default or static interface member was encountered while default
    /// backporting is disabled; the member is removed instead of relocated.
    DefaultsDisabled {
        interface: TypeName,
        signature: MethodSignature,
    },
    /// A real module already uses the name derived for an interface's
    /// companion module. The companion wins (last write).
    CompanionNameCollision {
        interface: TypeName,
        companion: TypeName,
    },
    /// The same module identity was ingested twice; last write wins.
    DuplicateIngest { module: TypeName },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AmbiguousDefaultInheritance {
                site,
                signature,
                kept,
                ignored,
            } => write!(
                f,
                "ambiguous default inheritance at {site}: {signature} provided by both {kept} and {ignored}; keeping {kept}"
            ),
            Diagnostic::DefaultsDisabled {
                interface,
                signature,
            } => write!(
                f,
                "default backporting disabled: removing {interface}.{signature} instead of relocating it"
            ),
            Diagnostic::CompanionNameCollision {
                interface,
                companion,
            } => write!(
                f,
                "companion name collision: {companion} (derived for {interface}) is already a module name"
            ),
            Diagnostic::DuplicateIngest { module } => {
                write!(f, "module {module} ingested twice; keeping the later copy")
            }
        }
    }
}
