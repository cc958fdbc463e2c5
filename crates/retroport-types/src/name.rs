//! Qualified type names and deterministic derived-name construction.
//!
//! Module names are slash-separated qualified names (`com/example/Greeter`).
//! Two kinds of names are derived from them, both deterministically so that
//! repeated runs over unchanged input produce byte-identical output:
//!
//! - the **companion module** for an interface appends [`COMPANION_SUFFIX`]
//!   (`com/example/Greeter` -> `com/example/Greeter$`)
//! - a **synthesized lambda module** appends [`LAMBDA_INFIX`] plus a sequence
//!   number scoped to the enclosing module
//!   (`com/example/App` -> `com/example/App$$Lambda$1`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to an interface name to form its companion module name.
pub const COMPANION_SUFFIX: &str = "$";

/// Infix between an enclosing module name and a lambda sequence number.
pub const LAMBDA_INFIX: &str = "$$Lambda$";

/// A qualified type name (`com/example/Greeter`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The companion module name for this interface.
    pub fn companion(&self) -> TypeName {
        TypeName(format!("{}{}", self.0, COMPANION_SUFFIX))
    }

    /// The synthesized lambda module name for the given per-enclosing-module
    /// sequence number (sequence numbers start at 1).
    pub fn lambda(&self, seq: u32) -> TypeName {
        TypeName(format!("{}{}{}", self.0, LAMBDA_INFIX, seq))
    }

    /// Whether this name has the shape of a derived companion name.
    pub fn is_companion_name(&self) -> bool {
        self.0.ends_with(COMPANION_SUFFIX) && !self.0.contains(LAMBDA_INFIX)
    }

    /// The unqualified trailing segment of the name.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The field/parameter descriptor form of this type (`Lcom/example/Greeter;`).
    pub fn descriptor(&self) -> String {
        format!("L{};", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}
