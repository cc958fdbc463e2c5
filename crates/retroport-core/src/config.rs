//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target runtime capability level, ordered from least to most capable.
///
/// The ordinal decides which interface members must be stripped and which
/// call-dispatch encodings are legal on the rewritten modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeLevel {
    V5,
    V6,
    V7,
    V8,
}

impl RuntimeLevel {
    /// Whether interfaces may carry default and static method bodies.
    pub fn supports_interface_bodies(self) -> bool {
        self >= RuntimeLevel::V8
    }

    /// Whether interface-typed dispatch encodings are accepted on call
    /// instructions whose resolved owner is a class.
    pub fn supports_interface_dispatch(self) -> bool {
        self >= RuntimeLevel::V8
    }

    /// Whether covariant bridge members must be stripped.
    pub fn needs_bridge_stripping(self) -> bool {
        self < RuntimeLevel::V6
    }
}

impl fmt::Display for RuntimeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            RuntimeLevel::V5 => "v5",
            RuntimeLevel::V6 => "v6",
            RuntimeLevel::V7 => "v7",
            RuntimeLevel::V8 => "v8",
        };
        f.write_str(level)
    }
}

/// Configuration consumed by the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackportConfig {
    /// The runtime level the rewritten modules must run on.
    pub target: RuntimeLevel,
    /// When false, default and static interface members are removed rather
    /// than relocated, with a warning per member.
    pub backport_defaults: bool,
}

impl Default for BackportConfig {
    fn default() -> Self {
        Self {
            target: RuntimeLevel::V7,
            backport_defaults: true,
        }
    }
}

impl BackportConfig {
    /// Whether default-method relocation applies for this run: the target
    /// cannot host interface bodies and backporting is enabled.
    pub fn relocates_defaults(&self) -> bool {
        self.backport_defaults && !self.target.supports_interface_bodies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(RuntimeLevel::V5 < RuntimeLevel::V8);
        assert!(!RuntimeLevel::V7.supports_interface_bodies());
        assert!(RuntimeLevel::V8.supports_interface_bodies());
        assert!(RuntimeLevel::V5.needs_bridge_stripping());
        assert!(!RuntimeLevel::V7.needs_bridge_stripping());
    }

    #[test]
    fn test_relocation_applicability() {
        let default = BackportConfig::default();
        assert!(default.relocates_defaults());

        let disabled = BackportConfig {
            backport_defaults: false,
            ..default
        };
        assert!(!disabled.relocates_defaults());

        let modern = BackportConfig {
            target: RuntimeLevel::V8,
            ..default
        };
        assert!(!modern.relocates_defaults());
    }
}
