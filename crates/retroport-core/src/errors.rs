//! Fatal error types for the backporting pipeline.
//!
//! Only two conditions abort a run: a module that cannot be decoded, and a
//! closure body the analyzer has no record of. Everything else in the error
//! taxonomy is a recoverable [`retroport_types::Diagnostic`].

use retroport_types::{MethodReference, TypeName};

/// Structured fatal errors, with the offending module identified.
#[derive(Debug, Clone)]
pub enum BackportError {
    /// Structural error: the input module could not be parsed.
    MalformedModule {
        /// Best-effort identity of the offending module (file name or
        /// qualified name).
        name: String,
        reason: String,
    },
    /// Internal-consistency error: a closure body is unreachable from the
    /// analyzer's records. This never occurs for closures declared within
    /// the analyzed set.
    ReificationInconsistency {
        enclosing: TypeName,
        body: MethodReference,
    },
}

impl std::fmt::Display for BackportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackportError::MalformedModule { name, reason } => {
                write!(f, "malformed input module {name}: {reason}")
            }
            BackportError::ReificationInconsistency { enclosing, body } => write!(
                f,
                "closure body {body} referenced from {enclosing} is not in the analyzed set"
            ),
        }
    }
}

impl std::error::Error for BackportError {}

#[cfg(test)]
mod tests {
    use super::*;
    use retroport_types::DispatchKind;

    #[test]
    fn test_display_identifies_offender() {
        let err = BackportError::ReificationInconsistency {
            enclosing: TypeName::from("com/example/App"),
            body: MethodReference::new(
                DispatchKind::Static,
                "com/example/Gone",
                "lambda$0",
                "()V",
            ),
        };
        let text = err.to_string();
        assert!(text.contains("com/example/App"));
        assert!(text.contains("com/example/Gone.lambda$0()V"));
    }
}
