//! The structured instruction stream consumed by the rewriting pass.
//!
//! Decoding the binary object-module format into this stream (and encoding it
//! back) is the job of an external codec; the rewriter only interprets the
//! instructions it needs to rewrite and passes everything else through as
//! [`Instr::Opaque`] payloads. Closure-creation sites arrive as structured
//! [`ClosureSite`] payloads, so no runtime introspection is ever required to
//! recover capture lists or body references.

use crate::descriptor::{MethodReference, MethodSignature};
use crate::name::TypeName;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instr {
    /// A call; the target is substituted through the relocation table.
    Invoke(MethodReference),
    /// A closure-creation site; replaced by a factory call during rewriting.
    NewClosure(ClosureSite),
    /// Allocate an instance (paired with a constructor `Invoke`).
    New(TypeName),
    /// Load argument `n` (argument 0 is the receiver for instance methods).
    LoadArg(u16),
    GetField { owner: TypeName, name: String },
    PutField { owner: TypeName, name: String },
    GetStatic { owner: TypeName, name: String },
    PutStatic { owner: TypeName, name: String },
    Return,
    /// Any instruction the rewriter does not interpret; round-tripped as-is.
    Opaque(u64),
}

/// Payload of a single closure-creation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureSite {
    /// The behavioral interface the closure implements.
    pub interface: TypeName,
    /// The interface method being implemented.
    pub method: MethodSignature,
    /// Captured variable types in declaration order; empty for stateless
    /// closures.
    pub captures: SmallVec<[String; 4]>,
    /// The method supplying the closure body.
    pub body: MethodReference,
}

impl ClosureSite {
    pub fn is_stateless(&self) -> bool {
        self.captures.is_empty()
    }
}
