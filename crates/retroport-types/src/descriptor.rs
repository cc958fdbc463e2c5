//! Module, method and field descriptors.
//!
//! These are the structural units the analyzer ingests: a [`ModuleDescriptor`]
//! per class or interface, each owning its [`MethodDescriptor`]s and
//! [`FieldDescriptor`]s. Method parameter/return types use the compact textual
//! descriptor grammar (`(Lcom/example/Foo;I)V`), which keeps signature equality
//! a plain string comparison and makes receiver prepending a local string edit.

use crate::instruction::Instr;
use crate::name::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a module is a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Class,
    Interface,
}

/// Member visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

/// Access attributes of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFlags {
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_synthetic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_bridge: bool,
}

impl MethodFlags {
    pub fn public_instance() -> Self {
        Self {
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_synthetic: false,
            is_bridge: false,
        }
    }

    pub fn public_static() -> Self {
        Self {
            is_static: true,
            ..Self::public_instance()
        }
    }

    pub fn public_abstract() -> Self {
        Self {
            is_abstract: true,
            ..Self::public_instance()
        }
    }

    pub fn private_instance() -> Self {
        Self {
            visibility: Visibility::Private,
            ..Self::public_instance()
        }
    }

    pub fn with_synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    pub fn with_bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }
}

/// A dispatch-free method key: name plus textual descriptor.
///
/// Two method references with different dispatch kinds but identical
/// name and descriptor are the same method for resolution purposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub descriptor: String,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// Call-dispatch encoding carried by a call instruction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    Static,
    /// `super`-style dispatch that bypasses virtual lookup.
    Special,
    Virtual,
    /// Interface-typed virtual dispatch.
    Interface,
    Constructor,
}

/// A fully qualified call target: dispatch kind, owner, name, descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodReference {
    pub dispatch: DispatchKind,
    pub owner: TypeName,
    pub name: String,
    pub descriptor: String,
}

impl MethodReference {
    pub fn new(
        dispatch: DispatchKind,
        owner: impl Into<TypeName>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            dispatch,
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Project out the dispatch-free resolution key.
    pub fn signature(&self) -> MethodSignature {
        MethodSignature::new(self.name.clone(), self.descriptor.clone())
    }

    /// Same owner, name and descriptor, ignoring the dispatch kind.
    ///
    /// `super` calls carry a different dispatch tag than ordinary calls but
    /// still denote the same method.
    pub fn is_same_method(&self, other: &MethodReference) -> bool {
        self.owner == other.owner && self.name == other.name && self.descriptor == other.descriptor
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// How a method participates in resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Interface method with no body.
    Abstract,
    /// Interface method with a body; `target` is the companion-module static
    /// the body relocates to, with the receiver prepended as the leading
    /// parameter.
    Default { target: MethodReference },
    /// Ordinary class method (abstract or concrete). A class declaration
    /// always outranks inherited default methods.
    Implemented,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: String,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
}

/// A declared method, owned by exactly one [`ModuleDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub descriptor: String,
    pub flags: MethodFlags,
    /// Assigned during ingestion; parsed input carries `Implemented` and the
    /// analyzer reclassifies interface members.
    #[serde(default = "MethodKind::implemented")]
    pub kind: MethodKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<Instr>>,
}

impl MethodKind {
    fn implemented() -> Self {
        MethodKind::Implemented
    }
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        descriptor: impl Into<String>,
        flags: MethodFlags,
        body: Option<Vec<Instr>>,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            flags,
            kind: MethodKind::Implemented,
            body,
        }
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature::new(self.name.clone(), self.descriptor.clone())
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// A single class or interface unit.
///
/// Immutable once ingested; rewriting stages produce new descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: TypeName,
    pub kind: ModuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<TypeName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<TypeName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDescriptor>,
}

impl ModuleDescriptor {
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            kind: ModuleKind::Class,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self {
            kind: ModuleKind::Interface,
            ..Self::class(name)
        }
    }

    pub fn with_superclass(mut self, superclass: impl Into<TypeName>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<TypeName>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ModuleKind::Interface
    }

    /// Look up an own declared method by signature.
    pub fn method(&self, signature: &MethodSignature) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == signature.name && m.descriptor == signature.descriptor)
    }

    pub fn has_method(&self, signature: &MethodSignature) -> bool {
        self.method(signature).is_some()
    }
}

// =============================================================================
// Descriptor string utilities
// =============================================================================

/// Prepend an explicit receiver parameter to a method descriptor.
///
/// `("(I)V", com/example/Foo)` becomes `"(Lcom/example/Foo;I)V"`. Used when a
/// default-method body relocates to its companion module and when a private
/// instance method is promoted to a static.
pub fn prepend_receiver(descriptor: &str, owner: &TypeName) -> String {
    debug_assert!(descriptor.starts_with('('), "malformed descriptor: {descriptor}");
    format!("({}{}", owner.descriptor(), &descriptor[1..])
}

/// The return portion of a method descriptor (after the closing paren).
pub fn return_descriptor(descriptor: &str) -> &str {
    match descriptor.rfind(')') {
        Some(idx) => &descriptor[idx + 1..],
        None => descriptor,
    }
}

/// Split the parameter portion of a method descriptor into one string per
/// parameter. Handles primitives, object types and array prefixes.
pub fn parameter_descriptors(descriptor: &str) -> Vec<String> {
    let inner = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    let bytes = inner.as_bytes();
    let mut params = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] == b'[' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'L' {
            while i < bytes.len() && bytes[i] != b';' {
                i += 1;
            }
            i += 1; // consume ';'
        } else {
            i += 1; // primitive
        }
        params.push(inner[start..i.min(inner.len())].to_string());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_equality_ignores_dispatch() {
        let virt = MethodReference::new(DispatchKind::Virtual, "com/example/Foo", "run", "()V");
        let spec = MethodReference::new(DispatchKind::Special, "com/example/Foo", "run", "()V");
        assert_ne!(virt, spec);
        assert!(virt.is_same_method(&spec));
        assert_eq!(virt.signature(), spec.signature());
    }

    #[test]
    fn test_references_usable_as_sorted_keys() {
        // References key the relocation table's ordered maps, so the full
        // tuple including the dispatch kind must order and hash.
        let mut set = std::collections::BTreeSet::new();
        set.insert(MethodReference::new(
            DispatchKind::Virtual,
            "com/example/Foo",
            "run",
            "()V",
        ));
        set.insert(MethodReference::new(
            DispatchKind::Static,
            "com/example/Foo",
            "run",
            "()V",
        ));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_prepend_receiver() {
        let owner = TypeName::from("com/example/Greeter");
        assert_eq!(
            prepend_receiver("()Ljava/lang/String;", &owner),
            "(Lcom/example/Greeter;)Ljava/lang/String;"
        );
        assert_eq!(
            prepend_receiver("(IJ)V", &owner),
            "(Lcom/example/Greeter;IJ)V"
        );
    }

    #[test]
    fn test_parameter_descriptors() {
        assert!(parameter_descriptors("()V").is_empty());
        assert_eq!(parameter_descriptors("(I)V"), vec!["I"]);
        assert_eq!(
            parameter_descriptors("(ILcom/example/Foo;[JD)V"),
            vec!["I", "Lcom/example/Foo;", "[J", "D"]
        );
        assert_eq!(
            parameter_descriptors("([[Lcom/example/Foo;Z)I"),
            vec!["[[Lcom/example/Foo;", "Z"]
        );
    }

    #[test]
    fn test_return_descriptor() {
        assert_eq!(return_descriptor("(I)V"), "V");
        assert_eq!(
            return_descriptor("()Lcom/example/Greeter;"),
            "Lcom/example/Greeter;"
        );
    }

    #[test]
    fn test_module_method_lookup() {
        let module = ModuleDescriptor::class("com/example/Foo").with_method(MethodDescriptor::new(
            "run",
            "()V",
            MethodFlags::public_instance(),
            Some(vec![]),
        ));
        assert!(module.has_method(&MethodSignature::new("run", "()V")));
        assert!(!module.has_method(&MethodSignature::new("run", "(I)V")));
    }
}
