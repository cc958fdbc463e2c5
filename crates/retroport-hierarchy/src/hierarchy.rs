//! The closed-world module registry and method resolution.
//!
//! [`HierarchyAnalyzer::ingest`] registers modules in any order and classifies
//! interface members (abstract, default, companion-relocated static). Once the
//! full batch is in, [`HierarchyAnalyzer::resolve_methods`] answers "what is
//! the applicable body for type T, signature S" and
//! [`HierarchyAnalyzer::default_implementation_of`] locates the relocated body
//! for a default-method reference. Reification re-enters `ingest` for
//! synthesized modules after the initial batch, which is why registration
//! stays open for the whole run.

use retroport_types::{
    prepend_receiver, Diagnostic, DispatchKind, MethodFlags, MethodKind, MethodReference,
    MethodSignature, ModuleDescriptor, TypeName,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

/// One entry of a type's effective method table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    pub signature: MethodSignature,
    pub kind: MethodKind,
    pub flags: MethodFlags,
    /// The most specific type declaring the applicable body.
    pub declared_by: TypeName,
}

impl ResolvedMethod {
    pub fn is_default(&self) -> bool {
        matches!(self.kind, MethodKind::Default { .. })
    }
}

/// Closed-world view of every class and interface being processed.
#[derive(Debug, Default)]
pub struct HierarchyAnalyzer {
    modules: BTreeMap<TypeName, ModuleDescriptor>,
    /// Companion existence per interface, decided exactly once at ingestion.
    companion_needed: BTreeMap<TypeName, bool>,
    /// Recoverable conditions observed during analysis. Resolution itself is
    /// a pure function of the module set; warnings go through this side
    /// channel and are drained by the pipeline.
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl HierarchyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Order-independent and idempotent: re-ingesting the
    /// same identity keeps the later copy and surfaces a warning.
    ///
    /// Interface members are classified here: a static with a body becomes a
    /// companion-relocated static, an instance method with a body becomes a
    /// default whose relocation target is the companion static with the
    /// receiver prepended, and everything else stays abstract. Every class
    /// member is `Implemented` regardless of body presence, because a class
    /// declaration outranks inherited defaults even when abstract.
    pub fn ingest(&mut self, mut module: ModuleDescriptor) {
        if module.is_interface() {
            let companion = module.name.companion();
            let mut needs_companion = false;
            for method in &mut module.methods {
                if method.has_body() {
                    needs_companion = true;
                    if method.flags.is_static {
                        method.kind = MethodKind::Implemented;
                    } else {
                        method.kind = MethodKind::Default {
                            target: MethodReference::new(
                                DispatchKind::Static,
                                companion.clone(),
                                method.name.clone(),
                                prepend_receiver(&method.descriptor, &module.name),
                            ),
                        };
                    }
                } else {
                    method.kind = MethodKind::Abstract;
                    method.flags.is_abstract = true;
                }
            }
            self.companion_needed
                .insert(module.name.clone(), needs_companion);
        } else {
            for method in &mut module.methods {
                method.kind = MethodKind::Implemented;
            }
        }

        debug!(module = %module.name, kind = ?module.kind, "ingested module");
        let name = module.name.clone();
        if self.modules.insert(name.clone(), module).is_some() {
            warn!(module = %name, "module ingested twice; keeping the later copy");
            self.diagnostics
                .borrow_mut()
                .push(Diagnostic::DuplicateIngest { module: name });
        }
    }

    pub fn get(&self, name: &TypeName) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.modules.contains_key(name)
    }

    /// Whether `name` is a registered interface. Unregistered types are
    /// opaque library modules and answer false.
    pub fn is_interface(&self, name: &TypeName) -> bool {
        self.modules
            .get(name)
            .map(|m| m.is_interface())
            .unwrap_or(false)
    }

    /// Whether the interface needs an auxiliary companion module: true iff it
    /// declares at least one default or static member. Opaque interfaces
    /// never get one.
    pub fn needs_companion(&self, name: &TypeName) -> bool {
        self.companion_needed.get(name).copied().unwrap_or(false)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &TypeName> {
        self.modules.keys()
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Drain the warnings accumulated so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics.borrow_mut())
    }

    /// Compute the effective method table for a type.
    ///
    /// The returned entries reflect the three-tier merge described at the
    /// crate root. Opaque types resolve to an empty table.
    pub fn resolve_methods(&self, name: &TypeName) -> Vec<ResolvedMethod> {
        let mut visited = BTreeSet::new();
        self.resolve_inner(name, &mut visited)
    }

    fn resolve_inner(
        &self,
        name: &TypeName,
        visited: &mut BTreeSet<TypeName>,
    ) -> Vec<ResolvedMethod> {
        // Cycle guard for malformed hierarchies.
        if !visited.insert(name.clone()) {
            return Vec::new();
        }
        let Some(module) = self.modules.get(name) else {
            return Vec::new();
        };

        let mut table: Vec<ResolvedMethod> = Vec::new();

        // Tier 1: transitively inherited interface methods. Each parent branch
        // resolves independently so diamonds reconverge here. Interface
        // statics never propagate: they are not inherited for dispatch.
        for iface in &module.interfaces {
            let mut branch = visited.clone();
            for candidate in self.resolve_inner(iface, &mut branch) {
                if candidate.flags.is_static {
                    continue;
                }
                self.merge_interface_candidate(&mut table, candidate, name);
            }
        }

        // Tier 2: superclass methods override the interface tier.
        if let Some(superclass) = &module.superclass {
            let mut branch = visited.clone();
            for candidate in self.resolve_inner(superclass, &mut branch) {
                upsert(&mut table, candidate);
            }
        }

        // Tier 3: own declarations always win.
        for method in &module.methods {
            upsert(
                &mut table,
                ResolvedMethod {
                    signature: method.signature(),
                    kind: method.kind.clone(),
                    flags: method.flags,
                    declared_by: name.clone(),
                },
            );
        }

        table
    }

    /// Merge one interface-tier candidate, preferring the most-derived
    /// declaring interface. Unrelated conflicting defaults are flagged and the
    /// first candidate in declaration order is kept.
    fn merge_interface_candidate(
        &self,
        table: &mut Vec<ResolvedMethod>,
        candidate: ResolvedMethod,
        site: &TypeName,
    ) {
        let Some(existing) = table
            .iter_mut()
            .find(|m| m.signature == candidate.signature)
        else {
            table.push(candidate);
            return;
        };
        if existing.declared_by == candidate.declared_by {
            return;
        }
        if self.is_subinterface(&candidate.declared_by, &existing.declared_by) {
            *existing = candidate;
            return;
        }
        if self.is_subinterface(&existing.declared_by, &candidate.declared_by) {
            return;
        }
        match (existing.is_default(), candidate.is_default()) {
            // A concrete default beats an unrelated abstract declaration.
            (false, true) => *existing = candidate,
            (true, true) => {
                warn!(
                    site = %site,
                    signature = %candidate.signature,
                    kept = %existing.declared_by,
                    ignored = %candidate.declared_by,
                    "ambiguous default inheritance"
                );
                self.diagnostics
                    .borrow_mut()
                    .push(Diagnostic::AmbiguousDefaultInheritance {
                        site: site.clone(),
                        signature: candidate.signature,
                        kept: existing.declared_by.clone(),
                        ignored: candidate.declared_by,
                    });
            }
            _ => {}
        }
    }

    /// True iff `sub` transitively extends `parent` (strict: a type is not
    /// its own sub-interface).
    pub fn is_subinterface(&self, sub: &TypeName, parent: &TypeName) -> bool {
        if sub == parent {
            return false;
        }
        let mut queue: VecDeque<TypeName> = match self.modules.get(sub) {
            Some(module) => module.interfaces.iter().cloned().collect(),
            None => return false,
        };
        let mut seen = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if current == *parent {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(module) = self.modules.get(&current) {
                queue.extend(module.interfaces.iter().cloned());
            }
        }
        false
    }

    /// Locate the relocated body for a default-method reference.
    ///
    /// Walks the reference's own interface first, then breadth-first over
    /// directly implemented parent interfaces. The first declaration found
    /// decides: a default yields its companion target, an abstract
    /// declaration re-abstracts the method and yields `None`. Opaque
    /// interfaces along the walk are skipped silently.
    pub fn default_implementation_of(
        &self,
        reference: &MethodReference,
    ) -> Option<MethodReference> {
        let signature = reference.signature();
        let mut queue = VecDeque::from([reference.owner.clone()]);
        let mut seen = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(module) = self.modules.get(&current) else {
                continue;
            };
            let declaration = module
                .methods
                .iter()
                .find(|m| !m.flags.is_static && m.signature() == signature);
            if let Some(method) = declaration {
                return match &method.kind {
                    MethodKind::Default { target } => Some(target.clone()),
                    _ => None,
                };
            }
            queue.extend(module.interfaces.iter().cloned());
        }
        None
    }
}

fn upsert(table: &mut Vec<ResolvedMethod>, candidate: ResolvedMethod) {
    match table
        .iter_mut()
        .find(|m| m.signature == candidate.signature)
    {
        Some(existing) => *existing = candidate,
        None => table.push(candidate),
    }
}
