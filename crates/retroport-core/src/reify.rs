//! Closure reification.
//!
//! Every closure-creation site encountered during rewriting is turned into a
//! concrete synthesized module implementing the site's behavioral interface.
//! Stateless closures (zero captures) get a lazily-constructed process-wide
//! singleton: the instance is built by a one-time static initializer, which
//! first runs when the factory is first invoked, and the factory returns the
//! cached value. Stateful closures construct a fresh instance per factory
//! call, passing the captured values to the constructor.
//!
//! Synthesized names embed a sequence number scoped to the lexically
//! enclosing module, assigned in visit order starting at 1 and reset at the
//! start of each run, so repeated runs over unchanged input produce
//! byte-identical names.

use crate::errors::BackportError;
use retroport_hierarchy::{HierarchyAnalyzer, RelocationTable};
use retroport_types::{
    parameter_descriptors, prepend_receiver, ClosureSite, DispatchKind, FieldDescriptor, Instr,
    MethodDescriptor, MethodFlags, MethodReference, ModuleDescriptor, TypeName, Visibility,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Generated name of the static factory method on every synthesized module.
pub const FACTORY_METHOD: &str = "lambdaFactory$";

/// Name of the cached singleton field on stateless synthesized modules.
pub const SINGLETON_FIELD: &str = "instance";

/// A reified closure site: the synthesized module plus its factory reference.
#[derive(Debug, Clone)]
pub struct ReifiedClosure {
    pub module: ModuleDescriptor,
    pub stateless: bool,
    /// The static factory call that replaces the closure-creation
    /// instruction.
    pub factory: MethodReference,
}

/// Synthesizes lambda modules from closure-creation sites.
///
/// Sequence counters live here, per pipeline run, never in process-global
/// state.
#[derive(Debug, Default)]
pub struct LambdaReifier {
    counters: BTreeMap<TypeName, u32>,
}

impl LambdaReifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of modules synthesized so far this run.
    pub fn synthesized_count(&self) -> usize {
        self.counters.values().map(|c| *c as usize).sum()
    }

    /// Reify one closure-creation site.
    ///
    /// The synthesized module is re-ingested into the analyzer before being
    /// returned, so a closure implementing an interface that itself carries
    /// default methods resolves like any other implementer. The caller is
    /// responsible for emission.
    pub fn reify(
        &mut self,
        enclosing: &TypeName,
        site: &ClosureSite,
        hierarchy: &mut HierarchyAnalyzer,
        relocation: &mut RelocationTable,
    ) -> Result<ReifiedClosure, BackportError> {
        let body_target = self.resolve_body(enclosing, site, hierarchy, relocation)?;

        let seq = {
            let counter = self.counters.entry(enclosing.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let name = enclosing.lambda(seq);
        let stateless = site.is_stateless();
        debug!(site = %name, interface = %site.interface, stateless, "reifying closure site");

        let mut module = ModuleDescriptor::class(name.clone()).with_interface(site.interface.clone());

        // Capture fields, one per captured variable in declaration order.
        for (index, capture) in site.captures.iter().enumerate() {
            module = module.with_field(FieldDescriptor {
                name: format!("arg${index}"),
                descriptor: capture.clone(),
                visibility: Visibility::Private,
                is_static: false,
                is_final: true,
            });
        }

        // Constructor taking the captures in declaration order.
        let ctor_descriptor = format!("({})V", site.captures.join(""));
        let mut ctor_body = Vec::new();
        for (index, _) in site.captures.iter().enumerate() {
            ctor_body.push(Instr::LoadArg((index + 1) as u16));
            ctor_body.push(Instr::PutField {
                owner: name.clone(),
                name: format!("arg${index}"),
            });
        }
        ctor_body.push(Instr::Return);
        let ctor = MethodReference::new(
            DispatchKind::Constructor,
            name.clone(),
            "<init>",
            ctor_descriptor.clone(),
        );
        module = module.with_method(MethodDescriptor::new(
            "<init>",
            ctor_descriptor,
            MethodFlags::private_instance().with_synthetic(),
            Some(ctor_body),
        ));

        // The behavioral method: push captures, forward arguments, call the
        // (relocated or promoted) body.
        let mut impl_body = Vec::new();
        for (index, _) in site.captures.iter().enumerate() {
            impl_body.push(Instr::GetField {
                owner: name.clone(),
                name: format!("arg${index}"),
            });
        }
        let param_count = parameter_descriptors(&site.method.descriptor).len();
        for param in 0..param_count {
            impl_body.push(Instr::LoadArg((param + 1) as u16));
        }
        impl_body.push(Instr::Invoke(body_target));
        impl_body.push(Instr::Return);
        module = module.with_method(MethodDescriptor::new(
            site.method.name.clone(),
            site.method.descriptor.clone(),
            MethodFlags::public_instance(),
            Some(impl_body),
        ));

        // Factory.
        let interface_descriptor = site.interface.descriptor();
        let factory_descriptor = format!("({}){}", site.captures.join(""), interface_descriptor);
        let factory_body = if stateless {
            module = module.with_field(FieldDescriptor {
                name: SINGLETON_FIELD.to_string(),
                descriptor: interface_descriptor,
                visibility: Visibility::Private,
                is_static: true,
                is_final: true,
            });
            module = module.with_method(MethodDescriptor::new(
                "<clinit>",
                "()V",
                MethodFlags {
                    visibility: Visibility::Package,
                    is_static: true,
                    is_abstract: false,
                    is_synthetic: true,
                    is_bridge: false,
                },
                Some(vec![
                    Instr::New(name.clone()),
                    Instr::Invoke(ctor),
                    Instr::PutStatic {
                        owner: name.clone(),
                        name: SINGLETON_FIELD.to_string(),
                    },
                    Instr::Return,
                ]),
            ));
            vec![
                Instr::GetStatic {
                    owner: name.clone(),
                    name: SINGLETON_FIELD.to_string(),
                },
                Instr::Return,
            ]
        } else {
            let mut body = vec![Instr::New(name.clone())];
            for (index, _) in site.captures.iter().enumerate() {
                body.push(Instr::LoadArg(index as u16));
            }
            body.push(Instr::Invoke(ctor));
            body.push(Instr::Return);
            body
        };
        module = module.with_method(MethodDescriptor::new(
            FACTORY_METHOD,
            factory_descriptor.clone(),
            MethodFlags::public_static().with_synthetic(),
            Some(factory_body),
        ));

        // Re-ingest so the synthesized module resolves like any other
        // implementer of the interface.
        hierarchy.ingest(module.clone());

        Ok(ReifiedClosure {
            factory: MethodReference::new(
                DispatchKind::Static,
                name,
                FACTORY_METHOD,
                factory_descriptor,
            ),
            stateless,
            module,
        })
    }

    /// Resolve the closure body to the reference the synthesized module must
    /// invoke, registering promotions or widenings for private bodies.
    ///
    /// A private *instance* body cannot merely have its visibility widened: a
    /// subclass could then override it and change behavior. It is promoted to
    /// a static with the receiver prepended as the leading parameter. Private
    /// *static* bodies only widen, since statics cannot be overridden.
    fn resolve_body(
        &self,
        enclosing: &TypeName,
        site: &ClosureSite,
        hierarchy: &HierarchyAnalyzer,
        relocation: &mut RelocationTable,
    ) -> Result<MethodReference, BackportError> {
        let inconsistency = || BackportError::ReificationInconsistency {
            enclosing: enclosing.clone(),
            body: site.body.clone(),
        };
        let owner_module = hierarchy.get(&site.body.owner).ok_or_else(inconsistency)?;
        let declared = owner_module
            .method(&site.body.signature())
            .ok_or_else(inconsistency)?;

        if declared.flags.visibility == Visibility::Private {
            let signature = site.body.signature();
            if declared.flags.is_static {
                relocation.add_widening(site.body.owner.clone(), signature);
                let mut target = site.body.clone();
                target.dispatch = DispatchKind::Static;
                return Ok(target);
            }
            if let Some(existing) = relocation.promotion_for(&site.body.owner, &signature) {
                return Ok(existing.clone());
            }
            let promoted = MethodReference::new(
                DispatchKind::Static,
                site.body.owner.clone(),
                site.body.name.clone(),
                prepend_receiver(&site.body.descriptor, &site.body.owner),
            );
            relocation.add_promotion(site.body.owner.clone(), signature, promoted.clone());
            return Ok(promoted);
        }

        Ok(relocation.call_target_for(hierarchy, &site.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroport_types::MethodSignature;
    use smallvec::smallvec;

    fn app_with_body(flags: MethodFlags) -> (HierarchyAnalyzer, ClosureSite) {
        let mut hierarchy = HierarchyAnalyzer::new();
        hierarchy.ingest(
            ModuleDescriptor::interface("com/example/Runner").with_method(MethodDescriptor::new(
                "run",
                "()V",
                MethodFlags::public_abstract(),
                None,
            )),
        );
        hierarchy.ingest(
            ModuleDescriptor::class("com/example/App").with_method(MethodDescriptor::new(
                "lambda$main$0",
                "()V",
                flags,
                Some(vec![Instr::Opaque(9), Instr::Return]),
            )),
        );
        let site = ClosureSite {
            interface: TypeName::from("com/example/Runner"),
            method: MethodSignature::new("run", "()V"),
            captures: smallvec![],
            body: MethodReference::new(
                DispatchKind::Virtual,
                "com/example/App",
                "lambda$main$0",
                "()V",
            ),
        };
        (hierarchy, site)
    }

    #[test]
    fn test_stateless_closure_gets_cached_singleton() {
        let (mut hierarchy, site) = app_with_body(MethodFlags::public_instance());
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let reified = reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap();

        assert!(reified.stateless);
        assert_eq!(reified.module.name.as_str(), "com/example/App$$Lambda$1");
        let factory = reified
            .module
            .method(&MethodSignature::new(
                FACTORY_METHOD,
                "()Lcom/example/Runner;",
            ))
            .expect("factory method");
        assert_eq!(
            factory.body.as_deref().unwrap()[0],
            Instr::GetStatic {
                owner: reified.module.name.clone(),
                name: SINGLETON_FIELD.to_string(),
            }
        );
        // The singleton is built by the one-time static initializer.
        assert!(reified
            .module
            .has_method(&MethodSignature::new("<clinit>", "()V")));
    }

    #[test]
    fn test_stateful_closure_constructs_per_call() {
        let (mut hierarchy, mut site) = app_with_body(MethodFlags::public_instance());
        site.captures = smallvec!["I".to_string(), "J".to_string()];
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let reified = reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap();

        assert!(!reified.stateless);
        assert_eq!(reified.module.fields.len(), 2);
        assert!(!reified
            .module
            .has_method(&MethodSignature::new("<clinit>", "()V")));
        let factory = reified
            .module
            .method(&MethodSignature::new(
                FACTORY_METHOD,
                "(IJ)Lcom/example/Runner;",
            ))
            .expect("factory method");
        let body = factory.body.as_deref().unwrap();
        assert_eq!(body[0], Instr::New(reified.module.name.clone()));
        assert!(matches!(body.last(), Some(Instr::Return)));
    }

    #[test]
    fn test_private_instance_body_is_promoted_to_static() {
        let (mut hierarchy, site) = app_with_body(MethodFlags::private_instance());
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let reified = reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap();

        let promoted = relocation
            .promotion_for(
                &TypeName::from("com/example/App"),
                &MethodSignature::new("lambda$main$0", "()V"),
            )
            .expect("promotion registered");
        assert_eq!(promoted.dispatch, DispatchKind::Static);
        assert_eq!(promoted.descriptor, "(Lcom/example/App;)V");

        // The behavioral method calls the promoted static.
        let run = reified
            .module
            .method(&MethodSignature::new("run", "()V"))
            .unwrap();
        assert!(run
            .body
            .as_deref()
            .unwrap()
            .contains(&Instr::Invoke(promoted.clone())));
    }

    #[test]
    fn test_private_static_body_only_widens() {
        let (mut hierarchy, site) = app_with_body(MethodFlags {
            visibility: Visibility::Private,
            is_static: true,
            is_abstract: false,
            is_synthetic: true,
            is_bridge: false,
        });
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap();

        let signature = MethodSignature::new("lambda$main$0", "()V");
        assert!(relocation.is_widened(&TypeName::from("com/example/App"), &signature));
        assert!(relocation
            .promotion_for(&TypeName::from("com/example/App"), &signature)
            .is_none());
    }

    #[test]
    fn test_sequence_numbers_scope_to_enclosing_module() {
        let (mut hierarchy, site) = app_with_body(MethodFlags::public_instance());
        hierarchy.ingest(ModuleDescriptor::class("com/example/Other").with_method(
            MethodDescriptor::new(
                "lambda$main$0",
                "()V",
                MethodFlags::public_instance(),
                Some(vec![Instr::Return]),
            ),
        ));
        let mut other_site = site.clone();
        other_site.body.owner = TypeName::from("com/example/Other");
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let app = TypeName::from("com/example/App");
        let other = TypeName::from("com/example/Other");
        let first = reifier
            .reify(&app, &site, &mut hierarchy, &mut relocation)
            .unwrap();
        let second = reifier
            .reify(&app, &site, &mut hierarchy, &mut relocation)
            .unwrap();
        let elsewhere = reifier
            .reify(&other, &other_site, &mut hierarchy, &mut relocation)
            .unwrap();

        assert_eq!(first.module.name.as_str(), "com/example/App$$Lambda$1");
        assert_eq!(second.module.name.as_str(), "com/example/App$$Lambda$2");
        assert_eq!(elsewhere.module.name.as_str(), "com/example/Other$$Lambda$1");
        assert_eq!(reifier.synthesized_count(), 3);
    }

    #[test]
    fn test_unknown_body_is_fatal() {
        let (mut hierarchy, mut site) = app_with_body(MethodFlags::public_instance());
        site.body.owner = TypeName::from("com/example/NotAnalyzed");
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let err = reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BackportError::ReificationInconsistency { .. }
        ));
    }

    #[test]
    fn test_synthesized_module_is_reingested() {
        let (mut hierarchy, site) = app_with_body(MethodFlags::public_instance());
        let mut relocation = RelocationTable::new(true);
        let mut reifier = LambdaReifier::new();

        let reified = reifier
            .reify(
                &TypeName::from("com/example/App"),
                &site,
                &mut hierarchy,
                &mut relocation,
            )
            .unwrap();
        assert!(hierarchy.contains(&reified.module.name));
    }
}
