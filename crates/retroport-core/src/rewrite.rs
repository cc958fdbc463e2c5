//! Per-module rewriting stages.
//!
//! Each input module flows through three stages in order:
//!
//! 1. [`relocate_calls`] — closure-creation instructions are reified into
//!    factory calls, call instructions are redirected through the relocation
//!    table, and promoted or widened closure-body declarations are rewritten
//!    in place.
//! 2. [`generate_delegates`] — implementing classes get synthetic forwarding
//!    methods for the interface defaults they inherit but do not override, so
//!    virtual dispatch keeps working once the interface bodies are gone.
//! 3. [`strip_illegal`] — members the target runtime cannot host are removed
//!    or reduced to abstract signatures.
//!
//! Companion modules are built separately by [`companion_for`] and then run
//! through [`relocate_calls`] themselves, since relocated default bodies may
//! contain calls and closure sites of their own.

use crate::config::BackportConfig;
use crate::reify::{LambdaReifier, ReifiedClosure};
use crate::sink::OutputSink;
use anyhow::Result;
use retroport_hierarchy::{HierarchyAnalyzer, RelocationTable};
use retroport_types::{
    encode_module, parameter_descriptors, Diagnostic, DispatchKind, Instr, MethodDescriptor,
    MethodFlags, MethodKind, MethodReference, ModuleDescriptor, Visibility,
};
use tracing::{debug, warn};

/// Lifecycle of one module through the rewriting phase. Tracked by the
/// pipeline so no module is ever emitted twice or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteState {
    Unvisited,
    Relocating,
    Stripping,
    Emitted,
}

/// Mutable collaborators threaded through the rewriting stages.
pub struct RewriteContext<'a> {
    pub hierarchy: &'a mut HierarchyAnalyzer,
    pub relocation: &'a mut RelocationTable,
    pub reifier: &'a mut LambdaReifier,
    pub config: &'a BackportConfig,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    pub sink: &'a mut dyn OutputSink,
}

/// Stage 1: reify closure sites and redirect call targets.
///
/// Closure sites are processed first so that any promotions they register
/// are visible when this module's own declarations and remaining call
/// instructions are rewritten. Closure bodies are private, so no module
/// rewritten earlier can hold a stale reference to them.
pub fn relocate_calls(
    module: &ModuleDescriptor,
    ctx: &mut RewriteContext<'_>,
) -> Result<ModuleDescriptor> {
    let mut out = module.clone();
    // Interface bodies on a pre-v8 target are relocated to the companion (or
    // removed outright); the companion copy is the one that gets rewritten.
    // Processing them here too would reify each closure site twice.
    let leave_bodies = module.is_interface() && !ctx.config.target.supports_interface_bodies();

    for method in &mut out.methods {
        if leave_bodies {
            continue;
        }
        let Some(body) = method.body.as_mut() else {
            continue;
        };
        for instr in body.iter_mut() {
            if let Instr::NewClosure(site) = instr {
                let reified = ctx
                    .reifier
                    .reify(&module.name, site, ctx.hierarchy, ctx.relocation)?;
                emit_synthesized(&reified, ctx)?;
                *instr = Instr::Invoke(reified.factory);
            }
        }
    }

    for method in &mut out.methods {
        let signature = method.signature();
        if let Some(promoted) = ctx.relocation.promotion_for(&module.name, &signature) {
            method.descriptor = promoted.descriptor.clone();
            method.flags.is_static = true;
            method.flags.visibility = Visibility::Package;
        } else if ctx.relocation.is_widened(&module.name, &signature) {
            method.flags.visibility = Visibility::Package;
        }
        if leave_bodies {
            continue;
        }
        if let Some(body) = method.body.as_mut() {
            for instr in body.iter_mut() {
                if let Instr::Invoke(reference) = instr {
                    let target = ctx.relocation.call_target_for(ctx.hierarchy, reference);
                    *instr = Instr::Invoke(downgrade_dispatch(ctx.hierarchy, ctx.config, target));
                }
            }
        }
    }

    Ok(out)
}

/// Synthesized modules inherit delegates like any other implementing class,
/// then go straight to the sink. Their bodies were built against
/// already-relocated targets, so they skip the relocation stage.
fn emit_synthesized(reified: &ReifiedClosure, ctx: &mut RewriteContext<'_>) -> Result<()> {
    let module = generate_delegates(&reified.module, ctx.hierarchy, ctx.config);
    let bytes = encode_module(&module)?;
    ctx.sink.emit_module(&module.name, bytes)
}

/// Older runtimes reject interface-typed dispatch on calls whose resolved
/// owner is a class, which relocation can produce when a call lands on a
/// synthesized module. Downgrade to plain virtual dispatch for known classes.
fn downgrade_dispatch(
    hierarchy: &HierarchyAnalyzer,
    config: &BackportConfig,
    mut reference: MethodReference,
) -> MethodReference {
    if reference.dispatch == DispatchKind::Interface
        && !config.target.supports_interface_dispatch()
        && hierarchy.contains(&reference.owner)
        && !hierarchy.is_interface(&reference.owner)
    {
        reference.dispatch = DispatchKind::Virtual;
    }
    reference
}

/// Stage 2: synthesize forwarding methods on implementing classes for every
/// inherited default the class does not override.
///
/// Each delegate loads the receiver and its arguments and calls the relocated
/// companion static. A class whose in-set superclass already inherits the
/// same resolution inherits the superclass delegate instead of getting its
/// own copy.
pub fn generate_delegates(
    module: &ModuleDescriptor,
    hierarchy: &HierarchyAnalyzer,
    config: &BackportConfig,
) -> ModuleDescriptor {
    if module.is_interface() || !config.relocates_defaults() {
        return module.clone();
    }
    let mut out = module.clone();
    let inherited = module
        .superclass
        .as_ref()
        .map(|superclass| hierarchy.resolve_methods(superclass))
        .unwrap_or_default();

    for resolved in hierarchy.resolve_methods(&module.name) {
        let MethodKind::Default { target } = &resolved.kind else {
            continue;
        };
        if out.has_method(&resolved.signature) {
            continue;
        }
        if inherited
            .iter()
            .any(|entry| entry.signature == resolved.signature && entry.kind == resolved.kind)
        {
            continue;
        }
        debug!(
            module = %module.name,
            signature = %resolved.signature,
            target = %target,
            "generating default-method delegate"
        );
        let mut body = vec![Instr::LoadArg(0)];
        for param in 0..parameter_descriptors(&resolved.signature.descriptor).len() {
            body.push(Instr::LoadArg((param + 1) as u16));
        }
        body.push(Instr::Invoke(target.clone()));
        body.push(Instr::Return);
        out = out.with_method(MethodDescriptor::new(
            resolved.signature.name.clone(),
            resolved.signature.descriptor.clone(),
            MethodFlags::public_instance().with_synthetic(),
            Some(body),
        ));
    }
    out
}

/// Stage 3: remove or reduce members the target runtime cannot host.
///
/// On pre-v8 targets, interface default bodies are dropped (the body already
/// lives in the companion) and the abstract signature stays behind; interface
/// statics are removed outright. With backporting disabled both are removed
/// and a warning diagnostic is recorded per member. Pre-v6 targets
/// additionally strip covariant bridge members from classes.
pub fn strip_illegal(
    module: &ModuleDescriptor,
    config: &BackportConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> ModuleDescriptor {
    let mut out = module.clone();

    if module.is_interface() && !config.target.supports_interface_bodies() {
        let mut kept = Vec::with_capacity(out.methods.len());
        for mut method in out.methods {
            match &method.kind {
                MethodKind::Default { .. } => {
                    if config.backport_defaults {
                        method.body = None;
                        method.kind = MethodKind::Abstract;
                        method.flags.is_abstract = true;
                        kept.push(method);
                    } else {
                        defaults_disabled(&out.name, &method, diagnostics);
                    }
                }
                MethodKind::Implemented if method.flags.is_static && method.has_body() => {
                    if !config.backport_defaults {
                        defaults_disabled(&out.name, &method, diagnostics);
                    }
                    // Relocated to the companion; nothing stays behind.
                }
                _ => kept.push(method),
            }
        }
        out.methods = kept;
    }

    if !module.is_interface() && config.target.needs_bridge_stripping() {
        out.methods.retain(|method| !method.flags.is_bridge);
    }

    out
}

fn defaults_disabled(
    interface: &retroport_types::TypeName,
    method: &MethodDescriptor,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let diagnostic = Diagnostic::DefaultsDisabled {
        interface: interface.clone(),
        signature: method.signature(),
    };
    warn!(%diagnostic, "removing interface member");
    diagnostics.push(diagnostic);
}

/// Build the companion module for an interface that needs one: a final
/// utility class named by appending the companion marker, holding the
/// interface's default bodies as receiver-prepended statics plus its
/// relocated statics.
///
/// Returns `None` when the interface needs no companion or relocation does
/// not apply for this run. A pre-existing module already occupying the
/// companion name is recorded as a collision diagnostic; the companion wins
/// the name.
pub fn companion_for(
    module: &ModuleDescriptor,
    hierarchy: &HierarchyAnalyzer,
    config: &BackportConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ModuleDescriptor> {
    if !module.is_interface()
        || !config.relocates_defaults()
        || !hierarchy.needs_companion(&module.name)
    {
        return None;
    }
    let companion_name = module.name.companion();
    if hierarchy.contains(&companion_name) {
        let diagnostic = Diagnostic::CompanionNameCollision {
            interface: module.name.clone(),
            companion: companion_name.clone(),
        };
        warn!(%diagnostic, "companion module replaces existing module");
        diagnostics.push(diagnostic);
    }

    let mut companion = ModuleDescriptor::class(companion_name);
    for method in &module.methods {
        match &method.kind {
            MethodKind::Default { target } => {
                companion = companion.with_method(MethodDescriptor::new(
                    target.name.clone(),
                    target.descriptor.clone(),
                    MethodFlags::public_static(),
                    method.body.clone(),
                ));
            }
            MethodKind::Implemented if method.flags.is_static && method.has_body() => {
                companion = companion.with_method(MethodDescriptor::new(
                    method.name.clone(),
                    method.descriptor.clone(),
                    MethodFlags::public_static(),
                    method.body.clone(),
                ));
            }
            _ => {}
        }
    }
    Some(companion)
}
