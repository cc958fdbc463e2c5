//! Call-target relocation.
//!
//! [`RelocationTable::call_target_for`] is the single oracle the rewriting
//! pass queries for every call instruction. It redirects:
//!
//! - `super`-dispatch references to interface default methods, which become
//!   ordinary static calls into the companion module,
//! - static references whose owner is a companion-needing interface,
//! - references to closure body methods that reification promoted to statics.
//!
//! Everything else passes through unchanged. Targets are never themselves
//! relocated, so the mapping is idempotent. The table is per-run: companion
//! names depend on the full closed-world view, so nothing here is cached
//! across runs.

use crate::hierarchy::HierarchyAnalyzer;
use retroport_types::{DispatchKind, MethodReference, MethodSignature, TypeName};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Derived, per-run view mapping original call targets to rewritten ones.
#[derive(Debug)]
pub struct RelocationTable {
    /// When false, interface defaults are removed rather than relocated and
    /// companion redirects are suppressed.
    backport_defaults: bool,
    /// Private instance closure bodies promoted to receiver-prepended statics
    /// by the reifier: (declaring module, original signature) -> new target.
    promotions: BTreeMap<(TypeName, MethodSignature), MethodReference>,
    /// Private static closure bodies whose visibility must widen in place.
    widenings: BTreeSet<(TypeName, MethodSignature)>,
}

impl RelocationTable {
    pub fn new(backport_defaults: bool) -> Self {
        Self {
            backport_defaults,
            promotions: BTreeMap::new(),
            widenings: BTreeSet::new(),
        }
    }

    /// Register a private-instance-to-static promotion discovered during
    /// closure reification. Every later call to the original method is
    /// redirected to `target`, and the declaring module's own declaration is
    /// rewritten when its turn comes.
    pub fn add_promotion(
        &mut self,
        owner: TypeName,
        signature: MethodSignature,
        target: MethodReference,
    ) {
        debug!(owner = %owner, signature = %signature, target = %target, "promoting closure body");
        self.promotions.insert((owner, signature), target);
    }

    pub fn promotion_for(
        &self,
        owner: &TypeName,
        signature: &MethodSignature,
    ) -> Option<&MethodReference> {
        self.promotions.get(&(owner.clone(), signature.clone()))
    }

    /// Register a visibility widening for a private static closure body.
    /// Statics cannot be overridden, so widening alone is override-safe.
    pub fn add_widening(&mut self, owner: TypeName, signature: MethodSignature) {
        self.widenings.insert((owner, signature));
    }

    pub fn is_widened(&self, owner: &TypeName, signature: &MethodSignature) -> bool {
        self.widenings.contains(&(owner.clone(), signature.clone()))
    }

    /// The call target that must actually be invoked after rewriting.
    pub fn call_target_for(
        &self,
        hierarchy: &HierarchyAnalyzer,
        reference: &MethodReference,
    ) -> MethodReference {
        if let Some(target) = self
            .promotions
            .get(&(reference.owner.clone(), reference.signature()))
        {
            return target.clone();
        }
        if !self.backport_defaults {
            return reference.clone();
        }
        match reference.dispatch {
            // Interface-default-method called via super becomes an ordinary
            // static call into the companion.
            DispatchKind::Special if hierarchy.is_interface(&reference.owner) => hierarchy
                .default_implementation_of(reference)
                .unwrap_or_else(|| reference.clone()),
            // Interface statics live in the companion after rewriting.
            DispatchKind::Static
                if hierarchy.is_interface(&reference.owner)
                    && hierarchy.needs_companion(&reference.owner) =>
            {
                MethodReference::new(
                    DispatchKind::Static,
                    reference.owner.companion(),
                    reference.name.clone(),
                    reference.descriptor.clone(),
                )
            }
            _ => reference.clone(),
        }
    }
}
