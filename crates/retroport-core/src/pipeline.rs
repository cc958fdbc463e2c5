//! Two-phase backporting pipeline.
//!
//! Phase 1 ingests every input module into the hierarchy analyzer; no
//! resolution query runs before the whole closed world is registered.
//! Phase 2 walks the input set in deterministic name order and runs each
//! module through relocation, delegate generation, and stripping, emitting
//! the result exactly once. Companion and synthesized lambda modules are
//! emitted as side effects of the module that caused them.

use crate::config::BackportConfig;
use crate::reify::LambdaReifier;
use crate::rewrite::{
    companion_for, generate_delegates, relocate_calls, strip_illegal, RewriteContext, RewriteState,
};
use crate::sink::{ModuleSource, OutputSink};
use anyhow::Result;
use retroport_hierarchy::{HierarchyAnalyzer, RelocationTable};
use retroport_types::{encode_module, Diagnostic, TypeName};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Counters and diagnostics from one pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub modules_in: usize,
    pub modules_emitted: usize,
    pub companions_emitted: usize,
    pub lambdas_synthesized: usize,
    pub resources_passed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// The backporting pipeline. Stateless across runs; every run builds a fresh
/// analyzer, relocation table, and reifier.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: BackportConfig,
}

impl Pipeline {
    pub fn new(config: BackportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackportConfig {
        &self.config
    }

    /// Rewrite every module from `source` into `sink`.
    pub fn run(&self, source: &mut dyn ModuleSource, sink: &mut dyn OutputSink) -> Result<RunSummary> {
        let mut hierarchy = HierarchyAnalyzer::new();
        let input = source.modules()?;
        let modules_in = input.len();
        info!(modules = modules_in, target = %self.config.target, "ingesting input set");
        for module in input {
            hierarchy.ingest(module);
        }

        let mut relocation = RelocationTable::new(self.config.relocates_defaults());
        let mut reifier = LambdaReifier::new();
        let mut diagnostics = Vec::new();
        let mut summary = RunSummary {
            modules_in,
            ..RunSummary::default()
        };

        // Snapshot the input set before rewriting; reification grows the
        // analyzer mid-phase and synthesized modules are emitted separately.
        let batch: Vec<TypeName> = hierarchy.module_names().cloned().collect();
        let mut states: BTreeMap<TypeName, RewriteState> = batch
            .iter()
            .map(|name| (name.clone(), RewriteState::Unvisited))
            .collect();

        // Names the companions will claim. An input module colliding with one
        // loses the name: the companion's bytes must be the ones that survive.
        let claimed: BTreeSet<TypeName> = if self.config.relocates_defaults() {
            batch
                .iter()
                .filter(|name| hierarchy.is_interface(name) && hierarchy.needs_companion(name))
                .map(|name| name.companion())
                .collect()
        } else {
            BTreeSet::new()
        };

        info!(modules = batch.len(), "rewriting");
        for name in batch {
            debug_assert_eq!(states.get(&name), Some(&RewriteState::Unvisited));
            if claimed.contains(&name) {
                warn!(module = %name, "dropping input module displaced by a companion");
                continue;
            }
            states.insert(name.clone(), RewriteState::Relocating);
            let module = hierarchy
                .get(&name)
                .cloned()
                .unwrap_or_else(|| unreachable!("module {name} registered during ingestion"));

            let relocated = {
                let mut ctx = RewriteContext {
                    hierarchy: &mut hierarchy,
                    relocation: &mut relocation,
                    reifier: &mut reifier,
                    config: &self.config,
                    diagnostics: &mut diagnostics,
                    sink,
                };
                relocate_calls(&module, &mut ctx)?
            };

            if let Some(companion) =
                companion_for(&module, &hierarchy, &self.config, &mut diagnostics)
            {
                // Default bodies carry calls and closure sites of their own.
                let relocated_companion = {
                    let mut ctx = RewriteContext {
                        hierarchy: &mut hierarchy,
                        relocation: &mut relocation,
                        reifier: &mut reifier,
                        config: &self.config,
                        diagnostics: &mut diagnostics,
                        sink,
                    };
                    relocate_calls(&companion, &mut ctx)?
                };
                debug!(companion = %relocated_companion.name, "emitting companion module");
                sink.emit_module(
                    &relocated_companion.name,
                    encode_module(&relocated_companion)?,
                )?;
                summary.companions_emitted += 1;
            }

            states.insert(name.clone(), RewriteState::Stripping);
            let with_delegates = generate_delegates(&relocated, &hierarchy, &self.config);
            let stripped = strip_illegal(&with_delegates, &self.config, &mut diagnostics);

            sink.emit_module(&stripped.name, encode_module(&stripped)?)?;
            states.insert(name, RewriteState::Emitted);
            summary.modules_emitted += 1;
        }

        for (name, bytes) in source.resources()? {
            sink.emit_resource(&name, bytes)?;
            summary.resources_passed += 1;
        }

        diagnostics.extend(hierarchy.take_diagnostics());
        summary.lambdas_synthesized = reifier.synthesized_count();
        summary.diagnostics = diagnostics;
        info!(
            emitted = summary.modules_emitted,
            companions = summary.companions_emitted,
            lambdas = summary.lambdas_synthesized,
            diagnostics = summary.diagnostics.len(),
            "run complete"
        );
        Ok(summary)
    }
}
