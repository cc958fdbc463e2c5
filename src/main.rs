//! Rewrites compiled object modules so they run on older runtime levels.
//!
//! Reads a directory of `*.module.json` files, relocates interface default
//! and static bodies into companion modules, reifies closure-creation sites
//! into synthesized modules, strips members the target level cannot host,
//! and writes the rewritten set (plus untouched resources) to `--out-dir`.
use anyhow::{Context, Result};
use clap::Parser;
use retroport::{Args, DirectorySink, DirectorySource};
use retroport_core::Pipeline;
use std::fs;
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();
    info!(input = %args.input_dir.display(), out = %args.out_dir.display(), target = %config.target, "starting backport run");

    let mut source = DirectorySource::new(&args.input_dir);
    let mut sink = DirectorySink::new(&args.out_dir)?;
    let summary = Pipeline::new(config).run(&mut source, &mut sink)?;

    for diagnostic in &summary.diagnostics {
        warn!(%diagnostic, "diagnostic");
    }
    info!(
        modules_in = summary.modules_in,
        modules_emitted = summary.modules_emitted,
        companions = summary.companions_emitted,
        lambdas = summary.lambdas_synthesized,
        resources = summary.resources_passed,
        diagnostics = summary.diagnostics.len(),
        "backport complete"
    );

    if let Some(path) = &args.summary_json {
        let json = serde_json::json!({
            "target": config.target.to_string(),
            "backport_defaults": config.backport_defaults,
            "modules_in": summary.modules_in,
            "modules_emitted": summary.modules_emitted,
            "companions_emitted": summary.companions_emitted,
            "lambdas_synthesized": summary.lambdas_synthesized,
            "resources_passed": summary.resources_passed,
            "diagnostics": summary.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        });
        let text = serde_json::to_string_pretty(&json)?;
        if path.as_os_str() == "-" {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        } else {
            fs::write(path, format!("{text}\n"))
                .with_context(|| format!("write summary {}", path.display()))?;
        }
    }

    Ok(())
}
