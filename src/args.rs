use clap::{Parser, ValueEnum};
use retroport_core::{BackportConfig, RuntimeLevel};
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum TargetLevel {
    /// Oldest supported level; also strips covariant bridge members.
    V5,
    V6,
    /// Default target.
    V7,
    /// Modern level; interfaces keep their bodies.
    V8,
}

impl From<TargetLevel> for RuntimeLevel {
    fn from(level: TargetLevel) -> Self {
        match level {
            TargetLevel::V5 => RuntimeLevel::V5,
            TargetLevel::V6 => RuntimeLevel::V6,
            TargetLevel::V7 => RuntimeLevel::V7,
            TargetLevel::V8 => RuntimeLevel::V8,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Directory holding the compiled input set (`*.module.json` files plus
    /// arbitrary resources, nested by qualified name).
    #[arg(long, value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Output directory for rewritten modules, companions, synthesized
    /// lambda modules, and passed-through resources.
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Runtime capability level the rewritten modules must run on.
    #[arg(long, value_enum, default_value_t = TargetLevel::V7)]
    pub target: TargetLevel,

    /// Remove interface default/static bodies instead of relocating them to
    /// companion modules (warns per removed member).
    #[arg(long, default_value_t = false)]
    pub no_default_backport: bool,

    /// Write a run summary JSON to a file path (use '-' for stdout).
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,
}

impl Args {
    pub fn config(&self) -> BackportConfig {
        BackportConfig {
            target: self.target.into(),
            backport_defaults: !self.no_default_backport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["retroport", "--input-dir", "in", "--out-dir", "out"]);
        let config = args.config();
        assert_eq!(config.target, RuntimeLevel::V7);
        assert!(config.backport_defaults);
    }

    #[test]
    fn test_disable_flag_maps_to_config() {
        let args = Args::parse_from([
            "retroport",
            "--input-dir",
            "in",
            "--out-dir",
            "out",
            "--target",
            "v6",
            "--no-default-backport",
        ]);
        let config = args.config();
        assert_eq!(config.target, RuntimeLevel::V6);
        assert!(!config.backport_defaults);
    }
}
