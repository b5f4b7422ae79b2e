//! CLI command definitions.
//!
//! Every command reads one YAML app definition (or a directory of them),
//! builds the stack and hands it to the synthesis pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use strata_core::Environment;
use strata_resources::{App, AppDefinition};
use strata_synth::{SynthConfig, CONFIG_FILE_NAME};
use tracing::debug;

pub mod graph;
pub mod integ;
pub mod synth;
pub mod validate;

/// Strata - infrastructure-as-code synthesis
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about = "Strata - synthesize deployment templates from construct trees")]
#[command(long_about = r#"
Strata builds a construct tree from a YAML app definition, validates it and
emits a dependency-ordered deployment template.

COMMANDS:
  synth     → Synthesize a template and assembly manifest
  validate  → Run every validation check and print the report
  graph     → Print the emission order and dependency edges
  integ     → Synthesize integ.*.yaml files and compare with snapshots

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Definition error
  5 - Synthesis error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a stack into a template and assembly manifest
    Synth(synth::SynthArgs),

    /// Validate a stack without emitting anything
    Validate(validate::ValidateArgs),

    /// Show the dependency graph and emission order of a stack
    Graph(graph::GraphArgs),

    /// Check integration definitions against their snapshots
    Integ(integ::IntegArgs),
}

/// Deployment target overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArgs {
    /// Target account, overrides the definition's environment
    #[arg(long, env = "STRATA_ACCOUNT")]
    pub account: Option<String>,

    /// Target region, overrides the definition's environment
    #[arg(long, env = "STRATA_REGION")]
    pub region: Option<String>,
}

impl EnvironmentArgs {
    /// `base` with any overrides applied.
    pub fn apply(&self, base: &Environment) -> Environment {
        Environment {
            account: self.account.clone().or_else(|| base.account.clone()),
            region: self.region.clone().or_else(|| base.region.clone()),
        }
    }
}

/// Load synthesis settings: the given file, else `strata.yaml` in the
/// current directory, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<SynthConfig> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        return SynthConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = std::env::current_dir()?.join(CONFIG_FILE_NAME);
    if default_path.exists() {
        debug!("Using config {:?}", default_path);
        return SynthConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path));
    }
    Ok(SynthConfig::default())
}

/// Load a definition and build its stack.
pub fn build_app(definition: &Path, environment: &EnvironmentArgs) -> Result<App> {
    if !definition.exists() {
        anyhow::bail!("Definition not found: {:?}", definition);
    }
    let definition = AppDefinition::from_file(definition)?;
    let environment = environment.apply(&definition.environment);
    let app = definition
        .build_with_environment(environment)
        .with_context(|| format!("Failed to build stack {}", definition.stack))?;
    Ok(app)
}

/// Definition file argument.
pub fn definition_arg(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        path.join("app.yaml")
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_environment_overrides() {
        let base = Environment::new().with_account("111").with_region("eu-west-1");
        let args = EnvironmentArgs {
            account: None,
            region: Some("us-east-1".into()),
        };
        let env = args.apply(&base);
        assert_eq!(env.account.as_deref(), Some("111"));
        assert_eq!(env.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_build_app_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        fs::write(
            &path,
            "stack: app\nconstructs:\n  - { name: Assets, kind: bucket }\n",
        )
        .unwrap();

        let app = build_app(&definition_arg(dir.path().to_path_buf()), &EnvironmentArgs::default())
            .unwrap();
        assert_eq!(app.stack.name(), "app");
        assert_eq!(app.handles.len(), 1);

        assert!(build_app(&dir.path().join("missing.yaml"), &EnvironmentArgs::default()).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("strata.yaml"))).is_err());
    }
}
