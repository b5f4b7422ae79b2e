//! Integ command - Compare synthesized templates with stored snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use strata_resources::{snapshot_path, AppDefinition, DefinitionLoader};
use strata_synth::{SynthConfig, Synthesizer};

use super::{load_config, EnvironmentArgs};

#[derive(Args)]
pub struct IntegArgs {
    /// Directory searched for integ.*.yaml definitions
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Rewrite snapshots instead of comparing against them
    #[arg(long)]
    update: bool,

    /// Synthesis config file (defaults to ./strata.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    environment: EnvironmentArgs,
}

/// Result of checking one definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegOutcome {
    Matched,
    Updated,
    Missing,
    Differs { line: usize },
}

impl IntegOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, IntegOutcome::Matched | IntegOutcome::Updated)
    }
}

pub async fn execute(args: IntegArgs) -> Result<()> {
    info!("Running integration snapshots under {:?}", args.dir);

    if !args.dir.exists() {
        anyhow::bail!("Integ directory not found: {:?}", args.dir);
    }

    let config = load_config(args.config.as_deref())?;
    let files = DefinitionLoader::integ(&args.dir).discover();
    if files.is_empty() {
        println!("⚠️  No integ definitions found under {:?}", args.dir);
        return Ok(());
    }

    println!("🧪 Checking {} definition(s)...\n", files.len());

    let mut passed = 0;
    let mut failed = 0;
    for file in &files {
        print!("Testing {}... ", file.display());
        match check(file, &config, &args.environment, args.update) {
            Ok(outcome) if outcome.passed() => {
                println!("{}", if outcome == IntegOutcome::Updated { "📝" } else { "✅" });
                passed += 1;
            }
            Ok(IntegOutcome::Missing) => {
                println!("❌");
                println!("   - no snapshot, run with --update to create it");
                failed += 1;
            }
            Ok(outcome) => {
                println!("❌");
                if let IntegOutcome::Differs { line } = outcome {
                    println!("   - template differs from snapshot at line {}", line);
                }
                failed += 1;
            }
            Err(e) => {
                println!("❌");
                println!("   - {:#}", e);
                warn!("Integ definition {:?} failed: {}", file, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        anyhow::bail!("{} integ definition(s) failed", failed);
    }
    Ok(())
}

/// Synthesize one definition and compare with (or rewrite) its snapshot.
pub fn check(
    file: &Path,
    config: &SynthConfig,
    environment: &EnvironmentArgs,
    update: bool,
) -> Result<IntegOutcome> {
    let definition = AppDefinition::from_file(file)?;
    let app = definition.build_with_environment(environment.apply(&definition.environment))?;
    let output = Synthesizer::new(config.clone()).synthesize(&app.stack)?;
    let rendered = output.template.to_json()?;

    let snapshot = snapshot_path(file);
    if update {
        fs::write(&snapshot, &rendered)
            .with_context(|| format!("Failed to write snapshot {:?}", snapshot))?;
        return Ok(IntegOutcome::Updated);
    }
    if !snapshot.exists() {
        return Ok(IntegOutcome::Missing);
    }

    let expected = fs::read_to_string(&snapshot)?;
    Ok(match first_difference(&expected, &rendered) {
        None => IntegOutcome::Matched,
        Some(line) => IntegOutcome::Differs { line },
    })
}

/// 1-based line of the first difference.
fn first_difference(expected: &str, actual: &str) -> Option<usize> {
    if expected == actual {
        return None;
    }
    let mut expected_lines = expected.lines();
    let mut actual_lines = actual.lines();
    let mut line = 1;
    loop {
        match (expected_lines.next(), actual_lines.next()) {
            (Some(a), Some(b)) if a == b => line += 1,
            _ => return Some(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const DEFINITION: &str = r#"
stack: integ-bucket
constructs:
  - name: Assets
    kind: bucket
    versioned: true
"#;

    #[test]
    fn test_snapshot_lifecycle() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("integ.bucket.yaml");
        fs::write(&file, DEFINITION).unwrap();
        let config = SynthConfig::default();
        let env = EnvironmentArgs::default();

        assert_eq!(check(&file, &config, &env, false).unwrap(), IntegOutcome::Missing);
        assert_eq!(check(&file, &config, &env, true).unwrap(), IntegOutcome::Updated);
        assert_eq!(check(&file, &config, &env, false).unwrap(), IntegOutcome::Matched);

        fs::write(&file, DEFINITION.replace("true", "false")).unwrap();
        assert!(matches!(
            check(&file, &config, &env, false).unwrap(),
            IntegOutcome::Differs { .. }
        ));
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference("a\nb\n", "a\nb\n"), None);
        assert_eq!(first_difference("a\nb\n", "a\nc\n"), Some(2));
        assert_eq!(first_difference("a\n", "a\nb\n"), Some(2));
    }
}
