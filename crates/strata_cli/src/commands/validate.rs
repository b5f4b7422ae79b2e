//! Validate command - Run every check and print the report.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use strata_synth::{SynthError, Synthesizer};

use super::{build_app, definition_arg, load_config, EnvironmentArgs};

#[derive(Args)]
pub struct ValidateArgs {
    /// App definition file (or a directory holding app.yaml)
    definition: PathBuf,

    /// Synthesis config file (defaults to ./strata.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    environment: EnvironmentArgs,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let app = build_app(&definition_arg(args.definition), &args.environment)?;
    info!("Validating stack: {}", app.stack.name());

    let report = Synthesizer::new(config).validate(&app.stack);

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("🔒 Validating {}...", app.stack.name());
        print!("{}", report.report());
        println!();
        if report.passed() {
            println!("✅ All validations passed!");
        } else {
            println!("❌ Some validations failed. Please fix the issues above.");
        }
    }

    if !report.passed() {
        return Err(SynthError::ValidationFailed(Box::new(report)).into());
    }
    Ok(())
}
