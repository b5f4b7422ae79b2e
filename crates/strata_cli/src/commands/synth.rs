//! Synth command - Emit a template and assembly manifest.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use strata_synth::{AssemblyWriter, OutputFormat, Synthesizer};

use super::{build_app, definition_arg, load_config, EnvironmentArgs};

#[derive(Args)]
pub struct SynthArgs {
    /// App definition file (or a directory holding app.yaml)
    definition: PathBuf,

    /// Output directory for templates and the manifest
    #[arg(short, long, default_value = "strata.out")]
    output: PathBuf,

    /// Synthesis config file (defaults to ./strata.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template format: json or yaml
    #[arg(short, long)]
    format: Option<String>,

    /// Print the template instead of writing an assembly
    #[arg(long)]
    stdout: bool,

    #[command(flatten)]
    environment: EnvironmentArgs,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(format) = &args.format {
        config = config.with_output_format(format.parse::<OutputFormat>()?);
    }
    let format = config.output_format;

    let app = build_app(&definition_arg(args.definition), &args.environment)?;
    info!("Synthesizing stack: {}", app.stack.name());

    let output = Synthesizer::new(config)
        .synthesize(&app.stack)
        .inspect_err(|e| {
            if let Some(report) = e.report() {
                println!("{}", report.report());
            }
        })?;

    for warning in output.report.warnings() {
        println!("⚠️  {} [{}] {}", warning.path, warning.check, warning.message);
    }

    if args.stdout {
        print!("{}", output.template.render(format)?);
        return Ok(());
    }

    let manifest = AssemblyWriter::new(&args.output)
        .with_format(format)
        .write(&app.stack, &output)?;
    println!(
        "✅ Synthesized {} resource(s) for {} into {:?}",
        output.resource_count(),
        app.stack.name(),
        args.output
    );
    println!("   Manifest: {:?}", manifest);

    Ok(())
}
