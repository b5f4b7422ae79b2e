//! Strata CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Definition error
//! - 5: Synthesis error

use std::process::ExitCode;

use clap::Parser;
use strata_resources::ResourceError;
use strata_synth::SynthError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const DEFINITION_ERROR: u8 = 4;
    pub const SYNTH_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "strata=debug" } else { "strata=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", default_level)));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Graph(args) => commands::graph::execute(args).await,
        Commands::Integ(args) => commands::integ::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<SynthError>() {
            return match err {
                SynthError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                SynthError::InvalidConfig(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::SYNTH_ERROR,
            };
        }
        if cause.downcast_ref::<ResourceError>().is_some() {
            return ExitCodes::DEFINITION_ERROR;
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let invalid = anyhow::Error::from(SynthError::InvalidConfig("depth".into()));
        assert_eq!(categorize_error(&invalid), ExitCodes::INVALID_ARGS);

        let definition: anyhow::Result<()> =
            Err(ResourceError::UnknownConstruct("Vpc".into())).context("Failed to build stack");
        assert_eq!(
            categorize_error(&definition.unwrap_err()),
            ExitCodes::DEFINITION_ERROR
        );

        let missing = anyhow::anyhow!("Definition not found: app.yaml");
        assert_eq!(categorize_error(&missing), ExitCodes::INVALID_ARGS);
        assert_eq!(
            categorize_error(&anyhow::anyhow!("boom")),
            ExitCodes::GENERAL_ERROR
        );
    }
}
