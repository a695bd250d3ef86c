//! Muppeteer CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Deployment error

use std::process::ExitCode;

use clap::Parser;
use muppet_core::PlatformError;
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
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const DEPLOYMENT_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("muppet=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ListTemplates(args) => commands::list_templates::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Generate(args) => commands::generate::execute(args).await,
        Commands::Smoke(args) => commands::smoke::execute(args).await,
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
    if let Some(platform) = e.downcast_ref::<PlatformError>() {
        return match platform.kind() {
            "validation_error" => ExitCodes::VALIDATION_FAILURE,
            "template_not_found" | "template_validation_error" | "template_error" => {
                ExitCodes::TEMPLATE_ERROR
            }
            "deployment_error" => ExitCodes::DEPLOYMENT_ERROR,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }
    if e.downcast_ref::<muppet_templates::TemplateError>().is_some() {
        return ExitCodes::TEMPLATE_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("option") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
