//! CLI command definitions.
//!
//! This module defines the command structure for the Muppeteer CLI.
//! Each subcommand maps to a platform operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod generate;
pub mod list_templates;
pub mod smoke;
pub mod validate;

/// Muppeteer - provision templated backend services
#[derive(Parser)]
#[command(name = "muppeteer")]
#[command(version, about = "Muppeteer - provision templated backend services")]
#[command(long_about = r#"
Muppeteer provisions "muppets" - templated backend services - by generating
source code from templates, creating GitHub repositories, and deploying
infrastructure.

COMMANDS:
  list-templates → List discovered templates
  validate       → Validate a template's file manifest
  generate       → Render a template into an output directory
  smoke          → Run the full creation workflow against in-memory
                   collaborators to verify templates are provisionable

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - Deployment error
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
    /// List discovered templates
    #[command(name = "list-templates")]
    ListTemplates(list_templates::ListTemplatesArgs),

    /// Validate a template's declared file manifest
    Validate(validate::ValidateArgs),

    /// Render a template into an output directory
    Generate(generate::GenerateArgs),

    /// Run the full creation workflow against in-memory collaborators
    Smoke(smoke::SmokeArgs),
}

/// Resolve the templates directory: flag value or ./templates.
pub fn templates_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?.join("templates")),
    }
}
