//! List-templates command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use muppet_templates::TemplateEngine;

use super::templates_path;

#[derive(Args)]
pub struct ListTemplatesArgs {
    /// Templates directory
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ListTemplatesArgs) -> Result<()> {
    let path = templates_path(args.templates_dir)?;
    let engine = TemplateEngine::new(&path);
    let mut templates = engine.discover().context("Failed to discover templates")?;
    templates.sort_by(|a, b| a.name.cmp(&b.name));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    if templates.is_empty() {
        println!("No templates found under {:?}", path);
        return Ok(());
    }

    println!("Templates in {:?}:\n", path);
    for manifest in templates {
        let framework = manifest
            .framework
            .as_deref()
            .map(|f| format!("/{}", f))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<8} {}{} (port {})",
            manifest.name, manifest.version, manifest.language, framework, manifest.port
        );
        if !manifest.features.is_empty() {
            println!("      features: {}", manifest.features.join(", "));
        }
    }

    Ok(())
}
