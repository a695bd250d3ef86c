//! Generate command - render a template into an output directory.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use muppet_templates::{GenerationContext, TemplateEngine};

use super::templates_path;

#[derive(Args)]
pub struct GenerateArgs {
    /// Name of the muppet to generate
    #[arg(short, long)]
    name: String,

    /// Template to render
    #[arg(short, long)]
    template: String,

    /// Output directory (defaults to ./workspaces/<name>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra variables as key=value pairs
    #[arg(long = "var", value_parser = parse_key_value)]
    variables: Vec<(String, String)>,

    /// Templates directory
    #[arg(long)]
    templates_dir: Option<PathBuf>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let path = templates_path(args.templates_dir)?;
    let output = match args.output {
        Some(output) => output,
        None => std::env::current_dir()?.join("workspaces").join(&args.name),
    };

    let engine = TemplateEngine::new(&path);
    engine
        .validate(&args.template)
        .context("Template validation failed")?;

    let manifest = engine
        .get(&args.template)?
        .ok_or_else(|| anyhow::anyhow!("Template not found: {}", args.template))?;

    let variables: HashMap<String, String> = args.variables.into_iter().collect();
    let missing = manifest.missing_variables(&variables);
    if !missing.is_empty() {
        println!(
            "⚠️  Required variables without a value: {} (tokens will stay verbatim)",
            missing.join(", ")
        );
    }

    info!("Generating '{}' from template '{}'", args.name, args.template);

    let context = GenerationContext::new(&args.name, &args.template, &output)
        .with_variables(variables);
    let rendered = engine.render(&context).context("Failed to render template")?;

    println!("✅ Muppet '{}' generated!", args.name);
    println!();
    println!("Location: {:?}", rendered.output_dir);
    println!("Files:    {}", rendered.files.len());
    println!();
    println!("Next steps:");
    println!("  cd {:?}", rendered.output_dir);
    println!("  git init && git add -A && git commit -m 'Initial commit'");

    Ok(())
}
