//! Validate command - check a template's declared file manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use muppet_templates::{TemplateEngine, TemplateError};

use super::templates_path;

#[derive(Args)]
pub struct ValidateArgs {
    /// Template to validate (validates all when omitted)
    template: Option<String>,

    /// Templates directory
    #[arg(long)]
    templates_dir: Option<PathBuf>,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let path = templates_path(args.templates_dir)?;
    let engine = TemplateEngine::new(&path);

    let names: Vec<String> = match &args.template {
        Some(name) => vec![name.clone()],
        None => {
            let mut templates = engine.discover().context("Failed to discover templates")?;
            templates.sort_by(|a, b| a.name.cmp(&b.name));
            templates.into_iter().map(|t| t.name).collect()
        }
    };

    if names.is_empty() {
        anyhow::bail!("no templates found under {:?}", path);
    }

    info!("Validating {} template(s)", names.len());

    let mut failed = 0;
    for name in &names {
        match engine.validate(name) {
            Ok(()) => println!("✅ {}", name),
            Err(TemplateError::ValidationFailed { missing, .. }) => {
                failed += 1;
                println!("❌ {}", name);
                for path in missing {
                    println!("   missing: {}", path);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} templates failed validation", failed, names.len());
    }
    Ok(())
}
