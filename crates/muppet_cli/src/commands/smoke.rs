//! Smoke command - run the full creation workflow against in-memory
//! collaborators.
//!
//! Verifies every template is actually provisionable end-to-end: manifest
//! validation, rendering, repository push and deployment, without touching
//! any external system.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use muppet_core::{
    CreateMuppetRequest, DeploymentCoordinator, InMemoryContainerRegistry,
    InMemoryInfrastructureClient, InMemoryParameterStore, InMemoryRepositoryClient,
    LifecycleOrchestrator, StateStore, StaticTlsClient,
};
use muppet_templates::TemplateEngine;

use super::templates_path;

#[derive(Args)]
pub struct SmokeArgs {
    /// Specific template to test (tests all if not specified)
    #[arg(short, long)]
    template: Option<String>,

    /// Also run the deployment step
    #[arg(long)]
    deploy: bool,

    /// Templates directory
    #[arg(long)]
    templates_dir: Option<PathBuf>,
}

pub async fn execute(args: SmokeArgs) -> Result<()> {
    info!("Running lifecycle smoke tests");

    let path = templates_path(args.templates_dir)?;
    if !path.exists() {
        anyhow::bail!("Templates directory not found: {:?}", path);
    }

    let engine = Arc::new(TemplateEngine::new(&path));
    let mut templates = engine.discover().context("Failed to discover templates")?;
    templates.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<String> = match &args.template {
        Some(name) => templates
            .iter()
            .filter(|t| &t.name == name)
            .map(|t| t.name.clone())
            .collect(),
        None => templates.iter().map(|t| t.name.clone()).collect(),
    };

    if names.is_empty() {
        println!("⚠️  No templates found to test");
        return Ok(());
    }

    println!("🧪 Smoke-testing {} template(s)...\n", names.len());

    let workdir = tempfile::tempdir().context("Failed to create scratch directory")?;

    let mut passed = 0;
    let mut failed = 0;

    for name in &names {
        print!("Testing {}... ", name);

        let orchestrator = build_orchestrator(engine.clone(), workdir.path().join(name));
        let muppet_name = smoke_muppet_name(name);
        let request =
            CreateMuppetRequest::new(&muppet_name, name.as_str()).auto_deploy(args.deploy);

        match orchestrator.create_muppet(request).await {
            Ok(outcome) => {
                println!("✅ ({})", outcome.repository_url);
                passed += 1;
            }
            Err(e) => {
                println!("❌");
                println!("   - {}", e);
                failed += 1;
            }
        }
    }

    println!();
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        anyhow::bail!("{} template(s) failed the smoke run", failed);
    }
    Ok(())
}

/// Wire a throwaway platform around in-memory collaborators.
fn build_orchestrator(engine: Arc<TemplateEngine>, workspace: PathBuf) -> LifecycleOrchestrator {
    let repo = Arc::new(InMemoryRepositoryClient::new());
    let infra = Arc::new(InMemoryInfrastructureClient::new());
    let state = Arc::new(StateStore::new(
        repo.clone(),
        infra.clone(),
        Arc::new(InMemoryParameterStore::new()),
    ));
    let deployer = Arc::new(DeploymentCoordinator::new(
        state.clone(),
        infra,
        Arc::new(InMemoryContainerRegistry::permissive()),
        "eu-west-1",
    ));
    LifecycleOrchestrator::new(
        state,
        engine,
        repo,
        deployer,
        Arc::new(StaticTlsClient::new()),
        workspace,
    )
}

/// Template names can carry characters a muppet name cannot.
fn smoke_muppet_name(template: &str) -> String {
    let safe: String = template
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let safe = safe.trim_matches('-').to_string();
    let mut name = format!("smoke-{}", safe);
    name.truncate(63);
    name.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke_muppet_name() {
        assert_eq!(smoke_muppet_name("python-fastapi"), "smoke-python-fastapi");
        assert_eq!(smoke_muppet_name("My_Template"), "smoke-my-template");
        assert!(smoke_muppet_name(&"x".repeat(100)).len() <= 63);
    }
}
