//! Muppet lifecycle orchestration.
//!
//! Drives the creation workflow across the template engine, the state store
//! and the repository/infrastructure collaborators:
//!
//! validating -> reserved -> generating -> pushing -> (deploying) -> done
//!
//! The name is reserved in the state store before any external side effect;
//! any failure after the reservation rolls it back. External side effects
//! already applied (notably the GitHub repository) are deliberately NOT
//! undone: repository deletion is a manual, out-of-band operation.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use muppet_templates::{GenerationContext, TemplateEngine};

use crate::clients::{RepositoryClient, TlsClient, TlsConfig};
use crate::deploy::{DeployRequest, DeploymentCoordinator};
use crate::error::{PlatformError, PlatformResult};
use crate::muppet::{validate_muppet_name, Muppet, MuppetStatus};
use crate::state::StateStore;

/// A muppet creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMuppetRequest {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auto_deploy: bool,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    /// Image to deploy; defaults to the platform registry path for the name
    #[serde(default)]
    pub container_image: Option<String>,
}

impl CreateMuppetRequest {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            description: None,
            auto_deploy: false,
            variables: HashMap::new(),
            container_image: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn auto_deploy(mut self, auto_deploy: bool) -> Self {
        self.auto_deploy = auto_deploy;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_container_image(mut self, image: impl Into<String>) -> Self {
        self.container_image = Some(image.into());
        self
    }
}

/// Result of a successful creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMuppetOutcome {
    pub muppet: Muppet,
    pub repository_url: String,
    pub next_steps: Vec<String>,
}

/// Result of undeploying a muppet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndeployOutcome {
    pub muppet_name: String,
    pub deployment: crate::muppet::DeploymentState,
}

/// Result of a TLS migration attempt.
///
/// Advisory tooling: a collaborator failure is reported as a payload, not
/// raised as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TlsMigration {
    Migrated {
        muppet_name: String,
        config: TlsConfig,
        instructions: Vec<String>,
    },
    Failed {
        muppet_name: String,
        error: String,
    },
}

/// Drives create/deploy/destroy workflows end-to-end.
pub struct LifecycleOrchestrator {
    state: Arc<StateStore>,
    templates: Arc<TemplateEngine>,
    repo: Arc<dyn RepositoryClient>,
    deployer: Arc<DeploymentCoordinator>,
    tls: Arc<dyn TlsClient>,
    /// Root under which rendered trees are written, one directory per muppet
    workspace_root: PathBuf,
    /// Team -> permission applied to every new repository
    team_permissions: HashMap<String, String>,
}

impl LifecycleOrchestrator {
    pub fn new(
        state: Arc<StateStore>,
        templates: Arc<TemplateEngine>,
        repo: Arc<dyn RepositoryClient>,
        deployer: Arc<DeploymentCoordinator>,
        tls: Arc<dyn TlsClient>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state,
            templates,
            repo,
            deployer,
            tls,
            workspace_root: workspace_root.into(),
            team_permissions: HashMap::from([
                ("platform".to_string(), "admin".to_string()),
                ("developers".to_string(), "push".to_string()),
            ]),
        }
    }

    pub fn with_team_permissions(mut self, permissions: HashMap<String, String>) -> Self {
        self.team_permissions = permissions;
        self
    }

    /// Create a muppet: validate, reserve, generate, push, optionally
    /// deploy.
    ///
    /// The duplicate check happens before any state mutation, so a
    /// validation failure never triggers cleanup. After the reservation,
    /// any error rolls the reservation back and propagates; rollback
    /// problems are logged, never allowed to mask the original error.
    pub async fn create_muppet(
        &self,
        request: CreateMuppetRequest,
    ) -> PlatformResult<CreateMuppetOutcome> {
        // validating
        validate_muppet_name(&request.name)?;
        if self.state.get_muppet(&request.name).await.is_some() {
            return Err(PlatformError::Validation(format!(
                "muppet '{}' already exists",
                request.name
            )));
        }

        // reserved
        info!("Reserving muppet '{}'", request.name);
        self.state
            .add_muppet(Muppet::new(&request.name, &request.template))
            .await;

        match self.run_creation(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.rollback_reservation(&request.name).await;
                Err(err)
            }
        }
    }

    /// Steps 3-6; every error here triggers the caller's rollback.
    async fn run_creation(
        &self,
        request: &CreateMuppetRequest,
    ) -> PlatformResult<CreateMuppetOutcome> {
        // generating
        self.templates.validate(&request.template)?;
        let manifest = self
            .templates
            .get(&request.template)?
            .ok_or_else(|| muppet_templates::TemplateError::NotFound(request.template.clone()))?;

        fs::create_dir_all(&self.workspace_root)
            .map_err(|e| Self::unexpected(format!("cannot create workspace root: {}", e)))?;

        let mut context = GenerationContext::new(
            &request.name,
            &request.template,
            self.workspace_root.join(&request.name),
        )
        .with_variables(request.variables.clone());
        if let Some(description) = &request.description {
            context = context.with_variable("description", description.clone());
        }

        let rendered = self.templates.render(&context)?;
        info!(
            "Rendered {} files for '{}' from template '{}'",
            rendered.files.len(),
            request.name,
            request.template
        );

        // pushing
        let repo = self
            .repo
            .create_repository(&request.name, &request.template, request.description.as_deref())
            .await?;
        self.repo
            .set_team_permissions(&request.name, &self.team_permissions)
            .await?;
        self.repo
            .push_files(&request.name, &request.template, &rendered.files)
            .await?;

        let mut muppet = Muppet::new(&request.name, &request.template)
            .with_port(manifest.port)
            .with_repository_url(&repo.url);
        self.state.add_muppet(muppet.clone()).await;

        // deploying
        if request.auto_deploy {
            let image = request
                .container_image
                .clone()
                .unwrap_or_else(|| format!("muppets/{}:latest", request.name));
            self.deployer
                .deploy(&DeployRequest {
                    muppet_name: request.name.clone(),
                    container_image: image,
                    env_vars: HashMap::new(),
                    secrets: HashMap::new(),
                })
                .await?;
            muppet = self
                .state
                .get_muppet(&request.name)
                .await
                .unwrap_or(muppet);
        }

        // done
        let next_steps = self.next_steps(&manifest, &muppet, request.auto_deploy);
        Ok(CreateMuppetOutcome {
            repository_url: repo.url,
            muppet,
            next_steps,
        })
    }

    fn next_steps(
        &self,
        manifest: &muppet_templates::TemplateManifest,
        muppet: &Muppet,
        auto_deployed: bool,
    ) -> Vec<String> {
        let scheme = if manifest.has_feature("tls") {
            "https"
        } else {
            "http"
        };

        let mut steps = Vec::new();
        if let Some(url) = &muppet.repository_url {
            steps.push(format!("Clone your new repository: git clone {}", url));
        }
        if auto_deployed {
            steps.push(format!(
                "Service is deploying; it will be reachable at {}://{}.muppets.internal:{}",
                scheme, muppet.name, muppet.port
            ));
        } else {
            steps.push(format!(
                "Push a container image to muppets/{}:latest and request a deployment",
                muppet.name
            ));
            steps.push(format!(
                "Once deployed, the service answers at {}://{}.muppets.internal:{}",
                scheme, muppet.name, muppet.port
            ));
        }
        steps
    }

    /// Remove the reservation; failures are logged and swallowed so they
    /// never replace the error that triggered the rollback.
    async fn rollback_reservation(&self, name: &str) {
        if self.state.remove_muppet(name).await {
            warn!("Rolled back reservation for '{}'", name);
        } else {
            warn!(
                "Rollback for '{}' found no reservation to remove",
                name
            );
        }
    }

    fn unexpected(message: impl Into<String>) -> PlatformError {
        PlatformError::Internal(format!("Muppet creation failed: {}", message.into()))
    }

    /// Current record for a muppet; `None` when unknown.
    pub async fn muppet_status(&self, name: &str) -> Option<Muppet> {
        self.state.get_muppet(name).await
    }

    /// All muppets currently tracked.
    pub async fn list_muppets(&self) -> Vec<Muppet> {
        self.state.list_muppets().await
    }

    /// Deployment status for a muppet; `None` when never deployed.
    pub async fn deployment_status(
        &self,
        name: &str,
    ) -> PlatformResult<Option<crate::deploy::DeploymentStatusView>> {
        self.deployer.deployment_status(name).await
    }

    /// Mark a muppet deleting and destroy its infrastructure.
    ///
    /// Destruction failures are surfaced, not retried, and trigger no
    /// further compensation.
    pub async fn undeploy_muppet(&self, name: &str) -> PlatformResult<UndeployOutcome> {
        if self.state.get_muppet(name).await.is_none() {
            return Err(PlatformError::Validation(format!(
                "unknown muppet '{}'",
                name
            )));
        }

        self.state
            .update_muppet_status(name, MuppetStatus::Deleting)
            .await?;

        let deployment = self.deployer.undeploy(name).await?;
        info!("Muppet '{}' undeployed", name);
        Ok(UndeployOutcome {
            muppet_name: name.to_string(),
            deployment,
        })
    }

    /// Request TLS configuration for an existing muppet.
    pub async fn migrate_to_tls(&self, name: &str) -> PlatformResult<TlsMigration> {
        let muppet = self
            .state
            .get_muppet(name)
            .await
            .ok_or_else(|| PlatformError::Validation(format!("unknown muppet '{}'", name)))?;

        match self.tls.generate_tls_config(&muppet.name).await {
            Ok(config) => {
                let instructions = vec![
                    format!(
                        "Attach certificate {} to the service load balancer listener",
                        config.certificate_arn
                    ),
                    format!(
                        "Point {} (zone {}) at the load balancer",
                        config.domain, config.hosted_zone_id
                    ),
                    format!("Redeploy '{}' to pick up the {} policy", name, config.ssl_policy),
                ];
                Ok(TlsMigration::Migrated {
                    muppet_name: name.to_string(),
                    config,
                    instructions,
                })
            }
            Err(err) => {
                warn!("TLS migration for '{}' failed: {}", name, err);
                Ok(TlsMigration::Failed {
                    muppet_name: name.to_string(),
                    error: err.to_string(),
                })
            }
        }
    }
}
