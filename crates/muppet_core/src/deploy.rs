//! Deployment coordination.
//!
//! Thin orchestration of infrastructure apply/destroy and status merging,
//! invoked by the lifecycle orchestrator. Status bookkeeping goes through
//! the state store so both the external system of record and the in-memory
//! snapshot stay in step.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clients::{ContainerRegistryClient, InfraConfig, InfrastructureClient, ServiceMetrics};
use crate::error::{PlatformError, PlatformResult};
use crate::muppet::{DeploymentState, MuppetStatus, DEFAULT_PORT};
use crate::state::StateStore;

/// One deployment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub muppet_name: String,
    pub container_image: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

impl DeployRequest {
    pub fn new(muppet_name: impl Into<String>, container_image: impl Into<String>) -> Self {
        Self {
            muppet_name: muppet_name.into(),
            container_image: container_image.into(),
            env_vars: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }
}

/// Structured outputs of a successful deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub muppet_name: String,
    pub status: MuppetStatus,
    pub service_arn: Option<String>,
    pub public_url: Option<String>,
    pub load_balancer_dns: Option<String>,
    pub cluster: Option<String>,
    pub task_definition_arn: Option<String>,
    pub log_group: Option<String>,
    /// Raw outputs from the provisioning tool
    pub outputs: HashMap<String, String>,
}

impl DeployOutcome {
    fn from_outputs(muppet_name: &str, outputs: HashMap<String, String>) -> Self {
        Self {
            muppet_name: muppet_name.to_string(),
            status: MuppetStatus::Running,
            service_arn: outputs.get("service_arn").cloned(),
            public_url: outputs.get("public_url").cloned(),
            load_balancer_dns: outputs.get("load_balancer_dns").cloned(),
            cluster: outputs.get("cluster_name").cloned(),
            task_definition_arn: outputs.get("task_definition_arn").cloned(),
            log_group: outputs.get("log_group").cloned(),
            outputs,
        }
    }
}

/// Infrastructure state merged with live service metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusView {
    pub deployment: DeploymentState,
    pub metrics: Option<ServiceMetrics>,
}

/// Coordinates infrastructure apply/destroy for muppets.
pub struct DeploymentCoordinator {
    state: Arc<StateStore>,
    infra: Arc<dyn InfrastructureClient>,
    registry: Arc<dyn ContainerRegistryClient>,
    region: String,
}

impl DeploymentCoordinator {
    pub fn new(
        state: Arc<StateStore>,
        infra: Arc<dyn InfrastructureClient>,
        registry: Arc<dyn ContainerRegistryClient>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            state,
            infra,
            registry,
            region: region.into(),
        }
    }

    /// Deploy a muppet's container image.
    ///
    /// On failure the muppet's status is recorded as `Error` before the
    /// deployment error is returned.
    pub async fn deploy(&self, request: &DeployRequest) -> PlatformResult<DeployOutcome> {
        if request.muppet_name.trim().is_empty() {
            return Err(PlatformError::Validation(
                "muppet name must not be empty".to_string(),
            ));
        }
        if request.container_image.trim().is_empty() {
            return Err(PlatformError::Validation(
                "container image must not be empty".to_string(),
            ));
        }

        let image_repo = image_repository(&request.container_image);
        if !self.registry.repository_exists(&image_repo).await? {
            return Err(PlatformError::Validation(format!(
                "image repository '{}' not found in registry",
                image_repo
            )));
        }

        let port = self
            .state
            .get_muppet(&request.muppet_name)
            .await
            .map(|m| m.port)
            .unwrap_or(DEFAULT_PORT);

        self.state
            .update_muppet_status(&request.muppet_name, MuppetStatus::Creating)
            .await?;

        let config = InfraConfig {
            muppet_name: request.muppet_name.clone(),
            container_image: request.container_image.clone(),
            port,
            environment: request.env_vars.clone(),
            secrets: request.secrets.clone(),
            region: self.region.clone(),
        };

        info!("Applying infrastructure for '{}'", request.muppet_name);

        match self.infra.apply(&config).await {
            Ok(deployment) => {
                self.state
                    .update_muppet_status(&request.muppet_name, MuppetStatus::Running)
                    .await?;
                self.state
                    .record_deployment(&request.muppet_name, deployment.workspace.clone())
                    .await;
                info!("Deployment for '{}' completed", request.muppet_name);
                Ok(DeployOutcome::from_outputs(
                    &request.muppet_name,
                    deployment.outputs,
                ))
            }
            Err(err) => {
                if let Err(status_err) = self
                    .state
                    .update_muppet_status(&request.muppet_name, MuppetStatus::Error)
                    .await
                {
                    warn!(
                        "failed to record error status for '{}': {}",
                        request.muppet_name, status_err
                    );
                }
                Err(match err {
                    PlatformError::Deployment(_) => err,
                    other => PlatformError::Deployment(other.to_string()),
                })
            }
        }
    }

    /// Tear down a muppet's infrastructure.
    pub async fn undeploy(&self, name: &str) -> PlatformResult<DeploymentState> {
        info!("Destroying infrastructure for '{}'", name);
        match self.infra.destroy(name).await {
            Ok(deployment) => Ok(deployment),
            Err(PlatformError::Deployment(msg)) => Err(PlatformError::Deployment(msg)),
            Err(other) => Err(PlatformError::Deployment(other.to_string())),
        }
    }

    /// Infrastructure state merged with live metrics; `None` when the
    /// muppet has never been deployed.
    pub async fn deployment_status(
        &self,
        name: &str,
    ) -> PlatformResult<Option<DeploymentStatusView>> {
        let Some(deployment) = self.infra.deployment_status(name).await? else {
            return Ok(None);
        };
        let metrics = self.infra.service_metrics(name).await?;
        Ok(Some(DeploymentStatusView {
            deployment,
            metrics,
        }))
    }

    /// Scale the deployed service.
    pub async fn scale(&self, name: &str, desired: u32, min: u32, max: u32) -> PlatformResult<()> {
        if min > max {
            return Err(PlatformError::Validation(format!(
                "min count {} exceeds max count {}",
                min, max
            )));
        }
        self.infra.scale(name, desired, min, max).await
    }
}

/// Extract the repository path from a container image reference.
///
/// Drops a registry host prefix, a `:tag` and an `@digest`:
/// `123.dkr.ecr.eu-west-1.amazonaws.com/muppets/svc-a:latest` becomes
/// `muppets/svc-a`.
pub fn image_repository(image: &str) -> String {
    let mut parts: Vec<&str> = image.split('/').collect();
    if parts.len() > 1 && (parts[0].contains('.') || parts[0].contains(':')) {
        parts.remove(0);
    }
    let repo = parts.join("/");
    let repo = repo.split('@').next().unwrap_or(&repo);
    match repo.rsplit_once(':') {
        Some((name, _tag)) if !name.is_empty() => name.to_string(),
        _ => repo.to_string(),
    }
}
