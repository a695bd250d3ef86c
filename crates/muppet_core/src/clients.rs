//! Collaborator client traits.
//!
//! The core talks to every external system through one of these traits,
//! injected at construction. Production implementations (GitHub REST,
//! Terraform wrapper, ACM/Route53 discovery, SSM parameter store) live in
//! their own crates; [`crate::mock`] provides configurable in-memory
//! implementations for tests and local smoke runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformResult;
use crate::muppet::{DeploymentState, MuppetStatus};

/// Repository as the platform sees it: topics/metadata on the remote repo
/// encode the template and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub name: String,
    pub url: String,
    /// Template marker; only repositories carrying one are platform-managed
    pub template: Option<String>,
    pub status: Option<MuppetStatus>,
    pub port: Option<u16>,
    pub description: Option<String>,
}

/// Rendered files keyed by separator-normalized relative path.
pub type FileMap = BTreeMap<String, Vec<u8>>;

/// TLS configuration discovered for a muppet's domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub certificate_arn: String,
    pub domain: String,
    pub hosted_zone_id: String,
    pub ssl_policy: String,
}

/// Input to one infrastructure apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraConfig {
    pub muppet_name: String,
    pub container_image: String,
    pub port: u16,
    pub environment: HashMap<String, String>,
    pub secrets: HashMap<String, String>,
    pub region: String,
}

/// Live service metrics reported by the compute platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub desired_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
    pub healthy: bool,
}

/// GitHub-side operations.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    async fn create_repository(
        &self,
        name: &str,
        template: &str,
        description: Option<&str>,
    ) -> PlatformResult<RepoDescriptor>;

    async fn push_files(&self, name: &str, template: &str, files: &FileMap) -> PlatformResult<()>;

    async fn update_status(&self, name: &str, status: MuppetStatus) -> PlatformResult<()>;

    async fn set_team_permissions(
        &self,
        name: &str,
        permissions: &HashMap<String, String>,
    ) -> PlatformResult<()>;

    async fn list_repositories(&self) -> PlatformResult<Vec<RepoDescriptor>>;

    async fn get_repository(&self, name: &str) -> PlatformResult<Option<RepoDescriptor>>;

    async fn add_collaborator(
        &self,
        name: &str,
        username: &str,
        permission: &str,
    ) -> PlatformResult<()>;

    async fn remove_collaborator(&self, name: &str, username: &str) -> PlatformResult<()>;
}

/// Infrastructure provisioning operations.
#[async_trait]
pub trait InfrastructureClient: Send + Sync {
    async fn apply(&self, config: &InfraConfig) -> PlatformResult<DeploymentState>;

    async fn destroy(&self, name: &str) -> PlatformResult<DeploymentState>;

    async fn deployment_status(&self, name: &str) -> PlatformResult<Option<DeploymentState>>;

    async fn service_metrics(&self, name: &str) -> PlatformResult<Option<ServiceMetrics>>;

    async fn scale(&self, name: &str, desired: u32, min: u32, max: u32) -> PlatformResult<()>;
}

/// Configuration parameter lookup (module version discovery).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterStoreClient: Send + Sync {
    async fn parameters_by_path(&self, path: &str) -> PlatformResult<HashMap<String, String>>;
}

/// Container image registry lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRegistryClient: Send + Sync {
    async fn repository_exists(&self, name: &str) -> PlatformResult<bool>;
}

/// TLS certificate and DNS auto-discovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TlsClient: Send + Sync {
    async fn generate_tls_config(&self, muppet_name: &str) -> PlatformResult<TlsConfig>;
}
