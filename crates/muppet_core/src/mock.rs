//! In-memory collaborator clients.
//!
//! Configurable implementations of the collaborator traits for tests and
//! local smoke runs: they capture every call for verification and can
//! simulate per-method failures without touching any external system.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::clients::{
    ContainerRegistryClient, FileMap, InfraConfig, InfrastructureClient, ParameterStoreClient,
    RepoDescriptor, RepositoryClient, ServiceMetrics, TlsClient, TlsConfig,
};
use crate::error::{PlatformError, PlatformResult};
use crate::muppet::{DeploymentState, DeploymentStatus, MuppetStatus};

/// Per-method simulated failures, shared by all in-memory clients.
#[derive(Default)]
struct FailureMap {
    failures: RwLock<HashMap<String, String>>,
}

impl FailureMap {
    fn set(&self, method: &str, message: impl Into<String>) {
        self.failures
            .write()
            .insert(method.to_string(), message.into());
    }

    fn check(&self, method: &str) -> Option<String> {
        self.failures.read().get(method).cloned()
    }
}

/// In-memory GitHub collaborator.
#[derive(Clone, Default)]
pub struct InMemoryRepositoryClient {
    repos: Arc<RwLock<HashMap<String, RepoDescriptor>>>,
    pushed: Arc<RwLock<HashMap<String, FileMap>>>,
    permissions: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    collaborators: Arc<RwLock<HashMap<String, Vec<(String, String)>>>>,
    captured_calls: Arc<RwLock<Vec<String>>>,
    failures: Arc<FailureMap>,
}

impl InMemoryRepositoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing repository.
    pub fn with_repository(self, descriptor: RepoDescriptor) -> Self {
        self.repos
            .write()
            .insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Make one method fail with the given message.
    pub fn fail_on(self, method: &str, message: impl Into<String>) -> Self {
        self.failures.set(method, message);
        self
    }

    /// Number of calls made to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    /// Files last pushed to a repository.
    pub fn pushed_files(&self, name: &str) -> Option<FileMap> {
        self.pushed.read().get(name).cloned()
    }

    /// Permissions applied to a repository.
    pub fn permissions_for(&self, name: &str) -> Option<HashMap<String, String>> {
        self.permissions.read().get(name).cloned()
    }

    fn record(&self, method: &str) {
        self.captured_calls.write().push(method.to_string());
    }

    fn check_failure(&self, method: &str) -> PlatformResult<()> {
        if let Some(msg) = self.failures.check(method) {
            return Err(PlatformError::GitHub(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryClient for InMemoryRepositoryClient {
    async fn create_repository(
        &self,
        name: &str,
        template: &str,
        description: Option<&str>,
    ) -> PlatformResult<RepoDescriptor> {
        self.record("create_repository");
        self.check_failure("create_repository")?;

        let mut repos = self.repos.write();
        if repos.contains_key(name) {
            return Err(PlatformError::GitHub(format!(
                "repository '{}' already exists",
                name
            )));
        }

        let descriptor = RepoDescriptor {
            name: name.to_string(),
            url: format!("https://github.com/muppets/{}", name),
            template: Some(template.to_string()),
            status: Some(MuppetStatus::Creating),
            port: None,
            description: description.map(String::from),
        };
        repos.insert(name.to_string(), descriptor.clone());
        debug!("created in-memory repository '{}'", name);
        Ok(descriptor)
    }

    async fn push_files(&self, name: &str, _template: &str, files: &FileMap) -> PlatformResult<()> {
        self.record("push_files");
        self.check_failure("push_files")?;

        if !self.repos.read().contains_key(name) {
            return Err(PlatformError::GitHub(format!(
                "unknown repository '{}'",
                name
            )));
        }
        self.pushed.write().insert(name.to_string(), files.clone());
        Ok(())
    }

    async fn update_status(&self, name: &str, status: MuppetStatus) -> PlatformResult<()> {
        self.record("update_status");
        self.check_failure("update_status")?;

        let mut repos = self.repos.write();
        match repos.get_mut(name) {
            Some(repo) => {
                repo.status = Some(status);
                Ok(())
            }
            None => Err(PlatformError::GitHub(format!(
                "unknown repository '{}'",
                name
            ))),
        }
    }

    async fn set_team_permissions(
        &self,
        name: &str,
        permissions: &HashMap<String, String>,
    ) -> PlatformResult<()> {
        self.record("set_team_permissions");
        self.check_failure("set_team_permissions")?;
        self.permissions
            .write()
            .insert(name.to_string(), permissions.clone());
        Ok(())
    }

    async fn list_repositories(&self) -> PlatformResult<Vec<RepoDescriptor>> {
        self.record("list_repositories");
        self.check_failure("list_repositories")?;
        Ok(self.repos.read().values().cloned().collect())
    }

    async fn get_repository(&self, name: &str) -> PlatformResult<Option<RepoDescriptor>> {
        self.record("get_repository");
        self.check_failure("get_repository")?;
        Ok(self.repos.read().get(name).cloned())
    }

    async fn add_collaborator(
        &self,
        name: &str,
        username: &str,
        permission: &str,
    ) -> PlatformResult<()> {
        self.record("add_collaborator");
        self.check_failure("add_collaborator")?;
        self.collaborators
            .write()
            .entry(name.to_string())
            .or_default()
            .push((username.to_string(), permission.to_string()));
        Ok(())
    }

    async fn remove_collaborator(&self, name: &str, username: &str) -> PlatformResult<()> {
        self.record("remove_collaborator");
        self.check_failure("remove_collaborator")?;
        if let Some(list) = self.collaborators.write().get_mut(name) {
            list.retain(|(user, _)| user != username);
        }
        Ok(())
    }
}

/// In-memory infrastructure collaborator.
#[derive(Clone, Default)]
pub struct InMemoryInfrastructureClient {
    deployments: Arc<RwLock<HashMap<String, DeploymentState>>>,
    metrics: Arc<RwLock<HashMap<String, ServiceMetrics>>>,
    captured_calls: Arc<RwLock<Vec<String>>>,
    failures: Arc<FailureMap>,
}

impl InMemoryInfrastructureClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(self, method: &str, message: impl Into<String>) -> Self {
        self.failures.set(method, message);
        self
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    /// Seed an existing deployment record.
    pub fn with_deployment(self, deployment: DeploymentState) -> Self {
        self.deployments
            .write()
            .insert(deployment.muppet_name.clone(), deployment);
        self
    }

    fn record(&self, method: &str) {
        self.captured_calls.write().push(method.to_string());
    }

    fn check_failure(&self, method: &str) -> PlatformResult<()> {
        if let Some(msg) = self.failures.check(method) {
            return Err(PlatformError::Deployment(msg));
        }
        Ok(())
    }

    fn default_outputs(config: &InfraConfig) -> HashMap<String, String> {
        let name = &config.muppet_name;
        HashMap::from([
            (
                "service_arn".to_string(),
                format!("arn:aws:ecs:{}:123456789012:service/{}", config.region, name),
            ),
            (
                "public_url".to_string(),
                format!("http://{}.muppets.internal:{}", name, config.port),
            ),
            (
                "load_balancer_dns".to_string(),
                format!("{}-alb.{}.elb.amazonaws.com", name, config.region),
            ),
            ("cluster_name".to_string(), "muppets".to_string()),
            (
                "task_definition_arn".to_string(),
                format!("arn:aws:ecs:{}:123456789012:task-definition/{}:1", config.region, name),
            ),
            ("log_group".to_string(), format!("/ecs/muppets/{}", name)),
        ])
    }
}

#[async_trait]
impl InfrastructureClient for InMemoryInfrastructureClient {
    async fn apply(&self, config: &InfraConfig) -> PlatformResult<DeploymentState> {
        self.record("apply");

        if let Some(msg) = self.failures.check("apply") {
            let mut failed =
                DeploymentState::new(&config.muppet_name, format!("ws-{}", uuid::Uuid::new_v4()));
            failed.status = DeploymentStatus::Failed;
            failed.error = Some(msg.clone());
            failed.last_operation = Some("apply".to_string());
            self.deployments
                .write()
                .insert(config.muppet_name.clone(), failed);
            return Err(PlatformError::Deployment(msg));
        }

        let mut deployment =
            DeploymentState::new(&config.muppet_name, format!("ws-{}", uuid::Uuid::new_v4()));
        deployment.status = DeploymentStatus::Completed;
        deployment.outputs = Self::default_outputs(config);
        deployment.last_operation = Some("apply".to_string());
        deployment.updated_at = Utc::now();

        self.deployments
            .write()
            .insert(config.muppet_name.clone(), deployment.clone());
        self.metrics.write().insert(
            config.muppet_name.clone(),
            ServiceMetrics {
                desired_count: 1,
                running_count: 1,
                pending_count: 0,
                healthy: true,
            },
        );
        Ok(deployment)
    }

    async fn destroy(&self, name: &str) -> PlatformResult<DeploymentState> {
        self.record("destroy");
        self.check_failure("destroy")?;

        let mut deployments = self.deployments.write();
        let mut deployment = deployments
            .get(name)
            .cloned()
            .unwrap_or_else(|| DeploymentState::new(name, format!("ws-{}", uuid::Uuid::new_v4())));
        deployment.status = DeploymentStatus::Destroyed;
        deployment.last_operation = Some("destroy".to_string());
        deployment.updated_at = Utc::now();
        deployments.insert(name.to_string(), deployment.clone());
        self.metrics.write().remove(name);
        Ok(deployment)
    }

    async fn deployment_status(&self, name: &str) -> PlatformResult<Option<DeploymentState>> {
        self.record("deployment_status");
        self.check_failure("deployment_status")?;
        Ok(self.deployments.read().get(name).cloned())
    }

    async fn service_metrics(&self, name: &str) -> PlatformResult<Option<ServiceMetrics>> {
        self.record("service_metrics");
        self.check_failure("service_metrics")?;
        Ok(self.metrics.read().get(name).cloned())
    }

    async fn scale(&self, name: &str, desired: u32, _min: u32, _max: u32) -> PlatformResult<()> {
        self.record("scale");
        self.check_failure("scale")?;

        let mut metrics = self.metrics.write();
        match metrics.get_mut(name) {
            Some(m) => {
                m.desired_count = desired;
                Ok(())
            }
            None => Err(PlatformError::Deployment(format!(
                "no active deployment for '{}'",
                name
            ))),
        }
    }
}

/// In-memory parameter store.
#[derive(Clone, Default)]
pub struct InMemoryParameterStore {
    params: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(self, path: &str, params: HashMap<String, String>) -> Self {
        self.params.write().insert(path.to_string(), params);
        self
    }
}

#[async_trait]
impl ParameterStoreClient for InMemoryParameterStore {
    async fn parameters_by_path(&self, path: &str) -> PlatformResult<HashMap<String, String>> {
        Ok(self.params.read().get(path).cloned().unwrap_or_default())
    }
}

/// In-memory container registry.
#[derive(Clone, Default)]
pub struct InMemoryContainerRegistry {
    repos: Arc<RwLock<Vec<String>>>,
    permissive: bool,
}

impl InMemoryContainerRegistry {
    /// Strict registry: only seeded repositories exist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every repository exists; useful for smoke runs.
    pub fn permissive() -> Self {
        Self {
            repos: Arc::new(RwLock::new(Vec::new())),
            permissive: true,
        }
    }

    pub fn with_repository(self, name: impl Into<String>) -> Self {
        self.repos.write().push(name.into());
        self
    }
}

#[async_trait]
impl ContainerRegistryClient for InMemoryContainerRegistry {
    async fn repository_exists(&self, name: &str) -> PlatformResult<bool> {
        if self.permissive {
            return Ok(true);
        }
        Ok(self.repos.read().iter().any(|r| r == name))
    }
}

/// TLS collaborator returning a canned configuration.
#[derive(Clone, Default)]
pub struct StaticTlsClient {
    failure: Arc<RwLock<Option<String>>>,
}

impl StaticTlsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.failure.write() = Some(message.into());
        self
    }
}

#[async_trait]
impl TlsClient for StaticTlsClient {
    async fn generate_tls_config(&self, muppet_name: &str) -> PlatformResult<TlsConfig> {
        if let Some(msg) = self.failure.read().clone() {
            return Err(PlatformError::Internal(msg));
        }
        Ok(TlsConfig {
            certificate_arn: format!(
                "arn:aws:acm:eu-west-1:123456789012:certificate/{}",
                uuid::Uuid::new_v4()
            ),
            domain: format!("{}.muppets.example.com", muppet_name),
            hosted_zone_id: "Z0123456789ABCDEFGHIJ".to_string(),
            ssl_policy: "ELBSecurityPolicy-TLS13-1-2-2021-06".to_string(),
        })
    }
}

/// Convenience: a file map from string content.
pub fn file_map(entries: &[(&str, &str)]) -> FileMap {
    entries
        .iter()
        .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
        .collect::<BTreeMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repository_lifecycle() {
        let client = InMemoryRepositoryClient::new();

        let repo = client
            .create_repository("svc-a", "python-fastapi", Some("test service"))
            .await
            .unwrap();
        assert_eq!(repo.url, "https://github.com/muppets/svc-a");

        client
            .push_files("svc-a", "python-fastapi", &file_map(&[("README.md", "hi")]))
            .await
            .unwrap();
        assert!(client.pushed_files("svc-a").is_some());

        client
            .update_status("svc-a", MuppetStatus::Running)
            .await
            .unwrap();
        let repo = client.get_repository("svc-a").await.unwrap().unwrap();
        assert_eq!(repo.status, Some(MuppetStatus::Running));
    }

    #[tokio::test]
    async fn test_repository_duplicate_create() {
        let client = InMemoryRepositoryClient::new();
        client
            .create_repository("svc-a", "t", None)
            .await
            .unwrap();
        let err = client.create_repository("svc-a", "t", None).await.unwrap_err();
        assert!(matches!(err, PlatformError::GitHub(_)));
    }

    #[tokio::test]
    async fn test_repository_failure_simulation() {
        let client = InMemoryRepositoryClient::new().fail_on("create_repository", "rate limited");
        let err = client.create_repository("svc-a", "t", None).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(client.call_count("create_repository"), 1);
    }

    #[tokio::test]
    async fn test_repository_collaborators() {
        let client = InMemoryRepositoryClient::new();
        client.create_repository("svc-a", "t", None).await.unwrap();

        client
            .add_collaborator("svc-a", "kermit", "push")
            .await
            .unwrap();
        client
            .add_collaborator("svc-a", "gonzo", "pull")
            .await
            .unwrap();
        client.remove_collaborator("svc-a", "gonzo").await.unwrap();

        assert_eq!(client.call_count("add_collaborator"), 2);
        assert_eq!(client.call_count("remove_collaborator"), 1);
    }

    #[tokio::test]
    async fn test_infrastructure_apply_and_destroy() {
        let infra = InMemoryInfrastructureClient::new();
        let config = InfraConfig {
            muppet_name: "svc-a".to_string(),
            container_image: "muppets/svc-a:latest".to_string(),
            port: 8000,
            environment: HashMap::new(),
            secrets: HashMap::new(),
            region: "eu-west-1".to_string(),
        };

        let deployment = infra.apply(&config).await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Completed);
        assert!(deployment.outputs.contains_key("service_arn"));

        let destroyed = infra.destroy("svc-a").await.unwrap();
        assert_eq!(destroyed.status, DeploymentStatus::Destroyed);
    }

    #[tokio::test]
    async fn test_infrastructure_apply_failure_records_state() {
        let infra = InMemoryInfrastructureClient::new().fail_on("apply", "quota exceeded");
        let config = InfraConfig {
            muppet_name: "svc-a".to_string(),
            container_image: "muppets/svc-a:latest".to_string(),
            port: 8000,
            environment: HashMap::new(),
            secrets: HashMap::new(),
            region: "eu-west-1".to_string(),
        };

        assert!(infra.apply(&config).await.is_err());
        let state = infra.deployment_status("svc-a").await.unwrap().unwrap();
        assert_eq!(state.status, DeploymentStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn test_registry_modes() {
        let strict = InMemoryContainerRegistry::new().with_repository("muppets/svc-a");
        assert!(strict.repository_exists("muppets/svc-a").await.unwrap());
        assert!(!strict.repository_exists("muppets/other").await.unwrap());

        let permissive = InMemoryContainerRegistry::permissive();
        assert!(permissive.repository_exists("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_tls_client() {
        let tls = StaticTlsClient::new();
        let config = tls.generate_tls_config("svc-a").await.unwrap();
        assert_eq!(config.domain, "svc-a.muppets.example.com");

        let failing = StaticTlsClient::new().fail_with("no hosted zone");
        assert!(failing.generate_tls_config("svc-a").await.is_err());
    }
}
