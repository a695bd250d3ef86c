//! Platform state store.
//!
//! The single source of truth consulted and mutated by the lifecycle
//! orchestrator. The in-memory snapshot is a cache: it is rebuilt wholesale
//! from the repository, infrastructure and parameter-store collaborators on
//! initialize/refresh, and mutated incrementally in between.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clients::{InfrastructureClient, ParameterStoreClient, RepositoryClient};
use crate::error::{PlatformError, PlatformResult};
use crate::muppet::{
    DeploymentStatus, Muppet, MuppetStatus, PlatformHealth, PlatformState, DEFAULT_PORT,
};

/// Default parameter-store path holding module version entries.
const MODULE_VERSION_PATH: &str = "/muppets/modules";

/// Cached aggregate view of all muppets and their external-system state.
pub struct StateStore {
    repo: Arc<dyn RepositoryClient>,
    infra: Arc<dyn InfrastructureClient>,
    params: Arc<dyn ParameterStoreClient>,
    module_version_path: String,
    state: RwLock<PlatformState>,
}

impl StateStore {
    /// Create a store with an empty, uninitialized snapshot.
    pub fn new(
        repo: Arc<dyn RepositoryClient>,
        infra: Arc<dyn InfrastructureClient>,
        params: Arc<dyn ParameterStoreClient>,
    ) -> Self {
        Self {
            repo,
            infra,
            params,
            module_version_path: MODULE_VERSION_PATH.to_string(),
            state: RwLock::new(PlatformState::default()),
        }
    }

    pub fn with_module_version_path(mut self, path: impl Into<String>) -> Self {
        self.module_version_path = path.into();
        self
    }

    /// Build the snapshot from the external systems; no-op when already
    /// initialized.
    pub async fn initialize(&self) -> PlatformResult<()> {
        if self.state.read().await.initialized {
            debug!("State store already initialized");
            return Ok(());
        }
        let snapshot = self.gather().await?;
        info!("State store initialized with {} muppets", snapshot.muppets.len());
        *self.state.write().await = snapshot;
        Ok(())
    }

    /// Unconditionally rebuild the snapshot from the external systems.
    pub async fn refresh(&self) -> PlatformResult<()> {
        let snapshot = self.gather().await?;
        debug!("State refreshed: {} muppets", snapshot.muppets.len());
        *self.state.write().await = snapshot;
        Ok(())
    }

    async fn gather(&self) -> PlatformResult<PlatformState> {
        let repos = self.repo.list_repositories().await?;

        let mut muppets = Vec::new();
        for descriptor in repos {
            // only repositories carrying a template marker are ours
            let Some(template) = descriptor.template else {
                continue;
            };
            let mut muppet = Muppet::new(&descriptor.name, template)
                .with_port(descriptor.port.unwrap_or(DEFAULT_PORT));
            muppet.status = descriptor.status.unwrap_or(MuppetStatus::Running);
            muppet.repository_url = Some(descriptor.url);
            muppets.push(muppet);
        }

        let mut deployments = HashMap::new();
        for muppet in &muppets {
            if let Some(deployment) = self.infra.deployment_status(&muppet.name).await? {
                if deployment.status == DeploymentStatus::Completed {
                    deployments.insert(muppet.name.clone(), deployment.workspace);
                }
            }
        }

        let module_versions = self
            .params
            .parameters_by_path(&self.module_version_path)
            .await?;

        Ok(PlatformState {
            muppets,
            deployments,
            module_versions,
            last_refresh: Some(Utc::now()),
            initialized: true,
        })
    }

    /// Current snapshot; the well-defined empty snapshot when never
    /// initialized.
    pub async fn state(&self) -> PlatformState {
        self.state.read().await.clone()
    }

    pub async fn get_muppet(&self, name: &str) -> Option<Muppet> {
        self.state
            .read()
            .await
            .muppets
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub async fn list_muppets(&self) -> Vec<Muppet> {
        self.state.read().await.muppets.clone()
    }

    /// Upsert a muppet into the in-memory snapshot only.
    ///
    /// Used by the orchestrator to reserve a name before external side
    /// effects occur; safe to call before `initialize` has completed.
    pub async fn add_muppet(&self, muppet: Muppet) {
        let mut state = self.state.write().await;
        match state.muppets.iter_mut().find(|m| m.name == muppet.name) {
            Some(existing) => *existing = muppet,
            None => state.muppets.push(muppet),
        }
    }

    /// Remove a muppet from the in-memory snapshot only.
    ///
    /// Returns whether anything was removed; used to roll back a
    /// reservation, so absence is not an error.
    pub async fn remove_muppet(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.muppets.len();
        state.muppets.retain(|m| m.name != name);
        state.deployments.remove(name);
        before != state.muppets.len()
    }

    /// Record the active deployment workspace for a muppet.
    pub async fn record_deployment(&self, name: &str, workspace: impl Into<String>) {
        self.state
            .write()
            .await
            .deployments
            .insert(name.to_string(), workspace.into());
    }

    /// Update a muppet's status in the external system of record and the
    /// snapshot.
    ///
    /// Status is externally observable, so an external update failure is
    /// propagated, not hidden; cleanup flows wrap this in their own
    /// log-and-continue handling.
    pub async fn update_muppet_status(
        &self,
        name: &str,
        status: MuppetStatus,
    ) -> PlatformResult<()> {
        let current = self
            .get_muppet(name)
            .await
            .ok_or_else(|| PlatformError::Validation(format!("unknown muppet '{}'", name)))?;

        if !current.status.can_transition_to(status) {
            return Err(PlatformError::Validation(format!(
                "illegal status transition for '{}': {} -> {}",
                name, current.status, status
            )));
        }

        self.repo.update_status(name, status).await?;

        let mut state = self.state.write().await;
        if let Some(muppet) = state.muppets.iter_mut().find(|m| m.name == name) {
            muppet.status = status;
            muppet.updated_at = Utc::now();
        } else {
            // removed concurrently between the read and the write
            warn!("muppet '{}' vanished during status update", name);
        }
        Ok(())
    }

    /// Derived health metrics over the current snapshot.
    pub async fn platform_health(&self) -> PlatformHealth {
        let state = self.state.read().await;
        let total = state.muppets.len();

        let count = |status: MuppetStatus| {
            state
                .muppets
                .iter()
                .filter(|m| m.status == status)
                .count()
        };
        let running = count(MuppetStatus::Running);
        let errored = count(MuppetStatus::Error);

        let health_score = if total == 0 {
            0.0
        } else {
            (running as f64 / total as f64) * (1.0 - errored as f64 / total as f64)
        };

        PlatformHealth {
            total,
            running,
            creating: count(MuppetStatus::Creating),
            stopped: count(MuppetStatus::Stopped),
            errored,
            deleting: count(MuppetStatus::Deleting),
            active_deployments: state.deployments.len(),
            module_count: state.module_versions.len(),
            health_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockParameterStoreClient, RepoDescriptor};
    use crate::mock::{InMemoryInfrastructureClient, InMemoryParameterStore, InMemoryRepositoryClient};

    fn store(repo: InMemoryRepositoryClient) -> StateStore {
        StateStore::new(
            Arc::new(repo),
            Arc::new(InMemoryInfrastructureClient::new()),
            Arc::new(InMemoryParameterStore::new()),
        )
    }

    #[tokio::test]
    async fn test_uninitialized_state_is_empty() {
        let store = store(InMemoryRepositoryClient::new());
        let state = store.state().await;
        assert!(!state.initialized);
        assert!(store.list_muppets().await.is_empty());
        assert!(store.get_muppet("svc-a").await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let repo = InMemoryRepositoryClient::new().with_repository(RepoDescriptor {
            name: "svc-a".to_string(),
            url: "https://github.com/muppets/svc-a".to_string(),
            template: Some("python-fastapi".to_string()),
            status: Some(MuppetStatus::Running),
            port: Some(8000),
            description: None,
        });
        let store = store(repo);

        store.initialize().await.unwrap();
        assert!(store.state().await.initialized);

        // reserving then re-initializing must not wipe the reservation
        store.add_muppet(Muppet::new("svc-b", "python-fastapi")).await;
        store.initialize().await.unwrap();
        assert!(store.get_muppet("svc-b").await.is_some());
    }

    #[tokio::test]
    async fn test_gather_skips_unmanaged_repos() {
        let repo = InMemoryRepositoryClient::new()
            .with_repository(RepoDescriptor {
                name: "svc-a".to_string(),
                url: "https://github.com/muppets/svc-a".to_string(),
                template: Some("python-fastapi".to_string()),
                status: Some(MuppetStatus::Running),
                port: None,
                description: None,
            })
            .with_repository(RepoDescriptor {
                name: "dotfiles".to_string(),
                url: "https://github.com/muppets/dotfiles".to_string(),
                template: None,
                status: None,
                port: None,
                description: None,
            });
        let store = store(repo);
        store.initialize().await.unwrap();

        let muppets = store.list_muppets().await;
        assert_eq!(muppets.len(), 1);
        assert_eq!(muppets[0].name, "svc-a");
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let store = store(InMemoryRepositoryClient::new());
        store.add_muppet(Muppet::new("ghost", "python-fastapi")).await;

        store.refresh().await.unwrap();
        assert!(store.get_muppet("ghost").await.is_none());
        assert!(store.state().await.initialized);
    }

    #[tokio::test]
    async fn test_add_remove_before_initialize() {
        let store = store(InMemoryRepositoryClient::new());
        store.add_muppet(Muppet::new("svc-a", "python-fastapi")).await;
        assert!(store.get_muppet("svc-a").await.is_some());
        assert!(store.remove_muppet("svc-a").await);
        assert!(!store.remove_muppet("svc-a").await);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let repo = InMemoryRepositoryClient::new().with_repository(RepoDescriptor {
            name: "svc-a".to_string(),
            url: "u".to_string(),
            template: Some("t".to_string()),
            status: Some(MuppetStatus::Stopped),
            port: None,
            description: None,
        });
        let store = store(repo);
        store.initialize().await.unwrap();

        let err = store
            .update_muppet_status("svc-a", MuppetStatus::Error)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_status_propagates_external_failure() {
        let repo = InMemoryRepositoryClient::new()
            .with_repository(RepoDescriptor {
                name: "svc-a".to_string(),
                url: "u".to_string(),
                template: Some("t".to_string()),
                status: Some(MuppetStatus::Creating),
                port: None,
                description: None,
            })
            .fail_on("update_status", "api down");
        let store = store(repo);
        store.initialize().await.unwrap();

        let err = store
            .update_muppet_status("svc-a", MuppetStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::GitHub(_)));

        // snapshot unchanged on external failure
        let muppet = store.get_muppet("svc-a").await.unwrap();
        assert_eq!(muppet.status, MuppetStatus::Creating);
    }

    #[tokio::test]
    async fn test_platform_health_empty() {
        let store = store(InMemoryRepositoryClient::new());
        let health = store.platform_health().await;
        assert_eq!(health.total, 0);
        assert_eq!(health.active_deployments, 0);
        assert_eq!(health.health_score, 0.0);
    }

    #[tokio::test]
    async fn test_platform_health_score() {
        let store = store(InMemoryRepositoryClient::new());
        for (name, status) in [
            ("a", MuppetStatus::Running),
            ("b", MuppetStatus::Running),
            ("c", MuppetStatus::Running),
            ("d", MuppetStatus::Error),
        ] {
            let mut muppet = Muppet::new(name, "t");
            muppet.status = status;
            store.add_muppet(muppet).await;
        }

        let health = store.platform_health().await;
        assert_eq!(health.running, 3);
        assert_eq!(health.errored, 1);
        // 3/4 * (1 - 1/4)
        assert!((health.health_score - 0.5625).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_module_versions_via_mockall() {
        let mut params = MockParameterStoreClient::new();
        params
            .expect_parameters_by_path()
            .withf(|path| path == "/muppets/modules")
            .returning(|_| {
                Ok(HashMap::from([
                    ("ecs-service".to_string(), "1.4.2".to_string()),
                    ("alb".to_string(), "2.0.0".to_string()),
                ]))
            });

        let store = StateStore::new(
            Arc::new(InMemoryRepositoryClient::new()),
            Arc::new(InMemoryInfrastructureClient::new()),
            Arc::new(params),
        );
        store.initialize().await.unwrap();

        let state = store.state().await;
        assert_eq!(state.module_versions.len(), 2);
        assert_eq!(state.module_versions.get("alb").unwrap(), "2.0.0");
    }
}
