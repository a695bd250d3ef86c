//! # muppet_core
//!
//! Lifecycle orchestration and state management for Muppeteer.
//!
//! This crate owns the platform's data model, the cached platform state,
//! and the workflows that create, deploy and destroy muppets across the
//! template engine and the external collaborators.
//!
//! # Architecture
//!
//! - **Clients**: trait per external collaborator (GitHub, infrastructure,
//!   parameter store, container registry, TLS), injected at construction
//! - **StateStore**: cached aggregate snapshot, rebuilt from the
//!   collaborators and mutated incrementally by the orchestrator
//! - **DeploymentCoordinator**: infrastructure apply/destroy and status
//!   merge
//! - **LifecycleOrchestrator**: the create/undeploy/migrate workflows with
//!   compensating rollback on failure
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use muppet_core::{
//!     CreateMuppetRequest, DeploymentCoordinator, LifecycleOrchestrator, StateStore,
//! };
//! use muppet_templates::TemplateEngine;
//!
//! let state = Arc::new(StateStore::new(repo.clone(), infra.clone(), params));
//! state.initialize().await?;
//!
//! let deployer = Arc::new(DeploymentCoordinator::new(
//!     state.clone(), infra, registry, "eu-west-1",
//! ));
//! let orchestrator = LifecycleOrchestrator::new(
//!     state, Arc::new(TemplateEngine::new("templates")), repo, deployer, tls, "workspaces",
//! );
//!
//! let outcome = orchestrator
//!     .create_muppet(CreateMuppetRequest::new("svc-a", "python-fastapi"))
//!     .await?;
//! ```

pub mod clients;
pub mod deploy;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod muppet;
pub mod state;

pub use clients::{
    ContainerRegistryClient, FileMap, InfraConfig, InfrastructureClient, ParameterStoreClient,
    RepoDescriptor, RepositoryClient, ServiceMetrics, TlsClient, TlsConfig,
};
pub use deploy::{
    image_repository, DeployOutcome, DeployRequest, DeploymentCoordinator, DeploymentStatusView,
};
pub use error::{ErrorBody, PlatformError, PlatformResult};
pub use lifecycle::{
    CreateMuppetOutcome, CreateMuppetRequest, LifecycleOrchestrator, TlsMigration, UndeployOutcome,
};
pub use mock::{
    InMemoryContainerRegistry, InMemoryInfrastructureClient, InMemoryParameterStore,
    InMemoryRepositoryClient, StaticTlsClient,
};
pub use muppet::{
    validate_muppet_name, DeploymentState, DeploymentStatus, Muppet, MuppetStatus, PlatformHealth,
    PlatformState, DEFAULT_PORT,
};
pub use state::StateStore;
