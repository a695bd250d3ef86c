//! Platform data model: muppets, platform state, deployments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, PlatformResult};

/// Default port assumed until the template manifest supplies one.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum muppet name length (DNS label limit).
const NAME_MAX_LEN: usize = 63;

/// Lifecycle status of a muppet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuppetStatus {
    Creating,
    Running,
    Stopped,
    Error,
    Deleting,
}

impl MuppetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuppetStatus::Creating => "creating",
            MuppetStatus::Running => "running",
            MuppetStatus::Stopped => "stopped",
            MuppetStatus::Error => "error",
            MuppetStatus::Deleting => "deleting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "creating" => Some(MuppetStatus::Creating),
            "running" => Some(MuppetStatus::Running),
            "stopped" => Some(MuppetStatus::Stopped),
            "error" => Some(MuppetStatus::Error),
            "deleting" => Some(MuppetStatus::Deleting),
            _ => None,
        }
    }

    /// Whether a transition to `next` is allowed.
    ///
    /// Transitions are monotonic within one flow: a muppet never silently
    /// reverts; the only paths back to `Creating` are explicit re-deploy
    /// requests.
    pub fn can_transition_to(&self, next: MuppetStatus) -> bool {
        use MuppetStatus::*;
        if *self == next {
            return true;
        }
        match (*self, next) {
            (_, Deleting) => true,
            (Creating, Running) | (Creating, Error) => true,
            (Running, Stopped) | (Running, Error) | (Running, Creating) => true,
            (Stopped, Running) | (Stopped, Creating) => true,
            (Error, Creating) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MuppetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provisioned service instance managed by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Muppet {
    /// Unique name; doubles as the repository name and DNS label
    pub name: String,
    /// Template the muppet was generated from
    pub template: String,
    /// Current lifecycle status
    pub status: MuppetStatus,
    /// URL of the GitHub repository
    pub repository_url: Option<String>,
    /// ARN of the deployed infrastructure service, if any
    pub service_arn: Option<String>,
    /// Port the service listens on
    pub port: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Muppet {
    /// Create a new muppet in `Creating` state.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            template: template.into(),
            status: MuppetStatus::Creating,
            repository_url: None,
            service_arn: None,
            port: DEFAULT_PORT,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = Some(url.into());
        self
    }
}

/// Validate a muppet name against repository/DNS-label constraints.
pub fn validate_muppet_name(name: &str) -> PlatformResult<()> {
    if name.is_empty() {
        return Err(PlatformError::Validation(
            "muppet name must not be empty".to_string(),
        ));
    }
    if name.len() > NAME_MAX_LEN {
        return Err(PlatformError::Validation(format!(
            "muppet name '{}' exceeds {} characters",
            name, NAME_MAX_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(PlatformError::Validation(format!(
            "muppet name '{}' may only contain lowercase letters, digits and hyphens",
            name
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(PlatformError::Validation(format!(
            "muppet name '{}' must start and end with a letter or digit",
            name
        )));
    }
    Ok(())
}

/// Aggregate snapshot of everything the platform manages.
///
/// The empty uninitialized snapshot is a valid value, distinguishable via
/// the `initialized` flag.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformState {
    /// All known muppets
    pub muppets: Vec<Muppet>,
    /// Muppet name -> active deployment workspace
    pub deployments: HashMap<String, String>,
    /// Infrastructure module -> deployed version
    pub module_versions: HashMap<String, String>,
    /// When the snapshot was last rebuilt from the external systems
    pub last_refresh: Option<DateTime<Utc>>,
    /// Whether the snapshot has been built at least once
    pub initialized: bool,
}

/// Derived health metrics over a platform snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformHealth {
    pub total: usize,
    pub running: usize,
    pub creating: usize,
    pub stopped: usize,
    pub errored: usize,
    pub deleting: usize,
    pub active_deployments: usize,
    pub module_count: usize,
    /// (fraction running) x (1 - fraction errored); 0.0 on an empty platform
    pub health_score: f64,
}

/// Status of one infrastructure provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Destroyed,
}

impl DeploymentStatus {
    /// Terminal states are never retried automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Completed | DeploymentStatus::Failed | DeploymentStatus::Destroyed
        )
    }
}

/// One infrastructure provisioning attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    pub muppet_name: String,
    pub status: DeploymentStatus,
    /// Provisioning workspace identifier
    pub workspace: String,
    /// State backend key for the workspace
    pub state_key: String,
    /// Outputs reported by the provisioning tool
    pub outputs: HashMap<String, String>,
    pub error: Option<String>,
    /// Last operation applied to the workspace (e.g. "apply", "destroy")
    pub last_operation: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentState {
    pub fn new(muppet_name: impl Into<String>, workspace: impl Into<String>) -> Self {
        let muppet_name = muppet_name.into();
        let workspace = workspace.into();
        Self {
            state_key: format!("muppets/{}/terraform.tfstate", muppet_name),
            muppet_name,
            status: DeploymentStatus::Pending,
            workspace,
            outputs: HashMap::new(),
            error: None,
            last_operation: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MuppetStatus::Creating,
            MuppetStatus::Running,
            MuppetStatus::Stopped,
            MuppetStatus::Error,
            MuppetStatus::Deleting,
        ] {
            assert_eq!(MuppetStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(MuppetStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_status_transitions() {
        use MuppetStatus::*;
        assert!(Creating.can_transition_to(Running));
        assert!(Creating.can_transition_to(Error));
        assert!(Running.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Running));
        assert!(Error.can_transition_to(Deleting));
        // no silent reverts
        assert!(!Stopped.can_transition_to(Error));
        assert!(!Error.can_transition_to(Running));
        assert!(!Deleting.can_transition_to(Running));
    }

    #[test]
    fn test_validate_muppet_name() {
        assert!(validate_muppet_name("svc-a").is_ok());
        assert!(validate_muppet_name("a1-b2-c3").is_ok());

        assert!(validate_muppet_name("").is_err());
        assert!(validate_muppet_name("Svc-A").is_err());
        assert!(validate_muppet_name("svc_a").is_err());
        assert!(validate_muppet_name("-svc").is_err());
        assert!(validate_muppet_name("svc-").is_err());
        assert!(validate_muppet_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_empty_state_is_valid() {
        let state = PlatformState::default();
        assert!(!state.initialized);
        assert!(state.muppets.is_empty());
        assert!(state.last_refresh.is_none());
    }

    #[test]
    fn test_deployment_terminal() {
        assert!(DeploymentStatus::Completed.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::InProgress.is_terminal());
    }
}
