//! Error types for the platform core.

use muppet_templates::TemplateError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors that can occur during platform operations.
///
/// Validation, template, GitHub and deployment errors are domain errors and
/// propagate to callers unchanged; `Internal` wraps anything unexpected with
/// the original message preserved.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("GitHub error: {0}")]
    GitHub(String),

    #[error("Deployment error: {0}")]
    Deployment(String),

    #[error("{0}")]
    Internal(String),
}

/// Structured error body returned to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error_kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PlatformError {
    /// Stable discriminator for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::Validation(_) => "validation_error",
            PlatformError::Template(TemplateError::NotFound(_)) => "template_not_found",
            PlatformError::Template(TemplateError::ValidationFailed { .. }) => {
                "template_validation_error"
            }
            PlatformError::Template(_) => "template_error",
            PlatformError::GitHub(_) => "github_error",
            PlatformError::Deployment(_) => "deployment_error",
            PlatformError::Internal(_) => "platform_error",
        }
    }

    /// HTTP-equivalent status for the error.
    ///
    /// Domain errors are client-visible 4xx; only `Internal` maps to 500,
    /// where the original cause is kept out of the response body.
    pub fn status_code(&self) -> u16 {
        match self {
            PlatformError::Validation(_) => 400,
            PlatformError::Template(TemplateError::NotFound(_)) => 404,
            PlatformError::Template(_) => 422,
            PlatformError::GitHub(_) => 422,
            PlatformError::Deployment(_) => 422,
            PlatformError::Internal(_) => 500,
        }
    }

    /// Build the structured response body for this error.
    pub fn response_body(&self) -> ErrorBody {
        let (message, details) = match self {
            PlatformError::Internal(_) => ("internal platform error".to_string(), None),
            PlatformError::Template(TemplateError::ValidationFailed { missing, .. }) => (
                self.to_string(),
                Some(serde_json::json!({ "missing": missing })),
            ),
            other => (other.to_string(), None),
        };
        ErrorBody {
            error_kind: self.kind(),
            message,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(PlatformError::Validation("x".into()).kind(), "validation_error");
        assert_eq!(
            PlatformError::Template(TemplateError::NotFound("t".into())).kind(),
            "template_not_found"
        );
        assert_eq!(PlatformError::GitHub("x".into()).kind(), "github_error");
        assert_eq!(PlatformError::Deployment("x".into()).kind(), "deployment_error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PlatformError::Validation("x".into()).status_code(), 400);
        assert_eq!(
            PlatformError::Template(TemplateError::NotFound("t".into())).status_code(),
            404
        );
        assert_eq!(PlatformError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_body_hides_cause() {
        let err = PlatformError::Internal("Muppet creation failed: db on fire".into());
        let body = err.response_body();
        assert_eq!(body.error_kind, "platform_error");
        assert!(!body.message.contains("db on fire"));
    }

    #[test]
    fn test_template_validation_body_names_missing() {
        let err = PlatformError::Template(TemplateError::ValidationFailed {
            template: "t".into(),
            missing: vec!["pyproject.toml".into()],
        });
        let body = err.response_body();
        assert_eq!(body.error_kind, "template_validation_error");
        let details = body.details.unwrap();
        assert_eq!(details["missing"][0], "pyproject.toml");
    }
}
