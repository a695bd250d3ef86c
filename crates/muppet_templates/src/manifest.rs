//! Template manifest definitions.
//!
//! Each template directory carries a `template.yaml` descriptor declaring
//! what the template provides and which files must be present for it to be
//! usable. Manifests are data-driven: adding a template never requires a
//! code change.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A variable a template expects to be provided at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// File manifest partitioned by category.
///
/// Every `core` entry must resolve to a file, directory or glob match under
/// the template root; `optional` entries are informational only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileManifest {
    #[serde(default)]
    pub core: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Declarative template descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    /// Unique template name (directory name under the templates root)
    pub name: String,
    /// Semantic version of the template
    #[serde(default = "default_version")]
    pub version: String,
    /// Primary language (e.g., "python", "rust")
    pub language: String,
    /// Framework tag (e.g., "fastapi", "axum")
    #[serde(default)]
    pub framework: Option<String>,
    /// Template description
    #[serde(default)]
    pub description: String,
    /// Port the generated service listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Infrastructure modules the service needs deployed
    #[serde(default)]
    pub infrastructure_modules: Vec<String>,
    /// Variables the template consumes
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    /// Features supported by the generated service (e.g., "tls", "metrics")
    #[serde(default)]
    pub features: Vec<String>,
    /// Declared file manifest
    #[serde(default)]
    pub files: FileManifest,
}

impl TemplateManifest {
    /// Get required variables.
    pub fn required_variables(&self) -> Vec<&TemplateVariable> {
        self.variables.iter().filter(|v| v.required).collect()
    }

    /// Required variables with neither a provided value nor a default.
    pub fn missing_variables(&self, provided: &HashMap<String, String>) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.required && v.default.is_none() && !provided.contains_key(&v.name))
            .map(|v| v.name.clone())
            .collect()
    }

    /// Check if the template declares a feature.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Registry of discovered templates.
///
/// Immutable once built; re-discovery replaces the registry wholesale.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateManifest>,
    templates_path: PathBuf,
}

impl TemplateRegistry {
    pub fn new(templates_path: PathBuf) -> Self {
        Self {
            templates: HashMap::new(),
            templates_path,
        }
    }

    /// Register a template.
    pub fn register(&mut self, manifest: TemplateManifest) {
        self.templates.insert(manifest.name.clone(), manifest);
    }

    /// Get a template by name.
    pub fn get(&self, name: &str) -> Option<&TemplateManifest> {
        self.templates.get(name)
    }

    /// Check if a template exists.
    pub fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Check if the registry holds no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// List all registered templates.
    pub fn list(&self) -> Vec<&TemplateManifest> {
        self.templates.values().collect()
    }

    /// Get the path to a template directory.
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.templates_path.join(name)
    }
}
