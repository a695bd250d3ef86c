//! Template discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};
use crate::manifest::{TemplateManifest, TemplateRegistry};

/// Template loader.
pub struct TemplateLoader {
    templates_path: PathBuf,
}

impl TemplateLoader {
    /// Create a new template loader.
    pub fn new(templates_path: impl Into<PathBuf>) -> Self {
        Self {
            templates_path: templates_path.into(),
        }
    }

    /// Discover all templates under the templates directory.
    ///
    /// Subdirectories without a descriptor, or with a malformed one, are
    /// skipped with a warning; discovery itself only fails on IO errors at
    /// the root.
    pub fn discover(&self) -> TemplateResult<TemplateRegistry> {
        let mut registry = TemplateRegistry::new(self.templates_path.clone());

        if !self.templates_path.exists() {
            warn!("Templates directory does not exist: {:?}", self.templates_path);
            return Ok(registry);
        }

        for entry in WalkDir::new(&self.templates_path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_dir() {
                match self.load_template(path) {
                    Ok(manifest) => {
                        info!("Discovered template: {} ({})", manifest.name, manifest.version);
                        registry.register(manifest);
                    }
                    Err(e) => {
                        warn!("Skipping template at {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(registry)
    }

    /// Load a single template from a directory.
    pub fn load_template(&self, path: &Path) -> TemplateResult<TemplateManifest> {
        let manifest_path = path.join("template.yaml");

        if !manifest_path.exists() {
            let alt_path = path.join("template.yml");
            if !alt_path.exists() {
                return Err(TemplateError::NotFound(format!(
                    "No template.yaml found in {:?}",
                    path
                )));
            }
            return self.load_manifest(path, &alt_path);
        }

        self.load_manifest(path, &manifest_path)
    }

    /// Load a manifest file.
    fn load_manifest(&self, template_dir: &Path, path: &Path) -> TemplateResult<TemplateManifest> {
        debug!("Loading manifest from {:?}", path);
        let content = fs::read_to_string(path)?;
        let manifest: TemplateManifest =
            serde_yaml::from_str(&content).map_err(|e| TemplateError::InvalidManifest {
                template: template_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                message: e.to_string(),
            })?;
        Ok(manifest)
    }
}
