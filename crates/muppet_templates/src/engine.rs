//! Template validation and rendering.
//!
//! The engine owns the discovered-template cache and the two operations the
//! lifecycle depends on: structural validation of a template against its
//! declared file manifest, and rendering a template into a concrete output
//! directory for a [`GenerationContext`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::context::GenerationContext;
use crate::error::{TemplateError, TemplateResult};
use crate::loader::TemplateLoader;
use crate::manifest::{TemplateManifest, TemplateRegistry};

/// Marker carried by file names whose content gets variable substitution.
const TEMPLATE_MARKER: &str = ".template";

/// Files that are substituted even without the marker, so literal template
/// syntax never leaks into generated output.
const ALWAYS_RENDER: &[&str] = &["README.md", ".env.example"];

/// Result of rendering a template.
#[derive(Debug)]
pub struct RenderOutput {
    /// Rendered files keyed by separator-normalized relative path.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Directory the tree was written to.
    pub output_dir: PathBuf,
}

/// Template engine: discovery cache plus validate/render.
pub struct TemplateEngine {
    templates_path: PathBuf,
    loader: TemplateLoader,
    registry: RwLock<Option<TemplateRegistry>>,
    variable_pattern: Regex,
}

impl TemplateEngine {
    /// Create a new engine rooted at a templates directory.
    pub fn new(templates_path: impl Into<PathBuf>) -> Self {
        let templates_path = templates_path.into();
        Self {
            loader: TemplateLoader::new(&templates_path),
            templates_path,
            registry: RwLock::new(None),
            // Match {{variable_name}} pattern
            variable_pattern: Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}").unwrap(),
        }
    }

    /// Discover templates, replacing any prior cache wholesale.
    pub fn discover(&self) -> TemplateResult<Vec<TemplateManifest>> {
        let registry = self.loader.discover()?;
        let manifests = registry.list().into_iter().cloned().collect();
        *self.registry.write() = Some(registry);
        Ok(manifests)
    }

    /// Get a template manifest by name, discovering on first use.
    pub fn get(&self, name: &str) -> TemplateResult<Option<TemplateManifest>> {
        self.ensure_discovered()?;
        Ok(self
            .registry
            .read()
            .as_ref()
            .and_then(|r| r.get(name).cloned()))
    }

    /// List all cached templates, discovering on first use.
    pub fn list(&self) -> TemplateResult<Vec<TemplateManifest>> {
        self.ensure_discovered()?;
        Ok(self
            .registry
            .read()
            .as_ref()
            .map(|r| r.list().into_iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Validate a template's core file manifest against its tree.
    ///
    /// Each core entry is checked for direct existence first; entries with
    /// glob metacharacters are then matched as globs, and anything else
    /// falls back to a separator-normalized substring search over relative
    /// paths. All non-matching entries are reported together.
    pub fn validate(&self, name: &str) -> TemplateResult<()> {
        let manifest = self
            .get(name)?
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let template_dir = self.templates_path.join(name);
        let tree = relative_file_paths(&template_dir);

        let mut missing = Vec::new();
        for entry in &manifest.files.core {
            if !self.core_entry_resolves(&template_dir, &tree, entry) {
                missing.push(entry.clone());
            }
        }

        if !missing.is_empty() {
            return Err(TemplateError::ValidationFailed {
                template: name.to_string(),
                missing,
            });
        }

        debug!("Template '{}' passed manifest validation", name);
        Ok(())
    }

    /// Render a template into the context's output directory.
    ///
    /// Files carrying the `.template` marker have it stripped from the
    /// output name and their content substituted; all other files are copied
    /// byte-for-byte except the fixed always-render set. Unresolved
    /// `{{token}}`s are left verbatim. The write is overwrite-only: files
    /// already in the output directory that the template does not produce
    /// are left alone.
    pub fn render(&self, context: &GenerationContext) -> TemplateResult<RenderOutput> {
        let manifest = self
            .get(&context.template)?
            .ok_or_else(|| TemplateError::NotFound(context.template.clone()))?;

        let template_dir = self.templates_path.join(&context.template);
        let vars = self.build_variable_map(&manifest, context);

        info!(
            "Rendering template '{}' for muppet '{}' into {:?}",
            context.template, context.muppet_name, context.output_dir
        );

        fs::create_dir_all(&context.output_dir)?;

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&template_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let source = entry.path();
            let relative = source.strip_prefix(&template_dir).unwrap();

            // Skip the descriptor itself
            let rel_str = normalize_separators(relative);
            if rel_str == "template.yaml" || rel_str == "template.yml" {
                continue;
            }

            if source.is_dir() {
                fs::create_dir_all(context.output_dir.join(relative))?;
                continue;
            }

            let file_name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let (out_name, marked) = match strip_marker(&file_name) {
                Some(stripped) => (stripped, true),
                None => (file_name.clone(), false),
            };

            let out_relative = relative.with_file_name(&out_name);
            let content = if marked || ALWAYS_RENDER.contains(&out_name.as_str()) {
                let raw = fs::read_to_string(source)?;
                self.substitute(&raw, &vars).into_bytes()
            } else {
                fs::read(source)?
            };

            let target = context.output_dir.join(&out_relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &content)?;
            debug!("Rendered: {:?}", out_relative);

            files.insert(normalize_separators(&out_relative), content);
        }

        Ok(RenderOutput {
            files,
            output_dir: context.output_dir.clone(),
        })
    }

    /// Substitute `{{var}}` tokens; unknown tokens stay verbatim.
    pub fn substitute(&self, content: &str, variables: &HashMap<String, String>) -> String {
        self.variable_pattern
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                variables
                    .get(var_name)
                    .cloned()
                    .unwrap_or_else(|| format!("{{{{{}}}}}", var_name))
            })
            .to_string()
    }

    /// Manifest defaults first, context map on top.
    fn build_variable_map(
        &self,
        manifest: &TemplateManifest,
        context: &GenerationContext,
    ) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        for var in &manifest.variables {
            if let Some(default) = &var.default {
                vars.insert(var.name.clone(), default.clone());
            }
        }
        vars.extend(context.variable_map());
        vars
    }

    fn core_entry_resolves(&self, template_dir: &Path, tree: &[String], entry: &str) -> bool {
        if template_dir.join(entry).exists() {
            return true;
        }

        let pattern = entry.replace('\\', "/");
        if pattern.contains(['*', '?', '[']) {
            if let Ok(glob) = glob::Pattern::new(&pattern) {
                return tree.iter().any(|rel| glob.matches(rel));
            }
        }

        // Substring fallback over normalized relative paths.
        tree.iter()
            .any(|rel| rel == &pattern || rel.contains(&pattern))
    }

    fn ensure_discovered(&self) -> TemplateResult<()> {
        let empty = match self.registry.read().as_ref() {
            Some(registry) => registry.is_empty(),
            None => true,
        };
        if empty {
            self.discover()?;
        }
        Ok(())
    }
}

/// Strip the template marker from a file name, if present.
///
/// `README.template.md` becomes `README.md`; `run.sh.template` becomes
/// `run.sh`.
fn strip_marker(file_name: &str) -> Option<String> {
    if let Some(stem) = file_name.strip_suffix(TEMPLATE_MARKER) {
        if !stem.is_empty() {
            return Some(stem.to_string());
        }
    }
    let marked = format!("{}.", TEMPLATE_MARKER);
    if file_name.contains(&marked) {
        return Some(file_name.replacen(&marked, ".", 1));
    }
    None
}

/// All file paths under a root, relative and '/'-normalized.
fn relative_file_paths(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .map(normalize_separators)
                .unwrap_or_default()
        })
        .collect()
}

fn normalize_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
