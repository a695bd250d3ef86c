//! Generation context for template rendering.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default deployment region used when a caller does not override it.
pub const DEFAULT_REGION: &str = "eu-west-1";
/// Default environment name.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Maximum length of a derived module identifier.
const MODULE_IDENT_MAX_LEN: usize = 40;

/// Identifiers that collide with language keywords get a suffix.
const RESERVED_WORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "false", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "none", "nonlocal", "not", "or", "pass", "raise", "return", "true", "try", "while",
    "with", "yield",
];

/// A single rendering request: which template, for which muppet, into which
/// directory, with which variables.
///
/// Constructed per generation call and discarded after rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Target muppet name
    pub muppet_name: String,
    /// Template to render
    pub template: String,
    /// Caller-provided variable bag
    pub variables: HashMap<String, String>,
    /// Directory the rendered tree is written to
    pub output_dir: PathBuf,
    /// Deployment region
    pub region: String,
    /// Environment name
    pub environment: String,
}

impl GenerationContext {
    /// Create a new generation context with default region and environment.
    pub fn new(
        muppet_name: impl Into<String>,
        template: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            muppet_name: muppet_name.into(),
            template: template.into(),
            variables: HashMap::new(),
            output_dir: output_dir.into(),
            region: DEFAULT_REGION.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, vars: HashMap<String, String>) -> Self {
        self.variables.extend(vars);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Full substitution map: fixed defaults, then the caller's bag, then the
    /// computed variables (computed values always win).
    pub fn variable_map(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("region".to_string(), self.region.clone());
        vars.insert("environment".to_string(), self.environment.clone());
        vars.extend(self.variables.clone());
        vars.insert("muppet_name".to_string(), self.muppet_name.clone());
        vars.insert(
            "module_name".to_string(),
            derive_module_name(&self.muppet_name),
        );
        vars
    }
}

/// Derive a language-safe module identifier from a muppet name.
///
/// Total over arbitrary input: the result is non-empty, starts with a letter,
/// contains only `[a-z0-9_]`, is at most 40 characters, and applying the
/// derivation twice yields the same identifier.
pub fn derive_module_name(name: &str) -> String {
    let mut ident = String::with_capacity(name.len());
    let mut last_was_sep = true;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            ident.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            // collapse runs of non-identifier characters into one separator
            ident.push('_');
            last_was_sep = true;
        }
    }

    let mut ident = ident.trim_matches('_').to_string();

    if ident.is_empty() {
        ident = "muppet".to_string();
    }

    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident = format!("m_{}", ident);
    }

    if RESERVED_WORDS.contains(&ident.as_str()) {
        ident.push_str("_svc");
    }

    if ident.len() > MODULE_IDENT_MAX_LEN {
        ident.truncate(MODULE_IDENT_MAX_LEN);
        ident = ident.trim_end_matches('_').to_string();
    }

    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_basic() {
        assert_eq!(derive_module_name("payment-service"), "payment_service");
        assert_eq!(derive_module_name("Payment Service"), "payment_service");
        assert_eq!(derive_module_name("svc-a"), "svc_a");
    }

    #[test]
    fn test_derive_collapses_separators() {
        assert_eq!(derive_module_name("a--b..c"), "a_b_c");
        assert_eq!(derive_module_name("--edge--"), "edge");
    }

    #[test]
    fn test_derive_empty_and_symbols() {
        assert_eq!(derive_module_name(""), "muppet");
        assert_eq!(derive_module_name("!!!"), "muppet");
    }

    #[test]
    fn test_derive_leading_digit() {
        let ident = derive_module_name("3scale-proxy");
        assert_eq!(ident, "m_3scale_proxy");
        assert!(ident.starts_with(|c: char| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_derive_reserved_word() {
        assert_eq!(derive_module_name("import"), "import_svc");
        assert_eq!(derive_module_name("class"), "class_svc");
    }

    #[test]
    fn test_derive_length_capped() {
        let long = "x".repeat(120);
        let ident = derive_module_name(&long);
        assert!(ident.len() <= 40);
        assert!(!ident.ends_with('_'));
    }

    #[test]
    fn test_derive_non_ascii() {
        let ident = derive_module_name("café-service-日本");
        assert!(!ident.is_empty());
        assert!(ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_derive_idempotent() {
        for input in [
            "payment-service",
            "3scale",
            "import",
            "",
            "!!!",
            "café-日本",
            &"ab-".repeat(40),
        ] {
            let once = derive_module_name(input);
            assert_eq!(derive_module_name(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_variable_map_computed_wins() {
        let ctx = GenerationContext::new("svc-a", "python-fastapi", "/tmp/out")
            .with_variable("muppet_name", "spoofed")
            .with_variable("team", "platform");

        let vars = ctx.variable_map();
        assert_eq!(vars.get("muppet_name").unwrap(), "svc-a");
        assert_eq!(vars.get("module_name").unwrap(), "svc_a");
        assert_eq!(vars.get("team").unwrap(), "platform");
        assert_eq!(vars.get("region").unwrap(), DEFAULT_REGION);
    }

    #[test]
    fn test_variable_map_region_override() {
        let ctx = GenerationContext::new("svc-a", "python-fastapi", "/tmp/out")
            .with_region("us-east-1")
            .with_environment("staging");

        let vars = ctx.variable_map();
        assert_eq!(vars.get("region").unwrap(), "us-east-1");
        assert_eq!(vars.get("environment").unwrap(), "staging");
    }
}
