//! Integration tests for the template system.

use std::fs;
use std::path::Path;

use muppet_templates::{GenerationContext, TemplateEngine, TemplateError, TemplateLoader};
use tempfile::tempdir;

/// Lay down a realistic template fixture under `root`.
fn write_fixture(root: &Path) {
    let dir = root.join("python-fastapi");
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::create_dir_all(dir.join("infra")).unwrap();

    fs::write(
        dir.join("template.yaml"),
        r#"
name: python-fastapi
version: 2.1.0
language: python
framework: fastapi
port: 8000
infrastructure_modules: [ecs-service, alb]
features: [tls]
variables:
  - name: team
    description: Owning team
    required: true
    default: platform
files:
  core:
    - pyproject.toml
    - src
    - "infra/*.tf"
  optional:
    - docs/ARCHITECTURE.md
"#,
    )
    .unwrap();

    fs::write(
        dir.join("pyproject.toml"),
        "[project]\nname = \"{{module_name}}\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("README.template.md"),
        "# {{muppet_name}}\n\nOwned by {{team}}.\n",
    )
    .unwrap();
    fs::write(
        dir.join("src/main.py.template"),
        "APP = \"{{module_name}}\"\nREGION = \"{{region}}\"\n",
    )
    .unwrap();
    fs::write(dir.join("src/static.py"), "VALUE = \"{{not_substituted}}\"\n").unwrap();
    fs::write(dir.join("infra/service.tf"), "# terraform module\n").unwrap();
}

#[test]
fn test_discover_returns_template() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());

    let loader = TemplateLoader::new(temp.path());
    let registry = loader.discover().unwrap();

    let manifest = registry.get("python-fastapi").unwrap();
    assert_eq!(manifest.name, "python-fastapi");
    assert_eq!(manifest.version, "2.1.0");
    assert_eq!(manifest.port, 8000);
    assert!(manifest.has_feature("tls"));
}

#[test]
fn test_validate_passes_on_complete_manifest() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());

    let engine = TemplateEngine::new(temp.path());
    engine.validate("python-fastapi").unwrap();
}

#[test]
fn test_validate_unknown_template() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());

    let engine = TemplateEngine::new(temp.path());
    let err = engine.validate("nonexistent").unwrap_err();
    assert!(matches!(err, TemplateError::NotFound(_)));
}

#[test]
fn test_validate_names_missing_files() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    fs::remove_file(temp.path().join("python-fastapi/pyproject.toml")).unwrap();

    let engine = TemplateEngine::new(temp.path());
    let err = engine.validate("python-fastapi").unwrap_err();

    match err {
        TemplateError::ValidationFailed { template, missing } => {
            assert_eq!(template, "python-fastapi");
            assert_eq!(missing, vec!["pyproject.toml".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_validate_glob_entry() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    fs::remove_file(temp.path().join("python-fastapi/infra/service.tf")).unwrap();

    let engine = TemplateEngine::new(temp.path());
    let err = engine.validate("python-fastapi").unwrap_err();

    match err {
        TemplateError::ValidationFailed { missing, .. } => {
            assert_eq!(missing, vec!["infra/*.tf".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_render_strips_marker_and_substitutes() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = tempdir().unwrap();

    let engine = TemplateEngine::new(temp.path());
    let context = GenerationContext::new("svc-a", "python-fastapi", out.path());
    let rendered = engine.render(&context).unwrap();

    assert!(rendered.files.contains_key("README.md"));
    assert!(!rendered.files.contains_key("README.template.md"));

    let readme = fs::read_to_string(out.path().join("README.md")).unwrap();
    assert!(readme.contains("# svc-a"));
    // default from the manifest variable declaration
    assert!(readme.contains("Owned by platform."));
    assert!(!readme.contains("{{"));

    let main_py = fs::read_to_string(out.path().join("src/main.py")).unwrap();
    assert!(main_py.contains("APP = \"svc_a\""));
    assert!(main_py.contains("REGION = \"eu-west-1\""));
}

#[test]
fn test_render_copies_unmarked_files_verbatim() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = tempdir().unwrap();

    let engine = TemplateEngine::new(temp.path());
    let context = GenerationContext::new("svc-a", "python-fastapi", out.path());
    engine.render(&context).unwrap();

    // unmarked file keeps its literal token
    let static_py = fs::read_to_string(out.path().join("src/static.py")).unwrap();
    assert!(static_py.contains("{{not_substituted}}"));

    // descriptor is not part of the output
    assert!(!out.path().join("template.yaml").exists());
}

#[test]
fn test_render_is_idempotent() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = tempdir().unwrap();

    let engine = TemplateEngine::new(temp.path());
    let context = GenerationContext::new("svc-a", "python-fastapi", out.path());

    let first = engine.render(&context).unwrap();
    let second = engine.render(&context).unwrap();

    assert_eq!(first.files, second.files);
}

#[test]
fn test_render_overwrite_only() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = tempdir().unwrap();
    fs::write(out.path().join("unrelated.txt"), "keep me").unwrap();

    let engine = TemplateEngine::new(temp.path());
    let context = GenerationContext::new("svc-a", "python-fastapi", out.path());
    engine.render(&context).unwrap();

    let kept = fs::read_to_string(out.path().join("unrelated.txt")).unwrap();
    assert_eq!(kept, "keep me");
}

#[test]
fn test_render_unknown_template() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());
    let out = tempdir().unwrap();

    let engine = TemplateEngine::new(temp.path());
    let context = GenerationContext::new("svc-a", "missing", out.path());
    let err = engine.render(&context).unwrap_err();
    assert!(matches!(err, TemplateError::NotFound(_)));
}

#[test]
fn test_rediscovery_replaces_cache() {
    let temp = tempdir().unwrap();
    write_fixture(temp.path());

    let engine = TemplateEngine::new(temp.path());
    assert_eq!(engine.list().unwrap().len(), 1);

    // add a second template on disk, then re-discover
    let dir = temp.path().join("rust-axum");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("template.yaml"), "name: rust-axum\nlanguage: rust\n").unwrap();

    engine.discover().unwrap();
    assert_eq!(engine.list().unwrap().len(), 2);
}
