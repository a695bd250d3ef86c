//! # muppet_templates
//!
//! Template discovery, validation and rendering for Muppeteer.
//!
//! Templates are data-driven through `template.yaml` descriptors declaring
//! language, port, infrastructure modules, variables and a file manifest.
//! The engine validates a template's core manifest against its actual tree
//! and renders it into an output directory by `{{variable}}` substitution.
//!
//! ## Example
//!
//! ```rust,no_run
//! use muppet_templates::{GenerationContext, TemplateEngine};
//!
//! let engine = TemplateEngine::new("templates");
//! engine.validate("python-fastapi").unwrap();
//!
//! let context = GenerationContext::new("svc-a", "python-fastapi", "./out/svc-a")
//!     .with_variable("team", "platform");
//!
//! let rendered = engine.render(&context).unwrap();
//! println!("rendered {} files", rendered.files.len());
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod manifest;

pub use context::{derive_module_name, GenerationContext, DEFAULT_ENVIRONMENT, DEFAULT_REGION};
pub use engine::{RenderOutput, TemplateEngine};
pub use error::{TemplateError, TemplateResult};
pub use loader::TemplateLoader;
pub use manifest::{FileManifest, TemplateManifest, TemplateRegistry, TemplateVariable};
