//! # acton-haml
//!
//! HAML view templates for acton applications.
//!
//! Views written in HAML are discovered under the configured template roots,
//! converted to HTML markup and compiled into a single minijinja template
//! set. Every template is reachable under its path relative to its root and
//! under the lower-cased form of that path.
//!
//! ## Features
//!
//! - **Discovery**: ordered template roots, prunable directories, first-seen wins
//! - **Delimiters**: project-wide `template.delimiters` override for the primary view root
//! - **Errors**: the first compile error is kept with file, line, and source lines
//! - **Refresh**: rebuilt sets are swapped in atomically
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acton_haml::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! acton_haml::observability::init()?;
//!
//! let config = ActonHamlConfig::load_for_service("my-app")?;
//! let engine = HamlTemplateEngine::new(config.templates, TemplateFuncs::new())?;
//! engine.refresh()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod observability;
pub mod template;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ActonHamlConfig, HamlSettings};
    pub use crate::error::{CompileError, HamlError};
    pub use crate::template::{
        HamlConverter, HamlTemplateEngine, MarkupConverter, TemplateFuncs, TemplateSet,
        TemplateWatcher,
    };
}
