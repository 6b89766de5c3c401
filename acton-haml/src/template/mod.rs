//! HAML view templates compiled into a minijinja template set
//!
//! This module provides:
//! - [`HamlTemplateEngine`] that discovers, compiles, and publishes templates
//! - [`TemplateSet`], the compiled environment with its named units
//! - [`MarkupConverter`] / [`HamlConverter`] for HAML to markup conversion
//! - [`TemplateWatcher`] predicates deciding which files take part
//!
//! # Examples
//!
//! ```rust,no_run
//! use acton_haml::config::HamlSettings;
//! use acton_haml::template::{HamlTemplateEngine, TemplateFuncs};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = HamlSettings::for_views("./app/views").with_delimiters("[[ ]]");
//! let funcs = TemplateFuncs::new().with("upper", |s: String| s.to_uppercase());
//!
//! let engine = HamlTemplateEngine::new(settings, funcs)?;
//! if let Some(err) = engine.refresh()? {
//!     eprintln!("{err}");
//! }
//!
//! let html = engine.render("users/show.haml", minijinja::context! { name => "Ada" })?;
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod delims;
pub mod discovery;
pub mod engine;
pub mod haml;
pub mod names;
pub mod report;
pub mod set;

pub use converter::{HamlConverter, MarkupConverter, Scope};
pub use delims::DelimiterPair;
pub use discovery::{discover, DiscoveryOptions, DiscoveryReport, ExtensionWatcher, TemplateWatcher};
pub use engine::HamlTemplateEngine;
pub use names::TemplateNames;
pub use report::ErrorLatch;
pub use set::{Registration, TemplateFuncs, TemplateSet, TemplateSource, TemplateUnit};
