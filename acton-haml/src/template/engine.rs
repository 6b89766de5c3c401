//! HAML template engine with refresh support
//!
//! The engine owns the resolved configuration and the published template
//! set. [`HamlTemplateEngine::refresh`] runs discovery and atomically swaps
//! the result in, so readers always see a complete set.

use minijinja::{ErrorKind, Value};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::converter::{default_scope, HamlConverter, MarkupConverter, Scope};
use super::delims::DelimiterPair;
use super::discovery::{discover, DiscoveryOptions, ExtensionWatcher, TemplateWatcher};
use super::set::{TemplateFuncs, TemplateSet};
use crate::config::HamlSettings;
use crate::error::{CompileError, HamlError};

/// Thread-safe HAML template engine
///
/// Clones share the published set, the compile error, and the refresh lock.
pub struct HamlTemplateEngine {
    settings: Arc<HamlSettings>,
    delimiters: Option<DelimiterPair>,
    funcs: Arc<TemplateFuncs>,
    watcher: Arc<dyn TemplateWatcher>,
    converter: Arc<dyn MarkupConverter>,
    scope: Arc<Scope>,
    published: Arc<RwLock<Published>>,
    refresh_lock: Arc<Mutex<()>>,
}

/// Set and compile error from the same refresh, swapped together
#[derive(Debug, Default)]
struct Published {
    set: Option<Arc<TemplateSet>>,
    compile_error: Option<CompileError>,
}

impl HamlTemplateEngine {
    /// Create an engine; no templates are loaded until [`refresh`](Self::refresh)
    ///
    /// # Errors
    ///
    /// Returns [`HamlError::InvalidDelimiters`] if `settings.delimiters` is
    /// malformed. This must abort startup.
    pub fn new(settings: HamlSettings, funcs: TemplateFuncs) -> Result<Self, HamlError> {
        let delimiters = DelimiterPair::resolve(settings.delimiters.as_deref())?;
        let watcher = ExtensionWatcher::from_settings(&settings);

        Ok(Self {
            settings: Arc::new(settings),
            delimiters,
            funcs: Arc::new(funcs),
            watcher: Arc::new(watcher),
            converter: Arc::new(HamlConverter::new()),
            scope: Arc::new(default_scope()),
            published: Arc::new(RwLock::new(Published::default())),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Replace the entry filter
    #[must_use]
    pub fn with_watcher(mut self, watcher: impl TemplateWatcher + 'static) -> Self {
        self.watcher = Arc::new(watcher);
        self
    }

    /// Replace the source converter
    #[must_use]
    pub fn with_converter(mut self, converter: impl MarkupConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    /// Rebuild the template set from disk
    ///
    /// Refreshes are serialized. On success the new set is published even if
    /// some templates failed; the first of those failures is returned and
    /// also kept as [`compile_error`](Self::compile_error). Clean runs clear
    /// the previous compile error.
    ///
    /// # Errors
    ///
    /// Returns [`HamlError::Environment`] if the template environment cannot
    /// be built. The previously published set is kept.
    pub fn refresh(&self) -> Result<Option<CompileError>, HamlError> {
        let _guard = self.refresh_lock.lock();

        let opts = DiscoveryOptions {
            roots: &self.settings.paths,
            views_path: &self.settings.views_path,
            delimiters: self.delimiters.as_ref(),
            funcs: &self.funcs,
            watcher: self.watcher.as_ref(),
            converter: self.converter.as_ref(),
            scope: &self.scope,
        };

        let report = match discover(&opts) {
            Ok(report) => report,
            Err(err) => {
                self.published.write().compile_error = Some(CompileError::environment(&err));
                return Err(err);
            }
        };

        let count = report.set.as_ref().map_or(0, TemplateSet::len);

        // Atomic swap
        *self.published.write() = Published {
            set: report.set.map(Arc::new),
            compile_error: report.error.clone(),
        };

        tracing::info!(
            files = report.files,
            templates = count,
            errors = report.error.is_some(),
            "HAML templates refreshed"
        );
        Ok(report.error)
    }

    /// Currently published template set
    #[must_use]
    pub fn template_set(&self) -> Option<Arc<TemplateSet>> {
        self.published.read().set.clone()
    }

    /// Published set and compile error, read together
    ///
    /// Both values always come from the same refresh.
    #[must_use]
    pub fn snapshot(&self) -> (Option<Arc<TemplateSet>>, Option<CompileError>) {
        let published = self.published.read();
        (published.set.clone(), published.compile_error.clone())
    }

    /// Error from the most recent refresh, if any
    #[must_use]
    pub fn compile_error(&self) -> Option<CompileError> {
        self.published.read().compile_error.clone()
    }

    /// Render a template by name, falling back to its lower-cased form
    ///
    /// # Errors
    ///
    /// Returns error if no set is published, the template is not found, or
    /// rendering fails.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, minijinja::Error> {
        let set = self.template_set().ok_or_else(|| {
            minijinja::Error::new(ErrorKind::TemplateNotFound, "no templates loaded")
        })?;

        if set.contains(name) {
            return set.render(name, ctx);
        }
        set.render(&name.to_lowercase(), ctx)
    }

    /// Render a template with a context map
    ///
    /// # Errors
    ///
    /// Returns error if the template is not found or rendering fails.
    pub fn render_with_map(
        &self,
        name: &str,
        ctx: HashMap<&str, Value>,
    ) -> Result<String, minijinja::Error> {
        self.render(name, ctx)
    }

    /// Configured template roots
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.settings.paths
    }

    /// Resolved delimiter override
    #[must_use]
    pub const fn delimiters(&self) -> Option<&DelimiterPair> {
        self.delimiters.as_ref()
    }
}

impl Clone for HamlTemplateEngine {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            delimiters: self.delimiters.clone(),
            funcs: Arc::clone(&self.funcs),
            watcher: Arc::clone(&self.watcher),
            converter: Arc::clone(&self.converter),
            scope: Arc::clone(&self.scope),
            published: Arc::clone(&self.published),
            refresh_lock: Arc::clone(&self.refresh_lock),
        }
    }
}

impl fmt::Debug for HamlTemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HamlTemplateEngine")
            .field("settings", &self.settings)
            .field("delimiters", &self.delimiters)
            .field("templates", &self.published.read().set.as_ref().map(|s| s.len()))
            .finish_non_exhaustive()
    }
}
