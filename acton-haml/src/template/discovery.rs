//! Template discovery
//!
//! Walks every configured root, converts each watchable HAML file once and
//! registers the result under both of its names. A failing template is
//! recorded (first one wins) and the walk carries on; only an unusable
//! environment stops the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::converter::{MarkupConverter, Scope};
use super::delims::{syntax_for_root, DelimiterPair};
use super::names::TemplateNames;
use super::report::ErrorLatch;
use super::set::{ensure_set, RegisterError, TemplateFuncs, TemplateSet, TemplateSource};
use crate::config::HamlSettings;
use crate::error::{CompileError, HamlError};

/// Decides which file system entries take part in discovery
pub trait TemplateWatcher: Send + Sync {
    /// Whether to descend into `path`; `false` prunes the whole subtree
    fn watch_dir(&self, path: &Path) -> bool;

    /// Whether a file with base name `name` is a template
    fn watch_file(&self, name: &str) -> bool;
}

/// Watches files by extension and skips hidden or ignored directories
#[derive(Debug, Clone)]
pub struct ExtensionWatcher {
    extensions: Vec<String>,
    ignored_dirs: Vec<String>,
}

impl ExtensionWatcher {
    /// Create a watcher for the given extensions (without the leading dot)
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            ignored_dirs: Vec::new(),
        }
    }

    /// Skip directories with any of these base names
    #[must_use]
    pub fn with_ignored_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Build the watcher described by template settings
    #[must_use]
    pub fn from_settings(settings: &HamlSettings) -> Self {
        Self::new(settings.watch_extensions.iter().cloned())
            .with_ignored_dirs(settings.ignored_dirs.iter().cloned())
    }
}

impl TemplateWatcher for ExtensionWatcher {
    fn watch_dir(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        !name.starts_with('.') && !self.ignored_dirs.iter().any(|d| d == name)
    }

    fn watch_file(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return false;
        }
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|w| w.eq_ignore_ascii_case(ext)))
    }
}

/// Everything one discovery run needs from the host
pub struct DiscoveryOptions<'a> {
    /// Roots to walk, in priority order
    pub roots: &'a [PathBuf],
    /// Primary view root; the only root the delimiter override applies to
    pub views_path: &'a Path,
    /// Resolved delimiter override
    pub delimiters: Option<&'a DelimiterPair>,
    /// Helpers bound into the environment
    pub funcs: &'a TemplateFuncs,
    /// Entry filter
    pub watcher: &'a dyn TemplateWatcher,
    /// Source to markup conversion
    pub converter: &'a dyn MarkupConverter,
    /// Values available during conversion
    pub scope: &'a Scope,
}

/// Result of a discovery run that was not aborted
#[derive(Debug)]
pub struct DiscoveryReport {
    /// The built set; `None` when no template file was found
    pub set: Option<TemplateSet>,
    /// First compile error of the run
    pub error: Option<CompileError>,
    /// Number of template files read
    pub files: usize,
}

/// Walk all roots and build a template set
///
/// Roots themselves are always walked; the directory predicate applies to
/// everything below them. Entries are visited in file name order so the
/// first-registered name is stable between runs.
///
/// # Errors
///
/// Returns [`HamlError::Environment`] if the template environment cannot be
/// created. Nothing from the run should be published in that case.
pub fn discover(opts: &DiscoveryOptions<'_>) -> Result<DiscoveryReport, HamlError> {
    tracing::trace!(roots = ?opts.roots, "Refreshing templates");

    let mut set: Option<TemplateSet> = None;
    let mut latch = ErrorLatch::Clean;
    let mut files = 0;

    for root in opts.roots {
        let syntax = syntax_for_root(root, opts.views_path, opts.delimiters);

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || opts.watcher.watch_dir(entry.path())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::error!("error walking templates: {err}");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                tracing::warn!(path = %entry.path().display(), "Skipping file with non-UTF-8 name");
                continue;
            };
            if !opts.watcher.watch_file(file_name) {
                continue;
            }
            let Some(names) = TemplateNames::derive(entry.path(), root) else {
                continue;
            };

            let bytes = match fs::read(entry.path()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(path = %entry.path().display(), "Failed reading template file: {err}");
                    continue;
                }
            };
            files += 1;
            let text = String::from_utf8_lossy(&bytes);

            let source = TemplateSource {
                path: entry.path().to_path_buf(),
                root: root.clone(),
                markup: Arc::from(opts.converter.convert(&text, opts.scope)),
            };

            // Both names are attempted even if the first fails to parse
            for key in names.keys() {
                match ensure_set(&mut set, opts.funcs, key, &source, syntax.clone()) {
                    Ok(_) => {}
                    Err(RegisterError::Fatal(err)) => {
                        tracing::error!("Template environment unusable: {err}");
                        return Err(err);
                    }
                    Err(RegisterError::Parse(err)) => {
                        latch.record(CompileError::from_template_error(
                            key,
                            &source.path,
                            &source.markup,
                            &err,
                        ));
                    }
                }
            }
        }
    }

    Ok(DiscoveryReport {
        set,
        error: latch.into_error(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_watcher_files() {
        let watcher = ExtensionWatcher::new(["haml"]);
        assert!(watcher.watch_file("index.haml"));
        assert!(watcher.watch_file("Index.HAML"));
        assert!(!watcher.watch_file("index.html"));
        assert!(!watcher.watch_file(".hidden.haml"));
        assert!(!watcher.watch_file("haml"));
    }

    #[test]
    fn test_extension_watcher_dirs() {
        let watcher = ExtensionWatcher::new(["haml"]).with_ignored_dirs(["node_modules"]);
        assert!(watcher.watch_dir(Path::new("/app/views/users")));
        assert!(!watcher.watch_dir(Path::new("/app/views/.git")));
        assert!(!watcher.watch_dir(Path::new("/app/views/node_modules")));
    }

    #[test]
    fn test_from_settings() {
        let settings = HamlSettings::default();
        let watcher = ExtensionWatcher::from_settings(&settings);
        assert!(watcher.watch_file("a.haml"));
        assert!(!watcher.watch_dir(Path::new("/x/node_modules")));
    }
}
