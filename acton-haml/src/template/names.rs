//! Template name derivation
//!
//! A discovered file is registered twice: under its path relative to the root
//! and under the lower-cased form of that path, so lookups are
//! case-insensitive while the canonical name stays available.

use std::path::Path;

/// Separator used in every template name
pub const NAME_SEPARATOR: char = '/';

/// The two registry keys for one discovered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNames {
    /// Relative path in its original case
    pub name: String,
    /// Lower-cased variant of `name`
    pub lower: String,
}

impl TemplateNames {
    /// Derive names for `path` found under `root`
    ///
    /// Only the platform's alternate separator is rewritten; nothing is
    /// trimmed or case-folded in the canonical name. Returns `None` when
    /// `path` is not below `root`.
    #[must_use]
    pub fn derive(path: &Path, root: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }

        let name = canonicalize(&relative.to_string_lossy());
        let lower = name.to_lowercase();
        Some(Self { name, lower })
    }

    /// Both keys, canonical first
    #[must_use]
    pub fn keys(&self) -> [&str; 2] {
        [&self.name, &self.lower]
    }
}

#[cfg(windows)]
fn canonicalize(name: &str) -> String {
    name.replace('\\', "/")
}

#[cfg(not(windows))]
fn canonicalize(name: &str) -> String {
    name.to_string()
}
