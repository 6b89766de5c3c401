//! Error types and error handling
//!
//! Two kinds of failure leave the template pipeline:
//!
//! - [`HamlError`] for failures that stop startup or a whole discovery run
//!   (bad delimiter configuration, an unusable template environment)
//! - [`CompileError`] for a single template that failed to compile. These are
//!   data rather than `Err` values: a run records the first one and keeps going.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Framework error type for the HAML template pipeline
#[derive(Debug, Error)]
pub enum HamlError {
    /// The `template.delimiters` setting could not be split into a left/right pair
    #[error("invalid template.delimiters {value:?}: {reason}")]
    InvalidDelimiters {
        /// Raw configured value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// The template environment itself could not be built
    ///
    /// Raised when a registered helper function is rejected. Nothing from the
    /// run that hit it may be published.
    #[error("template environment error: {0}")]
    Environment(String),
}

impl HamlError {
    /// Whether this error must abort process startup
    #[must_use]
    pub const fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::InvalidDelimiters { .. })
    }
}

/// Title used for per-template compilation failures
pub const COMPILE_ERROR_TITLE: &str = "Template Compilation Error";

/// Title used when the template environment could not be created
pub const ENVIRONMENT_ERROR_TITLE: &str = "Template Environment Error";

/// Structured, line-addressable template error for developer display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    /// Short heading for an error page
    pub title: String,
    /// Template name the error was raised for
    pub name: String,
    /// File the template was read from
    pub path: PathBuf,
    /// Human-readable description from the parser
    pub description: String,
    /// 1-based line of the failure, when the parser knows it
    pub line: Option<usize>,
    /// Converted template markup split into lines
    pub source_lines: Vec<String>,
}

/// One numbered line of a [`CompileError`] context snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLine {
    /// 1-based line number
    pub number: usize,
    /// Line text
    pub text: String,
    /// Whether this is the line the error points at
    pub is_error: bool,
}

impl CompileError {
    /// Build a compile error from a minijinja parse failure
    #[must_use]
    pub fn from_template_error(
        name: &str,
        path: &Path,
        markup: &str,
        err: &minijinja::Error,
    ) -> Self {
        let description = err
            .detail()
            .map_or_else(|| err.kind().to_string(), ToString::to_string);

        Self {
            title: COMPILE_ERROR_TITLE.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
            description,
            line: err.line(),
            source_lines: markup.split('\n').map(ToString::to_string).collect(),
        }
    }

    /// Build the error record reported when the environment is unusable
    #[must_use]
    pub fn environment(err: &HamlError) -> Self {
        Self {
            title: ENVIRONMENT_ERROR_TITLE.to_string(),
            name: String::new(),
            path: PathBuf::new(),
            description: err.to_string(),
            line: None,
            source_lines: Vec::new(),
        }
    }

    /// Lines surrounding the failing line, `radius` lines on each side
    ///
    /// Returns an empty list when the line is unknown or out of range.
    #[must_use]
    pub fn context(&self, radius: usize) -> Vec<SourceLine> {
        let Some(line) = self.line else {
            return Vec::new();
        };
        if line == 0 || line > self.source_lines.len() {
            return Vec::new();
        }

        let first = line.saturating_sub(radius).max(1);
        let last = (line + radius).min(self.source_lines.len());

        (first..=last)
            .map(|number| SourceLine {
                number,
                text: self.source_lines[number - 1].clone(),
                is_error: number == line,
            })
            .collect()
    }

    /// JSON form for developer tooling
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{} (in {} around line {line}): {}",
                self.title, self.name, self.description
            ),
            None if self.name.is_empty() => write!(f, "{}: {}", self.title, self.description),
            None => write!(f, "{} (in {}): {}", self.title, self.name, self.description),
        }
    }
}

impl std::error::Error for CompileError {}
