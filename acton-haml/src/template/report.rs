//! First-error-wins compile error reporting

use crate::error::CompileError;

/// One-shot latch holding the first compile error of a discovery run
///
/// Every error passed to [`record`](Self::record) is logged; only the first
/// is kept for the developer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorLatch {
    /// No error recorded yet
    #[default]
    Clean,
    /// The retained first error
    Errored(CompileError),
}

impl ErrorLatch {
    /// Log `err` and retain it if the latch is still clean
    ///
    /// Returns `true` if `err` became the retained error.
    pub fn record(&mut self, err: CompileError) -> bool {
        tracing::error!(
            template = %err.name,
            path = %err.path.display(),
            line = ?err.line,
            "Template compilation error: {}",
            err.description
        );

        match self {
            Self::Clean => {
                *self = Self::Errored(err);
                true
            }
            Self::Errored(_) => false,
        }
    }

    /// Whether an error has been recorded
    #[must_use]
    pub const fn is_errored(&self) -> bool {
        matches!(self, Self::Errored(_))
    }

    /// The retained error, if any
    #[must_use]
    pub const fn error(&self) -> Option<&CompileError> {
        match self {
            Self::Clean => None,
            Self::Errored(err) => Some(err),
        }
    }

    /// Consume the latch, returning the retained error
    #[must_use]
    pub fn into_error(self) -> Option<CompileError> {
        match self {
            Self::Clean => None,
            Self::Errored(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::COMPILE_ERROR_TITLE;
    use std::path::PathBuf;

    fn error(name: &str) -> CompileError {
        CompileError {
            title: COMPILE_ERROR_TITLE.to_string(),
            name: name.to_string(),
            path: PathBuf::from(name),
            description: "bad".to_string(),
            line: Some(1),
            source_lines: vec!["x".to_string()],
        }
    }

    #[test]
    fn test_starts_clean() {
        let latch = ErrorLatch::default();
        assert!(!latch.is_errored());
        assert!(latch.error().is_none());
    }

    #[test]
    fn test_first_error_wins() {
        let mut latch = ErrorLatch::Clean;
        assert!(latch.record(error("a.haml")));
        assert!(!latch.record(error("b.haml")));

        assert!(latch.is_errored());
        assert_eq!(latch.into_error().map(|e| e.name), Some("a.haml".to_string()));
    }
}
