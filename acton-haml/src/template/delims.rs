//! Project-wide template delimiter override
//!
//! The `template.delimiters` setting holds two tokens separated by a single
//! space, e.g. `"[[ ]]"`. They replace minijinja's `{{ }}` variable
//! delimiters for templates under the primary view root. Block and comment
//! delimiters are never changed.

use minijinja::syntax::SyntaxConfig;

use crate::error::HamlError;

/// Left/right markers around template expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterPair {
    left: String,
    right: String,
}

impl DelimiterPair {
    /// Create a pair after checking it builds a usable syntax
    ///
    /// # Errors
    ///
    /// Returns [`HamlError::InvalidDelimiters`] if either side is empty or the
    /// pair clashes with the block/comment delimiters.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Result<Self, HamlError> {
        let pair = Self {
            left: left.into(),
            right: right.into(),
        };
        if pair.left.is_empty() || pair.right.is_empty() {
            return Err(pair.invalid("delimiters must not be empty"));
        }
        pair.syntax()
            .map_err(|e| pair.invalid(&e.to_string()))?;
        Ok(pair)
    }

    /// Parse an optional `template.delimiters` value
    ///
    /// An absent or blank value means "no override".
    ///
    /// # Errors
    ///
    /// Returns [`HamlError::InvalidDelimiters`] if a non-blank value does not
    /// split into exactly two tokens around a single space. Callers treat this
    /// as fatal for startup.
    pub fn resolve(raw: Option<&str>) -> Result<Option<Self>, HamlError> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(None);
        };

        let tokens: Vec<&str> = raw.split(' ').collect();
        match tokens.as_slice() {
            [left, right] if !left.is_empty() && !right.is_empty() => {
                Self::new(*left, *right).map(Some)
            }
            _ => Err(HamlError::InvalidDelimiters {
                value: raw.to_string(),
                reason: "expected two delimiters separated by a single space".to_string(),
            }),
        }
    }

    /// Left delimiter
    #[must_use]
    pub fn left(&self) -> &str {
        &self.left
    }

    /// Right delimiter
    #[must_use]
    pub fn right(&self) -> &str {
        &self.right
    }

    /// minijinja syntax using this pair for variables
    ///
    /// # Errors
    ///
    /// Returns the minijinja error if the delimiters clash.
    pub fn syntax(&self) -> Result<SyntaxConfig, minijinja::Error> {
        SyntaxConfig::builder()
            .variable_delimiters(self.left.clone(), self.right.clone())
            .build()
    }

    fn invalid(&self, reason: &str) -> HamlError {
        HamlError::InvalidDelimiters {
            value: format!("{} {}", self.left, self.right),
            reason: reason.to_string(),
        }
    }
}

/// Syntax for a template discovered under `root`
///
/// The override only applies under the primary view root; every other root
/// gets minijinja's defaults.
#[must_use]
pub fn syntax_for_root(
    root: &std::path::Path,
    views_path: &std::path::Path,
    delims: Option<&DelimiterPair>,
) -> SyntaxConfig {
    match delims {
        Some(pair) if root == views_path => pair.syntax().unwrap_or_default(),
        _ => SyntaxConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_resolve_absent_or_blank() {
        assert_eq!(DelimiterPair::resolve(None).unwrap(), None);
        assert_eq!(DelimiterPair::resolve(Some("")).unwrap(), None);
        assert_eq!(DelimiterPair::resolve(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_resolve_pair() {
        let pair = DelimiterPair::resolve(Some("[[ ]]")).unwrap().unwrap();
        assert_eq!(pair.left(), "[[");
        assert_eq!(pair.right(), "]]");
    }

    #[test]
    fn test_resolve_single_token_is_fatal() {
        let err = DelimiterPair::resolve(Some("{{")).unwrap_err();
        assert!(matches!(err, HamlError::InvalidDelimiters { .. }));
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn test_resolve_rejects_extra_tokens() {
        assert!(DelimiterPair::resolve(Some("[[ ]] ((")).is_err());
        // Two spaces produce an empty middle token
        assert!(DelimiterPair::resolve(Some("[[  ]]")).is_err());
    }

    #[test]
    fn test_rejects_clash_with_block_delimiters() {
        assert!(DelimiterPair::resolve(Some("{% %}")).is_err());
    }

    #[test]
    fn test_syntax_only_for_views_root() {
        let pair = DelimiterPair::new("[[", "]]").unwrap();
        let views = Path::new("/app/views");

        let mut env = minijinja::Environment::new();
        env.set_syntax(syntax_for_root(views, views, Some(&pair)));
        env.add_template_owned("a", "[[ name ]]".to_string()).unwrap();

        env.set_syntax(syntax_for_root(Path::new("/modules/views"), views, Some(&pair)));
        env.add_template_owned("b", "{{ name }}".to_string()).unwrap();

        let ctx = minijinja::context! { name => "x" };
        assert_eq!(env.get_template("a").unwrap().render(&ctx).unwrap(), "x");
        assert_eq!(env.get_template("b").unwrap().render(&ctx).unwrap(), "x");
    }
}
