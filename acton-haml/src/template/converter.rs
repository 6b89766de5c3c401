//! HAML to template markup conversion
//!
//! The discovery run only needs "source in, markup out". Conversion failures
//! are not reported through the run: a converter that produces unusable
//! markup is caught later when minijinja parses it. Callers that want the
//! transformer's own diagnostics use [`HamlConverter::try_convert`].

use minijinja::Value;

pub use super::haml::{HamlSyntaxError, Scope};

/// Scope key identifying the source format of converted markup
pub const LANG_KEY: &str = "lang";

/// Value stored under [`LANG_KEY`] for HAML sources
pub const LANG_HAML: &str = "HAML";

/// Turns view source text into markup the template set can parse
///
/// Implementations must be deterministic: the same source and scope always
/// produce the same markup.
pub trait MarkupConverter: Send + Sync {
    /// Convert `source` with `scope` available during conversion
    fn convert(&self, source: &str, scope: &Scope) -> String;
}

/// Default converter backed by the built-in HAML transformer
#[derive(Debug, Clone, Copy, Default)]
pub struct HamlConverter;

impl HamlConverter {
    /// Create a new HAML converter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Convert and surface transformer errors instead of degrading
    ///
    /// # Errors
    ///
    /// Returns [`HamlSyntaxError`] if the source is not valid HAML.
    pub fn try_convert(&self, source: &str, scope: &Scope) -> Result<String, HamlSyntaxError> {
        super::haml::render(source, scope)
    }
}

impl MarkupConverter for HamlConverter {
    fn convert(&self, source: &str, scope: &Scope) -> String {
        self.try_convert(source, scope).unwrap_or_else(|err| {
            tracing::warn!(line = err.line, "HAML conversion failed: {}", err.message);
            String::new()
        })
    }
}

/// Scope every discovery run converts with
#[must_use]
pub fn default_scope() -> Scope {
    let mut scope = Scope::new();
    scope.insert(LANG_KEY.to_string(), Value::from(LANG_HAML));
    scope
}
