//! Compiled template set
//!
//! A [`TemplateSet`] is one minijinja environment plus the named units
//! registered into it. The environment is created once per discovery run,
//! when the first template is registered, and every later template is added
//! to that same environment. Delimiters are applied before each parse, so
//! units from different roots can use different syntax within one set.

use minijinja::syntax::SyntaxConfig;
use minijinja::value::{FunctionArgs, FunctionResult};
use minijinja::{AutoEscape, Environment, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::HamlError;

/// Words the expression grammar reserves, unusable as helper names
const RESERVED_NAMES: &[&str] = &[
    "true", "false", "none", "True", "False", "None", "and", "or", "not", "in", "is", "if",
    "else",
];

/// Helper functions bound into every template environment
///
/// # Example
///
/// ```rust
/// use acton_haml::template::TemplateFuncs;
///
/// let funcs = TemplateFuncs::new()
///     .with("shout", |s: String| s.to_uppercase())
///     .with("year", || 2025);
/// assert_eq!(funcs.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateFuncs {
    funcs: BTreeMap<String, Value>,
}

impl TemplateFuncs {
    /// Create an empty helper map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper under `name`, replacing any previous one
    pub fn insert<F, Rv, Args>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: minijinja::functions::Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.funcs.insert(name.into(), Value::from_function(f));
        self
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with<F, Rv, Args>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: minijinja::functions::Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.insert(name, f);
        self
    }

    /// Number of registered helpers
    #[must_use]
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Whether no helpers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Helper names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<(), HamlError> {
        for name in self.funcs.keys() {
            if !is_identifier(name) {
                return Err(HamlError::Environment(format!(
                    "helper name {name:?} is not a valid identifier"
                )));
            }
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(HamlError::Environment(format!(
                    "helper name {name:?} is a reserved word"
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Converted markup for one discovered file
///
/// Shared by both registrations of the file so it is converted only once.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// File the markup came from
    pub path: PathBuf,
    /// Template root the file was found under
    pub root: PathBuf,
    /// Converted markup
    pub markup: Arc<str>,
}

/// Metadata kept for every compiled unit
#[derive(Debug, Clone, Serialize)]
pub struct TemplateUnit {
    /// File the unit was read from
    pub path: PathBuf,
    /// Template root the file was found under
    pub root: PathBuf,
    /// Markup the unit was compiled from
    pub markup: String,
}

/// Outcome of a registration attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The unit was parsed and added
    Added,
    /// The name was already taken; nothing changed
    Skipped,
}

/// Why [`ensure_set`] could not register a template
#[derive(Debug)]
pub enum RegisterError {
    /// The environment could not be created; the run must stop
    Fatal(HamlError),
    /// This template failed to parse; the set is still usable
    Parse(minijinja::Error),
}

/// Compiled, queryable collection of named templates
#[derive(Debug)]
pub struct TemplateSet {
    env: Environment<'static>,
    units: BTreeMap<String, TemplateUnit>,
    claimed: BTreeSet<String>,
    anchor: Option<String>,
}

impl TemplateSet {
    /// Create an empty environment with `funcs` bound as globals
    ///
    /// # Errors
    ///
    /// Returns [`HamlError::Environment`] if a helper name is rejected.
    pub fn try_new(funcs: &TemplateFuncs) -> Result<Self, HamlError> {
        funcs.validate()?;

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        for (name, func) in &funcs.funcs {
            env.add_global(name.clone(), func.clone());
        }

        Ok(Self {
            env,
            units: BTreeMap::new(),
            claimed: BTreeSet::new(),
            anchor: None,
        })
    }

    /// Parse `source` and add it under `name`
    ///
    /// The first attempt for a name claims it, whether or not the parse
    /// succeeds; later attempts return [`Registration::Skipped`]. `syntax`
    /// applies to this parse only.
    ///
    /// # Errors
    ///
    /// Returns the minijinja error if the markup does not parse. The set stays
    /// usable for every other name.
    pub fn register(
        &mut self,
        name: &str,
        source: &TemplateSource,
        syntax: SyntaxConfig,
    ) -> Result<Registration, minijinja::Error> {
        if !self.claimed.insert(name.to_string()) {
            return Ok(Registration::Skipped);
        }

        self.env.set_syntax(syntax);
        self.env
            .add_template_owned(name.to_string(), source.markup.to_string())?;

        if self.anchor.is_none() {
            self.anchor = Some(name.to_string());
        }
        self.units.insert(
            name.to_string(),
            TemplateUnit {
                path: source.path.clone(),
                root: source.root.clone(),
                markup: source.markup.to_string(),
            },
        );

        tracing::debug!(template = name, path = %source.path.display(), "Registered template");
        Ok(Registration::Added)
    }

    /// Name of the first unit added to this set
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Whether a compiled unit exists under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Whether `name` was attempted this run, compiled or not
    #[must_use]
    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Names of all compiled units, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Number of compiled units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the set holds no compiled units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Metadata for the unit registered under `name`
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&TemplateUnit> {
        self.units.get(name)
    }

    /// Underlying minijinja environment
    #[must_use]
    pub const fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Render the unit registered under `name`
    ///
    /// # Errors
    ///
    /// Returns error if the template is not found or rendering fails.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Render with a context map
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
}

/// Register into the set in `slot`, creating it on first use
///
/// # Errors
///
/// Returns [`RegisterError::Fatal`] if the environment cannot be created and
/// [`RegisterError::Parse`] if this template fails to parse.
pub fn ensure_set(
    slot: &mut Option<TemplateSet>,
    funcs: &TemplateFuncs,
    name: &str,
    source: &TemplateSource,
    syntax: SyntaxConfig,
) -> Result<Registration, RegisterError> {
    let set = match slot {
        Some(set) => set,
        None => slot.insert(TemplateSet::try_new(funcs).map_err(RegisterError::Fatal)?),
    };
    set.register(name, source, syntax)
        .map_err(RegisterError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(markup: &str) -> TemplateSource {
        TemplateSource {
            path: PathBuf::from("/views/x.haml"),
            root: PathBuf::from("/views"),
            markup: Arc::from(markup),
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let mut set = TemplateSet::try_new(&TemplateFuncs::new()).unwrap();
        let first = set
            .register("page.haml", &source("first {{ n }}"), SyntaxConfig::default())
            .unwrap();
        let second = set
            .register("page.haml", &source("second {{ n }}"), SyntaxConfig::default())
            .unwrap();

        assert_eq!(first, Registration::Added);
        assert_eq!(second, Registration::Skipped);
        let html = set.render("page.haml", minijinja::context! { n => 1 }).unwrap();
        assert_eq!(html, "first 1");
    }

    #[test]
    fn test_parse_failure_keeps_set_usable() {
        let mut set = TemplateSet::try_new(&TemplateFuncs::new()).unwrap();
        assert!(set
            .register("bad.haml", &source("{% if x %}"), SyntaxConfig::default())
            .is_err());
        set.register("good.haml", &source("ok"), SyntaxConfig::default())
            .unwrap();

        assert!(!set.contains("bad.haml"));
        assert!(set.is_claimed("bad.haml"));
        assert!(set.contains("good.haml"));
        assert!(!set.is_claimed("other.haml"));
        assert_eq!(set.anchor(), Some("good.haml"));
        // A failed name stays claimed
        assert_eq!(
            set.register("bad.haml", &source("fixed"), SyntaxConfig::default())
                .unwrap(),
            Registration::Skipped
        );
    }

    #[test]
    fn test_syntax_is_per_registration() {
        let mut set = TemplateSet::try_new(&TemplateFuncs::new()).unwrap();
        let brackets = SyntaxConfig::builder()
            .variable_delimiters("[[", "]]")
            .build()
            .unwrap();
        set.register("a", &source("[[ v ]]{{ v }}"), brackets).unwrap();
        set.register("b", &source("[[ v ]]{{ v }}"), SyntaxConfig::default())
            .unwrap();

        let ctx = minijinja::context! { v => "x" };
        assert_eq!(set.render("a", &ctx).unwrap(), "x{{ v }}");
        assert_eq!(set.render("b", &ctx).unwrap(), "[[ v ]]x");
    }

    #[test]
    fn test_helpers_are_bound() {
        let funcs = TemplateFuncs::new().with("shout", |s: String| s.to_uppercase());
        let mut set = TemplateSet::try_new(&funcs).unwrap();
        set.register("a", &source("{{ shout(name) }}"), SyntaxConfig::default())
            .unwrap();
        let html = set.render("a", minijinja::context! { name => "hi" }).unwrap();
        assert_eq!(html, "HI");
    }

    #[test]
    fn test_output_is_html_escaped() {
        let mut set = TemplateSet::try_new(&TemplateFuncs::new()).unwrap();
        set.register("a", &source("<p>{{ v }}</p>"), SyntaxConfig::default())
            .unwrap();
        let html = set.render("a", minijinja::context! { v => "<b>" }).unwrap();
        assert_eq!(html, "<p>&lt;b&gt;</p>");
    }

    #[test]
    fn test_invalid_helper_name_is_fatal() {
        let funcs = TemplateFuncs::new().with("bad-name", || 1);
        let err = TemplateSet::try_new(&funcs).unwrap_err();
        assert!(matches!(err, HamlError::Environment(_)));

        let funcs = TemplateFuncs::new().with("none", || 1);
        assert!(TemplateSet::try_new(&funcs).is_err());
    }

    #[test]
    fn test_ensure_set_creates_lazily() {
        let mut slot = None;
        let funcs = TemplateFuncs::new();
        let outcome = ensure_set(&mut slot, &funcs, "a", &source("a"), SyntaxConfig::default());
        assert!(matches!(outcome, Ok(Registration::Added)));
        ensure_set(&mut slot, &funcs, "b", &source("b"), SyntaxConfig::default()).unwrap();

        let set = slot.unwrap();
        assert_eq!(set.anchor(), Some("a"));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_ensure_set_fatal_leaves_slot_empty() {
        let mut slot = None;
        let funcs = TemplateFuncs::new().with("9lives", || 9);
        let outcome = ensure_set(&mut slot, &funcs, "a", &source("a"), SyntaxConfig::default());
        assert!(matches!(outcome, Err(RegisterError::Fatal(_))));
        assert!(slot.is_none());
    }
}
