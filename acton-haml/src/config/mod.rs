//! Configuration management for acton-haml
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `ACTON_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/acton-haml/{service}/config.toml` (user config, XDG)
//! 4. `/etc/acton-haml/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [templates]
//! paths = ["./app/views", "./modules/admin/views"]
//! views_path = "./app/views"
//! delimiters = "[[ ]]"
//! watch_extensions = ["haml"]
//! ignored_dirs = ["node_modules"]
//! ```
//!
//! Environment variable example: `ACTON_TEMPLATES__DELIMITERS="[[ ]]"`

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HAML template settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HamlSettings {
    /// Template roots, walked in order
    pub paths: Vec<PathBuf>,

    /// Primary view root; the delimiter override only applies here
    pub views_path: PathBuf,

    /// Optional delimiter override: two tokens separated by a single space
    pub delimiters: Option<String>,

    /// Template file extensions to watch
    pub watch_extensions: Vec<String>,

    /// Directory names never descended into
    pub ignored_dirs: Vec<String>,
}

impl Default for HamlSettings {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("./app/views")],
            views_path: PathBuf::from("./app/views"),
            delimiters: None,
            watch_extensions: vec!["haml".to_string()],
            ignored_dirs: vec!["node_modules".to_string()],
        }
    }
}

impl HamlSettings {
    /// Settings for a single root that is also the primary view root
    #[must_use]
    pub fn for_views(views_path: impl Into<PathBuf>) -> Self {
        let views_path = views_path.into();
        Self {
            paths: vec![views_path.clone()],
            views_path,
            ..Self::default()
        }
    }

    /// Append another template root
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Set the delimiter override
    #[must_use]
    pub fn with_delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.delimiters = Some(delimiters.into());
        self
    }
}

/// Complete acton-haml configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ActonHamlConfig {
    /// Template settings
    #[serde(default)]
    pub templates: HamlSettings,
}

impl ActonHamlConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config
        let system_config = PathBuf::from("/etc/acton-haml")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("ACTON_").split("__").lowercase(true));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields the defaults (plus environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values of the
    /// wrong type.
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACTON_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("acton-haml")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = HamlSettings::default();
        assert_eq!(settings.paths, vec![PathBuf::from("./app/views")]);
        assert_eq!(settings.views_path, PathBuf::from("./app/views"));
        assert!(settings.delimiters.is_none());
        assert_eq!(settings.watch_extensions, vec!["haml"]);
    }

    #[test]
    fn test_builders() {
        let settings = HamlSettings::for_views("/srv/views")
            .with_path("/srv/admin")
            .with_delimiters("[[ ]]");
        assert_eq!(
            settings.paths,
            vec![PathBuf::from("/srv/views"), PathBuf::from("/srv/admin")]
        );
        assert_eq!(settings.delimiters.as_deref(), Some("[[ ]]"));
    }

    #[test]
    fn test_recommended_path() {
        let path = ActonHamlConfig::recommended_path("test-app");
        let path = path.to_string_lossy();
        assert!(path.contains("test-app"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[templates]\nviews_path = \"/srv/views\"\ndelimiters = \"<% %>\"\nwatch_extensions = [\"haml\", \"hml\"]"
        )
        .unwrap();

        let config = ActonHamlConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.templates.views_path, PathBuf::from("/srv/views"));
        assert_eq!(config.templates.delimiters.as_deref(), Some("<% %>"));
        assert_eq!(config.templates.watch_extensions, vec!["haml", "hml"]);
        // Untouched keys keep their defaults
        assert_eq!(config.templates.ignored_dirs, vec!["node_modules"]);
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let config = ActonHamlConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.templates.paths, HamlSettings::default().paths);
    }
}
