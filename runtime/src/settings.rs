//! Settings for building an orchestration instance.
//!
//! # Features
//!
//! - TOML files or environment variables
//! - Validation with clear error messages
//! - Defaults matching the built-in bindings
//!
//! # Example
//!
//! ```
//! use reqhook_runtime::settings::HooksSettings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = HooksSettings::from_toml_str(
//!     r#"
//!     base_url = "https://api.example.com"
//!     timeout_ms = 5000
//!
//!     [cache]
//!     max_entries = 100
//!
//!     [defaults]
//!     use_cache = false
//!     "#,
//! )?;
//!
//! assert_eq!(settings.cache.max_entries, 100);
//! let config = settings.into_config()?;
//! # let _ = config;
//! # Ok(())
//! # }
//! ```
//!
//! Environment variables (all optional):
//!
//! | variable | meaning |
//! |---|---|
//! | `REQHOOK_BASE_URL` | base URL of the default transport |
//! | `REQHOOK_TIMEOUT_MS` | transport timeout in milliseconds |
//! | `REQHOOK_CACHE_MAX_ENTRIES` | cache capacity |
//! | `REQHOOK_CACHE_DISABLED` | `true` disables the cache |
//! | `REQHOOK_MANUAL`, `REQHOOK_USE_CACHE`, `REQHOOK_SSR`, `REQHOOK_AUTO_CANCEL` | default options |
//! | `REQHOOK_RENDER_MODE` | `interactive` or `server` |

use crate::error::SettingsError;
use crate::hooks::{HooksConfig, RenderMode};
use crate::transport::ReqwestTransport;
use reqhook_core::cache::DEFAULT_MAX_ENTRIES;
use reqhook_core::{Cache, OptionsOverride};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether responses are cached at all
    pub enabled: bool,
    /// Maximum number of cached responses
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheSettings {
    /// Validate cache settings
    ///
    /// # Errors
    ///
    /// Returns error if the capacity is zero
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.enabled && self.max_entries == 0 {
            return Err(SettingsError::Validation(
                "cache.max_entries must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for one [`RequestHooks`](crate::hooks::RequestHooks) instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksSettings {
    /// Base URL for relative request URLs
    pub base_url: Option<String>,
    /// Transport timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Cache settings
    pub cache: CacheSettings,
    /// Default options
    pub defaults: OptionsOverride,
    /// Render mode
    pub render_mode: RenderMode,
}

impl HooksSettings {
    /// Parse settings from TOML
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or the settings are invalid
    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(toml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load settings from `REQHOOK_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the settings are invalid
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load settings from variables provided by `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the settings are invalid
    pub fn from_vars<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self {
            base_url: lookup("REQHOOK_BASE_URL").filter(|url| !url.is_empty()),
            timeout_ms: parse_var(&lookup, "REQHOOK_TIMEOUT_MS")?,
            ..Self::default()
        };

        if let Some(max_entries) = parse_var(&lookup, "REQHOOK_CACHE_MAX_ENTRIES")? {
            settings.cache.max_entries = max_entries;
        }
        if let Some(disabled) = parse_flag(&lookup, "REQHOOK_CACHE_DISABLED")? {
            settings.cache.enabled = !disabled;
        }

        settings.defaults = OptionsOverride {
            manual: parse_flag(&lookup, "REQHOOK_MANUAL")?,
            use_cache: parse_flag(&lookup, "REQHOOK_USE_CACHE")?,
            ssr: parse_flag(&lookup, "REQHOOK_SSR")?,
            auto_cancel: parse_flag(&lookup, "REQHOOK_AUTO_CANCEL")?,
        };

        if let Some(mode) = lookup("REQHOOK_RENDER_MODE") {
            settings.render_mode = match mode.to_lowercase().as_str() {
                "interactive" | "client" => RenderMode::Interactive,
                "server" | "ssr" => RenderMode::Server,
                _ => {
                    return Err(SettingsError::InvalidEnv {
                        var: "REQHOOK_RENDER_MODE".to_string(),
                        value: mode,
                    });
                }
            };
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate all settings
    ///
    /// # Errors
    ///
    /// Returns error if any setting is invalid
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.timeout_ms == Some(0) {
            return Err(SettingsError::Validation(
                "timeout_ms must be > 0".to_string(),
            ));
        }
        if self.base_url.as_deref().is_some_and(str::is_empty) {
            return Err(SettingsError::Validation(
                "base_url cannot be empty".to_string(),
            ));
        }
        self.cache.validate()
    }

    /// Build the configuration these settings describe
    ///
    /// # Errors
    ///
    /// Returns error if the settings are invalid
    pub fn into_config(self) -> Result<HooksConfig, SettingsError> {
        self.validate()?;

        let mut transport = ReqwestTransport::new();
        if let Some(base_url) = self.base_url {
            transport = transport.with_base_url(base_url);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            transport = transport.with_timeout(Duration::from_millis(timeout_ms));
        }

        let cache = if self.cache.enabled {
            Cache::lru(self.cache.max_entries)
        } else {
            Cache::Disabled
        };

        Ok(HooksConfig::new()
            .with_transport(transport)
            .with_cache(cache)
            .with_default_options(self.defaults)
            .with_render_mode(self.render_mode))
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .map(|value| {
            value.trim().parse().map_err(|_| SettingsError::InvalidEnv {
                var: name.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_flag<F>(lookup: &F, name: &str) -> Result<Option<bool>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SettingsError::InvalidEnv {
                var: name.to_string(),
                value,
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = HooksSettings::default();
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.max_entries, 500);
        assert_eq!(settings.defaults, OptionsOverride::none());
        assert_eq!(settings.render_mode, RenderMode::Interactive);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let settings = HooksSettings::from_toml_str(
            r#"
            base_url = "http://localhost:8080"
            render_mode = "server"

            [cache]
            enabled = false

            [defaults]
            manual = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(settings.render_mode, RenderMode::Server);
        assert!(!settings.cache.enabled);
        assert_eq!(settings.defaults.manual, Some(true));
        assert_eq!(settings.defaults.use_cache, None);
    }

    #[test]
    fn test_from_toml_rejects_zero_capacity() {
        let error = HooksSettings::from_toml_str("[cache]\nmax_entries = 0").unwrap_err();
        assert!(matches!(error, SettingsError::Validation(_)));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let error = HooksSettings::from_toml_str("timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(error, SettingsError::Parse(_)));
    }

    #[test]
    fn test_from_vars() {
        let settings = HooksSettings::from_vars(vars(&[
            ("REQHOOK_BASE_URL", "https://api.example.com"),
            ("REQHOOK_TIMEOUT_MS", "2500"),
            ("REQHOOK_CACHE_MAX_ENTRIES", "32"),
            ("REQHOOK_USE_CACHE", "false"),
            ("REQHOOK_AUTO_CANCEL", "0"),
            ("REQHOOK_RENDER_MODE", "SSR"),
        ]))
        .unwrap();

        assert_eq!(settings.timeout_ms, Some(2500));
        assert_eq!(settings.cache.max_entries, 32);
        assert_eq!(settings.defaults.use_cache, Some(false));
        assert_eq!(settings.defaults.auto_cancel, Some(false));
        assert_eq!(settings.defaults.manual, None);
        assert_eq!(settings.render_mode, RenderMode::Server);
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        let error = HooksSettings::from_vars(vars(&[("REQHOOK_SSR", "maybe")])).unwrap_err();
        assert!(matches!(error, SettingsError::InvalidEnv { ref var, .. } if var == "REQHOOK_SSR"));

        let error = HooksSettings::from_vars(vars(&[("REQHOOK_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(error, SettingsError::Validation(_)));

        let error = HooksSettings::from_vars(vars(&[("REQHOOK_RENDER_MODE", "batch")])).unwrap_err();
        assert!(matches!(error, SettingsError::InvalidEnv { .. }));
    }

    #[test]
    fn test_disabled_cache_allows_zero_capacity() {
        let settings = HooksSettings::from_vars(vars(&[
            ("REQHOOK_CACHE_DISABLED", "true"),
            ("REQHOOK_CACHE_MAX_ENTRIES", "0"),
        ]))
        .unwrap();
        assert!(!settings.cache.enabled);
    }

    #[test]
    fn test_missing_file() {
        let error = HooksSettings::from_file("/nonexistent/reqhook.toml").unwrap_err();
        assert!(matches!(error, SettingsError::Read { .. }));
    }
}
