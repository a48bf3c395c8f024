//! # Dispatch Configuration
//!
//! Loaded from a YAML file (typically `config/config.yaml`) and then
//! overridden by `DYND_*` environment variables. Every field has a default,
//! so an empty file, or no file at all, yields a working configuration.
//!
//! ```yaml
//! prefix: dynamic
//! handler_suffix: Controller
//! namespace: App.Controllers
//! stripped_extension: .jpg
//! strict_types: false
//! action_timeout_ms: 5000
//! http:
//!   addr: 0.0.0.0:8080
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DYND_PREFIX` | `prefix` |
//! | `DYND_HANDLER_SUFFIX` | `handler_suffix` |
//! | `DYND_NAMESPACE` | `namespace` |
//! | `DYND_STRIPPED_EXTENSION` | `stripped_extension` (empty disables) |
//! | `DYND_STRICT_TYPES` | `strict_types` |
//! | `DYND_ACTION_TIMEOUT_MS` | `action_timeout_ms` (`0` disables) |
//! | `DYND_ADDR` | `http.addr` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::PathDecoder;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Settings for path decoding, type resolution and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// First path segment claimed by the dispatch stage (`/dynamic/...`)
    pub prefix: String,
    /// Role suffix appended to the handler segment
    pub handler_suffix: String,
    /// Namespace qualifying handler names in the registry
    pub namespace: String,
    /// Extension stripped from the trailing argument
    pub stripped_extension: Option<String>,
    /// Fail instead of falling through when the handler type is unknown
    pub strict_types: bool,
    /// Upper bound on a single action, in milliseconds
    pub action_timeout_ms: Option<u64>,
    pub http: HttpConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: "dynamic".to_string(),
            handler_suffix: "Controller".to_string(),
            namespace: "App.Controllers".to_string(),
            stripped_extension: Some(".jpg".to_string()),
            strict_types: false,
            action_timeout_ms: None,
            http: HttpConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Read and parse a YAML file. Environment overrides are not applied.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// File (if given) plus environment overrides.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `DYND_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a boolean or number does not parse.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DYND_PREFIX") {
            self.prefix = v;
        }
        if let Some(v) = lookup("DYND_HANDLER_SUFFIX") {
            self.handler_suffix = v;
        }
        if let Some(v) = lookup("DYND_NAMESPACE") {
            self.namespace = v;
        }
        if let Some(v) = lookup("DYND_STRIPPED_EXTENSION") {
            self.stripped_extension = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("DYND_STRICT_TYPES") {
            self.strict_types = parse_bool("DYND_STRICT_TYPES", &v)?;
        }
        if let Some(v) = lookup("DYND_ACTION_TIMEOUT_MS") {
            let ms: u64 = v.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "DYND_ACTION_TIMEOUT_MS",
                value: v.clone(),
            })?;
            self.action_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(v) = lookup("DYND_ADDR") {
            self.http.addr = v;
        }
        Ok(self)
    }

    /// Path decoder matching these settings.
    #[must_use]
    pub fn path_decoder(&self) -> PathDecoder {
        PathDecoder::new(&self.handler_suffix, self.stripped_extension.as_deref())
    }

    /// `/prefix/`, the path prefix the dispatch stage claims.
    #[must_use]
    pub fn route_prefix(&self) -> String {
        format!("/{}/", self.prefix.trim_matches('/'))
    }

    #[must_use]
    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = DispatchConfig::default();
        assert_eq!(config.route_prefix(), "/dynamic/");
        assert_eq!(config.handler_suffix, "Controller");
        assert_eq!(config.stripped_extension.as_deref(), Some(".jpg"));
        assert_eq!(config.action_timeout(), None);
        assert_eq!(config.http.addr, "0.0.0.0:8080");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = DispatchConfig::from_yaml_str("namespace: Shop.Handlers\nhttp:\n  addr: 127.0.0.1:9000\n").unwrap();
        assert_eq!(config.namespace, "Shop.Handlers");
        assert_eq!(config.prefix, "dynamic");
        assert_eq!(config.http.addr, "127.0.0.1:9000");
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(DispatchConfig::from_yaml_str("  \n").unwrap(), DispatchConfig::default());
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = DispatchConfig::from_yaml_str("strict_types: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix: rpc\naction_timeout_ms: 250").unwrap();
        let config = DispatchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.route_prefix(), "/rpc/");
        assert_eq!(config.action_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn file_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict_types: [").unwrap();
        match DispatchConfig::from_file(file.path()).unwrap_err() {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected Parse, got {other:?}"),
        }

        let blank = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            DispatchConfig::from_file(blank.path()).unwrap(),
            DispatchConfig::default()
        );
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = DispatchConfig::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let config = DispatchConfig::default()
            .with_env_overrides(env(&[
                ("DYND_STRICT_TYPES", "yes"),
                ("DYND_STRIPPED_EXTENSION", ""),
                ("DYND_ACTION_TIMEOUT_MS", "0"),
                ("DYND_ADDR", "127.0.0.1:1"),
            ]))
            .unwrap();
        assert!(config.strict_types);
        assert_eq!(config.stripped_extension, None);
        assert_eq!(config.action_timeout(), None);
        assert_eq!(config.http.addr, "127.0.0.1:1");
    }

    #[test]
    fn env_override_rejects_garbage() {
        let err = DispatchConfig::default()
            .with_env_overrides(env(&[("DYND_STRICT_TYPES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "DYND_STRICT_TYPES", .. }));
    }

    #[test]
    fn decoder_follows_config() {
        let config = DispatchConfig {
            handler_suffix: "Handler".into(),
            stripped_extension: None,
            ..DispatchConfig::default()
        };
        let req = config.path_decoder().decode("/dynamic/echo/say/a.jpg").unwrap();
        assert_eq!(req.handler_name, "EchoHandler");
        assert_eq!(req.argument, "a.jpg");
    }
}
