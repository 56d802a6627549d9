//! Mock Sandbox configuration loading and validation.
//!
//! This crate provides:
//! - The typed [`SandboxConfig`] read from `sandbox.toml`
//! - Config resolution (explicit path → env → XDG → defaults)
//! - Semantic validation of the resolved config

pub mod resolve;
pub mod validate;

pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use validate::{validate_config, ValidationError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Default startup flag the child scans its arguments for.
pub const DEFAULT_STARTUP_FLAG: &str = "--instance";

/// Default extension of declaration source files.
pub const DEFAULT_SOURCE_EXTENSION: &str = "cls";

/// Default namespace spy classes are generated under.
pub const DEFAULT_SPY_NAMESPACE: &str = "Spy";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings shared by driver and child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` env-filter directive, e.g. `ms_core=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Executable hosting the child runtime. Required by `execute`.
    pub child_program: Option<PathBuf>,

    /// Flag prefix of the single startup argument (`<flag>=<payload>`).
    pub startup_flag: String,

    /// Extension (without dot) autoload files must carry.
    pub source_extension: String,

    /// Namespace used by `spy_class` when none is given.
    pub spy_namespace: String,

    pub log: LogConfig,

    /// Extra environment variables set on the child process.
    pub child_env: BTreeMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            child_program: None,
            startup_flag: DEFAULT_STARTUP_FLAG.to_string(),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            spy_namespace: DEFAULT_SPY_NAMESPACE.to_string(),
            log: LogConfig::default(),
            child_env: BTreeMap::new(),
        }
    }
}

impl SandboxConfig {
    /// Parse a config from TOML text. `origin` is only used in errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: SandboxConfig = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validated()
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        SandboxConfig::from_toml_str(&text, path)
    }

    /// Validate, returning the config unchanged on success.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = validate_config(&self);
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Environment the driver sets on a spawned child: the configured
    /// `child_env` entries followed by the logging and startup-flag
    /// overrides read back by [`resolve_config`].
    pub fn child_environment(&self) -> Vec<(String, String)> {
        let format = match self.log.format {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        };
        let mut vars: Vec<(String, String)> = self
            .child_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.push((resolve::ENV_LOG.to_string(), self.log.filter.clone()));
        vars.push((resolve::ENV_LOG_FORMAT.to_string(), format.to_string()));
        vars.push((resolve::ENV_FLAG.to_string(), self.startup_flag.clone()));
        vars
    }

    /// Builder-style override of the child program.
    pub fn with_child_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.child_program = Some(program.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SandboxConfig::default();
        assert!(validate_config(&config).is_empty());
        assert_eq!(config.startup_flag, "--instance");
        assert_eq!(config.spy_namespace, "Spy");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = SandboxConfig::from_toml_str(
            r#"
            spy_namespace = "Probe"

            [log]
            filter = "ms_core=debug"
            format = "json"

            [child_env]
            APP_ENV = "test"
            "#,
            Path::new("inline.toml"),
        )
        .unwrap();
        assert_eq!(config.spy_namespace, "Probe");
        assert_eq!(config.startup_flag, DEFAULT_STARTUP_FLAG);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.child_env.get("APP_ENV").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let err = SandboxConfig::from_toml_str("startup_flag = ", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_semantic_errors_collected() {
        let err = SandboxConfig::from_toml_str(
            r#"
            startup_flag = "instance"
            spy_namespace = "1bad"
            "#,
            Path::new("x.toml"),
        )
        .unwrap_err();
        match err {
            ConfigError::Invalid(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sandbox.toml");
        std::fs::write(&path, "source_extension = \"decl\"\n").unwrap();
        let config = SandboxConfig::load(&path).unwrap();
        assert_eq!(config.source_extension, "decl");
    }
}
