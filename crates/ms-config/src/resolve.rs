//! Config resolution: explicit path → env → XDG → built-in defaults.
//!
//! After a file (or the defaults) is chosen, environment overrides are
//! applied on top:
//! - `MOCK_SANDBOX_CHILD` replaces `child_program`
//! - `MOCK_SANDBOX_LOG` replaces `log.filter`
//! - `MOCK_SANDBOX_LOG_FORMAT` replaces `log.format` (`text` or `json`)
//! - `MOCK_SANDBOX_FLAG` replaces `startup_flag`
//!
//! The driver sets the last three on every child it spawns, so the child
//! resolves the same logging and startup flag as its parent.

use crate::{ConfigError, LogFormat, SandboxConfig};
use std::path::{Path, PathBuf};

/// Env var naming a config file.
pub const ENV_CONFIG: &str = "MOCK_SANDBOX_CONFIG";
/// Env var overriding the child program.
pub const ENV_CHILD: &str = "MOCK_SANDBOX_CHILD";
/// Env var overriding the log filter.
pub const ENV_LOG: &str = "MOCK_SANDBOX_LOG";
/// Env var overriding the log format.
pub const ENV_LOG_FORMAT: &str = "MOCK_SANDBOX_LOG_FORMAT";
/// Env var overriding the startup flag.
pub const ENV_FLAG: &str = "MOCK_SANDBOX_FLAG";

const CONFIG_DIR: &str = "mock_sandbox";
const CONFIG_FILE: &str = "sandbox.toml";

/// Where the resolved config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Env(PathBuf),
    Xdg(PathBuf),
    Defaults,
}

/// Candidate locations considered during resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub explicit: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub xdg: Option<PathBuf>,
}

impl ConfigPaths {
    /// Gather candidates from the process environment.
    pub fn discover(explicit: Option<&Path>) -> Self {
        ConfigPaths {
            explicit: explicit.map(Path::to_path_buf),
            env: std::env::var_os(ENV_CONFIG).map(PathBuf::from),
            xdg: dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE)),
        }
    }

    /// Pick the first applicable source. Explicit and env paths must exist;
    /// the XDG path is only used when present.
    pub fn select(&self) -> ConfigSource {
        if let Some(path) = &self.explicit {
            return ConfigSource::Explicit(path.clone());
        }
        if let Some(path) = &self.env {
            return ConfigSource::Env(path.clone());
        }
        match &self.xdg {
            Some(path) if path.is_file() => ConfigSource::Xdg(path.clone()),
            _ => ConfigSource::Defaults,
        }
    }
}

/// Resolve the effective configuration from the process environment.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(SandboxConfig, ConfigSource), ConfigError> {
    let paths = ConfigPaths::discover(explicit);
    resolve_with(&paths, |key| std::env::var(key).ok())
}

/// Resolution with an injectable environment lookup.
pub fn resolve_with(
    paths: &ConfigPaths,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(SandboxConfig, ConfigSource), ConfigError> {
    let source = paths.select();
    let mut config = match &source {
        ConfigSource::Explicit(path) | ConfigSource::Env(path) | ConfigSource::Xdg(path) => {
            SandboxConfig::load(path)?
        }
        ConfigSource::Defaults => SandboxConfig::default(),
    };

    if let Some(child) = env(ENV_CHILD).filter(|v| !v.is_empty()) {
        config.child_program = Some(PathBuf::from(child));
    }
    if let Some(filter) = env(ENV_LOG).filter(|v| !v.is_empty()) {
        config.log.filter = filter;
    }
    match env(ENV_LOG_FORMAT).as_deref() {
        Some("json") => config.log.format = LogFormat::Json,
        Some("text") => config.log.format = LogFormat::Text,
        _ => {}
    }
    if let Some(flag) = env(ENV_FLAG).filter(|v| !v.is_empty()) {
        config.startup_flag = flag;
    }

    Ok((config.validated()?, source))
}
