//! Semantic validation of a [`SandboxConfig`].

use crate::SandboxConfig;
use ms_common::id::{is_identifier, SCOPE_SEPARATOR};
use std::fmt;

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every field, returning all problems found.
pub fn validate_config(config: &SandboxConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let flag = &config.startup_flag;
    if !flag.starts_with("--") || flag.len() < 3 {
        errors.push(ValidationError::new(
            "startup_flag",
            format!("'{flag}' must start with '--' and name a flag"),
        ));
    } else if flag.contains('=') || flag.contains(char::is_whitespace) {
        errors.push(ValidationError::new(
            "startup_flag",
            format!("'{flag}' must not contain '=' or whitespace"),
        ));
    }

    let ext = &config.source_extension;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(ValidationError::new(
            "source_extension",
            format!("'{ext}' must be a non-empty alphanumeric extension without a dot"),
        ));
    }

    let ns = &config.spy_namespace;
    if ns.is_empty() || !ns.split(SCOPE_SEPARATOR).all(is_identifier) {
        errors.push(ValidationError::new(
            "spy_namespace",
            format!("'{ns}' must be a '::'-separated path of identifiers"),
        ));
    }

    if let Some(program) = &config.child_program {
        if program.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "child_program",
                "must not be empty when set",
            ));
        }
    }

    for key in config.child_env.keys() {
        if key.is_empty() || key.contains('=') {
            errors.push(ValidationError::new(
                "child_env",
                format!("invalid environment variable name '{key}'"),
            ));
        }
    }

    errors
}
