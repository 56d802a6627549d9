//! Class and run identity types.
//!
//! Class names are `::`-separated paths of identifiers. Every name that enters
//! the system goes through [`ClassName::parse`], so two spellings of the same
//! class (`::Db` and `Db`) always land on the same registry entry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope separator inside class names.
pub const SCOPE_SEPARATOR: &str = "::";

/// Check whether `s` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate an identifier, naming `what` in the error.
pub fn validate_identifier(what: &str, s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} must not be empty")));
    }
    if !is_identifier(s) {
        return Err(Error::InvalidArgument(format!(
            "{what} '{s}' is not a valid identifier"
        )));
    }
    Ok(())
}

/// Normalized, fully-qualified class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassName(String);

impl ClassName {
    /// Parse and normalize a class name. One leading `::` is stripped.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.strip_prefix(SCOPE_SEPARATOR).unwrap_or(raw);
        if name.is_empty() {
            return Err(Error::InvalidArgument("class name must not be empty".into()));
        }
        for segment in name.split(SCOPE_SEPARATOR) {
            if !is_identifier(segment) {
                return Err(Error::InvalidArgument(format!(
                    "invalid class name '{raw}': segment '{segment}' is not an identifier"
                )));
            }
        }
        Ok(ClassName(name.to_string()))
    }

    /// Build a class name from a scope path (possibly empty) and a simple name.
    pub fn join(scope: &str, simple_name: &str) -> Result<Self> {
        if scope.is_empty() {
            ClassName::parse(simple_name)
        } else {
            ClassName::parse(&format!("{scope}{SCOPE_SEPARATOR}{simple_name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scope path without the simple name; empty for unscoped classes.
    pub fn scope(&self) -> &str {
        match self.0.rfind(SCOPE_SEPARATOR) {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    pub fn simple_name(&self) -> &str {
        match self.0.rfind(SCOPE_SEPARATOR) {
            Some(idx) => &self.0[idx + SCOPE_SEPARATOR.len()..],
            None => &self.0,
        }
    }

    /// The same class re-homed under `namespace` (`Spy` + `A::B` → `Spy::A::B`).
    pub fn nested_in(&self, namespace: &str) -> Result<Self> {
        ClassName::join(namespace, &self.0)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ClassName {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        ClassName::parse(&raw)
    }
}

impl From<ClassName> for String {
    fn from(name: ClassName) -> Self {
        name.0
    }
}

impl std::str::FromStr for ClassName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ClassName::parse(s)
    }
}

/// Identifier for one sandboxed execution.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
