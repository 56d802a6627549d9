//! Failure taxonomy shared by the driver and the sandbox child.
//!
//! A failure is what crosses the process boundary when code inside the
//! sandbox does not produce a result: a kind tag, a message, and the
//! `file:line` where it was raised.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Kind tag carried by a failure.
///
/// Serialized as a plain string. Unknown tags round-trip through
/// [`FailureKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureKind {
    InvalidArgument,
    UnsupportedValue,
    Render,
    Parse,
    Load,
    Lookup,
    TypeError,
    Runtime,
    Panic,
    Protocol,
    /// Host-defined kind.
    Other(String),
}

impl FailureKind {
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::InvalidArgument => "invalid_argument",
            FailureKind::UnsupportedValue => "unsupported_value",
            FailureKind::Render => "render",
            FailureKind::Parse => "parse",
            FailureKind::Load => "load",
            FailureKind::Lookup => "lookup",
            FailureKind::TypeError => "type_error",
            FailureKind::Runtime => "runtime",
            FailureKind::Panic => "panic",
            FailureKind::Protocol => "protocol",
            FailureKind::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "invalid_argument" => FailureKind::InvalidArgument,
            "unsupported_value" => FailureKind::UnsupportedValue,
            "render" => FailureKind::Render,
            "parse" => FailureKind::Parse,
            "load" => FailureKind::Load,
            "lookup" => FailureKind::Lookup,
            "type_error" => FailureKind::TypeError,
            "runtime" => FailureKind::Runtime,
            "panic" => FailureKind::Panic,
            "protocol" => FailureKind::Protocol,
            other => FailureKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FailureKind {
    fn from(tag: String) -> Self {
        FailureKind::from_tag(&tag)
    }
}

impl From<FailureKind> for String {
    fn from(kind: FailureKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A failure raised inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// `file:line` of the raising site.
    pub origin: String,
}

impl Failure {
    /// Create a failure whose origin is the caller's location.
    #[track_caller]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Failure {
            kind,
            message: message.into(),
            origin: origin_of(Location::caller()),
        }
    }

    #[track_caller]
    pub fn runtime(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::Runtime, message)
    }

    #[track_caller]
    pub fn type_error(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::TypeError, message)
    }

    #[track_caller]
    pub fn lookup(message: impl Into<String>) -> Self {
        Failure::new(FailureKind::Lookup, message)
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (at {})", self.kind, self.message, self.origin)
    }
}

impl std::error::Error for Failure {}

impl From<Error> for Failure {
    /// Wrapping happens where `?` converts the error, so that is the origin.
    #[track_caller]
    fn from(err: Error) -> Self {
        match err {
            Error::Sandbox {
                kind,
                message,
                origin,
            } => Failure {
                kind,
                message,
                origin,
            },
            other => Failure::new(other.failure_kind(), other.detail()),
        }
    }
}

/// Render a source location as `file:line`.
pub fn origin_of(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}
