//! Error types for Mock Sandbox.

use crate::failure::{Failure, FailureKind};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Mock Sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Mock Sandbox.
#[derive(Error, Debug)]
pub enum Error {
    // Registration errors (10-19)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid autoload file '{}': {reason}", path.display())]
    InvalidAutoload { path: PathBuf, reason: String },

    #[error("unsupported value for {target}: {kind} values are not allowed")]
    UnsupportedValue { target: String, kind: &'static str },

    // Rendering errors (20-29)
    #[error("cannot render {field} of class '{class}': {reason}")]
    Render {
        class: String,
        field: String,
        reason: String,
    },

    #[error("declaration source error at line {line}: {message}")]
    Parse { line: usize, message: String },

    // Lookup and load errors (30-39)
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("load failed: {0}")]
    Load(String),

    // Failures re-raised from the child process (40-49)
    #[error("{kind} raised in sandbox: {message} (thrown at {origin})")]
    Sandbox {
        kind: FailureKind,
        message: String,
        origin: String,
    },

    // Protocol errors (50-59)
    #[error("sandbox protocol error: {0}")]
    Protocol(String),

    #[error("failed to spawn sandbox child '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 10,
            Error::InvalidAutoload { .. } => 11,
            Error::UnsupportedValue { .. } => 12,
            Error::Render { .. } => 20,
            Error::Parse { .. } => 21,
            Error::Lookup(_) => 30,
            Error::Load(_) => 31,
            Error::Sandbox { .. } => 40,
            Error::Protocol(_) => 50,
            Error::Spawn { .. } => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// The failure kind this error travels as when it crosses the process
    /// boundary.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::InvalidArgument(_) | Error::InvalidAutoload { .. } => {
                FailureKind::InvalidArgument
            }
            Error::UnsupportedValue { .. } => FailureKind::UnsupportedValue,
            Error::Render { .. } => FailureKind::Render,
            Error::Parse { .. } => FailureKind::Parse,
            Error::Lookup(_) => FailureKind::Lookup,
            Error::Load(_) => FailureKind::Load,
            Error::Sandbox { kind, .. } => kind.clone(),
            Error::Protocol(_) | Error::Spawn { .. } | Error::Json(_) => FailureKind::Protocol,
            Error::Io(_) => FailureKind::Runtime,
        }
    }

    /// Message without the category prefix that the failure kind already
    /// carries.
    pub fn detail(&self) -> String {
        match self {
            Error::InvalidArgument(message)
            | Error::Lookup(message)
            | Error::Load(message)
            | Error::Protocol(message) => message.clone(),
            Error::Sandbox { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Re-raise a failure reported by the child as a local error.
    ///
    /// Kinds with a local counterpart map onto it; everything else becomes
    /// [`Error::Sandbox`]. The origin is appended to the message either way.
    pub fn from_failure(failure: Failure) -> Self {
        let Failure {
            kind,
            message,
            origin,
        } = failure;
        match kind {
            FailureKind::InvalidArgument => {
                Error::InvalidArgument(format!("{message} (thrown at {origin})"))
            }
            FailureKind::Lookup => Error::Lookup(format!("{message} (thrown at {origin})")),
            FailureKind::Protocol => Error::Protocol(format!("{message} (thrown at {origin})")),
            kind => Error::Sandbox {
                kind,
                message,
                origin,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: FailureKind) -> Failure {
        Failure {
            kind,
            message: "boom".to_string(),
            origin: "src/lib.rs:7".to_string(),
        }
    }

    #[test]
    fn test_lookup_failure_maps_to_lookup() {
        let err = Error::from_failure(failure(FailureKind::Lookup));
        assert!(matches!(err, Error::Lookup(_)));
        assert_eq!(err.failure_kind(), FailureKind::Lookup);
        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("src/lib.rs:7"));
    }

    #[test]
    fn test_unknown_kind_stays_sandbox_failure() {
        let err = Error::from_failure(failure(FailureKind::Other("DomainError".into())));
        assert_eq!(err.code(), 40);
        assert_eq!(err.failure_kind(), FailureKind::Other("DomainError".into()));
        assert!(err.to_string().starts_with("DomainError raised in sandbox: boom"));
    }

    #[test]
    fn test_detail_drops_category_prefix() {
        assert_eq!(Error::Lookup("no mock".into()).detail(), "no mock");
        assert_eq!(Error::Load("dup".into()).detail(), "dup");
        let parse = Error::Parse {
            line: 3,
            message: "x".into(),
        };
        assert_eq!(parse.detail(), parse.to_string());
    }

    #[test]
    fn test_codes_are_grouped() {
        assert_eq!(Error::InvalidArgument("x".into()).code(), 10);
        assert_eq!(Error::Protocol("x".into()).code(), 50);
        assert_eq!(
            Error::Parse {
                line: 1,
                message: "x".into()
            }
            .code(),
            21
        );
    }
}
