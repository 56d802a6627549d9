//! Driver ↔ child wire protocol.
//!
//! Driver to child: one argument `<flag>=<url-encoded wire bundle>`.
//! Child to driver: one JSON response envelope on stdout.

use crate::state::SandboxState;
use ms_common::{Error, Failure, FailureKind, Result};
use serde::{Deserialize, Serialize};

/// Response envelope printed by the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Throwed {
        throwed: FailureKind,
        message: String,
        trace: String,
    },
    Result {
        result: serde_json::Value,
    },
}

impl Response {
    pub fn success(result: serde_json::Value) -> Self {
        Response::Result { result }
    }

    pub fn failure(failure: Failure) -> Self {
        Response::Throwed {
            throwed: failure.kind,
            message: failure.message,
            trace: failure.origin,
        }
    }

    /// Result value, or the failure re-raised as a local error.
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self {
            Response::Result { result } => Ok(result),
            Response::Throwed {
                throwed,
                message,
                trace,
            } => Err(Error::from_failure(Failure {
                kind: throwed,
                message,
                origin: trace,
            })),
        }
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse the child's stdout into a response envelope.
pub fn parse_response(stdout: &str) -> Result<Response> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(Error::Protocol("child produced no output".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|e| {
        Error::Protocol(format!(
            "unrecognized response envelope ({e}): {}",
            truncate(trimmed, 200)
        ))
    })
}

/// Encode `state` as the startup argument.
pub fn startup_arg(flag: &str, state: &SandboxState) -> Result<String> {
    let wire = state.to_wire()?;
    Ok(format!("{flag}={}", urlencoding::encode(&wire)))
}

/// Find the startup argument among `args` and decode its state.
///
/// `Ok(None)` means no argument carried the flag.
pub fn find_startup_arg<I, S>(flag: &str, args: I) -> Result<Option<SandboxState>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = format!("{flag}=");
    for arg in args {
        if let Some(payload) = arg.as_ref().strip_prefix(&prefix) {
            let wire = urlencoding::decode(payload)
                .map_err(|e| Error::Protocol(format!("startup argument is not valid UTF-8: {e}")))?;
            return SandboxState::from_wire(&wire).map(Some);
        }
    }
    Ok(None)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let line = Response::success(json!([1, null])).to_json_line().unwrap();
        assert_eq!(line, r#"{"result":[1,null]}"#);
        assert_eq!(
            parse_response(&line).unwrap().into_result().unwrap(),
            json!([1, null])
        );
    }

    #[test]
    fn test_failure_envelope_shape() {
        let failure = Failure {
            kind: FailureKind::Runtime,
            message: "Test exception".to_string(),
            origin: "src/fixtures.rs:10".to_string(),
        };
        let line = Response::failure(failure).to_json_line().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(raw["throwed"], "runtime");
        assert_eq!(raw["trace"], "src/fixtures.rs:10");

        let err = parse_response(&line).unwrap().into_result().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Test exception"), "{msg}");
        assert!(msg.contains("src/fixtures.rs:10"), "{msg}");
    }

    #[test]
    fn test_null_result_is_a_result() {
        let response = parse_response("{\"result\":null}\n").unwrap();
        assert_eq!(response, Response::success(serde_json::Value::Null));
    }

    #[test]
    fn test_bad_output_is_protocol_error() {
        for stdout in ["", "  \n", "not json", "{}", r#"{"throwed":"runtime"}"#] {
            assert!(
                matches!(parse_response(stdout), Err(Error::Protocol(_))),
                "accepted {stdout:?}"
            );
        }
    }

    #[test]
    fn test_startup_arg_round_trip() {
        let mut state = SandboxState::new();
        state.pending = Some(Command::read_const("A", "B"));
        let arg = startup_arg("--instance", &state).unwrap();
        assert!(arg.starts_with("--instance="));
        assert!(!arg.contains(' '));

        let args = vec!["child".to_string(), "--other".to_string(), arg];
        let decoded = find_startup_arg("--instance", &args).unwrap().unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_missing_startup_arg() {
        assert!(find_startup_arg("--instance", ["child", "--verbose"])
            .unwrap()
            .is_none());
    }
}
