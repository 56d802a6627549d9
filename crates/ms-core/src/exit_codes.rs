//! Exit codes of a sandbox child host.
//!
//! The driver reads the response envelope first; exit codes only matter
//! when stdout is empty or unparseable, where they go into the protocol
//! error message.

/// Exit codes for the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Result envelope emitted
    Ok = 0,

    /// Failure envelope emitted
    FailureEmitted = 1,

    /// Startup argument missing or undecodable
    ProtocolError = 2,

    /// Could not produce any envelope
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Ok)
    }

    /// Whether the child failed before or outside the computation itself.
    pub fn is_error(self) -> bool {
        (self as i32) >= 2
    }

    /// Describe a raw exit code, for diagnostics.
    pub fn describe(code: i32) -> &'static str {
        match code {
            0 => "result emitted",
            1 => "failure emitted",
            2 => "protocol error",
            99 => "internal error",
            _ => "unknown exit code",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Ok.as_i32(), 0);
        assert_eq!(ExitCode::FailureEmitted.as_i32(), 1);
        assert_eq!(ExitCode::ProtocolError.as_i32(), 2);
        assert_eq!(ExitCode::InternalError.as_i32(), 99);
    }

    #[test]
    fn test_success_and_error_classes() {
        assert!(ExitCode::Ok.is_success());
        assert!(!ExitCode::FailureEmitted.is_success());
        assert!(!ExitCode::FailureEmitted.is_error());
        assert!(ExitCode::ProtocolError.is_error());
        assert_eq!(ExitCode::describe(2), "protocol error");
    }
}
