//! Error taxonomy shared by every bridge operation.
//!
//! Each failure carries a stable [`ErrorCode`] so the UI (and the CLI exit
//! status) can tell user-correctable input problems apart from policy
//! violations, missing targets and extraction failures.

use crate::model::ErrorInfo;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Stable error codes. Serialized as the `E_*` strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Malformed, relative or traversal-bearing input.
    #[serde(rename = "E_BAD_INPUT")]
    BadInput,
    /// Target resolves outside every whitelisted directory.
    #[serde(rename = "E_FORBIDDEN")]
    Forbidden,
    /// File suffix is not in the executable allowlist.
    #[serde(rename = "E_UNSUPPORTED_TYPE")]
    UnsupportedType,
    /// Target no longer exists (or has the wrong file type).
    #[serde(rename = "E_NOT_FOUND")]
    NotFound,
    #[serde(rename = "E_LAUNCH_FAILED")]
    LaunchFailed,
    /// The user dismissed the elevation prompt.
    #[serde(rename = "E_ELEVATION_DECLINED")]
    ElevationDeclined,
    #[serde(rename = "E_ELEVATION_FAILED")]
    ElevationFailed,
    /// Corrupt or hostile archive.
    #[serde(rename = "E_INVALID_ARCHIVE")]
    InvalidArchive,
    #[serde(rename = "E_IO")]
    Io,
    /// Metadata or settings store failure.
    #[serde(rename = "E_STORE")]
    Store,
    /// A required setting (such as a software whitelist root) is missing.
    #[serde(rename = "E_NOT_CONFIGURED")]
    NotConfigured,
    #[serde(rename = "E_PROTOCOL")]
    Protocol,
    #[serde(rename = "E_PROTOCOL_VERSION_MISMATCH")]
    ProtocolVersionMismatch,
    #[serde(rename = "E_CLI_INVALID_ARG")]
    CliInvalidArg,
}

impl ErrorCode {
    pub const ALL: [Self; 14] = [
        Self::BadInput,
        Self::Forbidden,
        Self::UnsupportedType,
        Self::NotFound,
        Self::LaunchFailed,
        Self::ElevationDeclined,
        Self::ElevationFailed,
        Self::InvalidArchive,
        Self::Io,
        Self::Store,
        Self::NotConfigured,
        Self::Protocol,
        Self::ProtocolVersionMismatch,
        Self::CliInvalidArg,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "E_BAD_INPUT",
            Self::Forbidden => "E_FORBIDDEN",
            Self::UnsupportedType => "E_UNSUPPORTED_TYPE",
            Self::NotFound => "E_NOT_FOUND",
            Self::LaunchFailed => "E_LAUNCH_FAILED",
            Self::ElevationDeclined => "E_ELEVATION_DECLINED",
            Self::ElevationFailed => "E_ELEVATION_FAILED",
            Self::InvalidArchive => "E_INVALID_ARCHIVE",
            Self::Io => "E_IO",
            Self::Store => "E_STORE",
            Self::NotConfigured => "E_NOT_CONFIGURED",
            Self::Protocol => "E_PROTOCOL",
            Self::ProtocolVersionMismatch => "E_PROTOCOL_VERSION_MISMATCH",
            Self::CliInvalidArg => "E_CLI_INVALID_ARG",
        }
    }

    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code)
    }

    /// Process exit status used by the CLI.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::BadInput => 2,
            Self::Forbidden => 3,
            Self::UnsupportedType => 4,
            Self::NotFound => 5,
            Self::LaunchFailed => 6,
            Self::ElevationDeclined => 7,
            Self::ElevationFailed => 8,
            Self::InvalidArchive => 9,
            Self::Io => 10,
            Self::Store => 11,
            Self::NotConfigured => 12,
            Self::Protocol => 13,
            Self::ProtocolVersionMismatch => 14,
            Self::CliInvalidArg => 15,
        }
    }

    /// Policy violations must not leak anything about the whitelist.
    #[must_use]
    pub fn is_policy_violation(self) -> bool {
        matches!(self, Self::Forbidden | Self::UnsupportedType)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl Diagnostic for BridgeError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self {
            code,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::BadInput, message, context)
    }

    pub fn forbidden(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Forbidden, message, context)
    }

    pub fn unsupported_type(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::UnsupportedType, message, context)
    }

    pub fn not_found(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::NotFound, message, context)
    }

    pub fn launch_failed(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::LaunchFailed, message, err)
    }

    pub fn elevation_declined(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::ElevationDeclined, message, context)
    }

    pub fn elevation_failed(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::ElevationFailed, message, err)
    }

    pub fn invalid_archive(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::InvalidArchive, message, context)
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::Io, message, err)
    }

    pub fn store(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::Store, message, err)
    }

    pub fn not_configured(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::NotConfigured, message, context)
    }

    pub fn protocol(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Protocol, message, context)
    }

    pub fn protocol_version_mismatch(provided: u32, supported: u32) -> Self {
        Self::new(
            ErrorCode::ProtocolVersionMismatch,
            "unsupported protocol version",
            serde_json::json!({
                "provided_version": provided,
                "supported_version": supported
            }),
        )
    }

    pub fn cli_invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CliInvalidArg, message, None)
    }

    fn with_source(code: ErrorCode, message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            code,
            message,
            serde_json::json!({ "source": err.to_string() }),
        )
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    #[must_use]
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code,
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_strings() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("E_NOPE"), None);
    }

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let mut seen = std::collections::BTreeSet::new();
        for code in ErrorCode::ALL {
            assert!(code.exit_code() > 1);
            assert!(seen.insert(code.exit_code()));
        }
    }

    #[test]
    fn serde_uses_stable_strings() {
        let value = serde_json::to_value(ErrorCode::ElevationDeclined).unwrap();
        assert_eq!(value, serde_json::json!("E_ELEVATION_DECLINED"));
    }

    #[test]
    fn io_errors_keep_source_text() {
        let err = BridgeError::io("failed to write", "disk full");
        assert_eq!(err.code, ErrorCode::Io);
        assert_eq!(err.context.unwrap()["source"], "disk full");
    }
}
