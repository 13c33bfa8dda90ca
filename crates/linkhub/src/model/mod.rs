pub mod driver;
pub mod ids;
pub mod operation;
pub mod record;
pub mod whitelist;

pub use driver::Operation;
pub use ids::RecordId;
pub use operation::*;
pub use record::*;
pub use whitelist::*;

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};

/// Serializable projection of a [`crate::BridgeError`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<serde_json::Value>,
}

/// Current driver protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Allowed executable suffixes, lowercase with the leading dot.
pub const ALLOWED_EXECUTABLE_SUFFIXES: &[&str] = &[".exe", ".bat", ".cmd", ".lnk"];

/// Archive suffixes the installer recognises. Only `.zip` can be unpacked.
pub const KNOWN_ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".7z", ".rar"];

pub const SUPPORTED_ARCHIVE_SUFFIX: &str = ".zip";
