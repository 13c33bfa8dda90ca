use crate::model::{DirKind, ErrorInfo, RecordId};
use serde::{Deserialize, Serialize};

/// Driver request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverRequest {
    /// Protocol version for request/response compatibility.
    pub protocol_version: u32,
    /// Client-provided request identifier echoed in the response.
    pub request_id: String,
    /// Operation to execute.
    pub op: Operation,
}

/// Bridge operation carried by a driver request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    Launch {
        target_path: String,
    },
    OpenDirectory {
        target_path: String,
    },
    BrowseDirectory {
        #[serde(default)]
        path: Option<String>,
    },
    /// Exactly one of `archive_path` / `archive_base64` must be set.
    Install {
        filename: String,
        #[serde(default)]
        archive_path: Option<String>,
        #[serde(default)]
        archive_base64: Option<String>,
    },
    ScanDirectories {
        kind: DirKind,
    },
    ListAllowedDirs,
    SetAllowedDirs {
        allowed_dirs: Vec<serde_json::Value>,
    },
    SetupStatus,
    ListRecords,
    RemoveRecord {
        id: RecordId,
    },
}

impl Operation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch",
            Self::OpenDirectory { .. } => "open_directory",
            Self::BrowseDirectory { .. } => "browse_directory",
            Self::Install { .. } => "install",
            Self::ScanDirectories { .. } => "scan_directories",
            Self::ListAllowedDirs => "list_allowed_dirs",
            Self::SetAllowedDirs { .. } => "set_allowed_dirs",
            Self::SetupStatus => "setup_status",
            Self::ListRecords => "list_records",
            Self::RemoveRecord { .. } => "remove_record",
        }
    }
}

/// Driver response status.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverResponseStatus {
    /// Operation executed successfully.
    Ok,
    /// Operation failed.
    Error,
}

/// Driver response envelope. One per request line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverResponse {
    pub protocol_version: u32,
    /// Request identifier echoed from the request, or `"unknown"`.
    pub request_id: String,
    pub status: DriverResponseStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}
