//! Result payloads of the bridge operations.

use crate::model::{DirKind, RecordId, SoftwareRecord, WhitelistEntry, WorkspaceRecord};
use serde::{Deserialize, Serialize};

/// Result of `Launch` and `OpenDirectory`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsActionResponse {
    pub success: bool,
    pub message: String,
    pub resolved_path: String,
    /// True when the target was started through the elevation fallback.
    #[serde(default)]
    pub elevated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseItem {
    pub name: String,
    pub path: String,
}

/// Result of `BrowseDirectory`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseResponse {
    /// Empty when listing drive roots.
    pub current: String,
    pub parent: Option<String>,
    pub items: Vec<BrowseItem>,
}

/// An optional pipeline step that was skipped instead of failing the install.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Degradation {
    DescriptionSkipped { reason: String },
    IndexSkipped { reason: String },
}

/// Result of `Install`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub success: bool,
    pub id: RecordId,
    pub name: String,
    pub executable_path: String,
    pub install_directory: String,
    pub description: String,
    /// At most `limits.max_reported_candidates` entries.
    pub candidate_executables: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub degraded: Vec<Degradation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Imported,
    Skipped,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDetail {
    pub name: String,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional steps skipped while importing this item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

/// Result of `ScanDirectories`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub kind: DirKind,
    pub imported: u32,
    pub skipped: u32,
    pub failed: u32,
    pub details: Vec<ScanDetail>,
    pub message: String,
}

/// First-run status shown by the setup wizard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStatus {
    pub needs_setup: bool,
    pub allowed_dirs: Vec<WhitelistEntry>,
    pub description_configured: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordListing {
    pub software: Vec<SoftwareRecord>,
    pub workspaces: Vec<WorkspaceRecord>,
}
