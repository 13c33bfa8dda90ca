use crate::model::RecordId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A portable program known to the metadata store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareRecord {
    pub id: RecordId,
    pub name: String,
    /// Main executable; empty when none was found and the user must pick one.
    pub executable_path: String,
    pub install_directory: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub last_used_at_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    #[default]
    Active,
    Archived,
    Completed,
}

/// A project directory known to the metadata store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: RecordId,
    pub name: String,
    pub directory_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkspaceStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub last_opened_at_ms: Option<u64>,
}

/// Values the core supplies when creating a software record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSoftware {
    pub name: String,
    pub executable_path: String,
    pub install_directory: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewWorkspace {
    pub name: String,
    pub directory_path: String,
    pub description: Option<String>,
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

impl SoftwareRecord {
    #[must_use]
    pub fn create(new: NewSoftware) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            name: new.name,
            executable_path: new.executable_path,
            install_directory: new.install_directory,
            description: new.description,
            tags: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
            last_used_at_ms: None,
        }
    }
}

impl WorkspaceRecord {
    #[must_use]
    pub fn create(new: NewWorkspace) -> Self {
        let now = now_ms();
        Self {
            id: RecordId::new(),
            name: new.name,
            directory_path: new.directory_path,
            description: new.description,
            status: WorkspaceStatus::Active,
            created_at_ms: now,
            updated_at_ms: now,
            last_opened_at_ms: None,
        }
    }
}
