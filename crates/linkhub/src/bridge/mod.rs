//! The bridge facade: one method per UI-facing operation.
//!
//! Every call reads the whitelist and feature toggles fresh from the settings
//! store and passes that snapshot down. Nothing is cached across calls.

use crate::browse;
use crate::config::{keys, read_flag, BridgeConfig, FeatureToggles};
use crate::error::{BridgeError, BridgeResult};
use crate::install::{ArchiveSource, Installer, Upload};
use crate::launcher::{ensure_directory, ensure_launchable, DirectoryRevealer, ProcessLauncher};
use crate::model::{
    normalize_allowed_dirs, parse_allowed_dirs, serialize_allowed_dirs, BrowseResponse, DirKind,
    InstallationResult, Operation, OsActionResponse, RecordId, RecordListing, ScanReport,
    SetupStatus, SoftwareRecord, Whitelist, WhitelistEntry, WorkspaceRecord,
};
use crate::platform::PlatformProcessService;
use crate::policy::{canonicalize_lenient, contains_traversal, sandbox, ResolvedPath};
use crate::scan::Scanner;
use crate::store::{
    Collaborators, DescriptionGenerator, FileSearchIndex, FileSettingsStore, JsonFileCatalog,
    MemorySettingsStore, SearchIndex, SettingsStore,
};
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Bridge {
    config: BridgeConfig,
    settings: Arc<dyn SettingsStore>,
    collaborators: Collaborators,
    platform: Arc<dyn PlatformProcessService>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        settings: Arc<dyn SettingsStore>,
        collaborators: Collaborators,
        platform: Arc<dyn PlatformProcessService>,
    ) -> Self {
        Self {
            config,
            settings,
            collaborators,
            platform,
        }
    }

    /// File-backed stores under `data_dir`, which is created if missing.
    pub fn open(
        data_dir: &Path,
        config: BridgeConfig,
        platform: Arc<dyn PlatformProcessService>,
    ) -> BridgeResult<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|err| BridgeError::io("failed to create data directory", err))?;
        let mut collaborators = Collaborators::in_memory();
        collaborators.catalog = Arc::new(JsonFileCatalog::in_data_dir(data_dir));
        collaborators.index = Arc::new(FileSearchIndex::in_data_dir(data_dir));
        Ok(Self::new(
            config,
            Arc::new(FileSettingsStore::in_data_dir(data_dir)),
            collaborators,
            platform,
        ))
    }

    /// Memory-only stores; used by tests.
    pub fn in_memory(platform: Arc<dyn PlatformProcessService>) -> Self {
        Self::new(
            BridgeConfig::default(),
            Arc::new(MemorySettingsStore::default()),
            Collaborators::in_memory(),
            platform,
        )
    }

    #[must_use]
    pub fn with_describer(mut self, describer: Arc<dyn DescriptionGenerator>) -> Self {
        self.collaborators.describer = describer;
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.collaborators.index = index;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// This request's whitelist. An unparseable stored value denies everything.
    pub fn whitelist(&self) -> BridgeResult<Whitelist> {
        let raw = self.settings.get(keys::ALLOWED_DIRS)?.unwrap_or_default();
        match parse_allowed_dirs(&raw) {
            Ok(entries) => Ok(Whitelist::new(entries)),
            Err(err) => {
                tracing::warn!(error = %err, "stored allowed_dirs is not valid json");
                Ok(Whitelist::default())
            }
        }
    }

    pub fn launch(&self, target_path: &str) -> BridgeResult<OsActionResponse> {
        let raw = target_path.trim();
        let whitelist = self.whitelist()?;
        let resolved = sandbox(raw, &whitelist)?;
        ensure_launchable(&resolved, raw)?;

        let toggles = FeatureToggles::load(self.settings.as_ref())?;
        let launched =
            ProcessLauncher::new(Arc::clone(&self.platform), toggles.elevation_fallback)
                .launch(&resolved)?;
        self.stamp_last_used(&resolved);

        Ok(OsActionResponse {
            success: true,
            message: if launched.elevated {
                "program started with elevated privileges".to_string()
            } else {
                "program started".to_string()
            },
            resolved_path: resolved.to_string(),
            elevated: launched.elevated,
        })
    }

    pub fn open_directory(&self, target_path: &str) -> BridgeResult<OsActionResponse> {
        let raw = target_path.trim();
        let whitelist = self.whitelist()?;
        let resolved = sandbox(raw, &whitelist)?;
        ensure_directory(&resolved, raw)?;

        DirectoryRevealer::new(Arc::clone(&self.platform)).reveal(&resolved)?;
        self.stamp_opened(&resolved);

        Ok(OsActionResponse {
            success: true,
            message: "directory opened".to_string(),
            resolved_path: resolved.to_string(),
            elevated: false,
        })
    }

    pub fn browse_directory(&self, path: Option<&str>) -> BridgeResult<BrowseResponse> {
        browse::browse(path)
    }

    pub fn install(&self, upload: Upload) -> BridgeResult<InstallationResult> {
        let whitelist = self.whitelist()?;
        let toggles = FeatureToggles::load(self.settings.as_ref())?;
        Installer::new(&self.collaborators, &self.config.limits, toggles).install(&whitelist, upload)
    }

    pub fn scan_directories(&self, kind: DirKind) -> BridgeResult<ScanReport> {
        let whitelist = self.whitelist()?;
        let toggles = FeatureToggles::load(self.settings.as_ref())?;
        Ok(Scanner::new(&self.collaborators, &self.config.limits, toggles).scan(&whitelist, kind))
    }

    pub fn list_allowed_dirs(&self) -> BridgeResult<Vec<WhitelistEntry>> {
        Ok(self.whitelist()?.into_entries())
    }

    /// Replace the whitelist. Accepts the current and legacy item forms;
    /// stored paths are canonical.
    pub fn set_allowed_dirs(&self, items: Vec<Value>) -> BridgeResult<Vec<WhitelistEntry>> {
        let entries = normalize_allowed_dirs(items)
            .into_iter()
            .map(canonical_entry)
            .collect::<BridgeResult<Vec<_>>>()?;
        self.store_allowed_dirs(&entries)?;
        tracing::info!(count = entries.len(), "whitelist updated");
        Ok(entries)
    }

    pub fn add_allowed_dir(&self, entry: WhitelistEntry) -> BridgeResult<Vec<WhitelistEntry>> {
        let entry = canonical_entry(entry)?;
        let mut entries = self.list_allowed_dirs()?;
        if !entries.iter().any(|existing| existing.path == entry.path) {
            entries.push(entry);
            self.store_allowed_dirs(&entries)?;
        }
        Ok(entries)
    }

    /// Drop every entry whose path matches `path` as given or canonicalized.
    pub fn remove_allowed_dir(&self, path: &str) -> BridgeResult<bool> {
        let raw = PathBuf::from(path.trim());
        let canonical = canonicalize_lenient(&raw).unwrap_or_else(|_| raw.clone());
        let mut entries = self.list_allowed_dirs()?;
        let before = entries.len();
        entries.retain(|entry| entry.path != raw && entry.path != canonical);
        let removed = entries.len() != before;
        if removed {
            self.store_allowed_dirs(&entries)?;
        }
        Ok(removed)
    }

    pub fn setup_status(&self) -> BridgeResult<SetupStatus> {
        let allowed_dirs = self.list_allowed_dirs()?;
        let description_configured = self.collaborators.describer.is_configured()
            || read_flag(self.settings.as_ref(), keys::DESCRIPTION_CONFIGURED, false)?;
        Ok(SetupStatus {
            needs_setup: allowed_dirs.is_empty() || !description_configured,
            allowed_dirs,
            description_configured,
        })
    }

    pub fn software(&self) -> BridgeResult<Vec<SoftwareRecord>> {
        self.collaborators.catalog.list_software()
    }

    pub fn workspaces(&self) -> BridgeResult<Vec<WorkspaceRecord>> {
        self.collaborators.catalog.list_workspaces()
    }

    pub fn records(&self) -> BridgeResult<RecordListing> {
        Ok(RecordListing {
            software: self.software()?,
            workspaces: self.workspaces()?,
        })
    }

    /// Remove a record (never its files) and drop it from the search index.
    pub fn remove_record(&self, id: RecordId) -> BridgeResult<bool> {
        let removed = self.collaborators.catalog.remove_record(id)?;
        if removed {
            if let Err(err) = self.collaborators.index.remove(&id.to_string()) {
                tracing::warn!(id = %id, error = %err, "search index removal skipped");
            }
        }
        Ok(removed)
    }

    /// Run one driver operation and serialize its result.
    pub fn execute(&self, op: Operation) -> BridgeResult<Value> {
        match op {
            Operation::Launch { target_path } => to_json(&self.launch(&target_path)?),
            Operation::OpenDirectory { target_path } => {
                to_json(&self.open_directory(&target_path)?)
            }
            Operation::BrowseDirectory { path } => {
                to_json(&self.browse_directory(path.as_deref())?)
            }
            Operation::Install {
                filename,
                archive_path,
                archive_base64,
            } => {
                let source = archive_source(archive_path, archive_base64)?;
                to_json(&self.install(Upload { filename, source })?)
            }
            Operation::ScanDirectories { kind } => to_json(&self.scan_directories(kind)?),
            Operation::ListAllowedDirs => to_json(&self.list_allowed_dirs()?),
            Operation::SetAllowedDirs { allowed_dirs } => {
                to_json(&self.set_allowed_dirs(allowed_dirs)?)
            }
            Operation::SetupStatus => to_json(&self.setup_status()?),
            Operation::ListRecords => to_json(&self.records()?),
            Operation::RemoveRecord { id } => Ok(json!({ "removed": self.remove_record(id)? })),
        }
    }

    fn store_allowed_dirs(&self, entries: &[WhitelistEntry]) -> BridgeResult<()> {
        let raw = serialize_allowed_dirs(entries)
            .map_err(|err| BridgeError::store("failed to serialize allowed_dirs", err))?;
        self.settings.set(keys::ALLOWED_DIRS, &raw)
    }

    /// Best effort: a failure here never changes the launch result.
    fn stamp_last_used(&self, resolved: &ResolvedPath) {
        let catalog = &self.collaborators.catalog;
        let outcome = catalog
            .find_software_by_executable(&resolved.to_string())
            .and_then(|record| match record {
                Some(record) => catalog.touch_software_used(record.id),
                None => Ok(()),
            });
        if let Err(err) = outcome {
            tracing::warn!(path = %resolved, error = %err, "failed to record last use");
        }
    }

    fn stamp_opened(&self, resolved: &ResolvedPath) {
        let catalog = &self.collaborators.catalog;
        let outcome = catalog
            .find_workspace_by_directory(&resolved.to_string())
            .and_then(|record| match record {
                Some(record) => catalog.touch_workspace_opened(record.id),
                None => Ok(()),
            });
        if let Err(err) = outcome {
            tracing::warn!(path = %resolved, error = %err, "failed to record last open");
        }
    }
}

/// Whitelist paths must be absolute and traversal-free; they are stored in
/// canonical form.
fn canonical_entry(entry: WhitelistEntry) -> BridgeResult<WhitelistEntry> {
    let raw = entry.path.to_string_lossy().into_owned();
    if contains_traversal(&raw) || !entry.path.is_absolute() {
        return Err(BridgeError::bad_input(
            "allowed directories must be absolute paths without '..'",
            json!({ "path": raw }),
        ));
    }
    let path = canonicalize_lenient(&entry.path)
        .map_err(|err| BridgeError::io(format!("failed to resolve {raw}"), err))?;
    Ok(WhitelistEntry { path, ..entry })
}

fn archive_source(path: Option<String>, base64: Option<String>) -> BridgeResult<ArchiveSource> {
    match (path, base64) {
        (Some(path), None) => {
            let path = path.trim();
            if contains_traversal(path) || !Path::new(path).is_absolute() {
                return Err(BridgeError::bad_input(
                    "archive_path must be an absolute path without '..'",
                    json!({ "archive_path": path }),
                ));
            }
            Ok(ArchiveSource::File(PathBuf::from(path)))
        }
        (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map(ArchiveSource::Bytes)
            .map_err(|err| {
                BridgeError::bad_input(
                    "archive_base64 is not valid base64",
                    json!({ "source": err.to_string() }),
                )
            }),
        _ => Err(BridgeError::bad_input(
            "exactly one of archive_path or archive_base64 is required",
            None,
        )),
    }
}

fn to_json<T: Serialize>(value: &T) -> BridgeResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| BridgeError::protocol("failed to serialize result", json!({ "source": err.to_string() })))
}
