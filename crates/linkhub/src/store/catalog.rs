use crate::error::{BridgeError, BridgeResult};
use crate::model::{
    now_ms, NewSoftware, NewWorkspace, RecordId, SoftwareRecord, WorkspaceRecord,
};
use crate::store::{poisoned, read_json_or_default, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const CATALOG_FILE: &str = "catalog.json";

/// Persistence for software and workspace records.
///
/// The `find_*` helpers default to a linear scan over the `list_*` methods.
pub trait MetadataStore: Send + Sync {
    fn create_software(&self, new: NewSoftware) -> BridgeResult<SoftwareRecord>;
    fn list_software(&self) -> BridgeResult<Vec<SoftwareRecord>>;
    fn touch_software_used(&self, id: RecordId) -> BridgeResult<()>;

    fn create_workspace(&self, new: NewWorkspace) -> BridgeResult<WorkspaceRecord>;
    fn list_workspaces(&self) -> BridgeResult<Vec<WorkspaceRecord>>;
    fn touch_workspace_opened(&self, id: RecordId) -> BridgeResult<()>;

    /// Remove a software or workspace record. Returns false if no record had `id`.
    fn remove_record(&self, id: RecordId) -> BridgeResult<bool>;

    fn get_software(&self, id: RecordId) -> BridgeResult<Option<SoftwareRecord>> {
        Ok(self.list_software()?.into_iter().find(|record| record.id == id))
    }

    fn find_software_by_executable(&self, path: &str) -> BridgeResult<Option<SoftwareRecord>> {
        Ok(self
            .list_software()?
            .into_iter()
            .find(|record| !record.executable_path.is_empty() && record.executable_path == path))
    }

    fn find_software_by_name(&self, name: &str) -> BridgeResult<Option<SoftwareRecord>> {
        Ok(self.list_software()?.into_iter().find(|record| record.name == name))
    }

    fn find_workspace_by_directory(&self, path: &str) -> BridgeResult<Option<WorkspaceRecord>> {
        Ok(self
            .list_workspaces()?
            .into_iter()
            .find(|record| record.directory_path == path))
    }

    fn find_workspace_by_name(&self, name: &str) -> BridgeResult<Option<WorkspaceRecord>> {
        Ok(self.list_workspaces()?.into_iter().find(|record| record.name == name))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    software: Vec<SoftwareRecord>,
    #[serde(default)]
    workspaces: Vec<WorkspaceRecord>,
}

impl CatalogData {
    fn touch_software(&mut self, id: RecordId) -> BridgeResult<()> {
        let record = self
            .software
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| missing_record(id))?;
        let now = now_ms();
        record.last_used_at_ms = Some(now);
        record.updated_at_ms = now;
        Ok(())
    }

    fn touch_workspace(&mut self, id: RecordId) -> BridgeResult<()> {
        let record = self
            .workspaces
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| missing_record(id))?;
        let now = now_ms();
        record.last_opened_at_ms = Some(now);
        record.updated_at_ms = now;
        Ok(())
    }

    fn remove(&mut self, id: RecordId) -> bool {
        let before = self.software.len() + self.workspaces.len();
        self.software.retain(|record| record.id != id);
        self.workspaces.retain(|record| record.id != id);
        before != self.software.len() + self.workspaces.len()
    }
}

fn missing_record(id: RecordId) -> BridgeError {
    BridgeError::not_found(
        "record not found",
        serde_json::json!({ "id": id.to_string() }),
    )
}

/// In-process catalog, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: Mutex<CatalogData>,
}

impl MemoryCatalog {
    fn with_data<T>(&self, f: impl FnOnce(&mut CatalogData) -> BridgeResult<T>) -> BridgeResult<T> {
        let mut data = self.data.lock().map_err(poisoned)?;
        f(&mut data)
    }
}

impl MetadataStore for MemoryCatalog {
    fn create_software(&self, new: NewSoftware) -> BridgeResult<SoftwareRecord> {
        self.with_data(|data| {
            let record = SoftwareRecord::create(new);
            data.software.push(record.clone());
            Ok(record)
        })
    }

    fn list_software(&self) -> BridgeResult<Vec<SoftwareRecord>> {
        self.with_data(|data| Ok(data.software.clone()))
    }

    fn touch_software_used(&self, id: RecordId) -> BridgeResult<()> {
        self.with_data(|data| data.touch_software(id))
    }

    fn create_workspace(&self, new: NewWorkspace) -> BridgeResult<WorkspaceRecord> {
        self.with_data(|data| {
            let record = WorkspaceRecord::create(new);
            data.workspaces.push(record.clone());
            Ok(record)
        })
    }

    fn list_workspaces(&self) -> BridgeResult<Vec<WorkspaceRecord>> {
        self.with_data(|data| Ok(data.workspaces.clone()))
    }

    fn touch_workspace_opened(&self, id: RecordId) -> BridgeResult<()> {
        self.with_data(|data| data.touch_workspace(id))
    }

    fn remove_record(&self, id: RecordId) -> BridgeResult<bool> {
        self.with_data(|data| Ok(data.remove(id)))
    }
}

/// Catalog persisted as `catalog.json`.
///
/// Mutations hold the lock across read-modify-write and replace the file
/// atomically.
#[derive(Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CATALOG_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> BridgeResult<CatalogData> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        read_json_or_default(&self.path)
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut CatalogData) -> BridgeResult<T>) -> BridgeResult<T> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut data: CatalogData = read_json_or_default(&self.path)?;
        let out = f(&mut data)?;
        write_json_atomic(&self.path, &data)?;
        Ok(out)
    }
}

impl MetadataStore for JsonFileCatalog {
    fn create_software(&self, new: NewSoftware) -> BridgeResult<SoftwareRecord> {
        self.mutate(|data| {
            let record = SoftwareRecord::create(new);
            data.software.push(record.clone());
            Ok(record)
        })
    }

    fn list_software(&self) -> BridgeResult<Vec<SoftwareRecord>> {
        Ok(self.read()?.software)
    }

    fn touch_software_used(&self, id: RecordId) -> BridgeResult<()> {
        self.mutate(|data| data.touch_software(id))
    }

    fn create_workspace(&self, new: NewWorkspace) -> BridgeResult<WorkspaceRecord> {
        self.mutate(|data| {
            let record = WorkspaceRecord::create(new);
            data.workspaces.push(record.clone());
            Ok(record)
        })
    }

    fn list_workspaces(&self) -> BridgeResult<Vec<WorkspaceRecord>> {
        Ok(self.read()?.workspaces)
    }

    fn touch_workspace_opened(&self, id: RecordId) -> BridgeResult<()> {
        self.mutate(|data| data.touch_workspace(id))
    }

    fn remove_record(&self, id: RecordId) -> BridgeResult<bool> {
        self.mutate(|data| Ok(data.remove(id)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn software(name: &str, exe: &str) -> NewSoftware {
        NewSoftware {
            name: name.to_string(),
            executable_path: exe.to_string(),
            install_directory: "/apps".to_string(),
            description: None,
        }
    }

    #[test]
    fn file_catalog_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = JsonFileCatalog::in_data_dir(dir.path());
        let created = catalog.create_software(software("Foo", "/apps/Foo/foo.exe")).unwrap();
        catalog
            .create_workspace(NewWorkspace {
                name: "thesis".to_string(),
                directory_path: "/work/thesis".to_string(),
                description: None,
            })
            .unwrap();

        let reopened = JsonFileCatalog::in_data_dir(dir.path());
        let found = reopened
            .find_software_by_executable("/apps/Foo/foo.exe")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(reopened.find_workspace_by_name("thesis").unwrap().is_some());

        reopened.touch_software_used(created.id).unwrap();
        assert!(reopened.get_software(created.id).unwrap().unwrap().last_used_at_ms.is_some());
        assert!(reopened.remove_record(created.id).unwrap());
        assert!(!reopened.remove_record(created.id).unwrap());
    }

    #[test]
    fn empty_executable_never_matches() {
        let catalog = MemoryCatalog::default();
        catalog.create_software(software("Manual", "")).unwrap();
        assert!(catalog.find_software_by_executable("").unwrap().is_none());
        assert!(catalog.find_software_by_name("Manual").unwrap().is_some());
    }

    #[test]
    fn touching_unknown_record_is_not_found() {
        let catalog = MemoryCatalog::default();
        let err = catalog.touch_software_used(RecordId::new()).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::NotFound);
    }
}
