use crate::error::BridgeResult;
use crate::store::{poisoned, read_json_or_default, write_json_atomic};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SETTINGS_FILE: &str = "settings.json";

/// Key/value settings table.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> BridgeResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> BridgeResult<()>;
    fn remove(&self, key: &str) -> BridgeResult<bool>;
    fn all(&self) -> BridgeResult<BTreeMap<String, String>>;
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.values.lock().map_err(poisoned)?.remove(key).is_some())
    }

    fn all(&self) -> BridgeResult<BTreeMap<String, String>> {
        Ok(self.values.lock().map_err(poisoned)?.clone())
    }
}

/// Settings persisted as a flat JSON object.
///
/// Every read goes to disk, so edits made by another process (or by hand)
/// are visible to the next request.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SETTINGS_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BridgeResult<BTreeMap<String, String>> {
        read_json_or_default(&self.path)
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        write_json_atomic(&self.path, &values)
    }

    fn remove(&self, key: &str) -> BridgeResult<bool> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        let mut values = self.load()?;
        let removed = values.remove(key).is_some();
        if removed {
            write_json_atomic(&self.path, &values)?;
        }
        Ok(removed)
    }

    fn all(&self) -> BridgeResult<BTreeMap<String, String>> {
        self.load()
    }
}
