//! Collaborators behind the bridge: metadata store, settings store,
//! description generator and search index.
//!
//! The core only talks to these through the traits declared here. File-backed
//! implementations keep one JSON document per concern in the data directory.

pub mod catalog;
pub mod describe;
pub mod index;
pub mod settings;

pub use catalog::{JsonFileCatalog, MemoryCatalog, MetadataStore};
pub use describe::{CollaboratorError, DescriptionGenerator, DescriptionRequest, DisabledDescriber};
pub use index::{FileSearchIndex, NullSearchIndex, SearchDocument, SearchIndex};
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};

use crate::error::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// The collaborators an install or import writes through.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn MetadataStore>,
    pub describer: Arc<dyn DescriptionGenerator>,
    pub index: Arc<dyn SearchIndex>,
}

impl Collaborators {
    /// In-memory catalog with no description generator and no index.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::default()),
            describer: Arc::new(DisabledDescriber),
            index: Arc::new(NullSearchIndex),
        }
    }
}

/// Read a JSON document, treating a missing file as `T::default()`.
pub(crate) fn read_json_or_default<T>(path: &Path) -> BridgeResult<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path) {
        Ok(data) if data.trim().is_empty() => Ok(T::default()),
        Ok(data) => serde_json::from_str(&data).map_err(|err| {
            BridgeError::store(format!("corrupt store file {}", path.display()), err)
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(BridgeError::store(
            format!("failed to read {}", path.display()),
            err,
        )),
    }
}

/// Replace `path` atomically: write a sibling temp file, then rename over.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> BridgeResult<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|err| BridgeError::store("failed to create store directory", err))?;
    let payload = serde_json::to_vec_pretty(value)
        .map_err(|err| BridgeError::store("failed to serialize store", err))?;
    let mut file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|err| BridgeError::store("failed to create temp store file", err))?;
    file.write_all(&payload)
        .map_err(|err| BridgeError::store("failed to write temp store file", err))?;
    file.persist(path)
        .map_err(|err| BridgeError::store("failed to replace store file", err.error))?;
    Ok(())
}

pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> BridgeError {
    BridgeError::store("store lock poisoned", "a previous writer panicked")
}
