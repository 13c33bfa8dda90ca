use crate::model::DirKind;
use crate::store::describe::CollaboratorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const INDEX_FILE: &str = "index.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub kind: DirKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
}

impl SearchDocument {
    /// Text embedded by the index: `"<name>. <description>"`, or just the name.
    #[must_use]
    pub fn text(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            self.name.clone()
        } else {
            format!("{}. {description}", self.name)
        }
    }
}

/// Semantic search index notified after installs and imports.
pub trait SearchIndex: Send + Sync {
    fn upsert(&self, document: &SearchDocument) -> Result<(), CollaboratorError>;

    fn remove(&self, _id: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSearchIndex;

impl SearchIndex for NullSearchIndex {
    fn upsert(&self, _document: &SearchDocument) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    #[serde(flatten)]
    document: SearchDocument,
    text: String,
}

/// Keeps documents in `index.json`, keyed by id.
#[derive(Debug)]
pub struct FileSearchIndex {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSearchIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(INDEX_FILE))
    }

    /// All indexed documents, ordered by id.
    pub fn documents(&self) -> Result<Vec<SearchDocument>, CollaboratorError> {
        let _guard = self.lock.lock().map_err(lock_failed)?;
        Ok(self
            .load()?
            .into_values()
            .map(|stored| stored.document)
            .collect())
    }

    fn load(&self) -> Result<BTreeMap<String, StoredDocument>, CollaboratorError> {
        match fs::read_to_string(&self.path) {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => serde_json::from_str(&data).map_err(failed),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(failed(err)),
        }
    }

    fn save(&self, docs: &BTreeMap<String, StoredDocument>) -> Result<(), CollaboratorError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(failed)?;
        let payload = serde_json::to_vec_pretty(docs).map_err(failed)?;
        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(failed)?;
        file.write_all(&payload).map_err(failed)?;
        file.persist(&self.path).map_err(|err| failed(err.error))?;
        Ok(())
    }
}

impl SearchIndex for FileSearchIndex {
    fn upsert(&self, document: &SearchDocument) -> Result<(), CollaboratorError> {
        let _guard = self.lock.lock().map_err(lock_failed)?;
        let mut docs = self.load()?;
        docs.insert(
            document.id.clone(),
            StoredDocument {
                text: document.text(),
                document: document.clone(),
            },
        );
        self.save(&docs)
    }

    fn remove(&self, id: &str) -> Result<(), CollaboratorError> {
        let _guard = self.lock.lock().map_err(lock_failed)?;
        let mut docs = self.load()?;
        if docs.remove(id).is_some() {
            self.save(&docs)?;
        }
        Ok(())
    }
}

fn failed(err: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::Failed(err.to_string())
}

fn lock_failed<T>(_: std::sync::PoisonError<T>) -> CollaboratorError {
    CollaboratorError::Failed("index lock poisoned".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn doc(id: &str, description: &str) -> SearchDocument {
        SearchDocument {
            id: id.to_string(),
            kind: DirKind::Software,
            name: "Foo".to_string(),
            description: description.to_string(),
            path: "/apps/Foo/Foo.exe".to_string(),
        }
    }

    #[test]
    fn document_text_joins_name_and_description() {
        assert_eq!(doc("1", "A tool").text(), "Foo. A tool");
        assert_eq!(doc("1", "  ").text(), "Foo");
    }

    #[test]
    fn upsert_replaces_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileSearchIndex::in_data_dir(dir.path());
        index.upsert(&doc("1", "")).unwrap();
        index.upsert(&doc("1", "second")).unwrap();
        index.upsert(&doc("2", "")).unwrap();
        let docs = index.documents().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].description, "second");
        index.remove("2").unwrap();
        assert_eq!(index.documents().unwrap().len(), 1);
    }
}
