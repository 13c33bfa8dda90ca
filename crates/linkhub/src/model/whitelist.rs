use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What a whitelisted directory holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirKind {
    /// Each child directory is one portable program.
    #[default]
    Software,
    /// Each child directory is one project workspace.
    Workspace,
}

impl DirKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Workspace => "workspace",
        }
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "software" => Ok(Self::Software),
            "workspace" => Ok(Self::Workspace),
            other => Err(format!("unknown directory kind '{other}'")),
        }
    }
}

/// An administrator-configured directory under which bridge operations may act.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub path: PathBuf,
    #[serde(alias = "type", default)]
    pub kind: DirKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WhitelistEntry {
    pub fn new(path: impl Into<PathBuf>, kind: DirKind) -> Self {
        Self {
            path: path.into(),
            kind,
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One request's view of the whitelist.
///
/// Built fresh from the settings store for every operation and passed by
/// reference into [`crate::policy::resolve`]; never cached across requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    #[must_use]
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|entry| entry.path.as_path())
    }

    pub fn roots(&self, kind: DirKind) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.path.as_path())
    }

    #[must_use]
    pub fn first_root(&self, kind: DirKind) -> Option<&Path> {
        self.roots(kind).next()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<WhitelistEntry> {
        self.entries
    }
}

/// Stored shape of one whitelist item: either a legacy bare path string or
/// the current object form.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Legacy(String),
    Current {
        #[serde(default)]
        path: String,
        #[serde(default, alias = "type")]
        kind: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
}

impl StoredEntry {
    fn normalize(self) -> Option<WhitelistEntry> {
        match self {
            Self::Legacy(path) => {
                let path = path.trim();
                (!path.is_empty()).then(|| WhitelistEntry::new(path, DirKind::Software))
            }
            Self::Current { path, kind, label } => {
                let path = path.trim();
                if path.is_empty() {
                    return None;
                }
                let kind = match kind.as_deref().map(str::trim) {
                    None | Some("") => DirKind::Software,
                    Some(raw) => raw.parse().ok()?,
                };
                let label = label
                    .map(|label| label.trim().to_string())
                    .filter(|label| !label.is_empty());
                Some(WhitelistEntry {
                    path: PathBuf::from(path),
                    kind,
                    label,
                })
            }
        }
    }
}

/// Parse the persisted `allowed_dirs` value.
///
/// Accepts both `[{"path": .., "kind": ..}]` and the legacy `["/a", "/b"]`
/// representation (legacy items default to [`DirKind::Software`]). Blank
/// paths, unknown kinds and non-string/non-object items are dropped; a value
/// that is not a JSON array yields an empty list.
pub fn parse_allowed_dirs(raw: &str) -> Result<Vec<WhitelistEntry>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<StoredEntry>(item).ok())
        .filter_map(StoredEntry::normalize)
        .collect())
}

/// Normalize entries received from a client (same rules as [`parse_allowed_dirs`]).
pub fn normalize_allowed_dirs(items: Vec<serde_json::Value>) -> Vec<WhitelistEntry> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<StoredEntry>(item).ok())
        .filter_map(StoredEntry::normalize)
        .collect()
}

pub fn serialize_allowed_dirs(entries: &[WhitelistEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn legacy_strings_default_to_software() {
        let entries = parse_allowed_dirs(r#"["/opt/apps", "  ", "/srv/tools"]"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == DirKind::Software));
        assert_eq!(entries[1].path, PathBuf::from("/srv/tools"));
    }

    #[test]
    fn current_form_accepts_type_alias_and_drops_unknown_kinds() {
        let raw = r#"[
            {"path": "/opt/apps", "type": "software"},
            {"path": "/home/me/projects", "kind": "workspace", "label": "Projects"},
            {"path": "/tmp/x", "kind": "music"},
            {"path": ""},
            42
        ]"#;
        let entries = parse_allowed_dirs(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, DirKind::Workspace);
        assert_eq!(entries[1].label.as_deref(), Some("Projects"));
    }

    #[test]
    fn mixed_representations_are_accepted() {
        let entries = parse_allowed_dirs(r#"["/a", {"path": "/b", "kind": "workspace"}]"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, DirKind::Software);
        assert_eq!(entries[1].kind, DirKind::Workspace);
    }

    #[test]
    fn non_array_values_yield_nothing() {
        assert!(parse_allowed_dirs(r#"{"path": "/a"}"#).unwrap().is_empty());
        assert!(parse_allowed_dirs("").unwrap().is_empty());
        assert!(parse_allowed_dirs("not json").is_err());
    }

    #[test]
    fn first_root_filters_by_kind() {
        let list = Whitelist::new(vec![
            WhitelistEntry::new("/w", DirKind::Workspace),
            WhitelistEntry::new("/s1", DirKind::Software),
            WhitelistEntry::new("/s2", DirKind::Software),
        ]);
        assert_eq!(list.first_root(DirKind::Software), Some(Path::new("/s1")));
        assert_eq!(list.roots(DirKind::Workspace).count(), 1);
    }
}
