//! Folder picker used while configuring the whitelist.
//!
//! Deliberately not whitelist-gated: the user is choosing what to allow. Input
//! hygiene still applies (no `..`, absolute paths only), and only directories
//! are listed.

use crate::error::{BridgeError, BridgeResult};
use crate::model::{BrowseItem, BrowseResponse};
use crate::policy::contains_traversal;
use serde_json::json;
use std::fs;
use std::path::Path;

/// List the sub-directories of `path`, or the filesystem roots when `path` is
/// empty. Hidden directories are skipped; an unreadable directory lists as
/// empty rather than failing.
pub fn browse(path: Option<&str>) -> BridgeResult<BrowseResponse> {
    let raw = path.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(roots());
    }
    if contains_traversal(raw) {
        return Err(BridgeError::bad_input(
            "path traversal is not allowed",
            json!({ "path": raw }),
        ));
    }
    let requested = Path::new(raw);
    if !requested.is_absolute() {
        return Err(BridgeError::bad_input(
            "an absolute path is required",
            json!({ "path": raw }),
        ));
    }
    let resolved = match dunce::canonicalize(requested) {
        Ok(resolved) if resolved.is_dir() => resolved,
        _ => {
            return Err(BridgeError::not_found(
                "directory does not exist",
                json!({ "path": raw }),
            ))
        }
    };

    let parent = resolved
        .parent()
        .filter(|parent| *parent != resolved)
        .map(|parent| parent.display().to_string());
    Ok(BrowseResponse {
        current: resolved.display().to_string(),
        parent,
        items: list_directories(&resolved),
    })
}

fn list_directories(dir: &Path) -> Vec<BrowseItem> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %dir.display(), error = %err, "directory not readable");
            return Vec::new();
        }
    };
    let mut items: Vec<BrowseItem> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (!name.starts_with('.')).then(|| BrowseItem {
                path: entry.path().display().to_string(),
                name,
            })
        })
        .collect();
    items.sort_by_key(|item| item.name.to_lowercase());
    items
}

#[cfg(windows)]
fn roots() -> BrowseResponse {
    let items = ('A'..='Z')
        .map(|letter| (letter, format!("{letter}:\\")))
        .filter(|(_, drive)| Path::new(drive).is_dir())
        .map(|(letter, drive)| BrowseItem {
            name: format!("{letter}:"),
            path: drive,
        })
        .collect();
    BrowseResponse {
        current: String::new(),
        parent: None,
        items,
    }
}

#[cfg(not(windows))]
fn roots() -> BrowseResponse {
    BrowseResponse {
        current: "/".to_string(),
        parent: None,
        items: list_directories(Path::new("/")),
    }
}
