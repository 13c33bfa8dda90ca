//! Path sandbox: the gate every launch, reveal and install target passes.
//!
//! [`resolve`] is a function of the raw caller input and a [`Whitelist`]
//! snapshot. Existence and file-type checks are left to the caller so that
//! "outside the whitelist" and "no longer on disk" stay distinguishable.

use crate::error::{BridgeError, BridgeResult};
use crate::model::{Whitelist, ALLOWED_EXECUTABLE_SUFFIXES};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Raw substring rejected before any filesystem access.
pub const TRAVERSAL_TOKEN: &str = "..";

/// A canonical absolute path contained in at least one whitelist entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Why [`resolve`] refused a path.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("path traversal is not allowed")]
    Traversal,
    #[error("an absolute path is required")]
    NotAbsolute,
    #[error("path is outside the allowed directories")]
    OutsideWhitelist,
    #[error("path could not be resolved")]
    Unresolvable(#[source] io::Error),
}

impl Rejection {
    /// Map to a bridge error. The context only ever names the requested path.
    #[must_use]
    pub fn into_error(self, raw: &str) -> BridgeError {
        let context = serde_json::json!({ "path": raw });
        match self {
            Self::Traversal | Self::NotAbsolute => BridgeError::bad_input(self.to_string(), context),
            Self::OutsideWhitelist => BridgeError::forbidden(self.to_string(), context),
            Self::Unresolvable(err) => {
                BridgeError::io(format!("path could not be resolved: {raw}"), err)
            }
        }
    }
}

#[must_use]
pub fn contains_traversal(raw: &str) -> bool {
    raw.contains(TRAVERSAL_TOKEN)
}

/// Resolve `raw` against `whitelist`.
///
/// Order: raw `..` substring, absoluteness, canonicalization, then
/// component-wise containment against each canonicalized entry.
pub fn resolve(raw: &str, whitelist: &Whitelist) -> Result<ResolvedPath, Rejection> {
    if contains_traversal(raw) {
        return Err(Rejection::Traversal);
    }
    let requested = Path::new(raw);
    if !requested.is_absolute() {
        return Err(Rejection::NotAbsolute);
    }
    let canonical = canonicalize_lenient(requested).map_err(Rejection::Unresolvable)?;

    let contained = whitelist.paths().any(|root| match canonical_root(root) {
        Some(root) => canonical.starts_with(&root),
        None => false,
    });
    if contained {
        Ok(ResolvedPath(canonical))
    } else {
        tracing::warn!(path = %raw, "path rejected: outside whitelist");
        Err(Rejection::OutsideWhitelist)
    }
}

/// [`resolve`] with the rejection already mapped to a [`BridgeError`].
pub fn sandbox(raw: &str, whitelist: &Whitelist) -> BridgeResult<ResolvedPath> {
    resolve(raw, whitelist).map_err(|rejection| rejection.into_error(raw))
}

fn canonical_root(root: &Path) -> Option<PathBuf> {
    if !root.is_absolute() {
        return None;
    }
    match canonicalize_lenient(&normalize_lexically(root)) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::warn!(root = %root.display(), error = %err, "whitelist entry could not be resolved");
            None
        }
    }
}

/// Canonicalize the longest existing ancestor of `path` and append the
/// remaining components, so targets that do not exist yet still resolve
/// through any symlinked parent.
pub fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut missing = Vec::new();
    let mut existing = path;
    loop {
        match std::fs::symlink_metadata(existing) {
            Ok(_) => break,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name() else {
                    return Err(err);
                };
                missing.push(name.to_os_string());
                let Some(parent) = existing.parent() else {
                    return Err(err);
                };
                existing = parent;
            }
            Err(err) => return Err(err),
        }
    }
    let mut canonical = dunce::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        canonical.push(name);
    }
    Ok(canonical)
}

/// Fold `.` and `..` without touching the filesystem; `..` never climbs above the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                }
            }
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
        }
    }
    normalized
}

/// Lowercased suffix of `path` with its leading dot, if any.
#[must_use]
pub fn lowercase_suffix(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

#[must_use]
pub fn has_executable_suffix(path: &Path) -> bool {
    lowercase_suffix(path).is_some_and(|suffix| ALLOWED_EXECUTABLE_SUFFIXES.contains(&suffix.as_str()))
}

/// Fails with `E_UNSUPPORTED_TYPE` unless `path` carries an allowed executable suffix.
pub fn ensure_executable_suffix(path: &Path, raw: &str) -> BridgeResult<()> {
    if has_executable_suffix(path) {
        Ok(())
    } else {
        Err(BridgeError::unsupported_type(
            "file type is not an allowed executable",
            serde_json::json!({ "path": raw }),
        ))
    }
}
