//! Zip extraction into an installation directory.
//!
//! The whole central directory is validated before the first byte is written.
//! Writing is bounded as well: an entry that inflates past the size its header
//! declares, or past the remaining byte budget, aborts the extraction. The
//! caller owns cleanup of a destination that saw a failed extraction. After
//! extraction a single top-level wrapper folder is hoisted away, which keeps
//! the installation layout predictable for the executable picker.

use crate::config::Limits;
use crate::error::{BridgeError, BridgeResult};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

/// What [`extract`] wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub unpacked_bytes: u64,
    /// Name of the single top-level folder that was hoisted away, if any.
    pub hoisted: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    kind: EntryKind,
    /// Uncompressed size the central directory claims.
    declared_size: u64,
    unix_mode: Option<u32>,
}

/// Why an entry name was refused.
#[derive(Debug, PartialEq, Eq)]
enum EntryName {
    Enclosed(PathBuf),
    /// `./` and similar names that point at the archive root itself.
    Root,
    Escapes,
}

/// Unpack the zip read from `reader` into `destination`, then hoist a single
/// top-level directory if that is all the archive contains.
pub fn extract<R: Read + Seek>(
    reader: R,
    destination: &Path,
    limits: &Limits,
) -> BridgeResult<ExtractSummary> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|err| {
        BridgeError::invalid_archive(
            "not a valid zip archive",
            json!({ "source": err.to_string() }),
        )
    })?;
    let plan = plan_entries(&mut archive, limits)?;

    fs::create_dir_all(destination)
        .map_err(|err| BridgeError::io("failed to create destination directory", err))?;

    let mut summary = ExtractSummary::default();
    for entry in &plan {
        let target = destination.join(&entry.relative);
        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target)
                    .map_err(|err| BridgeError::io("failed to create directory", err))?;
                summary.directories += 1;
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|err| BridgeError::io("failed to create directory", err))?;
                }
                let mut source = archive
                    .by_index(entry.index)
                    .map_err(|err| entry_error(&entry.relative, err))?;
                let mut out = File::create(&target)
                    .map_err(|err| BridgeError::io("failed to create extracted file", err))?;
                let budget = limits
                    .max_unpacked_bytes
                    .saturating_sub(summary.unpacked_bytes);
                let allowance = entry.declared_size.min(budget);
                let written = io::copy(
                    &mut Read::by_ref(&mut source).take(allowance.saturating_add(1)),
                    &mut out,
                )
                .map_err(|err| copy_error(&entry.relative, err))?;
                if written > allowance {
                    return Err(oversized_entry(&entry.relative, entry.declared_size, limits));
                }
                summary.files += 1;
                summary.unpacked_bytes = summary.unpacked_bytes.saturating_add(written);
                apply_mode(&target, entry.unix_mode);
            }
        }
    }

    summary.hoisted = hoist_single_directory(destination)?;
    tracing::debug!(
        destination = %destination.display(),
        files = summary.files,
        bytes = summary.unpacked_bytes,
        hoisted = ?summary.hoisted,
        "archive extracted"
    );
    Ok(summary)
}

/// [`extract`] from an archive on disk.
pub fn extract_file(
    archive: &Path,
    destination: &Path,
    limits: &Limits,
) -> BridgeResult<ExtractSummary> {
    let file =
        File::open(archive).map_err(|err| BridgeError::io("failed to open archive", err))?;
    extract(file, destination, limits)
}

fn plan_entries<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    limits: &Limits,
) -> BridgeResult<Vec<PlannedEntry>> {
    if archive.len() > limits.max_archive_entries {
        return Err(BridgeError::invalid_archive(
            "archive has too many entries",
            json!({ "entries": archive.len(), "max_entries": limits.max_archive_entries }),
        ));
    }

    let mut declared: u64 = 0;
    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|err| {
            BridgeError::invalid_archive(
                "unreadable archive entry",
                json!({ "index": index, "source": err.to_string() }),
            )
        })?;
        let name = entry.name().to_string();
        if entry.is_symlink() {
            return Err(BridgeError::invalid_archive(
                "symlink entries are not allowed",
                json!({ "entry": name }),
            ));
        }
        let kind = if entry.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let relative = match classify_name(&name) {
            EntryName::Enclosed(relative) => relative,
            EntryName::Root if kind == EntryKind::Directory => continue,
            EntryName::Root | EntryName::Escapes => {
                return Err(BridgeError::invalid_archive(
                    "archive entry escapes the destination",
                    json!({ "entry": name }),
                ));
            }
        };
        declared = declared.saturating_add(entry.size());
        if declared > limits.max_unpacked_bytes {
            return Err(BridgeError::invalid_archive(
                "archive expands beyond the size limit",
                json!({ "max_unpacked_bytes": limits.max_unpacked_bytes }),
            ));
        }
        plan.push(PlannedEntry {
            index,
            relative,
            kind,
            declared_size: entry.size(),
            unix_mode: entry.unix_mode(),
        });
    }
    Ok(plan)
}

/// Entry names must stay relative: no absolute paths, no `..`, no drive or
/// stream prefixes. Backslashes count as separators.
fn classify_name(name: &str) -> EntryName {
    if name.contains('\0') {
        return EntryName::Escapes;
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return EntryName::Escapes;
    }
    let mut relative = PathBuf::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => return EntryName::Escapes,
            part if part.contains(':') => return EntryName::Escapes,
            part => relative.push(part),
        }
    }
    if relative.as_os_str().is_empty() {
        EntryName::Root
    } else {
        EntryName::Enclosed(relative)
    }
}

fn entry_error(relative: &Path, err: zip::result::ZipError) -> BridgeError {
    BridgeError::invalid_archive(
        "unreadable archive entry",
        json!({ "entry": relative.display().to_string(), "source": err.to_string() }),
    )
}

/// An entry inflated past its declared size or the remaining byte budget.
fn oversized_entry(relative: &Path, declared: u64, limits: &Limits) -> BridgeError {
    BridgeError::invalid_archive(
        "archive entry expands beyond its declared size",
        json!({
            "entry": relative.display().to_string(),
            "declared_size": declared,
            "max_unpacked_bytes": limits.max_unpacked_bytes,
        }),
    )
}

/// Checksum and inflate errors surface as `InvalidData`; they mean the archive
/// is corrupt, not that the disk failed.
fn copy_error(relative: &Path, err: io::Error) -> BridgeError {
    if err.kind() == io::ErrorKind::InvalidData {
        BridgeError::invalid_archive(
            "corrupt archive entry",
            json!({ "entry": relative.display().to_string(), "source": err.to_string() }),
        )
    } else {
        BridgeError::io("failed to write extracted file", err)
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)) {
            tracing::debug!(path = %path.display(), error = %err, "file mode not applied");
        }
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) {}

/// If `root` holds exactly one entry and it is a directory, move its children
/// up one level and remove it. Returns the hoisted folder's name.
///
/// The wrapper is renamed aside first, so a child that shares the wrapper's
/// name (`X/X/...`) can still land at the root.
pub fn hoist_single_directory(root: &Path) -> BridgeResult<Option<String>> {
    let mut entries = fs::read_dir(root)
        .map_err(|err| BridgeError::io("failed to list extracted files", err))?;
    let Some(first) = entries.next() else {
        return Ok(None);
    };
    if entries.next().is_some() {
        return Ok(None);
    }
    let only = first.map_err(|err| BridgeError::io("failed to list extracted files", err))?;
    let file_type = only
        .file_type()
        .map_err(|err| BridgeError::io("failed to inspect extracted entry", err))?;
    if !file_type.is_dir() {
        return Ok(None);
    }

    let name = only.file_name().to_string_lossy().into_owned();
    let staging = root.join(format!(".linkhub-hoist-{}", uuid::Uuid::new_v4().simple()));
    fs::rename(only.path(), &staging)
        .map_err(|err| BridgeError::io("failed to move wrapper folder", err))?;
    let children = fs::read_dir(&staging)
        .map_err(|err| BridgeError::io("failed to list wrapper folder", err))?;
    for child in children {
        let child = child.map_err(|err| BridgeError::io("failed to list wrapper folder", err))?;
        fs::rename(child.path(), root.join(child.file_name()))
            .map_err(|err| BridgeError::io("failed to hoist extracted entry", err))?;
    }
    fs::remove_dir(&staging)
        .map_err(|err| BridgeError::io("failed to remove wrapper folder", err))?;
    Ok(Some(name))
}
