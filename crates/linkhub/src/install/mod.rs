//! Archive installation pipeline.
//!
//! One upload moves through `received -> extracted -> scanned -> described ->
//! persisted -> indexed -> done`. Steps run strictly in that order. The
//! description and index steps are optional collaborators: their failures are
//! recorded as [`Degradation`]s on the result and never fail the install.
//!
//! Cleanup is scoped: the uploaded temp file is removed on every exit path,
//! and the install directory is removed unless the record was written.

use crate::archive;
use crate::config::{FeatureToggles, Limits};
use crate::error::{BridgeError, BridgeResult};
use crate::heuristic;
use crate::model::{
    DirKind, Degradation, InstallationResult, NewSoftware, Whitelist, KNOWN_ARCHIVE_SUFFIXES,
    SUPPORTED_ARCHIVE_SUFFIX,
};
use crate::policy::{canonicalize_lenient, contains_traversal, lowercase_suffix};
use crate::store::{
    Collaborators, CollaboratorError, DescriptionGenerator, DescriptionRequest, SearchDocument,
    SearchIndex,
};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Give up looking for a free `<name>_<n>` directory after this many tries.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

const UPLOAD_PREFIX: &str = ".linkhub-upload-";

/// Where the uploaded archive bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// Client-side file name; the program name is derived from it.
    pub filename: String,
    pub source: ArchiveSource,
}

impl Upload {
    pub fn bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            source: ArchiveSource::Bytes(bytes),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source: ArchiveSource::File(path),
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Received,
    Extracted,
    Scanned,
    Described,
    Persisted,
    Indexed,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Extracted => "extracted",
            Self::Scanned => "scanned",
            Self::Described => "described",
            Self::Persisted => "persisted",
            Self::Indexed => "indexed",
            Self::Done => "done",
        }
    }
}

/// Runs uploads through the pipeline against one set of collaborators.
pub struct Installer<'a> {
    collaborators: &'a Collaborators,
    limits: &'a Limits,
    toggles: FeatureToggles,
}

impl<'a> Installer<'a> {
    pub fn new(collaborators: &'a Collaborators, limits: &'a Limits, toggles: FeatureToggles) -> Self {
        Self {
            collaborators,
            limits,
            toggles,
        }
    }

    /// Install `upload` under the first software-type whitelist root.
    pub fn install(&self, whitelist: &Whitelist, upload: Upload) -> BridgeResult<InstallationResult> {
        let mut stage = Stage::Received;
        let filename = upload.filename.clone();
        let result = self.run(whitelist, upload, &mut stage);
        match &result {
            Ok(installed) => tracing::info!(
                filename = %filename,
                name = %installed.name,
                dir = %installed.install_directory,
                exe = %installed.executable_path,
                "install complete"
            ),
            Err(err) => tracing::warn!(
                filename = %filename,
                stage = stage.as_str(),
                code = %err.code,
                error = %err.message,
                "install failed"
            ),
        }
        result
    }

    fn run(
        &self,
        whitelist: &Whitelist,
        upload: Upload,
        stage: &mut Stage,
    ) -> BridgeResult<InstallationResult> {
        let base_name = program_name_from_filename(&upload.filename)?;
        let mut source = open_source(upload.source)?;
        let root = software_root(whitelist)?;

        let (install_dir, name) = allocate_install_dir(&root, &base_name)?;
        let guard = InstallDirGuard::new(install_dir.clone());

        let mut temp = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .suffix(SUPPORTED_ARCHIVE_SUFFIX)
            .tempfile_in(&root)
            .map_err(|err| BridgeError::io("failed to create temporary upload file", err))?;
        source.write_into(temp.as_file_mut())?;
        temp.as_file_mut()
            .seek(SeekFrom::Start(0))
            .map_err(|err| BridgeError::io("failed to rewind temporary upload file", err))?;

        archive::extract(temp.as_file_mut(), &install_dir, self.limits)?;
        *stage = Stage::Extracted;

        let found = heuristic::enumerate(&install_dir, self.limits.max_enumerated_candidates);
        let executable_path = heuristic::pick(&found.candidates, &name)
            .map(|chosen| chosen.path.display().to_string())
            .unwrap_or_default();
        let candidate_executables: Vec<String> = found
            .candidates
            .iter()
            .take(self.limits.max_reported_candidates)
            .map(|candidate| candidate.path.display().to_string())
            .collect();
        *stage = Stage::Scanned;

        let mut degraded = Vec::new();
        let description = describe_step(
            self.collaborators.describer.as_ref(),
            self.toggles.describe_on_install,
            DescriptionRequest::new(name.clone(), executable_path.clone(), &install_dir),
        )
        .unwrap_or_else(|degradation| {
            degraded.push(degradation);
            String::new()
        });
        *stage = Stage::Described;

        let record = self.collaborators.catalog.create_software(NewSoftware {
            name: name.clone(),
            executable_path: executable_path.clone(),
            install_directory: install_dir.display().to_string(),
            description: (!description.is_empty()).then(|| description.clone()),
        })?;
        guard.keep();
        *stage = Stage::Persisted;

        let document = SearchDocument {
            id: record.id.to_string(),
            kind: DirKind::Software,
            name: name.clone(),
            description: description.clone(),
            path: executable_path.clone(),
        };
        if let Err(degradation) = index_step(
            self.collaborators.index.as_ref(),
            self.toggles.index_on_install,
            &document,
        ) {
            degraded.push(degradation);
        }
        *stage = Stage::Indexed;

        let message = install_message(&executable_path, found.truncated);
        *stage = Stage::Done;
        Ok(InstallationResult {
            success: true,
            id: record.id,
            name,
            executable_path,
            install_directory: install_dir.display().to_string(),
            description,
            candidate_executables,
            message,
            degraded,
        })
    }
}

fn install_message(executable_path: &str, truncated: bool) -> String {
    let mut message = if executable_path.is_empty() {
        "installed; no executable found, select one manually".to_string()
    } else {
        "installed".to_string()
    };
    if truncated {
        message.push_str(" (executable scan was truncated)");
    }
    message
}

/// Derive the program name from an upload's file name: drop any directory
/// part and the `.zip` suffix.
pub fn program_name_from_filename(filename: &str) -> BridgeResult<String> {
    let trimmed = filename.trim();
    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() {
        return Err(BridgeError::bad_input(
            "archive file name is empty",
            json!({ "filename": filename }),
        ));
    }
    let path = Path::new(base);
    match lowercase_suffix(path).as_deref() {
        Some(SUPPORTED_ARCHIVE_SUFFIX) => {}
        Some(suffix) if KNOWN_ARCHIVE_SUFFIXES.contains(&suffix) => {
            return Err(BridgeError::bad_input(
                format!("{suffix} archives are not supported; only .zip can be installed"),
                json!({ "filename": filename, "supported": SUPPORTED_ARCHIVE_SUFFIX }),
            ));
        }
        _ => {
            return Err(BridgeError::bad_input(
                "unsupported archive type; only .zip can be installed",
                json!({ "filename": filename, "supported": SUPPORTED_ARCHIVE_SUFFIX }),
            ));
        }
    }
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    if name.is_empty() || name == "." || contains_traversal(&name) || name.contains(':') {
        return Err(BridgeError::bad_input(
            "archive file name does not yield a usable program name",
            json!({ "filename": filename }),
        ));
    }
    Ok(name)
}

/// Canonical first software-type root, created if missing.
fn software_root(whitelist: &Whitelist) -> BridgeResult<PathBuf> {
    let root = whitelist.first_root(DirKind::Software).ok_or_else(|| {
        BridgeError::not_configured("no software directory is configured for installs", None)
    })?;
    if !root.is_absolute() {
        return Err(BridgeError::not_configured(
            "the software directory must be an absolute path",
            None,
        ));
    }
    fs::create_dir_all(root)
        .map_err(|err| BridgeError::io("failed to create software directory", err))?;
    canonicalize_lenient(root)
        .map_err(|err| BridgeError::io("failed to resolve software directory", err))
}

/// Create `root/<name>`, or the first free `root/<name>_<n>`.
///
/// `create_dir` fails when the directory exists, so the existence check and
/// the creation are one filesystem step and concurrent installs of the same
/// name get distinct directories.
pub fn allocate_install_dir(root: &Path, name: &str) -> BridgeResult<(PathBuf, String)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            name.to_string()
        } else {
            format!("{name}_{attempt}")
        };
        let dir = root.join(&candidate);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((dir, candidate)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(BridgeError::io("failed to create install directory", err)),
        }
    }
    Err(BridgeError::io(
        "failed to allocate install directory",
        format!("{MAX_NAME_ATTEMPTS} names in use for '{name}'"),
    ))
}

enum OpenedSource {
    Bytes(Vec<u8>),
    File(File),
}

impl OpenedSource {
    fn write_into(&mut self, out: &mut File) -> BridgeResult<()> {
        match self {
            Self::Bytes(bytes) => out
                .write_all(bytes)
                .map_err(|err| BridgeError::io("failed to write temporary upload file", err)),
            Self::File(file) => io::copy(file, out)
                .map(|_| ())
                .map_err(|err| BridgeError::io("failed to copy archive", err)),
        }?;
        out.flush()
            .map_err(|err| BridgeError::io("failed to write temporary upload file", err))
    }
}

fn open_source(source: ArchiveSource) -> BridgeResult<OpenedSource> {
    match source {
        ArchiveSource::Bytes(bytes) => Ok(OpenedSource::Bytes(bytes)),
        ArchiveSource::File(path) => match File::open(&path) {
            Ok(file) => Ok(OpenedSource::File(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BridgeError::not_found(
                "archive file does not exist",
                json!({ "path": path.display().to_string() }),
            )),
            Err(err) => Err(BridgeError::io("failed to open archive", err)),
        },
    }
}

/// Removes the install directory on drop unless [`Self::keep`] was called.
struct InstallDirGuard {
    path: Option<PathBuf>,
}

impl InstallDirGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for InstallDirGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove partial install");
            }
        }
    }
}

/// Ask the generator for a description. `Ok("")` when the step is switched
/// off or no generator is configured; `Err` only when a configured generator
/// failed.
pub(crate) fn describe_step(
    describer: &dyn DescriptionGenerator,
    enabled: bool,
    request: DescriptionRequest,
) -> Result<String, Degradation> {
    if !enabled || !describer.is_configured() {
        return Ok(String::new());
    }
    match describer.describe(&request) {
        Ok(description) => Ok(description.trim().to_string()),
        Err(err) => {
            tracing::warn!(name = %request.name, error = %err, "description skipped");
            Err(Degradation::DescriptionSkipped {
                reason: err.to_string(),
            })
        }
    }
}

pub(crate) fn index_step(
    index: &dyn SearchIndex,
    enabled: bool,
    document: &SearchDocument,
) -> Result<(), Degradation> {
    if !enabled {
        return Ok(());
    }
    index.upsert(document).map_err(|err: CollaboratorError| {
        tracing::warn!(id = %document.id, error = %err, "search index update skipped");
        Degradation::IndexSkipped {
            reason: err.to_string(),
        }
    })
}
