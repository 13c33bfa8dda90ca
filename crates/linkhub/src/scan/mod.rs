//! Bulk import of already-unpacked programs and workspaces.
//!
//! Every first-level sub-directory of a whitelisted root of the requested kind
//! is one item. Items are imported independently: a failure is counted and
//! the scan moves on.

use crate::config::{FeatureToggles, Limits};
use crate::error::BridgeResult;
use crate::heuristic;
use crate::install::{describe_step, index_step};
use crate::model::{
    Degradation, DirKind, NewSoftware, NewWorkspace, ScanDetail, ScanReport, ScanStatus,
    Whitelist,
};
use crate::policy::canonicalize_lenient;
use crate::store::{Collaborators, DescriptionRequest, SearchDocument};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Scanner<'a> {
    collaborators: &'a Collaborators,
    limits: &'a Limits,
    toggles: FeatureToggles,
}

/// Outcome of one item before it is folded into the report.
enum ItemOutcome {
    Imported(ScanDetail),
    Skipped(ScanDetail),
}

impl<'a> Scanner<'a> {
    pub fn new(collaborators: &'a Collaborators, limits: &'a Limits, toggles: FeatureToggles) -> Self {
        Self {
            collaborators,
            limits,
            toggles,
        }
    }

    /// Import every sub-directory of every `kind` root in `whitelist`.
    /// Roots that are missing or not directories are skipped.
    pub fn scan(&self, whitelist: &Whitelist, kind: DirKind) -> ScanReport {
        let mut report = ScanReport {
            kind,
            imported: 0,
            skipped: 0,
            failed: 0,
            details: Vec::new(),
            message: String::new(),
        };

        for root in whitelist.roots(kind) {
            let Some(children) = child_directories(root) else {
                tracing::info!(root = %root.display(), "scan root unavailable, skipping");
                continue;
            };
            for child in children {
                let name = child
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let outcome = match kind {
                    DirKind::Software => self.import_software(&name, &child),
                    DirKind::Workspace => self.import_workspace(&name, &child),
                };
                match outcome {
                    Ok(ItemOutcome::Imported(detail)) => {
                        report.imported += 1;
                        report.details.push(detail);
                    }
                    Ok(ItemOutcome::Skipped(detail)) => {
                        report.skipped += 1;
                        report.details.push(detail);
                    }
                    Err(err) => {
                        tracing::warn!(name = %name, code = %err.code, error = %err.message, "import failed");
                        report.failed += 1;
                        report.details.push(ScanDetail {
                            name,
                            status: ScanStatus::Failed,
                            path: Some(child.display().to_string()),
                            reason: Some(err.message),
                            description: None,
                            degraded: Vec::new(),
                        });
                    }
                }
            }
        }

        report.message = format!(
            "scan complete: {} imported, {} skipped, {} failed",
            report.imported, report.skipped, report.failed
        );
        tracing::info!(
            kind = %kind,
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            "scan complete"
        );
        report
    }

    fn import_software(&self, name: &str, dir: &Path) -> BridgeResult<ItemOutcome> {
        let found = heuristic::enumerate(dir, self.limits.max_enumerated_candidates);
        let executable_path = heuristic::pick(&found.candidates, name)
            .map(|chosen| chosen.path.display().to_string())
            .unwrap_or_default();

        let catalog = &self.collaborators.catalog;
        if !executable_path.is_empty()
            && catalog.find_software_by_executable(&executable_path)?.is_some()
        {
            return Ok(skipped(name, &executable_path, "already imported"));
        }
        if catalog.find_software_by_name(name)?.is_some() {
            return Ok(skipped(name, &executable_path, "a record with this name exists"));
        }

        let target = if executable_path.is_empty() {
            dir.display().to_string()
        } else {
            executable_path.clone()
        };
        let mut degraded = Vec::new();
        let description = describe_step(
            self.collaborators.describer.as_ref(),
            self.toggles.describe_on_install,
            DescriptionRequest::new(name, target, dir),
        )
        .unwrap_or_else(|degradation| {
            degraded.push(degradation);
            String::new()
        });

        let record = catalog.create_software(NewSoftware {
            name: name.to_string(),
            executable_path: executable_path.clone(),
            install_directory: dir.display().to_string(),
            description: (!description.is_empty()).then(|| description.clone()),
        })?;
        if let Err(degradation) = index_step(
            self.collaborators.index.as_ref(),
            self.toggles.index_on_install,
            &SearchDocument {
                id: record.id.to_string(),
                kind: DirKind::Software,
                name: name.to_string(),
                description: description.clone(),
                path: executable_path.clone(),
            },
        ) {
            degraded.push(degradation);
        }
        tracing::info!(name = %name, exe = %executable_path, "software imported");
        Ok(imported(name, &executable_path, description, degraded))
    }

    fn import_workspace(&self, name: &str, dir: &Path) -> BridgeResult<ItemOutcome> {
        let directory_path = dir.display().to_string();
        let catalog = &self.collaborators.catalog;
        if catalog.find_workspace_by_directory(&directory_path)?.is_some() {
            return Ok(skipped(name, &directory_path, "already imported"));
        }
        if catalog.find_workspace_by_name(name)?.is_some() {
            return Ok(skipped(name, &directory_path, "a record with this name exists"));
        }

        let mut degraded = Vec::new();
        let description = describe_step(
            self.collaborators.describer.as_ref(),
            self.toggles.describe_on_install,
            DescriptionRequest::new(name, directory_path.clone(), dir),
        )
        .unwrap_or_else(|degradation| {
            degraded.push(degradation);
            String::new()
        });

        let record = catalog.create_workspace(NewWorkspace {
            name: name.to_string(),
            directory_path: directory_path.clone(),
            description: (!description.is_empty()).then(|| description.clone()),
        })?;
        if let Err(degradation) = index_step(
            self.collaborators.index.as_ref(),
            self.toggles.index_on_install,
            &SearchDocument {
                id: record.id.to_string(),
                kind: DirKind::Workspace,
                name: name.to_string(),
                description: description.clone(),
                path: directory_path.clone(),
            },
        ) {
            degraded.push(degradation);
        }
        tracing::info!(name = %name, dir = %directory_path, "workspace imported");
        Ok(imported(name, &directory_path, description, degraded))
    }
}

/// Canonical, sorted, non-hidden sub-directories of `root`; `None` when the
/// root cannot be read.
fn child_directories(root: &Path) -> Option<Vec<PathBuf>> {
    if !root.is_absolute() {
        return None;
    }
    let root = canonicalize_lenient(root).ok()?;
    let entries = fs::read_dir(&root).ok()?;
    let mut children: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect();
    children.sort();
    Some(children)
}

fn skipped(name: &str, path: &str, reason: &str) -> ItemOutcome {
    ItemOutcome::Skipped(ScanDetail {
        name: name.to_string(),
        status: ScanStatus::Skipped,
        path: (!path.is_empty()).then(|| path.to_string()),
        reason: Some(reason.to_string()),
        description: None,
        degraded: Vec::new(),
    })
}

fn imported(
    name: &str,
    path: &str,
    description: String,
    degraded: Vec<Degradation>,
) -> ItemOutcome {
    ItemOutcome::Imported(ScanDetail {
        name: name.to_string(),
        status: ScanStatus::Imported,
        path: (!path.is_empty()).then(|| path.to_string()),
        reason: None,
        description: (!description.is_empty()).then_some(description),
        degraded,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::WhitelistEntry;

    #[test]
    fn hidden_and_file_children_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("loose.exe"), b"x").unwrap();
        let children = child_directories(dir.path()).unwrap();
        let names: Vec<_> = children
            .iter()
            .map(|c| c.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_roots_are_skipped() {
        let collaborators = Collaborators::in_memory();
        let limits = Limits::default();
        let scanner = Scanner::new(&collaborators, &limits, FeatureToggles::default());
        let whitelist = Whitelist::new(vec![WhitelistEntry::new(
            "/definitely/not/here",
            DirKind::Software,
        )]);
        let report = scanner.scan(&whitelist, DirKind::Software);
        assert_eq!((report.imported, report.skipped, report.failed), (0, 0, 0));
    }
}
