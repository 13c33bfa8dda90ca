//! Host process capabilities: detached spawning and elevated re-launch.
//!
//! Everything that actually starts an OS process goes through
//! [`PlatformProcessService`], so the launcher can be exercised against
//! [`RecordingPlatform`] without touching the host.

mod recording;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use recording::{DetachedOutcome, ElevationOutcome, RecordingPlatform, SpawnCall, SpawnMode};

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A process to start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl SpawnSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Handle returned once a child has been started. The child is never waited on
/// by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpawnedProcess {
    pub pid: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("elevation prompt was declined")]
    Declined,
    #[error("elevated launch failed: {0}")]
    Failed(#[source] io::Error),
}

pub trait PlatformProcessService: Send + Sync {
    /// Start `spec` in its own process group with null standard handles and
    /// return as soon as the child exists.
    fn spawn_detached(&self, spec: &SpawnSpec) -> io::Result<SpawnedProcess>;

    /// Re-launch `spec` through the host's elevation prompt.
    fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<SpawnedProcess, ElevationError>;

    /// Whether `err` from [`Self::spawn_detached`] means the target needs
    /// elevated privileges.
    fn requires_elevation(&self, err: &io::Error) -> bool;

    /// Human-readable name used in logs and dry-run output.
    fn name(&self) -> &'static str;
}

/// Spec that starts `executable` with its directory as working directory.
///
/// Windows shortcuts are handed to the shell because they cannot be executed
/// directly.
#[must_use]
pub fn launch_spec(executable: &Path) -> SpawnSpec {
    let cwd = executable.parent().map(Path::to_path_buf);
    let is_shortcut = crate::policy::lowercase_suffix(executable).as_deref() == Some(".lnk");
    let spec = if is_shortcut {
        SpawnSpec::new("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg(executable.to_string_lossy())
    } else {
        SpawnSpec::new(executable)
    };
    match cwd {
        Some(cwd) => spec.cwd(cwd),
        None => spec,
    }
}

/// Spec that opens `dir` in the host file browser.
#[must_use]
pub fn reveal_spec(dir: &Path) -> SpawnSpec {
    SpawnSpec::new(file_browser_program()).arg(dir.to_string_lossy())
}

fn file_browser_program() -> &'static str {
    if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// The implementation for the host this binary was built for.
#[must_use]
pub fn host() -> Arc<dyn PlatformProcessService> {
    #[cfg(unix)]
    {
        Arc::new(unix::UnixPlatform)
    }
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_spec_runs_from_executable_directory() {
        let spec = launch_spec(Path::new("/apps/Foo/Foo.exe"));
        assert_eq!(spec.program, PathBuf::from("/apps/Foo/Foo.exe"));
        assert!(spec.args.is_empty());
        assert_eq!(spec.cwd, Some(PathBuf::from("/apps/Foo")));
    }

    #[test]
    fn shortcuts_go_through_the_shell() {
        let spec = launch_spec(Path::new("/apps/Foo/Foo.LNK"));
        assert_eq!(spec.program, PathBuf::from("cmd"));
        assert_eq!(spec.args.first().map(String::as_str), Some("/C"));
        assert_eq!(spec.args.last().map(String::as_str), Some("/apps/Foo/Foo.LNK"));
    }

    #[test]
    fn reveal_spec_passes_directory() {
        let spec = reveal_spec(Path::new("/work/thesis"));
        assert_eq!(spec.args, vec!["/work/thesis".to_string()]);
        assert!(spec.cwd.is_none());
    }
}
