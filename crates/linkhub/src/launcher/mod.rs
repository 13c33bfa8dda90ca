//! Process launching and directory revealing for sandbox-approved paths.
//!
//! Neither component waits on the child: the call returns once the platform
//! reports that the process was started.

use crate::error::{BridgeError, BridgeResult, ErrorCode};
use crate::platform::{launch_spec, reveal_spec, ElevationError, PlatformProcessService, SpawnSpec};
use crate::policy::{ensure_executable_suffix, ResolvedPath};
use serde_json::json;
use std::io;
use std::sync::Arc;

/// How a launch succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Launched {
    pub pid: Option<u32>,
    /// Started through the elevation prompt after a permission failure.
    pub elevated: bool,
}

/// Starts executables as detached process groups, retrying once through the
/// elevation prompt when the platform reports the target needs it.
#[derive(Clone)]
pub struct ProcessLauncher {
    platform: Arc<dyn PlatformProcessService>,
    elevation_fallback: bool,
}

impl ProcessLauncher {
    pub fn new(platform: Arc<dyn PlatformProcessService>, elevation_fallback: bool) -> Self {
        Self {
            platform,
            elevation_fallback,
        }
    }

    pub fn launch(&self, target: &ResolvedPath) -> BridgeResult<Launched> {
        let spec = launch_spec(target.as_path());
        match self.platform.spawn_detached(&spec) {
            Ok(spawned) => {
                tracing::info!(
                    path = %target,
                    pid = ?spawned.pid,
                    platform = self.platform.name(),
                    "program launched"
                );
                Ok(Launched {
                    pid: spawned.pid,
                    elevated: false,
                })
            }
            Err(err) if self.platform.requires_elevation(&err) => {
                if self.elevation_fallback {
                    tracing::info!(path = %target, "program requires elevation, retrying");
                    self.launch_elevated(target, &spec)
                } else {
                    Err(BridgeError::new(
                        ErrorCode::LaunchFailed,
                        "program requires elevated privileges",
                        json!({ "source": err.to_string(), "elevation_required": true }),
                    ))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(BridgeError::not_found(
                    "target file does not exist",
                    json!({ "path": target.to_string() }),
                ))
            }
            Err(err) => {
                tracing::warn!(path = %target, error = %err, "launch failed");
                Err(BridgeError::launch_failed("failed to start program", err))
            }
        }
    }

    fn launch_elevated(&self, target: &ResolvedPath, spec: &SpawnSpec) -> BridgeResult<Launched> {
        match self.platform.spawn_elevated(spec) {
            Ok(spawned) => {
                tracing::info!(path = %target, pid = ?spawned.pid, "program launched elevated");
                Ok(Launched {
                    pid: spawned.pid,
                    elevated: true,
                })
            }
            Err(ElevationError::Declined) => {
                tracing::warn!(path = %target, "elevation prompt declined");
                Err(BridgeError::elevation_declined(
                    "elevation was declined",
                    json!({ "path": target.to_string() }),
                ))
            }
            Err(ElevationError::Failed(err)) => {
                tracing::warn!(path = %target, error = %err, "elevated launch failed");
                Err(BridgeError::elevation_failed("elevated launch failed", err))
            }
        }
    }
}

/// Opens directories in the host file browser. Failures are reported, never
/// retried.
#[derive(Clone)]
pub struct DirectoryRevealer {
    platform: Arc<dyn PlatformProcessService>,
}

impl DirectoryRevealer {
    pub fn new(platform: Arc<dyn PlatformProcessService>) -> Self {
        Self { platform }
    }

    pub fn reveal(&self, dir: &ResolvedPath) -> BridgeResult<()> {
        self.platform
            .spawn_detached(&reveal_spec(dir.as_path()))
            .map(|_| tracing::info!(path = %dir, "directory opened"))
            .map_err(|err| {
                tracing::warn!(path = %dir, error = %err, "failed to open directory");
                BridgeError::launch_failed("failed to open directory", err)
            })
    }
}

/// Launch preconditions: allowed suffix, then an existing regular file.
pub fn ensure_launchable(target: &ResolvedPath, raw: &str) -> BridgeResult<()> {
    ensure_executable_suffix(target.as_path(), raw)?;
    if target.as_path().is_file() {
        Ok(())
    } else {
        Err(BridgeError::not_found(
            "target file does not exist",
            json!({ "path": raw }),
        ))
    }
}

pub fn ensure_directory(target: &ResolvedPath, raw: &str) -> BridgeResult<()> {
    if target.as_path().is_dir() {
        Ok(())
    } else {
        Err(BridgeError::not_found(
            "target directory does not exist",
            json!({ "path": raw }),
        ))
    }
}
