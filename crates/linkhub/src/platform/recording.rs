use super::{ElevationError, PlatformProcessService, SpawnSpec, SpawnedProcess};
use serde::Serialize;
use std::io;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    Detached,
    Elevated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpawnCall {
    pub mode: SpawnMode,
    pub spec: SpawnSpec,
}

/// What [`RecordingPlatform::spawn_detached`] answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetachedOutcome {
    #[default]
    Succeed,
    /// Fails with an error that [`PlatformProcessService::requires_elevation`] accepts.
    RequireElevation,
    Fail(io::ErrorKind),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ElevationOutcome {
    #[default]
    Succeed,
    Decline,
    Fail,
}

#[derive(Debug, thiserror::Error)]
#[error("elevation required")]
struct ElevationRequired;

/// Records spawns instead of starting processes. Used by tests and `--dry-run`.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<SpawnCall>>,
    detached: Mutex<DetachedOutcome>,
    elevation: Mutex<ElevationOutcome>,
}

impl RecordingPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_outcomes(detached: DetachedOutcome, elevation: ElevationOutcome) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            detached: Mutex::new(detached),
            elevation: Mutex::new(elevation),
        }
    }

    pub fn set_detached_outcome(&self, outcome: DetachedOutcome) {
        if let Ok(mut slot) = self.detached.lock() {
            *slot = outcome;
        }
    }

    pub fn set_elevation_outcome(&self, outcome: ElevationOutcome) {
        if let Ok(mut slot) = self.elevation.lock() {
            *slot = outcome;
        }
    }

    /// Snapshot of every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, mode: SpawnMode, spec: &SpawnSpec) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SpawnCall {
                mode,
                spec: spec.clone(),
            });
        }
    }
}

impl PlatformProcessService for RecordingPlatform {
    fn spawn_detached(&self, spec: &SpawnSpec) -> io::Result<SpawnedProcess> {
        self.record(SpawnMode::Detached, spec);
        let outcome = self.detached.lock().map(|slot| *slot).unwrap_or_default();
        match outcome {
            DetachedOutcome::Succeed => Ok(SpawnedProcess::default()),
            DetachedOutcome::RequireElevation => {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, ElevationRequired))
            }
            DetachedOutcome::Fail(kind) => Err(io::Error::from(kind)),
        }
    }

    fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<SpawnedProcess, ElevationError> {
        self.record(SpawnMode::Elevated, spec);
        let outcome = self.elevation.lock().map(|slot| *slot).unwrap_or_default();
        match outcome {
            ElevationOutcome::Succeed => Ok(SpawnedProcess::default()),
            ElevationOutcome::Decline => Err(ElevationError::Declined),
            ElevationOutcome::Fail => Err(ElevationError::Failed(io::Error::other(
                "elevation helper unavailable",
            ))),
        }
    }

    fn requires_elevation(&self, err: &io::Error) -> bool {
        err.get_ref().is_some_and(|inner| inner.is::<ElevationRequired>())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
