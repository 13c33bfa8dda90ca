//! Common test helper functions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use linkhub::platform::RecordingPlatform;
use linkhub::policy::canonicalize_lenient;
use linkhub::Bridge;
use serde_json::json;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a unique temporary directory for a test.
///
/// The name combines the process id, a timestamp and a per-process counter so
/// parallel tests never share a directory. The directory is created
/// immediately and canonicalized, so paths built from it compare equal to the
/// paths the bridge reports.
///
/// # Arguments
///
/// * `prefix` - A short identifier for the test (e.g., "install", "scan")
///
/// # Panics
///
/// Panics if the directory cannot be created.
///
/// # Example
///
/// ```ignore
/// let dir = temp_dir("install");
/// // dir is something like /tmp/linkhub-install-4242-1703520000000-0
/// ```
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "linkhub-{prefix}-{}-{stamp}-{seq}",
        std::process::id()
    ));

    #[allow(clippy::expect_used)]
    fs::create_dir_all(&dir).expect("failed to create temp directory");
    #[allow(clippy::expect_used)]
    canonicalize_lenient(&dir).expect("failed to canonicalize temp directory")
}

/// The software root [`memory_bridge`] whitelists under `base`.
#[must_use]
pub fn software_root(base: &Path) -> PathBuf {
    base.join("software")
}

/// The workspace root [`memory_bridge`] whitelists under `base`.
#[must_use]
pub fn workspace_root(base: &Path) -> PathBuf {
    base.join("workspaces")
}

/// A bridge over in-memory stores whose whitelist holds
/// [`software_root`] and [`workspace_root`] of `base`, both created.
/// Spawns go to the returned [`RecordingPlatform`].
///
/// # Panics
///
/// Panics if the roots cannot be created or the whitelist cannot be stored.
#[must_use]
pub fn memory_bridge(base: &Path) -> (Bridge, Arc<RecordingPlatform>) {
    let software = software_root(base);
    let workspaces = workspace_root(base);
    fs::create_dir_all(&software).expect("create software root");
    fs::create_dir_all(&workspaces).expect("create workspace root");

    let platform = Arc::new(RecordingPlatform::new());
    let bridge = Bridge::in_memory(platform.clone());
    bridge
        .set_allowed_dirs(vec![
            json!({ "path": software.display().to_string(), "kind": "software" }),
            json!({ "path": workspaces.display().to_string(), "kind": "workspace" }),
        ])
        .expect("store whitelist");
    (bridge, platform)
}

/// Write `data` to `path`, creating parent directories.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_file(path: &Path, data: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, data).expect("write file");
}
