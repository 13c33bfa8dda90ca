use super::{ElevationError, PlatformProcessService, SpawnSpec, SpawnedProcess};
use nix::errno::Errno;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

const PKEXEC: &str = "pkexec";

/// Process service for Linux and macOS.
///
/// Elevated launches go through `pkexec`, which is itself detached. A declined
/// authentication prompt therefore happens after the spawn has returned and is
/// never observed, so [`ElevationError::Declined`] is not reported here. Only a
/// failure to start `pkexec` surfaces, as [`ElevationError::Failed`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UnixPlatform;

impl UnixPlatform {
    fn command(spec: &SpawnSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

/// Reap the child on a background thread so it never lingers as a zombie.
fn release(mut child: Child) -> SpawnedProcess {
    let pid = child.id();
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    SpawnedProcess { pid: Some(pid) }
}

impl PlatformProcessService for UnixPlatform {
    fn spawn_detached(&self, spec: &SpawnSpec) -> io::Result<SpawnedProcess> {
        Self::command(spec).spawn().map(release)
    }

    fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<SpawnedProcess, ElevationError> {
        let mut elevated = SpawnSpec::new(PKEXEC).arg(spec.program.to_string_lossy());
        elevated.args.extend(spec.args.iter().cloned());
        elevated.cwd.clone_from(&spec.cwd);
        Self::command(&elevated)
            .spawn()
            .map(release)
            .map_err(ElevationError::Failed)
    }

    fn requires_elevation(&self, err: &io::Error) -> bool {
        err.raw_os_error() == Some(Errno::EPERM as i32) && !nix::unistd::geteuid().is_root()
    }

    fn name(&self) -> &'static str {
        "unix"
    }
}
