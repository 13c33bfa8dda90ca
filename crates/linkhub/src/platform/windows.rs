use super::{ElevationError, PlatformProcessService, SpawnSpec, SpawnedProcess};
use std::io;
use std::os::windows::process::CommandExt;
use std::process::{Command, Stdio};

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// `ERROR_ELEVATION_REQUIRED`.
const ERROR_ELEVATION_REQUIRED: i32 = 740;
/// `ERROR_CANCELLED`, reported when the UAC prompt is dismissed.
const ERROR_CANCELLED: i32 = 1223;

#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsPlatform;

fn quote_powershell(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether a failed `Start-Process -Verb RunAs` was the user dismissing UAC
/// rather than the launch itself failing.
fn is_uac_cancel(code: Option<i32>, stderr: &str) -> bool {
    if code == Some(ERROR_CANCELLED) {
        return true;
    }
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("canceled by the user") || stderr.contains("cancelled by the user")
}

impl PlatformProcessService for WindowsPlatform {
    fn spawn_detached(&self, spec: &SpawnSpec) -> io::Result<SpawnedProcess> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        let child = command.spawn()?;
        Ok(SpawnedProcess {
            pid: Some(child.id()),
        })
    }

    /// `Start-Process -Verb RunAs` returns once the UAC prompt is answered.
    /// Only a cancelled prompt maps to [`ElevationError::Declined`]; any other
    /// non-zero exit is a failed launch.
    fn spawn_elevated(&self, spec: &SpawnSpec) -> Result<SpawnedProcess, ElevationError> {
        let mut script = format!(
            "Start-Process -ErrorAction Stop -FilePath {} -Verb RunAs",
            quote_powershell(&spec.program.to_string_lossy())
        );
        if !spec.args.is_empty() {
            let args: Vec<String> = spec.args.iter().map(|arg| quote_powershell(arg)).collect();
            script.push_str(" -ArgumentList ");
            script.push_str(&args.join(","));
        }
        if let Some(cwd) = &spec.cwd {
            script.push_str(" -WorkingDirectory ");
            script.push_str(&quote_powershell(&cwd.to_string_lossy()));
        }
        let script = format!(
            "try {{ {script} }} catch {{ [Console]::Error.WriteLine($_.Exception.Message); \
             if ($_.Exception.NativeErrorCode) {{ exit $_.Exception.NativeErrorCode }}; exit 1 }}"
        );
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(ElevationError::Failed)?;
        if output.status.success() {
            return Ok(SpawnedProcess::default());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_uac_cancel(output.status.code(), &stderr) {
            return Err(ElevationError::Declined);
        }
        Err(ElevationError::Failed(io::Error::other(format!(
            "elevated start exited with {}: {}",
            output.status,
            stderr.trim()
        ))))
    }

    fn requires_elevation(&self, err: &io::Error) -> bool {
        err.raw_os_error() == Some(ERROR_ELEVATION_REQUIRED)
    }

    fn name(&self) -> &'static str {
        "windows"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_cancelled_prompt_is_declined() {
        assert!(is_uac_cancel(Some(ERROR_CANCELLED), ""));
        assert!(is_uac_cancel(
            Some(1),
            "This command cannot be run due to the error: The operation was canceled by the user."
        ));
        assert!(is_uac_cancel(None, "Operation Cancelled By The User"));
        assert!(!is_uac_cancel(Some(2), "The system cannot find the file specified."));
        assert!(!is_uac_cancel(Some(1), ""));
    }

    #[test]
    fn single_quotes_are_doubled() {
        assert_eq!(quote_powershell("C:\\it's\\a.exe"), "'C:\\it''s\\a.exe'");
    }
}
