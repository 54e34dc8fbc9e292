// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! systemd-backed daemon hosting
//!
//! The managed mode talks to `systemctl`; installing and removing the
//! service go through the daemon executable run under `pkexec`. The
//! unmanaged daemon is a detached child tracked by a PID file.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use tunnel_launcher_common::LauncherConfig;

use super::pidfile::{is_process_running, PidFile};
use super::{DaemonBackend, DaemonMode, LifecycleError};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
const STOP_GRACE: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(100);

// pkexec: dialog dismissed / not authorized
const PKEXEC_DISMISSED: i32 = 126;
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

struct CommandOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn success(&self) -> bool {
        self.code == 0
    }
}

pub struct SystemBackend {
    service_name: String,
    executable: PathBuf,
    pid_file: PidFile,
}

impl SystemBackend {
    pub fn new(service_name: impl Into<String>, executable: PathBuf, pid_file: PidFile) -> Self {
        Self {
            service_name: service_name.into(),
            executable,
            pid_file,
        }
    }

    pub fn from_config(config: &LauncherConfig) -> Result<Self, LifecycleError> {
        Ok(Self::new(
            config.service_name.clone(),
            resolve_executable(&config.daemon_executable),
            PidFile::default_location()?,
        ))
    }

    fn unit_name(&self) -> String {
        if self.service_name.ends_with(".service") {
            self.service_name.clone()
        } else {
            format!("{}.service", self.service_name)
        }
    }

    async fn systemctl(&self, args: &[&str]) -> Result<CommandOutput, LifecycleError> {
        let unit = self.unit_name();
        let mut full: Vec<&str> = args.to_vec();
        full.push(&unit);
        run_command(Path::new("systemctl"), &full).await
    }

    /// Run the daemon executable with `args`, elevated unless already root
    async fn run_elevated(&self, action: &str, args: &[&str]) -> Result<(), LifecycleError> {
        let output = if running_as_root() {
            run_command(&self.executable, args).await?
        } else {
            let exe = self.executable.to_string_lossy();
            let mut full: Vec<&str> = vec![&*exe];
            full.extend_from_slice(args);
            run_command(Path::new("pkexec"), &full).await?
        };

        match output.code {
            0 => Ok(()),
            PKEXEC_DISMISSED | PKEXEC_NOT_AUTHORIZED => Err(LifecycleError::InsufficientPrivilege {
                action: action.to_string(),
                detail: "authorization was refused".to_string(),
            }),
            code => Err(LifecycleError::Backend {
                command: format!("{} {}", self.executable.display(), args.join(" ")),
                detail: failure_detail(code, &output),
            }),
        }
    }

    fn spawn_unmanaged(&self) -> Result<(), LifecycleError> {
        let mut child = Command::new(&self.executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = child.id().ok_or_else(|| LifecycleError::Backend {
            command: self.executable.display().to_string(),
            detail: "daemon exited immediately".to_string(),
        })?;
        self.pid_file.write(pid)?;
        info!("Started daemon process {} ({})", pid, self.executable.display());

        // Reap the child so a stopped daemon does not linger as a zombie
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Daemon process {} exited: {}", pid, status),
                Err(e) => warn!("Failed to wait for daemon process {}: {}", pid, e),
            }
        });
        Ok(())
    }

    async fn stop_unmanaged(&self) -> Result<(), LifecycleError> {
        let Some(pid) = self.pid_file.read_live_pid() else {
            return Ok(());
        };
        terminate(pid)?;

        let deadline = tokio::time::Instant::now() + STOP_GRACE;
        while is_process_running(pid) {
            if tokio::time::Instant::now() >= deadline {
                return Err(LifecycleError::Backend {
                    command: format!("kill {}", pid),
                    detail: "daemon did not exit in time".to_string(),
                });
            }
            tokio::time::sleep(STOP_POLL).await;
        }
        self.pid_file.remove();
        info!("Daemon process {} stopped", pid);
        Ok(())
    }
}

#[async_trait]
impl DaemonBackend for SystemBackend {
    async fn service_installed(&self) -> Result<bool, LifecycleError> {
        let output = self.systemctl(&["list-unit-files", "--no-legend"]).await?;
        Ok(output.success() && output.stdout.contains(&self.unit_name()))
    }

    async fn is_running(&self, mode: DaemonMode) -> Result<bool, LifecycleError> {
        match mode {
            DaemonMode::Unmanaged => Ok(self.pid_file.read_live_pid().is_some()),
            DaemonMode::ManagedService => {
                let output = self.systemctl(&["is-active", "--quiet"]).await?;
                Ok(output.success())
            }
        }
    }

    async fn start(&self, mode: DaemonMode) -> Result<(), LifecycleError> {
        match mode {
            DaemonMode::Unmanaged => self.spawn_unmanaged(),
            DaemonMode::ManagedService => {
                let output = self.systemctl(&["start"]).await?;
                check_systemctl("start", &output)
            }
        }
    }

    async fn stop(&self, mode: DaemonMode) -> Result<(), LifecycleError> {
        match mode {
            DaemonMode::Unmanaged => self.stop_unmanaged().await,
            DaemonMode::ManagedService => {
                let output = self.systemctl(&["stop"]).await?;
                check_systemctl("stop", &output)
            }
        }
    }

    async fn install_service(&self) -> Result<(), LifecycleError> {
        self.run_elevated("install the system service", &["--install"]).await
    }

    async fn uninstall_service(&self) -> Result<(), LifecycleError> {
        self.run_elevated("uninstall the system service", &["--uninstall"]).await
    }

    async fn launch_update(&self, update_dir: &str, ui_flavor: &str) -> Result<(), LifecycleError> {
        let mut command = if running_as_root() {
            Command::new(&self.executable)
        } else {
            let mut pkexec = Command::new("pkexec");
            pkexec.arg(&self.executable);
            pkexec
        };
        command
            .args(["--update", update_dir, ui_flavor])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // The updater outlives the launcher; it is not awaited
        let child = command.spawn()?;
        debug!("Updater started as process {:?}", child.id());
        Ok(())
    }
}

async fn run_command(program: &Path, args: &[&str]) -> Result<CommandOutput, LifecycleError> {
    debug!("Running {} {}", program.display(), args.join(" "));
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LifecycleError::Backend {
            command: program.display().to_string(),
            detail: e.to_string(),
        })?;

    let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| LifecycleError::Backend {
            command: program.display().to_string(),
            detail: format!("timed out after {}s", COMMAND_TIMEOUT.as_secs()),
        })??;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn check_systemctl(verb: &str, output: &CommandOutput) -> Result<(), LifecycleError> {
    if output.success() {
        return Ok(());
    }
    let stderr = output.stderr.to_lowercase();
    if stderr.contains("access denied") || stderr.contains("authentication") || stderr.contains("interactive") {
        return Err(LifecycleError::InsufficientPrivilege {
            action: format!("{} the system service", verb),
            detail: output.stderr.trim().to_string(),
        });
    }
    Err(LifecycleError::Backend {
        command: format!("systemctl {}", verb),
        detail: failure_detail(output.code, output),
    })
}

fn failure_detail(code: i32, output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit code {}", code)
    } else {
        format!("exit code {}: {}", code, stderr)
    }
}

/// Look `name` up on PATH unless it already names a path
pub fn resolve_executable(name: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(name).into_owned());
    if expanded.components().count() > 1 {
        return expanded;
    }
    env::var_os("PATH")
        .and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(&expanded))
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or(expanded)
}

#[cfg(unix)]
fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), LifecycleError> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| LifecycleError::Backend {
        command: "kill".to_string(),
        detail: format!("invalid pid {}", pid),
    })?;
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            return Err(LifecycleError::InsufficientPrivilege {
                action: "stop the daemon".to_string(),
                detail: err.to_string(),
            });
        }
        warn!("Failed to signal daemon process {}: {}", pid, err);
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<(), LifecycleError> {
    Err(LifecycleError::Backend {
        command: format!("kill {}", pid),
        detail: "not supported on this platform".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unit_name() {
        let dir = tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("daemon.pid"));
        let backend = SystemBackend::new("tunnel-launcher-daemon", PathBuf::from("/bin/true"), pid_file.clone());
        assert_eq!(backend.unit_name(), "tunnel-launcher-daemon.service");

        let backend = SystemBackend::new("custom.service", PathBuf::from("/bin/true"), pid_file);
        assert_eq!(backend.unit_name(), "custom.service");
    }

    #[test]
    fn test_resolve_executable() {
        assert_eq!(resolve_executable("/opt/daemon"), PathBuf::from("/opt/daemon"));
        assert_eq!(
            resolve_executable("definitely-not-on-path-xyz"),
            PathBuf::from("definitely-not-on-path-xyz")
        );
    }

    #[test]
    fn test_systemctl_failure_classification() {
        let denied = CommandOutput {
            code: 1,
            stdout: String::new(),
            stderr: "Failed to start unit: Access denied\n".to_string(),
        };
        assert!(matches!(
            check_systemctl("start", &denied),
            Err(LifecycleError::InsufficientPrivilege { .. })
        ));

        let missing = CommandOutput {
            code: 5,
            stdout: String::new(),
            stderr: "Unit not found.".to_string(),
        };
        match check_systemctl("start", &missing) {
            Err(LifecycleError::Backend { detail, .. }) => assert_eq!(detail, "exit code 5: Unit not found."),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unmanaged_stop_without_pid_is_noop() {
        let dir = tempdir().unwrap();
        let backend = SystemBackend::new(
            "tunnel-launcher-daemon",
            PathBuf::from("/bin/true"),
            PidFile::new(dir.path().join("daemon.pid")),
        );
        assert!(!backend.is_running(DaemonMode::Unmanaged).await.unwrap());
        backend.stop(DaemonMode::Unmanaged).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unmanaged_start_and_stop() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("fake-daemon");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let backend = SystemBackend::new(
            "tunnel-launcher-daemon",
            script,
            PidFile::new(dir.path().join("daemon.pid")),
        );
        backend.start(DaemonMode::Unmanaged).await.unwrap();
        assert!(backend.is_running(DaemonMode::Unmanaged).await.unwrap());

        backend.stop(DaemonMode::Unmanaged).await.unwrap();
        assert!(!backend.is_running(DaemonMode::Unmanaged).await.unwrap());
    }
}
