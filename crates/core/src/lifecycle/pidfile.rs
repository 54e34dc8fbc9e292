// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! PID file tracking the unmanaged daemon process

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_RUNTIME_DIR/tunnel-launcher/daemon.pid`, falling back to the cache directory
    pub fn default_location() -> io::Result<Self> {
        let runtime_dir = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Could not determine runtime directory"))?;

        Ok(Self::new(runtime_dir.join("tunnel-launcher").join("daemon.pid")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of the tracked daemon if it is still alive.
    ///
    /// Stale or unreadable files are removed.
    pub fn read_live_pid(&self) -> Option<u32> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read PID file {}: {}", self.path.display(), e);
                self.remove();
                return None;
            }
        };

        match contents.trim().parse::<u32>() {
            Ok(pid) if is_process_running(pid) => Some(pid),
            Ok(pid) => {
                warn!("Found stale PID file for process {} (not running), removing it", pid);
                self.remove();
                None
            }
            Err(_) => {
                warn!("PID file {} is corrupt, removing it", self.path.display());
                self.remove();
                None
            }
        }
    }

    pub fn write(&self, pid: u32) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, pid.to_string())?;
        info!("Recorded daemon PID {} in {}", pid, self.path.display());
        Ok(())
    }

    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed PID file: {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}

/// Check whether a process with the given PID exists
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    // kill(0, ..) addresses the whole process group
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    // Signal 0 only checks for existence and permission
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    // EPERM: exists but belongs to someone else
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    warn!("Process existence check not implemented for this platform");
    true
}
