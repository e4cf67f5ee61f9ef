//! PID file (§4.10, ambient): startup gate against a second instance,
//! cleaned up on orderly shutdown. Grounded on the teacher's
//! `daemon/signals.rs` socket-cleanup-on-signal idiom, generalized to a
//! liveness-checked PID file instead of a Unix socket path.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Checks for an existing PID file at startup. A file whose recorded
    /// PID is no longer alive is stale and gets replaced; otherwise this is
    /// a Startup error (§7): another instance is presumed to be running.
    pub fn acquire<P: AsRef<Path>>(path: P) -> anyhow::Result<PidFile> {
        let path = path.as_ref().to_path_buf();

        if let Ok(contents) = fs::read_to_string(&path) {
            if let Some(pid) = contents.trim().parse::<i32>().ok() {
                if is_alive(pid) {
                    bail!(
                        "PID file {:?} indicates another instance is already running (pid {})",
                        path,
                        pid
                    );
                }
            }
        }

        Ok(PidFile { path })
    }

    /// Write the current process id. Called once both listeners are bound
    /// (§4.10).
    pub fn write_current_pid(&self) -> anyhow::Result<()> {
        let pid = std::process::id();
        fs::write(&self.path, format!("{}\n", pid))
            .with_context(|| format!("writing PID file {:?}", self.path))
    }

    /// Remove the PID file during orderly shutdown. Left in place after a
    /// crash, consistent with it being a liveness advisory rather than a
    /// lock.
    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_alive(pid: i32) -> bool {
    // kill(pid, 0) checks for existence/permission without sending a signal.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_pid_file_is_replaced() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        // pid 0 never identifies a live process visible via kill(2) from userspace.
        fs::write(tmp.path(), "999999999\n").unwrap();
        assert!(PidFile::acquire(tmp.path()).is_ok());
    }

    #[test]
    fn live_pid_file_is_a_startup_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let our_pid = std::process::id() as i32;
        fs::write(tmp.path(), format!("{}\n", our_pid)).unwrap();
        assert!(PidFile::acquire(tmp.path()).is_err());
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.pid");
        assert!(PidFile::acquire(&path).is_ok());
    }
}
