//! Exclusive lock over the PKI directory.
//!
//! The lock is a file created with exclusive-create semantics that holds the
//! owner's pid. The file is removed when the guard drops. A process killed
//! while holding the lock leaves the file behind; the next `acquire` finds
//! the recorded pid gone and takes the lock over.

use crate::error::{PkiError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Guard for a held directory lock.
#[derive(Debug)]
pub struct DirectoryLock {
    path: PathBuf,
}

impl DirectoryLock {
    /// Acquire the lock at `path`.
    ///
    /// Fails with `Locked` while a live process holds it, or when the holder
    /// cannot be determined.
    pub fn acquire(path: &Path) -> Result<Self> {
        match Self::create(path) {
            Err(PkiError::Locked(_)) if Self::is_stale(path) => {
                tracing::warn!(path = %path.display(), "removing stale directory lock");
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(PkiError::StorageError(e)),
                }
                Self::create(path)
            }
            result => result,
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PkiError::Locked(path.to_path_buf()),
                _ => PkiError::StorageError(e),
            })?;

        // Guard first so a failed pid write still removes the file.
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), "acquired directory lock");
        Ok(lock)
    }

    /// True when the lock file names a process that no longer exists.
    ///
    /// An empty or unreadable file may belong to a holder that has not
    /// written its pid yet, so it is never treated as stale.
    fn is_stale(path: &Path) -> bool {
        let pid = match fs::read_to_string(path) {
            Ok(contents) => contents.trim().parse::<u32>().ok(),
            Err(_) => None,
        };
        match pid {
            Some(pid) => !process_alive(pid),
            None => false,
        }
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release directory lock");
        }
    }
}

/// Whether `pid` names a running process.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // EPERM means the process exists under another user.
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let held = DirectoryLock::acquire(&path).unwrap();
        let second = DirectoryLock::acquire(&path);
        assert!(matches!(second, Err(PkiError::Locked(_))));

        drop(held);
        assert!(!path.exists());
        assert!(DirectoryLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_lock_records_pid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let _lock = DirectoryLock::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_lock_in_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent").join(".lock");

        assert!(matches!(
            DirectoryLock::acquire(&path),
            Err(PkiError::StorageError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_of_exited_process_is_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        fs::write(&path, format!("{}\n", dead_pid)).unwrap();

        let _lock = DirectoryLock::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_lock_without_pid_is_not_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            DirectoryLock::acquire(&path),
            Err(PkiError::Locked(_))
        ));
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id()));
    }
}
