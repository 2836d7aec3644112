//! Transactional artifact writes.
//!
//! Every artifact is created with exclusive-create semantics so an existing
//! file is never overwritten. Files written through an uncommitted
//! `ArtifactWriter` are removed when it is dropped, so a failure halfway
//! through an operation leaves no orphans behind.

use crate::error::{PkiError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Collects the files written by one operation.
#[derive(Debug, Default)]
pub struct ArtifactWriter {
    written: Vec<PathBuf>,
    committed: bool,
}

impl ArtifactWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` with `contents`, failing if it exists.
    pub fn write_new(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        self.create(path, contents, false)
    }

    /// Like `write_new`, but readable by the owner only.
    pub fn write_secret(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        self.create(path, contents, true)
    }

    fn create(&mut self, path: &Path, contents: &[u8], secret: bool) -> Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        if secret {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        #[cfg(not(unix))]
        let _ = secret;

        let mut file = options.open(path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => PkiError::AlreadyExists(path.to_path_buf()),
            _ => PkiError::StorageError(e),
        })?;
        self.written.push(path.to_path_buf());

        file.write_all(contents)?;
        file.sync_all()?;

        tracing::info!(path = %path.display(), bytes = contents.len(), "wrote artifact");
        Ok(())
    }

    /// Keep everything written.
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.written)
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in self.written.iter().rev() {
            match fs::remove_file(path) {
                Ok(()) => tracing::warn!(path = %path.display(), "removed partial artifact"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove partial artifact"
                ),
            }
        }
    }
}

/// Replace `path` atomically by writing a sibling temp file and renaming it.
pub fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_committed_files_survive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ca.crt");

        let mut writer = ArtifactWriter::new();
        writer.write_new(&path, b"cert").unwrap();
        let kept = writer.commit();

        assert_eq!(kept, vec![path.clone()]);
        assert_eq!(fs::read(&path).unwrap(), b"cert");
    }

    #[test]
    fn test_uncommitted_files_removed() {
        let temp_dir = TempDir::new().unwrap();
        let key = temp_dir.path().join("server.key");
        let cert = temp_dir.path().join("server.crt");

        {
            let mut writer = ArtifactWriter::new();
            writer.write_secret(&key, b"key").unwrap();
            writer.write_new(&cert, b"cert").unwrap();
        }

        assert!(!key.exists());
        assert!(!cert.exists());
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ca.key");
        fs::write(&path, b"original").unwrap();

        let mut writer = ArtifactWriter::new();
        let result = writer.write_new(&path, b"replacement");

        assert!(matches!(result, Err(PkiError::AlreadyExists(_))));
        drop(writer);
        // The pre-existing file was never ours to clean up.
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("client.key");

        let mut writer = ArtifactWriter::new();
        writer.write_secret(&path, b"key").unwrap();
        writer.commit();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_replace_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ca.srl");

        replace_file(&path, b"01\n").unwrap();
        replace_file(&path, b"02\n").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"02\n");
        assert!(!temp_dir.path().join("ca.srl.tmp").exists());
    }
}
