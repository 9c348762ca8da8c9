//! Per-retrieval scratch directory
//!
//! Fragment and segment files of one retrieval live under
//! `<output_dir>/<fid>.retrieving/`. The directory is removed when the
//! retrieval finishes; the drop guard covers unwinding.

use log::warn;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::retrieve::assemble::STAGING_SUFFIX;
use crate::types::FileHash;

pub const SCRATCH_SUFFIX: &str = ".retrieving";

pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create a fresh scratch directory, discarding leftovers of a crashed run
    pub async fn create(output_dir: &Path, fid: &FileHash) -> Result<Self> {
        let path = output_dir.join(format!("{}{}", fid, SCRATCH_SUFFIX));
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(GatewayError::io(format!("clear stale scratch {}", path.display()))(e)),
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(GatewayError::io(format!("create scratch {}", path.display())))?;
        Ok(Self { path, removed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, hash: &FileHash) -> PathBuf {
        self.path.join(hash.as_str())
    }

    /// Remove the directory and everything in it
    pub async fn remove(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove scratch directory {}: {}", self.path.display(), e);
            }
        }
        self.removed = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove scratch directory {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Remove scratch directories and staged outputs left in `output_dir` by an
/// earlier process
pub fn purge_stale(output_dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(GatewayError::io(format!("list {}", output_dir.display()))(e)),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if name.ends_with(SCRATCH_SUFFIX) && path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(GatewayError::io(format!("remove {}", path.display())))?;
            removed += 1;
        } else if name.ends_with(STAGING_SUFFIX) && path.is_file() {
            std::fs::remove_file(&path).map_err(GatewayError::io(format!("remove {}", path.display())))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_scratch_removed_explicitly() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path(), &FileHash::ZERO).await.unwrap();
        std::fs::write(scratch.file(&FileHash::ZERO), b"frag").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());

        scratch.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scratch_removed_on_drop() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::create(dir.path(), &FileHash::ZERO).await.unwrap();
        let path = scratch.path().to_path_buf();

        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_create_clears_leftovers() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!("{}{}", FileHash::ZERO, SCRATCH_SUFFIX));
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old"), b"x").unwrap();

        let scratch = ScratchDir::create(dir.path(), &FileHash::ZERO).await.unwrap();
        assert!(!scratch.path().join("old").exists());
    }

    #[test]
    fn test_purge_stale_removes_scratch_dirs_and_staged_outputs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(format!("abc{}", SCRATCH_SUFFIX))).unwrap();
        std::fs::write(dir.path().join(format!("abc.1234{}", STAGING_SUFFIX)), b"half").unwrap();
        std::fs::write(dir.path().join("finished"), b"keep").unwrap();

        assert_eq!(purge_stale(dir.path()).unwrap(), 2);
        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["finished".to_string()]);
        assert_eq!(purge_stale(&dir.path().join("missing")).unwrap(), 0);
    }
}
