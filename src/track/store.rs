//! Track file store
//!
//! One file per key, named by the key. Writes go to a uniquely named temporary
//! file in the same directory, are synced, then renamed over the final name, so
//! a reader never sees a partially written record. A reader/writer lock owned
//! by the store orders renames and deletions against reads.

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::track::record::TrackRecord;
use crate::types::FileHash;

const TEMP_PREFIX: &str = ".tmp-";

pub struct TrackFileStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

/// Removes the temporary file unless it was renamed into place
struct PendingFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove temporary track file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

impl TrackFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(GatewayError::io(format!("create track dir {}", dir.display())))?;
        info!("Using track directory {}", dir.display());
        Ok(Self {
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &FileHash) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Exclusively create a temporary file, drawing names until one is free
    fn create_temp(&self, mut next_name: impl FnMut() -> String) -> Result<(File, PendingFile)> {
        loop {
            let path = self.dir.join(next_name());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok((
                        file,
                        PendingFile {
                            path,
                            committed: false,
                        },
                    ))
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Temporary name {} taken, retrying", path.display());
                }
                Err(e) => return Err(GatewayError::io(format!("create {}", path.display()))(e)),
            }
        }
    }

    /// Atomically store `payload` under `key`
    pub fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        let key = FileHash::parse(key)?;
        self.write_with(&key, payload, || format!("{}{}", TEMP_PREFIX, Uuid::new_v4()))
    }

    fn write_with(&self, key: &FileHash, payload: &[u8], next_name: impl FnMut() -> String) -> Result<()> {
        let (mut file, temp) = self.create_temp(next_name)?;
        file.write_all(payload)
            .map_err(GatewayError::io(format!("write {}", temp.path.display())))?;
        file.sync_all()
            .map_err(GatewayError::io(format!("sync {}", temp.path.display())))?;
        drop(file);
        self.commit(temp, key)
    }

    fn commit(&self, mut temp: PendingFile, key: &FileHash) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(|p| p.into_inner());
        let target = self.record_path(key);
        std::fs::rename(&temp.path, &target)
            .map_err(GatewayError::io(format!("rename track file to {}", target.display())))?;
        temp.committed = true;
        debug!("Wrote track file {}", key);
        Ok(())
    }

    /// Serialize and store a track record under its fid
    pub fn write_record(&self, record: &TrackRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        self.write(record.fid.as_str(), &payload)
    }

    /// Read and parse the record stored under `key`
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let key = FileHash::parse(key)?;
        let raw = {
            let _guard = self.lock.read().unwrap_or_else(|p| p.into_inner());
            match std::fs::read(self.record_path(&key)) {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(GatewayError::NotFound(format!("track file {}", key)));
                }
                Err(e) => return Err(GatewayError::io(format!("read track file {}", key))(e)),
            }
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn read_record(&self, key: &str) -> Result<TrackRecord> {
        self.read(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        let Ok(key) = FileHash::parse(key) else {
            return false;
        };
        let _guard = self.lock.read().unwrap_or_else(|p| p.into_inner());
        self.record_path(&key).is_file()
    }

    /// Keys of all stored records
    pub fn list(&self) -> Result<Vec<FileHash>> {
        let _guard = self.lock.read().unwrap_or_else(|p| p.into_inner());
        let entries = std::fs::read_dir(&self.dir)
            .map_err(GatewayError::io(format!("list track dir {}", self.dir.display())))?;

        let mut keys: Vec<FileHash> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(|name| FileHash::parse(name).ok()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Best-effort removal; an absent key is not an error
    pub fn delete(&self, key: &str) {
        let Ok(key) = FileHash::parse(key) else {
            warn!("Ignoring delete of invalid track key {:?}", key);
            return;
        };
        let _guard = self.lock.write().unwrap_or_else(|p| p.into_inner());
        match std::fs::remove_file(self.record_path(&key)) {
            Ok(()) => debug!("Deleted track file {}", key),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete track file {}: {}", key, e),
        }
    }
}
