//! Local JSON metadata store
//!
//! Serves file and miner records from a directory of JSON documents:
//! `<dir>/files/<fid>.json` and `<dir>/miners/<account-hex>.json`.

use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::chain::{BlockNumber, MetadataProvider};
use crate::error::{GatewayError, Result};
use crate::types::{AccountId, FileHash, FileMetadata, MinerInfo};

pub struct LocalMetadataStore {
    root: PathBuf,
}

impl LocalMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using local metadata store at {}", root.display());
        Self { root }
    }

    fn file_path(&self, fid: &FileHash) -> PathBuf {
        self.root.join("files").join(format!("{}.json", fid))
    }

    fn miner_path(&self, account: &AccountId) -> PathBuf {
        self.root.join("miners").join(format!("{}.json", account.to_hex()))
    }

    /// Persist a file record, used to seed the store
    pub async fn put_file(&self, meta: &FileMetadata) -> Result<()> {
        write_document(&self.file_path(&meta.fid), meta).await
    }

    /// Persist a miner record, used to seed the store
    pub async fn put_miner(&self, miner: &MinerInfo) -> Result<()> {
        write_document(&self.miner_path(&miner.account), miner).await
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(GatewayError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(GatewayError::io(format!("read {}", path.display()))(e)),
    };
    Ok(serde_json::from_slice(&raw)?)
}

async fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(GatewayError::io(format!("create {}", parent.display())))?;
    }
    let raw = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, raw)
        .await
        .map_err(GatewayError::io(format!("write {}", path.display())))
}

#[async_trait]
impl MetadataProvider for LocalMetadataStore {
    async fn query_file(&self, fid: &FileHash, _at_block: BlockNumber) -> Result<FileMetadata> {
        debug!("Querying file metadata for {}", fid);
        read_document(&self.file_path(fid)).await
    }

    async fn query_miner(&self, account: &AccountId, _at_block: BlockNumber) -> Result<MinerInfo> {
        debug!("Querying miner {}", account);
        read_document(&self.miner_path(account)).await
    }
}
