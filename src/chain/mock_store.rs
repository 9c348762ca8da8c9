//! Mock implementation of MetadataProvider for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::chain::{BlockNumber, MetadataProvider};
use crate::error::{GatewayError, Result};
use crate::types::{AccountId, FileHash, FileMetadata, MinerInfo};

/// In-memory metadata provider
pub struct MockMetadataStore {
    files: Arc<Mutex<HashMap<FileHash, FileMetadata>>>,
    miners: Arc<Mutex<HashMap<AccountId, MinerInfo>>>,
    file_queries: AtomicUsize,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            miners: Arc::new(Mutex::new(HashMap::new())),
            file_queries: AtomicUsize::new(0),
        }
    }

    pub fn insert_file(&self, meta: FileMetadata) {
        let mut files = self.files.lock().unwrap_or_else(|p| p.into_inner());
        files.insert(meta.fid, meta);
    }

    pub fn insert_miner(&self, miner: MinerInfo) {
        let mut miners = self.miners.lock().unwrap_or_else(|p| p.into_inner());
        miners.insert(miner.account, miner);
    }

    /// Number of `query_file` calls served so far
    pub fn file_queries(&self) -> usize {
        self.file_queries.load(Ordering::SeqCst)
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataStore {
    async fn query_file(&self, fid: &FileHash, _at_block: BlockNumber) -> Result<FileMetadata> {
        self.file_queries.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap_or_else(|p| p.into_inner());
        files
            .get(fid)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("file {}", fid)))
    }

    async fn query_miner(&self, account: &AccountId, _at_block: BlockNumber) -> Result<MinerInfo> {
        let miners = self.miners.lock().unwrap_or_else(|p| p.into_inner());
        miners
            .get(account)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("miner {}", account)))
    }
}
