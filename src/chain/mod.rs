//! Chain Metadata Abstraction
//!
//! The gateway never owns file metadata: segment layouts and miner identities
//! live on chain. This module defines the narrow query interface the retrieval
//! pipeline needs, plus a local JSON-backed implementation and an in-memory
//! mock for tests.

pub mod local_store;
pub mod mock_store;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccountId, FileHash, FileMetadata, MinerInfo};

/// Block height to query at; `None` means the latest block
pub type BlockNumber = Option<u32>;

/// Query interface over the storage ledger
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up the segment layout of a stored file
    async fn query_file(&self, fid: &FileHash, at_block: BlockNumber) -> Result<FileMetadata>;

    /// Look up a storage miner's registry entry
    async fn query_miner(&self, account: &AccountId, at_block: BlockNumber) -> Result<MinerInfo>;
}
