//! Track record schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, FileHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackOperation {
    Upload,
    Delete,
}

/// Hashes of one segment and its fragments, in shard order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub segment_hash: FileHash,
    pub fragment_hashes: Vec<FileHash>,
}

/// State of one asynchronous operation on a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub fid: FileHash,
    pub operation: TrackOperation,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub owner: Option<AccountId>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackRecord {
    pub fn new(fid: FileHash, operation: TrackOperation) -> Self {
        let now = Utc::now();
        Self {
            fid,
            operation,
            file_name: String::new(),
            bucket_name: String::new(),
            owner: None,
            file_size: 0,
            segments: Vec::new(),
            completed: false,
            retries: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.updated_at = Utc::now();
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
        self.updated_at = Utc::now();
    }
}
