//! In-flight retrieval leases
//!
//! At most one retrieval per file identifier may run at a time. A lease is
//! held for the lifetime of its guard and released on drop, including when a
//! retrieval unwinds.

use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{GatewayError, Result};
use crate::types::FileHash;

#[derive(Clone, Default)]
pub struct RetrievalLeases {
    active: Arc<Mutex<HashSet<FileHash>>>,
}

impl RetrievalLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `fid`, or fail with `DuplicateRequest` if it is held
    pub fn acquire(&self, fid: &FileHash) -> Result<LeaseGuard> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(*fid) {
            return Err(GatewayError::DuplicateRequest(*fid));
        }
        debug!("Acquired retrieval lease for {}", fid);
        Ok(LeaseGuard {
            fid: *fid,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_held(&self, fid: &FileHash) -> bool {
        self.active.lock().unwrap_or_else(|p| p.into_inner()).contains(fid)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct LeaseGuard {
    fid: FileHash,
    active: Arc<Mutex<HashSet<FileHash>>>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        active.remove(&self.fid);
        debug!("Released retrieval lease for {}", self.fid);
    }
}
