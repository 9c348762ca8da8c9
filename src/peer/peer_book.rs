//! Peer address book
//!
//! Known peer records are seeded from a YAML file (or registered at runtime).
//! Resolved addresses are cached; `invalidate` evicts a cache entry so the next
//! lookup picks up the current record.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use crate::error::{GatewayError, Result};
use crate::peer::AddressBook;
use crate::types::{PeerAddr, PeerId};

/// One entry of the peer book file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub addr: PeerAddr,
}

pub struct PeerBook {
    records: RwLock<HashMap<PeerId, PeerAddr>>,
    cache: Mutex<HashMap<PeerId, PeerAddr>>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_records(records: Vec<PeerRecord>) -> Self {
        let book = Self::new();
        for record in records {
            book.set_peer(record.peer_id, record.addr);
        }
        book
    }

    /// Load peer records from a YAML list; a missing file yields an empty book
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Peer book {} not found, starting empty", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .map_err(GatewayError::io(format!("read peer book {}", path.display())))?;
        let records: Vec<PeerRecord> = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("peer book {}: {}", path.display(), e)))?;
        info!("Loaded {} peers from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    /// Register or update a peer's record. Cached addresses are kept until invalidated.
    pub fn set_peer(&self, peer: PeerId, addr: PeerAddr) {
        let mut records = self.records.write().unwrap_or_else(|p| p.into_inner());
        records.insert(peer, addr);
    }

    pub fn is_cached(&self, peer: &PeerId) -> bool {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.contains_key(peer)
    }
}

impl Default for PeerBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressBook for PeerBook {
    async fn resolve(&self, peer: &PeerId) -> Result<PeerAddr> {
        if let Some(addr) = self.cache.lock().unwrap_or_else(|p| p.into_inner()).get(peer) {
            return Ok(addr.clone());
        }

        let addr = {
            let records = self.records.read().unwrap_or_else(|p| p.into_inner());
            records.get(peer).cloned()
        }
        .ok_or_else(|| GatewayError::NotFound(format!("peer {}", peer)))?;

        debug!("Resolved peer {} to {}", peer, addr);
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.insert(peer.clone(), addr.clone());
        Ok(addr)
    }

    fn invalidate(&self, peer: &PeerId) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if cache.remove(peer).is_some() {
            debug!("Cleared cached address of peer {}", peer);
        }
    }
}
