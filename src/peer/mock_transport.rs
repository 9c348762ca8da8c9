//! Mock implementation of Transport for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{GatewayError, Result};
use crate::peer::Transport;
use crate::types::{FileHash, PeerAddr, PeerId};

/// In-memory transport: peer -> content hash -> bytes
pub struct MockTransport {
    data: Arc<Mutex<HashMap<PeerId, HashMap<FileHash, Vec<u8>>>>>,
    unreachable: Mutex<HashSet<PeerId>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    delay: Mutex<Option<Duration>>,
    peer_delays: Mutex<HashMap<PeerId, Duration>>,
    completed: Mutex<Vec<PeerId>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            unreachable: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            delay: Mutex::new(None),
            peer_delays: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, peer: PeerId, hash: FileHash, bytes: Vec<u8>) {
        let mut data = self.data.lock().unwrap_or_else(|p| p.into_inner());
        data.entry(peer).or_insert_with(HashMap::new).insert(hash, bytes);
    }

    /// Make every read from `peer` fail
    pub fn set_unreachable(&self, peer: PeerId) {
        self.unreachable.lock().unwrap_or_else(|p| p.into_inner()).insert(peer);
    }

    /// Delay every read, e.g. to trip a fetch deadline
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    /// Delay reads from one peer only, on top of any global delay
    pub fn set_peer_delay(&self, peer: PeerId, delay: Duration) {
        self.peer_delays.lock().unwrap_or_else(|p| p.into_inner()).insert(peer, delay);
    }

    /// Peers whose reads succeeded, in completion order
    pub fn completions(&self) -> Vec<PeerId> {
        self.completed.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Park every read until [`release`](Self::release) is called
    pub fn hold(&self) {
        *self.gate.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap_or_else(|p| p.into_inner()).take() {
            gate.close();
        }
    }

    /// Number of reads attempted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` reads have been attempted
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_data(&self, peer: &PeerId, _addr: &PeerAddr, hash: &FileHash, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap_or_else(|p| p.into_inner()).clone();
        if let Some(gate) = gate {
            // closed on release
            let _ = gate.acquire().await;
        }
        let delay = *self.delay.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let peer_delay = self.peer_delays.lock().unwrap_or_else(|p| p.into_inner()).get(peer).copied();
        if let Some(delay) = peer_delay {
            tokio::time::sleep(delay).await;
        }

        if self.unreachable.lock().unwrap_or_else(|p| p.into_inner()).contains(peer) {
            return Err(GatewayError::Transport(format!("peer {} unreachable", peer)));
        }

        let bytes = {
            let data = self.data.lock().unwrap_or_else(|p| p.into_inner());
            data.get(peer).and_then(|held| held.get(hash)).cloned()
        }
        .ok_or_else(|| GatewayError::Transport(format!("peer {} does not hold {}", peer, hash)))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(GatewayError::io(format!("write {}", dest.display())))?;
        self.completed.lock().unwrap_or_else(|p| p.into_inner()).push(peer.clone());
        Ok(bytes.len() as u64)
    }
}
