//! Transport over locally mounted peer volumes
//!
//! A peer address is a directory holding that peer's fragments, one file per
//! content hash. Relative addresses are resolved against the transport root.

use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::peer::Transport;
use crate::types::{FileHash, PeerAddr, PeerId};

pub struct LocalPeerTransport {
    root: PathBuf,
}

impl LocalPeerTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn peer_dir(&self, addr: &PeerAddr) -> PathBuf {
        self.root.join(&addr.0)
    }
}

#[async_trait]
impl Transport for LocalPeerTransport {
    async fn read_data(&self, peer: &PeerId, addr: &PeerAddr, hash: &FileHash, dest: &Path) -> Result<u64> {
        let source = self.peer_dir(addr).join(hash.as_str());
        debug!("Reading {} from peer {} at {}", hash, peer, source.display());
        match tokio::fs::copy(&source, dest).await {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(GatewayError::Transport(format!(
                "peer {} does not hold {}",
                peer, hash
            ))),
            Err(e) => Err(GatewayError::Transport(format!("read from peer {}: {}", peer, e))),
        }
    }
}
