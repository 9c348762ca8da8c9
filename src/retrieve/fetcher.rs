//! Fragment fetching
//!
//! Pulls one fragment from the miner that stores it. Peers churn, so a fragment
//! that cannot be fetched is reported as [`GatewayError::FragmentUnavailable`]
//! and left to the erasure code's redundancy.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::chain::MetadataProvider;
use crate::error::{GatewayError, Result};
use crate::peer::{AddressBook, Transport};
use crate::types::Fragment;

/// Default deadline for a single peer read
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

pub struct FragmentFetcher {
    metadata: Arc<dyn MetadataProvider>,
    address_book: Arc<dyn AddressBook>,
    transport: Arc<dyn Transport>,
    fragment_size: usize,
    timeout: Duration,
}

impl FragmentFetcher {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        address_book: Arc<dyn AddressBook>,
        transport: Arc<dyn Transport>,
        fragment_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            metadata,
            address_book,
            transport,
            fragment_size,
            timeout,
        }
    }

    /// Materialize `fragment` at `local_path`.
    ///
    /// Zero fragments are synthesized without touching the network. Any peer
    /// side failure yields `FragmentUnavailable`; only local disk errors are
    /// reported as `Io`.
    pub async fn fetch(&self, fragment: &Fragment, local_path: &Path) -> Result<PathBuf> {
        if fragment.hash.is_zero() {
            self.synthesize_zero(local_path).await?;
            return Ok(local_path.to_path_buf());
        }

        let unavailable = |reason: String| GatewayError::FragmentUnavailable {
            hash: fragment.hash,
            reason,
        };

        debug!("Will query the storage miner {} for fragment {}", fragment.miner, fragment.hash);
        let miner = self
            .metadata
            .query_miner(&fragment.miner, None)
            .await
            .map_err(|e| unavailable(format!("query miner {}: {}", fragment.miner, e)))?;

        let peer = miner.peer_id;
        let addr = self
            .address_book
            .resolve(&peer)
            .await
            .map_err(|e| unavailable(format!("resolve peer {}: {}", peer, e)))?;

        debug!("Will connect the peer {} at {}", peer, addr);
        let outcome = tokio::time::timeout(
            self.timeout,
            self.transport.read_data(&peer, &addr, &fragment.hash, local_path),
        )
        .await;
        // always force a fresh lookup next time
        self.address_book.invalidate(&peer);

        match outcome {
            Ok(Ok(n)) => {
                debug!("Fetched fragment {} ({} bytes) from peer {}", fragment.hash, n, peer);
                Ok(local_path.to_path_buf())
            }
            Ok(Err(e)) => {
                discard_partial(local_path);
                Err(unavailable(format!("read from peer {}: {}", peer, e)))
            }
            Err(_) => {
                discard_partial(local_path);
                Err(unavailable(format!(
                    "read from peer {} timed out after {}s",
                    peer,
                    self.timeout.as_secs_f64()
                )))
            }
        }
    }

    // Every zero fragment of a segment shares one path; concurrent writers
    // all write the same bytes.
    async fn synthesize_zero(&self, local_path: &Path) -> Result<()> {
        if let Ok(meta) = tokio::fs::metadata(local_path).await {
            if meta.len() == self.fragment_size as u64 {
                return Ok(());
            }
        }
        debug!("Synthesizing zero fragment at {}", local_path.display());
        tokio::fs::write(local_path, vec![0u8; self.fragment_size])
            .await
            .map_err(GatewayError::io(format!("create zero fragment {}", local_path.display())))
    }
}

fn discard_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial fragment {}: {}", path.display(), e);
        }
    }
}
