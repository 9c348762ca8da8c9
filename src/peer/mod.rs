//! Peer Network Abstraction
//!
//! Two collaborators sit between the retrieval pipeline and the storage
//! network: an address book that maps peer identities to dialable addresses,
//! and a transport that pulls a fragment's bytes from a peer into a local file.

pub mod local_transport;
pub mod mock_transport;
pub mod peer_book;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{FileHash, PeerAddr, PeerId};

/// Resolves peer identities to network addresses
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Current address of a peer, or `NotFound`
    async fn resolve(&self, peer: &PeerId) -> Result<PeerAddr>;

    /// Drop any cached address so the next `resolve` re-reads it
    fn invalidate(&self, peer: &PeerId);
}

/// Fetches content from peers
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the content named `hash` from `peer` into `dest`, returning the
    /// number of bytes written. Deadlines are enforced by the caller.
    async fn read_data(&self, peer: &PeerId, addr: &PeerAddr, hash: &FileHash, dest: &Path) -> Result<u64>;
}
