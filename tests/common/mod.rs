//! Shared fixtures: an in-memory storage network with six miners

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use deoss_gateway::chain::mock_store::MockMetadataStore;
use deoss_gateway::peer::mock_transport::MockTransport;
use deoss_gateway::peer::peer_book::PeerBook;
use deoss_gateway::retrieve::assemble::SegmentCipher;
use deoss_gateway::retrieve::codec::{ErasureCodec, ReedSolomonCodec};
use deoss_gateway::retrieve::RetrievalCoordinator;
use deoss_gateway::types::{
    AccountId, ErasureParams, FileHash, FileMetadata, Fragment, MinerInfo, PeerAddr, PeerId, Segment,
};

pub const CIPHER_KEY: &str = "0123456789abcdef";
const AES_BLOCK: usize = 16;

pub fn params() -> ErasureParams {
    ErasureParams { data_shards: 4, par_shards: 2, fragment_size: 32 }
}

pub fn hash(n: u64) -> FileHash {
    FileHash::parse(&format!("{:064x}", n)).unwrap()
}

pub fn peer(shard: usize) -> PeerId {
    PeerId(format!("peer-{}", shard))
}

pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 253) as u8 + 1).collect()
}

/// Miner `i` stores shard `i` of every segment
pub struct Network {
    pub metadata: Arc<MockMetadataStore>,
    pub book: Arc<PeerBook>,
    pub transport: Arc<MockTransport>,
    codec: ReedSolomonCodec,
    next_hash: u64,
}

impl Network {
    pub fn new() -> Self {
        let metadata = Arc::new(MockMetadataStore::new());
        let book = Arc::new(PeerBook::new());
        for shard in 0..params().total_shards() {
            let account = AccountId::new([shard as u8 + 1; 32]);
            metadata.insert_miner(MinerInfo { account, peer_id: peer(shard) });
            book.set_peer(peer(shard), PeerAddr(format!("/ip4/10.0.0.{}/tcp/4001", shard + 1)));
        }
        Self {
            metadata,
            book,
            transport: Arc::new(MockTransport::new()),
            codec: ReedSolomonCodec::new(params()).unwrap(),
            next_hash: 1,
        }
    }

    pub fn coordinator(&self) -> RetrievalCoordinator {
        self.coordinator_with_timeout(Duration::from_secs(5))
    }

    pub fn coordinator_with_timeout(&self, timeout: Duration) -> RetrievalCoordinator {
        RetrievalCoordinator::new(
            self.metadata.clone(),
            self.book.clone(),
            self.transport.clone(),
            Arc::new(ReedSolomonCodec::new(params()).unwrap()),
            timeout,
        )
    }

    pub fn coordinator_with_codec(&self, codec: Arc<dyn ErasureCodec>) -> RetrievalCoordinator {
        RetrievalCoordinator::new(
            self.metadata.clone(),
            self.book.clone(),
            self.transport.clone(),
            codec,
            Duration::from_secs(5),
        )
    }

    fn fresh_hash(&mut self) -> FileHash {
        let h = hash(self.next_hash);
        self.next_hash += 1;
        h
    }

    /// Split, optionally encrypt, erasure-code and distribute `data`.
    ///
    /// Encrypted segments carry one AES block less plaintext so the padded
    /// ciphertext fills the segment exactly.
    pub fn publish(&mut self, data: &[u8], cipher: Option<&SegmentCipher>) -> FileMetadata {
        let segment_size = params().segment_size();
        let chunk = if cipher.is_some() { segment_size - AES_BLOCK } else { segment_size };

        let fid = self.fresh_hash();
        let mut segments = Vec::new();
        for plain in data.chunks(chunk) {
            let body = match cipher {
                Some(cipher) => {
                    let mut padded = plain.to_vec();
                    padded.resize(chunk, 0);
                    cipher.encrypt(&padded).unwrap()
                }
                None => plain.to_vec(),
            };
            let shards = self.codec.encode(&body).unwrap();

            let mut fragments = Vec::new();
            for (index, shard) in shards.into_iter().enumerate() {
                let frag_hash = self.fresh_hash();
                self.transport.insert(peer(index), frag_hash, shard);
                fragments.push(Fragment { hash: frag_hash, miner: AccountId::new([index as u8 + 1; 32]) });
            }
            segments.push(Segment { hash: self.fresh_hash(), fragments });
        }

        let meta = FileMetadata { fid, file_size: data.len() as u64, segments };
        self.metadata.insert_file(meta.clone());
        meta
    }

    /// Replace `meta` on chain, e.g. after marking fragments as zero
    pub fn republish(&self, meta: &FileMetadata) {
        self.metadata.insert_file(meta.clone());
    }
}
