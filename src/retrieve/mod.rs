//! Distributed File Retrieval
//!
//! Rebuilds a stored file from the storage network: look up its segment
//! layout, fetch enough fragments of every segment from the miners holding
//! them, erasure-decode each segment, then decrypt, concatenate and trim the
//! segments into the user's file.
//!
//! Concurrent requests for the same file are rejected rather than queued, and
//! every intermediate fragment and segment file is removed when the request
//! ends.

pub mod assemble;
pub mod codec;
pub mod fetcher;
pub mod lease;
pub mod scratch;

use futures::future::join_all;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::chain::MetadataProvider;
use crate::error::{GatewayError, Result};
use crate::peer::{AddressBook, Transport};
use crate::types::{FileHash, FileMetadata, Segment};

use self::assemble::{assemble, SegmentCipher};
use self::codec::{restore_segment, ErasureCodec};
use self::fetcher::FragmentFetcher;
use self::lease::RetrievalLeases;
use self::scratch::ScratchDir;

/// Entry point of the retrieval pipeline. One instance per server.
pub struct RetrievalCoordinator {
    pipeline: Arc<Pipeline>,
    leases: RetrievalLeases,
}

/// Collaborators of one retrieval, shared with the task that runs it
struct Pipeline {
    metadata: Arc<dyn MetadataProvider>,
    fetcher: FragmentFetcher,
    codec: Arc<dyn ErasureCodec>,
}

impl RetrievalCoordinator {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        address_book: Arc<dyn AddressBook>,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn ErasureCodec>,
        fetch_timeout: Duration,
    ) -> Self {
        let fetcher = FragmentFetcher::new(
            Arc::clone(&metadata),
            address_book,
            transport,
            codec.params().fragment_size,
            fetch_timeout,
        );
        Self {
            pipeline: Arc::new(Pipeline { metadata, fetcher, codec }),
            leases: RetrievalLeases::new(),
        }
    }

    pub fn leases(&self) -> &RetrievalLeases {
        &self.leases
    }

    /// Materialize file `fid` as `output_dir/fid` and return its path.
    ///
    /// An existing non-empty file at that path is returned as is. A non-empty
    /// `cipher_key` decrypts every segment with AES-CBC before it is written.
    ///
    /// The work runs on its own task, which keeps the lease until the last
    /// byte is written even if the caller stops waiting for it.
    pub async fn retrieve(&self, fid: &FileHash, output_dir: &Path, cipher_key: Option<&str>) -> Result<PathBuf> {
        let lease = self.leases.acquire(fid)?;

        let user_file = output_dir.join(fid.as_str());
        if let Ok(meta) = tokio::fs::metadata(&user_file).await {
            if meta.is_file() && meta.len() > 0 {
                info!("File {} already materialized at {}", fid, user_file.display());
                return Ok(user_file);
            }
        }

        let cipher = match cipher_key {
            Some(key) if !key.is_empty() => Some(SegmentCipher::new(key)?),
            _ => None,
        };

        let pipeline = Arc::clone(&self.pipeline);
        let fid = *fid;
        let output_dir = output_dir.to_path_buf();
        let task = tokio::spawn(async move {
            let result = pipeline.run(&fid, &output_dir, cipher).await;
            drop(lease);
            result
        });
        task.await
            .map_err(|e| GatewayError::ReconstructionFailure(format!("retrieval task failed: {}", e)))?
    }
}

impl Pipeline {
    async fn run(&self, fid: &FileHash, output_dir: &Path, cipher: Option<SegmentCipher>) -> Result<PathBuf> {
        let fmeta = self
            .metadata
            .query_file(fid, None)
            .await
            .map_err(|e| GatewayError::MetadataUnavailable {
                fid: *fid,
                reason: e.to_string(),
            })?;
        info!(
            "Retrieving file {}: {} bytes in {} segments",
            fid,
            fmeta.file_size,
            fmeta.segments.len()
        );

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(GatewayError::io(format!("create {}", output_dir.display())))?;
        let scratch = ScratchDir::create(output_dir, fid).await?;
        let result = self.rebuild(&fmeta, &scratch, output_dir, cipher).await;
        scratch.remove().await;
        result
    }

    async fn rebuild(
        &self,
        fmeta: &FileMetadata,
        scratch: &ScratchDir,
        output_dir: &Path,
        cipher: Option<SegmentCipher>,
    ) -> Result<PathBuf> {
        let fid = fmeta.fid;
        let mut segment_paths = Vec::with_capacity(fmeta.segments.len());
        for (index, segment) in fmeta.segments.iter().enumerate() {
            let path = self.restore(segment, scratch).await.map_err(|e| {
                error!("Segment {} ({}) of file {} failed: {}", index, segment.hash, fid, e);
                e
            })?;
            segment_paths.push(path);
        }

        let user_file = output_dir.join(fid.as_str());
        let destination = user_file.clone();
        let total_size = fmeta.file_size;
        tokio::task::spawn_blocking(move || assemble(&destination, &segment_paths, total_size, cipher.as_ref()))
            .await
            .map_err(|e| GatewayError::ReconstructionFailure(format!("assembly task failed: {}", e)))??;

        info!("Retrieved file {} to {}", fid, user_file.display());
        Ok(user_file)
    }

    /// Fetch every fragment of `segment` and decode it into the scratch directory
    async fn restore(&self, segment: &Segment, scratch: &ScratchDir) -> Result<PathBuf> {
        let params = self.codec.params();
        if segment.fragments.len() != params.total_shards() {
            return Err(GatewayError::ReconstructionFailure(format!(
                "segment {} lists {} fragments, expected {}",
                segment.hash,
                segment.fragments.len(),
                params.total_shards()
            )));
        }

        let locals: Vec<PathBuf> = segment.fragments.iter().map(|f| scratch.file(&f.hash)).collect();
        let fetches: Vec<_> = segment
            .fragments
            .iter()
            .zip(&locals)
            .map(|(fragment, local)| self.fetcher.fetch(fragment, local))
            .collect();
        let outcomes = join_all(fetches).await;

        // slot i holds shard i, whatever order the fetches completed in
        let mut slots: Vec<Option<PathBuf>> = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(path) => slots.push(Some(path)),
                Err(GatewayError::FragmentUnavailable { hash, reason }) => {
                    warn!("Skipping fragment {} (shard {}) of segment {}: {}", hash, index, segment.hash, reason);
                    slots.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "Segment {}: {} of {} fragments available",
            segment.hash,
            slots.iter().filter(|s| s.is_some()).count(),
            slots.len()
        );

        let segment_path = scratch.file(&segment.hash);
        let codec = Arc::clone(&self.codec);
        let out = segment_path.clone();
        tokio::task::spawn_blocking(move || restore_segment(codec.as_ref(), &out, &slots))
            .await
            .map_err(|e| GatewayError::ReconstructionFailure(format!("decode task failed: {}", e)))??;
        Ok(segment_path)
    }
}
