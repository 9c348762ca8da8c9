//! Segment erasure coding
//!
//! Every segment is split into `data_shards` fragments of `fragment_size` bytes
//! plus `par_shards` parity fragments. Any `data_shards` of them recover the
//! segment.

use log::{debug, warn};
use reed_solomon_erasure::galois_8::ReedSolomon;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::types::ErasureParams;

/// Systematic erasure code over fixed-size fragments
pub trait ErasureCodec: Send + Sync {
    fn params(&self) -> ErasureParams;

    /// Split a segment (zero padded to the segment size) into data and parity shards
    fn encode(&self, segment: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Fill in the missing data shards in place
    fn reconstruct_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()>;
}

pub struct ReedSolomonCodec {
    params: ErasureParams,
    rs: ReedSolomon,
}

impl ReedSolomonCodec {
    pub fn new(params: ErasureParams) -> Result<Self> {
        if params.fragment_size == 0 {
            return Err(GatewayError::Config("fragment size must be non-zero".into()));
        }
        let rs = ReedSolomon::new(params.data_shards, params.par_shards).map_err(|e| {
            GatewayError::Config(format!(
                "invalid erasure layout {}+{}: {:?}",
                params.data_shards, params.par_shards, e
            ))
        })?;
        Ok(Self { params, rs })
    }
}

impl ErasureCodec for ReedSolomonCodec {
    fn params(&self) -> ErasureParams {
        self.params
    }

    fn encode(&self, segment: &[u8]) -> Result<Vec<Vec<u8>>> {
        let segment_size = self.params.segment_size();
        if segment.len() > segment_size {
            return Err(GatewayError::ReconstructionFailure(format!(
                "segment of {} bytes exceeds segment size {}",
                segment.len(),
                segment_size
            )));
        }

        let mut padded = segment.to_vec();
        padded.resize(segment_size, 0);

        let mut shards: Vec<Vec<u8>> = padded
            .chunks(self.params.fragment_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        shards.extend((0..self.params.par_shards).map(|_| vec![0u8; self.params.fragment_size]));

        self.rs
            .encode(&mut shards)
            .map_err(|e| GatewayError::ReconstructionFailure(format!("encode: {:?}", e)))?;
        Ok(shards)
    }

    fn reconstruct_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.rs
            .reconstruct_data(shards)
            .map_err(|e| GatewayError::ReconstructionFailure(format!("decode: {:?}", e)))
    }
}

/// Rebuild a segment from its fragment files.
///
/// `fragment_paths` holds one slot per shard index; `None` marks a fragment
/// that could not be fetched. Fragments that cannot be read or have the wrong
/// length are treated as missing. The decoded segment, always exactly the
/// segment size, is written and synced to `segment_path`.
pub fn restore_segment(codec: &dyn ErasureCodec, segment_path: &Path, fragment_paths: &[Option<PathBuf>]) -> Result<()> {
    let params = codec.params();
    if fragment_paths.len() != params.total_shards() {
        return Err(GatewayError::ReconstructionFailure(format!(
            "expected {} fragment slots, got {}",
            params.total_shards(),
            fragment_paths.len()
        )));
    }

    let mut shards: Vec<Option<Vec<u8>>> = fragment_paths
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let path = slot.as_ref()?;
            match std::fs::read(path) {
                Ok(bytes) if bytes.len() == params.fragment_size => Some(bytes),
                Ok(bytes) => {
                    warn!(
                        "Discarding shard {} ({}): {} bytes, expected {}",
                        index,
                        path.display(),
                        bytes.len(),
                        params.fragment_size
                    );
                    None
                }
                Err(e) => {
                    warn!("Discarding shard {} ({}): {}", index, path.display(), e);
                    None
                }
            }
        })
        .collect();

    let available = shards.iter().filter(|s| s.is_some()).count();
    if available < params.data_shards {
        return Err(GatewayError::ReconstructionFailure(format!(
            "only {} of {} shards available, need {}",
            available,
            params.total_shards(),
            params.data_shards
        )));
    }
    debug!("Decoding {} from {} shards", segment_path.display(), available);

    codec.reconstruct_data(&mut shards)?;

    let mut file = File::create(segment_path)
        .map_err(GatewayError::io(format!("create segment {}", segment_path.display())))?;
    for shard in shards.iter().take(params.data_shards) {
        let shard = shard
            .as_ref()
            .ok_or_else(|| GatewayError::ReconstructionFailure("data shard missing after decode".into()))?;
        file.write_all(shard)
            .map_err(GatewayError::io(format!("write segment {}", segment_path.display())))?;
    }
    file.sync_all()
        .map_err(GatewayError::io(format!("sync segment {}", segment_path.display())))?;
    Ok(())
}
