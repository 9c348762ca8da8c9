//! Core Data Model
//!
//! Identifiers and metadata records shared by the retrieval pipeline and the
//! track store. Hashes are carried as validated fixed-length values so they can
//! be used directly as file names and map keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// Length of a file, segment or fragment hash on the storage network
pub const FILE_HASH_LEN: usize = 64;

/// Length of a miner account in bytes
pub const ACCOUNT_LEN: usize = 32;

/// Content hash of a file, segment or fragment.
///
/// Always exactly [`FILE_HASH_LEN`] ASCII alphanumeric characters, which also
/// makes it safe to use as a path component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileHash([u8; FILE_HASH_LEN]);

impl FileHash {
    /// Reserved hash of an all-zero fragment; such fragments are synthesized
    /// locally and never fetched from a peer.
    pub const ZERO: FileHash = FileHash([b'0'; FILE_HASH_LEN]);

    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        if s.len() != FILE_HASH_LEN {
            return Err(GatewayError::InvalidKey {
                expected: FILE_HASH_LEN,
                got: s.len(),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(GatewayError::InvalidKey {
                expected: FILE_HASH_LEN,
                got: s.len(),
            });
        }
        let mut buf = [0u8; FILE_HASH_LEN];
        buf.copy_from_slice(s.as_bytes());
        Ok(Self(buf))
    }

    pub fn as_str(&self) -> &str {
        // construction guarantees ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for FileHash {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FileHash {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        hash.as_str().to_string()
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({})", self.as_str())
    }
}

/// On-chain account of a storage miner, hex encoded on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; ACCOUNT_LEN]);

impl AccountId {
    pub fn new(bytes: [u8; ACCOUNT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| GatewayError::Config(format!("invalid account {}: {}", s, e)))?;
        let bytes: [u8; ACCOUNT_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            GatewayError::Config(format!(
                "invalid account length: expected {} bytes, got {}",
                ACCOUNT_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl From<AccountId> for String {
    fn from(account: AccountId) -> Self {
        account.to_hex()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

/// Network identity of a peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved network address of a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddr(pub String);

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One shard of a segment and the miner holding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub hash: FileHash,
    pub miner: AccountId,
}

/// One erasure-coded unit of a file. Fragment order is the shard order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub hash: FileHash,
    pub fragments: Vec<Fragment>,
}

/// Description of a stored file as recorded on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub fid: FileHash,
    pub file_size: u64,
    pub segments: Vec<Segment>,
}

/// Registry entry for a storage miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerInfo {
    pub account: AccountId,
    pub peer_id: PeerId,
}

/// Erasure layout of every segment on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureParams {
    pub data_shards: usize,
    pub par_shards: usize,
    pub fragment_size: usize,
}

impl ErasureParams {
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.par_shards
    }

    /// Size of a decoded segment: the data shards laid end to end
    pub fn segment_size(&self) -> usize {
        self.data_shards * self.fragment_size
    }
}

impl Default for ErasureParams {
    fn default() -> Self {
        Self {
            data_shards: 4,
            par_shards: 8,
            fragment_size: 8 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hash(c: char) -> String {
        std::iter::repeat(c).take(FILE_HASH_LEN).collect()
    }

    #[test]
    fn test_file_hash_parse_valid() {
        let hash = FileHash::parse(&sample_hash('a')).unwrap();
        assert_eq!(hash.as_str(), sample_hash('a'));
        assert!(!hash.is_zero());
        assert!(FileHash::parse(&sample_hash('0')).unwrap().is_zero());
    }

    #[test]
    fn test_file_hash_rejects_wrong_length() {
        let err = FileHash::parse("abc").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidKey { expected: FILE_HASH_LEN, got: 3 }));

        let too_long = sample_hash('b') + "c";
        assert!(FileHash::parse(&too_long).is_err());
    }

    #[test]
    fn test_file_hash_rejects_path_characters() {
        let mut s = sample_hash('a');
        s.replace_range(0..3, "../");
        assert!(FileHash::parse(&s).is_err());
    }

    #[test]
    fn test_file_hash_serde_as_string() {
        let hash = FileHash::parse(&sample_hash('f')).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", sample_hash('f')));

        let back: FileHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<FileHash>("\"short\"").is_err());
    }

    #[test]
    fn test_account_id_hex() {
        let account = AccountId::new([0xab; ACCOUNT_LEN]);
        let encoded = String::from(account);
        assert_eq!(encoded.len(), ACCOUNT_LEN * 2);
        assert_eq!(AccountId::try_from(encoded).unwrap(), account);
        assert_eq!(AccountId::try_from(format!("0x{}", account.to_hex())).unwrap(), account);
        assert!(AccountId::try_from("abcd".to_string()).is_err());
    }

    #[test]
    fn test_erasure_params_defaults() {
        let params = ErasureParams::default();
        assert_eq!(params.total_shards(), 12);
        assert_eq!(params.segment_size(), 32 * 1024 * 1024);
    }
}
