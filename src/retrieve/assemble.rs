//! Output assembly
//!
//! Concatenates decoded segments into the user's file, decrypting each one
//! first when a cipher key was supplied, and trims the tail to the file's
//! recorded size. The output is staged under a unique `<name>.<uuid>.part`
//! and renamed into place only after it has been synced.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, InvalidLength, KeyIvInit};
use log::{debug, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{GatewayError, Result};

const AES_BLOCK_SIZE: usize = 16;

/// Suffix of an output file that is still being written
pub const STAGING_SUFFIX: &str = ".part";

/// AES-CBC with PKCS#7 padding. The key length picks AES-128/192/256 and the
/// IV is the first block of the key.
#[derive(Clone)]
pub struct SegmentCipher {
    key: Vec<u8>,
}

impl SegmentCipher {
    pub fn new(key: &str) -> Result<Self> {
        match key.len() {
            16 | 24 | 32 => Ok(Self { key: key.as_bytes().to_vec() }),
            n => Err(GatewayError::DecryptFailure(format!(
                "cipher key must be 16, 24 or 32 bytes, got {}",
                n
            ))),
        }
    }

    fn iv(&self) -> &[u8] {
        &self.key[..AES_BLOCK_SIZE]
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let bad_key = |e: InvalidLength| GatewayError::DecryptFailure(format!("cipher init: {}", e));
        let plain = match self.key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            _ => cbc::Decryptor::<Aes256>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
        };
        plain.map_err(|e| GatewayError::DecryptFailure(format!("{} byte block: {}", data.len(), e)))
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let bad_key = |e: InvalidLength| GatewayError::DecryptFailure(format!("cipher init: {}", e));
        Ok(match self.key.len() {
            16 => cbc::Encryptor::<Aes128>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            24 => cbc::Encryptor::<Aes192>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            _ => cbc::Encryptor::<Aes256>::new_from_slices(&self.key, self.iv())
                .map_err(bad_key)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
        })
    }
}

/// Fresh staging path for one write of `destination`
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}{}", Uuid::new_v4().simple(), STAGING_SUFFIX));
    destination.with_file_name(name)
}

/// Write `total_size` bytes assembled from `segment_paths` (in file order) to `destination`.
pub fn assemble(destination: &Path, segment_paths: &[PathBuf], total_size: u64, cipher: Option<&SegmentCipher>) -> Result<()> {
    let staging = staging_path(destination);
    let result = write_segments(&staging, segment_paths, total_size, cipher)
        .and_then(|_| {
            std::fs::rename(&staging, destination)
                .map_err(GatewayError::io(format!("rename {} into place", staging.display())))
        });

    if result.is_err() {
        if let Err(e) = std::fs::remove_file(&staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", staging.display(), e);
            }
        }
    }
    result
}

fn write_segments(staging: &Path, segment_paths: &[PathBuf], total_size: u64, cipher: Option<&SegmentCipher>) -> Result<()> {
    let mut file = File::create(staging).map_err(GatewayError::io(format!("create {}", staging.display())))?;

    let mut written: u64 = 0;
    let mut segments_written = 0;
    for path in segment_paths {
        let mut buf = std::fs::read(path).map_err(GatewayError::io(format!("read segment {}", path.display())))?;
        if let Some(cipher) = cipher {
            buf = cipher.decrypt(&buf)?;
        }

        let remaining = total_size - written;
        segments_written += 1;
        if buf.len() as u64 >= remaining {
            file.write_all(&buf[..remaining as usize])
                .map_err(GatewayError::io(format!("write {}", staging.display())))?;
            written += remaining;
            break;
        }
        file.write_all(&buf)
            .map_err(GatewayError::io(format!("write {}", staging.display())))?;
        written += buf.len() as u64;
    }

    if segments_written != segment_paths.len() || written != total_size {
        return Err(GatewayError::ReconstructionFailure(format!(
            "wrote {} of {} segments ({} of {} bytes)",
            segments_written,
            segment_paths.len(),
            written,
            total_size
        )));
    }

    file.sync_all().map_err(GatewayError::io(format!("sync {}", staging.display())))?;
    debug!("Assembled {} bytes from {} segments", written, segments_written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(STAGING_SUFFIX))
            .count()
    }

    fn write_segments_to(dir: &Path, segments: &[Vec<u8>]) -> Vec<PathBuf> {
        segments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let path = dir.join(format!("seg-{}", i));
                std::fs::write(&path, s).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_truncation_law() {
        const K: usize = 64;
        for size in [1u64, 63, 64, 65, 127, 128, 129, 192] {
            let dir = tempdir().unwrap();
            let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
            let mut segments: Vec<Vec<u8>> = data.chunks(K).map(|c| c.to_vec()).collect();
            if let Some(last) = segments.last_mut() {
                last.resize(K, 0);
            }
            let paths = write_segments_to(dir.path(), &segments);
            let dest = dir.path().join("out");

            assemble(&dest, &paths, size, None).unwrap();
            let out = std::fs::read(&dest).unwrap();
            assert_eq!(out.len() as u64, size);
            assert_eq!(out, data);
            assert_eq!(staged_files(dir.path()), 0);
        }
    }

    #[test]
    fn test_decrypts_each_segment_before_truncation() {
        let dir = tempdir().unwrap();
        let cipher = SegmentCipher::new(KEY).unwrap();
        let first = vec![0x11u8; 48];
        let mut second = vec![0x22u8; 20];
        second.resize(48, 0);

        let paths = write_segments_to(
            dir.path(),
            &[cipher.encrypt(&first).unwrap(), cipher.encrypt(&second).unwrap()],
        );
        let dest = dir.path().join("out");
        assemble(&dest, &paths, 68, Some(&cipher)).unwrap();

        let out = std::fs::read(&dest).unwrap();
        assert_eq!(&out[..48], first.as_slice());
        assert_eq!(&out[48..], &second[..20]);
    }

    #[test]
    fn test_bad_ciphertext_is_decrypt_failure() {
        let dir = tempdir().unwrap();
        let paths = write_segments_to(dir.path(), &[vec![0u8; 30]]);
        let dest = dir.path().join("out");
        let cipher = SegmentCipher::new(&KEY[..16]).unwrap();

        let err = assemble(&dest, &paths, 10, Some(&cipher)).unwrap_err();
        assert!(matches!(err, GatewayError::DecryptFailure(_)));
        assert!(!dest.exists());
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[test]
    fn test_segment_count_mismatch() {
        let dir = tempdir().unwrap();
        let paths = write_segments_to(dir.path(), &[vec![1u8; 64], vec![2u8; 64]]);
        let dest = dir.path().join("out");

        // file complete after the first segment: the second is unexpected
        let err = assemble(&dest, &paths, 64, None).unwrap_err();
        assert!(matches!(err, GatewayError::ReconstructionFailure(_)));

        // segments too short to cover the file
        let err = assemble(&dest, &paths, 200, None).unwrap_err();
        assert!(matches!(err, GatewayError::ReconstructionFailure(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_staging_paths_are_unique() {
        let dest = Path::new("/data/file/out");
        let first = staging_path(dest);
        let second = staging_path(dest);
        assert_ne!(first, second);
        assert_eq!(first.parent(), dest.parent());
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("out.") && name.ends_with(STAGING_SUFFIX));
    }

    #[test]
    fn test_cipher_key_lengths() {
        assert!(SegmentCipher::new("short").is_err());
        for len in [16, 24, 32] {
            let cipher = SegmentCipher::new(&KEY.repeat(2)[..len]).unwrap();
            let msg = b"segment payload".to_vec();
            assert_eq!(cipher.decrypt(&cipher.encrypt(&msg).unwrap()).unwrap(), msg);
        }
    }
}
