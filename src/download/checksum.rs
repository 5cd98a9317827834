//! Checksum algorithms and streaming verification.

use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use super::constants::VERIFY_READ_BUFFER_BYTES;
use super::error::DownloadError;
use crate::search::Checksum;

/// Hash algorithms a published checksum may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256
    Sha256,
    /// MD5
    Md5,
}

impl ChecksumAlgorithm {
    /// Parses an algorithm tag as published by the index (`SHA256`, `sha-256`, `MD5`, ...).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha256" => Some(Self::Sha256),
            "md5" => Some(Self::Md5),
            _ => None,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

enum StreamHasher {
    Sha256(Sha256),
    Md5(Md5),
}

impl StreamHasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hashes bytes as they stream past and compares against a published checksum.
pub struct Verifier {
    algorithm: ChecksumAlgorithm,
    expected: String,
    hasher: StreamHasher,
    bytes: u64,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("algorithm", &self.algorithm)
            .field("expected", &self.expected)
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Creates a verifier for `checksum`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnsupportedChecksum`] if the algorithm tag is
    /// not recognized.
    pub fn for_checksum(instance_id: &str, checksum: &Checksum) -> Result<Self, DownloadError> {
        let algorithm = ChecksumAlgorithm::from_tag(&checksum.algorithm).ok_or_else(|| {
            DownloadError::UnsupportedChecksum {
                instance_id: instance_id.to_string(),
                algorithm: checksum.algorithm.clone(),
            }
        })?;
        Ok(Self {
            algorithm,
            expected: checksum.value.trim().to_ascii_lowercase(),
            hasher: StreamHasher::new(algorithm),
            bytes: 0,
        })
    }

    /// The algorithm in use.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Feeds the next chunk.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Compares the digest of everything fed so far with the expected value.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ChecksumMismatch`] naming `path` on mismatch.
    pub fn finish(self, path: &Path) -> Result<(), DownloadError> {
        let actual = self.hasher.finalize_hex();
        if actual == self.expected {
            Ok(())
        } else {
            Err(DownloadError::ChecksumMismatch {
                path: path.to_path_buf(),
                algorithm: self.algorithm.as_str().to_string(),
                expected: self.expected,
                actual,
            })
        }
    }
}

/// Hashes the file at `path` and compares it with the verifier's expectation.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the file cannot be read and
/// [`DownloadError::ChecksumMismatch`] if the digest differs.
pub async fn verify_file(path: &Path, mut verifier: Verifier) -> Result<(), DownloadError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut buffer = vec![0u8; VERIFY_READ_BUFFER_BYTES];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        if read == 0 {
            break;
        }
        verifier.update(&buffer[..read]);
    }
    verifier.finish(path)
}
