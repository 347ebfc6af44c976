// src/hash.rs

//! Digest computation for fixity and manifests.
//!
//! Four algorithms are supported, matching what transfer partners and
//! BagIt profiles actually ask for:
//! - **SHA-256**: the default for new checksums and manifests
//! - **SHA-512**: stronger variant for long-retention material
//! - **SHA-1 / MD5**: legacy manifests from older transfer tooling
//!
//! All file digests stream in fixed-size chunks; objects are never
//! loaded whole into memory. A single read of the source can feed
//! several digests at once via [`MultiHasher`].

use crate::error::{Error, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Digest length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    /// Algorithm name as stored in the database and manifest filenames
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// All supported algorithms
    pub const ALL: [HashAlgorithm; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" | "md-5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            _ => Err(Error::Validation(format!("unknown hash algorithm: {s}"))),
        }
    }
}

/// Incremental hasher for a single algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            HashAlgorithm::Sha1 => HasherState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => HasherState::Sha512(Sha512::new()),
        };
        Self { algorithm, state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Md5(h) => h.update(data),
            HasherState::Sha1(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
            HasherState::Sha512(h) => h.update(data),
        }
    }

    /// Finalize and return the digest as a lowercase hex string
    pub fn finalize(self) -> String {
        match self.state {
            HasherState::Md5(h) => hex::encode(h.finalize()),
            HasherState::Sha1(h) => hex::encode(h.finalize()),
            HasherState::Sha256(h) => hex::encode(h.finalize()),
            HasherState::Sha512(h) => hex::encode(h.finalize()),
        }
    }

    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// Feeds one byte stream into several digests at once.
///
/// Checksum generation reads each object exactly once regardless of how
/// many algorithms were requested.
pub struct MultiHasher {
    hashers: Vec<Hasher>,
}

impl MultiHasher {
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        Self {
            hashers: algorithms.iter().map(|a| Hasher::new(*a)).collect(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for hasher in &mut self.hashers {
            hasher.update(data);
        }
    }

    pub fn finalize(self) -> Vec<(HashAlgorithm, String)> {
        self.hashers
            .into_iter()
            .map(|h| (h.algorithm(), h.finalize()))
            .collect()
    }
}

/// Compute the digest of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the digest of data from a reader, streaming in 64 KiB chunks
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<String> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 65536];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Compute the digest of a file
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    hash_reader(algorithm, &mut file)
}

/// Compute several digests of a file in one streaming pass.
///
/// Returns the digests along with the number of bytes read.
pub fn hash_file_multi(
    algorithms: &[HashAlgorithm],
    path: &Path,
) -> io::Result<(Vec<(HashAlgorithm, String)>, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = MultiHasher::new(algorithms);
    let mut buffer = [0u8; 65536];
    let mut total: u64 = 0;

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize(), total))
}

/// Verify a file against an expected digest.
///
/// Streams the file; returns `Error::ChecksumMismatch` when the digest
/// differs and `Error::Io` when the file cannot be read.
pub fn verify_file(path: &Path, expected: &str, algorithm: HashAlgorithm) -> Result<()> {
    let actual = hash_file(algorithm, path)?;
    if actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            path: path.to_path_buf(),
            algorithm: algorithm.name().to_string(),
            expected: expected.to_lowercase(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let hash = hash_bytes(HashAlgorithm::Sha256, b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_md5_known_value() {
        let hash = hash_bytes(HashAlgorithm::Md5, b"hello world");
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_sha1_known_value() {
        let hash = hash_bytes(HashAlgorithm::Sha1, b"hello world");
        assert_eq!(hash, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_output_lengths() {
        for algo in HashAlgorithm::ALL {
            let hash = hash_bytes(algo, b"test");
            assert_eq!(hash.len(), algo.hex_len());
        }
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let full = hash_bytes(HashAlgorithm::Sha256, b"Hello, World!");

        let mut hasher = Hasher::new(HashAlgorithm::Sha256);
        hasher.update(b"Hello, ");
        hasher.update(b"World!");

        assert_eq!(hasher.finalize(), full);
    }

    #[test]
    fn test_multi_hasher() {
        let mut multi = MultiHasher::new(&[HashAlgorithm::Md5, HashAlgorithm::Sha256]);
        multi.update(b"hello world");
        let results = multi.finalize();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, HashAlgorithm::Md5);
        assert_eq!(results[0].1, hash_bytes(HashAlgorithm::Md5, b"hello world"));
        assert_eq!(results[1].1, hash_bytes(HashAlgorithm::Sha256, b"hello world"));
    }

    #[test]
    fn test_hash_file_multi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        std::fs::write(&path, b"some sample bytes").unwrap();

        let (digests, size) =
            hash_file_multi(&[HashAlgorithm::Sha256, HashAlgorithm::Sha512], &path).unwrap();

        assert_eq!(size, 17);
        assert_eq!(digests[0].1, hash_bytes(HashAlgorithm::Sha256, b"some sample bytes"));
        assert_eq!(digests[1].1, hash_bytes(HashAlgorithm::Sha512, b"some sample bytes"));
    }

    #[test]
    fn test_verify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"stable content").unwrap();

        let digest = hash_file(HashAlgorithm::Sha256, &path).unwrap();
        assert!(verify_file(&path, &digest, HashAlgorithm::Sha256).is_ok());

        // Case-insensitive on the expected side
        assert!(verify_file(&path, &digest.to_uppercase(), HashAlgorithm::Sha256).is_ok());

        let wrong = "0".repeat(64);
        let err = verify_file(&path, &wrong, HashAlgorithm::Sha256).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(err.is_integrity_finding());
    }
}
