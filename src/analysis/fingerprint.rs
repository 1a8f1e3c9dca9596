use std::{collections::BTreeMap, fmt, fs::File, io::Read, path::Path, str::FromStr};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{ForensicsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 3] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ForensicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            other => Err(ForensicsError::InvalidParameter(format!(
                "unknown digest algorithm: {}",
                other
            ))),
        }
    }
}

/// Lowercase hex digests of one file, keyed by algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestSet(BTreeMap<DigestAlgorithm, String>);

impl DigestSet {
    pub fn get(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.0.get(&algorithm).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DigestAlgorithm, &str)> {
        self.0.iter().map(|(algorithm, hex)| (*algorithm, hex.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

enum RunningDigest {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl RunningDigest {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => RunningDigest::Md5(Md5::new()),
            DigestAlgorithm::Sha1 => RunningDigest::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => RunningDigest::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            RunningDigest::Md5(h) => h.update(bytes),
            RunningDigest::Sha1(h) => h.update(bytes),
            RunningDigest::Sha256(h) => h.update(bytes),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            RunningDigest::Md5(h) => format!("{:x}", h.finalize()),
            RunningDigest::Sha1(h) => format!("{:x}", h.finalize()),
            RunningDigest::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Streams a byte source through every requested digest in one pass.
pub struct FingerprintComputer {
    algorithms: Vec<DigestAlgorithm>,
    block_size: usize,
}

impl FingerprintComputer {
    pub fn new(algorithms: &[DigestAlgorithm]) -> Self {
        let mut algorithms = algorithms.to_vec();
        algorithms.sort();
        algorithms.dedup();

        Self {
            algorithms,
            block_size: 8192,
        }
    }

    /// Block size is floored at 4 KiB.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(crate::config::MIN_READ_BLOCK_SIZE);
        self
    }

    pub fn compute<R: Read>(&self, mut reader: R) -> Result<DigestSet> {
        let mut running = self
            .algorithms
            .iter()
            .map(|&algorithm| (algorithm, RunningDigest::new(algorithm)))
            .collect::<Vec<_>>();

        let mut buffer = vec![0u8; self.block_size];
        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            for (_, digest) in running.iter_mut() {
                digest.update(&buffer[..bytes_read]);
            }
        }

        Ok(DigestSet(
            running
                .into_iter()
                .map(|(algorithm, digest)| (algorithm, digest.finalize_hex()))
                .collect(),
        ))
    }

    pub fn compute_file<P: AsRef<Path>>(&self, path: P) -> Result<DigestSet> {
        let file = File::open(path)?;
        self.compute(file)
    }
}

impl Default for FingerprintComputer {
    fn default() -> Self {
        Self::new(&DigestAlgorithm::ALL)
    }
}
