use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;

use blake2::{Blake2b512, Digest as _};
use md5::Md5;
use sha1::Sha1;

use crate::error::ConfigError;

/// Default read block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Hashing algorithms a run can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Crc32,
    Md5,
    Sha1,
    Blake2b,
}

impl HashAlgorithm {
    /// Width in bytes of the digests this algorithm produces.
    pub const fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Crc32 => 4,
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Blake2b => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Crc32 => "crc32",
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Blake2b => "blake2b",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crc32" => Ok(HashAlgorithm::Crc32),
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "blake2b" => Ok(HashAlgorithm::Blake2b),
            other => Err(ConfigError::UnknownAlgorithm(other.to_owned())),
        }
    }
}

/// Content digest of a file.
///
/// The length always equals [`HashAlgorithm::digest_len`] of the algorithm that
/// produced it, so digests of one run are directly comparable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:x})", self)
    }
}

/// Maps a file's content to a [`Digest`].
///
/// Implementations must be deterministic for the lifetime of a run and safe to
/// call from several hashing threads at once.
pub trait HashFunction: Send + Sync {
    fn digest(&self, path: &Path) -> io::Result<Digest>;
}

/// Streaming file hasher reading fixed-size blocks.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    block_size: NonZeroUsize,
}

impl Hasher {
    /// Creates a hasher that reads files `block_size` bytes at a time.
    ///
    /// # Arguments
    ///
    /// * `algorithm` - Digest to compute
    /// * `block_size` - Read buffer size; the digest does not depend on it
    pub fn new(algorithm: HashAlgorithm, block_size: NonZeroUsize) -> Self {
        Hasher {
            algorithm,
            block_size,
        }
    }

    /// Builds a hasher from an unchecked block size, rejecting zero.
    pub fn with_block_size(
        algorithm: HashAlgorithm,
        block_size: usize,
    ) -> Result<Self, ConfigError> {
        let block_size = NonZeroUsize::new(block_size).ok_or(ConfigError::ZeroBlockSize)?;
        Ok(Hasher::new(algorithm, block_size))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn block_size(&self) -> NonZeroUsize {
        self.block_size
    }

    /// Hashes everything `reader` yields until end of stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    /// use dupsweep::hash::{HashAlgorithm, Hasher};
    ///
    /// let hasher = Hasher::new(HashAlgorithm::Crc32, NonZeroUsize::new(2).unwrap());
    /// let digest = hasher.digest_reader(&b"123456789"[..]).unwrap();
    /// assert_eq!(format!("{:x}", digest), "cbf43926");
    /// ```
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut state = State::new(self.algorithm);
        let mut buffer = vec![0; self.block_size.get()];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            state.update(&buffer[..bytes_read]);
        }

        Ok(state.finalize())
    }
}

impl HashFunction for Hasher {
    fn digest(&self, path: &Path) -> io::Result<Digest> {
        self.digest_reader(File::open(path)?)
    }
}

enum State {
    Crc32(crc32fast::Hasher),
    Md5(Md5),
    Sha1(Sha1),
    Blake2b(Blake2b512),
}

impl State {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Crc32 => State::Crc32(crc32fast::Hasher::new()),
            HashAlgorithm::Md5 => State::Md5(Md5::new()),
            HashAlgorithm::Sha1 => State::Sha1(Sha1::new()),
            HashAlgorithm::Blake2b => State::Blake2b(Blake2b512::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            State::Crc32(h) => h.update(chunk),
            State::Md5(h) => h.update(chunk),
            State::Sha1(h) => h.update(chunk),
            State::Blake2b(h) => h.update(chunk),
        }
    }

    fn finalize(self) -> Digest {
        let bytes = match self {
            // big-endian so the hex form reads like the usual checksum notation
            State::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            State::Md5(h) => h.finalize().to_vec(),
            State::Sha1(h) => h.finalize().to_vec(),
            State::Blake2b(h) => h.finalize().to_vec(),
        };
        Digest(bytes)
    }
}
