use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, detected before any directory is scanned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("hash algorithm `{0}` is not supported (available: crc32, md5, sha1, blake2b)")]
    UnknownAlgorithm(String),

    #[error("block size must be greater than zero")]
    ZeroBlockSize,

    #[error("{} is not a valid directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot resolve directory {}", .path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid file mask `{mask}`")]
    InvalidMask {
        mask: String,
        #[source]
        source: regex::Error,
    },

    #[error("no directories to scan")]
    NoRoots,

    #[error("cannot build hashing thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A failure confined to one file. The run skips the file and continues.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read directory entry")]
    Walk(#[from] ignore::Error),

    #[error("cannot read metadata of {}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot hash {}", .path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} changed size during the scan ({expected} -> {actual} bytes)", .path.display())]
    Changed {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("cannot remove {}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("kept copy {} is gone or changed, group left untouched", .path.display())]
    KeeperMissing { path: PathBuf },
}

impl FileError {
    /// The path the failure concerns, when one is known.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            FileError::Walk(err) => walk_error_path(err),
            FileError::Stat { path, .. }
            | FileError::Hash { path, .. }
            | FileError::Changed { path, .. }
            | FileError::Remove { path, .. }
            | FileError::KeeperMissing { path } => Some(path),
        }
    }
}

fn walk_error_path(err: &ignore::Error) -> Option<&std::path::Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("interrupted")]
    Cancelled,
}

/// Marker returned by the cancellable stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for Error {
    fn from(_: Cancelled) -> Self {
        Error::Cancelled
    }
}

/// Formats an error followed by its chain of causes, `outer: inner: root`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
