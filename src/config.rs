//! Validated run configuration.
//!
//! [`Settings`] holds options as the user wrote them; [`Config::from_settings`]
//! checks every one of them before a single directory is opened, so a bad
//! option can never cause a partial run.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::engine::Strategy;
use crate::error::ConfigError;
use crate::filter::CandidateFilter;
use crate::hash::{HashAlgorithm, Hasher, DEFAULT_BLOCK_SIZE};
use crate::policy::RemovalMode;
use crate::walker::TreeWalker;

/// Unvalidated options, defaults matching the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dirs: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
    pub depth: usize,
    pub min_size: u64,
    pub masks: Vec<String>,
    pub block_size: usize,
    pub hash_algorithm: String,
    pub strategy: Strategy,
    pub removal: RemovalMode,
    pub respect_ignore: bool,
    /// Hashing threads, 0 leaves the choice to rayon.
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dirs: Vec::new(),
            exclude: Vec::new(),
            depth: 0,
            min_size: 1,
            masks: Vec::new(),
            block_size: DEFAULT_BLOCK_SIZE,
            hash_algorithm: HashAlgorithm::default().to_string(),
            strategy: Strategy::default(),
            removal: RemovalMode::default(),
            respect_ignore: false,
            jobs: 0,
        }
    }
}

impl Settings {
    pub fn with_dirs<P: Into<PathBuf>>(dirs: impl IntoIterator<Item = P>) -> Self {
        Settings {
            dirs: dirs.into_iter().map(Into::into).collect(),
            ..Settings::default()
        }
    }
}

/// Everything a run needs, already checked.
#[derive(Debug, Clone)]
pub struct Config {
    pub roots: Vec<PathBuf>,
    pub walker: TreeWalker,
    pub filter: CandidateFilter,
    pub hasher: Hasher,
    pub strategy: Strategy,
    pub removal: RemovalMode,
    /// Dedicated hashing pool for `--jobs N`; `None` runs on rayon's global pool.
    pub pool: Option<Arc<ThreadPool>>,
}

impl Config {
    /// Validates `settings`.
    ///
    /// # Errors
    ///
    /// Unknown hash algorithm, zero block size, an invalid mask, a missing
    /// directory list, a directory or exclusion that does not exist or is not
    /// a directory, or a hashing thread pool that cannot be started.
    ///
    /// ```no_run
    /// use dupsweep::config::{Config, Settings};
    ///
    /// let mut settings = Settings::with_dirs(["/srv/photos"]);
    /// settings.block_size = 0;
    /// assert!(Config::from_settings(settings).is_err());
    /// ```
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let algorithm: HashAlgorithm = settings.hash_algorithm.parse()?;
        let hasher = Hasher::with_block_size(algorithm, settings.block_size)?;
        let filter = CandidateFilter::new(settings.min_size, &settings.masks)?;

        if settings.dirs.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        let roots = settings
            .dirs
            .iter()
            .map(|dir| resolve_dir(dir))
            .collect::<Result<Vec<_>, _>>()?;
        let excluded = settings
            .exclude
            .iter()
            .map(|dir| resolve_dir(dir))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("roots: {:?}, excluded: {:?}", roots, excluded);

        let pool = match NonZeroUsize::new(settings.jobs) {
            Some(jobs) => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(jobs.get())
                    .thread_name(|i| format!("dupsweep-hash-{}", i))
                    .build()?,
            )),
            None => None,
        };

        Ok(Config {
            roots,
            walker: TreeWalker::new(settings.depth, excluded)
                .respect_ignore_files(settings.respect_ignore),
            filter,
            hasher,
            strategy: settings.strategy,
            removal: settings.removal,
            pool,
        })
    }
}

/// Checks that `dir` is a directory and returns its canonical form, which is
/// what the walker compares exclusions against.
fn resolve_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_owned()));
    }
    fs::canonicalize(dir).map_err(|source| ConfigError::Unresolvable {
        path: dir.to_owned(),
        source,
    })
}
