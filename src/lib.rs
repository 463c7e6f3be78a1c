//! `dupsweep` finds files with identical content across directory trees and
//! removes every copy but one.
//!
//! A run walks each root directory, keeps the files that pass the
//! [`CandidateFilter`], feeds them to a [`DuplicateEngine`], and hands every
//! resulting [`DuplicateGroup`] to the [`DeletionPolicy`]. The default engine
//! buckets files by size first and only hashes files that share their size with
//! another file.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hash;
pub mod logging;
pub mod policy;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

pub use cancel::CancelToken;
pub use config::{Config, Settings};
pub use engine::{DuplicateEngine, DuplicateGroup, FileRecord, Strategy};
pub use error::{ConfigError, Error, FileError};
pub use filter::CandidateFilter;
pub use hash::{Digest, HashAlgorithm, HashFunction, Hasher};
pub use policy::{DeletionPolicy, RemovalMode};
pub use walker::TreeWalker;

use error::error_chain;

/// What a run found and did.
#[derive(Debug, Default)]
pub struct Report {
    /// Regular files seen while walking.
    pub files_seen: usize,
    /// Files that passed the candidate filter.
    pub candidates: usize,
    /// Files handed to the hash function.
    pub hashed: usize,
    pub groups: Vec<DuplicateGroup>,
    pub kept: Vec<PathBuf>,
    /// Files removed, or that would have been removed in dry-run mode.
    pub removed: Vec<PathBuf>,
    pub bytes_reclaimed: u64,
    /// Per-file problems. None of them stopped the run.
    pub errors: Vec<FileError>,
}

/// Removes duplicate files below the configured roots.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fires. Files already removed stay
/// removed; no group is left half-processed because cancellation is only
/// checked between groups. Problems with individual files never abort the
/// run, they end up in [`Report::errors`].
///
/// # Examples
///
/// ```no_run
/// use dupsweep::{remove_duplicates, CancelToken, Config, Settings};
///
/// let config = Config::from_settings(Settings::with_dirs(["/path/to/directory"])).unwrap();
/// let report = remove_duplicates(&config, &CancelToken::new()).unwrap();
///
/// println!(
///     "Removed {} duplicates, saved {} bytes",
///     report.removed.len(),
///     report.bytes_reclaimed
/// );
/// ```
pub fn remove_duplicates(config: &Config, cancel: &CancelToken) -> Result<Report, Error> {
    let hasher: Arc<dyn HashFunction> = Arc::new(config.hasher);
    let mut engine = config.strategy.build(hasher);
    let mut report = Report::default();
    debug!(
        "{} in {}-byte blocks, candidates from {} bytes",
        config.hasher.algorithm(),
        config.hasher.block_size(),
        config.filter.min_size()
    );

    for root in &config.roots {
        info!("{}", root.display());
        scan_root(config, root, engine.as_mut(), &mut report, cancel)?;
    }
    debug!(
        "{} files seen, {} candidates, {} distinct",
        report.files_seen,
        report.candidates,
        engine.len()
    );

    let resolution = match &config.pool {
        Some(pool) => pool.install(|| engine.resolve(cancel)),
        None => engine.resolve(cancel),
    }?;
    report.hashed = resolution.hashed;
    for err in resolution.skipped {
        warn!("{}", error_chain(&err));
        report.errors.push(err);
    }

    let policy = DeletionPolicy::new(config.removal);
    for group in &resolution.groups {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!(
            "{} copies of {} bytes ({:x}), {} reclaimable",
            group.records().len(),
            group.size(),
            group.digest(),
            group.reclaimable_bytes()
        );
        let outcome = policy.apply(group);
        report.kept.extend(outcome.kept);
        report.removed.extend(outcome.removed);
        report.bytes_reclaimed += outcome.bytes_reclaimed;
        report.errors.extend(outcome.errors);
    }
    report.groups = resolution.groups;

    Ok(report)
}

/// Walks one root and feeds every candidate to `engine`.
fn scan_root(
    config: &Config,
    root: &std::path::Path,
    engine: &mut dyn DuplicateEngine,
    report: &mut Report,
    cancel: &CancelToken,
) -> Result<(), Error> {
    for entry in config.walker.files(root) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let record = match entry {
            Ok(record) => record,
            Err(err) => {
                warn!("{}", error_chain(&err));
                report.errors.push(err);
                continue;
            }
        };
        report.files_seen += 1;
        if !config.filter.accepts(&record.path, record.size) {
            continue;
        }
        report.candidates += 1;
        if let Err(err) = engine.add_record(record) {
            warn!("{}", error_chain(&err));
            report.errors.push(err);
        }
    }
    Ok(())
}
