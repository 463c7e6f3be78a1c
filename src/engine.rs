//! Duplicate-detection engines.
//!
//! Two interchangeable strategies share the [`DuplicateEngine`] interface:
//!
//! * [`SizeFirstEngine`] (default) only records sizes on ingestion and hashes
//!   nothing until [`DuplicateEngine::resolve`], and then only files that share
//!   their size with at least one other file.
//! * [`HashFirstEngine`] hashes every file as it is added.
//!
//! Both return groups ordered by size, then by the path of their first member,
//! with members ordered by path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::{Cancelled, FileError};
use crate::hash::{Digest, HashFunction};

/// A candidate file and the size it had when it was scanned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
}

impl FileRecord {
    /// Creates a record for `path` without touching the filesystem.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the file as it was found by the walk
    /// * `size` - Size in bytes observed during the scan
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        FileRecord {
            path: path.into(),
            size,
        }
    }

    /// Reads the size of `path` from the filesystem.
    pub fn stat(path: &Path) -> Result<Self, FileError> {
        let metadata = fs::metadata(path).map_err(|source| FileError::Stat {
            path: path.to_owned(),
            source,
        })?;
        Ok(FileRecord::new(path, metadata.len()))
    }
}

/// Two or more files with the same size and digest, ordered by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    size: u64,
    digest: Digest,
    records: Vec<FileRecord>,
}

impl DuplicateGroup {
    fn new(size: u64, digest: Digest, mut records: Vec<FileRecord>) -> Self {
        records.sort();
        DuplicateGroup {
            size,
            digest,
            records,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.records.iter().map(|record| record.path.as_path())
    }

    /// The copy that is kept: the first member in path order.
    pub fn keeper(&self) -> &FileRecord {
        &self.records[0]
    }

    /// Every member except the keeper.
    pub fn redundant(&self) -> &[FileRecord] {
        &self.records[1..]
    }

    /// Bytes freed by removing every redundant copy.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * self.redundant().len() as u64
    }
}

/// Outcome of [`DuplicateEngine::resolve`].
#[derive(Debug, Default)]
pub struct Resolution {
    pub groups: Vec<DuplicateGroup>,
    /// Files that could not be confirmed as duplicates and were left out.
    pub skipped: Vec<FileError>,
    /// Number of files handed to the hash function. Files refused because
    /// they vanished or changed size before hashing are not counted.
    pub hashed: usize,
}

/// Grouping strategy shared by both engines.
pub trait DuplicateEngine: Send + Sync {
    /// Ingests a candidate. Adding a path that is already known is a no-op.
    fn add_record(&mut self, record: FileRecord) -> Result<(), FileError>;

    /// Ingests a candidate, reading its size from the filesystem.
    fn add(&mut self, path: &Path) -> Result<(), FileError> {
        let record = FileRecord::stat(path)?;
        self.add_record(record)
    }

    /// Number of distinct files ingested so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the duplicate groups. Ingested state is left untouched, so a
    /// cancelled resolve can be retried.
    fn resolve(&self, cancel: &CancelToken) -> Result<Resolution, Cancelled>;
}

/// Which engine a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    SizeFirst,
    HashFirst,
}

impl Strategy {
    /// Creates an empty engine of this kind.
    ///
    /// # Arguments
    ///
    /// * `hasher` - Content hash used to confirm duplicates, shared with the
    ///   worker threads
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use dupsweep::engine::{DuplicateEngine, Strategy};
    /// use dupsweep::hash::{HashAlgorithm, Hasher};
    ///
    /// # fn main() -> Result<(), dupsweep::ConfigError> {
    /// let hasher = Hasher::with_block_size(HashAlgorithm::Md5, 4096)?;
    /// let engine = Strategy::HashFirst.build(Arc::new(hasher));
    /// assert!(engine.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self, hasher: Arc<dyn HashFunction>) -> Box<dyn DuplicateEngine> {
        match self {
            Strategy::SizeFirst => Box::new(SizeFirstEngine::new(hasher)),
            Strategy::HashFirst => Box::new(HashFirstEngine::new(hasher)),
        }
    }
}

/// Buckets files by size and hashes only buckets with two or more members.
pub struct SizeFirstEngine {
    hasher: Arc<dyn HashFunction>,
    buckets: BTreeMap<u64, BTreeSet<PathBuf>>,
    seen: HashSet<PathBuf>,
}

impl SizeFirstEngine {
    /// Creates an empty engine. Nothing is hashed before [`DuplicateEngine::resolve`].
    pub fn new(hasher: Arc<dyn HashFunction>) -> Self {
        SizeFirstEngine {
            hasher,
            buckets: BTreeMap::new(),
            seen: HashSet::new(),
        }
    }
}

impl DuplicateEngine for SizeFirstEngine {
    fn add_record(&mut self, record: FileRecord) -> Result<(), FileError> {
        if !self.seen.insert(record.path.clone()) {
            trace!("{} already ingested", record.path.display());
            return Ok(());
        }
        self.buckets.entry(record.size).or_default().insert(record.path);
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn resolve(&self, cancel: &CancelToken) -> Result<Resolution, Cancelled> {
        let candidates: Vec<FileRecord> = self
            .buckets
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .flat_map(|(&size, paths)| paths.iter().map(move |path| FileRecord::new(path, size)))
            .collect();

        debug!(
            "{} size buckets, {} files share their size with another file",
            self.buckets.len(),
            candidates.len()
        );

        // worker threads meet in the map; order is restored by sort_groups
        let by_digest: DashMap<(u64, Digest), Vec<FileRecord>> = DashMap::new();
        let outcomes: Vec<Result<Pass, Cancelled>> = candidates
            .into_par_iter()
            .map(|record| {
                if cancel.is_cancelled() {
                    return Err(Cancelled);
                }
                if let Err(err) = check_unchanged(&record) {
                    return Ok(Pass::Refused(err));
                }
                match digest_record(self.hasher.as_ref(), &record) {
                    Ok(digest) => {
                        by_digest.entry((record.size, digest)).or_default().push(record);
                        Ok(Pass::Hashed)
                    }
                    Err(err) => Ok(Pass::HashFailed(err)),
                }
            })
            .collect();

        let mut resolution = Resolution::default();
        for outcome in outcomes {
            match outcome? {
                Pass::Hashed => resolution.hashed += 1,
                Pass::HashFailed(err) => {
                    resolution.hashed += 1;
                    resolution.skipped.push(err);
                }
                Pass::Refused(err) => resolution.skipped.push(err),
            }
        }

        resolution.groups = by_digest
            .into_iter()
            .filter(|(_, records)| records.len() > 1)
            .map(|((size, digest), records)| DuplicateGroup::new(size, digest, records))
            .collect();
        sort_groups(&mut resolution.groups);
        sort_skipped(&mut resolution.skipped);

        Ok(resolution)
    }
}

/// Hashes every file on ingestion and groups by digest, then by size.
pub struct HashFirstEngine {
    hasher: Arc<dyn HashFunction>,
    by_digest: BTreeMap<Digest, BTreeSet<FileRecord>>,
    seen: HashSet<PathBuf>,
    hashed: usize,
}

impl HashFirstEngine {
    /// Creates an empty engine that digests each file inside [`DuplicateEngine::add_record`].
    pub fn new(hasher: Arc<dyn HashFunction>) -> Self {
        HashFirstEngine {
            hasher,
            by_digest: BTreeMap::new(),
            seen: HashSet::new(),
            hashed: 0,
        }
    }
}

impl DuplicateEngine for HashFirstEngine {
    fn add_record(&mut self, record: FileRecord) -> Result<(), FileError> {
        if self.seen.contains(&record.path) {
            trace!("{} already ingested", record.path.display());
            return Ok(());
        }
        check_unchanged(&record)?;
        self.hashed += 1;
        let digest = digest_record(self.hasher.as_ref(), &record)?;
        self.seen.insert(record.path.clone());
        self.by_digest.entry(digest).or_default().insert(record);
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn resolve(&self, cancel: &CancelToken) -> Result<Resolution, Cancelled> {
        let mut resolution = Resolution {
            hashed: self.hashed,
            ..Resolution::default()
        };

        for (digest, records) in &self.by_digest {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if records.len() < 2 {
                continue;
            }
            // equal digests with different sizes are never duplicates
            let mut by_size: BTreeMap<u64, Vec<FileRecord>> = BTreeMap::new();
            for record in records {
                by_size.entry(record.size).or_default().push(record.clone());
            }
            resolution.groups.extend(
                by_size
                    .into_iter()
                    .filter(|(_, members)| members.len() > 1)
                    .map(|(size, members)| DuplicateGroup::new(size, digest.clone(), members)),
            );
        }
        sort_groups(&mut resolution.groups);

        Ok(resolution)
    }
}

/// How one candidate fared in the size-first hashing pass.
enum Pass {
    Hashed,
    HashFailed(FileError),
    /// Vanished or changed size, so the hash function never saw it.
    Refused(FileError),
}

/// Fails when the file behind `record` is gone or no longer has the scanned size.
fn check_unchanged(record: &FileRecord) -> Result<(), FileError> {
    let current = FileRecord::stat(&record.path)?;
    if current.size != record.size {
        return Err(FileError::Changed {
            path: record.path.clone(),
            expected: record.size,
            actual: current.size,
        });
    }
    Ok(())
}

fn digest_record(hasher: &dyn HashFunction, record: &FileRecord) -> Result<Digest, FileError> {
    trace!("hashing {}", record.path.display());
    hasher.digest(&record.path).map_err(|source| FileError::Hash {
        path: record.path.clone(),
        source,
    })
}

fn sort_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        a.size
            .cmp(&b.size)
            .then_with(|| a.keeper().path.cmp(&b.keeper().path))
    });
}

fn sort_skipped(skipped: &mut [FileError]) {
    skipped.sort_by(|a, b| a.path().cmp(&b.path()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashAlgorithm, Hasher};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Wraps a real hasher and remembers which paths it was asked to hash.
    struct CountingHasher {
        inner: Hasher,
        calls: AtomicUsize,
        paths: Mutex<Vec<PathBuf>>,
    }

    impl CountingHasher {
        fn new() -> Arc<Self> {
            Arc::new(CountingHasher {
                inner: Hasher::with_block_size(HashAlgorithm::Md5, 64).unwrap(),
                calls: AtomicUsize::new(0),
                paths: Mutex::new(Vec::new()),
            })
        }
    }

    impl HashFunction for CountingHasher {
        fn digest(&self, path: &Path) -> io::Result<Digest> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().unwrap().push(path.to_owned());
            self.inner.digest(path)
        }
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn ingest(engine: &mut dyn DuplicateEngine, paths: &[&PathBuf]) {
        for path in paths {
            engine.add(path).unwrap();
        }
    }

    fn group_paths(resolution: &Resolution) -> Vec<Vec<PathBuf>> {
        resolution
            .groups
            .iter()
            .map(|group| group.paths().map(Path::to_path_buf).collect())
            .collect()
    }

    #[test]
    fn groups_identical_content_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"same bytes");
        let b = write(&dir, "b", b"same bytes");
        let c = write(&dir, "c", b"diff bytes");
        let d = write(&dir, "d", b"unique content of another size");

        for strategy in [Strategy::SizeFirst, Strategy::HashFirst] {
            let mut engine = strategy.build(CountingHasher::new());
            ingest(engine.as_mut(), &[&d, &c, &b, &a]);
            let resolution = engine.resolve(&CancelToken::new()).unwrap();
            assert_eq!(group_paths(&resolution), vec![vec![a.clone(), b.clone()]]);
            assert_eq!(resolution.groups[0].keeper().path, a);
            assert_eq!(resolution.groups[0].size(), 10);
        }
    }

    #[test]
    fn unique_sizes_are_never_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let lonely = write(&dir, "lonely", b"only file of this size");
        let x = write(&dir, "x", b"12345");
        let y = write(&dir, "y", b"54321");

        let hasher = CountingHasher::new();
        let mut engine = SizeFirstEngine::new(hasher.clone());
        ingest(&mut engine, &[&lonely, &x, &y]);
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 0);

        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert!(resolution.groups.is_empty());
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolution.hashed, 2);
        assert!(!hasher.paths.lock().unwrap().contains(&lonely));
    }

    #[test]
    fn each_file_is_hashed_once_even_when_added_twice() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"dup");
        let b = write(&dir, "b", b"dup");

        for strategy in [Strategy::SizeFirst, Strategy::HashFirst] {
            let hasher = CountingHasher::new();
            let mut engine = strategy.build(hasher.clone());
            ingest(engine.as_mut(), &[&a, &b, &a, &b]);
            assert_eq!(engine.len(), 2);
            let resolution = engine.resolve(&CancelToken::new()).unwrap();
            assert_eq!(hasher.calls.load(Ordering::SeqCst), 2);
            assert_eq!(group_paths(&resolution), vec![vec![a.clone(), b.clone()]]);
        }
    }

    #[test]
    fn groups_are_ordered_by_size_then_path() {
        let dir = tempfile::tempdir().unwrap();
        let big1 = write(&dir, "a/big", b"bigger content");
        let big2 = write(&dir, "b/big", b"bigger content");
        let small1 = write(&dir, "z/small", b"tiny");
        let small2 = write(&dir, "y/small", b"tiny");
        let other1 = write(&dir, "m/other", b"TINY");
        let other2 = write(&dir, "c/other", b"TINY");

        let mut engine = SizeFirstEngine::new(CountingHasher::new());
        ingest(&mut engine, &[&small1, &big2, &other1, &big1, &small2, &other2]);
        let resolution = engine.resolve(&CancelToken::new()).unwrap();

        assert_eq!(
            group_paths(&resolution),
            vec![
                vec![other2, other1],
                vec![small2, small1],
                vec![big1, big2],
            ]
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..12)
            .map(|i| write(&dir, &format!("f{:02}", i), format!("content {}", i % 3).as_bytes()))
            .collect();

        let mut engine = SizeFirstEngine::new(CountingHasher::new());
        for path in files.iter().rev() {
            engine.add(path).unwrap();
        }
        let first = engine.resolve(&CancelToken::new()).unwrap();
        let second = engine.resolve(&CancelToken::new()).unwrap();
        assert_eq!(first.groups, second.groups);
        assert_eq!(first.groups.len(), 3);
        assert_eq!(first.groups[0].keeper().path, files[0]);
    }

    #[test]
    fn file_changed_after_scan_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"abcd");
        let b = write(&dir, "b", b"abcd");
        let c = write(&dir, "c", b"abcd");

        let hasher = CountingHasher::new();
        let mut engine = SizeFirstEngine::new(hasher.clone());
        ingest(&mut engine, &[&a, &b, &c]);
        fs::write(&c, b"abcdef").unwrap();

        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert_eq!(group_paths(&resolution), vec![vec![a, b]]);
        assert_eq!(resolution.hashed, 2);
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            &resolution.skipped[..],
            [FileError::Changed { path, expected: 4, actual: 6 }] if *path == c
        ));
    }

    #[test]
    fn vanished_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"xy");
        let b = write(&dir, "b", b"xy");

        let mut engine = SizeFirstEngine::new(CountingHasher::new());
        ingest(&mut engine, &[&a, &b]);
        fs::remove_file(&b).unwrap();

        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert!(resolution.groups.is_empty());
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].path(), Some(b.as_path()));
        assert_eq!(resolution.hashed, 1);
    }

    #[test]
    fn cancelled_resolve_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"same");
        let b = write(&dir, "b", b"same");

        let mut engine = SizeFirstEngine::new(CountingHasher::new());
        ingest(&mut engine, &[&a, &b]);

        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(engine.resolve(&cancel).unwrap_err(), Cancelled);
        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert_eq!(resolution.groups.len(), 1);
    }

    #[test]
    fn hash_first_does_not_group_across_sizes() {
        /// Maps every file to the same digest.
        struct ConstantHasher;

        impl HashFunction for ConstantHasher {
            fn digest(&self, _: &Path) -> io::Result<Digest> {
                Hasher::with_block_size(HashAlgorithm::Crc32, 1)
                    .unwrap()
                    .digest_reader(io::empty())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"1");
        let b = write(&dir, "b", b"22");
        let c = write(&dir, "c", b"33");

        let mut engine = HashFirstEngine::new(Arc::new(ConstantHasher));
        ingest(&mut engine, &[&a, &b, &c]);
        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert_eq!(group_paths(&resolution), vec![vec![b, c]]);
    }

    #[test]
    fn hash_first_reports_unreadable_file_on_add() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = HashFirstEngine::new(CountingHasher::new());
        let err = engine
            .add_record(FileRecord::new(dir.path().join("missing"), 3))
            .unwrap_err();
        assert!(matches!(err, FileError::Stat { .. }));
        assert!(engine.is_empty());
    }

    #[test]
    fn hash_first_counts_only_files_it_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"same");
        let b = write(&dir, "b", b"same");
        let grown = write(&dir, "grown", b"longer now");

        let hasher = CountingHasher::new();
        let mut engine = HashFirstEngine::new(hasher.clone());
        ingest(&mut engine, &[&a, &b]);
        let err = engine
            .add_record(FileRecord::new(&grown, 4))
            .unwrap_err();
        assert!(matches!(err, FileError::Changed { expected: 4, actual: 10, .. }));
        assert!(engine
            .add_record(FileRecord::new(dir.path().join("missing"), 4))
            .is_err());

        let resolution = engine.resolve(&CancelToken::new()).unwrap();
        assert_eq!(resolution.hashed, 2);
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(group_paths(&resolution), vec![vec![a, b]]);
    }
}
