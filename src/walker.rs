use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};

use crate::engine::FileRecord;
use crate::error::FileError;

/// Enumerates regular files below a root directory.
///
/// `max_depth` counts directory levels below the root: 0 yields only the root's
/// direct entries, 1 also the entries of its subdirectories, and so on.
/// Directories in the exclusion list are not descended into. Symbolic links
/// are neither followed nor yielded.
#[derive(Debug, Clone, Default)]
pub struct TreeWalker {
    max_depth: usize,
    excluded: Arc<HashSet<PathBuf>>,
    respect_ignore: bool,
}

impl TreeWalker {
    /// Creates a walker that ignores no files.
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Directory levels to descend below each root
    /// * `excluded` - Canonical directories pruned with everything below them
    pub fn new(max_depth: usize, excluded: impl IntoIterator<Item = PathBuf>) -> Self {
        TreeWalker {
            max_depth,
            excluded: Arc::new(excluded.into_iter().collect()),
            respect_ignore: false,
        }
    }

    /// Also prune whatever `.gitignore`, `.ignore` and git exclude files name.
    pub fn respect_ignore_files(mut self, yes: bool) -> Self {
        self.respect_ignore = yes;
        self
    }

    pub fn is_excluded(&self, dir: &Path) -> bool {
        self.excluded.contains(dir)
    }

    /// Walks `root`, yielding one item per regular file in file-name order.
    ///
    /// Unreadable entries come out as errors so callers can report them; the
    /// walk itself carries on.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use dupsweep::walker::TreeWalker;
    ///
    /// let walker = TreeWalker::new(2, Vec::new());
    /// for entry in walker.files(Path::new("/srv/photos")) {
    ///     match entry {
    ///         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
    ///         Err(err) => eprintln!("skipped: {}", err),
    ///     }
    /// }
    /// ```
    pub fn files(&self, root: &Path) -> impl Iterator<Item = Result<FileRecord, FileError>> {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(false)
            // ignore counts the root itself as depth 0
            .max_depth(Some(self.max_depth.saturating_add(1)))
            .sort_by_file_name(|a, b| a.cmp(b));

        if self.respect_ignore {
            builder
                .ignore(true)
                .parents(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                // roots are rarely git checkouts
                .require_git(false);
        }

        let excluded = Arc::clone(&self.excluded);
        builder.filter_entry(move |entry| !is_excluded_dir(entry, &excluded));

        builder.build().filter_map(|entry| match entry {
            Ok(entry) => file_record(&entry),
            Err(err) => Some(Err(FileError::Walk(err))),
        })
    }
}

fn is_excluded_dir(entry: &DirEntry, excluded: &HashSet<PathBuf>) -> bool {
    entry.file_type().map_or(false, |t| t.is_dir()) && excluded.contains(entry.path())
}

fn file_record(entry: &DirEntry) -> Option<Result<FileRecord, FileError>> {
    if !entry.file_type()?.is_file() {
        return None;
    }
    let record = entry
        .metadata()
        .map(|metadata| FileRecord::new(entry.path(), metadata.len()))
        .map_err(FileError::Walk);
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, relative).unwrap();
        path
    }

    fn collect(walker: &TreeWalker, root: &Path) -> Vec<PathBuf> {
        walker
            .files(root)
            .map(|entry| entry.unwrap().path)
            .collect()
    }

    #[test]
    fn depth_counts_levels_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let top = touch(dir.path(), "top");
        let one = touch(dir.path(), "a/one");
        let two = touch(dir.path(), "a/b/two");

        assert_eq!(collect(&TreeWalker::new(0, Vec::new()), dir.path()), vec![top.clone()]);
        assert_eq!(
            collect(&TreeWalker::new(1, Vec::new()), dir.path()),
            vec![one.clone(), top.clone()]
        );
        assert_eq!(
            collect(&TreeWalker::new(2, Vec::new()), dir.path()),
            vec![two, one, top]
        );
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let kept = touch(dir.path(), "keep/file");
        touch(dir.path(), "skip/file");
        touch(dir.path(), "skip/deeper/file");

        let walker = TreeWalker::new(5, vec![dir.path().join("skip")]);
        assert!(walker.is_excluded(&dir.path().join("skip")));
        assert_eq!(collect(&walker, dir.path()), vec![kept]);
    }

    #[test]
    fn hidden_files_are_visited_and_sizes_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = touch(dir.path(), ".hidden");
        let records: Vec<FileRecord> = TreeWalker::new(0, Vec::new())
            .files(dir.path())
            .map(Result::unwrap)
            .collect();
        assert_eq!(records, vec![FileRecord::new(hidden, 7)]);
    }

    #[test]
    fn ignore_files_apply_without_a_git_repository() {
        let dir = tempfile::tempdir().unwrap();
        let kept = touch(dir.path(), "kept.txt");
        let skipped = touch(dir.path(), "skipped.txt");
        let rules = dir.path().join(".ignore");
        fs::write(&rules, "skipped.txt\n").unwrap();

        let plain = collect(&TreeWalker::new(0, Vec::new()), dir.path());
        assert!(plain.contains(&skipped));

        let walker = TreeWalker::new(0, Vec::new()).respect_ignore_files(true);
        assert_eq!(collect(&walker, dir.path()), vec![rules, kept]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_yielded() {
        let dir = tempfile::tempdir().unwrap();
        let target = touch(dir.path(), "real");
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();
        assert_eq!(collect(&TreeWalker::new(0, Vec::new()), dir.path()), vec![target]);
    }
}
