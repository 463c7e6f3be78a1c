use std::fs;
use std::path::PathBuf;

use log::{info, warn};

use crate::engine::DuplicateGroup;
use crate::error::{error_chain, FileError};

/// What happens to the redundant copies of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalMode {
    /// Remove them from the filesystem. There is no undo.
    #[default]
    Remove,
    /// Only report what would be removed.
    DryRun,
}

/// Result of applying the policy to one group.
#[derive(Debug, Default)]
pub struct GroupOutcome {
    pub kept: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub bytes_reclaimed: u64,
    pub errors: Vec<FileError>,
}

/// Keeps the first file of a group in path order and removes the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionPolicy {
    mode: RemovalMode,
}

impl DeletionPolicy {
    /// Creates a policy that treats redundant copies according to `mode`.
    pub fn new(mode: RemovalMode) -> Self {
        DeletionPolicy { mode }
    }

    /// Applies the policy to `group`.
    ///
    /// The keeper is checked first: if it disappeared or changed size since the
    /// scan, nothing in the group is touched. A failed removal is recorded and
    /// the remaining members are still processed.
    ///
    /// ```no_run
    /// use dupsweep::policy::{DeletionPolicy, RemovalMode};
    /// # fn groups() -> Vec<dupsweep::engine::DuplicateGroup> { Vec::new() }
    ///
    /// let policy = DeletionPolicy::new(RemovalMode::DryRun);
    /// for group in groups() {
    ///     let outcome = policy.apply(&group);
    ///     println!("{} bytes could be reclaimed", outcome.bytes_reclaimed);
    /// }
    /// ```
    pub fn apply(&self, group: &DuplicateGroup) -> GroupOutcome {
        let mut outcome = GroupOutcome::default();
        let keeper = group.keeper();

        match fs::metadata(&keeper.path) {
            Ok(metadata) if metadata.is_file() && metadata.len() == keeper.size => {}
            _ => {
                let err = FileError::KeeperMissing {
                    path: keeper.path.clone(),
                };
                warn!("{}", err);
                outcome.errors.push(err);
                return outcome;
            }
        }
        outcome.kept = Some(keeper.path.clone());

        for record in group.redundant() {
            if self.mode == RemovalMode::DryRun {
                info!("Would remove: {}", record.path.display());
                outcome.removed.push(record.path.clone());
                outcome.bytes_reclaimed += record.size;
                continue;
            }

            match fs::remove_file(&record.path) {
                Ok(()) => {
                    info!("File removed: {}", record.path.display());
                    outcome.removed.push(record.path.clone());
                    outcome.bytes_reclaimed += record.size;
                }
                Err(source) => {
                    let err = FileError::Remove {
                        path: record.path.clone(),
                        source,
                    };
                    warn!("{}", error_chain(&err));
                    outcome.errors.push(err);
                }
            }
        }

        outcome
    }
}
