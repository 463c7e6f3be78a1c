use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use dupsweep::config::Settings;
use dupsweep::engine::Strategy;
use dupsweep::hash::DEFAULT_BLOCK_SIZE;
use dupsweep::policy::RemovalMode;

/// Find files with identical content and remove every copy but one.
///
/// In each group of identical files the first one in path order is kept.
/// Removed files are gone for good.
#[derive(Debug, Parser)]
#[command(name = "dupsweep", version, about)]
// `-h` selects the hash algorithm, so help is long-only
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Directories to scan
    #[arg(short, long = "dir", value_name = "DIR", num_args = 1.., required = true)]
    pub dirs: Vec<PathBuf>,

    /// Directories to leave out, with everything below them
    #[arg(short, long, value_name = "DIR", num_args = 1..)]
    pub exclude: Vec<PathBuf>,

    /// How many directory levels below each root to descend (0 = root only)
    #[arg(long, default_value_t = 0)]
    pub depth: usize,

    /// Smallest file size to consider, in bytes
    #[arg(short = 's', long = "minsize", default_value_t = 1)]
    pub min_size: u64,

    /// File name patterns (regular expressions, or globs like `*.txt`); any match selects the file
    #[arg(short, long = "mask", value_name = "PATTERN", num_args = 1..)]
    pub masks: Vec<String>,

    /// Read block size for hashing, in bytes
    #[arg(short, long = "block", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Hashing algorithm: crc32, md5, sha1 or blake2b
    #[arg(short = 'h', long = "hashalg", value_name = "ALG", default_value = "crc32")]
    pub hash_algorithm: String,

    /// Grouping strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::SizeFirst)]
    pub strategy: StrategyArg,

    /// Report duplicates without removing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip files named by .gitignore, .ignore and git exclude files
    #[arg(long)]
    pub respect_ignore: bool,

    /// Hashing threads (0 = one per CPU)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Bucket by size, hash only files sharing a size
    SizeFirst,
    /// Hash every file while scanning
    HashFirst,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::SizeFirst => Strategy::SizeFirst,
            StrategyArg::HashFirst => Strategy::HashFirst,
        }
    }
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            dirs: self.dirs.clone(),
            exclude: self.exclude.clone(),
            depth: self.depth,
            min_size: self.min_size,
            masks: self.masks.clone(),
            block_size: self.block_size,
            hash_algorithm: self.hash_algorithm.clone(),
            strategy: self.strategy.into(),
            removal: if self.dry_run {
                RemovalMode::DryRun
            } else {
                RemovalMode::Remove
            },
            respect_ignore: self.respect_ignore,
            jobs: self.jobs,
        }
    }
}
