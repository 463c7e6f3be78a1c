use std::path::Path;

use regex::RegexSet;

use crate::error::ConfigError;

/// Decides which files take part in duplicate detection.
///
/// A file is a candidate when it is at least `min_size` bytes long and, if any
/// masks are configured, its file name is matched by at least one of them.
/// Masks are regular expressions searched anywhere in the name; a mask that only
/// makes sense as a shell glob (`*.txt`) is matched as a glob against the whole
/// name instead.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    min_size: u64,
    masks: Option<RegexSet>,
}

impl CandidateFilter {
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use dupsweep::filter::CandidateFilter;
    ///
    /// let filter = CandidateFilter::new(1, &["*.txt".to_string()]).unwrap();
    /// assert!(filter.accepts(Path::new("notes/a.txt"), 10));
    /// assert!(!filter.accepts(Path::new("notes/a.log"), 10));
    /// assert!(!filter.accepts(Path::new("notes/empty.txt"), 0));
    /// ```
    pub fn new(min_size: u64, masks: &[String]) -> Result<Self, ConfigError> {
        let masks = if masks.is_empty() {
            None
        } else {
            let patterns = masks
                .iter()
                .map(|mask| compile_mask(mask))
                .collect::<Result<Vec<_>, _>>()?;
            let set = RegexSet::new(&patterns).map_err(|source| ConfigError::InvalidMask {
                mask: masks.join(" "),
                source,
            })?;
            Some(set)
        };

        Ok(CandidateFilter { min_size, masks })
    }

    /// Smallest accepted size, in bytes.
    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    pub fn accepts(&self, path: &Path, size: u64) -> bool {
        if size < self.min_size {
            return false;
        }
        match (&self.masks, path.file_name()) {
            (None, _) => true,
            (Some(masks), Some(name)) => masks.is_match(&name.to_string_lossy()),
            (Some(_), None) => false,
        }
    }
}

/// Turns one mask into the regex source used by the filter.
fn compile_mask(mask: &str) -> Result<String, ConfigError> {
    match regex::Regex::new(mask) {
        Ok(_) => Ok(mask.to_owned()),
        Err(source) if mask.contains(['*', '?']) => {
            log::debug!("mask `{}` is not a regex ({}), matching it as a glob", mask, source);
            Ok(glob_to_regex(mask))
        }
        Err(source) => Err(ConfigError::InvalidMask {
            mask: mask.to_owned(),
            source,
        }),
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    let mut literal = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut literal))),
        }
    }
    pattern.push('$');
    pattern
}
