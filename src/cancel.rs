//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared flag checked between files by the walker, the
//! engines and the deletion policy. It is never checked in the middle of hashing
//! a file, so cancelling leaves the in-memory grouping state consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + SIGINT.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Installs a Ctrl+C handler that cancels the returned token.
///
/// Can only be called once per process.
///
/// ```no_run
/// let cancel = dupsweep::cancel::install_ctrlc_handler().unwrap();
/// assert!(!cancel.is_cancelled());
/// ```
pub fn install_ctrlc_handler() -> Result<CancelToken, ctrlc::Error> {
    let token = CancelToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        if !handler_token.is_cancelled() {
            warn!("Interrupted, finishing the current file...");
        }
        handler_token.cancel();
    })?;
    Ok(token)
}
