//! Progress reporting for the decimation engines.
//!
//! Engines call the reporter every `n` processed edits, where `n` is set
//! with `set_progress_bar_status`. The reporter receives the number of edits
//! done so far, the number of candidates still queued and a short message.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use whittle::algo::progress::Progress;
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = calls.clone();
//! let progress = Progress::new(move |_processed, _queued, _message| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! progress.report(10, 90, "Collapsing edges");
//! assert_eq!(calls.load(Ordering::Relaxed), 1);
//! ```

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives:
/// - `processed`: Number of edits performed so far
/// - `queued`: Number of candidates still in the priority tree
/// - `message`: Description of the current operation
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, processed: usize, queued: usize, message: &str) {
        (self.callback)(processed, queued, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
