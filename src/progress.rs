//! Progress reporting for long-running indexing work.
//!
//! The store and coordinator report through an injected sink rather
//! than optional callbacks, so the CLI can bind a progress bar and
//! tests can capture events.

/// Receives chunk-granularity progress during indexing.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, current: usize, total: usize, status: &str);
}

/// Sink that discards all events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    #[inline]
    fn on_progress(&self, _current: usize, _total: usize, _status: &str) {}
}
