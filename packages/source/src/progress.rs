//! Progress reporting for long-running pipeline stages.
//!
//! Stages report through [`ProgressCallback`] so they stay independent of
//! how (or whether) progress is rendered. The terminal implementation lives
//! in `crash_map_cli_utils`.

use std::sync::Arc;

/// Receives progress updates from a pipeline stage.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replace the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the stage as complete with a final message.
    fn finish(&self, msg: String);
}

/// Discards every update. Used by tests and non-interactive runs.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
