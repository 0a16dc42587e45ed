//! Operational extraction settings.
//!
//! [`ExtractOptions`] threads progress callbacks and cancellation tokens
//! through extraction and batching methods without polluting every function
//! signature. The frame window itself (which frames, what resolution, what
//! layout) lives in [`FrameWindow`](crate::FrameWindow); this type only
//! carries the operational extras.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framefeed::{CancellationToken, ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_report_every(10);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Operational settings for dataset passes.
///
/// Carries optional progress- and cancellation-related settings. Pass a
/// reference to the `*_with_options` methods on
/// [`SequentialFrameExtractor`](crate::SequentialFrameExtractor) and to the
/// batcher constructors.
///
/// All fields have sensible defaults; a default-constructed value behaves
/// identically to the plain API.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    /// Defaults to 1 (every item).
    pub(crate) report_every: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("report_every", &self.report_every)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    ///
    /// Defaults: no progress callback, no cancellation, report every item.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            report_every: 1,
        }
    }

    /// Attach a progress callback.
    ///
    /// The callback is invoked every
    /// [`report_every`](ExtractOptions::with_report_every) items.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the running loop stops at the next frame
    /// or batch boundary and returns
    /// [`FramefeedError::Cancelled`](crate::FramefeedError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// A value of 1 means every item; 10 means every 10th item.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_report_every(mut self, every: u64) -> Self {
        self.report_every = every.max(1);
        self
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
