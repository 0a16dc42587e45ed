//! Sequential frame extraction: clips in, numeric records out.
//!
//! [`SequentialFrameExtractor`] drives a [`FrameDecoder`] session across a
//! validated [`FrameWindow`], converts each decoded picture to BGR through
//! the pixel converter, and flattens the result into one [`FrameRecord`] per
//! frame. The output is a [`FrameSequence`]: the records in frame order plus
//! an explicit list of frames that could not be decoded even after the
//! direct-access retry.
//!
//! Skips are deliberate and visible. A frame that fails both the sequential
//! decode and the fallback is recorded as a [`SkippedFrame`] with its number
//! and reason — it is never replaced with a stale duplicate and never
//! silently dropped from the count.
//!
//! # Example
//!
//! ```no_run
//! use framefeed::{ClipSource, FrameWindow, SequentialFrameExtractor};
//!
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! let extractor = SequentialFrameExtractor::new(window)?;
//!
//! let sequence = extractor.extract(&ClipSource::path("sportclip_0.mp4"))?;
//! println!(
//!     "{} records, {} skipped",
//!     sequence.records.len(),
//!     sequence.skipped.len()
//! );
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::ExtractOptions;
use crate::decoder::FrameDecoder;
use crate::error::FramefeedError;
use crate::picture::{CHANNEL_COUNT, DecodedPicture, PixelBuffer};
use crate::progress::{OperationType, ProgressTracker};
use crate::source::ClipSource;
use crate::window::{FrameWindow, SamplingPlan};

/// One frame flattened to numeric values, still in the raw [0,255] range.
///
/// Normalization to [0,1] is the batcher's job and happens exactly once,
/// when the record is placed into a mini-batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// The frame number this record was decoded from.
    pub frame_number: u64,
    /// Flattened pixel values, length `target_rows * target_columns * 3`.
    /// Layout is channel-major when the window's `ravel` flag is set,
    /// pixel-interleaved otherwise; channel order is BGR either way.
    pub values: Vec<f32>,
}

/// A frame excluded from the output after both decode attempts failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFrame {
    /// The frame that could not be decoded.
    pub frame_number: u64,
    /// Why the final attempt failed.
    pub reason: String,
}

/// The ordered result of one extraction pass over one clip.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    /// Successfully decoded records, monotonic by frame number.
    pub records: Vec<FrameRecord>,
    /// Frames excluded after the fallback also failed.
    pub skipped: Vec<SkippedFrame>,
    /// How many frames the window requested.
    pub requested: u64,
}

impl FrameSequence {
    /// `true` when every requested frame produced a record.
    pub fn is_complete(&self) -> bool {
        self.records.len() as u64 == self.requested
    }
}

/// Orchestrates decode → convert → flatten across a frame window.
///
/// The window is validated at construction, so every extraction call starts
/// from a known-good sampling plan. One extractor can be reused across any
/// number of clips; each [`extract`](SequentialFrameExtractor::extract) call
/// opens and closes its own decode session.
pub struct SequentialFrameExtractor {
    window: FrameWindow,
    plan: SamplingPlan,
}

impl SequentialFrameExtractor {
    /// Create an extractor for `window`.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if the window is contradictory
    /// (both or neither sampling mode, non-positive counts or rates).
    pub fn new(window: FrameWindow) -> Result<Self, FramefeedError> {
        let plan = window.plan()?;
        Ok(Self { window, plan })
    }

    /// The window this extractor was built with.
    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    /// How many records one extraction pass will request.
    pub fn requested_frames(&self) -> u64 {
        self.plan.requested_frames()
    }

    /// Extract the configured window from `source`.
    ///
    /// Equivalent to [`extract_with_options`](Self::extract_with_options)
    /// with default options.
    pub fn extract(&self, source: &ClipSource) -> Result<FrameSequence, FramefeedError> {
        self.extract_with_options(source, &ExtractOptions::default())
    }

    /// Extract the configured window, with progress and cancellation.
    ///
    /// The cancellation token is honored at every frame boundary.
    ///
    /// # Errors
    ///
    /// - [`FramefeedError::SourceUnreadable`] / [`FramefeedError::NoVideoStream`]
    ///   if the clip cannot be opened.
    /// - [`FramefeedError::SeekFailed`] if the initial positioning fails.
    /// - [`FramefeedError::Cancelled`] if the token fires mid-pass.
    /// - In time-based mode, any per-frame decode error (no fallback exists
    ///   there).
    pub fn extract_with_options(
        &self,
        source: &ClipSource,
        options: &ExtractOptions,
    ) -> Result<FrameSequence, FramefeedError> {
        match self.plan {
            SamplingPlan::ByCount {
                start_frame,
                frame_count,
            } => self.extract_by_count(source, options, start_frame, frame_count),
            SamplingPlan::ByTime {
                frames_per_second,
                duration_seconds,
            } => self.extract_by_time(source, options, frames_per_second, duration_seconds),
        }
    }

    fn extract_by_count(
        &self,
        source: &ClipSource,
        options: &ExtractOptions,
        start_frame: u64,
        frame_count: u64,
    ) -> Result<FrameSequence, FramefeedError> {
        let dimensions = (self.window.target_columns, self.window.target_rows);
        let mut session = FrameDecoder::open(source, dimensions)?;

        // The initial seek is the one sequencing point of the pass; a
        // failure here aborts the whole call.
        session.seek_to(start_frame)?;

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameExtraction,
            Some(frame_count),
            options.report_every,
        );

        let mut records = Vec::with_capacity(frame_count as usize);
        let mut skipped = Vec::new();

        for frame_number in start_frame..start_frame + frame_count {
            if options.is_cancelled() {
                return Err(FramefeedError::Cancelled);
            }

            let sequential = match session.next_frame() {
                Ok(Some(picture)) => Ok(picture),
                Ok(None) => Err(FramefeedError::FrameDecodeFailed {
                    frame_number,
                    reason: "stream ended before the requested window".to_string(),
                }),
                Err(error) => Err(error),
            };

            let picture = match sequential {
                Ok(picture) => Some(picture),
                Err(FramefeedError::FrameDecodeFailed { reason, .. }) => {
                    // One retry through a fresh session and a direct seek.
                    debug!(
                        "sequential decode of frame {frame_number} failed ({reason}); \
                         retrying via direct access"
                    );
                    match FrameDecoder::frame_at(source, frame_number, dimensions) {
                        Ok(picture) => Some(picture),
                        Err(fallback_error) => {
                            warn!(
                                "frame {frame_number} of {} skipped: {fallback_error}",
                                source.describe().display()
                            );
                            skipped.push(SkippedFrame {
                                frame_number,
                                reason: fallback_error.to_string(),
                            });
                            None
                        }
                    }
                }
                // Seek and open errors are not per-frame conditions.
                Err(error) => return Err(error),
            };

            if let Some(picture) = picture {
                records.push(self.flatten(frame_number, &picture)?);
            }
            tracker.advance(Some(frame_number), None);
        }
        tracker.finish();

        if !skipped.is_empty() {
            info!(
                "extracted {} of {frame_count} frames from {} ({} skipped)",
                records.len(),
                source.describe().display(),
                skipped.len()
            );
        }

        Ok(FrameSequence {
            records,
            skipped,
            requested: frame_count,
        })
    }

    fn extract_by_time(
        &self,
        source: &ClipSource,
        options: &ExtractOptions,
        frames_per_second: f64,
        duration_seconds: f64,
    ) -> Result<FrameSequence, FramefeedError> {
        let dimensions = (self.window.target_columns, self.window.target_rows);
        let mut session = FrameDecoder::open(source, dimensions)?;

        let requested = self.plan.requested_frames();
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameExtraction,
            Some(requested),
            options.report_every,
        );

        let step = 1.0 / frames_per_second;
        let mut records = Vec::with_capacity(requested as usize);

        for sample in 0..requested {
            if options.is_cancelled() {
                return Err(FramefeedError::Cancelled);
            }

            let timestamp = sample as f64 * step;
            if timestamp > duration_seconds {
                break;
            }

            // No fallback in this mode: every grab already is a direct seek.
            let picture = session.frame_at_time(timestamp)?;
            records.push(self.flatten(session.position().saturating_sub(1), &picture)?);
            tracker.advance(None, Some(Duration::from_secs_f64(timestamp)));
        }
        tracker.finish();

        Ok(FrameSequence {
            records,
            skipped: Vec::new(),
            requested,
        })
    }

    /// Convert a picture to BGR and flatten it per the window's layout flag.
    fn flatten(
        &self,
        frame_number: u64,
        picture: &DecodedPicture,
    ) -> Result<FrameRecord, FramefeedError> {
        let buffer = picture.to_bgr_buffer()?;
        let values = flatten_buffer(&buffer, self.window.ravel);
        Ok(FrameRecord {
            frame_number,
            values,
        })
    }
}

/// Flatten a BGR buffer into raw numeric values.
///
/// `ravel` selects channel-major order (all B samples, then G, then R);
/// otherwise the interleaved bytes become one long row vector as stored.
pub(crate) fn flatten_buffer(buffer: &PixelBuffer, ravel: bool) -> Vec<f32> {
    let data = buffer.data();
    if !ravel {
        return data.iter().map(|&byte| byte as f32).collect();
    }

    let pixels = data.len() / CHANNEL_COUNT;
    let mut values = Vec::with_capacity(data.len());
    for channel in 0..CHANNEL_COUNT {
        for pixel in 0..pixels {
            values.push(data[pixel * CHANNEL_COUNT + channel] as f32);
        }
    }
    values
}
