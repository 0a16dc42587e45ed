//! Frame window configuration.
//!
//! A [`FrameWindow`] describes which frames to pull out of a clip and what
//! shape the resulting numeric records should take. Two sampling modes exist,
//! and exactly one must be active:
//!
//! - **Frame-count mode**: decode `frame_count` consecutive frames starting at
//!   `start_frame`. This is the mode used for sequence (recurrent) training
//!   data, where every clip contributes a fixed-length run of frames.
//! - **Time-based mode**: sample the clip at a fixed rate, grabbing the frame
//!   nearest each timestamp from 0 to the clip duration. Used for sparse
//!   sampling of long clips.
//!
//! Setting both modes, or neither, is a configuration error reported before
//! any file is touched.
//!
//! # Example
//!
//! ```
//! use framefeed::{FrameWindow, FramefeedError};
//!
//! // Ten frames per clip, shrunk to the training resolution.
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! window.validate()?;
//! assert_eq!(window.record_len(), 168 * 168 * 3);
//!
//! // Two frames per second across a 30-second clip.
//! let sampled = FrameWindow::timed(2.0, 30.0).with_target_size(64, 64);
//! sampled.validate()?;
//! # Ok::<(), FramefeedError>(())
//! ```

use crate::error::FramefeedError;
use crate::picture::CHANNEL_COUNT;

/// Configuration for one extraction pass over a clip.
///
/// Construct with [`FrameWindow::frames`] or [`FrameWindow::timed`], then
/// adjust with the `with_*` methods. The default target resolution is the
/// 168×168 used by the sports-clip research models; override it with
/// [`with_target_size`](FrameWindow::with_target_size).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    /// First frame to decode (frame-count mode only; time-based sampling
    /// always starts at the beginning of the clip).
    pub start_frame: u64,
    /// Number of consecutive frames to decode. Mutually exclusive with
    /// time-based sampling.
    pub frame_count: Option<u64>,
    /// Sampling rate in frames per second of clip time. Mutually exclusive
    /// with `frame_count`.
    pub frames_per_second_sample: Option<f64>,
    /// Clip duration in seconds, bounding time-based sampling. Required in
    /// time-based mode.
    pub clip_duration_seconds: Option<f64>,
    /// Output height in pixels. Decoded frames are scaled to this size.
    pub target_rows: u32,
    /// Output width in pixels.
    pub target_columns: u32,
    /// Flattening layout: `true` lays out each channel plane contiguously
    /// (channel-major tensor order), `false` keeps pixels interleaved as one
    /// long row vector.
    pub ravel: bool,
}

/// Default output resolution, matching the research training data.
const DEFAULT_TARGET: u32 = 168;

impl FrameWindow {
    /// Create a frame-count window: `frame_count` consecutive frames
    /// starting at `start_frame`.
    pub fn frames(start_frame: u64, frame_count: u64) -> Self {
        Self {
            start_frame,
            frame_count: Some(frame_count),
            frames_per_second_sample: None,
            clip_duration_seconds: None,
            target_rows: DEFAULT_TARGET,
            target_columns: DEFAULT_TARGET,
            ravel: true,
        }
    }

    /// Create a time-based window: sample `frames_per_second` frames per
    /// second of clip time, from 0 up to `clip_duration_seconds`.
    pub fn timed(frames_per_second: f64, clip_duration_seconds: f64) -> Self {
        Self {
            start_frame: 0,
            frame_count: None,
            frames_per_second_sample: Some(frames_per_second),
            clip_duration_seconds: Some(clip_duration_seconds),
            target_rows: DEFAULT_TARGET,
            target_columns: DEFAULT_TARGET,
            ravel: true,
        }
    }

    /// Set the output resolution (rows × columns) frames are scaled to.
    #[must_use]
    pub fn with_target_size(mut self, rows: u32, columns: u32) -> Self {
        self.target_rows = rows;
        self.target_columns = columns;
        self
    }

    /// Set the flattening layout. `true` (the default) produces channel-major
    /// tensor order; `false` produces one interleaved row vector.
    #[must_use]
    pub fn with_ravel(mut self, ravel: bool) -> Self {
        self.ravel = ravel;
        self
    }

    /// Set the first frame to decode (frame-count mode).
    #[must_use]
    pub fn with_start_frame(mut self, start_frame: u64) -> Self {
        self.start_frame = start_frame;
        self
    }

    /// The length of every record this window produces:
    /// `target_rows * target_columns * 3`.
    pub fn record_len(&self) -> usize {
        self.target_rows as usize * self.target_columns as usize * CHANNEL_COUNT
    }

    /// Check the window for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`FramefeedError::Configuration`] when both or neither
    /// sampling mode is set, when a count or rate is non-positive, or when
    /// the target resolution is zero in either dimension.
    pub fn validate(&self) -> Result<(), FramefeedError> {
        self.plan().map(|_| ())
    }

    /// Resolve the window into a concrete sampling plan.
    pub(crate) fn plan(&self) -> Result<SamplingPlan, FramefeedError> {
        if self.target_rows == 0 || self.target_columns == 0 {
            return Err(FramefeedError::Configuration {
                reason: format!(
                    "target resolution must be positive in both dimensions (got {}x{})",
                    self.target_rows, self.target_columns
                ),
            });
        }

        match (self.frame_count, self.frames_per_second_sample) {
            (Some(_), Some(_)) => Err(FramefeedError::Configuration {
                reason: "both frame-count and time-based sampling are configured; pick one"
                    .to_string(),
            }),
            (None, None) => Err(FramefeedError::Configuration {
                reason: "no sampling mode determinable: set frame_count or frames_per_second_sample"
                    .to_string(),
            }),
            (Some(count), None) => {
                if count == 0 {
                    return Err(FramefeedError::Configuration {
                        reason: "frame_count must be positive".to_string(),
                    });
                }
                Ok(SamplingPlan::ByCount {
                    start_frame: self.start_frame,
                    frame_count: count,
                })
            }
            (None, Some(rate)) => {
                if rate <= 0.0 || !rate.is_finite() {
                    return Err(FramefeedError::Configuration {
                        reason: format!("frames_per_second_sample must be positive (got {rate})"),
                    });
                }
                let duration = self.clip_duration_seconds.ok_or_else(|| {
                    FramefeedError::Configuration {
                        reason: "time-based sampling requires clip_duration_seconds".to_string(),
                    }
                })?;
                if duration <= 0.0 || !duration.is_finite() {
                    return Err(FramefeedError::Configuration {
                        reason: format!("clip_duration_seconds must be positive (got {duration})"),
                    });
                }
                Ok(SamplingPlan::ByTime {
                    frames_per_second: rate,
                    duration_seconds: duration,
                })
            }
        }
    }
}

/// A validated sampling mode with all values resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SamplingPlan {
    /// Decode consecutive frames `[start_frame, start_frame + frame_count)`.
    ByCount { start_frame: u64, frame_count: u64 },
    /// Grab the frame nearest each timestamp `0, step, 2*step, ..` up to the
    /// duration, where `step = 1 / frames_per_second`.
    ByTime {
        frames_per_second: f64,
        duration_seconds: f64,
    },
}

impl SamplingPlan {
    /// How many records this plan will request.
    pub(crate) fn requested_frames(&self) -> u64 {
        match *self {
            SamplingPlan::ByCount { frame_count, .. } => frame_count,
            SamplingPlan::ByTime {
                frames_per_second,
                duration_seconds,
            } => {
                // Timestamps 0, 1/fps, 2/fps, .. <= duration.
                (duration_seconds * frames_per_second).floor() as u64 + 1
            }
        }
    }
}
