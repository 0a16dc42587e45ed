//! Clip metadata.
//!
//! [`VideoMetadata`] is read once when a decode session opens and cached for
//! the session's lifetime. The extractor uses it to bound frame windows and
//! to convert timestamps; the CLI `probe` subcommand prints it.

use std::time::Duration;

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input};

use crate::error::FramefeedError;

/// Properties of the video stream of one clip.
///
/// `frame_count` is estimated from the container duration and the average
/// frame rate; variable-frame-rate clips may over- or under-report slightly.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, computed from duration and frame rate.
    pub frame_count: u64,
    /// Total duration of the clip.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Harvest metadata for the video stream at `stream_index`.
    pub(crate) fn from_input(
        input: &Input,
        stream_index: usize,
        source: &std::path::Path,
    ) -> Result<Self, FramefeedError> {
        let stream = input
            .stream(stream_index)
            .ok_or_else(|| FramefeedError::NoVideoStream {
                path: source.to_path_buf(),
            })?;

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                FramefeedError::SourceUnreadable {
                    path: source.to_path_buf(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let video_decoder = decoder_context.decoder().video().map_err(|error| {
            FramefeedError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: format!("Failed to create video decoder: {error}"),
            }
        })?;

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        // Compute frames per second from the stream's average frame rate.
        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            // Fallback: try the stream's rate field.
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(VideoMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
        })
    }
}
