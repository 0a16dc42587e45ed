//! Error types for the `framefeed` crate.
//!
//! This module defines [`FramefeedError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths, frame numbers, and upstream error messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framefeed` operations.
///
/// Every public method that can fail returns `Result<T, FramefeedError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
///
/// The variants split into three severity classes: configuration errors are
/// raised before any I/O; `SourceUnreadable`, `NoVideoStream`, and
/// `DataIntegrity` are fatal for one clip but survivable by an orchestrating
/// loop; `SeekFailed` aborts the extraction call that raised it. A
/// `FrameDecodeFailed` is retried once through direct frame access before the
/// frame becomes a tracked skip.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramefeedError {
    /// The frame window or batcher configuration is invalid or contradictory.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The clip could not be opened for decoding.
    #[error("Failed to open video source at {path}: {reason}")]
    SourceUnreadable {
        /// Path of the clip that failed to open.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The clip does not contain a video stream.
    #[error("No video stream found in {path}")]
    NoVideoStream {
        /// Path of the clip.
        path: PathBuf,
    },

    /// Initial positioning into the stream failed.
    ///
    /// There is no way to recover a sequencing point after this, so the whole
    /// extraction call aborts.
    #[error("Failed to seek to frame {frame_number}: {reason}")]
    SeekFailed {
        /// The frame that was being positioned to.
        frame_number: u64,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// A single frame failed to decode on the sequential path.
    #[error("Failed to decode frame {frame_number}: {reason}")]
    FrameDecodeFailed {
        /// The frame that failed.
        frame_number: u64,
        /// Underlying reason the decode failed.
        reason: String,
    },

    /// The requested frame number exceeds the clip's frame count.
    ///
    /// Raised before any container seek is attempted, so the session stays
    /// positioned where it was.
    #[error("Frame {frame_number} is out of range (clip has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the clip.
        total_frames: u64,
    },

    /// A label file disagrees with the frame window it should describe.
    #[error("Label data at {path} is inconsistent: {detail}")]
    DataIntegrity {
        /// Path of the offending label file or dataset entry.
        path: PathBuf,
        /// What the mismatch was.
        detail: String,
    },

    /// A label index falls outside the configured category count.
    #[error("Label {label} is out of range (catalog has {categories} categories)")]
    LabelOutOfRange {
        /// The offending label index.
        label: usize,
        /// Number of configured categories.
        categories: usize,
    },

    /// A decoded picture uses a pixel layout the converter does not handle.
    #[error("Unsupported pixel layout: {0}")]
    UnsupportedPixelLayout(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while loading or saving images.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for FramefeedError {
    fn from(error: FfmpegError) -> Self {
        FramefeedError::FfmpegError(error.to_string())
    }
}
