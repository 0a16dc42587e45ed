//! Numbered clip enumeration.
//!
//! The sequential dataset is stored as numbered file pairs: `sportclip_0.mp4`
//! with `sportclip_0.txt`, `sportclip_1.mp4` with `sportclip_1.txt`, and so
//! on. A [`ClipSet`] captures that naming scheme — a directory, a file-stem
//! pattern with a `{}` index placeholder, a start index, and a clip count —
//! and expands it into the (video path, label path) pairs the batcher reads.
//!
//! # Example
//!
//! ```
//! use framefeed::ClipSet;
//!
//! let clips = ClipSet::new("video_data/training", "sportclip_{}", 0, 3)?;
//! let entries = clips.entries();
//! assert_eq!(entries.len(), 3);
//! assert!(entries[2].video.ends_with("sportclip_2.mp4"));
//! assert!(entries[2].labels.ends_with("sportclip_2.txt"));
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```

use std::path::{Path, PathBuf};

use crate::error::FramefeedError;

/// Default file-stem pattern of the research dataset.
pub const DEFAULT_CLIP_PATTERN: &str = "sportclip_{}";

/// One clip of a [`ClipSet`]: its index and the two files describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEntry {
    /// The index substituted into the pattern.
    pub index: u64,
    /// Path of the video file (`<stem>.mp4`).
    pub video: PathBuf,
    /// Path of the per-frame label file (`<stem>.txt`).
    pub labels: PathBuf,
}

/// A numbered set of (video, label file) pairs under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSet {
    directory: PathBuf,
    pattern: String,
    start_index: u64,
    clip_count: u64,
}

impl ClipSet {
    /// Describe a clip set.
    ///
    /// `pattern` must contain exactly one `{}` placeholder for the clip
    /// index, e.g. `"sportclip_{}"`.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if the pattern has no placeholder
    /// or the clip count is zero.
    pub fn new<P: AsRef<Path>>(
        directory: P,
        pattern: &str,
        start_index: u64,
        clip_count: u64,
    ) -> Result<Self, FramefeedError> {
        if !pattern.contains("{}") {
            return Err(FramefeedError::Configuration {
                reason: format!("clip pattern {pattern:?} has no {{}} index placeholder"),
            });
        }
        if clip_count == 0 {
            return Err(FramefeedError::Configuration {
                reason: "clip_count must be positive".to_string(),
            });
        }
        Ok(Self {
            directory: directory.as_ref().to_path_buf(),
            pattern: pattern.to_string(),
            start_index,
            clip_count,
        })
    }

    /// The directory the clips live in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of clips in the set.
    pub fn clip_count(&self) -> u64 {
        self.clip_count
    }

    /// Expand the pattern into the full list of clip entries.
    pub fn entries(&self) -> Vec<ClipEntry> {
        (self.start_index..self.start_index + self.clip_count)
            .map(|index| {
                let stem = self.pattern.replacen("{}", &index.to_string(), 1);
                ClipEntry {
                    index,
                    video: self.directory.join(format!("{stem}.mp4")),
                    labels: self.directory.join(format!("{stem}.txt")),
                }
            })
            .collect()
    }
}
