//! Labeled mini-batch assembly.
//!
//! [`LabeledSequenceBatcher`] joins a feature stream (frame records produced
//! by the [`SequentialFrameExtractor`]) with a parallel label stream (one
//! integer per frame, read from the clip's label file) and groups the paired
//! rows into fixed-size [`MiniBatch`]es. Iteration is lazy — clips are
//! decoded as batches are pulled — and restartable through
//! [`reset`](LabeledSequenceBatcher::reset).
//!
//! Two contracts are enforced here and nowhere else:
//!
//! - **Alignment.** Features and labels pair by frame index. The label file
//!   must hold exactly one line per requested frame; a skipped frame drops
//!   its label line too, so the streams cannot slip against each other.
//! - **Normalization.** Raw pixel values in [0,255] are divided by 255 as
//!   rows are placed into a batch. Each row passes through the batcher once,
//!   so normalization is applied exactly once, never conditionally.
//!
//! The feature side is pulled through the [`FrameSource`] seam so the batch
//! logic is testable without a video decoder; [`ClipSetSource`] is the
//! production implementation.
//!
//! # Example
//!
//! ```no_run
//! use framefeed::{ClipSet, FrameWindow, LabeledSequenceBatcher};
//!
//! let clips = ClipSet::new("video_data/training", "sportclip_{}", 0, 100)?;
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! let mut batcher = LabeledSequenceBatcher::for_clip_set(clips, window, 16, 11)?;
//!
//! for batch in &mut batcher {
//!     let batch = batch?;
//!     println!("batch of {} row(s), last = {}", batch.len(), batch.last);
//! }
//! batcher.reset();
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```

use std::collections::VecDeque;

use log::debug;

use crate::clipset::{ClipEntry, ClipSet};
use crate::config::ExtractOptions;
use crate::error::FramefeedError;
use crate::extractor::{FrameSequence, SequentialFrameExtractor};
use crate::labels::{one_hot, read_clip_labels};
use crate::progress::{OperationType, ProgressTracker};
use crate::source::ClipSource;
use crate::window::FrameWindow;

/// One clip's frame records paired with its per-frame labels.
///
/// Labels are aligned with `frames.records` row for row: the source drops
/// the label lines of skipped frames before constructing this value.
#[derive(Debug, Clone)]
pub struct LabeledClip {
    /// The extracted frame sequence.
    pub frames: FrameSequence,
    /// One label per surviving record.
    pub labels: Vec<usize>,
}

impl LabeledClip {
    /// Pair an extracted sequence with its per-frame label lines.
    ///
    /// `labels` holds one line per *requested* frame, the first describing
    /// `start_frame`. A skipped frame drops its line: each surviving record
    /// selects the line of its own frame number, never the positionally next
    /// one, so a mid-window skip cannot slip the streams against each other.
    pub fn align(frames: FrameSequence, labels: &[usize], start_frame: u64) -> Self {
        let aligned = if frames.skipped.is_empty() {
            labels[..frames.records.len()].to_vec()
        } else {
            frames
                .records
                .iter()
                .map(|record| labels[(record.frame_number - start_frame) as usize])
                .collect()
        };
        Self {
            frames,
            labels: aligned,
        }
    }
}

/// Up to `batch_size` paired feature/label rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatch {
    /// Feature rows, normalized to [0,1].
    pub features: Vec<Vec<f32>>,
    /// One-hot label rows, aligned with `features`.
    pub labels: Vec<Vec<f32>>,
    /// `true` for the final batch of a pass, which may be partially filled.
    pub last: bool,
}

impl MiniBatch {
    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// `true` if the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The label index of one row (position of the one-hot maximum).
    pub fn label_index(&self, row: usize) -> Option<usize> {
        self.labels.get(row).and_then(|one_hot_row| {
            one_hot_row
                .iter()
                .position(|&value| value == 1.0)
        })
    }
}

/// Seam between batch assembly and feature production.
///
/// Implementations load one clip at a time by index; the batcher resets by
/// rewinding its index to zero, so sources need no state beyond what a load
/// requires. Sources must be deterministic across resets for the batch
/// restart contract to hold.
pub trait FrameSource {
    /// How many clips this source can load.
    fn clip_count(&self) -> usize;

    /// Load the clip at `index`, with features and labels already aligned.
    fn load_clip(&mut self, index: usize) -> Result<LabeledClip, FramefeedError>;
}

/// The production [`FrameSource`]: numbered video/label file pairs read
/// through the sequential extractor.
pub struct ClipSetSource {
    entries: Vec<ClipEntry>,
    extractor: SequentialFrameExtractor,
    options: ExtractOptions,
}

impl ClipSetSource {
    /// Build a source over `clips`, extracting `window` from each.
    pub fn new(clips: ClipSet, window: FrameWindow) -> Result<Self, FramefeedError> {
        Self::with_options(clips, window, ExtractOptions::default())
    }

    /// Build a source with explicit extraction options (progress,
    /// cancellation).
    pub fn with_options(
        clips: ClipSet,
        window: FrameWindow,
        options: ExtractOptions,
    ) -> Result<Self, FramefeedError> {
        Ok(Self {
            entries: clips.entries(),
            extractor: SequentialFrameExtractor::new(window)?,
            options,
        })
    }
}

impl FrameSource for ClipSetSource {
    fn clip_count(&self) -> usize {
        self.entries.len()
    }

    fn load_clip(&mut self, index: usize) -> Result<LabeledClip, FramefeedError> {
        let entry = &self.entries[index];

        // Labels are checked against the *requested* frame count before any
        // decode output is paired, so a bad label file fails the clip before
        // a single row is emitted.
        let requested = self.extractor.requested_frames();
        let labels = read_clip_labels(&entry.labels, requested)?;

        let source = ClipSource::path(&entry.video);
        let frames = self
            .extractor
            .extract_with_options(&source, &self.options)?;

        debug!(
            "loaded clip {} ({} row(s), {} skipped)",
            entry.video.display(),
            frames.records.len(),
            frames.skipped.len()
        );

        // Skips happen in frame-count mode only; time-based sequences always
        // arrive complete.
        let start_frame = self.extractor.window().start_frame;
        Ok(LabeledClip::align(frames, &labels, start_frame))
    }
}

/// Restartable batch iteration, shared by the sequential batcher and the
/// image-folder streams.
pub trait BatchSource: Iterator<Item = Result<MiniBatch, FramefeedError>> {
    /// Rewind to the start so the next iteration replays the same batches.
    fn reset(&mut self);
}

/// Lazy, restartable assembly of labeled mini-batches over a clip set.
///
/// Implements [`Iterator`] yielding `Result<MiniBatch>`; an error poisons
/// the pass (subsequent calls return `None`) until [`reset`](Self::reset).
pub struct LabeledSequenceBatcher {
    source: Box<dyn FrameSource + Send>,
    batch_size: usize,
    categories: usize,
    options: ExtractOptions,
    /// Rows pulled from loaded clips but not yet emitted, raw [0,255].
    pending: VecDeque<(Vec<f32>, usize)>,
    next_clip: usize,
    finished: bool,
    /// Per-pass batch progress; `None` until the first batch of a pass.
    tracker: Option<ProgressTracker>,
}

impl LabeledSequenceBatcher {
    /// Build a batcher over an explicit [`FrameSource`].
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if `batch_size` or `categories`
    /// is zero.
    pub fn new(
        source: Box<dyn FrameSource + Send>,
        batch_size: usize,
        categories: usize,
    ) -> Result<Self, FramefeedError> {
        Self::with_options(source, batch_size, categories, ExtractOptions::default())
    }

    /// Build a batcher with explicit options. Cancellation is honored at
    /// every batch boundary; the progress callback fires per emitted batch.
    pub fn with_options(
        source: Box<dyn FrameSource + Send>,
        batch_size: usize,
        categories: usize,
        options: ExtractOptions,
    ) -> Result<Self, FramefeedError> {
        if batch_size == 0 {
            return Err(FramefeedError::Configuration {
                reason: "batch_size must be positive".to_string(),
            });
        }
        if categories == 0 {
            return Err(FramefeedError::Configuration {
                reason: "category count must be positive".to_string(),
            });
        }
        Ok(Self {
            source,
            batch_size,
            categories,
            options,
            pending: VecDeque::new(),
            next_clip: 0,
            finished: false,
            tracker: None,
        })
    }

    /// Convenience constructor for the common case: a [`ClipSet`] read
    /// through the sequential extractor.
    pub fn for_clip_set(
        clips: ClipSet,
        window: FrameWindow,
        batch_size: usize,
        categories: usize,
    ) -> Result<Self, FramefeedError> {
        let source = ClipSetSource::new(clips, window)?;
        Self::new(Box::new(source), batch_size, categories)
    }

    /// The configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The configured category count.
    pub fn categories(&self) -> usize {
        self.categories
    }

    /// Rewind the feature and label streams to their start.
    ///
    /// The next iteration yields the same batch sequence as the first pass
    /// (sources are deterministic by contract).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_clip = 0;
        self.finished = false;
        self.tracker = None;
    }

    /// Pull clips until a full batch is buffered or the set is exhausted.
    fn fill_pending(&mut self) -> Result<(), FramefeedError> {
        while self.pending.len() < self.batch_size && self.next_clip < self.source.clip_count() {
            let clip = self.source.load_clip(self.next_clip)?;
            self.next_clip += 1;
            for (record, label) in clip.frames.records.into_iter().zip(clip.labels) {
                self.pending.push_back((record.values, label));
            }
        }
        Ok(())
    }

    fn clips_exhausted(&self) -> bool {
        self.next_clip >= self.source.clip_count()
    }
}

impl Iterator for LabeledSequenceBatcher {
    type Item = Result<MiniBatch, FramefeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.options.is_cancelled() {
            self.finished = true;
            return Some(Err(FramefeedError::Cancelled));
        }

        if let Err(error) = self.fill_pending() {
            self.finished = true;
            return Some(Err(error));
        }

        if self.pending.is_empty() {
            self.finished = true;
            if let Some(tracker) = &mut self.tracker {
                tracker.finish();
            }
            return None;
        }

        // The total batch count is not known up front: skips shrink clips.
        let tracker = self.tracker.get_or_insert_with(|| {
            ProgressTracker::new(
                self.options.progress.clone(),
                OperationType::BatchAssembly,
                None,
                self.options.report_every,
            )
        });
        tracker.advance(None, None);

        let rows = self.pending.len().min(self.batch_size);
        let mut features = Vec::with_capacity(rows);
        let mut labels = Vec::with_capacity(rows);

        for _ in 0..rows {
            let (mut values, label) = self.pending.pop_front().expect("counted above");
            // The single normalization pass: raw [0,255] -> [0,1].
            for value in &mut values {
                *value /= 255.0;
            }
            let encoded = match one_hot(label, self.categories) {
                Ok(encoded) => encoded,
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            };
            features.push(values);
            labels.push(encoded);
        }

        let last = self.pending.is_empty() && self.clips_exhausted();
        if last {
            self.finished = true;
            if let Some(tracker) = &mut self.tracker {
                tracker.finish();
            }
        }

        Some(Ok(MiniBatch {
            features,
            labels,
            last,
        }))
    }
}

impl BatchSource for LabeledSequenceBatcher {
    fn reset(&mut self) {
        LabeledSequenceBatcher::reset(self);
    }
}
