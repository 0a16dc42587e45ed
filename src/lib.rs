//! # framefeed
//!
//! Turn labeled sports video clips into numeric frame tensors — sequential
//! frame extraction, pixel conversion, and mini-batch assembly for video
//! classification research.
//!
//! `framefeed` is the data layer of a video-classification pipeline: it
//! decodes clips with FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate), converts
//! decoded pictures from their signed, range-shifted storage into BGR pixel
//! buffers, flattens them into per-frame numeric records, and pairs them
//! with per-clip label files as normalized mini-batches. Training and
//! evaluation components plug in behind small traits; the crate contains no
//! neural network engine.
//!
//! ## Quick Start
//!
//! ### Extract a frame window
//!
//! ```no_run
//! use framefeed::{ClipSource, FrameWindow, SequentialFrameExtractor};
//!
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! let extractor = SequentialFrameExtractor::new(window)?;
//! let sequence = extractor.extract(&ClipSource::path("sportclip_0.mp4"))?;
//!
//! assert!(sequence.records.iter().all(|r| r.values.len() == 168 * 168 * 3));
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```
//!
//! ### Assemble labeled mini-batches
//!
//! ```no_run
//! use framefeed::{ClipSet, FrameWindow, LabeledSequenceBatcher};
//!
//! let clips = ClipSet::new("video_data/training", "sportclip_{}", 0, 100)?;
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! let mut batches = LabeledSequenceBatcher::for_clip_set(clips, window, 16, 11)?;
//!
//! for batch in &mut batches {
//!     let batch = batch?;
//!     // features are normalized to [0,1], labels one-hot encoded
//! }
//! batches.reset(); // replay the same sequence
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```
//!
//! ### Split an image folder
//!
//! ```no_run
//! use std::path::Path;
//!
//! use framefeed::{FolderDataset, LabelCatalog};
//!
//! let catalog = LabelCatalog::sports();
//! let dataset = FolderDataset::scan(Path::new("frames"), &catalog, &["bmp"])?;
//! let split = dataset.balanced_split(0, 90)?; // deterministic, seeded
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```
//!
//! ## Features
//!
//! - **Sequential extraction** — seek once, decode forward, per-frame retry
//!   through direct access, explicit skip tracking
//! - **Pixel conversion** — signed-domain pictures to BGR buffers with the
//!   fixed +128 unsigned-recovery shift, crop-aware
//! - **Frame windows** — frame-count or time-based sampling, raveled or
//!   row-vector layouts, validated before any I/O
//! - **Labeled batching** — lockstep feature/label pairing, single-pass
//!   [0,1] normalization, restartable iteration
//! - **Image-folder mode** — deterministic seeded balanced splits over
//!   category-per-subdirectory image trees
//! - **Evaluation** — per-category confusion statistics with
//!   precision/recall/F1 and single-clip helpers
//! - **Early stopping** — epoch/duration/stale-score termination with
//!   best-model persistence
//! - **Progress & cancellation** — cooperative callbacks and
//!   `CancellationToken` honored at frame and batch boundaries
//! - **In-memory clips** — decode from owned byte buffers through a custom
//!   AVIO source
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`BatchStream`]: read-ahead batch prefetching via Tokio |
//! | `rayon` | Parallel image decoding in the folder loader |
//! | `full`  | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod batcher;
pub mod clipset;
mod config;
pub mod decoder;
pub mod error;
pub mod evaluate;
pub mod extractor;
pub mod ffmpeg;
pub mod folder;
pub mod labels;
pub mod metadata;
pub mod model;
pub mod network;
pub mod picture;
pub mod progress;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod training;
mod utilities;
pub mod window;

pub use batcher::{
    BatchSource, ClipSetSource, FrameSource, LabeledClip, LabeledSequenceBatcher, MiniBatch,
};
pub use clipset::{ClipEntry, ClipSet, DEFAULT_CLIP_PATTERN};
pub use config::ExtractOptions;
pub use decoder::{DecoderSession, FrameDecoder};
pub use error::FramefeedError;
pub use evaluate::{Evaluation, evaluate_batches, evaluate_clip_frames, evaluate_clip_sequence};
pub use extractor::{FrameRecord, FrameSequence, SequentialFrameExtractor, SkippedFrame};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use folder::{BalancedSplit, FolderDataset, ImageBatchStream, ImageEntry};
pub use labels::{LabelCatalog, one_hot, read_clip_labels};
pub use metadata::VideoMetadata;
pub use model::{Classifier, ModelPersistence, TrainableModel};
pub use network::{
    Activation, Hyperparameters, InputShape, LayerSpec, Loss, NetworkSpec,
};
pub use picture::{CHANNEL_COUNT, ColorSpace, CropRegion, DecodedPicture, PixelBuffer};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use source::ClipSource;
#[cfg(feature = "async")]
pub use stream::BatchStream;
pub use training::{BEST_MODEL_FILE, EarlyStopping, TerminationReason, TrainingOutcome};
pub use window::FrameWindow;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FramefeedError>;
