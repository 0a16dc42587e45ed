//! Mini-batch assembly tests over a synthetic frame source.
//!
//! The batcher pulls features through the `FrameSource` seam, so these tests
//! exercise pairing, normalization, the last-batch flag, and restart without
//! decoding any video.

use std::sync::{Arc, Mutex};

use framefeed::{
    ExtractOptions, FrameRecord, FrameSequence, FrameSource, FramefeedError, LabeledClip,
    LabeledSequenceBatcher, MiniBatch, OperationType, ProgressCallback, ProgressInfo,
    SkippedFrame,
};

const RECORD_LEN: usize = 64 * 64 * 3;

/// Deterministic source: `clip_count` clips of `frames_per_clip` frames, all
/// rows carrying the same label, values derived from the frame number.
struct SyntheticSource {
    clips: usize,
    frames_per_clip: usize,
    label: usize,
}

impl SyntheticSource {
    fn record_value(clip: usize, frame: usize) -> f32 {
        ((clip * 31 + frame * 7) % 256) as f32
    }
}

impl FrameSource for SyntheticSource {
    fn clip_count(&self) -> usize {
        self.clips
    }

    fn load_clip(&mut self, index: usize) -> Result<LabeledClip, FramefeedError> {
        let records = (0..self.frames_per_clip)
            .map(|frame| FrameRecord {
                frame_number: frame as u64,
                values: vec![Self::record_value(index, frame); RECORD_LEN],
            })
            .collect();
        Ok(LabeledClip {
            frames: FrameSequence {
                records,
                skipped: Vec::new(),
                requested: self.frames_per_clip as u64,
            },
            labels: vec![self.label; self.frames_per_clip],
        })
    }
}

/// A source whose second clip always fails to load.
struct FailingSource;

impl FrameSource for FailingSource {
    fn clip_count(&self) -> usize {
        2
    }

    fn load_clip(&mut self, index: usize) -> Result<LabeledClip, FramefeedError> {
        if index == 1 {
            return Err(FramefeedError::DataIntegrity {
                path: "sportclip_1.txt".into(),
                detail: "expected 10 label line(s), found 9".to_string(),
            });
        }
        SyntheticSource {
            clips: 2,
            frames_per_clip: 1,
            label: 0,
        }
        .load_clip(index)
    }
}

fn collect(batcher: &mut LabeledSequenceBatcher) -> Vec<MiniBatch> {
    batcher
        .map(|batch| batch.expect("batch loads"))
        .collect::<Vec<_>>()
}

#[test]
fn one_clip_ten_frames_batch_size_one() {
    let source = SyntheticSource {
        clips: 1,
        frames_per_clip: 10,
        label: 2,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 1, 11).expect("valid batcher");
    let batches = collect(&mut batcher);

    assert_eq!(batches.len(), 10);
    for (index, batch) in batches.iter().enumerate() {
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.features[0].len(), RECORD_LEN);
        assert_eq!(batch.label_index(0), Some(2));
        assert_eq!(batch.last, index == 9);
    }
}

#[test]
fn normalization_is_applied_exactly_once() {
    let source = SyntheticSource {
        clips: 1,
        frames_per_clip: 3,
        label: 0,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 3, 4).expect("valid batcher");
    let batch = batcher.next().expect("one batch").expect("loads");

    for (frame, row) in batch.features.iter().enumerate() {
        let raw = SyntheticSource::record_value(0, frame);
        let expected = raw / 255.0;
        assert!(
            row.iter().all(|&value| (value - expected).abs() < 1e-6),
            "frame {frame}: expected {expected}, got {}",
            row[0]
        );
        assert!(row.iter().all(|&value| (0.0..=1.0).contains(&value)));
    }
}

#[test]
fn one_hot_labels_have_unit_mass() {
    let source = SyntheticSource {
        clips: 1,
        frames_per_clip: 2,
        label: 7,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 2, 11).expect("valid batcher");
    let batch = batcher.next().expect("one batch").expect("loads");

    for row in &batch.labels {
        assert_eq!(row.len(), 11);
        assert_eq!(row.iter().sum::<f32>(), 1.0);
        assert_eq!(row[7], 1.0);
    }
}

#[test]
fn final_partial_batch_carries_the_last_flag() {
    // 2 clips x 5 frames = 10 rows; batch size 4 -> 4, 4, 2.
    let source = SyntheticSource {
        clips: 2,
        frames_per_clip: 5,
        label: 1,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 4, 3).expect("valid batcher");
    let batches = collect(&mut batcher);

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), 4);
    assert_eq!(batches[1].len(), 4);
    assert_eq!(batches[2].len(), 2);
    assert!(!batches[0].last);
    assert!(!batches[1].last);
    assert!(batches[2].last);
}

#[test]
fn reset_replays_an_identical_pass() {
    let source = SyntheticSource {
        clips: 3,
        frames_per_clip: 4,
        label: 1,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 5, 3).expect("valid batcher");

    let first_pass = collect(&mut batcher);
    assert!(batcher.next().is_none(), "pass is exhausted");

    batcher.reset();
    let second_pass = collect(&mut batcher);

    assert_eq!(first_pass, second_pass);
}

#[test]
fn label_out_of_range_fails_the_batch() {
    let source = SyntheticSource {
        clips: 1,
        frames_per_clip: 1,
        label: 5,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 1, 3).expect("valid batcher");

    match batcher.next() {
        Some(Err(FramefeedError::LabelOutOfRange { label, categories })) => {
            assert_eq!(label, 5);
            assert_eq!(categories, 3);
        }
        other => panic!("expected LabelOutOfRange, got {other:?}"),
    }
    assert!(batcher.next().is_none(), "error poisons the pass");
}

#[test]
fn load_error_poisons_the_pass_until_reset() {
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(FailingSource), 4, 3).expect("valid batcher");

    // Batch size 4 forces both clips to load for the first batch.
    match batcher.next() {
        Some(Err(FramefeedError::DataIntegrity { .. })) => {}
        other => panic!("expected DataIntegrity, got {other:?}"),
    }
    assert!(batcher.next().is_none());

    batcher.reset();
    assert!(matches!(batcher.next(), Some(Err(_))), "retry after reset");
}

#[test]
fn batch_size_larger_than_the_dataset_yields_one_last_batch() {
    let source = SyntheticSource {
        clips: 1,
        frames_per_clip: 3,
        label: 0,
    };
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(source), 16, 2).expect("valid batcher");
    let batches = collect(&mut batcher);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    assert!(batches[0].last);
}

// ── label alignment across skipped frames ──────────────────────────

fn numbered_record(frame_number: u64) -> FrameRecord {
    FrameRecord {
        frame_number,
        values: vec![frame_number as f32; 4],
    }
}

#[test]
fn skipped_frames_drop_their_label_lines() {
    // Window [30, 36); frame 33 failed both decode attempts. Label lines
    // equal the frame offset, so a slip is immediately visible.
    let frames = FrameSequence {
        records: vec![
            numbered_record(30),
            numbered_record(31),
            numbered_record(32),
            numbered_record(34),
            numbered_record(35),
        ],
        skipped: vec![SkippedFrame {
            frame_number: 33,
            reason: "corrupt packet".to_string(),
        }],
        requested: 6,
    };

    let clip = LabeledClip::align(frames, &[0, 1, 2, 3, 4, 5], 30);

    assert_eq!(clip.labels, vec![0, 1, 2, 4, 5]);
    for (record, &label) in clip.frames.records.iter().zip(&clip.labels) {
        assert_eq!(
            record.frame_number - 30,
            label as u64,
            "frame {} must keep its own label line",
            record.frame_number
        );
    }
}

#[test]
fn complete_sequences_pair_labels_positionally() {
    let frames = FrameSequence {
        records: vec![numbered_record(0), numbered_record(1), numbered_record(2)],
        skipped: Vec::new(),
        requested: 3,
    };
    let clip = LabeledClip::align(frames, &[4, 5, 6], 0);
    assert_eq!(clip.labels, vec![4, 5, 6]);
}

/// One six-frame clip whose frame 2 was skipped; labels equal frame numbers.
struct SkipClipSource;

impl FrameSource for SkipClipSource {
    fn clip_count(&self) -> usize {
        1
    }

    fn load_clip(&mut self, _index: usize) -> Result<LabeledClip, FramefeedError> {
        let frames = FrameSequence {
            records: vec![
                numbered_record(0),
                numbered_record(1),
                numbered_record(3),
                numbered_record(4),
                numbered_record(5),
            ],
            skipped: vec![SkippedFrame {
                frame_number: 2,
                reason: "corrupt packet".to_string(),
            }],
            requested: 6,
        };
        Ok(LabeledClip::align(frames, &[0, 1, 2, 3, 4, 5], 0))
    }
}

#[test]
fn batches_never_slip_after_a_mid_clip_skip() {
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(SkipClipSource), 2, 6).expect("valid batcher");
    let batches = collect(&mut batcher);

    let labels: Vec<usize> = batches
        .iter()
        .flat_map(|batch| (0..batch.len()).map(|row| batch.label_index(row).expect("one-hot")))
        .collect();
    // Label 2 left with its frame; nothing shifted into its place.
    assert_eq!(labels, vec![0, 1, 3, 4, 5]);
}

// ── batch progress reporting ───────────────────────────────────────

#[derive(Default)]
struct RecordingProgress {
    seen: Mutex<Vec<(OperationType, u64)>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.seen
            .lock()
            .expect("not poisoned")
            .push((info.operation, info.current));
    }
}

#[test]
fn batch_assembly_reports_progress_per_batch() {
    let progress = Arc::new(RecordingProgress::default());
    let options = ExtractOptions::new().with_progress(progress.clone());
    let source = SyntheticSource {
        clips: 2,
        frames_per_clip: 3,
        label: 0,
    };
    let mut batcher =
        LabeledSequenceBatcher::with_options(Box::new(source), 2, 2, options)
            .expect("valid batcher");
    let batches = collect(&mut batcher);
    assert_eq!(batches.len(), 3);

    let seen = progress.seen.lock().expect("not poisoned");
    assert!(
        seen.iter()
            .all(|&(operation, _)| operation == OperationType::BatchAssembly)
    );
    // One report per batch, then the unconditional final report.
    let counts: Vec<u64> = seen.iter().map(|&(_, current)| current).collect();
    assert_eq!(counts[..3], [1, 2, 3]);
}
