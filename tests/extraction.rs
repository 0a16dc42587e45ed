//! Sequential extraction integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.
//! Without the fixtures each test returns early.

use std::fs;
use std::path::Path;

use framefeed::{
    ClipSet, ClipSource, FrameDecoder, FrameWindow, FramefeedError, LabeledSequenceBatcher,
    SequentialFrameExtractor,
};

fn sample_clip_path() -> &'static str {
    "tests/fixtures/sample_clip.mp4"
}

fn fixture_missing() -> bool {
    !Path::new(sample_clip_path()).exists()
}

// ── probing ────────────────────────────────────────────────────────

#[test]
fn probe_reports_the_fixture_geometry() {
    if fixture_missing() {
        return;
    }

    let metadata =
        FrameDecoder::probe(&ClipSource::path(sample_clip_path())).expect("probe fixture");
    assert_eq!(metadata.width, 320);
    assert_eq!(metadata.height, 240);
    assert!((metadata.frames_per_second - 30.0).abs() < 0.5);
    assert!(metadata.frame_count >= 100, "4s at 30fps");
    assert!(metadata.duration.as_secs_f64() > 3.0);
}

#[test]
fn memory_source_probes_like_the_file() {
    if fixture_missing() {
        return;
    }

    let bytes = fs::read(sample_clip_path()).expect("read fixture");
    let from_file =
        FrameDecoder::probe(&ClipSource::path(sample_clip_path())).expect("probe file");
    let from_memory = FrameDecoder::probe(&ClipSource::memory(bytes)).expect("probe memory");

    assert_eq!(from_file.width, from_memory.width);
    assert_eq!(from_file.height, from_memory.height);
    assert_eq!(from_file.codec, from_memory.codec);
}

// ── frame-count extraction ─────────────────────────────────────────

#[test]
fn extracts_the_requested_window() {
    if fixture_missing() {
        return;
    }

    let window = FrameWindow::frames(0, 10).with_target_size(64, 64);
    let extractor = SequentialFrameExtractor::new(window).expect("valid window");
    let sequence = extractor
        .extract(&ClipSource::path(sample_clip_path()))
        .expect("extraction runs");

    assert_eq!(sequence.requested, 10);
    assert!(sequence.is_complete(), "clean fixture has no skips");
    assert_eq!(sequence.records.len(), 10);
    for record in &sequence.records {
        assert_eq!(record.values.len(), 64 * 64 * 3);
        assert!(record.values.iter().all(|&value| (0.0..=255.0).contains(&value)));
    }
}

#[test]
fn record_frame_numbers_are_consecutive_from_the_start() {
    if fixture_missing() {
        return;
    }

    let window = FrameWindow::frames(30, 5).with_target_size(64, 64);
    let extractor = SequentialFrameExtractor::new(window).expect("valid window");
    let sequence = extractor
        .extract(&ClipSource::path(sample_clip_path()))
        .expect("extraction runs");

    let numbers: Vec<u64> = sequence.records.iter().map(|r| r.frame_number).collect();
    assert_eq!(numbers, vec![30, 31, 32, 33, 34]);
}

#[test]
fn ravel_and_row_layouts_hold_the_same_samples() {
    if fixture_missing() {
        return;
    }

    let source = ClipSource::path(sample_clip_path());
    let raveled = SequentialFrameExtractor::new(
        FrameWindow::frames(0, 1).with_target_size(32, 32),
    )
    .expect("valid window")
    .extract(&source)
    .expect("extraction runs");
    let interleaved = SequentialFrameExtractor::new(
        FrameWindow::frames(0, 1)
            .with_target_size(32, 32)
            .with_ravel(false),
    )
    .expect("valid window")
    .extract(&source)
    .expect("extraction runs");

    let channel_major = &raveled.records[0].values;
    let row_vector = &interleaved.records[0].values;
    assert_eq!(channel_major.len(), row_vector.len());

    // Same pixels, different order: channel-major pixel p of channel c is
    // interleaved sample p * 3 + c.
    let pixels = 32 * 32;
    for channel in 0..3 {
        for pixel in 0..pixels {
            assert_eq!(
                channel_major[channel * pixels + pixel],
                row_vector[pixel * 3 + channel],
            );
        }
    }
}

#[test]
fn frames_past_the_end_become_tracked_skips() {
    if fixture_missing() {
        return;
    }

    // The fixture holds ~120 frames; a window reaching past the end cannot
    // fill, and the missing frames must be reported, not papered over.
    let window = FrameWindow::frames(115, 10).with_target_size(64, 64);
    let extractor = SequentialFrameExtractor::new(window).expect("valid window");
    let sequence = extractor
        .extract(&ClipSource::path(sample_clip_path()))
        .expect("extraction runs");

    assert_eq!(sequence.requested, 10);
    assert!(!sequence.is_complete());
    assert_eq!(
        sequence.records.len() + sequence.skipped.len(),
        10,
        "every requested frame is either a record or a tracked skip"
    );
    assert!(!sequence.skipped.is_empty());
    for skip in &sequence.skipped {
        assert!(skip.frame_number >= 115);
        assert!(!skip.reason.is_empty());
    }
}

// ── time-based extraction ──────────────────────────────────────────

#[test]
fn time_based_sampling_yields_one_record_per_timestamp() {
    if fixture_missing() {
        return;
    }

    // 2 fps over 3 seconds: timestamps 0.0 .. 3.0 inclusive, 7 records.
    let window = FrameWindow::timed(2.0, 3.0).with_target_size(64, 64);
    let extractor = SequentialFrameExtractor::new(window).expect("valid window");
    let sequence = extractor
        .extract(&ClipSource::path(sample_clip_path()))
        .expect("extraction runs");

    assert_eq!(sequence.requested, 7);
    assert_eq!(sequence.records.len(), 7);

    // The fixture runs at 30 fps, so half-second steps land 15 frames apart.
    let numbers: Vec<u64> = sequence.records.iter().map(|r| r.frame_number).collect();
    assert_eq!(numbers, vec![0, 15, 30, 45, 60, 75, 90]);
}

// ── direct frame access ────────────────────────────────────────────

#[test]
fn direct_access_matches_sequential_decode() {
    if fixture_missing() {
        return;
    }

    let source = ClipSource::path(sample_clip_path());
    let direct = FrameDecoder::frame_at(&source, 45, (64, 64)).expect("direct access");
    let direct_buffer = direct.to_bgr_buffer().expect("conversion");

    let sequence = SequentialFrameExtractor::new(
        FrameWindow::frames(45, 1).with_target_size(64, 64),
    )
    .expect("valid window")
    .extract(&source)
    .expect("extraction runs");

    let sequential: Vec<f32> = sequence.records[0].values.clone();
    let pixels = 64 * 64;
    let data = direct_buffer.data();
    // Compare one channel plane; both paths decode the same frame.
    for pixel in 0..pixels {
        assert_eq!(sequential[pixel], data[pixel * 3] as f32);
    }
}

#[test]
fn direct_access_past_the_frame_count_is_out_of_range() {
    if fixture_missing() {
        return;
    }

    let source = ClipSource::path(sample_clip_path());
    match FrameDecoder::frame_at(&source, 10_000, (64, 64)) {
        Err(FramefeedError::FrameOutOfRange {
            frame_number,
            total_frames,
        }) => {
            assert_eq!(frame_number, 10_000);
            assert!(total_frames > 0);
        }
        Err(other) => panic!("expected FrameOutOfRange, got {other:?}"),
        Ok(_) => panic!("decoding frame 10000 of a 4s clip succeeded"),
    }
}

// ── end-to-end batching over the fixture ───────────────────────────

#[test]
fn fixture_clip_batches_end_to_end() {
    if fixture_missing() {
        return;
    }

    // The fixture is not numbered; stage it under the numbered pattern.
    let staging = tempfile::TempDir::new().expect("temp dir");
    fs::copy(sample_clip_path(), staging.path().join("sportclip_0.mp4")).expect("stage video");
    fs::copy(
        "tests/fixtures/sample_clip.txt",
        staging.path().join("sportclip_0.txt"),
    )
    .expect("stage labels");

    let clips = ClipSet::new(staging.path(), "sportclip_{}", 0, 1).expect("clip set");
    let window = FrameWindow::frames(0, 10).with_target_size(64, 64);
    let mut batches =
        LabeledSequenceBatcher::for_clip_set(clips, window, 16, 11).expect("batcher");

    let batch = batches
        .next()
        .expect("one batch")
        .expect("batch assembles");
    assert_eq!(batch.len(), 10);
    assert!(batch.last);
    for row in 0..batch.len() {
        assert_eq!(batch.label_index(row), Some(2));
    }
    for row in &batch.features {
        assert!(row.iter().all(|&value| (0.0..=1.0).contains(&value)));
    }
    assert!(batches.next().is_none());
}
