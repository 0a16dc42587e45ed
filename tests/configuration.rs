//! FrameWindow, ClipSet, and batcher configuration validation tests.
//!
//! Configuration errors must be raised before any file is touched, so none
//! of these tests needs a fixture.

use framefeed::{
    ClipSet, FrameSource, FrameWindow, FramefeedError, LabeledClip, LabeledSequenceBatcher,
    SequentialFrameExtractor,
};

fn assert_configuration_error(result: Result<(), FramefeedError>, needle: &str) {
    match result {
        Err(FramefeedError::Configuration { reason }) => {
            assert!(
                reason.contains(needle),
                "expected reason containing {needle:?}, got {reason:?}"
            );
        }
        other => panic!("expected Configuration error, got {other:?}"),
    }
}

// ── frame windows ──────────────────────────────────────────────────

#[test]
fn frame_count_window_validates() {
    let window = FrameWindow::frames(0, 10).with_target_size(64, 64);
    window.validate().expect("valid window");
    assert_eq!(window.record_len(), 64 * 64 * 3);
}

#[test]
fn timed_window_validates() {
    let window = FrameWindow::timed(2.0, 30.0).with_target_size(64, 64);
    window.validate().expect("valid window");
}

#[test]
fn both_sampling_modes_is_a_configuration_error() {
    let mut window = FrameWindow::frames(0, 10);
    window.frames_per_second_sample = Some(2.0);
    assert_configuration_error(window.validate(), "pick one");
}

#[test]
fn neither_sampling_mode_is_a_configuration_error() {
    let mut window = FrameWindow::frames(0, 10);
    window.frame_count = None;
    assert_configuration_error(window.validate(), "no sampling mode");
}

#[test]
fn zero_frame_count_rejected() {
    assert_configuration_error(FrameWindow::frames(0, 0).validate(), "frame_count");
}

#[test]
fn non_positive_sample_rate_rejected() {
    assert_configuration_error(
        FrameWindow::timed(0.0, 30.0).validate(),
        "frames_per_second_sample",
    );
    assert_configuration_error(
        FrameWindow::timed(-2.0, 30.0).validate(),
        "frames_per_second_sample",
    );
}

#[test]
fn timed_window_needs_a_duration() {
    let mut window = FrameWindow::timed(2.0, 30.0);
    window.clip_duration_seconds = None;
    assert_configuration_error(window.validate(), "clip_duration_seconds");
}

#[test]
fn zero_resolution_rejected() {
    assert_configuration_error(
        FrameWindow::frames(0, 10).with_target_size(0, 64).validate(),
        "target resolution",
    );
}

#[test]
fn extractor_construction_validates_the_window() {
    let mut window = FrameWindow::frames(0, 10);
    window.frames_per_second_sample = Some(2.0);
    assert!(matches!(
        SequentialFrameExtractor::new(window),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn default_window_matches_the_research_resolution() {
    let window = FrameWindow::frames(0, 10);
    assert_eq!(window.target_rows, 168);
    assert_eq!(window.target_columns, 168);
    assert!(window.ravel);
}

// ── clip sets ──────────────────────────────────────────────────────

#[test]
fn clip_set_expands_the_pattern() {
    let clips = ClipSet::new("data", "sportclip_{}", 3, 2).expect("valid set");
    let entries = clips.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].index, 3);
    assert!(entries[0].video.ends_with("sportclip_3.mp4"));
    assert!(entries[0].labels.ends_with("sportclip_3.txt"));
    assert!(entries[1].video.ends_with("sportclip_4.mp4"));
}

#[test]
fn clip_set_rejects_a_pattern_without_placeholder() {
    assert!(matches!(
        ClipSet::new("data", "sportclip", 0, 1),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn clip_set_rejects_zero_clips() {
    assert!(matches!(
        ClipSet::new("data", "sportclip_{}", 0, 0),
        Err(FramefeedError::Configuration { .. })
    ));
}

// ── batcher configuration ──────────────────────────────────────────

struct EmptySource;

impl FrameSource for EmptySource {
    fn clip_count(&self) -> usize {
        0
    }

    fn load_clip(&mut self, _index: usize) -> Result<LabeledClip, FramefeedError> {
        unreachable!("no clips to load");
    }
}

#[test]
fn batcher_rejects_zero_batch_size() {
    assert!(matches!(
        LabeledSequenceBatcher::new(Box::new(EmptySource), 0, 11),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn batcher_rejects_zero_categories() {
    assert!(matches!(
        LabeledSequenceBatcher::new(Box::new(EmptySource), 16, 0),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn empty_source_yields_no_batches() {
    let mut batcher =
        LabeledSequenceBatcher::new(Box::new(EmptySource), 16, 11).expect("valid batcher");
    assert!(batcher.next().is_none());
}
