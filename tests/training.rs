//! Early-stopping scheduler tests with a scripted model.

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use framefeed::{
    BatchSource, CancellationToken, Classifier, EarlyStopping, FramefeedError, MiniBatch,
    ModelPersistence, TerminationReason, TrainableModel, BEST_MODEL_FILE,
};
use tempfile::TempDir;

/// A model whose test score follows a fixed script, one entry per epoch.
struct ScriptedModel {
    scores: Vec<f64>,
    epoch: Cell<usize>,
    fits: usize,
    saves: Cell<usize>,
}

impl ScriptedModel {
    fn new(scores: &[f64]) -> Self {
        Self {
            scores: scores.to_vec(),
            epoch: Cell::new(0),
            fits: 0,
            saves: Cell::new(0),
        }
    }
}

impl Classifier for ScriptedModel {
    fn classify(&self, features: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, FramefeedError> {
        Ok(vec![vec![1.0]; features.len()])
    }
}

impl TrainableModel for ScriptedModel {
    fn fit(&mut self, _batch: &MiniBatch) -> Result<f64, FramefeedError> {
        self.fits += 1;
        Ok(0.5)
    }

    fn score(&self, _batch: &MiniBatch) -> Result<f64, FramefeedError> {
        // One scoring batch per epoch, so the epoch advances here.
        let epoch = self.epoch.get();
        self.epoch.set(epoch + 1);
        Ok(self.scores[epoch.min(self.scores.len() - 1)])
    }
}

impl ModelPersistence for ScriptedModel {
    fn save(&self, path: &Path) -> Result<(), FramefeedError> {
        self.saves.set(self.saves.get() + 1);
        std::fs::write(path, b"scripted")?;
        Ok(())
    }

    fn load(_path: &Path) -> Result<Self, FramefeedError> {
        Ok(Self::new(&[]))
    }
}

/// A restartable stream of `batches` single-row batches per pass.
struct SyntheticBatches {
    batches: usize,
    next: usize,
}

impl SyntheticBatches {
    fn new(batches: usize) -> Self {
        Self { batches, next: 0 }
    }
}

impl Iterator for SyntheticBatches {
    type Item = Result<MiniBatch, FramefeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.batches {
            return None;
        }
        self.next += 1;
        Some(Ok(MiniBatch {
            features: vec![vec![0.0; 4]],
            labels: vec![vec![1.0]],
            last: self.next == self.batches,
        }))
    }
}

impl BatchSource for SyntheticBatches {
    fn reset(&mut self) {
        self.next = 0;
    }
}

#[test]
fn runs_to_the_epoch_budget_when_scores_keep_improving() {
    let mut model = ScriptedModel::new(&[5.0, 4.0, 3.0, 2.0]);
    let mut train = SyntheticBatches::new(3);
    let mut test = SyntheticBatches::new(1);

    let outcome = EarlyStopping::new(4)
        .train(&mut model, &mut train, &mut test)
        .expect("training runs");

    assert_eq!(outcome.epochs_run, 4);
    assert_eq!(outcome.termination, TerminationReason::MaxEpochs);
    assert_eq!(outcome.best_epoch, 3);
    assert_eq!(outcome.best_score, 2.0);
    assert_eq!(model.fits, 4 * 3, "three fit batches per epoch");
}

#[test]
fn stops_after_a_run_of_stale_epochs() {
    // Improvement at epochs 0 and 1, then flat.
    let mut model = ScriptedModel::new(&[5.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(1);

    let outcome = EarlyStopping::new(37)
        .with_max_stale_epochs(3)
        .train(&mut model, &mut train, &mut test)
        .expect("training runs");

    assert_eq!(outcome.termination, TerminationReason::NoImprovement);
    assert_eq!(outcome.best_epoch, 1);
    assert_eq!(outcome.best_score, 3.0);
    // Epochs 0, 1, then three stale epochs.
    assert_eq!(outcome.epochs_run, 5);
}

#[test]
fn zero_duration_budget_stops_before_the_first_epoch() {
    let mut model = ScriptedModel::new(&[1.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(1);

    let outcome = EarlyStopping::new(37)
        .with_max_duration(Duration::ZERO)
        .train(&mut model, &mut train, &mut test)
        .expect("training runs");

    assert_eq!(outcome.termination, TerminationReason::MaxDuration);
    assert_eq!(outcome.epochs_run, 0);
    assert_eq!(model.fits, 0);
}

#[test]
fn best_model_is_saved_on_improvement() {
    let dir = TempDir::new().expect("temp dir");
    let mut model = ScriptedModel::new(&[5.0, 3.0, 4.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(1);

    let outcome = EarlyStopping::new(3)
        .with_save_directory(dir.path())
        .train(&mut model, &mut train, &mut test)
        .expect("training runs");

    assert_eq!(outcome.best_epoch, 1);
    // Saved at epochs 0 and 1, not at the regression in epoch 2.
    assert_eq!(model.saves.get(), 2);
    assert!(dir.path().join(BEST_MODEL_FILE).exists());
}

#[test]
fn zero_max_epochs_is_a_configuration_error() {
    let mut model = ScriptedModel::new(&[1.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(1);

    assert!(matches!(
        EarlyStopping::new(0).train(&mut model, &mut train, &mut test),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn cancellation_aborts_the_run() {
    let token = CancellationToken::new();
    token.cancel();

    let mut model = ScriptedModel::new(&[1.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(1);

    assert!(matches!(
        EarlyStopping::new(5)
            .with_cancellation(token)
            .train(&mut model, &mut train, &mut test),
        Err(FramefeedError::Cancelled)
    ));
}

#[test]
fn empty_test_stream_never_improves() {
    let mut model = ScriptedModel::new(&[1.0]);
    let mut train = SyntheticBatches::new(1);
    let mut test = SyntheticBatches::new(0);

    let outcome = EarlyStopping::new(2)
        .with_max_stale_epochs(2)
        .train(&mut model, &mut train, &mut test)
        .expect("training runs");

    // An empty scoring pass yields an infinite score, which never beats
    // the initial best.
    assert_eq!(outcome.termination, TerminationReason::NoImprovement);
    assert_eq!(outcome.best_score, f64::INFINITY);
}
