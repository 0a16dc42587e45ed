//! Early-stopping training scheduler.
//!
//! [`EarlyStopping`] runs epochs of `fit` over a training batch stream and
//! scores the model on a test stream after each epoch, stopping on whichever
//! termination condition trips first: a maximum epoch count, a wall-clock
//! budget, or a run of epochs without score improvement. The best-scoring
//! model is persisted through the [`ModelPersistence`] seam whenever a save
//! directory is configured.
//!
//! Scores are average per-batch losses — lower is better. Cancellation is
//! honored at every epoch and batch boundary.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::batcher::BatchSource;
use crate::error::FramefeedError;
use crate::model::{ModelPersistence, TrainableModel};
use crate::progress::CancellationToken;

/// File name the best model is saved under inside the save directory.
pub const BEST_MODEL_FILE: &str = "best_model.bin";

/// Why a training run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The configured epoch budget was spent.
    MaxEpochs,
    /// The wall-clock budget was spent.
    MaxDuration,
    /// The score failed to improve for the configured number of epochs.
    NoImprovement,
}

/// The result of an early-stopping run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// Epoch with the best (lowest) test score, 0-based.
    pub best_epoch: usize,
    /// The best test score observed.
    pub best_score: f64,
    /// Total epochs that ran.
    pub epochs_run: usize,
    /// Which condition stopped the run.
    pub termination: TerminationReason,
}

/// Early-stopping configuration and driver.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use framefeed::{ClipSet, EarlyStopping, FrameWindow, LabeledSequenceBatcher};
/// # use framefeed::{Classifier, FramefeedError, MiniBatch, ModelPersistence, TrainableModel};
/// # struct MyModel;
/// # impl Classifier for MyModel {
/// #     fn classify(&self, _: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, FramefeedError> { Ok(vec![]) }
/// # }
/// # impl TrainableModel for MyModel {
/// #     fn fit(&mut self, _: &MiniBatch) -> Result<f64, FramefeedError> { Ok(0.0) }
/// #     fn score(&self, _: &MiniBatch) -> Result<f64, FramefeedError> { Ok(0.0) }
/// # }
/// # impl ModelPersistence for MyModel {
/// #     fn save(&self, _: &std::path::Path) -> Result<(), FramefeedError> { Ok(()) }
/// #     fn load(_: &std::path::Path) -> Result<Self, FramefeedError> { Ok(MyModel) }
/// # }
///
/// let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
/// let mut train = LabeledSequenceBatcher::for_clip_set(
///     ClipSet::new("video_data/training", "sportclip_{}", 0, 100)?, window.clone(), 16, 11)?;
/// let mut test = LabeledSequenceBatcher::for_clip_set(
///     ClipSet::new("video_data/testing", "sportclip_{}", 0, 20)?, window, 16, 11)?;
///
/// let scheduler = EarlyStopping::new(37)
///     .with_max_duration(Duration::from_secs(15 * 3600))
///     .with_max_stale_epochs(5)
///     .with_save_directory("saved_models");
///
/// let mut model = MyModel;
/// let outcome = scheduler.train(&mut model, &mut train, &mut test)?;
/// println!("best epoch {} (score {:.4})", outcome.best_epoch, outcome.best_score);
/// # Ok::<(), FramefeedError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    max_epochs: usize,
    max_duration: Option<Duration>,
    max_stale_epochs: Option<usize>,
    save_directory: Option<PathBuf>,
    cancellation: Option<CancellationToken>,
}

impl EarlyStopping {
    /// A scheduler that stops after at most `max_epochs` epochs.
    pub fn new(max_epochs: usize) -> Self {
        Self {
            max_epochs,
            max_duration: None,
            max_stale_epochs: None,
            save_directory: None,
            cancellation: None,
        }
    }

    /// Also stop once this much wall-clock time has been spent.
    #[must_use]
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Also stop after this many consecutive epochs without a score
    /// improvement.
    #[must_use]
    pub fn with_max_stale_epochs(mut self, epochs: usize) -> Self {
        self.max_stale_epochs = Some(epochs);
        self
    }

    /// Persist the best model into this directory as it improves.
    #[must_use]
    pub fn with_save_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.save_directory = Some(directory.into());
        self
    }

    /// Honor this token at epoch and batch boundaries.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Run the early-stopping loop.
    ///
    /// Each epoch fits the model over `train` (then resets it) and averages
    /// `score` over `test` (then resets it). The best epoch and score are
    /// tracked across the run; with a save directory configured, every
    /// improvement overwrites `best_model.bin` there.
    ///
    /// # Errors
    ///
    /// - [`FramefeedError::Configuration`] if `max_epochs` is zero.
    /// - [`FramefeedError::Cancelled`] if the token fires.
    /// - Any error from the batch streams, the model, or persistence.
    pub fn train<M, Train, Test>(
        &self,
        model: &mut M,
        train: &mut Train,
        test: &mut Test,
    ) -> Result<TrainingOutcome, FramefeedError>
    where
        M: TrainableModel + ModelPersistence,
        Train: BatchSource,
        Test: BatchSource,
    {
        if self.max_epochs == 0 {
            return Err(FramefeedError::Configuration {
                reason: "max_epochs must be positive".to_string(),
            });
        }
        if let Some(directory) = &self.save_directory {
            std::fs::create_dir_all(directory)?;
        }

        let started = Instant::now();
        let mut best_score = f64::INFINITY;
        let mut best_epoch = 0;
        let mut stale_epochs = 0;
        let mut epochs_run = 0;
        let mut termination = TerminationReason::MaxEpochs;

        for epoch in 0..self.max_epochs {
            self.check_cancelled()?;
            if self.out_of_time(started) {
                termination = TerminationReason::MaxDuration;
                break;
            }

            // One pass of fitting over the training stream.
            for batch in &mut *train {
                self.check_cancelled()?;
                let loss = model.fit(&batch?)?;
                debug!("epoch {epoch}: batch loss {loss:.6}");
            }
            train.reset();
            epochs_run = epoch + 1;

            // Score on the test stream: average per-batch loss.
            let score = self.score_pass(model, test)?;
            test.reset();

            if score < best_score {
                best_score = score;
                best_epoch = epoch;
                stale_epochs = 0;
                if let Some(directory) = &self.save_directory {
                    let path = directory.join(BEST_MODEL_FILE);
                    model.save(&path)?;
                    debug!("epoch {epoch}: new best score {score:.6}, saved {}", path.display());
                }
            } else {
                stale_epochs += 1;
            }

            info!(
                "epoch {epoch}: score {score:.6} (best {best_score:.6} at epoch {best_epoch})"
            );

            if let Some(limit) = self.max_stale_epochs
                && stale_epochs >= limit
            {
                termination = TerminationReason::NoImprovement;
                break;
            }
            if self.out_of_time(started) {
                termination = TerminationReason::MaxDuration;
                break;
            }
        }

        info!(
            "training stopped after {epochs_run} epoch(s): {termination:?}, \
             best epoch {best_epoch} (score {best_score:.6})"
        );

        Ok(TrainingOutcome {
            best_epoch,
            best_score,
            epochs_run,
            termination,
        })
    }

    fn score_pass<M, Test>(&self, model: &M, test: &mut Test) -> Result<f64, FramefeedError>
    where
        M: TrainableModel,
        Test: BatchSource,
    {
        let mut total = 0.0;
        let mut batches = 0u64;
        for batch in test {
            self.check_cancelled()?;
            total += model.score(&batch?)?;
            batches += 1;
        }
        if batches == 0 {
            return Ok(f64::INFINITY);
        }
        Ok(total / batches as f64)
    }

    fn check_cancelled(&self) -> Result<(), FramefeedError> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(FramefeedError::Cancelled);
        }
        Ok(())
    }

    fn out_of_time(&self, started: Instant) -> bool {
        self.max_duration
            .is_some_and(|budget| started.elapsed() >= budget)
    }
}
