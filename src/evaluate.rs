//! Evaluation: per-category confusion statistics.
//!
//! [`Evaluation`] accumulates a confusion matrix from predicted-vs-actual
//! score rows across any number of batches, then derives per-category
//! precision, recall, and F1 plus overall accuracy and macro averages. Its
//! [`Display`](std::fmt::Display) implementation renders the aggregate stats
//! as text.
//!
//! Two single-clip helpers stage a clip through a temporary directory —
//! shaped like a one-clip dataset — so a trained model can classify one
//! video end to end. Staging lives in RAII [`TempDir`]s and is removed on
//! every exit path, including decode failures.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::Path;

use log::{debug, info};
use tempfile::TempDir;

use crate::batcher::{BatchSource, LabeledSequenceBatcher, MiniBatch};
use crate::clipset::ClipSet;
use crate::decoder::FrameDecoder;
use crate::error::FramefeedError;
use crate::folder::{FolderDataset, ImageBatchStream};
use crate::labels::LabelCatalog;
use crate::model::Classifier;
use crate::source::ClipSource;
use crate::window::FrameWindow;

/// Per-category confusion-matrix aggregation over an evaluation pass.
///
/// Rows of the matrix index the actual category, columns the predicted one.
///
/// # Example
///
/// ```
/// use framefeed::{Evaluation, LabelCatalog};
///
/// let catalog = LabelCatalog::new(["cats", "dogs"])?;
/// let mut evaluation = Evaluation::new(&catalog);
///
/// // Two rows: one correct "cats", one "dogs" misread as "cats".
/// evaluation.eval_batch(
///     &[vec![0.9, 0.1], vec![0.7, 0.3]],
///     &[vec![1.0, 0.0], vec![0.0, 1.0]],
/// )?;
///
/// assert_eq!(evaluation.true_positives(0), 1);
/// assert_eq!(evaluation.false_positives(0), 1);
/// assert_eq!(evaluation.accuracy(), 0.5);
/// # Ok::<(), framefeed::FramefeedError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Evaluation {
    catalog: LabelCatalog,
    /// `confusion[actual][predicted]`.
    confusion: Vec<Vec<u64>>,
}

impl Evaluation {
    /// An empty evaluation over `catalog`'s categories.
    pub fn new(catalog: &LabelCatalog) -> Self {
        let categories = catalog.len();
        Self {
            catalog: catalog.clone(),
            confusion: vec![vec![0; categories]; categories],
        }
    }

    /// Accumulate one batch of predictions.
    ///
    /// `predicted` and `actual` are row-aligned score matrices, one row per
    /// frame and one column per category; each row is argmaxed.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::DataIntegrity`] if the matrices disagree in row
    /// count or a row's width is not the category count.
    pub fn eval_batch(
        &mut self,
        predicted: &[Vec<f32>],
        actual: &[Vec<f32>],
    ) -> Result<(), FramefeedError> {
        if predicted.len() != actual.len() {
            return Err(FramefeedError::DataIntegrity {
                path: "<evaluation>".into(),
                detail: format!(
                    "predicted rows ({}) and actual rows ({}) differ",
                    predicted.len(),
                    actual.len()
                ),
            });
        }

        for (predicted_row, actual_row) in predicted.iter().zip(actual) {
            let predicted_index = self.argmax(predicted_row, "predicted")?;
            let actual_index = self.argmax(actual_row, "actual")?;
            self.confusion[actual_index][predicted_index] += 1;
        }
        Ok(())
    }

    fn argmax(&self, row: &[f32], which: &str) -> Result<usize, FramefeedError> {
        if row.len() != self.catalog.len() {
            return Err(FramefeedError::DataIntegrity {
                path: "<evaluation>".into(),
                detail: format!(
                    "{which} row has {} column(s), catalog has {} categories",
                    row.len(),
                    self.catalog.len()
                ),
            });
        }
        let mut best = 0;
        for (index, &value) in row.iter().enumerate() {
            if value > row[best] {
                best = index;
            }
        }
        Ok(best)
    }

    /// Total rows accumulated so far.
    pub fn total(&self) -> u64 {
        self.confusion.iter().flatten().sum()
    }

    /// Rows of `category` predicted as `category`.
    pub fn true_positives(&self, category: usize) -> u64 {
        self.confusion[category][category]
    }

    /// Rows of other categories predicted as `category`.
    pub fn false_positives(&self, category: usize) -> u64 {
        self.confusion
            .iter()
            .enumerate()
            .filter(|(actual, _)| *actual != category)
            .map(|(_, row)| row[category])
            .sum()
    }

    /// Rows of `category` predicted as something else.
    pub fn false_negatives(&self, category: usize) -> u64 {
        self.confusion[category]
            .iter()
            .enumerate()
            .filter(|(predicted, _)| *predicted != category)
            .map(|(_, count)| count)
            .sum()
    }

    /// Rows neither of `category` nor predicted as it.
    pub fn true_negatives(&self, category: usize) -> u64 {
        self.total()
            - self.true_positives(category)
            - self.false_positives(category)
            - self.false_negatives(category)
    }

    /// `TP / (TP + FP)`; 0 when the category was never predicted.
    pub fn precision(&self, category: usize) -> f64 {
        ratio(
            self.true_positives(category),
            self.true_positives(category) + self.false_positives(category),
        )
    }

    /// `TP / (TP + FN)`; 0 when the category never occurred.
    pub fn recall(&self, category: usize) -> f64 {
        ratio(
            self.true_positives(category),
            self.true_positives(category) + self.false_negatives(category),
        )
    }

    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub fn f1(&self, category: usize) -> f64 {
        let precision = self.precision(category);
        let recall = self.recall(category);
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }

    /// Fraction of rows whose prediction matched the actual category.
    pub fn accuracy(&self) -> f64 {
        let correct = (0..self.catalog.len())
            .map(|category| self.true_positives(category))
            .sum();
        ratio(correct, self.total())
    }

    /// Unweighted mean precision across categories.
    pub fn macro_precision(&self) -> f64 {
        self.macro_average(Self::precision)
    }

    /// Unweighted mean recall across categories.
    pub fn macro_recall(&self) -> f64 {
        self.macro_average(Self::recall)
    }

    /// Unweighted mean F1 across categories.
    pub fn macro_f1(&self) -> f64 {
        self.macro_average(Self::f1)
    }

    fn macro_average(&self, metric: fn(&Self, usize) -> f64) -> f64 {
        let categories = self.catalog.len();
        (0..categories).map(|category| metric(self, category)).sum::<f64>() / categories as f64
    }

    /// How often each category was predicted, in catalog order.
    pub fn prediction_counts(&self) -> Vec<u64> {
        (0..self.catalog.len())
            .map(|predicted| self.confusion.iter().map(|row| row[predicted]).sum())
            .collect()
    }

    /// The category most often predicted for rows whose actual category is
    /// `actual`. `None` if no such rows were seen.
    ///
    /// This is the "what did the model call this clip" question single-clip
    /// evaluation asks.
    pub fn most_predicted_category(&self, actual: usize) -> Option<usize> {
        let row = self.confusion.get(actual)?;
        let (best, &count) = row
            .iter()
            .enumerate()
            .max_by_key(|&(_, &count)| count)?;
        (count > 0).then_some(best)
    }

    /// The catalog this evaluation reports against.
    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(
            f,
            "Evaluation over {} row(s) — accuracy {:.4}",
            self.total(),
            self.accuracy()
        )?;
        writeln!(
            f,
            "{:<20} {:>6} {:>6} {:>6} {:>9} {:>9} {:>9}",
            "category", "TP", "FP", "FN", "precision", "recall", "f1"
        )?;
        for (category, name) in self.catalog.iter().enumerate() {
            writeln!(
                f,
                "{:<20} {:>6} {:>6} {:>6} {:>9.4} {:>9.4} {:>9.4}",
                name,
                self.true_positives(category),
                self.false_positives(category),
                self.false_negatives(category),
                self.precision(category),
                self.recall(category),
                self.f1(category),
            )?;
        }
        write!(
            f,
            "macro: precision {:.4}, recall {:.4}, f1 {:.4}",
            self.macro_precision(),
            self.macro_recall(),
            self.macro_f1()
        )
    }
}

/// Drive a classifier over a batch stream, accumulating into `evaluation`.
///
/// # Errors
///
/// Any error from the batch stream or the classifier propagates; partial
/// accumulation up to the failing batch remains in `evaluation`.
pub fn evaluate_batches<B: BatchSource>(
    classifier: &dyn Classifier,
    batches: &mut B,
    evaluation: &mut Evaluation,
) -> Result<(), FramefeedError> {
    for batch in batches {
        let batch: MiniBatch = batch?;
        let predicted = classifier.classify(&batch.features)?;
        evaluation.eval_batch(&predicted, &batch.labels)?;
    }
    Ok(())
}

/// Stem used for the staged one-clip dataset.
const STAGED_CLIP_PATTERN: &str = "clip_{}";

/// Evaluate a single clip with a sequence (recurrent) model.
///
/// The clip is copied into a temporary directory alongside a synthesized
/// label file (one line per frame, all `category`), run through the
/// sequential batcher with batch size 1, and classified. The staging
/// directory is removed when this function returns, on success or failure.
///
/// # Errors
///
/// [`FramefeedError::LabelOutOfRange`] if `category` is not in `catalog`;
/// otherwise any staging, extraction, or classification error.
pub fn evaluate_clip_sequence(
    classifier: &dyn Classifier,
    clip_path: &Path,
    category: usize,
    window: FrameWindow,
    catalog: &LabelCatalog,
) -> Result<Evaluation, FramefeedError> {
    if category >= catalog.len() {
        return Err(FramefeedError::LabelOutOfRange {
            label: category,
            categories: catalog.len(),
        });
    }
    let plan_frames = {
        let extractor = crate::extractor::SequentialFrameExtractor::new(window.clone())?;
        extractor.requested_frames()
    };

    // Staging is RAII: the TempDir removes itself on every exit path.
    let staging = TempDir::new()?;
    let video = staging.path().join("clip_0.mp4");
    let labels = staging.path().join("clip_0.txt");
    fs::copy(clip_path, &video)?;

    let mut label_lines = String::new();
    for _ in 0..plan_frames {
        label_lines.push_str(&format!("{category}\n"));
    }
    fs::write(&labels, label_lines)?;
    debug!("staged {} as {}", clip_path.display(), video.display());

    let clips = ClipSet::new(staging.path(), STAGED_CLIP_PATTERN, 0, 1)?;
    let mut batches =
        LabeledSequenceBatcher::for_clip_set(clips, window, 1, catalog.len())?;

    let mut evaluation = Evaluation::new(catalog);
    evaluate_batches(classifier, &mut batches, &mut evaluation)?;

    if let Some(called) = evaluation.most_predicted_category(category) {
        info!(
            "clip {} most often classified as {:?}",
            clip_path.display(),
            catalog.name(called)
        );
    }
    Ok(evaluation)
}

/// Evaluate a single clip with a per-frame model.
///
/// Every `frame_step`-th frame of the window `[start_frame, start_frame +
/// frame_count * frame_step)` is decoded directly, written as a BMP into a
/// temporary category directory, and run through the image-folder loader.
/// The staging directory is removed when this function returns, on success
/// or failure.
pub fn evaluate_clip_frames(
    classifier: &dyn Classifier,
    clip_path: &Path,
    category: usize,
    start_frame: u64,
    frame_count: u64,
    frame_step: u64,
    target_rows: u32,
    target_columns: u32,
    catalog: &LabelCatalog,
) -> Result<Evaluation, FramefeedError> {
    let category_name =
        catalog
            .name(category)
            .ok_or(FramefeedError::LabelOutOfRange {
                label: category,
                categories: catalog.len(),
            })?;
    if frame_step == 0 || frame_count == 0 {
        return Err(FramefeedError::Configuration {
            reason: "frame_count and frame_step must be positive".to_string(),
        });
    }

    let staging = TempDir::new()?;
    let category_dir = staging.path().join(category_name);
    fs::create_dir_all(&category_dir)?;

    let source = ClipSource::path(clip_path);
    let dimensions = (target_columns, target_rows);
    for step in 0..frame_count {
        let frame_number = start_frame + step * frame_step;
        let picture = FrameDecoder::frame_at(&source, frame_number, dimensions)?;
        let buffer = picture.to_bgr_buffer()?;

        let image = image::RgbImage::from_raw(
            buffer.width(),
            buffer.height(),
            buffer.to_rgb_bytes(),
        )
        .ok_or_else(|| FramefeedError::FrameDecodeFailed {
            frame_number,
            reason: "converted buffer does not fill the target dimensions".to_string(),
        })?;
        image.save(category_dir.join(format!("img_{frame_number}.bmp")))?;
    }

    let dataset = FolderDataset::scan(staging.path(), catalog, &["bmp"])?;
    // Everything into one group: this is a classification pass, not a split.
    let split = dataset.balanced_split(0, 100)?;
    let mut batches = ImageBatchStream::new(
        split.first,
        target_rows,
        target_columns,
        frame_count as usize,
        catalog.len(),
    )?;

    let mut evaluation = Evaluation::new(catalog);
    evaluate_batches(classifier, &mut batches, &mut evaluation)?;
    Ok(evaluation)
}
