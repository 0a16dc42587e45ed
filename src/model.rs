//! The model seam: traits the training and evaluation loops consume.
//!
//! `framefeed` deliberately contains no neural network execution engine.
//! The tensor framework plugs in behind three small traits: [`Classifier`]
//! for inference, [`TrainableModel`] for fitting and scoring, and
//! [`ModelPersistence`] for opaque save/load of model artifacts. The
//! serialized format is entirely the implementer's business.

use std::path::Path;

use crate::batcher::MiniBatch;
use crate::error::FramefeedError;

/// A model that maps feature rows to per-category score rows.
pub trait Classifier {
    /// Score each input row, returning one row of category scores per input.
    ///
    /// Output rows must all have the same length (the category count); the
    /// evaluator argmaxes them against one-hot actuals.
    fn classify(&self, features: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, FramefeedError>;
}

/// A classifier that can also be fitted to labeled batches.
pub trait TrainableModel: Classifier {
    /// Run one optimization step over `batch`, returning the batch loss.
    fn fit(&mut self, batch: &MiniBatch) -> Result<f64, FramefeedError>;

    /// Compute the loss over `batch` without updating the model.
    ///
    /// The early-stopping scheduler averages this across the test stream
    /// after each epoch; lower is better.
    fn score(&self, batch: &MiniBatch) -> Result<f64, FramefeedError>;
}

/// Opaque model artifact persistence.
pub trait ModelPersistence: Sized {
    /// Serialize the model to `path`.
    fn save(&self, path: &Path) -> Result<(), FramefeedError>;

    /// Deserialize a model from `path`.
    fn load(path: &Path) -> Result<Self, FramefeedError>;
}
