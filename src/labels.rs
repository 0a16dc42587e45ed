//! Label catalogs, per-clip label files, and one-hot encoding.
//!
//! A [`LabelCatalog`] is the ordered list of category names shared by data
//! loading and evaluation. It is constructed once at process start and
//! passed by reference to every component that needs it — there is no
//! process-wide catalog singleton.
//!
//! Per-clip labels live in auxiliary UTF-8 text files, one integer per line,
//! one line per requested frame. [`read_clip_labels`] enforces that contract:
//! a line count that disagrees with the frame window, or a line that does not
//! parse as a category index, is a data-integrity error raised before any
//! row of the clip reaches a batch.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::FramefeedError;

/// Ordered, read-only mapping between category indices and names.
///
/// # Example
///
/// ```
/// use framefeed::LabelCatalog;
///
/// let catalog = LabelCatalog::sports();
/// assert_eq!(catalog.len(), 11);
/// assert_eq!(catalog.name(2), Some("basketball"));
/// assert_eq!(catalog.index_of("golf"), Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    names: Vec<String>,
}

impl LabelCatalog {
    /// Build a catalog from ordered category names.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if the list is empty or contains
    /// duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self, FramefeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(FramefeedError::Configuration {
                reason: "a label catalog needs at least one category".to_string(),
            });
        }
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(FramefeedError::Configuration {
                    reason: format!("duplicate category name {name:?} in label catalog"),
                });
            }
        }
        Ok(Self { names })
    }

    /// The eleven-sport catalog the research dataset was labeled with.
    pub fn sports() -> Self {
        Self {
            names: [
                "icehockey",
                "soccer",
                "basketball",
                "football",
                "golf",
                "swimming",
                "tennis",
                "skiing",
                "freshwaterfishing",
                "saltwaterfishing",
                "flyfishing",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` only for a catalog that failed construction; kept for the
    /// conventional pairing with [`len`](LabelCatalog::len).
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The name at `index`, if the catalog has one.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// The index of `name`, if the catalog contains it.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Iterate the category names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Read a per-clip label file and check it against the requested frame count.
///
/// Trailing newlines are tolerated; anything else that does not parse as a
/// non-negative integer is an error. The caller pairs the returned labels
/// with frame records by index.
///
/// # Errors
///
/// - [`FramefeedError::IoError`] if the file cannot be read.
/// - [`FramefeedError::DataIntegrity`] on a line-count mismatch or an
///   unparsable line.
pub fn read_clip_labels(
    path: &Path,
    expected_frames: u64,
) -> Result<Vec<usize>, FramefeedError> {
    let contents = fs::read_to_string(path)?;

    let mut labels = Vec::with_capacity(expected_frames as usize);
    for (line_number, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let label = trimmed
            .parse::<usize>()
            .map_err(|_| FramefeedError::DataIntegrity {
                path: path.to_path_buf(),
                detail: format!(
                    "line {} is not a category index: {trimmed:?}",
                    line_number + 1
                ),
            })?;
        labels.push(label);
    }

    if labels.len() as u64 != expected_frames {
        return Err(FramefeedError::DataIntegrity {
            path: path.to_path_buf(),
            detail: format!(
                "label file holds {} label(s) but the window requests {expected_frames} frame(s)",
                labels.len()
            ),
        });
    }

    debug!("read {} label(s) from {}", labels.len(), path.display());
    Ok(labels)
}

/// One-hot encode a label against a category count.
///
/// # Errors
///
/// [`FramefeedError::LabelOutOfRange`] if `label >= categories`.
pub fn one_hot(label: usize, categories: usize) -> Result<Vec<f32>, FramefeedError> {
    if label >= categories {
        return Err(FramefeedError::LabelOutOfRange { label, categories });
    }
    let mut row = vec![0.0; categories];
    row[label] = 1.0;
    Ok(row)
}
