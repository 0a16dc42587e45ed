//! Image-folder mode: non-sequential frame sets.
//!
//! Some of the research data is stored as individual frame images rather
//! than video clips, one subdirectory per category:
//!
//! ```text
//! root/
//!   icehockey/img_0.bmp
//!   icehockey/img_30.bmp
//!   soccer/img_0.bmp
//!   ...
//! ```
//!
//! [`FolderDataset::scan`] collects the matching files per category, and
//! [`balanced_split`](FolderDataset::balanced_split) partitions them into
//! two disjoint groups with a deterministic seeded shuffle: each category
//! contributes proportionally to both groups, and the same seed over the
//! same file set always yields the same membership. Each group becomes an
//! [`ImageBatchStream`] — a restartable mini-batch stream that decodes
//! images with the `image` crate (not the video decoder), resizes them to
//! the target resolution, flattens channel-major in BGR order, and
//! normalizes to [0,1] exactly like the sequential path.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use log::{debug, warn};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::batcher::{BatchSource, MiniBatch};
use crate::error::FramefeedError;
use crate::labels::{LabelCatalog, one_hot};
use crate::picture::CHANNEL_COUNT;

/// One image file paired with its category index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Path of the image file.
    pub path: PathBuf,
    /// Category index per the catalog the dataset was scanned with.
    pub label: usize,
}

/// The two disjoint groups of a balanced split.
#[derive(Debug, Clone)]
pub struct BalancedSplit {
    /// The first group (`percentage` percent of each category).
    pub first: Vec<ImageEntry>,
    /// The remainder.
    pub second: Vec<ImageEntry>,
}

/// A scanned category-per-subdirectory image tree.
///
/// File lists are sorted at scan time so a split depends only on the seed
/// and the file set, never on directory iteration order.
#[derive(Debug, Clone)]
pub struct FolderDataset {
    /// Per-category sorted file lists, indexed like the catalog.
    files: Vec<Vec<PathBuf>>,
    categories: usize,
}

impl FolderDataset {
    /// Scan `root` for images under the catalog's category directories.
    ///
    /// `extensions` filters by file extension, case-insensitive (e.g.
    /// `["bmp"]`). Subdirectories whose names are not in the catalog are
    /// skipped with a warning; a category with no directory simply
    /// contributes no files.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::IoError`] if the tree cannot be read.
    pub fn scan(
        root: &Path,
        catalog: &LabelCatalog,
        extensions: &[&str],
    ) -> Result<Self, FramefeedError> {
        let mut files = vec![Vec::new(); catalog.len()];

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(label) = name.to_str().and_then(|name| catalog.index_of(name)) else {
                warn!(
                    "skipping {} — not a catalog category",
                    entry.path().display()
                );
                continue;
            };

            for file in fs::read_dir(entry.path())? {
                let path = file?.path();
                let matches = path
                    .extension()
                    .and_then(|extension| extension.to_str())
                    .is_some_and(|extension| {
                        extensions
                            .iter()
                            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
                    });
                if matches {
                    files[label].push(path);
                }
            }
        }

        for list in &mut files {
            list.sort();
        }

        debug!(
            "scanned {} file(s) under {}",
            files.iter().map(Vec::len).sum::<usize>(),
            root.display()
        );

        Ok(Self {
            files,
            categories: catalog.len(),
        })
    }

    /// Total number of files across all categories.
    pub fn len(&self) -> usize {
        self.files.iter().map(Vec::len).sum()
    }

    /// `true` if the scan found no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of files in one category.
    pub fn category_len(&self, label: usize) -> usize {
        self.files.get(label).map_or(0, Vec::len)
    }

    /// Partition into two groups, `percentage` percent of **each category**
    /// in the first.
    ///
    /// One [`StdRng`] seeded from `seed` shuffles the categories' sorted
    /// file lists in catalog order, then each list splits at the rounded
    /// percentage point. Deterministic: same seed + same file set = same
    /// split.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if `percentage` exceeds 100.
    pub fn balanced_split(
        &self,
        seed: u64,
        percentage: u32,
    ) -> Result<BalancedSplit, FramefeedError> {
        if percentage > 100 {
            return Err(FramefeedError::Configuration {
                reason: format!("split percentage must be 0-100 (got {percentage})"),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut first = Vec::new();
        let mut second = Vec::new();

        for (label, sorted) in self.files.iter().enumerate() {
            let mut shuffled = sorted.clone();
            shuffled.shuffle(&mut rng);

            let cut = ((shuffled.len() as f64) * (percentage as f64) / 100.0).round() as usize;
            for (position, path) in shuffled.into_iter().enumerate() {
                let entry = ImageEntry { path, label };
                if position < cut {
                    first.push(entry);
                } else {
                    second.push(entry);
                }
            }
        }

        Ok(BalancedSplit { first, second })
    }

    /// The category count this dataset was scanned with.
    pub fn categories(&self) -> usize {
        self.categories
    }
}

/// A restartable mini-batch stream over still images.
///
/// Decodes with the `image` crate, resizes to `target_rows × target_columns`
/// with bilinear filtering, flattens channel-major in BGR order, and
/// normalizes to [0,1]. Implements [`Iterator`] plus
/// [`reset`](ImageBatchStream::reset), mirroring the sequential batcher's
/// contract.
pub struct ImageBatchStream {
    entries: Vec<ImageEntry>,
    target_rows: u32,
    target_columns: u32,
    batch_size: usize,
    categories: usize,
    next_entry: usize,
    finished: bool,
}

impl ImageBatchStream {
    /// Build a stream over one split group.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::Configuration`] if `batch_size`, `categories`, or
    /// either target dimension is zero.
    pub fn new(
        entries: Vec<ImageEntry>,
        target_rows: u32,
        target_columns: u32,
        batch_size: usize,
        categories: usize,
    ) -> Result<Self, FramefeedError> {
        if batch_size == 0 || categories == 0 {
            return Err(FramefeedError::Configuration {
                reason: "batch_size and category count must be positive".to_string(),
            });
        }
        if target_rows == 0 || target_columns == 0 {
            return Err(FramefeedError::Configuration {
                reason: format!(
                    "target resolution must be positive in both dimensions (got {target_rows}x{target_columns})"
                ),
            });
        }
        Ok(Self {
            entries,
            target_rows,
            target_columns,
            batch_size,
            categories,
            next_entry: 0,
            finished: false,
        })
    }

    /// Number of images this stream will emit per pass.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the stream has no images.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewind to the first image.
    pub fn reset(&mut self) {
        self.next_entry = 0;
        self.finished = false;
    }

    /// Decode one image into a flattened, normalized feature row.
    fn decode_entry(&self, entry: &ImageEntry) -> Result<Vec<f32>, FramefeedError> {
        let image = image::open(&entry.path)?;
        let resized = image.resize_exact(self.target_columns, self.target_rows, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        // Channel-major in BGR order, matching the sequential path's
        // raveled layout, then the single normalization pass.
        let data = rgb.as_raw();
        let pixels = data.len() / CHANNEL_COUNT;
        let mut values = Vec::with_capacity(data.len());
        for channel in [2usize, 1, 0] {
            for pixel in 0..pixels {
                values.push(data[pixel * CHANNEL_COUNT + channel] as f32 / 255.0);
            }
        }
        Ok(values)
    }

    /// Decode the next run of up to `batch_size` entries, preserving order.
    fn decode_batch(&self, batch: &[ImageEntry]) -> Result<Vec<Vec<f32>>, FramefeedError> {
        #[cfg(feature = "rayon")]
        {
            batch
                .par_iter()
                .map(|entry| self.decode_entry(entry))
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            batch
                .iter()
                .map(|entry| self.decode_entry(entry))
                .collect()
        }
    }
}

impl Iterator for ImageBatchStream {
    type Item = Result<MiniBatch, FramefeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_entry >= self.entries.len() {
            self.finished = true;
            return None;
        }

        let end = (self.next_entry + self.batch_size).min(self.entries.len());
        let batch = &self.entries[self.next_entry..end];

        let features = match self.decode_batch(batch) {
            Ok(features) => features,
            Err(error) => {
                self.finished = true;
                return Some(Err(error));
            }
        };

        let mut labels = Vec::with_capacity(batch.len());
        for entry in batch {
            match one_hot(entry.label, self.categories) {
                Ok(encoded) => labels.push(encoded),
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }

        self.next_entry = end;
        let last = self.next_entry >= self.entries.len();
        if last {
            self.finished = true;
        }

        Some(Ok(MiniBatch {
            features,
            labels,
            last,
        }))
    }
}

impl BatchSource for ImageBatchStream {
    fn reset(&mut self) {
        ImageBatchStream::reset(self);
    }
}
