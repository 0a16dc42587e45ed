//! Folder scanning and balanced-split tests.
//!
//! Splitting never decodes images, so empty placeholder files are enough to
//! exercise determinism and balance.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use framefeed::{FolderDataset, FramefeedError, LabelCatalog};
use tempfile::TempDir;

/// Lay out `count` empty .bmp files per listed category.
fn build_tree(categories: &[(&str, usize)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (name, count) in categories {
        let category_dir = dir.path().join(name);
        fs::create_dir(&category_dir).expect("category dir");
        for index in 0..*count {
            fs::write(category_dir.join(format!("img_{index}.bmp")), []).expect("image file");
        }
    }
    dir
}

fn paths(entries: &[framefeed::ImageEntry]) -> HashSet<PathBuf> {
    entries.iter().map(|entry| entry.path.clone()).collect()
}

#[test]
fn scan_counts_files_per_category() {
    let catalog = LabelCatalog::new(["soccer", "golf", "tennis"]).expect("catalog");
    let dir = build_tree(&[("soccer", 10), ("golf", 4)]);

    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");
    assert_eq!(dataset.len(), 14);
    assert_eq!(dataset.category_len(0), 10);
    assert_eq!(dataset.category_len(1), 4);
    assert_eq!(dataset.category_len(2), 0, "missing directory is empty");
    assert_eq!(dataset.categories(), 3);
}

#[test]
fn scan_skips_directories_outside_the_catalog() {
    let catalog = LabelCatalog::new(["soccer"]).expect("catalog");
    let dir = build_tree(&[("soccer", 3), ("curling", 5)]);

    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");
    assert_eq!(dataset.len(), 3);
}

#[test]
fn scan_filters_extensions_case_insensitively() {
    let catalog = LabelCatalog::new(["soccer"]).expect("catalog");
    let dir = build_tree(&[("soccer", 2)]);
    let soccer = dir.path().join("soccer");
    fs::write(soccer.join("img_9.BMP"), []).expect("uppercase extension");
    fs::write(soccer.join("notes.txt"), []).expect("stray file");

    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");
    assert_eq!(dataset.len(), 3);
}

#[test]
fn same_seed_yields_the_same_split() {
    let catalog = LabelCatalog::new(["soccer", "golf"]).expect("catalog");
    let dir = build_tree(&[("soccer", 20), ("golf", 10)]);
    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");

    let first = dataset.balanced_split(42, 90).expect("split");
    let second = dataset.balanced_split(42, 90).expect("split");

    assert_eq!(paths(&first.first), paths(&second.first));
    assert_eq!(paths(&first.second), paths(&second.second));
}

#[test]
fn different_seeds_yield_different_memberships() {
    let catalog = LabelCatalog::new(["soccer"]).expect("catalog");
    let dir = build_tree(&[("soccer", 40)]);
    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");

    let a = dataset.balanced_split(1, 50).expect("split");
    let b = dataset.balanced_split(2, 50).expect("split");

    // Same sizes either way; with 40 files and a 50% cut, identical
    // membership across seeds is astronomically unlikely.
    assert_eq!(a.first.len(), b.first.len());
    assert_ne!(paths(&a.first), paths(&b.first));
}

#[test]
fn split_is_balanced_per_category_and_disjoint() {
    let catalog = LabelCatalog::new(["soccer", "golf", "tennis"]).expect("catalog");
    let dir = build_tree(&[("soccer", 20), ("golf", 10), ("tennis", 5)]);
    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");

    let split = dataset.balanced_split(7, 90).expect("split");

    // 90% of each category, rounded: 18 + 9 + 5 (round(4.5) = 5).
    let count = |entries: &[framefeed::ImageEntry], label: usize| {
        entries.iter().filter(|entry| entry.label == label).count()
    };
    assert_eq!(count(&split.first, 0), 18);
    assert_eq!(count(&split.first, 1), 9);
    assert_eq!(count(&split.first, 2), 5);
    assert_eq!(count(&split.second, 0), 2);
    assert_eq!(count(&split.second, 1), 1);
    assert_eq!(count(&split.second, 2), 0);

    let first = paths(&split.first);
    let second = paths(&split.second);
    assert!(first.is_disjoint(&second));
    assert_eq!(first.len() + second.len(), dataset.len());
}

#[test]
fn percentage_over_100_is_rejected() {
    let catalog = LabelCatalog::new(["soccer"]).expect("catalog");
    let dir = build_tree(&[("soccer", 1)]);
    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");

    assert!(matches!(
        dataset.balanced_split(0, 101),
        Err(FramefeedError::Configuration { .. })
    ));
}

#[test]
fn full_percentage_puts_everything_in_the_first_group() {
    let catalog = LabelCatalog::new(["soccer"]).expect("catalog");
    let dir = build_tree(&[("soccer", 6)]);
    let dataset = FolderDataset::scan(dir.path(), &catalog, &["bmp"]).expect("scan");

    let split = dataset.balanced_split(0, 100).expect("split");
    assert_eq!(split.first.len(), 6);
    assert!(split.second.is_empty());
}
