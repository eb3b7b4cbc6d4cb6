//! Dataset-wide label normalization.
//!
//! Walks `<root>/<split>/labels/*.txt`, pairs every label file with its image
//! in `<root>/<split>/images/` by file stem and repairs it. Files are handled
//! one at a time in sorted order so the report is deterministic; a failure on
//! one file never stops the batch.

use anyhow::{Context, Result};
use image::{ImageError, ImageReader};
use std::fs;
use std::path::{Path, PathBuf};

use super::file::{fix_label_file, FileOutcome, FileStatus, FixOptions};
use crate::fsutil::write_atomic;
use crate::geometry::ImageDimensions;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];
pub const LABEL_EXTENSION: &str = "txt";
pub const DEFAULT_SPLITS: [&str; 3] = ["train", "val", "test"];
/// Per-file detail lines kept in the rendered report.
pub const DEFAULT_DETAIL_LIMIT: usize = 200;

/// `<root>/<split>/{images,labels}` directory convention.
#[derive(Clone, Debug)]
pub struct DatasetLayout {
    pub root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn labels_dir(&self, split: &str) -> PathBuf {
        self.root.join(split).join("labels")
    }

    pub fn images_dir(&self, split: &str) -> PathBuf {
        self.root.join(split).join("images")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub split: String,
    pub checked: usize,
    pub fixed: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl SplitCounts {
    fn record(&mut self, status: &FileStatus) {
        self.checked += 1;
        match status {
            FileStatus::Fixed => self.fixed += 1,
            FileStatus::Deleted | FileStatus::EmptyDeleted => self.deleted += 1,
            FileStatus::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Aggregate outcome of a dataset pass.
#[derive(Clone, Debug, Default)]
pub struct FixReport {
    pub splits: Vec<SplitCounts>,
    /// One line per file (or per missing directory), in processing order.
    pub details: Vec<String>,
}

impl FixReport {
    pub fn totals(&self) -> SplitCounts {
        self.splits
            .iter()
            .fold(SplitCounts::default(), |mut acc, split| {
                acc.checked += split.checked;
                acc.fixed += split.fixed;
                acc.deleted += split.deleted;
                acc.skipped += split.skipped;
                acc
            })
    }

    /// Human-readable summary with at most `detail_limit` per-file lines.
    pub fn render(&self, detail_limit: usize) -> String {
        let totals = self.totals();
        let mut out = vec![
            "Dataset fix report".to_string(),
            format!("Total label files checked: {}", totals.checked),
            format!("Total fixed files (rewritten): {}", totals.fixed),
            format!("Total deleted files (unfixable): {}", totals.deleted),
            format!("Total skipped files (I/O errors): {}", totals.skipped),
        ];
        for split in &self.splits {
            out.push(format!(
                "{}: checked {}, fixed {}, deleted {}, skipped {}",
                split.split, split.checked, split.fixed, split.deleted, split.skipped
            ));
        }
        out.push(String::new());
        out.extend(self.details.iter().take(detail_limit).cloned());
        out.join("\n")
    }

    pub fn write(&self, path: &Path, detail_limit: usize) -> Result<()> {
        write_atomic(path, self.render(detail_limit).as_bytes())
            .with_context(|| format!("failed to write fix report {}", path.display()))
    }
}

/// Find the image paired with a label stem.
///
/// Exact `<stem>.<ext>` matches win; otherwise the first directory entry
/// (sorted by name) whose file name starts with the stem.
pub fn find_image_for_label(images_dir: &Path, stem: &str) -> Option<PathBuf> {
    for ext in IMAGE_EXTENSIONS {
        let candidate = images_dir.join(format!("{stem}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let mut matches: Vec<PathBuf> = fs::read_dir(images_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(stem))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Read width/height from the image header. `None` when unreadable.
///
/// The format is sniffed from the file content, so a mislabeled extension
/// still yields the real size.
pub fn read_image_dimensions(path: &Path) -> Option<ImageDimensions> {
    let header = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ImageError::from)
        .and_then(|reader| reader.into_dimensions());
    match header {
        Ok((width, height)) => Some(ImageDimensions::new(width, height)),
        Err(err) => {
            log::debug!("cannot read image size of {}: {}", path.display(), err);
            None
        }
    }
}

/// Label files directly inside `labels_dir`, sorted by path.
///
/// Entries that are not directories are listed even when they cannot be
/// opened (a dangling link), so the pass reports them as skipped.
pub fn list_label_files(labels_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(labels_dir)
        .with_context(|| format!("failed to list {}", labels_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| !path.is_dir())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(LABEL_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

/// Repair every label file of the given splits.
///
/// `on_file` is called after each file, in processing order.
pub fn normalize_dataset<S, F>(
    layout: &DatasetLayout,
    splits: &[S],
    options: &FixOptions,
    mut on_file: F,
) -> FixReport
where
    S: AsRef<str>,
    F: FnMut(&str, &FileOutcome),
{
    let mut report = FixReport::default();

    for split in splits {
        let split = split.as_ref();
        let labels_dir = layout.labels_dir(split);
        let images_dir = layout.images_dir(split);
        let mut counts = SplitCounts {
            split: split.to_string(),
            ..SplitCounts::default()
        };

        if !labels_dir.is_dir() {
            log::warn!("missing label dir: {}", labels_dir.display());
            report
                .details
                .push(format!("Missing label dir: {}", labels_dir.display()));
            report.splits.push(counts);
            continue;
        }

        let files = match list_label_files(&labels_dir) {
            Ok(files) => files,
            Err(err) => {
                log::warn!("{:#}", err);
                report.details.push(format!("{split}: {err:#}"));
                report.splits.push(counts);
                continue;
            }
        };
        log::info!("{}: {} label files", split, files.len());

        for label_path in files {
            let stem = label_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let image_path = find_image_for_label(&images_dir, &stem);
            let dims = image_path.as_deref().and_then(read_image_dimensions);

            let outcome = fix_label_file(&label_path, dims, options);
            counts.record(&outcome.status);
            report.details.push(format!(
                "{} {} -> {} (img={})",
                split,
                label_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                outcome.status,
                if image_path.is_some() { "yes" } else { "no" }
            ));
            on_file(split, &outcome);
        }

        log::info!(
            "{}: fixed {}, deleted {}, skipped {}",
            split,
            counts.fixed,
            counts.deleted,
            counts.skipped
        );
        report.splits.push(counts);
    }

    report
}
