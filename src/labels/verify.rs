//! Read-only checks that a dataset already holds canonical labels.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::dataset::{list_label_files, DatasetLayout};
use crate::geometry::BoundingBox;

/// First problem found in a label file.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LabelProblem {
    #[error("empty")]
    Empty,
    #[error("wrong number of values ({0})")]
    WrongTokenCount(usize),
    #[error("unparsable value '{0}'")]
    Unparsable(String),
    #[error("invalid class {0}")]
    InvalidClass(f64),
    #[error("non-normalized coords")]
    NonNormalized,
    #[error("error: {0}")]
    Io(String),
}

#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    /// `(split, label files checked)` in split order.
    pub checked: Vec<(String, usize)>,
    pub problems: Vec<(PathBuf, LabelProblem)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn total_checked(&self) -> usize {
        self.checked.iter().map(|(_, n)| n).sum()
    }
}

/// Presence of one split's directories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitLayout {
    pub split: String,
    pub images_dir: PathBuf,
    pub images_present: bool,
    pub labels_dir: PathBuf,
    pub labels_present: bool,
}

/// Check that every line of `text` is a canonical label for `num_classes`.
pub fn verify_label_text(text: &str, num_classes: u32) -> Result<(), LabelProblem> {
    let lines: Vec<&str> = text.trim().lines().collect();
    if lines.is_empty() {
        return Err(LabelProblem::Empty);
    }
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(LabelProblem::WrongTokenCount(tokens.len()));
        }
        let mut values = [0.0f64; 5];
        for (slot, token) in values.iter_mut().zip(&tokens) {
            *slot = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| LabelProblem::Unparsable(token.to_string()))?;
        }
        let [class, cx, cy, w, h] = values;
        if !(0.0..num_classes as f64).contains(&class) {
            return Err(LabelProblem::InvalidClass(class));
        }
        if !BoundingBox::new(cx, cy, w, h).is_canonical() {
            return Err(LabelProblem::NonNormalized);
        }
    }
    Ok(())
}

pub fn verify_label_file(path: &Path, num_classes: u32) -> Result<(), LabelProblem> {
    let text = fs::read_to_string(path).map_err(|e| LabelProblem::Io(e.to_string()))?;
    verify_label_text(&text, num_classes)
}

/// Verify every label file of the given splits without modifying anything.
pub fn verify_dataset<S: AsRef<str>>(
    layout: &DatasetLayout,
    splits: &[S],
    num_classes: u32,
) -> VerifyReport {
    let mut report = VerifyReport::default();
    for split in splits {
        let split = split.as_ref();
        let files = match list_label_files(&layout.labels_dir(split)) {
            Ok(files) => files,
            Err(err) => {
                log::warn!("{}: {:#}", split, err);
                report.checked.push((split.to_string(), 0));
                continue;
            }
        };
        log::info!("checking {} ({} label files)", split, files.len());
        report.checked.push((split.to_string(), files.len()));
        for path in files {
            if let Err(problem) = verify_label_file(&path, num_classes) {
                report.problems.push((path, problem));
            }
        }
    }
    report
}

pub fn check_layout<S: AsRef<str>>(layout: &DatasetLayout, splits: &[S]) -> Vec<SplitLayout> {
    splits
        .iter()
        .map(|split| {
            let split = split.as_ref();
            let images_dir = layout.images_dir(split);
            let labels_dir = layout.labels_dir(split);
            SplitLayout {
                split: split.to_string(),
                images_present: images_dir.is_dir(),
                labels_present: labels_dir.is_dir(),
                images_dir,
                labels_dir,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_passes() {
        let text = "0 0.500000 0.500000 0.250000 0.333333\n0 0.1 0.1 0.05 0.05\n";
        assert_eq!(verify_label_text(text, 1), Ok(()));
    }

    #[test]
    fn first_problem_is_reported() {
        assert_eq!(verify_label_text("   \n", 1), Err(LabelProblem::Empty));
        assert_eq!(
            verify_label_text("0 0.5 0.5 0.2", 1),
            Err(LabelProblem::WrongTokenCount(4))
        );
        assert_eq!(
            verify_label_text("car 0.5 0.5 0.2 0.2", 1),
            Err(LabelProblem::Unparsable("car".into()))
        );
        assert_eq!(
            verify_label_text("1 0.5 0.5 0.2 0.2", 1),
            Err(LabelProblem::InvalidClass(1.0))
        );
        assert_eq!(
            verify_label_text("0 640 360 320 240", 1),
            Err(LabelProblem::NonNormalized)
        );
    }

    #[test]
    fn class_range_follows_class_count() {
        assert_eq!(verify_label_text("2 0.5 0.5 0.2 0.2", 3), Ok(()));
        assert_eq!(
            verify_label_text("-1 0.5 0.5 0.2 0.2", 3),
            Err(LabelProblem::InvalidClass(-1.0))
        );
    }

    #[test]
    fn layout_reports_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("train/images")).unwrap();
        fs::create_dir_all(dir.path().join("train/labels")).unwrap();
        fs::create_dir_all(dir.path().join("val/images")).unwrap();

        let layout = check_layout(&DatasetLayout::new(dir.path()), &["train", "val"]);

        assert!(layout[0].images_present && layout[0].labels_present);
        assert!(layout[1].images_present);
        assert!(!layout[1].labels_present);
    }
}
