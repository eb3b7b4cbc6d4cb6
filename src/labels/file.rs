//! Per-file repair: read, repair every line, then rewrite or delete.
//!
//! A file is only touched after the whole line pass has completed. Surviving
//! lines are written atomically; a file with no surviving line is deleted.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::infer::InferenceMode;
use super::line::{repair_line, LineContext, LineOutcome, SkipReason};
use crate::fsutil::write_atomic;
use crate::geometry::ImageDimensions;

/// Outcome tag for one annotation file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
    /// At least one line survived; the file was rewritten canonically.
    Fixed,
    /// No line survived; the file was deleted.
    Deleted,
    /// The file was empty; it was deleted.
    EmptyDeleted,
    /// The file could not be read or written; left as is.
    Skipped(String),
}

impl FileStatus {
    pub fn tag(&self) -> &'static str {
        match self {
            FileStatus::Fixed => "fixed",
            FileStatus::Deleted => "deleted",
            FileStatus::EmptyDeleted => "empty_deleted",
            FileStatus::Skipped(_) => "skipped",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, FileStatus::Deleted | FileStatus::EmptyDeleted)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            other => f.write_str(other.tag()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixOptions {
    pub num_classes: u32,
    pub mode: InferenceMode,
    /// Compute outcomes without writing or deleting anything.
    pub dry_run: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            num_classes: 1,
            mode: InferenceMode::BestGuess,
            dry_run: false,
        }
    }
}

/// Result of repairing the text of one annotation file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepairedText {
    pub lines: Vec<String>,
    /// 1-based line number and reason for every dropped line.
    pub skipped: Vec<(usize, SkipReason)>,
    pub clamped: usize,
}

impl RepairedText {
    /// Canonical file body: one line per object, no trailing newline.
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Clone, Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub repaired: RepairedText,
}

pub fn repair_text(text: &str, ctx: &LineContext) -> RepairedText {
    let mut repaired = RepairedText::default();
    for (idx, line) in text.lines().enumerate() {
        match repair_line(line, ctx) {
            Some(LineOutcome::Parsed(record)) => {
                if record.clamped {
                    repaired.clamped += 1;
                }
                repaired.lines.push(record.to_line());
            }
            Some(LineOutcome::Skipped(reason)) => repaired.skipped.push((idx + 1, reason)),
            None => {}
        }
    }
    repaired
}

/// Repair the annotation file at `path`, rewriting or deleting it.
pub fn fix_label_file(
    path: &Path,
    dims: Option<ImageDimensions>,
    options: &FixOptions,
) -> FileOutcome {
    let outcome = |status, repaired| FileOutcome {
        path: path.to_path_buf(),
        status,
        repaired,
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("cannot read {}: {}", path.display(), err);
            return outcome(
                FileStatus::Skipped(format!("read failed: {err}")),
                RepairedText::default(),
            );
        }
    };
    // Undecodable bytes are dropped rather than failing the file.
    let text = String::from_utf8_lossy(&bytes).replace('\u{FFFD}', "");

    if text.trim().is_empty() {
        let status = delete_unless_dry(path, options, FileStatus::EmptyDeleted);
        return outcome(status, RepairedText::default());
    }

    let ctx = LineContext {
        dims,
        num_classes: options.num_classes,
        mode: options.mode,
    };
    let repaired = repair_text(&text, &ctx);
    for (line_no, reason) in &repaired.skipped {
        log::debug!("{}:{}: skipped: {}", path.display(), line_no, reason);
    }

    if repaired.lines.is_empty() {
        let status = delete_unless_dry(path, options, FileStatus::Deleted);
        return outcome(status, repaired);
    }

    if !options.dry_run {
        if let Err(err) = write_atomic(path, repaired.body().as_bytes()) {
            log::warn!("cannot rewrite {}: {:#}", path.display(), err);
            return outcome(FileStatus::Skipped(format!("write failed: {err}")), repaired);
        }
    }
    outcome(FileStatus::Fixed, repaired)
}

fn delete_unless_dry(path: &Path, options: &FixOptions, status: FileStatus) -> FileStatus {
    if options.dry_run {
        return status;
    }
    match fs::remove_file(path) {
        Ok(()) => status,
        Err(err) => {
            log::warn!("cannot delete {}: {}", path.display(), err);
            FileStatus::Skipped(format!("delete failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn mixed_file_is_rewritten_with_surviving_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "a.txt",
            "car 640 360 320 240\n0 0.5 0.5\n\n1 0.2 0.2 0.1 0.1 0.88\n",
        );

        let outcome = fix_label_file(
            &path,
            Some(ImageDimensions::new(1280, 720)),
            &FixOptions::default(),
        );

        assert_eq!(outcome.status, FileStatus::Fixed);
        assert_eq!(outcome.repaired.skipped.len(), 1);
        assert_eq!(outcome.repaired.skipped[0].0, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "0 0.500000 0.500000 0.250000 0.333333\n0 0.200000 0.200000 0.100000 0.100000"
        );
    }

    #[test]
    fn file_without_valid_lines_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "b.txt", "garbage\n0 x y z w\n0 0.1\n");

        let outcome = fix_label_file(&path, None, &FixOptions::default());

        assert_eq!(outcome.status, FileStatus::Deleted);
        assert!(outcome.repaired.lines.is_empty());
        assert_eq!(outcome.repaired.skipped.len(), 3);
        assert!(!path.exists());
    }

    #[test]
    fn empty_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.txt", "  \n\n");

        let outcome = fix_label_file(&path, None, &FixOptions::default());

        assert_eq!(outcome.status, FileStatus::EmptyDeleted);
        assert!(!path.exists());
    }

    #[test]
    fn dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let fixable = write(dir.path(), "d.txt", "car 0.5 0.5 0.2 0.2");
        let broken = write(dir.path(), "e.txt", "car");
        let options = FixOptions {
            dry_run: true,
            ..FixOptions::default()
        };

        assert_eq!(fix_label_file(&fixable, None, &options).status, FileStatus::Fixed);
        assert_eq!(fix_label_file(&broken, None, &options).status, FileStatus::Deleted);
        assert_eq!(fs::read_to_string(&fixable).unwrap(), "car 0.5 0.5 0.2 0.2");
        assert!(broken.exists());
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = fix_label_file(&dir.path().join("nope.txt"), None, &FixOptions::default());
        assert_eq!(outcome.status.tag(), "skipped");
        assert!(outcome.status.to_string().starts_with("skipped (read failed"));
    }

    #[test]
    fn invalid_utf8_bytes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"0 0.5\xff 0.5 0.2 0.2").unwrap();

        let outcome = fix_label_file(&path, None, &FixOptions::default());

        assert_eq!(outcome.status, FileStatus::Fixed);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "0 0.500000 0.500000 0.200000 0.200000"
        );
    }
}
