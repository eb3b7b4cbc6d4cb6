//! Choosing which image a metrics run should describe.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::fsutil::modified_epoch_s;
use crate::record::PriorRecord;

pub const ANNOTATED_PREFIX: &str = "annotated_";
pub const ANNOTATED_EXTENSION: &str = "jpg";
/// Record references starting with this live in the results directory.
pub const STATIC_URL_PREFIX: &str = "/static/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSource {
    Explicit,
    PriorRecord,
    LatestAnnotated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub source: TargetSource,
}

/// Newest `annotated_*.jpg` in `results_dir` by modification time.
pub fn latest_annotated(results_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(results_dir).ok()?;
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_annotated(path))
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

fn is_annotated(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(ANNOTATED_PREFIX));
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == ANNOTATED_EXTENSION);
    name_ok && ext_ok && path.is_file()
}

/// Local path of the image a prior record refers to, when it exists.
pub fn prior_image_path(record: &PriorRecord, results_dir: &Path) -> Option<PathBuf> {
    let reference = record.image_ref.as_deref()?;
    let path = if reference.starts_with(STATIC_URL_PREFIX) {
        results_dir.join(record.image_name()?)
    } else {
        PathBuf::from(reference)
    };
    path.exists().then_some(path)
}

/// Pick the image to analyze.
///
/// An explicit path must exist. Otherwise the prior record's image is used,
/// unless the newest annotated image is more recent than the record.
pub fn select_target(
    explicit: Option<&Path>,
    prior: Option<&PriorRecord>,
    results_dir: &Path,
) -> Result<Option<Target>> {
    if let Some(path) = explicit {
        fs::metadata(path)
            .with_context(|| format!("image {} is not accessible", path.display()))
            .and_then(|m| {
                if m.is_file() {
                    Ok(())
                } else {
                    Err(anyhow!("image {} is not a file", path.display()))
                }
            })?;
        return Ok(Some(Target {
            path: path.to_path_buf(),
            source: TargetSource::Explicit,
        }));
    }

    let from_prior = prior.and_then(|record| prior_image_path(record, results_dir));
    let latest = latest_annotated(results_dir);

    let target = match (from_prior, latest) {
        (Some(prior_path), Some(latest)) => {
            let prior_ts = prior.and_then(|r| r.timestamp).unwrap_or(0);
            let latest_ts = modified_epoch_s(&latest).unwrap_or(0);
            if latest_ts > prior_ts {
                log::info!(
                    "{} is newer than the last detection record",
                    latest.display()
                );
                Target {
                    path: latest,
                    source: TargetSource::LatestAnnotated,
                }
            } else {
                Target {
                    path: prior_path,
                    source: TargetSource::PriorRecord,
                }
            }
        }
        (Some(path), None) => Target {
            path,
            source: TargetSource::PriorRecord,
        },
        (None, Some(path)) => Target {
            path,
            source: TargetSource::LatestAnnotated,
        },
        (None, None) => return Ok(None),
    };
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::File;
    use std::time::{Duration, UNIX_EPOCH};

    fn touch(path: &Path, epoch_s: u64) {
        let file = File::create(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(epoch_s))
            .unwrap();
    }

    fn record(value: serde_json::Value) -> PriorRecord {
        PriorRecord::from_value(value).unwrap()
    }

    #[test]
    fn explicit_image_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.jpg");
        assert!(select_target(Some(&missing), None, dir.path()).is_err());

        let present = dir.path().join("frame.jpg");
        touch(&present, 1_000);
        let target = select_target(Some(&present), None, dir.path()).unwrap().unwrap();
        assert_eq!(target.source, TargetSource::Explicit);
    }

    #[test]
    fn latest_annotated_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("annotated_1.jpg"), 1_000);
        touch(&dir.path().join("annotated_2.jpg"), 2_000);
        touch(&dir.path().join("annotated_3.png"), 3_000);
        touch(&dir.path().join("upload.jpg"), 4_000);

        assert_eq!(
            latest_annotated(dir.path()),
            Some(dir.path().join("annotated_2.jpg"))
        );
    }

    #[test]
    fn static_references_map_into_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("annotated_1.jpg"), 1_000);
        let prior = record(json!({
            "output_image": "/static/results/annotated_1.jpg",
            "timestamp": 5_000,
        }));

        let target = select_target(None, Some(&prior), dir.path()).unwrap().unwrap();
        assert_eq!(target.path, dir.path().join("annotated_1.jpg"));
        assert_eq!(target.source, TargetSource::PriorRecord);
    }

    #[test]
    fn newer_annotated_image_overrides_the_record() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("annotated_1.jpg"), 1_000);
        touch(&dir.path().join("annotated_2.jpg"), 9_000);
        let prior = record(json!({
            "output_image": "/static/results/annotated_1.jpg",
            "timestamp": 5_000,
        }));

        let target = select_target(None, Some(&prior), dir.path()).unwrap().unwrap();
        assert_eq!(target.path, dir.path().join("annotated_2.jpg"));
        assert_eq!(target.source, TargetSource::LatestAnnotated);
    }

    #[test]
    fn nothing_to_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let prior = record(json!({"output_image": "/static/results/gone.jpg"}));
        assert_eq!(select_target(None, Some(&prior), dir.path()).unwrap(), None);
    }
}
