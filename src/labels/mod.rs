//! Label normalizer.
//!
//! Repairs raw per-image annotation files into canonical normalized
//! center-box lines (`"<class> <cx> <cy> <w> <h>"`, 6 decimals):
//! - `line`: tokenize and repair one line, with an explicit skip reason
//! - `infer`: coordinate-system decision table
//! - `file`: rewrite or delete one annotation file
//! - `dataset`: walk dataset splits and build the fix report
//! - `verify`: read-only canonical checks

pub mod dataset;
pub mod file;
pub mod infer;
pub mod line;
pub mod verify;

pub use dataset::{normalize_dataset, DatasetLayout, FixReport, SplitCounts};
pub use file::{fix_label_file, repair_text, FileOutcome, FileStatus, FixOptions};
pub use infer::{CoordinateSystem, InferenceMode};
pub use line::{repair_line, LabelRecord, LineContext, LineOutcome, SkipReason};
pub use verify::{check_layout, verify_dataset, LabelProblem, VerifyReport};
